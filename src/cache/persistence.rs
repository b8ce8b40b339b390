// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Bit-exact text (de)serialization of a [`Cache`]: one
//! `( x1 ... xn ) STATUS ( o1 ... om )` record per evaluated point.

use std::io::{self, BufRead, Write};

use super::Cache;
use crate::eval::{BbOutputType, ComputeType, Eval, EvalKind, EvalStatus};
use crate::point::Point;

fn status_token(status: EvalStatus) -> &'static str {
    match status {
        EvalStatus::Ok => "OK",
        EvalStatus::Fail => "FAIL",
        EvalStatus::ConsHOver => "CONS_H_OVER",
        EvalStatus::Undefined => "UNDEFINED",
        EvalStatus::InProgress => "IN_PROGRESS",
    }
}

fn status_from_token(token: &str) -> Option<EvalStatus> {
    match token {
        "OK" => Some(EvalStatus::Ok),
        "FAIL" => Some(EvalStatus::Fail),
        "CONS_H_OVER" => Some(EvalStatus::ConsHOver),
        "UNDEFINED" => Some(EvalStatus::Undefined),
        "IN_PROGRESS" => Some(EvalStatus::InProgress),
        _ => None,
    }
}

impl Cache {
    /// Writes every point holding a [`EvalKind::Blackbox`] evaluation, one
    /// record per line, in the order the underlying map iterates them.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for entry in self.slots.iter() {
            let ep = entry.value().inner.lock();
            let Some(eval) = ep.eval(EvalKind::Blackbox) else { continue };
            write!(w, "( ")?;
            for c in ep.point().coords() {
                write!(w, "{c} ")?;
            }
            writeln!(w, ") {} ( {} )", status_token(eval.status()), eval.raw_outputs())?;
        }
        Ok(())
    }

    /// Rebuilds a cache from a previously-written record stream. Every
    /// record is installed with [`EvalKind::Blackbox`] under the
    /// `Standard` compute rule; callers needing a different rule should
    /// follow up with [`Cache::process_on_all_points`].
    pub fn read_from<R: BufRead>(
        r: &mut R,
        dim: usize,
        eps: f64,
        bb_output_types: &[BbOutputType],
    ) -> io::Result<Cache> {
        let cache = Cache::new(dim, eps);
        for line in r.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (point, status, raw_outputs) = parse_record(line, dim)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed cache record"))?;
            cache.smart_insert(&point, u32::MAX, EvalKind::Blackbox);
            let eval = Eval::new(status, raw_outputs, bb_output_types.to_vec(), ComputeType::default());
            cache.update(&point, EvalKind::Blackbox, eval);
        }
        Ok(cache)
    }
}

fn parse_record(line: &str, dim: usize) -> Option<(Point, EvalStatus, String)> {
    let after_open = line.strip_prefix('(')?;
    let (coords_str, rest) = after_open.split_once(')')?;
    let coords: Vec<f64> = coords_str
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if coords.len() != dim {
        return None;
    }
    let rest = rest.trim();
    let (status_str, rest) = rest.split_once(' ')?;
    let status = status_from_token(status_str.trim())?;
    let rest = rest.trim();
    let outputs_str = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some((Point::from_f64(&coords), status, outputs_str.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_status_and_raw_outputs() {
        let cache = Cache::new(2, 1e-13);
        let pt = Point::from_f64(&[1.0, 2.0]);
        cache.smart_insert(&pt, 1, EvalKind::Blackbox);
        cache.update(
            &pt,
            EvalKind::Blackbox,
            Eval::new(EvalStatus::Ok, "3.5 -1.0".into(), vec![BbOutputType::Obj, BbOutputType::Pb], ComputeType::default()),
        );

        let mut buf = Vec::new();
        cache.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let restored = Cache::read_from(&mut cursor, 2, 1e-13, &[BbOutputType::Obj, BbOutputType::Pb]).unwrap();
        let ep = restored.find(&pt).unwrap();
        let eval = ep.eval(EvalKind::Blackbox).unwrap();
        assert_eq!(eval.status(), EvalStatus::Ok);
        assert_eq!(eval.raw_outputs(), "3.5 -1.0");
        assert_eq!(eval.f(), crate::numeric::Dbl::new(3.5));
    }
}
