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

//! Bit-exact text (de)serialization of a [`ProgressiveBarrier`]: a sequence
//! of `X_FEAS <point>`, `X_INF <point>`, and a final `H_MAX <value>` line.
//! Lets a barrier snapshot seed a run deterministically (e.g. a non-empty
//! cache with an empty `X0`).

use std::io::{self, BufRead, Write};

use super::ProgressiveBarrier;
use crate::eval::{BbOutputType, ComputeType, Eval, EvalKind, EvalStatus};
use crate::eval_point::EvalPoint;
use crate::numeric::Dbl;
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

fn write_eval_point<W: Write>(w: &mut W, tag: &str, ep: &EvalPoint) -> io::Result<()> {
    let eval = ep.eval(EvalKind::Blackbox).expect("barrier point without a blackbox eval");
    write!(w, "{tag} ( ")?;
    for c in ep.point().coords() {
        write!(w, "{c} ")?;
    }
    writeln!(w, ") {} ( {} )", status_token(eval.status()), eval.raw_outputs())
}

fn parse_eval_point(rest: &str, dim: usize, bb_output_types: &[BbOutputType]) -> Option<EvalPoint> {
    let after_open = rest.trim().strip_prefix('(')?;
    let (coords_str, tail) = after_open.split_once(')')?;
    let coords: Vec<f64> = coords_str
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if coords.len() != dim {
        return None;
    }
    let tail = tail.trim();
    let (status_str, tail) = tail.split_once(' ')?;
    let status = status_from_token(status_str.trim())?;
    let outputs_str = tail.trim().strip_prefix('(')?.strip_suffix(')')?;

    let mut ep = EvalPoint::new(Point::from_f64(&coords));
    ep.set_eval(
        EvalKind::Blackbox,
        Eval::new(status, outputs_str.trim().to_string(), bb_output_types.to_vec(), ComputeType::default()),
    );
    Some(ep)
}

impl ProgressiveBarrier {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for ep in &self.x_feas {
            write_eval_point(w, "X_FEAS", ep)?;
        }
        for ep in &self.x_inf {
            write_eval_point(w, "X_INF", ep)?;
        }
        writeln!(w, "H_MAX {}", self.h_max)
    }

    pub fn read_from<R: BufRead>(
        r: &mut R,
        dim: usize,
        bb_output_types: &[BbOutputType],
    ) -> io::Result<ProgressiveBarrier> {
        let mut points = Vec::new();
        let mut h_max = Dbl::POS_INF;
        for line in r.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("X_FEAS") {
                let ep = parse_eval_point(rest, dim, bb_output_types)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed X_FEAS record"))?;
                points.push(ep);
            } else if let Some(rest) = line.strip_prefix("X_INF") {
                let ep = parse_eval_point(rest, dim, bb_output_types)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed X_INF record"))?;
                points.push(ep);
            } else if let Some(rest) = line.strip_prefix("H_MAX") {
                let v: f64 = rest
                    .trim()
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed H_MAX record"))?;
                h_max = Dbl::new(v);
            }
        }
        let mut barrier = ProgressiveBarrier::new(h_max);
        barrier.update_with_points(&points, EvalKind::Blackbox, true);
        barrier.update_ref_bests();
        Ok(barrier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_feasible_and_infeasible_incumbents() {
        let mut barrier = ProgressiveBarrier::new(Dbl::POS_INF);
        let types = vec![BbOutputType::Obj, BbOutputType::Pb];
        let mut feas = EvalPoint::new(Point::from_f64(&[1.0]));
        feas.set_eval(
            EvalKind::Blackbox,
            Eval::new(EvalStatus::Ok, "3.0 -1.0".into(), types.clone(), ComputeType::default()),
        );
        let mut inf = EvalPoint::new(Point::from_f64(&[2.0]));
        inf.set_eval(
            EvalKind::Blackbox,
            Eval::new(EvalStatus::Ok, "1.0 2.0".into(), types.clone(), ComputeType::default()),
        );
        barrier.update_with_points(&[feas, inf], EvalKind::Blackbox, true);

        let mut buf = Vec::new();
        barrier.write_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let restored = ProgressiveBarrier::read_from(&mut cursor, 1, &types).unwrap();
        assert_eq!(restored.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f(), Dbl::new(3.0));
        assert!(!restored.x_inc_inf().is_empty());
    }
}
