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

//! The candidate record: a [`Point`] plus every [`Eval`] computed for it,
//! and the provenance (which step generated it, from what parent) used for
//! mesh-direction accounting and reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::eval::{Eval, EvalKind};
use crate::numeric::Dbl;
use crate::point::{Direction, Point};

/// Which kind of step produced a trial point; threaded through
/// `EvalPoint::gen_step` for provenance and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    Initial,
    Search,
    Poll,
    ExtendedPoll,
    Model,
    User,
    Undefined,
}

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// A point together with every evaluation performed on it, lazily tagged
/// with a process-unique id the first time one is requested.
#[derive(Debug, Clone)]
pub struct EvalPoint {
    point: Point,
    evals: HashMap<EvalKind, Eval>,
    tag: Option<u64>,
    thread_origin: Option<usize>,
    num_evals: u32,
    point_from: Option<Point>,
    gen_step: Vec<StepType>,
    direction: Option<Direction>,
    angle: Option<Dbl>,
}

impl EvalPoint {
    pub fn new(point: Point) -> Self {
        EvalPoint {
            point,
            evals: HashMap::new(),
            tag: None,
            thread_origin: None,
            num_evals: 0,
            point_from: None,
            gen_step: Vec::new(),
            direction: None,
            angle: None,
        }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Assigns a tag on first access so points that are constructed but
    /// never actually queued never consume an id.
    pub fn tag(&mut self) -> u64 {
        *self.tag.get_or_insert_with(|| NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    pub fn tag_if_assigned(&self) -> Option<u64> {
        self.tag
    }

    pub fn thread_origin(&self) -> Option<usize> {
        self.thread_origin
    }

    pub fn set_thread_origin(&mut self, thread: usize) {
        self.thread_origin = Some(thread);
    }

    pub fn num_evals(&self) -> u32 {
        self.num_evals
    }

    pub fn point_from(&self) -> Option<&Point> {
        self.point_from.as_ref()
    }

    pub fn set_point_from(&mut self, parent: Point) {
        self.point_from = Some(parent);
    }

    pub fn gen_step(&self) -> &[StepType] {
        &self.gen_step
    }

    pub fn push_gen_step(&mut self, step: StepType) {
        self.gen_step.push(step);
    }

    pub fn direction(&self) -> Option<&Direction> {
        self.direction.as_ref()
    }

    pub fn set_direction(&mut self, dir: Direction) {
        self.direction = Some(dir);
    }

    pub fn angle(&self) -> Option<Dbl> {
        self.angle
    }

    pub fn set_angle(&mut self, angle: Dbl) {
        self.angle = Some(angle);
    }

    pub fn eval(&self, kind: EvalKind) -> Option<&Eval> {
        self.evals.get(&kind)
    }

    pub fn has_eval(&self, kind: EvalKind) -> bool {
        self.evals.contains_key(&kind)
    }

    /// Installs a completed evaluation, bumping the evaluation counter.
    pub fn set_eval(&mut self, kind: EvalKind, eval: Eval) {
        self.num_evals += 1;
        self.evals.insert(kind, eval);
    }

    pub fn evals(&self) -> impl Iterator<Item = (&EvalKind, &Eval)> {
        self.evals.iter()
    }

    pub fn mark_all_stale(&mut self) {
        for eval in self.evals.values_mut() {
            eval.mark_stale();
        }
    }
}

/// Two EvalPoints compare equal iff their points are epsilon-equal and
/// every Eval present on one is present and equal on the other. Tag,
/// provenance, and thread origin are deliberately excluded: they describe
/// how a point was found, not what it evaluates to.
impl PartialEq for EvalPoint {
    fn eq(&self, other: &Self) -> bool {
        if !self.point.eq_eps(&other.point, crate::numeric::DEFAULT_EPSILON) {
            return false;
        }
        if self.evals.len() != other.evals.len() {
            return false;
        }
        self.evals
            .iter()
            .all(|(k, v)| other.evals.get(k).is_some_and(|ov| ov == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{BbOutputType, ComputeType, EvalStatus};

    #[test]
    fn tag_is_assigned_lazily_and_stable() {
        let mut ep = EvalPoint::new(Point::from_f64(&[1.0, 2.0]));
        assert!(ep.tag_if_assigned().is_none());
        let t1 = ep.tag();
        let t2 = ep.tag();
        assert_eq!(t1, t2);
    }

    #[test]
    fn equality_ignores_provenance() {
        let mut a = EvalPoint::new(Point::from_f64(&[1.0, 2.0]));
        let mut b = EvalPoint::new(Point::from_f64(&[1.0, 2.0]));
        a.push_gen_step(StepType::Poll);
        b.push_gen_step(StepType::Search);
        a.tag();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_requires_same_evals() {
        let mut a = EvalPoint::new(Point::from_f64(&[1.0, 2.0]));
        let b = EvalPoint::new(Point::from_f64(&[1.0, 2.0]));
        a.set_eval(
            EvalKind::Blackbox,
            Eval::new(EvalStatus::Ok, "1.0".into(), vec![BbOutputType::Obj], ComputeType::default()),
        );
        assert_ne!(a, b);
    }
}
