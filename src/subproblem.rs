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

//! Bidirectional mapping between the full-dimension problem and a
//! fixed-variable subspace. PSD-MADS and SSD-MADS run their MADS instances
//! entirely in subspace coordinates; this manager is the only place that
//! crosses back to full space, which is what the [`crate::cache::Cache`]
//! and [`crate::barrier::ProgressiveBarrier`] actually store.

use crate::blackbox::{BlackboxEvaluator, BlackboxOutcome};
use crate::eval_point::EvalPoint;
use crate::point::{FixedVariableMask, Point};

/// Owns one fixed-variable mask and converts points/eval-points across the
/// full-space <-> subspace boundary on its behalf.
pub struct SubproblemManager {
    mask: FixedVariableMask,
}

impl SubproblemManager {
    pub fn new(mask: FixedVariableMask) -> Self {
        SubproblemManager { mask }
    }

    pub fn full_dim(&self) -> usize {
        self.mask.dim()
    }

    pub fn sub_dim(&self) -> usize {
        self.mask.nb_free()
    }

    pub fn mask(&self) -> &FixedVariableMask {
        &self.mask
    }

    pub fn to_sub(&self, full: &Point) -> Point {
        self.mask.to_sub(full)
    }

    pub fn to_full(&self, sub: &Point) -> Point {
        self.mask.to_full(sub)
    }

    /// Lifts a subspace eval point to full space, carrying its evaluation
    /// history and provenance fields across; used when a subproblem worker
    /// hands a trial point back to the cache.
    pub fn lift_eval_point(&self, sub_ep: &EvalPoint) -> EvalPoint {
        let mut full = EvalPoint::new(self.to_full(sub_ep.point()));
        for (kind, eval) in sub_ep.evals() {
            full.set_eval(*kind, eval.clone());
        }
        if let Some(parent) = sub_ep.point_from() {
            full.set_point_from(self.to_full(parent));
        }
        if let Some(dir) = sub_ep.direction() {
            full.set_direction(dir.clone());
        }
        if let Some(angle) = sub_ep.angle() {
            full.set_angle(angle);
        }
        for step in sub_ep.gen_step() {
            full.push_gen_step(*step);
        }
        full
    }

    /// Projects a full-space eval point down to subspace, e.g. a cache hit
    /// a subproblem worker wants to reuse without re-evaluating.
    pub fn project_eval_point(&self, full_ep: &EvalPoint) -> EvalPoint {
        let mut sub = EvalPoint::new(self.to_sub(full_ep.point()));
        for (kind, eval) in full_ep.evals() {
            sub.set_eval(*kind, eval.clone());
        }
        sub
    }
}

/// Wraps a full-space [`BlackboxEvaluator`] so a subproblem's
/// [`crate::queue::EvaluatorControl`] can dispatch subspace trial points
/// directly to it: every call lifts its argument to full space via `mask`
/// before handing it to `inner`.
pub struct SubspaceEvaluator<'a> {
    mask: FixedVariableMask,
    inner: &'a dyn BlackboxEvaluator,
}

impl<'a> SubspaceEvaluator<'a> {
    pub fn new(mask: FixedVariableMask, inner: &'a dyn BlackboxEvaluator) -> Self {
        SubspaceEvaluator { mask, inner }
    }
}

impl<'a> BlackboxEvaluator for SubspaceEvaluator<'a> {
    fn evaluate(&self, point: &Point) -> BlackboxOutcome {
        self.inner.evaluate(&self.mask.to_full(point))
    }
}
