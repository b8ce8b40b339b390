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

//! The common `Step` capability set every phase of a mega-iteration
//! implements (start/run/end, stop-reason query), and the `IterationUtils`
//! mix-in those phases compose with rather than inherit from: snap-to-
//! bounds + project-to-mesh, enqueue-for-eval, and post-process.

use crate::barrier::{ProgressiveBarrier, SuccessType};
use crate::eval::EvalKind;
use crate::eval_point::{EvalPoint, StepType};
use crate::mesh::Mesh;
use crate::point::Point;
use crate::queue::EvaluatorControl;

/// Why a step (or the whole mega-iteration) stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    MaxBbEvalReached,
    MeshMinimumReached,
    StallIterationsReached,
    UserInterrupt,
    AlgoSpecific,
}

/// A set of simultaneously-active stop reasons. Several can hold at once
/// (e.g. the mesh bottoms out in the same iteration the budget runs out);
/// stop reasons bubble by explicit query, never by unwinding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReasons(Vec<StopReason>);

impl StopReasons {
    pub fn none() -> Self {
        StopReasons(Vec::new())
    }

    pub fn push(&mut self, reason: StopReason) {
        if !self.0.contains(&reason) {
            self.0.push(reason);
        }
    }

    pub fn contains(&self, reason: StopReason) -> bool {
        self.0.contains(&reason)
    }

    pub fn any(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn reasons(&self) -> &[StopReason] {
        &self.0
    }
}

/// The lifecycle every Search/Poll/Update phase implements. Each Step
/// holds a weak parent pointer in practice (the owning `MadsMegaIteration`
/// borrows it for the duration of its own `run`); this trait only
/// prescribes the three lifecycle calls and the stop-reason query.
pub trait Step {
    fn name(&self) -> &'static str;

    /// Prepares the step (e.g. resets per-call counters). Called once
    /// before `run`.
    fn start(&mut self) {}

    /// Does the step's work; returns `true` iff it generated at least one
    /// trial point.
    fn run(&mut self) -> bool;

    /// Releases anything the step held only for the duration of `run`.
    fn end(&mut self) {}

    fn stop_reasons(&self) -> &StopReasons;
}

/// Shared helpers composed into (not inherited by) a step that generates
/// trial points: snapping to the mesh and bounds, submitting to the
/// evaluator control, and folding evaluated points back into the barrier.
pub trait IterationUtils {
    fn mesh(&self) -> &Mesh;
    fn frame_center(&self) -> &Point;
    fn lower_bound(&self) -> &Point;
    fn upper_bound(&self) -> &Point;

    /// Projects `raw` onto the mesh around the frame center, then snaps
    /// into bounds, per the fixed project -> snap -> reproject order.
    fn snap_and_project(&self, raw: &Point) -> Point {
        let projected = self.mesh().project_on_mesh(raw, self.frame_center());
        let snapped = projected.snap_to_bounds(self.lower_bound(), self.upper_bound());
        if self.mesh().verify_on_mesh(&snapped, self.frame_center()) {
            snapped
        } else {
            self.mesh().project_on_mesh(&snapped, self.frame_center())
        }
    }

    fn enqueue_for_eval(
        &self,
        queue: &EvaluatorControl<'_>,
        point: Point,
        priority: i64,
        block_id: u64,
        main_thread: usize,
        step: StepType,
    ) {
        let mut ep = EvalPoint::new(point);
        ep.set_point_from(self.frame_center().clone());
        ep.push_gen_step(step);
        queue.enqueue(ep, priority, block_id, main_thread, step);
    }

    /// Folds a batch of evaluated points into the barrier, returning the
    /// iteration's [`SuccessType`].
    fn post_process(
        &self,
        barrier: &mut ProgressiveBarrier,
        evaluated: Vec<EvalPoint>,
        kind: EvalKind,
    ) -> SuccessType {
        barrier.update_with_points(&evaluated, kind, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reasons_dedupe_and_report_any() {
        let mut reasons = StopReasons::none();
        assert!(!reasons.any());
        reasons.push(StopReason::MeshMinimumReached);
        reasons.push(StopReason::MeshMinimumReached);
        assert_eq!(reasons.reasons().len(), 1);
        assert!(reasons.contains(StopReason::MeshMinimumReached));
    }
}
