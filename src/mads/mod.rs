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

//! One MADS instance's Update -> Search -> Poll -> Post-processing loop.
//! A `MadsMegaIteration` owns the per-instance state (iteration counter,
//! barrier, mesh); the [`crate::queue::EvaluatorControl`] and
//! [`crate::cache::Cache`] it drives are shared with every other
//! concurrent instance.

pub mod poll;
pub mod search;
pub mod termination;
pub mod update;

use tracing::info;

use crate::barrier::{ProgressiveBarrier, SuccessType};
use crate::eval::EvalKind;
use crate::eval_point::StepType;
use crate::mesh::Mesh;
use crate::point::{Direction, Point};
use crate::queue::EvaluatorControl;
use crate::step::{IterationUtils, StopReasons};

use search::SearchMethod;
use termination::{TerminationCriteria, TerminationState};

/// Drives one MADS instance's iterations against a shared cache/queue.
pub struct MadsMegaIteration<'a> {
    k: u64,
    barrier: ProgressiveBarrier,
    mesh: Mesh,
    queue: &'a EvaluatorControl<'a>,
    lower_bound: Point,
    upper_bound: Point,
    frame_center: Point,
    search_methods: Vec<Box<dyn SearchMethod + 'a>>,
    main_thread: usize,
    next_block_id: u64,
    kind: EvalKind,
    termination: TerminationCriteria,
    term_state: TerminationState,
    last_success: SuccessType,
    last_direction: Option<Direction>,
    stop_reasons: StopReasons,
}

impl<'a> MadsMegaIteration<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x0: Point,
        barrier: ProgressiveBarrier,
        mesh: Mesh,
        queue: &'a EvaluatorControl<'a>,
        lower_bound: Point,
        upper_bound: Point,
        search_methods: Vec<Box<dyn SearchMethod + 'a>>,
        main_thread: usize,
        termination: TerminationCriteria,
    ) -> Self {
        MadsMegaIteration {
            k: 0,
            barrier,
            mesh,
            queue,
            lower_bound,
            upper_bound,
            frame_center: x0,
            search_methods,
            main_thread,
            next_block_id: 0,
            kind: EvalKind::Blackbox,
            termination,
            term_state: TerminationState::default(),
            last_success: SuccessType::Unsuccessful,
            last_direction: None,
            stop_reasons: StopReasons::none(),
        }
    }

    pub fn k(&self) -> u64 {
        self.k
    }

    pub fn barrier(&self) -> &ProgressiveBarrier {
        &self.barrier
    }

    /// Consumes the iteration, handing back its final barrier (e.g. to
    /// lift a subproblem's result into an outer barrier, or to collect a
    /// COOP-MADS sibling's outcome once its worker thread joins).
    pub fn into_barrier(self) -> ProgressiveBarrier {
        self.barrier
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn stop_reasons(&self) -> &StopReasons {
        &self.stop_reasons
    }

    fn refresh_frame_center(&mut self) {
        if let Some(ep) = self.barrier.x_inc_feas() {
            self.frame_center = ep.point().clone();
        } else if let Some(ep) = self.barrier.x_inc_inf().first() {
            self.frame_center = ep.point().clone();
        }
    }

    fn next_block_id(&mut self) -> u64 {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }

    fn submit_and_evaluate(&mut self, raw_points: Vec<Point>, step: StepType) -> SuccessType {
        if raw_points.is_empty() {
            return SuccessType::Unsuccessful;
        }
        let block_id = self.next_block_id();
        let (reference_f, reference_h) = self.barrier.reference_f_h(self.kind);
        for raw in &raw_points {
            let candidate = self.snap_and_project(raw);
            if !candidate.is_within_bounds(&self.lower_bound, &self.upper_bound) {
                continue;
            }
            self.enqueue_for_eval(self.queue, candidate, 0, block_id, self.main_thread, step);
        }
        self.queue
            .start_evaluation(reference_f, reference_h, self.barrier.h_max(), true)
    }

    /// Enlarges or refines the mesh from the previous call's outcome. A
    /// no-op on the very first iteration (there is no previous outcome
    /// yet). Split out from [`MadsMegaIteration::begin_iteration`] so a
    /// pollster can gate mesh updates on its own policy (PSD-MADS's
    /// coverage threshold) instead of taking one every call.
    pub fn apply_mesh_update(&mut self) {
        if self.k > 0 {
            update::apply(&mut self.mesh, self.last_success, self.last_direction.as_ref());
        }
    }

    /// Refreshes the frame center from the current incumbents and
    /// snapshots them as the next round's reference, without touching the
    /// mesh.
    pub fn refresh_for_iteration(&mut self) {
        self.refresh_frame_center();
        self.barrier.update_ref_bests();
    }

    /// The sequential/COOP prologue: mesh update, then frame-center
    /// refresh. PSD-MADS's pollster calls the two halves separately
    /// instead.
    pub fn begin_iteration(&mut self) {
        self.apply_mesh_update();
        self.refresh_for_iteration();
    }

    /// Runs Search, then Poll along `directions` (skipped if Search
    /// already reached full success), post-processes the barrier, and
    /// advances `k`. Call after [`MadsMegaIteration::begin_iteration`] (or
    /// its two halves).
    pub fn search_and_poll(&mut self, directions: Vec<Direction>) -> SuccessType {
        let mut evaluated = Vec::new();

        let mut search_success = SuccessType::Unsuccessful;
        for i in 0..self.search_methods.len() {
            let points = self.search_methods[i].generate(&self.frame_center);
            if points.is_empty() {
                continue;
            }
            let block_id = self.next_block_id();
            let (reference_f, reference_h) = self.barrier.reference_f_h(self.kind);
            for raw in &points {
                let candidate = self.snap_and_project(raw);
                if !candidate.is_within_bounds(&self.lower_bound, &self.upper_bound) {
                    continue;
                }
                self.enqueue_for_eval(self.queue, candidate, 1, block_id, self.main_thread, StepType::Search);
            }
            search_success = self
                .queue
                .start_evaluation(reference_f, reference_h, self.barrier.h_max(), true);
            evaluated.extend(self.queue.drain_evaluated());
            if search_success == SuccessType::FullSuccess {
                break;
            }
        }

        let mut last_direction = None;
        if search_success != SuccessType::FullSuccess && !directions.is_empty() {
            let raw_points: Vec<Point> = directions
                .iter()
                .map(|dir| self.frame_center.translate(dir))
                .collect();
            let poll_success = self.submit_and_evaluate(raw_points, StepType::Poll);
            evaluated.extend(self.queue.drain_evaluated());
            if poll_success.incumbent_changed() {
                last_direction = directions.into_iter().next();
            }
        }

        let overall = self.barrier.update_with_points(&evaluated, self.kind, true);
        self.last_success = overall;
        self.last_direction = last_direction;
        self.term_state.record_iteration(overall);

        info!(k = self.k, ?overall, "mega-iteration completed");

        self.stop_reasons = termination::check(
            &self.termination,
            &self.term_state,
            &self.mesh,
            self.queue.bb_eval_count(),
            None,
        );

        self.k += 1;
        overall
    }

    /// [`MadsMegaIteration::begin_iteration`] followed by
    /// [`MadsMegaIteration::search_and_poll`] along `directions`.
    pub fn run_iteration_with_directions(&mut self, directions: Vec<Direction>) -> SuccessType {
        self.begin_iteration();
        self.search_and_poll(directions)
    }

    /// Runs exactly one mega-iteration against the full positive spanning
    /// set of poll directions: Update, Search, Poll, post-processing.
    pub fn run_iteration(&mut self) -> SuccessType {
        let directions = poll::two_n_directions(self.mesh.big_delta());
        self.run_iteration_with_directions(directions)
    }

    pub fn should_stop(&self) -> bool {
        self.stop_reasons.any()
    }

    /// Flags this instance to stop at the next [`MadsMegaIteration::search_and_poll`]
    /// call, surfaced via [`crate::step::StopReason::UserInterrupt`]. The
    /// caller (e.g. a signal handler or an outer orchestration loop) is
    /// responsible for calling this from outside the run loop; nothing in
    /// this crate raises it on its own.
    pub fn request_interrupt(&mut self) {
        self.term_state.interrupted = true;
    }

    /// Folds one externally-produced point (e.g. a PSD-MADS subproblem
    /// worker's improved incumbent, lifted to full space) straight into
    /// this instance's barrier, without going through Search/Poll/the
    /// evaluator control. Returns the resulting [`SuccessType`].
    pub fn absorb_external_point(&mut self, point: crate::eval_point::EvalPoint) -> SuccessType {
        self.barrier.update_with_points(&[point], self.kind, true)
    }
}

impl<'a> IterationUtils for MadsMegaIteration<'a> {
    fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    fn frame_center(&self) -> &Point {
        &self.frame_center
    }

    fn lower_bound(&self) -> &Point {
        &self.lower_bound
    }

    fn upper_bound(&self) -> &Point {
        &self.upper_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::ProgressiveBarrier;
    use crate::blackbox::{BlackboxOutcome, ClosureEvaluator};
    use crate::cache::Cache;
    use crate::eval::{BbOutputType, ComputeType};
    use crate::numeric::Dbl;
    use search::NoSearch;

    #[test]
    fn single_iteration_improves_on_a_simple_quadratic() {
        let cache = Cache::new(1, 1e-13);
        let evaluator = ClosureEvaluator(|p: &Point| {
            let x = p.get(0).raw();
            BlackboxOutcome { raw_outputs: format!("{}", x * x), exit_ok: true }
        });
        let queue = EvaluatorControl::new(2, &cache, &evaluator, vec![BbOutputType::Obj], ComputeType::default(), None);

        let x0 = Point::from_f64(&[3.0]);
        cache.smart_insert(&x0, 1, EvalKind::Blackbox);
        queue.enqueue(crate::eval_point::EvalPoint::new(x0.clone()), 0, 0, 0, StepType::Initial);
        queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
        let x0_evaluated = queue.drain_evaluated();
        let barrier = ProgressiveBarrier::from_points(x0_evaluated, EvalKind::Blackbox, Dbl::POS_INF);

        let mesh = Mesh::new(1, vec![Dbl::new(1.0)], vec![Dbl::new(0.0)]);
        let termination = TerminationCriteria {
            max_bb_eval: Some(50),
            min_mesh_size: vec![Dbl::new(1e-9)],
            max_stall_iterations: None,
        };
        let mut mega = MadsMegaIteration::new(
            x0,
            barrier,
            mesh,
            &queue,
            Point::from_f64(&[-10.0]),
            Point::from_f64(&[10.0]),
            vec![Box::new(NoSearch)],
            0,
            termination,
        );

        let first = mega.barrier().x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f();
        mega.run_iteration();
        let after = mega.barrier().x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f();
        assert!(after <= first);
    }

    #[test]
    fn requested_interrupt_stops_the_next_iteration() {
        let cache = Cache::new(1, 1e-13);
        let evaluator = ClosureEvaluator(|p: &Point| {
            let x = p.get(0).raw();
            BlackboxOutcome { raw_outputs: format!("{}", x * x), exit_ok: true }
        });
        let queue = EvaluatorControl::new(1, &cache, &evaluator, vec![BbOutputType::Obj], ComputeType::default(), None);

        let x0 = Point::from_f64(&[3.0]);
        cache.smart_insert(&x0, 1, EvalKind::Blackbox);
        queue.enqueue(crate::eval_point::EvalPoint::new(x0.clone()), 0, 0, 0, StepType::Initial);
        queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
        let barrier = ProgressiveBarrier::from_points(queue.drain_evaluated(), EvalKind::Blackbox, Dbl::POS_INF);

        let mesh = Mesh::new(1, vec![Dbl::new(1.0)], vec![Dbl::new(0.0)]);
        let termination = TerminationCriteria {
            max_bb_eval: None,
            min_mesh_size: vec![Dbl::new(1e-12)],
            max_stall_iterations: None,
        };
        let mut mega = MadsMegaIteration::new(
            x0,
            barrier,
            mesh,
            &queue,
            Point::from_f64(&[-10.0]),
            Point::from_f64(&[10.0]),
            vec![Box::new(NoSearch)],
            0,
            termination,
        );

        assert!(!mega.should_stop());
        mega.request_interrupt();
        mega.run_iteration();
        assert!(mega.should_stop());
        assert!(mega.stop_reasons().contains(crate::step::StopReason::UserInterrupt));
    }
}
