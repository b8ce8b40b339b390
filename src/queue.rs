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

//! The bounded, prioritized dispatch of trial points to a pool of worker
//! threads. One `EvaluatorControl` is shared by every concurrent algorithm
//! instance in a run; `start_evaluation` is the blocking call a
//! `MadsMegaIteration` makes once it has finished generating a batch of
//! trial points.

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;
use parking_lot::{Condvar, Mutex};
use tracing::{info, trace};

use crate::barrier::{classify_success, SuccessType};
use crate::blackbox::{eval_from_outcome, BlackboxEvaluator};
use crate::cache::Cache;
use crate::eval::{BbOutputType, ComputeType, EvalKind};
use crate::eval_point::{EvalPoint, StepType};
use crate::numeric::Dbl;

/// A trial point together with the bookkeeping the queue needs to
/// dispatch, dedupe, and attribute it.
pub struct EvalQueuePoint {
    pub eval_point: EvalPoint,
    pub priority: i64,
    pub block_id: u64,
    pub submitting_main_thread: usize,
    pub submitting_step: StepType,
}

struct ByPriority;
impl Compare<EvalQueuePoint> for ByPriority {
    fn compare(&self, l: &EvalQueuePoint, r: &EvalQueuePoint) -> Ordering {
        l.priority.cmp(&r.priority)
    }
}

/// What a worker got back from asking the queue for work.
enum WorkLoad {
    Complete,
    Aborted,
    Starvation,
    Item(EvalQueuePoint),
}

struct Critical {
    queue: BinaryHeap<EvalQueuePoint, ByPriority>,
    evaluated: Vec<EvalPoint>,
    in_flight: usize,
    bb_eval_count: u32,
    stop_requested: bool,
}

struct Shared<'a> {
    cache: &'a Cache,
    evaluator: &'a dyn BlackboxEvaluator,
    bb_output_types: Vec<BbOutputType>,
    compute_type: ComputeType,
    max_bb_eval: Option<u32>,
    kind: EvalKind,
    critical: Mutex<Critical>,
    monitor: Condvar,
}

/// Dispatches [`EvalQueuePoint`]s onto a scoped pool of worker threads,
/// deduplicating against the shared cache and stopping opportunistically
/// once a sufficiently good point is found.
pub struct EvaluatorControl<'a> {
    nb_workers: usize,
    shared: Shared<'a>,
}

impl<'a> EvaluatorControl<'a> {
    pub fn new(
        nb_workers: usize,
        cache: &'a Cache,
        evaluator: &'a dyn BlackboxEvaluator,
        bb_output_types: Vec<BbOutputType>,
        compute_type: ComputeType,
        max_bb_eval: Option<u32>,
    ) -> Self {
        EvaluatorControl {
            nb_workers: nb_workers.max(1),
            shared: Shared {
                cache,
                evaluator,
                bb_output_types,
                compute_type,
                max_bb_eval,
                kind: EvalKind::Blackbox,
                critical: Mutex::new(Critical {
                    queue: BinaryHeap::from_vec_cmp(Vec::new(), ByPriority),
                    evaluated: Vec::new(),
                    in_flight: 0,
                    bb_eval_count: 0,
                    stop_requested: false,
                }),
                monitor: Condvar::new(),
            },
        }
    }

    /// Submits a point for evaluation. A point already resolved in the
    /// cache is not requeued: it is copied straight into the "evaluated"
    /// batch the next `start_evaluation` call will drain.
    pub fn enqueue(&self, point: EvalPoint, priority: i64, block_id: u64, main_thread: usize, step: StepType) {
        if let Some(cached) = self.shared.cache.find(point.point()) {
            if cached.eval(self.shared.kind).is_some() {
                trace!("cache hit at enqueue time, skipping dispatch");
                self.shared.critical.lock().evaluated.push(cached);
                return;
            }
        }
        let eqp = EvalQueuePoint {
            eval_point: point,
            priority,
            block_id,
            submitting_main_thread: main_thread,
            submitting_step: step,
        };
        self.shared.critical.lock().queue.push(eqp);
        self.shared.monitor.notify_all();
    }

    pub fn queue_len(&self) -> usize {
        self.shared.critical.lock().queue.len()
    }

    /// Drains every point evaluated (or cache-deduplicated) since the last
    /// drain. Call this after `start_evaluation` returns to feed the
    /// barrier.
    pub fn drain_evaluated(&self) -> Vec<EvalPoint> {
        std::mem::take(&mut self.shared.critical.lock().evaluated)
    }

    fn get_workload(shared: &Shared<'a>) -> WorkLoad {
        let mut critical = shared.critical.lock();
        if critical.stop_requested {
            return WorkLoad::Aborted;
        }
        if let Some(item) = critical.queue.pop() {
            critical.in_flight += 1;
            return WorkLoad::Item(item);
        }
        if critical.in_flight == 0 {
            return WorkLoad::Complete;
        }
        shared.monitor.wait(&mut critical);
        WorkLoad::Starvation
    }

    fn process_one(
        shared: &Shared<'a>,
        eqp: EvalQueuePoint,
        reference_f: Dbl,
        reference_h: Dbl,
        h_max: Dbl,
        opportunistic: bool,
    ) {
        let outcome = shared.evaluator.evaluate(eqp.eval_point.point());
        let eval = eval_from_outcome(outcome, shared.bb_output_types.clone(), shared.compute_type);
        shared.cache.update(eqp.eval_point.point(), shared.kind, eval.clone());

        let mut completed = eqp.eval_point;
        completed.set_eval(shared.kind, eval.clone());
        completed.push_gen_step(eqp.submitting_step);

        let success = classify_success(eval.f(), eval.h(), reference_f, reference_h, h_max);

        let mut critical = shared.critical.lock();
        critical.evaluated.push(completed);
        critical.in_flight -= 1;
        critical.bb_eval_count += 1;
        let budget_exhausted = shared
            .max_bb_eval
            .is_some_and(|max| critical.bb_eval_count >= max);
        if budget_exhausted || (opportunistic && success.incumbent_changed()) {
            critical.stop_requested = true;
            critical.queue.clear();
        }
        shared.monitor.notify_all();
    }

    /// Blocks the calling (main) thread until the queue drains, the
    /// blackbox-call budget is exhausted, or (when `opportunistic` is set)
    /// a partial success or better is observed against
    /// `(reference_f, reference_h)` under `h_max`. Returns the best
    /// [`SuccessType`] observed among the points this call evaluated.
    pub fn start_evaluation(
        &self,
        reference_f: Dbl,
        reference_h: Dbl,
        h_max: Dbl,
        opportunistic: bool,
    ) -> SuccessType {
        info!(nb_workers = self.nb_workers, "starting evaluation block");
        let shared = &self.shared;
        std::thread::scope(|s| {
            for _ in 0..self.nb_workers {
                s.spawn(move || loop {
                    match Self::get_workload(shared) {
                        WorkLoad::Complete | WorkLoad::Aborted => break,
                        WorkLoad::Starvation => continue,
                        WorkLoad::Item(eqp) => {
                            Self::process_one(shared, eqp, reference_f, reference_h, h_max, opportunistic);
                        }
                    }
                });
            }
        });

        self.shared.critical.lock().stop_requested = false;

        self.shared
            .critical
            .lock()
            .evaluated
            .iter()
            .filter_map(|ep| ep.eval(self.shared.kind))
            .map(|eval| classify_success(eval.f(), eval.h(), reference_f, reference_h, h_max))
            .fold(SuccessType::Unsuccessful, SuccessType::combine)
    }

    pub fn bb_eval_count(&self) -> u32 {
        self.shared.critical.lock().bb_eval_count
    }
}
