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

//! COOP-MADS: `COOP_MADS_NB_PROBLEM` independent MADS instances run to
//! completion in parallel, one per OS thread, each with its own barrier,
//! mesh, and [`EvaluatorControl`], but all sharing one [`Cache`]. A
//! `CacheSearch` on every instance lets siblings observe each other's best
//! feasible point without re-evaluating it.
//!
//! Block evaluations are incompatible with this design (a block let one
//! instance's queue interleave a sibling's points); `NomadParameters`
//! validation already rejects `BB_MAX_BLOCK_SIZE != 1` when
//! `COOP_MADS_NB_PROBLEM` is set, and [`run_coop`] re-checks it as a
//! defensive assertion against being called on an unvalidated config.

use crate::barrier::ProgressiveBarrier;
use crate::blackbox::BlackboxEvaluator;
use crate::cache::Cache;
use crate::config::{ConfigError, NomadParameters};
use crate::eval::{ComputeType, EvalKind};
use crate::eval_point::{EvalPoint, StepType};
use crate::mads::search::{CacheSearch, NoSearch, SearchMethod};
use crate::mads::termination::TerminationCriteria;
use crate::mads::MadsMegaIteration;
use crate::mesh::Mesh;
use crate::numeric::Dbl;
use crate::point::Point;
use crate::queue::EvaluatorControl;

/// One COOP-MADS sibling's outcome, returned once its worker thread
/// joins.
#[derive(Debug)]
pub struct CoopResult {
    pub problem_index: usize,
    pub barrier: ProgressiveBarrier,
    pub iterations_run: u64,
}

/// Runs every sibling to its own termination (mesh tolerance, stall
/// count, or `max_iterations`, whichever fires first) and returns one
/// [`CoopResult`] per instance. `cache` and `evaluator` are shared by
/// reference across every spawned thread; `evaluator` must tolerate
/// concurrent calls (required by [`BlackboxEvaluator`]'s `Send + Sync`
/// supertraits).
pub fn run_coop(
    params: &NomadParameters,
    cache: &Cache,
    evaluator: &dyn BlackboxEvaluator,
) -> Result<Vec<CoopResult>, ConfigError> {
    if params.bb_max_block_size != 1 {
        return Err(ConfigError::CoopRequiresBlockSizeOne(params.bb_max_block_size));
    }
    let nb_problems = params.coop_mads_nb_problem.map(|n| n as usize).unwrap_or_else(num_cpus::get).max(1);

    let dim = params.dimension;
    let lower_bound = params.lower_bound.clone().unwrap_or_else(|| Point::undefined(dim));
    let upper_bound = params.upper_bound.clone().unwrap_or_else(|| Point::undefined(dim));
    let x0 = params.x0.first().cloned().unwrap_or_else(|| Point::undefined(dim));
    let bb_output_types = params.bb_output_type.clone();
    let compute_type = ComputeType::default();
    let h_max_0 = Dbl::new(params.h_max_0);
    let termination = TerminationCriteria {
        max_bb_eval: params.max_bb_eval,
        min_mesh_size: vec![Dbl::new(1e-13); dim],
        max_stall_iterations: None,
    };
    let max_iterations = params.max_iterations.unwrap_or(u64::MAX);

    let results = std::thread::scope(|s| {
        let handles: Vec<_> = (0..nb_problems)
            .map(|i| {
                let lower_bound = lower_bound.clone();
                let upper_bound = upper_bound.clone();
                let x0 = x0.clone();
                let bb_output_types = bb_output_types.clone();
                let termination = termination.clone();
                s.spawn(move || {
                    let queue = EvaluatorControl::new(
                        1,
                        cache,
                        evaluator,
                        bb_output_types,
                        compute_type,
                        params.max_bb_eval,
                    );

                    cache.smart_insert(&x0, 1, EvalKind::Blackbox);
                    queue.enqueue(EvalPoint::new(x0.clone()), 0, 0, i, StepType::Initial);
                    queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
                    let seeded = queue.drain_evaluated();
                    let barrier = ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, h_max_0);

                    let mesh = Mesh::new(dim, vec![Dbl::new(1.0); dim], vec![Dbl::new(0.0); dim]);
                    let search_methods: Vec<Box<dyn SearchMethod>> = vec![
                        Box::new(CacheSearch::new(cache, EvalKind::Blackbox)),
                        Box::new(NoSearch),
                    ];

                    let mut mega = MadsMegaIteration::new(
                        x0,
                        barrier,
                        mesh,
                        &queue,
                        lower_bound,
                        upper_bound,
                        search_methods,
                        i,
                        termination,
                    );

                    let mut iterations_run = 0;
                    while iterations_run < max_iterations && !mega.should_stop() {
                        mega.run_iteration();
                        iterations_run += 1;
                    }

                    CoopResult {
                        problem_index: i,
                        barrier: mega.into_barrier(),
                        iterations_run,
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("COOP-MADS worker panicked")).collect()
    });

    Ok(results)
}
