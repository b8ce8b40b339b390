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

//! PSD-MADS: a "pollster" main thread runs full MADS polling along one
//! randomly chosen direction per mega-iteration, while the remaining main
//! threads each run MADS on a subproblem: a randomly picked subset of the
//! free variables, the rest fixed at the pollster's current best point. A
//! [`CoverageCounter`] tracks which full-space variables subproblems have
//! addressed since the last mesh update; the pollster's mesh is enlarged or
//! refined only once coverage crosses a threshold (or a subproblem reports
//! [`SuccessType::FullSuccess`] outright), and resets on every such update.

use crate::barrier::{ProgressiveBarrier, SuccessType};
use crate::blackbox::BlackboxEvaluator;
use crate::cache::Cache;
use crate::config::{ConfigError, NomadParameters};
use crate::eval::{ComputeType, EvalKind};
use crate::eval_point::{EvalPoint, StepType};
use crate::mads::search::{NoSearch, SearchMethod};
use crate::mads::termination::TerminationCriteria;
use crate::mads::{poll, MadsMegaIteration};
use crate::mesh::Mesh;
use crate::numeric::Dbl;
use crate::parallel::CoverageCounter;
use crate::point::{FixedVariableMask, Point};
use crate::queue::EvaluatorControl;
use crate::rng::SplitMix64;
use crate::subproblem::{SubproblemManager, SubspaceEvaluator};

/// The pollster's final state once `run_psd` stops.
#[derive(Debug)]
pub struct PsdResult {
    pub barrier: ProgressiveBarrier,
    pub iterations_run: u64,
    pub coverage_at_stop: usize,
}

fn seed_barrier_and_cache(
    cache: &Cache,
    queue: &EvaluatorControl<'_>,
    x0: &Point,
    main_thread: usize,
    h_max0: Dbl,
) -> ProgressiveBarrier {
    cache.smart_insert(x0, 1, EvalKind::Blackbox);
    queue.enqueue(EvalPoint::new(x0.clone()), 0, 0, main_thread, StepType::Initial);
    queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
    let seeded = queue.drain_evaluated();
    ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, h_max0)
}

/// Runs the pollster/subproblem loop until the pollster's own termination
/// criteria fire or `max_iterations` mega-rounds have elapsed. `seed`
/// drives every random subproblem split; the same `seed` reproduces the
/// same split sequence.
pub fn run_psd(
    params: &NomadParameters,
    cache: &Cache,
    evaluator: &dyn BlackboxEvaluator,
    seed: u64,
) -> Result<PsdResult, ConfigError> {
    let dim = params.dimension;
    let nb_var = params.psd_mads_nb_var_in_subproblem.unwrap_or(dim);
    if nb_var == 0 || nb_var > dim {
        return Err(ConfigError::InvalidSubproblemSize(nb_var, dim));
    }
    let nb_subproblems = params.psd_mads_nb_subproblem.map(|n| n as usize).unwrap_or_else(num_cpus::get).max(1);
    let coverage_threshold = dim;

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

    let pollster_queue = EvaluatorControl::new(1, cache, evaluator, bb_output_types.clone(), compute_type, params.max_bb_eval);
    let pollster_barrier = seed_barrier_and_cache(cache, &pollster_queue, &x0, 0, h_max_0);
    let pollster_mesh = Mesh::new(dim, vec![Dbl::new(1.0); dim], vec![Dbl::new(0.0); dim]);
    let search_methods: Vec<Box<dyn SearchMethod>> = vec![Box::new(NoSearch)];
    let mut pollster = MadsMegaIteration::new(
        x0,
        pollster_barrier,
        pollster_mesh,
        &pollster_queue,
        lower_bound.clone(),
        upper_bound.clone(),
        search_methods,
        0,
        termination.clone(),
    );

    let coverage = CoverageCounter::new(dim);
    let mut rng = SplitMix64::new(seed);
    let mut iterations_run = 0u64;

    while iterations_run < max_iterations && !pollster.should_stop() {
        pollster.refresh_for_iteration();
        let directions = poll::two_n_directions(pollster.mesh().big_delta());
        let chosen_idx = rng.choose_one(directions.len());
        let chosen = directions.into_iter().nth(chosen_idx).expect("chosen_idx is in range");
        pollster.search_and_poll(vec![chosen]);

        let fixed_point = pollster
            .barrier()
            .x_inc_feas()
            .cloned()
            .or_else(|| pollster.barrier().x_inc_inf().first().cloned())
            .map(|ep| ep.point().clone())
            .unwrap_or_else(|| Point::undefined(dim));

        let sub_seeds: Vec<u64> = (0..nb_subproblems).map(|_| rng.next_u64()).collect();

        let results: Vec<(Vec<usize>, SuccessType, FixedVariableMask, ProgressiveBarrier)> = std::thread::scope(|s| {
            let handles: Vec<_> = sub_seeds
                .iter()
                .enumerate()
                .map(|(j, &sub_seed)| {
                    let fixed_point = fixed_point.clone();
                    let lower_bound = lower_bound.clone();
                    let upper_bound = upper_bound.clone();
                    let bb_output_types = bb_output_types.clone();
                    let termination = termination.clone();
                    s.spawn(move || {
                        let mut sub_rng = SplitMix64::new(sub_seed);
                        let free_indices = sub_rng.choose_indices(dim, nb_var);

                        let mut mask_point = fixed_point.clone();
                        for &i in &free_indices {
                            mask_point.set(i, Dbl::UNDEFINED);
                        }
                        let mask = FixedVariableMask::new(mask_point);
                        let manager = SubproblemManager::new(mask.clone());
                        let sub_dim = manager.sub_dim();

                        let wrapped = SubspaceEvaluator::new(mask.clone(), evaluator);
                        let sub_cache = Cache::new(sub_dim, 1e-13);
                        let sub_queue = EvaluatorControl::new(1, &sub_cache, &wrapped, bb_output_types, compute_type, None);

                        let sub_x0 = manager.to_sub(&fixed_point);
                        let sub_barrier = seed_barrier_and_cache(&sub_cache, &sub_queue, &sub_x0, j + 1, Dbl::POS_INF);
                        let sub_mesh = Mesh::new(sub_dim, vec![Dbl::new(1.0); sub_dim], vec![Dbl::new(0.0); sub_dim]);
                        let sub_lb = manager.to_sub(&lower_bound);
                        let sub_ub = manager.to_sub(&upper_bound);

                        let mut sub_mega = MadsMegaIteration::new(
                            sub_x0,
                            sub_barrier,
                            sub_mesh,
                            &sub_queue,
                            sub_lb,
                            sub_ub,
                            vec![Box::new(NoSearch)],
                            j + 1,
                            termination,
                        );
                        let success = sub_mega.run_iteration();

                        (free_indices, success, mask, sub_mega.into_barrier())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("PSD-MADS subproblem worker panicked")).collect()
        });

        let mut any_full_success = false;
        for (free_indices, success, mask, sub_barrier) in &results {
            coverage.mark(free_indices);
            if *success == SuccessType::FullSuccess {
                any_full_success = true;
            }
            if success.incumbent_changed() {
                let manager = SubproblemManager::new(mask.clone());
                if let Some(improved) = sub_barrier.x_inc_feas().or_else(|| sub_barrier.x_inc_inf().first()) {
                    let lifted = manager.lift_eval_point(improved);
                    pollster.absorb_external_point(lifted);
                }
            }
        }

        if any_full_success || coverage.threshold_crossed(coverage_threshold) {
            pollster.apply_mesh_update();
            coverage.reset();
        }

        iterations_run += 1;
    }

    Ok(PsdResult {
        iterations_run,
        coverage_at_stop: coverage.count(),
        barrier: pollster.into_barrier(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackbox::{BlackboxOutcome, ClosureEvaluator};
    use crate::config::NomadParametersBuilder;

    fn separable_quadratic(dim: usize) -> ClosureEvaluator<impl Fn(&Point) -> BlackboxOutcome> {
        ClosureEvaluator(move |p: &Point| {
            assert_eq!(p.dim(), dim);
            let f: f64 = (0..dim).map(|i| p.get(i).raw().powi(2)).sum();
            BlackboxOutcome { raw_outputs: format!("{f}"), exit_ok: true }
        })
    }

    #[test]
    fn zero_var_in_subproblem_is_rejected() {
        let mut params = NomadParametersBuilder::default()
            .dimension(4)
            .x0(vec![Point::from_f64(&[1.0; 4])])
            .psd_mads_nb_subproblem(Some(2))
            .psd_mads_nb_var_in_subproblem(Some(2))
            .build()
            .unwrap();
        params.psd_mads_nb_var_in_subproblem = Some(0);

        let cache = Cache::new(4, 1e-13);
        let evaluator = separable_quadratic(4);
        let err = run_psd(&params, &cache, &evaluator, 7).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSubproblemSize(0, 4));
    }

    #[test]
    fn pollster_and_subproblems_drive_the_incumbent_down() {
        let params = NomadParametersBuilder::default()
            .dimension(6)
            .x0(vec![Point::from_f64(&[4.0; 6])])
            .psd_mads_nb_subproblem(Some(3))
            .psd_mads_nb_var_in_subproblem(Some(2))
            .max_bb_eval(Some(300))
            .build()
            .unwrap();
        let cache = Cache::new(6, 1e-13);
        let evaluator = separable_quadratic(6);
        let result = run_psd(&params, &cache, &evaluator, 1234).unwrap();

        let start_f: f64 = (0..6).map(|_| 4.0_f64.powi(2)).sum();
        let final_f = result.barrier.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f().raw();
        assert!(final_f < start_f);
        assert!(result.iterations_run > 0);
    }
}
