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

//! SSD-MADS: one full pollster mega-iteration, followed by `N` subproblem
//! MADS runs over random free-variable subsets, run one after another
//! (never concurrently, unlike PSD). Each subproblem's mesh takes the
//! pollster's current frame size as its *minimum* frame, so a subproblem
//! never searches finer than the main optimization already has. The sweep
//! stops early the moment a subproblem reports
//! [`SuccessType::FullSuccess`]; the remaining subproblems that round are
//! skipped.

use crate::barrier::{ProgressiveBarrier, SuccessType};
use crate::blackbox::BlackboxEvaluator;
use crate::cache::Cache;
use crate::config::{ConfigError, NomadParameters};
use crate::eval::{ComputeType, EvalKind};
use crate::eval_point::{EvalPoint, StepType};
use crate::mads::search::{NoSearch, SearchMethod};
use crate::mads::termination::TerminationCriteria;
use crate::mads::MadsMegaIteration;
use crate::mesh::Mesh;
use crate::numeric::Dbl;
use crate::point::{FixedVariableMask, Point};
use crate::queue::EvaluatorControl;
use crate::rng::SplitMix64;
use crate::subproblem::{SubproblemManager, SubspaceEvaluator};

/// The pollster's final state once `run_ssd` stops.
#[derive(Debug)]
pub struct SsdResult {
    pub barrier: ProgressiveBarrier,
    pub iterations_run: u64,
}

fn seed_barrier(cache: &Cache, queue: &EvaluatorControl<'_>, x0: &Point, main_thread: usize, h_max0: Dbl) -> ProgressiveBarrier {
    cache.smart_insert(x0, 1, EvalKind::Blackbox);
    queue.enqueue(EvalPoint::new(x0.clone()), 0, 0, main_thread, StepType::Initial);
    queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
    let seeded = queue.drain_evaluated();
    ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, h_max0)
}

/// Runs the pollster-then-sweep loop until the pollster's own termination
/// criteria fire or `max_iterations` mega-rounds have elapsed.
pub fn run_ssd(
    params: &NomadParameters,
    cache: &Cache,
    evaluator: &dyn BlackboxEvaluator,
    seed: u64,
) -> Result<SsdResult, ConfigError> {
    let dim = params.dimension;
    let nb_var = params.ssd_mads_nb_var_in_subproblem.unwrap_or(dim);
    if nb_var == 0 || nb_var > dim {
        return Err(ConfigError::InvalidSubproblemSize(nb_var, dim));
    }
    let nb_subproblems = params.ssd_mads_nb_subproblem.map(|n| n as usize).unwrap_or_else(num_cpus::get).max(1);

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
    let pollster_barrier = seed_barrier(cache, &pollster_queue, &x0, 0, h_max_0);
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

    let mut rng = SplitMix64::new(seed);
    let mut iterations_run = 0u64;

    while iterations_run < max_iterations && !pollster.should_stop() {
        pollster.run_iteration();

        let fixed_point = pollster
            .barrier()
            .x_inc_feas()
            .cloned()
            .or_else(|| pollster.barrier().x_inc_inf().first().cloned())
            .map(|ep| ep.point().clone())
            .unwrap_or_else(|| Point::undefined(dim));
        let main_frame = pollster.mesh().big_delta().to_vec();

        for j in 0..nb_subproblems {
            let free_indices = rng.choose_indices(dim, nb_var);
            let mut mask_point = fixed_point.clone();
            for &i in &free_indices {
                mask_point.set(i, Dbl::UNDEFINED);
            }
            let mask = FixedVariableMask::new(mask_point);
            let manager = SubproblemManager::new(mask.clone());
            let sub_dim = manager.sub_dim();

            let wrapped = SubspaceEvaluator::new(mask.clone(), evaluator);
            let sub_cache = Cache::new(sub_dim, 1e-13);
            let sub_queue = EvaluatorControl::new(1, &sub_cache, &wrapped, bb_output_types.clone(), compute_type, None);

            let sub_x0 = manager.to_sub(&fixed_point);
            let sub_barrier = seed_barrier(&sub_cache, &sub_queue, &sub_x0, j + 1, Dbl::POS_INF);

            let mut sub_mesh = Mesh::new(sub_dim, vec![Dbl::new(1.0); sub_dim], vec![Dbl::new(0.0); sub_dim]);
            let sub_min_delta = manager.to_sub(&Point::new(main_frame.clone())).coords().to_vec();
            sub_mesh.set_min_delta(sub_min_delta);

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
                termination.clone(),
            );
            let success = sub_mega.run_iteration();

            if success.incumbent_changed() {
                if let Some(improved) = sub_mega.barrier().x_inc_feas().or_else(|| sub_mega.barrier().x_inc_inf().first()) {
                    let lifted = manager.lift_eval_point(improved);
                    pollster.absorb_external_point(lifted);
                }
            }
            if success == SuccessType::FullSuccess {
                break;
            }
        }

        iterations_run += 1;
    }

    Ok(SsdResult { iterations_run, barrier: pollster.into_barrier() })
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
    fn oversized_subproblem_is_rejected_before_any_eval() {
        let mut params = NomadParametersBuilder::default()
            .dimension(3)
            .x0(vec![Point::from_f64(&[1.0; 3])])
            .ssd_mads_nb_subproblem(Some(2))
            .build()
            .unwrap();
        params.ssd_mads_nb_var_in_subproblem = Some(7);

        let cache = Cache::new(3, 1e-13);
        let evaluator = separable_quadratic(3);
        let err = run_ssd(&params, &cache, &evaluator, 3).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSubproblemSize(7, 3));
    }

    #[test]
    fn sweep_drives_the_incumbent_down() {
        let params = NomadParametersBuilder::default()
            .dimension(5)
            .x0(vec![Point::from_f64(&[3.0; 5])])
            .ssd_mads_nb_subproblem(Some(2))
            .ssd_mads_nb_var_in_subproblem(Some(2))
            .max_bb_eval(Some(300))
            .build()
            .unwrap();
        let cache = Cache::new(5, 1e-13);
        let evaluator = separable_quadratic(5);
        let result = run_ssd(&params, &cache, &evaluator, 99).unwrap();

        let start_f: f64 = (0..5).map(|_| 3.0_f64.powi(2)).sum();
        let final_f = result.barrier.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f().raw();
        assert!(final_f < start_f);
        assert!(result.iterations_run > 0);
    }
}
