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

//! End-to-end exercises of the public crate API, one per scenario seed:
//! a 10-variable run with real constraints, seeding from a non-empty
//! cache with no `X0`, a phase-one run starting fully infeasible,
//! PSD-MADS's coverage-gated mesh update, COOP-MADS's cross-instance
//! cache visibility, and a 100-point cache round trip.

use nomad_core::barrier::ProgressiveBarrier;
use nomad_core::blackbox::{BlackboxOutcome, ClosureEvaluator};
use nomad_core::cache::Cache;
use nomad_core::config::{ConfigError, NomadParametersBuilder};
use nomad_core::eval::{BbOutputType, ComputeRule, ComputeType, Eval, EvalKind, EvalStatus};
use nomad_core::eval_point::{EvalPoint, StepType};
use nomad_core::mads::search::NoSearch;
use nomad_core::mads::termination::TerminationCriteria;
use nomad_core::mads::MadsMegaIteration;
use nomad_core::mesh::Mesh;
use nomad_core::numeric::Dbl;
use nomad_core::parallel::{coop, psd};
use nomad_core::point::Point;
use nomad_core::queue::EvaluatorControl;

fn seed_barrier(
    cache: &Cache,
    queue: &EvaluatorControl<'_>,
    x0: &Point,
    h_max0: Dbl,
) -> ProgressiveBarrier {
    cache.smart_insert(x0, 1, EvalKind::Blackbox);
    queue.enqueue(EvalPoint::new(x0.clone()), 0, 0, 0, StepType::Initial);
    queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
    let seeded = queue.drain_evaluated();
    ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, h_max0)
}

/// S1: a 10-variable run with three PB constraints on the first three
/// coordinates. `hMax` only ever holds or drops across iterations, and the
/// best feasible point found is tracked as the run progresses.
#[test]
fn g2_like_ten_var_hmax_decreases_monotonically_and_tracks_best_feasible() {
    let dim = 10;
    let evaluator = ClosureEvaluator(|p: &Point| {
        let f: f64 = (0..10).map(|i| p.get(i).raw().powi(2)).sum();
        let c0 = p.get(0).raw() - 3.0;
        let c1 = p.get(1).raw() - 3.0;
        let c2 = p.get(2).raw() - 3.0;
        BlackboxOutcome { raw_outputs: format!("{f} {c0} {c1} {c2}"), exit_ok: true }
    });
    let bb_output_types = vec![BbOutputType::Obj, BbOutputType::Pb, BbOutputType::Pb, BbOutputType::Pb];

    let cache = Cache::new(dim, 1e-13);
    let queue = EvaluatorControl::new(2, &cache, &evaluator, bb_output_types, ComputeType::default(), None);
    let x0 = Point::from_f64(&[5.0; 10]);
    let barrier = seed_barrier(&cache, &queue, &x0, Dbl::POS_INF);

    let mesh = Mesh::new(dim, vec![Dbl::new(1.0); dim], vec![Dbl::new(0.0); dim]);
    let termination = TerminationCriteria {
        max_bb_eval: Some(2000),
        min_mesh_size: vec![Dbl::new(1e-9); dim],
        max_stall_iterations: None,
    };
    let mut mega = MadsMegaIteration::new(
        x0,
        barrier,
        mesh,
        &queue,
        Point::undefined(dim),
        Point::undefined(dim),
        vec![Box::new(NoSearch)],
        0,
        termination,
    );

    let mut h_max_trace = vec![mega.barrier().h_max()];
    for _ in 0..150 {
        if mega.should_stop() {
            break;
        }
        mega.run_iteration();
        h_max_trace.push(mega.barrier().h_max());
    }

    for pair in h_max_trace.windows(2) {
        assert!(pair[1] <= pair[0], "h_max rose from {} to {}", pair[0], pair[1]);
    }
    assert!(mega.barrier().x_inc_feas().is_some(), "no feasible incumbent tracked after the run");
}

/// S2: `X0` is empty; the barrier is built straight from two points already
/// sitting in the cache. Both become initial incumbents and the instance
/// survives its first mesh update.
#[test]
fn empty_x0_with_preloaded_cache_adopts_both_incumbents() {
    let dim = 2;
    let types = vec![BbOutputType::Obj, BbOutputType::Pb];
    let cache = Cache::new(dim, 1e-13);

    let feasible = Point::from_f64(&[1.0, 1.0]);
    cache.smart_insert(&feasible, 1, EvalKind::Blackbox);
    cache.update(&feasible, EvalKind::Blackbox, Eval::new(EvalStatus::Ok, "2.0 -1.0".into(), types.clone(), ComputeType::default()));

    let infeasible = Point::from_f64(&[5.0, 5.0]);
    cache.smart_insert(&infeasible, 1, EvalKind::Blackbox);
    cache.update(&infeasible, EvalKind::Blackbox, Eval::new(EvalStatus::Ok, "10.0 3.0".into(), types.clone(), ComputeType::default()));

    let mut seeded = Vec::new();
    cache.find_where(|_| true, &mut seeded);
    assert_eq!(seeded.len(), 2);
    let barrier = ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, Dbl::POS_INF);

    let feas_incumbent = barrier.x_inc_feas().expect("feasible point from the cache should seed x_inc_feas");
    assert!(feas_incumbent.point().eq_eps(&feasible, 1e-9));
    assert_eq!(barrier.x_inc_inf().len(), 1);
    assert!(barrier.x_inc_inf()[0].point().eq_eps(&infeasible, 1e-9));

    let evaluator = ClosureEvaluator(|p: &Point| {
        let f = p.get(0).raw() + p.get(1).raw();
        BlackboxOutcome { raw_outputs: format!("{f} -1.0"), exit_ok: true }
    });
    let queue = EvaluatorControl::new(1, &cache, &evaluator, types, ComputeType::default(), None);
    let mesh = Mesh::new(dim, vec![Dbl::new(1.0); dim], vec![Dbl::new(0.0); dim]);
    let termination = TerminationCriteria {
        max_bb_eval: Some(50),
        min_mesh_size: vec![Dbl::new(1e-9); dim],
        max_stall_iterations: None,
    };
    let mut mega = MadsMegaIteration::new(
        feasible,
        barrier,
        mesh,
        &queue,
        Point::undefined(dim),
        Point::undefined(dim),
        vec![Box::new(NoSearch)],
        0,
        termination,
    );

    mega.run_iteration();
    assert_eq!(mega.k(), 1, "mega-iteration did not complete its first round");
}

/// S3: every starting point is infeasible. Under
/// [`ComputeRule::PhaseOne`] the barrier pursues feasibility alone (`f`
/// becomes the real constraint violation, `h` is forced to zero); the run
/// drives that violation down to zero, i.e. finds a genuinely feasible
/// point.
#[test]
fn phase_one_drives_violation_to_zero() {
    let dim = 2;
    let compute_type = ComputeType { rule: ComputeRule::PhaseOne, h_norm_power: 2 };
    let bb_output_types = vec![BbOutputType::Obj, BbOutputType::Pb];
    let evaluator = ClosureEvaluator(|p: &Point| {
        let f = p.get(0).raw() + p.get(1).raw();
        let violation = p.get(0).raw() + p.get(1).raw() - 2.0;
        BlackboxOutcome { raw_outputs: format!("{f} {violation}"), exit_ok: true }
    });

    let cache = Cache::new(dim, 1e-13);
    let queue = EvaluatorControl::new(1, &cache, &evaluator, bb_output_types, compute_type, None);
    let x0 = Point::from_f64(&[5.0, 5.0]);

    cache.smart_insert(&x0, 1, EvalKind::Blackbox);
    queue.enqueue(EvalPoint::new(x0.clone()), 0, 0, 0, StepType::Initial);
    queue.start_evaluation(Dbl::POS_INF, Dbl::POS_INF, Dbl::POS_INF, false);
    let seeded = queue.drain_evaluated();
    let barrier = ProgressiveBarrier::from_points(seeded, EvalKind::Blackbox, Dbl::POS_INF);

    // under PhaseOne every evaluated point has h == 0 by construction, so
    // the starting point is itself "feasible" with f equal to the real
    // violation amount (8.0 here).
    let start = barrier.x_inc_feas().expect("PhaseOne must seed a feasible incumbent from the very first point");
    assert_eq!(start.eval(EvalKind::Blackbox).unwrap().f(), Dbl::new(8.0));

    let mesh = Mesh::new(dim, vec![Dbl::new(1.0); dim], vec![Dbl::new(0.0); dim]);
    let termination = TerminationCriteria {
        max_bb_eval: Some(500),
        min_mesh_size: vec![Dbl::new(1e-9); dim],
        max_stall_iterations: None,
    };
    let mut mega = MadsMegaIteration::new(
        x0,
        barrier,
        mesh,
        &queue,
        Point::undefined(dim),
        Point::undefined(dim),
        vec![Box::new(NoSearch)],
        0,
        termination,
    );

    let mut reached_feasibility = false;
    for _ in 0..200 {
        if mega.should_stop() {
            break;
        }
        mega.run_iteration();
        if mega.barrier().x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f() == Dbl::new(0.0) {
            reached_feasibility = true;
            break;
        }
    }
    assert!(reached_feasibility, "phase-one search never drove the real violation to zero");
}

/// S4: PSD-MADS with `DIMENSION=6`, three subproblems of two free
/// variables each. The pollster's mesh is only touched through
/// [`MadsMegaIteration::apply_mesh_update`] when the coverage counter
/// crosses its threshold (or a subproblem reports full success); the
/// counter itself always ends a round at zero or strictly under the full
/// dimension, never above it.
#[test]
fn psd_mads_gates_mesh_updates_on_subproblem_coverage() {
    let params = NomadParametersBuilder::default()
        .dimension(6)
        .x0(vec![Point::from_f64(&[4.0; 6])])
        .psd_mads_nb_subproblem(Some(3))
        .psd_mads_nb_var_in_subproblem(Some(2))
        .max_iterations(Some(5))
        .max_bb_eval(Some(400))
        .build()
        .unwrap();
    let cache = Cache::new(6, 1e-13);
    let evaluator = ClosureEvaluator(|p: &Point| {
        let f: f64 = (0..6).map(|i| p.get(i).raw().powi(2)).sum();
        BlackboxOutcome { raw_outputs: format!("{f}"), exit_ok: true }
    });

    let result = psd::run_psd(&params, &cache, &evaluator, 2024).unwrap();
    assert!(result.iterations_run > 0 && result.iterations_run <= 5);
    assert!(result.coverage_at_stop < 6, "coverage never resets below the full dimension it is bounded by");

    let start_f: f64 = (0..6).map(|_| 4.0_f64.powi(2)).sum();
    let final_f = result.barrier.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f().raw();
    assert!(final_f < start_f, "pollster/subproblem split made no progress");
}

/// S5: COOP-MADS rejects a block size above one at boot, and four
/// siblings sharing a cache observe a point none of them evaluated
/// themselves via `CacheSearch`.
#[test]
fn coop_mads_rejects_bad_block_size_and_siblings_see_each_others_cache_entries() {
    let rejected = NomadParametersBuilder::default()
        .dimension(1)
        .x0(vec![Point::from_f64(&[5.0])])
        .coop_mads_nb_problem(Some(4))
        .bb_max_block_size(2)
        .build()
        .unwrap_err();
    assert_eq!(rejected, ConfigError::CoopRequiresBlockSizeOne(2));

    let params = NomadParametersBuilder::default()
        .dimension(1)
        .x0(vec![Point::from_f64(&[5.0])])
        .coop_mads_nb_problem(Some(4))
        .max_bb_eval(Some(80))
        .build()
        .unwrap();

    let cache = Cache::new(1, 1e-13);
    // plant the true minimum directly in the shared cache; no sibling's
    // own poll/search will produce it, so if every sibling converges to it
    // the cache (not re-evaluation) must be how they found it.
    let optimum = Point::from_f64(&[0.0]);
    cache.smart_insert(&optimum, 1, EvalKind::Blackbox);
    cache.update(
        &optimum,
        EvalKind::Blackbox,
        Eval::new(EvalStatus::Ok, "0.0 -1.0".into(), vec![BbOutputType::Obj, BbOutputType::Pb], ComputeType::default()),
    );

    let evaluator = ClosureEvaluator(|p: &Point| {
        let x = p.get(0).raw();
        BlackboxOutcome { raw_outputs: format!("{} -1.0", x * x), exit_ok: true }
    });
    let results = coop::run_coop(&params, &cache, &evaluator).unwrap();
    assert_eq!(results.len(), 4);
    for r in &results {
        let f = r.barrier.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f();
        assert_eq!(f, Dbl::new(0.0), "sibling {} never picked up the planted optimum via CacheSearch", r.problem_index);
    }
}

/// S6: a cache of 100 evaluated points survives a write/read round trip;
/// every point is still findable and its `f`/`h` recompute unchanged.
#[test]
fn cache_of_a_hundred_points_round_trips_through_persistence() {
    let dim = 3;
    let types = vec![BbOutputType::Obj, BbOutputType::Pb];
    let cache = Cache::new(dim, 1e-13);

    let mut points = Vec::new();
    for i in 0..100 {
        let x = i as f64 * 0.1;
        let p = Point::from_f64(&[x, x * 2.0, -x]);
        let f = x * x;
        let g = x - 5.0;
        cache.smart_insert(&p, 1, EvalKind::Blackbox);
        cache.update(&p, EvalKind::Blackbox, Eval::new(EvalStatus::Ok, format!("{f} {g}"), types.clone(), ComputeType::default()));
        points.push(p);
    }
    assert_eq!(cache.len(), 100);

    let mut buf = Vec::new();
    cache.write_to(&mut buf).unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let restored = Cache::read_from(&mut cursor, dim, 1e-13, &types).unwrap();
    assert_eq!(restored.len(), 100);

    for p in &points {
        let original = cache.find(p).unwrap();
        let restored_ep = restored.find(p).expect("point dropped across the cache round trip");
        let original_eval = original.eval(EvalKind::Blackbox).unwrap();
        let restored_eval = restored_ep.eval(EvalKind::Blackbox).unwrap();
        assert!(original_eval.f().eq_eps(restored_eval.f(), 1e-9));
        assert!(original_eval.h().eq_eps(restored_eval.h(), 1e-9));
    }
}
