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

//! The termination predicate: the disjunction of budget, mesh-tolerance,
//! stall, interrupt, and algorithm-specific stop conditions.

use crate::barrier::SuccessType;
use crate::mesh::Mesh;
use crate::step::{StopReason, StopReasons};

/// The budget/tolerance thresholds a `MadsMegaIteration` is configured
/// with; independent of any one run's mutable state.
#[derive(Debug, Clone)]
pub struct TerminationCriteria {
    pub max_bb_eval: Option<u32>,
    pub min_mesh_size: Vec<crate::numeric::Dbl>,
    pub max_stall_iterations: Option<u64>,
}

/// Mutable counters `check` needs across iterations; owned by the caller
/// (typically the `MadsMegaIteration`) and threaded through each call.
#[derive(Debug, Clone, Default)]
pub struct TerminationState {
    pub stall_iterations: u64,
    pub interrupted: bool,
}

impl TerminationState {
    /// Call once per iteration with that iteration's outcome: a stall
    /// iteration is one that did not change either incumbent.
    pub fn record_iteration(&mut self, success: SuccessType) {
        if success.incumbent_changed() {
            self.stall_iterations = 0;
        } else {
            self.stall_iterations += 1;
        }
    }
}

/// Evaluates the disjunction of stop conditions. `bb_eval_count` is the
/// running blackbox-call total shared across every concurrent main
/// thread; `algo_specific` lets a parallel variant inject its own stop
/// (e.g. PSD-MADS's coverage-threshold reset) without this function
/// knowing about it.
pub fn check(
    criteria: &TerminationCriteria,
    state: &TerminationState,
    mesh: &Mesh,
    bb_eval_count: u32,
    algo_specific: Option<StopReason>,
) -> StopReasons {
    let mut reasons = StopReasons::none();

    if let Some(max) = criteria.max_bb_eval {
        if bb_eval_count >= max {
            reasons.push(StopReason::MaxBbEvalReached);
        }
    }
    if mesh.check_stop(&criteria.min_mesh_size).min_mesh_reached {
        reasons.push(StopReason::MeshMinimumReached);
    }
    if let Some(max_stall) = criteria.max_stall_iterations {
        if state.stall_iterations >= max_stall {
            reasons.push(StopReason::StallIterationsReached);
        }
    }
    if state.interrupted {
        reasons.push(StopReason::UserInterrupt);
    }
    if let Some(reason) = algo_specific {
        reasons.push(reason);
    }
    reasons
}
