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

//! The external blackbox-call contract. Process launch, file redirection,
//! and parameter-file formatting are collaborators outside this crate
//! (NOMAD's batch examples invoke an executable that reads `x` from a file
//! and prints `f g1 g2 ...` to stdout, exiting non-zero on failure); this
//! module specifies only the boundary the evaluator control dispatches
//! across.

use crate::eval::{BbOutputType, ComputeType, Eval, EvalStatus};
use crate::point::Point;

/// What one blackbox invocation actually produced, before it is
/// interpreted against `BB_OUTPUT_TYPE`.
#[derive(Debug, Clone)]
pub struct BlackboxOutcome {
    /// The process's raw stdout, whitespace-separated output tokens.
    pub raw_outputs: String,
    /// `true` iff the process exited with status 0.
    pub exit_ok: bool,
}

/// Implemented by the caller-supplied collaborator that actually launches
/// the blackbox executable. The core never spawns a process itself; a
/// worker thread in [`crate::queue::EvaluatorControl`] holds one of these
/// and calls it once per dispatched point.
pub trait BlackboxEvaluator: Send + Sync {
    fn evaluate(&self, point: &Point) -> BlackboxOutcome;
}

/// A blackbox whose output is a deterministic function of the input,
/// used by scenario tests that would otherwise have to launch a process.
pub struct ClosureEvaluator<F>(pub F)
where
    F: Fn(&Point) -> BlackboxOutcome + Send + Sync;

impl<F> BlackboxEvaluator for ClosureEvaluator<F>
where
    F: Fn(&Point) -> BlackboxOutcome + Send + Sync,
{
    fn evaluate(&self, point: &Point) -> BlackboxOutcome {
        (self.0)(point)
    }
}

/// A non-zero exit status is always a `FAIL`, regardless of what made it
/// to stdout; everything the blackbox contract promises about outputs
/// only applies on a clean exit.
pub fn classify_exit(outcome: &BlackboxOutcome) -> EvalStatus {
    if outcome.exit_ok {
        EvalStatus::Ok
    } else {
        EvalStatus::Fail
    }
}

/// Turns a raw outcome into a cached [`Eval`] under `bb_output_types` and
/// the currently active `compute_type`.
pub fn eval_from_outcome(
    outcome: BlackboxOutcome,
    bb_output_types: Vec<BbOutputType>,
    compute_type: ComputeType,
) -> Eval {
    let status = classify_exit(&outcome);
    Eval::new(status, outcome.raw_outputs, bb_output_types, compute_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_is_always_fail() {
        let outcome = BlackboxOutcome { raw_outputs: "1.0 -1.0".into(), exit_ok: false };
        assert_eq!(classify_exit(&outcome), EvalStatus::Fail);
    }

    #[test]
    fn closure_evaluator_dispatches() {
        let evaluator = ClosureEvaluator(|p: &Point| BlackboxOutcome {
            raw_outputs: format!("{}", p.get(0).raw()),
            exit_ok: true,
        });
        let outcome = evaluator.evaluate(&Point::from_f64(&[4.2]));
        assert_eq!(outcome.raw_outputs, "4.2");
    }
}
