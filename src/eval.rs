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

//! A single blackbox (or surrogate) evaluation outcome and the pure
//! function that turns raw blackbox text into cached objective/feasibility
//! values under the currently active compute rule.

use serde::{Deserialize, Serialize};

use crate::numeric::Dbl;

/// Outcome of one evaluation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalStatus {
    Ok,
    Fail,
    /// A PB/EB constraint overran the extreme barrier before the blackbox
    /// finished computing every output (early-terminated evaluation).
    ConsHOver,
    Undefined,
    InProgress,
}

/// The role a raw blackbox output column plays in computing `f`/`h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BbOutputType {
    Obj,
    /// Progressive-barrier (relaxable) constraint.
    Pb,
    /// Extreme-barrier (non-relaxable) constraint.
    Eb,
    CntEval,
    Undefined,
}

/// Which Eval on an EvalPoint a given operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalKind {
    Blackbox,
    SurrogateStatic,
    SurrogateModel,
}

/// Selects the active objective/feasibility rule used to turn raw outputs
/// into `(f, h)`. `PhaseOne` is used before the first feasible point is
/// found: it substitutes `f <- h`, `h <- 0` so the barrier pursues
/// feasibility alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeRule {
    Standard,
    PhaseOne,
}

/// The active compute rule plus its numeric parameters. `h_norm_power` is
/// the exponent `p` in `h = sum(max(0, c)^p)`; NOMAD's default is 2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputeType {
    pub rule: ComputeRule,
    pub h_norm_power: i32,
}

impl Default for ComputeType {
    fn default() -> Self {
        ComputeType {
            rule: ComputeRule::Standard,
            h_norm_power: 2,
        }
    }
}

/// One evaluation of one point under one [`EvalKind`].
///
/// `f` and `h` are a pure function of `raw_outputs`, `bb_output_types`, and
/// the compute rule active when they were last computed; changing the
/// compute rule sets `to_recompute` rather than eagerly recomputing every
/// cached Eval in the system.
#[derive(Debug, Clone)]
pub struct Eval {
    status: EvalStatus,
    raw_outputs: String,
    bb_output_types: Vec<BbOutputType>,
    f: Dbl,
    h: Dbl,
    to_recompute: bool,
}

impl Eval {
    pub fn new(
        status: EvalStatus,
        raw_outputs: String,
        bb_output_types: Vec<BbOutputType>,
        compute_type: ComputeType,
    ) -> Self {
        let (f, h) = compute_f_h(status, &raw_outputs, &bb_output_types, compute_type);
        Eval {
            status,
            raw_outputs,
            bb_output_types,
            f,
            h,
            to_recompute: false,
        }
    }

    /// An Eval placeholder for a point that has been claimed but not yet
    /// evaluated (the Cache inserts one of these on `smartInsert`).
    pub fn in_progress() -> Self {
        Eval {
            status: EvalStatus::InProgress,
            raw_outputs: String::new(),
            bb_output_types: Vec::new(),
            f: Dbl::UNDEFINED,
            h: Dbl::UNDEFINED,
            to_recompute: false,
        }
    }

    pub fn status(&self) -> EvalStatus {
        self.status
    }

    pub fn raw_outputs(&self) -> &str {
        &self.raw_outputs
    }

    pub fn bb_output_types(&self) -> &[BbOutputType] {
        &self.bb_output_types
    }

    /// Cached objective value under the compute rule last applied. Panics
    /// (programmer error) if a recompute is pending: callers must
    /// [`Eval::recompute`] before reading after a compute-rule change.
    pub fn f(&self) -> Dbl {
        assert!(!self.to_recompute, "read of f() with a pending recompute");
        self.f
    }

    pub fn h(&self) -> Dbl {
        assert!(!self.to_recompute, "read of h() with a pending recompute");
        self.h
    }

    pub fn needs_recompute(&self) -> bool {
        self.to_recompute
    }

    /// Marks this Eval stale: the next [`Eval::recompute`] call will
    /// re-derive `f`/`h` under whatever compute rule it is given.
    pub fn mark_stale(&mut self) {
        self.to_recompute = true;
    }

    /// Re-derives `f`/`h` from `raw_outputs` under `compute_type` and
    /// clears the stale flag. A no-op (still clears the flag) if the status
    /// carries no outputs to interpret.
    pub fn recompute(&mut self, compute_type: ComputeType) {
        let (f, h) = compute_f_h(self.status, &self.raw_outputs, &self.bb_output_types, compute_type);
        self.f = f;
        self.h = h;
        self.to_recompute = false;
    }

    pub fn num_eval_counted(&self) -> bool {
        matches!(self.status, EvalStatus::Ok | EvalStatus::Fail | EvalStatus::ConsHOver)
    }
}

/// Two Evals are equal iff their status and raw outputs match; this is
/// the identity NOMAD uses for EvalPoint set membership, deliberately
/// ignoring derived `f`/`h` (which depend on the compute rule, not on what
/// the blackbox actually returned).
impl PartialEq for Eval {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status && self.raw_outputs == other.raw_outputs
    }
}

/// Parses `raw_outputs` against `bb_output_types` and derives `(f, h)`.
/// `h` is the sum over PB outputs of `max(0, c)^p`; any EB output strictly
/// greater than zero forces `h = +INF`. A non-OK status yields undefined
/// `f` and `h` (except `ConsHOver`, whose partial outputs still classify
/// as infeasible: `h = +INF`).
fn compute_f_h(
    status: EvalStatus,
    raw_outputs: &str,
    bb_output_types: &[BbOutputType],
    compute_type: ComputeType,
) -> (Dbl, Dbl) {
    if status == EvalStatus::ConsHOver {
        return (Dbl::UNDEFINED, Dbl::POS_INF);
    }
    if status != EvalStatus::Ok {
        return (Dbl::UNDEFINED, Dbl::UNDEFINED);
    }

    let tokens: Vec<f64> = raw_outputs
        .split_whitespace()
        .filter_map(|t| t.parse::<f64>().ok())
        .collect();

    let mut raw_f = Dbl::UNDEFINED;
    let mut h = Dbl::new(0.0);
    let mut extreme_violation = false;

    for (i, kind) in bb_output_types.iter().enumerate() {
        let Some(&v) = tokens.get(i) else { continue };
        match kind {
            BbOutputType::Obj => {
                if raw_f.is_undefined() {
                    raw_f = Dbl::new(v);
                }
            }
            BbOutputType::Pb => {
                if v > 0.0 {
                    h = h + Dbl::new(v.powi(compute_type.h_norm_power));
                }
            }
            BbOutputType::Eb => {
                if v > 0.0 {
                    extreme_violation = true;
                }
            }
            BbOutputType::CntEval | BbOutputType::Undefined => {}
        }
    }

    if extreme_violation {
        h = Dbl::POS_INF;
    }

    match compute_type.rule {
        ComputeRule::Standard => (raw_f, h),
        ComputeRule::PhaseOne => (h, Dbl::new(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<BbOutputType> {
        vec![BbOutputType::Obj, BbOutputType::Pb, BbOutputType::Pb]
    }

    #[test]
    fn feasible_point_has_zero_h() {
        let e = Eval::new(EvalStatus::Ok, "3.5 -1.0 -2.0".into(), types(), ComputeType::default());
        assert_eq!(e.f(), Dbl::new(3.5));
        assert_eq!(e.h(), Dbl::new(0.0));
    }

    #[test]
    fn infeasible_point_sums_squared_violations() {
        let e = Eval::new(EvalStatus::Ok, "1.0 2.0 3.0".into(), types(), ComputeType::default());
        assert_eq!(e.f(), Dbl::new(1.0));
        assert_eq!(e.h(), Dbl::new(4.0 + 9.0));
    }

    #[test]
    fn extreme_barrier_violation_forces_infinite_h() {
        let types = vec![BbOutputType::Obj, BbOutputType::Eb];
        let e = Eval::new(EvalStatus::Ok, "1.0 0.1".into(), types, ComputeType::default());
        assert!(e.h().is_inf());
    }

    #[test]
    fn failed_eval_is_undefined() {
        let e = Eval::new(EvalStatus::Fail, String::new(), types(), ComputeType::default());
        assert!(e.f().is_undefined());
        assert!(e.h().is_undefined());
    }

    #[test]
    fn phase_one_swaps_f_and_h() {
        let ct = ComputeType { rule: ComputeRule::PhaseOne, h_norm_power: 2 };
        let e = Eval::new(EvalStatus::Ok, "1.0 2.0 0.0".into(), types(), ct);
        assert_eq!(e.f(), Dbl::new(4.0));
        assert_eq!(e.h(), Dbl::new(0.0));
    }

    #[test]
    fn recompute_after_rule_change() {
        let mut e = Eval::new(EvalStatus::Ok, "1.0 2.0 0.0".into(), types(), ComputeType::default());
        assert_eq!(e.f(), Dbl::new(1.0));
        e.mark_stale();
        e.recompute(ComputeType { rule: ComputeRule::PhaseOne, h_norm_power: 2 });
        assert_eq!(e.f(), Dbl::new(4.0));
    }

    #[test]
    fn equality_ignores_cached_f_h_and_compares_status_and_raw() {
        let a = Eval::new(EvalStatus::Ok, "1.0 0.0 0.0".into(), types(), ComputeType::default());
        let b = Eval::new(
            EvalStatus::Ok,
            "1.0 0.0 0.0".into(),
            types(),
            ComputeType { rule: ComputeRule::PhaseOne, h_norm_power: 2 },
        );
        assert_eq!(a, b);
    }
}
