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

//! The progressive barrier: feasible/infeasible incumbent tracking and the
//! adaptive `hMax` threshold that drives MADS's success classification.
//! One barrier belongs to exactly one `MadsMegaIteration` and is copied on
//! fork, unlike the [`crate::cache::Cache`], which is process-wide.

pub mod persistence;

use tracing::debug;

use crate::eval::EvalKind;
use crate::eval_point::EvalPoint;
use crate::numeric::Dbl;

/// How a candidate fared relative to the barrier's reference incumbents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessType {
    Unsuccessful,
    PartialSuccess,
    FullSuccess,
}

impl SuccessType {
    /// `updateWithPoints`'s return contract is phrased as "did an
    /// incumbent change"; that's exactly "not Unsuccessful".
    pub fn incumbent_changed(self) -> bool {
        self != SuccessType::Unsuccessful
    }

    pub(crate) fn combine(self, other: SuccessType) -> SuccessType {
        use SuccessType::*;
        match (self, other) {
            (FullSuccess, _) | (_, FullSuccess) => FullSuccess,
            (PartialSuccess, _) | (_, PartialSuccess) => PartialSuccess,
            _ => Unsuccessful,
        }
    }
}

/// The single-objective success rule of §4.2: classifies candidate `c`
/// against reference `r` under threshold `h_max`.
pub fn classify_success(c_f: Dbl, c_h: Dbl, r_f: Dbl, r_h: Dbl, h_max: Dbl) -> SuccessType {
    if c_h > h_max {
        return SuccessType::Unsuccessful;
    }
    let c_feasible = c_h == Dbl::new(0.0);
    let r_feasible = r_h == Dbl::new(0.0);
    match (c_feasible, r_feasible) {
        (true, true) => {
            if c_f < r_f {
                SuccessType::FullSuccess
            } else {
                SuccessType::Unsuccessful
            }
        }
        (false, false) => {
            let f_le = c_f <= r_f;
            let h_le = c_h <= r_h;
            let f_lt = c_f < r_f;
            let h_lt = c_h < r_h;
            if f_le && h_le && (f_lt || h_lt) {
                SuccessType::FullSuccess
            } else if h_lt && c_f > r_f {
                SuccessType::PartialSuccess
            } else {
                SuccessType::Unsuccessful
            }
        }
        _ => SuccessType::Unsuccessful,
    }
}

/// Maintains the feasible/infeasible incumbent sets and the adaptive
/// infeasibility threshold for one mega-iteration's worth of candidates.
#[derive(Clone, Debug)]
pub struct ProgressiveBarrier {
    h_max: Dbl,
    x_feas: Vec<EvalPoint>,
    x_inf: Vec<EvalPoint>,
    x_inc_feas: Option<EvalPoint>,
    x_inc_inf: Vec<EvalPoint>,
    ref_best_feas: Option<EvalPoint>,
    ref_best_inf: Vec<EvalPoint>,
    up_to_date: bool,
    phase_one: bool,
}

impl ProgressiveBarrier {
    pub fn new(h_max0: Dbl) -> Self {
        ProgressiveBarrier {
            h_max: h_max0,
            x_feas: Vec::new(),
            x_inf: Vec::new(),
            x_inc_feas: None,
            x_inc_inf: Vec::new(),
            ref_best_feas: None,
            ref_best_inf: Vec::new(),
            up_to_date: true,
            phase_one: false,
        }
    }

    /// Seeds the barrier from an explicit point list (e.g. `X0` or a
    /// restored snapshot) rather than from a fresh cache.
    pub fn from_points(points: Vec<EvalPoint>, kind: EvalKind, h_max0: Dbl) -> Self {
        let mut barrier = ProgressiveBarrier::new(h_max0);
        barrier.update_with_points(&points, kind, true);
        barrier.update_ref_bests();
        barrier
    }

    pub fn h_max(&self) -> Dbl {
        self.h_max
    }

    pub fn x_inc_feas(&self) -> Option<&EvalPoint> {
        self.x_inc_feas.as_ref()
    }

    pub fn x_inc_inf(&self) -> &[EvalPoint] {
        &self.x_inc_inf
    }

    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    pub fn phase_one(&self) -> bool {
        self.phase_one
    }

    /// The `(f, h)` pair new candidates are classified against: the
    /// feasible reference incumbent if one exists, otherwise the
    /// infeasible reference incumbent, otherwise "anything is better"
    /// (`+INF`, `+INF`).
    pub fn reference_f_h(&self, kind: EvalKind) -> (Dbl, Dbl) {
        if let Some(r) = &self.ref_best_feas {
            let e = r.eval(kind).unwrap();
            return (e.f(), e.h());
        }
        if let Some(r) = self.ref_best_inf.first() {
            let e = r.eval(kind).unwrap();
            return (e.f(), e.h());
        }
        (Dbl::POS_INF, Dbl::POS_INF)
    }

    pub fn set_phase_one(&mut self, enabled: bool) {
        self.phase_one = enabled;
    }

    /// The sole incumbent/`hMax` mutator. Absorbs every evaluated point in
    /// `points`, optionally recomputing incumbents and `hMax`; returns the
    /// [`SuccessType`] this absorption represents (also answers "did an
    /// incumbent change", per `SuccessType::incumbent_changed`).
    pub fn update_with_points(
        &mut self,
        points: &[EvalPoint],
        kind: EvalKind,
        update_incumbents_and_h_max: bool,
    ) -> SuccessType {
        use crate::eval::EvalStatus;

        for ep in points {
            let Some(eval) = ep.eval(kind) else { continue };
            if eval.status() != EvalStatus::Ok {
                continue;
            }
            let h = eval.h();
            if h.is_undefined() {
                continue;
            }
            if h == Dbl::new(0.0) {
                self.x_feas.push(ep.clone());
            } else if h <= self.h_max {
                self.x_inf.push(ep.clone());
            }
        }

        if !update_incumbents_and_h_max {
            self.up_to_date = false;
            return SuccessType::Unsuccessful;
        }

        let feas_success = self.update_feasible_incumbent(kind);
        let inf_success = self.classify_infeasible_branch(kind);
        let overall = feas_success.combine(inf_success);

        self.update_h_max(kind, overall);
        self.x_inf.retain(|ep| ep.eval(kind).unwrap().h() <= self.h_max);
        self.recompute_infeasible_incumbents(kind);

        self.up_to_date = true;
        debug!(?overall, h_max = ?self.h_max, "barrier updated");
        overall
    }

    fn update_feasible_incumbent(&mut self, kind: EvalKind) -> SuccessType {
        let Some(best_f) = self
            .x_feas
            .iter()
            .map(|ep| ep.eval(kind).unwrap().f())
            .reduce(|a, b| if b < a { b } else { a })
        else {
            return SuccessType::Unsuccessful;
        };
        self.x_feas.retain(|ep| ep.eval(kind).unwrap().f() == best_f);
        let best = self.x_feas.first().cloned();
        let improved = match &self.ref_best_feas {
            None => true,
            Some(r) => best_f < r.eval(kind).unwrap().f(),
        };
        if self.x_inc_feas.is_none() || improved {
            self.x_inc_feas = best;
        }
        if improved {
            SuccessType::FullSuccess
        } else {
            SuccessType::Unsuccessful
        }
    }

    fn classify_infeasible_branch(&self, kind: EvalKind) -> SuccessType {
        let Some(r) = self.ref_best_inf.first() else {
            return if self.x_inf.is_empty() {
                SuccessType::Unsuccessful
            } else {
                SuccessType::FullSuccess
            };
        };
        let r_eval = r.eval(kind).unwrap();
        self.x_inf
            .iter()
            .map(|ep| {
                let e = ep.eval(kind).unwrap();
                classify_success(e.f(), e.h(), r_eval.f(), r_eval.h(), self.h_max)
            })
            .fold(SuccessType::Unsuccessful, SuccessType::combine)
    }

    fn update_h_max(&mut self, kind: EvalKind, overall: SuccessType) {
        let prior_h = self.ref_best_inf.first().map(|ep| ep.eval(kind).unwrap().h());
        match overall {
            SuccessType::FullSuccess | SuccessType::Unsuccessful => {
                if let Some(h) = prior_h {
                    self.h_max = h;
                }
            }
            SuccessType::PartialSuccess => {
                if let Some(prior_h) = prior_h {
                    let candidate_max = self
                        .x_inf
                        .iter()
                        .map(|ep| ep.eval(kind).unwrap().h())
                        .filter(|h| *h < prior_h)
                        .fold(Dbl::new(0.0), Dbl::max);
                    self.h_max = candidate_max;
                }
            }
        }
    }

    fn recompute_infeasible_incumbents(&mut self, kind: EvalKind) {
        let max_h = self
            .x_inf
            .iter()
            .map(|ep| ep.eval(kind).unwrap().h())
            .reduce(Dbl::max);
        self.x_inc_inf = match max_h {
            Some(max_h) => self
                .x_inf
                .iter()
                .filter(|ep| ep.eval(kind).unwrap().h() == max_h)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
    }

    /// Snapshots the current incumbents as the reference for the next
    /// iteration's success classification. Called once per mega-iteration,
    /// before `Search`/`Poll` generate new trial points.
    pub fn update_ref_bests(&mut self) {
        self.ref_best_feas = self.x_inc_feas.clone();
        self.ref_best_inf = self.x_inc_inf.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{BbOutputType, ComputeType, Eval, EvalStatus};
    use crate::point::Point;

    fn ep(x: f64, f: f64, h_outputs: &str, types: Vec<BbOutputType>) -> EvalPoint {
        let mut e = EvalPoint::new(Point::from_f64(&[x]));
        e.set_eval(
            EvalKind::Blackbox,
            Eval::new(EvalStatus::Ok, format!("{f} {h_outputs}"), types, ComputeType::default()),
        );
        e
    }

    #[test]
    fn first_feasible_point_is_full_success() {
        let mut barrier = ProgressiveBarrier::new(Dbl::POS_INF);
        let types = vec![BbOutputType::Obj, BbOutputType::Pb];
        let p = ep(1.0, 3.0, "-1.0", types);
        let s = barrier.update_with_points(&[p], EvalKind::Blackbox, true);
        assert_eq!(s, SuccessType::FullSuccess);
        assert!(s.incumbent_changed());
        assert_eq!(barrier.x_inc_feas().unwrap().eval(EvalKind::Blackbox).unwrap().f(), Dbl::new(3.0));
    }

    #[test]
    fn worse_feasible_point_is_unsuccessful() {
        let mut barrier = ProgressiveBarrier::new(Dbl::POS_INF);
        let types = vec![BbOutputType::Obj, BbOutputType::Pb];
        barrier.update_with_points(&[ep(1.0, 3.0, "-1.0", types.clone())], EvalKind::Blackbox, true);
        barrier.update_ref_bests();
        let s = barrier.update_with_points(&[ep(2.0, 5.0, "-1.0", types)], EvalKind::Blackbox, true);
        assert_eq!(s, SuccessType::Unsuccessful);
    }

    #[test]
    fn h_max_drops_to_prior_incumbent_h_on_full_success() {
        let mut barrier = ProgressiveBarrier::new(Dbl::POS_INF);
        let types = vec![BbOutputType::Obj, BbOutputType::Pb];
        // first infeasible point seeds ref_best_inf
        barrier.update_with_points(&[ep(1.0, 5.0, "2.0", types.clone())], EvalKind::Blackbox, true);
        barrier.update_ref_bests();
        assert!(barrier.h_max().is_inf());

        // a strictly dominating infeasible point should pull hMax down to the prior incumbent's h
        let s = barrier.update_with_points(&[ep(2.0, 4.0, "1.0", types)], EvalKind::Blackbox, true);
        assert_eq!(s, SuccessType::FullSuccess);
        assert_eq!(barrier.h_max(), Dbl::new(4.0));
    }
}
