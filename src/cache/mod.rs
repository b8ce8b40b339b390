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

//! The process-wide, content-addressed store of evaluated points. One
//! `Cache` is shared by every concurrent algorithm instance; it is the
//! sole authority deciding whether a candidate point is worth sending to
//! the blackbox at all.

pub mod persistence;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use fxhash::FxBuildHasher;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::eval::{ComputeType, Eval, EvalKind};
use crate::eval_point::EvalPoint;
use crate::point::{FixedVariableMask, Point, PointKey};

/// A slot is one point's worth of cache state: the canonical `EvalPoint`
/// plus the condition variable that lets a second thread block on the
/// first thread's in-flight evaluation instead of racing the blackbox.
struct Slot {
    inner: Mutex<EvalPoint>,
    cond: Condvar,
}

/// The shared evaluated-point store. Keys are epsilon-quantized
/// (`Point::cache_key`), so points within the cache's tolerance of each
/// other collide into the same slot.
pub struct Cache {
    dim: usize,
    eps: f64,
    slots: DashMap<PointKey, Arc<Slot>, FxBuildHasher>,
    stop_waiting: AtomicBool,
}

impl Cache {
    pub fn new(dim: usize, eps: f64) -> Self {
        Cache {
            dim,
            eps,
            slots: DashMap::with_hasher(FxBuildHasher::default()),
            stop_waiting: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_for(&self, point: &Point) -> Arc<Slot> {
        assert_eq!(point.dim(), self.dim, "point dimension does not match cache dimension");
        let key = point.cache_key(self.eps);
        self.slots
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Slot {
                    inner: Mutex::new(EvalPoint::new(point.clone())),
                    cond: Condvar::new(),
                })
            })
            .clone()
    }

    /// Returns `true` when the caller may (and should) send `point` to the
    /// blackbox for `kind`. Inserts a placeholder record on first sight of
    /// a point; on a repeat sighting, permits re-evaluation only while the
    /// existing record has not yet reached `max_eval` completed
    /// evaluations under `kind`.
    pub fn smart_insert(&self, point: &Point, max_eval: u32, kind: EvalKind) -> bool {
        assert_eq!(point.dim(), self.dim, "point dimension does not match cache dimension");
        let is_new = !self.slots.contains_key(&point.cache_key(self.eps));
        let slot = self.slot_for(point);
        if is_new {
            return true;
        }
        let guard = slot.inner.lock();
        match guard.eval(kind) {
            None => true,
            Some(eval) => {
                use crate::eval::EvalStatus;
                if eval.status() == EvalStatus::InProgress {
                    false
                } else {
                    guard.num_evals() < max_eval
                }
            }
        }
    }

    /// Writes a completed evaluation into the slot and wakes any thread
    /// blocked in [`Cache::wait_for_result`] on this point.
    pub fn update(&self, point: &Point, kind: EvalKind, eval: Eval) {
        let slot = self.slot_for(point);
        {
            let mut guard = slot.inner.lock();
            guard.set_eval(kind, eval);
        }
        slot.cond.notify_all();
        trace!(?kind, "cache updated");
    }

    /// Blocks the calling thread until `kind` on `point` is no longer
    /// `InProgress`, or until [`Cache::set_stop_waiting`] is called.
    /// Returns `None` in the latter case.
    pub fn wait_for_result(&self, point: &Point, kind: EvalKind) -> Option<Eval> {
        use crate::eval::EvalStatus;
        let slot = self.slot_for(point);
        let mut guard = slot.inner.lock();
        loop {
            if let Some(eval) = guard.eval(kind) {
                if eval.status() != EvalStatus::InProgress {
                    return Some(eval.clone());
                }
            } else {
                return None;
            }
            if self.stop_waiting.load(Ordering::Acquire) {
                return None;
            }
            slot.cond.wait(&mut guard);
        }
    }

    /// Marks the cache as "no more results will ever arrive"; every
    /// blocked waiter wakes and returns `None`.
    pub fn set_stop_waiting(&self) {
        self.stop_waiting.store(true, Ordering::Release);
        for entry in self.slots.iter() {
            entry.value().cond.notify_all();
        }
    }

    /// Exact lookup.
    pub fn find(&self, point: &Point) -> Option<EvalPoint> {
        let key = point.cache_key(self.eps);
        self.slots.get(&key).map(|slot| slot.inner.lock().clone())
    }

    /// Streams every point for which `predicate` holds into `out`.
    pub fn find_where(&self, predicate: impl Fn(&EvalPoint) -> bool, out: &mut Vec<EvalPoint>) {
        for entry in self.slots.iter() {
            let ep = entry.value().inner.lock();
            if predicate(&ep) {
                out.push(ep.clone());
            }
        }
    }

    /// Two-predicate form: `pre_filter` runs against the raw (full-space)
    /// point before `predicate` is even evaluated, so a candidate that can
    /// be rejected without a subspace conversion never pays for one.
    pub fn find_in_subspace(
        &self,
        pre_filter: impl Fn(&Point) -> bool,
        predicate: impl Fn(&EvalPoint) -> bool,
        out: &mut Vec<EvalPoint>,
    ) {
        for entry in self.slots.iter() {
            let ep = entry.value().inner.lock();
            if !pre_filter(ep.point()) {
                continue;
            }
            if predicate(&ep) {
                out.push(ep.clone());
            }
        }
    }

    /// All feasible (`h == 0`) evaluated points under `kind`/`compute_type`
    /// with minimal `f`, restricted to candidates agreeing with
    /// `fixed_mask` (when present). `reference` further restricts to
    /// candidates strictly better than it.
    pub fn find_best_feas(
        &self,
        out: &mut Vec<EvalPoint>,
        fixed_mask: Option<&FixedVariableMask>,
        kind: EvalKind,
        compute_type: ComputeType,
        reference: Option<&Eval>,
    ) {
        use crate::eval::EvalStatus;
        let _ = compute_type;
        let mut best_f = None;
        let mut candidates = Vec::new();
        for entry in self.slots.iter() {
            let ep = entry.value().inner.lock();
            if let Some(mask) = fixed_mask {
                if !mask.agrees_with(ep.point(), self.eps) {
                    continue;
                }
            }
            let Some(eval) = ep.eval(kind) else { continue };
            if eval.status() != EvalStatus::Ok {
                continue;
            }
            if eval.h() != crate::numeric::Dbl::new(0.0) {
                continue;
            }
            if let Some(r) = reference {
                if !(eval.f() < r.f()) {
                    continue;
                }
            }
            let f = eval.f();
            best_f = Some(match best_f {
                None => f,
                Some(b) => if f < b { f } else { b },
            });
            candidates.push((f, ep.clone()));
        }
        if let Some(best) = best_f {
            out.extend(candidates.into_iter().filter(|(f, _)| *f == best).map(|(_, ep)| ep));
        }
    }

    /// All infeasible evaluated points with `0 < h <= h_max`, non-dominated
    /// in `(f, h)` (lower is better on both), restricted to `fixed_mask`
    /// and optionally to candidates strictly better than `reference`.
    pub fn find_best_inf(
        &self,
        out: &mut Vec<EvalPoint>,
        h_max: crate::numeric::Dbl,
        fixed_mask: Option<&FixedVariableMask>,
        kind: EvalKind,
        compute_type: ComputeType,
        reference: Option<&Eval>,
    ) {
        use crate::eval::EvalStatus;
        let _ = compute_type;
        let mut candidates: Vec<(crate::numeric::Dbl, crate::numeric::Dbl, EvalPoint)> = Vec::new();
        for entry in self.slots.iter() {
            let ep = entry.value().inner.lock();
            if let Some(mask) = fixed_mask {
                if !mask.agrees_with(ep.point(), self.eps) {
                    continue;
                }
            }
            let Some(eval) = ep.eval(kind) else { continue };
            if eval.status() != EvalStatus::Ok {
                continue;
            }
            let h = eval.h();
            if !(h > crate::numeric::Dbl::new(0.0)) || h > h_max {
                continue;
            }
            if let Some(r) = reference {
                if !(eval.f() < r.f() || h < r.h()) {
                    continue;
                }
            }
            candidates.push((eval.f(), h, ep.clone()));
        }
        for i in 0..candidates.len() {
            let (fi, hi, _) = &candidates[i];
            let dominated = candidates.iter().enumerate().any(|(j, (fj, hj, _))| {
                j != i && fj <= fi && hj <= hi && (fj < fi || hj < hi)
            });
            if !dominated {
                out.push(candidates[i].2.clone());
            }
        }
    }

    /// Applies `f` to every point under an exclusive-enough hold to make
    /// recomputation (e.g. after a compute-rule change) safe.
    pub fn process_on_all_points(&self, mut f: impl FnMut(&mut EvalPoint)) {
        for entry in self.slots.iter() {
            let mut guard = entry.value().inner.lock();
            f(&mut guard);
        }
    }
}
