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

//! Pluggable trial-point generators invoked, in priority order, before
//! Poll. Quadratic-model and Nelder-Mead search methods are external
//! collaborators; this module specifies only the plug-in contract plus
//! the one search method the algorithmic core itself owns: `CacheSearch`,
//! which lets independent MADS instances sharing a [`crate::cache::Cache`]
//! (COOP-MADS) observe each other's progress.

use crate::cache::Cache;
use crate::eval::{ComputeType, EvalKind};
use crate::point::Point;

/// A trial-point generator invoked before Poll. `generate` receives the
/// current frame center and frame size and returns candidate points in
/// full space, already expected to be finite (snapping/projection happens
/// uniformly downstream in `IterationUtils`).
pub trait SearchMethod: Send + Sync {
    fn name(&self) -> &'static str;
    fn generate(&self, frame_center: &Point) -> Vec<Point>;
}

/// The empty search method: Poll always runs.
pub struct NoSearch;

impl SearchMethod for NoSearch {
    fn name(&self) -> &'static str {
        "no_search"
    }

    fn generate(&self, _frame_center: &Point) -> Vec<Point> {
        Vec::new()
    }
}

/// Re-submits the shared cache's best feasible point as a trial point,
/// so a sibling COOP-MADS instance's progress can trigger success here
/// without re-evaluating the blackbox.
pub struct CacheSearch<'a> {
    cache: &'a Cache,
    kind: EvalKind,
}

impl<'a> CacheSearch<'a> {
    pub fn new(cache: &'a Cache, kind: EvalKind) -> Self {
        CacheSearch { cache, kind }
    }
}

impl<'a> SearchMethod for CacheSearch<'a> {
    fn name(&self) -> &'static str {
        "cache_search"
    }

    fn generate(&self, frame_center: &Point) -> Vec<Point> {
        let mut best = Vec::new();
        self.cache
            .find_best_feas(&mut best, None, self.kind, ComputeType::default(), None);
        best.into_iter()
            .map(|ep| ep.point().clone())
            .filter(|p| p != frame_center)
            .collect()
    }
}
