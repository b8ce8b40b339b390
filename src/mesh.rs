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

//! The two-level adaptive grid MADS polls against: a mesh size `δ` trial
//! points are snapped to, and a (usually coarser) frame size `Δ` the poll
//! directions are scaled by.

use tracing::trace;

use crate::numeric::Dbl;
use crate::point::{Direction, Point};

/// Flags a `Mesh::check_stop` pass raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReasons {
    pub min_mesh_reached: bool,
}

impl StopReasons {
    pub fn none() -> Self {
        StopReasons { min_mesh_reached: false }
    }

    pub fn any(self) -> bool {
        self.min_mesh_reached
    }
}

/// The default "granular mesh": `δ_i = min(Δ_i^2, Δ_i)` rounded to
/// `granularity_i`.
pub struct Mesh {
    delta: Vec<Dbl>,
    big_delta: Vec<Dbl>,
    granularity: Vec<Dbl>,
    min_delta: Vec<Dbl>,
    max_delta: Vec<Dbl>,
    refine_factor: Dbl,
    enlarge_factor: Dbl,
    use_anisotropy: bool,
    aniso_factor: Dbl,
}

impl Mesh {
    pub fn new(dim: usize, initial_delta: Vec<Dbl>, granularity: Vec<Dbl>) -> Self {
        assert_eq!(initial_delta.len(), dim);
        assert_eq!(granularity.len(), dim);
        let mut mesh = Mesh {
            delta: vec![Dbl::new(0.0); dim],
            big_delta: initial_delta,
            granularity,
            min_delta: vec![Dbl::new(0.0); dim],
            max_delta: vec![Dbl::POS_INF; dim],
            refine_factor: Dbl::new(0.5),
            enlarge_factor: Dbl::new(2.0),
            use_anisotropy: true,
            aniso_factor: Dbl::new(0.1),
        };
        mesh.update_delta_from_big_delta();
        mesh
    }

    pub fn delta(&self) -> &[Dbl] {
        &self.delta
    }

    pub fn big_delta(&self) -> &[Dbl] {
        &self.big_delta
    }

    pub fn dim(&self) -> usize {
        self.delta.len()
    }

    pub fn set_min_delta(&mut self, min_delta: Vec<Dbl>) {
        self.min_delta = min_delta;
    }

    pub fn set_max_delta(&mut self, max_delta: Vec<Dbl>) {
        self.max_delta = max_delta;
    }

    pub fn set_use_anisotropy(&mut self, enabled: bool) {
        self.use_anisotropy = enabled;
    }

    /// Nearest grid point to `p`, measured relative to frame center `c`
    /// with per-coordinate step `δ`. Snapping to bounds is a caller
    /// responsibility that composes as project -> snap -> reproject.
    pub fn project_on_mesh(&self, p: &Point, center: &Point) -> Point {
        assert_eq!(p.dim(), self.dim());
        assert_eq!(center.dim(), self.dim());
        let coords = (0..self.dim())
            .map(|i| {
                let d = self.delta[i];
                let rel = p.get(i) - center.get(i);
                let snapped = rel.round_to_granularity(d);
                center.get(i) + snapped
            })
            .collect();
        Point::new(coords)
    }

    pub fn verify_on_mesh(&self, p: &Point, center: &Point) -> bool {
        (0..self.dim()).all(|i| (p.get(i) - center.get(i)).is_multiple_of(self.delta[i], crate::numeric::DEFAULT_EPSILON))
    }

    /// Grows `Δ` given a successful poll/search direction `dir`. Returns
    /// `true` iff at least one coordinate actually grew. When anisotropy is
    /// enabled and `dir` is markedly non-uniform relative to the current
    /// frame, only the dominant coordinate is enlarged; otherwise every
    /// coordinate is.
    pub fn enlarge_delta(&mut self, dir: &Direction) -> bool {
        assert_eq!(dir.dim(), self.dim());
        let ratios: Vec<Dbl> = (0..self.dim())
            .map(|i| dir.get(i).abs() / self.big_delta[i])
            .collect();
        let max_ratio = ratios.iter().copied().reduce(Dbl::max).unwrap_or(Dbl::new(0.0));

        let mut grew = false;
        if self.use_anisotropy {
            let mut any_dominant = false;
            for i in 0..self.dim() {
                if max_ratio.raw() > 0.0 && ratios[i] > self.aniso_factor * max_ratio {
                    self.big_delta[i] = (self.big_delta[i] * self.enlarge_factor).min(self.max_delta[i]);
                    any_dominant = true;
                    grew = true;
                }
            }
            if any_dominant {
                self.update_delta_from_big_delta();
                trace!("mesh anisotropically enlarged");
                return grew;
            }
        }
        for i in 0..self.dim() {
            let grown = (self.big_delta[i] * self.enlarge_factor).min(self.max_delta[i]);
            if grown > self.big_delta[i] {
                grew = true;
            }
            self.big_delta[i] = grown;
        }
        self.update_delta_from_big_delta();
        trace!("mesh enlarged");
        grew
    }

    pub fn refine_delta(&mut self) {
        for i in 0..self.dim() {
            self.big_delta[i] = (self.big_delta[i] * self.refine_factor).max(self.min_delta[i]);
        }
        self.update_delta_from_big_delta();
        trace!("mesh refined");
    }

    pub fn update_delta_from_big_delta(&mut self) {
        for i in 0..self.dim() {
            let granular = self.big_delta[i].min(self.big_delta[i] * self.big_delta[i]);
            self.delta[i] = granular.round_to_granularity(self.granularity[i]);
        }
    }

    pub fn is_finer_than_initial(&self, initial_delta: &[Dbl]) -> bool {
        (0..self.dim()).all(|i| self.delta[i] <= initial_delta[i])
    }

    pub fn check_stop(&self, min_mesh_size: &[Dbl]) -> StopReasons {
        let min_mesh_reached = (0..self.dim()).all(|i| self.delta[i] <= min_mesh_size[i]);
        StopReasons { min_mesh_reached }
    }
}
