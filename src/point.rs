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

//! Fixed-length ordered vectors of [`Dbl`] and the full-space / subspace
//! mapping used throughout the solver.

use std::fmt;

use bit_set::BitSet;
use serde::{Deserialize, Serialize};

use crate::numeric::Dbl;

/// A point in full- or sub-space. Coordinates may individually be
/// undefined; a point is "complete" once every coordinate is defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point(Vec<Dbl>);

impl Point {
    pub fn new(coords: Vec<Dbl>) -> Self {
        Point(coords)
    }

    pub fn undefined(dim: usize) -> Self {
        Point(vec![Dbl::UNDEFINED; dim])
    }

    pub fn from_f64(coords: &[f64]) -> Self {
        Point(coords.iter().copied().map(Dbl::new).collect())
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn coords(&self) -> &[Dbl] {
        &self.0
    }

    pub fn get(&self, i: usize) -> Dbl {
        self.0[i]
    }

    pub fn set(&mut self, i: usize, v: Dbl) {
        self.0[i] = v;
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(|c| c.is_defined())
    }

    /// Epsilon-tolerant componentwise equality.
    pub fn eq_eps(&self, other: &Point, eps: f64) -> bool {
        self.dim() == other.dim()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.eq_eps(*b, eps))
    }

    /// Clips every defined coordinate into `[lb_i, ub_i]`; a bound left
    /// undefined is treated as unbounded on that side.
    pub fn snap_to_bounds(&self, lb: &Point, ub: &Point) -> Point {
        assert_eq!(self.dim(), lb.dim(), "dimension mismatch in snap_to_bounds");
        assert_eq!(self.dim(), ub.dim(), "dimension mismatch in snap_to_bounds");
        let coords = self
            .0
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                if c.is_undefined() {
                    return c;
                }
                let mut v = c;
                if lb.get(i).is_defined() && v < lb.get(i) {
                    v = lb.get(i);
                }
                if ub.get(i).is_defined() && v > ub.get(i) {
                    v = ub.get(i);
                }
                v
            })
            .collect();
        Point(coords)
    }

    pub fn is_within_bounds(&self, lb: &Point, ub: &Point) -> bool {
        (0..self.dim()).all(|i| {
            let v = self.get(i);
            if v.is_undefined() {
                return false;
            }
            let above_lb = lb.get(i).is_undefined() || v >= lb.get(i);
            let below_ub = ub.get(i).is_undefined() || v <= ub.get(i);
            above_lb && below_ub
        })
    }

    /// Translates `self` by `dir`, componentwise.
    pub fn translate(&self, dir: &Direction) -> Point {
        assert_eq!(self.dim(), dir.dim(), "dimension mismatch in translate");
        let coords = self
            .0
            .iter()
            .zip(dir.coords().iter())
            .map(|(&a, &b)| a + b)
            .collect();
        Point(coords)
    }

    /// The direction from `other` to `self` (`self - other`).
    pub fn minus(&self, other: &Point) -> Direction {
        assert_eq!(self.dim(), other.dim(), "dimension mismatch in minus");
        let coords = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(&a, &b)| a - b)
            .collect();
        Direction(coords)
    }

    /// A hashable, epsilon-quantized key usable as a cache key: every
    /// coordinate is truncated to the nearest multiple of `eps`.
    pub fn cache_key(&self, eps: f64) -> PointKey {
        PointKey(
            self.0
                .iter()
                .map(|c| {
                    if c.is_undefined() {
                        i64::MIN
                    } else if c.raw() == f64::INFINITY {
                        i64::MAX
                    } else if c.raw() == f64::NEG_INFINITY {
                        i64::MIN + 1
                    } else {
                        (c.raw() / eps).round() as i64
                    }
                })
                .collect(),
        )
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// Epsilon-quantized key used to key the [`crate::cache::Cache`]. Two
/// points within `eps` of each other on every coordinate hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointKey(Vec<i64>);

/// A displacement vector: same representation as [`Point`], but
/// semantically a difference rather than a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Direction(Vec<Dbl>);

impl Direction {
    pub fn new(coords: Vec<Dbl>) -> Self {
        Direction(coords)
    }

    pub fn zero(dim: usize) -> Self {
        Direction(vec![Dbl::new(0.0); dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn coords(&self) -> &[Dbl] {
        &self.0
    }

    pub fn get(&self, i: usize) -> Dbl {
        self.0[i]
    }

    pub fn scale(&self, factor: Dbl) -> Direction {
        Direction(self.0.iter().map(|&c| c * factor).collect())
    }

    pub fn componentwise_scale(&self, factors: &[Dbl]) -> Direction {
        assert_eq!(self.dim(), factors.len());
        Direction(
            self.0
                .iter()
                .zip(factors.iter())
                .map(|(&c, &f)| c * f)
                .collect(),
        )
    }

    pub fn neg(&self) -> Direction {
        Direction(self.0.iter().map(|&c| -c).collect())
    }

    /// Infinity norm, used by the mesh's anisotropy test.
    pub fn inf_norm(&self) -> Dbl {
        self.0
            .iter()
            .fold(Dbl::new(0.0), |acc, &c| acc.max(c.abs()))
    }
}

/// A fixed-variable mask: a [`Point`] whose defined coordinates are the
/// values a subproblem fixes, and whose undefined coordinates mark the free
/// variables. See `SPEC_FULL.md` §3 for the `fullOf(subOf(p, m)) = p` law.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedVariableMask {
    mask: Point,
    free: BitSet,
}

impl FixedVariableMask {
    pub fn new(mask: Point) -> Self {
        let mut free = BitSet::with_capacity(mask.dim());
        for i in 0..mask.dim() {
            if mask.get(i).is_undefined() {
                free.insert(i);
            }
        }
        FixedVariableMask { mask, free }
    }

    /// The mask that fixes nothing: every variable is free.
    pub fn all_free(dim: usize) -> Self {
        Self::new(Point::undefined(dim))
    }

    pub fn dim(&self) -> usize {
        self.mask.dim()
    }

    pub fn nb_free(&self) -> usize {
        self.free.len()
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.free.contains(i)
    }

    pub fn free_indices(&self) -> Vec<usize> {
        self.free.iter().collect()
    }

    /// True iff `full`'s fixed coordinates agree (epsilon-tolerant) with the
    /// mask.
    pub fn agrees_with(&self, full: &Point, eps: f64) -> bool {
        if full.dim() != self.dim() {
            return false;
        }
        (0..self.dim()).all(|i| {
            self.is_free(i) || self.mask.get(i).eq_eps(full.get(i), eps)
        })
    }

    /// Projects a full-space point onto the free coordinates, in index
    /// order. Panics (programmer error) if `full` disagrees with the fixed
    /// coordinates.
    pub fn to_sub(&self, full: &Point) -> Point {
        assert_eq!(full.dim(), self.dim(), "dimension mismatch: full point vs mask");
        let coords = self
            .free_indices()
            .into_iter()
            .map(|i| full.get(i))
            .collect();
        Point::new(coords)
    }

    /// Lifts a subspace point back to full space by combining it with the
    /// fixed coordinates of the mask. `fullOf(subOf(p, m), m) == p` whenever
    /// `p` agreed with `m` to begin with.
    pub fn to_full(&self, sub: &Point) -> Point {
        assert_eq!(
            sub.dim(),
            self.nb_free(),
            "dimension mismatch: sub point vs mask's free count"
        );
        let mut full = self.mask.clone();
        for (sub_idx, full_idx) in self.free_indices().into_iter().enumerate() {
            full.set(full_idx, sub.get(sub_idx));
        }
        full
    }
}
