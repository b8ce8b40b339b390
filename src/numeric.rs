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

//! Extended-real scalar used everywhere a blackbox value, bound, or mesh
//! size is manipulated.
//!
//! `Dbl` wraps an `f64` but gives the "undefined" state (mapped onto `NAN`)
//! first-class status: arithmetic on an undefined value stays undefined for
//! free, because IEEE 754 already propagates `NAN` through every operator we
//! implement here. `+INF` / `-INF` are the native floats, so bound arithmetic
//! ("unbounded above") composes the same way.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Default tolerance used when comparing two defined `Dbl`s for equality.
pub const DEFAULT_EPSILON: f64 = 1e-13;

/// An extended real: a finite value, `+INF`, `-INF`, or `UNDEFINED`.
///
/// Equality is epsilon-tolerant on defined values (see [`DEFAULT_EPSILON`]);
/// two undefined values compare equal to each other. Ordering
/// ([`PartialOrd`]) is only ever `Some` when both operands are defined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dbl(f64);

impl Dbl {
    /// The undefined value: absorbing for every arithmetic operator.
    pub const UNDEFINED: Dbl = Dbl(f64::NAN);
    pub const POS_INF: Dbl = Dbl(f64::INFINITY);
    pub const NEG_INF: Dbl = Dbl(f64::NEG_INFINITY);

    #[inline]
    pub fn new(v: f64) -> Self {
        Dbl(v)
    }

    #[inline]
    pub fn is_defined(self) -> bool {
        !self.0.is_nan()
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0.is_nan()
    }

    #[inline]
    pub fn is_inf(self) -> bool {
        self.0.is_infinite()
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Returns the raw value, or `None` if undefined. `+INF`/`-INF` are
    /// returned as `Some`.
    #[inline]
    pub fn value(self) -> Option<f64> {
        self.is_defined().then_some(self.0)
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }

    /// Epsilon-tolerant equality against an explicit tolerance.
    pub fn eq_eps(self, other: Dbl, eps: f64) -> bool {
        match (self.is_defined(), other.is_defined()) {
            (false, false) => true,
            (false, true) | (true, false) => false,
            (true, true) => {
                if self.0.is_infinite() || other.0.is_infinite() {
                    self.0 == other.0
                } else {
                    (self.0 - other.0).abs() <= eps
                }
            }
        }
    }

    /// Rounds `self` to the nearest multiple of `granularity` (no-op if
    /// granularity is undefined or zero).
    pub fn round_to_granularity(self, granularity: Dbl) -> Dbl {
        match (self.value(), granularity.value()) {
            (Some(v), Some(g)) if g > 0.0 => Dbl::new((v / g).round() * g),
            _ => self,
        }
    }

    /// True iff `self` is an (epsilon-tolerant) integer multiple of `step`.
    pub fn is_multiple_of(self, step: Dbl, eps: f64) -> bool {
        match (self.value(), step.value()) {
            (Some(v), Some(s)) if s > 0.0 => {
                let n = (v / s).round();
                (v - n * s).abs() <= eps
            }
            _ => false,
        }
    }

    pub fn abs(self) -> Dbl {
        Dbl(self.0.abs())
    }

    pub fn max(self, other: Dbl) -> Dbl {
        if self.is_undefined() || other.is_undefined() {
            return Dbl::UNDEFINED;
        }
        Dbl(self.0.max(other.0))
    }

    pub fn min(self, other: Dbl) -> Dbl {
        if self.is_undefined() || other.is_undefined() {
            return Dbl::UNDEFINED;
        }
        Dbl(self.0.min(other.0))
    }

    pub fn powi(self, n: i32) -> Dbl {
        Dbl(self.0.powi(n))
    }

    /// A key usable with the standard ordered containers. Only meaningful
    /// when `self.is_defined()`; undefined values sort last.
    pub fn sort_key(self) -> OrderedFloat<f64> {
        if self.is_undefined() {
            OrderedFloat(f64::INFINITY)
        } else {
            OrderedFloat(self.0)
        }
    }
}

impl Default for Dbl {
    fn default() -> Self {
        Dbl::UNDEFINED
    }
}

impl From<f64> for Dbl {
    fn from(v: f64) -> Self {
        Dbl(v)
    }
}

impl fmt::Display for Dbl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            write!(f, "-")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl PartialEq for Dbl {
    fn eq(&self, other: &Self) -> bool {
        self.eq_eps(*other, DEFAULT_EPSILON)
    }
}

impl PartialOrd for Dbl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.is_defined() || !other.is_defined() {
            return None;
        }
        self.0.partial_cmp(&other.0)
    }
}

impl Add for Dbl {
    type Output = Dbl;
    fn add(self, rhs: Dbl) -> Dbl {
        Dbl(self.0 + rhs.0)
    }
}
impl Sub for Dbl {
    type Output = Dbl;
    fn sub(self, rhs: Dbl) -> Dbl {
        Dbl(self.0 - rhs.0)
    }
}
impl Mul for Dbl {
    type Output = Dbl;
    fn mul(self, rhs: Dbl) -> Dbl {
        Dbl(self.0 * rhs.0)
    }
}
impl Div for Dbl {
    type Output = Dbl;
    fn div(self, rhs: Dbl) -> Dbl {
        Dbl(self.0 / rhs.0)
    }
}
impl Neg for Dbl {
    type Output = Dbl;
    fn neg(self) -> Dbl {
        Dbl(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_equals_undefined() {
        assert_eq!(Dbl::UNDEFINED, Dbl::UNDEFINED);
    }

    #[test]
    fn undefined_propagates_through_arithmetic() {
        let x = Dbl::UNDEFINED + Dbl::new(3.0);
        assert!(x.is_undefined());
    }

    #[test]
    fn equality_is_epsilon_tolerant() {
        let a = Dbl::new(1.0);
        let b = Dbl::new(1.0 + 1e-14);
        assert_eq!(a, b);
        let c = Dbl::new(1.0 + 1e-6);
        assert_ne!(a, c);
    }

    #[test]
    fn ordering_undefined_on_either_side_is_none() {
        assert_eq!(Dbl::UNDEFINED.partial_cmp(&Dbl::new(1.0)), None);
        assert_eq!(Dbl::new(1.0).partial_cmp(&Dbl::UNDEFINED), None);
    }

    #[test]
    fn granularity_rounding() {
        let v = Dbl::new(1.17);
        let rounded = v.round_to_granularity(Dbl::new(0.1));
        assert_eq!(rounded, Dbl::new(1.2));
    }

    #[test]
    fn multiple_of_granularity() {
        assert!(Dbl::new(1.2).is_multiple_of(Dbl::new(0.1), DEFAULT_EPSILON));
        assert!(!Dbl::new(1.23).is_multiple_of(Dbl::new(0.1), DEFAULT_EPSILON));
    }

    #[test]
    fn eb_violation_forces_positive_infinity() {
        let h = Dbl::POS_INF;
        assert!(h.is_inf());
        assert!(h > Dbl::new(1e300));
    }
}
