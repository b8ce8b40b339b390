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

//! Directional exploration around the frame center: a positive spanning
//! set of directions scaled to the frame size `Delta`, optionally ordered
//! by a surrogate-sort before submission.

use crate::numeric::Dbl;
use crate::point::Direction;

/// The "2n" positive spanning set: `+e_i` and `-e_i` for every coordinate,
/// each scaled by that coordinate's current frame size. Together these
/// `2n` directions positively span `R^n`, the minimal property MADS's
/// convergence proof relies on.
pub fn two_n_directions(big_delta: &[Dbl]) -> Vec<Direction> {
    let n = big_delta.len();
    let mut dirs = Vec::with_capacity(2 * n);
    for i in 0..n {
        let mut plus = vec![Dbl::new(0.0); n];
        plus[i] = big_delta[i];
        dirs.push(Direction::new(plus));

        let mut minus = vec![Dbl::new(0.0); n];
        minus[i] = -big_delta[i];
        dirs.push(Direction::new(minus));
    }
    dirs
}

/// Orders `dirs` by ascending value of `score` (ties broken by original
/// position), the hook a surrogate-sort plugs into.
pub fn order_by<T>(mut dirs: Vec<(Direction, T)>, score: impl Fn(&T) -> Dbl) -> Vec<Direction> {
    dirs.sort_by(|a, b| score(&a.1).sort_key().cmp(&score(&b.1).sort_key()));
    dirs.into_iter().map(|(d, _)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_n_directions_positively_spans() {
        let dirs = two_n_directions(&[Dbl::new(1.0), Dbl::new(2.0)]);
        assert_eq!(dirs.len(), 4);
        let sum = dirs.iter().fold(Direction::zero(2), |acc, d| {
            Direction::new((0..2).map(|i| acc.get(i) + d.get(i)).collect())
        });
        assert_eq!(sum.get(0), Dbl::new(0.0));
        assert_eq!(sum.get(1), Dbl::new(0.0));
    }

    #[test]
    fn order_by_sorts_ascending() {
        let dirs = two_n_directions(&[Dbl::new(1.0)]);
        let scored: Vec<_> = dirs.into_iter().zip([Dbl::new(5.0), Dbl::new(1.0)]).collect();
        let ordered = order_by(scored, |s| *s);
        assert_eq!(ordered[0].get(0), Dbl::new(-1.0));
    }
}
