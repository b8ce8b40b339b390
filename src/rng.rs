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

//! A tiny seedable generator used only to pick random variable subsets
//! for PSD/SSD-MADS subproblems. Deliberately not a general-purpose RNG
//! crate: the one call site doesn't warrant the dependency, and a fixed
//! seed makes a subproblem split reproducible across a run.

/// splitmix64, as described by Vigna; passes practrand well past the
/// volume this crate ever draws from it.
pub struct SplitMix64(u64);

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        SplitMix64(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    /// Picks `k` distinct indices from `0..n` (partial Fisher-Yates);
    /// returns fewer than `k` only if `k > n`.
    pub fn choose_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = i + (self.next_u64() as usize) % (n - i);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }

    /// Picks one index from `0..n`. Panics if `n == 0`.
    pub fn choose_one(&mut self, n: usize) -> usize {
        assert!(n > 0, "choose_one called on an empty range");
        (self.next_u64() as usize) % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_indices_picks_distinct_values_in_range() {
        let mut rng = SplitMix64::new(42);
        let picked = rng.choose_indices(10, 3);
        assert_eq!(picked.len(), 3);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
        assert!(picked.iter().all(|&i| i < 10));
    }

    #[test]
    fn same_seed_is_deterministic() {
        assert_eq!(
            SplitMix64::new(7).choose_indices(20, 5),
            SplitMix64::new(7).choose_indices(20, 5)
        );
    }

    #[test]
    fn requesting_more_than_available_saturates() {
        let mut rng = SplitMix64::new(1);
        assert_eq!(rng.choose_indices(3, 10).len(), 3);
    }
}
