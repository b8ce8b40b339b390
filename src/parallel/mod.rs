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

//! The three parallel MADS variants, each a different way of fanning a
//! [`crate::mads::MadsMegaIteration`] out across OS threads: COOP's
//! independent siblings sharing a cache, PSD's pollster-plus-subproblem
//! split, and SSD's sequential subproblem sweep per pollster iteration.

pub mod coop;
pub mod psd;
pub mod ssd;

use parking_lot::Mutex;

/// Tracks how many distinct full-space variable indices the subproblem
/// workers of one PSD-MADS mega-iteration have addressed. PSD-MADS gates
/// the shared mesh's Update step on this crossing a threshold (or an
/// opportunistic subproblem success), resetting it on every mesh update.
pub struct CoverageCounter {
    dim: usize,
    covered: Mutex<bit_set::BitSet>,
}

impl CoverageCounter {
    pub fn new(dim: usize) -> Self {
        CoverageCounter {
            dim,
            covered: Mutex::new(bit_set::BitSet::with_capacity(dim)),
        }
    }

    pub fn mark(&self, indices: &[usize]) {
        let mut covered = self.covered.lock();
        for &i in indices {
            covered.insert(i);
        }
    }

    pub fn count(&self) -> usize {
        self.covered.lock().len()
    }

    pub fn threshold_crossed(&self, threshold: usize) -> bool {
        self.count() >= threshold.min(self.dim)
    }

    pub fn reset(&self) {
        self.covered.lock().clear();
    }
}
