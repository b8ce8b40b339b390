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

//! # nomad-core
//! A from-scratch engine for the Mesh Adaptive Direct Search (MADS) family
//! of blackbox optimizers: a mesh-snapped Search/Poll loop driving a
//! progressive barrier over feasible and infeasible incumbents, a
//! deduplicating evaluated-point cache, and a concurrent evaluation queue
//! shared across every running algorithm thread.
//!
//! The sequential algorithm lives in [`mads`]; [`parallel`] holds its three
//! concurrent variants (COOP, PSD, SSD), each a different way of fanning a
//! [`mads::MadsMegaIteration`] out across OS threads while still routing
//! every blackbox call through one [`blackbox::BlackboxEvaluator`].
//! [`config`] is the single validated entry point a caller configures a run
//! through before touching any of the above.

pub mod barrier;
pub mod blackbox;
pub mod cache;
pub mod config;
pub mod eval;
pub mod eval_point;
pub mod mads;
pub mod mesh;
pub mod numeric;
pub mod parallel;
pub mod point;
pub mod queue;
pub mod rng;
pub mod step;
pub mod subproblem;
