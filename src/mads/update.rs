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

//! The mesh/frame update at the top of every mega-iteration after the
//! first: enlarge on full success, refine otherwise.

use crate::barrier::SuccessType;
use crate::mesh::Mesh;
use crate::point::Direction;

/// Applies the Update step given the *previous* iteration's outcome.
/// `k == 0` is the caller's job to special-case (no-op, since there is no
/// ancestor yet); this function always touches the mesh.
pub fn apply(mesh: &mut Mesh, last_success: SuccessType, last_direction: Option<&Direction>) {
    match last_success {
        SuccessType::FullSuccess => {
            let dir = last_direction.cloned().unwrap_or_else(|| Direction::zero(mesh.dim()));
            mesh.enlarge_delta(&dir);
        }
        SuccessType::PartialSuccess | SuccessType::Unsuccessful => {
            mesh.refine_delta();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Dbl;

    fn mesh2() -> Mesh {
        Mesh::new(2, vec![Dbl::new(1.0), Dbl::new(1.0)], vec![Dbl::new(0.0), Dbl::new(0.0)])
    }

    #[test]
    fn full_success_enlarges() {
        let mut mesh = mesh2();
        let before = mesh.big_delta()[0];
        mesh.set_use_anisotropy(false);
        apply(
            &mut mesh,
            SuccessType::FullSuccess,
            Some(&Direction::new(vec![Dbl::new(1.0), Dbl::new(1.0)])),
        );
        assert!(mesh.big_delta()[0] > before);
    }

    #[test]
    fn unsuccessful_refines() {
        let mut mesh = mesh2();
        let before = mesh.big_delta()[0];
        apply(&mut mesh, SuccessType::Unsuccessful, None);
        assert!(mesh.big_delta()[0] < before);
    }
}
