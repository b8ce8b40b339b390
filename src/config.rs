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

//! A validated, immutable-once-built record of every option a run is
//! configured with. The surface that would populate this from a `.txt`
//! parameter file or the CLI is an external collaborator; this module
//! owns the typed object and its single validation choke point.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::BbOutputType;
use crate::point::Point;

/// One input variable's kind: continuous, integer, or binary. Controls
/// mesh granularity and rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    Continuous,
    Integer,
    Binary,
}

/// The `NomadParameters::validate` error class: every way a configuration
/// can be rejected at boot, before a single blackbox call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dimension mismatch: {what} has {actual} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("BB_OUTPUT_TYPE must list at least one OBJ output")]
    MissingObjective,
    #[error("no X0 and an empty cache: the solver has nothing to start from")]
    NoStartingPoint,
    #[error("BB_MAX_BLOCK_SIZE must be 1 when COOP-MADS is enabled (got {0})")]
    CoopRequiresBlockSizeOne(u32),
    #[error("COOP_MADS_NB_PROBLEM must be at least 1 (got {0})")]
    InvalidCoopProblemCount(u32),
    #[error("PSD_MADS_NB_VAR_IN_SUBPROBLEM must be between 1 and the problem dimension (got {0} of {1})")]
    InvalidSubproblemSize(usize, usize),
    #[error("{0} must be at least 1 (got {1})")]
    InvalidSubproblemCount(&'static str, u32),
    #[error("lower bound at index {0} exceeds upper bound")]
    InconsistentBounds(usize),
    #[error("missing required field `{0}`")]
    MissingField(String),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        ConfigError::MissingField(e.field_name().to_string())
    }
}

/// Every option of the external interface surface, already parsed into
/// typed, dimension-checked form. Built only through
/// [`NomadParametersBuilder`]; construct-then-`validate` is the only
/// supported path, so a caller can never hold an un-validated instance by
/// accident (the builder's `build()` runs validation itself).
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate", error = "ConfigError"))]
pub struct NomadParameters {
    pub dimension: usize,
    #[builder(default = "vec![BbOutputType::Obj]")]
    pub bb_output_type: Vec<BbOutputType>,
    #[builder(default)]
    pub bb_input_type: Vec<InputType>,
    #[builder(default)]
    pub lower_bound: Option<Point>,
    #[builder(default)]
    pub upper_bound: Option<Point>,
    #[builder(default)]
    pub x0: Vec<Point>,
    #[builder(default = "f64::INFINITY")]
    pub h_max_0: f64,
    #[builder(default)]
    pub max_bb_eval: Option<u32>,
    #[builder(default)]
    pub max_eval: Option<u32>,
    #[builder(default)]
    pub max_time_secs: Option<u64>,
    #[builder(default)]
    pub max_iterations: Option<u64>,
    #[builder(default = "true")]
    pub opportunistic_eval: bool,
    #[builder(default = "true")]
    pub eval_queue_clear: bool,
    #[builder(default = "1")]
    pub bb_max_block_size: u32,
    #[builder(default = "0.1")]
    pub anisotropy_factor: f64,
    #[builder(default = "true")]
    pub anisotropic_mesh: bool,
    #[builder(default)]
    pub frame_center_use_cache: bool,
    #[builder(default)]
    pub coop_mads_nb_problem: Option<u32>,
    #[builder(default)]
    pub psd_mads_nb_subproblem: Option<u32>,
    #[builder(default)]
    pub psd_mads_nb_var_in_subproblem: Option<usize>,
    #[builder(default)]
    pub ssd_mads_nb_subproblem: Option<u32>,
    #[builder(default)]
    pub ssd_mads_nb_var_in_subproblem: Option<usize>,
    #[builder(default)]
    pub stop_if_feasible: bool,
}

impl NomadParametersBuilder {
    /// The single choke point every configuration error surfaces through;
    /// called by the generated `build()` before it hands out a
    /// `NomadParameters`, so an invalid configuration can never leave this
    /// module.
    fn validate(&self) -> Result<(), ConfigError> {
        let dim = self.dimension.unwrap_or(0);

        if let Some(Some(lb)) = &self.lower_bound {
            if lb.dim() != dim {
                return Err(ConfigError::DimensionMismatch { what: "LOWER_BOUND", expected: dim, actual: lb.dim() });
            }
        }
        if let Some(Some(ub)) = &self.upper_bound {
            if ub.dim() != dim {
                return Err(ConfigError::DimensionMismatch { what: "UPPER_BOUND", expected: dim, actual: ub.dim() });
            }
        }
        if let (Some(Some(lb)), Some(Some(ub))) = (&self.lower_bound, &self.upper_bound) {
            for i in 0..dim {
                if lb.get(i).is_defined() && ub.get(i).is_defined() && lb.get(i) > ub.get(i) {
                    return Err(ConfigError::InconsistentBounds(i));
                }
            }
        }

        let output_types = self.bb_output_type.clone().unwrap_or_else(|| vec![BbOutputType::Obj]);
        if !output_types.iter().any(|t| *t == BbOutputType::Obj) {
            return Err(ConfigError::MissingObjective);
        }

        let x0 = self.x0.clone().unwrap_or_default();
        if x0.is_empty() && !self.frame_center_use_cache.unwrap_or(false) {
            return Err(ConfigError::NoStartingPoint);
        }
        for p in &x0 {
            if p.dim() != dim {
                return Err(ConfigError::DimensionMismatch { what: "X0", expected: dim, actual: p.dim() });
            }
        }

        if let Some(nb) = self.coop_mads_nb_problem.flatten() {
            if nb == 0 {
                return Err(ConfigError::InvalidCoopProblemCount(nb));
            }
            let block_size = self.bb_max_block_size.unwrap_or(1);
            if block_size != 1 {
                return Err(ConfigError::CoopRequiresBlockSizeOne(block_size));
            }
        }

        if let Some(nb_var) = self.psd_mads_nb_var_in_subproblem.flatten() {
            if nb_var == 0 || nb_var > dim {
                return Err(ConfigError::InvalidSubproblemSize(nb_var, dim));
            }
        }
        if let Some(nb) = self.psd_mads_nb_subproblem.flatten() {
            if nb == 0 {
                return Err(ConfigError::InvalidSubproblemCount("PSD_MADS_NB_SUBPROBLEM", nb));
            }
        }
        if let Some(nb) = self.ssd_mads_nb_subproblem.flatten() {
            if nb == 0 {
                return Err(ConfigError::InvalidSubproblemCount("SSD_MADS_NB_SUBPROBLEM", nb));
            }
        }
        if let Some(nb_var) = self.ssd_mads_nb_var_in_subproblem.flatten() {
            if nb_var == 0 || nb_var > dim {
                return Err(ConfigError::InvalidSubproblemSize(nb_var, dim));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_valid_configuration_builds() {
        let params = NomadParametersBuilder::default()
            .dimension(2)
            .x0(vec![Point::from_f64(&[0.0, 0.0])])
            .build()
            .unwrap();
        assert_eq!(params.bb_output_type, vec![BbOutputType::Obj]);
        assert!(params.h_max_0.is_infinite());
    }

    #[test]
    fn missing_x0_and_cache_rebuild_is_rejected() {
        let err = NomadParametersBuilder::default().dimension(2).build().unwrap_err();
        assert_eq!(err, ConfigError::NoStartingPoint);
    }

    #[test]
    fn mismatched_x0_dimension_is_rejected() {
        let err = NomadParametersBuilder::default()
            .dimension(3)
            .x0(vec![Point::from_f64(&[0.0, 0.0])])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DimensionMismatch { what: "X0", expected: 3, actual: 2 });
    }

    #[test]
    fn coop_mads_rejects_block_size_above_one() {
        let err = NomadParametersBuilder::default()
            .dimension(1)
            .x0(vec![Point::from_f64(&[0.0])])
            .coop_mads_nb_problem(Some(4))
            .bb_max_block_size(2)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::CoopRequiresBlockSizeOne(2));
    }

    #[test]
    fn zero_psd_subproblem_count_is_rejected() {
        let err = NomadParametersBuilder::default()
            .dimension(6)
            .x0(vec![Point::from_f64(&[0.0; 6])])
            .psd_mads_nb_subproblem(Some(0))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidSubproblemCount("PSD_MADS_NB_SUBPROBLEM", 0));
    }

    #[test]
    fn oversized_ssd_subproblem_is_rejected() {
        let err = NomadParametersBuilder::default()
            .dimension(4)
            .x0(vec![Point::from_f64(&[0.0; 4])])
            .ssd_mads_nb_var_in_subproblem(Some(5))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidSubproblemSize(5, 4));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = NomadParametersBuilder::default()
            .dimension(1)
            .x0(vec![Point::from_f64(&[0.0])])
            .lower_bound(Some(Point::from_f64(&[5.0])))
            .upper_bound(Some(Point::from_f64(&[-5.0])))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InconsistentBounds(0));
    }
}
