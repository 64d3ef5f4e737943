//! AutoPEQ - Automatic design of parametric equalizers
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Filter chain optimizers: greedy stage placement followed by a joint
//! finite-difference gradient refinement.

pub mod gradient;
pub mod greedy;

pub use gradient::{RefineOutcome, RefineStop, chain_objective, refine};
pub use greedy::{GreedyOutcome, GreedyStop, Placement, greedy_placement, optimize_q, place_stages};

use crate::error::{AutopeqError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Options of the greedy stage placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    /// Placement stops once max |residual| is below this value (dB)
    pub flatness_target: f64,
    /// Starting multiplier of the Q line search, must be > 1
    pub initial_step_size: f64,
    /// Overshoot tolerance of a candidate stage (dB)
    pub max_filter_error: f64,
    /// Largest boost a peaking stage may need after the gain stage (dB)
    pub max_gain: f64,
    /// Peaking stage budget
    pub max_stages: usize,
    /// Number of points of the frequency axis
    pub number_of_points: usize,
    /// First frequency of the axis (Hz)
    pub range_start: f64,
    /// Last frequency of the axis (Hz)
    pub range_end: f64,
    /// Refinement rounds of the Q line search
    pub q_stages: usize,
    /// Initial Q of a new stage
    pub start_q: f64,
    /// Sample rate used for coefficient synthesis (Hz)
    pub sample_rate: f64,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            flatness_target: 1.0,
            initial_step_size: 2.0,
            max_filter_error: 2.0,
            max_gain: 0.0,
            max_stages: 10,
            number_of_points: 200,
            range_start: 20.0,
            range_end: 20000.0,
            q_stages: 10,
            start_q: 10.0,
            sample_rate: crate::iir::SRATE,
        }
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AutopeqError::invalid_config(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}

impl GreedyConfig {
    /// Check every option against its domain.
    pub fn validate(&self) -> Result<()> {
        let range_ok = self.number_of_points >= 2
            && self.range_start.is_finite()
            && self.range_end.is_finite()
            && 0.0 < self.range_start
            && self.range_start < self.range_end;
        if !range_ok {
            return Err(AutopeqError::InvalidRange {
                start: self.range_start,
                end: self.range_end,
                count: self.number_of_points,
            });
        }
        check_finite("sample_rate", self.sample_rate)?;
        if self.range_end >= self.sample_rate / 2.0 {
            return Err(AutopeqError::invalid_config(format!(
                "range_end ({}) must be below Nyquist ({})",
                self.range_end,
                self.sample_rate / 2.0
            )));
        }
        check_finite("initial_step_size", self.initial_step_size)?;
        if self.initial_step_size <= 1.0 {
            return Err(AutopeqError::invalid_config(format!(
                "initial_step_size ({}) must be greater than 1",
                self.initial_step_size
            )));
        }
        check_finite("start_q", self.start_q)?;
        if self.start_q <= 0.0 {
            return Err(AutopeqError::invalid_config(format!(
                "start_q ({}) must be positive",
                self.start_q
            )));
        }
        check_finite("flatness_target", self.flatness_target)?;
        check_finite("max_filter_error", self.max_filter_error)?;
        check_finite("max_gain", self.max_gain)?;
        if self.flatness_target < 0.0 || self.max_filter_error < 0.0 {
            return Err(AutopeqError::invalid_config(
                "flatness_target and max_filter_error must be non-negative",
            ));
        }
        Ok(())
    }
}

/// How the refinement applies a gradient pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Update each parameter right after its partial derivative; later
    /// derivatives of the same pass see the updated vector.
    #[default]
    #[value(name = "rolling")]
    Rolling,
    /// Compute the whole gradient on the unmodified vector, then update.
    #[value(name = "batch")]
    Batch,
}

/// Options of the joint gradient refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Run the refinement at all
    pub enabled: bool,
    /// Maximum number of rounds
    pub iterations: usize,
    /// Relative perturbation used for the finite differences
    pub gradient_factor: f64,
    /// Step applied to the gradient, scaled by current / initial error
    pub step_size: f64,
    /// Rolling or batch updates
    pub update_mode: UpdateMode,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            iterations: 100,
            gradient_factor: 1.0e-4,
            step_size: 1.0e-4,
            update_mode: UpdateMode::Rolling,
        }
    }
}

impl RefineConfig {
    /// Check every option against its domain.
    pub fn validate(&self) -> Result<()> {
        check_finite("gradient_factor", self.gradient_factor)?;
        check_finite("step_size", self.step_size)?;
        if self.gradient_factor <= 0.0 {
            return Err(AutopeqError::invalid_config(format!(
                "gradient_factor ({}) must be positive",
                self.gradient_factor
            )));
        }
        if self.step_size < 0.0 {
            return Err(AutopeqError::invalid_config(format!(
                "step_size ({}) must be non-negative",
                self.step_size
            )));
        }
        Ok(())
    }
}
