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

//! End-to-end design run shared by the binary and library callers
//!
//! The pipeline is: frequency axis, resampling, greedy placement, joint
//! refinement of the peaking stages, then the final residual and metrics.

use crate::error::{AutopeqError, Result};
use crate::iir::{Filter, Peq};
use crate::loss;
use crate::optim::{
    GreedyConfig, GreedyStop, RefineConfig, RefineStop, chain_objective, greedy_placement, refine,
};
use crate::optim_callback::{CallbackAction, ProgressCallback, ProgressEvent, no_progress};
use crate::read::read_curve_from_csv;
use crate::response::compute_peq_response;
use crate::x2peq::{peq2x, x2peq};
use crate::Curve;
use log::{info, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Options of a full design run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// Greedy placement options
    pub greedy: GreedyConfig,
    /// Joint refinement options
    pub refine: RefineConfig,
}

impl DesignConfig {
    /// Check both option groups.
    pub fn validate(&self) -> Result<()> {
        self.greedy.validate()?;
        self.refine.validate()
    }

    /// Load a configuration from a JSON file. Missing keys take their
    /// default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DesignConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Everything a caller needs to report or plot a finished design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignResult {
    /// Gain stage followed by the peaking stages
    pub chain: Peq,
    /// Logarithmic frequency axis (Hz)
    pub freqs: Array1<f64>,
    /// Measured curve on `freqs` (dB)
    pub measured_db: Array1<f64>,
    /// Target curve on `freqs` (dB)
    pub target_db: Array1<f64>,
    /// `measured + chain - target` on `freqs` (dB)
    pub residual_db: Array1<f64>,
    /// RMS of `measured - target` before any correction
    pub pre_rms: f64,
    /// RMS of the residual after greedy placement
    pub greedy_rms: f64,
    /// RMS of the final residual
    pub post_rms: f64,
    /// max |residual| after the gain stage and after every accepted stage
    pub max_residual_history: Vec<f64>,
    /// Why greedy placement ended
    pub greedy_stop: GreedyStop,
    /// Why refinement ended, `None` when it did not run
    pub refine_stop: Option<RefineStop>,
    /// Accepted refinement rounds
    pub refine_iterations: usize,
}

impl DesignResult {
    /// Number of peaking stages in the chain.
    pub fn num_peaks(&self) -> usize {
        self.chain
            .iter()
            .filter(|f| matches!(f, Filter::Peak(_)))
            .count()
    }
}

/// Load the measured curve and the target curve, or a flat 0 dB target on
/// the measured frequencies when no target path is given.
pub fn load_curves(curve_path: &Path, target_path: Option<&Path>) -> Result<(Curve, Curve)> {
    let measured = read_curve_from_csv(curve_path)?;
    let target = match target_path {
        Some(path) => read_curve_from_csv(path)?,
        None => {
            info!("no target curve given, using a flat 0 dB target");
            Curve::flat(measured.freq.clone(), 0.0)?
        }
    };
    Ok((measured, target))
}

/// Design a chain without progress reporting or cancellation.
pub fn design_peq(measured: &Curve, target: &Curve, config: &DesignConfig) -> Result<DesignResult> {
    design_peq_with_callback(measured, target, config, None, &mut no_progress)
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Design a chain, reporting progress to `callback`.
///
/// A `Stop` from the callback keeps what has been accepted so far: a stop
/// during placement skips the refinement, a stop during refinement keeps its
/// last accepted round. Setting `cancel` stops both optimizers at their next
/// event and the run fails with [`AutopeqError::Cancelled`].
///
/// # Errors
/// Validation errors for the configuration or the curves, and `Cancelled`.
pub fn design_peq_with_callback(
    measured: &Curve,
    target: &Curve,
    config: &DesignConfig,
    cancel: Option<&AtomicBool>,
    callback: &mut ProgressCallback<'_>,
) -> Result<DesignResult> {
    config.validate()?;
    if is_cancelled(cancel) {
        return Err(AutopeqError::Cancelled);
    }

    let mut guarded = |event: &ProgressEvent| {
        if is_cancelled(cancel) {
            CallbackAction::Stop
        } else {
            callback(event)
        }
    };

    info!(
        "designing up to {} stages on {} points ({:.0}-{:.0} Hz)",
        config.greedy.max_stages,
        config.greedy.number_of_points,
        config.greedy.range_start,
        config.greedy.range_end
    );
    let outcome = greedy_placement(measured, target, &config.greedy, &mut guarded)?;
    if is_cancelled(cancel) {
        return Err(AutopeqError::Cancelled);
    }

    let freqs = outcome.freqs;
    let placement = outcome.placement;
    let pre_rms = loss::rms(&(&outcome.measured - &outcome.target));
    let greedy_rms = loss::rms(&placement.residual);

    let srate = config.greedy.sample_rate;
    let (fixed, peaks): (Vec<Filter>, Vec<Filter>) = placement
        .peq
        .iter()
        .cloned()
        .partition(|f| matches!(f, Filter::Gain { .. }));

    let mut chain = placement.peq.clone();
    let mut refine_stop = None;
    let mut refine_iterations = 0;
    if config.refine.enabled && placement.stop != GreedyStop::Stopped && !peaks.is_empty() {
        let objective =
            chain_objective(&freqs, &outcome.measured, &outcome.target, &fixed, srate);
        let refined = refine(&peq2x(&peaks), objective, &config.refine, &mut guarded);
        if is_cancelled(cancel) {
            return Err(AutopeqError::Cancelled);
        }
        if refined.stop == RefineStop::Regressed && refined.iterations <= 1 {
            warn!("refinement regressed on its first round, keeping the greedy chain");
        }
        chain = fixed;
        chain.extend(x2peq(&refined.x, srate));
        refine_stop = Some(refined.stop);
        refine_iterations = refined.iterations;
    }

    let residual_db =
        &outcome.measured + &compute_peq_response(&freqs, &chain) - &outcome.target;
    let post_rms = loss::rms(&residual_db);
    info!(
        "designed {} peaking stages: rms {:.3} dB -> {:.3} dB (greedy {:.3} dB)",
        peaks.len(),
        pre_rms,
        post_rms,
        greedy_rms
    );

    Ok(DesignResult {
        chain,
        freqs,
        measured_db: outcome.measured,
        target_db: outcome.target,
        residual_db,
        pre_rms,
        greedy_rms,
        post_rms,
        max_residual_history: placement.max_residual_history,
        greedy_stop: placement.stop,
        refine_stop,
        refine_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iir::{Biquad, SRATE};
    use crate::read::create_log_frequency_grid;
    use std::io::Write;

    fn bump(freq: f64, q: f64, gain_db: f64) -> Curve {
        let f = create_log_frequency_grid(400, 10.0, 22000.0).unwrap();
        let spl = Filter::Peak(Biquad::new(freq, SRATE, q, gain_db)).response_db(&f);
        Curve::new(f, spl).unwrap()
    }

    #[test]
    fn test_flat_curves_need_only_a_gain_stage() {
        let measured = bump(1000.0, 5.0, 0.0);
        let target = Curve::flat(measured.freq.clone(), 0.0).unwrap();
        let result = design_peq(&measured, &target, &DesignConfig::default()).unwrap();
        assert_eq!(result.chain.len(), 1);
        assert_eq!(result.num_peaks(), 0);
        assert_eq!(result.refine_stop, None);
        assert!(result.post_rms < 1e-9);
    }

    #[test]
    fn test_refinement_does_not_regress() {
        let measured = bump(1000.0, 5.0, 6.0);
        let target = Curve::flat(measured.freq.clone(), 0.0).unwrap();
        let result = design_peq(&measured, &target, &DesignConfig::default()).unwrap();
        assert_eq!(result.num_peaks(), 1);
        assert!(result.post_rms <= result.greedy_rms);
        assert!(result.greedy_rms < result.pre_rms);
        assert!(result.refine_stop.is_some());
    }

    #[test]
    fn test_refinement_disabled_keeps_greedy_chain() {
        let measured = bump(1000.0, 5.0, 6.0);
        let target = Curve::flat(measured.freq.clone(), 0.0).unwrap();
        let mut config = DesignConfig::default();
        config.refine.enabled = false;
        let result = design_peq(&measured, &target, &config).unwrap();
        assert_eq!(result.refine_iterations, 0);
        assert_eq!(result.refine_stop, None);
        assert!((result.post_rms - result.greedy_rms).abs() < 1e-12);
    }

    #[test]
    fn test_cancel_flag() {
        let measured = bump(1000.0, 5.0, 6.0);
        let target = Curve::flat(measured.freq.clone(), 0.0).unwrap();
        let cancel = AtomicBool::new(true);
        let err = design_peq_with_callback(
            &measured,
            &target,
            &DesignConfig::default(),
            Some(&cancel),
            &mut no_progress,
        )
        .unwrap_err();
        assert!(matches!(err, AutopeqError::Cancelled));
    }

    #[test]
    fn test_callback_stop_is_not_an_error() {
        let measured = bump(1000.0, 5.0, 6.0);
        let target = Curve::flat(measured.freq.clone(), 0.0).unwrap();
        let mut events = Vec::new();
        let mut cb = |e: &ProgressEvent| {
            events.push(e.clone());
            CallbackAction::Stop
        };
        let result =
            design_peq_with_callback(&measured, &target, &DesignConfig::default(), None, &mut cb)
                .unwrap();
        assert_eq!(result.greedy_stop, GreedyStop::Stopped);
        assert_eq!(result.refine_stop, None);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_config_from_json_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"greedy": {"max_stages": 4}, "refine": {"enabled": false}}"#)
            .unwrap();
        let config = DesignConfig::from_json_file(f.path()).unwrap();
        assert_eq!(config.greedy.max_stages, 4);
        assert!(!config.refine.enabled);
        assert_eq!(config.refine.iterations, 100);

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"greedy": {"range_end": 30000.0}}"#).unwrap();
        let err = DesignConfig::from_json_file(f.path()).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_load_curves_flat_target() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"20,1.0\n1000,2.0\n20000,3.0\n").unwrap();
        let (measured, target) = load_curves(f.path(), None).unwrap();
        assert_eq!(measured.freq, target.freq);
        assert!(target.spl.iter().all(|&v| v == 0.0));
    }
}
