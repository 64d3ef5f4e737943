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

//! Joint gradient refinement
//!
//! Polishes every peaking stage at once by finite-difference gradient
//! descent on the whole-chain RMS error. The step is scaled by
//! `current_error / initial_error`, so it shrinks as the fit improves. The
//! only convergence test is monotonicity: the first round whose error is
//! worse than the previous one ends the run, and the last accepted vector
//! is returned.

use super::{RefineConfig, UpdateMode};
use crate::iir::Filter;
use crate::loss;
use crate::optim_callback::{CallbackAction, ProgressCallback, ProgressEvent};
use crate::response::compute_peq_response;
use crate::x2peq::x2spl;
use log::debug;
use ndarray::Array1;

/// Why the refinement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStop {
    /// A round made the error worse.
    Regressed,
    /// All rounds ran.
    IterationsExhausted,
    /// The progress callback asked to stop.
    Stopped,
    /// Empty vector, zero or non-finite starting error, or no rounds.
    NothingToRefine,
}

/// Result of [`refine`].
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Last accepted parameter vector
    pub x: Vec<f64>,
    /// Error of `x`
    pub error: f64,
    /// Error of the seed vector
    pub initial_error: f64,
    /// Number of accepted rounds
    pub iterations: usize,
    /// Why the refinement ended
    pub stop: RefineStop,
}

/// Error function of a chain: RMS of `measured + fixed + peaks(x) - target`
/// where `fixed` holds the stages that are not refined (the gain stage).
pub fn chain_objective<'a>(
    freqs: &'a Array1<f64>,
    measured: &Array1<f64>,
    target: &Array1<f64>,
    fixed: &[Filter],
    srate: f64,
) -> impl Fn(&[f64]) -> f64 + use<'a> {
    let base = measured + &compute_peq_response(freqs, fixed) - target;
    move |x: &[f64]| loss::rms(&(&base + &x2spl(freqs, x, srate)))
}

/// Finite-difference partial derivative of `objective` along `j`, taken
/// against `base_error`. `x[j]` is restored before returning.
fn partial<F>(objective: &F, x: &mut [f64], j: usize, base_error: f64, factor: f64) -> f64
where
    F: Fn(&[f64]) -> f64,
{
    let original = x[j];
    // relative step, absolute when the parameter sits at zero
    let delta = if original != 0.0 {
        original * factor
    } else {
        factor
    };
    x[j] = original + delta;
    let perturbed = objective(x);
    x[j] = original;
    let g = (perturbed - base_error) / delta;
    if g.is_finite() { g } else { 0.0 }
}

/// Refine a parameter vector by numeric gradient descent.
///
/// # Arguments
/// * `x0` - Seed vector
/// * `objective` - Error function, lower is better
/// * `config` - Iterations, perturbation factor, step size and update mode
/// * `callback` - Called after every accepted round
///
/// # Returns
/// The last accepted vector; its error never exceeds the seed's.
pub fn refine<F>(
    x0: &[f64],
    objective: F,
    config: &RefineConfig,
    callback: &mut ProgressCallback<'_>,
) -> RefineOutcome
where
    F: Fn(&[f64]) -> f64,
{
    let mut x = x0.to_vec();
    let initial_error = objective(&x);

    if x.is_empty() || config.iterations == 0 || !initial_error.is_finite() || initial_error <= 0.0 {
        return RefineOutcome {
            x,
            error: initial_error,
            initial_error,
            iterations: 0,
            stop: RefineStop::NothingToRefine,
        };
    }

    let mut accepted = x.clone();
    let mut accepted_error = initial_error;
    let mut previous_error = initial_error;
    let mut iterations = 0;
    let mut stop = RefineStop::IterationsExhausted;

    for iter in 0..config.iterations {
        let current_error = objective(&x);
        // written so that NaN counts as a regression
        if !(current_error <= previous_error) {
            stop = RefineStop::Regressed;
            break;
        }
        accepted.clone_from(&x);
        accepted_error = current_error;
        iterations += 1;

        let event = ProgressEvent::RefineIteration {
            iter,
            error: current_error,
        };
        if callback(&event) == CallbackAction::Stop {
            stop = RefineStop::Stopped;
            break;
        }

        let scale = config.step_size * current_error / initial_error;
        match config.update_mode {
            UpdateMode::Rolling => {
                for j in 0..x.len() {
                    let g = partial(&objective, &mut x, j, current_error, config.gradient_factor);
                    x[j] -= g * scale;
                }
            }
            UpdateMode::Batch => {
                let gradient: Vec<f64> = (0..x.len())
                    .map(|j| partial(&objective, &mut x, j, current_error, config.gradient_factor))
                    .collect();
                for (v, g) in x.iter_mut().zip(gradient) {
                    *v -= g * scale;
                }
            }
        }
        previous_error = current_error;
    }

    if stop == RefineStop::IterationsExhausted {
        let final_error = objective(&x);
        if final_error <= previous_error {
            accepted = x;
            accepted_error = final_error;
        }
    }

    debug!(
        "refinement ended ({:?}) after {} rounds: {:.6} -> {:.6} dB",
        stop, iterations, initial_error, accepted_error
    );
    RefineOutcome {
        x: accepted,
        error: accepted_error,
        initial_error,
        iterations,
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iir::{Biquad, SRATE};
    use crate::optim_callback::no_progress;
    use crate::read::create_log_frequency_grid;
    use crate::x2peq::peq2x;

    fn bowl(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2) + 0.5 * x[0] * x[1] + 3.0
    }

    fn config(mode: UpdateMode, gradient_factor: f64, step_size: f64) -> RefineConfig {
        RefineConfig {
            iterations: 200,
            gradient_factor,
            step_size,
            update_mode: mode,
            ..Default::default()
        }
    }

    fn bump_problem() -> (Array1<f64>, Array1<f64>, Array1<f64>, Vec<f64>) {
        let freqs = create_log_frequency_grid(200, 20.0, 20000.0).unwrap();
        let measured = Filter::Peak(Biquad::new(1000.0, SRATE, 5.0, 6.0)).response_db(&freqs);
        let target = Array1::zeros(freqs.len());
        let seed = peq2x(&[Filter::Peak(Biquad::new(1010.5, SRATE, 4.93, -5.93))]);
        (freqs, measured, target, seed)
    }

    #[test]
    fn test_both_modes_descend() {
        let x0 = [3.0, 1.0];
        for mode in [UpdateMode::Rolling, UpdateMode::Batch] {
            let out = refine(&x0, bowl, &config(mode, 1e-2, 1e-3), &mut no_progress);
            assert!(out.error < out.initial_error * 0.7, "{:?}: {:?}", mode, out);
            assert!((out.error - bowl(&out.x)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_batch_converges_near_minimum() {
        // minimum of the bowl is 1.6 at (1.6, -2.4)
        let out = refine(&[3.0, 1.0], bowl, &config(UpdateMode::Batch, 1e-6, 0.05), &mut no_progress);
        assert_eq!(out.stop, RefineStop::IterationsExhausted);
        assert!(out.error < 2.0);
    }

    #[test]
    fn test_modes_differ() {
        let (freqs, measured, target, seed) = bump_problem();
        let objective = chain_objective(&freqs, &measured, &target, &[], SRATE);
        let rolling = refine(
            &seed,
            &objective,
            &RefineConfig::default(),
            &mut no_progress,
        );
        let batch = refine(
            &seed,
            &objective,
            &RefineConfig {
                update_mode: UpdateMode::Batch,
                ..Default::default()
            },
            &mut no_progress,
        );
        assert!(rolling.error < rolling.initial_error);
        assert!(batch.error < batch.initial_error);
        assert_ne!(rolling.x, batch.x);
    }

    #[test]
    fn test_regression_returns_last_accepted() {
        // far too large a step: the first update overshoots the minimum
        let x0 = [3.0, 1.0];
        let out = refine(&x0, bowl, &config(UpdateMode::Batch, 1e-6, 50.0), &mut no_progress);
        assert_eq!(out.stop, RefineStop::Regressed);
        assert!(out.error <= out.initial_error);
        assert_eq!(out.x, x0.to_vec());
    }

    #[test]
    fn test_nothing_to_refine() {
        let out = refine(&[], |_: &[f64]| 1.0, &RefineConfig::default(), &mut no_progress);
        assert_eq!(out.stop, RefineStop::NothingToRefine);
        let out = refine(&[1.0], |_: &[f64]| 0.0, &RefineConfig::default(), &mut no_progress);
        assert_eq!(out.stop, RefineStop::NothingToRefine);
    }

    #[test]
    fn test_callback_stop() {
        let mut seen = Vec::new();
        let mut cb = |e: &ProgressEvent| {
            seen.push(e.clone());
            if seen.len() == 3 {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        };
        let out = refine(&[3.0, 1.0], bowl, &config(UpdateMode::Batch, 1e-6, 0.05), &mut cb);
        assert_eq!(out.stop, RefineStop::Stopped);
        assert_eq!(out.iterations, 3);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_chain_refinement_moves_towards_bump() {
        let (freqs, measured, target, seed) = bump_problem();
        let objective = chain_objective(&freqs, &measured, &target, &[], SRATE);
        let out = refine(&seed, objective, &RefineConfig::default(), &mut no_progress);
        assert!(out.error < out.initial_error);
        let freq = 10f64.powf(out.x[0]);
        assert!((freq - 1000.0).abs() < (1010.5 - 1000.0));
    }
}
