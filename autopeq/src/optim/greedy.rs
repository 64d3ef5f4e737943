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

//! Greedy stage placement
//!
//! Starting from the residual `measured - target` (dB), a broadband gain
//! stage is added first, then peaking stages are placed one at a time at the
//! frequency of worst residual. Each new stage has its Q tuned by a
//! shrinking-step line search scored with [`loss::score`], which is
//! discontinuous (infinite on overshoot) and therefore not derived.

use super::GreedyConfig;
use crate::Curve;
use crate::error::Result;
use crate::iir::{Biquad, Filter, Peq};
use crate::loss;
use crate::optim_callback::{CallbackAction, ProgressCallback, ProgressEvent};
use crate::read::{create_log_frequency_grid, interpolate_log_space};
use log::{debug, warn};
use ndarray::Array1;

/// Upper bound on the widening phase of the Q search.
const MAX_WIDENING_STEPS: usize = 64;

/// Why the placement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreedyStop {
    /// The residual is within the flatness target.
    Flat,
    /// The peaking stage budget is used up.
    BudgetExhausted,
    /// Every Q tried for the next stage overshoots the residual.
    Stalled,
    /// The progress callback asked to stop.
    Stopped,
}

/// Chain and residual produced by [`place_stages`].
#[derive(Debug, Clone)]
pub struct Placement {
    /// Gain stage followed by the accepted peaking stages
    pub peq: Peq,
    /// `measured + chain - target` in dB, on the frequency axis
    pub residual: Array1<f64>,
    /// max |residual| after the gain stage, then after every accepted stage.
    /// Usually decreasing, but a wide stage may raise it slightly.
    pub max_residual_history: Vec<f64>,
    /// Why the placement ended
    pub stop: GreedyStop,
}

/// Result of a greedy run from raw curves.
#[derive(Debug, Clone)]
pub struct GreedyOutcome {
    /// Logarithmic frequency axis
    pub freqs: Array1<f64>,
    /// Measured curve resampled on `freqs` (dB)
    pub measured: Array1<f64>,
    /// Target curve resampled on `freqs` (dB)
    pub target: Array1<f64>,
    /// Placed chain and final residual
    pub placement: Placement,
}

enum State {
    PlacingStage,
    OptimizingQ(Biquad),
    Accepted(Biquad, Array1<f64>),
    Terminated(GreedyStop),
}

/// Build the axis, resample both curves on it and place stages.
///
/// # Errors
/// Configuration and resampling errors are returned as is; the placement
/// itself never fails.
pub fn greedy_placement(
    measured: &Curve,
    target: &Curve,
    config: &GreedyConfig,
    callback: &mut ProgressCallback<'_>,
) -> Result<GreedyOutcome> {
    config.validate()?;
    let freqs = create_log_frequency_grid(
        config.number_of_points,
        config.range_start,
        config.range_end,
    )?;
    let measured_db = interpolate_log_space(&freqs, measured)?.spl;
    let target_db = interpolate_log_space(&freqs, target)?.spl;
    let residual = &measured_db - &target_db;

    let placement = place_stages(&freqs, residual, config, callback);
    Ok(GreedyOutcome {
        freqs,
        measured: measured_db,
        target: target_db,
        placement,
    })
}

/// Place a gain stage and then peaking stages against `residual`
/// (`measured - target`, dB, one entry per point of `freqs`).
pub fn place_stages(
    freqs: &Array1<f64>,
    mut residual: Array1<f64>,
    config: &GreedyConfig,
    callback: &mut ProgressCallback<'_>,
) -> Placement {
    let min_residual = residual.iter().cloned().fold(f64::INFINITY, f64::min);
    let gain_db = if min_residual.is_finite() {
        -min_residual - config.max_gain
    } else {
        0.0
    };
    residual += gain_db;
    let mut peq = vec![Filter::gain_from_db(gain_db)];
    debug!("gain stage {:+.3} dB", gain_db);

    let mut history = vec![loss::max_abs(&residual).map_or(0.0, |(_, v)| v.abs())];
    let mut stages = 0usize;

    let mut state = State::PlacingStage;
    let stop = loop {
        state = match state {
            State::PlacingStage => match loss::max_abs(&residual) {
                Some((idx, value)) if value.abs() >= config.flatness_target => {
                    if stages >= config.max_stages {
                        State::Terminated(GreedyStop::BudgetExhausted)
                    } else {
                        let stage =
                            Biquad::new(freqs[idx], config.sample_rate, config.start_q, -value);
                        State::OptimizingQ(stage)
                    }
                }
                _ => State::Terminated(GreedyStop::Flat),
            },
            State::OptimizingQ(stage) => {
                let (stage, score) = optimize_q(stage, freqs, &residual, config);
                if score.is_finite() {
                    let response = Filter::Peak(stage.clone()).response_db(freqs);
                    State::Accepted(stage, response)
                } else {
                    warn!(
                        "no feasible Q for a stage at {:.1} Hz, stopping with {} stages",
                        stage.freq(),
                        stages
                    );
                    State::Terminated(GreedyStop::Stalled)
                }
            }
            State::Accepted(stage, response) => {
                residual += &response;
                stages += 1;
                let worst = loss::max_abs(&residual).map_or(0.0, |(_, v)| v.abs());
                history.push(worst);
                debug!(
                    "stage {}: {:.1} Hz Q {:.3} {:+.3} dB, max |residual| {:.3} dB",
                    stages,
                    stage.freq(),
                    stage.q(),
                    stage.db_gain(),
                    worst
                );
                let event = ProgressEvent::StageAccepted {
                    stage: stages,
                    freq: stage.freq(),
                    q: stage.q(),
                    gain_db: stage.db_gain(),
                    max_residual: worst,
                };
                peq.push(Filter::Peak(stage));
                if callback(&event) == CallbackAction::Stop {
                    State::Terminated(GreedyStop::Stopped)
                } else if stages >= config.max_stages {
                    State::Terminated(GreedyStop::BudgetExhausted)
                } else {
                    State::PlacingStage
                }
            }
            State::Terminated(stop) => break stop,
        };
    };

    debug!("greedy placement ended ({:?}) with {} peaking stages", stop, stages);
    Placement {
        peq,
        residual,
        max_residual_history: history,
        stop,
    }
}

/// Tune the Q of a stage against the residual.
///
/// Phase A divides Q by the step while the score improves (widening the
/// stage). Phase B runs `q_stages` rounds with `step <- sqrt(step)`, trying
/// `Q * step` then `Q / step` and keeping whichever improves.
///
/// Returns the best stage and its score.
pub fn optimize_q(
    stage: Biquad,
    freqs: &Array1<f64>,
    residual: &Array1<f64>,
    config: &GreedyConfig,
) -> (Biquad, f64) {
    let eval = |b: &Biquad| {
        let candidate = Filter::Peak(b.clone()).response_db(freqs);
        loss::score(&candidate, residual, config.max_filter_error)
    };

    let mut best_score = eval(&stage);
    let mut best = stage;
    let mut step = config.initial_step_size;

    for _ in 0..MAX_WIDENING_STEPS {
        let candidate = best.with_q(best.q() / step);
        let score = eval(&candidate);
        if score < best_score {
            best = candidate;
            best_score = score;
        } else {
            break;
        }
    }

    for _ in 0..config.q_stages {
        step = step.sqrt();
        let narrower = best.with_q(best.q() * step);
        let score = eval(&narrower);
        if score < best_score {
            best = narrower;
            best_score = score;
            continue;
        }
        let wider = best.with_q(best.q() / step);
        let score = eval(&wider);
        if score < best_score {
            best = wider;
            best_score = score;
        }
    }

    (best, best_score)
}
