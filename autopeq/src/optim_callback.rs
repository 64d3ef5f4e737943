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

//! Progress reporting and early stopping for the optimizers

use crate::param_utils;

/// Action returned by a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Continue optimization.
    Continue,
    /// Stop optimization early, keeping what has been accepted so far.
    Stop,
}

/// Progress notifications emitted during a design run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Greedy placement accepted a peaking stage.
    StageAccepted {
        /// 1-based index of the stage
        stage: usize,
        /// Center frequency in Hz
        freq: f64,
        /// Quality factor
        q: f64,
        /// Gain in dB
        gain_db: f64,
        /// Largest absolute residual after the stage, in dB
        max_residual: f64,
    },
    /// Gradient refinement accepted a round.
    RefineIteration {
        /// 0-based round
        iter: usize,
        /// RMS error of the accepted parameters, in dB
        error: f64,
    },
}

/// Callback type shared by both optimizers.
pub type ProgressCallback<'a> = dyn FnMut(&ProgressEvent) -> CallbackAction + 'a;

/// A callback that never stops the run.
pub fn no_progress(_: &ProgressEvent) -> CallbackAction {
    CallbackAction::Continue
}

/// Tracks optimization progress and detects stalls.
pub struct ProgressTracker {
    /// Best error value seen so far
    last_error: f64,
    /// Number of updates without improvement
    stall_count: usize,
    /// Threshold for reporting stalls
    stall_threshold: usize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified stall threshold.
    pub fn new(stall_threshold: usize) -> Self {
        Self {
            last_error: f64::INFINITY,
            stall_count: 0,
            stall_threshold,
        }
    }

    /// Update tracker with a new error value.
    ///
    /// Returns a tuple of (improvement_string, is_stalling).
    pub fn update(&mut self, error: f64) -> (String, bool) {
        if error < self.last_error {
            let delta = self.last_error - error;
            self.last_error = error;
            self.stall_count = 0;
            if delta.is_finite() {
                (format!("(-{:.2e})", delta), false)
            } else {
                ("(new)".to_string(), false)
            }
        } else {
            self.stall_count += 1;
            let is_stalling = self.stall_count >= self.stall_threshold;
            let msg = if is_stalling {
                format!("(STALL:{})", self.stall_count)
            } else {
                "(--)".to_string()
            };
            (msg, is_stalling)
        }
    }

    /// Format a one-line progress message for an event.
    pub fn describe(&mut self, event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::StageAccepted {
                stage,
                freq,
                q,
                gain_db,
                max_residual,
            } => {
                let (improvement, _) = self.update(*max_residual);
                format!(
                    "stage {:2}  [f{:.0}Hz Q{:.2} G{:.2}dB] max|residual|={:.3} dB {}",
                    stage, freq, q, gain_db, max_residual, improvement
                )
            }
            ProgressEvent::RefineIteration { iter, error } => {
                let (improvement, _) = self.update(*error);
                format!("refine {:4}  rms={:.6} dB {}", iter, error, improvement)
            }
        }
    }
}

/// Format an encoded parameter vector for progress display.
pub fn format_param_summary(params: &[f64]) -> String {
    let summaries: Vec<String> = (0..param_utils::num_filters(params))
        .map(|i| {
            let (freq, q, gain) = param_utils::get_filter_params(params, i).decode();
            format!("[f{:.0}Hz Q{:.2} G{:.2}dB]", freq, q, gain)
        })
        .collect();
    summaries.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_improvement() {
        let mut tracker = ProgressTracker::new(50);
        let (msg, stalling) = tracker.update(100.0);
        assert_eq!(msg, "(new)");
        assert!(!stalling);

        let (msg, stalling) = tracker.update(50.0);
        assert!(msg.starts_with("(-"), "Should show improvement");
        assert!(!stalling);
    }

    #[test]
    fn test_progress_tracker_stall() {
        let mut tracker = ProgressTracker::new(3);
        tracker.update(100.0);

        let (_, stalling) = tracker.update(100.0);
        assert!(!stalling, "Not stalling yet");
        let (_, stalling) = tracker.update(101.0);
        assert!(!stalling, "Not at threshold yet");
        let (msg, stalling) = tracker.update(102.0);
        assert!(stalling, "Should be stalling now");
        assert!(msg.contains("STALL"));
    }

    #[test]
    fn test_describe_stage() {
        let mut tracker = ProgressTracker::default();
        let line = tracker.describe(&ProgressEvent::StageAccepted {
            stage: 1,
            freq: 1000.0,
            q: 4.5,
            gain_db: -6.0,
            max_residual: 0.4,
        });
        assert!(line.contains("f1000Hz"));
        assert!(line.contains("G-6.00dB"));
    }

    #[test]
    fn test_format_param_summary() {
        // freq (log10), 10*log10(Q), gain
        let params = vec![3.0, 0.0, -3.0, 3.30103, 3.0103, 2.0];
        let summary = format_param_summary(&params);
        assert!(summary.contains("f1000Hz"));
        assert!(summary.contains("Q1.00"));
        assert!(summary.contains("G-3.00dB"));
        assert!(summary.contains("f2000Hz Q2.00 G2.00dB"));
    }
}
