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

//! Parameter vector utilities
//!
//! The refinement works on a flat vector packing, per peaking stage,
//! `[log10(freq), 10 * log10(Q), gain_db]`. The encodings keep the three
//! parameters on comparable scales so one step size fits all of them.

/// Number of parameters per peaking stage
pub const PARAMS_PER_FILTER: usize = 3;

/// Container for the encoded parameters of one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Frequency as log10(Hz)
    pub freq: f64,
    /// Q as 10 * log10(Q)
    pub q: f64,
    /// Gain in dB
    pub gain: f64,
}

impl FilterParams {
    /// Encode engineering units.
    pub fn encode(freq_hz: f64, q: f64, gain_db: f64) -> Self {
        Self {
            freq: freq_to_log10(freq_hz),
            q: q_to_log(q),
            gain: gain_db,
        }
    }

    /// Decode to `(freq_hz, q, gain_db)`.
    pub fn decode(&self) -> (f64, f64, f64) {
        (freq_from_log10(self.freq), q_from_log(self.q), self.gain)
    }
}

/// Get the number of stages from a parameter vector
pub fn num_filters(x: &[f64]) -> usize {
    x.len() / PARAMS_PER_FILTER
}

/// Extract parameters of the i-th stage
pub fn get_filter_params(x: &[f64], i: usize) -> FilterParams {
    let offset = i * PARAMS_PER_FILTER;
    FilterParams {
        freq: x[offset],
        q: x[offset + 1],
        gain: x[offset + 2],
    }
}

/// Hz to log10(Hz)
pub fn freq_to_log10(freq: f64) -> f64 {
    freq.log10()
}

/// log10(Hz) to Hz
pub fn freq_from_log10(log_freq: f64) -> f64 {
    10f64.powf(log_freq)
}

/// Q to 10 * log10(Q)
pub fn q_to_log(q: f64) -> f64 {
    10.0 * q.log10()
}

/// 10 * log10(Q) to Q
pub fn q_from_log(log_q: f64) -> f64 {
    10f64.powf(log_q / 10.0)
}
