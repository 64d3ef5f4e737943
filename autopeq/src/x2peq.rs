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

use crate::iir::{Biquad, Filter, Peq};
use crate::param_utils::{self, FilterParams};
use ndarray::Array1;

/// Convert a parameter vector to a chain of peaking stages
///
/// # Arguments
/// * `x` - Parameter vector, 3 entries per stage (see [`param_utils`])
/// * `srate` - Sample rate in Hz
///
/// # Returns
/// A chain with one `Filter::Peak` per stage, in vector order
pub fn x2peq(x: &[f64], srate: f64) -> Peq {
    (0..param_utils::num_filters(x))
        .map(|i| {
            let (freq, q, gain) = param_utils::get_filter_params(x, i).decode();
            Filter::Peak(Biquad::new(freq, srate, q, gain))
        })
        .collect()
}

/// Convert the peaking stages of a chain to a parameter vector
///
/// Gain stages are not part of the vector and are skipped.
pub fn peq2x(peq: &[Filter]) -> Vec<f64> {
    let mut x = Vec::with_capacity(peq.len() * param_utils::PARAMS_PER_FILTER);
    for filter in peq {
        if let Filter::Peak(b) = filter {
            let p = FilterParams::encode(b.freq(), b.q(), b.db_gain());
            x.extend_from_slice(&[p.freq, p.q, p.gain]);
        }
    }
    x
}

/// Convert a parameter vector to the summed response in dB
///
/// # Arguments
/// * `freqs` - Frequency points for evaluation (Hz)
/// * `x` - Parameter vector
/// * `srate` - Sample rate in Hz
pub fn x2spl(freqs: &Array1<f64>, x: &[f64], srate: f64) -> Array1<f64> {
    crate::response::compute_peq_response(freqs, &x2peq(x, srate))
}
