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

//! Frequency response of whole filter chains

use crate::iir::Filter;
use ndarray::Array1;
use num_complex::Complex64;

/// Compute the combined chain response in dB on a frequency grid.
///
/// Stages without effect contribute nothing.
pub fn compute_peq_response(freqs: &Array1<f64>, peq: &[Filter]) -> Array1<f64> {
    let mut response = Array1::zeros(freqs.len());
    for filter in peq.iter().filter(|f| f.has_effect()) {
        response += &filter.response_db(freqs);
    }
    response
}

/// Compute the complex response of a chain (product of its stages).
pub fn compute_peq_complex_response(peq: &[Filter], freqs: &Array1<f64>) -> Vec<Complex64> {
    let mut total = vec![Complex64::new(1.0, 0.0); freqs.len()];
    for filter in peq.iter().filter(|f| f.has_effect()) {
        for (t, h) in total.iter_mut().zip(filter.frequency_response(freqs)) {
            *t *= h;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iir::{Biquad, SRATE, magnitude_db};

    #[test]
    fn test_db_sum_matches_complex_product() {
        let freqs = Array1::logspace(10.0, 1.5, 4.2, 50);
        let peq = vec![
            Filter::gain_from_db(-1.5),
            Filter::Peak(Biquad::new(120.0, SRATE, 3.0, -5.0)),
            Filter::Peak(Biquad::new(2500.0, SRATE, 0.8, 2.0)),
        ];
        let db = compute_peq_response(&freqs, &peq);
        let complex_db = magnitude_db(&compute_peq_complex_response(&peq, &freqs));
        for (a, b) in db.iter().zip(complex_db.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_degenerate_stage_is_ignored() {
        let freqs = Array1::from(vec![100.0, 1000.0, 10000.0]);
        let peq = vec![Filter::Peak(Biquad::new(1000.0, SRATE, -2.0, 6.0))];
        assert!(compute_peq_response(&freqs, &peq).iter().all(|&v| v == 0.0));
    }
}
