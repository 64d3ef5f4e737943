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

//! Error metrics used by the optimizers

use ndarray::Array1;

/// Root mean square of a sequence; zero for an empty one.
pub fn rms(values: &Array1<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.mapv(|v| v * v).sum() / values.len() as f64).sqrt()
}

/// Index and value of the entry with the largest magnitude.
///
/// Returns `None` for an empty sequence. NaN entries are skipped.
pub fn max_abs(values: &Array1<f64>) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, &v)| match best {
            Some((_, b)) if f64::abs(b) >= v.abs() => best,
            _ => Some((i, v)),
        })
}

/// True when a candidate correction at one frequency goes beyond what later
/// stages can repair.
///
/// The candidate overshoots when it is larger than `max_filter_error` and
/// either pushes in the same direction as the residual, or exceeds the
/// residual by more than `max_filter_error`.
pub fn is_overshoot(candidate_db: f64, residual_db: f64, max_filter_error: f64) -> bool {
    let magnitude = candidate_db.abs();
    if magnitude <= max_filter_error {
        return false;
    }
    let same_sign = candidate_db * residual_db > 0.0;
    same_sign || magnitude - max_filter_error > residual_db.abs()
}

/// Score a single candidate stage against the current residual.
///
/// The candidate is meant to cancel the residual, so the score is the RMS
/// of `candidate + residual`. Any overshooting frequency makes the candidate
/// infeasible and the score `f64::INFINITY`.
pub fn score(candidate_db: &Array1<f64>, residual_db: &Array1<f64>, max_filter_error: f64) -> f64 {
    debug_assert_eq!(candidate_db.len(), residual_db.len());
    let overshoot = candidate_db
        .iter()
        .zip(residual_db.iter())
        .any(|(&c, &r)| is_overshoot(c, r, max_filter_error));
    if overshoot {
        return f64::INFINITY;
    }
    rms(&(candidate_db + residual_db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&Array1::zeros(0)), 0.0);
        let v = Array1::from(vec![3.0, -3.0, 3.0, -3.0]);
        assert!((rms(&v) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_abs() {
        let v = Array1::from(vec![1.0, -4.0, 3.5, f64::NAN]);
        assert_eq!(max_abs(&v), Some((1, -4.0)));
        assert_eq!(max_abs(&Array1::zeros(0)), None);
    }

    #[test]
    fn test_perfect_cancellation_scores_zero() {
        let residual = Array1::from(vec![0.5, 6.0, 0.5]);
        let candidate = -&residual;
        assert!(score(&candidate, &residual, 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_overshoot_rules() {
        // small corrections are always allowed
        assert!(!is_overshoot(1.5, 0.0, 2.0));
        assert!(!is_overshoot(-2.0, 6.0, 2.0));
        // large correction in the direction of the residual
        assert!(is_overshoot(3.0, 1.0, 2.0));
        // large cut slightly past the residual is fine
        assert!(!is_overshoot(-7.0, 6.0, 2.0));
        // large cut far past the residual
        assert!(is_overshoot(-9.0, 6.0, 2.0));
        // large correction where there is nothing to correct
        assert!(is_overshoot(-3.0, 0.0, 2.0));
    }

    #[test]
    fn test_score_infeasible() {
        let residual = Array1::from(vec![0.0, 6.0, 0.0]);
        let candidate = Array1::from(vec![-4.0, -6.0, 0.0]);
        assert_eq!(score(&candidate, &residual, 2.0), f64::INFINITY);
        let candidate = Array1::from(vec![-1.0, -6.0, 0.0]);
        let s = score(&candidate, &residual, 2.0);
        assert!((s - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
