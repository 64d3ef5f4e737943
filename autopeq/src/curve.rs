//! Frequency response curves.

use crate::error::{AutopeqError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A frequency response: paired frequencies (Hz, strictly increasing) and
/// levels (dB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Frequency points in Hz
    pub freq: Array1<f64>,
    /// Level in dB
    pub spl: Array1<f64>,
}

impl Curve {
    /// Build a curve, checking that both sequences have the same non-zero
    /// length and that frequencies are strictly increasing.
    pub fn new(freq: Array1<f64>, spl: Array1<f64>) -> Result<Self> {
        if freq.len() != spl.len() {
            return Err(AutopeqError::LengthMismatch {
                what: "curve freq/spl",
                left: freq.len(),
                right: spl.len(),
            });
        }
        if freq.is_empty() {
            return Err(AutopeqError::EmptyInput { what: "curve" });
        }
        check_increasing(&freq, "curve")?;
        Ok(Self { freq, spl })
    }

    /// A curve at constant `level` dB on the given frequencies.
    pub fn flat(freq: Array1<f64>, level: f64) -> Result<Self> {
        let spl = Array1::from_elem(freq.len(), level);
        Self::new(freq, spl)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    /// True if the curve holds no points.
    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }
}

pub(crate) fn check_increasing(freq: &Array1<f64>, what: &'static str) -> Result<()> {
    for i in 1..freq.len() {
        // negated so that NaN is rejected as well
        if !(freq[i] > freq[i - 1]) {
            return Err(AutopeqError::NotIncreasing { what, index: i });
        }
    }
    Ok(())
}
