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

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Default sample rate in Hz.
pub const SRATE: f64 = 48000.0;

/// Floor applied to a magnitude before taking its log, to avoid log(0).
const MIN_MAGNITUDE: f64 = 1.0e-10;

/// Filter chain: a gain stage followed by peaking stages.
///
/// Contributions add up in dB, so the order only matters for output.
pub type Peq = Vec<Filter>;

/// Raw second order section coefficients, as produced by the cookbook
/// formulas (not yet divided by `a0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

impl Coefficients {
    /// Coefficients divided by `a0`, so that `a0 == 1`.
    pub fn normalized(&self) -> Self {
        Self {
            a0: 1.0,
            a1: self.a1 / self.a0,
            a2: self.a2 / self.a0,
            b0: self.b0 / self.a0,
            b1: self.b1 / self.a0,
            b2: self.b2 / self.a0,
        }
    }

    fn is_finite(&self) -> bool {
        [self.a0, self.a1, self.a2, self.b0, self.b1, self.b2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Peaking EQ coefficients (RBJ audio EQ cookbook).
///
/// `A = 10^(gain_db/40)`, `w0 = 2 pi fc / srate`, `alpha = sin(w0) / (2 Q)`.
pub fn synthesize_coefficients(fc: f64, q: f64, gain_db: f64, srate: f64) -> Coefficients {
    let big_a = 10.0_f64.powf(gain_db / 40.0);
    let w0 = 2.0 * PI * fc / srate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    Coefficients {
        a0: 1.0 + alpha / big_a,
        a1: -2.0 * cos_w0,
        a2: 1.0 - alpha / big_a,
        b0: 1.0 + alpha * big_a,
        b1: -2.0 * cos_w0,
        b2: 1.0 - alpha * big_a,
    }
}

/// Evaluate `H(z)` at `z = e^{jw}` for every frequency, with the
/// coefficients normalized by `a0`.
pub fn frequency_response(
    coeffs: &Coefficients,
    freqs: &Array1<f64>,
    srate: f64,
) -> Vec<Complex64> {
    let c = coeffs.normalized();
    freqs
        .iter()
        .map(|&f| {
            let w = 2.0 * PI * f / srate;
            let z_inv = Complex64::from_polar(1.0, -w);
            let z_inv_2 = z_inv * z_inv;
            let num = c.b0 + z_inv * c.b1 + z_inv_2 * c.b2;
            let den = c.a0 + z_inv * c.a1 + z_inv_2 * c.a2;
            num / den
        })
        .collect()
}

/// Convert a complex response to magnitude in dB.
pub fn magnitude_db(h: &[Complex64]) -> Array1<f64> {
    h.iter()
        .map(|v| 20.0 * v.norm().max(MIN_MAGNITUDE).log10())
        .collect()
}

/// A peaking biquad section.
///
/// Coefficients are synthesized once at construction; changing a parameter
/// means building a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PeakParams", from = "PeakParams")]
pub struct Biquad {
    freq: f64,
    q: f64,
    db_gain: f64,
    srate: f64,
    coeffs: Coefficients,
}

/// Serialized form of a [`Biquad`]: coefficients are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct PeakParams {
    freq: f64,
    q: f64,
    db_gain: f64,
    srate: f64,
}

impl From<PeakParams> for Biquad {
    fn from(p: PeakParams) -> Self {
        Biquad::new(p.freq, p.srate, p.q, p.db_gain)
    }
}

impl From<Biquad> for PeakParams {
    fn from(b: Biquad) -> Self {
        PeakParams {
            freq: b.freq,
            q: b.q,
            db_gain: b.db_gain,
            srate: b.srate,
        }
    }
}

impl Biquad {
    /// Creates a peaking filter. Out of domain parameters are accepted and
    /// yield a filter without effect (see [`Biquad::has_effect`]).
    pub fn new(freq: f64, srate: f64, q: f64, db_gain: f64) -> Self {
        Self {
            freq,
            q,
            db_gain,
            srate,
            coeffs: synthesize_coefficients(freq, q, db_gain, srate),
        }
    }

    /// Center frequency in Hz
    pub fn freq(&self) -> f64 {
        self.freq
    }

    /// Quality factor
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Gain at the center frequency in dB
    pub fn db_gain(&self) -> f64 {
        self.db_gain
    }

    /// Sample rate in Hz
    pub fn srate(&self) -> f64 {
        self.srate
    }

    /// Raw (unnormalized) coefficients
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    /// Same filter with another Q.
    pub fn with_q(&self, q: f64) -> Self {
        Self::new(self.freq, self.srate, q, self.db_gain)
    }

    /// A stage is degenerate when Q is not a positive finite number, when
    /// the frequency is outside `(0, srate/2)` or when the gain is NaN.
    pub fn has_effect(&self) -> bool {
        let q_ok = self.q.is_finite() && self.q > 0.0;
        let freq_ok = self.freq > 0.0 && self.freq < self.srate / 2.0;
        q_ok && freq_ok && !self.db_gain.is_nan() && self.coeffs.is_finite()
    }
}

impl fmt::Display for Biquad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type:PK,Freq:{:.1},Rate:{:.1},Q:{:.2},Gain:{:.2}",
            self.freq, self.srate, self.q, self.db_gain
        )
    }
}

/// One stage of a filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Broadband gain, linear factor applied at every frequency.
    Gain { gain: f64 },
    /// Peaking biquad.
    Peak(Biquad),
}

impl Filter {
    /// Gain stage from a dB value.
    pub fn gain_from_db(db: f64) -> Self {
        Filter::Gain {
            gain: 10.0_f64.powf(db / 20.0),
        }
    }

    /// False for stages that must not take part in the chain response.
    pub fn has_effect(&self) -> bool {
        match self {
            Filter::Gain { gain } => gain.is_finite() && *gain > 0.0,
            Filter::Peak(b) => b.has_effect(),
        }
    }

    /// Complex response at the given frequencies. Degenerate stages answer
    /// with unity.
    pub fn frequency_response(&self, freqs: &Array1<f64>) -> Vec<Complex64> {
        if !self.has_effect() {
            return vec![Complex64::new(1.0, 0.0); freqs.len()];
        }
        match self {
            Filter::Gain { gain } => vec![Complex64::new(*gain, 0.0); freqs.len()],
            Filter::Peak(b) => frequency_response(&b.coeffs, freqs, b.srate),
        }
    }

    /// Magnitude response in dB; zero for degenerate stages.
    pub fn response_db(&self, freqs: &Array1<f64>) -> Array1<f64> {
        if !self.has_effect() {
            return Array1::zeros(freqs.len());
        }
        match self {
            Filter::Gain { gain } => Array1::from_elem(freqs.len(), 20.0 * gain.log10()),
            Filter::Peak(_) => magnitude_db(&self.frequency_response(freqs)),
        }
    }
}

/// Represents a single row of a printed filter table.
#[derive(Debug, Clone, Default)]
pub struct FilterRow {
    /// Center frequency in Hz
    pub freq: f64,
    /// Q factor
    pub q: f64,
    /// Gain in dB
    pub gain: f64,
}

fn sorted_rows(peq: &[Filter]) -> Vec<FilterRow> {
    let mut rows: Vec<FilterRow> = peq
        .iter()
        .filter_map(|f| match f {
            Filter::Peak(b) => Some(FilterRow {
                freq: b.freq,
                q: b.q,
                gain: b.db_gain,
            }),
            Filter::Gain { .. } => None,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.freq
            .partial_cmp(&b.freq)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

/// Total broadband gain of the chain in dB.
pub fn preamp_gain_db(peq: &[Filter]) -> f64 {
    peq.iter()
        .filter(|f| f.has_effect())
        .map(|f| match f {
            Filter::Gain { gain } => 20.0 * gain.log10(),
            Filter::Peak(_) => 0.0,
        })
        .sum()
}

/// Print a formatted table of the chain, peaking stages sorted by frequency.
pub fn peq_print(peq: &[Filter]) {
    println!("Gain stage: {:+.3} dB", preamp_gain_db(peq));
    println!("+-# -|-Freq (Hz)--|-Q ---------|-Gain (dB)--|-Type-----+");
    for (i, r) in sorted_rows(peq).iter().enumerate() {
        println!(
            "| {:<2} | {:<10.2} | {:<10.3} | {:<+10.3} | {:<8} |",
            i + 1,
            r.freq,
            r.q,
            r.gain,
            "PK"
        );
    }
    println!("+----|------------|------------|------------|----------+");
}

/// Format the chain as an Equalizer APO configuration.
///
/// The gain stage becomes the `Preamp:` line.
pub fn peq_format_apo(comment: &str, peq: &[Filter]) -> String {
    let mut res = Vec::new();
    res.push(comment.to_string());
    res.push(format!("Preamp: {:.1} dB", preamp_gain_db(peq)));
    res.push(String::new());

    for (i, r) in sorted_rows(peq).iter().enumerate() {
        res.push(format!(
            "Filter {:2}: ON PK Fc {:5} Hz Gain {:+0.2} dB Q {:0.2}",
            i + 1,
            r.freq as i32,
            r.gain,
            r.q
        ));
    }
    res.push(String::new());
    res.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_peak_gain_at_center() {
        for &(fc, q, gain) in &[(1000.0, 1.0, 6.0), (100.0, 4.3, -12.0), (8000.0, 0.5, 3.0)] {
            let b = Biquad::new(fc, SRATE, q, gain);
            let h = frequency_response(b.coefficients(), &Array1::from(vec![fc]), SRATE);
            let expected = 10.0_f64.powf(gain / 20.0);
            assert!(
                approx_eq(h[0].norm(), expected, 1e-9),
                "fc={} q={} gain={}: {} vs {}",
                fc,
                q,
                gain,
                h[0].norm(),
                expected
            );
        }
    }

    #[test]
    fn test_peak_is_flat_far_away() {
        let b = Filter::Peak(Biquad::new(1000.0, SRATE, 5.0, -6.0));
        let db = b.response_db(&Array1::from(vec![10.0, 1000.0, 20000.0]));
        assert!(db[0].abs() < 0.01);
        assert!(approx_eq(db[1], -6.0, 1e-9));
        assert!(db[2].abs() < 0.05);
    }

    #[test]
    fn test_normalized_coefficients() {
        let c = synthesize_coefficients(500.0, 2.0, 4.0, SRATE);
        let n = c.normalized();
        assert_eq!(n.a0, 1.0);
        assert!(approx_eq(n.b0 * c.a0, c.b0, 1e-12));
        assert!(approx_eq(n.a2 * c.a0, c.a2, 1e-12));
    }

    #[test]
    fn test_has_effect() {
        assert!(Biquad::new(1000.0, SRATE, 1.0, 3.0).has_effect());
        assert!(!Biquad::new(1000.0, SRATE, 0.0, 3.0).has_effect());
        assert!(!Biquad::new(1000.0, SRATE, -1.0, 3.0).has_effect());
        assert!(!Biquad::new(1000.0, SRATE, f64::NAN, 3.0).has_effect());
        assert!(!Biquad::new(0.0, SRATE, 1.0, 3.0).has_effect());
        assert!(!Biquad::new(24000.0, SRATE, 1.0, 3.0).has_effect());
        assert!(!Biquad::new(1000.0, SRATE, 1.0, f64::NAN).has_effect());
    }

    #[test]
    fn test_degenerate_filter_is_transparent() {
        let freqs = Array1::from(vec![100.0, 1000.0]);
        let f = Filter::Peak(Biquad::new(30000.0, SRATE, 1.0, 6.0));
        assert!(f.response_db(&freqs).iter().all(|&v| v == 0.0));
        let h = f.frequency_response(&freqs);
        assert!(h.iter().all(|v| *v == Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_gain_stage() {
        let g = Filter::gain_from_db(-6.0);
        let freqs = Array1::from(vec![20.0, 2000.0, 20000.0]);
        let db = g.response_db(&freqs);
        assert!(db.iter().all(|&v| approx_eq(v, -6.0, 1e-12)));
        let h = g.frequency_response(&freqs);
        assert!(h.iter().all(|v| approx_eq(v.re, 10.0_f64.powf(-0.3), 1e-12)));
        assert!(approx_eq(preamp_gain_db(&[g]), -6.0, 1e-12));
    }

    #[test]
    fn test_serde_rebuilds_coefficients() {
        let f = Filter::Peak(Biquad::new(1000.0, SRATE, 2.0, -4.0));
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"type\":\"peak\""));
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
        assert!(back.has_effect());
    }

    #[test]
    fn test_format_apo() {
        let peq = vec![
            Filter::gain_from_db(-2.0),
            Filter::Peak(Biquad::new(3000.0, SRATE, 2.0, 1.5)),
            Filter::Peak(Biquad::new(100.0, SRATE, 1.0, -3.0)),
        ];
        let apo = peq_format_apo("# test", &peq);
        let lines: Vec<&str> = apo.lines().collect();
        assert_eq!(lines[0], "# test");
        assert_eq!(lines[1], "Preamp: -2.0 dB");
        assert!(lines[3].contains("Fc   100 Hz"));
        assert!(lines[4].contains("Fc  3000 Hz"));
        assert!(lines[4].contains("Gain +1.50 dB"));
    }
}
