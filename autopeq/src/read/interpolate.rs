use crate::Curve;
use crate::curve::check_increasing;
use crate::error::{AutopeqError, Result};
use ndarray::Array1;

/// Create a standard logarithmic frequency grid
///
/// # Arguments
/// * `n_points` - Number of points, at least 2
/// * `f_min` - First frequency in Hz, strictly positive
/// * `f_max` - Last frequency in Hz, strictly above `f_min`
///
/// # Returns
/// * `n_points` frequencies evenly spaced in log space, strictly increasing
pub fn create_log_frequency_grid(n_points: usize, f_min: f64, f_max: f64) -> Result<Array1<f64>> {
    let valid = n_points >= 2 && f_min.is_finite() && f_max.is_finite() && 0.0 < f_min && f_min < f_max;
    if !valid {
        return Err(AutopeqError::InvalidRange {
            start: f_min,
            end: f_max,
            count: n_points,
        });
    }
    let mut grid = Array1::logspace(10.0, f_min.log10(), f_max.log10(), n_points);
    // pin the bounds so callers can compare against them exactly
    grid[0] = f_min;
    grid[n_points - 1] = f_max;
    Ok(grid)
}

/// Piecewise cubic Hermite slopes with the Fritsch-Carlson monotonicity
/// limiter: no overshoot between knots, flat where the data turns.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for i in 1..n - 1 {
        if delta[i - 1] * delta[i] > 0.0 {
            let w1 = 2.0 * h[i] + h[i - 1];
            let w2 = h[i] + 2.0 * h[i - 1];
            d[i] = (w1 + w2) / (w1 / delta[i - 1] + w2 / delta[i]);
        }
    }
    d[0] = pchip_end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = pchip_end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn pchip_end_slope(h0: f64, h1: f64, del0: f64, del1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * del0 - h0 * del1) / (h0 + h1);
    if d * del0 <= 0.0 {
        0.0
    } else if del0 * del1 < 0.0 && d.abs() > 3.0 * del0.abs() {
        3.0 * del0
    } else {
        d
    }
}

fn hermite(x: &[f64], y: &[f64], d: &[f64], j: usize, xq: f64) -> f64 {
    let h = x[j + 1] - x[j];
    let t = (xq - x[j]) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y[j] + h10 * h * d[j] + h01 * y[j + 1] + h11 * h * d[j + 1]
}

fn to_axis(values: &Array1<f64>, log_x: bool, what: &'static str) -> Result<Vec<f64>> {
    if let Some(&bad) = values
        .iter()
        .find(|&&v| !v.is_finite() || (log_x && v <= 0.0))
    {
        return Err(AutopeqError::InvalidRange {
            start: bad,
            end: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            count: values.len(),
        });
    }
    if !log_x {
        return Ok(values.to_vec());
    }
    log::trace!("log10 axis for {} ({} points)", what, values.len());
    Ok(values.iter().map(|v| v.log10()).collect())
}

/// Resample `(curve_x, curve_y)` onto `target_x`
///
/// Between input points the values follow a monotone cubic (PCHIP), in
/// `log10(x)` when `log_x` is set. Outside the input range the nearest input
/// value is held when `extrapolate_flat` is set; otherwise the end segment
/// is continued linearly with its end slope.
///
/// # Errors
/// * `LengthMismatch` when `curve_x` and `curve_y` differ in length
/// * `EmptyInput` when the curve has no points but `target_x` does
/// * `NotIncreasing` when `curve_x` is not strictly increasing
/// * `InvalidRange` when an abscissa is not finite, or not positive with `log_x`
pub fn resample(
    curve_x: &Array1<f64>,
    curve_y: &Array1<f64>,
    target_x: &Array1<f64>,
    extrapolate_flat: bool,
    log_x: bool,
) -> Result<Array1<f64>> {
    if curve_x.len() != curve_y.len() {
        return Err(AutopeqError::LengthMismatch {
            what: "curve x/y",
            left: curve_x.len(),
            right: curve_y.len(),
        });
    }
    if target_x.is_empty() {
        return Ok(Array1::zeros(0));
    }
    if curve_x.is_empty() {
        return Err(AutopeqError::EmptyInput { what: "curve to resample" });
    }
    check_increasing(curve_x, "curve to resample")?;

    let y = curve_y.to_vec();
    if y.len() == 1 {
        return Ok(Array1::from_elem(target_x.len(), y[0]));
    }

    let x = to_axis(curve_x, log_x, "source")?;
    let xt = to_axis(target_x, log_x, "target")?;
    let d = pchip_slopes(&x, &y);
    let n = x.len();

    let out = xt
        .iter()
        .map(|&xq| {
            if xq <= x[0] {
                if extrapolate_flat {
                    y[0]
                } else {
                    y[0] + d[0] * (xq - x[0])
                }
            } else if xq >= x[n - 1] {
                if extrapolate_flat {
                    y[n - 1]
                } else {
                    y[n - 1] + d[n - 1] * (xq - x[n - 1])
                }
            } else {
                // x[j] <= xq < x[j + 1]
                let j = x.partition_point(|&v| v <= xq).saturating_sub(1);
                hermite(&x, &y, &d, j.min(n - 2), xq)
            }
        })
        .collect::<Vec<f64>>();

    Ok(Array1::from(out))
}

/// Interpolate a curve onto a frequency grid in log-frequency space
///
/// Flat extrapolation is used at both ends so the edges of a measurement
/// never diverge.
///
/// # Arguments
/// * `freq_out` - Target frequency grid
/// * `curve` - Input frequency response
///
/// # Returns
/// * Interpolated curve on `freq_out`
pub fn interpolate_log_space(freq_out: &Array1<f64>, curve: &Curve) -> Result<Curve> {
    let spl = resample(&curve.freq, &curve.spl, freq_out, true, true)?;
    Ok(Curve {
        freq: freq_out.clone(),
        spl,
    })
}
