use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::Curve;
use crate::error::{AutopeqError, Result};
use ndarray::Array1;

fn load_error(path: &Path, message: impl Into<String>) -> AutopeqError {
    AutopeqError::CurveLoad {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Load frequency response data from a CSV or text file
///
/// Expected format: 2 columns `frequency, spl`, separated by a comma or by
/// whitespace. Empty lines, `#` / `//` comments and a textual header line are
/// skipped; extra columns are ignored.
pub fn load_frequency_response(path: &Path) -> Result<(Array1<f64>, Array1<f64>)> {
    let file = File::open(path).map_err(|e| load_error(path, e.to_string()))?;
    let reader = BufReader::new(file);

    let mut frequencies = Vec::new();
    let mut spl_values = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| load_error(path, format!("line {}: {}", line_num + 1, e)))?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let parts: Vec<&str> = if line.contains(',') {
            line.split(',').map(|s| s.trim()).collect()
        } else {
            line.split_whitespace().collect()
        };
        if parts.len() < 2 {
            return Err(load_error(
                path,
                format!("line {}: expected 2 columns, found {}", line_num + 1, parts.len()),
            ));
        }

        match (parts[0].parse::<f64>(), parts[1].parse::<f64>()) {
            (Ok(freq), Ok(spl)) => {
                frequencies.push(freq);
                spl_values.push(spl);
            }
            // header
            _ if frequencies.is_empty() => continue,
            _ => {
                return Err(load_error(
                    path,
                    format!("line {}: cannot parse '{}'", line_num + 1, line),
                ));
            }
        }
    }

    if frequencies.is_empty() {
        return Err(load_error(path, "no valid frequency response data found"));
    }

    Ok((Array1::from_vec(frequencies), Array1::from_vec(spl_values)))
}

/// Read a frequency response curve from a CSV file
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * A validated `Curve` (equal lengths, strictly increasing frequencies)
pub fn read_curve_from_csv(path: &Path) -> Result<Curve> {
    let (freq, spl) = load_frequency_response(path)?;
    Curve::new(freq, spl).map_err(|e| load_error(path, e.to_string()))
}
