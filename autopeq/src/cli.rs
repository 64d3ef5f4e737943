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

//! Command-line interface definitions for the autopeq binary

use crate::error::Result;
use crate::optim::UpdateMode;
use crate::workflow::DesignConfig;
use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Design a parametric equalizer that brings a measured curve onto a target.
///
/// Values given on the command line override the ones read from `--config`.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the measured curve CSV file (format: frequency,spl).
    #[arg(short, long)]
    pub curve: PathBuf,

    /// Path to the optional target curve CSV file (format: frequency,spl).
    /// If not provided, a flat 0 dB target is assumed.
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// JSON file with a design configuration; missing keys keep their default.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base path of the output files (`<output>.txt` for Equalizer APO,
    /// `<output>.json` for the full result).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop placing stages once max |residual| is below this value (dB).
    #[arg(long, value_parser = parse_nonnegative_f64)]
    pub flatness_target: Option<f64>,

    /// Starting multiplier of the Q line search (must be > 1).
    #[arg(long, value_parser = parse_strictly_positive_f64)]
    pub initial_step_size: Option<f64>,

    /// Overshoot tolerance of a candidate stage (dB).
    #[arg(long, value_parser = parse_nonnegative_f64)]
    pub max_filter_error: Option<f64>,

    /// Largest boost a peaking stage may need after the gain stage (dB).
    #[arg(long)]
    pub max_gain: Option<f64>,

    /// Maximum number of peaking stages.
    #[arg(short = 'n', long)]
    pub max_stages: Option<usize>,

    /// Number of points of the logarithmic frequency axis.
    #[arg(long)]
    pub number_of_points: Option<usize>,

    /// First frequency of the axis (Hz).
    #[arg(long, value_parser = parse_strictly_positive_f64)]
    pub range_start: Option<f64>,

    /// Last frequency of the axis (Hz).
    #[arg(long, value_parser = parse_strictly_positive_f64)]
    pub range_end: Option<f64>,

    /// Refinement rounds of the Q line search.
    #[arg(long)]
    pub q_stages: Option<usize>,

    /// Initial Q of a new stage.
    #[arg(long, value_parser = parse_strictly_positive_f64)]
    pub start_q: Option<f64>,

    /// The sample rate for the IIR filters.
    #[arg(short, long, value_parser = parse_strictly_positive_f64)]
    pub sample_rate: Option<f64>,

    /// Maximum number of gradient refinement rounds.
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Relative perturbation of the finite differences.
    #[arg(long, value_parser = parse_strictly_positive_f64)]
    pub gradient_factor: Option<f64>,

    /// Gradient step, scaled by current / initial error.
    #[arg(long, value_parser = parse_nonnegative_f64)]
    pub step_size: Option<f64>,

    /// How a refinement round applies its gradient.
    #[arg(long, value_enum)]
    pub update_mode: Option<UpdateMode>,

    /// Skip the gradient refinement and keep the greedy chain.
    #[arg(long = "no-refine", default_value_t = false)]
    pub no_refine: bool,
}

impl Args {
    /// Build the design configuration: defaults, then `--config`, then the
    /// explicit flags.
    pub fn design_config(&self) -> Result<DesignConfig> {
        let mut config = match &self.config {
            Some(path) => DesignConfig::from_json_file(path)?,
            None => DesignConfig::default(),
        };
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with every flag given on the command line.
    pub fn apply_to(&self, config: &mut DesignConfig) {
        let greedy = &mut config.greedy;
        if let Some(v) = self.flatness_target {
            greedy.flatness_target = v;
        }
        if let Some(v) = self.initial_step_size {
            greedy.initial_step_size = v;
        }
        if let Some(v) = self.max_filter_error {
            greedy.max_filter_error = v;
        }
        if let Some(v) = self.max_gain {
            greedy.max_gain = v;
        }
        if let Some(v) = self.max_stages {
            greedy.max_stages = v;
        }
        if let Some(v) = self.number_of_points {
            greedy.number_of_points = v;
        }
        if let Some(v) = self.range_start {
            greedy.range_start = v;
        }
        if let Some(v) = self.range_end {
            greedy.range_end = v;
        }
        if let Some(v) = self.q_stages {
            greedy.q_stages = v;
        }
        if let Some(v) = self.start_q {
            greedy.start_q = v;
        }
        if let Some(v) = self.sample_rate {
            greedy.sample_rate = v;
        }

        let refine = &mut config.refine;
        if let Some(v) = self.iterations {
            refine.iterations = v;
        }
        if let Some(v) = self.gradient_factor {
            refine.gradient_factor = v;
        }
        if let Some(v) = self.step_size {
            refine.step_size = v;
        }
        if let Some(v) = self.update_mode {
            refine.update_mode = v;
        }
        if self.no_refine {
            refine.enabled = false;
        }
    }
}

/// Build the configuration or exit with a readable message
pub fn design_config_or_exit(args: &Args) -> DesignConfig {
    match args.design_config() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("❌ Validation Error: {}", error);
            process::exit(1);
        }
    }
}

// Custom value parser to enforce strictly positive f64 (> 0)
fn parse_strictly_positive_f64(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("invalid float: {s}"))?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err("value must be strictly positive (> 0)".to_string())
    }
}

// Custom value parser to enforce non-negative f64 (>= 0)
fn parse_nonnegative_f64(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("invalid float: {s}"))?;
    if v >= 0.0 {
        Ok(v)
    } else {
        Err("value must be non-negative (>= 0)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::parse_from(["autopeq", "--curve", "m.csv"]);
        assert_eq!(args.design_config().unwrap(), DesignConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"greedy": {"max_stages": 4, "start_q": 2.0}}"#)
            .unwrap();
        let path = f.path().to_str().unwrap().to_string();
        let args = Args::parse_from([
            "autopeq",
            "-c",
            "m.csv",
            "--config",
            &path,
            "-n",
            "6",
            "--update-mode",
            "batch",
            "--no-refine",
        ]);
        let config = args.design_config().unwrap();
        assert_eq!(config.greedy.max_stages, 6);
        assert_eq!(config.greedy.start_q, 2.0);
        assert_eq!(config.refine.update_mode, UpdateMode::Batch);
        assert!(!config.refine.enabled);
    }

    #[test]
    fn test_value_parsers() {
        assert!(Args::try_parse_from(["autopeq", "-c", "m.csv", "--start-q", "0"]).is_err());
        assert!(Args::try_parse_from(["autopeq", "-c", "m.csv", "--step-size", "-1"]).is_err());
        assert!(Args::try_parse_from(["autopeq", "-c", "m.csv", "--step-size", "0"]).is_ok());
    }

    #[test]
    fn test_invalid_combination_is_reported() {
        let args = Args::parse_from(["autopeq", "-c", "m.csv", "--range-end", "30000"]);
        assert!(args.design_config().unwrap_err().is_validation_error());
    }
}
