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

use autopeq::iir;
use autopeq::{DesignConfig, DesignResult};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Serialize)]
struct SavedDesign<'a> {
    config: &'a DesignConfig,
    result: &'a DesignResult,
}

/// Save a design next to `output_path`
///
/// # Arguments
/// * `result` - Finished design
/// * `config` - Configuration used for the run
/// * `output_path` - Base path; `.txt` (Equalizer APO) and `.json` are added
///
/// # Returns
/// * The paths of the APO and JSON files
pub(super) async fn save_design(
    result: &DesignResult,
    config: &DesignConfig,
    output_path: &Path,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    let apo_path = output_path.with_extension("txt");
    let json_path = output_path.with_extension("json");

    // Ensure parent directory exists
    if let Some(parent) = apo_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let comment = format!(
        "# AutoPEQ Parametric Equalizer Settings\n# Stages: {}\n# RMS error: {:.3} dB -> {:.3} dB\n# Sample rate: {} Hz\n# Generated: {}",
        result.num_peaks(),
        result.pre_rms,
        result.post_rms,
        config.greedy.sample_rate,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    fs::write(&apo_path, iir::peq_format_apo(&comment, &result.chain)).await?;
    info!("PEQ settings saved to: {}", apo_path.display());

    let json = serde_json::to_string_pretty(&SavedDesign { config, result })?;
    fs::write(&json_path, json).await?;
    info!("design result saved to: {}", json_path.display());

    Ok((apo_path, json_path))
}
