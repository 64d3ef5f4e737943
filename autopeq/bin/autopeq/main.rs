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

use anyhow::{Context, Result, anyhow};
use autopeq::optim_callback::{
    CallbackAction, ProgressEvent, ProgressTracker, format_param_summary,
};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod save;

#[cfg(test)]
mod save_tests;

/// A command-line tool to design a parametric equalizer for a measured curve.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = autopeq::cli::Args::parse();
    let config = autopeq::cli::design_config_or_exit(&args);

    if let Err(e) = run(args, config).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: autopeq::cli::Args, config: autopeq::DesignConfig) -> Result<()> {
    let (measured, target) = autopeq::load_curves(&args.curve, args.target.as_deref())
        .context("Failed to load input curves")?;
    info!(
        "loaded {} measured points and {} target points",
        measured.len(),
        target.len()
    );

    // First Ctrl+C asks the optimizers to stop, the second one exits
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot install the signal handler: {}", e);
            return;
        }
        eprintln!("\n🛑 Interrupt received, stopping the design (Ctrl+C again to abort)");
        shutdown_clone.store(true, Ordering::Relaxed);
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let design_config = config.clone();
    let cancel = Arc::clone(&shutdown);
    let task = tokio::task::spawn_blocking(move || {
        let mut stages = ProgressTracker::default();
        let mut rounds = ProgressTracker::default();
        let mut report = |event: &ProgressEvent| {
            let line = match event {
                ProgressEvent::StageAccepted { .. } => stages.describe(event),
                ProgressEvent::RefineIteration { .. } => rounds.describe(event),
            };
            info!("{}", line);
            CallbackAction::Continue
        };
        autopeq::design_peq_with_callback(
            &measured,
            &target,
            &design_config,
            Some(cancel.as_ref()),
            &mut report,
        )
    });

    let result = task
        .await
        .map_err(|e| anyhow!("design task failed: {}", e))?
        .context("Design failed")?;

    autopeq::iir::peq_print(&result.chain);
    info!(
        "stages: {}",
        format_param_summary(&autopeq::x2peq::peq2x(&result.chain))
    );
    info!(
        "rms error {:.3} dB -> {:.3} dB ({:?}, refinement {:?} after {} rounds)",
        result.pre_rms,
        result.post_rms,
        result.greedy_stop,
        result.refine_stop,
        result.refine_iterations
    );

    if let Some(output) = &args.output {
        save::save_design(&result, &config, output)
            .await
            .context("Failed to save the design")?;
    }

    Ok(())
}
