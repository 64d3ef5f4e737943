#![doc = include_str!("../README.md")]

/// Error types for autopeq operations.
pub mod error;
pub use error::{AutopeqError, Result};

/// Frequency response curves
pub mod curve;
pub use curve::Curve;

/// Command-line argument definitions used by the binary
pub mod cli;
/// Peaking biquads, gain stages and chain formatting
pub mod iir;
/// Error metric and RMS helpers
pub mod loss;
/// Greedy placement, gradient refinement and their configuration
pub mod optim;
/// Progress reporting for the optimizers
pub mod optim_callback;
/// Parameter vector encoding
pub mod param_utils;
/// Data reading, frequency grids and resampling
pub mod read;
/// Chain responses over a frequency axis
pub mod response;
/// End-to-end design run
pub mod workflow;
/// Mapping between parameter vectors and chains
pub mod x2peq;

// Re-export commonly used items
pub use iir::{Biquad, Filter, Peq};
pub use optim::{GreedyConfig, RefineConfig, UpdateMode};
pub use optim_callback::{CallbackAction, ProgressEvent};
pub use read::*;
pub use workflow::*;
pub use x2peq::x2peq;
