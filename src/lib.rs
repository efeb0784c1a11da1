//! ghe - multi-account git helper
//!
//! This library provides the account engine (platform detection, active
//! account detection, credential resolution) and the download engine
//! behind the `ghe` command.

pub mod cli;
pub mod core;
pub mod download;
pub mod error;

pub use error::{GheError, Result};
