//! CLI module for ghe
//!
//! Command definitions (clap) and thin handlers over `core` and `download`.

pub mod accounts;
pub mod clone;
pub mod commands;
pub mod download;
pub mod health;
pub mod lazy;
pub mod prompt;
pub mod push;
pub mod status;
pub mod switch;

pub use commands::{Cli, Commands};
