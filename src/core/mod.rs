//! Core functionality for ghe
//!
//! This module contains the account engine:
//! - Account model and JSON store
//! - Platform classification of remote URLs
//! - Active account detection
//! - Credential resolution into git-usable form
//! - Activity log
//! - Local git access and external program execution

pub mod account;
pub mod activity;
pub mod config;
pub mod credentials;
pub mod detector;
pub mod git;
pub mod platform;
pub mod remote;
pub mod shell;

pub use account::{Account, AuthMethod};
pub use activity::{ActivityAction, ActivityEntry, ActivityLog};
pub use config::AppConfig;
pub use credentials::AuthPlan;
pub use detector::detect_active_account;
pub use git::GitRepository;
pub use platform::{PlatformInfo, PlatformKind};
pub use remote::{AuthType, RemoteInfo};
pub use shell::{ShellCommand, ShellExecutor, ShellOutput, SystemShell};
