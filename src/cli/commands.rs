//! CLI command definitions using clap
//!
//! Defines the command structure for the `ghe` CLI tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::account::AuthMethod;
use crate::core::platform::PlatformKind;
use crate::download::target::{OverwritePolicy, RefOverride, DEFAULT_RETRIES};
use crate::download::orchestrator::DEFAULT_CONCURRENCY;

/// ghe - multi-account git helper
///
/// Switches repositories between git identities (SSH keys and access
/// tokens) and downloads files from repositories or any URL.
#[derive(Parser, Debug)]
#[command(name = "ghe", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured accounts (recently used first)
    List,

    /// Add an account
    Add(AddArgs),

    /// Remove an account
    Remove {
        /// Account name
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show repository, remote and active account
    Status,

    /// Switch this repository to an account
    Switch {
        /// Account name
        name: String,

        /// Credential to use (defaults to the remote's current form)
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },

    /// Push the current branch as the active account
    Push(PushArgs),

    /// Clone a repository as an account
    Clone(CloneArgs),

    /// Show recent switches and pushes
    Log {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Check every account's local configuration
    Health,

    /// Launch lazygit in this repository
    Lazy,

    /// Download files from repositories or any URL
    Dl(DlArgs),

    /// Download URLs as-is, without repository detection
    Dlx(DlxArgs),

    /// Download a repository directory
    DlDir(DlDirArgs),

    /// Download assets of a GitHub release
    DlRelease(DlReleaseArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Account Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments for `ghe add`
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique account name
    pub name: String,

    /// Value for git `user.name`
    #[arg(long)]
    pub user_name: Option<String>,

    /// Value for git `user.email`
    #[arg(long)]
    pub email: Option<String>,

    /// Path to the SSH private key
    #[arg(long)]
    pub ssh_key: Option<String>,

    /// Username for token authentication
    #[arg(long)]
    pub token_user: Option<String>,

    /// Personal access token
    #[arg(long, env = "GHE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Hosting platform of the account
    #[arg(long, value_enum)]
    pub platform: Option<PlatformArg>,

    /// Platform domain (required for self-hosted)
    #[arg(long)]
    pub domain: Option<String>,
}

/// Credential method argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodArg {
    Ssh,
    Token,
}

impl From<MethodArg> for AuthMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Ssh => AuthMethod::Ssh,
            MethodArg::Token => AuthMethod::Token,
        }
    }
}

/// Platform argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformArg {
    Github,
    Gitlab,
    Bitbucket,
    Custom,
}

impl From<PlatformArg> for PlatformKind {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Github => PlatformKind::Github,
            PlatformArg::Gitlab => PlatformKind::Gitlab,
            PlatformArg::Bitbucket => PlatformKind::Bitbucket,
            PlatformArg::Custom => PlatformKind::Custom,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Git Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Push command arguments
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Force push (use with caution)
    #[arg(long, short)]
    pub force: bool,

    /// Push tags as well
    #[arg(long)]
    pub tags: bool,

    /// Account to push as (defaults to the detected active account)
    #[arg(long)]
    pub account: Option<String>,
}

/// Clone command arguments
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Repository URL
    pub url: String,

    /// Target directory
    pub dir: Option<PathBuf>,

    /// Account to clone as
    #[arg(long, short)]
    pub account: Option<String>,

    /// Credential to use
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Download Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Options shared by every download command
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Output directory
    #[arg(short = 'd', long = "dir")]
    pub output_dir: Option<PathBuf>,

    /// Replace existing files
    #[arg(long, conflicts_with = "skip_existing")]
    pub overwrite: bool,

    /// Keep existing files and report them as skipped
    #[arg(long)]
    pub skip_existing: bool,

    /// Do not follow redirects
    #[arg(long)]
    pub no_redirect: bool,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// User-Agent header
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Parallel downloads
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub jobs: usize,

    /// Retries after the first attempt
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Seconds to wait for data before a retry
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Show per-file progress
    #[arg(long)]
    pub progress: bool,

    /// Authenticate requests with this account's token
    #[arg(long)]
    pub account: Option<String>,
}

impl TransferArgs {
    pub fn overwrite_policy(&self) -> OverwritePolicy {
        if self.overwrite {
            OverwritePolicy::Overwrite
        } else if self.skip_existing {
            OverwritePolicy::Skip
        } else {
            OverwritePolicy::Error
        }
    }
}

/// Git reference selection
#[derive(Args, Debug, Clone)]
#[group(multiple = false)]
pub struct RefArgs {
    /// Branch to download from
    #[arg(short = 'b', long)]
    pub branch: Option<String>,

    /// Tag to download from
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// Commit to download from
    #[arg(short = 'c', long)]
    pub commit: Option<String>,
}

impl RefArgs {
    pub fn to_override(&self) -> Option<RefOverride> {
        self.branch
            .clone()
            .map(RefOverride::Branch)
            .or_else(|| self.tag.clone().map(RefOverride::Tag))
            .or_else(|| self.commit.clone().map(RefOverride::Commit))
    }
}

/// Arguments for `ghe dl`
#[derive(Args, Debug)]
pub struct DlArgs {
    /// URLs to download
    #[arg(required_unless_present = "file_list")]
    pub urls: Vec<String>,

    /// Read URLs from a file (one per line, `#` comments)
    #[arg(short = 'f', long)]
    pub file_list: Option<PathBuf>,

    /// Output file (single URL only)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Keep directory structure for repository directories
    #[arg(long)]
    pub preserve_path: bool,

    /// Only files matching this glob (repository directories)
    #[arg(long, alias = "glob")]
    pub pattern: Option<String>,

    /// Skip files matching this glob (repository directories)
    #[arg(long)]
    pub exclude: Option<String>,

    #[command(flatten)]
    pub git_ref: RefArgs,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments for `ghe dlx`
#[derive(Args, Debug)]
pub struct DlxArgs {
    /// URLs to download
    #[arg(required_unless_present = "file_list")]
    pub urls: Vec<String>,

    /// Read URLs from a file (one per line, `#` comments)
    #[arg(short = 'f', long)]
    pub file_list: Option<PathBuf>,

    /// Output file (single URL only)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments for `ghe dl-dir`
#[derive(Args, Debug)]
pub struct DlDirArgs {
    /// Repository directory URL (`.../tree/<ref>/<path>`)
    pub url: String,

    /// Only files matching this glob
    #[arg(long)]
    pub pattern: Option<String>,

    /// Skip files matching this glob
    #[arg(long)]
    pub exclude: Option<String>,

    /// Flatten files into the output directory
    #[arg(long)]
    pub flat: bool,

    #[command(flatten)]
    pub git_ref: RefArgs,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments for `ghe dl-release`
#[derive(Args, Debug)]
pub struct DlReleaseArgs {
    /// Repository URL
    pub url: String,

    /// Release tag (defaults to the latest release)
    #[arg(short = 'v', long)]
    pub version: Option<String>,

    /// Only assets matching this glob
    #[arg(long)]
    pub asset: Option<String>,

    /// Extract downloaded `.tar.gz` assets
    #[arg(long)]
    pub extract: bool,

    #[command(flatten)]
    pub transfer: TransferArgs,
}
