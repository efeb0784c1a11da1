//! ghe - multi-account git helper
//!
//! Switches repositories between git identities and downloads files from
//! git hosts or any URL.
//!
//! Available as the `ghe` command.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ghe::cli::commands::{Cli, Commands};
use ghe::cli::prompt::{AssumeYes, Confirm, StdinConfirm};
use ghe::cli::{accounts, clone, download, health, lazy, push, status, switch};
use ghe::error::Result;

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Account store commands work anywhere
        Commands::List => accounts::handle_list(),
        Commands::Add(args) => accounts::handle_add(args),
        Commands::Remove { name, yes } => {
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };
            accounts::handle_remove(&name, confirm)
        }
        Commands::Log { limit } => status::handle_log(limit),
        Commands::Health => health::handle_health(),
        Commands::Clone(args) => clone::handle_clone(args),

        // Repository commands
        Commands::Status => status::handle_status(),
        Commands::Switch { name, method } => switch::handle_switch(&name, method.map(Into::into)),
        Commands::Push(args) => push::handle_push(args),
        Commands::Lazy => lazy::handle_lazy(),

        // Downloads
        Commands::Dl(args) => download::handle_dl(args).await,
        Commands::Dlx(args) => download::handle_dlx(args).await,
        Commands::DlDir(args) => download::handle_dl_dir(args).await,
        Commands::DlRelease(args) => download::handle_dl_release(args).await,
    }
}
