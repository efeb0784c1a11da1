//! Account management command handlers

use crate::cli::commands::AddArgs;
use crate::cli::prompt::Confirm;
use crate::core::account::{Account, AuthMethod, PlatformHint, SshCredential, TokenCredential};
use crate::core::activity::{rank_accounts, ActivityLog};
use crate::core::config::AppConfig;
use crate::core::detector::detect_active_account;
use crate::core::platform::PlatformKind;
use crate::error::{GheError, Result};

/// Handle `ghe list`
pub fn handle_list() -> Result<()> {
    let config = AppConfig::load()?;
    if config.accounts.is_empty() {
        println!("No accounts configured.");
        println!();
        println!("  → Add one with: ghe add <name> --email <email> --ssh-key ~/.ssh/id_ed25519");
        return Ok(());
    }

    let recent = recent_names(config.accounts.len());
    let current = std::env::current_dir()
        .ok()
        .and_then(|cwd| detect_active_account(&config.accounts, &cwd).ok().flatten());

    println!("Accounts:");
    for account in rank_accounts(&config.accounts, &recent) {
        let is_current = current.as_deref().is_some_and(|c| account.is_named(c));
        println!("{}", account_line(account, is_current));
    }
    Ok(())
}

/// Handle `ghe add`
pub fn handle_add(args: AddArgs) -> Result<()> {
    let account = account_from_args(args)?;
    let name = account.name.clone();

    let mut config = AppConfig::load()?;
    config.add_account(account)?;
    config.save()?;

    println!("✓ Added account '{}'", name);
    Ok(())
}

/// Handle `ghe remove`
pub fn handle_remove(name: &str, confirm: &dyn Confirm) -> Result<()> {
    let mut config = AppConfig::load()?;
    let removed = remove_confirmed(&mut config, name, confirm)?;
    config.save()?;
    println!("✓ Removed account '{}'", removed.name);
    Ok(())
}

/// Remove `name` from `config` once the user agrees
pub fn remove_confirmed(config: &mut AppConfig, name: &str, confirm: &dyn Confirm) -> Result<Account> {
    let account = config.require_account(name)?;
    if !confirm.confirm(&format!("Remove account '{}'?", account.name))? {
        return Err(GheError::Cancelled);
    }
    config.remove_account(name)
}

/// Build an account from `ghe add` arguments
pub fn account_from_args(args: AddArgs) -> Result<Account> {
    let mut account = Account::new(args.name.trim());
    account.git_user_name = non_empty(args.user_name);
    account.git_email = non_empty(args.email);
    account.ssh = non_empty(args.ssh_key).map(|key_path| SshCredential { key_path });

    account.token = match (non_empty(args.token_user), non_empty(args.token)) {
        (Some(user), Some(token)) => Some(TokenCredential::new(user, token)),
        (None, None) => None,
        (Some(_), None) => {
            return Err(GheError::InvalidInput(
                "--token-user needs a token (--token or GHE_TOKEN)".into(),
            ))
        }
        // A GHE_TOKEN in the environment alone does not add a token credential
        (None, Some(_)) => None,
    };

    let domain = non_empty(args.domain).map(|d| d.to_ascii_lowercase());
    account.platform = match (args.platform.map(PlatformKind::from), domain) {
        (Some(PlatformKind::Custom), None) => {
            return Err(GheError::InvalidInput("A custom platform needs --domain".into()));
        }
        (Some(kind), domain) => Some(PlatformHint { kind, domain }),
        (None, Some(domain)) => Some(PlatformHint {
            kind: PlatformKind::for_domain(&domain),
            domain: Some(domain),
        }),
        (None, None) => None,
    };

    Ok(account)
}

/// One listing line
pub fn account_line(account: &Account, is_current: bool) -> String {
    let marker = if is_current { "●" } else { "○" };
    let mut methods = Vec::new();
    if account.supports(AuthMethod::Ssh) {
        methods.push("ssh");
    }
    if account.supports(AuthMethod::Token) {
        methods.push("token");
    }

    let mut line = format!("  {} {:<16} {}", marker, account.name, account.identity_line());
    if let Some(hint) = &account.platform {
        line.push_str(&format!("  {} {}", hint.kind.icon(), hint.kind.display_name()));
        if let Some(domain) = &hint.domain {
            line.push_str(&format!(" ({})", domain));
        }
    }
    if !methods.is_empty() {
        line.push_str(&format!("  [{}]", methods.join(", ")));
    }
    line.trim_end().to_string()
}

fn recent_names(limit: usize) -> Vec<String> {
    ActivityLog::open_default()
        .and_then(|log| log.recent_account_names(limit))
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "activity log unavailable");
            Vec::new()
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
