//! Status and activity log command handlers

use crate::core::account::Account;
use crate::core::activity::{ActivityEntry, ActivityLog};
use crate::core::config::AppConfig;
use crate::core::detector::{detect, RepoSnapshot};
use crate::core::git::{GitIdentity, GitRepository};
use crate::core::remote::redact_url;
use crate::error::Result;

/// Handle `ghe status`
pub fn handle_status() -> Result<()> {
    let repo = GitRepository::open_current_dir()?;
    let config = AppConfig::load()?;
    let snapshot = RepoSnapshot::capture(&repo)?;

    println!("Repository: {}", repo.root_dir()?.display());
    if snapshot.remote.is_none() {
        match repo.origin_url()? {
            Some(url) => println!("Remote:     {} (unrecognised)", redact_url(&url)),
            None => println!("Remote:     (no origin)"),
        }
    }
    for (label, value) in describe(&snapshot, &config.accounts) {
        println!("{:<11} {}", format!("{}:", label), value);
    }
    match repo.current_branch() {
        Ok(branch) => println!("Branch:     {}", branch),
        Err(e) => tracing::debug!(error = %e, "no current branch"),
    }
    Ok(())
}

/// Label/value rows describing a repository snapshot
pub fn describe(snapshot: &RepoSnapshot, accounts: &[Account]) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();

    if let Some(remote) = &snapshot.remote {
        if let Some(owner) = remote.platform.owner() {
            rows.push(("Owner", owner.to_string()));
        }
        rows.push(("Remote", remote.redacted_url()));

        let kind = remote.platform.kind;
        rows.push((
            "Platform",
            format!("{} {} ({})", kind.icon(), kind.display_name(), remote.platform.domain),
        ));
        rows.push(("Auth", remote.auth_type.to_string()));
    }

    rows.push(("Identity", identity_text(&snapshot.identity)));
    rows.push((
        "Account",
        detect(accounts, snapshot).unwrap_or_else(|| "(unknown)".to_string()),
    ));
    rows
}

fn identity_text(identity: &GitIdentity) -> String {
    match (&identity.user_name, &identity.user_email) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (Some(name), None) => name.clone(),
        (None, Some(email)) => format!("<{}>", email),
        (None, None) => "(not set locally)".to_string(),
    }
}

/// Handle `ghe log`
pub fn handle_log(limit: usize) -> Result<()> {
    let entries = ActivityLog::open_default()?.recent(limit)?;
    if entries.is_empty() {
        println!("No activity recorded yet.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", log_line(entry));
    }
    Ok(())
}

/// One activity line, newest entries are printed first by the caller
pub fn log_line(entry: &ActivityEntry) -> String {
    format!(
        "{} {} {:<6} {:<16} {:<5} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        if entry.success { "✓" } else { "✗" },
        entry.action.to_string(),
        entry.account_name,
        entry.method.to_string(),
        entry.repo_path.as_deref().unwrap_or("-"),
    )
}
