//! Push CLI command handler

use std::path::Path;

use crate::cli::commands::PushArgs;
use crate::cli::switch::{origin_repo_path, record_activity};
use crate::core::account::Account;
use crate::core::activity::{ActivityAction, ActivityEntry};
use crate::core::config::AppConfig;
use crate::core::credentials::{self, AuthPlan};
use crate::core::detector::{detect, RepoSnapshot};
use crate::core::git::GitRepository;
use crate::core::remote::RemoteInfo;
use crate::core::shell::{redact, ShellCommand, ShellExecutor, ShellOutput, SystemShell};
use crate::error::{GheError, Result};

/// Handle `ghe push`
pub fn handle_push(args: PushArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = GitRepository::open_current_dir()?;
    let account = push_account(&config, &repo, args.account.as_deref())?;

    let remote = RemoteInfo::from_url(&repo.require_origin_url()?)?;
    let plan = credentials::resolve(account, &remote)?;
    let branch = repo.current_branch()?;
    let root = repo.root_dir()?;

    if args.force {
        println!("Force pushing {} to origin as '{}' ({})...", branch, account.name, plan.method());
    } else {
        println!("Pushing {} to origin as '{}' ({})...", branch, account.name, plan.method());
    }

    let result = push_as(&SystemShell, &root, &plan, &branch, args.force, args.tags);
    record_activity(
        ActivityEntry::now(ActivityAction::Push, &account.name, plan.method(), result.is_ok())
            .with_repo_path(origin_repo_path(&repo).as_deref()),
    );
    result?;

    println!("✓ Pushed to origin/{}", branch);
    if args.tags {
        println!("✓ Tags pushed");
    }
    Ok(())
}

/// Explicit `--account`, else the detected active account
fn push_account<'a>(config: &'a AppConfig, repo: &GitRepository, explicit: Option<&str>) -> Result<&'a Account> {
    if let Some(name) = explicit {
        return config.require_account(name);
    }

    let snapshot = RepoSnapshot::capture(repo)?;
    let name = detect(&config.accounts, &snapshot).ok_or_else(|| {
        GheError::InvalidInput(
            "Cannot tell which account this repository uses.\n\n  → Run 'ghe switch <name>' first, or pass --account <name>."
                .into(),
        )
    })?;
    config.require_account(&name)
}

/// Push `branch` (and optionally tags) to origin with the plan's overrides
///
/// Tags go in a second push so a rejected tag never hides the branch result.
pub fn push_as<S: ShellExecutor + ?Sized>(
    shell: &S,
    repo_dir: &Path,
    plan: &AuthPlan,
    branch: &str,
    force: bool,
    tags: bool,
) -> Result<()> {
    let mut args = plan.push_overrides("origin");
    args.extend(["push".to_string(), "origin".to_string(), branch.to_string()]);
    if force {
        args.push("--force".to_string());
    }
    run_git(shell, &ShellCommand::git(args).in_dir(repo_dir), plan)?;

    if tags {
        let mut args = plan.push_overrides("origin");
        args.extend(["push".to_string(), "origin".to_string(), "--tags".to_string()]);
        run_git(shell, &ShellCommand::git(args).in_dir(repo_dir), plan)?;
    }
    Ok(())
}

/// Run git, masking the plan's secrets in logs and errors
pub(crate) fn run_git<S: ShellExecutor + ?Sized>(
    shell: &S,
    command: &ShellCommand,
    plan: &AuthPlan,
) -> Result<ShellOutput> {
    let secrets = plan.secrets();
    let secrets: Vec<&str> = secrets.iter().map(String::as_str).collect();
    tracing::debug!(command = %command.display_redacted(&secrets), "running git");

    let output = shell.run(command)?;
    if output.success() {
        return Ok(output);
    }
    Err(GheError::CommandFailed {
        program: "git".to_string(),
        code: output.exit_code,
        stderr: redact(output.stderr.trim(), &secrets),
    })
}
