//! Clone CLI command handler

use std::path::{Path, PathBuf};

use crate::cli::commands::CloneArgs;
use crate::cli::push::run_git;
use crate::cli::switch::bind_account;
use crate::core::account::Account;
use crate::core::config::AppConfig;
use crate::core::credentials::{self, AuthPlan};
use crate::core::detector::{detect, RepoSnapshot};
use crate::core::git::GitRepository;
use crate::core::remote::RemoteInfo;
use crate::core::shell::{ShellCommand, ShellExecutor, SystemShell};
use crate::error::{GheError, Result};

/// Handle `ghe clone <url> [dir]`
pub fn handle_clone(args: CloneArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let remote = RemoteInfo::from_url(&args.url)?;
    let account = clone_account(&config, &remote, args.account.as_deref())?;

    let plan = match args.method {
        Some(method) => credentials::resolve_with(account, &remote, method.into())?,
        None => credentials::resolve(account, &remote)?,
    };

    println!(
        "Cloning {} as '{}' ({})...",
        plan.persistent_remote_url(),
        account.name,
        plan.method()
    );
    let cwd = std::env::current_dir()?;
    let target = clone_as(&SystemShell, &cwd, &plan, &remote, args.dir.as_deref())?;

    let repo = GitRepository::discover(&target)?;
    bind_account(&repo, account, &plan)?;

    println!("✓ Cloned into {}", target.display());
    Ok(())
}

/// Explicit `--account`, else the one account the URL alone points to
fn clone_account<'a>(config: &'a AppConfig, remote: &RemoteInfo, explicit: Option<&str>) -> Result<&'a Account> {
    if let Some(name) = explicit {
        return config.require_account(name);
    }

    let snapshot = RepoSnapshot {
        remote: Some(remote.clone()),
        ..Default::default()
    };
    let name = detect(&config.accounts, &snapshot).ok_or_else(|| {
        GheError::InvalidInput(format!(
            "No single account matches '{}'.\n\n  → Pass --account <name>.",
            remote.redacted_url()
        ))
    })?;
    config.require_account(&name)
}

/// Clone the plan's clean URL into `dir` (default: the repository name)
///
/// Returns the absolute path of the new working tree.
pub fn clone_as<S: ShellExecutor + ?Sized>(
    shell: &S,
    cwd: &Path,
    plan: &AuthPlan,
    remote: &RemoteInfo,
    dir: Option<&Path>,
) -> Result<PathBuf> {
    let dir = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default_clone_dir(remote)));
    let target = cwd.join(&dir);
    if target.exists() && target.read_dir()?.next().is_some() {
        return Err(GheError::DestinationExists(target.display().to_string()));
    }

    let mut args = plan.clone_overrides();
    args.extend([
        "clone".to_string(),
        plan.persistent_remote_url().to_string(),
        dir.display().to_string(),
    ]);
    run_git(shell, &ShellCommand::git(args).in_dir(cwd), plan)?;

    tracing::info!(target = %target.display(), method = %plan.method(), "cloned repository");
    Ok(target)
}

/// Last segment of `owner/repo`
fn default_clone_dir(remote: &RemoteInfo) -> &str {
    remote
        .repo_path()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("repository")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::{SshCredential, TokenCredential};
    use crate::core::git::test_support::init_repo;
    use crate::core::shell::{MockShellExecutor, ShellOutput};
    use tempfile::TempDir;

    fn account() -> Account {
        let mut account = Account::new("oss");
        account.git_user_name = Some("Jane".into());
        account.git_email = Some("jane@oss.dev".into());
        account.ssh = Some(SshCredential {
            key_path: "/keys/id_oss".into(),
        });
        account.token = Some(TokenCredential::new("jane", "ghp_cl0ne"));
        account
    }

    #[test]
    fn test_clone_uses_clean_url_and_transient_override() {
        let cwd = TempDir::new().unwrap();
        let remote = RemoteInfo::from_url("https://gitlab.com/group/sub/tool.git").unwrap();
        let plan = credentials::resolve(&account(), &remote).unwrap();

        let mut shell = MockShellExecutor::new();
        let expected_cwd = cwd.path().to_path_buf();
        shell
            .expect_run()
            .withf(move |cmd| {
                let args = cmd.args.join(" ");
                cmd.cwd.as_deref() == Some(expected_cwd.as_path())
                    && args.contains("credential.helper=")
                    && args.contains(".insteadOf=https://gitlab.com/group/sub/tool.git")
                    && args.ends_with("clone https://gitlab.com/group/sub/tool.git tool")
            })
            .times(1)
            .returning(|_| {
                Ok(ShellOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            });

        let target = clone_as(&shell, cwd.path(), &plan, &remote, None).unwrap();
        assert_eq!(target, cwd.path().join("tool"));
    }

    #[test]
    fn test_clone_refuses_non_empty_directory() {
        let cwd = TempDir::new().unwrap();
        std::fs::create_dir(cwd.path().join("api")).unwrap();
        std::fs::write(cwd.path().join("api/README"), "x").unwrap();

        let remote = RemoteInfo::from_url("git@github.com:acme/api.git").unwrap();
        let plan = credentials::resolve(&account(), &remote).unwrap();
        let shell = MockShellExecutor::new();

        let result = clone_as(&shell, cwd.path(), &plan, &remote, Some(Path::new("api")));
        assert!(matches!(result, Err(GheError::DestinationExists(_))));
    }

    #[test]
    fn test_bind_after_clone() {
        let dir = init_repo(Some("git@github.com:acme/api.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        let remote = RemoteInfo::from_url("git@github.com:acme/api.git").unwrap();
        let plan = credentials::resolve(&account(), &remote).unwrap();

        bind_account(&repo, &account(), &plan).unwrap();
        assert_eq!(repo.local_identity().unwrap().user_email.as_deref(), Some("jane@oss.dev"));
        assert!(repo.local_config_value("core.sshCommand").unwrap().is_some());
    }

    #[test]
    fn test_account_inferred_from_url() {
        let mut alias = account();
        alias.name = "work".into();
        let config = AppConfig {
            accounts: vec![account(), alias],
        };

        let remote = RemoteInfo::from_url("git@github.com-work:acme/api.git").unwrap();
        assert_eq!(clone_account(&config, &remote, None).unwrap().name, "work");

        let plain = RemoteInfo::from_url("git@github.com:acme/api.git").unwrap();
        assert!(clone_account(&config, &plain, None).is_err());
        assert_eq!(clone_account(&config, &plain, Some("oss")).unwrap().name, "oss");
    }
}
