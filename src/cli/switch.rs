//! Switch CLI command handler

use crate::core::account::{Account, AuthMethod};
use crate::core::activity::{ActivityAction, ActivityEntry, ActivityLog};
use crate::core::config::AppConfig;
use crate::core::credentials::{self, AuthPlan};
use crate::core::git::GitRepository;
use crate::core::remote::RemoteInfo;
use crate::error::Result;

const SSH_COMMAND_KEY: &str = "core.sshCommand";

/// Handle `ghe switch <name>`
pub fn handle_switch(name: &str, method: Option<AuthMethod>) -> Result<()> {
    let config = AppConfig::load()?;
    let account = config.require_account(name)?;
    let repo = GitRepository::open_current_dir()?;

    let result = apply_switch(&repo, account, method);
    let used = match &result {
        Ok(plan) => plan.method(),
        Err(_) => method.unwrap_or_else(|| likely_method(account)),
    };
    record_activity(
        ActivityEntry::now(ActivityAction::Switch, &account.name, used, result.is_ok())
            .with_repo_path(origin_repo_path(&repo).as_deref()),
    );

    let plan = result?;
    println!("✓ Switched to '{}' ({})", account.name, plan.method());
    if account.git_user_name.is_some() || account.git_email.is_some() {
        println!("  identity: {}", account.identity_line());
    }
    println!("  origin:   {}", plan.persistent_remote_url());
    Ok(())
}

/// Point the repository at `account`
///
/// Rewrites `origin` to the plan's secret-free URL and binds the local
/// identity. Nothing is written when the plan cannot be resolved.
pub fn apply_switch(
    repo: &GitRepository,
    account: &Account,
    method: Option<AuthMethod>,
) -> Result<AuthPlan> {
    let remote = RemoteInfo::from_url(&repo.require_origin_url()?)?;
    let plan = match method {
        Some(method) => credentials::resolve_with(account, &remote, method)?,
        None => credentials::resolve(account, &remote)?,
    };

    repo.set_remote_url("origin", plan.persistent_remote_url())?;
    bind_account(repo, account, &plan)?;

    tracing::info!(account = %account.name, method = %plan.method(), "switched repository");
    Ok(plan)
}

/// Write the account's identity and SSH command into local config
pub(crate) fn bind_account(repo: &GitRepository, account: &Account, plan: &AuthPlan) -> Result<()> {
    if let Some(name) = &account.git_user_name {
        repo.set_local_config("user.name", name)?;
    }
    if let Some(email) = &account.git_email {
        repo.set_local_config("user.email", email)?;
    }

    match plan {
        AuthPlan::Ssh { ssh_command, .. } => repo.set_local_config(SSH_COMMAND_KEY, ssh_command),
        AuthPlan::Token { .. } => repo.unset_local_config(SSH_COMMAND_KEY),
    }
}

/// Append to the activity log; failures only warn
pub(crate) fn record_activity(entry: ActivityEntry) {
    let logged = ActivityLog::open_default().and_then(|log| log.log_activity(&entry));
    if let Err(e) = logged {
        tracing::warn!(error = %e, "could not record activity");
    }
}

pub(crate) fn origin_repo_path(repo: &GitRepository) -> Option<String> {
    let url = repo.origin_url().ok().flatten()?;
    let remote = RemoteInfo::from_url(&url).ok()?;
    remote.repo_path().map(str::to_string)
}

fn likely_method(account: &Account) -> AuthMethod {
    if account.supports(AuthMethod::Ssh) {
        AuthMethod::Ssh
    } else {
        AuthMethod::Token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::{SshCredential, TokenCredential};
    use crate::core::git::test_support::init_repo;
    use crate::error::GheError;

    fn ssh_account() -> Account {
        let mut account = Account::new("work");
        account.git_user_name = Some("Jane Work".into());
        account.git_email = Some("jane@corp.com".into());
        account.ssh = Some(SshCredential {
            key_path: "/keys/id_work".into(),
        });
        account
    }

    fn token_account() -> Account {
        let mut account = Account::new("oss");
        account.git_email = Some("jane@oss.dev".into());
        account.token = Some(TokenCredential::new("jane-oss", "ghp_t0psecret"));
        account
    }

    #[test]
    fn test_switch_to_ssh_account() {
        let dir = init_repo(Some("https://github.com/acme/api.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();

        let plan = apply_switch(&repo, &ssh_account(), None).unwrap();
        assert_eq!(plan.method(), AuthMethod::Ssh);
        assert_eq!(
            repo.origin_url().unwrap().as_deref(),
            Some("git@github.com:acme/api.git")
        );
        assert_eq!(
            repo.local_config_value("core.sshCommand").unwrap().as_deref(),
            Some("ssh -i '/keys/id_work' -o IdentitiesOnly=yes")
        );
        let identity = repo.local_identity().unwrap();
        assert_eq!(identity.user_name.as_deref(), Some("Jane Work"));
        assert_eq!(identity.user_email.as_deref(), Some("jane@corp.com"));
    }

    #[test]
    fn test_switch_to_token_account_stores_no_secret() {
        let dir = init_repo(Some("git@github.com:acme/api.git"), Some("Old"), None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        apply_switch(&repo, &ssh_account(), None).unwrap();

        let plan = apply_switch(&repo, &token_account(), None).unwrap();
        assert_eq!(plan.method(), AuthMethod::Token);
        assert_eq!(
            repo.origin_url().unwrap().as_deref(),
            Some("https://github.com/acme/api.git")
        );
        assert_eq!(repo.local_config_value("core.sshCommand").unwrap(), None);

        let stored = std::fs::read_to_string(dir.path().join(".git/config")).unwrap();
        assert!(!stored.contains("ghp_t0psecret"));
        // user.name is left alone when the account has none
        assert_eq!(repo.local_identity().unwrap().user_name.as_deref(), Some("Jane Work"));
    }

    #[test]
    fn test_switch_keeps_custom_ports() {
        let dir = init_repo(Some("ssh://git@git.corp.io:2222/team/app.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();

        apply_switch(&repo, &ssh_account(), None).unwrap();
        assert_eq!(
            repo.origin_url().unwrap().as_deref(),
            Some("ssh://git@git.corp.io:2222/team/app.git")
        );

        let dir = init_repo(Some("https://git.corp.io:8443/team/app.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        apply_switch(&repo, &token_account(), None).unwrap();
        assert_eq!(
            repo.origin_url().unwrap().as_deref(),
            Some("https://git.corp.io:8443/team/app.git")
        );
    }

    #[test]
    fn test_failed_switch_changes_nothing() {
        let dir = init_repo(Some("git@github.com:acme/api.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();

        let result = apply_switch(&repo, &ssh_account(), Some(AuthMethod::Token));
        assert!(matches!(result, Err(GheError::AuthResolution { .. })));
        assert_eq!(
            repo.origin_url().unwrap().as_deref(),
            Some("git@github.com:acme/api.git")
        );
        assert_eq!(repo.local_identity().unwrap().user_email, None);
    }

    #[test]
    fn test_switch_without_origin() {
        let dir = init_repo(None, None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        assert!(matches!(
            apply_switch(&repo, &ssh_account(), None),
            Err(GheError::NoOriginRemote)
        ));
        assert_eq!(origin_repo_path(&repo), None);
    }
}
