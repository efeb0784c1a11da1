//! Active account detection
//!
//! Decides which configured account the current repository is using. The
//! checks run in a fixed order and the first decisive one wins:
//!
//! 1. Local `user.name` + `user.email` match an account exactly
//! 2. The username embedded in a token-form remote matches an account's token
//! 3. The SSH host alias names an account, or exactly one account is declared
//!    for the remote's domain with a matching credential type
//!
//! A check with several candidates is ambiguous and yields `None`; the
//! detector never picks one arbitrarily.

use std::path::Path;

use crate::core::account::{Account, AuthMethod};
use crate::core::git::{GitIdentity, GitRepository};
use crate::core::remote::{AuthType, RemoteInfo};
use crate::error::Result;

/// Repository facts the detector decides on
#[derive(Debug, Clone, Default)]
pub struct RepoSnapshot {
    /// Parsed `origin`, if present and parseable
    pub remote: Option<RemoteInfo>,
    /// Repository-local identity
    pub identity: GitIdentity,
}

impl RepoSnapshot {
    /// Read the snapshot from an open repository
    pub fn capture(repo: &GitRepository) -> Result<Self> {
        let remote = match repo.origin_url()? {
            Some(url) => match RemoteInfo::from_url(&url) {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::warn!(error = %e, "origin URL not recognised");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            remote,
            identity: repo.local_identity()?,
        })
    }
}

/// Outcome of one detection step
enum Step<'a> {
    Found(&'a Account),
    Ambiguous,
    NoMatch,
}

impl<'a> Step<'a> {
    fn from_candidates(candidates: Vec<&'a Account>) -> Self {
        match candidates.as_slice() {
            [] => Step::NoMatch,
            [only] => Step::Found(only),
            _ => Step::Ambiguous,
        }
    }
}

/// Detect the active account for the repository at `cwd`
///
/// Fails only when `cwd` is not inside a git repository.
pub fn detect_active_account(accounts: &[Account], cwd: &Path) -> Result<Option<String>> {
    let repo = GitRepository::discover(cwd)?;
    let snapshot = RepoSnapshot::capture(&repo)?;
    Ok(detect(accounts, &snapshot))
}

/// Detect the active account from a snapshot
pub fn detect(accounts: &[Account], snapshot: &RepoSnapshot) -> Option<String> {
    let steps: [(&str, for<'a> fn(&'a [Account], &RepoSnapshot) -> Step<'a>); 3] = [
        ("identity", by_identity),
        ("token-user", by_token_user),
        ("ssh-host", by_host),
    ];

    for (name, step) in steps {
        match step(accounts, snapshot) {
            Step::Found(account) => {
                tracing::debug!(step = name, account = %account.name, "active account detected");
                return Some(account.name.clone());
            }
            Step::Ambiguous => {
                tracing::debug!(step = name, "ambiguous account match");
                return None;
            }
            Step::NoMatch => {}
        }
    }

    None
}

fn by_identity<'a>(accounts: &'a [Account], snapshot: &RepoSnapshot) -> Step<'a> {
    let (Some(name), Some(email)) = (
        snapshot.identity.user_name.as_deref(),
        snapshot.identity.user_email.as_deref(),
    ) else {
        return Step::NoMatch;
    };

    Step::from_candidates(
        accounts
            .iter()
            .filter(|a| {
                a.git_user_name.as_deref() == Some(name)
                    && a.git_email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .collect(),
    )
}

fn by_token_user<'a>(accounts: &'a [Account], snapshot: &RepoSnapshot) -> Step<'a> {
    let Some(remote) = &snapshot.remote else {
        return Step::NoMatch;
    };
    let Some(user) = remote.token_username.as_deref() else {
        return Step::NoMatch;
    };

    Step::from_candidates(
        accounts
            .iter()
            .filter(|a| {
                a.token
                    .as_ref()
                    .is_some_and(|t| t.username.eq_ignore_ascii_case(user))
            })
            .collect(),
    )
}

fn by_host<'a>(accounts: &'a [Account], snapshot: &RepoSnapshot) -> Step<'a> {
    let Some(remote) = &snapshot.remote else {
        return Step::NoMatch;
    };

    if let Some(alias) = remote.platform.ssh_alias.as_deref() {
        let step = Step::from_candidates(accounts.iter().filter(|a| a.is_named(alias)).collect());
        if !matches!(step, Step::NoMatch) {
            return step;
        }
    }

    Step::from_candidates(
        accounts
            .iter()
            .filter(|a| {
                a.platform_domain()
                    .is_some_and(|d| d.eq_ignore_ascii_case(&remote.platform.domain))
            })
            .filter(|a| match remote.auth_type {
                AuthType::Ssh => a.supports(AuthMethod::Ssh),
                AuthType::Token => a.supports(AuthMethod::Token),
                AuthType::None => a.has_credentials(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::{PlatformHint, SshCredential, TokenCredential};
    use crate::core::git::test_support::init_repo;
    use crate::core::platform::PlatformKind;

    fn account(name: &str, user: &str, email: &str) -> Account {
        let mut a = Account::new(name);
        a.git_user_name = Some(user.into());
        a.git_email = Some(email.into());
        a
    }

    fn with_ssh(mut a: Account, kind: PlatformKind) -> Account {
        a.ssh = Some(SshCredential {
            key_path: format!("~/.ssh/id_{}", a.name),
        });
        a.platform = Some(PlatformHint { kind, domain: None });
        a
    }

    fn snapshot(remote: Option<&str>, name: Option<&str>, email: Option<&str>) -> RepoSnapshot {
        RepoSnapshot {
            remote: remote.map(|r| RemoteInfo::from_url(r).unwrap()),
            identity: GitIdentity {
                user_name: name.map(String::from),
                user_email: email.map(String::from),
            },
        }
    }

    #[test]
    fn test_identity_match_wins() {
        let accounts = vec![
            account("work", "Jane", "jane@corp.com"),
            account("personal", "Jane", "jane@home.net"),
        ];
        let snap = snapshot(
            Some("git@github.com:acme/api.git"),
            Some("Jane"),
            Some("JANE@corp.com"),
        );
        assert_eq!(detect(&accounts, &snap).as_deref(), Some("work"));
    }

    #[test]
    fn test_identity_requires_both_fields() {
        let accounts = vec![account("work", "Jane", "jane@corp.com")];
        let snap = snapshot(None, Some("Jane"), None);
        assert_eq!(detect(&accounts, &snap), None);
    }

    #[test]
    fn test_token_username_match() {
        let mut work = account("work", "Jane", "jane@corp.com");
        work.token = Some(TokenCredential::new("jane-corp", "t1"));
        let mut home = account("home", "Jane", "jane@home.net");
        home.token = Some(TokenCredential::new("jane", "t2"));

        let snap = snapshot(Some("https://jane-corp:t1@github.com/acme/api.git"), None, None);
        assert_eq!(detect(&[work, home], &snap).as_deref(), Some("work"));
    }

    #[test]
    fn test_ssh_alias_names_account() {
        let accounts = vec![
            with_ssh(Account::new("work"), PlatformKind::Github),
            with_ssh(Account::new("personal"), PlatformKind::Github),
        ];
        let snap = snapshot(Some("git@github.com-personal:me/site.git"), None, None);
        assert_eq!(detect(&accounts, &snap).as_deref(), Some("personal"));
    }

    #[test]
    fn test_single_platform_candidate() {
        let accounts = vec![
            with_ssh(Account::new("gh"), PlatformKind::Github),
            with_ssh(Account::new("gl"), PlatformKind::Gitlab),
        ];
        let snap = snapshot(Some("git@gitlab.com:group/app.git"), None, None);
        assert_eq!(detect(&accounts, &snap).as_deref(), Some("gl"));
    }

    #[test]
    fn test_credential_type_must_match_remote() {
        let mut token_only = Account::new("bot");
        token_only.token = Some(TokenCredential::new("bot", "t"));
        token_only.platform = Some(PlatformHint {
            kind: PlatformKind::Github,
            domain: None,
        });
        let snap = snapshot(Some("git@github.com:acme/api.git"), None, None);
        assert_eq!(detect(&[token_only], &snap), None);
    }

    #[test]
    fn test_ambiguous_is_none_and_deterministic() {
        let accounts = vec![
            with_ssh(Account::new("a"), PlatformKind::Github),
            with_ssh(Account::new("b"), PlatformKind::Github),
        ];
        let snap = snapshot(Some("git@github.com:acme/api.git"), None, None);
        for _ in 0..5 {
            assert_eq!(detect(&accounts, &snap), None);
        }

        let twins = vec![
            account("one", "Jane", "jane@corp.com"),
            account("two", "Jane", "jane@corp.com"),
        ];
        let snap = snapshot(None, Some("Jane"), Some("jane@corp.com"));
        assert_eq!(detect(&twins, &snap), None);
    }

    #[test]
    fn test_ambiguous_identity_does_not_fall_through() {
        let mut one = account("one", "Jane", "jane@corp.com");
        one.token = Some(TokenCredential::new("jane", "t"));
        let two = account("two", "Jane", "jane@corp.com");
        let snap = snapshot(
            Some("https://jane:t@github.com/acme/api.git"),
            Some("Jane"),
            Some("jane@corp.com"),
        );
        assert_eq!(detect(&[one, two], &snap), None);
    }

    #[test]
    fn test_no_accounts_or_remote() {
        assert_eq!(detect(&[], &RepoSnapshot::default()), None);
    }

    #[test]
    fn test_detect_from_repository() {
        let dir = init_repo(
            Some("git@github.com:acme/api.git"),
            Some("Jane"),
            Some("jane@corp.com"),
        );
        let accounts = vec![account("work", "Jane", "jane@corp.com")];
        let active = detect_active_account(&accounts, dir.path()).unwrap();
        assert_eq!(active.as_deref(), Some("work"));
    }

    #[test]
    fn test_detect_outside_repository_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(detect_active_account(&[], dir.path()).is_err());
    }
}
