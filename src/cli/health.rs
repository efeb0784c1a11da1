//! Account health checks
//!
//! Local checks only; nothing here talks to the network.

use std::fs::File;

use secrecy::ExposeSecret;

use crate::core::account::Account;
use crate::core::config::AppConfig;
use crate::core::credentials::expand_home;
use crate::core::platform::PlatformKind;
use crate::error::{GheError, Result};

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub label: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl HealthCheck {
    fn pass(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Handle `ghe health`
///
/// Every account is reported; the command fails if any check failed.
pub fn handle_health() -> Result<()> {
    let config = AppConfig::load()?;
    if config.accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    let mut unhealthy = 0;
    for account in &config.accounts {
        let checks = check_account(account);
        let ok = checks.iter().all(|c| c.ok);
        if !ok {
            unhealthy += 1;
        }

        println!("{} {}", if ok { "✓" } else { "✗" }, account.name);
        for check in &checks {
            println!("    {} {:<10} {}", if check.ok { "✓" } else { "✗" }, check.label, check.detail);
        }
    }

    if unhealthy > 0 {
        return Err(GheError::InvalidInput(format!(
            "{} of {} accounts have problems",
            unhealthy,
            config.accounts.len()
        )));
    }
    Ok(())
}

/// Run every local check for one account
pub fn check_account(account: &Account) -> Vec<HealthCheck> {
    let mut checks = Vec::new();

    match (&account.git_user_name, &account.git_email) {
        (Some(_), Some(email)) if email.contains('@') => {
            checks.push(HealthCheck::pass("identity", account.identity_line()))
        }
        (_, Some(email)) if !email.contains('@') => {
            checks.push(HealthCheck::fail("identity", format!("'{}' is not an email address", email)))
        }
        _ => checks.push(HealthCheck::fail("identity", "user name or email missing")),
    }

    if !account.has_credentials() {
        checks.push(HealthCheck::fail("credential", "no SSH key or token configured"));
    }

    if let Some(ssh) = &account.ssh {
        let path = expand_home(&ssh.key_path);
        checks.push(match File::open(&path) {
            Ok(_) => HealthCheck::pass("ssh key", path.display().to_string()),
            Err(e) => HealthCheck::fail("ssh key", format!("{}: {}", path.display(), e)),
        });
    }

    if let Some(token) = &account.token {
        let secret = token.secret.expose_secret();
        checks.push(if token.username.trim().is_empty() || secret.trim().is_empty() {
            HealthCheck::fail("token", "username or token is empty")
        } else {
            HealthCheck::pass("token", format!("{} {}", token.username, token.masked()))
        });
    }

    if let Some(hint) = &account.platform {
        let domain = hint.domain.as_deref().map(str::trim).unwrap_or_default();
        checks.push(match hint.kind {
            PlatformKind::Custom if domain.is_empty() => {
                HealthCheck::fail("platform", "self-hosted platform without a domain")
            }
            _ if domain.contains('/') || domain.contains(' ') => {
                HealthCheck::fail("platform", format!("'{}' is not a host name", domain))
            }
            kind => HealthCheck::pass(
                "platform",
                account.platform_domain().unwrap_or_else(|| kind.display_name().to_string()),
            ),
        });
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::{PlatformHint, SshCredential, TokenCredential};
    use tempfile::NamedTempFile;

    fn failed(checks: &[HealthCheck]) -> Vec<&'static str> {
        checks.iter().filter(|c| !c.ok).map(|c| c.label).collect()
    }

    #[test]
    fn test_healthy_account() {
        let key = NamedTempFile::new().unwrap();
        let mut account = Account::new("work");
        account.git_user_name = Some("Jane".into());
        account.git_email = Some("jane@corp.com".into());
        account.ssh = Some(SshCredential {
            key_path: key.path().display().to_string(),
        });
        account.token = Some(TokenCredential::new("jane", "ghp_1234567890"));
        account.platform = Some(PlatformHint {
            kind: PlatformKind::Github,
            domain: None,
        });

        let checks = check_account(&account);
        assert!(failed(&checks).is_empty(), "{:?}", checks);
        let token = checks.iter().find(|c| c.label == "token").unwrap();
        assert!(!token.detail.contains("ghp_1234567890"));
    }

    #[test]
    fn test_problems_reported() {
        let mut account = Account::new("broken");
        account.git_email = Some("not-an-email".into());
        account.ssh = Some(SshCredential {
            key_path: "/definitely/missing/key".into(),
        });
        account.token = Some(TokenCredential::new("", ""));
        account.platform = Some(PlatformHint {
            kind: PlatformKind::Custom,
            domain: None,
        });

        assert_eq!(
            failed(&check_account(&account)),
            vec!["identity", "ssh key", "token", "platform"]
        );
    }

    #[test]
    fn test_display_only_account() {
        let account = Account::new("viewer");
        assert_eq!(failed(&check_account(&account)), vec!["identity", "credential"]);
    }
}
