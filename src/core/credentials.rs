//! Credential resolution
//!
//! Turns an account plus a remote into an [`AuthPlan`]: the git settings one
//! operation needs to authenticate as that account.
//!
//! ## Secret handling
//!
//! Token plans carry the credential-embedded URL in a [`TransientUrl`], which
//! has no `Display` impl and is only ever handed to git as a `-c` override for
//! a single process. The URL written to `.git/config` comes from
//! [`AuthPlan::persistent_remote_url`] and never contains a secret.

use std::path::PathBuf;

use directories::BaseDirs;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use secrecy::{ExposeSecret, SecretString};

use crate::core::account::{Account, AuthMethod};
use crate::core::remote::{AuthType, RemoteInfo};
use crate::error::{GheError, Result};

/// Characters escaped in URL user-info
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A credential-embedded URL that must not outlive one git invocation
#[derive(Clone)]
pub struct TransientUrl(SecretString);

impl TransientUrl {
    /// Expose the URL for a single process argument
    pub fn expose_for_argv(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for TransientUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TransientUrl(***)")
    }
}

/// Resolved authentication for one operation
#[derive(Debug, Clone)]
pub enum AuthPlan {
    /// Use `core.sshCommand` with the account's key
    Ssh {
        key_path: PathBuf,
        ssh_command: String,
        remote_url: String,
    },
    /// Use a token-embedded URL for this process only
    Token {
        username: String,
        secret: SecretString,
        transient_url: TransientUrl,
        clean_url: String,
    },
}

impl AuthPlan {
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthPlan::Ssh { .. } => AuthMethod::Ssh,
            AuthPlan::Token { .. } => AuthMethod::Token,
        }
    }

    /// URL safe to store as the remote in `.git/config`
    pub fn persistent_remote_url(&self) -> &str {
        match self {
            AuthPlan::Ssh { remote_url, .. } => remote_url,
            AuthPlan::Token { clean_url, .. } => clean_url,
        }
    }

    /// `-c key=value` pairs for `git push <remote_name>`
    ///
    /// `pushurl` replaces the stored URL for this push only; a stored remote
    /// normally has no `pushurl`, so exactly one destination is used.
    pub fn push_overrides(&self, remote_name: &str) -> Vec<String> {
        match self {
            AuthPlan::Ssh {
                ssh_command,
                remote_url,
                ..
            } => vec![
                "-c".to_string(),
                format!("core.sshCommand={}", ssh_command),
                "-c".to_string(),
                format!("remote.{}.pushurl={}", remote_name, remote_url),
            ],
            AuthPlan::Token { transient_url, .. } => vec![
                // Ignore stored helpers so they cannot answer for another account
                "-c".to_string(),
                "credential.helper=".to_string(),
                "-c".to_string(),
                format!(
                    "remote.{}.pushurl={}",
                    remote_name,
                    transient_url.expose_for_argv()
                ),
            ],
        }
    }

    /// `-c key=value` pairs for `git clone <persistent_remote_url>`
    pub fn clone_overrides(&self) -> Vec<String> {
        match self {
            AuthPlan::Ssh { ssh_command, .. } => {
                vec!["-c".to_string(), format!("core.sshCommand={}", ssh_command)]
            }
            AuthPlan::Token {
                transient_url,
                clean_url,
                ..
            } => vec![
                "-c".to_string(),
                "credential.helper=".to_string(),
                "-c".to_string(),
                format!(
                    "url.{}.insteadOf={}",
                    transient_url.expose_for_argv(),
                    clean_url
                ),
            ],
        }
    }

    /// Values that must be masked in any output derived from this plan
    pub fn secrets(&self) -> Vec<String> {
        match self {
            AuthPlan::Ssh { .. } => Vec::new(),
            AuthPlan::Token { secret, .. } => {
                let raw = secret.expose_secret().to_string();
                let encoded = utf8_percent_encode(&raw, USERINFO).to_string();
                if encoded == raw {
                    vec![raw]
                } else {
                    vec![raw, encoded]
                }
            }
        }
    }
}

/// Resolve a plan, choosing the method from the remote's current form
///
/// SSH remotes prefer the SSH key and https remotes prefer the token; an
/// account with only one credential uses that one.
pub fn resolve(account: &Account, remote: &RemoteInfo) -> Result<AuthPlan> {
    let preferred = match remote.auth_type {
        AuthType::Ssh => AuthMethod::Ssh,
        AuthType::Token | AuthType::None => AuthMethod::Token,
    };

    let method = if account.supports(preferred) {
        preferred
    } else if account.supports(AuthMethod::Ssh) {
        AuthMethod::Ssh
    } else if account.supports(AuthMethod::Token) {
        AuthMethod::Token
    } else {
        return Err(GheError::auth(
            &account.name,
            "it has neither an SSH key nor a token configured",
        ));
    };

    resolve_with(account, remote, method)
}

/// Resolve a plan for an explicit method
pub fn resolve_with(account: &Account, remote: &RemoteInfo, method: AuthMethod) -> Result<AuthPlan> {
    check_domain(account, remote)?;

    let repo_path = remote.repo_path().ok_or_else(|| {
        GheError::auth(
            &account.name,
            format!("cannot determine owner/repo from '{}'", remote.redacted_url()),
        )
    })?;

    let plan = match method {
        AuthMethod::Ssh => {
            let ssh = account.ssh.as_ref().ok_or_else(|| {
                GheError::auth(&account.name, "it has no SSH key configured")
            })?;
            if ssh.key_path.trim().is_empty() {
                return Err(GheError::auth(&account.name, "its SSH key path is empty"));
            }
            let key_path = expand_home(&ssh.key_path);
            let remote_url = remote.ssh_url().unwrap_or_else(|| {
                format!("git@{}:{}.git", remote.platform.domain, repo_path)
            });
            AuthPlan::Ssh {
                ssh_command: ssh_command_for(&key_path),
                key_path,
                remote_url,
            }
        }
        AuthMethod::Token => {
            let token = account.token.as_ref().ok_or_else(|| {
                GheError::auth(&account.name, "it has no access token configured")
            })?;
            if token.username.trim().is_empty() || token.secret.expose_secret().trim().is_empty() {
                return Err(GheError::auth(
                    &account.name,
                    "its token username or secret is empty",
                ));
            }
            let authority = remote.https_authority();
            let transient = format!(
                "https://{}:{}@{}/{}.git",
                utf8_percent_encode(&token.username, USERINFO),
                utf8_percent_encode(token.secret.expose_secret(), USERINFO),
                authority,
                repo_path
            );
            AuthPlan::Token {
                username: token.username.clone(),
                secret: token.secret.clone(),
                transient_url: TransientUrl(SecretString::from(transient)),
                clean_url: format!("https://{}/{}.git", authority, repo_path),
            }
        }
    };

    tracing::debug!(
        account = %account.name,
        method = %plan.method(),
        repo = repo_path,
        "resolved auth plan"
    );
    Ok(plan)
}

/// Reject accounts declared for a different host than the remote
fn check_domain(account: &Account, remote: &RemoteInfo) -> Result<()> {
    if let Some(declared) = account.platform_domain() {
        if !declared.eq_ignore_ascii_case(&remote.platform.domain) {
            return Err(GheError::auth(
                &account.name,
                format!(
                    "it is configured for '{}' but this remote is on '{}'",
                    declared, remote.platform.domain
                ),
            ));
        }
    }
    Ok(())
}

/// `ssh -i '<key>' -o IdentitiesOnly=yes`
pub fn ssh_command_for(key_path: &std::path::Path) -> String {
    let quoted = key_path.display().to_string().replace('\'', r"'\''");
    format!("ssh -i '{}' -o IdentitiesOnly=yes", quoted)
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    if path == "~" || path.starts_with("~/") {
        if let Some(base) = BaseDirs::new() {
            let rest = path.trim_start_matches('~').trim_start_matches('/');
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
