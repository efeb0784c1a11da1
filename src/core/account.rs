//! Identity (account) model
//!
//! An account bundles a git identity (`user.name`/`user.email`) with one or
//! both credential mechanisms: an SSH key or a personal access token.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::platform::PlatformKind;

/// A configured identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account name (compared case-insensitively)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshCredential>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenCredential>,

    /// Platform the account belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformHint>,
}

/// SSH key credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshCredential {
    /// Path to the private key, `~` allowed
    pub key_path: String,
}

/// Personal access token credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCredential {
    pub username: String,

    #[serde(
        rename = "token",
        alias = "secretValue",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub secret: SecretString,
}

/// Declared hosting platform of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformHint {
    #[serde(rename = "type")]
    pub kind: PlatformKind,

    /// Domain, required for self-hosted platforms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Credential mechanism used for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Ssh,
    Token,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Ssh => write!(f, "ssh"),
            AuthMethod::Token => write!(f, "token"),
        }
    }
}

impl Account {
    /// Create a display-only account with no credentials
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            git_user_name: None,
            git_email: None,
            ssh: None,
            token: None,
            platform: None,
        }
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether the account can authenticate at all
    pub fn has_credentials(&self) -> bool {
        self.ssh.is_some() || self.token.is_some()
    }

    pub fn supports(&self, method: AuthMethod) -> bool {
        match method {
            AuthMethod::Ssh => self.ssh.is_some(),
            AuthMethod::Token => self.token.is_some(),
        }
    }

    /// Declared platform domain, if any
    ///
    /// Well-known platforms without an explicit domain use their canonical one.
    pub fn platform_domain(&self) -> Option<String> {
        let hint = self.platform.as_ref()?;
        hint.domain
            .as_deref()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .or_else(|| hint.kind.default_domain().map(str::to_string))
    }

    /// One-line identity summary for listings
    pub fn identity_line(&self) -> String {
        format!(
            "{} {}",
            self.git_user_name.as_deref().unwrap_or(""),
            self.git_email
                .as_deref()
                .map(|e| format!("<{e}>"))
                .unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

impl TokenCredential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Masked token for display
    pub fn masked(&self) -> String {
        mask_token(&self.secret)
    }
}

/// Get a masked version of a token for display (shows first 4 and last 4 chars)
pub fn mask_token(token: &SecretString) -> String {
    let exposed = token.expose_secret();
    let chars: Vec<char> = exposed.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        let short = SecretString::from("abc");
        assert_eq!(mask_token(&short), "***");

        let long = SecretString::from("ghp_1234567890abcdef");
        assert_eq!(mask_token(&long), "ghp_...cdef");
    }

    #[test]
    fn test_account_json_shape() {
        let json = r#"{
            "name": "work",
            "gitUserName": "Jane Doe",
            "gitEmail": "jane@corp.com",
            "ssh": { "keyPath": "~/.ssh/id_work" },
            "token": { "username": "jane-corp", "token": "ghp_secret" },
            "platform": { "type": "gitlab", "domain": "git.corp.com" }
        }"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.git_user_name.as_deref(), Some("Jane Doe"));
        assert_eq!(account.ssh.as_ref().unwrap().key_path, "~/.ssh/id_work");
        let token = account.token.as_ref().unwrap();
        assert_eq!(token.username, "jane-corp");
        assert_eq!(token.secret.expose_secret(), "ghp_secret");
        assert_eq!(account.platform_domain().as_deref(), Some("git.corp.com"));

        let out = serde_json::to_value(&account).unwrap();
        assert_eq!(out["token"]["token"], "ghp_secret");
        assert_eq!(out["platform"]["type"], "gitlab");
    }

    #[test]
    fn test_secret_value_alias_accepted() {
        let json = r#"{ "username": "u", "secretValue": "s3cr3t" }"#;
        let token: TokenCredential = serde_json::from_str(json).unwrap();
        assert_eq!(token.secret.expose_secret(), "s3cr3t");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let out = serde_json::to_string(&Account::new("bare")).unwrap();
        assert_eq!(out, r#"{"name":"bare"}"#);
    }

    #[test]
    fn test_platform_domain_defaults() {
        let mut account = Account::new("gh");
        assert_eq!(account.platform_domain(), None);
        account.platform = Some(PlatformHint {
            kind: PlatformKind::Github,
            domain: None,
        });
        assert_eq!(account.platform_domain().as_deref(), Some("github.com"));
    }

    #[test]
    fn test_is_named_case_insensitive() {
        let account = Account::new("Work");
        assert!(account.is_named("work"));
        assert!(!account.is_named("personal"));
    }
}
