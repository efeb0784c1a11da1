//! Remote information derived from a repository's `origin` URL

use url::Url;

use crate::core::platform::{self, PlatformInfo};
use crate::error::{GheError, Result};

/// How the remote URL authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// `git@host:` or `ssh://` remote
    Ssh,
    /// https remote with credentials in the user-info part
    Token,
    /// https remote without credentials
    None,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthType::Ssh => write!(f, "ssh"),
            AuthType::Token => write!(f, "token"),
            AuthType::None => write!(f, "none"),
        }
    }
}

/// Parsed view of a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    pub remote_url: String,
    pub platform: PlatformInfo,
    pub auth_type: AuthType,
    /// Host exactly as written in the URL (may be an SSH alias)
    pub host: String,
    /// User name embedded in a token-form URL
    pub token_username: Option<String>,
    /// Non-default port of the remote's own scheme
    pub port: Option<u16>,
}

impl RemoteInfo {
    /// Derive remote information from a URL
    pub fn from_url(remote_url: &str) -> Result<Self> {
        let remote_url = remote_url.trim();
        let platform = platform::classify(remote_url)?;
        let (host, _) = platform::split_host_path(remote_url)
            .ok_or_else(|| GheError::classification(remote_url, "no recognizable host"))?;

        let (auth_type, token_username) = detect_auth(remote_url);
        let port = explicit_port(remote_url, auth_type);

        Ok(Self {
            remote_url: remote_url.to_string(),
            platform,
            auth_type,
            host,
            token_username,
            port,
        })
    }

    /// `owner/name`
    pub fn repo_path(&self) -> Option<&str> {
        self.platform.repo_path.as_deref()
    }

    /// `domain[:port]` for https URLs
    ///
    /// The port is only carried over from an https remote; an SSH port means
    /// nothing to the web server.
    pub fn https_authority(&self) -> String {
        match self.port {
            Some(port) if self.auth_type != AuthType::Ssh => {
                format!("{}:{}", self.platform.domain, port)
            }
            _ => self.platform.domain.clone(),
        }
    }

    /// Clean https URL without credentials
    pub fn https_url(&self) -> Option<String> {
        self.repo_path()
            .map(|path| format!("https://{}/{}.git", self.https_authority(), path))
    }

    /// SSH URL, keeping any host alias
    ///
    /// scp-style unless the remote is SSH on a custom port, which scp syntax
    /// cannot express.
    pub fn ssh_url(&self) -> Option<String> {
        let path = self.repo_path()?;
        if self.auth_type != AuthType::Ssh {
            return Some(format!("git@{}:{}.git", self.platform.domain, path));
        }
        Some(match self.port {
            Some(port) => format!("ssh://git@{}:{}/{}.git", self.host, port, path),
            None => format!("git@{}:{}.git", self.host, path),
        })
    }

    /// Remote URL with any password removed, safe to print
    pub fn redacted_url(&self) -> String {
        redact_url(&self.remote_url)
    }
}

/// Remove the password part of an http(s) URL
pub fn redact_url(remote_url: &str) -> String {
    match Url::parse(remote_url) {
        Ok(mut parsed)
            if matches!(parsed.scheme(), "http" | "https") && parsed.password().is_some() =>
        {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                remote_url.to_string()
            }
        }
        _ => remote_url.to_string(),
    }
}

/// Port written in a URL-style remote, ignoring the scheme default
fn explicit_port(remote_url: &str, auth_type: AuthType) -> Option<u16> {
    if !remote_url.contains("://") {
        return None;
    }
    let port = Url::parse(remote_url).ok()?.port()?;
    match auth_type {
        AuthType::Ssh if port == 22 => None,
        _ => Some(port),
    }
}

fn detect_auth(remote_url: &str) -> (AuthType, Option<String>) {
    if !remote_url.contains("://") {
        // scp-like syntax is always SSH
        return (AuthType::Ssh, None);
    }

    match Url::parse(remote_url) {
        Ok(parsed) => match parsed.scheme() {
            "ssh" | "git+ssh" | "ssh+git" => (AuthType::Ssh, None),
            "http" | "https" if !parsed.username().is_empty() => {
                let username = percent_encoding::percent_decode_str(parsed.username())
                    .decode_utf8_lossy()
                    .into_owned();
                (AuthType::Token, Some(username))
            }
            _ => (AuthType::None, None),
        },
        Err(_) => (AuthType::None, None),
    }
}
