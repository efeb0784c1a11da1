//! Hosting platform detection
//!
//! Classifies git remote URLs and web URLs into a hosting platform plus the
//! canonical `owner/name` repository path. Supported forms:
//! - `https://github.com/owner/repo.git`
//! - `git@github.com:owner/repo.git`
//! - `ssh://git@github.com/owner/repo.git`
//! - `https://github.com/owner/repo/blob/main/README.md`

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GheError, Result};

/// Hosting platform kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
    /// Self-hosted or otherwise unknown host
    #[serde(alias = "self-hosted", alias = "selfhosted")]
    Custom,
}

/// Well-known hosting domains
const KNOWN_PLATFORMS: &[(&str, PlatformKind)] = &[
    ("github.com", PlatformKind::Github),
    ("gitlab.com", PlatformKind::Gitlab),
    ("bitbucket.org", PlatformKind::Bitbucket),
];

/// Path segments that end the repository part of a web URL
const ROUTE_MARKERS: &[&str] = &[
    "-", "blob", "tree", "raw", "src", "releases", "commit", "commits", "pull", "pulls",
    "issues", "archive", "wiki",
];

impl PlatformKind {
    /// Get a human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformKind::Github => "GitHub",
            PlatformKind::Gitlab => "GitLab",
            PlatformKind::Bitbucket => "Bitbucket",
            PlatformKind::Custom => "Self-hosted",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PlatformKind::Github => "🐙",
            PlatformKind::Gitlab => "🦊",
            PlatformKind::Bitbucket => "🪣",
            PlatformKind::Custom => "🏢",
        }
    }

    /// Canonical domain for well-known platforms
    pub fn default_domain(&self) -> Option<&'static str> {
        KNOWN_PLATFORMS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(domain, _)| *domain)
    }

    /// Look up a host in the known-platform table
    pub fn for_domain(domain: &str) -> Self {
        KNOWN_PLATFORMS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(domain))
            .map(|(_, kind)| *kind)
            .unwrap_or(PlatformKind::Custom)
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = GheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(PlatformKind::Github),
            "gitlab" => Ok(PlatformKind::Gitlab),
            "bitbucket" => Ok(PlatformKind::Bitbucket),
            "custom" | "self-hosted" | "selfhosted" => Ok(PlatformKind::Custom),
            other => Err(GheError::InvalidInput(format!(
                "Unknown platform '{}'\n\n  → Use one of: github, gitlab, bitbucket, custom",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Result of classifying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub kind: PlatformKind,
    /// Canonical domain (lower-cased, alias suffix removed)
    pub domain: String,
    /// `owner/name`, or `None` when the path is too short
    pub repo_path: Option<String>,
    /// SSH config host alias suffix, e.g. `work` for `github.com-work`
    pub ssh_alias: Option<String>,
}

impl PlatformInfo {
    /// Repository owner (first path segment)
    pub fn owner(&self) -> Option<&str> {
        self.repo_path.as_deref().and_then(|p| p.split('/').next())
    }
}

/// Classify a remote URL or web URL
pub fn classify(input: &str) -> Result<PlatformInfo> {
    let input = input.trim();
    let (host, path) = split_host_path(input)
        .ok_or_else(|| GheError::classification(input, "no recognizable host"))?;

    let (kind, domain, ssh_alias) = resolve_host(&host);
    let repo_path = repo_path_from(kind, &path);

    Ok(PlatformInfo {
        kind,
        domain,
        repo_path,
        ssh_alias,
    })
}

/// Split a URL into (host, path) for URL-style and scp-style remotes
pub(crate) fn split_host_path(input: &str) -> Option<(String, String)> {
    if input.contains("://") {
        let parsed = Url::parse(input).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        return Some((host, parsed.path().to_string()));
    }

    // scp-like syntax: [user@]host:path
    let (before, path) = input.split_once(':')?;
    let host = before.rsplit('@').next()?;
    if host.is_empty() || host.contains('/') || path.starts_with("//") {
        return None;
    }
    Some((host.to_ascii_lowercase(), path.to_string()))
}

/// Map a host (possibly an SSH alias) to platform, canonical domain and alias
fn resolve_host(host: &str) -> (PlatformKind, String, Option<String>) {
    let kind = PlatformKind::for_domain(host);
    if kind != PlatformKind::Custom {
        return (kind, host.to_string(), None);
    }

    // SSH aliases: github.com-work, github-work, gitlab.com_client
    for (domain, kind) in KNOWN_PLATFORMS {
        let short = domain.split('.').next().unwrap_or(domain);
        for prefix in [*domain, short] {
            if let Some(rest) = host.strip_prefix(prefix) {
                if let Some(alias) = rest.strip_prefix('-').or_else(|| rest.strip_prefix('_')) {
                    if !alias.is_empty() && !alias.contains('.') {
                        return (*kind, domain.to_string(), Some(alias.to_string()));
                    }
                }
            }
        }
    }

    (PlatformKind::Custom, host.to_string(), None)
}

/// Recover `owner/name` from a URL path
fn repo_path_from(kind: PlatformKind, path: &str) -> Option<String> {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .enumerate()
        .take_while(|(i, s)| *i < 2 || !ROUTE_MARKERS.contains(s))
        .map(|(_, s)| s)
        .collect();

    let segments: Vec<&str> = match kind {
        // Flat namespaces: anything after owner/name is a web route
        PlatformKind::Github | PlatformKind::Bitbucket => segments.into_iter().take(2).collect(),
        // GitLab subgroups: keep the full namespace
        PlatformKind::Gitlab | PlatformKind::Custom => segments,
    };

    if segments.len() < 2 {
        return None;
    }

    let joined = segments.join("/");
    let trimmed = joined.trim_end_matches(".git").trim_end_matches('/');
    if trimmed.split('/').any(str::is_empty) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_remote_forms_agree() {
        let forms = [
            "https://github.com/owner/repo.git",
            "https://github.com/owner/repo",
            "git@github.com:owner/repo.git",
            "git@github.com:owner/repo",
            "ssh://git@github.com/owner/repo.git",
            "ssh://git@github.com:22/owner/repo",
            "https://github.com/owner/repo/blob/main/src/lib.rs",
            "https://github.com/owner/repo/tree/main/docs",
        ];
        for form in forms {
            let info = classify(form).unwrap();
            assert_eq!(info.kind, PlatformKind::Github, "{form}");
            assert_eq!(info.domain, "github.com", "{form}");
            assert_eq!(info.repo_path.as_deref(), Some("owner/repo"), "{form}");
        }
    }

    #[test]
    fn test_known_platforms() {
        let info = classify("git@gitlab.com:group/project.git").unwrap();
        assert_eq!(info.kind, PlatformKind::Gitlab);
        assert_eq!(info.repo_path.as_deref(), Some("group/project"));

        let info = classify("https://bitbucket.org/team/repo/src/main/README.md").unwrap();
        assert_eq!(info.kind, PlatformKind::Bitbucket);
        assert_eq!(info.repo_path.as_deref(), Some("team/repo"));
    }

    #[test]
    fn test_gitlab_subgroups_preserved() {
        let info = classify("https://gitlab.com/group/sub/project/-/blob/main/a.txt").unwrap();
        assert_eq!(info.repo_path.as_deref(), Some("group/sub/project"));
    }

    #[test]
    fn test_custom_domain_retained() {
        let info = classify("git@git.example.org:team/tool.git").unwrap();
        assert_eq!(info.kind, PlatformKind::Custom);
        assert_eq!(info.domain, "git.example.org");
        assert_eq!(info.repo_path.as_deref(), Some("team/tool"));
    }

    #[test]
    fn test_ssh_alias_maps_to_platform() {
        let info = classify("git@github.com-work:acme/api.git").unwrap();
        assert_eq!(info.kind, PlatformKind::Github);
        assert_eq!(info.domain, "github.com");
        assert_eq!(info.ssh_alias.as_deref(), Some("work"));

        let info = classify("git@github-personal:me/dotfiles.git").unwrap();
        assert_eq!(info.ssh_alias.as_deref(), Some("personal"));
    }

    #[test]
    fn test_short_path_has_no_repo() {
        let info = classify("https://github.com/owner").unwrap();
        assert_eq!(info.repo_path, None);
        let info = classify("git@github.com:").unwrap();
        assert_eq!(info.repo_path, None);
    }

    #[test]
    fn test_unparseable_input() {
        assert!(classify("not-a-url").is_err());
        assert!(classify("").is_err());
        assert!(classify("file:///tmp/repo").is_err());
    }

    #[test]
    fn test_repo_named_like_route() {
        let info = classify("https://github.com/owner/src").unwrap();
        assert_eq!(info.repo_path.as_deref(), Some("owner/src"));
    }

    #[test]
    fn test_dotted_host_is_not_alias() {
        let info = classify("git@github-enterprise.corp.com:team/app.git").unwrap();
        assert_eq!(info.kind, PlatformKind::Custom);
        assert_eq!(info.domain, "github-enterprise.corp.com");
    }

    #[test]
    fn test_owner() {
        let info = classify("https://github.com/myorg/myrepo").unwrap();
        assert_eq!(info.owner(), Some("myorg"));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("GitLab".parse::<PlatformKind>().unwrap(), PlatformKind::Gitlab);
        assert_eq!("self-hosted".parse::<PlatformKind>().unwrap(), PlatformKind::Custom);
        assert!(matches!("svn".parse::<PlatformKind>(), Err(GheError::InvalidInput(_))));
    }
}
