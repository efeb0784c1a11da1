//! Local git repository access
//!
//! Thin wrapper around git2 for the reads and writes account switching needs:
//! - Repository discovery and validation
//! - Remote URL lookup and rewrite
//! - Local `user.name` / `user.email` / `core.sshCommand`
//! - Current branch

use std::path::{Path, PathBuf};

use git2::{ConfigLevel, ErrorCode, Repository};

use crate::error::{GheError, Result};

/// Local git identity (`user.name` / `user.email`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitIdentity {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

/// Wrapper for local git repository operations
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the git repository in the current directory
    pub fn open_current_dir() -> Result<Self> {
        Self::discover(".")
    }

    /// Discover a git repository from the given path
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|_| GheError::NotGitRepository)?;
        Ok(Self { repo })
    }

    /// Check if the given directory is inside a git repository
    pub fn is_git_repository<P: AsRef<Path>>(path: P) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Get the repository root directory
    pub fn root_dir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(|p| p.to_path_buf())
            .ok_or(GheError::NotGitRepository)
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> Result<String> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            // Detached HEAD state
            Ok(_) => Ok("HEAD".to_string()),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // No commits yet: HEAD still names the branch
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .unwrap_or("main")
                    .to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get the remote URL for a given remote name, if the remote exists
    pub fn remote_url(&self, remote_name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(remote_name) {
            Ok(remote) => Ok(remote.url().map(|s| s.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the origin remote URL, if configured
    pub fn origin_url(&self) -> Result<Option<String>> {
        self.remote_url("origin")
    }

    /// Get the origin remote URL or fail with `NoOriginRemote`
    pub fn require_origin_url(&self) -> Result<String> {
        self.origin_url()?.ok_or(GheError::NoOriginRemote)
    }

    /// Rewrite the stored URL of a remote
    pub fn set_remote_url(&self, remote_name: &str, url: &str) -> Result<()> {
        self.repo.remote_set_url(remote_name, url)?;
        Ok(())
    }

    /// Identity configured in this repository's own `.git/config`
    pub fn local_identity(&self) -> Result<GitIdentity> {
        let config = self.local_config()?;
        Ok(GitIdentity {
            user_name: read_string(&config, "user.name")?,
            user_email: read_string(&config, "user.email")?,
        })
    }

    /// Identity git would actually use (local, then global, then system)
    pub fn effective_identity(&self) -> Result<GitIdentity> {
        let config = self.repo.config()?.snapshot()?;
        Ok(GitIdentity {
            user_name: read_string(&config, "user.name")?,
            user_email: read_string(&config, "user.email")?,
        })
    }

    /// Read a value from the repository-local config
    pub fn local_config_value(&self, key: &str) -> Result<Option<String>> {
        read_string(&self.local_config()?, key)
    }

    /// Set a value in the repository-local config
    pub fn set_local_config(&self, key: &str, value: &str) -> Result<()> {
        self.local_config()?.set_str(key, value)?;
        Ok(())
    }

    /// Remove a value from the repository-local config (no-op if absent)
    pub fn unset_local_config(&self, key: &str) -> Result<()> {
        match self.local_config()?.remove(key) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn local_config(&self) -> Result<git2::Config> {
        Ok(self.repo.config()?.open_level(ConfigLevel::Local)?)
    }
}

fn read_string(config: &git2::Config, key: &str) -> Result<Option<String>> {
    // get_entry works on live configs, get_string needs a snapshot
    match config.get_entry(key) {
        Ok(entry) => Ok(entry
            .value()
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Initialise a repository with an optional origin and local identity
    pub fn init_repo(origin: Option<&str>, name: Option<&str>, email: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        if let Some(url) = origin {
            repo.remote("origin", url).unwrap();
        }
        let mut config = repo.config().unwrap().open_level(ConfigLevel::Local).unwrap();
        if let Some(name) = name {
            config.set_str("user.name", name).unwrap();
        }
        if let Some(email) = email {
            config.set_str("user.email", email).unwrap();
        }
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::init_repo;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        assert!(!GitRepository::is_git_repository(dir.path()));
        assert!(matches!(
            GitRepository::discover(dir.path()),
            Err(GheError::NotGitRepository)
        ));
    }

    #[test]
    fn test_origin_and_identity() {
        let dir = init_repo(Some("git@github.com:o/r.git"), Some("Jane"), Some("jane@x.io"));
        let repo = GitRepository::discover(dir.path()).unwrap();

        assert_eq!(repo.origin_url().unwrap().as_deref(), Some("git@github.com:o/r.git"));
        let identity = repo.local_identity().unwrap();
        assert_eq!(identity.user_name.as_deref(), Some("Jane"));
        assert_eq!(identity.user_email.as_deref(), Some("jane@x.io"));
    }

    #[test]
    fn test_missing_origin() {
        let dir = init_repo(None, None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        assert_eq!(repo.origin_url().unwrap(), None);
        assert!(matches!(repo.require_origin_url(), Err(GheError::NoOriginRemote)));
        assert_eq!(repo.local_identity().unwrap(), GitIdentity::default());
    }

    #[test]
    fn test_rewrite_remote_and_config() {
        let dir = init_repo(Some("https://github.com/o/r.git"), None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();

        repo.set_remote_url("origin", "git@github.com:o/r.git").unwrap();
        assert_eq!(repo.origin_url().unwrap().as_deref(), Some("git@github.com:o/r.git"));

        repo.set_local_config("core.sshCommand", "ssh -i key").unwrap();
        assert_eq!(
            repo.local_config_value("core.sshCommand").unwrap().as_deref(),
            Some("ssh -i key")
        );
        repo.unset_local_config("core.sshCommand").unwrap();
        repo.unset_local_config("core.sshCommand").unwrap();
        assert_eq!(repo.local_config_value("core.sshCommand").unwrap(), None);
    }

    #[test]
    fn test_unborn_branch_name() {
        let dir = init_repo(None, None, None);
        let repo = GitRepository::discover(dir.path()).unwrap();
        assert!(!repo.current_branch().unwrap().is_empty());
    }
}
