//! Account store
//!
//! Loads and saves the configured accounts as a JSON document:
//!
//! ```json
//! { "accounts": [ { "name": "work", "gitEmail": "me@corp.com", ... } ] }
//! ```
//!
//! The file lives in the platform config directory unless `GHE_CONFIG_DIR`
//! points somewhere else. A missing file is an empty store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::core::account::Account;
use crate::error::{GheError, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "GHE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.json";

/// Persisted application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Load configuration from a file, or an empty store if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using empty store");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            GheError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig = serde_json::from_str(&contents).map_err(|e| {
            GheError::Config(format!("'{}' is not valid: {}", path.display(), e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GheError::Config(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }

        let mut contents = serde_json::to_string_pretty(self)?;
        contents.push('\n');

        let write_error =
            |e: std::io::Error| GheError::Config(format!("cannot write '{}': {}", path.display(), e));

        // The file holds tokens: owner-only from the moment it exists
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_error)?;

        // `mode` only applies on creation; tighten files from older versions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                tracing::warn!(path = %path.display(), error = %e, "could not restrict config permissions");
            }
        }

        file.write_all(contents.as_bytes()).map_err(write_error)?;

        tracing::debug!(path = %path.display(), accounts = self.accounts.len(), "config saved");
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Get the configuration directory
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        let project_dirs = ProjectDirs::from("com", "ghe", "ghe")
            .ok_or_else(|| GheError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().to_path_buf())
    }

    /// Find an account by name (case-insensitive)
    pub fn find_account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.is_named(name))
    }

    /// Find an account by name or fail with `AccountNotFound`
    pub fn require_account(&self, name: &str) -> Result<&Account> {
        self.find_account(name)
            .ok_or_else(|| GheError::AccountNotFound(name.to_string()))
    }

    /// Add a new account, rejecting duplicate names
    pub fn add_account(&mut self, account: Account) -> Result<()> {
        let name = account.name.trim();
        if name.is_empty() {
            return Err(GheError::InvalidInput("Account name cannot be empty".into()));
        }
        if self.find_account(name).is_some() {
            return Err(GheError::InvalidInput(format!(
                "An account named '{}' already exists",
                name
            )));
        }
        self.accounts.push(account);
        Ok(())
    }

    /// Remove an account by name, returning it
    pub fn remove_account(&mut self, name: &str) -> Result<Account> {
        let index = self
            .accounts
            .iter()
            .position(|a| a.is_named(name))
            .ok_or_else(|| GheError::AccountNotFound(name.to_string()))?;
        Ok(self.accounts.remove(index))
    }

    /// Check that account names are unique
    fn validate(&self) -> Result<()> {
        for (i, account) in self.accounts.iter().enumerate() {
            if self.accounts[..i].iter().any(|a| a.is_named(&account.name)) {
                return Err(GheError::Config(format!(
                    "duplicate account name '{}'",
                    account.name
                )));
            }
        }
        Ok(())
    }
}
