//! Activity log
//!
//! Append-only JSON-lines record of switches and pushes, used for the
//! `log` command and for ordering accounts most-recently-used first.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::account::{Account, AuthMethod};
use crate::core::config::AppConfig;
use crate::error::{GheError, Result};

const ACTIVITY_FILE: &str = "activity.jsonl";

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Switch,
    Push,
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityAction::Switch => write!(f, "switch"),
            ActivityAction::Push => write!(f, "push"),
        }
    }
}

/// One line of the activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    pub account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    pub method: AuthMethod,
    pub success: bool,
}

impl ActivityEntry {
    /// Entry stamped with the current time
    pub fn now(action: ActivityAction, account_name: &str, method: AuthMethod, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            account_name: account_name.to_string(),
            repo_path: None,
            method,
            success,
        }
    }

    pub fn with_repo_path(mut self, repo_path: Option<&str>) -> Self {
        self.repo_path = repo_path.map(str::to_string);
        self
    }
}

/// Handle on the activity file
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    /// Log stored next to the configuration file
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(AppConfig::config_dir()?.join(ACTIVITY_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry
    pub fn log_activity(&self, entry: &ActivityEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                GheError::Config(format!("cannot open '{}': {}", self.path.display(), e))
            })?;
        // A torn last record must not swallow this one
        if ends_mid_line(&mut file)? {
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())?;

        tracing::debug!(action = %entry.action, account = %entry.account_name, "activity logged");
        Ok(())
    }

    /// Every readable entry in file order; a missing file is empty
    pub fn entries(&self) -> Result<Vec<ActivityEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(number, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(line = number + 1, error = %e, "skipping corrupt activity entry");
                    None
                }
            })
            .collect())
    }

    /// Last `limit` entries appended, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        Ok(self.entries()?.into_iter().rev().take(limit).collect())
    }

    /// Distinct account names from the newest entries, newest first
    pub fn recent_account_names(&self, limit: usize) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for entry in self.recent(usize::MAX)? {
            if names.len() >= limit {
                break;
            }
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&entry.account_name)) {
                names.push(entry.account_name);
            }
        }
        Ok(names)
    }
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Order accounts recently used first, the rest alphabetically
pub fn rank_accounts<'a>(accounts: &'a [Account], recent_names: &[String]) -> Vec<&'a Account> {
    let mut ranked: Vec<&Account> = accounts.iter().collect();
    ranked.sort_by_key(|a| {
        let position = recent_names
            .iter()
            .position(|n| a.is_named(n))
            .unwrap_or(usize::MAX);
        (position, a.name.to_ascii_lowercase())
    });
    ranked
}
