//! Download target model
//!
//! A [`DownloadTarget`] is the classified form of one input URL. Its on-disk
//! destination is resolved lazily from the output settings so that tree
//! children can share the parent's output directory.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::core::platform::PlatformKind;
use crate::error::{GheError, Result};

/// Name used when a URL has no usable last path segment
pub const FALLBACK_FILE_NAME: &str = "download";

/// Default retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// What an input URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    /// Any http(s) URL fetched as-is
    RawFile,
    /// Single file in a hosted repository (web blob view)
    GitBlob,
    /// Directory in a hosted repository
    GitTree,
    /// Asset attached to a release
    ReleaseAsset,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TargetKind::RawFile => "file",
            TargetKind::GitBlob => "repository file",
            TargetKind::GitTree => "repository directory",
            TargetKind::ReleaseAsset => "release asset",
        };
        write!(f, "{}", label)
    }
}

/// What to do when the destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Leave the file alone and report the target as skipped
    Skip,
    /// Fail the target
    #[default]
    Error,
    /// Replace the file
    Overwrite,
}

/// Explicit git reference requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefOverride {
    Branch(String),
    Tag(String),
    Commit(String),
}

impl RefOverride {
    pub fn as_str(&self) -> &str {
        match self {
            RefOverride::Branch(r) | RefOverride::Tag(r) | RefOverride::Commit(r) => r,
        }
    }
}

/// Location of a directory inside a hosted repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRef {
    pub platform: PlatformKind,
    /// Web host, e.g. `github.com` or `gitlab.corp.com`
    pub host: String,
    /// Owner, including GitLab subgroups
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    /// Directory path inside the repository, empty for the root
    pub path: String,
}

impl TreeRef {
    /// `owner/repo`
    pub fn project_path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Path of `entry_path` relative to this tree's directory
    pub fn relative_path<'a>(&self, entry_path: &'a str) -> &'a str {
        let root = self.path.trim_matches('/');
        if root.is_empty() {
            return entry_path;
        }
        entry_path
            .strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(entry_path)
    }
}

/// Where output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Exact output file
    File(PathBuf),
    /// Directory receiving files under their own names
    Dir(PathBuf),
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Dir(PathBuf::from("."))
    }
}

/// One classified download
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    /// URL as given by the user
    pub source_url: String,
    /// URL actually requested
    pub fetch_url: String,
    pub kind: TargetKind,
    /// Set for [`TargetKind::GitTree`]
    pub tree: Option<TreeRef>,
    pub destination: Destination,
    /// Keep directory structure for tree children
    pub preserve_path: bool,
    /// Path below the tree root, set on tree children
    pub relative_path: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    pub follow_redirects: bool,
    pub overwrite: OverwritePolicy,
    /// Retries after the first attempt
    pub retries: u32,
}

impl DownloadTarget {
    /// Target fetching `url` as-is into the current directory
    pub fn raw(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            fetch_url: url.clone(),
            source_url: url,
            kind: TargetKind::RawFile,
            tree: None,
            destination: Destination::default(),
            preserve_path: false,
            relative_path: None,
            include: None,
            exclude: None,
            headers: Vec::new(),
            follow_redirects: true,
            overwrite: OverwritePolicy::default(),
            retries: DEFAULT_RETRIES,
        }
    }

    /// File name derived from the fetch URL
    pub fn file_name(&self) -> String {
        file_name_from_url(&self.fetch_url)
    }

    /// Final on-disk path
    pub fn resolve_destination(&self) -> PathBuf {
        match &self.destination {
            Destination::File(path) => path.clone(),
            Destination::Dir(dir) => match &self.relative_path {
                Some(rel) if self.preserve_path => safe_join(dir, rel),
                Some(rel) => {
                    let name = rel.rsplit('/').next().unwrap_or(rel);
                    safe_join(dir, name)
                }
                None => dir.join(self.file_name()),
            },
        }
    }

    /// Directory tree children are written under
    pub fn output_dir(&self) -> PathBuf {
        match &self.destination {
            Destination::File(path) | Destination::Dir(path) => path.clone(),
        }
    }

    /// Raw-file child of a tree target
    pub fn child(&self, raw_url: &str, relative_path: &str) -> DownloadTarget {
        DownloadTarget {
            source_url: raw_url.to_string(),
            fetch_url: raw_url.to_string(),
            kind: TargetKind::RawFile,
            tree: None,
            destination: Destination::Dir(self.output_dir()),
            preserve_path: self.preserve_path,
            relative_path: Some(relative_path.to_string()),
            include: None,
            exclude: None,
            headers: self.headers.clone(),
            follow_redirects: self.follow_redirects,
            overwrite: self.overwrite,
            retries: self.retries,
        }
    }
}

/// Last path segment of a URL, percent-decoded
pub fn file_name_from_url(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let decoded = percent_decode_str(&segment)
        .decode_utf8_lossy()
        .replace(['/', '\\'], "_");

    match decoded.trim() {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| GheError::InvalidInput(format!("header '{}' must look like 'Name: value'", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(GheError::InvalidInput(format!("header '{}' has no name", raw)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Join a relative path under `base`, dropping anything that would escape it
fn safe_join(base: &Path, relative: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in Path::new(relative).components() {
        if let Component::Normal(part) = component {
            out.push(part);
        }
    }
    out
}
