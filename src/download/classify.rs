//! URL classification
//!
//! Turns an input URL into a [`DownloadTarget`] without touching the network.
//! Rules are tried in order and the first match wins:
//!
//! | Rule | Example path | Kind |
//! |------|--------------|------|
//! | release asset | `/o/r/releases/download/v1/app.tgz`, `/g/p/-/releases/v1/downloads/app.tgz` | `ReleaseAsset` |
//! | blob | `/o/r/blob/main/f`, `/g/p/-/blob/main/f`, `/o/r/src/main/f` | `GitBlob` |
//! | tree | `/o/r/tree/main/d`, `/g/p/-/tree/main/d`, `/o/r/src/main/d/` | `GitTree` |
//! | fallback | anything else over http(s) | `RawFile` |

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::core::platform::PlatformKind;
use crate::download::target::{
    Destination, DownloadTarget, OverwritePolicy, RefOverride, TargetKind, TreeRef,
    DEFAULT_RETRIES,
};
use crate::error::{GheError, Result};

static GITHUB_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<project>[^/]+/[^/]+)/releases/download/(?P<tag>[^/]+)/(?P<asset>.+)$").unwrap()
});
static GITLAB_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<project>.+?)/-/releases/(?P<tag>[^/]+)/downloads/(?P<asset>.+)$").unwrap()
});

static GITHUB_BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>[^/]+)/(?P<repo>[^/]+)/blob/(?P<ref>[^/]+)/(?P<path>.+)$").unwrap()
});
static GITLAB_BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>.+)/(?P<repo>[^/]+)/-/blob/(?P<ref>[^/]+)/(?P<path>.+)$").unwrap()
});
static BITBUCKET_BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>[^/]+)/(?P<repo>[^/]+)/src/(?P<ref>[^/]+)/(?P<path>.*[^/])$").unwrap()
});

static GITHUB_TREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>[^/]+)/(?P<repo>[^/]+)/tree/(?P<ref>[^/]+)(?:/(?P<path>.*))?$").unwrap()
});
static GITLAB_TREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>.+)/(?P<repo>[^/]+)/-/tree/(?P<ref>[^/]+)(?:/(?P<path>.*))?$").unwrap()
});
static BITBUCKET_TREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<owner>[^/]+)/(?P<repo>[^/]+)/src/(?P<ref>[^/]+)(?:/(?P<path>.*))?$").unwrap()
});

/// Output and transfer settings applied to every classified target
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Exact output file (single target only)
    pub output: Option<PathBuf>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    pub preserve_path: bool,
    /// Include glob for tree expansion
    pub include: Option<String>,
    /// Exclude glob for tree expansion
    pub exclude: Option<String>,
    /// Replaces the ref found in blob and tree URLs
    pub git_ref: Option<RefOverride>,
    pub headers: Vec<(String, String)>,
    pub follow_redirects: bool,
    pub overwrite: OverwritePolicy,
    pub retries: u32,
    /// Skip rule matching and fetch the URL as-is
    pub force_raw: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            output: None,
            output_dir: None,
            preserve_path: false,
            include: None,
            exclude: None,
            git_ref: None,
            headers: Vec::new(),
            follow_redirects: true,
            overwrite: OverwritePolicy::default(),
            retries: DEFAULT_RETRIES,
            force_raw: false,
        }
    }
}

impl ClassifyOptions {
    fn destination(&self) -> Destination {
        match (&self.output, &self.output_dir) {
            (Some(file), Some(dir)) if file.is_relative() => Destination::File(dir.join(file)),
            (Some(file), _) => Destination::File(file.clone()),
            (None, Some(dir)) => Destination::Dir(dir.clone()),
            (None, None) => Destination::default(),
        }
    }
}

/// Result of a matching rule
struct Classified {
    kind: TargetKind,
    fetch_url: String,
    tree: Option<TreeRef>,
}

type Rule = fn(&Url, PlatformKind, &ClassifyOptions) -> Option<Classified>;

/// Ordered rule table
const RULES: &[(&str, Rule)] = &[
    ("release-asset", release_asset),
    ("blob", git_blob),
    ("tree", git_tree),
];

/// Classify an input URL
pub fn classify(input: &str, options: &ClassifyOptions) -> Result<DownloadTarget> {
    let input = input.trim();
    let url = Url::parse(input).map_err(|e| GheError::classification(input, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(GheError::classification(
            input,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    let host = url
        .host_str()
        .ok_or_else(|| GheError::classification(input, "no host"))?;
    let platform = web_platform(host);

    let matched = if options.force_raw {
        None
    } else {
        RULES.iter().find_map(|(name, rule)| {
            let hit = rule(&url, platform, options)?;
            tracing::debug!(rule = name, url = input, "url classified");
            Some(hit)
        })
    };
    let classified = matched.unwrap_or_else(|| Classified {
        kind: TargetKind::RawFile,
        fetch_url: input.to_string(),
        tree: None,
    });

    Ok(DownloadTarget {
        source_url: input.to_string(),
        fetch_url: classified.fetch_url,
        kind: classified.kind,
        tree: classified.tree,
        destination: options.destination(),
        preserve_path: options.preserve_path,
        relative_path: None,
        include: options.include.clone(),
        exclude: options.exclude.clone(),
        headers: options.headers.clone(),
        follow_redirects: options.follow_redirects,
        overwrite: options.overwrite,
        retries: options.retries,
    })
}

/// Platform of a web host, ignoring a `www.` prefix
fn web_platform(host: &str) -> PlatformKind {
    PlatformKind::for_domain(host.strip_prefix("www.").unwrap_or(host))
}

fn release_asset(url: &Url, platform: PlatformKind, _: &ClassifyOptions) -> Option<Classified> {
    let path = url.path();
    let hit = GITHUB_RELEASE.is_match(path)
        || (platform != PlatformKind::Github && GITLAB_RELEASE.is_match(path));

    hit.then(|| Classified {
        kind: TargetKind::ReleaseAsset,
        fetch_url: url.to_string(),
        tree: None,
    })
}

fn git_blob(url: &Url, platform: PlatformKind, options: &ClassifyOptions) -> Option<Classified> {
    let path = url.path();
    let host = url.host_str()?;

    let fetch_url = match platform {
        PlatformKind::Github => {
            let caps = GITHUB_BLOB.captures(path)?;
            format!(
                "https://raw.githubusercontent.com/{}/{}/{}/{}",
                &caps["owner"],
                &caps["repo"],
                pick_ref(&caps, options),
                &caps["path"]
            )
        }
        PlatformKind::Bitbucket => {
            let caps = BITBUCKET_BLOB.captures(path)?;
            format!(
                "https://{}/{}/{}/raw/{}/{}",
                host,
                &caps["owner"],
                &caps["repo"],
                pick_ref(&caps, options),
                &caps["path"]
            )
        }
        PlatformKind::Gitlab | PlatformKind::Custom => {
            let caps = GITLAB_BLOB.captures(path)?;
            format!(
                "{}://{}/{}/{}/-/raw/{}/{}",
                url.scheme(),
                host_with_port(url)?,
                &caps["owner"],
                &caps["repo"],
                pick_ref(&caps, options),
                &caps["path"]
            )
        }
    };

    Some(Classified {
        kind: TargetKind::GitBlob,
        fetch_url,
        tree: None,
    })
}

fn git_tree(url: &Url, platform: PlatformKind, options: &ClassifyOptions) -> Option<Classified> {
    let path = url.path();
    let caps = match platform {
        PlatformKind::Github => GITHUB_TREE.captures(path)?,
        PlatformKind::Bitbucket => BITBUCKET_TREE.captures(path)?,
        PlatformKind::Gitlab | PlatformKind::Custom => GITLAB_TREE.captures(path)?,
    };

    let tree = TreeRef {
        platform,
        host: host_with_port(url)?,
        owner: caps["owner"].to_string(),
        repo: caps["repo"].trim_end_matches(".git").to_string(),
        git_ref: pick_ref(&caps, options),
        path: caps
            .name("path")
            .map(|m| m.as_str().trim_matches('/').to_string())
            .unwrap_or_default(),
    };

    Some(Classified {
        kind: TargetKind::GitTree,
        fetch_url: url.to_string(),
        tree: Some(tree),
    })
}

/// Ref from the override or the URL
fn pick_ref(caps: &Captures<'_>, options: &ClassifyOptions) -> String {
    options
        .git_ref
        .as_ref()
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| caps["ref"].to_string())
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_default(url: &str) -> DownloadTarget {
        classify(url, &ClassifyOptions::default()).unwrap()
    }

    #[test]
    fn test_github_blob() {
        let target = classify_default("https://github.com/o/r/blob/main/f.txt");
        assert_eq!(target.kind, TargetKind::GitBlob);
        assert_eq!(target.fetch_url, "https://raw.githubusercontent.com/o/r/main/f.txt");
        assert_eq!(target.file_name(), "f.txt");
    }

    #[test]
    fn test_gitlab_blob_with_subgroup() {
        let target = classify_default("https://gitlab.com/g/sub/p/-/blob/dev/src/lib.rs");
        assert_eq!(target.kind, TargetKind::GitBlob);
        assert_eq!(target.fetch_url, "https://gitlab.com/g/sub/p/-/raw/dev/src/lib.rs");
    }

    #[test]
    fn test_self_hosted_gitlab_blob() {
        let target = classify_default("https://git.corp.io:8443/team/app/-/blob/main/README.md");
        assert_eq!(target.kind, TargetKind::GitBlob);
        assert_eq!(target.fetch_url, "https://git.corp.io:8443/team/app/-/raw/main/README.md");
    }

    #[test]
    fn test_github_style_path_on_custom_host_is_raw() {
        let target = classify_default("https://git.corp.io/o/r/blob/main/f.txt");
        assert_eq!(target.kind, TargetKind::RawFile);
        assert_eq!(target.fetch_url, "https://git.corp.io/o/r/blob/main/f.txt");
    }

    #[test]
    fn test_bitbucket_blob_and_tree() {
        let blob = classify_default("https://bitbucket.org/o/r/src/main/docs/a.md");
        assert_eq!(blob.kind, TargetKind::GitBlob);
        assert_eq!(blob.fetch_url, "https://bitbucket.org/o/r/raw/main/docs/a.md");

        let tree = classify_default("https://bitbucket.org/o/r/src/main/docs/");
        assert_eq!(tree.kind, TargetKind::GitTree);
        assert_eq!(tree.tree.unwrap().path, "docs");
    }

    #[test]
    fn test_release_assets() {
        let gh = classify_default("https://github.com/o/r/releases/download/v1/asset.tar.gz");
        assert_eq!(gh.kind, TargetKind::ReleaseAsset);
        assert_eq!(gh.file_name(), "asset.tar.gz");

        let gl = classify_default("https://gitlab.com/g/p/-/releases/v2/downloads/bin/tool");
        assert_eq!(gl.kind, TargetKind::ReleaseAsset);

        let other = classify_default("https://dl.example.org/o/r/releases/download/v1/x.zip");
        assert_eq!(other.kind, TargetKind::ReleaseAsset);
    }

    #[test]
    fn test_github_tree() {
        let target = classify_default("https://github.com/o/r/tree/main/docs/guide");
        assert_eq!(target.kind, TargetKind::GitTree);
        let tree = target.tree.unwrap();
        assert_eq!(tree.platform, PlatformKind::Github);
        assert_eq!(tree.project_path(), "o/r");
        assert_eq!(tree.git_ref, "main");
        assert_eq!(tree.path, "docs/guide");

        let root = classify_default("https://github.com/o/r/tree/v2").tree.unwrap();
        assert_eq!(root.path, "");
    }

    #[test]
    fn test_gitlab_tree() {
        let tree = classify_default("https://gitlab.com/g/sub/p/-/tree/main/lib")
            .tree
            .unwrap();
        assert_eq!(tree.owner, "g/sub");
        assert_eq!(tree.repo, "p");
        assert_eq!(tree.path, "lib");
    }

    #[test]
    fn test_ref_override() {
        let options = ClassifyOptions {
            git_ref: Some(RefOverride::Tag("v1.2.0".into())),
            ..Default::default()
        };
        let blob = classify("https://github.com/o/r/blob/main/f.txt", &options).unwrap();
        assert_eq!(blob.fetch_url, "https://raw.githubusercontent.com/o/r/v1.2.0/f.txt");

        let tree = classify("https://github.com/o/r/tree/main/docs", &options).unwrap();
        assert_eq!(tree.tree.unwrap().git_ref, "v1.2.0");
    }

    #[test]
    fn test_plain_url_and_force_raw() {
        let plain = classify_default("https://example.com/files/report%202024.pdf");
        assert_eq!(plain.kind, TargetKind::RawFile);
        assert_eq!(plain.file_name(), "report 2024.pdf");

        let options = ClassifyOptions {
            force_raw: true,
            ..Default::default()
        };
        let forced = classify("https://github.com/o/r/blob/main/f.txt", &options).unwrap();
        assert_eq!(forced.kind, TargetKind::RawFile);
        assert_eq!(forced.fetch_url, "https://github.com/o/r/blob/main/f.txt");
    }

    #[test]
    fn test_output_settings() {
        let options = ClassifyOptions {
            output: Some(PathBuf::from("x.bin")),
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let target = classify("https://example.com/a.bin", &options).unwrap();
        assert_eq!(target.resolve_destination(), PathBuf::from("out/x.bin"));
    }

    #[test]
    fn test_rejects_unsupported_input() {
        let options = ClassifyOptions::default();
        assert!(matches!(
            classify("ftp://example.com/a", &options),
            Err(GheError::Classification { .. })
        ));
        assert!(matches!(
            classify("not a url", &options),
            Err(GheError::Classification { .. })
        ));
    }
}
