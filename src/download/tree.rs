//! Repository directory listing
//!
//! Expands a [`TreeRef`] into the files below it using each platform's API:
//! - GitHub: `GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1`
//! - GitLab: `GET /api/v4/projects/{id}/repository/tree` (paged via `x-next-page`)
//! - Bitbucket: `GET /2.0/repositories/{owner}/{repo}/src/{ref}/{path}/` (paged via `next`)

use std::future::Future;

use globset::{GlobBuilder, GlobMatcher};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::core::platform::PlatformKind;
use crate::download::target::TreeRef;
use crate::error::{GheError, Result};

const GITLAB_PAGE_SIZE: u32 = 100;
const BITBUCKET_PAGE_SIZE: u32 = 100;

/// Characters escaped inside one URL path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// A file inside a repository tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path from the repository root
    pub path: String,
    /// URL serving the file's raw content
    pub raw_url: String,
}

/// Lists the files of a repository directory
pub trait TreeLister: Send + Sync {
    fn list(&self, tree: &TreeRef) -> impl Future<Output = Result<Vec<TreeEntry>>> + Send;
}

/// API locations, overridable for tests and mirrors
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub github_api: String,
    pub github_raw: String,
    pub bitbucket_api: String,
    /// Scheme used for GitLab and self-hosted hosts
    pub gitlab_scheme: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".into(),
            github_raw: "https://raw.githubusercontent.com".into(),
            bitbucket_api: "https://api.bitbucket.org".into(),
            gitlab_scheme: "https".into(),
        }
    }
}

/// Token sent to the platform APIs
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub username: String,
    pub secret: SecretString,
    /// Hosts the token belongs to; it is never sent anywhere else
    pub hosts: Vec<String>,
}

impl ApiToken {
    pub fn allows(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }
}

/// Hosts serving API and raw content for a platform besides its own domain
pub fn companion_hosts(kind: PlatformKind) -> &'static [&'static str] {
    match kind {
        PlatformKind::Github => &["api.github.com", "raw.githubusercontent.com", "codeload.github.com"],
        PlatformKind::Bitbucket => &["api.bitbucket.org"],
        PlatformKind::Gitlab | PlatformKind::Custom => &[],
    }
}

/// [`TreeLister`] backed by the hosting platforms' REST APIs
#[derive(Debug, Clone)]
pub struct HttpTreeLister {
    client: Client,
    endpoints: ApiEndpoints,
    token: Option<ApiToken>,
}

#[derive(Deserialize)]
struct GithubTree {
    tree: Vec<GithubTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct GithubTreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct GitlabTreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct BitbucketPage {
    #[serde(default)]
    values: Vec<BitbucketItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct BitbucketItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl HttpTreeLister {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: ApiEndpoints::default(),
            token: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_token(mut self, token: Option<ApiToken>) -> Self {
        self.token = token;
        self
    }

    fn authorize(&self, request: RequestBuilder, tree: &TreeRef) -> RequestBuilder {
        let Some(token) = self.token.as_ref().filter(|t| t.allows(&tree.host)) else {
            return request;
        };
        let secret = token.secret.expose_secret();
        match tree.platform {
            PlatformKind::Github => request.bearer_auth(secret),
            PlatformKind::Gitlab | PlatformKind::Custom => request.header("PRIVATE-TOKEN", secret),
            PlatformKind::Bitbucket => request.basic_auth(&token.username, Some(secret)),
        }
    }

    async fn get(&self, url: &str, tree: &TreeRef) -> Result<reqwest::Response> {
        tracing::debug!(url, "listing tree");
        let response = self
            .authorize(self.client.get(url), tree)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GheError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn list_github(&self, tree: &TreeRef) -> Result<Vec<TreeEntry>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.endpoints.github_api,
            tree.owner,
            tree.repo,
            encode(&tree.git_ref)
        );
        let listing: GithubTree = self.get(&url, tree).await?.json().await?;
        if listing.truncated {
            return Err(GheError::InvalidInput(format!(
                "GitHub returned an incomplete file listing for {}.\n\n  → The repository is too large to list at once; download a narrower directory or clone it instead.",
                tree.project_path()
            )));
        }

        Ok(listing
            .tree
            .into_iter()
            .filter(|item| item.kind == "blob")
            .filter(|item| is_below(&tree.path, &item.path))
            .map(|item| TreeEntry {
                raw_url: format!(
                    "{}/{}/{}/{}/{}",
                    self.endpoints.github_raw,
                    encode_path(&tree.owner),
                    encode_path(&tree.repo),
                    encode_path(&tree.git_ref),
                    encode_path(&item.path)
                ),
                path: item.path,
            })
            .collect())
    }

    async fn list_gitlab(&self, tree: &TreeRef) -> Result<Vec<TreeEntry>> {
        let base = format!("{}://{}", self.endpoints.gitlab_scheme, tree.host);
        let project = encode(&tree.project_path());
        let mut entries = Vec::new();
        let mut page = String::from("1");

        loop {
            let mut url = format!(
                "{}/api/v4/projects/{}/repository/tree?ref={}&recursive=true&per_page={}&page={}",
                base,
                project,
                encode(&tree.git_ref),
                GITLAB_PAGE_SIZE,
                page
            );
            if !tree.path.is_empty() {
                url.push_str(&format!("&path={}", encode(&tree.path)));
            }

            let response = self.get(&url, tree).await?;
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let items: Vec<GitlabTreeItem> = response.json().await?;
            entries.extend(items.into_iter().filter(|i| i.kind == "blob").map(|item| {
                TreeEntry {
                    raw_url: format!(
                        "{}/{}/-/raw/{}/{}",
                        base,
                        encode_path(&tree.project_path()),
                        encode_path(&tree.git_ref),
                        encode_path(&item.path)
                    ),
                    path: item.path,
                }
            }));

            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(entries)
    }

    async fn list_bitbucket(&self, tree: &TreeRef) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![tree.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut next = Some(format!(
                "{}/2.0/repositories/{}/{}/src/{}/{}?pagelen={}",
                self.endpoints.bitbucket_api,
                tree.owner,
                tree.repo,
                encode(&tree.git_ref),
                dir_segment(&dir),
                BITBUCKET_PAGE_SIZE
            ));

            while let Some(url) = next.take() {
                let page: BitbucketPage =
                    self.get(&url, tree).await?.json().await?;
                for item in page.values {
                    match item.kind.as_str() {
                        "commit_directory" => pending.push(item.path),
                        "commit_file" => entries.push(TreeEntry {
                            raw_url: format!(
                                "https://{}/{}/{}/raw/{}/{}",
                                tree.host,
                                encode_path(&tree.owner),
                                encode_path(&tree.repo),
                                encode_path(&tree.git_ref),
                                encode_path(&item.path)
                            ),
                            path: item.path,
                        }),
                        _ => {}
                    }
                }
                next = page.next;
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl TreeLister for HttpTreeLister {
    async fn list(&self, tree: &TreeRef) -> Result<Vec<TreeEntry>> {
        match tree.platform {
            PlatformKind::Github => self.list_github(tree).await,
            PlatformKind::Gitlab | PlatformKind::Custom => self.list_gitlab(tree).await,
            PlatformKind::Bitbucket => self.list_bitbucket(tree).await,
        }
    }
}

/// Include/exclude glob filter over paths relative to the tree root
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobMatcher>,
    exclude: Option<GlobMatcher>,
}

impl PathFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            include: include.map(compile).transpose()?,
            exclude: exclude.map(compile).transpose()?,
        })
    }

    pub fn accepts(&self, relative_path: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .is_none_or(|g| g.is_match(relative_path));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|g| g.is_match(relative_path));
        included && !excluded
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()?
        .compile_matcher())
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Escape each `/`-separated segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory path for the Bitbucket src endpoint, with trailing slash
fn dir_segment(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}

fn is_below(root: &str, path: &str) -> bool {
    let root = root.trim_matches('/');
    root.is_empty()
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}
