//! GitHub release lookup for `dl-release`

use globset::GlobBuilder;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::core::platform::{self, PlatformKind};
use crate::download::classify::ClassifyOptions;
use crate::download::target::{Destination, DownloadTarget, TargetKind};
use crate::error::{GheError, Result};

/// GitHub release information
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Client for the GitHub releases API
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: Client,
    api_base: String,
    token: Option<SecretString>,
}

impl ReleaseClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: "https://api.github.com".into(),
            token: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    /// Fetch the latest release, or the one tagged `version`
    ///
    /// A version given without a leading `v` is retried with one.
    pub async fn fetch_release(
        &self,
        owner: &str,
        repo: &str,
        version: Option<&str>,
    ) -> Result<GitHubRelease> {
        let Some(version) = version else {
            let url = format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, repo);
            return self.get_release(&url).await;
        };

        let url = format!("{}/repos/{}/{}/releases/tags/{}", self.api_base, owner, repo, version);
        match self.get_release(&url).await {
            Err(GheError::HttpStatus { status: 404, .. }) if !version.starts_with('v') => {
                tracing::debug!(version, "tag not found, retrying with 'v' prefix");
                let url = format!(
                    "{}/repos/{}/{}/releases/tags/v{}",
                    self.api_base, owner, repo, version
                );
                self.get_release(&url).await
            }
            other => other,
        }
    }

    async fn get_release(&self, url: &str) -> Result<GitHubRelease> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GheError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

/// `(owner, repo)` of a GitHub repository URL
pub fn github_repo(repo_url: &str) -> Result<(String, String)> {
    let info = platform::classify(repo_url)?;
    if info.kind != PlatformKind::Github {
        return Err(GheError::InvalidInput(format!(
            "Release downloads are supported for GitHub repositories only (got {}).",
            info.kind
        )));
    }
    let repo_path = info
        .repo_path
        .ok_or_else(|| GheError::classification(repo_url, "no owner/repository in URL"))?;
    let (owner, repo) = repo_path
        .split_once('/')
        .ok_or_else(|| GheError::classification(repo_url, "no owner/repository in URL"))?;
    Ok((owner.to_string(), repo.to_string()))
}

/// Assets whose name matches `pattern` (all assets without one)
pub fn select_assets<'a>(release: &'a GitHubRelease, pattern: Option<&str>) -> Result<Vec<&'a GitHubAsset>> {
    let Some(pattern) = pattern else {
        return Ok(release.assets.iter().collect());
    };
    let matcher = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()?
        .compile_matcher();

    Ok(release
        .assets
        .iter()
        .filter(|asset| matcher.is_match(&asset.name))
        .collect())
}

/// Download targets for the selected assets
pub fn asset_targets(assets: &[&GitHubAsset], options: &ClassifyOptions) -> Vec<DownloadTarget> {
    assets
        .iter()
        .map(|asset| {
            let mut target = DownloadTarget::raw(asset.browser_download_url.clone());
            target.kind = TargetKind::ReleaseAsset;
            target.destination = match &options.output_dir {
                Some(dir) => Destination::File(dir.join(&asset.name)),
                None => Destination::File(asset.name.clone().into()),
            };
            target.headers = options.headers.clone();
            target.follow_redirects = true;
            target.overwrite = options.overwrite;
            target.retries = options.retries;
            target
        })
        .collect()
}
