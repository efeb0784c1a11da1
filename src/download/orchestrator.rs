//! Download orchestration
//!
//! Runs a batch of classified targets on a bounded worker pool. Every input
//! target yields exactly one [`DownloadResult`], in input order, and one
//! target failing never affects the others.
//!
//! Per file:
//! 1. Destination existence checked against the overwrite policy
//! 2. GET with manual redirect following (hop limit, loop guard)
//! 3. Body streamed to `<dest>.part`, renamed on completion
//! 4. Whole attempt retried on transient failures (5xx, 429, connect errors,
//!    stalled reads) with exponential backoff

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::download::target::{DownloadTarget, OverwritePolicy, TargetKind};
use crate::download::tree::{HttpTreeLister, PathFilter, TreeLister};
use crate::error::{GheError, Result};

/// Default number of parallel downloads
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default redirect hop limit
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Headers never forwarded to a different origin
const SENSITIVE_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie", "private-token"];

/// Observable progress of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { index: usize, url: String },
    Progress { index: usize, bytes: u64, total: Option<u64> },
    Finished { index: usize, url: String, success: bool },
}

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Engine settings
#[derive(Clone)]
pub struct DownloadOptions {
    pub concurrency: usize,
    pub max_redirects: usize,
    pub connect_timeout: Duration,
    /// Longest wait for the response head or the next body chunk
    pub read_timeout: Duration,
    pub user_agent: String,
    /// First retry delay, doubled on each further retry
    pub retry_base_delay: Duration,
    pub progress: Option<ProgressCallback>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: format!("ghe/{}", env!("CARGO_PKG_VERSION")),
            retry_base_delay: Duration::from_millis(500),
            progress: None,
        }
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("concurrency", &self.concurrency)
            .field("max_redirects", &self.max_redirects)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("user_agent", &self.user_agent)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Outcome of one input target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadResult {
    pub source_url: String,
    /// Resolved output path (output directory for trees)
    pub destination: Option<PathBuf>,
    pub success: bool,
    /// Destination existed and was kept
    pub skipped: bool,
    pub bytes_written: u64,
    pub attempts: u32,
    pub error: Option<String>,
    /// Per-file results of an expanded tree
    pub children: Vec<DownloadResult>,
}

impl DownloadResult {
    fn failed(source_url: &str, destination: Option<PathBuf>, error: &GheError) -> Self {
        Self {
            source_url: source_url.to_string(),
            destination,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Aggregate the children of a tree target
    fn from_children(target: &DownloadTarget, children: Vec<DownloadResult>) -> Self {
        let failures = children.iter().filter(|c| !c.success).count();
        Self {
            source_url: target.source_url.clone(),
            destination: Some(target.output_dir()),
            success: failures == 0,
            skipped: !children.is_empty() && children.iter().all(|c| c.skipped),
            bytes_written: children.iter().map(|c| c.bytes_written).sum(),
            attempts: 1,
            error: (failures > 0).then(|| format!("{} of {} files failed", failures, children.len())),
            children,
        }
    }
}

/// Summary counts over a batch
pub fn count_failures(results: &[DownloadResult]) -> usize {
    results.iter().filter(|r| !r.success).count()
}

/// Shared per-batch state handed to workers
struct FetchContext {
    client: Client,
    max_redirects: usize,
    read_timeout: Duration,
    retry_base_delay: Duration,
    progress: Option<ProgressCallback>,
}

impl FetchContext {
    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }
}

/// Where a finished job's result goes
#[derive(Debug, Clone, Copy)]
enum Slot {
    Top(usize),
    Child(usize, usize),
}

/// Runs download batches
pub struct DownloadOrchestrator<L: TreeLister = HttpTreeLister> {
    client: Client,
    lister: L,
    options: DownloadOptions,
}

impl DownloadOrchestrator<HttpTreeLister> {
    /// Orchestrator using the platform APIs for tree listing
    pub fn new(options: DownloadOptions) -> Result<Self> {
        let client = build_client(&options)?;
        let lister = HttpTreeLister::new(build_api_client(&options)?);
        Ok(Self::with_lister(client, lister, options))
    }
}

impl<L: TreeLister> DownloadOrchestrator<L> {
    pub fn with_lister(client: Client, lister: L, options: DownloadOptions) -> Self {
        Self {
            client,
            lister,
            options,
        }
    }

    /// Download every target, returning one result per target in input order
    pub async fn run(&self, targets: Vec<DownloadTarget>) -> Vec<DownloadResult> {
        let total = targets.len();
        let mut top: Vec<Option<DownloadResult>> = vec![None; total];
        let mut children: Vec<Vec<Option<DownloadResult>>> = vec![Vec::new(); total];

        // Trees are expanded before any worker starts
        let expansions = futures::future::join_all(targets.iter().map(|t| async move {
            if t.kind == TargetKind::GitTree {
                Some(self.expand(t).await)
            } else {
                None
            }
        }))
        .await;

        let mut jobs: Vec<(Slot, DownloadTarget)> = Vec::new();
        for (index, (target, expansion)) in targets.iter().zip(expansions).enumerate() {
            match expansion {
                None => jobs.push((Slot::Top(index), target.clone())),
                Some(Ok(kids)) => {
                    if kids.is_empty() {
                        tracing::warn!(url = %target.source_url, "tree has no matching files");
                    }
                    children[index] = vec![None; kids.len()];
                    jobs.extend(
                        kids.into_iter()
                            .enumerate()
                            .map(|(child, t)| (Slot::Child(index, child), t)),
                    );
                }
                Some(Err(e)) => {
                    tracing::warn!(url = %target.source_url, error = %e, "tree expansion failed");
                    top[index] = Some(DownloadResult::failed(
                        &target.source_url,
                        Some(target.output_dir()),
                        &e,
                    ));
                }
            }
        }

        // Two files bound for one path would race on the same `.part` file
        let mut claimed = HashSet::new();
        jobs.retain(|(slot, job)| {
            let destination = job.resolve_destination();
            if claimed.insert(destination.clone()) {
                return true;
            }
            let error = GheError::DuplicateDestination(destination.display().to_string());
            tracing::warn!(url = %job.source_url, error = %error, "destination collision");
            let result = DownloadResult::failed(&job.source_url, Some(destination), &error);
            match *slot {
                Slot::Top(i) => top[i] = Some(result),
                Slot::Child(i, c) => children[i][c] = Some(result),
            }
            false
        });

        let concurrency = self.options.concurrency.max(1).min(jobs.len().max(1));
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let context = Arc::new(FetchContext {
            client: self.client.clone(),
            max_redirects: self.options.max_redirects,
            read_timeout: self.options.read_timeout,
            retry_base_delay: self.options.retry_base_delay,
            progress: self.options.progress.clone(),
        });

        tracing::debug!(jobs = jobs.len(), concurrency, "starting download batch");

        let mut join_set = JoinSet::new();
        for (slot, job) in jobs {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "semaphore closed");
                    break;
                }
            };
            let context = Arc::clone(&context);
            let index = match slot {
                Slot::Top(i) | Slot::Child(i, _) => i,
            };

            join_set.spawn(async move {
                let _permit = permit;
                (slot, fetch_target(&context, &job, index).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((Slot::Top(i), result)) => top[i] = Some(result),
                Ok((Slot::Child(i, c), result)) => children[i][c] = Some(result),
                Err(e) => tracing::error!(error = %e, "download task join failure"),
            }
        }

        targets
            .iter()
            .zip(top)
            .zip(children)
            .map(|((target, result), kids)| {
                if let Some(result) = result {
                    return result;
                }
                if target.kind == TargetKind::GitTree {
                    let kids = kids
                        .into_iter()
                        .map(|k| k.unwrap_or_else(|| lost_result(target)))
                        .collect();
                    return DownloadResult::from_children(target, kids);
                }
                lost_result(target)
            })
            .collect()
    }

    /// Expand a tree target into filtered raw-file children
    async fn expand(&self, target: &DownloadTarget) -> Result<Vec<DownloadTarget>> {
        let tree = target
            .tree
            .as_ref()
            .ok_or_else(|| GheError::classification(&target.source_url, "missing tree reference"))?;
        let filter = PathFilter::new(target.include.as_deref(), target.exclude.as_deref())?;

        let entries = self.lister.list(tree).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                let relative = tree.relative_path(&entry.path);
                filter
                    .accepts(relative)
                    .then(|| target.child(&entry.raw_url, relative))
            })
            .collect())
    }
}

/// HTTP client with redirects handled by the orchestrator
///
/// Stalls are caught per read while streaming, so large bodies have no
/// overall deadline.
pub fn build_client(options: &DownloadOptions) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(options.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(options.connect_timeout)
        .build()?)
}

/// HTTP client for small JSON API calls (tree listings, releases)
///
/// Follows redirects itself, so renamed repositories still resolve.
pub fn build_api_client(options: &DownloadOptions) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(options.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
        .connect_timeout(options.connect_timeout)
        .timeout(options.read_timeout)
        .build()?)
}

/// Error for a response head or body chunk that never arrived
fn stalled(url: &str, limit: Duration) -> GheError {
    GheError::TransientNetwork(format!("no data from {} for {:?}", url, limit))
}

fn lost_result(target: &DownloadTarget) -> DownloadResult {
    DownloadResult::failed(
        &target.source_url,
        None,
        &GheError::InvalidInput("download task did not complete".into()),
    )
}

/// Fetch one file with overwrite handling and retries
async fn fetch_target(ctx: &FetchContext, target: &DownloadTarget, index: usize) -> DownloadResult {
    let destination = target.resolve_destination();
    let mut result = DownloadResult {
        source_url: target.source_url.clone(),
        destination: Some(destination.clone()),
        ..Default::default()
    };
    ctx.emit(ProgressEvent::Started {
        index,
        url: target.source_url.clone(),
    });

    if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
        match target.overwrite {
            OverwritePolicy::Skip => {
                tracing::info!(path = %destination.display(), "destination exists, skipped");
                result.success = true;
                result.skipped = true;
            }
            OverwritePolicy::Error => {
                result.error =
                    Some(GheError::DestinationExists(destination.display().to_string()).to_string());
            }
            OverwritePolicy::Overwrite => {}
        }
        if target.overwrite != OverwritePolicy::Overwrite {
            ctx.emit(ProgressEvent::Finished {
                index,
                url: target.source_url.clone(),
                success: result.success,
            });
            return result;
        }
    }

    let max_attempts = target.retries.saturating_add(1);
    loop {
        result.attempts += 1;
        match fetch_once(ctx, target, &destination, index).await {
            Ok(bytes) => {
                tracing::info!(url = %target.fetch_url, bytes, "downloaded");
                result.success = true;
                result.bytes_written = bytes;
                break;
            }
            Err(e) if e.is_transient() && result.attempts < max_attempts => {
                let delay = backoff(ctx.retry_base_delay, result.attempts);
                tracing::warn!(
                    url = %target.fetch_url,
                    attempt = result.attempts,
                    error = %e,
                    "transient failure, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(url = %target.fetch_url, attempts = result.attempts, error = %e, "download failed");
                result.error = Some(e.to_string());
                break;
            }
        }
    }

    ctx.emit(ProgressEvent::Finished {
        index,
        url: target.source_url.clone(),
        success: result.success,
    });
    result
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// One attempt: request, stream to `.part`, rename
async fn fetch_once(
    ctx: &FetchContext,
    target: &DownloadTarget,
    destination: &Path,
    index: usize,
) -> Result<u64> {
    let response = send_following_redirects(ctx, target).await?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(destination);
    match stream_to_file(ctx, response, &partial, index).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, destination).await?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn stream_to_file(ctx: &FetchContext, response: Response, partial: &Path, index: usize) -> Result<u64> {
    let url = response.url().to_string();
    let total = response.content_length();
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    loop {
        let next = tokio::time::timeout(ctx.read_timeout, stream.next())
            .await
            .map_err(|_| stalled(&url, ctx.read_timeout))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        ctx.emit(ProgressEvent::Progress {
            index,
            bytes: written,
            total,
        });
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// `<dest>.part`
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// GET following redirects by hand
async fn send_following_redirects(ctx: &FetchContext, target: &DownloadTarget) -> Result<Response> {
    let start = Url::parse(&target.fetch_url)
        .map_err(|e| GheError::classification(&target.fetch_url, e.to_string()))?;
    let origin = start.origin();
    let mut url = start;
    let mut visited = HashSet::from([url.to_string()]);
    let mut hops = 0usize;

    loop {
        let same_origin = url.origin() == origin;
        let mut request = ctx.client.get(url.clone());
        for (name, value) in &target.headers {
            if !same_origin && is_sensitive(name) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::time::timeout(ctx.read_timeout, request.send())
            .await
            .map_err(|_| stalled(url.as_str(), ctx.read_timeout))??;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status.is_redirection() && target.follow_redirects {
            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| url.join(location).ok())
                .ok_or_else(|| GheError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                })?;

            hops += 1;
            if hops > ctx.max_redirects || !visited.insert(next.to_string()) {
                return Err(GheError::TooManyRedirects(target.fetch_url.clone()));
            }
            tracing::debug!(from = %url, to = %next, "following redirect");
            url = next;
            continue;
        }

        return Err(GheError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
}

fn is_sensitive(header: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(header))
}
