//! Download command handlers (`dl`, `dlx`, `dl-dir`, `dl-release`)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::cli::commands::{DlArgs, DlDirArgs, DlReleaseArgs, DlxArgs, TransferArgs};
use crate::core::account::Account;
use crate::core::config::AppConfig;
use crate::core::platform::PlatformKind;
use crate::download::classify::{classify, ClassifyOptions};
use crate::download::extract::{extract_tar_gz, is_tar_gz};
use crate::download::orchestrator::{
    build_api_client, build_client, count_failures, DownloadOptions, DownloadOrchestrator, DownloadResult,
    ProgressCallback, ProgressEvent,
};
use crate::download::release::{asset_targets, github_repo, select_assets, ReleaseClient};
use crate::download::target::{parse_header, DownloadTarget, TargetKind};
use crate::download::tree::{companion_hosts, ApiToken, HttpTreeLister, TreeLister};
use crate::error::{GheError, Result};

/// Settings shared by one download invocation
struct Transfer {
    classify: ClassifyOptions,
    download: DownloadOptions,
    token: Option<ApiToken>,
    /// Account auth header, sent only to the token's hosts
    auth_header: Option<(String, String)>,
}

impl Transfer {
    fn from_args(args: &TransferArgs) -> Result<Self> {
        let account = match &args.account {
            Some(name) => Some(AppConfig::load()?.require_account(name)?.clone()),
            None => None,
        };
        Self::build(args, account.as_ref())
    }

    fn build(args: &TransferArgs, account: Option<&Account>) -> Result<Self> {
        let headers = args
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<Vec<_>>>()?;

        let (token, auth_header) = match account {
            Some(account) => {
                let credential = account.token.as_ref().ok_or_else(|| {
                    GheError::auth(&account.name, "downloads need an access token, and it has none")
                })?;
                let token = ApiToken {
                    username: credential.username.clone(),
                    secret: credential.secret.clone(),
                    hosts: token_hosts(account),
                };
                (Some(token), Some(token_header(account, &credential.secret)))
            }
            None => (None, None),
        };

        let classify = ClassifyOptions {
            output_dir: args.output_dir.clone(),
            headers,
            follow_redirects: !args.no_redirect,
            overwrite: args.overwrite_policy(),
            retries: args.retries,
            ..Default::default()
        };

        let mut download = DownloadOptions {
            concurrency: args.jobs.max(1),
            read_timeout: Duration::from_secs(args.timeout.max(1)),
            ..Default::default()
        };
        if let Some(agent) = &args.user_agent {
            download.user_agent = agent.clone();
        }
        if args.progress {
            let callback: ProgressCallback = Arc::new(print_progress);
            download.progress = Some(callback);
        }

        Ok(Self {
            classify,
            download,
            token,
            auth_header,
        })
    }

    fn orchestrator(&self) -> Result<DownloadOrchestrator> {
        let lister = HttpTreeLister::new(build_api_client(&self.download)?).with_token(self.token.clone());
        Ok(DownloadOrchestrator::with_lister(
            build_client(&self.download)?,
            lister,
            self.download.clone(),
        ))
    }

    /// Classify `url` and attach the account header when the host allows it
    fn classify_url(&self, url: &str, options: &ClassifyOptions) -> Result<DownloadTarget> {
        classify(url, options).map(|target| self.authorize(target))
    }

    fn authorize(&self, mut target: DownloadTarget) -> DownloadTarget {
        let (Some(token), Some(header)) = (&self.token, &self.auth_header) else {
            return target;
        };
        let host = url::Url::parse(&target.fetch_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        match host {
            Some(host) if token.allows(&host) => target.headers.push(header.clone()),
            _ => tracing::debug!(url = %target.fetch_url, "account token not sent to this host"),
        }
        target
    }
}

/// Hosts the account's token is meant for
fn token_hosts(account: &Account) -> Vec<String> {
    let kind = account.platform.as_ref().map(|hint| hint.kind).unwrap_or_default();
    let mut hosts: Vec<String> = account
        .platform_domain()
        .or_else(|| kind.default_domain().map(str::to_string))
        .into_iter()
        .collect();
    hosts.extend(companion_hosts(kind).iter().map(|h| h.to_string()));
    hosts
}

/// Auth header for direct downloads
fn token_header(account: &Account, secret: &SecretString) -> (String, String) {
    let gitlab = account
        .platform
        .as_ref()
        .is_some_and(|hint| hint.kind == PlatformKind::Gitlab);
    if gitlab {
        ("PRIVATE-TOKEN".to_string(), secret.expose_secret().to_string())
    } else {
        (
            "Authorization".to_string(),
            format!("Bearer {}", secret.expose_secret()),
        )
    }
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { url, .. } => eprintln!("→ {}", url),
        ProgressEvent::Progress { .. } => {}
        ProgressEvent::Finished { url, success, .. } => {
            eprintln!("{} {}", if *success { "✓" } else { "✗" }, url)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Handle `ghe dl`
pub async fn handle_dl(args: DlArgs) -> Result<()> {
    let urls = collect_urls(&args.urls, args.file_list.as_deref())?;
    let transfer = Transfer::from_args(&args.transfer)?;

    let options = ClassifyOptions {
        output: single_output(args.output, &urls)?,
        preserve_path: args.preserve_path,
        include: args.pattern,
        exclude: args.exclude,
        git_ref: args.git_ref.to_override(),
        ..transfer.classify.clone()
    };

    let classified = urls.iter().map(|url| transfer.classify_url(url, &options)).collect();
    let results = run_classified(&transfer.orchestrator()?, &urls, classified).await;
    report(&results)
}

/// Handle `ghe dlx`
pub async fn handle_dlx(args: DlxArgs) -> Result<()> {
    let urls = collect_urls(&args.urls, args.file_list.as_deref())?;
    let transfer = Transfer::from_args(&args.transfer)?;

    let options = ClassifyOptions {
        output: single_output(args.output, &urls)?,
        force_raw: true,
        ..transfer.classify.clone()
    };

    let classified = urls.iter().map(|url| transfer.classify_url(url, &options)).collect();
    let results = run_classified(&transfer.orchestrator()?, &urls, classified).await;
    report(&results)
}

/// Handle `ghe dl-dir`
pub async fn handle_dl_dir(args: DlDirArgs) -> Result<()> {
    let transfer = Transfer::from_args(&args.transfer)?;
    let options = ClassifyOptions {
        preserve_path: !args.flat,
        include: args.pattern,
        exclude: args.exclude,
        git_ref: args.git_ref.to_override(),
        ..transfer.classify.clone()
    };

    let target = transfer.classify_url(&args.url, &options)?;
    if target.kind != TargetKind::GitTree {
        return Err(GheError::InvalidInput(format!(
            "'{}' is not a repository directory URL.\n\n  → Expected a '/tree/<ref>/<path>' link; use 'ghe dl' for single files.",
            args.url
        )));
    }

    let results = transfer.orchestrator()?.run(vec![target]).await;
    report(&results)
}

/// Handle `ghe dl-release`
pub async fn handle_dl_release(args: DlReleaseArgs) -> Result<()> {
    let (owner, repo) = github_repo(&args.url)?;
    let transfer = Transfer::from_args(&args.transfer)?;
    let orchestrator = transfer.orchestrator()?;

    let token = transfer
        .token
        .as_ref()
        .filter(|t| t.allows("github.com"))
        .map(|t| t.secret.clone());
    let releases = ReleaseClient::new(build_api_client(&transfer.download)?).with_token(token);
    let release = releases
        .fetch_release(&owner, &repo, args.version.as_deref())
        .await?;
    println!(
        "Release {} of {}/{}",
        release.name.as_deref().unwrap_or(&release.tag_name),
        owner,
        repo
    );

    let assets = select_assets(&release, args.asset.as_deref())?;
    if assets.is_empty() {
        return Err(GheError::InvalidInput(match &args.asset {
            Some(pattern) => format!("No assets in {} match '{}'.", release.tag_name, pattern),
            None => format!("Release {} has no assets.", release.tag_name),
        }));
    }

    let targets = asset_targets(&assets, &transfer.classify)
        .into_iter()
        .map(|target| transfer.authorize(target))
        .collect();
    let results = orchestrator.run(targets).await;
    let downloaded = report(&results);

    if args.extract {
        extract_archives(&results)?;
    }
    downloaded
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Positional URLs followed by those listed in `file_list`
fn collect_urls(urls: &[String], file_list: Option<&Path>) -> Result<Vec<String>> {
    let mut all: Vec<String> = urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if let Some(path) = file_list {
        let content = std::fs::read_to_string(path)?;
        all.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    if all.is_empty() {
        return Err(GheError::InvalidInput("No URLs to download.".into()));
    }
    Ok(all)
}

fn single_output(output: Option<std::path::PathBuf>, urls: &[String]) -> Result<Option<std::path::PathBuf>> {
    if output.is_some() && urls.len() > 1 {
        return Err(GheError::InvalidInput(
            "--output works with a single URL.\n\n  → Use --dir to choose a directory for several downloads.".into(),
        ));
    }
    Ok(output)
}

/// Run the classified targets, keeping classification failures in place
async fn run_classified<L: TreeLister>(
    orchestrator: &DownloadOrchestrator<L>,
    urls: &[String],
    classified: Vec<Result<DownloadTarget>>,
) -> Vec<DownloadResult> {
    let mut slots = Vec::with_capacity(urls.len());
    let mut targets = Vec::new();
    for (url, target) in urls.iter().zip(classified) {
        match target {
            Ok(target) => {
                slots.push(None);
                targets.push(target);
            }
            Err(e) => slots.push(Some(DownloadResult {
                source_url: url.clone(),
                error: Some(e.to_string()),
                ..Default::default()
            })),
        }
    }

    let mut fetched = orchestrator.run(targets).await.into_iter();
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| fetched.next().unwrap_or_default()))
        .collect()
}

/// Print every result; fails if any target failed
fn report(results: &[DownloadResult]) -> Result<()> {
    for result in results {
        println!("{}", result_line(result));
        for child in &result.children {
            println!("  {}", result_line(child));
        }
    }

    let failures = count_failures(results);
    if failures > 0 {
        return Err(GheError::InvalidInput(format!(
            "{} of {} downloads failed",
            failures,
            results.len()
        )));
    }
    Ok(())
}

fn result_line(result: &DownloadResult) -> String {
    let destination = result
        .destination
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| result.source_url.clone());

    if !result.success {
        let error = result.error.as_deref().unwrap_or("failed");
        format!("✗ {}: {}", result.source_url, error.lines().next().unwrap_or(error))
    } else if result.skipped {
        format!("- {} (exists, skipped)", destination)
    } else {
        format!("✓ {} ({})", destination, human_bytes(result.bytes_written))
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Unpack every downloaded `.tar.gz` next to the archive
fn extract_archives(results: &[DownloadResult]) -> Result<()> {
    let mut failed = 0;
    let archives = results
        .iter()
        .filter(|r| r.success && !r.skipped)
        .filter_map(|r| r.destination.as_deref())
        .filter(|path| is_tar_gz(path));

    for archive in archives {
        let dest_dir = archive.parent().unwrap_or(Path::new("."));
        match extract_tar_gz(archive, dest_dir) {
            Ok(entries) => println!("✓ Extracted {} ({} entries)", archive.display(), entries.len()),
            Err(e) => {
                eprintln!("{}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(GheError::InvalidInput(format!("{} archives could not be extracted", failed)));
    }
    Ok(())
}
