//! Download engine
//!
//! Classifies arbitrary URLs (plain files, repository blobs and trees,
//! release assets) and fetches them with retries, redirect following and
//! bounded concurrency.

pub mod classify;
pub mod extract;
pub mod orchestrator;
pub mod release;
pub mod target;
pub mod tree;

pub use classify::{classify, ClassifyOptions};
pub use orchestrator::{DownloadOptions, DownloadOrchestrator, DownloadResult, ProgressEvent};
pub use target::{DownloadTarget, OverwritePolicy, RefOverride, TargetKind};
