// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::adapter::{FetchEncoder, FetchResult};
use crate::config::{Bitrate, DEFAULT_ITEM_TIMEOUT, RunOptions};
use crate::error::FetchError;
use crate::input::WorkItem;
use crate::outcome::OutcomeRecord;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::track::{NameResolver, UNKNOWN_ARTIST, UNTITLED, tag_track};
use crate::workspace::Workspace;

/// Failure reason recorded for items never started because of a stop request
pub const STOPPED_REASON: &str = "skipped: run stopped before this item";

/// Options for the per-item work of a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub bitrate: Bitrate,
    pub embed_thumbnail: bool,
    pub item_timeout: Duration,
    /// Extra attempts for network failures and timeouts
    pub retries: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            bitrate: Bitrate::default(),
            embed_thumbnail: true,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            retries: 0,
        }
    }
}

impl From<&RunOptions> for BatchOptions {
    fn from(options: &RunOptions) -> Self {
        Self {
            bitrate: options.bitrate,
            embed_thumbnail: options.embed_thumbnail,
            item_timeout: options.item_timeout,
            retries: options.retries,
        }
    }
}

/// Coarse "stop before the next item" request, shared with the caller
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// One record per work item, in work item order
    pub outcomes: Vec<OutcomeRecord>,
    /// Whether a stop request cut the batch short
    pub stopped: bool,
}

struct StoredTrack {
    size: u64,
    sha256: String,
}

/// Process work items one after another.
///
/// Every item yields exactly one outcome record, appended in item order.
/// Item failures are recorded and never abort the batch. Once `stop` is
/// tripped, the remaining items are recorded as skipped without being
/// fetched.
pub async fn run_batch<A: FetchEncoder + ?Sized>(
    adapter: &A,
    items: &[WorkItem],
    workspace: &Workspace,
    options: &BatchOptions,
    reporter: &SharedProgressReporter,
    stop: &StopSignal,
) -> BatchResult {
    let total = items.len();
    let mut resolver = NameResolver::new();
    let mut outcomes: Vec<OutcomeRecord> = Vec::with_capacity(total);
    let mut stopped = false;
    let (mut succeeded, mut failed) = (0, 0);

    reporter.report(ProgressEvent::BatchStarting { total });

    for item in items {
        stopped = stopped || stop.is_stopped();

        let record = if stopped {
            OutcomeRecord::failed(item.clone(), STOPPED_REASON)
        } else {
            reporter.report(ProgressEvent::ItemStarting {
                index: item.index,
                total,
                url: item.source_url.clone(),
            });
            process_item(adapter, item, workspace, options, &mut resolver, reporter).await
        };

        if record.is_success() {
            succeeded += 1;
        } else {
            failed += 1;
        }
        reporter.report(ProgressEvent::ItemFinished {
            index: item.index,
            total,
            outcome: Box::new(record.clone()),
            succeeded,
            failed,
        });
        outcomes.push(record);
    }

    reporter.report(ProgressEvent::BatchCompleted {
        succeeded,
        failed,
        stopped,
    });

    BatchResult { outcomes, stopped }
}

async fn process_item<A: FetchEncoder + ?Sized>(
    adapter: &A,
    item: &WorkItem,
    workspace: &Workspace,
    options: &BatchOptions,
    resolver: &mut NameResolver,
    reporter: &SharedProgressReporter,
) -> OutcomeRecord {
    let fetched = match fetch_with_retry(adapter, item, options, reporter).await {
        Ok(fetched) => fetched,
        Err(e) => {
            debug!(url = %item.source_url, error = %e, "item failed");
            return OutcomeRecord::failed(item.clone(), e.to_string());
        }
    };

    let file_name = resolver.resolve(
        fetched.title.as_deref(),
        fetched.artist.as_deref(),
        fetched.video_id.as_deref(),
    );
    let title = fetched.title.clone().unwrap_or_else(|| UNTITLED.to_string());

    match store_track(workspace, &file_name, fetched, options.embed_thumbnail).await {
        Ok(stored) => {
            OutcomeRecord::success(item.clone(), title, file_name, stored.size, stored.sha256)
        }
        Err(e) => {
            warn!(file = %file_name, error = %e, "failed to store track");
            OutcomeRecord::failed(item.clone(), e.to_string())
        }
    }
}

/// One adapter call under the item timeout, repeated for transient errors
async fn fetch_with_retry<A: FetchEncoder + ?Sized>(
    adapter: &A,
    item: &WorkItem,
    options: &BatchOptions,
    reporter: &SharedProgressReporter,
) -> Result<FetchResult, FetchError> {
    let mut attempt: u32 = 1;

    loop {
        let call = adapter.fetch_and_encode(
            &item.source_url,
            options.bitrate,
            options.embed_thumbnail,
        );
        let result = tokio::time::timeout(options.item_timeout, call)
            .await
            .unwrap_or(Err(FetchError::Timeout(options.item_timeout)));

        match result {
            Err(e) if e.is_transient() && attempt <= options.retries => {
                attempt += 1;
                reporter.report(ProgressEvent::ItemRetrying {
                    index: item.index,
                    attempt,
                    error: e.to_string(),
                });
            }
            other => return other,
        }
    }
}

/// Write audio under its final name, tagging it on the way.
///
/// The data lands in a `.partial` file first and is renamed once tagged, so
/// a file with the final name is always complete.
async fn store_track(
    workspace: &Workspace,
    file_name: &str,
    fetched: FetchResult,
    embed_thumbnail: bool,
) -> Result<StoredTrack, FetchError> {
    let partial = workspace.partial_path(file_name);
    let result = write_tagged(workspace, file_name, fetched, embed_thumbnail).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

async fn write_tagged(
    workspace: &Workspace,
    file_name: &str,
    fetched: FetchResult,
    embed_thumbnail: bool,
) -> Result<StoredTrack, FetchError> {
    let partial = workspace.partial_path(file_name);
    let final_path = workspace.file_path(file_name);
    let io_err = |source| FetchError::Io {
        path: partial.clone(),
        source,
    };

    tokio::fs::write(&partial, &fetched.audio)
        .await
        .map_err(io_err)?;

    let title = fetched.title.unwrap_or_else(|| UNTITLED.to_string());
    let artist = fetched.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let cover = fetched.thumbnail.filter(|_| embed_thumbnail);
    let tag_path = partial.clone();

    tokio::task::spawn_blocking(move || tag_track(&tag_path, &title, &artist, cover.as_deref()))
        .await
        .map_err(|e| io_err(std::io::Error::other(e)))?
        .map_err(|source| FetchError::Tagging {
            path: partial.clone(),
            source,
        })?;

    let bytes = tokio::fs::read(&partial).await.map_err(io_err)?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));

    tokio::fs::rename(&partial, &final_path)
        .await
        .map_err(|source| FetchError::Io {
            path: final_path.clone(),
            source,
        })?;

    Ok(StoredTrack {
        size: bytes.len() as u64,
        sha256,
    })
}
