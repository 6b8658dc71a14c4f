// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::adapter::FetchEncoder;
use crate::batch::{BatchOptions, StopSignal, run_batch};
use crate::config::RunOptions;
use crate::error::{DeliveryError, RunError};
use crate::input::{NormalizedInput, PlaylistLimits, normalize_input};
use crate::outcome::{OutcomeRecord, tally};
use crate::package::{ArchiveNaming, PackagedArchive, deliver_archives, package};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::workspace::{PurgeReport, Workspace};

/// What to convert
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Plain video URLs, already merged from text and file input
    pub video_urls: Vec<String>,
    pub playlist_urls: Vec<String>,
    pub options: RunOptions,
}

/// A finished batch whose archives are waiting for delivery.
///
/// Holds the workspace until [`Conversion::deliver_to`] or
/// [`Conversion::discard`] purges it.
#[derive(Debug)]
pub struct Conversion {
    pub input: NormalizedInput,
    pub outcomes: Vec<OutcomeRecord>,
    pub stopped: bool,
    pub archives: Vec<PackagedArchive>,
    workspace: Workspace,
}

/// Where archives ended up and how the cleanup went
#[derive(Debug, Clone)]
pub struct Delivery {
    pub paths: Vec<PathBuf>,
    pub purge: PurgeReport,
}

impl Conversion {
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn succeeded(&self) -> usize {
        tally(&self.outcomes).0
    }

    pub fn failed(&self) -> usize {
        tally(&self.outcomes).1
    }

    /// Write every archive into `dir`, then purge the workspace.
    ///
    /// If writing fails the workspace is left untouched so the produced
    /// files are not lost.
    pub fn deliver_to(
        self,
        dir: &Path,
        reporter: &SharedProgressReporter,
    ) -> Result<Delivery, DeliveryError> {
        let paths = deliver_archives(&self.archives, dir)?;
        let purge = self.discard(reporter);
        Ok(Delivery { paths, purge })
    }

    /// Purge the workspace without delivering anything
    pub fn discard(self, reporter: &SharedProgressReporter) -> PurgeReport {
        let purge = self.workspace.purge();
        reporter.report(ProgressEvent::WorkspacePurged {
            removed: purge.removed,
            failed: purge.failed,
        });
        purge
    }
}

/// Run the pipeline up to packaged archives.
///
/// Tool availability and the workspace are checked before any item is
/// touched; either failing ends the run immediately. Item failures never
/// end the run. A packaging failure ends it with the batch outcomes attached.
pub async fn convert<A: FetchEncoder + ?Sized>(
    adapter: &A,
    request: &RunRequest,
    reporter: &SharedProgressReporter,
    stop: &StopSignal,
) -> Result<Conversion, RunError> {
    let options = &request.options;

    adapter.check_available().await?;
    let workspace = Workspace::ensure(&options.workspace)?;

    let input = normalize_input(
        adapter,
        &request.video_urls,
        &request.playlist_urls,
        &PlaylistLimits::from(options),
        reporter,
    )
    .await;

    let batch = run_batch(
        adapter,
        &input.items,
        &workspace,
        &BatchOptions::from(options),
        reporter,
        stop,
    )
    .await;

    let naming = ArchiveNaming {
        combined_name: options.combined_zip_name(),
        timestamp: options.archive_timestamp.clone(),
        playlist_titles: input
            .playlists
            .iter()
            .map(|p| (p.id.clone(), p.title.clone()))
            .collect(),
    };

    let packaged = package(&batch.outcomes, options.bundling_mode, &workspace, &naming).await;
    let archives = match packaged {
        Ok(archives) => archives,
        Err(source) => {
            return Err(RunError::Packaging {
                source,
                outcomes: batch.outcomes,
            });
        }
    };

    for archive in &archives {
        reporter.report(ProgressEvent::ArchiveReady {
            name: archive.name.clone(),
            files: archive.entries.len(),
            bytes: archive.bytes.len() as u64,
        });
    }

    Ok(Conversion {
        input,
        outcomes: batch.outcomes,
        stopped: batch.stopped,
        archives,
        workspace,
    })
}
