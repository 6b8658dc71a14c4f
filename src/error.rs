// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::outcome::OutcomeRecord;

/// Errors that can occur when expanding a playlist into its videos.
///
/// These never abort a run; the normalizer turns them into warnings.
#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Failed to resolve playlist {url}: {reason}")]
    ResolveFailed { url: String, reason: String },

    #[error("Playlist {url} contains no videos")]
    Empty { url: String },

    #[error("Failed to run playlist lookup for {url}: {source}")]
    Spawn {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable playlist listing for {url}: {source}")]
    InvalidListing {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Listing playlist {url} timed out after {}s", .after.as_secs())]
    TimedOut { url: String, after: Duration },
}

/// Errors that can occur while fetching and encoding a single item.
///
/// The orchestrator records these as failed outcomes and moves on.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Video unavailable: {0}")]
    Unavailable(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to tag {path}: {source}")]
    Tagging {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },
}

impl FetchError {
    /// Whether another attempt at the same item could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::NetworkFailure(_) | FetchError::Timeout(_))
    }
}

/// The external downloader or encoder tool cannot be used.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("`{tool}` was not found on PATH; install it or pass its location explicitly")]
    NotFound { tool: String },

    #[error("Configured {tool} location {path} does not exist")]
    MissingOverride { tool: String, path: PathBuf },

    #[error("`{tool}` could not be executed: {source}")]
    NotExecutable {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when preparing or using the workspace directory
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create workspace directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace path {0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Workspace directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read workspace directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while serializing archives
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Failed to read {path} for archive {archive}: {source}")]
    ReadFailed {
        archive: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {archive}: {source}")]
    Zip {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to write entry to archive {archive}: {source}")]
    EntryWrite {
        archive: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when handing finished archives to the caller
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when writing the JSON run report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Run-level errors. Anything here stops the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(#[from] EncoderError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Packaging failed: {source}")]
    Packaging {
        #[source]
        source: PackagingError,
        /// Outcomes of the batch that ran before packaging failed
        outcomes: Vec<OutcomeRecord>,
    },
}
