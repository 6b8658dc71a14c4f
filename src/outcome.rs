// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::Serialize;

use crate::input::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => f.write_str("ok"),
            OutcomeStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Immutable result of processing one work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub work_item: WorkItem,
    pub status: OutcomeStatus,
    /// Title reported by the adapter, when the fetch got that far
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<u64>,
    /// Hex SHA-256 of the stored file
    pub sha256: Option<String>,
    pub error_reason: Option<String>,
}

impl OutcomeRecord {
    pub fn success(
        work_item: WorkItem,
        title: String,
        file_name: String,
        file_size_bytes: u64,
        sha256: String,
    ) -> Self {
        Self {
            work_item,
            status: OutcomeStatus::Success,
            title: Some(title),
            file_name: Some(file_name),
            file_size_bytes: Some(file_size_bytes),
            sha256: Some(sha256),
            error_reason: None,
        }
    }

    pub fn failed(work_item: WorkItem, reason: impl Into<String>) -> Self {
        Self {
            work_item,
            status: OutcomeStatus::Failed,
            title: None,
            file_name: None,
            file_size_bytes: None,
            sha256: None,
            error_reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Row of the user-facing progress table
    pub fn table_row(&self) -> TableRow {
        TableRow {
            number: self.work_item.index + 1,
            status: self.status,
            title: self
                .title
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            size: self
                .file_size_bytes
                .map(format_megabytes)
                .unwrap_or_else(|| "-".to_string()),
            file_name: self
                .file_name
                .clone()
                .or_else(|| self.error_reason.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Display form of one outcome: `{status, title, size, file_name}`.
/// Failed rows show the failure reason in place of a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub number: usize,
    pub status: OutcomeStatus,
    pub title: String,
    pub size: String,
    pub file_name: String,
}

/// Size in MB with two decimals
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Count successes and failures
pub fn tally(outcomes: &[OutcomeRecord]) -> (usize, usize) {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    (succeeded, outcomes.len() - succeeded)
}
