// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RunOptions;
use crate::error::ReportError;
use crate::input::{BatchWarning, PlaylistSummary};
use crate::outcome::{OutcomeRecord, tally};
use crate::run::Conversion;

/// Machine-readable summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub options: RunOptions,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped: bool,
    pub playlists: Vec<PlaylistSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BatchWarning>,
    pub outcomes: Vec<OutcomeRecord>,
    pub archives: Vec<String>,
}

impl RunReport {
    pub fn from_conversion(
        conversion: &Conversion,
        options: &RunOptions,
        started_at: DateTime<Utc>,
    ) -> Self {
        let (succeeded, failed) = tally(&conversion.outcomes);
        Self {
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            options: options.clone(),
            succeeded,
            failed,
            stopped: conversion.stopped,
            playlists: conversion.input.playlists.clone(),
            warnings: conversion.input.warnings.clone(),
            outcomes: conversion.outcomes.clone(),
            archives: conversion.archives.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// Write the report as pretty-printed JSON
pub fn write_report(report: &RunReport, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|e| ReportError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
