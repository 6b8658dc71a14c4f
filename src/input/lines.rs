// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

/// Extract URLs from a free-text block, one per line.
///
/// Blank lines and lines starting with `#` are skipped. Exact duplicates are
/// dropped, keeping the first occurrence.
pub fn parse_url_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(String::from)
        .collect()
}

/// Read a line-delimited URL file. Invalid UTF-8 is replaced, not rejected.
pub fn read_url_file(path: &Path) -> std::io::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(parse_url_lines(&String::from_utf8_lossy(&bytes)))
}
