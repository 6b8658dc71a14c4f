// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use sanitize_filename::Options;

/// Byte budget of the artist part of a name
pub const MAX_ARTIST_BYTES: usize = 80;

/// Byte budget of the title part of a name.
///
/// With the artist budget, the `" - "` separator, a counter, the extension
/// and the `.partial` suffix this stays under the common 255-byte limit for
/// one path component.
pub const MAX_TITLE_BYTES: usize = 150;

pub const UNKNOWN_ARTIST: &str = "Unknown";
pub const UNTITLED: &str = "Untitled";
pub const AUDIO_EXTENSION: &str = "mp3";

/// Make one name component filesystem-safe.
///
/// Characters illegal on common filesystems are dropped, whitespace runs
/// collapse to a single space, and the result is cut at a word boundary when
/// its UTF-8 form exceeds `max_bytes`.
pub fn normalize_component(raw: &str, max_bytes: usize) -> String {
    let sanitized = sanitize_filename::sanitize_with_options(
        raw,
        Options {
            windows: true,
            truncate: false,
            replacement: "",
        },
    );

    let collapsed = sanitized.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated = truncate_at_boundary(&collapsed, max_bytes);

    // Windows rejects names ending in a dot or space
    truncated
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// `"Artist - Title"` stem for a track, before collision handling.
///
/// A missing artist becomes [`UNKNOWN_ARTIST`]. A title that is missing or
/// normalizes to nothing is replaced by the video ID, then by [`UNTITLED`].
pub fn base_stem(title: Option<&str>, artist: Option<&str>, video_id: Option<&str>) -> String {
    let artist = artist
        .map(|a| normalize_component(a, MAX_ARTIST_BYTES))
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let title = [title, video_id]
        .into_iter()
        .flatten()
        .map(|t| normalize_component(t, MAX_TITLE_BYTES))
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    format!("{artist} - {title}")
}

/// Hands out file names that are unique within one run.
///
/// Comparison ignores case so that names stay distinct on case-insensitive
/// filesystems and inside archives extracted on them.
#[derive(Debug, Default)]
pub struct NameResolver {
    used: HashSet<String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a unique `.mp3` file name for a track.
    ///
    /// The first claimant of a stem gets `"<stem>.mp3"`; later ones get
    /// `"<stem> (1).mp3"`, `"<stem> (2).mp3"`, and so on.
    pub fn resolve(
        &mut self,
        title: Option<&str>,
        artist: Option<&str>,
        video_id: Option<&str>,
    ) -> String {
        let stem = base_stem(title, artist, video_id);
        let mut candidate = format!("{stem}.{AUDIO_EXTENSION}");
        let mut counter = 1;

        while !self.used.insert(candidate.to_lowercase()) {
            candidate = format!("{stem} ({counter}).{AUDIO_EXTENSION}");
            counter += 1;
        }

        candidate
    }

    /// Number of names handed out so far
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Cut to at most `max_bytes` on a char boundary, preferring a space past
/// the halfway point
fn truncate_at_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &s[..end];

    match truncated.rfind(' ') {
        Some(pos) if pos > end / 2 => &truncated[..pos],
        _ => truncated,
    }
}
