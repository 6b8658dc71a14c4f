// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::adapter::FetchEncoder;
use crate::config::{DEFAULT_LISTING_TIMEOUT, RunOptions};
use crate::error::PlaylistError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// One video slated for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// Position in the batch, 0-based
    pub index: usize,
    pub source_url: String,
    /// Deduplication key: the video ID when it can be derived, otherwise the
    /// normalized URL
    pub video_key: String,
    /// Stable identifier of the owning playlist, if any
    pub playlist_id: Option<String>,
    /// 1-based position inside the owning playlist
    pub playlist_index: Option<usize>,
}

/// Per-playlist result of input normalization
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Number of members that were enqueued (duplicates excluded)
    pub enqueued: usize,
}

/// Batch-level, non-fatal problem found while reading input
#[derive(Debug, Clone, Serialize)]
pub struct BatchWarning {
    pub source: String,
    pub message: String,
}

impl fmt::Display for BatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Ordered, deduplicated work plus what was learned along the way
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub items: Vec<WorkItem>,
    pub playlists: Vec<PlaylistSummary>,
    pub warnings: Vec<BatchWarning>,
}

impl NormalizedInput {
    /// Title for a playlist ID, falling back to the ID itself
    pub fn playlist_title(&self, id: &str) -> String {
        self.playlists
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.title.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

struct Enqueuer {
    seen: HashSet<String>,
    items: Vec<WorkItem>,
}

impl Enqueuer {
    fn push(&mut self, url: &str, playlist: Option<(&str, usize)>) -> bool {
        let key = video_key(url);
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.items.push(WorkItem {
            index: self.items.len(),
            source_url: url.to_string(),
            video_key: key,
            playlist_id: playlist.map(|(id, _)| id.to_string()),
            playlist_index: playlist.map(|(_, position)| position),
        });
        true
    }
}

/// Bounds on playlist expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistLimits {
    /// Maximum videos taken from each playlist (0 = all)
    pub cap: usize,
    /// Maximum wall time for listing one playlist
    pub timeout: Duration,
}

impl Default for PlaylistLimits {
    fn default() -> Self {
        Self {
            cap: 0,
            timeout: DEFAULT_LISTING_TIMEOUT,
        }
    }
}

impl From<&RunOptions> for PlaylistLimits {
    fn from(options: &RunOptions) -> Self {
        Self {
            cap: options.playlist_cap,
            timeout: options.listing_timeout,
        }
    }
}

/// Turn plain video URLs and playlist URLs into ordered work items.
///
/// Plain videos come first in input order, then each playlist's members in
/// playlist order. A video already enqueued keeps its first association.
/// Playlists that cannot be resolved in time produce a warning and no items.
pub async fn normalize_input<A: FetchEncoder + ?Sized>(
    adapter: &A,
    video_urls: &[String],
    playlist_urls: &[String],
    limits: &PlaylistLimits,
    reporter: &SharedProgressReporter,
) -> NormalizedInput {
    let mut queue = Enqueuer {
        seen: HashSet::new(),
        items: Vec::new(),
    };
    let mut playlists = Vec::new();
    let mut warnings = Vec::new();

    for url in video_urls {
        queue.push(url, None);
    }

    for url in playlist_urls {
        reporter.report(ProgressEvent::ResolvingPlaylist { url: url.clone() });

        let lookup = adapter.resolve_playlist(url, limits.cap);
        let resolved = tokio::time::timeout(limits.timeout, lookup)
            .await
            .unwrap_or_else(|_| {
                Err(PlaylistError::TimedOut {
                    url: url.clone(),
                    after: limits.timeout,
                })
            });

        let listing = match resolved {
            Ok(listing) => listing,
            Err(e) => {
                reporter.report(ProgressEvent::PlaylistFailed {
                    url: url.clone(),
                    error: e.to_string(),
                });
                warnings.push(BatchWarning {
                    source: url.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let id = listing
            .id
            .clone()
            .or_else(|| playlist_key(url))
            .unwrap_or_else(|| normalize_url(url));
        let title = listing.title.clone().unwrap_or_else(|| "Playlist".to_string());

        let members = match limits.cap {
            0 => &listing.entries[..],
            cap => &listing.entries[..cap.min(listing.entries.len())],
        };

        let enqueued = members
            .iter()
            .enumerate()
            .filter(|&(position, member)| queue.push(member, Some((id.as_str(), position + 1))))
            .count();

        reporter.report(ProgressEvent::PlaylistResolved {
            title: title.clone(),
            videos: enqueued,
        });

        playlists.push(PlaylistSummary {
            id,
            title,
            url: url.clone(),
            enqueued,
        });
    }

    NormalizedInput {
        items: queue.items,
        playlists,
        warnings,
    }
}

/// Key identifying the video behind a URL.
///
/// YouTube watch, short, embed and youtu.be links collapse to `youtube:<id>`;
/// anything else uses its normalized URL.
pub fn video_key(url: &str) -> String {
    youtube_video_id(url)
        .map(|id| format!("youtube:{id}"))
        .unwrap_or_else(|| normalize_url(url))
}

/// The `list` parameter of a playlist URL
pub fn playlist_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "list")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = match host {
        "youtu.be" => segments.next().map(String::from),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(String::from),
                _ => None,
            }
        }
        _ => None,
    };

    id.filter(|id| !id.is_empty())
}

/// Canonical text form of a URL: lowercase scheme and host, no fragment,
/// no trailing slash. Unparseable input is only trimmed.
fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let mut text = parsed.to_string();
            if parsed.query().is_none() && text.ends_with('/') {
                text.pop();
            }
            text
        }
        Err(_) => trimmed.to_string(),
    }
}
