// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

/// Default directory for produced MP3 files
pub const DEFAULT_WORKSPACE: &str = "out_mp3";

/// Default per-item timeout for the adapter call
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(900);

/// Default timeout for listing one playlist
pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(120);

/// Target MP3 bitrate. Only the listed rates are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(into = "u32")]
pub enum Bitrate {
    Kbps96,
    Kbps128,
    Kbps160,
    Kbps192,
    Kbps256,
    #[default]
    Kbps320,
}

impl Bitrate {
    pub const ALL: [Bitrate; 6] = [
        Bitrate::Kbps96,
        Bitrate::Kbps128,
        Bitrate::Kbps160,
        Bitrate::Kbps192,
        Bitrate::Kbps256,
        Bitrate::Kbps320,
    ];

    pub fn kbps(self) -> u32 {
        match self {
            Bitrate::Kbps96 => 96,
            Bitrate::Kbps128 => 128,
            Bitrate::Kbps160 => 160,
            Bitrate::Kbps192 => 192,
            Bitrate::Kbps256 => 256,
            Bitrate::Kbps320 => 320,
        }
    }
}

impl From<Bitrate> for u32 {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.kbps()
    }
}

impl TryFrom<u32> for Bitrate {
    type Error = String;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        Bitrate::ALL
            .into_iter()
            .find(|b| b.kbps() == kbps)
            .ok_or_else(|| {
                format!("unsupported bitrate {kbps} kbps (expected one of 96, 128, 160, 192, 256, 320)")
            })
    }
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches("kbps").trim_end_matches(['k', 'K']);
        let kbps: u32 = trimmed
            .parse()
            .map_err(|_| format!("invalid bitrate '{s}'"))?;
        Bitrate::try_from(kbps)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kbps())
    }
}

/// How successful files are grouped into archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BundlingMode {
    /// One archive holding every successful file
    #[default]
    Combined,
    /// One archive per playlist plus one for loose videos
    PerPlaylist,
}

/// Options for a conversion run
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub bitrate: Bitrate,
    /// Embed the video thumbnail as cover art
    pub embed_thumbnail: bool,
    pub workspace: PathBuf,
    pub bundling_mode: BundlingMode,
    /// Maximum videos taken from each playlist (0 = all)
    pub playlist_cap: usize,
    /// Maximum wall time for listing one playlist
    #[serde(with = "duration_secs")]
    pub listing_timeout: Duration,
    /// Name of the combined archive (also used for loose videos)
    pub combined_archive_name: String,
    /// Timestamp suffix used in per-playlist archive names
    pub archive_timestamp: String,
    /// Maximum wall time for one item
    #[serde(with = "duration_secs")]
    pub item_timeout: Duration,
    /// Extra attempts for items failing with a transient error
    pub retries: u32,
}

impl RunOptions {
    /// Combined archive name with a guaranteed `.zip` extension
    pub fn combined_zip_name(&self) -> String {
        ensure_zip_extension(&self.combined_archive_name)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        let timestamp = archive_timestamp();
        Self {
            bitrate: Bitrate::default(),
            embed_thumbnail: true,
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            bundling_mode: BundlingMode::default(),
            playlist_cap: 0,
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            combined_archive_name: default_combined_name(&timestamp),
            archive_timestamp: timestamp,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            retries: 0,
        }
    }
}

/// Local-time stamp in `YYYYmmdd_HHMMSS` form
pub fn archive_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn default_combined_name(timestamp: &str) -> String {
    format!("mp3_bundle_{timestamp}.zip")
}

/// Archive file name with a `.zip` extension.
///
/// Path separators and other characters illegal in file names are dropped,
/// so the name is always a single path component.
pub fn ensure_zip_extension(name: &str) -> String {
    let name = sanitize_filename::sanitize(name.trim());
    if name.is_empty() {
        return "archive.zip".to_string();
    }
    if name.to_lowercase().ends_with(".zip") {
        name.to_string()
    } else {
        format!("{name}.zip")
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}
