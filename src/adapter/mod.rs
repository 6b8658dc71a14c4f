// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
pub(crate) mod testing;
mod ytdlp;

pub use ytdlp::{YtDlpAdapter, classify_failure};

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Bitrate;
use crate::error::{EncoderError, FetchError, PlaylistError};

/// Ordered members of a playlist, as reported by the downloader
#[derive(Debug, Clone, Default)]
pub struct PlaylistListing {
    /// Stable identifier of the playlist, if the site exposes one
    pub id: Option<String>,
    pub title: Option<String>,
    /// Member video URLs in playlist order
    pub entries: Vec<String>,
}

/// Audio and metadata produced for one video
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Site-specific video identifier
    pub video_id: Option<String>,
    pub title: Option<String>,
    /// Uploader or channel name
    pub artist: Option<String>,
    /// Cover image, present only when thumbnails were requested and available
    pub thumbnail: Option<Bytes>,
    /// MP3-encoded audio
    pub audio: Bytes,
}

/// Download-and-transcode collaborator.
///
/// Calls are treated as blocking units of work by the orchestrator, which
/// applies its own timeout around [`FetchEncoder::fetch_and_encode`].
#[async_trait]
pub trait FetchEncoder: Send + Sync {
    /// Verify the external tools can be located and invoked
    async fn check_available(&self) -> Result<(), EncoderError>;

    /// List the videos of a playlist without downloading them.
    /// A `cap` of 0 means no limit.
    async fn resolve_playlist(&self, url: &str, cap: usize)
    -> Result<PlaylistListing, PlaylistError>;

    /// Download one video and transcode its audio to MP3
    async fn fetch_and_encode(
        &self,
        url: &str,
        bitrate: Bitrate,
        embed_thumbnail: bool,
    ) -> Result<FetchResult, FetchError>;
}
