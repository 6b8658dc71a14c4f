// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{FetchEncoder, FetchResult, PlaylistListing};
use crate::config::Bitrate;
use crate::error::{EncoderError, FetchError, PlaylistError};

#[derive(Debug, Clone, Copy)]
pub enum FailKind {
    Network,
    Unavailable,
    Unsupported,
}

impl FailKind {
    fn error(self, url: &str) -> FetchError {
        match self {
            FailKind::Network => FetchError::NetworkFailure(format!("connection reset: {url}")),
            FailKind::Unavailable => FetchError::Unavailable(format!("private video: {url}")),
            FailKind::Unsupported => FetchError::UnsupportedFormat(format!("unsupported: {url}")),
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    title: Option<String>,
    artist: Option<String>,
    video_id: Option<String>,
    thumbnail: Option<Vec<u8>>,
    /// Network failures to return before succeeding
    failures: usize,
    delay: Option<Duration>,
}

#[derive(Debug, Clone)]
enum Script {
    Track(Track),
    Fail(FailKind),
}

/// Adapter whose answers are set up per URL
#[derive(Default)]
pub struct ScriptedAdapter {
    scripts: HashMap<String, Script>,
    playlists: HashMap<String, PlaylistListing>,
    stalled_playlists: HashMap<String, Duration>,
    attempts: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    encoder_missing: bool,
    on_fetch: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(mut self, url: &str, title: &str, artist: &str) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Track(Track {
                title: Some(title.to_string()),
                artist: Some(artist.to_string()),
                video_id: Some(url.rsplit('/').next().unwrap_or(url).to_string()),
                thumbnail: Some(b"\xff\xd8\xff cover".to_vec()),
                failures: 0,
                delay: None,
            }),
        );
        self
    }

    pub fn anonymous_track(mut self, url: &str) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Track(Track {
                title: None,
                artist: None,
                video_id: None,
                thumbnail: None,
                failures: 0,
                delay: None,
            }),
        );
        self
    }

    pub fn failing(mut self, url: &str, kind: FailKind) -> Self {
        self.scripts.insert(url.to_string(), Script::Fail(kind));
        self
    }

    /// Fail with network errors `failures` times, then succeed
    pub fn flaky(mut self, url: &str, failures: usize) -> Self {
        self = self.track(url, "Flaky", "Artist X");
        if let Some(Script::Track(track)) = self.scripts.get_mut(url) {
            track.failures = failures;
        }
        self
    }

    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self = self.track(url, "Slow", "Artist X");
        if let Some(Script::Track(track)) = self.scripts.get_mut(url) {
            track.delay = Some(delay);
        }
        self
    }

    pub fn playlist(mut self, url: &str, id: &str, title: &str, entries: &[&str]) -> Self {
        self.playlists.insert(
            url.to_string(),
            PlaylistListing {
                id: Some(id.to_string()),
                title: Some(title.to_string()),
                entries: entries.iter().map(|e| e.to_string()).collect(),
            },
        );
        self
    }

    /// Answer the playlist lookup only after `delay`
    pub fn stalled_playlist(mut self, url: &str, delay: Duration) -> Self {
        self.stalled_playlists.insert(url.to_string(), delay);
        self
    }

    pub fn without_encoder(mut self) -> Self {
        self.encoder_missing = true;
        self
    }

    /// Run a callback with the 1-based call number on every fetch
    pub fn on_fetch(mut self, callback: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_fetch = Some(Box::new(callback));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchEncoder for ScriptedAdapter {
    async fn check_available(&self) -> Result<(), EncoderError> {
        if self.encoder_missing {
            return Err(EncoderError::NotFound {
                tool: "ffmpeg".to_string(),
            });
        }
        Ok(())
    }

    async fn resolve_playlist(
        &self,
        url: &str,
        _cap: usize,
    ) -> Result<PlaylistListing, PlaylistError> {
        if let Some(delay) = self.stalled_playlists.get(url) {
            tokio::time::sleep(*delay).await;
        }

        self.playlists
            .get(url)
            .cloned()
            .ok_or_else(|| PlaylistError::ResolveFailed {
                url: url.to_string(),
                reason: "playlist does not exist".to_string(),
            })
    }

    async fn fetch_and_encode(
        &self,
        url: &str,
        _bitrate: Bitrate,
        embed_thumbnail: bool,
    ) -> Result<FetchResult, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(callback) = &self.on_fetch {
            callback(call);
        }

        let script = self
            .scripts
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::UnsupportedFormat(format!("unknown url {url}")))?;

        let track = match script {
            Script::Fail(kind) => return Err(kind.error(url)),
            Script::Track(track) => track,
        };

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(url.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt <= track.failures {
            return Err(FailKind::Network.error(url));
        }

        if let Some(delay) = track.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(FetchResult {
            video_id: track.video_id,
            title: track.title,
            artist: track.artist,
            thumbnail: track.thumbnail.filter(|_| embed_thumbnail).map(Bytes::from),
            audio: Bytes::from(format!("mp3 audio for {url}")),
        })
    }
}
