// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{FetchEncoder, FetchResult, PlaylistListing};
use crate::config::Bitrate;
use crate::error::{EncoderError, FetchError, PlaylistError};

const YTDLP_TOOL: &str = "yt-dlp";
const FFMPEG_TOOL: &str = "ffmpeg";

/// Adapter backed by the `yt-dlp` command-line tool, with `ffmpeg` doing the
/// MP3 transcode and thumbnail conversion.
#[derive(Debug, Clone)]
pub struct YtDlpAdapter {
    ytdlp: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpAdapter {
    pub fn new(ytdlp: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            ffmpeg_location: None,
        }
    }

    /// Locate `yt-dlp` on `PATH`
    pub fn from_path() -> Result<Self, EncoderError> {
        which::which(YTDLP_TOOL)
            .map(Self::new)
            .map_err(|_| EncoderError::NotFound {
                tool: YTDLP_TOOL.to_string(),
            })
    }

    /// Use an explicit ffmpeg binary or directory instead of the one on `PATH`
    pub fn with_ffmpeg_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(location.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ytdlp);
        cmd.kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(["--no-warnings", "--no-progress"]);
        if let Some(location) = &self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(location);
        }
        cmd
    }
}

#[async_trait]
impl FetchEncoder for YtDlpAdapter {
    async fn check_available(&self) -> Result<(), EncoderError> {
        match &self.ffmpeg_location {
            Some(location) if !location.exists() => {
                return Err(EncoderError::MissingOverride {
                    tool: FFMPEG_TOOL.to_string(),
                    path: location.clone(),
                });
            }
            Some(_) => {}
            None => {
                which::which(FFMPEG_TOOL).map_err(|_| EncoderError::NotFound {
                    tool: FFMPEG_TOOL.to_string(),
                })?;
            }
        }

        let output = Command::new(&self.ytdlp)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EncoderError::NotExecutable {
                tool: self.ytdlp.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(EncoderError::NotExecutable {
                tool: self.ytdlp.display().to_string(),
                source: std::io::Error::other(format!("--version exited with {}", output.status)),
            });
        }

        debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "yt-dlp available"
        );
        Ok(())
    }

    async fn resolve_playlist(
        &self,
        url: &str,
        cap: usize,
    ) -> Result<PlaylistListing, PlaylistError> {
        let mut cmd = self.command();
        cmd.args(["--flat-playlist", "--dump-single-json", "--yes-playlist"]);
        if cap > 0 {
            cmd.arg("--playlist-end").arg(cap.to_string());
        }
        cmd.arg(url);
        debug!(url, cap, "listing playlist");

        let output = cmd.output().await.map_err(|e| PlaylistError::Spawn {
            url: url.to_string(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(PlaylistError::ResolveFailed {
                url: url.to_string(),
                reason: failure_message(&output),
            });
        }

        parse_playlist_listing(url, &output.stdout)
    }

    async fn fetch_and_encode(
        &self,
        url: &str,
        bitrate: Bitrate,
        embed_thumbnail: bool,
    ) -> Result<FetchResult, FetchError> {
        let staging = tempfile::tempdir().map_err(|e| FetchError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let template = staging.path().join("%(id)s.%(ext)s");

        let mut cmd = self.command();
        cmd.args([
            "--no-playlist",
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
        ])
        .arg(format!("{}K", bitrate.kbps()))
        .arg("--write-info-json");
        if embed_thumbnail {
            cmd.args(["--write-thumbnail", "--convert-thumbnails", "jpg"]);
        }
        cmd.arg("--output").arg(&template).arg(url);
        debug!(url, %bitrate, embed_thumbnail, "fetching");

        let output = cmd.output().await.map_err(|e| FetchError::Io {
            path: self.ytdlp.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(classify_failure(&failure_message(&output)));
        }

        collect_result(staging.path(), embed_thumbnail).await
    }
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    url: Option<String>,
    webpage_url: Option<String>,
    id: Option<String>,
}

impl RawEntry {
    fn into_url(self) -> Option<String> {
        match self {
            RawEntry { url: Some(url), .. } if url.starts_with("http") => Some(url),
            RawEntry {
                webpage_url: Some(url),
                ..
            } => Some(url),
            RawEntry { id: Some(id), .. } => Some(format!("https://www.youtube.com/watch?v={id}")),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
}

fn parse_playlist_listing(url: &str, json: &[u8]) -> Result<PlaylistListing, PlaylistError> {
    let raw: RawPlaylist =
        serde_json::from_slice(json).map_err(|e| PlaylistError::InvalidListing {
            url: url.to_string(),
            source: e,
        })?;

    let entries: Vec<String> = raw
        .entries
        .into_iter()
        .flatten()
        .filter_map(RawEntry::into_url)
        .collect();

    if entries.is_empty() {
        return Err(PlaylistError::Empty {
            url: url.to_string(),
        });
    }

    Ok(PlaylistListing {
        id: raw.id,
        title: raw.title.filter(|t| !t.trim().is_empty()),
        entries,
    })
}

/// Gather the MP3, info JSON and optional thumbnail from a staging directory
async fn collect_result(staging: &Path, want_thumbnail: bool) -> Result<FetchResult, FetchError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| FetchError::Io { path, source }
    };

    let mut audio_path = None;
    let mut info_path = None;
    let mut thumbnail_path = None;

    let mut entries = tokio::fs::read_dir(staging).await.map_err(io_err(staging))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err(staging))? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(".info.json") {
            info_path = Some(path);
        } else if name.ends_with(".mp3") {
            audio_path = Some(path);
        } else if name.ends_with(".jpg") || name.ends_with(".jpeg") || name.ends_with(".png") {
            thumbnail_path = Some(path);
        }
    }

    let audio_path = audio_path
        .ok_or_else(|| FetchError::UnsupportedFormat("no MP3 file was produced".to_string()))?;
    let audio = tokio::fs::read(&audio_path)
        .await
        .map_err(io_err(&audio_path))?;

    let info = match info_path {
        Some(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(io_err(&path))?;
            serde_json::from_slice::<RawInfo>(&bytes).ok()
        }
        None => None,
    };

    let thumbnail = match thumbnail_path.filter(|_| want_thumbnail) {
        Some(path) => Some(Bytes::from(
            tokio::fs::read(&path).await.map_err(io_err(&path))?,
        )),
        None => None,
    };

    let (video_id, title, artist) = match info {
        Some(info) => (
            info.id,
            info.title,
            info.artist.or(info.uploader).or(info.channel),
        ),
        None => (None, None, None),
    };

    Ok(FetchResult {
        video_id,
        title,
        artist,
        thumbnail,
        audio: Bytes::from(audio),
    })
}

/// The most specific error line yt-dlp printed
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix("ERROR:"))
        .map(|line| line.trim().to_string())
        .or_else(|| lines.last().map(|line| line.to_string()))
        .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status))
}

/// Map a yt-dlp error message onto the fetch error taxonomy.
///
/// Messages that match nothing known are reported as unavailable, which is
/// never retried.
pub fn classify_failure(message: &str) -> FetchError {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&[
        "unsupported url",
        "no video formats",
        "requested format is not available",
        "drm",
        "postprocessing",
    ]) {
        FetchError::UnsupportedFormat(message.to_string())
    } else if has(&[
        "timed out",
        "unable to download",
        "http error 5",
        "connection",
        "name resolution",
        "network is unreachable",
        "temporary failure",
    ]) {
        FetchError::NetworkFailure(message.to_string())
    } else {
        FetchError::Unavailable(message.to_string())
    }
}
