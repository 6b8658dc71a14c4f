// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{BundlingMode, ensure_zip_extension};
use crate::error::{DeliveryError, PackagingError};
use crate::outcome::OutcomeRecord;
use crate::workspace::Workspace;

/// Maximum length of the playlist part of an archive name
const MAX_SLUG_LENGTH: usize = 80;

/// A produced file and where it lives in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub name: String,
    pub path: PathBuf,
}

/// A group of files destined for one ZIP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub name: String,
    /// Playlist the archive was built for; `None` for combined or loose archives
    pub playlist_id: Option<String>,
    pub entries: Vec<NamedFile>,
}

/// A serialized archive ready for delivery
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub name: String,
    /// Entry names in archive order
    pub entries: Vec<String>,
    pub bytes: Bytes,
}

/// Inputs for naming archives
#[derive(Debug, Clone, Default)]
pub struct ArchiveNaming {
    /// Name of the combined archive, also used for loose videos
    pub combined_name: String,
    /// Suffix for per-playlist archive names
    pub timestamp: String,
    /// Playlist ID to display title
    pub playlist_titles: HashMap<String, String>,
}

impl ArchiveNaming {
    fn playlist_archive_name(&self, playlist_id: &str) -> String {
        let title = self
            .playlist_titles
            .get(playlist_id)
            .map(String::as_str)
            .unwrap_or(playlist_id);
        format!("playlist_{}_{}.zip", slugify(title), self.timestamp)
    }
}

/// Group successful outcomes into archives.
///
/// `Combined` yields at most one archive. `PerPlaylist` yields one archive per
/// playlist in order of first appearance, followed by one archive for videos
/// without a playlist. Groups without successes yield nothing.
pub fn plan_archives(
    outcomes: &[OutcomeRecord],
    mode: BundlingMode,
    workspace: &Workspace,
    naming: &ArchiveNaming,
) -> Vec<Archive> {
    let successes = outcomes.iter().filter_map(|record| {
        let name = record.file_name.as_ref().filter(|_| record.is_success())?;
        Some((
            record.work_item.playlist_id.as_deref(),
            NamedFile {
                name: name.clone(),
                path: workspace.file_path(name),
            },
        ))
    });

    let combined_name = ensure_zip_extension(&naming.combined_name);

    let mut archives = match mode {
        BundlingMode::Combined => {
            let entries: Vec<NamedFile> = successes.map(|(_, file)| file).collect();
            if entries.is_empty() {
                return Vec::new();
            }
            vec![Archive {
                name: combined_name,
                playlist_id: None,
                entries,
            }]
        }
        BundlingMode::PerPlaylist => {
            let mut groups: Vec<Archive> = Vec::new();
            let mut positions: HashMap<String, usize> = HashMap::new();
            let mut loose = Vec::new();

            for (playlist_id, file) in successes {
                let Some(id) = playlist_id else {
                    loose.push(file);
                    continue;
                };
                let position = *positions.entry(id.to_string()).or_insert_with(|| {
                    groups.push(Archive {
                        name: naming.playlist_archive_name(id),
                        playlist_id: Some(id.to_string()),
                        entries: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[position].entries.push(file);
            }

            if !loose.is_empty() {
                groups.push(Archive {
                    name: combined_name,
                    playlist_id: None,
                    entries: loose,
                });
            }
            groups
        }
    };

    make_names_unique(&mut archives);
    archives
}

/// Serialize an archive into ZIP bytes with a flat layout.
///
/// Entries carry a fixed modification time, so equal inputs give equal bytes.
pub async fn write_archive(archive: &Archive) -> Result<PackagedArchive, PackagingError> {
    let zip_err = |source| PackagingError::Zip {
        archive: archive.name.clone(),
        source,
    };

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(zip::DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in &archive.entries {
        let data = tokio::fs::read(&entry.path)
            .await
            .map_err(|e| PackagingError::ReadFailed {
                archive: archive.name.clone(),
                path: entry.path.clone(),
                source: e,
            })?;

        writer.start_file(entry.name.as_str(), options).map_err(zip_err)?;
        writer
            .write_all(&data)
            .map_err(|e| PackagingError::EntryWrite {
                archive: archive.name.clone(),
                source: e,
            })?;
    }

    let cursor = writer.finish().map_err(zip_err)?;

    Ok(PackagedArchive {
        name: archive.name.clone(),
        entries: archive.entries.iter().map(|e| e.name.clone()).collect(),
        bytes: Bytes::from(cursor.into_inner()),
    })
}

/// Plan and serialize every archive for a finished batch
pub async fn package(
    outcomes: &[OutcomeRecord],
    mode: BundlingMode,
    workspace: &Workspace,
    naming: &ArchiveNaming,
) -> Result<Vec<PackagedArchive>, PackagingError> {
    let mut packaged = Vec::new();
    for archive in plan_archives(outcomes, mode, workspace, naming) {
        packaged.push(write_archive(&archive).await?);
    }
    Ok(packaged)
}

/// Write archives into `dir`, creating it if needed
pub fn deliver_archives(
    archives: &[PackagedArchive],
    dir: &Path,
) -> Result<Vec<PathBuf>, DeliveryError> {
    std::fs::create_dir_all(dir).map_err(|e| DeliveryError::CreateDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    archives
        .iter()
        .map(|archive| {
            let path = dir.join(&archive.name);
            std::fs::write(&path, &archive.bytes)
                .map_err(|e| DeliveryError::WriteFailed {
                    path: path.clone(),
                    source: e,
                })
                .map(|()| path)
        })
        .collect()
}

/// Archive-name slug: word characters kept, separator runs become `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        } else if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        }
    }

    let truncated: String = slug.chars().take(MAX_SLUG_LENGTH).collect();
    let trimmed = truncated.trim_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append ` (n)` before the extension of repeated archive names
fn make_names_unique(archives: &mut [Archive]) {
    let mut used = HashSet::new();

    for archive in archives.iter_mut() {
        let stem = archive
            .name
            .strip_suffix(".zip")
            .unwrap_or(&archive.name)
            .to_string();
        let mut counter = 1;
        while !used.insert(archive.name.to_lowercase()) {
            archive.name = format!("{stem} ({counter}).zip");
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    use tempfile::{TempDir, tempdir};
    use zip::ZipArchive;

    use crate::input::WorkItem;

    fn setup() -> (TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let workspace = Workspace::ensure(dir.path().join("out_mp3")).unwrap();
        (dir, workspace)
    }

    fn success(
        workspace: &Workspace,
        index: usize,
        playlist: Option<&str>,
        name: &str,
    ) -> OutcomeRecord {
        std::fs::write(workspace.file_path(name), format!("audio {name}")).unwrap();
        OutcomeRecord::success(
            WorkItem {
                index,
                source_url: format!("https://video/{index}"),
                video_key: format!("https://video/{index}"),
                playlist_id: playlist.map(String::from),
                playlist_index: playlist.map(|_| index + 1),
            },
            name.trim_end_matches(".mp3").to_string(),
            name.to_string(),
            10,
            "hash".to_string(),
        )
    }

    fn failure(index: usize, playlist: Option<&str>) -> OutcomeRecord {
        OutcomeRecord::failed(
            WorkItem {
                index,
                source_url: format!("https://video/{index}"),
                video_key: format!("https://video/{index}"),
                playlist_id: playlist.map(String::from),
                playlist_index: None,
            },
            "Network failure: reset",
        )
    }

    fn naming() -> ArchiveNaming {
        let mut playlist_titles = HashMap::new();
        playlist_titles.insert("PL1".to_string(), "Road Trip".to_string());
        playlist_titles.insert("PL2".to_string(), "Chill - Mix".to_string());
        ArchiveNaming {
            combined_name: "bundle".to_string(),
            timestamp: "20240101_120000".to_string(),
            playlist_titles,
        }
    }

    fn zip_names(bytes: &Bytes) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        archive.file_names().map(String::from).collect::<Vec<_>>()
    }

    #[tokio::test]
    async fn combined_holds_every_success_flat() {
        let (_dir, workspace) = setup();
        let outcomes = vec![
            success(&workspace, 0, None, "Artist X - Song A.mp3"),
            failure(1, None),
            success(&workspace, 2, Some("PL1"), "Artist X - Song B.mp3"),
        ];

        let archives = package(&outcomes, BundlingMode::Combined, &workspace, &naming())
            .await
            .unwrap();

        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].name, "bundle.zip");
        assert_eq!(
            archives[0].entries,
            vec!["Artist X - Song A.mp3", "Artist X - Song B.mp3"]
        );

        let mut names = zip_names(&archives[0].bytes);
        names.sort();
        assert_eq!(names, vec!["Artist X - Song A.mp3", "Artist X - Song B.mp3"]);
        assert!(names.iter().all(|n| !n.contains('/')));
    }

    #[tokio::test]
    async fn archive_contents_match_workspace_files() {
        let (_dir, workspace) = setup();
        let outcomes = vec![success(&workspace, 0, None, "Artist X - Song A.mp3")];

        let archives = package(&outcomes, BundlingMode::Combined, &workspace, &naming())
            .await
            .unwrap();

        let mut zip = ZipArchive::new(Cursor::new(archives[0].bytes.to_vec())).unwrap();
        let mut content = String::new();
        zip.by_name("Artist X - Song A.mp3")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "audio Artist X - Song A.mp3");
    }

    #[test]
    fn per_playlist_groups_by_playlist_then_loose() {
        let (_dir, workspace) = setup();
        let outcomes = vec![
            success(&workspace, 0, None, "loose1.mp3"),
            success(&workspace, 1, Some("PL1"), "a.mp3"),
            success(&workspace, 2, Some("PL2"), "b.mp3"),
            success(&workspace, 3, Some("PL1"), "c.mp3"),
            success(&workspace, 4, None, "loose2.mp3"),
        ];

        let archives =
            plan_archives(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming());

        let summary: Vec<(&str, Vec<&str>)> = archives
            .iter()
            .map(|a| {
                (
                    a.name.as_str(),
                    a.entries.iter().map(|e| e.name.as_str()).collect(),
                )
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                ("playlist_Road_Trip_20240101_120000.zip", vec!["a.mp3", "c.mp3"]),
                ("playlist_Chill_Mix_20240101_120000.zip", vec!["b.mp3"]),
                ("bundle.zip", vec!["loose1.mp3", "loose2.mp3"]),
            ]
        );
        assert_eq!(archives[0].playlist_id.as_deref(), Some("PL1"));
        assert!(archives[2].playlist_id.is_none());
    }

    #[test]
    fn per_playlist_without_loose_videos_has_no_loose_archive() {
        let (_dir, workspace) = setup();
        let outcomes = vec![
            success(&workspace, 0, Some("PL1"), "a.mp3"),
            failure(1, None),
        ];

        let archives =
            plan_archives(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming());

        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].playlist_id.as_deref(), Some("PL1"));
    }

    #[test]
    fn playlists_without_successes_produce_nothing() {
        let (_dir, workspace) = setup();
        let outcomes = vec![failure(0, Some("PL1")), success(&workspace, 1, Some("PL2"), "b.mp3")];

        let archives =
            plan_archives(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming());

        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].playlist_id.as_deref(), Some("PL2"));
    }

    #[tokio::test]
    async fn no_successes_means_no_archives() {
        let (_dir, workspace) = setup();
        let outcomes = vec![failure(0, None), failure(1, Some("PL1"))];

        assert!(
            package(&outcomes, BundlingMode::Combined, &workspace, &naming())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            package(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn packaging_is_deterministic() {
        let (_dir, workspace) = setup();
        let outcomes = vec![
            success(&workspace, 0, Some("PL1"), "a.mp3"),
            success(&workspace, 1, None, "b.mp3"),
        ];

        let first = package(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming())
            .await
            .unwrap();
        let second = package(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming())
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.entries, b.entries);
            assert_eq!(a.bytes, b.bytes);
        }
    }

    #[test]
    fn playlists_with_equal_titles_get_distinct_archive_names() {
        let (_dir, workspace) = setup();
        let mut naming = naming();
        naming.playlist_titles.insert("PL3".to_string(), "Road Trip".to_string());
        let outcomes = vec![
            success(&workspace, 0, Some("PL1"), "a.mp3"),
            success(&workspace, 1, Some("PL3"), "b.mp3"),
        ];

        let archives = plan_archives(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming);

        assert_eq!(archives[0].name, "playlist_Road_Trip_20240101_120000.zip");
        assert_eq!(archives[1].name, "playlist_Road_Trip_20240101_120000 (1).zip");
    }

    #[tokio::test]
    async fn missing_workspace_file_is_a_packaging_error() {
        let (_dir, workspace) = setup();
        let outcomes = vec![success(&workspace, 0, None, "a.mp3")];
        std::fs::remove_file(workspace.file_path("a.mp3")).unwrap();

        let result = package(&outcomes, BundlingMode::Combined, &workspace, &naming())
            .await;
        assert!(matches!(result, Err(PackagingError::ReadFailed { .. })));
    }

    #[tokio::test]
    async fn deliver_writes_each_archive() {
        let (dir, workspace) = setup();
        let outcomes = vec![
            success(&workspace, 0, Some("PL1"), "a.mp3"),
            success(&workspace, 1, None, "b.mp3"),
        ];
        let archives = package(&outcomes, BundlingMode::PerPlaylist, &workspace, &naming())
            .await
            .unwrap();
        let target = dir.path().join("downloads");

        let paths = deliver_archives(&archives, &target).unwrap();

        assert_eq!(paths.len(), 2);
        for (path, archive) in paths.iter().zip(&archives) {
            assert_eq!(std::fs::read(path).unwrap(), archive.bytes.to_vec());
        }
    }

    #[tokio::test]
    async fn archive_name_cannot_leave_delivery_directory() {
        let (dir, workspace) = setup();
        let outcomes = vec![success(&workspace, 0, None, "a.mp3")];
        let target = dir.path().join("downloads");

        for combined_name in ["../escape.zip", "/tmp/escape", "..\\escape.zip"] {
            let naming = ArchiveNaming {
                combined_name: combined_name.to_string(),
                ..naming()
            };
            let archives = package(&outcomes, BundlingMode::Combined, &workspace, &naming)
                .await
                .unwrap();

            let paths = deliver_archives(&archives, &target).unwrap();
            assert_eq!(paths[0].parent(), Some(target.as_path()));
        }
    }

    #[test]
    fn slugify_follows_word_rules() {
        assert_eq!(slugify("Road Trip"), "Road_Trip");
        assert_eq!(slugify("Chill - Mix"), "Chill_Mix");
        assert_eq!(slugify("  Best of: 2024!! "), "Best_of_2024");
        assert_eq!(slugify("Lagu Santai Café"), "Lagu_Santai_Café");
        assert_eq!(slugify("!!!"), "untitled");
        assert_eq!(slugify(&"a".repeat(120)).len(), 80);
    }
}
