// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};

const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

/// Set title and artist tags and, when given, the front cover image.
///
/// Tags already present in the file are kept unless overwritten here.
pub fn tag_track(
    path: &Path,
    title: &str,
    artist: &str,
    cover: Option<&[u8]>,
) -> Result<(), id3::Error> {
    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());

    tag.set_title(title);
    tag.set_artist(artist);

    if let Some(data) = cover {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: image_mime_type(data).to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data: data.to_vec(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)
}

fn image_mime_type(data: &[u8]) -> &'static str {
    if data.starts_with(&PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    }
}
