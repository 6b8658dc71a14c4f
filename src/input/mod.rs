mod lines;
mod normalize;

pub use lines::{parse_url_lines, read_url_file};
pub use normalize::{
    BatchWarning, NormalizedInput, PlaylistLimits, PlaylistSummary, WorkItem, normalize_input,
    playlist_key, video_key,
};
