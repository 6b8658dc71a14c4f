mod naming;
mod tagging;

pub use naming::{
    AUDIO_EXTENSION, NameResolver, UNKNOWN_ARTIST, UNTITLED, base_stem, normalize_component,
};
pub use tagging::tag_track;
