//! Outbound path: local library to the downstream catalog.

mod snapshot;
mod song_body;
mod sweep;

pub use snapshot::RemoteMirrorSnapshot;
pub use song_body::{
    build_song_body, parse_song_filename, song_body_changed, song_detail, song_filename,
    song_version, DETAIL_MAX_CHARS,
};
pub use sweep::{work_type_for, ExportReconciler, SweepReport};
