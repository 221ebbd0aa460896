//! HLS file naming shared by the runner, the layout and the URL builder.

/// Extension of every playlist this crate writes or asks ffmpeg to write.
pub const PLAYLIST_EXTENSION: &str = "m3u8";

/// Per-resolution media playlist name.
pub const VARIANT_PLAYLIST: &str = "index.m3u8";

/// Master playlist name at the root of an adaptive job.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// First line of every playlist.
pub const HEADER: &str = "#EXTM3U";

/// Content-Type for HLS master/variant playlists.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content-Type for MPEG-TS segments.
pub const SEGMENT_CONTENT_TYPE_TS: &str = "video/MP2T";

/// Content-Type for files in an output tree, by extension.
pub fn content_type(filename: &str) -> &'static str {
    if filename.ends_with(".m3u8") {
        PLAYLIST_CONTENT_TYPE
    } else if filename.ends_with(".ts") {
        SEGMENT_CONTENT_TYPE_TS
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type(VARIANT_PLAYLIST), PLAYLIST_CONTENT_TYPE);
        assert_eq!(content_type("index0.ts"), SEGMENT_CONTENT_TYPE_TS);
        assert_eq!(content_type("notes.txt"), "application/octet-stream");
    }

    #[test]
    fn playlist_names_use_extension() {
        assert!(VARIANT_PLAYLIST.ends_with(PLAYLIST_EXTENSION));
        assert!(MASTER_PLAYLIST.ends_with(PLAYLIST_EXTENSION));
    }
}
