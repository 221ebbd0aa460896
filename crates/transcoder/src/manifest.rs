//! Master playlist generation for adaptive jobs.

use std::fmt::Write as _;

use hlsladder_core::ResolutionSpec;

use crate::hls::HEADER;
use crate::runner::StreamResult;

/// Bandwidth step per ladder position, in bits per second.
pub const BANDWIDTH_STEP: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub bandwidth: u64,
    pub resolution: ResolutionSpec,
    pub stream_url: String,
}

/// Variant streams in ladder order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterManifest {
    pub entries: Vec<ManifestEntry>,
}

impl MasterManifest {
    /// One entry per succeeded result, keeping the given order.
    ///
    /// Bandwidth is positional (`i * 1 Mbit/s`, 1-indexed), not measured.
    pub fn from_results(results: &[StreamResult]) -> Self {
        let entries = results
            .iter()
            .filter(|r| r.is_success())
            .zip(1u64..)
            .map(|(r, position)| ManifestEntry {
                bandwidth: position * BANDWIDTH_STEP,
                resolution: r.resolution.clone(),
                stream_url: r.playlist_url.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        for entry in &self.entries {
            // Writing into a String cannot fail.
            let _ = writeln!(
                out,
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
                entry.bandwidth,
                entry.resolution.dimensions()
            );
            out.push_str(&entry.stream_url);
            out.push('\n');
        }
        out
    }
}

/// Render the master playlist for results already in ladder order.
pub fn build_manifest(ordered_results: &[StreamResult]) -> String {
    MasterManifest::from_results(ordered_results).render()
}
