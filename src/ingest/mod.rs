//! Frame capture sources.
//!
//! Every source hands out one already-encoded JPEG frame per `capture` call:
//! - `stub://...`: synthetic frames (tests, smoke runs without a camera)
//! - `http(s)://...`: one snapshot per capture from a camera's HTTP endpoint
//! - local path: a snapshot file rewritten by an external camera tool
//!
//! Capture is synchronous. The producer never runs two captures at once.

pub mod file;
pub mod http;
pub mod synthetic;

use anyhow::{anyhow, Result};

pub use file::FileSnapshotSource;
pub use http::HttpSnapshotSource;
pub use synthetic::SyntheticSource;

/// Upper bound on a single encoded frame.
pub const MAX_FRAME_BYTES: usize = 5 * 1024 * 1024;

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource {
    /// Prepare the source. Sources that need no setup keep the default.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Capture one encoded frame. Blocks until the frame is available.
    fn capture(&mut self) -> Result<Vec<u8>>;

    fn stats(&self) -> CaptureStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn capture(&mut self) -> Result<Vec<u8>> {
        (**self).capture()
    }

    fn stats(&self) -> CaptureStats {
        (**self).stats()
    }
}

/// Pick a source from its URI.
pub fn source_from_uri(uri: &str) -> Result<Box<dyn FrameSource + Send>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(anyhow!("frame source must not be empty"));
    }
    if uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(uri)));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(Box::new(HttpSnapshotSource::new(uri)?));
    }
    if uri.contains("://") {
        return Err(anyhow!(
            "unsupported frame source '{}'; expected stub://, http(s):// or a local path",
            uri
        ));
    }
    Ok(Box::new(FileSnapshotSource::new(uri)))
}

/// True if `bytes` starts with a JPEG SOI marker and ends with EOI.
#[cfg(test)]
pub(crate) fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes.starts_with(&[0xFF, 0xD8]) && bytes.ends_with(&[0xFF, 0xD9])
}
