//! Synthetic frame source (`stub://`).
//!
//! Produces JPEG-framed byte blobs whose length varies from frame to frame,
//! so segment counts change across versions the way a real camera's do.

use anyhow::Result;

use super::{CaptureStats, FrameSource};

const BASE_FRAME_BYTES: usize = 6_000;
const FRAME_BYTES_SPREAD: u64 = 4_000;

pub struct SyntheticSource {
    uri: String,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            frame_count: 0,
        }
    }

    fn frame_len(&self) -> usize {
        BASE_FRAME_BYTES + (self.frame_count.wrapping_mul(2_731) % FRAME_BYTES_SPREAD) as usize
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {} (synthetic)", self.uri);
        Ok(())
    }

    fn capture(&mut self) -> Result<Vec<u8>> {
        self.frame_count += 1;
        let len = self.frame_len();
        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(&[0xFF, 0xD8]);
        for i in 0..len.saturating_sub(4) {
            // Never emit 0xFF so the body cannot contain a marker.
            frame.push(((i as u64 + self.frame_count) % 255) as u8);
        }
        frame.extend_from_slice(&[0xFF, 0xD9]);
        Ok(frame)
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: self.uri.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::looks_like_jpeg;

    #[test]
    fn frames_are_jpeg_framed_and_vary_in_length() {
        let mut source = SyntheticSource::new("stub://test");
        source.connect().unwrap();
        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        assert!(looks_like_jpeg(&a));
        assert!(looks_like_jpeg(&b));
        assert_ne!(a.len(), b.len());
        assert!(!a[2..a.len() - 2].contains(&0xFF));
        assert_eq!(source.stats().frames_captured, 2);
    }
}
