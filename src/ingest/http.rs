//! HTTP snapshot source.
//!
//! Each capture is one GET against a camera's still-image endpoint
//! (e.g. `http://<camera>/capture`). The response body is the frame.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;

use super::{CaptureStats, FrameSource, MAX_FRAME_BYTES};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpSnapshotSource {
    url: String,
    agent: ureq::Agent,
    frame_count: u64,
}

impl HttpSnapshotSource {
    pub fn new(url: &str) -> Result<Self> {
        url::Url::parse(url).with_context(|| format!("parse snapshot url {}", url))?;
        Ok(Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(SNAPSHOT_TIMEOUT).build(),
            frame_count: 0,
        })
    }
}

impl FrameSource for HttpSnapshotSource {
    fn capture(&mut self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("fetch snapshot from {}", self.url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FRAME_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .context("read snapshot body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty snapshot from {}", self.url));
        }
        if bytes.len() > MAX_FRAME_BYTES {
            return Err(anyhow!(
                "snapshot from {} exceeds {} bytes",
                self.url,
                MAX_FRAME_BYTES
            ));
        }
        self.frame_count += 1;
        Ok(bytes)
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: self.url.clone(),
        }
    }
}
