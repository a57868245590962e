//! Local snapshot file source.
//!
//! An external camera tool (e.g. `raspistill --timelapse`, `fswebcam --loop`)
//! keeps overwriting one JPEG file; each capture reads its current contents.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::{CaptureStats, FrameSource, MAX_FRAME_BYTES};

pub struct FileSnapshotSource {
    path: PathBuf,
    frame_count: u64,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_count: 0,
        }
    }
}

impl FrameSource for FileSnapshotSource {
    fn connect(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(anyhow!("snapshot file {} does not exist", self.path.display()));
        }
        log::info!("FileSnapshotSource: reading {}", self.path.display());
        Ok(())
    }

    fn capture(&mut self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read snapshot {}", self.path.display()))?;
        if bytes.is_empty() {
            return Err(anyhow!("snapshot {} is empty", self.path.display()));
        }
        if bytes.len() > MAX_FRAME_BYTES {
            return Err(anyhow!(
                "snapshot {} exceeds {} bytes",
                self.path.display(),
                MAX_FRAME_BYTES
            ));
        }
        self.frame_count += 1;
        Ok(bytes)
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: self.path.display().to_string(),
        }
    }
}
