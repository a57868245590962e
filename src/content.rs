//! Content objects and payload segmentation.
//!
//! One captured frame becomes one version: `N = ceil(len / chunk_size)`
//! segments, numbered `0..N`, each carrying the same `MetaInfo` with
//! `final_segment_id = N - 1`.

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::name::{Name, NameBuilder};

/// Metadata shared by every segment of one version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaInfo {
    pub freshness_period: Duration,
    pub final_segment_id: u64,
}

/// Immutable named content object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentObject {
    name: Name,
    meta_info: MetaInfo,
    payload: Vec<u8>,
}

impl ContentObject {
    pub fn new(name: Name, meta_info: MetaInfo, payload: Vec<u8>) -> Self {
        Self {
            name,
            meta_info,
            payload,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    pub fn freshness_period(&self) -> Duration {
        self.meta_info.freshness_period
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Number of segments for a payload of `len` bytes.
pub fn segment_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Split `payload` into segment objects under `versioned`.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which may be shorter.
pub fn segment_payload(
    versioned: &Name,
    payload: &[u8],
    chunk_size: usize,
    freshness_period: Duration,
) -> Result<Vec<ContentObject>> {
    if chunk_size == 0 {
        return Err(anyhow!("chunk size must be > 0"));
    }
    if payload.is_empty() {
        return Err(anyhow!("refusing to publish an empty payload"));
    }

    let count = segment_count(payload.len(), chunk_size);
    let meta_info = MetaInfo {
        freshness_period,
        final_segment_id: (count - 1) as u64,
    };

    Ok(payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(segment, chunk)| {
            ContentObject::new(
                NameBuilder::with_segment(versioned, segment as u64),
                meta_info,
                chunk.to_vec(),
            )
        })
        .collect())
}
