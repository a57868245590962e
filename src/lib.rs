//! Home camera content producer
//!
//! Publishes camera snapshots into a named-data network. Each captured frame
//! becomes a new version under `/yoursunny.com/homecam-<camera>`, split into
//! numbered segments that consumers fetch by name.
//!
//! # Architecture
//!
//! A single cooperative loop, one cycle per frame:
//!
//! 1. **Capture**: one encoded frame from a `FrameSource`.
//! 2. **Chunk**: pick a strictly increasing version, split into segments.
//! 3. **Publish**: insert every segment into the `ContentStore`, answering
//!    interests that arrived before the data existed.
//! 4. **Register**: at most once per interval, forward a route registration
//!    command to the forwarder.
//! 5. **Drain**: a bounded number of `NetworkFace::process_events` calls.
//!
//! # Module Structure
//!
//! - `name`: names, version/segment components, camera identifiers
//! - `content`: content objects and chunking
//! - `store`: in-memory content store with waiters and a version window
//! - `face`: network face trait, loopback and TCP faces, packet codec
//! - `ingest`: frame sources (synthetic, HTTP snapshot, local file)
//! - `registration`: route registration client and rate limiter
//! - `producer`: the publish cycle
//! - `config`: file/env configuration

pub mod config;
pub mod content;
pub mod error;
pub mod face;
pub mod ingest;
pub mod name;
pub mod producer;
pub mod registration;
pub mod store;

pub use config::ProducerConfig;
pub use content::{segment_payload, ContentObject, MetaInfo};
pub use error::ProducerError;
pub use face::{Interest, InterestCallback, LoopbackFace, NetworkFace, Responder, TcpFace};
pub use ingest::{source_from_uri, FrameSource};
pub use name::{CameraId, Component, Name, NameBuilder, VersionSequence};
pub use producer::{ContentProducer, CycleReport, ProducerSettings, ProducerStats};
pub use registration::{
    HttpRegistrationClient, RegistrationClient, RegistrationOutcome, RegistrationScheduler,
};
pub use store::{ContentStore, ServeOutcome, StoreStats};
