//! The capture/publish cycle.
//!
//! One cycle: capture a frame, pick the next version, split the frame into
//! segments, insert every segment into the store, give the registration
//! scheduler a chance to run, then drain a bounded number of face events.
//! Cycles run back to back; capture latency is the only pacing.
//!
//! Every failure aborts the cycle and is returned to the caller unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::content::segment_payload;
use crate::error::ProducerError;
use crate::face::{Interest, NetworkFace, Responder};
use crate::ingest::FrameSource;
use crate::name::{CameraId, Name, NameBuilder, VersionSequence};
use crate::registration::{RegistrationOutcome, RegistrationScheduler};
use crate::store::{ContentStore, DEFAULT_RETAINED_VERSIONS};

pub const DEFAULT_CHUNK_SIZE: usize = 1200;
pub const DEFAULT_FRESHNESS_PERIOD: Duration = Duration::from_millis(10_000);
pub const DEFAULT_DRAIN_ITERATIONS: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProducerSettings {
    pub chunk_size: usize,
    pub freshness_period: Duration,
    /// `process_events` calls per cycle. Bounded so the loop always returns
    /// to capturing.
    pub drain_iterations: usize,
    pub retained_versions: usize,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            freshness_period: DEFAULT_FRESHNESS_PERIOD,
            drain_iterations: DEFAULT_DRAIN_ITERATIONS,
            retained_versions: DEFAULT_RETAINED_VERSIONS,
        }
    }
}

/// What one cycle published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub version: u64,
    pub versioned_name: Name,
    pub segments: usize,
    pub bytes: usize,
    /// Waiting interests answered by this cycle's inserts.
    pub answered_waiters: usize,
    pub registration: RegistrationOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub cycles: u64,
    pub segments_published: u64,
    pub bytes_published: u64,
    pub registrations: u64,
    pub last_version: Option<u64>,
}

pub struct ContentProducer<S: FrameSource, F: NetworkFace> {
    source: S,
    face: F,
    store: Arc<ContentStore>,
    prefix: Name,
    versions: VersionSequence,
    registration: RegistrationScheduler,
    settings: ProducerSettings,
    stats: ProducerStats,
}

impl<S: FrameSource, F: NetworkFace> ContentProducer<S, F> {
    /// Connect the source and attach a fresh content store to the face under
    /// the camera prefix.
    pub fn new(
        camera: &CameraId,
        mut source: S,
        mut face: F,
        registration: RegistrationScheduler,
        settings: ProducerSettings,
    ) -> Result<Self, ProducerError> {
        if settings.chunk_size == 0 {
            return Err(ProducerError::Chunking("chunk size must be > 0".to_string()));
        }
        source.connect().map_err(ProducerError::Capture)?;

        let store = Arc::new(ContentStore::new(settings.retained_versions));
        let prefix = NameBuilder::base_prefix(camera);
        let filter_store = Arc::clone(&store);
        face.register_interest_callback(
            prefix.clone(),
            Box::new(move |interest: &Interest, responder: &Responder| {
                filter_store.serve(interest, responder);
            }),
        )
        .map_err(ProducerError::Transport)?;
        log::info!(
            "producer ready: prefix={} chunk_size={} freshness={}ms drain={}",
            prefix,
            settings.chunk_size,
            settings.freshness_period.as_millis(),
            settings.drain_iterations
        );

        Ok(Self {
            source,
            face,
            store,
            prefix,
            versions: VersionSequence::new(),
            registration,
            settings,
            stats: ProducerStats::default(),
        })
    }

    /// Run cycles until one fails.
    pub fn run(&mut self) -> Result<(), ProducerError> {
        loop {
            self.run_cycle()?;
        }
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport, ProducerError> {
        self.run_cycle_at(wall_clock_ms(), Instant::now())
    }

    /// One cycle with explicit clocks: `now_ms` feeds the version,
    /// `now` drives freshness and the registration interval.
    pub fn run_cycle_at(
        &mut self,
        now_ms: u64,
        now: Instant,
    ) -> Result<CycleReport, ProducerError> {
        let frame = self.source.capture().map_err(ProducerError::Capture)?;
        if frame.is_empty() {
            return Err(ProducerError::Chunking("captured frame is empty".to_string()));
        }

        let version = self.versions.next(now_ms);
        let versioned_name = NameBuilder::with_version(&self.prefix, version);
        let objects = segment_payload(
            &versioned_name,
            &frame,
            self.settings.chunk_size,
            self.settings.freshness_period,
        )
        .map_err(|e| ProducerError::Chunking(format!("{:#}", e)))?;

        let segments = objects.len();
        let mut answered_waiters = 0;
        for object in objects {
            answered_waiters += self
                .store
                .insert_at(object, now)
                .map_err(|e| ProducerError::Store(format!("{:#}", e)))?;
        }
        log::info!("{} {}", versioned_name, segments);

        self.stats.segments_published += segments as u64;
        self.stats.bytes_published += frame.len() as u64;
        self.stats.last_version = Some(version);

        let registration = self.registration.maybe_register(now, &mut self.face)?;
        self.stats.registrations = self.registration.registrations();

        self.drain()?;
        self.stats.cycles += 1;

        let store_stats = self.store.stats();
        log::debug!(
            "store: entries={} pending={} versions={} evicted={}",
            store_stats.entries,
            store_stats.pending_interests,
            store_stats.retained_versions,
            store_stats.evicted_total
        );

        Ok(CycleReport {
            version,
            versioned_name,
            segments,
            bytes: frame.len(),
            answered_waiters,
            registration,
        })
    }

    fn drain(&mut self) -> Result<(), ProducerError> {
        for _ in 0..self.settings.drain_iterations {
            self.face.process_events().map_err(ProducerError::Transport)?;
        }
        Ok(())
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    pub fn face_mut(&mut self) -> &mut F {
        &mut self.face
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }
}

/// Milliseconds since the Unix epoch. A clock before the epoch reads as 0;
/// the version sequence still advances.
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
