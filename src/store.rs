//! In-memory content store.
//!
//! - Exact-name lookups only.
//! - Entries go stale `freshness_period` after insertion; a stale entry is a miss.
//!   Staleness is checked at lookup time, nothing sweeps in the background.
//! - An interest that misses is parked as a waiter until its lifetime runs out.
//!   Inserting a matching object answers every live waiter as part of the insert.
//! - At most `retained_versions` versions are kept per prefix. Publishing one more
//!   physically removes every segment of the oldest version.
//!
//! The store is shared between the producer (writer) and the face callbacks
//! (readers on behalf of consumers). One mutex guards all state; every
//! operation holds it for a bounded amount of work.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::content::ContentObject;
use crate::face::{Interest, Responder};
use crate::name::{Component, Name};

/// Default number of versions kept per prefix.
pub const DEFAULT_RETAINED_VERSIONS: usize = 8;

struct StoredObject {
    object: ContentObject,
    stale_at: Instant,
}

struct PendingInterest {
    expires_at: Instant,
    responder: Responder,
}

struct VersionRecord {
    versioned: Name,
    segments: Vec<Name>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<Name, StoredObject>,
    pending: HashMap<Name, Vec<PendingInterest>>,
    /// Keyed by the name preceding the version component.
    versions: HashMap<Name, VecDeque<VersionRecord>>,
    evicted_total: u64,
}

/// Outcome of handing an interest to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Answered from a fresh entry.
    Answered,
    /// Parked until a matching insert or until the interest lifetime ends.
    Pending,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub pending_interests: usize,
    pub retained_versions: usize,
    pub evicted_total: u64,
}

pub struct ContentStore {
    inner: Mutex<StoreInner>,
    retained_versions: usize,
}

impl ContentStore {
    pub fn new(retained_versions: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            retained_versions: retained_versions.max(1),
        }
    }

    // Poisoning is ignored: no operation leaves the maps half-updated.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `object`, replacing any entry with the same name, and answer
    /// waiters for that exact name. Returns how many waiters were answered.
    pub fn insert(&self, object: ContentObject) -> Result<usize> {
        self.insert_at(object, Instant::now())
    }

    pub fn insert_at(&self, object: ContentObject, now: Instant) -> Result<usize> {
        if object.name().is_empty() {
            return Err(anyhow!("cannot store an object with an empty name"));
        }
        let name = object.name().clone();
        let stale_at = now
            .checked_add(object.freshness_period())
            .ok_or_else(|| anyhow!("freshness period of {} is out of range", name))?;

        let mut inner = self.lock();
        inner.purge_expired_waiters(now);

        let mut answered = 0;
        if let Some(waiters) = inner.pending.remove(&name) {
            for waiter in waiters {
                if waiter.responder.respond(object.clone()) {
                    answered += 1;
                }
            }
        }
        if answered > 0 {
            log::debug!(
                "content store: {} answered {} waiting interest(s)",
                name,
                answered
            );
        }

        inner.track_version(&name, self.retained_versions);
        inner.entries.insert(name, StoredObject { object, stale_at });
        Ok(answered)
    }

    /// Exact-name lookup. Stale entries are reported as a miss.
    pub fn lookup(&self, name: &Name) -> Option<ContentObject> {
        self.lookup_at(name, Instant::now())
    }

    pub fn lookup_at(&self, name: &Name, now: Instant) -> Option<ContentObject> {
        let inner = self.lock();
        inner.fresh(name, now).cloned()
    }

    /// Answer `interest` now if possible, otherwise park it as a waiter.
    pub fn serve(&self, interest: &Interest, responder: &Responder) -> ServeOutcome {
        self.serve_at(interest, responder, Instant::now())
    }

    pub fn serve_at(
        &self,
        interest: &Interest,
        responder: &Responder,
        now: Instant,
    ) -> ServeOutcome {
        let mut inner = self.lock();
        inner.purge_expired_waiters(now);

        if let Some(object) = inner.fresh(&interest.name, now) {
            responder.respond(object.clone());
            log::debug!("content store: served {}", interest.name);
            return ServeOutcome::Answered;
        }

        let lifetime = interest.effective_lifetime();
        let expires_at = now + lifetime;
        let waiters = inner.pending.entry(interest.name.clone()).or_default();
        // One waiter per name and face; a repeated interest only extends it.
        match waiters
            .iter_mut()
            .find(|w| w.responder.same_channel(responder))
        {
            Some(existing) => existing.expires_at = existing.expires_at.max(expires_at),
            None => waiters.push(PendingInterest {
                expires_at,
                responder: responder.clone(),
            }),
        }
        log::debug!(
            "content store: {} pending for {}ms",
            interest.name,
            lifetime.as_millis()
        );
        ServeOutcome::Pending
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            entries: inner.entries.len(),
            pending_interests: inner.pending.values().map(Vec::len).sum(),
            retained_versions: inner.versions.values().map(VecDeque::len).sum(),
            evicted_total: inner.evicted_total,
        }
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_VERSIONS)
    }
}

impl StoreInner {
    fn fresh(&self, name: &Name, now: Instant) -> Option<&ContentObject> {
        self.entries
            .get(name)
            .filter(|stored| now < stored.stale_at)
            .map(|stored| &stored.object)
    }

    fn purge_expired_waiters(&mut self, now: Instant) {
        self.pending.retain(|_, waiters| {
            waiters.retain(|w| now < w.expires_at);
            !waiters.is_empty()
        });
    }

    /// Record `name` under its version and evict versions beyond the window.
    /// Names that are not `<prefix>/<version>/<segment>` are not windowed.
    fn track_version(&mut self, name: &Name, retained: usize) {
        let Some((base, versioned)) = split_versioned(name) else {
            return;
        };
        let records = self.versions.entry(base).or_default();
        match records.iter_mut().find(|r| r.versioned == versioned) {
            Some(record) => {
                if !record.segments.contains(name) {
                    record.segments.push(name.clone());
                }
                return;
            }
            None => records.push_back(VersionRecord {
                versioned,
                segments: vec![name.clone()],
            }),
        }

        let mut evicted = Vec::new();
        while records.len() > retained {
            if let Some(oldest) = records.pop_front() {
                evicted.push(oldest);
            }
        }
        for record in evicted {
            for segment in &record.segments {
                if self.entries.remove(segment).is_some() {
                    self.evicted_total += 1;
                }
            }
            log::debug!(
                "content store: evicted version {} ({} segments)",
                record.versioned,
                record.segments.len()
            );
        }
    }
}

/// `<base>/<version>/<segment>` → (base, base/version)
fn split_versioned(name: &Name) -> Option<(Name, Name)> {
    let len = name.len();
    if len < 2 {
        return None;
    }
    name.last().and_then(Component::to_segment)?;
    name.get(len - 2).and_then(Component::to_version)?;
    Some((name.prefix(len - 2), name.prefix(len - 1)))
}
