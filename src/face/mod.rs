//! Network face abstraction.
//!
//! The producer only touches the network through three operations:
//! - `register_interest_callback`: route interests under a prefix to a callback
//! - `process_events`: one bounded, non-blocking pass over pending I/O
//! - `send`: write pre-encoded bytes verbatim (route registration commands)
//!
//! Callbacks answer through a `Responder`. A responder is cheap to clone and
//! may be kept after the callback returns, which is how the content store
//! satisfies an interest that arrived before its data was published.
//!
//! Implementations:
//! - `LoopbackFace`: in-process, no sockets (tests, `stub://` router)
//! - `TcpFace`: stream connection to a forwarder, packets encoded by `tlv`

mod loopback;
mod tcp;
pub mod tlv;

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::content::ContentObject;
use crate::name::Name;

pub use loopback::LoopbackFace;
pub use tcp::TcpFace;

/// Interest lifetime assumed when a packet does not carry one.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// Longest lifetime honoured; longer requested lifetimes are clamped.
pub const MAX_INTEREST_LIFETIME: Duration = Duration::from_secs(60);

/// A consumer request for a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub lifetime: Duration,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            can_be_prefix: false,
            must_be_fresh: false,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Requested lifetime, capped at `MAX_INTEREST_LIFETIME`.
    pub fn effective_lifetime(&self) -> Duration {
        self.lifetime.min(MAX_INTEREST_LIFETIME)
    }
}

/// Handle for answering an interest, now or later.
#[derive(Clone, Debug)]
pub struct Responder {
    channel_id: u64,
    tx: Sender<ContentObject>,
}

impl Responder {
    /// A responder plus the receiving end that collects its answers.
    pub fn channel() -> (Self, Receiver<ContentObject>) {
        static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);
        let (tx, rx) = mpsc::channel();
        let channel_id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        (Self { channel_id, tx }, rx)
    }

    /// True if both handles deliver to the same receiver.
    pub fn same_channel(&self, other: &Responder) -> bool {
        self.channel_id == other.channel_id
    }

    /// Deliver `object`. Returns false if the receiving side is gone.
    pub fn respond(&self, object: ContentObject) -> bool {
        self.tx.send(object).is_ok()
    }
}

pub type InterestCallback = Box<dyn FnMut(&Interest, &Responder) + Send>;

pub trait NetworkFace {
    /// Route every interest whose name starts with `prefix` to `callback`.
    fn register_interest_callback(&mut self, prefix: Name, callback: InterestCallback)
        -> Result<()>;

    /// Handle whatever is pending right now. Must not block indefinitely.
    fn process_events(&mut self) -> Result<()>;

    /// Write already-encoded bytes to the network unchanged.
    fn send(&mut self, wire: &[u8]) -> Result<()>;
}

impl<F: NetworkFace + ?Sized> NetworkFace for Box<F> {
    fn register_interest_callback(
        &mut self,
        prefix: Name,
        callback: InterestCallback,
    ) -> Result<()> {
        (**self).register_interest_callback(prefix, callback)
    }

    fn process_events(&mut self) -> Result<()> {
        (**self).process_events()
    }

    fn send(&mut self, wire: &[u8]) -> Result<()> {
        (**self).send(wire)
    }
}

/// Prefix filters shared by the face implementations.
#[derive(Default)]
pub(crate) struct InterestDispatcher {
    filters: Vec<(Name, InterestCallback)>,
}

impl InterestDispatcher {
    pub(crate) fn register(&mut self, prefix: Name, callback: InterestCallback) {
        self.filters.push((prefix, callback));
    }

    /// Invoke every matching filter. Returns how many matched.
    pub(crate) fn dispatch(&mut self, interest: &Interest, responder: &Responder) -> usize {
        let mut matched = 0;
        for (prefix, callback) in self.filters.iter_mut() {
            if prefix.is_prefix_of(&interest.name) {
                callback(interest, responder);
                matched += 1;
            }
        }
        if matched == 0 {
            log::warn!("no interest filter for {}", interest.name);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MetaInfo;
    use std::sync::{Arc, Mutex};

    #[test]
    fn clones_share_a_channel() {
        let (a, _rx_a) = Responder::channel();
        let (b, _rx_b) = Responder::channel();
        assert!(a.same_channel(&a.clone()));
        assert!(!a.same_channel(&b));
    }

    #[test]
    fn lifetime_is_capped() {
        let name = Name::from_uri("/a").unwrap();
        let long = Interest::new(name.clone()).with_lifetime(Duration::from_millis(u64::MAX));
        assert_eq!(long.effective_lifetime(), MAX_INTEREST_LIFETIME);
        let short = Interest::new(name).with_lifetime(Duration::from_millis(250));
        assert_eq!(short.effective_lifetime(), Duration::from_millis(250));
    }

    #[test]
    fn responder_reports_disconnected_receiver() {
        let (responder, rx) = Responder::channel();
        let object = ContentObject::new(
            Name::from_uri("/a").unwrap(),
            MetaInfo {
                freshness_period: Duration::ZERO,
                final_segment_id: 0,
            },
            vec![1],
        );
        assert!(responder.respond(object.clone()));
        assert_eq!(rx.recv().unwrap(), object);
        drop(rx);
        assert!(!responder.respond(object));
    }

    #[test]
    fn dispatcher_matches_by_prefix() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InterestDispatcher::default();
        let seen = Arc::clone(&hits);
        dispatcher.register(
            Name::from_uri("/yoursunny.com/homecam-a").unwrap(),
            Box::new(move |interest: &Interest, _: &Responder| {
                seen.lock().unwrap().push(interest.name.to_string())
            }),
        );
        let (responder, _rx) = Responder::channel();

        let inside = Interest::new(Name::from_uri("/yoursunny.com/homecam-a/%FD%01").unwrap());
        let outside = Interest::new(Name::from_uri("/yoursunny.com/homecam-b").unwrap());
        assert_eq!(dispatcher.dispatch(&inside, &responder), 1);
        assert_eq!(dispatcher.dispatch(&outside, &responder), 0);
        assert_eq!(
            hits.lock().unwrap().as_slice(),
            ["/yoursunny.com/homecam-a/%FD%01"]
        );
    }
}
