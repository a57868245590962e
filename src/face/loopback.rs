use anyhow::Result;
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use super::{Interest, InterestCallback, InterestDispatcher, NetworkFace, Responder};
use crate::content::ContentObject;
use crate::name::Name;

/// In-process face with no sockets.
///
/// Interests are queued with `push_interest` and handed to the registered
/// callbacks one per `process_events` call. Data delivered through the
/// responder, and raw bytes passed to `send`, are kept for inspection.
pub struct LoopbackFace {
    dispatcher: InterestDispatcher,
    incoming: VecDeque<Interest>,
    responder: Responder,
    responses: Receiver<ContentObject>,
    delivered: Vec<ContentObject>,
    sent: Vec<Vec<u8>>,
    events_processed: u64,
}

impl LoopbackFace {
    pub fn new() -> Self {
        let (responder, responses) = Responder::channel();
        Self {
            dispatcher: InterestDispatcher::default(),
            incoming: VecDeque::new(),
            responder,
            responses,
            delivered: Vec::new(),
            sent: Vec::new(),
            events_processed: 0,
        }
    }

    /// Queue an interest as if it had arrived from a consumer.
    pub fn push_interest(&mut self, interest: Interest) {
        self.incoming.push_back(interest);
    }

    /// Data delivered to consumers so far, in delivery order.
    pub fn delivered(&self) -> &[ContentObject] {
        &self.delivered
    }

    pub fn delivered_names(&self) -> Vec<Name> {
        self.delivered.iter().map(|o| o.name().clone()).collect()
    }

    /// Raw byte blobs passed to `send`.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn pending_interests(&self) -> usize {
        self.incoming.len()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    fn collect_responses(&mut self) {
        while let Ok(object) = self.responses.try_recv() {
            self.delivered.push(object);
        }
    }
}

impl Default for LoopbackFace {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkFace for LoopbackFace {
    fn register_interest_callback(
        &mut self,
        prefix: Name,
        callback: InterestCallback,
    ) -> Result<()> {
        log::info!("LoopbackFace: interest filter {}", prefix);
        self.dispatcher.register(prefix, callback);
        Ok(())
    }

    fn process_events(&mut self) -> Result<()> {
        self.events_processed += 1;
        if let Some(interest) = self.incoming.pop_front() {
            self.dispatcher.dispatch(&interest, &self.responder);
        }
        // Also picks up data for interests answered late by the store.
        self.collect_responses();
        Ok(())
    }

    fn send(&mut self, wire: &[u8]) -> Result<()> {
        self.sent.push(wire.to_vec());
        Ok(())
    }
}
