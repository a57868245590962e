use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use super::tlv::{self, Packet};
use super::{InterestCallback, InterestDispatcher, NetworkFace, Responder};
use crate::content::ContentObject;
use crate::name::Name;

const READ_CHUNK_BYTES: usize = 16 * 1024;
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream connection to a forwarder.
///
/// `process_events` performs at most one non-blocking read, dispatches every
/// complete Interest in the receive buffer, then writes out any Data produced
/// by responders (including late answers from the content store).
pub struct TcpFace {
    stream: TcpStream,
    remote: String,
    dispatcher: InterestDispatcher,
    responder: Responder,
    responses: Receiver<ContentObject>,
    read_buf: Vec<u8>,
}

impl TcpFace {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let remote = format!("{}:{}", host, port);
        let stream = TcpStream::connect((host, port))
            .with_context(|| format!("connect to forwarder at {}", remote))?;
        stream.set_nodelay(true).context("set TCP_NODELAY")?;
        stream
            .set_write_timeout(Some(WRITE_TIMEOUT))
            .context("set forwarder write timeout")?;
        log::info!("TcpFace: connected to {}", remote);
        Ok(Self::from_stream(stream, remote))
    }

    fn from_stream(stream: TcpStream, remote: String) -> Self {
        let (responder, responses) = Responder::channel();
        Self {
            stream,
            remote,
            dispatcher: InterestDispatcher::default(),
            responder,
            responses,
            read_buf: Vec::with_capacity(READ_CHUNK_BYTES),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Pull whatever bytes are available without waiting.
    fn read_available(&mut self) -> Result<()> {
        self.stream
            .set_nonblocking(true)
            .context("switch forwarder socket to non-blocking")?;
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        let outcome = self.stream.read(&mut chunk);
        self.stream
            .set_nonblocking(false)
            .context("switch forwarder socket to blocking")?;
        match outcome {
            Ok(0) => Err(anyhow!("forwarder {} closed the connection", self.remote)),
            Ok(read) => {
                self.read_buf.extend_from_slice(&chunk[..read]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("read from forwarder {}", self.remote)),
        }
    }

    fn dispatch_buffered(&mut self) -> Result<()> {
        while let Some(len) = tlv::frame_length(&self.read_buf)? {
            let frame: Vec<u8> = self.read_buf.drain(..len).collect();
            match tlv::decode_packet(&frame) {
                Ok(Packet::Interest(interest)) => {
                    self.dispatcher.dispatch(&interest, &self.responder);
                }
                Ok(Packet::Data(name)) => log::debug!("TcpFace: data {} ignored", name),
                Ok(Packet::Idle) => {}
                Ok(Packet::Other(tlv_type)) => {
                    log::debug!("TcpFace: packet type {:#x} ignored", tlv_type)
                }
                Err(e) => log::warn!("TcpFace: dropping undecodable packet: {:#}", e),
            }
        }
        Ok(())
    }

    fn flush_responses(&mut self) -> Result<()> {
        while let Ok(object) = self.responses.try_recv() {
            let wire = tlv::encode_data(&object);
            self.stream
                .write_all(&wire)
                .with_context(|| format!("write data {} to {}", object.name(), self.remote))?;
        }
        Ok(())
    }
}

impl NetworkFace for TcpFace {
    fn register_interest_callback(
        &mut self,
        prefix: Name,
        callback: InterestCallback,
    ) -> Result<()> {
        log::info!("TcpFace: interest filter {}", prefix);
        self.dispatcher.register(prefix, callback);
        Ok(())
    }

    fn process_events(&mut self) -> Result<()> {
        self.read_available()?;
        self.dispatch_buffered()?;
        self.flush_responses()
    }

    fn send(&mut self, wire: &[u8]) -> Result<()> {
        self.stream
            .write_all(wire)
            .with_context(|| format!("send {} bytes to {}", wire.len(), self.remote))
    }
}
