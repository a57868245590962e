//! Route registration.
//!
//! The forwarder learns to send interests for the camera prefix to this
//! producer through a signed registration command. The command is obtained
//! from an HTTP side channel and forwarded verbatim through the face.
//!
//! `RegistrationScheduler` rate-limits that exchange: the first attempt is
//! unconditional, later ones happen at most once per interval. The next slot
//! is reserved before the HTTP call starts, so a slow or failing call can
//! never cause a second attempt inside the same interval.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use crate::error::ProducerError;
use crate::face::{tlv, Interest, NetworkFace};
use crate::name::{CameraId, Component, Name};

/// Placeholder substituted with the camera identifier.
pub const CAMERA_PLACEHOLDER: &str = "{camera}";

pub const DEFAULT_REGISTRATION_URL: &str = "https://yoursunny.com/p/homecam/?prefixreg={camera}";

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_COMMAND_BYTES: u64 = 64 * 1024;
const HEX_PREVIEW_BYTES: usize = 16;

/// Source of signed registration commands.
pub trait RegistrationClient {
    /// Obtain an encoded registration command for `camera`.
    fn fetch_command(&mut self, camera: &CameraId) -> Result<Vec<u8>>;
}

/// POSTs to a URL template and returns the response body unchanged.
pub struct HttpRegistrationClient {
    url_template: String,
    agent: ureq::Agent,
}

impl HttpRegistrationClient {
    pub fn new(url_template: &str) -> Result<Self> {
        if !url_template.contains(CAMERA_PLACEHOLDER) {
            return Err(anyhow!(
                "registration url '{}' must contain {}",
                url_template,
                CAMERA_PLACEHOLDER
            ));
        }
        url::Url::parse(&url_template.replace(CAMERA_PLACEHOLDER, "camera"))
            .with_context(|| format!("parse registration url {}", url_template))?;
        Ok(Self {
            url_template: url_template.to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(REGISTRATION_TIMEOUT)
                .build(),
        })
    }

    pub fn url_for(&self, camera: &CameraId) -> String {
        self.url_template.replace(CAMERA_PLACEHOLDER, camera.as_str())
    }
}

impl RegistrationClient for HttpRegistrationClient {
    fn fetch_command(&mut self, camera: &CameraId) -> Result<Vec<u8>> {
        let url = self.url_for(camera);
        let response = self
            .agent
            .post(&url)
            .send_bytes(&[])
            .with_context(|| format!("POST {}", url))?;
        let mut command = Vec::new();
        response
            .into_reader()
            .take(MAX_COMMAND_BYTES)
            .read_to_end(&mut command)
            .context("read registration command")?;
        if command.is_empty() {
            return Err(anyhow!("empty registration command from {}", url));
        }
        Ok(command)
    }
}

const TT_CONTROL_PARAMETERS: u64 = 0x68;

/// Hands out one fixed command on every call. Used with the loopback router,
/// where no registration endpoint is reachable.
pub struct StaticRegistrationClient {
    command: Vec<u8>,
}

impl StaticRegistrationClient {
    pub fn new(command: Vec<u8>) -> Self {
        Self { command }
    }

    /// Unsigned `/localhost/nfd/rib/register` interest carrying `prefix`.
    pub fn local_rib_register(prefix: &Name) -> Self {
        let encoded_prefix = tlv::encode_name(prefix);
        let mut parameters = Vec::with_capacity(encoded_prefix.len() + 4);
        tlv::write_var_number(&mut parameters, TT_CONTROL_PARAMETERS);
        tlv::write_var_number(&mut parameters, encoded_prefix.len() as u64);
        parameters.extend_from_slice(&encoded_prefix);

        let name = Name::from_components(vec![
            Component::from("localhost"),
            Component::from("nfd"),
            Component::from("rib"),
            Component::from("register"),
            Component::new(parameters),
        ]);
        Self::new(tlv::encode_interest(&Interest::new(name), 0))
    }
}

impl RegistrationClient for StaticRegistrationClient {
    fn fetch_command(&mut self, _camera: &CameraId) -> Result<Vec<u8>> {
        Ok(self.command.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A command of `command_len` bytes was forwarded to the face.
    Registered { command_len: usize },
    /// Still inside the current interval.
    Skipped { remaining: Duration },
}

pub struct RegistrationScheduler {
    camera: CameraId,
    client: Box<dyn RegistrationClient + Send>,
    interval: Duration,
    /// `None` until the first attempt, which is therefore unconditional.
    next_allowed: Option<Instant>,
    registrations: u64,
}

impl RegistrationScheduler {
    pub fn new(
        camera: CameraId,
        client: Box<dyn RegistrationClient + Send>,
        interval: Duration,
    ) -> Self {
        Self {
            camera,
            client,
            interval,
            next_allowed: None,
            registrations: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of commands forwarded so far.
    pub fn registrations(&self) -> u64 {
        self.registrations
    }

    /// Register if the interval has elapsed; otherwise do nothing.
    pub fn maybe_register<F: NetworkFace + ?Sized>(
        &mut self,
        now: Instant,
        face: &mut F,
    ) -> Result<RegistrationOutcome, ProducerError> {
        if let Some(next_allowed) = self.next_allowed {
            if now < next_allowed {
                let remaining = next_allowed - now;
                log::debug!("registration skipped, next in {}s", remaining.as_secs());
                return Ok(RegistrationOutcome::Skipped { remaining });
            }
        }
        let next_allowed = now.checked_add(self.interval).ok_or_else(|| {
            ProducerError::RegistrationHttp(anyhow!(
                "registration interval of {}s is out of range",
                self.interval.as_secs()
            ))
        })?;
        self.next_allowed = Some(next_allowed);

        let command = self
            .client
            .fetch_command(&self.camera)
            .map_err(ProducerError::RegistrationHttp)?;
        log::info!(
            "registration command for {}: {} bytes ({}...)",
            self.camera,
            command.len(),
            hex::encode(&command[..command.len().min(HEX_PREVIEW_BYTES)])
        );
        face.send(&command).map_err(ProducerError::TransportSend)?;
        self.registrations += 1;
        Ok(RegistrationOutcome::Registered {
            command_len: command.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{InterestCallback, LoopbackFace};
    use crate::name::NameBuilder;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;

    struct CountingClient {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RegistrationClient for CountingClient {
        fn fetch_command(&mut self, camera: &CameraId) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("registration endpoint unreachable"));
            }
            Ok(format!("cmd:{}", camera).into_bytes())
        }
    }

    struct BrokenFace;

    impl NetworkFace for BrokenFace {
        fn register_interest_callback(&mut self, _: Name, _: InterestCallback) -> Result<()> {
            Ok(())
        }

        fn process_events(&mut self) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, _: &[u8]) -> Result<()> {
            Err(anyhow!("socket closed"))
        }
    }

    fn scheduler(interval: Duration, fail: bool) -> (RegistrationScheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
            fail,
        };
        let camera = CameraId::new("porch").unwrap();
        (
            RegistrationScheduler::new(camera, Box::new(client), interval),
            calls,
        )
    }

    #[test]
    fn fires_at_start_and_after_interval() {
        let (mut scheduler, calls) = scheduler(Duration::from_secs(180), false);
        let mut face = LoopbackFace::new();
        let t0 = Instant::now();

        let first = scheduler.maybe_register(t0, &mut face).unwrap();
        assert_eq!(first, RegistrationOutcome::Registered { command_len: 9 });

        let early = scheduler
            .maybe_register(t0 + Duration::from_secs(50), &mut face)
            .unwrap();
        assert_eq!(
            early,
            RegistrationOutcome::Skipped {
                remaining: Duration::from_secs(130)
            }
        );

        let later = scheduler
            .maybe_register(t0 + Duration::from_secs(190), &mut face)
            .unwrap();
        assert!(matches!(later, RegistrationOutcome::Registered { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.registrations(), 2);
        assert_eq!(face.sent().to_vec(), vec![b"cmd:porch".to_vec(); 2]);
    }

    #[test]
    fn first_call_ignores_interval() {
        let (mut scheduler, calls) = scheduler(Duration::from_secs(3600 * 24), false);
        let mut face = LoopbackFace::new();
        scheduler.maybe_register(Instant::now(), &mut face).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rapid_calls_register_once_per_interval() {
        let (mut scheduler, calls) = scheduler(Duration::from_secs(180), false);
        let mut face = LoopbackFace::new();
        let t0 = Instant::now();
        for ms in (0..180_000).step_by(250) {
            scheduler
                .maybe_register(t0 + Duration::from_millis(ms), &mut face)
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn http_failure_propagates_and_keeps_reservation() {
        let (mut scheduler, calls) = scheduler(Duration::from_secs(180), true);
        let mut face = LoopbackFace::new();
        let t0 = Instant::now();

        let err = scheduler.maybe_register(t0, &mut face).unwrap_err();
        assert!(matches!(err, ProducerError::RegistrationHttp(_)));

        let retry = scheduler
            .maybe_register(t0 + Duration::from_secs(1), &mut face)
            .unwrap();
        assert!(matches!(retry, RegistrationOutcome::Skipped { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(face.sent().is_empty());
    }

    #[test]
    fn out_of_range_interval_fails_without_calling_out() {
        let (mut scheduler, calls) = scheduler(Duration::from_secs(u64::MAX), false);
        let mut face = LoopbackFace::new();
        let err = scheduler
            .maybe_register(Instant::now(), &mut face)
            .unwrap_err();
        assert!(matches!(err, ProducerError::RegistrationHttp(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(face.sent().is_empty());
    }

    #[test]
    fn send_failure_is_transport_error() {
        let (mut scheduler, _) = scheduler(Duration::from_secs(180), false);
        let err = scheduler
            .maybe_register(Instant::now(), &mut BrokenFace)
            .unwrap_err();
        assert!(matches!(err, ProducerError::TransportSend(_)));
        assert_eq!(scheduler.registrations(), 0);
    }

    #[test]
    fn url_template_requires_placeholder() {
        assert!(HttpRegistrationClient::new("https://example.net/reg").is_err());
        let client = HttpRegistrationClient::new(DEFAULT_REGISTRATION_URL).unwrap();
        let camera = CameraId::new("porch").unwrap();
        assert_eq!(
            client.url_for(&camera),
            "https://yoursunny.com/p/homecam/?prefixreg=porch"
        );
    }

    #[test]
    fn local_rib_register_is_an_interest_for_the_prefix() {
        let camera = CameraId::new("porch").unwrap();
        let prefix = NameBuilder::base_prefix(&camera);
        let mut client = StaticRegistrationClient::local_rib_register(&prefix);
        let command = client.fetch_command(&camera).unwrap();
        match tlv::decode_packet(&command).unwrap() {
            tlv::Packet::Interest(interest) => {
                assert_eq!(
                    interest.name.prefix(4),
                    Name::from_uri("/localhost/nfd/rib/register").unwrap()
                );
                let parameters = interest.name.get(4).unwrap().as_bytes();
                assert_eq!(parameters[0], 0x68);
                assert!(parameters.ends_with(&tlv::encode_name(&prefix)));
            }
            other => panic!("expected interest, got {:?}", other),
        }
        assert_eq!(client.fetch_command(&camera).unwrap(), command);
    }

    /// Serve one response and report the request line.
    fn serve_once(status: &'static str, body: &'static [u8]) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let read = stream.read(&mut request).unwrap_or(0);
                let text = String::from_utf8_lossy(&request[..read]).to_string();
                let _ = tx.send(text.lines().next().unwrap_or_default().to_string());
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        (format!("http://{}/p/homecam/?prefixreg={{camera}}", addr), rx)
    }

    #[test]
    fn http_client_posts_and_returns_body() {
        let (template, requests) = serve_once("200 OK", &[0x05, 0x03, 0x07, 0x01, 0x00]);
        let mut client = HttpRegistrationClient::new(&template).unwrap();
        let camera = CameraId::new("porch").unwrap();
        let command = client.fetch_command(&camera).unwrap();
        assert_eq!(command, vec![0x05, 0x03, 0x07, 0x01, 0x00]);
        assert_eq!(
            requests.recv().unwrap(),
            "POST /p/homecam/?prefixreg=porch HTTP/1.1"
        );
    }

    #[test]
    fn http_client_rejects_error_status() {
        let (template, _requests) = serve_once("500 Internal Server Error", b"nope");
        let mut client = HttpRegistrationClient::new(&template).unwrap();
        let camera = CameraId::new("porch").unwrap();
        assert!(client.fetch_command(&camera).is_err());
    }
}
