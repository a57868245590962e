use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::face::tlv::MAX_PACKET_SIZE;
use crate::name::CameraId;
use crate::producer::{
    ProducerSettings, DEFAULT_CHUNK_SIZE, DEFAULT_DRAIN_ITERATIONS, DEFAULT_FRESHNESS_PERIOD,
};
use crate::registration::{CAMERA_PLACEHOLDER, DEFAULT_REGISTRATION_URL};
use crate::store::DEFAULT_RETAINED_VERSIONS;

pub const DEFAULT_ROUTER: &str = "hobo.cs.arizona.edu";
pub const DEFAULT_ROUTER_PORT: u16 = 6363;
const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_REGISTRATION_INTERVAL_SECS: u64 = 180;

/// Upper bounds accepted by `validate`.
pub const MAX_FRESHNESS_PERIOD: Duration = Duration::from_secs(60 * 60);
pub const MAX_REGISTRATION_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);

/// Router scheme that selects the in-process loopback face.
pub const LOOPBACK_ROUTER_SCHEME: &str = "stub://";

#[derive(Debug, Deserialize, Default)]
struct ProducerConfigFile {
    camera: Option<String>,
    source: Option<String>,
    router: Option<RouterConfigFile>,
    publish: Option<PublishConfigFile>,
    registration: Option<RegistrationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RouterConfigFile {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct PublishConfigFile {
    chunk_size: Option<usize>,
    freshness_ms: Option<u64>,
    drain_iterations: Option<usize>,
    retained_versions: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RegistrationConfigFile {
    url: Option<String>,
    interval_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Required before `validate` passes; may come from file, env or CLI.
    pub camera: Option<String>,
    pub router: String,
    pub router_port: u16,
    pub source: String,
    pub chunk_size: usize,
    pub freshness_period: Duration,
    pub registration_url: String,
    pub registration_interval: Duration,
    pub drain_iterations: usize,
    pub retained_versions: usize,
}

impl ProducerConfig {
    /// Defaults, then the file named by `HOMECAM_CONFIG`, then `HOMECAM_*`
    /// environment overrides. Command-line overrides come after this, so
    /// callers run `validate` once they are applied.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HOMECAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: ProducerConfigFile) -> Self {
        let router = file.router.unwrap_or_default();
        let publish = file.publish.unwrap_or_default();
        let registration = file.registration.unwrap_or_default();
        Self {
            camera: file.camera,
            router: router.host.unwrap_or_else(|| DEFAULT_ROUTER.to_string()),
            router_port: router.port.unwrap_or(DEFAULT_ROUTER_PORT),
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            chunk_size: publish.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            freshness_period: publish
                .freshness_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FRESHNESS_PERIOD),
            registration_url: registration
                .url
                .unwrap_or_else(|| DEFAULT_REGISTRATION_URL.to_string()),
            registration_interval: Duration::from_secs(
                registration
                    .interval_secs
                    .unwrap_or(DEFAULT_REGISTRATION_INTERVAL_SECS),
            ),
            drain_iterations: publish
                .drain_iterations
                .unwrap_or(DEFAULT_DRAIN_ITERATIONS),
            retained_versions: publish
                .retained_versions
                .unwrap_or(DEFAULT_RETAINED_VERSIONS),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(camera) = env_string("HOMECAM_CAMERA") {
            self.camera = Some(camera);
        }
        if let Some(router) = env_string("HOMECAM_ROUTER") {
            self.router = router;
        }
        if let Some(port) = env_parse("HOMECAM_ROUTER_PORT")? {
            self.router_port = port;
        }
        if let Some(source) = env_string("HOMECAM_SOURCE") {
            self.source = source;
        }
        if let Some(chunk_size) = env_parse("HOMECAM_CHUNK_SIZE")? {
            self.chunk_size = chunk_size;
        }
        if let Some(ms) = env_parse("HOMECAM_FRESHNESS_MS")? {
            self.freshness_period = Duration::from_millis(ms);
        }
        if let Some(url) = env_string("HOMECAM_REGISTRATION_URL") {
            self.registration_url = url;
        }
        if let Some(secs) = env_parse("HOMECAM_REGISTRATION_INTERVAL_SECS")? {
            self.registration_interval = Duration::from_secs(secs);
        }
        if let Some(iterations) = env_parse("HOMECAM_DRAIN_ITERATIONS")? {
            self.drain_iterations = iterations;
        }
        if let Some(versions) = env_parse("HOMECAM_RETAINED_VERSIONS")? {
            self.retained_versions = versions;
        }
        Ok(())
    }

    /// Check the merged configuration and return the camera identifier.
    pub fn validate(&self) -> Result<CameraId> {
        let camera = self
            .camera
            .as_deref()
            .ok_or_else(|| anyhow!("camera is required (--camera or HOMECAM_CAMERA)"))?;
        let camera = CameraId::new(camera)?;

        if self.chunk_size == 0 {
            return Err(anyhow!("chunk size must be greater than zero"));
        }
        if self.chunk_size > MAX_PACKET_SIZE {
            return Err(anyhow!(
                "chunk size {} exceeds the {} byte packet limit",
                self.chunk_size,
                MAX_PACKET_SIZE
            ));
        }
        if self.freshness_period.is_zero() {
            return Err(anyhow!("freshness period must be greater than zero"));
        }
        if self.freshness_period > MAX_FRESHNESS_PERIOD {
            return Err(anyhow!(
                "freshness period must not exceed {}ms",
                MAX_FRESHNESS_PERIOD.as_millis()
            ));
        }
        if self.registration_interval > MAX_REGISTRATION_INTERVAL {
            return Err(anyhow!(
                "registration interval must not exceed {}s",
                MAX_REGISTRATION_INTERVAL.as_secs()
            ));
        }
        if self.drain_iterations == 0 {
            return Err(anyhow!("drain iterations must be greater than zero"));
        }
        if self.retained_versions == 0 {
            return Err(anyhow!("retained versions must be greater than zero"));
        }
        if !self.registration_url.contains(CAMERA_PLACEHOLDER) {
            return Err(anyhow!(
                "registration url must contain the {} placeholder",
                CAMERA_PLACEHOLDER
            ));
        }
        if self.router.trim().is_empty() {
            return Err(anyhow!("router must not be empty"));
        }
        Ok(camera)
    }

    pub fn uses_loopback_router(&self) -> bool {
        self.router.starts_with(LOOPBACK_ROUTER_SCHEME)
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            chunk_size: self.chunk_size,
            freshness_period: self.freshness_period,
            drain_iterations: self.drain_iterations,
            retained_versions: self.retained_versions,
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self::from_file(ProducerConfigFile::default())
    }
}

/// JSON unless the file ends in `.toml`.
fn read_config_file(path: &Path) -> Result<ProducerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer, got '{}'", key, value)),
        None => Ok(None),
    }
}
