//! Hierarchical names for published content.
//!
//! A published object is addressed as
//! `/<app namespace>/homecam-<camera>/<version>/<segment>`:
//!
//! - `Name`: ordered sequence of opaque byte components.
//! - `CameraId`: validated camera identifier, the only caller-supplied part of the prefix.
//! - `NameBuilder`: pure helpers that append version and segment components.
//! - `VersionSequence`: turns wall-clock milliseconds into strictly increasing versions.
//!
//! Version and segment components use the marker convention: one marker byte
//! (`0xFD` for versions, `0x00` for segments) followed by the number as a
//! minimal big-endian non-negative integer (1, 2, 4 or 8 bytes).

use anyhow::{anyhow, Result};
use std::fmt;
use std::sync::OnceLock;

/// Fixed application namespace, first component of every producer prefix.
pub const APP_NAMESPACE: &str = "yoursunny.com";

/// Prepended to the camera identifier to form the second prefix component.
pub const CAMERA_COMPONENT_PREFIX: &str = "homecam-";

const VERSION_MARKER: u8 = 0xFD;
const SEGMENT_MARKER: u8 = 0x00;

// -------------------- Components --------------------

/// One opaque name component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_version(version: u64) -> Self {
        Self::with_marker(VERSION_MARKER, version)
    }

    pub fn from_segment(segment: u64) -> Self {
        Self::with_marker(SEGMENT_MARKER, segment)
    }

    fn with_marker(marker: u8, value: u64) -> Self {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(marker);
        bytes.extend_from_slice(&encode_nonneg_integer(value));
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode a version component. `None` if the marker or length is wrong.
    pub fn to_version(&self) -> Option<u64> {
        self.marked_value(VERSION_MARKER)
    }

    /// Decode a segment component. `None` if the marker or length is wrong.
    pub fn to_segment(&self) -> Option<u64> {
        self.marked_value(SEGMENT_MARKER)
    }

    fn marked_value(&self, marker: u8) -> Option<u64> {
        match self.0.split_first() {
            Some((first, rest)) if *first == marker => decode_nonneg_integer(rest),
            _ => None,
        }
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A component made only of periods gets three extra periods so it
        // cannot be confused with "." or ".." path segments.
        if self.0.iter().all(|b| *b == b'.') {
            f.write_str("...")?;
        }
        for byte in &self.0 {
            if is_unreserved(*byte) {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02X}", byte)?;
            }
        }
        Ok(())
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Minimal big-endian encoding: 1, 2, 4 or 8 bytes.
pub fn encode_nonneg_integer(value: u64) -> Vec<u8> {
    if value <= u8::MAX as u64 {
        vec![value as u8]
    } else if value <= u16::MAX as u64 {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= u32::MAX as u64 {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

pub fn decode_nonneg_integer(bytes: &[u8]) -> Option<u64> {
    match bytes.len() {
        1 => Some(bytes[0] as u64),
        2 => Some(u16::from_be_bytes([bytes[0], bytes[1]]) as u64),
        4 => Some(u32::from_be_bytes(bytes.try_into().ok()?) as u64),
        8 => Some(u64::from_be_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}

// -------------------- Names --------------------

/// Ordered sequence of components. Equality is componentwise.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Parse an NDN URI such as `/yoursunny.com/homecam-porch/%FD%01`.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let path = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut components = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode(segment)?;
            let decoded = if !decoded.is_empty() && decoded.iter().all(|b| *b == b'.') {
                if decoded.len() < 3 {
                    return Err(anyhow!("invalid name component '{}'", segment));
                }
                decoded[3..].to_vec()
            } else {
                decoded
            };
            components.push(Component(decoded));
        }
        Ok(Self { components })
    }

    /// Return a copy of this name with `component` appended.
    pub fn append(&self, component: Component) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The first `len` components (all of them if `len` exceeds the length).
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    /// True if `self` is a leading subsequence of `other` (including equality).
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

fn percent_decode(segment: &str) -> Result<Vec<u8>> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment
                .get(i + 1..i + 3)
                .ok_or_else(|| anyhow!("truncated percent escape in '{}'", segment))?;
            let value = u8::from_str_radix(hex, 16)
                .map_err(|_| anyhow!("invalid percent escape '%{}'", hex))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

// -------------------- Camera identifiers --------------------

/// Validated camera identifier.
///
/// Allowed: "porch", "garage-2", "back_yard"
/// Disallowed: empty, longer than 64 bytes, or anything outside [A-Za-z0-9_-].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: &str) -> Result<Self> {
        static CAMERA_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = CAMERA_ID_RE
            .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"));
        if !re.is_match(id) {
            return Err(anyhow!(
                "camera identifier '{}' must match ^[A-Za-z0-9_-]{{1,64}}$",
                id
            ));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -------------------- NameBuilder --------------------

/// Stateless name construction. Callers supply versions and segments.
pub struct NameBuilder;

impl NameBuilder {
    /// `/yoursunny.com/homecam-<camera>`
    pub fn base_prefix(camera: &CameraId) -> Name {
        Name::from_components(vec![
            Component::from(APP_NAMESPACE),
            Component::new(format!("{}{}", CAMERA_COMPONENT_PREFIX, camera.as_str())),
        ])
    }

    pub fn with_version(prefix: &Name, version: u64) -> Name {
        prefix.append(Component::from_version(version))
    }

    pub fn with_segment(versioned: &Name, segment: u64) -> Name {
        versioned.append(Component::from_segment(segment))
    }
}

// -------------------- Versions --------------------

/// Hands out strictly increasing versions derived from wall-clock milliseconds.
///
/// `next = max(now_ms, previous + 1)`, so a frozen or regressing clock still
/// yields a fresh version for every publish cycle.
#[derive(Clone, Debug, Default)]
pub struct VersionSequence {
    last: Option<u64>,
}

impl VersionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, now_ms: u64) -> u64 {
        let version = match self.last {
            Some(previous) => now_ms.max(previous.saturating_add(1)),
            None => now_ms,
        };
        self.last = Some(version);
        version
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}
