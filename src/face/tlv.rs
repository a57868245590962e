//! Minimal TLV packet codec for `TcpFace`.
//!
//! Covers what a producer needs on a forwarder connection:
//! - framing complete TLV elements out of a byte stream
//! - decoding Interests (name, lifetime, CanBePrefix, MustBeFresh)
//! - unwrapping link-protocol frames that carry a single fragment
//! - encoding Data with a DigestSha256 signature
//!
//! Only generic name components are produced. Other component types are
//! decoded by value, which is enough to match them against our own names.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{Interest, DEFAULT_INTEREST_LIFETIME};
use crate::content::ContentObject;
use crate::name::{decode_nonneg_integer, encode_nonneg_integer, Component, Name};

pub const TT_INTEREST: u64 = 0x05;
pub const TT_DATA: u64 = 0x06;
pub const TT_NAME: u64 = 0x07;
pub const TT_GENERIC_COMPONENT: u64 = 0x08;
pub const TT_NONCE: u64 = 0x0A;
pub const TT_INTEREST_LIFETIME: u64 = 0x0C;
pub const TT_MUST_BE_FRESH: u64 = 0x12;
pub const TT_META_INFO: u64 = 0x14;
pub const TT_CONTENT: u64 = 0x15;
pub const TT_SIGNATURE_INFO: u64 = 0x16;
pub const TT_SIGNATURE_VALUE: u64 = 0x17;
pub const TT_FRESHNESS_PERIOD: u64 = 0x19;
pub const TT_FINAL_BLOCK_ID: u64 = 0x1A;
pub const TT_SIGNATURE_TYPE: u64 = 0x1B;
pub const TT_CAN_BE_PREFIX: u64 = 0x21;
pub const TT_LP_FRAGMENT: u64 = 0x50;
pub const TT_LP_PACKET: u64 = 0x64;

const SIGNATURE_DIGEST_SHA256: u64 = 0;

/// Largest packet a forwarder accepts.
pub const MAX_PACKET_SIZE: usize = 8800;

/// A decoded top-level packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet {
    Interest(Interest),
    /// Data arriving at a producer is only ever a command response.
    Data(Name),
    /// Link-protocol frame without a fragment (e.g. idle keepalive).
    Idle,
    Other(u64),
}

// -------------------- Primitive encoding --------------------

pub fn write_var_number(out: &mut Vec<u8>, value: u64) {
    if value < 253 {
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(253);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(254);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(255);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Read a VAR-NUMBER at `pos`. `None` if the buffer ends first.
pub fn read_var_number(buf: &[u8], pos: usize) -> Option<(u64, usize)> {
    let first = *buf.get(pos)?;
    let width = match first {
        253 => 2,
        254 => 4,
        255 => 8,
        _ => return Some((first as u64, 1)),
    };
    let bytes = buf.get(pos + 1..pos + 1 + width)?;
    let value = decode_nonneg_integer(bytes)?;
    Some((value, 1 + width))
}

fn write_tlv(out: &mut Vec<u8>, tlv_type: u64, value: &[u8]) {
    write_var_number(out, tlv_type);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

/// Iterate the TLV elements nested in `value` as (type, value) pairs.
fn elements(value: &[u8]) -> Result<Vec<(u64, &[u8])>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < value.len() {
        let (tlv_type, type_len) =
            read_var_number(value, pos).ok_or_else(|| anyhow!("truncated tlv type"))?;
        let (len, len_len) = read_var_number(value, pos + type_len)
            .ok_or_else(|| anyhow!("truncated tlv length"))?;
        let start = pos + type_len + len_len;
        let end = start
            .checked_add(len as usize)
            .filter(|end| *end <= value.len())
            .ok_or_else(|| anyhow!("tlv element overruns its parent"))?;
        out.push((tlv_type, &value[start..end]));
        pos = end;
    }
    Ok(out)
}

// -------------------- Framing --------------------

/// Size of the complete element at the head of `buf`, or `None` if more
/// bytes are needed. Oversized elements are an error: the stream cannot
/// be resynchronised after one.
pub fn frame_length(buf: &[u8]) -> Result<Option<usize>> {
    let Some((_, type_len)) = read_var_number(buf, 0) else {
        return Ok(None);
    };
    let Some((len, len_len)) = read_var_number(buf, type_len) else {
        return Ok(None);
    };
    let header_len = type_len + len_len;
    if len > (MAX_PACKET_SIZE + 64 - header_len) as u64 {
        return Err(anyhow!(
            "incoming packet of {} value bytes exceeds limit",
            len
        ));
    }
    let total = header_len + len as usize;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some(total))
}

// -------------------- Names --------------------

pub fn encode_name(name: &Name) -> Vec<u8> {
    let mut value = Vec::new();
    for component in name.components() {
        write_tlv(&mut value, TT_GENERIC_COMPONENT, component.as_bytes());
    }
    let mut out = Vec::with_capacity(value.len() + 4);
    write_tlv(&mut out, TT_NAME, &value);
    out
}

fn decode_name_value(value: &[u8]) -> Result<Name> {
    let components = elements(value)?
        .into_iter()
        .map(|(_, bytes)| Component::new(bytes.to_vec()))
        .collect();
    Ok(Name::from_components(components))
}

// -------------------- Packets --------------------

/// Decode one complete top-level element.
pub fn decode_packet(wire: &[u8]) -> Result<Packet> {
    let parsed = elements(wire)?;
    let [(tlv_type, value)] = parsed.as_slice() else {
        return Err(anyhow!("expected exactly one top-level element"));
    };
    match *tlv_type {
        TT_INTEREST => Ok(Packet::Interest(decode_interest_value(value)?)),
        TT_DATA => {
            let name = elements(value)?
                .into_iter()
                .find(|(t, _)| *t == TT_NAME)
                .ok_or_else(|| anyhow!("data packet without name"))?;
            Ok(Packet::Data(decode_name_value(name.1)?))
        }
        TT_LP_PACKET => match elements(value)?.into_iter().find(|(t, _)| *t == TT_LP_FRAGMENT) {
            Some((_, fragment)) => decode_packet(fragment),
            None => Ok(Packet::Idle),
        },
        other => Ok(Packet::Other(other)),
    }
}

fn decode_interest_value(value: &[u8]) -> Result<Interest> {
    let mut name = None;
    let mut interest_lifetime = DEFAULT_INTEREST_LIFETIME;
    let mut can_be_prefix = false;
    let mut must_be_fresh = false;
    for (tlv_type, field) in elements(value)? {
        match tlv_type {
            TT_NAME => name = Some(decode_name_value(field)?),
            TT_CAN_BE_PREFIX => can_be_prefix = true,
            TT_MUST_BE_FRESH => must_be_fresh = true,
            TT_INTEREST_LIFETIME => {
                let ms = decode_nonneg_integer(field)
                    .ok_or_else(|| anyhow!("invalid interest lifetime"))?;
                interest_lifetime = Duration::from_millis(ms);
            }
            _ => {}
        }
    }
    let name = name.ok_or_else(|| anyhow!("interest without name"))?;
    Ok(Interest {
        name,
        lifetime: interest_lifetime,
        can_be_prefix,
        must_be_fresh,
    })
}

/// Encode an Interest. Only used to talk to ourselves in tests and tools;
/// the producer never expresses interests of its own.
pub fn encode_interest(interest: &Interest, nonce: u32) -> Vec<u8> {
    let mut value = encode_name(&interest.name);
    if interest.can_be_prefix {
        write_tlv(&mut value, TT_CAN_BE_PREFIX, &[]);
    }
    if interest.must_be_fresh {
        write_tlv(&mut value, TT_MUST_BE_FRESH, &[]);
    }
    write_tlv(&mut value, TT_NONCE, &nonce.to_be_bytes());
    write_tlv(
        &mut value,
        TT_INTEREST_LIFETIME,
        &encode_nonneg_integer(interest.lifetime.as_millis() as u64),
    );
    let mut out = Vec::with_capacity(value.len() + 4);
    write_tlv(&mut out, TT_INTEREST, &value);
    out
}

/// Encode a content object as a Data packet signed with DigestSha256.
pub fn encode_data(object: &ContentObject) -> Vec<u8> {
    let meta = object.meta_info();

    let mut meta_value = Vec::new();
    write_tlv(
        &mut meta_value,
        TT_FRESHNESS_PERIOD,
        &encode_nonneg_integer(meta.freshness_period.as_millis() as u64),
    );
    let mut final_block = Vec::new();
    write_tlv(
        &mut final_block,
        TT_GENERIC_COMPONENT,
        Component::from_segment(meta.final_segment_id).as_bytes(),
    );
    write_tlv(&mut meta_value, TT_FINAL_BLOCK_ID, &final_block);

    let mut signature_info = Vec::new();
    write_tlv(
        &mut signature_info,
        TT_SIGNATURE_TYPE,
        &encode_nonneg_integer(SIGNATURE_DIGEST_SHA256),
    );

    // Signed portion: Name, MetaInfo, Content, SignatureInfo.
    let mut signed = encode_name(object.name());
    write_tlv(&mut signed, TT_META_INFO, &meta_value);
    write_tlv(&mut signed, TT_CONTENT, object.payload());
    write_tlv(&mut signed, TT_SIGNATURE_INFO, &signature_info);

    let digest: [u8; 32] = Sha256::digest(&signed).into();
    let mut value = signed;
    write_tlv(&mut value, TT_SIGNATURE_VALUE, &digest);

    let mut out = Vec::with_capacity(value.len() + 4);
    write_tlv(&mut out, TT_DATA, &value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MetaInfo;

    #[test]
    fn var_number_widths() {
        for (value, width) in [(0u64, 1), (252, 1), (253, 3), (65_535, 3), (65_536, 5)] {
            let mut out = Vec::new();
            write_var_number(&mut out, value);
            assert_eq!(out.len(), width);
            assert_eq!(read_var_number(&out, 0), Some((value, width)));
        }
        assert_eq!(read_var_number(&[253, 0x01], 0), None);
    }

    #[test]
    fn frames_need_the_whole_element() {
        let interest = Interest::new(Name::from_uri("/yoursunny.com/homecam-a").unwrap());
        let wire = encode_interest(&interest, 7);
        assert_eq!(frame_length(&wire[..3]).unwrap(), None);
        assert_eq!(frame_length(&wire).unwrap(), Some(wire.len()));

        let mut two = wire.clone();
        two.extend_from_slice(&wire);
        assert_eq!(frame_length(&two).unwrap(), Some(wire.len()));
    }

    #[test]
    fn huge_declared_length_is_rejected() {
        let mut header = vec![TT_INTEREST as u8, 0xFF];
        header.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(frame_length(&header).is_err());

        let mut header = vec![TT_INTEREST as u8, 0xFE];
        header.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(frame_length(&header).is_err());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut header = Vec::new();
        write_var_number(&mut header, TT_DATA);
        write_var_number(&mut header, 100_000);
        assert!(frame_length(&header).is_err());
    }

    #[test]
    fn decodes_interest_fields() {
        let name = Name::from_uri("/yoursunny.com/homecam-a/%FD%01").unwrap();
        let mut interest = Interest::new(name).with_lifetime(Duration::from_millis(1500));
        interest.must_be_fresh = true;
        let wire = encode_interest(&interest, 42);
        assert_eq!(decode_packet(&wire).unwrap(), Packet::Interest(interest));
    }

    #[test]
    fn unwraps_link_fragment() {
        let interest = Interest::new(Name::from_uri("/x").unwrap());
        let inner = encode_interest(&interest, 1);
        let mut lp_value = Vec::new();
        write_tlv(&mut lp_value, TT_LP_FRAGMENT, &inner);
        let mut frame = Vec::new();
        write_tlv(&mut frame, TT_LP_PACKET, &lp_value);
        assert_eq!(decode_packet(&frame).unwrap(), Packet::Interest(interest));

        let mut idle = Vec::new();
        write_tlv(&mut idle, TT_LP_PACKET, &[]);
        assert_eq!(decode_packet(&idle).unwrap(), Packet::Idle);
    }

    #[test]
    fn data_carries_name_meta_and_digest() {
        let name = Name::from_uri("/yoursunny.com/homecam-a/%FD%01/%00%00").unwrap();
        let object = ContentObject::new(
            name.clone(),
            MetaInfo {
                freshness_period: Duration::from_millis(10_000),
                final_segment_id: 2,
            },
            b"jpeg".to_vec(),
        );
        let wire = encode_data(&object);
        assert_eq!(frame_length(&wire).unwrap(), Some(wire.len()));
        assert_eq!(decode_packet(&wire).unwrap(), Packet::Data(name));

        let outer = elements(&wire).unwrap();
        let fields = elements(outer[0].1).unwrap();
        let types: Vec<u64> = fields.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            types,
            vec![TT_NAME, TT_META_INFO, TT_CONTENT, TT_SIGNATURE_INFO, TT_SIGNATURE_VALUE]
        );
        assert_eq!(fields[2].1, b"jpeg");
        assert_eq!(fields[4].1.len(), 32);
    }
}
