//! RMCP header and the ASF Presence Ping/Pong used for capability
//! discovery before any IPMI session exists.

use crate::error::{Error, Result};

pub(crate) const RMCP_VERSION: u8 = 0x06;
pub(crate) const RMCP_RESERVED: u8 = 0x00;

/// RMCP sequence value meaning "do not send us an ACK".
pub(crate) const SEQUENCE_NO_ACK: u8 = 0xFF;

/// RMCP message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Class {
    Asf = 0x06,
    Ipmi = 0x07,
}

/// IANA Enterprise Number of the ASF specification body, used in ASF
/// message headers.
const ASF_ENTERPRISE: u32 = 4542;

const ASF_TYPE_PONG: u8 = 0x40;
const ASF_TYPE_PING: u8 = 0x80;

/// Append the 4-byte RMCP header.
pub(crate) fn encode_header(buf: &mut Vec<u8>, class: Class, sequence: u8) {
    buf.push(RMCP_VERSION);
    buf.push(RMCP_RESERVED);
    buf.push(sequence);
    buf.push(class as u8);
}

/// Strip and validate the RMCP header, returning the class and remainder.
pub(crate) fn decode_header(bytes: &[u8]) -> Result<(Class, &[u8])> {
    if bytes.len() < 4 {
        return Err(Error::Decode("packet shorter than RMCP header"));
    }
    if bytes[0] != RMCP_VERSION {
        return Err(Error::Decode("unexpected RMCP version"));
    }
    let class = match bytes[3] & 0x7F {
        0x06 => Class::Asf,
        0x07 => Class::Ipmi,
        _ => return Err(Error::Decode("unknown RMCP class")),
    };
    Ok((class, &bytes[4..]))
}

/// Append an ASF Presence Ping message (RMCP header included).
pub(crate) fn encode_presence_ping(buf: &mut Vec<u8>, tag: u8) {
    // ASF messages want an RMCP ACK sequence; we use the tag for both.
    encode_header(buf, Class::Asf, tag);
    buf.extend_from_slice(&ASF_ENTERPRISE.to_be_bytes());
    buf.push(ASF_TYPE_PING);
    buf.push(tag);
    buf.push(0x00); // reserved
    buf.push(0x00); // no data
}

/// Decoded ASF Presence Pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresencePong {
    /// Tag echoed from the ping.
    pub tag: u8,
    /// IANA Enterprise Number of the responder; 4542 unless an OEM has
    /// customised the response.
    pub enterprise: u32,
    /// OEM-defined field; zero unless `enterprise` is an OEM.
    pub oem: u32,
    /// Whether the managed system supports IPMI.
    pub ipmi_supported: bool,
    /// ASF version 1.0 supported.
    pub asf_v1: bool,
    /// RMCP security extensions (secure port 664) supported.
    pub security_extensions: bool,
    /// DCMI supported (advertised here since DCMI v1.5).
    pub dcmi_supported: bool,
}

/// Decode an ASF Presence Pong from a full datagram.
pub(crate) fn decode_presence_pong(bytes: &[u8]) -> Result<PresencePong> {
    let (class, rest) = decode_header(bytes)?;
    if class != Class::Asf {
        return Err(Error::Decode("presence pong is not an ASF packet"));
    }
    if rest.len() < 8 + 16 {
        return Err(Error::Decode("ASF pong too short"));
    }
    if rest[4] != ASF_TYPE_PONG {
        return Err(Error::Decode("unexpected ASF message type"));
    }
    let tag = rest[5];
    let data = &rest[8..];

    let enterprise = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let oem = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let entities = data[8];
    let interactions = data[9];

    Ok(PresencePong {
        tag,
        enterprise,
        oem,
        ipmi_supported: entities & 0x80 != 0,
        asf_v1: entities & 0x0F == 0x01,
        security_extensions: interactions & 0x80 != 0,
        dcmi_supported: interactions & 0x20 != 0,
    })
}
