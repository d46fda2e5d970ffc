//! The IPMI v1.5 session wrapper.
//!
//! Only the "none" authentication type is sent by this crate: the v1.5
//! authenticated session establishment path (Get Session Challenge /
//! Activate Session) is not implemented. The codec still carries the
//! 16-byte authcode so authenticated packets can be decoded.

use crate::error::{Error, Result};
use crate::wire::rmcp;

/// v1.5 session authentication type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthenticationType {
    /// No per-packet authcode.
    None = 0x00,
    /// MD2 authcode.
    Md2 = 0x01,
    /// MD5 authcode.
    Md5 = 0x02,
    /// Straight password authcode.
    Password = 0x04,
    /// OEM authcode.
    Oem = 0x05,
}

impl AuthenticationType {
    fn from_wire(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::Md2),
            0x02 => Ok(Self::Md5),
            0x04 => Ok(Self::Password),
            0x05 => Ok(Self::Oem),
            _ => Err(Error::Decode("unknown v1.5 authentication type")),
        }
    }
}

/// A decoded v1.5 session packet.
#[derive(Debug, Clone)]
pub(crate) struct DecodedV1 {
    pub auth_type: AuthenticationType,
    pub sequence: u32,
    pub session_id: u32,
    #[allow(dead_code)] // carried for completeness; never verified (see module docs)
    pub auth_code: Option<[u8; 16]>,
    pub payload: Vec<u8>,
}

/// Append a v1.5 session packet (RMCP header included). Only the
/// unauthenticated form is encodable.
pub(crate) fn encode_packet(buf: &mut Vec<u8>, session_id: u32, sequence: u32, payload: &[u8]) {
    rmcp::encode_header(buf, rmcp::Class::Ipmi, rmcp::SEQUENCE_NO_ACK);

    buf.push(AuthenticationType::None as u8);
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.push(payload.len() as u8);
    buf.extend_from_slice(payload);
}

/// Decode a v1.5 session packet. `bytes` starts at the auth-type byte
/// (after the RMCP header).
pub(crate) fn decode_packet(bytes: &[u8]) -> Result<DecodedV1> {
    if bytes.len() < 10 {
        return Err(Error::Decode("v1.5 session wrapper too short"));
    }

    let auth_type = AuthenticationType::from_wire(bytes[0])?;
    let sequence = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let session_id = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

    let mut offset = 9;
    let auth_code = if auth_type != AuthenticationType::None {
        if bytes.len() < offset + 16 + 1 {
            return Err(Error::Decode("v1.5 authcode truncated"));
        }
        let mut code = [0u8; 16];
        code.copy_from_slice(&bytes[offset..offset + 16]);
        offset += 16;
        Some(code)
    } else {
        None
    };

    let payload_len = bytes[offset] as usize;
    offset += 1;
    if bytes.len() < offset + payload_len {
        return Err(Error::Decode("v1.5 payload truncated"));
    }

    Ok(DecodedV1 {
        auth_type,
        sequence,
        session_id,
        auth_code,
        payload: bytes[offset..offset + payload_len].to_vec(),
    })
}
