//! The IPMI v2.0/RMCP+ session wrapper: payload type flags, OEM explicit
//! payload descriptors, confidentiality, and the integrity trailer.

use rand::RngCore;

use crate::algo::{ConfidentialityAlgorithm, IntegrityAlgorithm, SessionKeys};
use crate::crypto::{self, ct_eq};
use crate::error::{Error, Result};
use crate::wire::rmcp;

/// Auth-type/format byte identifying the v2.0 wrapper.
pub(crate) const AUTH_TYPE_RMCP_PLUS: u8 = 0x06;

/// Value of the next-header field in the integrity trailer.
const NEXT_HEADER: u8 = 0x07;

/// Integrity pad byte value.
const INTEGRITY_PAD: u8 = 0xFF;

/// Payload type numbers (6-bit, low bits of the flags byte).
pub(crate) mod payload_type {
    /// Standard IPMI message.
    pub const IPMI: u8 = 0x00;
    /// OEM explicit; an enterprise + payload ID descriptor follows.
    pub const OEM_EXPLICIT: u8 = 0x02;
    /// RMCP+ Open Session Request.
    pub const OPEN_SESSION_REQUEST: u8 = 0x10;
    /// RMCP+ Open Session Response.
    pub const OPEN_SESSION_RESPONSE: u8 = 0x11;
    /// RAKP Message 1.
    pub const RAKP_1: u8 = 0x12;
    /// RAKP Message 2.
    pub const RAKP_2: u8 = 0x13;
    /// RAKP Message 3.
    pub const RAKP_3: u8 = 0x14;
    /// RAKP Message 4.
    pub const RAKP_4: u8 = 0x15;
}

/// Negotiated per-packet security, borrowed from the session.
pub(crate) struct PacketSecurity<'a> {
    pub integrity: IntegrityAlgorithm,
    pub confidentiality: ConfidentialityAlgorithm,
    pub keys: &'a SessionKeys,
}

impl PacketSecurity<'_> {
    fn authenticates(&self) -> bool {
        self.integrity != IntegrityAlgorithm::None
    }

    fn encrypts(&self) -> bool {
        self.confidentiality != ConfidentialityAlgorithm::None
    }
}

/// A decoded v2.0 session packet.
#[derive(Debug, Clone)]
pub(crate) struct DecodedV2 {
    pub payload_type: u8,
    /// `(enterprise, payload id)` for OEM explicit payloads.
    pub oem: Option<(u32, u16)>,
    pub session_id: u32,
    pub sequence: u32,
    pub authenticated: bool,
    pub encrypted: bool,
    pub payload: Vec<u8>,
}

/// Append a v2.0 session packet (RMCP header included).
///
/// With `security`, the payload is encrypted and/or the packet
/// authenticated according to the negotiated algorithms. Session-setup
/// payloads pass `None` and go out in the clear.
pub(crate) fn encode_packet(
    buf: &mut Vec<u8>,
    payload_type: u8,
    session_id: u32,
    sequence: u32,
    payload: &[u8],
    security: Option<&PacketSecurity>,
) -> Result<()> {
    rmcp::encode_header(buf, rmcp::Class::Ipmi, rmcp::SEQUENCE_NO_ACK);
    let wrapper_start = buf.len();

    let authenticated = security.is_some_and(|s| s.authenticates());
    let encrypted = security.is_some_and(|s| s.encrypts());

    let mut flags = payload_type & 0x3F;
    if authenticated {
        flags |= 0x40;
    }
    if encrypted {
        flags |= 0x80;
    }

    buf.push(AUTH_TYPE_RMCP_PLUS);
    buf.push(flags);
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());

    let wire_payload;
    let payload_bytes: &[u8] = if encrypted {
        let security = security.ok_or(Error::Crypto("missing session keys"))?;
        let mut iv = [0u8; 16];
        rand::rng().fill_bytes(&mut iv);
        wire_payload = crypto::encrypt_payload_aes_cbc(payload, &security.keys.aes_key()?, &iv)?;
        &wire_payload
    } else {
        payload
    };

    let payload_len: u16 = payload_bytes
        .len()
        .try_into()
        .map_err(|_| Error::InvalidArgument("payload too large"))?;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload_bytes);

    if authenticated {
        let security = security.ok_or(Error::Crypto("missing session keys"))?;

        // Pad so the authenticated range (wrapper header through next
        // header) lands on a 4-byte boundary.
        let base_len = 12 + payload_bytes.len() + 2;
        let pad_len = ((4 - (base_len % 4)) % 4) as u8;

        for _ in 0..pad_len {
            buf.push(INTEGRITY_PAD);
        }
        buf.push(pad_len);
        buf.push(NEXT_HEADER);

        let mac = security
            .integrity
            .mac(security.keys.k1.as_slice(), &buf[wrapper_start..])?;
        buf.extend_from_slice(mac.as_slice());
    }

    Ok(())
}

/// Decode a v2.0 session packet. `bytes` starts at the auth-type byte
/// (after the RMCP header).
pub(crate) fn decode_packet(bytes: &[u8], security: Option<&PacketSecurity>) -> Result<DecodedV2> {
    if bytes.len() < 12 {
        return Err(Error::Decode("v2.0 session wrapper too short"));
    }
    if bytes[0] != AUTH_TYPE_RMCP_PLUS {
        return Err(Error::Decode("not an RMCP+ session wrapper"));
    }

    let flags = bytes[1];
    let encrypted = flags & 0x80 != 0;
    let authenticated = flags & 0x40 != 0;
    let payload_type = flags & 0x3F;

    let mut offset = 2;
    let oem = if payload_type == payload_type::OEM_EXPLICIT {
        if bytes.len() < offset + 6 + 10 {
            return Err(Error::Decode("OEM payload descriptor truncated"));
        }
        let enterprise = u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        let payload_id = u16::from_le_bytes([bytes[offset + 4], bytes[offset + 5]]);
        offset += 6;
        Some((enterprise, payload_id))
    } else {
        None
    };

    if bytes.len() < offset + 10 {
        return Err(Error::Decode("v2.0 session wrapper truncated"));
    }
    let session_id = u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]);
    let sequence = u32::from_le_bytes([
        bytes[offset + 4],
        bytes[offset + 5],
        bytes[offset + 6],
        bytes[offset + 7],
    ]);
    let payload_len = u16::from_le_bytes([bytes[offset + 8], bytes[offset + 9]]) as usize;
    offset += 10;

    let payload_end = offset + payload_len;
    if bytes.len() < payload_end {
        return Err(Error::Decode("v2.0 payload truncated"));
    }

    if authenticated {
        let security = security.ok_or(Error::Protocol(
            "authenticated packet outside an established session",
        ))?;
        verify_trailer(bytes, payload_end, security)?;
    }

    let payload = if encrypted {
        let security = security.ok_or(Error::Protocol(
            "encrypted packet outside an established session",
        ))?;
        crypto::decrypt_payload_aes_cbc(
            &bytes[offset..payload_end],
            &security.keys.aes_key()?,
        )?
    } else {
        bytes[offset..payload_end].to_vec()
    };

    Ok(DecodedV2 {
        payload_type,
        oem,
        session_id,
        sequence,
        authenticated,
        encrypted,
        payload,
    })
}

/// Verify the integrity trailer: MAC over auth-type through next-header,
/// then the pad structure it protects.
fn verify_trailer(bytes: &[u8], payload_end: usize, security: &PacketSecurity) -> Result<()> {
    let mac_len = security.integrity.mac_len();
    if bytes.len() < payload_end + 2 + mac_len {
        return Err(Error::Decode("authenticated packet too short"));
    }

    let mac_start = bytes.len() - mac_len;
    let expected = security
        .integrity
        .mac(security.keys.k1.as_slice(), &bytes[..mac_start])?;
    if !ct_eq(&bytes[mac_start..], expected.as_slice()) {
        return Err(Error::IntegrityMismatch);
    }

    let next_header = bytes[mac_start - 1];
    let pad_len = bytes[mac_start - 2] as usize;
    if next_header != NEXT_HEADER {
        return Err(Error::Decode("unexpected next-header in trailer"));
    }
    if mac_start - 2 < pad_len || mac_start - 2 - pad_len != payload_end {
        return Err(Error::Decode("integrity pad length mismatch"));
    }
    let pad_start = payload_end;
    if bytes[pad_start..mac_start - 2]
        .iter()
        .any(|&b| b != INTEGRITY_PAD)
    {
        return Err(Error::Decode("invalid integrity pad bytes"));
    }

    Ok(())
}
