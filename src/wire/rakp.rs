//! RAKP messages 1-4 and the key-exchange MAC inputs.

use crate::algo::AuthenticationAlgorithm;
use crate::crypto::DigestBuf;
use crate::error::{Error, Result};
use crate::types::PrivilegeLevel;

/// RMCP+ status code, carried in the Open Session Response and RAKP
/// messages 2-4. The equivalent of an IPMI completion code.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u8);

impl StatusCode {
    /// No errors.
    pub const OK: StatusCode = StatusCode(0x00);
    /// Insufficient resources to create a session.
    pub const INSUFFICIENT_RESOURCES: StatusCode = StatusCode(0x01);
    /// Invalid session ID.
    pub const INVALID_SESSION_ID: StatusCode = StatusCode(0x02);
    /// No matching cipher suite.
    pub const NO_MATCHING_CIPHER_SUITE: StatusCode = StatusCode(0x12);
    /// Username not found (RAKP Message 2).
    pub const UNAUTHORIZED_NAME: StatusCode = StatusCode(0x0D);

    /// Whether this is the OK status.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn description(self) -> &'static str {
        match self.0 {
            0x00 => "ok",
            0x01 => "insufficient resources",
            0x02 => "invalid session id",
            0x03 => "invalid payload type",
            0x09 => "invalid role",
            0x0D => "unauthorized name",
            0x0F => "invalid integrity check value",
            0x12 => "no matching cipher suite",
            _ => "unknown",
        }
    }
}

impl core::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#04x}({})", self.0, self.description())
    }
}

impl core::fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

/// The role byte sent in RAKP 1 and mixed into every key-exchange MAC:
/// the privilege-lookup flag in bit 4 over the 4-bit maximum privilege
/// level.
pub(crate) fn role_byte(lookup: bool, level: PrivilegeLevel) -> u8 {
    (u8::from(lookup) << 4) | (level.as_u8() & 0x0F)
}

/// RAKP Message 1.
#[derive(Debug, Clone)]
pub(crate) struct RakpMessage1<'a> {
    pub tag: u8,
    pub managed_system_session_id: u32,
    pub remote_console_random: [u8; 16],
    pub privilege_level_lookup: bool,
    pub max_privilege_level: PrivilegeLevel,
    /// Up to 16 bytes; empty means role-based lookup.
    pub username: &'a [u8],
}

impl RakpMessage1<'_> {
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag);
        buf.extend_from_slice(&[0x00, 0x00, 0x00]);
        buf.extend_from_slice(&self.managed_system_session_id.to_le_bytes());
        buf.extend_from_slice(&self.remote_console_random);
        buf.push(role_byte(self.privilege_level_lookup, self.max_privilege_level));
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.push(self.username.len() as u8);
        buf.extend_from_slice(self.username);
    }
}

/// A decoded RAKP Message 2.
#[derive(Debug, Clone)]
pub(crate) struct RakpMessage2 {
    pub tag: u8,
    pub status: StatusCode,
    pub remote_console_session_id: u32,
    pub managed_system_random: [u8; 16],
    pub managed_system_guid: [u8; 16],
    /// Keyed by the user password; length is the auth family's digest.
    pub auth_code: DigestBuf,
}

impl RakpMessage2 {
    pub(crate) fn decode(data: &[u8], auth: AuthenticationAlgorithm) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Decode("RAKP message 2 too short"));
        }

        let tag = data[0];
        let status = StatusCode(data[1]);
        let remote_console_session_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        if !status.is_ok() {
            return Ok(Self {
                tag,
                status,
                remote_console_session_id,
                managed_system_random: [0u8; 16],
                managed_system_guid: [0u8; 16],
                auth_code: DigestBuf::from_slice(&[]),
            });
        }

        let auth_len = auth.digest_len();
        if data.len() < 40 + auth_len {
            return Err(Error::Decode("RAKP message 2 truncated"));
        }

        let mut managed_system_random = [0u8; 16];
        managed_system_random.copy_from_slice(&data[8..24]);
        let mut managed_system_guid = [0u8; 16];
        managed_system_guid.copy_from_slice(&data[24..40]);

        Ok(Self {
            tag,
            status,
            remote_console_session_id,
            managed_system_random,
            managed_system_guid,
            auth_code: DigestBuf::from_slice(&data[40..40 + auth_len]),
        })
    }
}

/// RAKP Message 3.
#[derive(Debug, Clone)]
pub(crate) struct RakpMessage3<'a> {
    pub tag: u8,
    pub status: StatusCode,
    pub managed_system_session_id: u32,
    pub auth_code: &'a [u8],
}

impl RakpMessage3<'_> {
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag);
        buf.push(self.status.0);
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(&self.managed_system_session_id.to_le_bytes());
        buf.extend_from_slice(self.auth_code);
    }
}

/// A decoded RAKP Message 4.
#[derive(Debug, Clone)]
pub(crate) struct RakpMessage4 {
    pub tag: u8,
    pub status: StatusCode,
    pub remote_console_session_id: u32,
    /// Keyed by the SIK, truncated to the auth family's ICV length.
    pub integrity_check_value: DigestBuf,
}

impl RakpMessage4 {
    pub(crate) fn decode(data: &[u8], auth: AuthenticationAlgorithm) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Decode("RAKP message 4 too short"));
        }

        let tag = data[0];
        let status = StatusCode(data[1]);
        let remote_console_session_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        if !status.is_ok() {
            return Ok(Self {
                tag,
                status,
                remote_console_session_id,
                integrity_check_value: DigestBuf::from_slice(&[]),
            });
        }

        let icv_len = auth.icv_len();
        if data.len() < 8 + icv_len {
            return Err(Error::Decode("RAKP message 4 truncated"));
        }

        Ok(Self {
            tag,
            status,
            remote_console_session_id,
            integrity_check_value: DigestBuf::from_slice(&data[8..8 + icv_len]),
        })
    }
}

/// The AuthCode the BMC must have sent in RAKP Message 2, keyed by the
/// user password.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rakp2_auth_code(
    auth: AuthenticationAlgorithm,
    user_key: &[u8],
    remote_console_session_id: u32,
    managed_system_session_id: u32,
    remote_console_random: &[u8; 16],
    managed_system_random: &[u8; 16],
    managed_system_guid: &[u8; 16],
    role: u8,
    username: &[u8],
) -> Result<DigestBuf> {
    let mut data = Vec::with_capacity(4 + 4 + 16 + 16 + 16 + 1 + 1 + username.len());
    data.extend_from_slice(&remote_console_session_id.to_le_bytes());
    data.extend_from_slice(&managed_system_session_id.to_le_bytes());
    data.extend_from_slice(remote_console_random);
    data.extend_from_slice(managed_system_random);
    data.extend_from_slice(managed_system_guid);
    data.push(role);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth.mac(user_key, &data)
}

/// The Session Integrity Key, keyed by the BMC key (or the password when
/// no separate BMC key is configured). No truncation.
pub(crate) fn session_integrity_key(
    auth: AuthenticationAlgorithm,
    kg_key: &[u8],
    remote_console_random: &[u8; 16],
    managed_system_random: &[u8; 16],
    role: u8,
    username: &[u8],
) -> Result<DigestBuf> {
    let mut data = Vec::with_capacity(16 + 16 + 1 + 1 + username.len());
    data.extend_from_slice(remote_console_random);
    data.extend_from_slice(managed_system_random);
    data.push(role);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth.mac(kg_key, &data)
}

/// The AuthCode we send in RAKP Message 3, keyed by the user password.
pub(crate) fn rakp3_auth_code(
    auth: AuthenticationAlgorithm,
    user_key: &[u8],
    managed_system_random: &[u8; 16],
    remote_console_session_id: u32,
    role: u8,
    username: &[u8],
) -> Result<DigestBuf> {
    let mut data = Vec::with_capacity(16 + 4 + 1 + 1 + username.len());
    data.extend_from_slice(managed_system_random);
    data.extend_from_slice(&remote_console_session_id.to_le_bytes());
    data.push(role);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth.mac(user_key, &data)
}

/// The ICV the BMC must have sent in RAKP Message 4, keyed by the SIK
/// and truncated to the family's ICV length.
pub(crate) fn rakp4_integrity_check_value(
    auth: AuthenticationAlgorithm,
    sik: &DigestBuf,
    remote_console_random: &[u8; 16],
    managed_system_session_id: u32,
    managed_system_guid: &[u8; 16],
) -> Result<DigestBuf> {
    let mut data = Vec::with_capacity(16 + 4 + 16);
    data.extend_from_slice(remote_console_random);
    data.extend_from_slice(&managed_system_session_id.to_le_bytes());
    data.extend_from_slice(managed_system_guid);

    let full = auth.mac(sik.as_slice(), &data)?;
    Ok(full.truncated(auth.icv_len()))
}
