//! Application network function commands.

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::sensor::convert::bcd_decode;
use crate::types::{
    ChannelAuthCapabilities, DeviceId, PrivilegeLevel, SelfTestDeviceError, SelfTestResult,
    SystemGuid,
};
use crate::wire::message::{netfn, Operation};

/// Channel number meaning "the channel this request arrived on".
pub const CHANNEL_PRESENT_INTERFACE: u8 = 0x0E;

/// `Get Channel Authentication Capabilities` (App, 0x38). Usable outside
/// a session, and conventionally reused inside one as a keepalive.
#[derive(Debug, Clone, Copy)]
pub struct GetChannelAuthCapabilities {
    /// Channel to describe (low nibble).
    pub channel: u8,
    /// Privilege level to report capabilities for.
    pub privilege: PrivilegeLevel,
    /// Request IPMI v2.0 extended data.
    pub extended_data: bool,
}

impl GetChannelAuthCapabilities {
    /// Query a channel with v2.0 extended data requested.
    pub fn new(channel: u8, privilege: PrivilegeLevel) -> Self {
        Self {
            channel,
            privilege,
            extended_data: true,
        }
    }
}

impl Command for GetChannelAuthCapabilities {
    type Output = ChannelAuthCapabilities;

    fn name(&self) -> &'static str {
        "Get Channel Authentication Capabilities"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x38)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        let mut channel = self.channel & 0x0F;
        if self.extended_data {
            channel |= 0x80;
        }
        buf.push(channel);
        buf.push(self.privilege.as_u8() & 0x0F);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 8 {
            return Err(Error::Decode(
                "Get Channel Authentication Capabilities response too short",
            ));
        }

        Ok(ChannelAuthCapabilities {
            channel: data[0] & 0x0F,
            extended: data[1] & 0x80 != 0,
            enabled_auth_types: data[1] & 0x3F,
            two_key_login: data[2] & 0x20 != 0,
            // the wire bits carry "disabled" semantics
            per_message_authentication: data[2] & 0x10 == 0,
            user_level_authentication: data[2] & 0x08 == 0,
            non_null_usernames: data[2] & 0x04 != 0,
            null_usernames: data[2] & 0x02 != 0,
            anonymous_login: data[2] & 0x01 != 0,
            supports_v1: data[3] & 0x01 != 0,
            supports_v2: data[3] & 0x02 != 0,
            oem: u32::from(data[4]) | (u32::from(data[5]) << 8) | (u32::from(data[6]) << 16),
            oem_data: data[7],
        })
    }
}

/// `Get System GUID` (App, 0x37). The GUID is opaque: IPMI does not
/// promise network byte order, so no UUID interpretation is attempted.
#[derive(Debug, Clone, Copy)]
pub struct GetSystemGuid;

impl Command for GetSystemGuid {
    type Output = SystemGuid;

    fn name(&self) -> &'static str {
        "Get System GUID"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x37)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 16 {
            return Err(Error::Decode("Get System GUID response too short"));
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&data[..16]);
        Ok(SystemGuid { bytes })
    }
}

/// `Get Device ID` (App, 0x01).
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceId;

impl Command for GetDeviceId {
    type Output = DeviceId;

    fn name(&self) -> &'static str {
        "Get Device ID"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x01)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 15 {
            return Err(Error::Decode("Get Device ID response too short"));
        }

        Ok(DeviceId {
            device_id: data[0],
            device_revision: data[1] & 0x0F,
            provides_sdrs: data[1] & 0x80 != 0,
            firmware_major: data[2] & 0x7F,
            firmware_minor: bcd_decode(data[3]),
            available: data[2] & 0x80 == 0,
            ipmi_version: data[4],
            manufacturer_id: u32::from(data[6])
                | (u32::from(data[7]) << 8)
                | (u32::from(data[8]) << 16),
            product_id: u16::from(data[9]) | (u16::from(data[10]) << 8),
            aux_firmware_revision: [data[11], data[12], data[13], data[14]],
        })
    }
}

/// `Get Self Test Results` (App, 0x04).
#[derive(Debug, Clone, Copy)]
pub struct GetSelfTestResults;

impl Command for GetSelfTestResults {
    type Output = SelfTestResult;

    fn name(&self) -> &'static str {
        "Get Self Test Results"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x04)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 2 {
            return Err(Error::Decode("Get Self Test Results response too short"));
        }

        let code = data[0];
        let detail = data[1];

        Ok(match code {
            0x55 => SelfTestResult::Passed,
            0x56 => SelfTestResult::NotImplemented,
            0x57 => SelfTestResult::DeviceError(SelfTestDeviceError::from_bits(detail)),
            0x58 => SelfTestResult::FatalError(detail),
            _ => SelfTestResult::DeviceSpecific { code, detail },
        })
    }
}

/// `Set Session Privilege Level` (App, 0x3B).
#[derive(Debug, Clone, Copy)]
pub struct SetSessionPrivilegeLevel {
    /// The level to operate at; must not exceed the session maximum.
    pub level: PrivilegeLevel,
}

impl Command for SetSessionPrivilegeLevel {
    type Output = u8;

    fn name(&self) -> &'static str {
        "Set Session Privilege Level"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x3B)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.level.as_u8() & 0x0F);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.is_empty() {
            return Err(Error::Decode(
                "Set Session Privilege Level response too short",
            ));
        }
        Ok(data[0] & 0x0F)
    }
}

/// `Close Session` (App, 0x3C). Carries the BMC's session ID; a zero ID
/// additionally sends a session handle.
#[derive(Debug, Clone, Copy)]
pub struct CloseSession {
    /// The managed system's session ID (not the remote console's).
    pub id: u32,
    /// Session handle, only sent when `id` is zero.
    pub handle: u8,
}

impl Command for CloseSession {
    type Output = ();

    fn name(&self) -> &'static str {
        "Close Session"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x3C)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.id.to_le_bytes());
        if self.id == 0 {
            buf.push(self.handle);
        }
    }

    fn expects_response_data(&self) -> bool {
        false
    }

    fn decode_response(&self, _data: &[u8]) -> Result<Self::Output> {
        Ok(())
    }
}

/// `Get Channel Cipher Suites` (App, 0x54). Returns up to 16 bytes of
/// record data per call; callers iterate `index` until a short chunk.
#[derive(Debug, Clone, Copy)]
pub struct GetChannelCipherSuites {
    /// Channel to list (0x0E for the present interface).
    pub channel: u8,
    /// List index, 0..=0x3F.
    pub index: u8,
}

/// One chunk of cipher suite record data.
#[derive(Debug, Clone)]
pub struct CipherSuiteChunk {
    /// Channel the records describe.
    pub channel: u8,
    /// Up to 16 bytes of record data; less than 16 means the list is
    /// exhausted.
    pub data: Vec<u8>,
}

impl Command for GetChannelCipherSuites {
    type Output = CipherSuiteChunk;

    fn name(&self) -> &'static str {
        "Get Channel Cipher Suites"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::APP, 0x54)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.channel & 0x0F);
        buf.push(0x00); // IPMI payload type
        buf.push(0x80 | (self.index & 0x3F)); // list algorithms by suite
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.is_empty() {
            return Err(Error::Decode("Get Channel Cipher Suites response too short"));
        }
        Ok(CipherSuiteChunk {
            channel: data[0],
            data: data[1..].to_vec(),
        })
    }
}

/// Parse the record data accumulated from `Get Channel Cipher Suites`
/// chunks. Records start with 0xC0 (standard) or 0xC1 (OEM) followed by
/// the suite ID, an OEM enterprise for the latter, and tagged algorithm
/// bytes: bits 7:6 = 00 authentication, 01 integrity, 10 confidentiality.
pub fn parse_cipher_suite_records(data: &[u8]) -> Result<Vec<crate::types::CipherSuiteRecord>> {
    use crate::algo::{AuthenticationAlgorithm, ConfidentialityAlgorithm, IntegrityAlgorithm};
    use crate::types::{CipherSuite, CipherSuiteRecord};

    let mut records = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let oem = match data[i] {
            0xC0 => false,
            0xC1 => true,
            _ => return Err(Error::Decode("invalid cipher suite record start")),
        };
        i += 1;

        if i >= data.len() {
            return Err(Error::Decode("cipher suite record missing ID"));
        }
        let id = data[i];
        i += 1;

        let enterprise = if oem {
            if i + 3 > data.len() {
                return Err(Error::Decode("OEM cipher suite record missing IANA"));
            }
            let e = u32::from(data[i]) | (u32::from(data[i + 1]) << 8)
                | (u32::from(data[i + 2]) << 16);
            i += 3;
            e
        } else {
            0
        };

        // authentication is mandatory; integrity and confidentiality
        // default to none
        if i >= data.len() || data[i] & 0xC0 != 0x00 {
            return Err(Error::Decode("cipher suite record missing auth algorithm"));
        }
        let authentication = AuthenticationAlgorithm::from_wire(data[i] & 0x3F)?;
        i += 1;

        let mut integrity = IntegrityAlgorithm::None;
        if i < data.len() && data[i] & 0xC0 == 0x40 {
            integrity = IntegrityAlgorithm::from_wire(data[i] & 0x3F)?;
            i += 1;
        }

        let mut confidentiality = ConfidentialityAlgorithm::None;
        if i < data.len() && data[i] & 0xC0 == 0x80 {
            confidentiality = ConfidentialityAlgorithm::from_wire(data[i] & 0x3F)?;
            i += 1;
        }

        records.push(CipherSuiteRecord {
            id,
            suite: CipherSuite {
                authentication,
                integrity,
                confidentiality,
            },
            enterprise,
        });
    }

    Ok(records)
}
