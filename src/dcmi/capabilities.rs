//! Get DCMI Capabilities Info (DCMI, 0x01).
//!
//! The response format depends on the requested parameter, and nothing
//! in a response says which parameter it answers, so each parameter is
//! its own command with its own response type.

use std::time::Duration;

use crate::commands::Command;
use crate::dcmi::{rolling_avg_period, BODY_CODE_DCMI, CMD_GET_CAPABILITIES};
use crate::error::{Error, Result};
use crate::wire::message::Operation;

const PARAM_SUPPORTED_CAPABILITIES: u8 = 1;
const PARAM_MANDATORY_PLATFORM_ATTRS: u8 = 2;
const PARAM_OPTIONAL_PLATFORM_ATTRS: u8 = 3;
const PARAM_MANAGEABILITY_ACCESS_ATTRS: u8 = 4;
const PARAM_ENHANCED_POWER_STATISTICS_ATTRS: u8 = 5;

/// The 3-byte header common to every capabilities response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcmiCapabilitiesHeader {
    /// Major version of DCMI conformance; 1 in all known
    /// implementations.
    pub major_version: u8,
    /// Minor version of DCMI conformance: 0, 1 or 5.
    pub minor_version: u8,
    /// Parameter data revision; 1 for v1.0, 2 for v1.1/v1.5.
    pub revision: u8,
}

impl DcmiCapabilitiesHeader {
    fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 3 {
            return Err(Error::Decode("DCMI capabilities response header truncated"));
        }
        Ok((
            Self {
                major_version: data[0],
                minor_version: data[1],
                revision: data[2],
            },
            &data[3..],
        ))
    }

    fn is_v1_0(&self) -> bool {
        self.major_version == 1 && self.minor_version == 0
    }
}

fn operation() -> Operation {
    Operation::group(CMD_GET_CAPABILITIES, BODY_CODE_DCMI)
}

/// Parameter 1: conformance to the DCMI platform and manageability
/// capabilities. Several fields were v1.0-only and are forced true for
/// later versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcmiSupportedCapabilities {
    /// Version header.
    pub header: DcmiCapabilitiesHeader,
    /// Temperature monitoring commands supported (v1.0 field).
    pub temperature_monitor: bool,
    /// Chassis power commands supported (v1.0 field).
    pub chassis_power: bool,
    /// SEL logging commands supported (v1.0 field).
    pub sel_logging: bool,
    /// Identification commands supported (v1.0 field).
    pub identification: bool,
    /// The optional power management capability is present.
    pub power_management: bool,
    /// An out-of-band secondary LAN channel is available.
    pub oob_secondary_lan_channel: bool,
    /// TMODE is available on the serial port.
    pub serial_tmode: bool,
    /// An in-band system interface channel is available (v1.1+).
    pub in_band_system_interface_channel: bool,
}

/// Request for parameter 1.
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiSupportedCapabilities;

impl Command for GetDcmiSupportedCapabilities {
    type Output = DcmiSupportedCapabilities;

    fn name(&self) -> &'static str {
        "Get DCMI Capabilities Info (Supported Capabilities)"
    }

    fn operation(&self) -> Operation {
        operation()
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(PARAM_SUPPORTED_CAPABILITIES);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        let (header, body) = DcmiCapabilitiesHeader::decode(data)?;
        if body.len() < 3 {
            return Err(Error::Decode("DCMI supported capabilities truncated"));
        }

        let v1_0 = header.is_v1_0();
        Ok(DcmiSupportedCapabilities {
            header,
            temperature_monitor: !v1_0 || body[0] & (1 << 3) != 0,
            chassis_power: !v1_0 || body[0] & (1 << 2) != 0,
            sel_logging: !v1_0 || body[0] & (1 << 1) != 0,
            identification: !v1_0 || body[0] & 1 != 0,
            power_management: body[1] & 1 != 0,
            oob_secondary_lan_channel: body[2] & (1 << 2) != 0,
            serial_tmode: body[2] & (1 << 1) != 0,
            in_band_system_interface_channel: !v1_0 && body[2] & 1 != 0,
        })
    }
}

/// Parameter 2: mandatory platform attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcmiMandatoryPlatformAttrs {
    /// Version header.
    pub header: DcmiCapabilitiesHeader,
    /// SEL automatic rollover (overwrite) is enabled.
    pub sel_auto_rollover: bool,
    /// The entire SEL is flushed on rollover. Ignore unless rollover is
    /// enabled; unspecified in v1.0.
    pub sel_flush_on_rollover: bool,
    /// Individual SEL records are flushed on rollover. Ignore unless
    /// rollover is enabled; unspecified in v1.0.
    pub sel_record_level_flush: bool,
    /// Maximum number of SEL entries (12-bit).
    pub sel_max_entries: u16,
    /// Interval between successive temperature samples; zero for v1.0,
    /// where the field does not exist.
    pub temperature_sampling_interval: Duration,
}

/// Request for parameter 2.
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiMandatoryPlatformAttrs;

impl Command for GetDcmiMandatoryPlatformAttrs {
    type Output = DcmiMandatoryPlatformAttrs;

    fn name(&self) -> &'static str {
        "Get DCMI Capabilities Info (Mandatory Platform Attributes)"
    }

    fn operation(&self) -> Operation {
        operation()
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(PARAM_MANDATORY_PLATFORM_ATTRS);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        let (header, body) = DcmiCapabilitiesHeader::decode(data)?;
        if body.len() < 4 {
            return Err(Error::Decode("DCMI mandatory platform attrs truncated"));
        }

        // Some BMCs say v1.1 in the header but send a v1.0 format body,
        // so a 4-byte body is treated as v1.0 regardless.
        let v1_0 = body.len() == 4 || header.is_v1_0();

        Ok(DcmiMandatoryPlatformAttrs {
            header,
            sel_auto_rollover: body[0] & (1 << 7) != 0,
            sel_flush_on_rollover: !v1_0 && body[0] & (1 << 6) != 0,
            sel_record_level_flush: !v1_0 && body[0] & (1 << 5) != 0,
            sel_max_entries: u16::from_le_bytes([body[0] & 0x0F, body[1]]),
            temperature_sampling_interval: if v1_0 {
                Duration::ZERO
            } else {
                Duration::from_secs(u64::from(body[4]))
            },
        })
    }
}

/// Parameter 3: optional platform attributes (the power management
/// controller's location).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcmiOptionalPlatformAttrs {
    /// Version header.
    pub header: DcmiCapabilitiesHeader,
    /// 7-bit I2C slave address of the power management controller.
    pub power_management_slave_address: u8,
    /// Channel number of the power management controller.
    pub power_management_channel: u8,
    /// Device revision of the power management controller.
    pub power_management_revision: u8,
}

/// Request for parameter 3.
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiOptionalPlatformAttrs;

impl Command for GetDcmiOptionalPlatformAttrs {
    type Output = DcmiOptionalPlatformAttrs;

    fn name(&self) -> &'static str {
        "Get DCMI Capabilities Info (Optional Platform Attributes)"
    }

    fn operation(&self) -> Operation {
        operation()
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(PARAM_OPTIONAL_PLATFORM_ATTRS);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        let (header, body) = DcmiCapabilitiesHeader::decode(data)?;
        if body.len() < 2 {
            return Err(Error::Decode("DCMI optional platform attrs truncated"));
        }

        Ok(DcmiOptionalPlatformAttrs {
            header,
            power_management_slave_address: body[0] >> 1,
            power_management_channel: body[1] >> 4,
            power_management_revision: body[1] & 0x0F,
        })
    }
}

/// Parameter 4: manageability access attributes. Channel 0xFF means "not
/// supported".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcmiManageabilityAccessAttrs {
    /// Version header.
    pub header: DcmiCapabilitiesHeader,
    /// Primary LAN OOB channel; only valid on RMCP+ systems.
    pub primary_lan_channel: u8,
    /// Secondary LAN OOB channel; optional everywhere.
    pub secondary_lan_channel: u8,
    /// Serial TMODE OOB channel; optional everywhere.
    pub serial_channel: u8,
}

/// Request for parameter 4.
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiManageabilityAccessAttrs;

impl Command for GetDcmiManageabilityAccessAttrs {
    type Output = DcmiManageabilityAccessAttrs;

    fn name(&self) -> &'static str {
        "Get DCMI Capabilities Info (Manageability Access Attributes)"
    }

    fn operation(&self) -> Operation {
        operation()
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(PARAM_MANAGEABILITY_ACCESS_ATTRS);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        let (header, body) = DcmiCapabilitiesHeader::decode(data)?;
        if body.len() < 3 {
            return Err(Error::Decode("DCMI manageability access attrs truncated"));
        }

        Ok(DcmiManageabilityAccessAttrs {
            header,
            primary_lan_channel: body[0],
            secondary_lan_channel: body[1],
            serial_channel: body[2],
        })
    }
}

/// Parameter 5: enhanced system power statistics attributes. Not
/// supported by DCMI v1.0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcmiEnhancedPowerStatisticsAttrs {
    /// Version header.
    pub header: DcmiCapabilitiesHeader,
    /// Rolling average periods Get Power Reading accepts, in the order
    /// the BMC lists them. Zero means the current reading is available.
    pub rolling_avg_periods: Vec<Duration>,
}

/// Request for parameter 5.
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiEnhancedPowerStatisticsAttrs;

impl Command for GetDcmiEnhancedPowerStatisticsAttrs {
    type Output = DcmiEnhancedPowerStatisticsAttrs;

    fn name(&self) -> &'static str {
        "Get DCMI Capabilities Info (Enhanced System Power Statistics Attributes)"
    }

    fn operation(&self) -> Operation {
        operation()
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(PARAM_ENHANCED_POWER_STATISTICS_ATTRS);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        let (header, body) = DcmiCapabilitiesHeader::decode(data)?;
        if body.is_empty() {
            return Err(Error::Decode("DCMI power statistics attrs truncated"));
        }

        let periods = body[0] as usize;
        if body.len() < 1 + periods {
            return Err(Error::Decode(
                "DCMI rolling average period list truncated",
            ));
        }

        Ok(DcmiEnhancedPowerStatisticsAttrs {
            header,
            rolling_avg_periods: body[1..1 + periods]
                .iter()
                .map(|&b| rolling_avg_period(b))
                .collect(),
        })
    }
}
