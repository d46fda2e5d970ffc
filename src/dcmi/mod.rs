//! DCMI extension commands: capability discovery, power readings and
//! temperature sensor discovery.
//!
//! DCMI rides the Group network function with defining body 0xDC. The
//! Get DCMI Capabilities Info response format depends entirely on the
//! requested parameter, so each parameter is its own command with its own
//! response type.

use std::time::{Duration, Instant};

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::sensor::RecordId;
use crate::session::V2Session;
use crate::wire::message::Operation;

/// The DCMI defining body code.
pub const BODY_CODE_DCMI: u8 = 0xDC;

const CMD_GET_CAPABILITIES: u8 = 0x01;
const CMD_GET_POWER_READING: u8 = 0x02;
const CMD_GET_SENSOR_INFO: u8 = 0x07;

// Entity IDs for Get DCMI Sensor Info. v1.5 maps the DCMI-specific IDs
// onto the IPMI ones and recommends the latter; older BMCs only accept
// the former.
const ENTITY_IPMI_AIR_INLET: u8 = 0x37;
const ENTITY_IPMI_PROCESSOR: u8 = 0x03;
const ENTITY_IPMI_SYSTEM_BOARD: u8 = 0x07;
const ENTITY_DCMI_AIR_INLET: u8 = 0x40;
const ENTITY_DCMI_PROCESSOR: u8 = 0x41;
const ENTITY_DCMI_SYSTEM_BOARD: u8 = 0x42;

const SENSOR_TYPE_TEMPERATURE: u8 = 0x01;

/// Decode the wire form of a rolling average time period: a 6-bit value
/// qualified by a 2-bit unit. Always a whole number of seconds, up to 63
/// days.
pub fn rolling_avg_period(b: u8) -> Duration {
    let value = u64::from(b & 0x3F);
    let unit_seconds = match b >> 6 {
        0 => 1,
        1 => 60,
        2 => 60 * 60,
        _ => 60 * 60 * 24,
    };
    Duration::from_secs(value * unit_seconds)
}

/// Encode a duration as a rolling average time period byte,
/// best-effort. A duration of one or more of the next-larger unit is
/// represented in that unit, since BMCs may key supported periods off the
/// exact byte; durations beyond 63 days clamp to 63 days.
pub fn rolling_avg_period_byte(d: Duration) -> u8 {
    let secs = d.as_secs();
    if secs < 60 {
        secs as u8
    } else if secs < 60 * 60 {
        (secs / 60) as u8 | 0x40
    } else if secs < 60 * 60 * 24 {
        (secs / (60 * 60)) as u8 | 0x80
    } else {
        let days = (secs / (60 * 60 * 24)).min(63);
        days as u8 | 0xC0
    }
}

/// Whether enhanced system power statistics are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerStatisticsMode {
    /// The BMC controls the statistics reporting period. The only mode
    /// in DCMI v1.0.
    Normal = 0x01,
    /// Statistics over a caller-chosen rolling average period, which
    /// must be one the BMC advertises.
    Enhanced = 0x02,
}

/// `Get Power Reading` (DCMI, 0x02).
#[derive(Debug, Clone, Copy)]
pub struct GetPowerReading {
    /// Statistics mode.
    pub mode: PowerStatisticsMode,
    /// Rolling average period for enhanced mode; ignored in normal mode.
    pub period: Duration,
}

impl GetPowerReading {
    /// A normal-mode reading: the BMC picks the averaging period.
    pub fn normal() -> Self {
        Self {
            mode: PowerStatisticsMode::Normal,
            period: Duration::ZERO,
        }
    }
}

/// Parsed response for `Get Power Reading`. Check `active` and `period`
/// before trusting the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerReading {
    /// Current power draw in watts.
    pub instantaneous: u16,
    /// Minimum over the period, watts.
    pub min: u16,
    /// Maximum over the period, watts.
    pub max: u16,
    /// Average over the period, watts.
    pub avg: u16,
    /// When the readings are for, raw IPMI timestamp seconds.
    pub timestamp_seconds: u32,
    /// The averaging period the statistics cover.
    pub period: Duration,
    /// Whether power measurement is currently active.
    pub active: bool,
}

impl Command for GetPowerReading {
    type Output = PowerReading;

    fn name(&self) -> &'static str {
        "Get Power Reading"
    }

    fn operation(&self) -> Operation {
        Operation::group(CMD_GET_POWER_READING, BODY_CODE_DCMI)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.mode as u8);
        match self.mode {
            PowerStatisticsMode::Enhanced => buf.push(rolling_avg_period_byte(self.period)),
            PowerStatisticsMode::Normal => buf.push(0x00),
        }
        buf.push(0x00);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 17 {
            return Err(Error::Decode("Get Power Reading response too short"));
        }
        Ok(PowerReading {
            instantaneous: u16::from_le_bytes([data[0], data[1]]),
            min: u16::from_le_bytes([data[2], data[3]]),
            max: u16::from_le_bytes([data[4], data[5]]),
            avg: u16::from_le_bytes([data[6], data[7]]),
            timestamp_seconds: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            period: Duration::from_millis(u64::from(u32::from_le_bytes([
                data[12], data[13], data[14], data[15],
            ]))),
            active: data[16] & (1 << 6) != 0,
        })
    }
}

/// `Get DCMI Sensor Info` (DCMI, 0x07): record IDs of the sensors DCMI
/// singles out (inlet, CPU and baseboard temperatures).
#[derive(Debug, Clone, Copy)]
pub struct GetDcmiSensorInfo {
    /// Sensor type; temperature is the only one DCMI defines.
    pub sensor_type: u8,
    /// Entity to look up.
    pub entity: u8,
    /// Instance to retrieve; 0 retrieves all instances.
    pub instance: u8,
    /// Starting instance when `instance` is 0 and there are more than
    /// eight.
    pub instance_start: u8,
}

/// One page of `Get DCMI Sensor Info` results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfoPage {
    /// Total instances of the entity; more than the returned IDs means
    /// further pages exist.
    pub total_instances: u8,
    /// SDR record IDs in this page.
    pub record_ids: Vec<RecordId>,
}

impl Command for GetDcmiSensorInfo {
    type Output = SensorInfoPage;

    fn name(&self) -> &'static str {
        "Get DCMI Sensor Info"
    }

    fn operation(&self) -> Operation {
        Operation::group(CMD_GET_SENSOR_INFO, BODY_CODE_DCMI)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.sensor_type);
        buf.push(self.entity);
        buf.push(self.instance);
        buf.push(if self.instance == 0 {
            self.instance_start
        } else {
            0
        });
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 2 {
            return Err(Error::Decode("Get DCMI Sensor Info response too short"));
        }
        let count = data[1] as usize;
        if data.len() < 2 + count * 2 {
            return Err(Error::Decode("Get DCMI Sensor Info record IDs truncated"));
        }
        let record_ids = (0..count)
            .map(|i| RecordId(u16::from_le_bytes([data[2 + i * 2], data[3 + i * 2]])))
            .collect();
        Ok(SensorInfoPage {
            total_instances: data[0],
            record_ids,
        })
    }
}

/// The record IDs of the temperature sensors DCMI singles out, across
/// all instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorInfo {
    /// Air inlet temperature sensors.
    pub inlet: Vec<RecordId>,
    /// Processor temperature sensors.
    pub cpu: Vec<RecordId>,
    /// Baseboard temperature sensors.
    pub baseboard: Vec<RecordId>,
}

/// Retrieve all inlet, CPU and baseboard temperature sensors.
///
/// Tries the IPMI entity IDs first (recommended from DCMI v1.5, which
/// maps them); if nothing comes back, falls back to the DCMI-specific
/// entity IDs older BMCs expect. Handles >8 instances by paging.
pub fn get_sensor_info(session: &mut V2Session<'_>, deadline: Instant) -> Result<SensorInfo> {
    let ipmi = [
        ENTITY_IPMI_AIR_INLET,
        ENTITY_IPMI_PROCESSOR,
        ENTITY_IPMI_SYSTEM_BOARD,
    ];
    match get_sensor_entities(session, deadline, &ipmi) {
        Ok(sets) if sets.iter().any(|s| !s.is_empty()) => {
            let [inlet, cpu, baseboard] = sets;
            return Ok(SensorInfo {
                inlet,
                cpu,
                baseboard,
            });
        }
        // fall back on the DCMI entity IDs, also when the BMC rejects
        // the IPMI ones outright
        Ok(_) | Err(_) => {}
    }

    let dcmi = [
        ENTITY_DCMI_AIR_INLET,
        ENTITY_DCMI_PROCESSOR,
        ENTITY_DCMI_SYSTEM_BOARD,
    ];
    let [inlet, cpu, baseboard] = get_sensor_entities(session, deadline, &dcmi)?;
    Ok(SensorInfo {
        inlet,
        cpu,
        baseboard,
    })
}

fn get_sensor_entities(
    session: &mut V2Session<'_>,
    deadline: Instant,
    entities: &[u8; 3],
) -> Result<[Vec<RecordId>; 3]> {
    let mut out: [Vec<RecordId>; 3] = Default::default();
    for (slot, &entity) in out.iter_mut().zip(entities) {
        *slot = get_entity_instances(session, deadline, entity)?;
    }
    Ok(out)
}

/// Page through every instance of one entity. 255 is the most the
/// response format can name.
fn get_entity_instances(
    session: &mut V2Session<'_>,
    deadline: Instant,
    entity: u8,
) -> Result<Vec<RecordId>> {
    let mut record_ids: Vec<RecordId> = Vec::new();

    loop {
        let page = session.execute(
            deadline,
            &GetDcmiSensorInfo {
                sensor_type: SENSOR_TYPE_TEMPERATURE,
                entity,
                instance: 0,
                instance_start: record_ids.len() as u8 + 1,
            },
        )?;

        let total = usize::from(page.total_instances);
        let got = page.record_ids.len();
        record_ids.extend(page.record_ids);

        // an empty page or the 255 cap stops runaway pagination
        if got == 0 || record_ids.len() >= total || record_ids.len() >= 255 {
            break;
        }
    }

    Ok(record_ids)
}

/// `Get Power Reading` convenience wrapper.
pub fn get_power_reading(
    session: &mut V2Session<'_>,
    deadline: Instant,
    req: GetPowerReading,
) -> Result<PowerReading> {
    session.execute(deadline, &req)
}

mod capabilities;

pub use capabilities::{
    DcmiCapabilitiesHeader, GetDcmiEnhancedPowerStatisticsAttrs,
    GetDcmiManageabilityAccessAttrs, GetDcmiMandatoryPlatformAttrs,
    GetDcmiOptionalPlatformAttrs, GetDcmiSupportedCapabilities,
    DcmiEnhancedPowerStatisticsAttrs, DcmiManageabilityAccessAttrs,
    DcmiMandatoryPlatformAttrs, DcmiOptionalPlatformAttrs, DcmiSupportedCapabilities,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_avg_period_decoding() {
        assert_eq!(rolling_avg_period(0x2A), Duration::from_secs(42));
        assert_eq!(rolling_avg_period(0xCC), Duration::from_secs(12 * 24 * 60 * 60));
        assert_eq!(rolling_avg_period(0x00), Duration::ZERO);
        assert_eq!(rolling_avg_period(0x41), Duration::from_secs(60));
        assert_eq!(rolling_avg_period(0x81), Duration::from_secs(3600));
    }

    #[test]
    fn rolling_avg_period_encoding() {
        assert_eq!(rolling_avg_period_byte(Duration::from_secs(42)), 0x2A);
        assert_eq!(
            rolling_avg_period_byte(Duration::from_secs(12 * 24 * 60 * 60)),
            0xCC
        );
        // 120 seconds is represented as 2 minutes, not 120 seconds
        assert_eq!(rolling_avg_period_byte(Duration::from_secs(120)), 0x42);
        // clamp beyond the top of the range
        assert_eq!(
            rolling_avg_period_byte(Duration::from_secs(100 * 24 * 60 * 60)),
            0xFF
        );
    }

    #[test]
    fn rolling_avg_period_byte_round_trip() {
        for b in 0..=0xFFu8 {
            assert_eq!(rolling_avg_period_byte(rolling_avg_period(b)), b);
        }
    }

    #[test]
    fn power_reading_request_encoding() {
        let mut buf = Vec::new();
        GetPowerReading::normal().encode_request(&mut buf);
        assert_eq!(buf, [0x01, 0x00, 0x00]);

        buf.clear();
        GetPowerReading {
            mode: PowerStatisticsMode::Enhanced,
            period: Duration::from_secs(42),
        }
        .encode_request(&mut buf);
        assert_eq!(buf, [0x02, 0x2A, 0x00]);
    }

    #[test]
    fn power_reading_response_decoding() {
        let mut data = Vec::new();
        data.extend_from_slice(&213u16.to_le_bytes());
        data.extend_from_slice(&180u16.to_le_bytes());
        data.extend_from_slice(&420u16.to_le_bytes());
        data.extend_from_slice(&215u16.to_le_bytes());
        data.extend_from_slice(&1_500_000_000u32.to_le_bytes());
        data.extend_from_slice(&30_000u32.to_le_bytes());
        data.push(1 << 6);

        let reading = GetPowerReading::normal()
            .decode_response(&data)
            .expect("decode");
        assert_eq!(reading.instantaneous, 213);
        assert_eq!(reading.min, 180);
        assert_eq!(reading.max, 420);
        assert_eq!(reading.avg, 215);
        assert_eq!(reading.timestamp_seconds, 1_500_000_000);
        assert_eq!(reading.period, Duration::from_secs(30));
        assert!(reading.active);

        data[16] = 0;
        let reading = GetPowerReading::normal()
            .decode_response(&data)
            .expect("decode");
        assert!(!reading.active);
    }

    #[test]
    fn sensor_info_page_decoding() {
        let cmd = GetDcmiSensorInfo {
            sensor_type: SENSOR_TYPE_TEMPERATURE,
            entity: ENTITY_IPMI_PROCESSOR,
            instance: 0,
            instance_start: 1,
        };

        let mut buf = Vec::new();
        cmd.encode_request(&mut buf);
        assert_eq!(buf, [0x01, 0x03, 0x00, 0x01]);

        let page = cmd
            .decode_response(&[0x03, 0x02, 0x10, 0x00, 0x11, 0x00])
            .expect("decode");
        assert_eq!(page.total_instances, 3);
        assert_eq!(page.record_ids, vec![RecordId(0x10), RecordId(0x11)]);

        assert!(cmd.decode_response(&[0x03, 0x02, 0x10]).is_err());
    }
}
