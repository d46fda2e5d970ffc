//! Storage network function commands: the SDR repository and sensor
//! readings.

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::sensor::convert::bcd_decode;
use crate::sensor::RecordId;
use crate::wire::message::{netfn, Operation};

/// Parsed response for `Get SDR Repository Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdrRepositoryInfo {
    /// SDR specification version, e.g. 15 for v1.5, 20 for v2.0.
    pub version: u8,
    /// Number of records in the repository.
    pub records: u16,
    /// Free space in bytes (0xFFFF means unspecified).
    pub free_space: u16,
    /// Timestamp of the most recent addition, seconds.
    pub last_addition: u32,
    /// Timestamp of the most recent erase, seconds.
    pub last_erase: u32,
    /// SDR could not be written due to lack of space.
    pub overflow: bool,
    /// Modal update supported.
    pub supports_modal_update: bool,
    /// Non-modal update supported.
    pub supports_non_modal_update: bool,
    /// Delete SDR supported.
    pub supports_delete: bool,
    /// Partial Add SDR supported.
    pub supports_partial_add: bool,
    /// Reserve SDR Repository supported.
    pub supports_reserve: bool,
    /// Get SDR Repository Allocation Information supported.
    pub supports_get_allocation_information: bool,
}

/// `Get SDR Repository Info` (Storage, 0x20).
#[derive(Debug, Clone, Copy)]
pub struct GetSdrRepositoryInfo;

impl Command for GetSdrRepositoryInfo {
    type Output = SdrRepositoryInfo;

    fn name(&self) -> &'static str {
        "Get SDR Repository Info"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::STORAGE, 0x20)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 14 {
            return Err(Error::Decode("Get SDR Repository Info response too short"));
        }

        let ops = data[13];
        Ok(SdrRepositoryInfo {
            version: bcd_decode(data[0] & 0x0F) * 10 + bcd_decode(data[0] >> 4),
            records: u16::from_le_bytes([data[1], data[2]]),
            free_space: u16::from_le_bytes([data[3], data[4]]),
            last_addition: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            last_erase: u32::from_le_bytes([data[9], data[10], data[11], data[12]]),
            overflow: ops & 0x80 != 0,
            supports_modal_update: ops & 0x40 != 0,
            supports_non_modal_update: ops & 0x20 != 0,
            supports_delete: ops & 0x08 != 0,
            supports_partial_add: ops & 0x04 != 0,
            supports_reserve: ops & 0x02 != 0,
            supports_get_allocation_information: ops & 0x01 != 0,
        })
    }
}

/// `Reserve SDR Repository` (Storage, 0x22). The reservation ID licences
/// partial Get SDR reads; zero is never a valid reservation.
#[derive(Debug, Clone, Copy)]
pub struct ReserveSdrRepository;

impl Command for ReserveSdrRepository {
    type Output = u16;

    fn name(&self) -> &'static str {
        "Reserve SDR Repository"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::STORAGE, 0x22)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 2 {
            return Err(Error::Decode("Reserve SDR Repository response too short"));
        }
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }
}

/// `Get SDR` (Storage, 0x23) partial read.
#[derive(Debug, Clone, Copy)]
pub struct GetSdr {
    /// Reservation ID; required for partial (non-zero offset) reads.
    pub reservation_id: u16,
    /// Record to read; [`RecordId::FIRST`] starts an enumeration.
    pub record_id: RecordId,
    /// Byte offset into the record.
    pub offset: u8,
    /// Bytes to read; 0xFF means "entire record".
    pub length: u8,
}

/// Output of a `Get SDR` partial read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdrChunk {
    /// The record ID to request next; [`RecordId::LAST`] after the final
    /// record.
    pub next: RecordId,
    /// The requested record bytes.
    pub data: Vec<u8>,
}

impl Command for GetSdr {
    type Output = SdrChunk;

    fn name(&self) -> &'static str {
        "Get SDR"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::STORAGE, 0x23)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.reservation_id.to_le_bytes());
        buf.extend_from_slice(&self.record_id.0.to_le_bytes());
        buf.push(self.offset);
        buf.push(self.length);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 2 {
            return Err(Error::Decode("Get SDR response too short"));
        }
        Ok(SdrChunk {
            next: RecordId(u16::from_le_bytes([data[0], data[1]])),
            data: data[2..].to_vec(),
        })
    }
}

/// Parsed response for `Get Sensor Reading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    /// Raw reading byte; interpret via the sensor's Full Sensor Record.
    pub raw: u8,
    /// All event messages enabled for the sensor.
    pub event_messages_enabled: bool,
    /// Sensor scanning enabled.
    pub scanning_enabled: bool,
    /// The reading (or sensor state) is unavailable, e.g. during update
    /// or re-arm.
    pub reading_unavailable: bool,
}

/// `Get Sensor Reading` (Sensor/Event, 0x2D).
#[derive(Debug, Clone, Copy)]
pub struct GetSensorReading {
    /// Sensor number from the SDR.
    pub number: u8,
}

impl Command for GetSensorReading {
    type Output = SensorReading;

    fn name(&self) -> &'static str {
        "Get Sensor Reading"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::SENSOR_EVENT, 0x2D)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.number);
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 3 {
            return Err(Error::Decode("Get Sensor Reading response too short"));
        }
        Ok(SensorReading {
            raw: data[0],
            event_messages_enabled: data[1] & 0x80 != 0,
            scanning_enabled: data[1] & 0x40 != 0,
            reading_unavailable: data[1] & 0x20 != 0,
        })
    }
}
