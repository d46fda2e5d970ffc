//! Sensor Data Records: the SDR header and the Full Sensor Record body.

pub mod convert;
pub(crate) mod id_string;

pub use convert::{AnalogDataFormat, ConversionFactors, Linearisation};

use convert::{bcd_decode, signed_10bit, signed_10bit_6, signed_4bit};

use crate::error::{Error, Result};

/// A 16-bit SDR record ID. Record IDs may change whenever the repository
/// is modified; they are retrieval handles, not stable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u16);

impl RecordId {
    /// Sentinel meaning "the first record in the repository".
    pub const FIRST: RecordId = RecordId(0x0000);
    /// Sentinel returned as "next" by the final record.
    pub const LAST: RecordId = RecordId(0xFFFF);
}

/// The variety of an SDR. Not all SDRs pertain to sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Full Sensor Record: the only type this crate decodes bodies for.
    FullSensor,
    /// Compact Sensor Record.
    CompactSensor,
    /// Event-only record.
    EventOnly,
    /// FRU Device Locator.
    FruDeviceLocator,
    /// Management Controller Device Locator.
    McDeviceLocator,
    /// Anything else, carried raw.
    Other(u8),
}

impl RecordType {
    fn from_wire(b: u8) -> Self {
        match b {
            0x01 => Self::FullSensor,
            0x02 => Self::CompactSensor,
            0x03 => Self::EventOnly,
            0x11 => Self::FruDeviceLocator,
            0x12 => Self::McDeviceLocator,
            other => Self::Other(other),
        }
    }
}

/// The 5-byte header common to every SDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdrHeader {
    /// Current record ID of this SDR (echoed by Get SDR).
    pub id: RecordId,
    /// SDR specification version, e.g. 15 for 1.5 (packed BCD,
    /// low-digit-first on the wire).
    pub version: u8,
    /// Record type.
    pub record_type: RecordType,
    /// Number of body bytes following the header.
    pub length: u8,
}

impl SdrHeader {
    /// Number of bytes in the header.
    pub const LEN: u8 = 5;

    /// Decode a header from the first five bytes of an SDR.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN as usize {
            return Err(Error::Decode("SDR header is always 5 bytes"));
        }
        Ok(Self {
            id: RecordId(u16::from_le_bytes([data[0], data[1]])),
            version: bcd_decode(data[2] & 0x0F) * 10 + bcd_decode(data[2] >> 4),
            record_type: RecordType::from_wire(data[3]),
            length: data[4],
        })
    }
}

/// Identifies the owner and number of a sensor; unique per BMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRecordKey {
    /// Owner slave address (already shifted into address form) .
    pub owner_address: u8,
    /// Channel the owner is on.
    pub channel: u8,
    /// Owner LUN.
    pub owner_lun: u8,
    /// Sensor number, unique per owner.
    pub number: u8,
}

/// Sensor direction from byte 24 of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDirection {
    /// Direction not specified.
    Unspecified,
    /// Input sensor (e.g. voltage fed into a PSU).
    Input,
    /// Output sensor.
    Output,
}

/// Rate unit qualifying the base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    /// No rate.
    None,
    /// Per microsecond.
    PerMicrosecond,
    /// Per millisecond.
    PerMillisecond,
    /// Per second.
    PerSecond,
    /// Per minute.
    PerMinute,
    /// Per hour.
    PerHour,
    /// Per day.
    PerDay,
    /// Reserved value.
    Reserved,
}

impl RateUnit {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::None,
            1 => Self::PerMicrosecond,
            2 => Self::PerMillisecond,
            3 => Self::PerSecond,
            4 => Self::PerMinute,
            5 => Self::PerHour,
            6 => Self::PerDay,
            _ => Self::Reserved,
        }
    }
}

/// A decoded Full Sensor Record (record type 1) body, including its key
/// fields. 48+ bytes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct FullSensorRecord {
    /// Sensor owner and number.
    pub key: SensorRecordKey,
    /// Entity ID the sensor monitors (e.g. 0x03 processor).
    pub entity: u8,
    /// Whether the entity instance is a logical container rather than a
    /// physical entity.
    pub is_container_entity: bool,
    /// Entity instance number.
    pub instance: u8,
    /// Ignore the sensor if its entity is absent or disabled.
    pub ignore: bool,
    /// Sensor type code (e.g. 0x01 temperature).
    pub sensor_type: u8,
    /// Event/reading type code; 0x01 is threshold-based.
    pub output_type: u8,
    /// Binary format of raw readings.
    pub analog_format: AnalogDataFormat,
    /// Rate qualifying the base unit.
    pub rate_unit: RateUnit,
    /// Readings are a percentage.
    pub is_percentage: bool,
    /// Base unit code (e.g. 1 degrees C, 4 volts, 5 amps, 18 RPM).
    pub base_unit: u8,
    /// Modifier unit code, 0 when unused.
    pub modifier_unit: u8,
    /// Linearisation applied after the conversion factors.
    pub linearisation: Linearisation,
    /// M, B and exponents for raw-to-engineering conversion.
    pub conversion: ConversionFactors,
    /// Tolerance in ± half raw counts.
    pub tolerance: u8,
    /// Accuracy in 1/100 percent, scaled by `accuracy_exp`.
    pub accuracy: i16,
    /// Accuracy exponent.
    pub accuracy_exp: u8,
    /// Sensor direction.
    pub direction: SensorDirection,
    /// Whether `nominal_reading` is meaningful.
    pub nominal_reading_specified: bool,
    /// Whether `normal_min` is meaningful.
    pub normal_min_specified: bool,
    /// Whether `normal_max` is meaningful.
    pub normal_max_specified: bool,
    /// Nominal reading, raw.
    pub nominal_reading: u8,
    /// Normal minimum, raw.
    pub normal_min: u8,
    /// Normal maximum, raw.
    pub normal_max: u8,
    /// Sensor minimum, raw.
    pub sensor_min: u8,
    /// Sensor maximum, raw.
    pub sensor_max: u8,
    /// Sensor identity, e.g. "CPU Temp".
    pub identity: String,
}

impl FullSensorRecord {
    /// Decode a Full Sensor Record from its key bytes onward (i.e. the
    /// body following the 5-byte SDR header). Trailing bytes are
    /// ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        // fixed fields through the identity type/length byte
        if data.len() < 43 {
            return Err(Error::Decode("full sensor record too short"));
        }

        let key = SensorRecordKey {
            owner_address: data[0],
            channel: data[1] >> 4,
            owner_lun: data[1] & 0x03,
            number: data[2],
        };

        let entity = data[3];
        let is_container_entity = data[4] & 0x80 != 0;
        let instance = data[4] & 0x7F;
        // data[5] is sensor initialization; nothing there affects reads
        let ignore = data[6] & 0x80 != 0;
        let sensor_type = data[7];
        let output_type = data[8];
        // data[9..15] are the event/threshold masks

        let units1 = data[15];
        let analog_format = AnalogDataFormat::from_bits(units1 >> 6);
        let rate_unit = RateUnit::from_bits((units1 >> 3) & 0x07);
        let is_percentage = units1 & 0x01 != 0;
        let base_unit = data[16];
        let modifier_unit = data[17];
        let linearisation = Linearisation::from_wire(data[18]);

        let m = signed_10bit(data[20] >> 6, data[19]);
        let tolerance = data[20] & 0x3F;
        let b = signed_10bit(data[22] >> 6, data[21]);
        let accuracy = signed_10bit_6(data[23] >> 4, data[22] & 0x3F);
        let accuracy_exp = (data[23] >> 2) & 0x03;
        let direction = match data[23] & 0x03 {
            0x01 => SensorDirection::Input,
            0x02 => SensorDirection::Output,
            _ => SensorDirection::Unspecified,
        };
        let r_exp = signed_4bit(data[24] >> 4);
        let b_exp = signed_4bit(data[24] & 0x0F);

        let flags = data[25];
        let nominal_reading_specified = flags & 0x01 != 0;
        let normal_max_specified = flags & 0x02 != 0;
        let normal_min_specified = flags & 0x04 != 0;

        let nominal_reading = data[26];
        let normal_max = data[27];
        let normal_min = data[28];
        let sensor_max = data[29];
        let sensor_min = data[30];
        // data[31..39] thresholds, data[39..42] hysteresis + reserved

        let (identity, _) = id_string::decode(data[42], &data[43..])?;

        Ok(Self {
            key,
            entity,
            is_container_entity,
            instance,
            ignore,
            sensor_type,
            output_type,
            analog_format,
            rate_unit,
            is_percentage,
            base_unit,
            modifier_unit,
            linearisation,
            conversion: ConversionFactors { m, b, b_exp, r_exp },
            tolerance,
            accuracy,
            accuracy_exp,
            direction,
            nominal_reading_specified,
            normal_min_specified,
            normal_max_specified,
            nominal_reading,
            normal_min,
            normal_max,
            sensor_min,
            sensor_max,
            identity,
        })
    }

    /// Convert a raw reading from this sensor into engineering units:
    /// analog format, then `(M*raw + B*10^b_exp)*10^r_exp`, then the
    /// linearisation formula.
    pub fn convert_reading(&self, raw: u8) -> Result<f64> {
        let native = self.analog_format.convert(raw)?;
        self.linearisation
            .apply(self.conversion.convert_reading(native))
    }
}
