//! Raw-reading conversion: analog data formats, linearisation formulas
//! and the (M, B, exponent) conversion factors.

use crate::error::{Error, Result};

/// Binary format of analog sensor readings and thresholds. 2-bit field in
/// byte 21 of the Full Sensor Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AnalogDataFormat {
    /// Unsigned, also used when the sensor provides neither analog
    /// readings nor thresholds.
    Unsigned = 0,
    /// 1's complement.
    OnesComplement = 1,
    /// 2's complement.
    TwosComplement = 2,
    /// No numeric readings, only thresholds.
    NotAnalog = 3,
}

impl AnalogDataFormat {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Unsigned,
            1 => Self::OnesComplement,
            2 => Self::TwosComplement,
            _ => Self::NotAnalog,
        }
    }

    /// Turn an 8-bit raw sensor value into its native value. Fails for
    /// [`AnalogDataFormat::NotAnalog`].
    pub fn convert(self, raw: u8) -> Result<i16> {
        match self {
            Self::Unsigned => Ok(i16::from(raw)),
            Self::OnesComplement => Ok(i16::from(ones_complement(raw))),
            Self::TwosComplement => Ok(i16::from(raw as i8)),
            Self::NotAnalog => Err(Error::Unsupported("sensor has no analog readings")),
        }
    }
}

/// Interpret a byte as an 8-bit 1's complement integer.
pub(crate) fn ones_complement(b: u8) -> i8 {
    if b & 0x80 != 0 {
        -((!b) as i8)
    } else {
        b as i8
    }
}

/// Decode a packed BCD byte (two decimal digits).
pub(crate) fn bcd_decode(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}

/// Linearisation formula applied after the conversion factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linearisation {
    /// No transformation.
    Linear,
    /// Natural log.
    Ln,
    /// Base-10 log.
    Log10,
    /// Base-2 log.
    Log2,
    /// e^x.
    Exp,
    /// 10^x.
    Exp10,
    /// 2^x.
    Exp2,
    /// 1/x.
    Inverse,
    /// x².
    Square,
    /// x³.
    Cube,
    /// √x.
    Sqrt,
    /// ∛x.
    CubeRoot,
    /// Non-linear or OEM; readings cannot be converted without the
    /// sensor-specific curve.
    Other(u8),
}

impl Linearisation {
    pub(crate) fn from_wire(b: u8) -> Self {
        match b & 0x7F {
            0x00 => Self::Linear,
            0x01 => Self::Ln,
            0x02 => Self::Log10,
            0x03 => Self::Log2,
            0x04 => Self::Exp,
            0x05 => Self::Exp10,
            0x06 => Self::Exp2,
            0x07 => Self::Inverse,
            0x08 => Self::Square,
            0x09 => Self::Cube,
            0x0A => Self::Sqrt,
            0x0B => Self::CubeRoot,
            other => Self::Other(other),
        }
    }

    /// Apply the formula. Fails for non-linearisable sensors.
    pub fn apply(self, x: f64) -> Result<f64> {
        Ok(match self {
            Self::Linear => x,
            Self::Ln => x.ln(),
            Self::Log10 => x.log10(),
            Self::Log2 => x.log2(),
            Self::Exp => x.exp(),
            Self::Exp10 => 10f64.powf(x),
            Self::Exp2 => 2f64.powf(x),
            Self::Inverse => 1.0 / x,
            Self::Square => x * x,
            Self::Cube => x * x * x,
            Self::Sqrt => x.sqrt(),
            Self::CubeRoot => x.cbrt(),
            Self::Other(_) => {
                return Err(Error::Unsupported("non-linear sensor reading"));
            }
        })
    }
}

/// Conversion factors from byte 25 of the Full Sensor Record: the reading
/// in engineering units is `(M * raw + B * 10^b_exp) * 10^r_exp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionFactors {
    /// Signed 10-bit multiplier.
    pub m: i16,
    /// Signed 10-bit additive offset.
    pub b: i16,
    /// Signed 4-bit exponent for B.
    pub b_exp: i8,
    /// Signed 4-bit result exponent.
    pub r_exp: i8,
}

impl ConversionFactors {
    /// Convert a raw reading (already through the analog data format)
    /// into engineering units.
    pub fn convert_reading(&self, raw: i16) -> f64 {
        (f64::from(self.m) * f64::from(raw)
            + f64::from(self.b) * 10f64.powi(i32::from(self.b_exp)))
            * 10f64.powi(i32::from(self.r_exp))
    }
}

/// Combine the top 2 bits with an 8-bit LS byte into a signed 10-bit
/// value.
pub(crate) fn signed_10bit(ms2: u8, ls8: u8) -> i16 {
    let v = (u16::from(ms2 & 0x03) << 8) | u16::from(ls8);
    if v & 0x200 != 0 {
        v as i16 - 1024
    } else {
        v as i16
    }
}

/// Combine a 4-bit MS nibble with a 6-bit LS part into a signed 10-bit
/// value (the accuracy field).
pub(crate) fn signed_10bit_6(ms4: u8, ls6: u8) -> i16 {
    let v = (u16::from(ms4 & 0x0F) << 6) | u16::from(ls6 & 0x3F);
    if v & 0x200 != 0 {
        v as i16 - 1024
    } else {
        v as i16
    }
}

/// Interpret a nibble as a signed 4-bit 2's complement value.
pub(crate) fn signed_4bit(nibble: u8) -> i8 {
    let v = nibble & 0x0F;
    if v & 0x08 != 0 {
        v as i8 - 16
    } else {
        v as i8
    }
}
