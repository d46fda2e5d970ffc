//! Sensor identity string codecs.
//!
//! The type/length byte carries the encoding in its top two bits and the
//! character count in the bottom five: Unicode, BCD plus, packed 6-bit
//! ASCII, or 8-bit ASCII + Latin-1.

use crate::error::{Error, Result};

const BCD_PLUS_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ' ', '-', '.', ':', ',', '_',
];

/// Decode an identity string given its type/length byte, returning the
/// string and the number of data bytes consumed.
pub(crate) fn decode(type_len: u8, data: &[u8]) -> Result<(String, usize)> {
    let chars = (type_len & 0x1F) as usize;
    if chars == 0 {
        return Ok((String::new(), 0));
    }
    match type_len >> 6 {
        0b00 => decode_unicode(data, chars),
        0b01 => decode_bcd_plus(data, chars),
        0b10 => decode_packed_6bit_ascii(data, chars),
        _ => decode_8bit_ascii_latin1(data, chars),
    }
}

/// IPMI leaves Unicode interpretation open; bytes are taken verbatim
/// with the count naming bytes, replacing invalid sequences.
fn decode_unicode(data: &[u8], chars: usize) -> Result<(String, usize)> {
    if data.len() < chars {
        return Err(Error::Decode("unicode identity string truncated"));
    }
    Ok((
        String::from_utf8_lossy(&data[..chars]).into_owned(),
        chars,
    ))
}

/// One character per nibble, high nibble first.
fn decode_bcd_plus(data: &[u8], chars: usize) -> Result<(String, usize)> {
    let consumed = chars.div_ceil(2);
    if data.len() < consumed {
        return Err(Error::Decode("BCD plus identity string truncated"));
    }

    let mut out = String::with_capacity(chars);
    for i in 0..chars {
        let byte = data[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        out.push(BCD_PLUS_ALPHABET[nibble as usize]);
    }
    Ok((out, consumed))
}

/// Six bits per character, packed LSB-first; each value offsets from
/// space (0x20).
fn decode_packed_6bit_ascii(data: &[u8], chars: usize) -> Result<(String, usize)> {
    let consumed = (chars * 6).div_ceil(8);
    if data.len() < consumed {
        return Err(Error::Decode("6-bit identity string truncated"));
    }

    let mut out = String::with_capacity(chars);
    for i in 0..chars {
        let bit = i * 6;
        let lo = data[bit / 8] >> (bit % 8);
        let value = if bit % 8 > 2 {
            lo | (data[bit / 8 + 1] << (8 - bit % 8))
        } else {
            lo
        } & 0x3F;
        out.push((0x20 + value) as char);
    }
    Ok((out, consumed))
}

/// One byte per character; Latin-1 maps directly onto Unicode scalars.
fn decode_8bit_ascii_latin1(data: &[u8], chars: usize) -> Result<(String, usize)> {
    // a 1-byte 8-bit ASCII string is a reserved encoding
    if data.len() < 2 || data.len() < chars {
        return Err(Error::Decode("8-bit identity string truncated"));
    }
    Ok((
        data[..chars].iter().map(|&b| b as char).collect(),
        chars,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_plus_full_alphabet() {
        let (s, consumed) = decode_bcd_plus(
            &[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF],
            16,
        )
        .expect("decode");
        assert_eq!(s, "0123456789 -.:,_");
        assert_eq!(consumed, 8);
    }

    #[test]
    fn bcd_plus_mixed() {
        let (s, consumed) =
            decode_bcd_plus(&[0x22, 0xB5, 0x6D, 0xAB, 0x34], 10).expect("decode");
        assert_eq!(s, "22-56: -34");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn bcd_plus_odd_count_ignores_final_nibble() {
        let (s, consumed) = decode_bcd_plus(&[0x33, 0x30], 3).expect("decode");
        assert_eq!(s, "333");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn bcd_plus_truncated() {
        assert!(decode_bcd_plus(&[0x12], 4).is_err());
    }

    #[test]
    fn packed_6bit_ipmi() {
        let (s, consumed) =
            decode_packed_6bit_ascii(&[0b0010_1001, 0b1101_1100, 0b1010_0110], 4)
                .expect("decode");
        assert_eq!(s, "IPMI");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn packed_6bit_george() {
        let (s, consumed) = decode_packed_6bit_ascii(
            &[0b0110_0111, 0b1111_1001, 0b1100_1010, 0b0110_0111, 0b0000_1001],
            6,
        )
        .expect("decode");
        assert_eq!(s, "GEORGE");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn packed_6bit_truncated() {
        assert!(decode_packed_6bit_ascii(&[], 2).is_err());
    }

    #[test]
    fn ascii_8bit() {
        let (s, consumed) =
            decode_8bit_ascii_latin1(br":K;&e7-uN 8O3Fd0k?nECU\ctu3}", 28).expect("decode");
        assert_eq!(s, r#":K;&e7-uN 8O3Fd0k?nECU\ctu3}"#);
        assert_eq!(consumed, 28);
    }

    #[test]
    fn ascii_8bit_truncates_to_chars() {
        let (s, consumed) = decode_8bit_ascii_latin1(b"HKB}_1P?%|;;drG", 10).expect("decode");
        assert_eq!(s, "HKB}_1P?%|");
        assert_eq!(consumed, 10);
    }

    #[test]
    fn ascii_8bit_minimum_two_bytes() {
        assert!(decode_8bit_ascii_latin1(&[0x41], 1).is_err());
        assert!(decode_8bit_ascii_latin1(&[0x01, 0x02], 3).is_err());
    }

    #[test]
    fn dispatch_by_type_bits() {
        // 8-bit ASCII, 8 chars.
        let (s, _) = decode(0xC8, b"CPU Temp").expect("decode");
        assert_eq!(s, "CPU Temp");

        // packed 6-bit, 9 chars.
        let data = [
            0b0001_1000, 0b0000_0001, 0b0111_0100, 0b1100_0111, 0b1100_1110, 0b1101_1011,
            0b0011_1111,
        ];
        let (s, consumed) = decode(0x89, &data).expect("decode");
        assert_eq!(s, r#"8$ ='[\V_"#);
        assert_eq!(consumed, 7);
    }
}
