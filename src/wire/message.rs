//! The IPMI message layer: addressing, network function, command,
//! completion code and the two 2's-complement checksums.

use core::fmt;

use crate::error::{Error, Result};

/// The BMC's slave address on IPMB.
pub(crate) const SLAVE_ADDR_BMC: u8 = 0x20;

/// Software ID of the first remote console, shifted into address form.
pub(crate) const SOFTWARE_ID_REMOTE_CONSOLE: u8 = 0x81;

/// Network function codes (requests; the paired response is `netfn | 1`).
pub mod netfn {
    /// Chassis requests.
    pub const CHASSIS: u8 = 0x00;
    /// Sensor/Event requests.
    pub const SENSOR_EVENT: u8 = 0x04;
    /// Application requests.
    pub const APP: u8 = 0x06;
    /// Storage (SDR repository, SEL, FRU) requests.
    pub const STORAGE: u8 = 0x0A;
    /// Group extension requests; the body carries a defining-body code.
    pub const GROUP: u8 = 0x2C;
    /// OEM/group requests identified by a 3-byte enterprise number.
    pub const OEM_GROUP: u8 = 0x2E;
}

/// The `(network function, command[, body code[, enterprise]])` tuple that
/// uniquely names an IPMI request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Request network function code (even).
    pub netfn: u8,
    /// Command number within the network function.
    pub command: u8,
    /// Defining body code; only meaningful for the Group network function.
    pub body_code: Option<u8>,
    /// IANA enterprise number; only meaningful for the OEM/Group network
    /// function.
    pub enterprise: Option<u32>,
}

impl Operation {
    /// An operation on a plain network function.
    pub const fn new(netfn: u8, command: u8) -> Self {
        Self {
            netfn,
            command,
            body_code: None,
            enterprise: None,
        }
    }

    /// An operation on the Group network function with a defining body.
    pub const fn group(command: u8, body_code: u8) -> Self {
        Self {
            netfn: netfn::GROUP,
            command,
            body_code: Some(body_code),
            enterprise: None,
        }
    }
}

/// Single-byte IPMI status field in responses; `0x00` is normal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    /// Command completed normally.
    pub const NORMAL: CompletionCode = CompletionCode(0x00);
    /// Node busy; the request could not be queued.
    pub const NODE_BUSY: CompletionCode = CompletionCode(0xC0);
    /// Invalid or unrecognised command.
    pub const UNRECOGNISED_COMMAND: CompletionCode = CompletionCode(0xC1);
    /// Request data truncated.
    pub const REQUEST_TRUNCATED: CompletionCode = CompletionCode(0xC6);
    /// Reservation cancelled or invalid reservation ID.
    pub const RESERVATION_CANCELLED: CompletionCode = CompletionCode(0xC5);
    /// Invalid session ID in the request.
    pub const INVALID_SESSION_ID: CompletionCode = CompletionCode(0x87);
    /// Unspecified error.
    pub const UNSPECIFIED: CompletionCode = CompletionCode(0xFF);

    /// Whether this is the normal (success) code.
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }

    fn description(self) -> &'static str {
        match self.0 {
            0x00 => "normal",
            0xC0 => "node busy",
            0xC1 => "unrecognised command",
            0xC3 => "timeout while processing",
            0xC5 => "reservation cancelled",
            0xC6 => "request truncated",
            0xC7 => "request length invalid",
            0xC9 => "parameter out of range",
            0xCC => "invalid request field",
            0xD4 => "insufficient privilege",
            0x87 => "invalid session id",
            0xFF => "unspecified",
            _ => "unknown",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}({})", self.0, self.description())
    }
}

impl fmt::Debug for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 2's-complement checksum: the byte that makes the covered range sum to
/// zero mod 256.
pub(crate) fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

/// Append an IPMI request message for `op` with the given body. `rq_seq`
/// is the 6-bit in-message sequence number.
pub(crate) fn encode_request(buf: &mut Vec<u8>, op: &Operation, rq_seq: u8, body: &[u8]) {
    let start = buf.len();

    buf.push(SLAVE_ADDR_BMC);
    buf.push(op.netfn << 2); // target LUN 0
    let cks1 = checksum(&buf[start..]);
    buf.push(cks1);

    let second = buf.len();
    buf.push(SOFTWARE_ID_REMOTE_CONSOLE);
    buf.push((rq_seq & 0x3F) << 2); // source LUN 0
    buf.push(op.command);
    if let Some(code) = op.body_code {
        buf.push(code);
    }
    if let Some(enterprise) = op.enterprise {
        let e = enterprise.to_le_bytes();
        buf.extend_from_slice(&e[..3]);
    }
    buf.extend_from_slice(body);
    let cks2 = checksum(&buf[second..]);
    buf.push(cks2);
}

/// Decode and validate an IPMI response message, returning the completion
/// code and the body bytes.
pub(crate) fn decode_response<'a>(
    msg: &'a [u8],
    op: &Operation,
    expected_rq_seq: u8,
) -> Result<(CompletionCode, &'a [u8])> {
    if msg.len() < 8 {
        return Err(Error::Decode("IPMI response too short"));
    }

    // Header checksum covers the first two bytes.
    if msg[0]
        .wrapping_add(msg[1])
        .wrapping_add(msg[2])
        != 0
    {
        return Err(Error::Decode("invalid IPMI header checksum"));
    }

    // Body checksum covers everything from the source address.
    let body_sum = msg[3..]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    if body_sum != 0 {
        return Err(Error::Decode("invalid IPMI body checksum"));
    }

    // Addresses swap on the return path: we are the target.
    if msg[0] != SOFTWARE_ID_REMOTE_CONSOLE {
        return Err(Error::Protocol("response not addressed to us"));
    }
    if msg[1] >> 2 != (op.netfn | 1) {
        return Err(Error::Protocol("unexpected response network function"));
    }
    if msg[3] != SLAVE_ADDR_BMC {
        return Err(Error::Protocol("unexpected responder address"));
    }
    if msg[4] >> 2 != (expected_rq_seq & 0x3F) {
        return Err(Error::Protocol("response sequence mismatch"));
    }
    if msg[5] != op.command {
        return Err(Error::Protocol("unexpected response command"));
    }

    let code = CompletionCode(msg[6]);
    let mut data_start = 7;

    // The completion code precedes the group/enterprise fields in
    // responses.
    if let Some(body_code) = op.body_code {
        if msg.len() < data_start + 2 {
            return Err(Error::Decode("group response missing body code"));
        }
        if msg[data_start] != body_code {
            return Err(Error::Protocol("group response body code mismatch"));
        }
        data_start += 1;
    }
    if let Some(enterprise) = op.enterprise {
        if msg.len() < data_start + 4 {
            return Err(Error::Decode("OEM response missing enterprise"));
        }
        let e = u32::from_le_bytes([
            msg[data_start],
            msg[data_start + 1],
            msg[data_start + 2],
            0,
        ]);
        if e != enterprise {
            return Err(Error::Protocol("OEM response enterprise mismatch"));
        }
        data_start += 3;
    }

    Ok((code, &msg[data_start..msg.len() - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_vectors() {
        assert_eq!(checksum(&[0, 1, 2, 0xE]), 0xEF);
        assert_eq!(checksum(&[0x20, 0x18]), 0xC8);
        assert_eq!(
            checksum(&[
                0x80, 0x15, 0x1, 0x8, 0x30, 0x33, 0x31, 0x35, 0x31, 0x30, 0x33, 0x30, 0x2, 0x9,
                0x30, 0x33, 0x35, 0x31, 0x2d, 0x33, 0x32, 0x31, 0x30,
            ]),
            0x0E
        );
        assert_eq!(checksum(&[0x81, 0, 0x38, 0x0e, 0x4]), 0x35);
        assert_eq!(checksum(&[0x81, 0, 0x38, 0x8e, 0x4]), 0xb5);
    }

    #[test]
    fn encode_app_request() {
        let mut buf = Vec::new();
        encode_request(
            &mut buf,
            &Operation::new(netfn::APP, 0x37),
            0,
            &[],
        );
        assert_eq!(buf, [0x20, 0x18, 0xC8, 0x81, 0x00, 0x37, 0x48]);
    }

    #[test]
    fn encode_group_request() {
        let mut buf = Vec::new();
        encode_request(&mut buf, &Operation::group(0x01, 0xDC), 0, &[0x01]);
        // netfn 0x2C << 2 = 0xB0; second checksum over 81 00 01 DC 01.
        assert_eq!(buf[..3], [0x20, 0xB0, 0x30]);
        assert_eq!(buf[3..8], [0x81, 0x00, 0x01, 0xDC, 0x01]);
        assert_eq!(buf[8], checksum(&buf[3..8]));
    }

    #[test]
    fn decode_app_response() {
        // Get Device ID style response with 3 data bytes.
        let response = [
            0x81, 0x1C, 0x63, // target (us), netfn 0x07 | lun, checksum
            0x20, 0x00, 0x01, // source (BMC), seq | lun, command
            0x00, // completion code
            0x20, 0x01, 0x02, // data
            0xBC, // body checksum
        ];

        let (code, data) =
            decode_response(&response, &Operation::new(netfn::APP, 0x01), 0).expect("decode");
        assert!(code.is_normal());
        assert_eq!(data, [0x20, 0x01, 0x02]);
    }

    #[test]
    fn decode_rejects_corrupt_body() {
        let mut response = vec![
            0x81, 0x1C, 0x63, 0x20, 0x00, 0x01, 0x00, 0x20, 0x01, 0x02, 0xBC,
        ];
        response[7] ^= 0xFF;

        let err =
            decode_response(&response, &Operation::new(netfn::APP, 0x01), 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn decode_group_response_strips_body_code() {
        let op = Operation::group(0x9F, 0xDC);
        // target 0x24? -- use our fixed addressing: us 0x81, BMC 0x20.
        let mut msg = vec![0x81, (op.netfn | 1) << 2];
        msg.push(checksum(&msg));
        let second = msg.len();
        msg.extend_from_slice(&[0x20, 0x3F << 2, 0x9F, 0x00, 0xDC, 0x01, 0x02]);
        let cks = checksum(&msg[second..]);
        msg.push(cks);

        let (code, data) = decode_response(&msg, &op, 0x3F).expect("decode");
        assert!(code.is_normal());
        assert_eq!(data, [0x01, 0x02]);
    }

    #[test]
    fn decode_empty_body_is_valid() {
        // Chassis Control response: normal completion code, no body.
        let op = Operation::new(netfn::CHASSIS, 0x02);
        let mut msg = vec![0x81, (op.netfn | 1) << 2];
        msg.push(checksum(&msg));
        let second = msg.len();
        msg.extend_from_slice(&[0x20, 0x00, 0x02, 0x00]);
        let cks = checksum(&msg[second..]);
        msg.push(cks);

        let (code, data) = decode_response(&msg, &op, 0).expect("decode");
        assert!(code.is_normal());
        assert!(data.is_empty());
    }

    #[test]
    fn completion_code_display() {
        assert_eq!(CompletionCode::NODE_BUSY.to_string(), "0xc0(node busy)");
        assert_eq!(CompletionCode::NORMAL.to_string(), "0x00(normal)");
    }
}
