//! RMCP+ Open Session Request/Response payloads.
//!
//! These are stateless: even if a later RAKP message fails, the exchange
//! does not need to be repeated.

use crate::algo::{
    AuthenticationAlgorithm, ConfidentialityAlgorithm, IntegrityAlgorithm,
};
use crate::error::{Error, Result};
use crate::wire::rakp::StatusCode;
use crate::types::PrivilegeLevel;

// Algorithm payload discriminators (Table 13-9).
const PAYLOAD_AUTHENTICATION: u8 = 0x00;
const PAYLOAD_INTEGRITY: u8 = 0x01;
const PAYLOAD_CONFIDENTIALITY: u8 = 0x02;

/// An Open Session Request. One or more algorithms may be proposed for
/// each of authentication, integrity and confidentiality.
#[derive(Debug, Clone)]
pub(crate) struct OpenSessionReq {
    /// Echoed by the BMC to match responses to requests. Not changed on
    /// retransmit.
    pub tag: u8,
    /// Upper bound for the session; `None` asks for the highest level the
    /// BMC will grant given the proposed algorithms.
    pub max_privilege_level: Option<PrivilegeLevel>,
    /// The ID the BMC should put in packets it sends us. Must be non-zero
    /// to avoid colliding with out-of-session traffic.
    pub remote_console_session_id: u32,
    pub authentication: Vec<AuthenticationAlgorithm>,
    pub integrity: Vec<IntegrityAlgorithm>,
    pub confidentiality: Vec<ConfidentialityAlgorithm>,
}

impl OpenSessionReq {
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag);
        buf.push(self.max_privilege_level.map_or(0x00, |p| p.as_u8() & 0x0F));
        buf.push(0x00);
        buf.push(0x00);
        buf.extend_from_slice(&self.remote_console_session_id.to_le_bytes());

        for algo in &self.authentication {
            encode_algorithm_payload(buf, PAYLOAD_AUTHENTICATION, algo.wire_id());
        }
        for algo in &self.integrity {
            encode_algorithm_payload(buf, PAYLOAD_INTEGRITY, algo.wire_id());
        }
        for algo in &self.confidentiality {
            encode_algorithm_payload(buf, PAYLOAD_CONFIDENTIALITY, algo.wire_id());
        }
    }
}

/// All algorithm payloads are 8 bytes in practice; anything else would
/// break response parsing across the ecosystem.
fn encode_algorithm_payload(buf: &mut Vec<u8>, payload: u8, algorithm: u8) {
    buf.extend_from_slice(&[payload, 0x00, 0x00, 0x08, algorithm & 0x3F, 0x00, 0x00, 0x00]);
}

/// A decoded Open Session Response.
#[derive(Debug, Clone)]
pub(crate) struct OpenSessionRsp {
    pub tag: u8,
    pub status: StatusCode,
    pub max_privilege_level: u8,
    pub remote_console_session_id: u32,
    /// Non-zero when `status` is OK.
    pub managed_system_session_id: u32,
    pub authentication: AuthenticationAlgorithm,
    pub integrity: IntegrityAlgorithm,
    pub confidentiality: ConfidentialityAlgorithm,
}

impl OpenSessionRsp {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        // 8-byte minimum when the status is an error.
        if data.len() < 8 {
            return Err(Error::Decode("open session response too short"));
        }

        let tag = data[0];
        let status = StatusCode(data[1]);
        let max_privilege_level = data[2] & 0x0F;
        let remote_console_session_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        if !status.is_ok() {
            return Ok(Self {
                tag,
                status,
                max_privilege_level,
                remote_console_session_id,
                managed_system_session_id: 0,
                authentication: AuthenticationAlgorithm::None,
                integrity: IntegrityAlgorithm::None,
                confidentiality: ConfidentialityAlgorithm::None,
            });
        }

        if data.len() < 36 {
            return Err(Error::Decode("successful open session response truncated"));
        }

        let managed_system_session_id =
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

        // Selected algorithm sits at byte 4 of each 8-byte block.
        let authentication = AuthenticationAlgorithm::from_wire(data[12 + 4])?;
        let integrity = IntegrityAlgorithm::from_wire(data[20 + 4])?;
        let confidentiality = ConfidentialityAlgorithm::from_wire(data[28 + 4])?;

        Ok(Self {
            tag,
            status,
            max_privilege_level,
            remote_console_session_id,
            managed_system_session_id,
            authentication,
            integrity,
            confidentiality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout_single_proposal() {
        let req = OpenSessionReq {
            tag: 0x07,
            max_privilege_level: Some(PrivilegeLevel::Administrator),
            remote_console_session_id: 1,
            authentication: vec![AuthenticationAlgorithm::HmacSha1],
            integrity: vec![IntegrityAlgorithm::HmacSha1_96],
            confidentiality: vec![ConfidentialityAlgorithm::AesCbc128],
        };

        let mut buf = Vec::new();
        req.encode_into(&mut buf);

        assert_eq!(
            buf,
            [
                0x07, 0x04, 0x00, 0x00, // tag, privilege, reserved
                0x01, 0x00, 0x00, 0x00, // remote console session id
                0x00, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // auth
                0x01, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // integ
                0x02, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // conf
            ]
        );
    }

    #[test]
    fn request_layout_multiple_proposals() {
        let req = OpenSessionReq {
            tag: 0x00,
            max_privilege_level: None,
            remote_console_session_id: 1,
            authentication: vec![
                AuthenticationAlgorithm::HmacSha1,
                AuthenticationAlgorithm::HmacSha256,
            ],
            integrity: vec![IntegrityAlgorithm::HmacSha1_96],
            confidentiality: vec![ConfidentialityAlgorithm::AesCbc128],
        };

        let mut buf = Vec::new();
        req.encode_into(&mut buf);
        assert_eq!(buf.len(), 8 + 4 * 8);
        assert_eq!(buf[1], 0x00); // highest level available
        assert_eq!(buf[12], 0x01);
        assert_eq!(buf[20], 0x03); // second auth proposal
    }

    #[test]
    fn response_round_trip() {
        let data = [
            0x07, 0x00, 0x04, 0x00, // tag, status, privilege, reserved
            0x01, 0x00, 0x00, 0x00, // remote console session id
            0x44, 0x33, 0x22, 0x11, // managed system session id
            0x00, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // auth
            0x01, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // integ
            0x02, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, // conf
        ];

        let rsp = OpenSessionRsp::decode(&data).expect("decode");
        assert_eq!(rsp.tag, 0x07);
        assert!(rsp.status.is_ok());
        assert_eq!(rsp.remote_console_session_id, 1);
        assert_eq!(rsp.managed_system_session_id, 0x11223344);
        assert_eq!(rsp.authentication, AuthenticationAlgorithm::HmacSha1);
        assert_eq!(rsp.integrity, IntegrityAlgorithm::HmacSha1_96);
        assert_eq!(rsp.confidentiality, ConfidentialityAlgorithm::AesCbc128);
    }

    #[test]
    fn error_response_stops_at_eight_bytes() {
        let data = [0x07, 0x12, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let rsp = OpenSessionRsp::decode(&data).expect("decode");
        assert!(!rsp.status.is_ok());
        assert_eq!(rsp.managed_system_session_id, 0);
    }

    #[test]
    fn truncated_success_response_is_rejected() {
        let mut data = vec![0x07, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        data.extend_from_slice(&[0u8; 10]);
        assert!(OpenSessionRsp::decode(&data).is_err());
    }
}
