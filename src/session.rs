//! RMCP+ session establishment and in-session command dispatch.
//!
//! Establishment walks Open Session -> RAKP1/2 -> RAKP3/4, negotiating
//! the algorithm triple, deriving the SIK and the K1/K2 key material, and
//! mutually authenticating both ends. Any verification failure is
//! terminal: the constructor returns an error and no half-open session
//! exists.

use std::time::Instant;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::algo::{
    AuthenticationAlgorithm, ConfidentialityAlgorithm, IntegrityAlgorithm, SessionKeys,
};
use crate::backoff::Backoff;
use crate::commands::app::{
    CloseSession, GetChannelAuthCapabilities, GetDeviceId, GetSelfTestResults, GetSystemGuid,
    SetSessionPrivilegeLevel, CHANNEL_PRESENT_INTERFACE,
};
use crate::commands::chassis::{ChassisControlCommand, GetChassisStatus};
use crate::commands::storage::{
    GetSdr, GetSdrRepositoryInfo, GetSensorReading, ReserveSdrRepository, SdrChunk,
    SdrRepositoryInfo, SensorReading,
};
use crate::commands::Command;
use crate::connection::{typed_output, V2Sessionless, PER_ATTEMPT_TIMEOUT};
use crate::crypto::{ct_eq, DigestBuf, SecretBytes};
use crate::error::{Error, Result};
use crate::sensor::RecordId;
use crate::types::{
    ChannelAuthCapabilities, ChassisControl, ChassisStatus, DeviceId, PrivilegeLevel,
    RawResponse, SelfTestResult, SystemGuid,
};
use crate::wire::message::CompletionCode;
use crate::wire::open_session::{OpenSessionReq, OpenSessionRsp};
use crate::wire::rakp::{
    rakp2_auth_code, rakp3_auth_code, rakp4_integrity_check_value, role_byte,
    session_integrity_key, RakpMessage1, RakpMessage2, RakpMessage3, RakpMessage4,
};
use crate::wire::{message, rmcp, select_session, v2, SessionWrapper};

/// The session ID we ask the BMC to address us by. Any non-zero value
/// works; each side picks its own ID in v2.0.
const REMOTE_CONSOLE_SESSION_ID: u32 = 1;

/// Configuration for RMCP+ session establishment.
#[derive(Debug)]
pub struct SessionOpts {
    username: Vec<u8>,
    password: SecretBytes,
    bmc_key: Option<SecretBytes>,
    max_privilege_level: PrivilegeLevel,
    privilege_level_lookup: bool,
    authentication_algorithms: Vec<AuthenticationAlgorithm>,
    integrity_algorithms: Vec<IntegrityAlgorithm>,
    confidentiality_algorithms: Vec<ConfidentialityAlgorithm>,
}

impl SessionOpts {
    /// Options for a username/password login at Administrator privilege
    /// with the default algorithm proposals (HMAC-SHA1 / HMAC-SHA1-96 /
    /// AES-CBC-128).
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        Self {
            username: username.as_ref().as_bytes().to_vec(),
            password: SecretBytes::new(password.as_ref().as_bytes().to_vec()),
            bmc_key: None,
            max_privilege_level: PrivilegeLevel::Administrator,
            privilege_level_lookup: false,
            authentication_algorithms: vec![AuthenticationAlgorithm::HmacSha1],
            integrity_algorithms: vec![IntegrityAlgorithm::HmacSha1_96],
            confidentiality_algorithms: vec![ConfidentialityAlgorithm::AesCbc128],
        }
    }

    /// Replace the username with raw bytes. The protocol treats
    /// usernames as bytes; most deployments use ASCII.
    pub fn username_bytes(mut self, username: impl Into<Vec<u8>>) -> Self {
        self.username = username.into();
        self
    }

    /// Replace the password with raw bytes (up to 20).
    pub fn password_bytes(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = SecretBytes::new(password.into());
        self
    }

    /// Set the BMC key (`Kg`) for two-key login. When unset, the
    /// password doubles as the SIK key input.
    pub fn bmc_key(mut self, kg: impl Into<Vec<u8>>) -> Self {
        self.bmc_key = Some(SecretBytes::new(kg.into()));
        self
    }

    /// Set the maximum privilege level for the session.
    pub fn max_privilege_level(mut self, level: PrivilegeLevel) -> Self {
        self.max_privilege_level = level;
        self
    }

    /// When true, the BMC looks up the user entry by username *and*
    /// privilege level; when false, by username alone. With an empty
    /// username, true effectively requests role-based login.
    pub fn privilege_level_lookup(mut self, lookup: bool) -> Self {
        self.privilege_level_lookup = lookup;
        self
    }

    /// Replace the proposed authentication algorithms.
    pub fn authentication_algorithms(mut self, algos: Vec<AuthenticationAlgorithm>) -> Self {
        self.authentication_algorithms = algos;
        self
    }

    /// Replace the proposed integrity algorithms.
    pub fn integrity_algorithms(mut self, algos: Vec<IntegrityAlgorithm>) -> Self {
        self.integrity_algorithms = algos;
        self
    }

    /// Replace the proposed confidentiality algorithms.
    pub fn confidentiality_algorithms(mut self, algos: Vec<ConfidentialityAlgorithm>) -> Self {
        self.confidentiality_algorithms = algos;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.username.len() > 16 {
            return Err(Error::InvalidArgument("username longer than 16 bytes"));
        }
        if self.username.contains(&0x00) {
            return Err(Error::InvalidArgument("username must not contain NUL"));
        }
        if self.password.expose().len() > 20 {
            return Err(Error::InvalidArgument("password longer than 20 bytes"));
        }
        if self.authentication_algorithms.is_empty()
            || self.integrity_algorithms.is_empty()
            || self.confidentiality_algorithms.is_empty()
        {
            return Err(Error::InvalidArgument(
                "at least one algorithm must be proposed per class",
            ));
        }
        Ok(())
    }
}

/// One inbound/outbound pair of 32-bit session sequence numbers. Held as
/// 64-bit internally so a session can never observe a wrap.
#[derive(Debug, Clone, Copy, Default)]
struct SequencePair {
    inbound: u64,
    outbound: u64,
}

/// An established RMCP+ session.
///
/// The session borrows its parent session-less connection's transport and
/// buffers; closing the session is a protocol act, not a resource
/// release, so the transport survives it for further session-less use or
/// a fresh establishment.
pub struct V2Session<'c> {
    conn: &'c mut V2Sessionless,

    /// Our session ID: what the BMC puts in packets it sends us.
    local_id: u32,
    /// The BMC's session ID: what we put in packets we send it.
    remote_id: u32,

    /// Kept for the session's lifetime; K1/K2 derive from it and further
    /// key material could be requested.
    #[allow(dead_code)]
    sik: Zeroizing<DigestBuf>,
    keys: SessionKeys,

    authentication: AuthenticationAlgorithm,
    integrity: IntegrityAlgorithm,
    confidentiality: ConfidentialityAlgorithm,

    authenticated_seq: SequencePair,
    unauthenticated_seq: SequencePair,

    bmc_guid: [u8; 16],
    rq_seq: u8,
    open: bool,
}

impl std::fmt::Debug for V2Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2Session")
            .field("local_id", &self.local_id)
            .field("remote_id", &self.remote_id)
            .field("authentication", &self.authentication)
            .field("integrity", &self.integrity)
            .field("confidentiality", &self.confidentiality)
            .field("bmc_guid", &self.bmc_guid)
            .field("rq_seq", &self.rq_seq)
            .field("open", &self.open)
            .finish()
    }
}

impl V2Sessionless {
    /// Establish an RMCP+ session. On failure no session exists; the
    /// connection remains usable for session-less commands or another
    /// attempt.
    pub fn new_session<'c>(
        &'c mut self,
        deadline: Instant,
        opts: &SessionOpts,
    ) -> Result<V2Session<'c>> {
        let result = establish(self, deadline, opts);
        crate::observe::record_session_open("2.0", result.is_ok());
        result
    }
}

fn establish<'c>(
    conn: &'c mut V2Sessionless,
    deadline: Instant,
    opts: &SessionOpts,
) -> Result<V2Session<'c>> {
    opts.validate()?;

    let role = role_byte(opts.privilege_level_lookup, opts.max_privilege_level);

    // --- Open Session ---
    let open_req = OpenSessionReq {
        tag: conn.take_tag(),
        max_privilege_level: Some(opts.max_privilege_level),
        remote_console_session_id: REMOTE_CONSOLE_SESSION_ID,
        authentication: opts.authentication_algorithms.clone(),
        integrity: opts.integrity_algorithms.clone(),
        confidentiality: opts.confidentiality_algorithms.clone(),
    };

    let mut payload = Vec::with_capacity(64);
    open_req.encode_into(&mut payload);
    let rsp_payload = conn.send_session_payload(
        deadline,
        v2::payload_type::OPEN_SESSION_REQUEST,
        v2::payload_type::OPEN_SESSION_RESPONSE,
        &payload,
    )?;
    let open_rsp = OpenSessionRsp::decode(&rsp_payload)?;

    if open_rsp.tag != open_req.tag {
        return Err(Error::Protocol("open session response tag mismatch"));
    }
    if !open_rsp.status.is_ok() {
        return Err(Error::protocol_owned(format!(
            "open session rejected by managed system: {}",
            open_rsp.status
        )));
    }
    if open_rsp.remote_console_session_id != REMOTE_CONSOLE_SESSION_ID {
        return Err(Error::Protocol("open session echoed wrong session id"));
    }
    if open_rsp.managed_system_session_id == 0 {
        return Err(Error::Protocol("managed system chose the null session id"));
    }
    if !opts.authentication_algorithms.contains(&open_rsp.authentication)
        || !opts.integrity_algorithms.contains(&open_rsp.integrity)
        || !opts.confidentiality_algorithms.contains(&open_rsp.confidentiality)
    {
        return Err(Error::Unsupported(
            "managed system selected an algorithm we did not propose",
        ));
    }

    let auth = open_rsp.authentication;
    let managed_system_session_id = open_rsp.managed_system_session_id;

    // --- RAKP Message 1 / 2 ---
    let mut remote_console_random = [0u8; 16];
    rand::rng().fill_bytes(&mut remote_console_random);

    let rakp1 = RakpMessage1 {
        tag: conn.take_tag(),
        managed_system_session_id,
        remote_console_random,
        privilege_level_lookup: opts.privilege_level_lookup,
        max_privilege_level: opts.max_privilege_level,
        username: &opts.username,
    };

    payload.clear();
    rakp1.encode_into(&mut payload);
    let rsp_payload = conn.send_session_payload(
        deadline,
        v2::payload_type::RAKP_1,
        v2::payload_type::RAKP_2,
        &payload,
    )?;
    let rakp2 = RakpMessage2::decode(&rsp_payload, auth)?;

    if rakp2.tag != rakp1.tag {
        return Err(Error::Protocol("RAKP message 2 tag mismatch"));
    }
    if !rakp2.status.is_ok() {
        return Err(Error::protocol_owned(format!(
            "RAKP message 2 returned non-OK status: {}",
            rakp2.status
        )));
    }
    if rakp2.remote_console_session_id != REMOTE_CONSOLE_SESSION_ID {
        return Err(Error::Protocol("RAKP message 2 session id mismatch"));
    }

    let user_key = Zeroizing::new(opts.password.to_user_key());
    let kg_key = Zeroizing::new(match &opts.bmc_key {
        Some(kg) => kg.to_user_key(),
        None => *user_key,
    });

    let expected_auth_code = rakp2_auth_code(
        auth,
        &*user_key,
        REMOTE_CONSOLE_SESSION_ID,
        managed_system_session_id,
        &remote_console_random,
        &rakp2.managed_system_random,
        &rakp2.managed_system_guid,
        role,
        &opts.username,
    )?;
    if !ct_eq(expected_auth_code.as_slice(), rakp2.auth_code.as_slice()) {
        // the BMC derived the auth code from a different password
        return Err(Error::AuthenticationFailed(
            "RAKP message 2 auth code mismatch",
        ));
    }

    let sik = Zeroizing::new(session_integrity_key(
        auth,
        &*kg_key,
        &remote_console_random,
        &rakp2.managed_system_random,
        role,
        &opts.username,
    )?);
    let keys = SessionKeys::derive(auth, &sik)?;

    // --- RAKP Message 3 / 4 ---
    let rakp3_code = rakp3_auth_code(
        auth,
        &*user_key,
        &rakp2.managed_system_random,
        REMOTE_CONSOLE_SESSION_ID,
        role,
        &opts.username,
    )?;
    let rakp3 = RakpMessage3 {
        tag: conn.take_tag(),
        status: crate::wire::rakp::StatusCode::OK,
        managed_system_session_id,
        auth_code: rakp3_code.as_slice(),
    };

    payload.clear();
    rakp3.encode_into(&mut payload);
    let rsp_payload = conn.send_session_payload(
        deadline,
        v2::payload_type::RAKP_3,
        v2::payload_type::RAKP_4,
        &payload,
    )?;
    let rakp4 = RakpMessage4::decode(&rsp_payload, auth)?;

    if rakp4.tag != rakp3.tag {
        return Err(Error::Protocol("RAKP message 4 tag mismatch"));
    }
    if !rakp4.status.is_ok() {
        return Err(Error::protocol_owned(format!(
            "RAKP message 4 returned non-OK status: {}",
            rakp4.status
        )));
    }
    if rakp4.remote_console_session_id != REMOTE_CONSOLE_SESSION_ID {
        return Err(Error::Protocol("RAKP message 4 session id mismatch"));
    }

    let expected_icv = rakp4_integrity_check_value(
        auth,
        &sik,
        &remote_console_random,
        managed_system_session_id,
        &rakp2.managed_system_guid,
    )?;
    if !ct_eq(expected_icv.as_slice(), rakp4.integrity_check_value.as_slice()) {
        return Err(Error::AuthenticationFailed(
            "RAKP message 4 integrity check value mismatch",
        ));
    }

    Ok(V2Session {
        conn,
        local_id: REMOTE_CONSOLE_SESSION_ID,
        remote_id: managed_system_session_id,
        sik,
        keys,
        authentication: auth,
        integrity: open_rsp.integrity,
        confidentiality: open_rsp.confidentiality,
        authenticated_seq: SequencePair::default(),
        unauthenticated_seq: SequencePair::default(),
        bmc_guid: rakp2.managed_system_guid,
        rq_seq: 0,
        open: true,
    })
}

impl V2Session<'_> {
    /// Our session ID (what the BMC addresses us by).
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// The BMC's session ID (what we address it by).
    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    /// The negotiated authentication algorithm.
    pub fn authentication_algorithm(&self) -> AuthenticationAlgorithm {
        self.authentication
    }

    /// The negotiated integrity algorithm.
    pub fn integrity_algorithm(&self) -> IntegrityAlgorithm {
        self.integrity
    }

    /// The negotiated confidentiality algorithm.
    pub fn confidentiality_algorithm(&self) -> ConfidentialityAlgorithm {
        self.confidentiality
    }

    /// The BMC's GUID, as sent in RAKP message 2. Opaque bytes.
    pub fn bmc_guid(&self) -> [u8; 16] {
        self.bmc_guid
    }

    /// The IPMI version of the connection, for display purposes.
    pub fn version(&self) -> &'static str {
        "2.0"
    }

    fn allocate_rq_seq(&mut self) -> u8 {
        let seq = self.rq_seq;
        self.rq_seq = (self.rq_seq + 1) & 0x3F;
        seq
    }

    fn security(&self) -> v2::PacketSecurity<'_> {
        v2::PacketSecurity {
            integrity: self.integrity,
            confidentiality: self.confidentiality,
            keys: &self.keys,
        }
    }

    /// Send a command inside the session and return its raw response.
    /// Non-normal completion codes are valid responses, not errors.
    pub fn send_command<C: Command>(&mut self, deadline: Instant, cmd: &C) -> Result<RawResponse> {
        let op = cmd.operation();
        let start = Instant::now();
        let result = self.send_command_inner(deadline, cmd);
        match &result {
            Ok(resp) => {
                crate::observe::record_ok("2.0", op.netfn, op.command, start.elapsed(), resp.code.0)
            }
            Err(err) => {
                crate::observe::record_err("2.0", op.netfn, op.command, start.elapsed(), err)
            }
        }
        result
    }

    fn send_command_inner<C: Command>(
        &mut self,
        deadline: Instant,
        cmd: &C,
    ) -> Result<RawResponse> {
        if !self.open {
            return Err(Error::Protocol("session is closed"));
        }

        let op = cmd.operation();
        let rq_seq = self.allocate_rq_seq();

        self.conn.payload_buf.clear();
        let mut body = Vec::new();
        cmd.encode_request(&mut body);
        message::encode_request(&mut self.conn.payload_buf, &op, rq_seq, &body);

        // The outbound sequence number advances on every transmit,
        // retransmits included, so the packet is re-wrapped per attempt.
        let mut backoff = Backoff::new();
        let response = loop {
            let sequence = self.next_outbound_sequence();

            self.conn.packet_buf.clear();
            v2::encode_packet(
                &mut self.conn.packet_buf,
                v2::payload_type::IPMI,
                self.remote_id,
                sequence,
                &self.conn.payload_buf,
                Some(&v2::PacketSecurity {
                    integrity: self.integrity,
                    confidentiality: self.confidentiality,
                    keys: &self.keys,
                }),
            )?;
            crate::observe::trace_packet("v2 session request", &self.conn.packet_buf);

            let attempt_deadline = deadline.min(Instant::now() + PER_ATTEMPT_TIMEOUT);
            match self
                .conn
                .transport
                .send_recv(attempt_deadline, &self.conn.packet_buf)
            {
                Ok(response) => break response.to_vec(),
                Err(e @ (Error::Timeout | Error::Io(_))) => match backoff.next_delay(deadline) {
                    Some(delay) => std::thread::sleep(delay),
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        };
        crate::observe::trace_packet("v2 session response", &response);

        let (class, rest) = rmcp::decode_header(&response)?;
        if class != rmcp::Class::Ipmi {
            return Err(Error::Decode("expected an IPMI-class packet"));
        }
        if select_session(rest)? != SessionWrapper::V2 {
            return Err(Error::Decode("expected a v2.0 session wrapper"));
        }

        let decoded = v2::decode_packet(rest, Some(&self.security()))?;
        if decoded.payload_type != v2::payload_type::IPMI {
            return Err(Error::Protocol("unexpected RMCP+ payload type"));
        }
        // Some BMCs echo their own ID instead of ours; accept either.
        if decoded.session_id != self.local_id && decoded.session_id != self.remote_id {
            return Err(Error::Protocol("response session id mismatch"));
        }
        self.record_inbound_sequence(decoded.authenticated, decoded.sequence);

        let (code, data) = message::decode_response(&decoded.payload, &op, rq_seq)?;
        Ok(RawResponse {
            code,
            data: data.to_vec(),
        })
    }

    fn next_outbound_sequence(&mut self) -> u32 {
        let pair = if self.integrity == IntegrityAlgorithm::None {
            &mut self.unauthenticated_seq
        } else {
            &mut self.authenticated_seq
        };
        pair.outbound += 1;
        pair.outbound as u32
    }

    fn record_inbound_sequence(&mut self, authenticated: bool, sequence: u32) {
        let pair = if authenticated {
            &mut self.authenticated_seq
        } else {
            &mut self.unauthenticated_seq
        };
        pair.inbound = u64::from(sequence);
    }

    /// Send a command and decode its typed output, promoting non-normal
    /// completion codes to errors.
    pub fn execute<C: Command>(&mut self, deadline: Instant, cmd: &C) -> Result<C::Output> {
        let resp = self.send_command(deadline, cmd)?;
        typed_output(cmd, resp)
    }

    /// Close the session by sending Close Session. Best-effort: the
    /// session is unusable afterwards whatever the BMC says, and a
    /// timeout is reported as success (the BMC reaps idle sessions
    /// itself).
    pub fn close(mut self, deadline: Instant) -> Result<()> {
        let cmd = CloseSession {
            id: self.remote_id,
            handle: 0,
        };
        let result = self.send_command(deadline, &cmd);
        self.open = false;

        let result = match result {
            Ok(resp)
                if resp.code.is_normal() || resp.code == CompletionCode::INVALID_SESSION_ID =>
            {
                Ok(())
            }
            Ok(resp) => Err(Error::CompletionCode { code: resp.code }),
            Err(Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        };
        crate::observe::record_session_close("2.0", result.is_ok());
        result
    }

    /// Session keepalive: Get Channel Authentication Capabilities,
    /// tolerating BMCs that reply with a normal completion code and an
    /// empty body.
    pub fn keepalive(&mut self, deadline: Instant) -> Result<()> {
        match self.get_channel_auth_capabilities(deadline) {
            Ok(_) => Ok(()),
            Err(Error::SuccessfulEmptyResponse) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `Get Channel Authentication Capabilities` for the present
    /// interface.
    pub fn get_channel_auth_capabilities(
        &mut self,
        deadline: Instant,
    ) -> Result<ChannelAuthCapabilities> {
        self.execute(
            deadline,
            &GetChannelAuthCapabilities::new(
                CHANNEL_PRESENT_INTERFACE,
                PrivilegeLevel::Administrator,
            ),
        )
    }

    /// `Get Device ID`.
    pub fn get_device_id(&mut self, deadline: Instant) -> Result<DeviceId> {
        self.execute(deadline, &GetDeviceId)
    }

    /// `Get Self Test Results`.
    pub fn get_self_test_results(&mut self, deadline: Instant) -> Result<SelfTestResult> {
        self.execute(deadline, &GetSelfTestResults)
    }

    /// `Get System GUID`.
    pub fn get_system_guid(&mut self, deadline: Instant) -> Result<SystemGuid> {
        self.execute(deadline, &GetSystemGuid)
    }

    /// `Get Chassis Status`.
    pub fn get_chassis_status(&mut self, deadline: Instant) -> Result<ChassisStatus> {
        self.execute(deadline, &GetChassisStatus)
    }

    /// `Chassis Control`, e.g. power the system on or off.
    pub fn chassis_control(&mut self, deadline: Instant, control: ChassisControl) -> Result<()> {
        self.execute(deadline, &ChassisControlCommand { control })
    }

    /// `Set Session Privilege Level`; returns the new operating level.
    pub fn set_session_privilege_level(
        &mut self,
        deadline: Instant,
        level: PrivilegeLevel,
    ) -> Result<u8> {
        self.execute(deadline, &SetSessionPrivilegeLevel { level })
    }

    /// `Get SDR Repository Info`.
    pub fn get_sdr_repository_info(&mut self, deadline: Instant) -> Result<SdrRepositoryInfo> {
        self.execute(deadline, &GetSdrRepositoryInfo)
    }

    /// `Reserve SDR Repository`; the reservation licences partial reads.
    pub fn reserve_sdr_repository(&mut self, deadline: Instant) -> Result<u16> {
        self.execute(deadline, &ReserveSdrRepository)
    }

    /// `Get SDR` partial read.
    pub fn get_sdr(
        &mut self,
        deadline: Instant,
        reservation_id: u16,
        record_id: RecordId,
        offset: u8,
        length: u8,
    ) -> Result<SdrChunk> {
        self.execute(
            deadline,
            &GetSdr {
                reservation_id,
                record_id,
                offset,
                length,
            },
        )
    }

    /// `Get Sensor Reading` for a sensor number from the SDR repository.
    pub fn get_sensor_reading(&mut self, deadline: Instant, number: u8) -> Result<SensorReading> {
        self.execute(deadline, &GetSensorReading { number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::time::Duration;

    use crate::test_support::{
        bmc_security, handshake_script, respond_in_session, wrap_v2_plain, Script,
        BMC_GUID as MS_GUID, BMC_SESSION_ID as MS_SESSION_ID,
    };

    const AUTH: AuthenticationAlgorithm = AuthenticationAlgorithm::HmacSha1;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn short_deadline() -> Instant {
        Instant::now() + Duration::from_millis(50)
    }

    #[test]
    fn establishes_and_sends_encrypted_commands() {
        let (script, state) = handshake_script(b"PASSWORD");
        let script = script.expect({
            let state = Rc::clone(&state);
            move |request| {
                let data = [
                    0x20, 0x81, 0x03, 0x45, 0x02, 0xBF, 0x4C, 0x1C, 0x00, 0x42, 0x32, 0x01,
                    0x00, 0x00, 0x00,
                ];
                respond_in_session(&state, request, 0x00, &data)
            }
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let opts = SessionOpts::new("admin", "PASSWORD");
        let mut session = conn.new_session(far_deadline(), &opts).expect("establish");

        assert_eq!(session.local_id(), 1);
        assert_eq!(session.remote_id(), MS_SESSION_ID);
        assert_eq!(session.authentication_algorithm(), AUTH);
        assert_eq!(
            session.integrity_algorithm(),
            IntegrityAlgorithm::HmacSha1_96
        );
        assert_eq!(
            session.confidentiality_algorithm(),
            ConfidentialityAlgorithm::AesCbc128
        );
        assert_eq!(session.bmc_guid(), MS_GUID);

        let id = session.get_device_id(far_deadline()).expect("device id");
        assert_eq!(id.manufacturer_id, 7244);

        // in-session packet carried the BMC's session id and sequence 1
        let sent = script.request(3);
        assert_eq!(&sent[6..10], &MS_SESSION_ID.to_le_bytes());
        assert_eq!(&sent[10..14], &1u32.to_le_bytes());
        assert!(script.exhausted());
    }

    #[test]
    fn wrong_password_fails_rakp2() {
        let (script, _state) = handshake_script(b"SOMETHING ELSE");

        let mut conn = V2Sessionless::with_transport(script.transport());
        let opts = SessionOpts::new("admin", "PASSWORD");
        let err = conn.new_session(far_deadline(), &opts).unwrap_err();

        assert!(matches!(err, Error::AuthenticationFailed(_)));
        // the handshake stops before RAKP 3
        assert_eq!(script.requests_sent(), 2);
    }

    #[test]
    fn open_session_tag_mismatch_is_fatal() {
        let script = Script::new().expect(|request| {
            let payload = &request[16..];
            let tag = payload[0].wrapping_add(1);
            let mut rsp = vec![tag, 0x00, 0x04, 0x00];
            rsp.extend_from_slice(&1u32.to_le_bytes());
            rsp.extend_from_slice(&MS_SESSION_ID.to_le_bytes());
            rsp.extend_from_slice(&[0x00, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            rsp.extend_from_slice(&[0x01, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            rsp.extend_from_slice(&[0x02, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            Ok(wrap_v2_plain(
                v2::payload_type::OPEN_SESSION_RESPONSE,
                0,
                0,
                &rsp,
            ))
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let err = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn open_session_error_status_is_fatal() {
        let script = Script::new().expect(|request| {
            let payload = &request[16..];
            let mut rsp = vec![payload[0], 0x12, 0x00, 0x00]; // no matching cipher suite
            rsp.extend_from_slice(&1u32.to_le_bytes());
            Ok(wrap_v2_plain(
                v2::payload_type::OPEN_SESSION_RESPONSE,
                0,
                0,
                &rsp,
            ))
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let err = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolOwned(_)));
    }

    #[test]
    fn retransmit_advances_outbound_sequence() {
        let (script, state) = handshake_script(b"PASSWORD");
        let script = script.timeout().expect({
            let state = Rc::clone(&state);
            move |request| {
                // the retransmitted packet must carry sequence 2
                assert_eq!(&request[10..14], &2u32.to_le_bytes());
                let data = [0x55, 0x00];
                respond_in_session(&state, request, 0x00, &data)
            }
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let mut session = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .expect("establish");

        let result = session
            .get_self_test_results(far_deadline())
            .expect("self test");
        assert!(matches!(result, SelfTestResult::Passed));

        // first attempt sequence 1, retransmit sequence 2
        assert_eq!(&script.request(3)[10..14], &1u32.to_le_bytes());
        assert_eq!(&script.request(4)[10..14], &2u32.to_le_bytes());
    }

    #[test]
    fn close_session_sends_remote_id() {
        let (script, state) = handshake_script(b"PASSWORD");
        let script = script.expect({
            let state = Rc::clone(&state);
            move |request| {
                let st = state.borrow();
                let sec = bmc_security(&st);
                let (_, rest) = rmcp::decode_header(request)?;
                let decoded = v2::decode_packet(rest, Some(&sec))?;
                // Close Session body is the managed system's id
                assert_eq!(decoded.payload[5], 0x3C);
                assert_eq!(&decoded.payload[6..10], &MS_SESSION_ID.to_le_bytes());
                drop(st);
                respond_in_session(&state, request, 0x00, &[])
            }
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let session = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .expect("establish");
        session.close(far_deadline()).expect("close");
    }

    #[test]
    fn close_session_timeout_is_best_effort() {
        let (script, _state) = handshake_script(b"PASSWORD");
        let script = script.timeout();

        let mut conn = V2Sessionless::with_transport(script.transport());
        let session = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .expect("establish");

        // the deadline expires before a retry fires; the session is
        // closed regardless
        session.close(short_deadline()).expect("close");
    }

    #[test]
    fn keepalive_tolerates_empty_response() {
        let (script, state) = handshake_script(b"PASSWORD");
        let script = script.expect({
            let state = Rc::clone(&state);
            move |request| respond_in_session(&state, request, 0x00, &[])
        });

        let mut conn = V2Sessionless::with_transport(script.transport());
        let mut session = conn
            .new_session(far_deadline(), &SessionOpts::new("admin", "PASSWORD"))
            .expect("establish");

        session.keepalive(far_deadline()).expect("keepalive");
    }

    #[test]
    fn opts_validation() {
        let mut conn = V2Sessionless::with_transport(Script::new().transport());

        let opts = SessionOpts::new("a-very-long-username!", "PASSWORD");
        assert!(matches!(
            conn.new_session(far_deadline(), &opts),
            Err(Error::InvalidArgument(_))
        ));

        let opts = SessionOpts::new("admin", "PASSWORD")
            .password_bytes(vec![0u8; 21]);
        assert!(matches!(
            conn.new_session(far_deadline(), &opts),
            Err(Error::InvalidArgument(_))
        ));

        let opts = SessionOpts::new("admin", "PASSWORD").username_bytes(b"a\0b".to_vec());
        assert!(matches!(
            conn.new_session(far_deadline(), &opts),
            Err(Error::InvalidArgument(_))
        ));
    }
}
