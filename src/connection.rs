//! Session-less connections: the "null session" used for discovery and
//! to bootstrap RMCP+ session establishment.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::backoff::Backoff;
use crate::commands::app::{
    parse_cipher_suite_records, GetChannelAuthCapabilities, GetChannelCipherSuites,
    GetSystemGuid, CHANNEL_PRESENT_INTERFACE,
};
use crate::commands::{validate_response, Command};
use crate::error::{Error, Result};
use crate::transport::{Transport, UdpTransport};
use crate::types::{
    ChannelAuthCapabilities, CipherSuite, PrivilegeLevel, RawResponse, SystemGuid,
};
use crate::wire::rmcp::{self, PresencePong};
use crate::wire::{message, select_session, v1, v2, SessionWrapper};

/// Per-attempt transport timeout inside the retry loop.
pub(crate) const PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Send a serialized packet, retrying transport failures under
/// exponential backoff until the deadline. Returns a copy of the reply.
///
/// Only transport timeouts and I/O errors retry; anything else is
/// terminal for the request.
pub(crate) fn send_recv_with_retry(
    transport: &mut dyn Transport,
    backoff: &mut Backoff,
    deadline: Instant,
    packet: &[u8],
) -> Result<Vec<u8>> {
    backoff.reset();
    loop {
        let attempt_deadline = deadline.min(Instant::now() + PER_ATTEMPT_TIMEOUT);
        match transport.send_recv(attempt_deadline, packet) {
            Ok(response) => return Ok(response.to_vec()),
            Err(e @ (Error::Timeout | Error::Io(_))) => match backoff.next_delay(deadline) {
                Some(delay) => std::thread::sleep(delay),
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}

/// Check the completion code and surface the distinguished empty-response
/// error before handing the body to the command's decoder.
pub(crate) fn typed_output<C: Command>(cmd: &C, resp: RawResponse) -> Result<C::Output> {
    validate_response(resp.code)?;
    if resp.data.is_empty() && cmd.expects_response_data() {
        return Err(Error::SuccessfulEmptyResponse);
    }
    cmd.decode_response(&resp.data)
}

/// A session-less IPMI v2.0 connection.
///
/// Owns the transport and the serialization buffers for its lifetime;
/// sessions created from it borrow all three, so a session and its parent
/// can never race on the socket. Session-less commands can also be sent
/// inside a session (Get Channel Authentication Capabilities is the
/// conventional keepalive).
pub struct V2Sessionless {
    pub(crate) transport: Box<dyn Transport>,
    /// Packet build buffer, reused across sends.
    pub(crate) packet_buf: Vec<u8>,
    /// Message/payload build buffer, reused across sends.
    pub(crate) payload_buf: Vec<u8>,
    pub(crate) backoff: Backoff,
    next_tag: u8,
}

impl V2Sessionless {
    /// Connect to a BMC at `host[:port]` (port defaults to 623).
    pub fn dial(addr: &str) -> Result<Self> {
        let transport = UdpTransport::connect(addr);
        crate::observe::record_connection_open("2.0", transport.is_ok());
        Ok(Self::with_transport(Box::new(transport?)))
    }

    /// Wrap an existing transport. Useful for tests and custom sockets.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            packet_buf: Vec::with_capacity(crate::transport::MAX_PACKET_SIZE),
            payload_buf: Vec::with_capacity(128),
            backoff: Backoff::new(),
            next_tag: 0,
        }
    }

    /// The BMC's address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.transport.peer_addr()
    }

    /// The IPMI version of the connection, for display purposes.
    pub fn version(&self) -> &'static str {
        "2.0"
    }

    /// The next message tag; monotonic so replies can be matched up.
    pub(crate) fn take_tag(&mut self) -> u8 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        tag
    }

    /// Send an ASF Presence Ping and wait for the Pong.
    pub fn presence_ping(&mut self, deadline: Instant) -> Result<PresencePong> {
        let tag = self.take_tag();
        self.packet_buf.clear();
        rmcp::encode_presence_ping(&mut self.packet_buf, tag);

        let response = send_recv_with_retry(
            self.transport.as_mut(),
            &mut self.backoff,
            deadline,
            &self.packet_buf,
        )?;

        let pong = rmcp::decode_presence_pong(&response)?;
        if pong.tag != tag {
            return Err(Error::Protocol("presence pong tag mismatch"));
        }
        Ok(pong)
    }

    /// Send a command outside a session and return its raw response.
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
        let op = cmd.operation();

        // Sequence numbers are meaningless outside a session; nothing in
        // the packet changes between retries, so serialize once.
        self.payload_buf.clear();
        let mut body = Vec::new();
        cmd.encode_request(&mut body);
        message::encode_request(&mut self.payload_buf, &op, 0, &body);

        self.packet_buf.clear();
        v2::encode_packet(
            &mut self.packet_buf,
            v2::payload_type::IPMI,
            0,
            0,
            &self.payload_buf,
            None,
        )?;
        crate::observe::trace_packet("v2 sessionless request", &self.packet_buf);

        let response = send_recv_with_retry(
            self.transport.as_mut(),
            &mut self.backoff,
            deadline,
            &self.packet_buf,
        )?;
        crate::observe::trace_packet("v2 sessionless response", &response);

        let (class, rest) = rmcp::decode_header(&response)?;
        if class != rmcp::Class::Ipmi {
            return Err(Error::Decode("expected an IPMI-class packet"));
        }
        if select_session(rest)? != SessionWrapper::V2 {
            return Err(Error::Decode("expected a v2.0 session wrapper"));
        }
        let decoded = v2::decode_packet(rest, None)?;
        if decoded.payload_type != v2::payload_type::IPMI {
            return Err(Error::Protocol("unexpected RMCP+ payload type"));
        }

        let (code, data) = message::decode_response(&decoded.payload, &op, 0)?;
        Ok(RawResponse {
            code,
            data: data.to_vec(),
        })
    }

    /// Send a command and decode its typed output, promoting non-normal
    /// completion codes to errors.
    pub fn execute<C: Command>(&mut self, deadline: Instant, cmd: &C) -> Result<C::Output> {
        let resp = self.send_command(deadline, cmd)?;
        typed_output(cmd, resp)
    }

    /// Exchange one RMCP+ session-setup payload: serialize, send with
    /// retry, and return the payload of the expected response type.
    pub(crate) fn send_session_payload(
        &mut self,
        deadline: Instant,
        request_type: u8,
        response_type: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        self.packet_buf.clear();
        v2::encode_packet(&mut self.packet_buf, request_type, 0, 0, payload, None)?;
        crate::observe::trace_packet("rmcp+ session setup request", &self.packet_buf);

        let response = send_recv_with_retry(
            self.transport.as_mut(),
            &mut self.backoff,
            deadline,
            &self.packet_buf,
        )?;
        crate::observe::trace_packet("rmcp+ session setup response", &response);

        let (class, rest) = rmcp::decode_header(&response)?;
        if class != rmcp::Class::Ipmi {
            return Err(Error::Decode("expected an IPMI-class packet"));
        }
        let decoded = v2::decode_packet(rest, None)?;
        if decoded.payload_type != response_type {
            return Err(Error::Protocol("unexpected session setup payload type"));
        }
        Ok(decoded.payload)
    }

    /// `Get Channel Authentication Capabilities` for the present
    /// interface.
    pub fn get_channel_auth_capabilities(
        &mut self,
        deadline: Instant,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        self.execute(
            deadline,
            &GetChannelAuthCapabilities::new(CHANNEL_PRESENT_INTERFACE, privilege),
        )
    }

    /// `Get System GUID`; the result is an opaque 16-byte blob.
    pub fn get_system_guid(&mut self, deadline: Instant) -> Result<SystemGuid> {
        self.execute(deadline, &GetSystemGuid)
    }

    /// Enumerate `Get Channel Cipher Suites` and pick the best suite the
    /// BMC advertises, preferring suite 17 (SHA-256) over 3 (SHA-1), and
    /// falling back to suite 3 when nothing usable is returned.
    pub fn get_best_cipher_suite(&mut self, deadline: Instant) -> Result<CipherSuite> {
        let mut record_data = Vec::new();

        for index in 0..0x40u8 {
            let chunk = self.execute(
                deadline,
                &GetChannelCipherSuites {
                    channel: CHANNEL_PRESENT_INTERFACE,
                    index,
                },
            )?;
            let len = chunk.data.len();
            record_data.extend_from_slice(&chunk.data);
            if len < 16 {
                break;
            }
        }

        let records = parse_cipher_suite_records(&record_data)?;
        for preferred in [17u8, 3u8] {
            if let Some(r) = records.iter().find(|r| r.id == preferred && r.enterprise == 0) {
                return Ok(r.suite);
            }
        }
        Ok(CipherSuite::SUITE_3)
    }
}

/// A session-less IPMI v1.5 connection, wrapping commands in the v1.5
/// session format with authentication type "none".
///
/// v1.5 authenticated session establishment (Get Session Challenge /
/// Activate Session) is not implemented; use IPMI v2.0 where available.
pub struct V1Sessionless {
    transport: Box<dyn Transport>,
    packet_buf: Vec<u8>,
    payload_buf: Vec<u8>,
    backoff: Backoff,
}

impl V1Sessionless {
    /// Connect to a BMC at `host[:port]` (port defaults to 623).
    pub fn dial(addr: &str) -> Result<Self> {
        let transport = UdpTransport::connect(addr);
        crate::observe::record_connection_open("1.5", transport.is_ok());
        Ok(Self::with_transport(Box::new(transport?)))
    }

    /// Wrap an existing transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            packet_buf: Vec::with_capacity(crate::transport::MAX_PACKET_SIZE),
            payload_buf: Vec::with_capacity(128),
            backoff: Backoff::new(),
        }
    }

    /// The BMC's address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.transport.peer_addr()
    }

    /// The IPMI version of the connection, for display purposes.
    pub fn version(&self) -> &'static str {
        "1.5"
    }

    /// Send a command outside a session and return its raw response.
    pub fn send_command<C: Command>(&mut self, deadline: Instant, cmd: &C) -> Result<RawResponse> {
        let op = cmd.operation();
        let start = Instant::now();
        let result = self.send_command_inner(deadline, cmd);
        match &result {
            Ok(resp) => {
                crate::observe::record_ok("1.5", op.netfn, op.command, start.elapsed(), resp.code.0)
            }
            Err(err) => {
                crate::observe::record_err("1.5", op.netfn, op.command, start.elapsed(), err)
            }
        }
        result
    }

    fn send_command_inner<C: Command>(
        &mut self,
        deadline: Instant,
        cmd: &C,
    ) -> Result<RawResponse> {
        let op = cmd.operation();

        self.payload_buf.clear();
        let mut body = Vec::new();
        cmd.encode_request(&mut body);
        message::encode_request(&mut self.payload_buf, &op, 0, &body);

        self.packet_buf.clear();
        v1::encode_packet(&mut self.packet_buf, 0, 0, &self.payload_buf);
        crate::observe::trace_packet("v1.5 sessionless request", &self.packet_buf);

        let response = send_recv_with_retry(
            self.transport.as_mut(),
            &mut self.backoff,
            deadline,
            &self.packet_buf,
        )?;

        let (class, rest) = rmcp::decode_header(&response)?;
        if class != rmcp::Class::Ipmi {
            return Err(Error::Decode("expected an IPMI-class packet"));
        }
        if select_session(rest)? != SessionWrapper::V1 {
            return Err(Error::Decode("expected a v1.5 session wrapper"));
        }
        let decoded = v1::decode_packet(rest)?;

        let (code, data) = message::decode_response(&decoded.payload, &op, 0)?;
        Ok(RawResponse {
            code,
            data: data.to_vec(),
        })
    }

    /// Send a command and decode its typed output.
    pub fn execute<C: Command>(&mut self, deadline: Instant, cmd: &C) -> Result<C::Output> {
        let resp = self.send_command(deadline, cmd)?;
        typed_output(cmd, resp)
    }

    /// `Get Channel Authentication Capabilities` for the present
    /// interface, e.g. to discover whether the BMC speaks v2.0.
    pub fn get_channel_auth_capabilities(
        &mut self,
        deadline: Instant,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        self.execute(
            deadline,
            &GetChannelAuthCapabilities::new(CHANNEL_PRESENT_INTERFACE, privilege),
        )
    }

    /// `Get System GUID`.
    pub fn get_system_guid(&mut self, deadline: Instant) -> Result<SystemGuid> {
        self.execute(deadline, &GetSystemGuid)
    }
}
