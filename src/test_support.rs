//! Shared test doubles: a scripted transport standing in for a BMC.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::wire::message::{checksum, Operation};

use crate::algo::{
    AuthenticationAlgorithm, ConfidentialityAlgorithm, IntegrityAlgorithm, SessionKeys,
};
use crate::crypto::{ct_eq, normalize_key};
use crate::wire::rakp::{
    rakp2_auth_code, rakp3_auth_code, rakp4_integrity_check_value, session_integrity_key,
};
use crate::wire::{rmcp, v2};

type Responder = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>>>;

/// A queue of responder closures standing in for a BMC, recording
/// everything sent to it. Tests keep a [`Script`] handle and hand a
/// [`Script::transport`] to the connection under test.
pub(crate) struct Script {
    inner: Rc<RefCell<ScriptState>>,
}

pub(crate) struct ScriptState {
    steps: VecDeque<Responder>,
    pub(crate) sent: Vec<Vec<u8>>,
}

impl Script {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ScriptState {
                steps: VecDeque::new(),
                sent: Vec::new(),
            })),
        }
    }

    /// Answer the next request by calling `f` on it.
    pub(crate) fn expect(self, f: impl FnMut(&[u8]) -> Result<Vec<u8>> + 'static) -> Self {
        self.inner.borrow_mut().steps.push_back(Box::new(f));
        self
    }

    /// Answer the next request with fixed bytes.
    pub(crate) fn reply(self, response: Vec<u8>) -> Self {
        self.expect(move |_| Ok(response.clone()))
    }

    /// Drop the next request, as a lost datagram would.
    pub(crate) fn timeout(self) -> Self {
        self.expect(|_| Err(Error::Timeout))
    }

    /// The transport to hand to the connection under test.
    pub(crate) fn transport(&self) -> Box<dyn Transport> {
        Box::new(ScriptedTransport {
            inner: Rc::clone(&self.inner),
            last_response: Vec::new(),
        })
    }

    pub(crate) fn requests_sent(&self) -> usize {
        self.inner.borrow().sent.len()
    }

    pub(crate) fn request(&self, i: usize) -> Vec<u8> {
        self.inner.borrow().sent[i].clone()
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.inner.borrow().steps.is_empty()
    }
}

struct ScriptedTransport {
    inner: Rc<RefCell<ScriptState>>,
    last_response: Vec<u8>,
}

impl Transport for ScriptedTransport {
    fn send_recv(&mut self, _deadline: Instant, request: &[u8]) -> Result<&[u8]> {
        let mut state = self.inner.borrow_mut();
        state.sent.push(request.to_vec());
        let mut step = state
            .steps
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {request:02x?}"));
        drop(state);

        self.last_response = step(request)?;
        Ok(&self.last_response)
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        Ok("127.0.0.1:623".parse().expect("test address"))
    }
}

/// Encode a response-direction IPMI message as a BMC would build it.
pub(crate) fn encode_message_response(
    op: &Operation,
    rq_seq: u8,
    completion_code: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.push(0x81); // back to the remote console
    msg.push((op.netfn | 1) << 2);
    msg.push(checksum(&msg));

    let second = msg.len();
    msg.push(0x20); // from the BMC
    msg.push((rq_seq & 0x3F) << 2);
    msg.push(op.command);
    msg.push(completion_code);
    if let Some(code) = op.body_code {
        msg.push(code);
    }
    if let Some(enterprise) = op.enterprise {
        msg.extend_from_slice(&enterprise.to_le_bytes()[..3]);
    }
    msg.extend_from_slice(data);
    let cks = checksum(&msg[second..]);
    msg.push(cks);

    msg
}

/// Wrap a response payload in a plain (unauthenticated, unencrypted)
/// v2.0 session packet, RMCP header included.
pub(crate) fn wrap_v2_plain(payload_type: u8, session_id: u32, sequence: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::new();
    crate::wire::v2::encode_packet(&mut packet, payload_type, session_id, sequence, payload, None)
        .expect("encode");
    packet
}

// ---------------------------------------------------------------------
// A scripted BMC that speaks the RMCP+ handshake for real: it computes
// RAKP MACs and session keys from its own password, so client-side
// verification failures behave as they would against hardware.

const AUTH: AuthenticationAlgorithm = AuthenticationAlgorithm::HmacSha1;

pub(crate) const BMC_SESSION_ID: u32 = 0xBEEF_0001;
pub(crate) const BMC_RANDOM: [u8; 16] = [0x5A; 16];
pub(crate) const BMC_GUID: [u8; 16] = [0x77; 16];


#[derive(Default)]
pub(crate) struct BmcState {
    pub(crate) rc_random: [u8; 16],
    pub(crate) role: u8,
    pub(crate) username: Vec<u8>,
    pub(crate) keys: Option<SessionKeys>,
}

/// Script the BMC half of a successful RAKP handshake. The BMC uses
/// `bmc_password` for its side of the key exchange, so a different
/// client password manifests as a RAKP2 auth code mismatch, exactly
/// as with real hardware.
pub(crate) fn handshake_script(bmc_password: &'static [u8]) -> (Script, Rc<RefCell<BmcState>>) {
    let state = Rc::new(RefCell::new(BmcState::default()));

    let script = Script::new()
        .expect(move |request| {
            // Open Session Request
            let payload = &request[16..];
            let tag = payload[0];
            assert_eq!(&payload[4..8], &1u32.to_le_bytes()); // our session id

            let mut rsp = vec![tag, 0x00, 0x04, 0x00];
            rsp.extend_from_slice(&1u32.to_le_bytes());
            rsp.extend_from_slice(&BMC_SESSION_ID.to_le_bytes());
            rsp.extend_from_slice(&[0x00, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            rsp.extend_from_slice(&[0x01, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            rsp.extend_from_slice(&[0x02, 0x00, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00]);
            Ok(wrap_v2_plain(
                v2::payload_type::OPEN_SESSION_RESPONSE,
                0,
                0,
                &rsp,
            ))
        })
        .expect({
            let state = Rc::clone(&state);
            move |request| {
                // RAKP Message 1
                let payload = &request[16..];
                let tag = payload[0];
                assert_eq!(&payload[4..8], &BMC_SESSION_ID.to_le_bytes());

                let mut st = state.borrow_mut();
                st.rc_random.copy_from_slice(&payload[8..24]);
                st.role = payload[24];
                let ulen = payload[27] as usize;
                st.username = payload[28..28 + ulen].to_vec();

                let auth_code = rakp2_auth_code(
                    AUTH,
                    &normalize_key(bmc_password),
                    1,
                    BMC_SESSION_ID,
                    &st.rc_random,
                    &BMC_RANDOM,
                    &BMC_GUID,
                    st.role,
                    &st.username,
                )
                .expect("bmc rakp2 auth code");

                let mut rsp = vec![tag, 0x00, 0x00, 0x00];
                rsp.extend_from_slice(&1u32.to_le_bytes());
                rsp.extend_from_slice(&BMC_RANDOM);
                rsp.extend_from_slice(&BMC_GUID);
                rsp.extend_from_slice(auth_code.as_slice());
                Ok(wrap_v2_plain(v2::payload_type::RAKP_2, 0, 0, &rsp))
            }
        })
        .expect({
            let state = Rc::clone(&state);
            move |request| {
                // RAKP Message 3
                let payload = &request[16..];
                let tag = payload[0];
                assert_eq!(payload[1], 0x00); // status OK
                assert_eq!(&payload[4..8], &BMC_SESSION_ID.to_le_bytes());

                let mut st = state.borrow_mut();
                let expected = rakp3_auth_code(
                    AUTH,
                    &normalize_key(bmc_password),
                    &BMC_RANDOM,
                    1,
                    st.role,
                    &st.username,
                )
                .expect("bmc rakp3 auth code");
                assert!(ct_eq(&payload[8..], expected.as_slice()));

                let sik = session_integrity_key(
                    AUTH,
                    &normalize_key(bmc_password),
                    &st.rc_random,
                    &BMC_RANDOM,
                    st.role,
                    &st.username,
                )
                .expect("bmc sik");
                let icv = rakp4_integrity_check_value(
                    AUTH,
                    &sik,
                    &st.rc_random,
                    BMC_SESSION_ID,
                    &BMC_GUID,
                )
                .expect("bmc icv");
                st.keys = Some(SessionKeys::derive(AUTH, &sik).expect("bmc keys"));

                let mut rsp = vec![tag, 0x00, 0x00, 0x00];
                rsp.extend_from_slice(&1u32.to_le_bytes());
                rsp.extend_from_slice(icv.as_slice());
                Ok(wrap_v2_plain(v2::payload_type::RAKP_4, 0, 0, &rsp))
            }
        });

    (script, state)
}

pub(crate) fn bmc_security(state: &BmcState) -> v2::PacketSecurity<'_> {
    v2::PacketSecurity {
        integrity: IntegrityAlgorithm::HmacSha1_96,
        confidentiality: ConfidentialityAlgorithm::AesCbc128,
        keys: state.keys.as_ref().expect("keys derived"),
    }
}

/// Answer an in-session command: decrypt and verify the request,
/// then encrypt and sign the response.
pub(crate) fn respond_in_session(
    state: &Rc<RefCell<BmcState>>,
    request: &[u8],
    completion_code: u8,
    data: &[u8],
) -> crate::error::Result<Vec<u8>> {
    let st = state.borrow();
    let sec = bmc_security(&st);

    let (class, rest) = rmcp::decode_header(request)?;
    assert_eq!(class, rmcp::Class::Ipmi);
    let decoded = v2::decode_packet(rest, Some(&sec))?;
    assert!(decoded.authenticated);
    assert!(decoded.encrypted);
    assert_eq!(decoded.session_id, BMC_SESSION_ID);

    let op = crate::wire::message::Operation {
        netfn: decoded.payload[1] >> 2,
        command: decoded.payload[5],
        body_code: None,
        enterprise: None,
    };
    let rq_seq = decoded.payload[4] >> 2;
    let msg = encode_message_response(&op, rq_seq, completion_code, data);

    let mut out = Vec::new();
    v2::encode_packet(&mut out, v2::payload_type::IPMI, 1, 1, &msg, Some(&sec))?;
    Ok(out)
}

