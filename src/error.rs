use std::io;

use thiserror::Error;

use crate::wire::message::CompletionCode;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The deadline expired before a response was received.
    #[error("timeout waiting for response")]
    Timeout,

    /// A received packet could not be decoded: truncated, unknown layer
    /// type, or an invalid confidentiality pad.
    #[error("decode error: {0}")]
    Decode(&'static str),

    /// The integrity check value on a received packet did not match.
    #[error("packet integrity check failed")]
    IntegrityMismatch,

    /// Peer responded with an unexpected or invalid packet.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Peer responded with an unexpected or invalid packet.
    #[error("protocol error: {0}")]
    ProtocolOwned(String),

    /// Authentication failed during session establishment. A RAKP2 auth
    /// code mismatch means the BMC is using a different password.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Cryptographic failure (invalid key sizes, decrypt failure, etc.).
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    /// Unsupported configuration or protocol feature.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An IPMI command completed with a non-normal completion code. The
    /// raw code is carried for the caller to inspect.
    #[error("ipmi completion code: {code}")]
    CompletionCode {
        /// Raw completion code returned by the BMC.
        code: CompletionCode,
    },

    /// The BMC returned a normal completion code but no body bytes for a
    /// command whose response has one. Observed for Get Channel
    /// Authentication Capabilities used as a keepalive, and for DCMI Get
    /// Power Reading on hardware without PMBus PSUs. Callers that only
    /// care about liveness may treat this as success.
    #[error("normal completion code but empty response body")]
    SuccessfulEmptyResponse,
}

impl Error {
    pub(crate) fn protocol_owned(msg: impl Into<String>) -> Self {
        Self::ProtocolOwned(msg.into())
    }
}
