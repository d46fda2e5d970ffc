//! Typed IPMI commands.
//!
//! A [`Command`] names its operation, encodes its request body and
//! decodes its response body. The connection/session dispatcher supplies
//! the message layer, session wrapper and retry loop around it.

pub mod app;
pub mod chassis;
pub mod storage;

use crate::error::{Error, Result};
use crate::wire::message::{CompletionCode, Operation};

/// A single request/response IPMI command.
pub trait Command {
    /// Parsed output type.
    type Output;

    /// Human-readable command name for observability.
    fn name(&self) -> &'static str;

    /// The operation uniquely naming this request.
    fn operation(&self) -> Operation;

    /// Append request body bytes (excluding message-layer framing).
    fn encode_request(&self, buf: &mut Vec<u8>) {
        let _ = buf;
    }

    /// Whether a successful response must carry at least one body byte.
    /// Used to surface [`Error::SuccessfulEmptyResponse`] for BMCs that
    /// return a bare normal completion code.
    fn expects_response_data(&self) -> bool {
        true
    }

    /// Parse the response body into the typed output.
    fn decode_response(&self, data: &[u8]) -> Result<Self::Output>;
}

/// Promote a non-normal completion code to an error, preserving the code.
pub fn validate_response(code: CompletionCode) -> Result<()> {
    if !code.is_normal() {
        return Err(Error::CompletionCode { code });
    }
    Ok(())
}
