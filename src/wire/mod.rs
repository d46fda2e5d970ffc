//! Bidirectional serialization of the RMCP/RMCP+ packet stack.
//!
//! Each layer owns only its own bytes: encoders append onto one shared
//! `Vec<u8>` so checksums and MACs are computed over contiguous memory,
//! and decoders return the value plus the unconsumed remainder.

pub(crate) mod message;
pub(crate) mod open_session;
pub(crate) mod rakp;
pub(crate) mod rmcp;
pub(crate) mod v1;
pub(crate) mod v2;

use crate::error::{Error, Result};

/// Which session wrapper follows the RMCP header, decided by inspecting
/// the auth-type/format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionWrapper {
    /// IPMI v1.5 wrapper (auth types none/MD2/MD5/password/OEM).
    V1,
    /// IPMI v2.0/RMCP+ wrapper (auth type 0x06).
    V2,
}

/// Select the session wrapper of an incoming IPMI-class packet.
pub(crate) fn select_session(after_rmcp: &[u8]) -> Result<SessionWrapper> {
    let auth_type = *after_rmcp
        .first()
        .ok_or(Error::Decode("missing session wrapper"))?;
    match auth_type {
        v2::AUTH_TYPE_RMCP_PLUS => Ok(SessionWrapper::V2),
        0x00 | 0x01 | 0x02 | 0x04 | 0x05 => Ok(SessionWrapper::V1),
        _ => Err(Error::Decode("unknown session auth type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_distinguishes_wrappers() {
        assert_eq!(select_session(&[0x06]).expect("v2"), SessionWrapper::V2);
        assert_eq!(select_session(&[0x00]).expect("v1"), SessionWrapper::V1);
        assert_eq!(select_session(&[0x02]).expect("v1"), SessionWrapper::V1);
        assert!(select_session(&[0x0A]).is_err());
        assert!(select_session(&[]).is_err());
    }
}
