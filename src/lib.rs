#![deny(unsafe_code)]
#![warn(missing_docs)]

//! An IPMI v1.5/2.0 remote console for BMCs over RMCP/RMCP+.
//!
//! The crate implements:
//! - the RMCP+ Open Session / RAKP 1-4 key exchange with HMAC-SHA1,
//!   HMAC-MD5 and HMAC-SHA256 authentication
//! - per-packet integrity (HMAC-SHA1-96, HMAC-MD5-128, MD5-128,
//!   HMAC-SHA256-128) and confidentiality (AES-CBC-128)
//! - a retrying request/response dispatcher for typed IPMI commands
//! - reservation-guarded SDR repository enumeration with Full Sensor
//!   Record decoding
//! - the DCMI capability, power reading and sensor info extensions
//!
//! Connections are deadline-driven and single-threaded: a
//! [`V2Sessionless`] owns the socket, a [`V2Session`] borrows it for the
//! session's lifetime, and every operation takes the instant by which it
//! must complete.
//!
//! ```no_run
//! use std::time::{Duration, Instant};
//!
//! fn main() -> bmc::Result<()> {
//!     let deadline = Instant::now() + Duration::from_secs(10);
//!
//!     let mut conn = bmc::V2Sessionless::dial("10.0.0.1")?;
//!     let mut session = conn.new_session(
//!         deadline,
//!         &bmc::SessionOpts::new("admin", "password"),
//!     )?;
//!
//!     let id = session.get_device_id(deadline)?;
//!     println!("firmware {}.{}", id.firmware_major, id.firmware_minor);
//!
//!     session.close(deadline)
//! }
//! ```

mod algo;
mod backoff;
/// Typed IPMI commands and the [`commands::Command`] trait the
/// dispatcher drives.
pub mod commands;
mod connection;
mod crypto;
/// DCMI extension commands.
pub mod dcmi;
mod error;
mod observe;
mod sdr_repo;
/// Sensor Data Record decoding and reading conversion.
pub mod sensor;
mod session;
#[cfg(test)]
pub(crate) mod test_support;
mod transport;
mod types;
mod wire;

pub use crate::algo::{AuthenticationAlgorithm, ConfidentialityAlgorithm, IntegrityAlgorithm};
pub use crate::connection::{V1Sessionless, V2Sessionless};
pub use crate::error::{Error, Result};
pub use crate::sdr_repo::{retrieve_sdr_repository, SdrRepository};
pub use crate::session::{SessionOpts, V2Session};
pub use crate::transport::{Transport, UdpTransport, DEFAULT_PORT};
pub use crate::types::{
    ChannelAuthCapabilities, ChassisControl, ChassisStatus, CipherSuite, CipherSuiteRecord,
    DeviceId, FrontPanelControls, LastPowerEvent, PowerRestorePolicy, PrivilegeLevel,
    RawResponse, SelfTestDeviceError, SelfTestResult, SystemGuid,
};
pub use crate::wire::message::{netfn, CompletionCode, Operation};
pub use crate::wire::rmcp::PresencePong;
