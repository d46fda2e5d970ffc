//! Opaque observability sinks: request outcomes, connection and session
//! lifecycle counters, transport byte histograms, and packet dumps.
//!
//! Everything here compiles to nothing unless the `metrics` / `tracing`
//! features are enabled, so the hot path carries no cost by default.

use std::time::Duration;

use crate::error::Error;

pub(crate) fn record_ok(
    version: &'static str,
    netfn: u8,
    cmd: u8,
    elapsed: Duration,
    completion_code: u8,
) {
    let _ = (version, netfn, cmd, elapsed, completion_code);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("bmc_requests_total", "version" => version, "outcome" => "ok")
            .increment(1);
        metrics::histogram!("bmc_request_latency_seconds", "version" => version)
            .record(elapsed.as_secs_f64());
        if completion_code != 0x00 {
            metrics::counter!("bmc_completion_code_nonzero_total", "version" => version)
                .increment(1);
        }
    }

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            version,
            netfn,
            cmd,
            completion_code,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request ok"
        );
    }
}

pub(crate) fn record_err(
    version: &'static str,
    netfn: u8,
    cmd: u8,
    elapsed: Duration,
    err: &Error,
) {
    let _ = (version, netfn, cmd, elapsed, err);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("bmc_requests_total", "version" => version, "outcome" => "err")
            .increment(1);
        metrics::counter!(
            "bmc_request_errors_total",
            "version" => version,
            "kind" => error_kind(err)
        )
        .increment(1);
        metrics::histogram!("bmc_request_latency_seconds", "version" => version)
            .record(elapsed.as_secs_f64());
    }

    #[cfg(feature = "tracing")]
    {
        tracing::warn!(
            version,
            netfn,
            cmd,
            error = %err,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request failed"
        );
    }
}

pub(crate) fn record_connection_open(version: &'static str, ok: bool) {
    let _ = (version, ok);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("bmc_connection_open_attempts_total", "version" => version)
            .increment(1);
        if !ok {
            metrics::counter!("bmc_connection_open_failures_total", "version" => version)
                .increment(1);
        }
    }
}

pub(crate) fn record_session_open(version: &'static str, ok: bool) {
    let _ = (version, ok);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("bmc_session_open_attempts_total", "version" => version).increment(1);
        if !ok {
            metrics::counter!("bmc_session_open_failures_total", "version" => version)
                .increment(1);
        }
    }
}

pub(crate) fn record_session_close(version: &'static str, ok: bool) {
    let _ = (version, ok);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("bmc_session_close_attempts_total", "version" => version).increment(1);
        if !ok {
            metrics::counter!("bmc_session_close_failures_total", "version" => version)
                .increment(1);
        }
    }
}

pub(crate) fn record_transmit(bytes: usize) {
    let _ = bytes;

    #[cfg(feature = "metrics")]
    metrics::histogram!("bmc_transport_transmit_bytes").record(bytes as f64);
}

pub(crate) fn record_receive(bytes: usize) {
    let _ = bytes;

    #[cfg(feature = "metrics")]
    metrics::histogram!("bmc_transport_receive_bytes").record(bytes as f64);
}

/// Emit a hex dump of a raw datagram at trace level, labelled with the
/// packet's direction and layer. Session payloads go through this
/// encrypted, so nothing sensitive leaks into trace output.
pub(crate) fn trace_packet(label: &'static str, packet: &[u8]) {
    let _ = (label, packet);

    #[cfg(feature = "tracing")]
    tracing::trace!(len = packet.len(), "{label}: {}", HexDump(packet));
}

#[cfg(feature = "tracing")]
struct HexDump<'a>(&'a [u8]);

#[cfg(feature = "tracing")]
impl core::fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "metrics")]
fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Io(_) => "io",
        Error::Timeout => "timeout",
        Error::Decode(_) | Error::IntegrityMismatch => "decode",
        Error::Protocol(_) | Error::ProtocolOwned(_) => "protocol",
        Error::AuthenticationFailed(_) => "authentication",
        Error::Crypto(_) => "crypto",
        Error::Unsupported(_) => "unsupported",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::CompletionCode { .. } => "completion_code",
        Error::SuccessfulEmptyResponse => "empty_response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // With `--features metrics` / `--features tracing` this drives the
    // gated emission paths against the default no-op recorder and
    // subscriber; without them it pins the signatures.
    #[test]
    fn sinks_accept_every_outcome() {
        record_connection_open("2.0", true);
        record_connection_open("1.5", false);
        record_session_open("2.0", true);
        record_session_open("2.0", false);
        record_session_close("2.0", true);
        record_session_close("2.0", false);
        record_transmit(23);
        record_receive(90);
        record_ok("2.0", 0x06, 0x01, Duration::from_millis(3), 0x00);
        record_ok("2.0", 0x00, 0x02, Duration::from_millis(3), 0xC0);
        record_err(
            "2.0",
            0x06,
            0x38,
            Duration::from_millis(3),
            &Error::Timeout,
        );
        record_err(
            "1.5",
            0x06,
            0x01,
            Duration::from_millis(3),
            &Error::SuccessfulEmptyResponse,
        );
        trace_packet("test packet", &[0x06, 0x00, 0xFF, 0x07]);
    }
}
