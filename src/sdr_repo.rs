//! Reservation-guarded enumeration of the SDR repository.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::backoff::Backoff;
use crate::error::{Error, Result};
use crate::sensor::{FullSensorRecord, RecordId, RecordType, SdrHeader};
use crate::session::V2Session;

/// Records longer than this need multi-chunk partial reads, which no
/// Full Sensor Record requires (the record is specified at 64 bytes
/// including its header).
const MAX_BODY_LENGTH: u8 = 64 - SdrHeader::LEN;

/// A retrieved snapshot of the BMC's SDR repository: the Full Sensor
/// Records indexed by record ID, plus the modification timestamps the
/// snapshot was validated against.
#[derive(Debug, Clone, Default)]
pub struct SdrRepository {
    /// Full Sensor Records by record ID. Other record types are skipped.
    pub records: BTreeMap<RecordId, FullSensorRecord>,
    /// `last_addition` timestamp at the time of the snapshot.
    pub last_addition: u32,
    /// `last_erase` timestamp at the time of the snapshot.
    pub last_erase: u32,
}

/// Enumerate all Full Sensor Records in the BMC's SDR repository.
///
/// The repository info timestamps are read before and after the walk; if
/// either moved, records retrieved so far could be stale, so the snapshot
/// is discarded and the walk restarts under exponential backoff. A
/// returned snapshot was therefore consistent at the moment of the final
/// repository info read.
pub fn retrieve_sdr_repository(
    session: &mut V2Session<'_>,
    deadline: Instant,
) -> Result<SdrRepository> {
    let mut backoff = Backoff::new();

    loop {
        match try_retrieve(session, deadline) {
            Ok(repo) => return Ok(repo),
            Err(e @ Error::Timeout) => return Err(e),
            Err(e) => match backoff.next_delay(deadline) {
                Some(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %e, "SDR walk restarting");
                    let _ = e;
                    std::thread::sleep(delay);
                }
                None => return Err(e),
            },
        }
    }
}

fn try_retrieve(session: &mut V2Session<'_>, deadline: Instant) -> Result<SdrRepository> {
    let initial = session.get_sdr_repository_info(deadline)?;
    let records = walk(session, deadline)?;
    let fin = session.get_sdr_repository_info(deadline)?;

    if initial.last_addition != fin.last_addition || initial.last_erase != fin.last_erase {
        return Err(Error::Protocol(
            "SDR repository was modified during enumeration",
        ));
    }

    Ok(SdrRepository {
        records,
        last_addition: fin.last_addition,
        last_erase: fin.last_erase,
    })
}

/// Walk the repository under a fresh reservation: read each record's
/// header, and for Full Sensor Records also its body, chaining through
/// the "next record" IDs until the last-record sentinel.
fn walk(
    session: &mut V2Session<'_>,
    deadline: Instant,
) -> Result<BTreeMap<RecordId, FullSensorRecord>> {
    let mut records = BTreeMap::new();

    let reservation_id = session.reserve_sdr_repository(deadline)?;
    let mut record_id = RecordId::FIRST;

    // The final record lists RecordId::LAST as its next; requesting that
    // sentinel would re-fetch the final record under a second ID.
    while record_id != RecordId::LAST {
        let chunk = session.get_sdr(deadline, reservation_id, record_id, 0, SdrHeader::LEN)?;
        let header = SdrHeader::decode(&chunk.data)?;

        if header.record_type == RecordType::FullSensor {
            if header.length > MAX_BODY_LENGTH {
                return Err(Error::protocol_owned(format!(
                    "SDR {:?} body of {} bytes exceeds the full-sensor maximum",
                    record_id, header.length
                )));
            }
            let body =
                session.get_sdr(deadline, reservation_id, record_id, SdrHeader::LEN, header.length)?;
            let record = FullSensorRecord::decode(&body.data)?;
            // key by the id the header names; the request id was 0x0000
            // for the first record
            records.insert(header.id, record);
        }

        record_id = chunk.next;
    }

    Ok(records)
}
