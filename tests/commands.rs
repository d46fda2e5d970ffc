use bmc::commands::app::{CloseSession, GetChannelAuthCapabilities, GetDeviceId, GetSystemGuid};
use bmc::commands::chassis::{ChassisControlCommand, GetChassisStatus};
use bmc::commands::storage::{GetSdr, GetSensorReading};
use bmc::commands::{validate_response, Command};
use bmc::sensor::{FullSensorRecord, RecordId};
use bmc::{ChassisControl, CompletionCode, Error, PrivilegeLevel};

#[test]
fn get_device_id_parses_response() {
    let data = [
        0x20, 0x01, 0x02, 0x43, 0x02, 0x00, 0xA2, 0x02, 0x00, 0x00, 0x01, 0x00, 0x06, 0x2B,
        0x2B,
    ];

    let parsed = GetDeviceId.decode_response(&data).expect("parse");
    assert_eq!(parsed.device_id, 0x20);
    assert_eq!(parsed.device_revision, 0x01);
    assert_eq!(parsed.firmware_major, 0x02);
    assert_eq!(parsed.firmware_minor, 43); // BCD 0x43
    assert_eq!(parsed.ipmi_version, 0x02);
    assert_eq!(parsed.manufacturer_id, 0x0000_02A2);
    assert_eq!(parsed.product_id, 0x0100);
    assert_eq!(parsed.aux_firmware_revision, [0x00, 0x06, 0x2B, 0x2B]);
}

#[test]
fn completion_code_is_reported() {
    let err = validate_response(CompletionCode(0xC1)).expect_err("expected error");
    assert!(matches!(
        err,
        Error::CompletionCode {
            code: CompletionCode(0xC1)
        }
    ));
}

#[test]
fn get_system_guid_is_opaque() {
    let mut data = [0u8; 16];
    for (i, b) in data.iter_mut().enumerate() {
        *b = i as u8;
    }

    let guid = GetSystemGuid.decode_response(&data).expect("parse");
    assert_eq!(
        guid.bytes,
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
    );
}

#[test]
fn get_chassis_status_parses_response() {
    let status = GetChassisStatus
        .decode_response(&[0x5F, 0x19, 0x0F, 0xFF])
        .expect("parse");
    assert!(status.system_power_on);
    assert!(status.power_overload);
    assert!(status.last_power_event.ac_failed);
    assert!(status.front_panel_controls.is_some());
}

#[test]
fn chassis_control_encodes_power_cycle() {
    let cmd = ChassisControlCommand {
        control: ChassisControl::PowerCycle,
    };
    let mut buf = Vec::new();
    cmd.encode_request(&mut buf);
    assert_eq!(buf, [0x02]);

    // the response is a bare completion code
    assert!(!cmd.expects_response_data());
    cmd.decode_response(&[]).expect("empty response");
}

#[test]
fn channel_auth_capabilities_requests_extended_data() {
    let cmd = GetChannelAuthCapabilities::new(0x02, PrivilegeLevel::Administrator);
    let mut buf = Vec::new();
    cmd.encode_request(&mut buf);
    assert_eq!(buf, [0x82, 0x04]);
}

#[test]
fn close_session_zero_id_sends_handle() {
    let mut buf = Vec::new();
    CloseSession { id: 0, handle: 9 }.encode_request(&mut buf);
    assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x09]);
}

#[test]
fn get_sdr_round_trip() {
    let cmd = GetSdr {
        reservation_id: 0x1234,
        record_id: RecordId(0x0001),
        offset: 5,
        length: 51,
    };
    let mut buf = Vec::new();
    cmd.encode_request(&mut buf);
    assert_eq!(buf, [0x34, 0x12, 0x01, 0x00, 0x05, 0x33]);

    let chunk = cmd
        .decode_response(&[0xFF, 0xFF, 0xAA, 0xBB])
        .expect("parse");
    assert_eq!(chunk.next, RecordId::LAST);
    assert_eq!(chunk.data, [0xAA, 0xBB]);
}

#[test]
fn sensor_reading_converts_via_record() {
    let body = [
        0x20, 0x00, 0x01, 0x03, 0x01, 0x7F, 0x68, 0x01, 0x01, 0x00, 0x72, 0x00, 0x72, 0x3F,
        0x3F, 0x80, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x28, 0x59,
        0xFC, 0x7F, 0x80, 0x64, 0x64, 0x5F, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00,
        0xC8, 0x43, 0x50, 0x55, 0x20, 0x54, 0x65, 0x6D, 0x70,
    ];
    let record = FullSensorRecord::decode(&body).expect("record");
    assert_eq!(record.identity, "CPU Temp");

    let reading = GetSensorReading { number: record.key.number }
        .decode_response(&[0x28, 0b0100_0000, 0x00])
        .expect("reading");
    assert!(reading.scanning_enabled);
    assert!(!reading.reading_unavailable);
    assert_eq!(record.convert_reading(reading.raw).expect("convert"), 40.0);
}

#[test]
fn dcmi_power_reading_round_trip() {
    use bmc::dcmi::{GetPowerReading, PowerStatisticsMode};
    use std::time::Duration;

    let cmd = GetPowerReading {
        mode: PowerStatisticsMode::Enhanced,
        period: Duration::from_secs(12 * 24 * 60 * 60),
    };
    let mut buf = Vec::new();
    cmd.encode_request(&mut buf);
    assert_eq!(buf, [0x02, 0xCC, 0x00]);

    let mut data = Vec::new();
    for watts in [200u16, 150, 300, 210] {
        data.extend_from_slice(&watts.to_le_bytes());
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&60_000u32.to_le_bytes());
    data.push(1 << 6);

    let reading = cmd.decode_response(&data).expect("parse");
    assert_eq!(reading.avg, 210);
    assert_eq!(reading.period, Duration::from_secs(60));
    assert!(reading.active);
}
