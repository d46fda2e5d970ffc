//! Show various information about a BMC: presence pong capabilities,
//! channel authentication capabilities, device ID, chassis status,
//! sensor readings and DCMI info.
//!
//! Usage: describe <addr> --username <user> --password <password>
//!
//! Exits non-zero only on connection failure; individual probes a BMC
//! does not support are reported and skipped.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use bmc::dcmi;
use bmc::{retrieve_sdr_repository, PrivilegeLevel, SessionOpts, V2Session, V2Sessionless};

struct Args {
    addr: String,
    username: String,
    password: String,
}

fn parse_args() -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut username = None;
    let mut password = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--username" => username = args.next(),
            "--password" => password = args.next(),
            _ => positional.push(arg),
        }
    }

    if positional.len() != 1 {
        return Err("usage: describe <addr> --username <user> --password <password>".into());
    }

    Ok(Args {
        addr: positional.remove(0),
        username: username.ok_or("missing --username")?,
        password: password.ok_or("missing --password")?,
    })
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut conn = match V2Sessionless::dial(&args.addr) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("failed to connect: {e}");
            return ExitCode::FAILURE;
        }
    };

    let deadline = Instant::now() + Duration::from_secs(10);

    match conn.presence_ping(deadline) {
        Ok(pong) => {
            println!("presence pong:");
            println!("\tIPMI supported: {}", pong.ipmi_supported);
            println!("\tDCMI advertised: {}", pong.dcmi_supported);
            println!("\tsecurity extensions: {}", pong.security_extensions);
        }
        Err(e) => eprintln!("failed to get presence pong: {e}"),
    }

    match conn.get_channel_auth_capabilities(deadline, PrivilegeLevel::Administrator) {
        Ok(caps) => {
            println!("channel authentication capabilities:");
            println!("\tchannel: {}", caps.channel);
            println!("\tsupports v1.5: {}", caps.supports_v1);
            println!("\tsupports v2.0: {}", caps.supports_v2);
            println!("\ttwo-key login: {}", caps.two_key_login);
            println!("\tanonymous login: {}", caps.anonymous_login);
        }
        Err(e) => eprintln!("failed to get channel auth capabilities: {e}"),
    }

    match conn.get_system_guid(deadline) {
        Ok(guid) => {
            let hex: String = guid.bytes.iter().map(|b| format!("{b:02x}")).collect();
            println!("system GUID: {hex}");
        }
        Err(e) => eprintln!("failed to get system GUID: {e}"),
    }

    let opts = SessionOpts::new(&args.username, &args.password)
        .max_privilege_level(PrivilegeLevel::Operator);
    let mut session = match conn.new_session(deadline, &opts) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to establish session: {e}");
            return ExitCode::FAILURE;
        }
    };

    describe_session(&mut session, deadline);
    let _ = session.close(deadline);
    ExitCode::SUCCESS
}

fn describe_session(session: &mut V2Session<'_>, deadline: Instant) {
    match session.get_device_id(deadline) {
        Ok(id) => {
            println!("device:");
            println!("\tid: {}", id.device_id);
            println!("\tfirmware: {}.{}", id.firmware_major, id.firmware_minor);
            println!("\tmanufacturer: {}", id.manufacturer_id);
            println!("\tproduct: {}", id.product_id);
        }
        Err(e) => eprintln!("failed to get device id: {e}"),
    }

    match session.get_chassis_status(deadline) {
        Ok(status) => {
            println!("chassis:");
            println!("\tpowered on: {}", status.system_power_on);
            println!("\tpower fault: {}", status.main_power_fault);
            println!("\tcooling fault: {}", status.cooling_fan_fault);
        }
        Err(e) => eprintln!("failed to get chassis status: {e}"),
    }

    match retrieve_sdr_repository(session, deadline) {
        Ok(repo) => {
            println!("sensors ({}):", repo.records.len());
            for (id, record) in &repo.records {
                let reading = session
                    .get_sensor_reading(deadline, record.key.number)
                    .ok()
                    .filter(|r| !r.reading_unavailable)
                    .and_then(|r| record.convert_reading(r.raw).ok());
                match reading {
                    Some(value) => println!("\t{:#06x} {}: {value:.2}", id.0, record.identity),
                    None => println!("\t{:#06x} {}: unavailable", id.0, record.identity),
                }
            }
        }
        Err(e) => eprintln!("failed to retrieve SDR repository: {e}"),
    }

    match session.execute(deadline, &dcmi::GetDcmiSupportedCapabilities) {
        Ok(caps) => {
            println!("DCMI:");
            println!(
                "\tversion: {}.{}",
                caps.header.major_version, caps.header.minor_version
            );
            println!("\tpower management: {}", caps.power_management);

            if caps.power_management {
                match dcmi::get_power_reading(session, deadline, dcmi::GetPowerReading::normal()) {
                    Ok(reading) => println!(
                        "\tpower: {}W now, {}W avg over {:?}",
                        reading.instantaneous, reading.avg, reading.period
                    ),
                    Err(bmc::Error::SuccessfulEmptyResponse) => {
                        println!("\tpower: not measurable on this hardware")
                    }
                    Err(e) => eprintln!("failed to get power reading: {e}"),
                }
            }
        }
        Err(e) => eprintln!("failed to get DCMI capabilities: {e}"),
    }
}
