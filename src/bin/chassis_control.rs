//! Send a chassis control command to a system, e.g. to power it on or do
//! a hard reset.
//!
//! Usage: chassis-control <addr> <on|off|cycle|reset|interrupt|softoff>
//!        --username <user> --password <password>

use std::process::ExitCode;
use std::time::{Duration, Instant};

use bmc::{ChassisControl, SessionOpts, V2Sessionless};

struct Args {
    addr: String,
    command: ChassisControl,
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

    if positional.len() != 2 {
        return Err("usage: chassis-control <addr> <command> --username <user> --password <password>".into());
    }
    let command = match positional[1].as_str() {
        "on" => ChassisControl::PowerOn,
        "off" => ChassisControl::PowerOff,
        "cycle" => ChassisControl::PowerCycle,
        "reset" => ChassisControl::HardReset,
        "interrupt" => ChassisControl::DiagnosticInterrupt,
        "softoff" => ChassisControl::SoftPowerOff,
        other => return Err(format!("invalid command: {other} (on/off/cycle/reset/interrupt/softoff)")),
    };

    Ok(Args {
        addr: positional.remove(0),
        command,
        username: username.ok_or("missing --username")?,
        password: password.ok_or("missing --password")?,
    })
}

fn run(args: &Args) -> bmc::Result<()> {
    let mut conn = V2Sessionless::dial(&args.addr)?;
    eprintln!(
        "connected to {} over IPMI v{}",
        conn.peer_addr()?,
        conn.version()
    );

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut session = conn.new_session(
        deadline,
        &SessionOpts::new(&args.username, &args.password),
    )?;

    let result = session.chassis_control(deadline, args.command);
    let _ = session.close(deadline);
    result
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("chassis control failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
