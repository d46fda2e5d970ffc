//! Chassis network function commands.

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::types::{
    ChassisControl, ChassisStatus, FrontPanelControls, LastPowerEvent, PowerRestorePolicy,
};
use crate::wire::message::{netfn, Operation};

/// `Get Chassis Status` (Chassis, 0x01).
#[derive(Debug, Clone, Copy)]
pub struct GetChassisStatus;

impl Command for GetChassisStatus {
    type Output = ChassisStatus;

    fn name(&self) -> &'static str {
        "Get Chassis Status"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::CHASSIS, 0x01)
    }

    fn decode_response(&self, data: &[u8]) -> Result<Self::Output> {
        if data.len() < 3 {
            return Err(Error::Decode("Get Chassis Status response too short"));
        }

        let b1 = data[0];
        let b2 = data[1];
        let b3 = data[2];

        let power_restore_policy = match (b1 >> 5) & 0x03 {
            0x00 => PowerRestorePolicy::AlwaysOff,
            0x01 => PowerRestorePolicy::Previous,
            0x02 => PowerRestorePolicy::AlwaysOn,
            other => PowerRestorePolicy::Unknown(other),
        };

        let last_power_event = LastPowerEvent {
            ac_failed: b2 & 0x01 != 0,
            power_overload: b2 & 0x02 != 0,
            power_interlock: b2 & 0x04 != 0,
            power_fault: b2 & 0x08 != 0,
            power_on_command: b2 & 0x10 != 0,
        };

        let front_panel_controls = if data.len() > 3 && data[3] != 0 {
            let b4 = data[3];
            Some(FrontPanelControls {
                sleep_button_disable_allowed: b4 & 0x80 != 0,
                diag_button_disable_allowed: b4 & 0x40 != 0,
                reset_button_disable_allowed: b4 & 0x20 != 0,
                power_button_disable_allowed: b4 & 0x10 != 0,
                sleep_button_disabled: b4 & 0x08 != 0,
                diag_button_disabled: b4 & 0x04 != 0,
                reset_button_disabled: b4 & 0x02 != 0,
                power_button_disabled: b4 & 0x01 != 0,
            })
        } else {
            None
        };

        Ok(ChassisStatus {
            system_power_on: b1 & 0x01 != 0,
            power_overload: b1 & 0x02 != 0,
            power_interlock: b1 & 0x04 != 0,
            main_power_fault: b1 & 0x08 != 0,
            power_control_fault: b1 & 0x10 != 0,
            power_restore_policy,
            last_power_event,
            chassis_intrusion: b3 & 0x01 != 0,
            front_panel_lockout: b3 & 0x02 != 0,
            drive_fault: b3 & 0x04 != 0,
            cooling_fan_fault: b3 & 0x08 != 0,
            front_panel_controls,
        })
    }
}

/// `Chassis Control` (Chassis, 0x02). The response is a bare completion
/// code.
#[derive(Debug, Clone, Copy)]
pub struct ChassisControlCommand {
    /// The control operation to perform.
    pub control: ChassisControl,
}

impl Command for ChassisControlCommand {
    type Output = ();

    fn name(&self) -> &'static str {
        "Chassis Control"
    }

    fn operation(&self) -> Operation {
        Operation::new(netfn::CHASSIS, 0x02)
    }

    fn encode_request(&self, buf: &mut Vec<u8>) {
        buf.push(self.control.as_u8());
    }

    fn expects_response_data(&self) -> bool {
        false
    }

    fn decode_response(&self, _data: &[u8]) -> Result<Self::Output> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chassis_control_request_bodies() {
        let cases = [
            (ChassisControl::PowerOff, 0x00),
            (ChassisControl::PowerOn, 0x01),
            (ChassisControl::PowerCycle, 0x02),
            (ChassisControl::HardReset, 0x03),
            (ChassisControl::DiagnosticInterrupt, 0x04),
            (ChassisControl::SoftPowerOff, 0x05),
        ];
        for (control, wire) in cases {
            let mut buf = Vec::new();
            ChassisControlCommand { control }.encode_request(&mut buf);
            assert_eq!(buf, [wire]);
        }
    }

    #[test]
    fn chassis_control_empty_response_is_complete() {
        let cmd = ChassisControlCommand {
            control: ChassisControl::PowerCycle,
        };
        assert!(!cmd.expects_response_data());
        cmd.decode_response(&[]).expect("decode");
    }

    #[test]
    fn chassis_status_fields() {
        let status = GetChassisStatus
            .decode_response(&[0x5F, 0x19, 0x0F, 0xFF])
            .expect("decode");

        assert!(status.system_power_on);
        assert!(status.power_overload);
        assert!(status.power_interlock);
        assert!(status.main_power_fault);
        assert!(status.power_control_fault);
        assert!(matches!(
            status.power_restore_policy,
            PowerRestorePolicy::AlwaysOn
        ));

        assert!(status.last_power_event.ac_failed);
        assert!(!status.last_power_event.power_overload);
        assert!(!status.last_power_event.power_interlock);
        assert!(status.last_power_event.power_fault);
        assert!(status.last_power_event.power_on_command);

        assert!(status.chassis_intrusion);
        assert!(status.front_panel_lockout);
        assert!(status.drive_fault);
        assert!(status.cooling_fan_fault);

        let controls = status.front_panel_controls.expect("controls");
        assert!(controls.sleep_button_disable_allowed);
        assert!(controls.power_button_disabled);
    }

    #[test]
    fn chassis_status_without_front_panel_byte() {
        let status = GetChassisStatus
            .decode_response(&[0x01, 0x00, 0x00])
            .expect("decode");
        assert!(status.system_power_on);
        assert!(status.front_panel_controls.is_none());
    }
}
