//! Persistent pump parameters.
//!
//! One field per key in the parameter-store table. Values can be
//! overridden via the serial console `set` verb and are persisted
//! through [`crate::store::ParameterStore`].

use serde::{Deserialize, Serialize};

/// Pump parameters, mirroring the parameter-store key table exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Plunger "in" endpoint (syringe empty), in odometer counts.
    pub plunger_in_pos: i16,
    /// Plunger "out" endpoint (syringe full), in odometer counts.
    pub plunger_out_pos: i16,
    /// Odometer counts per milliliter.
    pub pos_per_ml: u16,
    /// Milliliters to pump per run.
    pub ml_to_pump: u16,
    /// Phase-correct PWM duty applied to motor moves.
    pub motor_pwm: u8,
    /// Temperature calibration offset, hundredths of a degree. Stored
    /// only — no temperature logic consumes it (see DESIGN.md).
    pub temp_cal_offset: i16,
    /// Minutes between forced reboots.
    pub reboot_interval: u16,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            plunger_in_pos: 50,
            plunger_out_pos: -50,
            pos_per_ml: 117,
            ml_to_pump: 2000,
            motor_pwm: 100,
            temp_cal_offset: -266,
            reboot_interval: 1440,
        }
    }
}
