//! GPIO / peripheral pin assignments for the pump control board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers. These are contracts with the reference board
//! (see SPEC_FULL.md §6): motor drive on the timer/counter-0 PWM outputs,
//! tachometer on port B bit 0, home sensor on port D bit 2, float sensor on
//! port C bit 4 with pull-up.

// ---------------------------------------------------------------------------
// Motor H-bridge drive (phase-correct PWM, divide-by-64 prescale)
// ---------------------------------------------------------------------------

/// LEDC channel backing the "A" side PWM output of the H-bridge.
pub const MOTOR_PWM_A_GPIO: i32 = 0;
/// LEDC channel backing the "B" side PWM output of the H-bridge.
pub const MOTOR_PWM_B_GPIO: i32 = 1;
/// Base PWM frequency for phase-correct drive, divide-by-64 from a 4 MHz
/// reference (matches the AVR Timer0 configuration this board inherits).
pub const MOTOR_PWM_FREQ_HZ: u32 = 31_250;
/// LEDC timer resolution (bits). 8-bit gives the 0..255 duty range used
/// throughout the parameter table (`motorPwm`).
pub const MOTOR_PWM_RESOLUTION_BITS: u32 = 8;

// ---------------------------------------------------------------------------
// Sensors — digital, edge-triggered
// ---------------------------------------------------------------------------

/// Tachometer/odometer pulse sensor — port B bit 0.
pub const TACHOMETER_GPIO: i32 = 2;
/// Home-position sensor — port D bit 2. Any-edge interrupt.
pub const HOME_SENSOR_GPIO: i32 = 3;
/// Float sensor (source tank water-available) — port C bit 4, pull-up,
/// active-low.
pub const FLOAT_SENSOR_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Serial console
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;
pub const CONSOLE_BAUD_RATE: u32 = 4800;
