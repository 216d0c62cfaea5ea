//! Linear motion controller: drives the plunger's DC gearmotor to a
//! commanded position or seeks the home-position sensor, arbitrating
//! between PWM drive, braking, and coast with timeout protection.
//!
//! Faithful port of `LinearMotionControl.c`'s four-state machine
//! (Stopped / MovingToPosition / BrakingToStop / SeekingHome) and its
//! command latch (`none` / `moveToPosition` / `brakeToStop` /
//! `findHomePosition`). Owns one [`crate::tacho::TachometerOdometer`]
//! and one [`crate::motor::Motor`] — no aliasing of motion state across
//! components.

use crate::drivers::hw_init;
use crate::motor::Motor;
use crate::pins;
use crate::tacho::{Direction, TachometerOdometer};
use crate::time_base::{self, SystemTime};

/// Plunger moves into the controlled position before timing out.
const TARGET_POSITION_TIMEOUT_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    None,
    MoveToPosition,
    BrakeToStop,
    FindHomePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    MovingToPosition,
    BrakingToStop,
    SeekingHome,
}

/// Called from the home-sensor edge ISR. Resets the odometer to zero and
/// latches `home_found` — the controller reads the latch on its next
/// `task()`.
static HOME_FOUND: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

pub fn on_home_sensor_edge() {
    TachometerOdometer::new().reset_position_to_zero();
    HOME_FOUND.store(true, core::sync::atomic::Ordering::Release);
}

pub struct LinearMotionController {
    to: TachometerOdometer,
    motor: Motor,
    command: Command,
    target_position: i16,
    motor_pwm: u8,
    state: State,
    had_nonzero_speed: bool,
    timeout_deadline: SystemTime,
}

impl LinearMotionController {
    pub fn new() -> Self {
        let to = TachometerOdometer::new();
        to.init();
        Self {
            to,
            motor: Motor::new(),
            command: Command::None,
            target_position: 0,
            motor_pwm: 0,
            state: State::Stopped,
            had_nonzero_speed: false,
            timeout_deadline: SystemTime::default(),
        }
    }

    fn home_sensor_ahead(&self) -> bool {
        hw_init::gpio_read(pins::HOME_SENSOR_GPIO)
    }

    /// Refuses (returns `false`) until home position has been found at
    /// least once since boot.
    pub fn move_to_position(&mut self, new_position: i16, motor_pwm: u8) -> bool {
        if !self.home_known() {
            return false;
        }
        self.command = Command::MoveToPosition;
        self.target_position = new_position;
        self.motor_pwm = motor_pwm;
        true
    }

    pub fn brake_to_stop(&mut self) {
        self.command = Command::BrakeToStop;
    }

    pub fn find_home(&mut self, motor_pwm: u8) {
        HOME_FOUND.store(false, core::sync::atomic::Ordering::Release);
        self.command = Command::FindHomePosition;
        self.motor_pwm = motor_pwm;
    }

    pub fn is_stopped(&self) -> bool {
        self.state == State::Stopped
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn position(&self) -> i16 {
        self.to.position()
    }

    pub fn speed(&self) -> u8 {
        self.to.speed()
    }

    pub fn home_known(&self) -> bool {
        HOME_FOUND.load(core::sync::atomic::Ordering::Acquire)
    }

    fn enter_braking(&mut self) {
        self.motor.brake();
        self.state = State::BrakingToStop;
        log::debug!("motion: braking");
    }

    pub fn task(&mut self) {
        match self.state {
            State::Stopped => {
                match self.command {
                    Command::MoveToPosition => {
                        let current = self.to.position();
                        if self.target_position > current {
                            self.to.set_direction(Direction::Forward);
                            self.motor.forward(self.motor_pwm);
                            self.timeout_deadline = time_base::future_time(TARGET_POSITION_TIMEOUT_MS);
                            self.state = State::MovingToPosition;
                            self.had_nonzero_speed = false;
                            log::debug!("motion: moving forward to {}", self.target_position);
                        } else if self.target_position < current {
                            self.to.set_direction(Direction::Reverse);
                            self.motor.reverse(self.motor_pwm);
                            self.timeout_deadline = time_base::future_time(TARGET_POSITION_TIMEOUT_MS);
                            self.state = State::MovingToPosition;
                            self.had_nonzero_speed = false;
                            log::debug!("motion: moving reverse to {}", self.target_position);
                        }
                    }
                    Command::FindHomePosition => {
                        if self.home_sensor_ahead() {
                            self.to.set_direction(Direction::Reverse);
                            self.motor.reverse(self.motor_pwm);
                        } else {
                            self.to.set_direction(Direction::Forward);
                            self.motor.forward(self.motor_pwm);
                        }
                        self.timeout_deadline = time_base::future_time(TARGET_POSITION_TIMEOUT_MS);
                        self.state = State::SeekingHome;
                        log::debug!("motion: seeking home");
                    }
                    Command::BrakeToStop | Command::None => {}
                }
                self.command = Command::None;
            }
            State::MovingToPosition => {
                let dir = self.to.direction();
                let pos = self.to.position();
                let speed = self.to.speed();
                if speed != 0 {
                    self.had_nonzero_speed = true;
                }
                let reached = (dir == Direction::Forward && pos >= self.target_position)
                    || (dir == Direction::Reverse && pos <= self.target_position);
                if self.command == Command::BrakeToStop || reached {
                    log::debug!(
                        "motion: reached {} target {} speed {}",
                        pos,
                        self.target_position,
                        speed
                    );
                    if self.command == Command::BrakeToStop {
                        self.command = Command::None;
                    }
                    self.enter_braking();
                } else if time_base::has_arrived(&self.timeout_deadline) {
                    self.motor.coast();
                    self.state = State::Stopped;
                }
            }
            State::BrakingToStop => {
                let speed = self.to.speed();
                if speed != 0 {
                    self.had_nonzero_speed = true;
                }
                if speed == 0 && self.had_nonzero_speed {
                    self.motor.coast();
                    log::debug!("motion: stopped at {}", self.to.position());
                    self.state = State::Stopped;
                }
            }
            State::SeekingHome => {
                if self.to.speed() != 0 {
                    self.had_nonzero_speed = true;
                }
                if self.home_known() || self.command == Command::BrakeToStop {
                    log::debug!("motion: homing speed {}", self.to.speed());
                    self.enter_braking();
                } else if time_base::has_arrived(&self.timeout_deadline) {
                    self.motor.coast();
                    self.state = State::Stopped;
                }
            }
        }
    }
}

impl Default for LinearMotionController {
    fn default() -> Self {
        Self::new()
    }
}
