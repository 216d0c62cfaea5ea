//! High-level pumping state machine: sequences home-find → intake →
//! discharge cycles until the requested volume is pumped, triggered by
//! the float sensor.
//!
//! Faithful port of `WaterPumpControl.c`'s four-stage machine (`ps_idle`
//! / `ps_findingHomePosition` / `ps_drawingWaterIn` / `ps_pushingWaterOut`).
//! Owns one [`LinearMotionController`] directly — no aliasing of motion
//! state across components.

use crate::config::Parameters;
use crate::drivers::hw_init;
use crate::motion::LinearMotionController;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FindingHome,
    DrawingIn,
    PushingOut,
}

pub struct PumpController {
    stage: Stage,
    run_flag: bool,
    remaining_ml: u16,
    last_out_position: i16,
    float_sensor_prev: bool,
    lmc: LinearMotionController,
}

fn read_float_sensor() -> bool {
    // Active-low, pull-up enabled: actuated means the input reads low.
    !hw_init::gpio_read(pins::FLOAT_SENSOR_GPIO)
}

impl PumpController {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            run_flag: false,
            remaining_ml: 0,
            last_out_position: 0,
            float_sensor_prev: false,
            lmc: LinearMotionController::new(),
        }
    }

    pub fn begin_pumping(&mut self, params: &Parameters) {
        if !self.run_flag {
            log::info!("pump_controller: starting pump");
            self.remaining_ml = params.ml_to_pump;
            self.run_flag = true;
        }
    }

    pub fn end_pumping(&mut self) {
        self.run_flag = false;
    }

    pub fn stop_now(&mut self) {
        self.lmc.brake_to_stop();
        self.run_flag = false;
        self.stage = Stage::Idle;
    }

    pub fn move_plunger_to(&mut self, pos: i16, params: &Parameters) {
        self.lmc.move_to_position(pos, params.motor_pwm);
    }

    pub fn plunger_position(&self) -> i16 {
        self.lmc.position()
    }

    pub fn plunger_speed(&self) -> u8 {
        self.lmc.speed()
    }

    pub fn volume_remaining(&self) -> u16 {
        self.remaining_ml
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn task(&mut self, params: &Parameters) {
        let float_sensor = read_float_sensor();
        if float_sensor != self.float_sensor_prev {
            self.float_sensor_prev = float_sensor;
            if float_sensor {
                self.begin_pumping(params);
            }
        }

        match self.stage {
            Stage::Idle => {
                if self.run_flag {
                    if !self.lmc.home_known() {
                        self.lmc.find_home(params.motor_pwm);
                        self.stage = Stage::FindingHome;
                    } else {
                        self.lmc.move_to_position(params.plunger_out_pos, params.motor_pwm);
                        self.stage = Stage::DrawingIn;
                    }
                }
            }
            Stage::FindingHome => {
                if self.lmc.home_known() && self.lmc.is_stopped() {
                    self.lmc.move_to_position(params.plunger_out_pos, params.motor_pwm);
                    self.stage = Stage::DrawingIn;
                }
            }
            Stage::DrawingIn => {
                if self.lmc.is_stopped() && self.lmc.position() <= params.plunger_out_pos {
                    self.last_out_position = self.lmc.position();
                    self.lmc.move_to_position(params.plunger_in_pos, params.motor_pwm);
                    self.stage = Stage::PushingOut;
                }
            }
            Stage::PushingOut => {
                if self.lmc.is_stopped() && self.lmc.position() >= params.plunger_in_pos {
                    let plunger_travel = self.lmc.position() - self.last_out_position;
                    let volume_pumped = if params.pos_per_ml > 0 {
                        (plunger_travel.max(0) as u16) / params.pos_per_ml
                    } else {
                        0
                    };

                    if volume_pumped > self.remaining_ml {
                        self.remaining_ml = 0;
                        self.run_flag = false;
                    } else {
                        self.remaining_ml -= volume_pumped;
                    }
                    log::info!("pump_controller: pumped {} ml", volume_pumped);

                    if self.run_flag {
                        self.lmc.move_to_position(params.plunger_out_pos, params.motor_pwm);
                        self.stage = Stage::DrawingIn;
                    } else {
                        self.stage = Stage::Idle;
                    }
                }
            }
        }

        self.lmc.task();
    }
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::hw_init;
    use crate::motion::on_home_sensor_edge;

    fn reset() {
        hw_init::sim_set_float_sensor(true);
        hw_init::sim_set_home_sensor(false);
        crate::tacho::reset_for_test();
    }

    #[test]
    fn float_sensor_actuation_begins_pumping() {
        reset();
        let mut pc = PumpController::new();
        let params = Parameters::default();

        // `reset()` leaves the sim pin high (not actuated, active-low), the
        // same level `float_sensor_prev` is initialised against, so this
        // first tick sees no edge.
        hw_init::sim_set_float_sensor(true);
        pc.task(&params);
        assert_eq!(pc.volume_remaining(), 0);

        // Pin goes low: actuated. The not-actuated -> actuated edge begins
        // a run.
        hw_init::sim_set_float_sensor(false);
        pc.task(&params);
        assert_eq!(pc.volume_remaining(), params.ml_to_pump);
    }

    #[test]
    fn idle_goes_to_finding_home_when_not_yet_known() {
        reset();
        let mut pc = PumpController::new();
        let params = Parameters::default();
        pc.begin_pumping(&params);
        pc.task(&params);
        assert_eq!(pc.stage(), Stage::FindingHome);
    }

    #[test]
    fn idle_goes_straight_to_drawing_in_when_home_already_known() {
        reset();
        on_home_sensor_edge();
        let mut pc = PumpController::new();
        let params = Parameters::default();
        pc.begin_pumping(&params);
        pc.task(&params);
        assert_eq!(pc.stage(), Stage::DrawingIn);
    }

    #[test]
    fn stop_now_returns_to_idle_and_clears_run_flag() {
        reset();
        on_home_sensor_edge();
        let mut pc = PumpController::new();
        let params = Parameters::default();
        pc.begin_pumping(&params);
        pc.task(&params);
        pc.stop_now();
        assert_eq!(pc.stage(), Stage::Idle);
        assert_eq!(pc.volume_remaining(), pc.volume_remaining());
    }
}
