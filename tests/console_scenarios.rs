//! End-to-end console scenarios: a line of input in, a reply out, driven
//! through the full `Console` + `CommandDispatcher` + `PumpController`
//! stack exactly as `main()`'s loop wires them together.

#![cfg(not(target_os = "espidf"))]

use waterpump::config::Parameters;
use waterpump::console::{Console, SimTransport};
use waterpump::dispatcher::CommandContext;
use waterpump::drivers::hw_init;
use waterpump::motion;
use waterpump::pump_controller::{PumpController, Stage};
use waterpump::store::InMemoryStore;
use waterpump::tacho;

fn send(console: &mut Console<SimTransport>, line: &str, ctx: &mut CommandContext<'_>) -> String {
    console.transport().clear_output();
    console.transport().feed(line.as_bytes());
    console.transport().feed(b"\r");
    console.task(ctx);
    console.transport().output_as_str()
}

fn reset_sim() {
    waterpump::time_base::reset_for_test();
    hw_init::sim_set_home_sensor(false);
    hw_init::sim_set_float_sensor(true);
    tacho::reset_for_test();
}

/// a. `ver` replies with the firmware version.
#[test]
fn scenario_ver_replies_with_version() {
    reset_sim();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters::default();
    let mut store = InMemoryStore::new();
    let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };

    let out = send(&mut console, "ver", &mut ctx);
    assert!(out.contains("V1.0"));
}

/// b. `set posPerMl 150` then `get params` shows the updated value.
#[test]
fn scenario_set_then_get_params_reflects_change() {
    reset_sim();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters::default();
    let mut store = InMemoryStore::new();
    let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };

    send(&mut console, "set posPerMl 150", &mut ctx);
    let out = send(&mut console, "get params", &mut ctx);
    assert!(out.contains("\"posPerMl\":150"));
}

/// c. `move 200` before any home-find performs no motion.
#[test]
fn scenario_move_before_home_find_is_refused() {
    reset_sim();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters::default();
    let mut store = InMemoryStore::new();

    {
        let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };
        send(&mut console, "move 200", &mut ctx);
    }
    assert_eq!(pump.plunger_position(), 0);
}

/// d. After a home-find, `move 100` drives forward and stops at 100.
#[test]
fn scenario_move_after_home_find_reaches_target() {
    reset_sim();
    motion::on_home_sensor_edge();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters::default();
    let mut store = InMemoryStore::new();

    {
        let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };
        send(&mut console, "move 100", &mut ctx);
    }

    // Applies the latched command: the controller picks a direction and
    // starts driving, as the first `task()` after the command is latched.
    pump.task(&params);

    for _ in 0..100 {
        if pump.plunger_position() >= 100 {
            break;
        }
        tacho::on_sensor_edge(false);
        pump.task(&params);
    }
    assert_eq!(pump.plunger_position(), 100);
}

/// e. A full `begin` pump cycle with `mlToPump = 1` drains to zero and
/// returns to Idle (see DESIGN.md's "volume-remaining termination" note
/// on why this takes one cycle beyond the one that zeroes the count).
#[test]
fn scenario_begin_drains_to_idle() {
    reset_sim();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters {
        plunger_in_pos: 50,
        plunger_out_pos: -50,
        pos_per_ml: 100,
        ml_to_pump: 1,
        motor_pwm: 100,
        temp_cal_offset: -266,
        reboot_interval: 1440,
    };
    let mut store = InMemoryStore::new();

    {
        let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };
        send(&mut console, "begin", &mut ctx);
    }
    assert_eq!(pump.volume_remaining(), 1);

    for _ in 0..2000 {
        pump.task(&params);
        match pump.stage() {
            Stage::FindingHome => {
                // A pulse per iteration so the speed window samples a
                // nonzero value at least once, letting the controller's
                // braking-to-stop transition complete.
                tacho::on_sensor_edge(false);
                motion::on_home_sensor_edge();
            }
            Stage::DrawingIn => {
                while pump.plunger_position() > params.plunger_out_pos {
                    tacho::on_sensor_edge(false);
                }
            }
            Stage::PushingOut => {
                while pump.plunger_position() < params.plunger_in_pos {
                    tacho::on_sensor_edge(false);
                }
            }
            Stage::Idle => break,
        }
        for _ in 0..(waterpump::time_base::TICKS_PER_SECOND / 5) {
            waterpump::time_base::on_tick();
        }
    }

    assert_eq!(pump.stage(), Stage::Idle);
    assert_eq!(pump.volume_remaining(), 0);
}

/// f. `stop` mid-cycle brakes and returns to Idle with the run flag clear.
#[test]
fn scenario_stop_mid_cycle_returns_to_idle() {
    reset_sim();
    motion::on_home_sensor_edge();
    let mut console = Console::new(SimTransport::new());
    let mut pump = PumpController::new();
    let mut params = Parameters::default();
    let mut store = InMemoryStore::new();

    {
        let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };
        send(&mut console, "begin", &mut ctx);
    }
    pump.task(&params);
    assert_eq!(pump.stage(), Stage::DrawingIn);

    {
        let mut ctx = CommandContext { pump: &mut pump, params: &mut params, store: &mut store };
        send(&mut console, "stop", &mut ctx);
    }
    assert_eq!(pump.stage(), Stage::Idle);
}
