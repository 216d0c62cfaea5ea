//! Tachometer/odometer: counts shaft-sensor pulses to track motor
//! position and windowed speed.
//!
//! Falling edges only are counted (mirrors `pinChangeNotificationCB`'s
//! `if (!pinState)` guard in the reference firmware). A 200ms window,
//! driven by a [`crate::time_base`] subscription at `TICKS_PER_SECOND /
//! 5`, samples the pulse count into `last_speed` and resets it — the
//! same two-callback split (edge handler + interval handler) as the
//! original `TachometerOdometer`. State is lock-free atomics, the same
//! pattern as the teacher's `sensors/flow.rs` pulse counter.

use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU8, Ordering};

use crate::time_base;

/// Direction the odometer currently counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

static PULSES_THIS_WINDOW: AtomicU8 = AtomicU8::new(0);
static LAST_SPEED: AtomicU8 = AtomicU8::new(0);
static DIRECTION_FORWARD: AtomicBool = AtomicBool::new(true);
static POSITION: AtomicI16 = AtomicI16::new(0);

/// Called from the sensor-pin edge ISR. Only falling edges advance
/// position and the window's pulse count.
pub fn on_sensor_edge(pin_state: bool) {
    if pin_state {
        return;
    }
    let count = PULSES_THIS_WINDOW.load(Ordering::Relaxed);
    if count < u8::MAX {
        PULSES_THIS_WINDOW.store(count + 1, Ordering::Relaxed);
    }
    if DIRECTION_FORWARD.load(Ordering::Relaxed) {
        POSITION.fetch_add(1, Ordering::Relaxed);
    } else {
        POSITION.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Time-base subscription callback: samples the window and resets it.
fn window_tick(_data: *mut ()) {
    let count = PULSES_THIS_WINDOW.swap(0, Ordering::Relaxed);
    LAST_SPEED.store(count, Ordering::Relaxed);
}

/// Test-only: reset all module-level state. Other modules' tests that
/// share this global odometer (e.g. `motion`) call this between cases.
/// Not `#[cfg(test)]`-gated so integration tests in `tests/` — compiled
/// against this crate as an ordinary dependency — can reach it too,
/// matching `drivers::hw_init`'s `sim_set_*` helpers.
#[cfg(not(target_os = "espidf"))]
pub fn reset_for_test() {
    PULSES_THIS_WINDOW.store(0, Ordering::Relaxed);
    LAST_SPEED.store(0, Ordering::Relaxed);
    DIRECTION_FORWARD.store(true, Ordering::Relaxed);
    POSITION.store(0, Ordering::Relaxed);
}

/// A handle onto the module-level tachometer/odometer state. Cheap to
/// construct; all state lives in statics shared with the edge ISR, the
/// same split the teacher's `FlowSensor` uses.
#[derive(Default)]
pub struct TachometerOdometer {
    _private: (),
}

impl TachometerOdometer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Registers the 200ms window subscription. Must be called once
    /// during init, before the timer interrupt is enabled.
    pub fn init(&self) {
        time_base::subscribe(
            (time_base::TICKS_PER_SECOND / 5) as u16,
            window_tick,
            core::ptr::null_mut(),
        );
    }

    pub fn set_direction(&self, dir: Direction) {
        DIRECTION_FORWARD.store(matches!(dir, Direction::Forward), Ordering::Relaxed);
    }

    pub fn direction(&self) -> Direction {
        if DIRECTION_FORWARD.load(Ordering::Relaxed) {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn reset_position_to_zero(&self) {
        POSITION.store(0, Ordering::Relaxed);
    }

    pub fn position(&self) -> i16 {
        POSITION.load(Ordering::Relaxed)
    }

    /// Pulses counted in the most recently completed 200ms window.
    pub fn speed(&self) -> u8 {
        LAST_SPEED.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset() {
        PULSES_THIS_WINDOW.store(0, Ordering::Relaxed);
        LAST_SPEED.store(0, Ordering::Relaxed);
        DIRECTION_FORWARD.store(true, Ordering::Relaxed);
        POSITION.store(0, Ordering::Relaxed);
    }

    #[test]
    fn rising_edges_are_ignored() {
        reset();
        let to = TachometerOdometer::new();
        on_sensor_edge(true);
        on_sensor_edge(true);
        assert_eq!(to.position(), 0);
    }

    #[test]
    fn falling_edges_advance_position_forward() {
        reset();
        let to = TachometerOdometer::new();
        on_sensor_edge(false);
        on_sensor_edge(false);
        on_sensor_edge(false);
        assert_eq!(to.position(), 3);
    }

    #[test]
    fn reverse_direction_decrements_position() {
        reset();
        let to = TachometerOdometer::new();
        to.set_direction(Direction::Reverse);
        on_sensor_edge(false);
        on_sensor_edge(false);
        assert_eq!(to.position(), -2);
    }

    #[test]
    fn pulse_count_saturates_at_255() {
        reset();
        for _ in 0..300 {
            on_sensor_edge(false);
        }
        assert_eq!(PULSES_THIS_WINDOW.load(Ordering::Relaxed), 255);
    }

    #[test]
    fn window_tick_samples_and_resets_speed() {
        reset();
        let to = TachometerOdometer::new();
        on_sensor_edge(false);
        on_sensor_edge(false);
        window_tick(core::ptr::null_mut());
        assert_eq!(to.speed(), 2);
        assert_eq!(PULSES_THIS_WINDOW.load(Ordering::Relaxed), 0);
        window_tick(core::ptr::null_mut());
        assert_eq!(to.speed(), 0);
    }

    #[test]
    fn reset_position_zeroes_odometer() {
        reset();
        let to = TachometerOdometer::new();
        on_sensor_edge(false);
        to.reset_position_to_zero();
        assert_eq!(to.position(), 0);
    }
}
