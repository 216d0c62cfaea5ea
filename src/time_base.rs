//! Cooperative time base: clock-of-day, uptime, tick-notification bus,
//! watchdog keepalive, and shutdown arming.
//!
//! A hardware timer raises an interrupt at [`TICKS_PER_SECOND`] Hz. Every
//! `TICKS_PER_SECOND / 100` ticks advances `hundredths`; every 100
//! hundredths advances `seconds` and `uptime`. Clock fields are lock-free
//! atomics, the same pattern as `sensors/flow.rs`'s pulse counter — the
//! ISR is the sole writer, the main loop only reads. Tick subscribers are
//! held in a fixed-size array of slots (no linked list, no removal — see
//! DESIGN.md), registered once at init before interrupts are enabled, and
//! fire from interrupt context, mirroring the original AVR notification-
//! descriptor chain.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::drivers::watchdog::Watchdog;

/// Hardware tick rate. Matches the reference board's timer/counter-1
/// configuration (divide-by-64 prescale from a 4 MHz reference).
pub const TICKS_PER_SECOND: u32 = 4800;

const MAX_SUBSCRIPTIONS: usize = 4;

/// Watchdog feed period enforced by [`TimeBase::task`].
const NORMAL_WATCHDOG_TIMEOUT_MS: u32 = 500;
/// Widened watchdog window armed by [`TimeBase::commence_shutdown`], long
/// enough for in-flight work to settle before the board resets.
const SHUTDOWN_WATCHDOG_TIMEOUT_MS: u32 = 8_000;

/// A point in clock-of-day time: seconds since midnight-of-epoch plus a
/// hundredths-of-a-second fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemTime {
    pub seconds: u32,
    pub hundredths: u8,
}

impl SystemTime {
    /// `self - other`, in whole seconds, wrap-aware via a signed diff
    /// (mirrors `SystemTime_diffSec` from the reference firmware).
    pub fn diff_seconds(&self, other: &SystemTime) -> i32 {
        self.seconds.wrapping_sub(other.seconds) as i32
    }

    pub fn day_of_week(&self) -> u8 {
        ((self.seconds / 86400) % 7) as u8
    }

    pub fn hours(&self) -> u8 {
        ((self.seconds / 3600) % 24) as u8
    }

    pub fn minutes(&self) -> u8 {
        ((self.seconds / 60) % 60) as u8
    }

    pub fn seconds_component(&self) -> u8 {
        (self.seconds % 60) as u8
    }
}

impl fmt::Display for SystemTime {
    /// `D:HH:MM:SS`, matching `SystemTime_appendToString`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02}:{:02}:{:02}",
            self.day_of_week(),
            self.hours(),
            self.minutes(),
            self.seconds_component()
        )
    }
}

/// Callback invoked from interrupt context when a tick subscription's
/// countdown reaches zero. Plain function pointer, not a closure — the
/// ISR cannot safely capture or drop heap state.
pub type TickCallback = fn(*mut ());

#[derive(Clone, Copy)]
struct Subscription {
    scale_factor: u16,
    ticks_remaining: u16,
    callback: TickCallback,
    data: *mut (),
}

// Clock state: lock-free atomics, sole writer is `on_tick()`.
static TICK_COUNTER: AtomicU32 = AtomicU32::new(0);
static CLOCK_SECONDS: AtomicU32 = AtomicU32::new(0);
static CLOCK_HUNDREDTHS: AtomicU8 = AtomicU8::new(0);
static UPTIME_SECONDS: AtomicU32 = AtomicU32::new(0);
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

// Subscription table: written only during single-threaded init, before
// the timer interrupt is enabled; thereafter mutated only by `on_tick()`.
//
// SAFETY: no concurrent writers exist once interrupts are live — see
// `subscribe()`'s contract.
static mut SUBSCRIPTIONS: [Option<Subscription>; MAX_SUBSCRIPTIONS] = [None; MAX_SUBSCRIPTIONS];

#[cfg(target_os = "espidf")]
fn critical<R>(f: impl FnOnce() -> R) -> R {
    esp_idf_hal::interrupt::free(f)
}

#[cfg(not(target_os = "espidf"))]
fn critical<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Advance the clock by one tick. Called from the hardware timer ISR on
/// target, and directly by tests/simulation on host.
pub fn on_tick() {
    if TICK_COUNTER.fetch_add(1, Ordering::Relaxed) + 1 >= TICKS_PER_SECOND / 100 {
        TICK_COUNTER.store(0, Ordering::Relaxed);
        let hundredths = CLOCK_HUNDREDTHS.fetch_add(1, Ordering::Relaxed) + 1;
        if hundredths >= 100 {
            CLOCK_HUNDREDTHS.store(0, Ordering::Relaxed);
            CLOCK_SECONDS.fetch_add(1, Ordering::Relaxed);
            UPTIME_SECONDS.fetch_add(1, Ordering::Relaxed);
        }
    }

    // SAFETY: sole writer to `ticks_remaining`, and the only reader —
    // see module docs.
    unsafe {
        #[allow(static_mut_refs)]
        for slot in SUBSCRIPTIONS.iter_mut().flatten() {
            slot.ticks_remaining -= 1;
            if slot.ticks_remaining == 0 {
                slot.ticks_remaining = slot.scale_factor;
                (slot.callback)(slot.data);
            }
        }
    }
}

/// Handle to a registered subscription (its slot index).
pub type SubscriptionHandle = usize;

/// Register a tick subscriber. The callback runs in interrupt context
/// every `scale` ticks, indefinitely — there is no unsubscribe, matching
/// the reference firmware (subscriptions live for the process lifetime).
///
/// Must be called before the timer interrupt is enabled: subscription
/// slots are not synchronized against concurrent ticks.
pub fn subscribe(scale: u16, callback: TickCallback, data: *mut ()) -> Option<SubscriptionHandle> {
    debug_assert!(scale >= 1);
    // SAFETY: caller contract is single-threaded init, before interrupts
    // are enabled.
    unsafe {
        #[allow(static_mut_refs)]
        for (i, slot) in SUBSCRIPTIONS.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Subscription {
                    scale_factor: scale,
                    ticks_remaining: scale,
                    callback,
                    data,
                });
                return Some(i);
            }
        }
    }
    log::warn!("time_base: subscription table full, dropped");
    None
}

/// Test-only: reset the clock and subscription table. Not
/// `#[cfg(test)]`-gated so integration tests in `tests/` — compiled
/// against this crate as an ordinary dependency — can reach it too,
/// matching `tacho::reset_for_test()`/`hw_init`'s `sim_set_*` helpers.
#[cfg(not(target_os = "espidf"))]
pub fn reset_for_test() {
    TICK_COUNTER.store(0, Ordering::Relaxed);
    CLOCK_SECONDS.store(0, Ordering::Relaxed);
    CLOCK_HUNDREDTHS.store(0, Ordering::Relaxed);
    UPTIME_SECONDS.store(0, Ordering::Relaxed);
    SHUTTING_DOWN.store(false, Ordering::Relaxed);
    // SAFETY: test-only reset; host tests are single-threaded w.r.t. this
    // table (no ISR exists on host).
    unsafe {
        #[allow(static_mut_refs)]
        {
            SUBSCRIPTIONS = [None; MAX_SUBSCRIPTIONS];
        }
    }
}

/// Snapshot the current clock-of-day time. Reads `seconds` before
/// `hundredths`, bracketed so a tick landing mid-read can only ever be
/// observed as "not yet advanced", never as a torn wrap.
pub fn now() -> SystemTime {
    critical(|| SystemTime {
        seconds: CLOCK_SECONDS.load(Ordering::Acquire),
        hundredths: CLOCK_HUNDREDTHS.load(Ordering::Acquire),
    })
}

/// Seconds elapsed since boot, monotonic for the process lifetime.
pub fn uptime() -> u32 {
    UPTIME_SECONDS.load(Ordering::Acquire)
}

/// A deadline `ms` milliseconds in the future.
pub fn future_time(ms: u32) -> SystemTime {
    let mut t = now();
    let add_hundredths = ms / 10;
    let total = t.hundredths as u32 + add_hundredths;
    t.hundredths = (total % 100) as u8;
    t.seconds = t.seconds.wrapping_add(total / 100);
    t
}

/// True once `now()` has reached or passed `deadline` — wrap-aware via a
/// signed seconds diff (mirrors `SystemTime_diffSec`).
pub fn has_arrived(deadline: &SystemTime) -> bool {
    let n = now();
    let diff = n.diff_seconds(deadline);
    diff > 0 || (diff == 0 && n.hundredths >= deadline.hundredths)
}

pub fn shutting_down() -> bool {
    SHUTTING_DOWN.load(Ordering::Acquire)
}

/// Main-loop owner of the watchdog and shutdown sequencing.
pub struct TimeBase {
    watchdog: Watchdog,
    reboot_interval_minutes: u16,
}

impl TimeBase {
    /// `reboot_interval_minutes` comes from [`crate::config::Parameters`];
    /// `0` disables the forced-reboot check.
    pub fn new(reboot_interval_minutes: u16) -> Self {
        Self {
            watchdog: Watchdog::new(NORMAL_WATCHDOG_TIMEOUT_MS),
            reboot_interval_minutes,
        }
    }

    pub fn set_reboot_interval_minutes(&mut self, minutes: u16) {
        self.reboot_interval_minutes = minutes;
    }

    /// Feed the watchdog and arm shutdown if the reboot interval has
    /// elapsed. Must be called at least once every
    /// `NORMAL_WATCHDOG_TIMEOUT_MS`.
    pub fn task(&mut self) {
        if shutting_down() {
            return;
        }
        self.watchdog.feed();

        if self.reboot_interval_minutes > 0 {
            let reboot_interval_seconds = u32::from(self.reboot_interval_minutes) * 60;
            if uptime() > reboot_interval_seconds {
                self.commence_shutdown();
            }
        }
    }

    /// Begin an irreversible shutdown: arms an 8-second watchdog window
    /// and marks `shutting_down()` true. Idempotent.
    pub fn commence_shutdown(&mut self) {
        if SHUTTING_DOWN.swap(true, Ordering::AcqRel) {
            return;
        }
        log::warn!("time_base: shutting down...");
        self.watchdog.rearm(SHUTDOWN_WATCHDOG_TIMEOUT_MS);
        self.watchdog.feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_state() {
        reset_for_test();
    }

    fn tick_n(n: u32) {
        for _ in 0..n {
            on_tick();
        }
    }

    #[test]
    fn one_second_of_ticks_advances_clock() {
        reset_state();
        tick_n(TICKS_PER_SECOND);
        let t = now();
        assert_eq!(t.seconds, 1);
        assert_eq!(t.hundredths, 0);
        assert_eq!(uptime(), 1);
    }

    #[test]
    fn partial_second_advances_hundredths_only() {
        reset_state();
        tick_n(TICKS_PER_SECOND / 100 * 37);
        let t = now();
        assert_eq!(t.seconds, 0);
        assert_eq!(t.hundredths, 37);
    }

    #[test]
    fn subscription_fires_every_scale_ticks() {
        reset_state();
        use core::sync::atomic::AtomicU32 as Counter;
        static HITS: Counter = Counter::new(0);
        fn cb(_data: *mut ()) {
            HITS.fetch_add(1, Ordering::Relaxed);
        }
        HITS.store(0, Ordering::Relaxed);
        subscribe(10, cb, core::ptr::null_mut());
        tick_n(100);
        assert_eq!(HITS.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn has_arrived_is_true_once_deadline_passes() {
        reset_state();
        let deadline = future_time(10);
        assert!(!has_arrived(&deadline));
        tick_n(TICKS_PER_SECOND / 100 * 11);
        assert!(has_arrived(&deadline));
    }

    #[test]
    fn commence_shutdown_is_idempotent() {
        reset_state();
        let mut tb = TimeBase::new(0);
        tb.commence_shutdown();
        assert!(shutting_down());
        tb.commence_shutdown();
        assert!(shutting_down());
    }

    #[test]
    fn reboot_interval_triggers_shutdown() {
        reset_state();
        let mut tb = TimeBase::new(1); // 1 minute
        tick_n(TICKS_PER_SECOND * 61);
        tb.task();
        assert!(shutting_down());
    }
}
