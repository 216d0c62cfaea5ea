//! Water-pump appliance firmware — entry point.
//!
//! Initializes components in dependency order, enables interrupts, then
//! loops forever invoking each component's tick function. No explicit
//! sleep: the 4800 Hz timer interrupt defines the tempo; the main loop
//! itself never blocks. Host-target testing exercises the library crate
//! directly (unit tests and `tests/`), never this entry point — this
//! binary only ever builds for the `espidf` target, matching the
//! `required-features` gate in `Cargo.toml`.

#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use waterpump::console::{Console, UartTransport};
use waterpump::dispatcher::CommandContext;
use waterpump::drivers;
use waterpump::pump_controller::PumpController;
use waterpump::sentinel;
use waterpump::store::{NvsParameterStore, ParameterStore};
use waterpump::time_base::TimeBase;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("waterpump: booting");

    if let Err(e) = drivers::hw_init::init_peripherals() {
        log::error!("waterpump: peripheral init failed: {e} — halting for watchdog reset");
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = drivers::hw_init::init_isr_service() {
        warn!("waterpump: GPIO ISR service init failed: {e}");
    }

    let mut store = NvsParameterStore::new()?;
    let mut params = store.load();
    info!("waterpump: parameters loaded ({:?})", params);

    let mut time_base = TimeBase::new(params.reboot_interval);
    let mut pump = PumpController::new();
    let mut console = Console::new(
        UartTransport::new().map_err(|e| anyhow::anyhow!("console UART init failed: {e}"))?,
    );

    // SAFETY: all `time_base::subscribe` calls (via `TachometerOdometer::init`,
    // invoked from `LinearMotionController::new` inside `PumpController::new`)
    // have already run; interrupts are enabled only after this point.
    //
    // Wiring the 4800 Hz hardware timer to `time_base::on_tick()` and the
    // tachometer/home-sensor GPIO edges to `tacho::on_sensor_edge`/
    // `motion::on_home_sensor_edge` is done by the generic pin-change and
    // timer-ISR dispatchers (external collaborators per SPEC_FULL §1); this
    // crate only brings the peripherals to a known state.

    info!("waterpump: entering main loop");
    loop {
        time_base.task();
        pump.task(&params);

        let mut ctx = CommandContext {
            pump: &mut pump,
            params: &mut params,
            store: &mut store,
        };
        console.task(&mut ctx);

        if !sentinel::sentinel_intact() {
            warn!("waterpump: RAM sentinel corrupted, commencing shutdown");
            time_base.commence_shutdown();
        }
    }
}
