//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if it isn't fed inside
//! its configured timeout. Two instances exist at different timeouts
//! (SPEC_FULL.md §4.1): the normal run loop feeds one every tick with a
//! sub-second timeout, and `commence_shutdown` reconfigures it to an
//! 8-second window so a hung shutdown still resets the board.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout_ms: u32,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT with the
    /// given timeout.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed, timeout_ms }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op ({}ms timeout)", timeout_ms);
            Self { timeout_ms }
        }
    }

    /// Reconfigure the timeout of an already-subscribed watchdog, e.g. to
    /// arm the wider shutdown window.
    pub fn rearm(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT rearm to {}ms returned {}", timeout_ms, ret);
                }
            }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): rearmed to {}ms", timeout_ms);
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feed the watchdog. Must be called at least once per configured
    /// timeout window.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_configured_timeout() {
        let wd = Watchdog::new(500);
        assert_eq!(wd.timeout_ms(), 500);
    }

    #[test]
    fn rearm_updates_timeout() {
        let mut wd = Watchdog::new(500);
        wd.rearm(8_000);
        assert_eq!(wd.timeout_ms(), 8_000);
    }
}
