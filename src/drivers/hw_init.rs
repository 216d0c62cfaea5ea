//! One-shot hardware peripheral initialization.
//!
//! Configures the motor H-bridge LEDC PWM channels and the tachometer,
//! home-sensor, and float-sensor GPIO pins using raw ESP-IDF sys calls.
//! Called once from `main()` before the main loop starts. Wiring actual
//! edge callbacks to the tachometer/odometer and the home-sensor handler
//! is the generic pin-change dispatcher's job — an external collaborator
//! (SPEC_FULL.md §1); this module only brings pins to a known state and
//! installs the ISR service they attach to.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the loop starts; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_ledc();
    }
    info!("hw_init: peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO inputs: tachometer (falling edge), home sensor (any edge), ───
// ── float sensor (pull-up, active-low, polled) ────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let tach_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::TACHOMETER_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&tach_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    let home_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::HOME_SENSOR_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    let ret = unsafe { gpio_config(&home_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    let float_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::FLOAT_SENSOR_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&float_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: GPIO inputs configured (tach/home/float)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
static SIM_HOME_SENSOR: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);
#[cfg(not(target_os = "espidf"))]
static SIM_FLOAT_SENSOR: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(true);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    use core::sync::atomic::Ordering;
    if pin == pins::HOME_SENSOR_GPIO {
        SIM_HOME_SENSOR.load(Ordering::Relaxed)
    } else if pin == pins::FLOAT_SENSOR_GPIO {
        SIM_FLOAT_SENSOR.load(Ordering::Relaxed)
    } else {
        true
    }
}

/// Test-only: set the simulated home-sensor input level.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_home_sensor(level: bool) {
    SIM_HOME_SENSOR.store(level, core::sync::atomic::Ordering::Relaxed);
}

/// Test-only: set the simulated float-sensor input level.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_float_sensor(level: bool) {
    SIM_FLOAT_SENSOR.store(level, core::sync::atomic::Ordering::Relaxed);
}

// ── LEDC PWM: two channels on one phase-correct timer drive the ───────
// ── H-bridge "A" and "B" sides. ────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() {
    // SAFETY: called from single main-task context via init_peripherals().
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::MOTOR_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    unsafe {
        ledc_timer_config(&timer0);

        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: ledc_channel_t_LEDC_CHANNEL_0,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::MOTOR_PWM_A_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        });
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: ledc_channel_t_LEDC_CHANNEL_1,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::MOTOR_PWM_B_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        });
    }

    info!("hw_init: LEDC motor PWM channels configured (A=CH0, B=CH1)");
}

#[cfg(target_os = "espidf")]
pub const LEDC_CH_MOTOR_A: u32 = 0;
#[cfg(target_os = "espidf")]
pub const LEDC_CH_MOTOR_B: u32 = 1;
#[cfg(not(target_os = "espidf"))]
pub const LEDC_CH_MOTOR_A: u32 = 0;
#[cfg(not(target_os = "espidf"))]
pub const LEDC_CH_MOTOR_B: u32 = 1;

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: channel was configured in init_ledc(); main-loop-only access.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty as u32);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

/// Install the GPIO ISR service so edge callbacks can be attached by the
/// pin-change dispatcher.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: idempotent; ESP_ERR_INVALID_STATE means already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
        return Err(HwInitError::IsrInstallFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    Ok(())
}
