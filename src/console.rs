//! Serial console: line-oriented command input with ANSI-redraw echo.
//!
//! Ports `Console.c`'s byte-at-a-time collector: CR completes a line and
//! dispatches it, `0x7F` deletes the last character, every other byte
//! is appended to the buffer. After each received byte the current
//! buffer is redrawn — `\r`, the buffer contents, erase-to-end-of-line —
//! matching `Console_task`'s `Console_printP(crP)` / `Console_print
//! (ESC_ERASE_LINE)` sequence. A completed line's reply (if non-empty)
//! is printed followed by CRLF.

use crate::dispatcher::{CommandContext, CommandDispatcher};

/// Mirrors the reference firmware's `CharString_define(80, ...)` cap on
/// the incoming-command buffer.
const MAX_LINE_LEN: usize = 80;
const ESC_ERASE_LINE: &str = "\x1b[K";

/// Byte-level transport the console reads from and writes to. A real
/// UART on ESP-IDF, an in-memory queue in tests — the same split as the
/// teacher's driver modules (real peripheral vs. simulated state).
pub trait Transport {
    /// Non-blocking: `None` if no byte is currently available.
    fn read_byte(&mut self) -> Option<u8>;
    fn write_bytes(&mut self, bytes: &[u8]);
}

pub struct Console<T: Transport> {
    transport: T,
    line: String,
    dispatcher: CommandDispatcher,
}

impl<T: Transport> Console<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            line: String::new(),
            dispatcher: CommandDispatcher::new(),
        }
    }

    fn print(&mut self, s: &str) {
        self.transport.write_bytes(s.as_bytes());
    }

    /// Access to the underlying transport, for feeding simulated input
    /// and inspecting output in tests.
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drains all currently available input bytes, executing any
    /// complete lines against `ctx`. Called once per main-loop iteration.
    pub fn task(&mut self, ctx: &mut CommandContext<'_>) {
        while let Some(byte) = self.transport.read_byte() {
            match byte {
                b'\r' => {
                    self.print("\r\n");
                    let line = core::mem::take(&mut self.line);
                    let reply = self.dispatcher.execute(&line, ctx);
                    if !reply.is_empty() {
                        self.print(&reply);
                        self.print("\r\n");
                    }
                }
                0x7f => {
                    self.line.pop();
                }
                byte if self.line.len() < MAX_LINE_LEN => {
                    self.line.push(byte as char);
                }
                _ => {}
            }
            self.print("\r");
            let echoed = self.line.clone();
            self.print(&echoed);
            self.print(ESC_ERASE_LINE);
        }
    }
}

// ---------------------------------------------------------------------------
// UART transport (ESP-IDF)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// esp-idf-sys doesn't bind UART_PIN_NO_CHANGE as a named constant; -1
// is its documented value (leave the pin's existing routing alone).
#[cfg(target_os = "espidf")]
const UART_PIN_NO_CHANGE: i32 = -1;

#[cfg(target_os = "espidf")]
const UART_NUM: uart_port_t = uart_port_t_UART_NUM_1;

/// Drives the console UART via direct `esp-idf-sys` calls, matching
/// `drivers::hw_init`'s style of raw peripheral setup rather than the
/// `esp-idf-hal` wrappers.
#[cfg(target_os = "espidf")]
pub struct UartTransport;

#[cfg(target_os = "espidf")]
impl UartTransport {
    /// Installs the UART driver at `pins::CONSOLE_BAUD_RATE`, 8N1, on
    /// `pins::UART_TX_GPIO`/`UART_RX_GPIO`. Called once at init.
    pub fn new() -> Result<Self, crate::error::ConsoleError> {
        let cfg = uart_config_t {
            baud_rate: crate::pins::CONSOLE_BAUD_RATE as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        // SAFETY: called once from main() before the loop starts.
        unsafe {
            if uart_param_config(UART_NUM, &cfg) != ESP_OK {
                return Err(crate::error::ConsoleError::ConfigFailed);
            }
            if uart_set_pin(
                UART_NUM,
                crate::pins::UART_TX_GPIO,
                crate::pins::UART_RX_GPIO,
                UART_PIN_NO_CHANGE,
                UART_PIN_NO_CHANGE,
            ) != ESP_OK
            {
                return Err(crate::error::ConsoleError::ConfigFailed);
            }
            if uart_driver_install(UART_NUM, 256, 256, 0, core::ptr::null_mut(), 0) != ESP_OK {
                return Err(crate::error::ConsoleError::ConfigFailed);
            }
        }
        Ok(Self)
    }
}

#[cfg(target_os = "espidf")]
impl Transport for UartTransport {
    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        // SAFETY: driver installed in `new()`; zero-tick timeout never blocks.
        let n = unsafe { uart_read_bytes(UART_NUM, buf.as_mut_ptr() as *mut _, 1, 0) };
        if n == 1 {
            Some(buf[0])
        } else {
            None
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        // SAFETY: driver installed in `new()`.
        unsafe {
            uart_write_bytes(UART_NUM, bytes.as_ptr() as *const _, bytes.len());
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory transport (host / simulation)
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimTransport {
    input: std::collections::VecDeque<u8>,
    pub output: Vec<u8>,
}

#[cfg(not(target_os = "espidf"))]
impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if typed at the terminal.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn output_as_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for SimTransport {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;
    use crate::pump_controller::PumpController;
    use crate::store::InMemoryStore;

    fn run_line(console: &mut Console<SimTransport>, line: &str, ctx: &mut CommandContext<'_>) {
        console.transport.feed(line.as_bytes());
        console.transport.feed(b"\r");
        console.task(ctx);
    }

    #[test]
    fn ver_command_echoes_and_replies() {
        let mut console = Console::new(SimTransport::new());
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = CommandContext {
            pump: &mut pump,
            params: &mut params,
            store: &mut store,
        };
        run_line(&mut console, "ver", &mut ctx);
        let out = console.transport.output_as_str();
        assert!(out.contains("V1.0"));
    }

    #[test]
    fn backspace_removes_last_character() {
        let mut console = Console::new(SimTransport::new());
        console.transport.feed(b"abx");
        console.transport.feed(&[0x7f]);
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = CommandContext {
            pump: &mut pump,
            params: &mut params,
            store: &mut store,
        };
        console.task(&mut ctx);
        assert_eq!(console.line, "ab");
    }

    #[test]
    fn unknown_command_replies_error() {
        let mut console = Console::new(SimTransport::new());
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = CommandContext {
            pump: &mut pump,
            params: &mut params,
            store: &mut store,
        };
        run_line(&mut console, "bogus", &mut ctx);
        assert!(console.transport.output_as_str().contains("error"));
    }
}
