//! Command dispatcher: parses a console line into a verb and integer
//! arguments and mutates parameters or issues pump/motor commands.
//!
//! Faithful port of `CommandProcessor_executeCommand`'s verb table.
//! Verbs are matched case-insensitively; unknown verbs or bad argument
//! parsing both flip the reply to the literal `"error"`, matching the
//! reference's `validCommand` flag.

use crate::config::Parameters;
use crate::json::JsonReply;
use crate::pump_controller::PumpController;
use crate::store::ParameterStore;
use crate::time_base;

/// Firmware version string printed by `ver`.
const VERSION: &str = "V1.0";

/// Bundles the mutable state a command may need to read or change.
/// `store` is a trait object so [`crate::console::Console`] stays
/// generic only over its transport, not over the storage backend.
pub struct CommandContext<'a> {
    pub pump: &'a mut PumpController,
    pub params: &'a mut Parameters,
    pub store: &'a mut dyn ParameterStore,
}

#[derive(Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&mut self, line: &str, ctx: &mut CommandContext<'_>) -> String {
        let mut rest = line;
        let verb = next_token(&mut rest);
        if verb.is_empty() {
            return String::new();
        }

        let mut valid = true;
        let reply = self.dispatch_verb(verb, rest, ctx, &mut valid);

        if valid {
            reply
        } else {
            "error".to_string()
        }
    }

    fn dispatch_verb(
        &mut self,
        verb: &str,
        mut rest: &str,
        ctx: &mut CommandContext<'_>,
        valid: &mut bool,
    ) -> String {
        if verb.eq_ignore_ascii_case("s") {
            let mut reply = JsonReply::new();
            reply
                .append_time_value("t", &time_base::now())
                .append_int_value("pos", i32::from(ctx.pump.plunger_position()))
                .append_int_value("speed", i32::from(ctx.pump.plunger_speed()))
                .append_int_value("volumeRemaining", i32::from(ctx.pump.volume_remaining()));
            reply.finish()
        } else if verb.eq_ignore_ascii_case("settings") {
            "{}".to_string()
        } else if verb.eq_ignore_ascii_case("set") {
            self.handle_set(&mut rest, ctx, valid);
            String::new()
        } else if verb.eq_ignore_ascii_case("get") {
            self.handle_get(&mut rest, ctx, valid)
        } else if verb.eq_ignore_ascii_case("begin") {
            ctx.pump.begin_pumping(ctx.params);
            String::new()
        } else if verb.eq_ignore_ascii_case("end") {
            ctx.pump.end_pumping();
            String::new()
        } else if verb.eq_ignore_ascii_case("move") {
            if let Some(pos) = scan_i16(&mut rest) {
                ctx.pump.move_plunger_to(pos, ctx.params);
            } else {
                *valid = false;
            }
            String::new()
        } else if verb.eq_ignore_ascii_case("stop") {
            ctx.pump.stop_now();
            String::new()
        } else if verb.eq_ignore_ascii_case("eeread") {
            self.handle_eeread(&mut rest, ctx, valid)
        } else if verb.eq_ignore_ascii_case("eewrite") {
            self.handle_eewrite(&mut rest, ctx, valid);
            String::new()
        } else if verb.eq_ignore_ascii_case("ver") {
            VERSION.to_string()
        } else {
            *valid = false;
            String::new()
        }
    }

    fn handle_set(&mut self, rest: &mut &str, ctx: &mut CommandContext<'_>, valid: &mut bool) {
        let name = next_token(rest);
        let Some(value) = scan_i32(rest) else {
            *valid = false;
            return;
        };
        if name.eq_ignore_ascii_case("tCalOffset") {
            ctx.params.temp_cal_offset = value as i16;
        } else if name.eq_ignore_ascii_case("inPos") {
            ctx.params.plunger_in_pos = value as i16;
        } else if name.eq_ignore_ascii_case("outPos") {
            ctx.params.plunger_out_pos = value as i16;
        } else if name.eq_ignore_ascii_case("posPerMl") {
            ctx.params.pos_per_ml = value as u16;
        } else if name.eq_ignore_ascii_case("mlToPump") {
            ctx.params.ml_to_pump = value as u16;
        } else if name.eq_ignore_ascii_case("motorPwm") {
            ctx.params.motor_pwm = value as u8;
        } else {
            *valid = false;
            return;
        }
        if let Err(e) = ctx.store.save(ctx.params) {
            log::warn!("dispatcher: failed to persist parameter: {e}");
        }
    }

    fn handle_get(&mut self, rest: &mut &str, ctx: &mut CommandContext<'_>, valid: &mut bool) -> String {
        let name = next_token(rest);
        if name.eq_ignore_ascii_case("tCalOffset") {
            let mut reply = JsonReply::new();
            reply.append_int_value("tCalOffset", i32::from(ctx.params.temp_cal_offset));
            reply.finish()
        } else if name.eq_ignore_ascii_case("params") {
            let mut reply = JsonReply::new();
            reply
                .append_int_value("inPos", i32::from(ctx.params.plunger_in_pos))
                .append_int_value("outPos", i32::from(ctx.params.plunger_out_pos))
                .append_int_value("posPerMl", i32::from(ctx.params.pos_per_ml))
                .append_int_value("mlToPump", i32::from(ctx.params.ml_to_pump));
            reply.finish()
        } else if name.eq_ignore_ascii_case("motorPwm") {
            let mut reply = JsonReply::new();
            reply.append_int_value("motorPwm", i32::from(ctx.params.motor_pwm));
            reply.finish()
        } else {
            *valid = false;
            String::new()
        }
    }

    fn handle_eeread(&mut self, rest: &mut &str, ctx: &mut CommandContext<'_>, valid: &mut bool) -> String {
        let Some(addr) = scan_u16(rest) else {
            *valid = false;
            return String::new();
        };
        match ctx.store.read_byte(addr) {
            Ok(byte) => {
                let mut reply = JsonReply::new();
                reply
                    .append_int_value("EEAddr", i32::from(addr))
                    .append_int_value("EEVal", i32::from(byte));
                reply.finish()
            }
            Err(_) => {
                *valid = false;
                String::new()
            }
        }
    }

    fn handle_eewrite(&mut self, rest: &mut &str, ctx: &mut CommandContext<'_>, valid: &mut bool) {
        let Some(addr) = scan_u16(rest) else {
            *valid = false;
            return;
        };
        let Some(value) = scan_u16(rest) else {
            *valid = false;
            return;
        };
        if ctx.store.write_byte(addr, value as u8).is_err() {
            *valid = false;
        }
    }
}

fn next_token<'a>(s: &mut &'a str) -> &'a str {
    *s = s.trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let token = &s[..end];
    *s = &s[end..];
    token
}

fn scan_i32(s: &mut &str) -> Option<i32> {
    let token = next_token(s);
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

fn scan_i16(s: &mut &str) -> Option<i16> {
    scan_i32(s).map(|v| v as i16)
}

fn scan_u16(s: &mut &str) -> Option<u16> {
    let value = scan_i32(s)?;
    if value < 0 {
        None
    } else {
        Some(value as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn new_ctx<'a>(
        pump: &'a mut PumpController,
        params: &'a mut Parameters,
        store: &'a mut InMemoryStore,
    ) -> CommandContext<'a> {
        CommandContext { pump, params, store }
    }

    #[test]
    fn ver_returns_version_string() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("ver", &mut ctx), "V1.0");
    }

    #[test]
    fn empty_line_is_no_op() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("", &mut ctx), "");
    }

    #[test]
    fn unknown_verb_returns_error() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("bogus", &mut ctx), "error");
    }

    #[test]
    fn set_then_get_params_round_trips() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut disp = CommandDispatcher::new();
        {
            let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
            disp.execute("set posPerMl 150", &mut ctx);
        }
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let reply = disp.execute("get params", &mut ctx);
        assert!(reply.contains("\"posPerMl\":150"));
    }

    #[test]
    fn set_with_missing_value_is_error() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("set posPerMl", &mut ctx), "error");
    }

    #[test]
    fn eewrite_then_eeread_round_trips() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut disp = CommandDispatcher::new();
        {
            let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
            disp.execute("eewrite 5 42", &mut ctx);
        }
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let reply = disp.execute("eeread 5", &mut ctx);
        assert!(reply.contains("\"EEVal\":42"));
    }

    #[test]
    fn eeread_out_of_range_is_error() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("eeread 99999", &mut ctx), "error");
    }

    #[test]
    fn settings_returns_empty_object() {
        let mut pump = PumpController::new();
        let mut params = Parameters::default();
        let mut store = InMemoryStore::new();
        let mut ctx = new_ctx(&mut pump, &mut params, &mut store);
        let mut disp = CommandDispatcher::new();
        assert_eq!(disp.execute("settings", &mut ctx), "{}");
    }
}
