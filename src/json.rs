//! Console reply formatting.
//!
//! Ports `CommandProcessor.c`'s `beginJSON`/`appendJSONIntValue`/
//! `appendJSONTimeValue`/`continueJSON`/`endJSON` primitive sequence onto
//! a `serde_json::Map` builder rather than hand-appended characters — the
//! map owns comma placement, so there is no `continue` primitive to call
//! between fields (see DESIGN.md). `serde_json`'s `preserve_order` feature
//! is enabled so the map also keeps insertion order, matching the
//! reference's field-append order in each reply. Time values render
//! through [`crate::time_base::SystemTime`]'s `Display` impl (`D:HH:MM:SS`).

use serde_json::{Map, Value};

use crate::time_base::SystemTime;

pub struct JsonReply {
    map: Map<String, Value>,
}

impl JsonReply {
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    pub fn append_int_value(&mut self, name: &str, value: i32) -> &mut Self {
        self.map.insert(name.to_string(), Value::from(value));
        self
    }

    pub fn append_time_value(&mut self, name: &str, time: &SystemTime) -> &mut Self {
        self.map.insert(name.to_string(), Value::from(time.to_string()));
        self
    }

    pub fn finish(self) -> String {
        Value::Object(self.map).to_string()
    }
}

impl Default for JsonReply {
    fn default() -> Self {
        Self::new()
    }
}
