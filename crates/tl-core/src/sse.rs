//! SSE wire-format helper (spec §6 "Event stream on the wire").
//!
//! The transport layer itself (an HTTP server pushing these frames over a
//! socket) is out of scope; this is the pure formatting function a
//! transport would call for each event.

use serde_json::Value;

use crate::event::ContextEvent;

/// Format one event as an SSE frame: `id`, `event`, and `data` (the event
/// JSON minus `kind` and `context_id`, per spec §6).
pub fn format_sse_event(id: u64, ce: &ContextEvent) -> String {
    let mut value = serde_json::to_value(ce).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("kind");
        map.remove("context_id");
    }
    let data = serde_json::to_string(&value).unwrap_or_default();
    format!("id: {id}\nevent: {}\ndata: {data}\n\n", ce.event.kind())
}

/// The heartbeat comment frame, emitted on an interval (default 30s) to
/// keep idle SSE connections alive.
pub fn heartbeat_frame() -> &'static str {
    ": heartbeat\n\n"
}
