//! Server-Sent Events framing.

use super::types::RunEvent;

/// Comment frame keeping idle connections open.
pub const KEEPALIVE: &str = ": ping\n\n";

/// Encode an event as one SSE frame.
///
/// The `id:` line carries the sequence number so browsers send it back as
/// `Last-Event-Id`; the synthetic `connected` greeting has none.
pub fn encode(event: &RunEvent) -> String {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    let mut frame = String::with_capacity(data.len() + 64);
    if !event.is_synthetic() {
        frame.push_str(&format!("id: {}\n", event.seq));
    }
    frame.push_str(&format!("event: {}\n", event.event_type));
    frame.push_str(&format!("data: {}\n\n", data));
    frame
}
