// Anti-cheat telemetry: proctoring events and webcam snapshots attached to a session.

pub mod handlers;
pub mod snapshots;

/// Events kept from a single log request; the rest are dropped.
pub const MAX_EVENTS_PER_REQUEST: usize = 50;
/// Largest decoded snapshot accepted.
pub const MAX_SNAPSHOT_BYTES: usize = 2 * 1024 * 1024;
