//! Durable, replayable run event streams.
//!
//! Every run has its own ordered stream. Events are appended to an NDJSON
//! file per run under the state directory and retained in memory for
//! reconnecting observers:
//!
//! ```text
//! .gatekeep/events/<runId>.ndjson
//! {"seq":0,"runId":"…","type":"run:started","payload":{…},"ts":"…"}
//! ```
//!
//! Publishers in separate processes take `<runId>.ndjson.lock` around each
//! append.

mod broadcaster;
mod log;
mod resume;
pub mod sse;
mod types;


pub use broadcaster::{EventBroadcaster, Subscription};
pub use log::{append_event, read_events_from};
pub use resume::{LAST_EVENT_ID_HEADER, LAST_EVENT_ID_QUERY, ResumePoint};
pub use types::{RunEvent, kinds};
