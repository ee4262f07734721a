//! Implementation of the `gatekeep events` command.
//!
//! Writes SSE frames to stdout: the synthetic `connected` frame, every
//! retained event after the resume point, then live events until the run
//! finishes. A keep-alive comment goes out when nothing arrives for a while.

use crate::cli::EventsArgs;
use crate::context::GateContext;
use crate::error::{GateError, Result};
use crate::events::{EventBroadcaster, ResumePoint, sse};
use crate::exit_codes;
use std::io::Write;
use std::time::Duration;

use super::runs::open_orchestrator;

const KEEPALIVE_AFTER: Duration = Duration::from_secs(15);

pub fn cmd_events(ctx: &GateContext, args: EventsArgs) -> Result<i32> {
    let orchestrator = open_orchestrator(ctx)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    stream_events(orchestrator.events(), &args, &mut out)?;
    Ok(exit_codes::SUCCESS)
}

/// Write the event stream of `args.run_id` to `out`.
///
/// Returns the number of frames written, keep-alives excluded.
pub(super) fn stream_events<W: Write>(
    events: &EventBroadcaster,
    args: &EventsArgs,
    out: &mut W,
) -> Result<usize> {
    let resume = ResumePoint::resolve(
        args.last_event_id.as_deref(),
        args.query_last_event_id.as_deref(),
    );
    let mut subscription = events.subscribe(&args.run_id, resume.last_seq());
    let mut frames = 0;

    loop {
        let next = if args.no_follow {
            subscription.try_next()
        } else {
            subscription.next_timeout(KEEPALIVE_AFTER)
        };

        match next {
            Some(event) => {
                write_frame(out, &sse::encode(&event))?;
                frames += 1;
            }
            None if args.no_follow || subscription.is_finished() => break,
            None => write_frame(out, sse::KEEPALIVE)?,
        }
    }
    Ok(frames)
}

fn write_frame<W: Write>(out: &mut W, frame: &str) -> Result<()> {
    out.write_all(frame.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| GateError::IoError(format!("failed to write event stream: {}", e)))
}
