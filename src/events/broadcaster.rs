//! Per-run ordered event streams with replay.

use super::log::{append_event, read_events_from};
use super::types::RunEvent;
use crate::error::{GateError, Result};
use crate::locks::{AppendLock, LockHolder};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often a waiting subscriber re-reads the log for events written by
/// other processes.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

const APPEND_LOCK_WAIT: Duration = Duration::from_secs(10);
const APPEND_LOCK_STALE: Duration = Duration::from_secs(30);

fn log_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("{}.ndjson", run_id))
}

/// Exclusive hold on a run's log across processes.
fn lock_log(dir: &Path, run_id: &str) -> Result<AppendLock> {
    fs::create_dir_all(dir).map_err(|e| {
        GateError::IoError(format!(
            "failed to create events directory '{}': {}",
            dir.display(),
            e
        ))
    })?;
    AppendLock::acquire(
        &dir.join(format!("{}.ndjson.lock", run_id)),
        &LockHolder::current(run_id, "publish"),
        APPEND_LOCK_WAIT,
        APPEND_LOCK_STALE,
    )
}

#[derive(Debug, Default)]
struct RunStream {
    events: VecDeque<RunEvent>,
    next_seq: u64,
    /// Bytes of the run's log already folded into `events`.
    offset: u64,
    last_terminal: bool,
}

impl RunStream {
    fn push(&mut self, event: RunEvent, retention: usize) {
        self.next_seq = event.seq + 1;
        self.last_terminal = event.is_terminal();
        self.events.push_back(event);
        while self.events.len() > retention {
            self.events.pop_front();
        }
    }
}

/// Publishes run events and serves resumable subscriptions.
///
/// With a backing directory every event is appended to
/// `<dir>/<runId>.ndjson` before it becomes visible, and streams are
/// refreshed from those files, so a broadcaster in another process (or a
/// fresh one after a restart) replays the same sequence.
#[derive(Debug)]
pub struct EventBroadcaster {
    dir: Option<PathBuf>,
    retention: usize,
    streams: Mutex<HashMap<String, RunStream>>,
    changed: Condvar,
}

impl EventBroadcaster {
    /// Broadcaster persisting to `dir`, keeping `retention` events per run
    /// in memory.
    pub fn open<P: Into<PathBuf>>(dir: P, retention: usize) -> Self {
        Self::build(Some(dir.into()), retention)
    }

    /// Broadcaster without persistence.
    pub fn in_memory(retention: usize) -> Self {
        Self::build(None, retention)
    }

    fn build(dir: Option<PathBuf>, retention: usize) -> Self {
        Self {
            dir,
            retention: retention.max(1),
            streams: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Append an event to the run's stream and wake subscribers.
    ///
    /// The event is durable before this returns; a write failure leaves the
    /// stream unchanged. With a backing directory the read of the next
    /// sequence number and the append happen under `<runId>.ndjson.lock`, so
    /// publishers in different processes never reuse a number.
    pub fn publish(&self, run_id: &str, event_type: &str, payload: Value) -> Result<RunEvent> {
        let mut streams = self.lock();
        let append_guard = match &self.dir {
            Some(dir) => Some(lock_log(dir, run_id)?),
            None => None,
        };
        let stream = self.sync(&mut streams, run_id);

        let event = RunEvent {
            seq: stream.next_seq,
            run_id: run_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            ts: Utc::now(),
        };

        if let Some(dir) = &self.dir {
            append_event(&log_path(dir, run_id), &event)?;
        }

        debug!(run_id, seq = event.seq, event_type, "published event");
        stream.push(event.clone(), self.retention);
        drop(append_guard);
        drop(streams);
        self.changed.notify_all();
        Ok(event)
    }

    /// Subscribe to a run, replaying retained events after `last_seq`.
    ///
    /// `None` replays the whole retained window.
    pub fn subscribe(&self, run_id: &str, last_seq: Option<u64>) -> Subscription<'_> {
        Subscription {
            broadcaster: self,
            run_id: run_id.to_string(),
            cursor: last_seq,
            greeted: false,
            finished: false,
        }
    }

    /// Snapshot of the retained events of a run.
    pub fn events(&self, run_id: &str) -> Vec<RunEvent> {
        let mut streams = self.lock();
        self.sync(&mut streams, run_id).events.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RunStream>> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The run's stream, with anything appended to its log since the last
    /// read folded in.
    fn sync<'m>(
        &self,
        streams: &'m mut HashMap<String, RunStream>,
        run_id: &str,
    ) -> &'m mut RunStream {
        let stream = streams.entry(run_id.to_string()).or_default();

        if let Some(dir) = &self.dir {
            match read_events_from(&log_path(dir, run_id), stream.offset) {
                Ok((events, offset)) => {
                    stream.offset = offset;
                    for event in events {
                        if event.seq >= stream.next_seq {
                            stream.push(event, self.retention);
                        }
                    }
                }
                Err(e) => warn!(run_id, error = %e, "failed to refresh event log"),
            }
        }

        stream
    }
}

/// A resumable view of one run's events.
///
/// Yields a synthetic `connected` event first, then every retained event
/// after the resume point in order, then live events. The stream ends once
/// the subscriber has caught up with a stream whose latest event is
/// terminal. A terminal event followed by more (a rerun or bypass after the
/// run settled) does not end it.
pub struct Subscription<'a> {
    broadcaster: &'a EventBroadcaster,
    run_id: String,
    cursor: Option<u64>,
    greeted: bool,
    finished: bool,
}

impl Subscription<'_> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Sequence number of the last delivered event.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next event if one is already available.
    pub fn try_next(&mut self) -> Option<RunEvent> {
        self.poll(Some(Duration::ZERO))
    }

    /// Next event, waiting at most `timeout` for one to arrive.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<RunEvent> {
        self.poll(Some(timeout))
    }

    fn poll(&mut self, wait: Option<Duration>) -> Option<RunEvent> {
        if !self.greeted {
            self.greeted = true;
            return Some(RunEvent::connected(&self.run_id, self.cursor));
        }
        if self.finished {
            return None;
        }

        let broadcaster = self.broadcaster;
        let deadline = wait.map(|w| Instant::now() + w);
        let mut streams = broadcaster.lock();

        loop {
            let stream = broadcaster.sync(&mut streams, &self.run_id);
            let cursor = self.cursor;
            if let Some(event) = stream
                .events
                .iter()
                .find(|e| cursor.is_none_or(|c| e.seq > c))
                .cloned()
            {
                self.cursor = Some(event.seq);
                self.finished = stream.last_terminal && event.seq + 1 == stream.next_seq;
                return Some(event);
            }
            if stream.last_terminal {
                self.finished = true;
                return None;
            }

            let slice = match deadline {
                None => POLL_INTERVAL,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    (deadline - now).min(POLL_INTERVAL)
                }
            };
            streams = match broadcaster.changed.wait_timeout(streams, slice) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Iterator for Subscription<'_> {
    type Item = RunEvent;

    /// Blocks until the next event or the end of the stream.
    fn next(&mut self) -> Option<RunEvent> {
        self.poll(None)
    }
}
