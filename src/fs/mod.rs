//! Filesystem utilities for gatekeep.
//!
//! Run records, configuration and artifacts are rewritten atomically so a
//! crash never leaves a half-written file behind.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_file, atomic_write_json, is_temp_name};
