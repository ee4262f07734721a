//! Exit code constants for the gatekeep CLI.
//!
//! - 0: Success (run PASSED, or a non-run command succeeded)
//! - 1: User error (bad args, invalid state, unknown run)
//! - 2: Validation failure (the run finished FAILED)
//! - 3: Git operation failure
//! - 4: Lock acquisition failure
//! - 5: Sandbox could not be created

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid state, or unknown entity.
pub const USER_ERROR: i32 = 1;

/// Validation failure: a gate blocked the run.
pub const VALIDATION_FAILURE: i32 = 2;

/// Git operation failure.
pub const GIT_FAILURE: i32 = 3;

/// Lock acquisition failure: another process is executing gates for the run.
pub const LOCK_FAILURE: i32 = 4;

/// The isolated checkout for a run could not be materialized.
pub const SANDBOX_FAILURE: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            VALIDATION_FAILURE,
            GIT_FAILURE,
            LOCK_FAILURE,
            SANDBOX_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
