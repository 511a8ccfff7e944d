//! Top-level handler for unrecoverable stream errors.
//!
//! Format drivers propagate [`TrackFileError`] values with `?`; nothing below
//! the tool's entry point catches them. A single-pass batch converter has no
//! useful recovery from a half-written or unreadable file, so the entry point
//! hands the error to [`fail`], which logs the diagnostic and terminates the
//! process with a non-zero status.

use crate::error::{Result, TrackFileError};

/// Log the diagnostic carried by `err` and terminate the process.
pub fn fail(err: &TrackFileError) -> ! {
    log::error!("{err}");
    std::process::exit(1);
}

/// Unwrap `result`, terminating the process on an error.
///
/// Convenience for call sites that follow the tool-wide policy of never
/// handling stream errors locally.
pub fn or_die<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fail(&err),
    }
}
