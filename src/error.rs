//! Error types and handling infrastructure for trackfile.
//!
//! This module provides the error type shared by every stream operation, using
//! `thiserror` for the variants and a crate-wide `Result` alias.
//!
//! Every variant here describes a *fatal* condition of the conversion pipeline:
//! an unopenable file, a write shortfall, a transport-level read failure, an
//! unsupported seek, or a formatting failure. Clean end-of-stream is never an
//! error; it is reported through ordinary return values (`Ok(0)`, `Ok(None)`).
//! The conversion tool funnels these errors into [`crate::fatal::fail`], which
//! logs and terminates; no intermediate layer is expected to recover from them.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The error type for trackfile stream operations.
///
/// Each variant carries the module tag and file name captured when the handle
/// was opened, so the resulting diagnostic identifies which format driver was
/// operating on which file.
#[derive(Error, Debug)]
pub enum TrackFileError {
    /// The file could not be opened or created.
    #[error("{module}: cannot {action} file '{}'", path.display())]
    Open {
        module: String,
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport reported a read failure distinct from clean end-of-stream.
    #[error("{module}: read error on file '{}'", path.display())]
    Read {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fewer bytes than requested reached the stream. There is no
    /// partial-write recovery path.
    #[error("{module}: could not write {count} bytes to file '{}'", path.display())]
    Write {
        module: String,
        path: PathBuf,
        count: usize,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Buffered output could not be flushed to the stream.
    #[error("{module}: could not flush file '{}'", path.display())]
    Flush {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested repositioning is not available on this stream, for
    /// example seeking relative to the end of compressed data.
    #[error("{module}: stream does not yet support the requested seek on file '{}'", path.display())]
    Seek {
        module: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Rendering a formatted write failed.
    #[error("{module}: formatting failed while writing file '{}'", path.display())]
    Format { module: String, path: PathBuf },
}

/// Standard Result type for trackfile operations.
pub type Result<T> = std::result::Result<T, TrackFileError>;

impl TrackFileError {
    /// Create an Open error; `action` is "open" or "create" depending on mode.
    pub fn open_failed(
        module: impl Into<String>,
        action: &'static str,
        path: &Path,
        source: std::io::Error,
    ) -> Self {
        Self::Open {
            module: module.into(),
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a Read error from an underlying transport failure.
    pub fn read_failed(module: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            module: module.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a Write error for a shortfall of `count` bytes.
    pub fn write_failed(
        module: impl Into<String>,
        path: &Path,
        count: usize,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Write {
            module: module.into(),
            path: path.to_path_buf(),
            count,
            source,
        }
    }

    /// Create a Flush error.
    pub fn flush_failed(module: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Flush {
            module: module.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a Seek error.
    pub fn seek_failed(
        module: impl Into<String>,
        path: &Path,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Seek {
            module: module.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a Format error.
    pub fn format_failed(module: impl Into<String>, path: &Path) -> Self {
        Self::Format {
            module: module.into(),
            path: path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let path = Path::new("/data/route.gpx");

        let open_err = TrackFileError::open_failed(
            "gpx",
            "open",
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(
            open_err.to_string(),
            "gpx: cannot open file '/data/route.gpx'"
        );

        let write_err = TrackFileError::write_failed("gpx", path, 12, None);
        assert_eq!(
            write_err.to_string(),
            "gpx: could not write 12 bytes to file '/data/route.gpx'"
        );

        let seek_err = TrackFileError::seek_failed("gpx", path, None);
        assert_eq!(
            seek_err.to_string(),
            "gpx: stream does not yet support the requested seek on file '/data/route.gpx'"
        );
    }

    #[test]
    fn test_error_constructors() {
        let path = Path::new("track.bin");

        let read_err = TrackFileError::read_failed(
            "kml",
            path,
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(matches!(read_err, TrackFileError::Read { .. }));

        let fmt_err = TrackFileError::format_failed("kml", path);
        assert!(matches!(fmt_err, TrackFileError::Format { .. }));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<u32> {
            Ok(7)
        }

        assert_eq!(returns_result().unwrap(), 7);
    }
}
