//! # trackfile - Uniform File I/O for GPS Data Conversion
//!
//! A single handle type over plain and gzip-compressed byte streams, so the
//! format readers and writers of a GPS-data conversion tool never branch on
//! compression.
//!
//! ## Features
//!
//! - **Transparent Compression**: reads accept gzip or raw input through one
//!   backend; writes compress when the target name ends in `.gz`
//! - **Line Reading**: bounded and unbounded text lines with CR/LF/CRLF
//!   normalization and legacy `0x1A` end-of-file handling
//! - **Binary Primitives**: fixed-width 16/32/64-bit fields with the byte
//!   order configured once at open
//! - **Wire Strings**: NUL-terminated and length-prefixed (pascal) framing
//! - **Formatted Output**: `write!` support backed by a reusable growable
//!   buffer
//!
//! ## Architecture
//!
//! The library is organized into focused modules:
//!
//! - [`error`] - Centralized error types and the crate `Result`
//! - [`fatal`] - The tool's top-level handler for unrecoverable errors
//! - [`buffer`] - Growable byte buffers with explicit growth policies
//! - [`stream`] - The [`TrackFile`] handle and its backends
//!
//! All I/O is synchronous and blocking; a handle is exclusively owned and
//! every operation takes `&mut self`.

// Core modules
pub mod buffer;
pub mod error;
pub mod fatal;
pub mod stream;

// Re-export commonly used types for convenience
pub use error::{Result, TrackFileError};
pub use stream::{BackendKind, Endian, Mode, TrackFile};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
