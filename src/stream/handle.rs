//! The stream handle: lifecycle, raw transfer, line reading, formatted output.
//!
//! A [`TrackFile`] owns exactly one backend for its whole lifetime, plus the
//! dispatcher bookkeeping the backends cannot provide themselves: a one-byte
//! pushback slot, the logical cursor, and sticky end-of-stream/error state in
//! the manner of `feof`/`ferror`. All operations take `&mut self`, so a
//! handle is exclusively owned by one thread of control at a time.

use crate::buffer::{GrowBuf, Growth};
use crate::error::{Result, TrackFileError};
use crate::stream::backend::{Backend, BackendKind};
use crate::stream::{parse_mode, wants_gzip_output, Endian, Mode};
use bstr::{BStr, ByteSlice};
use log::{debug, trace};
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

/// Legacy end-of-file marker byte, treated like end-of-stream by the line
/// readers for compatibility with old text files that embed it.
const LEGACY_EOF: u8 = 0x1a;

/// Initial capacity of the formatted-output buffer.
const FORMAT_BUF_CAPACITY: usize = 256;

/// Fixed growth increment of the line buffer.
const LINE_BUF_STEP: usize = 128;

/// An open logical file: one handle over either a plain or a gzip-capable
/// byte stream, with buffered line reading, a binary primitive codec, and
/// formatted output. See the crate docs for the backend selection policy.
#[derive(Debug)]
pub struct TrackFile {
    name: PathBuf,
    module: String,
    mode: Mode,
    binary: bool,
    endian: Endian,
    backend: Backend,
    pushback: Option<u8>,
    position: u64,
    at_eof: bool,
    last_error: Option<i32>,
    format_buf: GrowBuf,
    line_buf: GrowBuf,
}

impl TrackFile {
    /// Open `path` with a stdio-style mode string and a module tag for
    /// diagnostics.
    ///
    /// The mode string contains `r` or `w` (case-insensitive) and optionally
    /// `b`; the `b` flag is recorded but has no effect, since no text-mode
    /// byte translation exists to suppress. Read mode always selects the
    /// compression-capable backend, which accepts gzip or raw input
    /// regardless of the file name. Write mode selects the compressed
    /// backend only for `.gz` names. The byte order for the numeric codecs
    /// defaults to little-endian.
    pub fn open(path: impl AsRef<Path>, mode_spec: &str, module: &str) -> Result<TrackFile> {
        let path = path.as_ref();
        let spec = parse_mode(mode_spec);
        let (backend, action) = match spec.mode {
            Mode::Read => (Backend::open_read(path), "open"),
            Mode::Write => (
                Backend::open_write(path, wants_gzip_output(path)),
                "create",
            ),
        };
        let backend =
            backend.map_err(|e| TrackFileError::open_failed(module, action, path, e))?;
        debug!(
            "{module}: opened '{}' for {} ({} backend)",
            path.display(),
            spec.mode.as_str(),
            backend.kind().name()
        );
        Ok(TrackFile {
            name: path.to_path_buf(),
            module: module.to_string(),
            mode: spec.mode,
            binary: spec.binary,
            endian: Endian::Little,
            backend,
            pushback: None,
            position: 0,
            at_eof: false,
            last_error: None,
            format_buf: GrowBuf::with_capacity(FORMAT_BUF_CAPACITY, Growth::Double),
            line_buf: GrowBuf::with_capacity(0, Growth::Step(LINE_BUF_STEP)),
        })
    }

    /// As [`TrackFile::open`], but with the numeric codecs configured for
    /// big-endian fields.
    pub fn open_big_endian(
        path: impl AsRef<Path>,
        mode_spec: &str,
        module: &str,
    ) -> Result<TrackFile> {
        let mut file = Self::open(path, mode_spec, module)?;
        file.endian = Endian::Big;
        Ok(file)
    }

    /// Close the handle, flushing buffered output and completing the gzip
    /// trailer on compressed writers. Dropping a handle without calling this
    /// finishes the stream on a best-effort basis, discarding any error.
    pub fn close(self) -> Result<()> {
        debug!("{}: closing '{}'", self.module, self.name.display());
        let TrackFile {
            backend,
            module,
            name,
            ..
        } = self;
        backend
            .finish()
            .map_err(|e| TrackFileError::flush_failed(module, &name, e))
    }

    /// File name captured at open.
    pub fn path(&self) -> &Path {
        &self.name
    }

    /// Module tag captured at open.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the mode string carried the `b` flag.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Byte order used by the 16/32-bit codecs.
    pub fn byte_order(&self) -> Endian {
        self.endian
    }

    /// Which transport kind this handle selected at open.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Read up to `count` elements of `elem_size` bytes into `buf`, returning
    /// the number of complete elements read. Zero `elem_size` or `count`
    /// reads nothing. A short count without an error means the stream ended;
    /// callers must check the count, not assume failure. A transport error
    /// distinct from clean end-of-stream is fatal.
    pub fn read(&mut self, buf: &mut [u8], elem_size: usize, count: usize) -> Result<usize> {
        if elem_size == 0 || count == 0 {
            return Ok(0);
        }
        let want = elem_size * count;
        let dest = &mut buf[..want];
        let mut total = 0;
        if let Some(byte) = self.pushback.take() {
            dest[0] = byte;
            total = 1;
        }
        if total < want {
            match self.backend.read(&mut dest[total..]) {
                Ok(n) => total += n,
                Err(e) => {
                    self.last_error = Some(e.raw_os_error().unwrap_or(-1));
                    return Err(TrackFileError::read_failed(
                        self.module.as_str(),
                        &self.name,
                        e,
                    ));
                }
            }
        }
        self.position += total as u64;
        if total < want {
            self.at_eof = true;
        }
        Ok(total / elem_size)
    }

    /// Write `count` elements of `elem_size` bytes from `buf`. Zero
    /// `elem_size` or `count` writes nothing. Any shortfall is fatal; there
    /// is no partial-write recovery path.
    pub fn write(&mut self, buf: &[u8], elem_size: usize, count: usize) -> Result<usize> {
        if elem_size == 0 || count == 0 {
            return Ok(0);
        }
        let want = elem_size * count;
        if let Err(e) = self.backend.write(&buf[..want]) {
            self.last_error = Some(e.raw_os_error().unwrap_or(-1));
            return Err(TrackFileError::write_failed(
                self.module.as_str(),
                &self.name,
                want,
                Some(e),
            ));
        }
        self.position += want as u64;
        Ok(count)
    }

    /// Read one byte; `None` means end-of-stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        if self.read(&mut buf, 1, 1)? == 0 {
            Ok(None)
        } else {
            Ok(Some(buf[0]))
        }
    }

    /// Write one byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte], 1, 1).map(|_| ())
    }

    /// Write a string's bytes, returning the count written.
    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write(s.as_bytes(), 1, s.len())
    }

    /// Push one byte back onto the stream. The next read returns it first.
    /// Only one byte of pushback is held; the cursor rewinds by one and the
    /// end-of-stream flag clears.
    pub fn unget(&mut self, byte: u8) {
        debug_assert!(self.pushback.is_none(), "pushback slot already occupied");
        self.pushback = Some(byte);
        self.position = self.position.saturating_sub(1);
        self.at_eof = false;
    }

    /// Current logical cursor position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Reposition the stream, discarding any pushback and clearing the
    /// end-of-stream flag. Compressed streams refuse end-relative seeks, and
    /// compressed output only moves forward; both are fatal when violated.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        trace!("{}: seek {:?} on '{}'", self.module, pos, self.name.display());
        self.pushback = None;
        self.at_eof = false;
        match self.backend.seek(pos, self.position) {
            Ok(new_pos) => {
                self.position = new_pos;
                Ok(new_pos)
            }
            Err(e) => {
                self.last_error = Some(e.raw_os_error().unwrap_or(-1));
                Err(TrackFileError::seek_failed(
                    self.module.as_str(),
                    &self.name,
                    Some(e),
                ))
            }
        }
    }

    /// Seek to the start of the stream and clear the sticky error state.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        self.clear_error();
        Ok(())
    }

    /// Flush buffered output to the transport.
    pub fn flush(&mut self) -> Result<()> {
        if let Err(e) = self.backend.flush() {
            self.last_error = Some(e.raw_os_error().unwrap_or(-1));
            return Err(TrackFileError::flush_failed(
                self.module.as_str(),
                &self.name,
                e,
            ));
        }
        Ok(())
    }

    /// Sticky end-of-stream flag: set once a read came up short, cleared by
    /// [`TrackFile::unget`], [`TrackFile::seek`] and [`TrackFile::clear_error`].
    pub fn is_eof(&self) -> bool {
        self.at_eof
    }

    /// OS error code recorded by the last failing transport call, if any.
    pub fn last_error(&self) -> Option<i32> {
        self.last_error
    }

    /// Clear the sticky error and end-of-stream state.
    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.at_eof = false;
    }

    /// Bounded line read into a caller buffer. Captures up to `buf.len()`
    /// bytes, stopping at CR, LF, CRLF, end-of-stream, or the legacy `0x1A`
    /// marker; terminators are consumed but not stored, and the LF of a CRLF
    /// pair is swallowed while any other byte after a lone CR is pushed back.
    /// Returns the captured length, or `None` when zero bytes were captured;
    /// an empty line and end-of-stream are indistinguishable here, which is
    /// inherent to this contract. A line longer than `buf` continues at the
    /// next call.
    pub fn read_line_into(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut len = 0;
        while len < buf.len() {
            let byte = match self.read_byte()? {
                Some(b) => b,
                None => break,
            };
            match byte {
                LEGACY_EOF => break,
                b'\r' => {
                    if let Some(next) = self.read_byte()? {
                        if next != b'\n' {
                            self.unget(next);
                        }
                    }
                    break;
                }
                b'\n' => break,
                _ => {
                    buf[len] = byte;
                    len += 1;
                }
            }
        }
        if len == 0 {
            Ok(None)
        } else {
            Ok(Some(len))
        }
    }

    /// Unbounded line read into the handle's own line buffer, with the same
    /// terminator handling as [`TrackFile::read_line_into`]. Returns `None`
    /// only when end-of-stream (or the `0x1A` marker) was reached with
    /// nothing captured; an empty line inside the content yields `Some("")`.
    /// The result borrows the handle and is overwritten by the next call.
    pub fn read_line(&mut self) -> Result<Option<&BStr>> {
        self.line_buf.clear();
        loop {
            let byte = match self.read_byte()? {
                Some(b) => b,
                None => {
                    if self.line_buf.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
            };
            match byte {
                LEGACY_EOF => {
                    if self.line_buf.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                b'\r' => {
                    if let Some(next) = self.read_byte()? {
                        if next != b'\n' {
                            self.unget(next);
                        }
                    }
                    break;
                }
                b'\n' => break,
                _ => self.line_buf.push(byte),
            }
        }
        Ok(Some(self.line_buf.as_slice().as_bstr()))
    }

    /// Formatted write through the handle's format buffer, which doubles its
    /// capacity as needed and never shrinks. Returns the number of bytes
    /// written; a render producing nothing writes nothing and returns 0. A
    /// formatting failure is fatal. Usable through the `write!` macro.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        self.format_buf.clear();
        if fmt::Write::write_fmt(&mut self.format_buf, args).is_err() {
            return Err(TrackFileError::format_failed(
                self.module.as_str(),
                &self.name,
            ));
        }
        if self.format_buf.is_empty() {
            return Ok(0);
        }
        let len = self.format_buf.len();
        if let Err(e) = self.backend.write(self.format_buf.as_slice()) {
            self.last_error = Some(e.raw_os_error().unwrap_or(-1));
            return Err(TrackFileError::write_failed(
                self.module.as_str(),
                &self.name,
                len,
                Some(e),
            ));
        }
        self.position += len as u64;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn open_read(path: &Path) -> TrackFile {
        TrackFile::open(path, "r", "test").unwrap()
    }

    #[test]
    fn test_backend_selection_policy() {
        let dir = TempDir::new().unwrap();

        let gz_out = TrackFile::open(dir.path().join("track.gz"), "w", "test").unwrap();
        assert_eq!(gz_out.backend_kind(), BackendKind::Gzip);
        gz_out.close().unwrap();

        let plain_out = TrackFile::open(dir.path().join("track.txt"), "w", "test").unwrap();
        assert_eq!(plain_out.backend_kind(), BackendKind::Plain);
        plain_out.close().unwrap();

        // reads are always compression-capable, whatever the name says
        let gz_in = open_read(&dir.path().join("track.gz"));
        assert_eq!(gz_in.backend_kind(), BackendKind::Gzip);
        let txt_in = open_read(&dir.path().join("track.txt"));
        assert_eq!(txt_in.backend_kind(), BackendKind::Gzip);
    }

    #[test]
    fn test_open_missing_file_fails_with_diagnostic() {
        let err = TrackFile::open("/no/such/dir/wpt.csv", "r", "csv").unwrap_err();
        assert!(matches!(err, TrackFileError::Open { .. }));
        assert_eq!(err.to_string(), "csv: cannot open file '/no/such/dir/wpt.csv'");
    }

    #[test]
    fn test_crlf_line_split() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "lines.txt", b"abc\r\ndef");
        let mut file = open_read(&path);

        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"abc");
        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"def");
        assert!(file.read_line().unwrap().is_none());
    }

    #[test]
    fn test_lone_cr_pushes_next_byte_back() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "lines.txt", b"abc\rdef");
        let mut file = open_read(&path);

        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"abc");
        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"def");
        assert!(file.read_line().unwrap().is_none());
    }

    #[test]
    fn test_bounded_line_reader() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "lines.txt", b"abc\r\ndef");
        let mut file = open_read(&path);
        let mut buf = [0u8; 16];

        let len = file.read_line_into(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"abc");
        let len = file.read_line_into(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"def");
        assert!(file.read_line_into(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_bounded_line_reader_splits_long_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "lines.txt", b"abcdef\n");
        let mut file = open_read(&path);
        let mut buf = [0u8; 4];

        let len = file.read_line_into(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"abcd");
        let len = file.read_line_into(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"ef");
    }

    #[test]
    fn test_legacy_eof_marker_ends_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "legacy.txt", b"abc\x1a");
        let mut file = open_read(&path);

        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"abc");
        assert!(file.read_line().unwrap().is_none());
    }

    #[test]
    fn test_empty_line_distinction() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "lines.txt", b"\nx");

        // the unbounded reader reports the embedded empty line
        let mut file = open_read(&path);
        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"");
        assert_eq!(file.read_line().unwrap().unwrap().as_bytes(), b"x");

        // the bounded reader cannot distinguish it from end-of-stream
        let mut file = open_read(&path);
        let mut buf = [0u8; 8];
        assert!(file.read_line_into(&mut buf).unwrap().is_none());
        let len = file.read_line_into(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"x");
    }

    #[test]
    fn test_unget_rewinds_cursor() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"xyz");
        let mut file = open_read(&path);

        assert_eq!(file.read_byte().unwrap(), Some(b'x'));
        assert_eq!(file.tell(), 1);
        file.unget(b'x');
        assert_eq!(file.tell(), 0);
        assert_eq!(file.read_byte().unwrap(), Some(b'x'));
        assert_eq!(file.read_byte().unwrap(), Some(b'y'));
    }

    #[test]
    fn test_eof_flag_is_sticky_until_cleared() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"ab");
        let mut file = open_read(&path);
        let mut buf = [0u8; 4];

        assert_eq!(file.read(&mut buf, 1, 4).unwrap(), 2);
        assert!(file.is_eof());
        file.clear_error();
        assert!(!file.is_eof());
    }

    #[test]
    fn test_zero_sized_transfers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"ab");
        let mut file = open_read(&path);
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf, 0, 4).unwrap(), 0);
        assert_eq!(file.read(&mut buf, 4, 0).unwrap(), 0);

        let mut out = TrackFile::open(dir.path().join("out.txt"), "w", "test").unwrap();
        assert_eq!(out.write(b"", 0, 7).unwrap(), 0);
        assert_eq!(out.write(b"", 7, 0).unwrap(), 0);
    }

    #[test]
    fn test_rewind_restarts_the_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"hello");
        let mut file = open_read(&path);
        let mut buf = [0u8; 8];

        assert_eq!(file.read(&mut buf, 1, 8).unwrap(), 5);
        assert!(file.is_eof());
        file.rewind().unwrap();
        assert_eq!(file.tell(), 0);
        assert!(!file.is_eof());
        assert_eq!(file.read(&mut buf, 1, 5).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn test_end_relative_seek_fails_on_compressed_input() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", b"hello");
        let mut file = open_read(&path);

        let err = file.seek(SeekFrom::End(0)).unwrap_err();
        assert!(matches!(err, TrackFileError::Seek { .. }));
    }

    #[test]
    fn test_formatted_write_and_buffer_growth() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let mut file = TrackFile::open(&path, "w", "test").unwrap();

        assert_eq!(write!(file, "").unwrap(), 0);

        let long = "x".repeat(400);
        let written = write!(file, "<name>{long}</name>").unwrap();
        assert_eq!(written, 400 + 13);
        assert!(file.format_buf.capacity() >= 512);
        file.close().unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), written);
        assert!(content.starts_with(b"<name>xxx"));
    }

    #[test]
    fn test_write_read_round_trip_plain_and_gzip() {
        let dir = TempDir::new().unwrap();
        for name in ["log.txt", "log.gz"] {
            let path = dir.path().join(name);
            let mut out = TrackFile::open(&path, "w", "test").unwrap();
            out.write_str("lat,lon\n").unwrap();
            out.write_str("48.1,11.5\n").unwrap();
            out.close().unwrap();

            let mut input = open_read(&path);
            assert_eq!(input.read_line().unwrap().unwrap().as_bytes(), b"lat,lon");
            assert_eq!(
                input.read_line().unwrap().unwrap().as_bytes(),
                b"48.1,11.5"
            );
            assert!(input.read_line().unwrap().is_none());
        }
    }
}
