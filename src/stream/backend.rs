//! Byte-stream backends behind the handle.
//!
//! A [`Backend`] is a tagged variant over the two transport kinds: a plain
//! uncompressed stream and a gzip-capable stream. Read handles always carry
//! the gzip-capable variant; it sniffs the two magic bytes at open and falls
//! back to passing raw bytes through when they are absent, so compressed and
//! uncompressed input look identical to callers. All methods speak
//! `io::Result`; the handle layer attaches module and file-name context.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Gzip magic bytes (RFC 1952).
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Which transport kind a handle ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Plain uncompressed byte stream.
    Plain,
    /// Gzip-capable stream (transparent on the read side).
    Gzip,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Plain => "plain",
            BackendKind::Gzip => "gzip",
        }
    }
}

/// The transport variants. Read mode always selects the compression-capable
/// input; plain output exists only for non-`.gz` write targets.
#[derive(Debug)]
pub(crate) enum Backend {
    /// Uncompressed output stream.
    Plain(BufWriter<File>),
    /// Compression-capable input stream.
    GzipIn(GzipInput),
    /// Compressed output stream.
    GzipOut(GzEncoder<BufWriter<File>>),
}

impl Backend {
    pub(crate) fn open_read(path: &Path) -> io::Result<Backend> {
        Ok(Backend::GzipIn(GzipInput::open(path)?))
    }

    pub(crate) fn open_write(path: &Path, gzip: bool) -> io::Result<Backend> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        if gzip {
            Ok(Backend::GzipOut(GzEncoder::new(
                writer,
                Compression::default(),
            )))
        } else {
            Ok(Backend::Plain(writer))
        }
    }

    pub(crate) fn kind(&self) -> BackendKind {
        match self {
            Backend::Plain(_) => BackendKind::Plain,
            Backend::GzipIn(_) | Backend::GzipOut(_) => BackendKind::Gzip,
        }
    }

    /// Fill `buf` from the stream, returning the number of bytes read. A
    /// short count without an error means clean end-of-stream.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let input = match self {
            Backend::GzipIn(input) => input,
            Backend::Plain(_) | Backend::GzipOut(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "stream is not open for reading",
                ))
            }
        };
        let mut total = 0;
        while total < buf.len() {
            match input.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Write all of `buf` to the stream; anything less is an error.
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Backend::Plain(w) => w.write_all(buf),
            Backend::GzipOut(enc) => enc.write_all(buf),
            Backend::GzipIn(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream is not open for writing",
            )),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Backend::Plain(w) => w.flush(),
            Backend::GzipOut(enc) => enc.flush(),
            Backend::GzipIn(_) => Ok(()),
        }
    }

    /// Reposition the stream. `logical` is the handle's current cursor, used
    /// by the compressed variants, which cannot ask their transport for it.
    /// Returns the new cursor position.
    pub(crate) fn seek(&mut self, pos: SeekFrom, logical: u64) -> io::Result<u64> {
        match self {
            Backend::Plain(w) => w.seek(pos),
            Backend::GzipIn(input) => input.seek(pos, logical),
            Backend::GzipOut(enc) => {
                // Compressed output can only move forward, by emitting zeros.
                let target = match pos {
                    SeekFrom::Start(t) if t >= logical => t,
                    SeekFrom::Current(d) if d >= 0 => logical + d as u64,
                    _ => {
                        return Err(io::Error::new(
                            io::ErrorKind::Unsupported,
                            "compressed output supports forward seeks only",
                        ))
                    }
                };
                let zeros = [0u8; 4096];
                let mut remaining = target - logical;
                while remaining > 0 {
                    let n = remaining.min(zeros.len() as u64) as usize;
                    enc.write_all(&zeros[..n])?;
                    remaining -= n as u64;
                }
                Ok(target)
            }
        }
    }

    /// Consume the backend, flushing writers and completing the gzip trailer.
    pub(crate) fn finish(self) -> io::Result<()> {
        match self {
            Backend::Plain(mut w) => w.flush(),
            Backend::GzipOut(enc) => {
                let mut inner = enc.finish()?;
                inner.flush()
            }
            Backend::GzipIn(_) => Ok(()),
        }
    }
}

/// Compression-capable input stream. Decides once, at open, whether the file
/// is gzip data or raw bytes.
#[derive(Debug)]
pub(crate) struct GzipInput {
    source: GzipSource,
    path: PathBuf,
}

#[derive(Debug)]
enum GzipSource {
    Compressed(MultiGzDecoder<BufReader<File>>),
    Raw(BufReader<File>),
}

impl GzipInput {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            source: open_source(path)?,
            path: path.to_path_buf(),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            GzipSource::Compressed(dec) => dec.read(buf),
            GzipSource::Raw(r) => r.read(buf),
        }
    }

    /// Seeking relative to the end is never supported here. On raw input the
    /// transport seeks directly; on compressed input, forward seeks skip by
    /// decompressing and backward seeks restart the decoder from the start of
    /// the file before skipping forward.
    fn seek(&mut self, pos: SeekFrom, logical: u64) -> io::Result<u64> {
        if matches!(pos, SeekFrom::End(_)) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "seek relative to end is not supported on compression-capable input",
            ));
        }
        if let GzipSource::Raw(reader) = &mut self.source {
            return reader.seek(pos);
        }
        let target = match pos {
            SeekFrom::Start(t) => t,
            SeekFrom::Current(d) => {
                if d < 0 {
                    logical.checked_sub(d.unsigned_abs()).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
                    })?
                } else {
                    logical + d as u64
                }
            }
            SeekFrom::End(_) => unreachable!("rejected above"),
        };
        if target < logical {
            self.source = open_source(&self.path)?;
            self.skip(target)?;
        } else {
            self.skip(target - logical)?;
        }
        Ok(target)
    }

    /// Skip `remaining` decompressed bytes by reading into a scratch buffer.
    fn skip(&mut self, mut remaining: u64) -> io::Result<()> {
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(scratch.len() as u64) as usize;
            let got = self.read(&mut scratch[..n])?;
            if got == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "seek past end of compressed stream",
                ));
            }
            remaining -= got as u64;
        }
        Ok(())
    }
}

/// Open the file and sniff the gzip magic to decide between transparent
/// decompression and raw pass-through.
fn open_source(path: &Path) -> io::Result<GzipSource> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 2];
    let mut got = 0;
    while got < magic.len() {
        let n = reader.read(&mut magic[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    reader.seek(SeekFrom::Start(0))?;
    if got == magic.len() && magic == GZIP_MAGIC {
        Ok(GzipSource::Compressed(MultiGzDecoder::new(reader)))
    } else {
        Ok(GzipSource::Raw(reader))
    }
}
