//! Fixed-width binary primitives and wire string framing.
//!
//! Reads fetch the raw bytes through the dispatcher first, then decode;
//! writes encode first, then issue one raw write. The 16- and 32-bit integer
//! codecs honor the byte order configured at open, and the float codec routes
//! its bit pattern through the 32-bit integer path, so it honors it too.
//! Doubles are different: they always use a little-endian bit-pattern copy,
//! whatever the configured byte order. Downstream format drivers depend on
//! that exact wire behavior; see DESIGN.md before changing it.
//!
//! None of these codecs validate content. A field cut short by end-of-stream
//! decodes its zero-padded remainder, and string payloads are accepted
//! verbatim; callers consult [`TrackFile::is_eof`] when they care.

use crate::buffer::{GrowBuf, Growth};
use crate::error::Result;
use crate::stream::{Endian, TrackFile};
use bstr::BString;

/// Growth increment of the temporary buffer used by [`TrackFile::read_cstring`].
const CSTRING_BUF_STEP: usize = 32;

impl TrackFile {
    /// Read a 16-bit integer in the configured byte order.
    pub fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read(&mut buf, 1, 2)?;
        Ok(match self.byte_order() {
            Endian::Big => i16::from_be_bytes(buf),
            Endian::Little => i16::from_le_bytes(buf),
        })
    }

    /// Read a 32-bit integer in the configured byte order.
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read(&mut buf, 1, 4)?;
        Ok(match self.byte_order() {
            Endian::Big => i32::from_be_bytes(buf),
            Endian::Little => i32::from_le_bytes(buf),
        })
    }

    /// Read a 32-bit float: the bit pattern travels through the 32-bit
    /// integer codec, so the configured byte order applies.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    /// Read a 64-bit float. Always decoded from little-endian bytes; the
    /// configured byte order applies to the 16/32-bit codecs only.
    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read(&mut buf, 1, 8)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Write a 16-bit integer in the configured byte order.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        let buf = match self.byte_order() {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.write(&buf, 1, buf.len()).map(|_| ())
    }

    /// Write a 32-bit integer in the configured byte order.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        let buf = match self.byte_order() {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.write(&buf, 1, buf.len()).map(|_| ())
    }

    /// Write a 32-bit float through the 32-bit integer codec.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_i32(value.to_bits() as i32)
    }

    /// Write a 64-bit float, always as little-endian bytes.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let buf = value.to_le_bytes();
        self.write(&buf, 1, buf.len()).map(|_| ())
    }

    /// Read bytes up to a NUL terminator or end-of-stream. The terminator is
    /// consumed and not included. No length limit.
    pub fn read_cstring(&mut self) -> Result<BString> {
        let mut buf = GrowBuf::with_capacity(0, Growth::Step(CSTRING_BUF_STEP));
        while let Some(byte) = self.read_byte()? {
            if byte == 0 {
                break;
            }
            buf.push(byte);
        }
        Ok(BString::from(buf.as_slice()))
    }

    /// Read a pascal string: one length byte, then exactly that many payload
    /// bytes. A payload cut short by end-of-stream is returned as-is.
    pub fn read_pstring(&mut self) -> Result<BString> {
        let len = match self.read_byte()? {
            Some(n) => n as usize,
            None => 0,
        };
        let mut payload = vec![0u8; len];
        let got = self.read(&mut payload, 1, len)?;
        payload.truncate(got);
        Ok(BString::from(payload))
    }

    /// Write the payload bytes followed by one NUL terminator. Returns the
    /// byte count written, terminator included.
    pub fn write_cstring(&mut self, s: impl AsRef<[u8]>) -> Result<usize> {
        let s = s.as_ref();
        self.write(s, 1, s.len())?;
        self.write_byte(0)?;
        Ok(s.len() + 1)
    }

    /// Write a pascal string: a length byte of `min(len, 255)` followed by
    /// that many payload bytes. Longer input is silently truncated; that is
    /// the wire format's policy, not an error. Returns the byte count
    /// written, length byte included.
    pub fn write_pstring(&mut self, s: impl AsRef<[u8]>) -> Result<usize> {
        let s = s.as_ref();
        let len = s.len().min(255);
        self.write_byte(len as u8)?;
        self.write(&s[..len], 1, len)?;
        Ok(len + 1)
    }
}
