//! Binary layout primitives
//!
//! [`Writer`] packs fields little-endian into a bounded payload buffer;
//! [`Reader`] unpacks them in the same order. Messages describe their layout
//! by the sequence of calls they make, which keeps encode and decode
//! side by side and easy to compare.

use heapless::{String, Vec};

use crate::error::{DecodeError, ProtocolError};
use crate::fields::Reported;
use crate::frame::MAX_PAYLOAD_SIZE;
use crate::message::Header;

/// A payload: header plus telegram, at most 64 bytes
pub type Payload = Vec<u8, MAX_PAYLOAD_SIZE>;

/// Little-endian field writer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Payload,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Write the 2-byte type/code header
    pub fn header(&mut self, header: Header) -> Result<(), ProtocolError> {
        self.bytes(&header.to_bytes())
    }

    pub fn u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.buf
            .push(value)
            .map_err(|_| ProtocolError::PayloadTooLarge)
    }

    pub fn i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.u8(value as u8)
    }

    pub fn u16(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> Result<(), ProtocolError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.buf
            .extend_from_slice(data)
            .map_err(|_| ProtocolError::PayloadTooLarge)
    }

    /// Null-terminated ASCII string
    pub fn asciiz(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.bytes(text.as_bytes())?;
        self.u8(0)
    }

    /// Fixed-width ASCIIZ field, zero padded
    pub fn fixed_asciiz(&mut self, text: &str, width: usize) -> Result<(), ProtocolError> {
        // Always leave room for the terminator
        if text.len() >= width {
            return Err(ProtocolError::PayloadTooLarge);
        }
        self.bytes(text.as_bytes())?;
        for _ in text.len()..width {
            self.u8(0)?;
        }
        Ok(())
    }

    /// Fixed-width length-prefixed string: one length byte, then
    /// `width - 1` data bytes, zero padded
    pub fn pascal(&mut self, data: &[u8], width: usize) -> Result<(), ProtocolError> {
        if data.len() >= width {
            return Err(ProtocolError::PayloadTooLarge);
        }
        self.u8(data.len() as u8)?;
        self.bytes(data)?;
        for _ in data.len() + 1..width {
            self.u8(0)?;
        }
        Ok(())
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Payload {
        self.buf
    }
}

/// Little-endian field reader over a telegram
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Take the next `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(DecodeError::MalformedPayload {
                expected: end,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_le_bytes(self.array()?))
    }

    /// Any non-zero byte is true
    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Decode an enumerated byte, mapping non-members to a decode error
    pub fn field<T>(&mut self, field: &'static str) -> Result<T, DecodeError>
    where
        T: TryFrom<u8>,
    {
        let raw = self.u8()?;
        T::try_from(raw).map_err(|_| DecodeError::InvalidField {
            field,
            value: raw as i64,
        })
    }

    /// Decode an enumerated byte the device may extend, keeping non-members
    pub fn reported<T>(&mut self) -> Result<Reported<T>, DecodeError>
    where
        T: Copy + Into<u8> + TryFrom<u8>,
    {
        Ok(Reported::from_u8(self.u8()?))
    }

    /// Null-terminated ASCII string; consumes the terminator
    pub fn asciiz(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidText { field })?;
        let text = ascii(&rest[..nul], field)?;
        self.pos += nul + 1;
        Ok(text)
    }

    /// Fixed-width ASCIIZ field; text ends at the first NUL
    pub fn fixed_asciiz(&mut self, field: &'static str, width: usize) -> Result<&'a str, DecodeError> {
        let raw = self.take(width)?;
        let nul = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidText { field })?;
        ascii(&raw[..nul], field)
    }

    /// Fixed-width length-prefixed string; returns the `length` data bytes
    pub fn pascal(&mut self, field: &'static str, width: usize) -> Result<&'a [u8], DecodeError> {
        let raw = self.take(width)?;
        let len = raw[0] as usize;
        if len >= width {
            return Err(DecodeError::InvalidField {
                field,
                value: len as i64,
            });
        }
        Ok(&raw[1..1 + len])
    }

    /// Everything not yet consumed
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Check the layout consumed the whole telegram
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pos != self.buf.len() {
            return Err(DecodeError::MalformedPayload {
                expected: self.pos,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }
}

fn ascii<'a>(raw: &'a [u8], field: &'static str) -> Result<&'a str, DecodeError> {
    if !raw.is_ascii() {
        return Err(DecodeError::InvalidText { field });
    }
    core::str::from_utf8(raw).map_err(|_| DecodeError::InvalidText { field })
}

/// Check that text can go out NUL-terminated: ASCII with no embedded NUL
pub fn validate_text(text: &str, field: &'static str) -> Result<(), ProtocolError> {
    if !text.is_ascii() || text.bytes().any(|b| b == 0) {
        return Err(ProtocolError::invalid(
            field,
            text.len() as i64,
            "must be ASCII without NUL bytes",
        ));
    }
    Ok(())
}

/// Copy validated ASCII text into a bounded string
///
/// Rejects non-ASCII, embedded NULs and text longer than `N`.
pub fn bounded_text<const N: usize>(
    text: &str,
    field: &'static str,
) -> Result<String<N>, ProtocolError> {
    validate_text(text, field)?;
    let mut out = String::new();
    out.push_str(text).map_err(|_| {
        ProtocolError::invalid(field, text.len() as i64, "text too long")
    })?;
    Ok(out)
}

/// Decode-side twin of [`bounded_text`]
pub(crate) fn decoded_text<const N: usize>(
    text: &str,
    field: &'static str,
) -> Result<String<N>, DecodeError> {
    let mut out = String::new();
    out.push_str(text).map_err(|_| DecodeError::InvalidField {
        field,
        value: text.len() as i64,
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_little_endian() {
        let mut w = Writer::new();
        w.u16(0x0BB8).unwrap();
        w.i32(-2).unwrap();
        assert_eq!(&w.finish()[..], &[0xB8, 0x0B, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_writer_overflow() {
        let mut w = Writer::new();
        w.bytes(&[0u8; MAX_PAYLOAD_SIZE]).unwrap();
        assert_eq!(w.u8(1), Err(ProtocolError::PayloadTooLarge));
    }

    #[test]
    fn test_reader_short_telegram() {
        let mut r = Reader::new(&[0x50]);
        assert_eq!(
            r.u16(),
            Err(DecodeError::MalformedPayload {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_reader_trailing_bytes() {
        let mut r = Reader::new(&[1, 2, 3]);
        r.u16().unwrap();
        assert_eq!(
            r.finish(),
            Err(DecodeError::MalformedPayload {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_asciiz_roundtrip() {
        let mut w = Writer::new();
        w.asciiz("prog.rxe").unwrap();
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.asciiz("filename"), Ok("prog.rxe"));
        r.finish().unwrap();
    }

    #[test]
    fn test_asciiz_unterminated() {
        let mut r = Reader::new(b"abc");
        assert_eq!(
            r.asciiz("filename"),
            Err(DecodeError::InvalidText { field: "filename" })
        );
    }

    #[test]
    fn test_pascal_padding() {
        let mut w = Writer::new();
        w.pascal(&[0xAA, 0xBB], 5).unwrap();
        assert_eq!(&w.finish()[..], &[2, 0xAA, 0xBB, 0, 0]);

        let mut r = Reader::new(&[2, 0xAA, 0xBB, 0, 0]);
        assert_eq!(r.pascal("data", 5), Ok(&[0xAA, 0xBB][..]));
    }

    #[test]
    fn test_pascal_bad_length() {
        let mut r = Reader::new(&[9, 0, 0]);
        assert!(matches!(
            r.pascal("data", 3),
            Err(DecodeError::InvalidField { field: "data", .. })
        ));
    }

    #[test]
    fn test_bounded_text_rejects_non_ascii() {
        assert!(bounded_text::<8>("héllo", "message").is_err());
        assert!(bounded_text::<8>("a\0b", "message").is_err());
        assert!(bounded_text::<4>("hello", "message").is_err());
        assert_eq!(bounded_text::<8>("hello", "message").unwrap().as_str(), "hello");
    }
}
