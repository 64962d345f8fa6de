//! Little-endian byte writer and reader
//!
//! Shared by the bitcode encoding and every binary container part.

use crate::{Error, Result};

/// Appends little-endian values to a byte buffer
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    /// Writes one byte
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Writes a little-endian u16
    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian u32
    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes with no length prefix
    pub fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// Writes a u32 length followed by UTF-8 bytes
    pub fn str(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.bytes(value.as_bytes());
    }

    /// Writes a presence byte, then the string if present
    pub fn opt_str(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.u8(1);
                self.str(s);
            }
            None => self.u8(0),
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing was written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads little-endian values from a byte slice
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true once every byte was consumed
    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Builds a decode error at the current offset
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Decode {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.error(format!(
                "expected {len} bytes of {what}, found {}",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads one byte
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    /// Reads a little-endian u16
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian u32
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads `len` raw bytes
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len, "payload")
    }

    /// Reads a u32 length followed by UTF-8 bytes
    pub fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let start = self.pos;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Decode {
            offset: start,
            message: "string is not valid UTF-8".to_string(),
        })
    }

    /// Reads a presence byte, then the string if present
    pub fn opt_str(&mut self) -> Result<Option<String>> {
        match self.u8()? {
            0 => Ok(None),
            1 => self.str().map(Some),
            other => Err(self.error(format!("invalid presence flag {other}"))),
        }
    }

    /// Reads an element count, rejecting counts the remaining bytes cannot hold
    pub fn count(&mut self, min_item_size: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_item_size.max(1)) > self.remaining() {
            return Err(self.error(format!(
                "count {count} exceeds the {} remaining bytes",
                self.remaining()
            )));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut w = Writer::new();
        w.u16(7);
        w.u32(0xdead_beef);
        w.str("main");
        w.opt_str(None);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.u16().unwrap(), 7);
        assert_eq!(r.u32().unwrap(), 0xdead_beef);
        assert_eq!(r.str().unwrap(), "main");
        assert_eq!(r.opt_str().unwrap(), None);
        assert!(r.is_at_end());
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let mut r = Reader::new(&[1, 2, 3]);
        r.u8().unwrap();
        match r.u32() {
            Err(Error::Decode { offset, .. }) => assert_eq!(offset, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_count_rejects_oversized() {
        let mut w = Writer::new();
        w.u32(1000);
        let bytes = w.into_bytes();
        assert!(Reader::new(&bytes).count(4).is_err());
    }
}
