//! Little-endian writer producing module images

use crate::error::{BytecodeError, Result};

/// Growable output buffer with the same primitives as [`ByteReader`](crate::ByteReader)
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish and return the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a `u8`
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write a boolean as one byte
    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    /// Write an `i16`
    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write a `u16`
    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write an `i32`
    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write a `u32`
    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write a count or length as `i32`
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let v = i32::try_from(len)
            .map_err(|_| BytecodeError::LengthOverflow { length: len, width: 32 })?;
        self.write_i32(v);
        Ok(())
    }

    /// Write a count as `i16`
    pub fn write_short_len(&mut self, len: usize) -> Result<()> {
        let v = i16::try_from(len)
            .map_err(|_| BytecodeError::LengthOverflow { length: len, width: 16 })?;
        self.write_i16(v);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_len(s.len())?;
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// Write a count-prefixed `i32` array
    pub fn write_int_array(&mut self, values: &[i32]) -> Result<()> {
        self.write_len(values.len())?;
        for v in values {
            self.write_i32(*v);
        }
        Ok(())
    }

    /// Write a count-prefixed byte array
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    /// Write a length-prefixed block
    pub fn write_block(&mut self, block: &[u8]) -> Result<()> {
        self.write_byte_array(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_len_overflow_reported() {
        let mut writer = ByteWriter::new();
        assert_eq!(
            writer.write_short_len(40_000),
            Err(BytecodeError::LengthOverflow {
                length: 40_000,
                width: 16
            })
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn test_short_len_in_range() {
        let mut writer = ByteWriter::new();
        writer.write_short_len(3).unwrap();
        assert_eq!(writer.into_bytes(), 3i16.to_le_bytes());
    }
}
