//! Little-endian cursor over a module image

use crate::error::{BytecodeError, Result};

/// Bounds-checked reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether the whole input was consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(BytecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: len,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a boolean stored as one byte
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read an `i16`
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    /// Read a `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    /// Read an `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Read a `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Peek an `i16` without advancing
    pub fn peek_i16(&self) -> Result<i16> {
        self.clone().read_i16()
    }

    /// Read an `i32` count or length prefix, rejecting negatives
    pub fn read_len(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| BytecodeError::InvalidLength {
            length: len as i64,
            offset,
        })
    }

    /// Read an `i16` count prefix, rejecting negatives
    pub fn read_short_len(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.read_i16()?;
        usize::try_from(len).map_err(|_| BytecodeError::InvalidLength {
            length: len as i64,
            offset,
        })
    }

    /// Read an `i32` entry count
    ///
    /// Each entry occupies at least `min_entry_size` bytes, so a count the
    /// rest of the input cannot hold is rejected before anything is allocated.
    pub fn read_count(&mut self, min_entry_size: usize) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_len()?;
        self.check_count(count, min_entry_size, offset)
    }

    /// Read an `i16` entry count, see [`ByteReader::read_count`]
    pub fn read_short_count(&mut self, min_entry_size: usize) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_short_len()?;
        self.check_count(count, min_entry_size, offset)
    }

    fn check_count(&self, count: usize, min_entry_size: usize, offset: usize) -> Result<usize> {
        let remaining = self.remaining();
        if count.saturating_mul(min_entry_size.max(1)) > remaining {
            return Err(BytecodeError::CountOverflow {
                count,
                offset,
                remaining,
            });
        }
        Ok(count)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let offset = self.pos;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BytecodeError::InvalidUtf8(offset))
    }

    /// Read a count-prefixed `i32` array
    pub fn read_int_array(&mut self) -> Result<Vec<i32>> {
        let len = self.read_count(4)?;
        (0..len).map(|_| self.read_i32()).collect()
    }

    /// Read a count-prefixed byte array
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Read a length-prefixed block as a sub-reader
    pub fn read_block(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }
}
