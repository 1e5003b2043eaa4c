use byteorder::{BigEndian, ByteOrder};

use crate::error::DecodeError;

/// A cursor over an in-memory packet buffer. Every read advances the
/// offset; a read past the end of `data` fails instead of panicking.
pub struct ByteArray<'a> {
    offset: usize,
    data: &'a [u8],
}

impl<'a> ByteArray<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        ByteArray { offset: 0, data }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Rewind (or fast-forward) the cursor to an offset previously
    /// observed via [`Self::offset`].
    pub fn reset_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Bytes left to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.offset).ok_or(DecodeError::OutOfRange)?;
        self.offset += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.offset.checked_add(len).ok_or(DecodeError::OutOfRange)?;
        if end > self.data.len() {
            return Err(DecodeError::OutOfRange);
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Read the rest of the buffer without consuming a length prefix.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.offset..];
        self.offset = self.data.len();
        slice
    }

    /// Read a 16-bit-length-prefixed UTF-8 string, per MQTT's string encoding.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_byte_and_u16() {
        let buf = [0x01, 0x02, 0x03];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_byte().unwrap(), 0x01);
        assert_eq!(ba.read_u16().unwrap(), 0x0203);
    }

    #[test]
    fn out_of_range_fails() {
        let buf = [0x01];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_u16(), Err(DecodeError::OutOfRange));
    }

    #[test]
    fn reads_prefixed_string() {
        let buf = [0x00, 0x03, b'f', b'o', b'o'];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_string().unwrap(), "foo");
    }
}
