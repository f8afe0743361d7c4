//! Bounds-checked binary cursor over an in-memory buffer.
//!
//! Used to decode the fixed-width, little-endian fields of the multifile
//! header and subfile directory, plus the handful of big-endian fields
//! network byte order occasionally demands. Every extraction is checked
//! against the remaining buffer length; there is no panicking path.

use thiserror::Error;

/// Errors produced while reading from a [`Cursor`].
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Fewer bytes remained in the buffer than the operation requested.
    #[error("requested {requested} bytes at index {index}, but only {remaining} remained")]
    Overflow {
        /// Number of bytes the operation tried to read.
        requested: usize,
        /// Number of bytes actually left in the buffer.
        remaining: usize,
        /// Byte offset the read started at.
        index: usize,
    },
}

/// Result type for [`Cursor`] operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A read-only cursor over a byte buffer.
///
/// Tracks a current position and exposes bounds-checked extraction of
/// fixed-width integers and byte slices. All multi-byte integers are
/// interpreted as little-endian unless a `_be` variant is used.
pub struct Cursor<'a> {
    buf: &'a [u8],
    index: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at the start of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, index: 0 }
    }

    /// Returns the current byte offset into the buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.index
    }

    /// Returns the number of bytes remaining after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.index
    }

    /// Moves the cursor to an absolute byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if `index` exceeds the buffer length.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index > self.buf.len() {
            return Err(Error::Overflow {
                requested: index,
                remaining: self.buf.len(),
                index: self.index,
            });
        }
        self.index = index;
        Ok(())
    }

    /// Skips `n` bytes without returning them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than `n` bytes remain.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.peek(n)?;
        self.index += n;
        Ok(())
    }

    /// Returns the next `n` bytes without advancing the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than `n` bytes remain.
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::Overflow {
                requested: n,
                remaining,
                index: self.index,
            });
        }
        Ok(&self.buf[self.index..self.index + n])
    }

    /// Returns the next `n` bytes and advances the cursor past them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than `n` bytes remain.
    pub fn extract(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(n)?;
        self.index += n;
        Ok(bytes)
    }

    /// Reads an unsigned 8-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if no byte remains.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.extract(1)?[0])
    }

    /// Reads a little-endian unsigned 16-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 2 bytes remain.
    pub fn get_u16_le(&mut self) -> Result<u16> {
        let bytes = self.extract(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian unsigned 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 4 bytes remain.
    pub fn get_u32_le(&mut self) -> Result<u32> {
        let bytes = self.extract(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian unsigned 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 8 bytes remain.
    pub fn get_u64_le(&mut self) -> Result<u64> {
        let bytes = self.extract(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("exactly 8 bytes")))
    }

    /// Reads a little-endian signed 16-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 2 bytes remain.
    pub fn get_i16_le(&mut self) -> Result<i16> {
        Ok(self.get_u16_le()? as i16)
    }

    /// Reads a little-endian signed 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 4 bytes remain.
    pub fn get_i32_le(&mut self) -> Result<i32> {
        Ok(self.get_u32_le()? as i32)
    }

    /// Reads a big-endian unsigned 16-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 2 bytes remain.
    pub fn get_u16_be(&mut self) -> Result<u16> {
        let bytes = self.extract(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian unsigned 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if fewer than 4 bytes remain.
    pub fn get_u32_be(&mut self) -> Result<u32> {
        let bytes = self.extract(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let buf = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.get_u16_le().unwrap(), 1);
        assert_eq!(cursor.get_u32_le().unwrap(), 2);
    }

    #[test]
    fn reads_big_endian_integers() {
        let buf = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.get_u16_be().unwrap(), 1);
        assert_eq!(cursor.get_u32_be().unwrap(), 2);
    }

    #[test]
    fn peek_does_not_advance() {
        let buf = [0xAA, 0xBB, 0xCC];
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.peek(2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.extract(2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn overflow_reports_exact_counts() {
        let buf = [0x00_u8; 3];
        let mut cursor = Cursor::new(&buf);
        cursor.skip(1).unwrap();
        let err = cursor.extract(4).unwrap_err();
        assert_eq!(
            err,
            Error::Overflow {
                requested: 4,
                remaining: 2,
                index: 1,
            }
        );
    }

    #[test]
    fn skip_and_seek() {
        let buf = [0x00_u8; 10];
        let mut cursor = Cursor::new(&buf);
        cursor.skip(4).unwrap();
        assert_eq!(cursor.position(), 4);
        cursor.seek(0).unwrap();
        assert_eq!(cursor.position(), 0);
        assert!(cursor.seek(11).is_err());
    }
}
