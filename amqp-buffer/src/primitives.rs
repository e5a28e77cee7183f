use crate::error::{Error, Result};

/// Common byte-cursor operations shared by [`crate::Chunk`] and
/// [`crate::CompositeBuffer`], plus big-endian typed reads/writes built on
/// top of them.
///
/// AMQP 1.0 is a big-endian wire protocol; every multi-byte primitive here
/// follows that convention.
pub trait ByteCursor {
    /// Bytes available to read.
    fn readable(&self) -> usize;

    /// Bytes available to write before capacity is reached.
    fn writable(&self) -> usize;

    /// Reads and consumes exactly `len` bytes.
    fn read_bytes(&mut self, len: usize) -> Result<bytes::Bytes>;

    /// Writes a byte slice, growing storage if necessary.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads a single byte.
    fn read_u8(&mut self) -> Result<u8> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    /// Writes a single byte.
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    /// Reads a big-endian `u16`.
    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Writes a big-endian `u16`.
    fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Reads a big-endian `u32`.
    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Writes a big-endian `u32`.
    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Reads a big-endian `u64`.
    fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&b[..8]);
        Ok(u64::from_be_bytes(arr))
    }

    /// Writes a big-endian `u64`.
    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Reads a big-endian `i8`.
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Writes a big-endian `i8`.
    fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Reads a big-endian `i16`.
    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Writes a big-endian `i16`.
    fn write_i16(&mut self, v: i16) -> Result<()> {
        self.write_u16(v as u16)
    }

    /// Reads a big-endian `i32`.
    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Writes a big-endian `i32`.
    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_u32(v as u32)
    }

    /// Reads a big-endian `i64`.
    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Writes a big-endian `i64`.
    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_u64(v as u64)
    }

    /// Reads an IEEE-754 `f32`.
    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Writes an IEEE-754 `f32`.
    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_u32(v.to_bits())
    }

    /// Reads an IEEE-754 `f64`.
    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Writes an IEEE-754 `f64`.
    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_u64(v.to_bits())
    }

    /// Reads an AMQP boolean (a single byte, `0x00` or `0x01`).
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Writes an AMQP boolean.
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Reads an AMQP `char`: a Unicode code point encoded as UTF-32BE.
    fn read_char(&mut self) -> Result<char> {
        let code = self.read_u32()?;
        char::from_u32(code).ok_or(Error::CapacityOverflow)
    }

    /// Writes an AMQP `char` as UTF-32BE.
    fn write_char(&mut self, v: char) -> Result<()> {
        self.write_u32(v as u32)
    }
}

impl ByteCursor for crate::chunk::Chunk {
    fn readable(&self) -> usize {
        crate::chunk::Chunk::readable(self)
    }

    fn writable(&self) -> usize {
        crate::chunk::Chunk::writable(self)
    }

    fn read_bytes(&mut self, len: usize) -> Result<bytes::Bytes> {
        crate::chunk::Chunk::read_bytes(self, len)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        crate::chunk::Chunk::write_bytes(self, bytes)
    }
}

impl ByteCursor for crate::composite::CompositeBuffer {
    fn readable(&self) -> usize {
        crate::composite::CompositeBuffer::readable(self)
    }

    fn writable(&self) -> usize {
        crate::composite::CompositeBuffer::writable(self)
    }

    fn read_bytes(&mut self, len: usize) -> Result<bytes::Bytes> {
        crate::composite::CompositeBuffer::read_bytes(self, len)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        crate::composite::CompositeBuffer::write_bytes(self, bytes)
    }
}
