use crate::protocol::{Error, VarInt};
use uuid::Uuid;

/// A positional reader over a fully buffered frame.
///
/// Modern frames arrive length-prefixed and are buffered in full before decoding, so all
/// field reads operate on an in-memory slice with a cursor. Every read checks that enough
/// bytes remain and fails with [`Error::InsufficientData`] otherwise, leaving the cursor
/// where it was. [`FrameReader::unread`] rewinds the cursor for the one place the protocol
/// requires lookahead (the login tail).
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the number of bytes that have not been consumed yet.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns the current cursor position within the frame.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Consumes the next `count` bytes, advancing the cursor only on success.
    fn take(&mut self, count: usize) -> Result<&'a [u8], Error> {
        if count > self.remaining() {
            return Err(Error::InsufficientData {
                needed: count,
                remaining: self.remaining(),
            });
        }

        let start = self.position;
        self.position += count;
        Ok(&self.data[start..self.position])
    }

    /// Rewinds the cursor by `count` bytes.
    pub fn unread(&mut self, count: usize) -> Result<(), Error> {
        if count > self.position {
            return Err(Error::UnreadOutOfRange {
                requested: count,
                position: self.position,
            });
        }

        self.position -= count;
        Ok(())
    }

    /// Reads a `VarInt` as described in the official [protocol documentation][protocol-doc].
    ///
    /// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#VarInt_and_VarLong
    pub fn read_varint(&mut self) -> Result<VarInt, Error> {
        let mut result = 0;
        for group in 0..5 {
            let byte = self.read_u8()?;
            result |= ((byte & 0b0111_1111) as VarInt) << (7 * group);
            if byte & 0b1000_0000 == 0 {
                return Ok(result);
            }
        }

        // a sixth group would push a 32-bit value past its five-byte limit
        Err(Error::VarIntTooLong)
    }

    /// Reads a `VarInt`-length-prefixed UTF-8 string as described in the official
    /// [protocol documentation][protocol-doc].
    ///
    /// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#Type:String
    pub fn read_string(&mut self) -> Result<String, Error> {
        let length = self.read_varint()? as usize;
        let raw = self.take(length)?;

        String::from_utf8(raw.to_vec()).map_err(|_| Error::InvalidEncoding)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        let raw = self.take(4)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        let mut raw = [0; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(raw))
    }

    /// Reads a `Uuid` from its 16 raw big-endian bytes, as described in the official
    /// [protocol documentation][protocol-doc].
    ///
    /// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#Type:UUID
    pub fn read_uuid(&mut self) -> Result<Uuid, Error> {
        let mut raw = [0; 16];
        raw.copy_from_slice(self.take(16)?);
        Ok(Uuid::from_bytes(raw))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], Error> {
        self.take(count)
    }
}
