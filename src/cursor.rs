//! Bounds-checked little-endian reader over `&[u8]`.

use crate::error::DibError;

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), DibError> {
        let new_pos = self.pos.checked_add(n).ok_or(DibError::UnexpectedEof)?;
        if new_pos > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        self.pos = new_pos;
        Ok(())
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, DibError> {
        Ok(u16::from_le_bytes(self.read_fixed_bytes()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, DibError> {
        Ok(u32::from_le_bytes(self.read_fixed_bytes()?))
    }

    pub(crate) fn read_i32_le(&mut self) -> Result<i32, DibError> {
        Ok(i32::from_le_bytes(self.read_fixed_bytes()?))
    }

    pub(crate) fn read_fixed_bytes<const N: usize>(&mut self) -> Result<[u8; N], DibError> {
        let end = self.pos.checked_add(N).ok_or(DibError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(buf)
    }
}
