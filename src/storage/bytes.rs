//! Little-endian cursor for parsing checkpoint regions
//!
//! Every short read is reported as `CorruptPersistence`: a region that
//! passed its checksum but does not parse was written by something else.

use crate::{IndexError, Result};

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    region: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], region: &'static str) -> Self {
        Self { buf, pos: 0, region }
    }

    pub fn corrupt(&self, msg: impl std::fmt::Display) -> IndexError {
        IndexError::CorruptPersistence(format!("{} region: {}", self.region, msg))
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                self.corrupt(format!(
                    "truncated at offset {} (wanted {} bytes, {} left)",
                    self.pos,
                    n,
                    self.buf.len() - self.pos
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn expect_magic(&mut self, magic: &[u8; 4]) -> Result<()> {
        let got = self.take(4)?;
        if got != magic {
            return Err(self.corrupt(format!("bad magic {:?}", got)));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Append `n` f32 values to `out`
    pub fn f32s_into(&mut self, n: usize, out: &mut Vec<f32>) -> Result<()> {
        let bytes = self.take(n * 4)?;
        out.extend(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
        Ok(())
    }

    /// Length-prefixed (u32) byte string
    pub fn blob(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(self.corrupt(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_blob(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sequence() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"TEST");
        put_u32(&mut buf, 7);
        buf.extend_from_slice(&1.5f32.to_le_bytes());
        put_blob(&mut buf, b"abc");

        let mut reader = ByteReader::new(&buf, "test");
        reader.expect_magic(b"TEST").unwrap();
        assert_eq!(reader.u32().unwrap(), 7);
        let mut floats = Vec::new();
        reader.f32s_into(1, &mut floats).unwrap();
        assert_eq!(floats, vec![1.5]);
        assert_eq!(reader.blob().unwrap(), b"abc");
        reader.finish().unwrap();
    }

    #[test]
    fn test_truncation_is_corruption() {
        let mut reader = ByteReader::new(&[1, 2], "test");
        assert!(matches!(reader.u32(), Err(IndexError::CorruptPersistence(_))));

        let mut reader = ByteReader::new(b"NOPE", "test");
        assert!(reader.expect_magic(b"GRPH").is_err());

        let reader = ByteReader::new(&[0u8; 3], "test");
        assert!(reader.finish().is_err());
    }
}
