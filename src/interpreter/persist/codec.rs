//! Binary codec: little-endian fixed-width integers and floats, u32
//! length-prefixed UTF-8 strings

use crate::interpreter::errors::PersistError;
use std::io::{self, Read, Write};

pub struct Encoder<W: Write> {
    out: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(out: W) -> Self {
        Encoder { out }
    }

    pub fn bytes(&mut self, b: &[u8]) -> Result<(), PersistError> {
        self.out.write_all(b)?;
        Ok(())
    }

    pub fn word(&mut self, w: u16) -> Result<(), PersistError> {
        self.bytes(&w.to_le_bytes())
    }

    pub fn int(&mut self, v: i32) -> Result<(), PersistError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn long(&mut self, v: i64) -> Result<(), PersistError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn float(&mut self, v: f32) -> Result<(), PersistError> {
        self.bytes(&v.to_le_bytes())
    }

    pub fn string(&mut self, s: &str) -> Result<(), PersistError> {
        let len = u32::try_from(s.len()).map_err(|_| PersistError::corrupt("string too long"))?;
        self.bytes(&len.to_le_bytes())?;
        self.bytes(s.as_bytes())
    }

    pub fn flush(&mut self) -> Result<(), PersistError> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct Decoder<R: Read> {
    input: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(input: R) -> Self {
        Decoder { input }
    }

    pub fn fill(&mut self, buf: &mut [u8]) -> Result<(), PersistError> {
        self.input.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => PersistError::corrupt("unexpected end of data"),
            _ => PersistError::Io(e),
        })
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], PersistError> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn word(&mut self) -> Result<u16, PersistError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn int(&mut self) -> Result<i32, PersistError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn long(&mut self) -> Result<i64, PersistError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn float(&mut self) -> Result<f32, PersistError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn string(&mut self) -> Result<String, PersistError> {
        let len = u32::from_le_bytes(self.array()?) as usize;
        let mut buf = Vec::new();
        // length is untrusted; read through `take` instead of preallocating
        let read = (&mut self.input)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(PersistError::Io)?;
        if read != len {
            return Err(PersistError::corrupt("unexpected end of data"));
        }
        String::from_utf8(buf).map_err(|_| PersistError::corrupt("invalid utf-8 in string"))
    }
}
