#![allow(missing_docs)]
use std::io::{Cursor, Read, Result};

use crate::serial::ReadFrom;

impl ReadFrom for u8 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for u16 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for u32 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for u64 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for i8 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for i16 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for i32 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}

impl ReadFrom for i64 {
    fn read(data: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut buf = [0; size_of::<Self>()];
        data.read_exact(&mut buf)?;
        Ok(Self::from_le_bytes(buf))
    }
}
