//! Byte-sink and byte-source abstractions the emitter writes through and the
//! interpreter reads through.
//!
//! Kept as thin traits over [`std::io::Write`]/[`std::io::Read`] rather than
//! a concrete buffer type, mirroring how the teacher crate keeps its storage
//! backend behind a trait instead of a concrete struct: a `Vec<u8>`, a file,
//! or an in-memory cursor all work without this crate depending on any of
//! them specifically.

use std::io::{self, Read, Write};

/// A byte sink the emitter serializes a bytecode image into.
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_bytes(&value.to_ne_bytes())
    }
}

impl<W: Write> ByteSink for W {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }
}

/// A byte source the interpreter parses a bytecode image out of.
pub trait ByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }
}

impl<R: Read> ByteSource for R {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.read_exact(buf)
    }
}
