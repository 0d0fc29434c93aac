// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The three IO backends behind one framed byte format.
//!
//! A dictionary is a 16-byte magic header followed by length-prefixed blobs,
//! every blob padded to an 8-byte boundary. `Writer` produces the stream,
//! `Reader` consumes it by copying, and `Mapper` consumes it zero-copy from
//! either a memory-mapped file or a caller-provided static buffer. All three
//! must agree byte for byte; the round-trip tests in the trie module hold
//! them to that.

use std::fs;
use std::io;
use std::mem;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Starts every dictionary file. The trailing newline is part of the magic.
pub const HEADER: [u8; 16] = *b"We love Marisa.\n";

/// Streaming writer that tracks its offset so blobs can be padded.
pub struct Writer<W: io::Write> {
    inner: W,
    bytes_written: usize,
}

impl<W: io::Write> Writer<W> {
    pub fn new(inner: W) -> Writer<W> {
        Writer {
            inner,
            bytes_written: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.write_bytes(&HEADER)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.bytes_written += bytes.len();
        Ok(())
    }

    pub fn write_u32(&mut self, x: u32) -> Result<()> {
        self.write_bytes(&x.to_le_bytes())
    }

    pub fn write_u64(&mut self, x: u64) -> Result<()> {
        self.write_bytes(&x.to_le_bytes())
    }

    /// Write zero bytes up to the next 8-byte boundary.
    pub fn pad(&mut self) -> Result<()> {
        while self.bytes_written % 8 != 0 {
            self.write_bytes(&[0u8])?;
        }
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

/// Copying reader over any byte stream.
pub struct Reader<R: io::Read> {
    inner: R,
    bytes_read: usize,
}

impl<R: io::Read> Reader<R> {
    pub fn new(inner: R) -> Reader<R> {
        Reader {
            inner,
            bytes_read: 0,
        }
    }

    pub fn check_header(&mut self) -> Result<()> {
        let mut magic = [0u8; 16];
        self.read_exact(&mut magic)?;
        if magic != HEADER {
            return Err(Error::InvalidFormat("bad magic header"));
        }
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.bytes_read += buf.len();
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Consume padding up to the next 8-byte boundary.
    pub fn read_pad(&mut self) -> Result<()> {
        let mut pad = [0u8; 8];
        let n = (8 - self.bytes_read % 8) % 8;
        self.read_exact(&mut pad[..n])
    }
}

/// A read-only memory map of a whole dictionary file.
pub struct Mapping {
    ptr: *mut libc::c_void,
    len: usize,
}

// The mapping is read-only for its entire lifetime.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    pub fn open(path: &Path) -> Result<Mapping> {
        let file = fs::File::open(path).map_err(Error::IoError)?;
        let len = file.metadata().map_err(Error::IoError)?.len() as usize;
        if len == 0 {
            return Err(Error::InvalidFormat("empty file"));
        }
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::IoError(io::Error::last_os_error()));
        }
        // The file descriptor can be closed now; the mapping stays valid.
        Ok(Mapping { ptr, len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}

enum Region {
    Mapped(Arc<Mapping>),
    Static(&'static [u8]),
}

/// Zero-copy cursor over a fully resident dictionary image.
pub struct Mapper {
    region: Region,
    pos: usize,
}

impl Mapper {
    pub fn from_mapping(mapping: Arc<Mapping>) -> Mapper {
        Mapper {
            region: Region::Mapped(mapping),
            pos: 0,
        }
    }

    pub fn from_static(bytes: &'static [u8]) -> Mapper {
        Mapper {
            region: Region::Static(bytes),
            pos: 0,
        }
    }

    fn bytes(&self) -> &[u8] {
        match &self.region {
            Region::Mapped(mapping) => mapping.as_bytes(),
            Region::Static(bytes) => bytes,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes().len() - self.pos
    }

    pub fn check_header(&mut self) -> Result<()> {
        if self.remaining() < 16 || self.bytes()[self.pos..self.pos + 16] != HEADER {
            return Err(Error::InvalidFormat("bad magic header"));
        }
        self.pos += 16;
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(Error::InvalidFormat("unexpected end of data"));
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes()[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            return Err(Error::InvalidFormat("unexpected end of data"));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes()[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_le_bytes(buf))
    }

    /// Claim `count` elements of `T` in place and advance past them.
    ///
    /// Returns the element pointer, plus a clone of the map handle when the
    /// region is a memory map, so the caller's view keeps the map alive.
    pub fn take_slice<T: crate::vector::Pod>(
        &mut self,
        count: usize,
    ) -> Result<(*const T, Option<Arc<Mapping>>)> {
        let byte_len = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(Error::InvalidFormat("element count overflow"))?;
        if self.remaining() < byte_len {
            return Err(Error::InvalidFormat("unexpected end of data"));
        }
        let ptr = unsafe { self.bytes().as_ptr().add(self.pos) } as *const T;
        if (ptr as usize) % mem::align_of::<T>() != 0 {
            // A memory map is page-aligned and all blobs are 8-byte padded,
            // so this can only trip for a misaligned static buffer.
            return Err(Error::InvalidFormat("misaligned buffer"));
        }
        self.pos += byte_len;
        let map = match &self.region {
            Region::Mapped(mapping) => Some(mapping.clone()),
            Region::Static(..) => None,
        };
        Ok((ptr, map))
    }

    /// Skip padding up to the next 8-byte boundary.
    pub fn pad(&mut self) -> Result<()> {
        let n = (8 - self.pos % 8) % 8;
        if self.remaining() < n {
            return Err(Error::InvalidFormat("unexpected end of data"));
        }
        self.pos += n;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Mapper, Reader, Writer, HEADER};

    #[test]
    fn header_is_sixteen_bytes() {
        assert_eq!(HEADER.len(), 16);
        assert_eq!(&HEADER[..], b"We love Marisa.\n");
    }

    #[test]
    fn writer_pads_to_eight_bytes() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        writer.write_u32(7).unwrap();
        writer.pad().unwrap();
        writer.write_u64(9).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..4], &7u32.to_le_bytes());
        assert_eq!(&buf[8..], &9u64.to_le_bytes());
    }

    #[test]
    fn reader_rejects_bad_magic() {
        let mut bytes = HEADER.to_vec();
        bytes[0] ^= 1;
        let mut reader = Reader::new(&bytes[..]);
        assert!(reader.check_header().is_err());

        let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        let mut mapper = Mapper::from_static(leaked);
        assert!(mapper.check_header().is_err());
    }

    #[test]
    fn reader_and_mapper_agree_on_scalars() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        writer.write_u64(123).unwrap();
        writer.write_u32(4).unwrap();
        writer.write_u32(5).unwrap();

        let mut reader = Reader::new(&buf[..]);
        assert_eq!(reader.read_u64().unwrap(), 123);
        assert_eq!(reader.read_u32().unwrap(), 4);
        assert_eq!(reader.read_u32().unwrap(), 5);

        let leaked: &'static [u8] = Box::leak(buf.into_boxed_slice());
        let mut mapper = Mapper::from_static(leaked);
        assert_eq!(mapper.read_u64().unwrap(), 123);
        assert_eq!(mapper.read_u32().unwrap(), 4);
        assert_eq!(mapper.read_u32().unwrap(), 5);
    }
}
