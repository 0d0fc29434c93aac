// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! A contiguous array of plain-old-data elements with framed raw-byte IO.
//!
//! Every serialized structure in a dictionary bottoms out in `Vector<T>`:
//! a `u64` element count, the raw element bytes, and padding up to an 8-byte
//! boundary. The same container backs three ways of owning the data: a plain
//! heap allocation (`read`), a view into a memory map (`map`), and a view
//! into a caller-provided static buffer. Views keep the backing map alive
//! through a reference count, so an index into mapped memory can never
//! outlive the map itself.

use std::mem;
use std::ops::Deref;
use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::error::Result;
use crate::io::{Mapper, Mapping, Reader, Writer};

/// Marker for types that are plain bytes: no padding, any bit pattern valid.
///
/// Implementors guarantee that reading a value from arbitrary initialized
/// bytes of the right length is defined behavior, and that the in-memory
/// layout is exactly the on-disk layout (on a little-endian target).
pub unsafe trait Pod: Copy + 'static {}

unsafe impl Pod for u8 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for u64 {}

enum Storage<T: Pod> {
    Owned(Vec<T>),
    View {
        ptr: *const T,
        len: usize,
        // Keeps the memory map alive for as long as this view exists. `None`
        // for views into a caller-provided static buffer.
        _map: Option<Arc<Mapping>>,
    },
}

pub struct Vector<T: Pod> {
    storage: Storage<T>,
}

// A view is a read-only window into memory that the reference-counted map
// (or a static buffer) keeps valid, so moving or sharing it across threads
// is fine for plain-old-data elements.
unsafe impl<T: Pod> Send for Vector<T> {}
unsafe impl<T: Pod> Sync for Vector<T> {}

impl<T: Pod> Vector<T> {
    pub fn new() -> Vector<T> {
        Vector {
            storage: Storage::Owned(Vec::new()),
        }
    }

    pub fn from_vec(elements: Vec<T>) -> Vector<T> {
        Vector {
            storage: Storage::Owned(elements),
        }
    }

    pub fn push(&mut self, element: T) {
        match &mut self.storage {
            Storage::Owned(vec) => vec.push(element),
            Storage::View { .. } => panic!("Cannot push into a mapped vector."),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Owned(vec) => &vec[..],
            Storage::View { ptr, len, .. } => unsafe { slice::from_raw_parts(*ptr, *len) },
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Owned(vec) => &mut vec[..],
            Storage::View { .. } => panic!("Cannot mutate a mapped vector."),
        }
    }

    /// The number of bytes this vector occupies in the serialized stream.
    pub fn io_size(&self) -> usize {
        8 + pad8(self.len() * mem::size_of::<T>())
    }

    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_u64(self.len() as u64)?;
        let bytes = unsafe {
            slice::from_raw_parts(
                self.as_slice().as_ptr() as *const u8,
                self.len() * mem::size_of::<T>(),
            )
        };
        writer.write_bytes(bytes)?;
        writer.pad()
    }

    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Vector<T>> {
        let len = reader.read_u64()? as usize;
        let byte_len = len
            .checked_mul(mem::size_of::<T>())
            .ok_or(crate::error::Error::InvalidFormat("element count overflow"))?;

        let mut bytes = vec![0u8; byte_len];
        reader.read_exact(&mut bytes)?;
        reader.read_pad()?;

        let mut elements: Vec<T> = Vec::with_capacity(len);
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                elements.as_mut_ptr() as *mut u8,
                byte_len,
            );
            elements.set_len(len);
        }
        Ok(Vector::from_vec(elements))
    }

    pub fn map(mapper: &mut Mapper) -> Result<Vector<T>> {
        let len = mapper.read_u64()? as usize;
        let (ptr, map) = mapper.take_slice::<T>(len)?;
        mapper.pad()?;
        Ok(Vector {
            storage: Storage::View {
                ptr,
                len,
                _map: map,
            },
        })
    }
}

impl<T: Pod> Deref for Vector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Round `n` up to the next multiple of 8.
pub fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

#[cfg(test)]
mod test {
    use super::{pad8, Vector};
    use crate::io::{Mapper, Reader, Writer};

    #[test]
    fn pad8_rounds_up() {
        assert_eq!(pad8(0), 0);
        assert_eq!(pad8(1), 8);
        assert_eq!(pad8(8), 8);
        assert_eq!(pad8(12), 16);
    }

    #[test]
    fn vector_roundtrips_through_reader() {
        let mut v: Vector<u32> = Vector::new();
        for i in 0..5 {
            v.push(i * 100);
        }

        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        v.write(&mut writer).unwrap();

        // Count (8) plus five u32s (20) padded to 24.
        assert_eq!(buf.len(), 8 + 24);
        assert_eq!(buf.len(), v.io_size());

        let mut reader = Reader::new(&buf[..]);
        let w: Vector<u32> = Vector::read(&mut reader).unwrap();
        assert_eq!(w.as_slice(), v.as_slice());
    }

    #[test]
    fn vector_maps_without_copying() {
        let mut v: Vector<u64> = Vector::new();
        v.push(0xdead_beef);
        v.push(42);

        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        v.write(&mut writer).unwrap();

        // The buffer outlives the test; leaking stands in for a static slice.
        let bytes: &'static [u8] = Box::leak(buf.into_boxed_slice());
        let mut mapper = Mapper::from_static(bytes);
        let w: Vector<u64> = Vector::map(&mut mapper).unwrap();
        assert_eq!(w.as_slice(), &[0xdead_beef, 42]);
    }

    #[test]
    fn truncated_vector_is_a_format_error() {
        let mut v: Vector<u64> = Vector::new();
        v.push(1);
        v.push(2);

        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        v.write(&mut writer).unwrap();

        let mut reader = Reader::new(&buf[..buf.len() - 4]);
        assert!(Vector::<u64>::read(&mut reader).is_err());

        let bytes: &'static [u8] = Box::leak(buf[..buf.len() - 4].to_vec().into_boxed_slice());
        let mut mapper = Mapper::from_static(bytes);
        assert!(Vector::<u64>::map(&mut mapper).is_err());
    }
}
