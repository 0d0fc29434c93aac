// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Unsigned integers bit-packed to the width of the largest value.

use crate::error::{Error, Result};
use crate::io::{Mapper, Reader, Writer};
use crate::vector::Vector;

pub struct FlatVector {
    units: Vector<u64>,
    value_size: usize,
    mask: u64,
    size: usize,
}

impl FlatVector {
    pub fn new() -> FlatVector {
        FlatVector {
            units: Vector::new(),
            value_size: 0,
            mask: 0,
            size: 0,
        }
    }

    /// Pack `values` at the smallest width that can hold the maximum.
    ///
    /// An all-zero (or empty) input packs at width zero: no payload words at
    /// all, every element reads back as zero.
    pub fn build(values: &[u32]) -> FlatVector {
        let max = values.iter().cloned().max().unwrap_or(0);
        let mut value_size = 0;
        while value_size < 32 && (max >> value_size) != 0 {
            value_size += 1;
        }

        let total_bits = values.len() * value_size;
        let mut units = vec![0u64; (total_bits + 63) / 64];
        for (i, &value) in values.iter().enumerate() {
            if value_size == 0 {
                continue;
            }
            let pos = i * value_size;
            let unit = pos / 64;
            let offset = pos % 64;
            units[unit] |= (value as u64) << offset;
            if offset + value_size > 64 {
                units[unit + 1] |= (value as u64) >> (64 - offset);
            }
        }

        FlatVector {
            units: Vector::from_vec(units),
            value_size,
            mask: if value_size == 0 {
                0
            } else {
                (1u64 << value_size) - 1
            },
            size: values.len(),
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        debug_assert!(i < self.size, "Flat vector index out of range.");
        if self.value_size == 0 {
            return 0;
        }
        let pos = i * self.value_size;
        let unit = pos / 64;
        let offset = pos % 64;
        let mut value = self.units[unit] >> offset;
        if offset + self.value_size > 64 {
            value |= self.units[unit + 1] << (64 - offset);
        }
        (value & self.mask) as u32
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn io_size(&self) -> usize {
        self.units.io_size() + 24
    }

    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.units.write(writer)?;
        writer.write_u64(self.value_size as u64)?;
        writer.write_u64(self.mask)?;
        writer.write_u64(self.size as u64)
    }

    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<FlatVector> {
        let units = Vector::read(reader)?;
        let value_size = reader.read_u64()? as usize;
        let mask = reader.read_u64()?;
        let size = reader.read_u64()? as usize;
        Self::validate(FlatVector {
            units,
            value_size,
            mask,
            size,
        })
    }

    pub fn map(mapper: &mut Mapper) -> Result<FlatVector> {
        let units = Vector::map(mapper)?;
        let value_size = mapper.read_u64()? as usize;
        let mask = mapper.read_u64()?;
        let size = mapper.read_u64()? as usize;
        Self::validate(FlatVector {
            units,
            value_size,
            mask,
            size,
        })
    }

    fn validate(fv: FlatVector) -> Result<FlatVector> {
        if fv.value_size > 32 {
            return Err(Error::InvalidFormat("flat vector value size exceeds 32"));
        }
        let expected_mask = if fv.value_size == 0 {
            0
        } else {
            (1u64 << fv.value_size) - 1
        };
        if fv.mask != expected_mask {
            return Err(Error::InvalidFormat("flat vector mask mismatch"));
        }
        let total_bits = fv
            .size
            .checked_mul(fv.value_size)
            .ok_or(Error::InvalidFormat("flat vector size overflow"))?;
        if fv.units.len() != (total_bits + 63) / 64 {
            return Err(Error::InvalidFormat("flat vector unit count mismatch"));
        }
        Ok(fv)
    }
}
