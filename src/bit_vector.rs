// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Succinct bit vector with constant-time rank and logarithmic select.
//!
//! The rank index stores, for every 256-bit block, the number of set bits
//! before the block (32 bits) plus the number of set bits before each of the
//! block's four words (8 bits each, at most 192). That is 8 bytes of index
//! per 32 bytes of payload. Select keeps one sample per 512 set (or unset)
//! bits: the index of the rank block that contains the sampled bit. A select
//! query binary-searches the rank blocks between two samples, picks the word
//! through the relative counts, and finishes with a byte-table select inside
//! the word.

use crate::bits::{pop_count, select_bit};
use crate::error::{Error, Result};
use crate::io::{Mapper, Reader, Writer};
use crate::vector::{Pod, Vector};

/// Rank index entry covering one 256-bit block.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct RankEntry {
    abs: u32,
    rels: [u8; 4],
}

unsafe impl Pod for RankEntry {}

impl RankEntry {
    fn new(abs: u32, rels: [u8; 4]) -> RankEntry {
        RankEntry { abs, rels }
    }

    #[inline(always)]
    fn abs(&self) -> usize {
        self.abs as usize
    }

    /// Set bits in this block before word `j`.
    #[inline(always)]
    fn rel(&self, j: usize) -> usize {
        self.rels[j] as usize
    }

    /// Unset bits in this block before word `j`.
    #[inline(always)]
    fn rel0(&self, j: usize) -> usize {
        j * 64 - self.rels[j] as usize
    }
}

pub struct BitVector {
    units: Vector<u64>,
    size: usize,
    num_ones: usize,
    ranks: Vector<RankEntry>,
    select0s: Vector<u32>,
    select1s: Vector<u32>,
}

impl BitVector {
    pub fn new() -> BitVector {
        BitVector {
            units: Vector::new(),
            size: 0,
            num_ones: 0,
            ranks: Vector::new(),
            select0s: Vector::new(),
            select1s: Vector::new(),
        }
    }

    pub fn push(&mut self, bit: bool) {
        if self.size % 64 == 0 {
            self.units.push(0);
        }
        if bit {
            let unit = self.size / 64;
            self.units.as_mut_slice()[unit] |= 1u64 << (self.size % 64);
            self.num_ones += 1;
        }
        self.size += 1;
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn num_ones(&self) -> usize {
        self.num_ones
    }

    pub fn num_zeros(&self) -> usize {
        self.size - self.num_ones
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.size, "Bit index out of range.");
        (self.units[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Build the rank index, and select indices when enabled.
    pub fn build(&mut self, enable_select0: bool, enable_select1: bool) {
        let num_blocks = (self.size + 255) / 256;
        let mut ranks = Vector::new();
        let mut select0s = Vector::new();
        let mut select1s = Vector::new();

        let mut abs = 0usize;
        let mut next_sample0 = 0usize;
        let mut next_sample1 = 0usize;

        for block in 0..num_blocks {
            let mut rels = [0u8; 4];
            let mut block_ones = 0usize;
            for j in 0..4 {
                rels[j] = block_ones as u8;
                let unit = block * 4 + j;
                if unit < self.units.len() {
                    block_ones += pop_count(self.units[unit]);
                }
            }
            let abs_after = abs + block_ones;

            if enable_select1 {
                while next_sample1 < abs_after {
                    select1s.push(block as u32);
                    next_sample1 += 512;
                }
            }
            if enable_select0 {
                let block_end = (256 * (block + 1)).min(self.size);
                let zeros_after = block_end - abs_after;
                while next_sample0 < zeros_after {
                    select0s.push(block as u32);
                    next_sample0 += 512;
                }
            }

            ranks.push(RankEntry::new(abs as u32, rels));
            abs = abs_after;
        }
        // Sentinel entry so that rank at the very end stays in bounds.
        ranks.push(RankEntry::new(self.num_ones as u32, [0u8; 4]));

        self.ranks = ranks;
        self.select0s = select0s;
        self.select1s = select1s;
    }

    /// Whether the rank index exists; loaded data may lack it.
    pub(crate) fn is_built(&self) -> bool {
        self.size == 0 || !self.ranks.is_empty()
    }

    pub(crate) fn has_select0(&self) -> bool {
        self.num_zeros() == 0 || !self.select0s.is_empty()
    }

    pub(crate) fn has_select1(&self) -> bool {
        self.num_ones == 0 || !self.select1s.is_empty()
    }

    /// The number of set bits in positions `[0, i)`.
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        debug_assert!(i <= self.size, "Rank position out of range.");
        debug_assert!(!self.ranks.is_empty(), "Rank queried before build.");
        let entry = &self.ranks[i / 256];
        let mut r = entry.abs() + entry.rel((i % 256) / 64);
        if i % 64 != 0 {
            r += pop_count(self.units[i / 64] & ((1u64 << (i % 64)) - 1));
        }
        r
    }

    /// The number of unset bits in positions `[0, i)`.
    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    /// The position of the i-th (0-indexed) set bit.
    pub fn select1(&self, i: usize) -> usize {
        debug_assert!(i < self.num_ones, "Select index out of range.");
        debug_assert!(!self.select1s.is_empty(), "Select1 queried before build.");

        let sample = i / 512;
        let mut lo = self.select1s[sample] as usize;
        let mut hi = if sample + 1 < self.select1s.len() {
            self.select1s[sample + 1] as usize + 1
        } else {
            self.ranks.len()
        };
        // Last block whose absolute rank does not exceed i; the sentinel
        // entry bounds the search from above.
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.ranks[mid].abs() <= i {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let block = lo;
        let entry = &self.ranks[block];
        let mut rest = i - entry.abs();

        let mut j = 3;
        while entry.rel(j) > rest {
            j -= 1;
        }
        rest -= entry.rel(j);

        block * 256 + j * 64 + select_bit(self.units[block * 4 + j], rest)
    }

    /// The position of the i-th (0-indexed) unset bit.
    pub fn select0(&self, i: usize) -> usize {
        debug_assert!(i < self.num_zeros(), "Select index out of range.");
        debug_assert!(!self.select0s.is_empty(), "Select0 queried before build.");

        let sample = i / 512;
        let mut lo = self.select0s[sample] as usize;
        let mut hi = if sample + 1 < self.select0s.len() {
            self.select0s[sample + 1] as usize + 1
        } else {
            self.ranks.len()
        };
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            let zeros = mid * 256 - self.ranks[mid].abs();
            if zeros <= i {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let block = lo;
        let entry = &self.ranks[block];
        let mut rest = i - (block * 256 - entry.abs());

        let mut j = 3;
        while entry.rel0(j) > rest {
            j -= 1;
        }
        rest -= entry.rel0(j);

        block * 256 + j * 64 + select_bit(!self.units[block * 4 + j], rest)
    }

    /// Serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.units.io_size()
            + 16
            + self.ranks.io_size()
            + self.select0s.io_size()
            + self.select1s.io_size()
    }

    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.units.write(writer)?;
        writer.write_u64(self.size as u64)?;
        writer.write_u64(self.num_ones as u64)?;
        self.ranks.write(writer)?;
        self.select0s.write(writer)?;
        self.select1s.write(writer)
    }

    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<BitVector> {
        let units = Vector::read(reader)?;
        let size = reader.read_u64()? as usize;
        let num_ones = reader.read_u64()? as usize;
        let ranks = Vector::read(reader)?;
        let select0s = Vector::read(reader)?;
        let select1s = Vector::read(reader)?;
        Self::validate(BitVector {
            units,
            size,
            num_ones,
            ranks,
            select0s,
            select1s,
        })
    }

    pub fn map(mapper: &mut Mapper) -> Result<BitVector> {
        let units = Vector::map(mapper)?;
        let size = mapper.read_u64()? as usize;
        let num_ones = mapper.read_u64()? as usize;
        let ranks = Vector::map(mapper)?;
        let select0s = Vector::map(mapper)?;
        let select1s = Vector::map(mapper)?;
        Self::validate(BitVector {
            units,
            size,
            num_ones,
            ranks,
            select0s,
            select1s,
        })
    }

    fn validate(bv: BitVector) -> Result<BitVector> {
        if bv.num_ones > bv.size {
            return Err(Error::InvalidFormat("more set bits than bits"));
        }
        if bv.units.len() != (bv.size + 63) / 64 {
            return Err(Error::InvalidFormat("bit vector unit count mismatch"));
        }
        if !bv.ranks.is_empty() && bv.ranks.len() != (bv.size + 255) / 256 + 1 {
            return Err(Error::InvalidFormat("rank index size mismatch"));
        }
        if !bv.select1s.is_empty() && bv.select1s.len() != (bv.num_ones + 511) / 512 {
            return Err(Error::InvalidFormat("select1 index size mismatch"));
        }
        let num_zeros = bv.size - bv.num_ones;
        if !bv.select0s.is_empty() && bv.select0s.len() != (num_zeros + 511) / 512 {
            return Err(Error::InvalidFormat("select0 index size mismatch"));
        }
        Ok(bv)
    }
}

#[cfg(test)]
mod test {
    use super::BitVector;

    /// Xorshift generator for randomized invariant tests; a fixed seed keeps
    /// the tests reproducible.
    struct Prng(u64);

    impl Prng {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }
    }

    fn build_from_bits(bits: &[bool], s0: bool, s1: bool) -> BitVector {
        let mut bv = BitVector::new();
        for &bit in bits {
            bv.push(bit);
        }
        bv.build(s0, s1);
        bv
    }

    #[test]
    fn rank_and_select_on_a_small_pattern() {
        // 1101 0001
        let bits = [true, true, false, true, false, false, false, true];
        let bv = build_from_bits(&bits, true, true);

        assert_eq!(bv.len(), 8);
        assert_eq!(bv.num_ones(), 4);
        assert_eq!(bv.rank1(0), 0);
        assert_eq!(bv.rank1(2), 2);
        assert_eq!(bv.rank1(8), 4);
        assert_eq!(bv.rank0(8), 4);
        assert_eq!(bv.select1(0), 0);
        assert_eq!(bv.select1(2), 3);
        assert_eq!(bv.select1(3), 7);
        assert_eq!(bv.select0(0), 2);
        assert_eq!(bv.select0(3), 6);
    }

    #[test]
    fn rank_plus_rank0_is_position() {
        let mut rng = Prng(0x9e3779b97f4a7c15);
        let bits: Vec<bool> = (0..3000).map(|_| rng.next() % 3 == 0).collect();
        let bv = build_from_bits(&bits, true, true);
        for i in 0..=bits.len() {
            assert_eq!(bv.rank1(i) + bv.rank0(i), i);
        }
    }

    #[test]
    fn select_inverts_rank() {
        let mut rng = Prng(1);
        // Sparse, dense, and mixed regions, spanning several rank blocks and
        // at least one select sample (more than 512 set bits).
        let bits: Vec<bool> = (0..4096)
            .map(|i| match i / 1024 {
                0 => rng.next() % 17 == 0,
                1 => rng.next() % 2 == 0,
                2 => true,
                _ => rng.next() % 5 != 0,
            })
            .collect();
        let bv = build_from_bits(&bits, true, true);

        let mut ones = 0;
        let mut zeros = 0;
        for (p, &bit) in bits.iter().enumerate() {
            if bit {
                assert_eq!(bv.select1(ones), p);
                assert_eq!(bv.select1(bv.rank1(p + 1) - 1), p);
                ones += 1;
            } else {
                assert_eq!(bv.select0(zeros), p);
                zeros += 1;
            }
        }
        assert_eq!(ones, bv.num_ones());
        assert_eq!(zeros, bv.num_zeros());
    }

    #[test]
    fn block_boundaries_are_exact() {
        // All ones up to exactly a unit boundary, then zeros to a block
        // boundary; sizes chosen to hit the `i % 64 == 0` paths.
        for &n in &[64usize, 128, 256, 320, 512] {
            let bits: Vec<bool> = (0..n).map(|i| i < 64).collect();
            let bv = build_from_bits(&bits, true, true);
            assert_eq!(bv.rank1(64), 64);
            assert_eq!(bv.rank1(n), 64);
            assert_eq!(bv.select1(63), 63);
            if n > 64 {
                assert_eq!(bv.select0(0), 64);
            }
        }
    }

    #[test]
    fn roundtrip_preserves_queries() {
        use crate::io::{Mapper, Reader, Writer};

        let mut rng = Prng(7);
        let bits: Vec<bool> = (0..1500).map(|_| rng.next() % 2 == 0).collect();
        let bv = build_from_bits(&bits, true, true);

        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        bv.write(&mut writer).unwrap();
        assert_eq!(buf.len(), bv.io_size());

        let mut reader = Reader::new(&buf[..]);
        let loaded = BitVector::read(&mut reader).unwrap();

        let leaked: &'static [u8] = Box::leak(buf.into_boxed_slice());
        let mut mapper = Mapper::from_static(leaked);
        let mapped = BitVector::map(&mut mapper).unwrap();

        for i in 0..=bits.len() {
            assert_eq!(loaded.rank1(i), bv.rank1(i));
            assert_eq!(mapped.rank1(i), bv.rank1(i));
        }
        for i in 0..bv.num_ones() {
            assert_eq!(loaded.select1(i), bv.select1(i));
            assert_eq!(mapped.select1(i), bv.select1(i));
        }
    }

    #[test]
    fn corrupt_counters_are_rejected() {
        use crate::io::{Reader, Writer};

        let bits = [true, false, true];
        let bv = build_from_bits(&bits, false, true);

        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        bv.write(&mut writer).unwrap();

        // The unit vector holds one u64 (offset 8); `size` sits right after
        // it (offset 16), `num_ones` after that. Claim more ones than bits.
        buf[24] = 200;
        let mut reader = Reader::new(&buf[..]);
        assert!(BitVector::read(&mut reader).is_err());
    }
}
