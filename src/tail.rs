// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The shared-suffix store for labels at the deepest trie level.
//!
//! Suffixes are sorted so that strings with common endings become adjacent
//! (compare from the last byte backwards), then emitted longest-first; a
//! suffix that is the ending of an already emitted one is not materialized,
//! it points into the longer one. Text mode terminates suffixes with a NUL
//! byte; binary mode marks last bytes in a parallel bit vector and is forced
//! whenever a suffix contains a NUL itself.

use crate::bit_vector::BitVector;
use crate::config::TailMode;
use crate::error::{Error, Result};
use crate::io::{Mapper, Reader, Writer};
use crate::vector::Vector;

pub struct Tail {
    buf: Vector<u8>,
    end_flags: BitVector,
}

impl Tail {
    pub fn new() -> Tail {
        Tail {
            buf: Vector::new(),
            end_flags: BitVector::new(),
        }
    }

    /// Build the store from label byte windows.
    ///
    /// Returns the tail plus the offset assigned to each input label, in
    /// input order. Labels must be non-empty.
    pub fn build(entries: &[&[u8]], mode: TailMode) -> (Tail, Vec<u32>) {
        let mode = if entries.iter().any(|e| e.contains(&0)) {
            TailMode::Binary
        } else {
            mode
        };

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| entries[a].iter().rev().cmp(entries[b].iter().rev()));

        let mut buf: Vec<u8> = Vec::new();
        let mut end_flags = BitVector::new();
        let mut offsets = vec![0u32; entries.len()];

        // Walk in descending order so that of a shared ending, the longest
        // string is emitted first and the shorter ones point into it.
        let mut last: &[u8] = &[];
        let mut last_offset = 0usize;
        for &index in order.iter().rev() {
            let current = entries[index];
            debug_assert!(!current.is_empty(), "Tail labels are never empty.");

            let mut shared = 0;
            while shared < current.len()
                && shared < last.len()
                && current[current.len() - 1 - shared] == last[last.len() - 1 - shared]
            {
                shared += 1;
            }

            if shared == current.len() && !last.is_empty() {
                offsets[index] = (last_offset + (last.len() - current.len())) as u32;
            } else {
                last_offset = buf.len();
                offsets[index] = buf.len() as u32;
                buf.extend_from_slice(current);
                match mode {
                    TailMode::Text => buf.push(0),
                    TailMode::Binary => {
                        for _ in 1..current.len() {
                            end_flags.push(false);
                        }
                        end_flags.push(true);
                    }
                }
                assert!(
                    buf.len() <= u32::MAX as usize,
                    "Can't hold more than 4 GiB of suffix bytes.",
                );
                last = current;
            }
        }

        if let TailMode::Binary = mode {
            end_flags.build(false, false);
        }

        let tail = Tail {
            buf: Vector::from_vec(buf),
            end_flags,
        };
        (tail, offsets)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn is_binary(&self) -> bool {
        !self.end_flags.is_empty()
    }

    /// Whether the label at `offset` ends at position `pos` of the buffer.
    #[inline]
    fn ends_at(&self, pos: usize) -> bool {
        if self.is_binary() {
            self.end_flags.get(pos)
        } else {
            pos + 1 >= self.buf.len() || self.buf[pos + 1] == 0
        }
    }

    /// Match the label at `offset` against `query` starting at `*pos`.
    ///
    /// On success the position is advanced past the label. On a mismatch the
    /// position stays where matching stopped, so the caller can tell a
    /// first-byte mismatch from a partial one.
    pub fn matches(&self, query: &[u8], pos: &mut usize, offset: usize) -> bool {
        let mut at = offset;
        loop {
            if *pos == query.len() || query[*pos] != self.buf[at] {
                return false;
            }
            *pos += 1;
            if self.ends_at(at) {
                return true;
            }
            at += 1;
        }
    }

    /// Like `matches`, but when the query ends inside the label, the rest of
    /// the label is appended to `out` and the match counts as a success.
    pub fn prefix_matches(
        &self,
        query: &[u8],
        pos: &mut usize,
        out: &mut Vec<u8>,
        offset: usize,
    ) -> bool {
        let mut at = offset;
        loop {
            if *pos == query.len() {
                loop {
                    out.push(self.buf[at]);
                    if self.ends_at(at) {
                        return true;
                    }
                    at += 1;
                }
            }
            if query[*pos] != self.buf[at] {
                return false;
            }
            *pos += 1;
            if self.ends_at(at) {
                return true;
            }
            at += 1;
        }
    }

    /// Append the label at `offset` to `out`.
    pub fn restore(&self, out: &mut Vec<u8>, offset: usize) {
        let mut at = offset;
        loop {
            out.push(self.buf[at]);
            if self.ends_at(at) {
                return;
            }
            at += 1;
        }
    }

    pub fn io_size(&self) -> usize {
        self.buf.io_size() + self.end_flags.io_size()
    }

    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.buf.write(writer)?;
        self.end_flags.write(writer)
    }

    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Tail> {
        let buf = Vector::read(reader)?;
        let end_flags = BitVector::read(reader)?;
        Self::validate(Tail { buf, end_flags })
    }

    pub fn map(mapper: &mut Mapper) -> Result<Tail> {
        let buf = Vector::map(mapper)?;
        let end_flags = BitVector::map(mapper)?;
        Self::validate(Tail { buf, end_flags })
    }

    fn validate(tail: Tail) -> Result<Tail> {
        if !tail.end_flags.is_empty() && tail.end_flags.len() != tail.buf.len() {
            return Err(Error::InvalidFormat("tail end flags length mismatch"));
        }
        Ok(tail)
    }
}
