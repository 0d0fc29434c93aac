// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Aggregates the input keys for a build.
//!
//! Key bytes are concatenated into a single pool with one span record per
//! key, rather than one allocation per key. After a build, the keyset holds
//! the id that the dictionary assigned to each key, in push order.

#[derive(Copy, Clone)]
struct KeySpan {
    offset: u32,
    len: u32,
    weight: f32,
    id: u32,
}

pub struct Keyset {
    pool: Vec<u8>,
    spans: Vec<KeySpan>,
}

impl Keyset {
    pub fn new() -> Keyset {
        Keyset {
            pool: Vec::new(),
            spans: Vec::new(),
        }
    }

    /// Add a key with the default weight of 1.0.
    pub fn push(&mut self, key: &[u8]) {
        self.push_weighted(key, 1.0);
    }

    pub fn push_weighted(&mut self, key: &[u8], weight: f32) {
        let offset = self.pool.len();
        self.pool.extend_from_slice(key);
        assert!(
            self.pool.len() <= u32::MAX as usize,
            "Can't hold more than 4 GiB of key bytes.",
        );
        self.spans.push(KeySpan {
            offset: offset as u32,
            len: key.len() as u32,
            weight,
            id: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The bytes of the i-th pushed key.
    pub fn key(&self, i: usize) -> &[u8] {
        let span = self.spans[i];
        &self.pool[span.offset as usize..(span.offset + span.len) as usize]
    }

    pub fn weight(&self, i: usize) -> f32 {
        self.spans[i].weight
    }

    /// The id the last build assigned to the i-th pushed key.
    pub fn key_id(&self, i: usize) -> usize {
        self.spans[i].id as usize
    }

    pub(crate) fn set_key_id(&mut self, i: usize, id: usize) {
        self.spans[i].id = id as u32;
    }

    /// Total size of the key bytes, for progress reporting.
    pub fn total_key_bytes(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod test {
    use super::Keyset;

    #[test]
    fn keys_are_stored_in_push_order() {
        let mut keyset = Keyset::new();
        keyset.push(b"one");
        keyset.push_weighted(b"two", 2.5);
        keyset.push(b"");

        assert_eq!(keyset.len(), 3);
        assert_eq!(keyset.key(0), b"one");
        assert_eq!(keyset.key(1), b"two");
        assert_eq!(keyset.key(2), b"");
        assert_eq!(keyset.weight(0), 1.0);
        assert_eq!(keyset.weight(1), 2.5);
        assert_eq!(keyset.total_key_bytes(), 6);
    }
}
