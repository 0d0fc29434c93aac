// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The per-query cursor.
//!
//! An agent carries one query and the state of at most one active search.
//! The query bytes are copied into the agent, and result keys point either
//! into that copy or into the agent's own output buffer, never anywhere
//! else, so a result can not dangle once the query changes.
//!
//! A built trie is immutable and may be shared between threads, but an agent
//! may not: every concurrent reader brings its own.

use std::collections::VecDeque;

/// Search cursor state. The prefix and predictive searches are resumable;
/// their variants carry the position to continue from.
pub(crate) enum State {
    /// No query set; every search panics.
    None,

    /// A query is set and no cursor search has started.
    Query,

    /// A key id is set for reverse lookup.
    Id,

    /// Common prefix search descent. `checked` means the terminal at `node`
    /// was already reported and the next call should step first.
    CommonPrefix {
        node: usize,
        query_pos: usize,
        checked: bool,
    },

    /// Predictive search, in the level-order phase. Each pending entry pairs
    /// a node with the key bytes accumulated from the root to that node.
    Predictive {
        queue: VecDeque<(usize, Vec<u8>)>,
    },

    /// A cursor search ran out of results.
    Done,
}

/// Where the bytes of the current result key live.
#[derive(Copy, Clone)]
enum KeySource {
    None,
    /// A prefix of the query of the given length.
    Query(usize),
    /// The agent's output buffer.
    Buf,
}

pub struct Agent {
    pub(crate) query: Vec<u8>,
    pub(crate) query_id: usize,
    pub(crate) key_buf: Vec<u8>,
    pub(crate) key_id: usize,
    pub(crate) state: State,
    key_source: KeySource,
}

impl Agent {
    pub fn new() -> Agent {
        Agent {
            query: Vec::new(),
            query_id: 0,
            key_buf: Vec::new(),
            key_id: 0,
            state: State::None,
            key_source: KeySource::None,
        }
    }

    /// Set the query bytes, resetting any search in progress.
    pub fn set_query(&mut self, query: &[u8]) {
        self.query.clear();
        self.query.extend_from_slice(query);
        self.key_buf.clear();
        self.key_id = 0;
        self.state = State::Query;
        self.key_source = KeySource::None;
    }

    /// Set the key id to reverse-look-up, resetting any search in progress.
    pub fn set_query_id(&mut self, id: usize) {
        self.query.clear();
        self.query_id = id;
        self.key_buf.clear();
        self.key_id = 0;
        self.state = State::Id;
        self.key_source = KeySource::None;
    }

    pub fn query(&self) -> &[u8] {
        &self.query
    }

    /// The bytes of the most recent result key.
    pub fn key(&self) -> &[u8] {
        match self.key_source {
            KeySource::None => &[],
            KeySource::Query(len) => &self.query[..len],
            KeySource::Buf => &self.key_buf,
        }
    }

    /// The id of the most recent result key.
    pub fn key_id(&self) -> usize {
        self.key_id
    }

    pub(crate) fn set_key_from_query(&mut self, len: usize, id: usize) {
        self.key_source = KeySource::Query(len);
        self.key_id = id;
    }

    pub(crate) fn set_key_from_buf(&mut self, id: usize) {
        self.key_source = KeySource::Buf;
        self.key_id = id;
    }

    pub(crate) fn expect_query(&self) -> &[u8] {
        match self.state {
            State::None | State::Id => panic!("Agent holds no query, call set_query first."),
            _ => &self.query,
        }
    }
}
