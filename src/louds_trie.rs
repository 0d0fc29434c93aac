// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! One level of the recursive trie.
//!
//! Nodes are numbered in level order. Node 0 is an artificial super-root
//! whose LOUDS block is `10`; node 1 is the real root. With `rank1(i)`
//! counting set bits in `[0, i)`, the navigation formulas are:
//!
//! * the block of node `n` starts at `select0(n - 1) + 1`;
//! * the edge at bit position `p` inside that block reaches child
//!   `p + 1 - n`;
//! * `parent(n) = select1(n - 1) - (n - 1)`.
//!
//! Each non-root node carries one label. A one-byte label lives directly in
//! `bases`. A longer label is stored out of line and the node stores a link
//! instead: the low byte in `bases`, the high bits in `extras`. The link
//! names a key of the next trie level down, or, at the deepest level, an
//! offset into the tail. Child levels store their keys with reversed
//! orientation, so walking a child trie from a terminal up to its root
//! produces label bytes in exactly the order the level above consumes them.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::agent::{Agent, State};
use crate::bit_vector::BitVector;
use crate::cache::{CacheEntry, NO_EXTRA};
use crate::config::{Config, NodeOrder, MAX_NUM_TRIES};
use crate::error::{Error, Result};
use crate::flat_vector::FlatVector;
use crate::io::{Mapper, Reader, Writer};
use crate::key::{Key, LevelKey, ReverseKey};
use crate::tail::Tail;
use crate::vector::Vector;

pub struct LoudsTrie {
    louds: BitVector,
    terminal_flags: BitVector,
    link_flags: BitVector,
    bases: Vector<u8>,
    extras: FlatVector,
    tail: Tail,
    next_trie: Option<Box<LoudsTrie>>,
    cache: Vector<CacheEntry>,
    cache_mask: usize,
    num_l1_nodes: usize,
    config: Config,
}

/// A slice of the sorted key array that still has to be processed, with the
/// number of key bytes consumed on the path to its node.
struct SearchRange {
    begin: usize,
    end: usize,
    key_pos: usize,
}

/// A sibling group: keys sharing the next byte, with their summed weight.
struct Group {
    begin: usize,
    end: usize,
    weight: f32,
}

impl LoudsTrie {
    /// Build the whole nested family from the top-level keys.
    ///
    /// Returns the trie and the id assigned to each key, in input order.
    pub(crate) fn build(keys: Vec<Key>, config: &Config) -> Result<(LoudsTrie, Vec<u32>)> {
        build_level(keys, config, 1)
    }

    pub fn num_keys(&self) -> usize {
        self.terminal_flags.num_ones()
    }

    /// Real nodes on this level (the super-root does not count).
    pub fn num_nodes(&self) -> usize {
        self.bases.len() - 1
    }

    pub fn num_tries(&self) -> usize {
        match &self.next_trie {
            Some(next) => 1 + next.num_tries(),
            None => 1,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn get_link(&self, node: usize) -> usize {
        self.get_link_with(node, self.link_flags.rank1(node))
    }

    fn get_link_with(&self, node: usize, link_id: usize) -> usize {
        ((self.extras.get(link_id) as usize) << 8) | self.bases[node] as usize
    }

    fn cache_slot(&self, node: usize, byte: u8) -> usize {
        (node ^ (node << 5) ^ byte as usize) & self.cache_mask
    }

    /// Match the out-of-line label named by `link` against the query.
    ///
    /// The position is advanced as far as the bytes match, so on failure the
    /// caller can tell whether the first byte already differed.
    fn match_link(&self, query: &[u8], pos: &mut usize, link: usize) -> bool {
        match &self.next_trie {
            Some(next) => {
                let node = next.terminal_flags.select1(link);
                next.match_upward(query, pos, node)
            }
            None => self.tail.matches(query, pos, link),
        }
    }

    /// Match this level's key that terminates at `node` by walking up to the
    /// root. Stored keys are reversed, so the walk reads forwards.
    fn match_upward(&self, query: &[u8], pos: &mut usize, mut node: usize) -> bool {
        loop {
            let entry = &self.cache[node & self.cache_mask];
            if node == entry.child() {
                if entry.has_link() {
                    if !self.match_link(query, pos, entry.link()) {
                        return false;
                    }
                } else {
                    if *pos == query.len() || query[*pos] != entry.base() {
                        return false;
                    }
                    *pos += 1;
                }
                node = entry.parent();
                if node == 1 {
                    return true;
                }
            } else {
                if self.link_flags.get(node) {
                    if !self.match_link(query, pos, self.get_link(node)) {
                        return false;
                    }
                } else {
                    if *pos == query.len() || query[*pos] != self.bases[node] {
                        return false;
                    }
                    *pos += 1;
                }
                if node <= self.num_l1_nodes + 1 {
                    return true;
                }
                node = self.louds.select1(node - 1) - (node - 1);
            }
        }
    }

    /// Append the out-of-line label named by `link` to `out`.
    fn restore_link(&self, out: &mut Vec<u8>, link: usize) {
        match &self.next_trie {
            Some(next) => {
                let node = next.terminal_flags.select1(link);
                next.restore_upward(out, node);
            }
            None => self.tail.restore(out, link),
        }
    }

    /// The emitting mirror of `match_upward`.
    fn restore_upward(&self, out: &mut Vec<u8>, mut node: usize) {
        loop {
            let entry = &self.cache[node & self.cache_mask];
            if node == entry.child() {
                if entry.has_link() {
                    self.restore_link(out, entry.link());
                } else {
                    out.push(entry.base());
                }
                node = entry.parent();
                if node == 1 {
                    return;
                }
            } else {
                if self.link_flags.get(node) {
                    self.restore_link(out, self.get_link(node));
                } else {
                    out.push(self.bases[node]);
                }
                if node <= self.num_l1_nodes + 1 {
                    return;
                }
                node = self.louds.select1(node - 1) - (node - 1);
            }
        }
    }

    /// Like `match_link`, but when the query ends inside the label, the rest
    /// of the label is appended to `out` and the match succeeds.
    fn prefix_match_link(
        &self,
        query: &[u8],
        pos: &mut usize,
        out: &mut Vec<u8>,
        link: usize,
    ) -> bool {
        match &self.next_trie {
            Some(next) => {
                let node = next.terminal_flags.select1(link);
                next.prefix_match_upward(query, pos, out, node)
            }
            None => self.tail.prefix_matches(query, pos, out, link),
        }
    }

    fn prefix_match_upward(
        &self,
        query: &[u8],
        pos: &mut usize,
        out: &mut Vec<u8>,
        mut node: usize,
    ) -> bool {
        loop {
            if *pos == query.len() {
                self.restore_upward(out, node);
                return true;
            }
            let entry = &self.cache[node & self.cache_mask];
            if node == entry.child() {
                if entry.has_link() {
                    if !self.prefix_match_link(query, pos, out, entry.link()) {
                        return false;
                    }
                } else if query[*pos] != entry.base() {
                    return false;
                } else {
                    *pos += 1;
                }
                node = entry.parent();
                if node == 1 {
                    return true;
                }
            } else {
                if self.link_flags.get(node) {
                    if !self.prefix_match_link(query, pos, out, self.get_link(node)) {
                        return false;
                    }
                } else if query[*pos] != self.bases[node] {
                    return false;
                } else {
                    *pos += 1;
                }
                if node <= self.num_l1_nodes + 1 {
                    return true;
                }
                node = self.louds.select1(node - 1) - (node - 1);
            }
        }
    }

    /// Take the edge whose label starts with the byte at `*pos`.
    ///
    /// On success the node and position move past the edge. Sibling first
    /// bytes are distinct, so once a label match consumed at least one byte
    /// and failed, no other sibling can match either.
    fn find_child(&self, query: &[u8], pos: &mut usize, node: &mut usize) -> bool {
        debug_assert!(*pos < query.len(), "No query byte left to match.");
        let byte = query[*pos];

        let entry = &self.cache[self.cache_slot(*node, byte)];
        if *node == entry.parent() {
            if entry.has_link() {
                // The slot pins the first label byte, so on failure nothing
                // else can match this byte either.
                if self.match_link(query, pos, entry.link()) {
                    *node = entry.child();
                    return true;
                }
                return false;
            }
            debug_assert_eq!(entry.base(), byte, "Cache slot pins the label byte.");
            *pos += 1;
            *node = entry.child();
            return true;
        }

        let mut louds_pos = self.louds.select0(*node - 1) + 1;
        let mut child = louds_pos + 1 - *node;
        let mut link_id = usize::MAX;
        while self.louds.get(louds_pos) {
            if self.link_flags.get(child) {
                link_id = if link_id == usize::MAX {
                    self.link_flags.rank1(child)
                } else {
                    link_id + 1
                };
                let prev_pos = *pos;
                if self.match_link(query, pos, self.get_link_with(child, link_id)) {
                    *node = child;
                    return true;
                } else if *pos != prev_pos {
                    return false;
                }
            } else if self.bases[child] == byte {
                *pos += 1;
                *node = child;
                return true;
            }
            louds_pos += 1;
            child += 1;
        }
        false
    }

    /// `find_child` for the predictive descent: a label that the query ends
    /// inside of still counts, and its remainder is appended to `out`.
    fn prefix_find_child(
        &self,
        query: &[u8],
        pos: &mut usize,
        node: &mut usize,
        out: &mut Vec<u8>,
    ) -> bool {
        debug_assert!(*pos < query.len(), "No query byte left to match.");
        let byte = query[*pos];

        let entry = &self.cache[self.cache_slot(*node, byte)];
        if *node == entry.parent() {
            if entry.has_link() {
                if self.prefix_match_link(query, pos, out, entry.link()) {
                    *node = entry.child();
                    return true;
                }
                return false;
            }
            debug_assert_eq!(entry.base(), byte, "Cache slot pins the label byte.");
            *pos += 1;
            *node = entry.child();
            return true;
        }

        let mut louds_pos = self.louds.select0(*node - 1) + 1;
        let mut child = louds_pos + 1 - *node;
        let mut link_id = usize::MAX;
        while self.louds.get(louds_pos) {
            if self.link_flags.get(child) {
                link_id = if link_id == usize::MAX {
                    self.link_flags.rank1(child)
                } else {
                    link_id + 1
                };
                let prev_pos = *pos;
                if self.prefix_match_link(query, pos, out, self.get_link_with(child, link_id)) {
                    *node = child;
                    return true;
                } else if *pos != prev_pos {
                    return false;
                }
            } else if self.bases[child] == byte {
                *pos += 1;
                *node = child;
                return true;
            }
            louds_pos += 1;
            child += 1;
        }
        false
    }

    /// Exact lookup of `query`, returning its key id.
    pub fn lookup_bytes(&self, query: &[u8]) -> Option<usize> {
        let mut node = 1;
        let mut pos = 0;
        while pos < query.len() {
            if !self.find_child(query, &mut pos, &mut node) {
                return None;
            }
        }
        if self.terminal_flags.get(node) {
            Some(self.terminal_flags.rank1(node))
        } else {
            None
        }
    }

    /// Reconstruct the key with the given id into `out`.
    pub fn reverse_lookup_into(&self, id: usize, out: &mut Vec<u8>) -> Result<()> {
        if id >= self.num_keys() {
            return Err(Error::OutOfRange(id));
        }
        out.clear();
        let mut node = self.terminal_flags.select1(id);
        // The walk runs from the terminal to the root, so the buffer fills
        // back to front; multi-byte segments get flipped in place and the
        // whole buffer once at the end.
        while node != 1 {
            if self.link_flags.get(node) {
                let segment_start = out.len();
                self.restore_link(out, self.get_link(node));
                out[segment_start..].reverse();
            } else {
                out.push(self.bases[node]);
            }
            node = self.louds.select1(node - 1) - (node - 1);
        }
        out.reverse();
        Ok(())
    }

    /// Yield the next stored key that is a prefix of the agent's query.
    pub fn next_common_prefix(&self, agent: &mut Agent) -> bool {
        let (mut node, mut pos, mut checked) = match agent.state {
            State::Query => (1, 0, false),
            State::CommonPrefix {
                node,
                query_pos,
                checked,
            } => (node, query_pos, checked),
            State::Done => return false,
            _ => panic!("Agent is not set up for common prefix search."),
        };
        loop {
            if !checked && self.terminal_flags.get(node) {
                let id = self.terminal_flags.rank1(node);
                agent.state = State::CommonPrefix {
                    node,
                    query_pos: pos,
                    checked: true,
                };
                agent.set_key_from_query(pos, id);
                return true;
            }
            checked = false;
            if pos == agent.query.len() {
                agent.state = State::Done;
                return false;
            }
            if !self.find_child(&agent.query, &mut pos, &mut node) {
                agent.state = State::Done;
                return false;
            }
        }
    }

    /// Yield the next stored key that the agent's query is a prefix of.
    ///
    /// After the descent, the remaining subtree is walked in level order
    /// with a queue of (node, key bytes) pairs, which emits terminals in
    /// ascending key id order.
    pub fn next_predictive(&self, agent: &mut Agent) -> bool {
        let mut queue = match std::mem::replace(&mut agent.state, State::Done) {
            State::Query => {
                let mut node = 1;
                let mut pos = 0;
                let mut fill = Vec::new();
                while pos < agent.query.len() {
                    if !self.prefix_find_child(&agent.query, &mut pos, &mut node, &mut fill) {
                        return false;
                    }
                }
                let mut key = agent.query.clone();
                key.extend_from_slice(&fill);
                let mut queue = VecDeque::new();
                queue.push_back((node, key));
                queue
            }
            State::Predictive { queue } => queue,
            State::Done => return false,
            _ => panic!("Agent is not set up for predictive search."),
        };

        while let Some((node, key)) = queue.pop_front() {
            self.enqueue_children(&mut queue, node, &key);
            if self.terminal_flags.get(node) {
                let id = self.terminal_flags.rank1(node);
                agent.key_buf = key;
                agent.set_key_from_buf(id);
                agent.state = State::Predictive { queue };
                return true;
            }
        }
        false
    }

    fn enqueue_children(&self, queue: &mut VecDeque<(usize, Vec<u8>)>, node: usize, key: &[u8]) {
        let mut louds_pos = self.louds.select0(node - 1) + 1;
        let mut child = louds_pos + 1 - node;
        while self.louds.get(louds_pos) {
            let mut child_key = key.to_vec();
            if self.link_flags.get(child) {
                self.restore_link(&mut child_key, self.get_link(child));
            } else {
                child_key.push(self.bases[child]);
            }
            queue.push_back((child, child_key));
            louds_pos += 1;
            child += 1;
        }
    }

    /// Serialized size of this level and everything below it.
    pub fn io_size(&self) -> usize {
        self.louds.io_size()
            + self.terminal_flags.io_size()
            + self.link_flags.io_size()
            + self.bases.io_size()
            + self.extras.io_size()
            + self.tail.io_size()
            + self.next_trie.as_ref().map_or(0, |next| next.io_size())
            + self.cache.io_size()
            + 8
    }

    pub fn write_level<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.louds.write(writer)?;
        self.terminal_flags.write(writer)?;
        self.link_flags.write(writer)?;
        self.bases.write(writer)?;
        self.extras.write(writer)?;
        self.tail.write(writer)?;
        if let Some(next) = &self.next_trie {
            next.write_level(writer)?;
        }
        self.cache.write(writer)?;
        writer.write_u32(self.num_l1_nodes as u32)?;
        writer.write_u32(self.config.flags())
    }

    pub fn read_level<R: std::io::Read>(reader: &mut Reader<R>, depth: usize) -> Result<LoudsTrie> {
        if depth > MAX_NUM_TRIES {
            return Err(Error::InvalidFormat("trie nesting too deep"));
        }
        let louds = BitVector::read(reader)?;
        let terminal_flags = BitVector::read(reader)?;
        let link_flags = BitVector::read(reader)?;
        let bases = Vector::read(reader)?;
        let extras = FlatVector::read(reader)?;
        let tail = Tail::read(reader)?;
        let next_trie = if link_flags.num_ones() > 0 && tail.is_empty() {
            Some(Box::new(LoudsTrie::read_level(reader, depth + 1)?))
        } else {
            None
        };
        let cache = Vector::read(reader)?;
        let num_l1_nodes = reader.read_u32()? as usize;
        let config = Config::from_flags(reader.read_u32()?)?;
        Self::validate_level(LoudsTrie {
            louds,
            terminal_flags,
            link_flags,
            bases,
            extras,
            tail,
            next_trie,
            cache,
            cache_mask: 0,
            num_l1_nodes,
            config,
        })
    }

    pub fn map_level(mapper: &mut Mapper, depth: usize) -> Result<LoudsTrie> {
        if depth > MAX_NUM_TRIES {
            return Err(Error::InvalidFormat("trie nesting too deep"));
        }
        let louds = BitVector::map(mapper)?;
        let terminal_flags = BitVector::map(mapper)?;
        let link_flags = BitVector::map(mapper)?;
        let bases = Vector::map(mapper)?;
        let extras = FlatVector::map(mapper)?;
        let tail = Tail::map(mapper)?;
        let next_trie = if link_flags.num_ones() > 0 && tail.is_empty() {
            Some(Box::new(LoudsTrie::map_level(mapper, depth + 1)?))
        } else {
            None
        };
        let cache = Vector::map(mapper)?;
        let num_l1_nodes = mapper.read_u32()? as usize;
        let config = Config::from_flags(mapper.read_u32()?)?;
        Self::validate_level(LoudsTrie {
            louds,
            terminal_flags,
            link_flags,
            bases,
            extras,
            tail,
            next_trie,
            cache,
            cache_mask: 0,
            num_l1_nodes,
            config,
        })
    }

    fn validate_level(mut trie: LoudsTrie) -> Result<LoudsTrie> {
        let num_nodes = trie.bases.len();
        if num_nodes < 2 {
            return Err(Error::InvalidFormat("trie level has no nodes"));
        }
        if trie.louds.len() != 2 * num_nodes - 1 {
            return Err(Error::InvalidFormat("louds length mismatch"));
        }
        if trie.terminal_flags.len() != num_nodes || trie.link_flags.len() != num_nodes {
            return Err(Error::InvalidFormat("node flag length mismatch"));
        }
        if trie.extras.len() != trie.link_flags.num_ones() {
            return Err(Error::InvalidFormat("extras length mismatch"));
        }
        if trie.terminal_flags.num_ones() == 0 {
            return Err(Error::InvalidFormat("trie level has no terminals"));
        }
        if trie.num_l1_nodes >= num_nodes {
            return Err(Error::InvalidFormat("level one node count out of range"));
        }
        if trie.cache.is_empty() || !trie.cache.len().is_power_of_two() {
            return Err(Error::InvalidFormat("cache size is not a power of two"));
        }
        if !trie.louds.is_built()
            || !trie.louds.has_select0()
            || !trie.louds.has_select1()
            || !trie.terminal_flags.is_built()
            || !trie.terminal_flags.has_select1()
            || !trie.link_flags.is_built()
        {
            return Err(Error::InvalidFormat("missing rank or select index"));
        }
        trie.cache_mask = trie.cache.len() - 1;
        Ok(trie)
    }

    /// Add this level's sizes to a breakdown, recursively.
    pub fn collect_size(&self, size: &mut crate::trie::TrieSize) {
        size.louds_bytes += self.louds.io_size();
        size.terminal_bytes += self.terminal_flags.io_size();
        size.link_bytes += self.link_flags.io_size() + self.bases.io_size() + self.extras.io_size();
        size.tail_bytes += self.tail.io_size();
        size.cache_bytes += self.cache.io_size();
        size.num_levels += 1;
        size.num_nodes += self.num_nodes();
        if let Some(next) = &self.next_trie {
            next.collect_size(size);
        }
    }
}

/// Build one trie level from its keys; recurse for multi-byte labels.
///
/// Returns the level and the key id assigned to each input key, in input
/// order. Duplicate keys are an error at the top level; deeper levels hit
/// duplicates whenever two nodes share a label, and map them to one key id.
fn build_level<'a, T: LevelKey<'a>>(
    mut keys: Vec<T>,
    config: &Config,
    depth: usize,
) -> Result<(LoudsTrie, Vec<u32>)> {
    for (i, key) in keys.iter_mut().enumerate() {
        key.set_id(i);
    }
    keys.sort_by(|a, b| a.cmp_logical(b));

    let mut cache_size = if depth == 1 { 256 } else { 1 };
    while cache_size < keys.len() / config.cache_level.divisor() {
        cache_size *= 2;
    }
    let cache_mask = cache_size - 1;
    let mut cache = vec![CacheEntry::invalid(); cache_size];
    let mut cache_weights = vec![f32::NEG_INFINITY; cache_size];

    let mut louds = BitVector::new();
    let mut terminal_flags = BitVector::new();
    let mut link_flags = BitVector::new();
    let mut bases: Vec<u8> = Vec::new();
    let mut next_keys: Vec<T> = Vec::new();
    let mut link_nodes: Vec<usize> = Vec::new();
    let mut num_l1_nodes = 0;

    // The super-root block `10`, plus label entries for the super-root and
    // the root; neither has an incoming edge byte.
    louds.push(true);
    louds.push(false);
    bases.push(0);
    link_flags.push(false);
    bases.push(0);
    link_flags.push(false);

    let mut queue = VecDeque::new();
    queue.push_back(SearchRange {
        begin: 0,
        end: keys.len(),
        key_pos: 0,
    });
    // Ranges are dequeued in node order; the first one is the root.
    let mut node_id = 0;
    while let Some(mut range) = queue.pop_front() {
        node_id += 1;

        while range.begin < range.end && keys[range.begin].len() == range.key_pos {
            keys[range.begin].set_terminal(node_id);
            range.begin += 1;
        }
        if range.begin == range.end {
            louds.push(false);
            continue;
        }

        let mut groups = Vec::new();
        let mut begin = range.begin;
        let mut weight = keys[begin].weight();
        for i in range.begin + 1..range.end {
            if keys[i - 1].at(range.key_pos) != keys[i].at(range.key_pos) {
                groups.push(Group {
                    begin,
                    end: i,
                    weight,
                });
                begin = i;
                weight = 0.0;
            }
            weight += keys[i].weight();
        }
        groups.push(Group {
            begin,
            end: range.end,
            weight,
        });
        if let NodeOrder::Weight = config.node_order {
            // Stable, so equal weights keep the label order.
            groups.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
        }
        if node_id == 1 {
            num_l1_nodes = groups.len();
        }

        for group in &groups {
            // Extend the group's shared prefix as far as it goes; the keys
            // are sorted, so the first one is the shortest.
            let mut key_pos = range.key_pos + 1;
            'extend: while key_pos < keys[group.begin].len() {
                for i in group.begin + 1..group.end {
                    if keys[i - 1].at(key_pos) != keys[i].at(key_pos) {
                        break 'extend;
                    }
                }
                key_pos += 1;
            }

            let child_id = bases.len();
            let first_byte = keys[group.begin].at(range.key_pos);

            let slot = if depth == 1 {
                (node_id ^ (node_id << 5) ^ first_byte as usize) & cache_mask
            } else {
                child_id & cache_mask
            };
            if group.weight > cache_weights[slot] {
                cache[slot] = CacheEntry::new(node_id as u32, child_id as u32);
                cache_weights[slot] = group.weight;
            }

            if key_pos == range.key_pos + 1 {
                bases.push(first_byte);
                link_flags.push(false);
            } else {
                bases.push(0);
                link_flags.push(true);
                link_nodes.push(child_id);
                next_keys.push(
                    keys[group.begin]
                        .substring(range.key_pos, key_pos - range.key_pos)
                        .with_weight(group.weight),
                );
            }
            louds.push(true);
            queue.push_back(SearchRange {
                begin: group.begin,
                end: group.end,
                key_pos,
            });
        }
        louds.push(false);
    }

    louds.build(true, true);
    let num_nodes = bases.len();

    let mut tail = Tail::new();
    let mut next_trie = None;
    let mut link_values: Vec<u32> = Vec::new();
    if !next_keys.is_empty() {
        if depth == config.num_tries {
            let entries: Vec<&[u8]> = next_keys.iter().map(|k| k.underlying()).collect();
            let (built, offsets) = Tail::build(&entries, config.tail_mode);
            tail = built;
            link_values = offsets;
        } else {
            let reverse_keys: Vec<ReverseKey> =
                next_keys.iter().map(|k| k.into_next_level()).collect();
            let (child, ids) = build_level(reverse_keys, config, depth + 1)?;
            next_trie = Some(Box::new(child));
            link_values = ids;
        }
    }

    let mut extra_values = Vec::with_capacity(link_values.len());
    for (i, &value) in link_values.iter().enumerate() {
        bases[link_nodes[i]] = (value & 0xff) as u8;
        extra_values.push(value >> 8);
    }
    let extras = FlatVector::build(&extra_values);
    link_flags.build(false, true);

    let mut pairs: Vec<(u32, u32)> = keys
        .iter()
        .map(|k| (k.terminal() as u32, k.id() as u32))
        .collect();
    pairs.sort();
    if depth == 1 {
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(Error::InvalidInput("duplicate key in keyset"));
            }
        }
    }
    let mut node = 0;
    for &(terminal, _) in &pairs {
        let terminal = terminal as usize;
        while node < terminal {
            terminal_flags.push(false);
            node += 1;
        }
        if node == terminal {
            terminal_flags.push(true);
            node += 1;
        }
    }
    while node < num_nodes {
        terminal_flags.push(false);
        node += 1;
    }
    terminal_flags.build(false, true);

    let mut ids = vec![0u32; keys.len()];
    for &(terminal, input_id) in &pairs {
        ids[input_id as usize] = terminal_flags.rank1(terminal as usize) as u32;
    }

    let mut trie = LoudsTrie {
        louds,
        terminal_flags,
        link_flags,
        bases: Vector::from_vec(bases),
        extras,
        tail,
        next_trie,
        cache: Vector::new(),
        cache_mask,
        num_l1_nodes,
        config: *config,
    };

    // Second cache pass: now that links are known, pin each cached edge's
    // label byte or link parts. A link whose high part does not fit the
    // 16-bit field cannot be cached.
    for entry in cache.iter_mut() {
        let child = entry.child();
        if child >= num_nodes {
            continue;
        }
        if trie.link_flags.get(child) {
            let link = trie.get_link(child);
            if link >> 8 >= NO_EXTRA as usize {
                entry.invalidate();
            } else {
                entry.set_base((link & 0xff) as u8);
                entry.set_extra((link >> 8) as u16);
            }
        } else {
            entry.set_base(trie.bases[child]);
        }
    }
    trie.cache = Vector::from_vec(cache);

    Ok((trie, ids))
}
