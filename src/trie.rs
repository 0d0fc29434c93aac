// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The dictionary facade.
//!
//! A `Trie` owns the top level of the nested trie family and dispatches the
//! four search operations through an `Agent`. It also owns the IO entry
//! points; `load` and `read` copy the dictionary into memory, `mmap` backs
//! it by a memory map, and `map` borrows a caller-provided buffer. All
//! backends answer every query identically.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::agent::{Agent, State};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::{Mapper, Mapping, Reader, Writer};
use crate::key::Key;
use crate::keyset::Keyset;
use crate::louds_trie::LoudsTrie;

pub struct Trie {
    root: LoudsTrie,
}

impl Trie {
    /// Build a dictionary from the keyset.
    ///
    /// On success the keyset holds the id assigned to each key. The keyset
    /// must be non-empty and free of duplicate keys; the empty key is
    /// allowed.
    pub fn build(keyset: &mut Keyset, config: &Config) -> Result<Trie> {
        config.validate()?;
        if keyset.is_empty() {
            return Err(Error::InvalidInput("empty keyset"));
        }
        let (root, ids) = {
            let keys: Vec<Key> = (0..keyset.len())
                .map(|i| Key::new(keyset.key(i), keyset.weight(i)))
                .collect();
            LoudsTrie::build(keys, config)?
        };
        for (i, &id) in ids.iter().enumerate() {
            keyset.set_key_id(i, id as usize);
        }
        Ok(Trie { root })
    }

    /// Exact-match lookup of the agent's query.
    pub fn lookup(&self, agent: &mut Agent) -> bool {
        match self.root.lookup_bytes(agent.expect_query()) {
            Some(id) => {
                let len = agent.query().len();
                agent.set_key_from_query(len, id);
                true
            }
            None => false,
        }
    }

    /// Reconstruct the key for the agent's query id.
    pub fn reverse_lookup(&self, agent: &mut Agent) -> Result<()> {
        let id = match agent.state {
            State::Id => agent.query_id,
            _ => panic!("Agent holds no key id, call set_query_id first."),
        };
        let mut buf = std::mem::take(&mut agent.key_buf);
        let result = self.root.reverse_lookup_into(id, &mut buf);
        agent.key_buf = buf;
        result?;
        agent.set_key_from_buf(id);
        Ok(())
    }

    /// Yield the next stored key that is a prefix of the query.
    ///
    /// Call repeatedly; every call returns one result until it returns
    /// false. Results come in ascending prefix length order.
    pub fn common_prefix_search(&self, agent: &mut Agent) -> bool {
        let _ = agent.expect_query();
        self.root.next_common_prefix(agent)
    }

    /// Yield the next stored key that the query is a prefix of.
    ///
    /// Call repeatedly; results come in ascending key id order.
    pub fn predictive_search(&self, agent: &mut Agent) -> bool {
        let _ = agent.expect_query();
        self.root.next_predictive(agent)
    }

    pub fn num_keys(&self) -> usize {
        self.root.num_keys()
    }

    pub fn num_tries(&self) -> usize {
        self.root.num_tries()
    }

    pub fn num_nodes(&self) -> usize {
        self.size().num_nodes
    }

    pub fn config(&self) -> &Config {
        self.root.config()
    }

    /// Serialized size in bytes, header included.
    pub fn io_size(&self) -> usize {
        16 + self.root.io_size()
    }

    /// Per-component size breakdown over all levels.
    pub fn size(&self) -> TrieSize {
        let mut size = TrieSize::new();
        self.root.collect_size(&mut size);
        size.io_bytes = self.io_size();
        size
    }

    pub fn write<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let mut writer = Writer::new(writer);
        writer.write_header()?;
        self.root.write_level(&mut writer)
    }

    pub fn read<R: io::Read>(reader: &mut R) -> Result<Trie> {
        let mut reader = Reader::new(reader);
        reader.check_header()?;
        let root = LoudsTrie::read_level(&mut reader, 1)?;
        Ok(Trie { root })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path).map_err(Error::IoError)?;
        let mut writer = io::BufWriter::new(file);
        self.write(&mut writer)?;
        io::Write::flush(&mut writer)?;
        Ok(())
    }

    /// Load by copying the file into memory.
    pub fn load(path: &Path) -> Result<Trie> {
        let file = fs::File::open(path).map_err(Error::IoError)?;
        let mut reader = io::BufReader::new(file);
        Trie::read(&mut reader)
    }

    /// Load zero-copy from a memory map of the file.
    pub fn mmap(path: &Path) -> Result<Trie> {
        let mapping = Arc::new(Mapping::open(path)?);
        let mut mapper = Mapper::from_mapping(mapping);
        mapper.check_header()?;
        let root = LoudsTrie::map_level(&mut mapper, 1)?;
        Ok(Trie { root })
    }

    /// Load zero-copy from a caller-provided buffer.
    pub fn map(bytes: &'static [u8]) -> Result<Trie> {
        let mut mapper = Mapper::from_static(bytes);
        mapper.check_header()?;
        let root = LoudsTrie::map_level(&mut mapper, 1)?;
        Ok(Trie { root })
    }
}

/// Size breakdown of a dictionary, reported by the build command.
pub struct TrieSize {
    pub louds_bytes: usize,
    pub terminal_bytes: usize,
    pub link_bytes: usize,
    pub tail_bytes: usize,
    pub cache_bytes: usize,
    pub io_bytes: usize,
    pub num_levels: usize,
    pub num_nodes: usize,
}

impl TrieSize {
    fn new() -> TrieSize {
        TrieSize {
            louds_bytes: 0,
            terminal_bytes: 0,
            link_bytes: 0,
            tail_bytes: 0,
            cache_bytes: 0,
            io_bytes: 0,
            num_levels: 0,
            num_nodes: 0,
        }
    }
}

impl fmt::Display for TrieSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} bytes total, {} levels, {} nodes",
            self.io_bytes, self.num_levels, self.num_nodes,
        )?;
        writeln!(f, "  louds     = {:8} bytes", self.louds_bytes)?;
        writeln!(f, "  terminals = {:8} bytes", self.terminal_bytes)?;
        writeln!(f, "  links     = {:8} bytes", self.link_bytes)?;
        writeln!(f, "  tail      = {:8} bytes", self.tail_bytes)?;
        write!(f, "  cache     = {:8} bytes", self.cache_bytes)
    }
}

#[cfg(test)]
mod test {
    use super::Trie;
    use crate::agent::Agent;
    use crate::config::{Config, NodeOrder, TailMode};
    use crate::error::Error;
    use crate::keyset::Keyset;

    const WORDS: [&[u8]; 15] = [
        b"a",
        b"app",
        b"apple",
        b"application",
        b"apply",
        b"banana",
        b"band",
        b"bank",
        b"can",
        b"cat",
        b"dog",
        b"door",
        b"test",
        b"testing",
        b"trie",
    ];

    fn build_trie(words: &[&[u8]], config: &Config) -> (Trie, Keyset) {
        let mut keyset = Keyset::new();
        for word in words {
            keyset.push(word);
        }
        let trie = Trie::build(&mut keyset, config).unwrap();
        (trie, keyset)
    }

    fn lookup_id(trie: &Trie, key: &[u8]) -> Option<usize> {
        let mut agent = Agent::new();
        agent.set_query(key);
        if trie.lookup(&mut agent) {
            Some(agent.key_id())
        } else {
            None
        }
    }

    /// Every configuration the tests sweep over: one to three levels, both
    /// tail modes, both sibling orders.
    fn configs() -> Vec<Config> {
        let mut configs = Vec::new();
        for &num_tries in &[1usize, 2, 3] {
            for &tail_mode in &[TailMode::Text, TailMode::Binary] {
                for &node_order in &[NodeOrder::Label, NodeOrder::Weight] {
                    let mut config = Config::new();
                    config.num_tries = num_tries;
                    config.tail_mode = tail_mode;
                    config.node_order = node_order;
                    configs.push(config);
                }
            }
        }
        configs
    }

    #[test]
    fn lookup_finds_exact_keys_only() {
        let (trie, _) = build_trie(&[b"a", b"app"], &Config::new());
        assert_eq!(trie.num_keys(), 2);
        let id = lookup_id(&trie, b"app").unwrap();
        assert!(id < 2);
        assert_eq!(lookup_id(&trie, b"ap"), None);
        assert_eq!(lookup_id(&trie, b"appl"), None);
        assert_eq!(lookup_id(&trie, b""), None);
    }

    #[test]
    fn all_keys_get_distinct_ids() {
        let seven: Vec<&[u8]> = WORDS[..7].to_vec();
        for config in configs() {
            let (trie, keyset) = build_trie(&seven, &config);
            assert_eq!(trie.num_keys(), 7);
            let mut seen = [false; 7];
            for i in 0..keyset.len() {
                let id = lookup_id(&trie, keyset.key(i)).expect("Stored key must be found.");
                assert_eq!(id, keyset.key_id(i));
                assert!(!seen[id], "Ids must be distinct.");
                seen[id] = true;
            }
        }
    }

    #[test]
    fn reverse_lookup_inverts_lookup() {
        for config in configs() {
            let (trie, _) = build_trie(&WORDS, &config);
            let mut agent = Agent::new();
            for id in 0..trie.num_keys() {
                agent.set_query_id(id);
                trie.reverse_lookup(&mut agent).unwrap();
                let key = agent.key().to_vec();
                assert_eq!(lookup_id(&trie, &key), Some(id));
            }
        }
    }

    #[test]
    fn reverse_lookup_rejects_out_of_range_ids() {
        let (trie, _) = build_trie(&WORDS, &Config::new());
        let mut agent = Agent::new();
        agent.set_query_id(15);
        match trie.reverse_lookup(&mut agent) {
            Err(Error::OutOfRange(15)) => (),
            other => panic!("Expected OutOfRange, got {:?}.", other),
        }
    }

    #[test]
    fn common_prefix_search_yields_prefixes_in_length_order() {
        for config in configs() {
            let (trie, _) = build_trie(&WORDS[..7], &config);
            let mut agent = Agent::new();
            agent.set_query(b"applications");

            let mut results = Vec::new();
            while trie.common_prefix_search(&mut agent) {
                results.push(agent.key().to_vec());
            }
            let expected: Vec<&[u8]> = vec![b"a", b"app", b"application"];
            assert_eq!(results, expected);

            // The agent is exhausted now.
            assert!(!trie.common_prefix_search(&mut agent));
        }
    }

    #[test]
    fn predictive_search_yields_completions_in_id_order() {
        for config in configs() {
            let (trie, _) = build_trie(&WORDS[..7], &config);
            let mut agent = Agent::new();
            agent.set_query(b"app");

            let mut keys = Vec::new();
            let mut ids = Vec::new();
            while trie.predictive_search(&mut agent) {
                keys.push(agent.key().to_vec());
                ids.push(agent.key_id());
            }

            let mut sorted_keys = keys.clone();
            sorted_keys.sort();
            let expected: Vec<&[u8]> = vec![b"app", b"apple", b"application", b"apply"];
            assert_eq!(sorted_keys, expected);
            for pair in ids.windows(2) {
                assert!(pair[0] < pair[1], "Ids must come in ascending order.");
            }
        }
    }

    #[test]
    fn predictive_search_with_empty_query_enumerates_everything() {
        let (trie, _) = build_trie(&WORDS, &Config::new());
        let mut agent = Agent::new();
        agent.set_query(b"");

        let mut count = 0;
        let mut previous_id = None;
        while trie.predictive_search(&mut agent) {
            assert_eq!(lookup_id(&trie, agent.key()), Some(agent.key_id()));
            if let Some(prev) = previous_id {
                assert!(prev < agent.key_id());
            }
            previous_id = Some(agent.key_id());
            count += 1;
        }
        assert_eq!(count, 15);
    }

    #[test]
    fn empty_key_is_a_valid_key() {
        let (trie, keyset) = build_trie(&[b"", b"a"], &Config::new());
        assert_eq!(trie.num_keys(), 2);
        assert_eq!(lookup_id(&trie, b""), Some(keyset.key_id(0)));

        // The empty key is a prefix of everything.
        let mut agent = Agent::new();
        agent.set_query(b"zzz");
        assert!(trie.common_prefix_search(&mut agent));
        assert_eq!(agent.key(), b"");
    }

    #[test]
    fn keys_with_nul_bytes_work_in_binary_mode() {
        let keys: Vec<&[u8]> = vec![b"a\x00b", b"a\x00c", b"a\x00", b"\x00\x00plain"];
        for config in configs() {
            let (trie, keyset) = build_trie(&keys, &config);
            for i in 0..keyset.len() {
                assert_eq!(lookup_id(&trie, keyset.key(i)), Some(keyset.key_id(i)));
            }
            let mut agent = Agent::new();
            for id in 0..trie.num_keys() {
                agent.set_query_id(id);
                trie.reverse_lookup(&mut agent).unwrap();
                assert_eq!(lookup_id(&trie, agent.key()), Some(id));
            }
        }
    }

    #[test]
    fn empty_keyset_is_rejected() {
        let mut keyset = Keyset::new();
        assert!(Trie::build(&mut keyset, &Config::new()).is_err());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut keyset = Keyset::new();
        keyset.push(b"same");
        keyset.push(b"other");
        keyset.push(b"same");
        assert!(Trie::build(&mut keyset, &Config::new()).is_err());
    }

    #[test]
    fn serialization_roundtrips_and_is_stable() {
        for config in configs() {
            let (trie, keyset) = build_trie(&WORDS, &config);

            let mut bytes = Vec::new();
            trie.write(&mut bytes).unwrap();
            assert_eq!(bytes.len(), trie.io_size());
            assert_eq!(&bytes[..16], b"We love Marisa.\n");

            let loaded = Trie::read(&mut &bytes[..]).unwrap();
            for i in 0..keyset.len() {
                assert_eq!(
                    lookup_id(&loaded, keyset.key(i)),
                    Some(keyset.key_id(i)),
                    "Loaded trie must answer like the built one.",
                );
            }

            // Save, load, save again: byte-identical.
            let mut again = Vec::new();
            loaded.write(&mut again).unwrap();
            assert_eq!(bytes, again);
        }
    }

    #[test]
    fn all_readers_are_equivalent() {
        let (trie, keyset) = build_trie(&WORDS, &Config::new());
        let mut bytes = Vec::new();
        trie.write(&mut bytes).unwrap();

        let copied = Trie::read(&mut &bytes[..]).unwrap();
        let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        let mapped = Trie::map(leaked).unwrap();

        for i in 0..keyset.len() {
            let expected = Some(keyset.key_id(i));
            assert_eq!(lookup_id(&copied, keyset.key(i)), expected);
            assert_eq!(lookup_id(&mapped, keyset.key(i)), expected);
        }

        // The resumable searches agree as well.
        let mut agent_a = Agent::new();
        let mut agent_b = Agent::new();
        agent_a.set_query(b"testing");
        agent_b.set_query(b"testing");
        loop {
            let more_a = copied.common_prefix_search(&mut agent_a);
            let more_b = mapped.common_prefix_search(&mut agent_b);
            assert_eq!(more_a, more_b);
            if !more_a {
                break;
            }
            assert_eq!(agent_a.key(), agent_b.key());
            assert_eq!(agent_a.key_id(), agent_b.key_id());
        }
    }

    #[test]
    fn build_is_independent_of_input_order_with_label_order() {
        let mut config = Config::new();
        config.node_order = NodeOrder::Label;

        let (trie_a, _) = build_trie(&WORDS, &config);
        let mut shuffled = WORDS.to_vec();
        shuffled.rotate_left(7);
        shuffled.swap(0, 5);
        let (trie_b, _) = build_trie(&shuffled, &config);

        let mut bytes_a = Vec::new();
        let mut bytes_b = Vec::new();
        trie_a.write(&mut bytes_a).unwrap();
        trie_b.write(&mut bytes_b).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn save_load_and_mmap_from_a_real_file() {
        let path = std::env::temp_dir().join(format!("marisa-test-{}.dic", std::process::id()));
        let (trie, keyset) = build_trie(&WORDS, &Config::new());
        trie.save(&path).unwrap();

        let loaded = Trie::load(&path).unwrap();
        let mapped = Trie::mmap(&path).unwrap();
        for i in 0..keyset.len() {
            let expected = Some(keyset.key_id(i));
            assert_eq!(lookup_id(&loaded, keyset.key(i)), expected);
            assert_eq!(lookup_id(&mapped, keyset.key(i)), expected);
        }
        assert_eq!(loaded.num_keys(), 15);
        assert_eq!(mapped.num_tries(), loaded.num_tries());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncated_files_are_rejected() {
        let (trie, _) = build_trie(&WORDS, &Config::new());
        let mut bytes = Vec::new();
        trie.write(&mut bytes).unwrap();

        for &keep in &[0usize, 8, 16, 40, bytes.len() - 4] {
            let cut = bytes[..keep].to_vec();
            assert!(
                Trie::read(&mut &cut[..]).is_err(),
                "A file cut to {} bytes must not load.",
                keep,
            );
            let leaked: &'static [u8] = Box::leak(cut.into_boxed_slice());
            assert!(Trie::map(leaked).is_err());
        }
    }

    #[test]
    fn weights_bias_the_cache_not_the_results() {
        let mut keyset = Keyset::new();
        for (i, word) in WORDS.iter().enumerate() {
            keyset.push_weighted(word, (i as f32) * 10.0 + 1.0);
        }
        let trie = Trie::build(&mut keyset, &Config::new()).unwrap();
        for i in 0..keyset.len() {
            assert_eq!(lookup_id(&trie, keyset.key(i)), Some(keyset.key_id(i)));
        }
    }

    #[test]
    fn num_tries_is_capped_by_actual_levels() {
        // Three keys with long shared chunks; even with num_tries = 16 the
        // family only materializes levels that hold keys.
        let keys: Vec<&[u8]> = vec![b"internationalization", b"internationalize", b"internal"];
        let mut config = Config::new();
        config.num_tries = 16;
        let (trie, keyset) = build_trie(&keys, &config);
        assert!(trie.num_tries() <= 16);
        for i in 0..keyset.len() {
            assert_eq!(lookup_id(&trie, keyset.key(i)), Some(keyset.key_id(i)));
        }
    }
}
