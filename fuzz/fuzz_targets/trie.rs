#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use marisa::{Agent, Config, Keyset, Trie};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    num_tries: u8,
    weight_order: bool,
    keys: Vec<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let mut keys = input.keys;
    keys.sort();
    keys.dedup();
    if keys.is_empty() {
        return;
    }

    let mut config = Config::new();
    config.num_tries = 1 + (input.num_tries % 16) as usize;
    if !input.weight_order {
        config.node_order = marisa::NodeOrder::Label;
    }

    let mut keyset = Keyset::new();
    for key in &keys {
        keyset.push(key);
    }
    let trie = Trie::build(&mut keyset, &config).expect("Deduplicated input must build.");

    // Every key must round-trip through lookup and reverse lookup.
    let mut agent = Agent::new();
    for i in 0..keyset.len() {
        agent.set_query(keyset.key(i));
        assert!(trie.lookup(&mut agent));
        assert_eq!(agent.key_id(), keyset.key_id(i));

        agent.set_query_id(keyset.key_id(i));
        trie.reverse_lookup(&mut agent).unwrap();
        assert_eq!(agent.key(), keyset.key(i));
    }

    // Serialization must be stable across a load cycle.
    let mut bytes = Vec::new();
    trie.write(&mut bytes).unwrap();
    let loaded = Trie::read(&mut &bytes[..]).unwrap();
    let mut again = Vec::new();
    loaded.write(&mut again).unwrap();
    assert_eq!(bytes, again);
});
