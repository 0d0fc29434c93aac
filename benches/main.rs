#[macro_use]
extern crate criterion;

extern crate marisa;

use criterion::{black_box, Bencher, Criterion};
use marisa::{Agent, Config, Keyset, Trie};

/// A deterministic word list of a few thousand keys with realistic sharing:
/// syllable combinations plus some common suffixes.
fn make_words() -> Vec<Vec<u8>> {
    let heads = [
        "an", "ba", "co", "de", "el", "fi", "ga", "ho", "in", "ju", "ka", "lo", "ma", "ne", "or",
        "pa",
    ];
    let mids = [
        "ba", "ce", "di", "fo", "gu", "la", "me", "ni", "po", "ra", "se", "ti", "vo", "wa", "xe",
        "zo",
    ];
    let tails = ["", "tion", "ness", "ing", "er", "ly", "ment", "s"];

    let mut words = Vec::new();
    for head in &heads {
        for mid in &mids {
            for tail in &tails {
                words.push(format!("{}{}{}", head, mid, tail).into_bytes());
            }
        }
    }
    words.sort();
    words.dedup();
    words
}

fn build_trie() -> (Trie, Vec<Vec<u8>>) {
    let words = make_words();
    let mut keyset = Keyset::new();
    for word in &words {
        keyset.push(word);
    }
    let trie = Trie::build(&mut keyset, &Config::new()).expect("Failed to build trie.");
    (trie, words)
}

fn bench_lookup(b: &mut Bencher) {
    let (trie, words) = build_trie();
    let mut agent = Agent::new();
    let mut word = words.iter().cycle();
    b.iter(|| {
        agent.set_query(word.next().unwrap());
        let found = trie.lookup(&mut agent);
        black_box(found);
        black_box(agent.key_id());
    });
}

fn bench_reverse_lookup(b: &mut Bencher) {
    let (trie, _words) = build_trie();
    let mut agent = Agent::new();
    let mut id = (0..trie.num_keys()).cycle();
    b.iter(|| {
        agent.set_query_id(id.next().unwrap());
        trie.reverse_lookup(&mut agent).unwrap();
        black_box(agent.key().len());
    });
}

fn bench_predictive_search(b: &mut Bencher) {
    let (trie, _words) = build_trie();
    let mut agent = Agent::new();
    b.iter(|| {
        agent.set_query(b"ma");
        let mut n = 0;
        while trie.predictive_search(&mut agent) {
            n += 1;
        }
        black_box(n);
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lookup", bench_lookup);
    c.bench_function("reverse_lookup", bench_reverse_lookup);
    c.bench_function("predictive_search", bench_predictive_search);
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        // Do not use p = 0.05, we are not doing social studies here. I want to
        // actually be sure, and not be wrong 1 in 20 times, because I will run
        // the benchmark more than 20 times for sure.
        .significance_level(0.001)
        .confidence_level(0.99);
    targets = criterion_benchmark
}

criterion_main!(benches);
