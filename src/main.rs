// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

use std::env;
use std::io;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use marisa::{Agent, CacheLevel, Config, Error, Keyset, NodeOrder, Result, TailMode, Trie};

fn print_usage() {
    println!("usage:");
    println!("  marisa build [-n num_tries] [-t text|binary] [-l|-w] [-c cache_level] [-o out_file]");
    println!("  marisa lookup <dict>");
    println!("  marisa reverse-lookup <dict>");
    println!("  marisa common-prefix-search <dict>");
    println!("  marisa predictive-search <dict>");
    println!("  marisa dump <dict>");
    println!();
    println!("build reads keys from stdin, one per line, an optional weight after");
    println!("a trailing tab. The other commands read queries from stdin.");
}

/// Read one byte line from stdin, without the newline. Returns false at EOF.
fn read_line<R: BufRead>(input: &mut R, line: &mut Vec<u8>) -> Result<bool> {
    line.clear();
    if input.read_until(b'\n', line)? == 0 {
        return Ok(false);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(true)
}

/// The value of a `-x value` flag pair, or an error if it is missing.
fn flag_value(args: &[String], i: usize) -> Result<&str> {
    match args.get(i + 1) {
        Some(value) => Ok(value.as_str()),
        None => Err(Error::InvalidInput("flag is missing its value")),
    }
}

/// Split a `key<TAB>weight` line; a line without a parsable weight is all key.
fn split_weight(line: &[u8]) -> (&[u8], f32) {
    if let Some(tab) = line.iter().rposition(|&b| b == b'\t') {
        if let Ok(text) = std::str::from_utf8(&line[tab + 1..]) {
            if let Ok(weight) = text.parse::<f32>() {
                return (&line[..tab], weight);
            }
        }
    }
    (line, 1.0)
}

fn cmd_build(args: &[String]) -> Result<()> {
    let mut config = Config::new();
    let mut out_path = PathBuf::from("dict.marisa");

    let mut i = 0;
    while i < args.len() {
        match &args[i][..] {
            "-n" => {
                config.num_tries = flag_value(args, i)?
                    .parse()
                    .map_err(|_| Error::InvalidInput("num_tries must be an integer"))?;
                i += 1;
            }
            "-t" => {
                config.tail_mode = match flag_value(args, i)? {
                    "text" => TailMode::Text,
                    "binary" => TailMode::Binary,
                    _ => return Err(Error::InvalidInput("tail mode must be text or binary")),
                };
                i += 1;
            }
            "-l" => config.node_order = NodeOrder::Label,
            "-w" => config.node_order = NodeOrder::Weight,
            "-c" => {
                config.cache_level = match flag_value(args, i)? {
                    "huge" => CacheLevel::Huge,
                    "large" => CacheLevel::Large,
                    "normal" => CacheLevel::Normal,
                    "small" => CacheLevel::Small,
                    "tiny" => CacheLevel::Tiny,
                    _ => return Err(Error::InvalidInput("unknown cache level")),
                };
                i += 1;
            }
            "-o" => {
                out_path = PathBuf::from(flag_value(args, i)?);
                i += 1;
            }
            _ => return Err(Error::InvalidInput("unknown build flag")),
        }
        i += 1;
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut keyset = Keyset::new();
    let mut line = Vec::new();
    let mut count: u64 = 0;
    while read_line(&mut input, &mut line)? {
        let (key, weight) = split_weight(&line);
        keyset.push_weighted(key, weight);
        count += 1;
        // Reading millions of keys from a pipe can take a while, show
        // periodic progress.
        if count % 65536 == 0 {
            eprint!("\r{} keys read", count);
        }
    }
    if count >= 65536 {
        eprintln!("\r{} keys read", count);
    }

    let trie = Trie::build(&mut keyset, &config)?;
    trie.save(&out_path)?;

    eprintln!(
        "Wrote {} keys to {} ({}).",
        trie.num_keys(),
        out_path.display(),
        config,
    );
    eprintln!("{}", trie.size());
    Ok(())
}

fn cmd_lookup(dict: &Path) -> Result<()> {
    let trie = Trie::mmap(dict)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut agent = Agent::new();
    let mut line = Vec::new();
    while read_line(&mut input, &mut line)? {
        agent.set_query(&line);
        if trie.lookup(&mut agent) {
            write!(out, "{}\t", agent.key_id())?;
        } else {
            write!(out, "-1\t")?;
        }
        out.write_all(&line)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn cmd_reverse_lookup(dict: &Path) -> Result<()> {
    let trie = Trie::mmap(dict)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut agent = Agent::new();
    let mut line = Vec::new();
    while read_line(&mut input, &mut line)? {
        let id = std::str::from_utf8(&line)
            .ok()
            .and_then(|text| text.trim().parse::<usize>().ok())
            .ok_or(Error::InvalidInput("key id must be an integer"))?;
        agent.set_query_id(id);
        trie.reverse_lookup(&mut agent)?;
        write!(out, "{}\t", id)?;
        out.write_all(agent.key())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Shared driver for the two enumerating searches: print the match count,
/// then one `id <TAB> key <TAB> query` line per match.
fn cmd_enumerate(dict: &Path, predictive: bool) -> Result<()> {
    let trie = Trie::mmap(dict)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut agent = Agent::new();
    let mut line = Vec::new();
    let mut results: Vec<(usize, Vec<u8>)> = Vec::new();
    while read_line(&mut input, &mut line)? {
        agent.set_query(&line);
        results.clear();
        loop {
            let more = if predictive {
                trie.predictive_search(&mut agent)
            } else {
                trie.common_prefix_search(&mut agent)
            };
            if !more {
                break;
            }
            results.push((agent.key_id(), agent.key().to_vec()));
        }
        writeln!(out, "{}", results.len())?;
        for (id, key) in &results {
            write!(out, "{}\t", id)?;
            out.write_all(key)?;
            out.write_all(b"\t")?;
            out.write_all(&line)?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn cmd_dump(dict: &Path) -> Result<()> {
    let trie = Trie::mmap(dict)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut agent = Agent::new();
    for id in 0..trie.num_keys() {
        agent.set_query_id(id);
        trie.reverse_lookup(&mut agent)?;
        out.write_all(agent.key())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// The dictionary path argument of the query commands.
fn dict_arg(args: &[String]) -> &Path {
    match args.get(2) {
        Some(arg) => Path::new(arg),
        None => {
            print_usage();
            process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match &args[1][..] {
        "build" => cmd_build(&args[2..]),
        "lookup" => cmd_lookup(dict_arg(&args)),
        "reverse-lookup" => cmd_reverse_lookup(dict_arg(&args)),
        "common-prefix-search" => cmd_enumerate(dict_arg(&args), false),
        "predictive-search" => cmd_enumerate(dict_arg(&args), true),
        "dump" => cmd_dump(dict_arg(&args)),
        _ => {
            print_usage();
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
