// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! A static dictionary that stores a set of byte strings in little space.
//!
//! Keys go into a succinct trie whose multi-byte labels are themselves keys
//! of a nested trie, down to a configurable depth; the deepest labels land
//! in a shared-suffix store. Once built, the dictionary is immutable. It
//! answers four queries, all in time proportional to the key length:
//!
//! * `lookup`: does this key exist, and what is its id?
//! * `reverse_lookup`: which key has this id?
//! * `common_prefix_search`: which stored keys are prefixes of this string?
//! * `predictive_search`: which stored keys start with this string?
//!
//! A dictionary serializes to a stable byte format, and loads either by
//! copying, from a memory map, or from a caller-provided buffer.

pub mod agent;
pub mod bit_vector;
pub mod bits;
pub mod cache;
pub mod config;
pub mod error;
pub mod flat_vector;
pub mod io;
pub mod keyset;
pub mod louds_trie;
pub mod tail;
pub mod trie;
pub mod vector;

mod key;

pub use crate::agent::Agent;
pub use crate::config::{CacheLevel, Config, NodeOrder, TailMode};
pub use crate::error::{Error, Result};
pub use crate::keyset::Keyset;
pub use crate::trie::Trie;
