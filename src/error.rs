// Marisa -- A static dictionary based on recursively nested LOUDS tries
// Copyright 2026 Ruud van Asseldonk

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

use std::fmt;
use std::io;
use std::result;

#[derive(Debug)]
pub enum Error {
    /// The input to `build` is unusable (empty keyset, duplicate key,
    /// out-of-range configuration). The message says which.
    InvalidInput(&'static str),

    /// A dictionary file or buffer is not a valid serialized trie.
    InvalidFormat(&'static str),

    /// IO error while reading, writing, or mapping a dictionary.
    IoError(io::Error),

    /// A key id outside `[0, num_keys)` was passed to reverse lookup.
    OutOfRange(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::InvalidFormat(msg) => write!(f, "Invalid dictionary: {}", msg),
            Error::IoError(err) => write!(f, "IO error: {}", err),
            Error::OutOfRange(id) => write!(f, "Key id {} is out of range.", id),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        // A short read means the file does not hold the data its counters
        // promised, which is a format problem, not an IO problem.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::InvalidFormat("unexpected end of data")
        } else {
            Error::IoError(err)
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
