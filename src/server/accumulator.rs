// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use std::collections::hash_map::{self, HashMap};

/// Form values collected from the text sections of a request.
///
/// A key may be sent more than once. Every value is kept, and `get()` returns the
/// one appended last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormValueAccumulator {
    values: HashMap<String, Vec<String>>,
    value_count: usize,
}

impl FormValueAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key`.
    pub fn append<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.entry(key.into()).or_insert_with(Vec::new).push(value.into());
        self.value_count += 1;
    }

    /// The most recent value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|vals| vals.last()).map(String::as_str)
    }

    /// Every value for `key`, in the order they were read.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Total number of values appended, over all keys.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn key_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    /// Iterate over keys and their values.
    pub fn iter(&self) -> hash_map::Iter<String, Vec<String>> {
        self.values.iter()
    }

    /// Collapse into one value per key, keeping the last one.
    pub fn into_last_values(self) -> HashMap<String, String> {
        self.values
            .into_iter()
            .filter_map(|(key, mut vals)| vals.pop().map(|val| (key, val)))
            .collect()
    }
}
