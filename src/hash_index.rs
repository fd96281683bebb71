// SPDX-License-Identifier: Apache-2.0

//! Memory-tight map from 64-bit keys to small integer values, used to
//! deduplicate joint search states during piece construction.
//!
//! Entries live in one dense record list chained through a power-of-two bucket
//! table of head indices. Keys are write-once: re-inserting an existing key
//! returns the originally stored value and leaves the map unchanged.

struct Entry {
    key: u64,
    value: i32,
    next: i32,
}

const SPARSE_FACTOR: usize = 2;
const RESIZE_STEP: usize = 2;
const MIN_SIZE: usize = 1 << 12;

pub struct HashIndex {
    data: Vec<Entry>,
    table: Vec<i32>,
    mask: u64,
}

impl HashIndex {
    pub fn new() -> Self {
        HashIndex {
            data: Vec::new(),
            table: Vec::new(),
            mask: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inserts `key -> value` if the key is new, returning `(value, true)`.
    /// If the key is already present, returns `(stored_value, false)`.
    pub fn insert(&mut self, key: u64, value: i32) -> (i32, bool) {
        if self.table.len() <= self.data.len() * SPARSE_FACTOR {
            let new_len = (self.table.len() * RESIZE_STEP).max(MIN_SIZE);
            assert!(new_len.is_power_of_two());
            self.mask = new_len as u64 - 1;
            // Rebuild every chain from scratch; amortizes to O(1) per insert.
            self.table.clear();
            self.table.resize(new_len, -1);
            for i in 0..self.data.len() {
                let bucket = (self.data[i].key & self.mask) as usize;
                self.data[i].next = self.table[bucket];
                self.table[bucket] = i as i32;
            }
        }

        let bucket = (key & self.mask) as usize;
        let head = self.table[bucket];
        let mut previ = head;
        loop {
            if previ == -1 {
                self.data.push(Entry {
                    key,
                    value,
                    next: head,
                });
                self.table[bucket] = self.data.len() as i32 - 1;
                return (value, true);
            }
            let entry = &self.data[previ as usize];
            if entry.key == key {
                return (entry.value, false);
            }
            previ = entry.next;
        }
    }
}

impl Default for HashIndex {
    fn default() -> Self {
        Self::new()
    }
}
