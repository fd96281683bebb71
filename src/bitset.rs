// SPDX-License-Identifier: Apache-2.0

//! Fixed-size packed bitset over 64-bit words. The composer treats one bit
//! per pixel slot across all output images concatenated, and works on the raw
//! words directly in its scoring loops.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBitset {
    words: Vec<u64>,
}

impl PackedBitset {
    pub fn new(bits: usize) -> Self {
        PackedBitset {
            words: vec![0; (bits + 63) / 64],
        }
    }

    pub fn get(&self, i: usize) -> bool {
        self.words[i >> 6] >> (i & 63) & 1 == 1
    }

    pub fn set(&mut self, i: usize, v: bool) {
        let bit = i & 63;
        self.words[i >> 6] &= !(1u64 << bit);
        self.words[i >> 6] |= (v as u64) << bit;
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Polynomial hash over the packed words.
    pub fn content_hash(&self) -> u64 {
        let mut r: u64 = 1;
        for &w in &self.words {
            r = r.wrapping_mul(137139).wrapping_add(w);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut b = PackedBitset::new(130);
        assert_eq!(b.words().len(), 3);
        b.set(0, true);
        b.set(64, true);
        b.set(129, true);
        assert!(b.get(0) && b.get(64) && b.get(129));
        assert!(!b.get(1) && !b.get(63) && !b.get(128));
        assert_eq!(b.count_ones(), 3);
        b.set(64, false);
        assert!(!b.get(64));
        assert_eq!(b.count_ones(), 2);
    }

    #[test]
    fn hash_tracks_content() {
        let mut a = PackedBitset::new(100);
        let mut b = PackedBitset::new(100);
        assert_eq!(a.content_hash(), b.content_hash());
        a.set(42, true);
        assert_ne!(a.content_hash(), b.content_hash());
        b.set(42, true);
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
