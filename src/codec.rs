// SPDX-License-Identifier: Apache-2.0

//! Per-image Huffman packing into a shared bit arena.
//!
//! Each image gets its own canonical code over the (at most 10) pixel values
//! it actually uses, stored as a flat array of tagged tree nodes. The coded
//! pixel stream for many images is packed back-to-back, bit-addressed, into
//! one append-only [`BitArena`] scoped to a single solve attempt.

use std::collections::BinaryHeap;

use bitvec::order::Lsb0;
use bitvec::vec::BitVec;

use crate::image::{Image, COLORS};

/// Append-only growable bit buffer shared by every compacted image of one
/// derivation graph. Never shrinks; discard the whole arena to release.
pub struct BitArena {
    bits: BitVec<u64, Lsb0>,
}

impl BitArena {
    pub fn new() -> Self {
        BitArena {
            bits: BitVec::new(),
        }
    }

    /// Current write cursor, in bits.
    pub fn len_bits(&self) -> u64 {
        self.bits.len() as u64
    }

    /// Appends the low `len` bits of `code`, least significant bit first.
    fn push_code(&mut self, code: u32, len: u8) {
        for k in 0..len {
            self.bits.push(code >> k & 1 == 1);
        }
    }

    fn get(&self, i: u64) -> bool {
        self.bits[i as usize]
    }
}

impl Default for BitArena {
    fn default() -> Self {
        Self::new()
    }
}

/// One slot of a code-tree node: either a terminal pixel value or the index
/// of another node in the flat tree array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Sym(u8),
    Node(u8),
}

/// Internal code-tree node; `branch[bit]` is followed when `bit` is read.
#[derive(Debug, Clone, Copy)]
struct CodeNode {
    branch: [Slot; 2],
}

/// A Huffman-packed image: offset/size (each fits `i8`), the flat code tree,
/// and the bit range its pixel stream occupies in the shared arena.
pub struct CompactImage {
    x: i8,
    y: i8,
    w: i8,
    h: i8,
    tree: Vec<CodeNode>,
    start: u64,
    bits: u64,
}

impl CompactImage {
    /// Packs `img` at the arena's current cursor.
    ///
    /// Offset and size components must fit a signed byte and mask values must
    /// be in `[0, COLORS)`; both are contract violations otherwise.
    pub fn encode(img: &Image, arena: &mut BitArena) -> CompactImage {
        for c in [img.x, img.y, img.w, img.h] {
            assert!(
                (-128..128).contains(&c),
                "image component {c} does not fit i8"
            );
        }

        let mut freq = [0i64; COLORS as usize];
        for &c in &img.mask {
            assert!(c < COLORS, "pixel value {c} out of range");
            freq[c as usize] += 1;
        }

        // Max-heap keyed on (-freq, tie): least frequent pops first, and among
        // equal frequencies the lowest symbol. Internal nodes carry a positive
        // tie so they outrank leaves of the same frequency.
        let mut heap: BinaryHeap<(i64, i64, Slot)> = BinaryHeap::new();
        for d in 0..COLORS {
            if freq[d as usize] > 0 {
                heap.push((-freq[d as usize], -(d as i64), Slot::Sym(d)));
            }
        }
        // Dummy leaves guarantee a valid two-leaf tree for constant images.
        while heap.len() < 2 {
            heap.push((0, 0, Slot::Sym(0)));
        }

        let mut tree: Vec<CodeNode> = Vec::new();
        while heap.len() > 1 {
            let (fa, _, a) = heap.pop().expect("heap has >= 2 entries");
            let (fb, _, b) = heap.pop().expect("heap has >= 2 entries");
            let idx = tree.len();
            tree.push(CodeNode { branch: [a, b] });
            heap.push((fa + fb, 10 + idx as i64, Slot::Node(idx as u8)));
        }
        assert!(tree.len() <= 9, "more internal nodes than symbols allow");

        // Root-to-leaf paths become the per-symbol codes, LSB-first.
        let root = tree.len() - 1;
        let mut code = [0u32; COLORS as usize];
        let mut code_len = [0u8; COLORS as usize];
        let mut stack = vec![(root, 0u32, 0u8)];
        while let Some((p, path, len)) = stack.pop() {
            for bit in 0..2u32 {
                let new_path = path | bit << len;
                match tree[p].branch[bit as usize] {
                    Slot::Sym(s) => {
                        code[s as usize] = new_path;
                        code_len[s as usize] = len + 1;
                    }
                    Slot::Node(c) => stack.push((c as usize, new_path, len + 1)),
                }
            }
        }

        let start = arena.len_bits();
        for &c in &img.mask {
            arena.push_code(code[c as usize], code_len[c as usize]);
        }

        CompactImage {
            x: img.x as i8,
            y: img.y as i8,
            w: img.w as i8,
            h: img.h as i8,
            tree,
            start,
            bits: arena.len_bits() - start,
        }
    }

    /// Replays the coded bit stream through the tree to rebuild the image.
    ///
    /// A stream that does not decode to exactly `w*h` symbols, or that ends
    /// mid-code, indicates arena corruption and is fatal.
    pub fn decode(&self, arena: &BitArena) -> Image {
        let w = self.w as i32;
        let h = self.h as i32;
        let mut mask = Vec::with_capacity((w * h) as usize);
        let root = self.tree.len() - 1;
        let mut p = root;
        for i in self.start..self.start + self.bits {
            let bit = arena.get(i) as usize;
            match self.tree[p].branch[bit] {
                Slot::Sym(s) => {
                    mask.push(s);
                    p = root;
                }
                Slot::Node(c) => p = c as usize,
            }
        }
        assert_eq!(
            mask.len(),
            (w * h) as usize,
            "bit stream does not decode to w*h pixels"
        );
        assert_eq!(p, root, "bit stream ended mid-code");
        Image {
            x: self.x as i32,
            y: self.y as i32,
            w,
            h,
            mask,
        }
    }

    /// Bits this image occupies in the arena.
    pub fn len_bits(&self) -> u64 {
        self.bits
    }
}
