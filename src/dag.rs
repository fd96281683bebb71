// SPDX-License-Identifier: Apache-2.0

//! Storage for one example's derivation graph, as consumed by the piece
//! builder: per node an image (Huffman-compacted into the graph's shared bit
//! arena), an accumulated transformation cost ("depth"), a finished-piece
//! flag, and outgoing transitions keyed by function id.
//!
//! Graph construction itself (enumerating transformation functions) happens
//! upstream; this module only stores the result.

use crate::child_table::ChildTable;
use crate::codec::{BitArena, CompactImage};
use crate::image::Image;

pub struct DerivationNode {
    compact: CompactImage,
    pub depth: u16,
    pub is_piece: bool,
    pub children: ChildTable,
}

pub struct DerivationGraph {
    nodes: Vec<DerivationNode>,
    arena: BitArena,
    /// Number of leading nodes that are search roots.
    pub givens: usize,
}

impl DerivationGraph {
    pub fn new(givens: usize) -> Self {
        DerivationGraph {
            nodes: Vec::new(),
            arena: BitArena::new(),
            givens,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Appends a node, compacting its image into the shared arena, and
    /// returns its index.
    pub fn add_node(&mut self, img: &Image, depth: u16, is_piece: bool) -> u32 {
        let compact = CompactImage::encode(img, &mut self.arena);
        self.nodes.push(DerivationNode {
            compact,
            depth,
            is_piece,
            children: ChildTable::new(),
        });
        self.nodes.len() as u32 - 1
    }

    pub fn add_edge(&mut self, from: u32, fi: u32, to: u32) {
        assert!((to as usize) < self.nodes.len(), "edge target out of bounds");
        self.nodes[from as usize].children.add(fi, to);
    }

    /// Decompresses the node's image.
    pub fn image(&self, i: u32) -> Image {
        self.nodes[i as usize].compact.decode(&self.arena)
    }

    pub fn depth(&self, i: u32) -> u16 {
        self.nodes[i as usize].depth
    }

    pub fn is_piece(&self, i: u32) -> bool {
        self.nodes[i as usize].is_piece
    }

    pub fn child(&self, i: u32, fi: u32) -> Option<u32> {
        self.nodes[i as usize].children.get(fi)
    }

    /// Sorted `(function id, child)` transitions of node `i`.
    pub fn child_pairs(&self, i: u32) -> Vec<(u32, u32)> {
        self.nodes[i as usize].children.to_pairs()
    }

    /// Drops every node's transition table. Called once pieces have been
    /// materialized, to bound peak memory; images and depths remain usable.
    pub fn release_children(&mut self) {
        for node in &mut self.nodes {
            node.children.clear();
        }
    }

    /// Approximate heap footprint of the transition tables, for stat logging.
    pub fn approx_child_bytes(&self) -> usize {
        self.nodes.iter().map(|n| n.children.approx_bytes()).sum()
    }
}

/// Per-function application cost; depths accumulate these.
pub struct FunctionCosts(pub Vec<u32>);

impl FunctionCosts {
    /// Uniform cost of 1 for `n` functions.
    pub fn uniform(n: usize) -> Self {
        FunctionCosts(vec![1; n])
    }

    pub fn cost(&self, fi: u32) -> u32 {
        self.0[fi as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Point;

    #[test]
    fn nodes_round_trip_through_arena() {
        let mut g = DerivationGraph::new(1);
        let a = Image::full(Point::new(0, 0), Point::new(2, 2), 3);
        let b = Image {
            x: 1,
            y: -1,
            w: 3,
            h: 1,
            mask: vec![0, 5, 9],
        };
        let ia = g.add_node(&a, 0, false);
        let ib = g.add_node(&b, 2, true);
        g.add_edge(ia, 4, ib);
        assert_eq!(g.image(ia), a);
        assert_eq!(g.image(ib), b);
        assert_eq!(g.depth(ib), 2);
        assert!(g.is_piece(ib));
        assert_eq!(g.child(ia, 4), Some(ib));
        assert_eq!(g.child(ia, 5), None);
        g.release_children();
        assert_eq!(g.child(ia, 4), None);
        assert_eq!(g.image(ib), b);
    }
}
