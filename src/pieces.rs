// SPDX-License-Identifier: Apache-2.0

//! Piece construction: a cost-monotone breadth expansion over the product of
//! the per-example derivation graphs.
//!
//! A joint state is one node index per graph, reached by applying the same
//! function sequence in every example. States are deduplicated through a
//! [`HashIndex`] keyed on a polynomial hash of the index tuple, and kept only
//! at the minimum depth at which they were reached: rediscovery at a lower
//! depth overwrites the recorded depth and requeues the state, and stale
//! queue entries are skipped at dequeue time (lazy deletion, which keeps the
//! per-depth FIFO buckets valid without a decrease-key priority queue).
//!
//! A joint state whose every component node is a finished piece becomes a
//! [`Piece`]; the emitted list is non-decreasing in depth.

use std::collections::VecDeque;

use crate::dag::{DerivationGraph, FunctionCosts};
use crate::hash_index::HashIndex;

const TUPLE_HASH_MUL: u64 = 1069388789821391921;

/// Polynomial hash of a joint index tuple.
pub fn hash_tuple(tuple: &[u32]) -> u64 {
    let mut r: u64 = 1;
    for &v in tuple {
        r = r.wrapping_mul(TUPLE_HASH_MUL).wrapping_add(v as u64);
    }
    r
}

/// A cross-example-consistent building block: an offset into the shared `mem`
/// arena (one node index per graph) plus the depth it was reached at.
#[derive(Debug, Clone, Copy)]
pub struct Piece {
    pub memi: u32,
    pub depth: i32,
}

/// The immutable output of piece construction, consumed read-only by the
/// composer.
pub struct PieceSet {
    /// Flat arena of index tuples; piece `p` owns
    /// `mem[p.memi .. p.memi + graphs.len()]`.
    pub mem: Vec<u32>,
    pub pieces: Vec<Piece>,
    pub graphs: Vec<DerivationGraph>,
}

impl PieceSet {
    /// The per-graph node indices of `piece`.
    pub fn indices(&self, piece: &Piece) -> &[u32] {
        let start = piece.memi as usize;
        &self.mem[start..start + self.graphs.len()]
    }

    pub fn max_depth(&self) -> i32 {
        self.pieces.iter().map(|p| p.depth).max().unwrap_or(0)
    }
}

/// Dedup store plus per-depth FIFO buckets for the expansion frontier.
struct Frontier {
    dags: usize,
    seen: HashIndex,
    mem: Vec<u32>,
    depth_mem: Vec<i32>,
    queues: Vec<VecDeque<u32>>,
}

impl Frontier {
    fn new(dags: usize) -> Self {
        Frontier {
            dags,
            seen: HashIndex::new(),
            mem: Vec::new(),
            depth_mem: Vec::new(),
            queues: Vec::new(),
        }
    }

    /// Records `tuple` at depth `d`, enqueueing it if it is new or if `d`
    /// improves on the previously recorded depth.
    fn add(&mut self, d: i32, tuple: &[u32]) {
        assert_eq!(tuple.len(), self.dags, "joint state arity mismatch");
        assert!(d >= 0);
        let (memi, inserted) = self.seen.insert(hash_tuple(tuple), self.mem.len() as i32);
        if inserted {
            self.mem.extend_from_slice(tuple);
            self.depth_mem.push(d);
        }
        let slot = memi as usize / self.dags;
        if inserted || self.depth_mem[slot] > d {
            self.depth_mem[slot] = d;
            while self.queues.len() <= d as usize {
                self.queues.push(VecDeque::new());
            }
            self.queues[d as usize].push_back(memi as u32);
        }
    }
}

/// Expands the product of the given graphs and returns every joint state that
/// is simultaneously a finished piece in all of them.
///
/// Graph transition tables and the dedup index are released before returning;
/// the graphs themselves (images, depths) transfer into the returned
/// [`PieceSet`].
pub fn build_pieces(mut graphs: Vec<DerivationGraph>, costs: &FunctionCosts) -> PieceSet {
    let dags = graphs.len();
    assert!(dags > 0, "at least one derivation graph is required");

    let mut frontier = Frontier::new(dags);
    let mut pieces: Vec<Piece> = Vec::new();

    // Seed: each given of the first graph, replicated across all graphs.
    for i in 0..graphs[0].givens {
        let tuple = vec![i as u32; dags];
        frontier.add(graphs[0].depth(i as u32) as i32, &tuple);
    }

    let mut child_lists: Vec<Vec<(u32, u32)>> = vec![Vec::new(); dags];
    let mut successors: Vec<(u32, Vec<u32>)> = Vec::new();

    let mut depth = 0usize;
    while depth < frontier.queues.len() {
        while let Some(memi) = frontier.queues[depth].pop_front() {
            let slot = memi as usize / dags;
            let d = depth as i32;
            if d > frontier.depth_mem[slot] {
                // Stale entry: this state was requeued at a lower depth.
                continue;
            }
            assert_eq!(d, frontier.depth_mem[slot], "bucket queue out of order");

            let ind: Vec<u32> =
                frontier.mem[memi as usize..memi as usize + dags].to_vec();

            let mut all_pieces = true;
            let mut max_node_depth = -1i32;
            for i in 0..dags {
                max_node_depth = max_node_depth.max(graphs[i].depth(ind[i]) as i32);
                all_pieces &= graphs[i].is_piece(ind[i]);
            }
            if all_pieces && max_node_depth >= d {
                pieces.push(Piece { memi, depth: d });
            }
            if max_node_depth < d {
                // Not expandable yet; some example still has to catch up.
                continue;
            }

            // Function ids with a defined transition in every graph, found by
            // advancing one cursor per sorted child list in lockstep.
            successors.clear();
            for i in 0..dags {
                child_lists[i] = graphs[i].child_pairs(ind[i]);
            }
            let mut cursor = vec![0usize; dags];
            let mut tuple = vec![0u32; dags];
            let mut fi = 0u32;
            'merge: loop {
                let mut restart = false;
                for i in 0..dags {
                    let list = &child_lists[i];
                    while cursor[i] < list.len() && list[cursor[i]].0 < fi {
                        cursor[i] += 1;
                    }
                    if cursor[i] == list.len() {
                        break 'merge;
                    }
                    let next_fi = list[cursor[i]].0;
                    if next_fi > fi {
                        fi = next_fi;
                        restart = true;
                        break;
                    }
                    tuple[i] = list[cursor[i]].1;
                }
                if restart {
                    continue;
                }
                successors.push((fi, tuple.clone()));
                fi += 1;
            }

            for (fi, tuple) in &successors {
                let mut new_depth = -1i32;
                for i in 0..dags {
                    new_depth = new_depth.max(graphs[i].depth(tuple[i]) as i32);
                }
                let cost = costs.cost(*fi) as i32;
                if new_depth >= d + cost {
                    frontier.add(d + cost, tuple);
                }
            }
        }
        depth += 1;
    }

    let total_nodes: usize = graphs.iter().map(|g| g.node_count()).sum();
    let child_bytes: usize = graphs.iter().map(|g| g.approx_child_bytes()).sum();
    log::debug!(
        "build_pieces: nodes: {} pieces: {} states: {} child tables: {:.1} MB",
        total_nodes,
        pieces.len(),
        frontier.seen.len(),
        child_bytes as f64 / 1e6
    );

    // Transition tables and the dedup index were only needed during the
    // expansion; release them before handing the graphs on.
    for g in &mut graphs {
        g.release_children();
    }

    let set = PieceSet {
        mem: frontier.mem,
        pieces,
        graphs,
    };
    for piece in &set.pieces {
        for (i, &ind) in set.indices(piece).iter().enumerate() {
            assert!(
                (ind as usize) < set.graphs[i].node_count(),
                "piece references node {} outside graph {}",
                ind,
                i
            );
        }
    }
    set
}
