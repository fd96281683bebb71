// SPDX-License-Identifier: Apache-2.0

//! Piece-composition search for grid reconstruction tasks.
//!
//! Given one pre-built derivation graph per training example (plus one for the
//! held-out test input), the engine expands the product of those graphs into
//! cross-example-consistent "pieces", then greedily assembles pieces into
//! candidate output grids and scores them against the training outputs.
//!
//! Pipeline: [`pieces::build_pieces`] -> [`compose::compose`] ->
//! [`evaluate::evaluate`] -> [`evaluate::select_answers`].

pub mod bitset;
pub mod bundle;
pub mod child_table;
pub mod codec;
pub mod compose;
pub mod dag;
pub mod evaluate;
pub mod hash_index;
pub mod image;
pub mod pieces;
