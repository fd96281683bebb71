// SPDX-License-Identifier: Apache-2.0

//! Adaptive map from transformation-function id to child node index.
//!
//! Most derivation-graph nodes have a handful of outgoing transitions, so the
//! table starts as a sorted pair list. A few hub nodes accumulate many
//! transitions; once a table reaches [`DENSE_THRES`] entries it is promoted to
//! a directly indexed array for O(1) lookup.

/// Entry count at which a sparse table converts to dense storage.
const DENSE_THRES: usize = 10;

#[derive(Debug, Clone)]
pub enum ChildTable {
    /// Sorted `(function id, child index)` pairs, binary-searched.
    Sparse(Vec<(u32, u32)>),
    /// Directly indexed by function id; `None` marks an absent transition.
    Dense(Vec<Option<u32>>),
}

impl ChildTable {
    pub fn new() -> Self {
        ChildTable::Sparse(Vec::new())
    }

    /// Records `fi -> child`, overwriting any previous entry for `fi`.
    pub fn add(&mut self, fi: u32, child: u32) {
        match self {
            ChildTable::Sparse(pairs) => {
                match pairs.binary_search_by_key(&fi, |p| p.0) {
                    Ok(p) => {
                        pairs[p].1 = child;
                        return;
                    }
                    Err(p) => pairs.insert(p, (fi, child)),
                }
                if pairs.len() == DENSE_THRES {
                    let cap = pairs.last().map(|p| p.0).unwrap_or(0) as usize + 1;
                    let mut dense = vec![None; cap];
                    for &(f, c) in pairs.iter() {
                        dense[f as usize] = Some(c);
                    }
                    *self = ChildTable::Dense(dense);
                }
            }
            ChildTable::Dense(dense) => {
                if fi as usize >= dense.len() {
                    dense.resize((fi as usize + 1) * 3 / 2, None);
                }
                dense[fi as usize] = Some(child);
            }
        }
    }

    pub fn get(&self, fi: u32) -> Option<u32> {
        match self {
            ChildTable::Sparse(pairs) => pairs
                .binary_search_by_key(&fi, |p| p.0)
                .ok()
                .map(|p| pairs[p].1),
            ChildTable::Dense(dense) => dense.get(fi as usize).copied().flatten(),
        }
    }

    /// Every `(function id, child index)` pair, in increasing function-id
    /// order regardless of storage mode.
    pub fn to_pairs(&self) -> Vec<(u32, u32)> {
        match self {
            ChildTable::Sparse(pairs) => pairs.clone(),
            ChildTable::Dense(dense) => dense
                .iter()
                .enumerate()
                .filter_map(|(f, c)| c.map(|c| (f as u32, c)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChildTable::Sparse(pairs) => pairs.len(),
            ChildTable::Dense(dense) => dense.iter().filter(|c| c.is_some()).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases the backing storage. Used once piece construction is done and
    /// transitions are no longer needed.
    pub fn clear(&mut self) {
        *self = ChildTable::new();
    }

    /// Approximate heap footprint, for memory stat logging.
    pub fn approx_bytes(&self) -> usize {
        match self {
            ChildTable::Sparse(pairs) => pairs.capacity() * 8,
            ChildTable::Dense(dense) => dense.capacity() * 8,
        }
    }
}

impl Default for ChildTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_add_and_get() {
        let mut t = ChildTable::new();
        t.add(5, 50);
        t.add(1, 10);
        t.add(3, 30);
        assert_eq!(t.get(1), Some(10));
        assert_eq!(t.get(3), Some(30));
        assert_eq!(t.get(5), Some(50));
        assert_eq!(t.get(2), None);
        assert!(matches!(t, ChildTable::Sparse(_)));
    }

    #[test]
    fn last_add_wins() {
        let mut t = ChildTable::new();
        t.add(4, 1);
        t.add(4, 2);
        assert_eq!(t.get(4), Some(2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn promotion_preserves_entries() {
        let mut t = ChildTable::new();
        for fi in 0..20u32 {
            t.add(fi * 3, fi + 100);
        }
        assert!(matches!(t, ChildTable::Dense(_)));
        for fi in 0..20u32 {
            assert_eq!(t.get(fi * 3), Some(fi + 100));
        }
        assert_eq!(t.get(1), None);
        assert_eq!(t.len(), 20);
    }

    #[test]
    fn dense_grows_for_large_function_ids() {
        let mut t = ChildTable::new();
        for fi in 0..DENSE_THRES as u32 {
            t.add(fi, fi);
        }
        assert!(matches!(t, ChildTable::Dense(_)));
        t.add(1000, 42);
        assert_eq!(t.get(1000), Some(42));
        assert_eq!(t.get(999), None);
    }

    #[test]
    fn to_pairs_sorted_in_both_modes() {
        let mut sparse = ChildTable::new();
        for &fi in &[7u32, 2, 9, 4] {
            sparse.add(fi, fi * 10);
        }
        assert_eq!(
            sparse.to_pairs(),
            vec![(2, 20), (4, 40), (7, 70), (9, 90)]
        );

        let mut dense = ChildTable::new();
        for fi in (0..30u32).rev() {
            dense.add(fi * 2, fi);
        }
        assert!(matches!(dense, ChildTable::Dense(_)));
        let pairs = dense.to_pairs();
        assert_eq!(pairs.len(), 30);
        assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
