// SPDX-License-Identifier: Apache-2.0

//! Greedy, bitset-driven assembly of pieces into candidate output images.
//!
//! All output slots are flattened into one pixel index space. Every piece is
//! pre-flattened into two packed bitsets over that space: `bad` marks pixels
//! that disagree with the target, `active` marks pixels the piece would claim
//! (its background cells). The composer then sweeps a coarse-to-fine piece
//! depth threshold and, per threshold, every non-empty subset of slots to
//! hold fixed with a single "care" slot in focus, repeatedly picking the
//! feasible piece variant that covers the most still-open cared-for pixels.

use ahash::AHashMap;

use crate::bitset::PackedBitset;
use crate::image::{Image, Point, UNSET};
use crate::pieces::PieceSet;

/// A composed answer: one image per output slot (the last is the test-slot
/// answer), plus provenance counters used as a prior when scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub imgs: Vec<Image>,
    pub cnt_pieces: i32,
    pub sum_depth: i32,
    pub max_depth: i32,
}

/// Heuristic completion of an image whose undecided cells have already been
/// forced to background. Implementations get an image containing only
/// background/foreground values and return a best-effort fully filled image;
/// a zero-area result signals failure.
pub trait Fill {
    fn fill(&self, img: &Image) -> Image;
}

/// Pass-through filler, used where no region heuristic is wired in.
pub struct IdentityFill;

impl Fill for IdentityFill {
    fn fill(&self, img: &Image) -> Image {
        img.clone()
    }
}

/// Sweep granularity of the composer: how coarsely the piece-depth threshold
/// advances and how many pieces a single configuration may stack.
#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    /// Step between successive piece-depth thresholds.
    pub depth_step: i32,
    /// Greedy picks per (threshold, care-mask) configuration.
    pub max_iters: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        ComposeOptions {
            depth_step: 10,
            max_iters: 10,
        }
    }
}

/// Composes candidates toward the training targets; the piece list must be
/// sorted by non-decreasing depth.
pub fn compose(
    pieces: &PieceSet,
    targets: &[Image],
    out_sizes: &[Point],
    filler: &dyn Fill,
    opts: &ComposeOptions,
) -> Vec<Candidate> {
    if pieces.pieces.is_empty() {
        return Vec::new();
    }

    {
        let mut d = -1;
        for p in &pieces.pieces {
            assert!(p.depth >= d, "pieces must be sorted by depth");
            d = p.depth;
        }
    }

    let slots = pieces.graphs.len();
    assert_eq!(out_sizes.len(), slots);
    assert!(targets.len() <= slots);

    let mut init: Vec<Image> = Vec::new();
    let mut sz: Vec<usize> = Vec::new();
    for i in 0..slots {
        if i < targets.len() {
            assert_eq!(
                out_sizes[i],
                targets[i].size(),
                "target size disagrees with out_sizes for slot {i}"
            );
        }
        let img = Image::full(Point::new(0, 0), out_sizes[i], UNSET);
        sz.push(img.mask.len());
        init.push(img);
    }

    let n = pieces.pieces.len();
    let m: usize = sz.iter().sum();
    let m64 = (m + 63) / 64;

    // Flatten each piece once into parallel bad/active word blocks.
    let mut bad_mem: Vec<u64> = Vec::with_capacity(n * m64);
    let mut active_mem: Vec<u64> = Vec::with_capacity(n * m64);
    {
        let mut badi = PackedBitset::new(m);
        let mut activei = PackedBitset::new(m);
        for pi in 0..n {
            let ind = pieces.indices(&pieces.pieces[pi]);
            let mut x = 0usize;
            for j in 0..slots {
                let img = pieces.graphs[j].image(ind[j]);
                let target_mask = if j < targets.len() {
                    &targets[j].mask
                } else {
                    &init[j].mask
                };
                assert_eq!(img.mask.len(), sz[j], "piece image size mismatch");
                assert_eq!(target_mask.len(), sz[j]);
                for k in 0..sz[j] {
                    badi.set(x, img.mask[k] != target_mask[k]);
                    activei.set(x, img.mask[k] == 0);
                    x += 1;
                }
            }
            bad_mem.extend_from_slice(badi.words());
            active_mem.extend_from_slice(activei.words());
        }
    }

    let max_piece_depth = pieces.max_depth();

    // One greedy pick: among pieces within the depth threshold and their
    // three polarity variants (inverted / normal / full), the feasible one
    // covering the most open cared-for pixels. Stamps the winner into `ret`
    // and `cur`; `None` means no variant makes progress.
    let greedy_step = |cur: &mut PackedBitset,
                       care: &PackedBitset,
                       depth_thres: i32,
                       ret: &mut Vec<Image>|
     -> Option<i32> {
        let mut sparsej: Vec<usize> = Vec::new();
        for j in 0..m64 {
            if !cur.words()[j] & care.words()[j] != 0 {
                sparsej.push(j);
            }
        }

        let mut best_active: Vec<u64> = vec![0; m64];
        let mut besti: Option<usize> = None;
        // `covered` is always 0; the pair shape is kept so the tie-break
        // stays put if it ever becomes meaningful.
        let mut bestcnt: (i64, i64) = (0, 0);

        for i in 0..n {
            if pieces.pieces[i].depth > depth_thres {
                continue;
            }
            let active_data = &active_mem[i * m64..(i + 1) * m64];
            let bad_data = &bad_mem[i * m64..(i + 1) * m64];
            for k in 0..3u32 {
                let flip: u64 = if k == 0 { !0 } else { 0 };
                let full: u64 = if k == 2 { !0 } else { 0 };

                // A variant that would activate a mismatching pixel in any
                // still-open position is invalid outright.
                let mut ok = true;
                for j in 0..m64 {
                    let active = (active_data[j] ^ flip) | full;
                    if !cur.words()[j] & bad_data[j] & active != 0 {
                        ok = false;
                        break;
                    }
                }
                if !ok {
                    continue;
                }

                let mut cnt: i64 = 0;
                let covered: i64 = 0;
                for &j in &sparsej {
                    let active = (active_data[j] ^ flip) | full;
                    cnt += (active & !cur.words()[j] & care.words()[j]).count_ones() as i64;
                }

                if (cnt, -covered) > bestcnt {
                    bestcnt = (cnt, -covered);
                    besti = Some(i);
                    for j in 0..m64 {
                        best_active[j] = (active_data[j] ^ flip) | full;
                    }
                }
            }
        }

        let besti = besti?;
        let depth = pieces.pieces[besti].depth;
        let ind = pieces.indices(&pieces.pieces[besti]);
        let mut x = 0usize;
        for l in 0..ret.len() {
            let mask = pieces.graphs[l].image(ind[l]).mask;
            for j in 0..sz[l] {
                // Only undecided cells take the piece's pixel.
                if best_active[x >> 6] >> (x & 63) & 1 == 1 && ret[l].mask[j] == UNSET {
                    ret[l].mask[j] = mask[j];
                }
                x += 1;
            }
        }
        for j in 0..m {
            if best_active[j >> 6] >> (j & 63) & 1 == 1 {
                cur.set(j, true);
            }
        }
        Some(depth)
    };

    let mut rets: Vec<Candidate> = Vec::new();
    let mut fill_memo: AHashMap<u64, Image> = AHashMap::new();

    let mut pdt = max_piece_depth % opts.depth_step;
    while pdt <= max_piece_depth {
        for it0 in 0..10usize {
            // Non-empty subsets of slots to leave open (at most 5 slots).
            for mask in 1..(1usize << targets.len()).min(1 << 5) {
                let maskv: Vec<usize> =
                    (0..targets.len()).filter(|j| mask >> j & 1 == 1).collect();
                if it0 >= maskv.len() {
                    continue;
                }
                let care_slot = maskv[it0];

                let mut cur = PackedBitset::new(m);
                let mut care = PackedBitset::new(m);
                let mut base = 0usize;
                for j in 0..slots {
                    if mask >> j & 1 == 0 {
                        // Slots outside the open subset (including the test
                        // slot, whose bit is never set) start out decided.
                        for k in 0..sz[j] {
                            cur.set(base + k, true);
                        }
                    }
                    if j == care_slot {
                        for k in 0..sz[j] {
                            care.set(base + k, true);
                        }
                    }
                    base += sz[j];
                }

                let mut cnt_pieces = 0i32;
                let mut sum_depth = 0i32;
                let mut max_depth = 0i32;
                let mut ret = init.clone();
                for _ in 0..opts.max_iters {
                    let Some(depth) = greedy_step(&mut cur, &care, pdt, &mut ret) else {
                        break;
                    };
                    cnt_pieces += 1;
                    sum_depth += depth;
                    max_depth = max_depth.max(depth);

                    // Black-fill closure: force the remaining undecided cells
                    // of the care slot to background, fill, and keep the
                    // whole composition only if that slot now matches its
                    // target and every other slot fills to positive area.
                    let mut cp = ret.clone();
                    let mut ok = true;
                    {
                        let img = &mut cp[care_slot];
                        for c in img.mask.iter_mut() {
                            if *c == UNSET {
                                *c = 0;
                            }
                        }
                        *img = filler.fill(img);
                        if *img != targets[care_slot] {
                            ok = false;
                        }
                    }
                    if ok {
                        for i in 0..cp.len() {
                            if i == care_slot {
                                continue;
                            }
                            let img = &mut cp[i];
                            for c in img.mask.iter_mut() {
                                if *c == UNSET {
                                    *c = 0;
                                }
                            }
                            // Identical partial images fill identically;
                            // memoize on content.
                            let h = img.content_hash();
                            let filled = match fill_memo.get(&h) {
                                Some(f) => f.clone(),
                                None => {
                                    let f = filler.fill(img);
                                    fill_memo.insert(h, f.clone());
                                    f
                                }
                            };
                            *img = filled;
                            if img.area() <= 0 {
                                ok = false;
                            }
                        }
                        if ok {
                            rets.push(Candidate {
                                imgs: cp,
                                cnt_pieces: cnt_pieces + 1,
                                sum_depth,
                                max_depth,
                            });
                        }
                    }
                }

                // The raw composition is always kept as a fallback, filled or
                // not.
                rets.push(Candidate {
                    imgs: ret,
                    cnt_pieces,
                    sum_depth,
                    max_depth,
                });
            }
        }
        pdt += opts.depth_step;
    }

    log::debug!(
        "compose: {} pieces, {} candidates, fill cache: {}",
        n,
        rets.len(),
        fill_memo.len()
    );
    rets
}

/// Convenience wrapper that takes training pairs directly.
pub fn compose_pieces(
    pieces: &PieceSet,
    train: &[(Image, Image)],
    out_sizes: &[Point],
    filler: &dyn Fill,
    opts: &ComposeOptions,
) -> Vec<Candidate> {
    let targets: Vec<Image> = train.iter().map(|(_, out)| out.clone()).collect();
    compose(pieces, &targets, out_sizes, filler, opts)
}
