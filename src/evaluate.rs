// SPDX-License-Identifier: Apache-2.0

//! Candidate scoring against the training pairs, structural validity
//! gating, and final answer selection.

use ahash::AHashSet;

use crate::compose::Candidate;
use crate::image::{Image, COLORS};

/// A candidate that survived evaluation, with its score attached.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub imgs: Vec<Image>,
    pub score: f64,
}

/// Scores candidates and drops invalid ones.
///
/// `score = goods - prior * 0.01` where `goods` counts training slots matched
/// exactly and `prior = max_depth + cnt_pieces * 1e-3` (shallow derivations
/// with few pieces are preferred). Candidates whose final answer is larger
/// than 30x30, empty, or contains out-of-range pixels are dropped, as are
/// candidates matching no training slot.
///
/// The returned list is sorted ascending by `(imgs, score)`: image content is
/// the primary key, score only breaks ties. Callers wanting best-first order
/// must re-sort by score (see [`select_answers`]).
pub fn evaluate(cands: &[Candidate], train: &[(Image, Image)]) -> Vec<ScoredCandidate> {
    let mut ret: Vec<ScoredCandidate> = Vec::new();
    for cand in cands {
        assert!(
            cand.max_depth >= 0 && cand.max_depth < 100,
            "candidate max_depth out of range: {}",
            cand.max_depth
        );
        assert!(
            cand.cnt_pieces >= 0 && cand.cnt_pieces < 100,
            "candidate cnt_pieces out of range: {}",
            cand.cnt_pieces
        );
        assert!(!cand.imgs.is_empty(), "candidate has no images");
        assert!(cand.imgs.len() >= train.len());

        let prior = cand.max_depth as f64 + cand.cnt_pieces as f64 * 1e-3;
        let mut goods = 0i32;
        for (i, (_, expected)) in train.iter().enumerate() {
            if cand.imgs[i] == *expected {
                goods += 1;
            }
        }
        let score = goods as f64 - prior * 0.01;

        let answer = &cand.imgs[cand.imgs.len() - 1];
        if answer.w > 30 || answer.h > 30 || answer.area() == 0 {
            goods = 0;
        }
        if answer.mask.iter().any(|&c| c >= COLORS) {
            goods = 0;
        }

        if goods > 0 {
            ret.push(ScoredCandidate {
                imgs: cand.imgs.clone(),
                score,
            });
        }
    }
    ret.sort_by(|a, b| a.imgs.cmp(&b.imgs).then(a.score.total_cmp(&b.score)));
    ret
}

/// Picks up to `keep` answers, best score first, deduplicating on the content
/// of the final answer image.
pub fn select_answers(scored: &[ScoredCandidate], keep: usize) -> Vec<ScoredCandidate> {
    let mut by_score: Vec<&ScoredCandidate> = scored.iter().collect();
    by_score.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen: AHashSet<u64> = AHashSet::new();
    let mut out: Vec<ScoredCandidate> = Vec::new();
    for cand in by_score {
        let answer = &cand.imgs[cand.imgs.len() - 1];
        if seen.insert(answer.content_hash()) {
            out.push(cand.clone());
            if out.len() == keep {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Point;

    fn cand(imgs: Vec<Image>, cnt_pieces: i32, max_depth: i32) -> Candidate {
        Candidate {
            imgs,
            cnt_pieces,
            sum_depth: max_depth,
            max_depth,
        }
    }

    fn grid(size: i32, value: u8) -> Image {
        Image::full(Point::new(0, 0), Point::new(size, size), value)
    }

    #[test]
    fn unmatched_candidates_are_dropped() {
        let train = vec![(grid(3, 1), grid(3, 2))];
        let cands = vec![cand(vec![grid(3, 5), grid(3, 5)], 1, 0)];
        assert!(evaluate(&cands, &train).is_empty());
    }

    #[test]
    fn oversized_answer_is_dropped() {
        let train = vec![(grid(3, 1), grid(3, 2))];
        let big = Image::full(Point::new(0, 0), Point::new(31, 3), 0);
        let cands = vec![cand(vec![grid(3, 2), big], 1, 0)];
        assert!(evaluate(&cands, &train).is_empty());
    }

    #[test]
    fn score_prefers_shallow_and_few_pieces() {
        let train = vec![(grid(3, 1), grid(3, 2))];
        let a = cand(vec![grid(3, 2), grid(3, 0)], 1, 0);
        let b = cand(vec![grid(3, 2), grid(3, 0)], 5, 7);
        let scored = evaluate(&[a, b], &train);
        assert_eq!(scored.len(), 2);
        // Same images, so ties broke on score ascending.
        assert!(scored[0].score < scored[1].score);
        assert_eq!(scored[1].score, 1.0 - (0.0 + 1.0 * 1e-3) * 0.01);
    }

    #[test]
    fn sort_uses_image_content_as_primary_key() {
        // The better-scoring candidate sorts *after* the one with smaller
        // image content: the sort key really is (imgs, score), score only
        // breaking ties. Surprising, but intentional to preserve.
        let train = vec![(grid(3, 1), grid(3, 2))];
        let good = cand(vec![grid(3, 2), grid(3, 9)], 1, 0);
        let bad = cand(vec![grid(3, 2), grid(3, 0)], 50, 50);
        let scored = evaluate(&[good.clone(), bad.clone()], &train);
        assert_eq!(scored.len(), 2);
        assert!(scored[0].score < scored[1].score);
        assert_eq!(scored[0].imgs[1], grid(3, 0));
        assert_eq!(scored[1].imgs[1], grid(3, 9));
    }

    #[test]
    fn select_answers_dedups_and_orders_by_score() {
        let train = vec![(grid(3, 1), grid(3, 2))];
        let a = cand(vec![grid(3, 2), grid(3, 0)], 1, 0);
        let a_worse = cand(vec![grid(3, 2), grid(3, 0)], 9, 9);
        let b = cand(vec![grid(3, 2), grid(3, 4)], 2, 0);
        let scored = evaluate(&[a, a_worse, b], &train);
        let picked = select_answers(&scored, 3);
        assert_eq!(picked.len(), 2);
        assert!(picked[0].score >= picked[1].score);
        assert_eq!(picked[0].imgs[1], grid(3, 0));
        assert_eq!(picked[1].imgs[1], grid(3, 4));
    }
}
