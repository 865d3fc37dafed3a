//! Pairwise-overlap check between node sets.

use hashbrown::HashSet;

use crate::model::NodeId;
use crate::{Error, Result};

/// `k × k` matrix where `[i][j]` is true iff sets `i` and `j` share a node.
/// The diagonal is always false.
///
/// # Errors
///
/// `InvalidInput` when `sets` is empty.
pub fn pairwise_overlap(sets: &[HashSet<NodeId>]) -> Result<Vec<Vec<bool>>> {
    if sets.is_empty() {
        return Err(Error::InvalidInput("pairwise_overlap needs at least one node set".into()));
    }
    let k = sets.len();
    let mut overlap = vec![vec![false; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            // iterate the smaller set
            let (small, large) = if sets[i].len() <= sets[j].len() {
                (&sets[i], &sets[j])
            } else {
                (&sets[j], &sets[i])
            };
            let shared = small.iter().any(|n| large.contains(n));
            overlap[i][j] = shared;
            overlap[j][i] = shared;
        }
    }
    Ok(overlap)
}

/// Index pairs `(i, j)`, `i < j`, of overlapping sets.
pub fn overlapping_pairs(overlap: &[Vec<bool>]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, row) in overlap.iter().enumerate() {
        for (j, &shared) in row.iter().enumerate().skip(i + 1) {
            if shared {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
