//! Directness and efficiency ratios between two distance matrices.
//!
//! A pair `(i, j)` is *valid* when `i != j` and both matrices hold a finite,
//! non-zero distance for it. Invalid pairs are dropped from both sides.
//! Every statistic is `None` when no pair is valid.

use crate::distance::DistanceMatrix;
use crate::{Error, Result};

fn check_shapes(d1: &DistanceMatrix, d2: &DistanceMatrix) -> Result<()> {
    if !d1.is_square() || d1.rows() != d2.rows() || d1.cols() != d2.cols() {
        return Err(Error::InvalidInput(format!(
            "distance matrices differ in shape: {}x{} vs {}x{}",
            d1.rows(), d1.cols(), d2.rows(), d2.cols(),
        )));
    }
    Ok(())
}

#[inline]
fn usable(d: f32) -> bool {
    d.is_finite() && d != 0.0
}

/// Valid pairs of row `i` as `(d1, d2)`.
fn row_pairs<'a>(
    d1: &'a DistanceMatrix,
    d2: &'a DistanceMatrix,
    i: usize,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    d1.row(i)
        .zip(d2.row(i))
        .enumerate()
        .filter(move |&(j, (a, b))| j != i && usable(a) && usable(b))
        .map(|(_, (a, b))| (f64::from(a), f64::from(b)))
}

/// All valid pairs, row-major.
pub fn masked_pairs(d1: &DistanceMatrix, d2: &DistanceMatrix) -> Result<Vec<(f64, f64)>> {
    check_shapes(d1, d2)?;
    Ok((0..d1.rows()).flat_map(|i| row_pairs(d1, d2, i)).collect())
}

/// Mean of `d1 / d2` over valid pairs.
pub fn directness(d1: &DistanceMatrix, d2: &DistanceMatrix) -> Result<Option<f64>> {
    let pairs = masked_pairs(d1, d2)?;
    if pairs.is_empty() {
        return Ok(None);
    }
    let sum: f64 = pairs.iter().map(|&(a, b)| a / b).sum();
    Ok(Some(sum / pairs.len() as f64))
}

/// `Σ 1/d1 / Σ 1/d2` over valid pairs.
pub fn global_efficiency(d1: &DistanceMatrix, d2: &DistanceMatrix) -> Result<Option<f64>> {
    let pairs = masked_pairs(d1, d2)?;
    if pairs.is_empty() {
        return Ok(None);
    }
    let (inv1, inv2) = pairs
        .iter()
        .fold((0.0, 0.0), |(s1, s2), &(a, b)| (s1 + 1.0 / a, s2 + 1.0 / b));
    Ok(Some(inv1 / inv2))
}

/// Mean over nodes of the per-node efficiency ratio
/// `Σ_j 1/d1[i,j] / Σ_j 1/d2[i,j]`. Nodes without a valid pair are skipped.
pub fn local_efficiency(d1: &DistanceMatrix, d2: &DistanceMatrix) -> Result<Option<f64>> {
    check_shapes(d1, d2)?;
    let mut total = 0.0;
    let mut nodes = 0usize;
    for i in 0..d1.rows() {
        let mut any = false;
        let (mut inv1, mut inv2) = (0.0, 0.0);
        for (a, b) in row_pairs(d1, d2, i) {
            any = true;
            inv1 += 1.0 / a;
            inv2 += 1.0 / b;
        }
        if any {
            total += inv1 / inv2;
            nodes += 1;
        }
    }
    Ok((nodes > 0).then(|| total / nodes as f64))
}

/// Mean off-diagonal finite, non-zero distance of one matrix.
pub fn avg_path_length(d: &DistanceMatrix) -> Option<f64> {
    let (mut sum, mut count) = (0.0, 0usize);
    for i in 0..d.rows() {
        for (j, v) in d.row(i).enumerate() {
            if i != j && usable(v) {
                sum += f64::from(v);
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: &[&[f32]]) -> DistanceMatrix {
        DistanceMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_masking_drops_pair_with_zero() {
        let d1 = m(&[&[0.0, 4.0], &[4.0, 0.0]]);
        let d2 = m(&[&[0.0, 0.0], &[2.0, 0.0]]);
        assert_eq!(masked_pairs(&d1, &d2).unwrap(), vec![(4.0, 2.0)]);
        assert_eq!(directness(&d1, &d2).unwrap(), Some(2.0));
        assert_eq!(global_efficiency(&d1, &d2).unwrap(), Some(0.5));
        assert_eq!(local_efficiency(&d1, &d2).unwrap(), Some(0.5));
    }

    #[test]
    fn test_masking_drops_unreachable() {
        let inf = f32::INFINITY;
        let d1 = m(&[&[0.0, 1.0, 2.0], &[1.0, 0.0, 1.0], &[2.0, 1.0, 0.0]]);
        let d2 = m(&[&[0.0, inf, 4.0], &[1.0, 0.0, inf], &[inf, inf, 0.0]]);
        assert_eq!(masked_pairs(&d1, &d2).unwrap(), vec![(2.0, 4.0), (1.0, 1.0)]);
        assert_eq!(directness(&d1, &d2).unwrap(), Some(0.75));
    }

    #[test]
    fn test_identical_matrices() {
        let d = m(&[&[0.0, 3.0, 5.0], &[3.0, 0.0, 4.0], &[5.0, 4.0, 0.0]]);
        assert_eq!(directness(&d, &d).unwrap(), Some(1.0));
        assert_eq!(global_efficiency(&d, &d).unwrap(), Some(1.0));
        assert_eq!(local_efficiency(&d, &d).unwrap(), Some(1.0));
        assert_eq!(avg_path_length(&d), Some(4.0));
    }

    #[test]
    fn test_no_valid_pairs_is_none() {
        let d1 = m(&[&[0.0, f32::INFINITY], &[0.0, 0.0]]);
        let d2 = m(&[&[0.0, 1.0], &[1.0, 0.0]]);
        assert_eq!(directness(&d1, &d2).unwrap(), None);
        assert_eq!(global_efficiency(&d1, &d2).unwrap(), None);
        assert_eq!(local_efficiency(&d1, &d2).unwrap(), None);
        assert_eq!(avg_path_length(&d1), None);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let d1 = m(&[&[0.0]]);
        let d2 = m(&[&[0.0, 1.0], &[1.0, 0.0]]);
        assert!(matches!(directness(&d1, &d2), Err(Error::InvalidInput(_))));
    }

    /// Row-wise ratios summed and divided by the number of masked entries,
    /// as earlier releases reported local efficiency.
    fn legacy_local_efficiency(d1: &DistanceMatrix, d2: &DistanceMatrix) -> f64 {
        let n = d1.rows();
        let mut masked = 0usize;
        let mut total = 0.0;
        for i in 0..n {
            let (mut inv1, mut inv2) = (0.0, 0.0);
            for j in 0..n {
                let (a, b) = (d1.get(i, j), d2.get(i, j));
                if i != j && usable(a) && usable(b) {
                    inv1 += 1.0 / f64::from(a);
                    inv2 += 1.0 / f64::from(b);
                } else {
                    masked += 1;
                }
            }
            total += inv1 / inv2;
        }
        total / masked as f64
    }

    #[test]
    fn test_local_efficiency_differs_from_legacy_normalization() {
        let d1 = m(&[&[0.0, 2.0, 2.0], &[2.0, 0.0, 2.0], &[2.0, 2.0, 0.0]]);
        let d2 = m(&[&[0.0, 0.0, 1.0], &[1.0, 0.0, 1.0], &[1.0, 1.0, 0.0]]);
        assert_eq!(local_efficiency(&d1, &d2).unwrap(), Some(0.5));
        assert_eq!(legacy_local_efficiency(&d1, &d2), 0.375);
    }
}
