//! # Distance matrices
//!
//! Dense matrices indexed by a node order, plus the two modules that fill
//! them:
//!
//! | Module | Builds |
//! |--------|--------|
//! | `geometric` | straight-line distances (`E`) from planar or geographic coordinates |
//! | `shortest_path` | all-pairs Dijkstra distances (`S`, and every sub-problem of `N`) |
//!
//! `inf` marks an unreachable pair. The diagonal is 0 by construction.

pub mod geometric;
pub mod shortest_path;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::model::bf16::{bf16_is_finite, bf16_to_f32, f32_to_bf16, BF16_INFINITY};
use crate::{Error, Result};

pub use geometric::{planar_distance_matrix, geographic_distance_matrix};
pub use shortest_path::{shortest_path_matrix, SparseAdjacency};

/// Dense, row-major distance matrix stored at BF16 precision.
///
/// Usually square (`N × N` over a node order). Sub-problem results are
/// rectangular: one row per source, one column per local node.
///
/// BF16 keeps 8 significant bits. Integers are exact only up to 256, so hop
/// counts above 256 are rounded (257 reads back as 256) and metre lengths
/// carry a relative error of up to 2^-9. Large values stay finite up to
/// about 3.4e38.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    rows: usize,
    cols: usize,
    data: Vec<u16>,
}

impl DistanceMatrix {
    /// Square matrix of unreachable pairs. Starting point for assembly.
    pub fn unreachable(size: usize) -> Self {
        Self { rows: size, cols: size, data: vec![BF16_INFINITY; size * size] }
    }

    /// Build from explicit rows. Fails on ragged input.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(Error::InvalidInput(format!(
                    "row {i} has {} entries, expected {cols}", row.len(),
                )));
            }
            data.extend(row.iter().map(|&v| f32_to_bf16(v)));
        }
        Ok(Self { rows: rows.len(), cols, data })
    }

    /// Assemble from already-encoded BF16 rows of equal length.
    pub(crate) fn from_bf16_rows(rows: Vec<Vec<u16>>, cols: usize) -> Self {
        let n_rows = rows.len();
        let data: Vec<u16> = rows.into_iter().flatten().collect();
        debug_assert_eq!(data.len(), n_rows * cols);
        Self { rows: n_rows, cols, data }
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn is_square(&self) -> bool { self.rows == self.cols }

    /// Number of nodes of a square matrix.
    pub fn size(&self) -> usize { self.rows }

    /// Distance from row `i` to column `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        bf16_to_f32(self.data[i * self.cols + j])
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, distance: f32) {
        self.data[i * self.cols + j] = f32_to_bf16(distance);
    }

    /// Row `i` decoded to `f32`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = f32> + '_ {
        self.data[i * self.cols..(i + 1) * self.cols].iter().map(|&b| bf16_to_f32(b))
    }

    /// Every finite entry, row-major. Diagonal included.
    pub fn finite_values(&self) -> Vec<f32> {
        self.data
            .iter()
            .filter(|&&b| bf16_is_finite(b))
            .map(|&b| bf16_to_f32(b))
            .collect()
    }

    /// Heap bytes held by the entries.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<u16>()
    }

    /// Copy the `local_rows × local_cols` block of `src` to the positions
    /// `global_rows × global_cols` of `self`.
    ///
    /// # Panics
    ///
    /// Panics if the range lengths and index lists disagree.
    pub fn scatter_block(
        &mut self,
        src: &DistanceMatrix,
        local_rows: Range<usize>,
        local_cols: Range<usize>,
        global_rows: &[usize],
        global_cols: &[usize],
    ) {
        assert_eq!(local_rows.len(), global_rows.len(), "row mapping length mismatch");
        assert_eq!(local_cols.len(), global_cols.len(), "column mapping length mismatch");
        for (li, &gi) in local_rows.zip(global_rows) {
            let src_row = &src.data[li * src.cols..(li + 1) * src.cols];
            let dst_row = &mut self.data[gi * self.cols..(gi + 1) * self.cols];
            for (lj, &gj) in local_cols.clone().zip(global_cols) {
                dst_row[gj] = src_row[lj];
            }
        }
    }
}
