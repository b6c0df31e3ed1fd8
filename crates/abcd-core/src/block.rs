//! One full ABCD grid: a named rectangular arrangement of bins.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bin::Bin;

/// A named rows×columns grid of [`Bin`]s defining one ABCD partition.
///
/// Equality and ordering delegate to the bin matrix only; the name is
/// presentation. Two blocks with different names but identical bin layouts
/// compare equal, so a set of blocks deduplicates by layout.
///
/// The grid is intended to be rectangular. The type does not enforce it;
/// consumers such as [`BlockYields`](crate::BlockYields) reject jagged
/// input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    name: String,
    bins: Vec<Vec<Bin>>,
}

impl Block {
    /// Create a block from rows of bins.
    pub fn new(name: impl Into<String>, bins: Vec<Vec<Bin>>) -> Self {
        Block { name: name.into(), bins }
    }

    /// The block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bin matrix, row-major.
    pub fn bins(&self) -> &[Vec<Bin>] {
        &self.bins
    }

    /// Mutable access to the bin matrix, for attaching systematics.
    pub fn bins_mut(&mut self) -> &mut Vec<Vec<Bin>> {
        &mut self.bins
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.bins.len()
    }

    /// Number of columns of the first row, or 0 for an empty grid.
    pub fn n_cols(&self) -> usize {
        self.bins.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether every row has the same length.
    pub fn is_rectangular(&self) -> bool {
        let n_cols = self.n_cols();
        self.bins.iter().all(|row| row.len() == n_cols)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.bins == other.bins
    }
}

impl Eq for Block {}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Block {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bins.cmp(&other.bins)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block::{}({}x{})", self.name, self.n_rows(), self.n_cols())
    }
}
