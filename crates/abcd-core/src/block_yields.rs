//! Per-block yield aggregation and dominant row/column selection.

use std::collections::BTreeSet;

use crate::block::Block;
use crate::cut::Cut;
use crate::error::{Error, Result};
use crate::gamma_params::GammaParams;
use crate::process::Process;
use crate::yield_manager::YieldManager;

/// The aggregated yields of one block: a row-major matrix with one
/// [`GammaParams`] per grid cell, summed over a set of processes.
///
/// Built once per (block, process-set, cut, manager) combination and
/// read-only afterwards. The dominant row and column it selects become the
/// reference axes for the ABCD ratio parameters, which keeps the fitted
/// ratios near one and their uncertainties small.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockYields {
    gps: Vec<Vec<GammaParams>>,
}

impl BlockYields {
    /// Aggregate `block` over `processes` under `cut`, pulling every cell
    /// yield through the cache.
    ///
    /// Fails with [`Error::Validation`] on a jagged grid and propagates any
    /// event-source failure.
    pub fn new(
        block: &Block,
        processes: &BTreeSet<Process>,
        cut: &Cut,
        yields: &YieldManager,
    ) -> Result<Self> {
        if !block.is_rectangular() {
            return Err(Error::Validation(format!("block {} is not rectangular", block.name())));
        }
        let mut gps = Vec::with_capacity(block.n_rows());
        for row in block.bins() {
            let mut cells = Vec::with_capacity(row.len());
            for bin in row {
                let mut cell = GammaParams::default();
                for process in processes {
                    cell += yields.get(bin, process, cut)?;
                }
                cells.push(cell);
            }
            gps.push(cells);
        }
        Ok(BlockYields { gps })
    }

    /// Wrap an existing cell matrix, validating rectangularity.
    pub fn from_matrix(gps: Vec<Vec<GammaParams>>) -> Result<Self> {
        let n_cols = gps.first().map(Vec::len).unwrap_or(0);
        if gps.iter().any(|row| row.len() != n_cols) {
            return Err(Error::Validation("cell matrix is not rectangular".into()));
        }
        Ok(BlockYields { gps })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.gps.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.gps.first().map(Vec::len).unwrap_or(0)
    }

    /// The cell at (row, col).
    pub fn cell(&self, row: usize, col: usize) -> Result<GammaParams> {
        self.gps
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .ok_or_else(|| {
                Error::OutOfRange(format!(
                    "cell ({row},{col}) outside {}x{} block",
                    self.n_rows(),
                    self.n_cols()
                ))
            })
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<GammaParams> {
        self.gps.iter().map(|row| row.iter().copied().sum()).collect()
    }

    /// Sum of each column.
    pub fn col_sums(&self) -> Vec<GammaParams> {
        let mut sums = vec![GammaParams::default(); self.n_cols()];
        for row in &self.gps {
            for (icol, cell) in row.iter().enumerate() {
                sums[icol] += *cell;
            }
        }
        sums
    }

    /// Index of the row with the largest summed yield, `None` for an empty
    /// grid. Ties resolve to the lowest index.
    pub fn max_row(&self) -> Option<usize> {
        arg_max(&self.row_sums())
    }

    /// Index of the column with the largest summed yield, `None` for an
    /// empty grid. Ties resolve to the lowest index.
    pub fn max_col(&self) -> Option<usize> {
        arg_max(&self.col_sums())
    }

    /// Grand sum over all cells.
    pub fn total(&self) -> GammaParams {
        self.gps.iter().flatten().copied().sum()
    }
}

/// Index of the strictly largest yield; first occurrence wins ties.
fn arg_max(sums: &[GammaParams]) -> Option<usize> {
    let mut imax = 0;
    let mut best = sums.first()?.value();
    for (i, gp) in sums.iter().enumerate().skip(1) {
        if gp.value() > best {
            best = gp.value();
            imax = i;
        }
    }
    Some(imax)
}
