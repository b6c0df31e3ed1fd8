//! In-memory columnar event store.

use std::collections::BTreeMap;

use abcd_core::{Error, EventSource, Result};
use rayon::prelude::*;

use crate::expr::SelectionExpr;

/// Rows per parallel reduction chunk. Partial sums are folded in chunk
/// order, so results do not depend on the worker count.
const CHUNK_SIZE: usize = 4096;

/// A named set of equal-length `f64` columns, one entry per event.
///
/// The table is the reference [`EventSource`]: queries evaluate the
/// expression per event as a weight and return `(Σw, √Σw²)`, the single-bin
/// weighted projection of the event store.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    id: String,
    columns: BTreeMap<String, Vec<f64>>,
    n_rows: usize,
}

impl EventTable {
    /// Create an empty table with the given identity.
    pub fn new(id: impl Into<String>) -> Self {
        EventTable { id: id.into(), columns: BTreeMap::new(), n_rows: 0 }
    }

    /// Add a column. Every column must have the same length; the first
    /// column fixes the event count.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if self.columns.is_empty() {
            self.n_rows = values.len();
        } else if values.len() != self.n_rows {
            return Err(Error::Validation(format!(
                "column '{name}' has {} entries, table has {}",
                values.len(),
                self.n_rows
            )));
        }
        if self.columns.insert(name.clone(), values).is_some() {
            return Err(Error::Validation(format!("duplicate column '{name}'")));
        }
        Ok(self)
    }

    /// Number of events.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Column names, sorted.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Evaluation(format!("missing column '{name}' in table '{}'", self.id)))
    }
}

impl EventSource for EventTable {
    fn id(&self) -> &str {
        &self.id
    }

    fn entries(&self) -> u64 {
        self.n_rows as u64
    }

    fn count_and_uncertainty(&self, expression: &str) -> Result<(f64, f64)> {
        let expr = SelectionExpr::parse(expression)?;
        let columns: Vec<&[f64]> = expr
            .required_columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<_>>()?;

        if columns.is_empty() {
            // Constant weight for every event.
            let w = expr.eval_row(&[]);
            let n = self.n_rows as f64;
            return Ok((w * n, (w * w * n).sqrt()));
        }

        let weights = expr.eval_bulk(&columns);
        let partials: Vec<(f64, f64)> = weights
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| chunk.iter().fold((0.0, 0.0), |(s, s2), w| (s + w, s2 + w * w)))
            .collect();
        let (sum, sum_w2) =
            partials.iter().fold((0.0, 0.0), |(s, s2), (ps, ps2)| (s + ps, s2 + ps2));
        Ok((sum, sum_w2.sqrt()))
    }
}
