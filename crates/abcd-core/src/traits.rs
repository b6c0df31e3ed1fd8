//! Core traits for abcd.
//!
//! [`EventSource`] is the seam between the yield machinery and whatever
//! holds the per-event data (a columnar table, a chained set of files, a
//! remote store). The cache layer never touches event data directly; it only
//! asks a source to evaluate an expression and hand back a weighted count.

use crate::error::Result;

/// A queryable store of per-event data.
///
/// Implementations evaluate a selection/weight expression over every event
/// and return the summed weight with its statistical uncertainty. They must
/// be shareable across threads; the yield cache issues queries from
/// concurrent workers.
pub trait EventSource: Send + Sync {
    /// Stable identity of the underlying dataset (e.g. the joined file
    /// paths). Used as part of cache keys, so it must distinguish sources
    /// with different content.
    fn id(&self) -> &str;

    /// Total number of events in the store, before any selection.
    fn entries(&self) -> u64;

    /// Evaluate `expression` per event as a weight and return
    /// `(Σw, √Σw²)`.
    ///
    /// A malformed expression fails with
    /// [`Error::Evaluation`](crate::Error::Evaluation); the caller
    /// propagates it without retrying.
    fn count_and_uncertainty(&self, expression: &str) -> Result<(f64, f64)>;
}
