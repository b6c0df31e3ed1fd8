//! Chaining several event sources into one sample.

use std::sync::Arc;

use abcd_core::{EventSource, Result};

/// An ordered list of sources queried as one dataset.
///
/// Mirrors how a sample spread over several files is chained on disk:
/// entries and counts add, uncertainties add in quadrature. The chain's
/// identity is the `+`-joined identity of its parts, in order, so two
/// chains over the same parts in the same order share cache entries.
pub struct EventChain {
    id: String,
    sources: Vec<Arc<dyn EventSource>>,
}

impl EventChain {
    /// Chain the given sources, in order.
    pub fn new(sources: Vec<Arc<dyn EventSource>>) -> Self {
        let id = sources.iter().map(|s| s.id()).collect::<Vec<_>>().join("+");
        EventChain { id, sources }
    }

    /// Number of chained sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl EventSource for EventChain {
    fn id(&self) -> &str {
        &self.id
    }

    fn entries(&self) -> u64 {
        self.sources.iter().map(|s| s.entries()).sum()
    }

    fn count_and_uncertainty(&self, expression: &str) -> Result<(f64, f64)> {
        let mut count = 0.0;
        let mut variance = 0.0;
        for source in &self.sources {
            let (c, u) = source.count_and_uncertainty(expression)?;
            count += c;
            variance += u * u;
        }
        Ok((count, variance.sqrt()))
    }
}
