//! Named data and simulation samples.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cut::Cut;
use crate::error::Result;
use crate::gamma_params::GammaParams;
use crate::traits::EventSource;

/// What a process represents, which decides its luminosity treatment.
///
/// Observed data is never rescaled; simulated signal and background are
/// rescaled to the requested luminosity, and background additionally goes
/// through the configured reweighting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Observed collision data.
    Data,
    /// Simulated signal.
    Signal,
    /// Simulated background.
    Background,
}

/// A named event sample: an event source plus the sample's own baseline
/// selection and a policy for zero-yield results.
///
/// Identity is (name, cut, count_zeros, source id, kind), compared in that
/// order. The order is strict and total, so `Process` works as an
/// ordered-map/set key. Name and cut are whitespace-normalized at
/// construction.
#[derive(Clone)]
pub struct Process {
    name: String,
    cut: Cut,
    kind: ProcessKind,
    count_zeros: bool,
    source: Arc<dyn EventSource>,
}

impl Process {
    /// Create a process with the trivial cut, counting zeros.
    pub fn new(name: impl Into<String>, kind: ProcessKind, source: Arc<dyn EventSource>) -> Self {
        let mut name = name.into();
        name.retain(|c| !c.is_whitespace());
        Process { name, cut: Cut::default(), kind, count_zeros: true, source }
    }

    /// Set the sample's own baseline selection.
    #[must_use]
    pub fn with_cut(mut self, cut: Cut) -> Self {
        self.cut = cut;
        self
    }

    /// Set whether a zero yield under the full selection may be replaced by
    /// a best-effort weight estimate from looser selections.
    #[must_use]
    pub fn with_count_zeros(mut self, count_zeros: bool) -> Self {
        self.count_zeros = count_zeros;
        self
    }

    /// The process name (whitespace-free).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sample's baseline selection.
    pub fn cut(&self) -> &Cut {
        &self.cut
    }

    /// The sample kind.
    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Whether this is observed data.
    pub fn is_data(&self) -> bool {
        self.kind == ProcessKind::Data
    }

    /// Whether this is simulated signal.
    pub fn is_signal(&self) -> bool {
        self.kind == ProcessKind::Signal
    }

    /// The zero-yield policy flag.
    pub fn count_zeros(&self) -> bool {
        self.count_zeros
    }

    /// Identity of the underlying event source.
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Number of events in the underlying source, before any selection.
    pub fn entries(&self) -> u64 {
        self.source.entries()
    }

    /// Query the event source with `cut` multiplied by the sample's own
    /// selection and return the yield estimate.
    ///
    /// This is the only call path from the yield machinery into the event
    /// store.
    pub fn get_yield(&self, cut: &Cut) -> Result<GammaParams> {
        let full = cut.clone() * self.cut.clone();
        let (count, uncertainty) = self.source.count_and_uncertainty(full.as_str())?;
        Ok(GammaParams::from_value_and_uncertainty(count, uncertainty))
    }

    fn identity(&self) -> (&str, &Cut, bool, &str, ProcessKind) {
        (&self.name, &self.cut, self.count_zeros, self.source.id(), self.kind)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("cut", &self.cut)
            .field("kind", &self.kind)
            .field("count_zeros", &self.count_zeros)
            .field("source", &self.source.id())
            .finish()
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process::{}(cut={})", self.name, self.cut)
    }
}

impl PartialEq for Process {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Process {}

impl PartialOrd for Process {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Process {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}
