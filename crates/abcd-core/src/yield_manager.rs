//! Memoizing yield cache with luminosity rescaling.
//!
//! Yields are expensive: each one is an event-source scan. They are also
//! highly shared: the same (bin, process, cut) triple is requested by every
//! grid, synthesis pass, and toy worker that touches the region. The cache
//! therefore computes each key exactly once per [`YieldStore`], at a fixed
//! reference luminosity, and rescales on retrieval.
//!
//! # Design decisions
//!
//! - **Key**: the full [`YieldKey`] triple in a `BTreeMap`. Iteration is
//!   deterministic, and the key types already carry a strict total order.
//! - **Storage normalization**: values are stored at the store's reference
//!   luminosity regardless of which luminosity the first requester asked
//!   for; retrieval multiplies by `requested/reference`. Observed data is
//!   stored and returned unscaled.
//! - **Thread-safety**: one short-lived lock around the slot map plus one
//!   `Mutex<Option<_>>` per key. At most one computation per key ever runs;
//!   concurrent requesters for the same key block on the slot until the
//!   first computation lands. Entries are append-only and never invalidated.
//! - **Scope**: per-`YieldStore` instance, shared via `Arc`. No global
//!   state, so tests and independent runs get independent caches.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bin::Bin;
use crate::cut::Cut;
use crate::error::Result;
use crate::gamma_params::GammaParams;
use crate::process::Process;
use crate::reweight::{JetBinReweight, LumiWeightPolicy};
use crate::yield_key::YieldKey;

/// How to proceed when the full selection yields nothing.
///
/// Some processes have zero simulated events passing the tightest selection
/// while the caller still needs a best-effort per-event weight for
/// normalization. The stepwise chain serves that need; the strict variant is
/// for analyses that prefer an honest zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Try progressively looser selections until one returns a positive
    /// weight: full selection, then without the bin cut, then the process
    /// cut alone, then the luminosity weight alone, then the tautology.
    #[default]
    LoosenStepwise,
    /// Query the full selection only and keep whatever it returns.
    NeverLoosen,
}

impl FallbackPolicy {
    /// The ordered candidate selections for one computation, tightest
    /// first.
    fn candidates(
        &self,
        cut: &Cut,
        bin_cut: &Cut,
        process_cut: &Cut,
        lumi_weight: &Cut,
    ) -> Vec<Cut> {
        let tightest =
            lumi_weight.clone() * (cut.clone() & bin_cut.clone() & process_cut.clone());
        match self {
            FallbackPolicy::LoosenStepwise => vec![
                tightest,
                lumi_weight.clone() * (cut.clone() & process_cut.clone()),
                lumi_weight.clone() * process_cut.clone(),
                lumi_weight.clone(),
                Cut::default(),
            ],
            FallbackPolicy::NeverLoosen => vec![tightest],
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Number of keys present (including computations in flight).
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that triggered a computation.
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a fraction [0.0, 1.0].
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

#[derive(Default)]
struct Slot {
    value: Mutex<Option<GammaParams>>,
}

/// The shared, append-only yield cache.
///
/// One store per run (or per test); hand `Arc<YieldStore>` to every
/// [`YieldManager`] that needs yields. All values are held at the store's
/// reference luminosity.
pub struct YieldStore {
    reference_lumi: f64,
    slots: Mutex<BTreeMap<YieldKey, Arc<Slot>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    lumi_weight: Box<dyn LumiWeightPolicy>,
    fallback: FallbackPolicy,
}

impl YieldStore {
    /// Reference luminosity used when none is specified.
    pub const DEFAULT_REFERENCE_LUMINOSITY: f64 = 4.0;

    /// Create a store with the default policies (jet-bin reweighting,
    /// stepwise loosening).
    pub fn new(reference_lumi: f64) -> Self {
        Self::with_policies(
            reference_lumi,
            Box::new(JetBinReweight::default()),
            FallbackPolicy::default(),
        )
    }

    /// Create a store with explicit weighting and fallback policies.
    pub fn with_policies(
        reference_lumi: f64,
        lumi_weight: Box<dyn LumiWeightPolicy>,
        fallback: FallbackPolicy,
    ) -> Self {
        assert!(reference_lumi > 0.0, "reference luminosity must be positive");
        YieldStore {
            reference_lumi,
            slots: Mutex::new(BTreeMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            lumi_weight,
            fallback,
        }
    }

    /// The luminosity all cached values are normalized to.
    pub fn reference_luminosity(&self) -> f64 {
        self.reference_lumi
    }

    /// Whether a computed value for `key` is present.
    pub fn contains(&self, key: &YieldKey) -> bool {
        let slot = match self.slots.lock().unwrap().get(key) {
            Some(slot) => Arc::clone(slot),
            None => return false,
        };
        slot.value.lock().unwrap().is_some()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.slots.lock().unwrap().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// The cached value for `key` at the reference luminosity, computing it
    /// if absent. Concurrent callers for the same key block until the one
    /// computation finishes.
    fn yield_at_reference(&self, key: &YieldKey, request_lumi: f64) -> Result<GammaParams> {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let mut value = slot.value.lock().unwrap();
        if let Some(cached) = *value {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = self.compute(key, request_lumi)?;
        *value = Some(computed);
        Ok(computed)
    }

    /// Compute the yield for `key`, normalized to the reference luminosity.
    fn compute(&self, key: &YieldKey, request_lumi: f64) -> Result<GammaParams> {
        let process = key.process();
        let mut gps = GammaParams::default();

        if process.entries() == 0 {
            log::debug!("no entries for {key}");
        } else {
            let lumi_weight = self.lumi_weight.lumi_weight(process, request_lumi);
            let candidates =
                self.fallback.candidates(key.cut(), key.bin().cut(), process.cut(), &lumi_weight);
            for (icut, candidate) in candidates.iter().enumerate() {
                if gps.weight() > 0.0 {
                    break;
                }
                if icut > 0 && !process.count_zeros() {
                    gps.set_n_effective_and_weight(0.0, 0.0);
                    break;
                }
                if icut > 0 {
                    log::debug!("empty selection for {key}; loosening to {candidate}");
                }
                let temp = process.get_yield(candidate)?;
                if icut == 0 {
                    gps = temp;
                } else {
                    // Looser selections only contribute a weight estimate,
                    // never a yield.
                    gps.set_n_effective_and_weight(0.0, temp.weight());
                }
            }
        }

        log::debug!("computed {key}: {gps}");
        let factor =
            if process.is_data() { 1.0 } else { self.reference_lumi / request_lumi };
        Ok(gps * factor)
    }
}

/// A luminosity-specific view of a [`YieldStore`].
///
/// Cheap to clone and to construct; managers differ only in the luminosity
/// they rescale retrieved yields to.
#[derive(Clone)]
pub struct YieldManager {
    store: Arc<YieldStore>,
    luminosity: f64,
}

impl YieldManager {
    /// Create a view rescaling to `luminosity`.
    pub fn new(store: Arc<YieldStore>, luminosity: f64) -> Self {
        assert!(luminosity > 0.0, "luminosity must be positive");
        YieldManager { store, luminosity }
    }

    /// The luminosity yields are rescaled to on retrieval.
    pub fn luminosity(&self) -> f64 {
        self.luminosity
    }

    /// Change the retrieval luminosity. Cached values are untouched; only
    /// the rescaling factor changes.
    pub fn set_luminosity(&mut self, luminosity: f64) {
        assert!(luminosity > 0.0, "luminosity must be positive");
        self.luminosity = luminosity;
    }

    /// The shared store behind this view.
    pub fn store(&self) -> &Arc<YieldStore> {
        &self.store
    }

    /// The yield for `key`, rescaled to this manager's luminosity.
    /// Observed data is returned as stored, independent of luminosity.
    pub fn get_yield(&self, key: &YieldKey) -> Result<GammaParams> {
        let stored = self.store.yield_at_reference(key, self.luminosity)?;
        let factor = if key.process().is_data() {
            1.0
        } else {
            self.luminosity / self.store.reference_luminosity()
        };
        Ok(stored * factor)
    }

    /// Convenience form of [`get_yield`](YieldManager::get_yield).
    pub fn get(&self, bin: &Bin, process: &Process, cut: &Cut) -> Result<GammaParams> {
        self.get_yield(&YieldKey::new(bin.clone(), process.clone(), cut.clone()))
    }
}
