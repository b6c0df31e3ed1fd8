//! Luminosity weighting policies for event-source queries.
//!
//! Every cache computation prefixes its selection with a luminosity×weight
//! term so simulated yields come back normalized to the requested
//! luminosity. Analysis-specific corrections to that term (simulation
//! mismodeling fixes, trigger-era scale factors) are injected through
//! [`LumiWeightPolicy`] so the cache itself stays a generic memoizing
//! aggregator.

use crate::cut::Cut;
use crate::process::Process;

/// Produces the weight expression prepended to every query for `process`
/// at the given luminosity.
pub trait LumiWeightPolicy: Send + Sync {
    /// The weight expression. Observed data gets the trivial cut; data
    /// yields are counts, not rates.
    fn lumi_weight(&self, process: &Process, luminosity: f64) -> Cut;
}

/// Plain `lumi*weight` scaling with no shape correction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatLumiWeight;

impl LumiWeightPolicy for FlatLumiWeight {
    fn lumi_weight(&self, process: &Process, luminosity: f64) -> Cut {
        if process.is_data() {
            Cut::default()
        } else {
            Cut::new(format!("{luminosity}*weight"))
        }
    }
}

/// `lumi*weight` with a jet-multiplicity correction for simulated
/// background above a luminosity threshold.
///
/// The correction multiplies a per-njets factor into the weight of
/// background simulation (signal is left alone, keyed on `mgluino>0`) to
/// absorb a known jet-multiplicity mismodeling. The factor table is frozen;
/// swap in [`FlatLumiWeight`] to disable the correction.
#[derive(Debug, Clone, Copy)]
pub struct JetBinReweight {
    threshold: f64,
}

impl JetBinReweight {
    /// Correction applies above this luminosity.
    pub const DEFAULT_THRESHOLD: f64 = 3.0;

    /// Create a policy with the given activation threshold.
    pub fn new(threshold: f64) -> Self {
        JetBinReweight { threshold }
    }
}

impl Default for JetBinReweight {
    fn default() -> Self {
        JetBinReweight::new(Self::DEFAULT_THRESHOLD)
    }
}

impl LumiWeightPolicy for JetBinReweight {
    fn lumi_weight(&self, process: &Process, luminosity: f64) -> Cut {
        if process.is_data() {
            return Cut::default();
        }
        if process.is_signal() || luminosity <= self.threshold {
            return Cut::new(format!("{luminosity}*weight"));
        }
        Cut::new(format!(
            "{luminosity}*weight*((mgluino>0)+(mgluino<0)*((njets<=4)*1.0\
             +(njets==5)*0.867+(njets==6)*0.919+(njets==7)*0.734\
             +(njets==8)*0.648+(njets==9)*0.607+(njets>=10)*0.642))"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessKind;
    use crate::traits::EventSource;
    use crate::Result;
    use std::sync::Arc;

    struct NullSource;

    impl EventSource for NullSource {
        fn id(&self) -> &str {
            "null"
        }

        fn entries(&self) -> u64 {
            0
        }

        fn count_and_uncertainty(&self, _expression: &str) -> Result<(f64, f64)> {
            Ok((0.0, 0.0))
        }
    }

    fn process(kind: ProcessKind) -> Process {
        Process::new("p", kind, Arc::new(NullSource))
    }

    #[test]
    fn data_gets_trivial_weight() {
        let policy = JetBinReweight::default();
        assert!(policy.lumi_weight(&process(ProcessKind::Data), 10.0).is_trivial());
        assert!(FlatLumiWeight.lumi_weight(&process(ProcessKind::Data), 10.0).is_trivial());
    }

    #[test]
    fn flat_weight_carries_luminosity() {
        let cut = FlatLumiWeight.lumi_weight(&process(ProcessKind::Background), 2.5);
        assert_eq!(cut.as_str(), "2.5*weight");
    }

    #[test]
    fn background_above_threshold_gets_njets_factors() {
        let policy = JetBinReweight::default();
        let cut = policy.lumi_weight(&process(ProcessKind::Background), 4.0);
        assert!(cut.as_str().starts_with("4*weight*((mgluino>0)"));
        assert!(cut.as_str().contains("(njets==6)*0.919"));

        let below = policy.lumi_weight(&process(ProcessKind::Background), 2.0);
        assert_eq!(below.as_str(), "2*weight");
    }

    #[test]
    fn signal_is_never_corrected() {
        let policy = JetBinReweight::default();
        let cut = policy.lumi_weight(&process(ProcessKind::Signal), 4.0);
        assert_eq!(cut.as_str(), "4*weight");
    }
}
