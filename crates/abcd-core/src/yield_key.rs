//! The structural key of the yield cache.

use std::fmt;

use crate::bin::Bin;
use crate::cut::Cut;
use crate::process::Process;

/// A (bin, process, cut) triple identifying one cached yield.
///
/// Ordering is componentwise lexicographic over the three parts, so the key
/// works directly in ordered maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct YieldKey {
    bin: Bin,
    process: Process,
    cut: Cut,
}

impl YieldKey {
    /// Assemble a key.
    pub fn new(bin: Bin, process: Process, cut: Cut) -> Self {
        YieldKey { bin, process, cut }
    }

    /// The grid cell.
    pub fn bin(&self) -> &Bin {
        &self.bin
    }

    /// The sample.
    pub fn process(&self) -> &Process {
        &self.process
    }

    /// The aggregation selection.
    pub fn cut(&self) -> &Cut {
        &self.cut
    }
}

impl fmt::Display for YieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YieldKey({},{},{})", self.bin, self.process, self.cut)
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

    #[test]
    fn ordering_is_bin_then_process_then_cut() {
        let src: Arc<dyn EventSource> = Arc::new(NullSource);
        let p = Process::new("p", ProcessKind::Background, src);
        let key = |bin: &str, cut: &str| {
            YieldKey::new(Bin::new(bin, Cut::new(bin)), p.clone(), Cut::new(cut))
        };

        assert!(key("a", "1") < key("b", "1"));
        assert!(key("a", "1") < key("a", "2"));
        assert_eq!(key("a", "1"), key("a", "1"));
    }
}
