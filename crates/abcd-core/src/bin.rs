//! A single cell of an ABCD grid.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cut::Cut;
use crate::error::{Error, Result};
use crate::systematic::Systematic;

/// One cell-defining selection of an ABCD grid, with optional systematic
/// tags consumed by the synthesis layer.
///
/// Identity (equality and ordering) is the triple
/// (name, cut, systematics), each compared lexicographically. Name and cut
/// are whitespace-normalized at construction so textual variants of the same
/// bin collapse to one cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bin {
    name: String,
    cut: Cut,
    systematics: BTreeSet<Systematic>,
}

impl Bin {
    /// Create a bin with no systematics.
    pub fn new(name: impl Into<String>, cut: Cut) -> Self {
        let mut name = name.into();
        name.retain(|c| !c.is_whitespace());
        Bin { name, cut, systematics: BTreeSet::new() }
    }

    /// Replace the systematics set wholesale.
    #[must_use]
    pub fn with_systematics(mut self, systematics: impl IntoIterator<Item = Systematic>) -> Self {
        self.systematics = systematics.into_iter().collect();
        self
    }

    /// The bin name (whitespace-free).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cell-defining selection.
    pub fn cut(&self) -> &Cut {
        &self.cut
    }

    /// The attached systematic tags, in their canonical order.
    pub fn systematics(&self) -> &BTreeSet<Systematic> {
        &self.systematics
    }

    /// Attach a systematic tag. A tag equal to an existing one is a no-op.
    pub fn add_systematic(&mut self, systematic: Systematic) {
        self.systematics.insert(systematic);
    }

    /// Whether an identical tag is attached.
    pub fn has_systematic(&self, systematic: &Systematic) -> bool {
        self.systematics.contains(systematic)
    }

    /// Detach a tag, failing if it is not attached.
    pub fn remove_systematic(&mut self, systematic: &Systematic) -> Result<()> {
        if self.systematics.remove(systematic) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "bin {} does not contain systematic {}",
                self.name,
                systematic.name()
            )))
        }
    }

    /// Re-seat every tag named `name` at the given strength, failing if no
    /// tag with that name is attached.
    pub fn set_systematic_strength(&mut self, name: &str, strength: f64) -> Result<()> {
        let matched: Vec<Systematic> =
            self.systematics.iter().filter(|s| s.name() == name).cloned().collect();
        if matched.is_empty() {
            return Err(Error::Validation(format!(
                "bin {} does not contain systematic {name}",
                self.name
            )));
        }
        for mut systematic in matched {
            self.systematics.remove(&systematic);
            systematic.set_strength(strength);
            self.systematics.insert(systematic);
        }
        Ok(())
    }
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bin::{}(cut={})", self.name, self.cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_normalized() {
        let bin = Bin::new("r1 lowmet", Cut::new("met<=350"));
        assert_eq!(bin.name(), "r1lowmet");
    }

    #[test]
    fn systematic_bookkeeping() {
        let mut bin = Bin::new("r4", Cut::new("met>350"));
        let syst = Systematic::new("dilep_r4", 0.3);
        bin.add_systematic(syst.clone());
        assert!(bin.has_systematic(&syst));

        bin.set_systematic_strength("dilep_r4", 0.5).unwrap();
        assert!(!bin.has_systematic(&syst));
        assert!(bin.has_systematic(&Systematic::new("dilep_r4", 0.5)));

        assert!(bin.set_systematic_strength("missing", 1.0).is_err());
        bin.remove_systematic(&Systematic::new("dilep_r4", 0.5)).unwrap();
        assert!(bin.remove_systematic(&syst).is_err());
    }

    #[test]
    fn identity_includes_systematics() {
        let plain = Bin::new("r1", Cut::new("met<=350"));
        let tagged = plain.clone().with_systematics([Systematic::new("jes", 0.1)]);
        assert_ne!(plain, tagged);
        assert!(plain < tagged);
    }
}
