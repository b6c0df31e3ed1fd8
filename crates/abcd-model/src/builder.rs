//! The model-builder seam.
//!
//! The synthesis layer does not construct pdfs itself; it emits a stream of
//! typed factory commands that an external statistical-modeling backend
//! turns into a likelihood. [`FactoryCall`] is the command vocabulary and
//! [`ModelBuilder`] the single entry point a backend implements.

use abcd_core::Result;
use serde::{Deserialize, Serialize};

/// One synthesized model element.
///
/// Names are globally unique within a synthesis run; later calls may refer
/// to earlier ones by name (in `terms`, `factors`, and `arguments`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactoryCall {
    /// An observed count, fixed at its measured value.
    Observed {
        /// Element name.
        name: String,
        /// Observed value.
        value: f64,
    },
    /// A constant.
    Constant {
        /// Element name.
        name: String,
        /// Fixed value.
        value: f64,
    },
    /// A free parameter with an initial value and bounds.
    Parameter {
        /// Element name.
        name: String,
        /// Initial value.
        value: f64,
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },
    /// A sum of previously defined elements. Terms may also be numeric
    /// literals such as `"1."`.
    Sum {
        /// Element name.
        name: String,
        /// Summands, by name or literal.
        terms: Vec<String>,
    },
    /// A product of previously defined elements.
    Product {
        /// Element name.
        name: String,
        /// Factors, by name.
        factors: Vec<String>,
    },
    /// A generic formula over previously defined elements.
    Formula {
        /// Element name.
        name: String,
        /// Expression text referencing the arguments by name.
        expression: String,
        /// Names of the referenced elements.
        arguments: Vec<String>,
    },
}

impl FactoryCall {
    /// The element name this call defines.
    pub fn name(&self) -> &str {
        match self {
            FactoryCall::Observed { name, .. }
            | FactoryCall::Constant { name, .. }
            | FactoryCall::Parameter { name, .. }
            | FactoryCall::Sum { name, .. }
            | FactoryCall::Product { name, .. }
            | FactoryCall::Formula { name, .. } => name,
        }
    }
}

/// A backend that accepts synthesized model elements.
pub trait ModelBuilder {
    /// Register one element. Implementations may fail on duplicate names or
    /// unresolvable references.
    fn add(&mut self, call: FactoryCall) -> Result<()>;
}

/// A [`ModelBuilder`] that records every call, for tests and for dumping
/// synthesized model content as JSON.
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    calls: Vec<FactoryCall>,
}

impl RecordingBuilder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received, in order.
    pub fn calls(&self) -> &[FactoryCall] {
        &self.calls
    }

    /// The first call defining `name`, if any.
    pub fn find(&self, name: &str) -> Option<&FactoryCall> {
        self.calls.iter().find(|c| c.name() == name)
    }

    /// Serialize the recorded calls as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.calls)?)
    }
}

impl ModelBuilder for RecordingBuilder {
    fn add(&mut self, call: FactoryCall) -> Result<()> {
        self.calls.push(call);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_and_lookup() {
        let mut builder = RecordingBuilder::new();
        builder.add(FactoryCall::Parameter { name: "r".into(), value: 1.0, lo: 0.0, hi: 20.0 })
            .unwrap();
        builder
            .add(FactoryCall::Sum { name: "s".into(), terms: vec!["1.".into(), "r".into()] })
            .unwrap();

        assert_eq!(builder.calls().len(), 2);
        assert!(matches!(builder.find("r"), Some(FactoryCall::Parameter { hi, .. }) if *hi == 20.0));
        assert!(builder.find("missing").is_none());
    }

    #[test]
    fn json_round_trip_tags_by_type() {
        let call = FactoryCall::Formula {
            name: "rscale".into(),
            expression: "norm/rnorm".into(),
            arguments: vec!["norm".into(), "rnorm".into()],
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"type\":\"formula\""));
        let back: FactoryCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
