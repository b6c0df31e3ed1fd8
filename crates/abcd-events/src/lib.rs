//! # abcd-events
//!
//! Concrete [`EventSource`](abcd_core::EventSource) implementations and the
//! expression engine they share.
//!
//! An [`EventTable`] holds equal-length `f64` columns in memory and
//! evaluates selection/weight strings over them; an [`EventChain`] strings
//! several sources together the way a multi-file sample is chained on disk.
//! Both return the single-bin weighted projection the yield cache expects:
//! the expression value per event is the weight, the count is `Σw`, and the
//! uncertainty is `√Σw²`.
//!
//! ## Example
//!
//! ```
//! use abcd_core::EventSource;
//! use abcd_events::EventTable;
//!
//! let table = EventTable::new("demo")
//!     .with_column("njets", vec![4.0, 6.0, 7.0])
//!     .unwrap()
//!     .with_column("weight", vec![0.5, 0.5, 1.0])
//!     .unwrap();
//! let (count, _) = table.count_and_uncertainty("weight*(njets>=6)").unwrap();
//! assert_eq!(count, 1.5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod expr;
pub mod table;

pub use chain::EventChain;
pub use expr::SelectionExpr;
pub use table::EventTable;
