//! Textual selection expressions.
//!
//! A [`Cut`] is an opaque expression string over event-level quantities,
//! combined with other cuts purely at the text level. Every combination
//! parenthesizes both operands, so operator precedence in the downstream
//! evaluator can never regroup what the caller wrote. The only normalization
//! performed is whitespace removal; no algebraic simplification happens, and
//! repeated combination grows the string linearly.

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

/// A selection/weight expression.
///
/// Equality, ordering, and hashing are all by the normalized text, so `Cut`
/// works directly as an ordered-map key.
///
/// # Example
///
/// ```
/// use abcd_core::Cut;
///
/// let sel = Cut::new("njets >= 6") & Cut::new("met > 200");
/// assert_eq!(sel.as_str(), "(njets>=6)&&(met>200)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cut {
    text: String,
}

impl Cut {
    /// Create a cut from an expression string, stripping all whitespace.
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        text.retain(|c| !c.is_whitespace());
        Cut { text }
    }

    /// The normalized expression text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether this cut is the tautology `"1"`.
    pub fn is_trivial(&self) -> bool {
        self.text == "1"
    }

    /// Replace every non-overlapping occurrence of `from` with `to`,
    /// scanning left to right.
    #[must_use]
    pub fn replace(&self, from: &Cut, to: &Cut) -> Cut {
        Cut::new(self.text.replace(&from.text, &to.text))
    }

    /// Remove each occurrence of `target` together with the text up to the
    /// next delimiter among `)`, `&`, `|`, or space, substituting
    /// `replacement` (typically `"1"`).
    ///
    /// This is a token-level splice, not a parse: the caller must ensure
    /// `target` is aligned with a full sub-clause, otherwise the trailing
    /// remainder of a longer token is clipped too.
    #[must_use]
    pub fn rm_cut_on(&self, target: &Cut, replacement: &Cut) -> Cut {
        if target.text.is_empty() {
            return self.clone();
        }
        let mut text = self.text.clone();
        let rep = replacement.as_str();
        let mut from = 0;
        while let Some(loc) = text[from..].find(&target.text).map(|i| i + from) {
            let end = text[loc..]
                .find([')', '&', '|', ' '])
                .map(|i| i + loc)
                .unwrap_or(text.len());
            text.replace_range(loc..end, rep);
            from = loc + rep.len();
        }
        Cut::new(text)
    }

    fn combine(self, op: &str, other: Cut) -> Cut {
        Cut::new(format!("({}){}({})", self.text, op, other.text))
    }
}

impl Default for Cut {
    /// The tautology `"1"`.
    fn default() -> Self {
        Cut::new("1")
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Cut {
    fn from(text: &str) -> Self {
        Cut::new(text)
    }
}

impl From<String> for Cut {
    fn from(text: String) -> Self {
        Cut::new(text)
    }
}

/// Implements a binary combinator and its assign form for [`Cut`].
///
/// `&`/`|` render as the logical `&&`/`||` of the expression language; the
/// arithmetic operators render as themselves. `<<` and `>>` are unassigned
/// in the expression language and are kept as generic analysis-specific
/// slots (historically scale-factor chaining).
macro_rules! cut_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:literal) => {
        impl ops::$trait for Cut {
            type Output = Cut;

            fn $method(self, rhs: Cut) -> Cut {
                self.combine($op, rhs)
            }
        }

        impl ops::$assign_trait for Cut {
            fn $assign_method(&mut self, rhs: Cut) {
                *self = self.clone().combine($op, rhs);
            }
        }
    };
}

cut_binop!(BitAnd, bitand, BitAndAssign, bitand_assign, "&&");
cut_binop!(BitOr, bitor, BitOrAssign, bitor_assign, "||");
cut_binop!(Add, add, AddAssign, add_assign, "+");
cut_binop!(Sub, sub, SubAssign, sub_assign, "-");
cut_binop!(Mul, mul, MulAssign, mul_assign, "*");
cut_binop!(Div, div, DivAssign, div_assign, "/");
cut_binop!(Rem, rem, RemAssign, rem_assign, "%");
cut_binop!(BitXor, bitxor, BitXorAssign, bitxor_assign, "^");
cut_binop!(Shl, shl, ShlAssign, shl_assign, "<<");
cut_binop!(Shr, shr, ShrAssign, shr_assign, ">>");
