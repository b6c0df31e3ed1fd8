//! Weighted-Poisson count estimates.
//!
//! A sum of weighted Monte-Carlo events is summarized by an effective event
//! count `n` and an effective per-event weight `w`: the yield is `n·w` and
//! its variance `n·w²`, the gamma-function approximation for weighted Poisson
//! statistics. Keeping `(n, w)` instead of `(yield, uncertainty)` preserves
//! the statistical power of the underlying sample through luminosity
//! rescaling: scaling multiplies the weight and leaves `n` untouched.

use std::fmt;
use std::iter::Sum;
use std::ops;

use serde::{Deserialize, Serialize};

/// A count estimate with weighted-Poisson uncertainty semantics.
///
/// Invariants: `n_effective ≥ 0` and `weight ≥ 0`; a zero effective count
/// means a zero yield regardless of the weight, so "zero events but known
/// per-event weight" is representable and survives addition and scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GammaParams {
    n_effective: f64,
    weight: f64,
}

impl GammaParams {
    /// Create from an effective count and per-event weight.
    pub fn new(n_effective: f64, weight: f64) -> Self {
        GammaParams { n_effective, weight }
    }

    /// Create from a yield and its absolute uncertainty by back-solving an
    /// equivalent `(n, w)` pair. See [`set_value_and_uncertainty`].
    ///
    /// [`set_value_and_uncertainty`]: GammaParams::set_value_and_uncertainty
    pub fn from_value_and_uncertainty(value: f64, uncertainty: f64) -> Self {
        let mut gp = GammaParams::default();
        gp.set_value_and_uncertainty(value, uncertainty);
        gp
    }

    /// Effective number of events.
    pub fn n_effective(&self) -> f64 {
        self.n_effective
    }

    /// Effective per-event weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The yield estimate, `n·w`.
    pub fn value(&self) -> f64 {
        self.n_effective * self.weight
    }

    /// The weighted-Poisson uncertainty, `w·√n`.
    pub fn uncertainty(&self) -> f64 {
        self.weight * self.n_effective.sqrt()
    }

    /// The naive `√yield` uncertainty, for estimates without effective-count
    /// tracking.
    pub fn raw_uncertainty(&self) -> f64 {
        self.value().sqrt()
    }

    /// Back-solve `(n, w)` from a yield and absolute uncertainty.
    ///
    /// For a positive yield, `w = u²/y` and `n = y/w` (an unweighted sample,
    /// where `u = √y`, solves to `w = 1` and `n = y`). With no observed
    /// yield there is nothing to estimate a weight from, so the result is
    /// the empty count `(0, 0)`. Never divides by zero: a zero weight forces
    /// `n = 0`.
    pub fn set_value_and_uncertainty(&mut self, value: f64, uncertainty: f64) {
        self.weight = if value > 0.0 { uncertainty * uncertainty / value } else { 0.0 };
        self.n_effective = if self.weight > 0.0 { value / self.weight } else { 0.0 };
    }

    /// Set the effective count and weight directly.
    ///
    /// Used to force "zero events with a known weight" states, which are
    /// distinct from "never observed" (`n = 0`, `w = 0`).
    pub fn set_n_effective_and_weight(&mut self, n_effective: f64, weight: f64) {
        self.n_effective = n_effective;
        self.weight = weight;
    }
}

impl ops::AddAssign for GammaParams {
    /// Add two estimates so that both the yields and the variances are
    /// additive, re-solving an equivalent `(n, w)` pair from the sums.
    ///
    /// When both operands have a zero effective count there is no yield to
    /// merge; the larger carried weight is kept so empty cells do not lose
    /// their weight information during aggregation.
    fn add_assign(&mut self, rhs: GammaParams) {
        if self.n_effective == 0.0 && rhs.n_effective == 0.0 {
            self.weight = self.weight.max(rhs.weight);
        } else {
            let value = self.value() + rhs.value();
            let uncertainty = self.uncertainty().hypot(rhs.uncertainty());
            self.set_value_and_uncertainty(value, uncertainty);
        }
    }
}

impl ops::Add for GammaParams {
    type Output = GammaParams;

    fn add(mut self, rhs: GammaParams) -> GammaParams {
        self += rhs;
        self
    }
}

impl ops::MulAssign<f64> for GammaParams {
    /// Scale the yield by `factor`: the weight scales, the effective count
    /// is unchanged (same underlying events, different normalization).
    fn mul_assign(&mut self, factor: f64) {
        self.weight *= factor;
    }
}

impl ops::Mul<f64> for GammaParams {
    type Output = GammaParams;

    fn mul(mut self, factor: f64) -> GammaParams {
        self *= factor;
        self
    }
}

impl ops::Mul<GammaParams> for f64 {
    type Output = GammaParams;

    fn mul(self, gp: GammaParams) -> GammaParams {
        gp * self
    }
}

impl Sum for GammaParams {
    fn sum<I: Iterator<Item = GammaParams>>(iter: I) -> GammaParams {
        iter.fold(GammaParams::default(), |acc, gp| acc + gp)
    }
}

impl fmt::Display for GammaParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} +- {} (n={}, w={})",
            self.value(),
            self.uncertainty(),
            self.n_effective,
            self.weight
        )
    }
}
