//! Objective algebra: dominance semantics for a single scored axis.
//!
//! This module does not know about individuals, populations or fronts — it
//! only declares what "no worse" and "strictly better" mean for a pair of
//! scalars under a `Sense`, and what it means for a scalar to satisfy a
//! threshold `Law`. [`crate::nsga2`] builds dominance on top of [`no_worse`]
//! and [`strictly_better`]; [`crate::proof_gate`] builds its checks on top of
//! [`Law::is_satisfied`].

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Direction of optimisation for one objective axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Max,
    Min,
}

/// One scored dimension: a name, a direction, and an optional weight
/// reserved for caller-side tie-breaking. The core never reads the weight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub sense: Sense,
    pub weight: Option<f64>,
}

impl Axis {
    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self { name: name.into(), sense, weight: None }
    }

    pub fn weighted(name: impl Into<String>, sense: Sense, weight: f64) -> Self {
        Self { name: name.into(), sense, weight: Some(weight) }
    }
}

/// True iff `a` is not worse than `b` under `sense`. Equal values are *not
/// worse*: `no_worse(x, x, _) == true` always (reflexive).
#[inline]
pub fn no_worse(a: f64, b: f64, sense: Sense) -> bool {
    match sense {
        Sense::Max => a >= b,
        Sense::Min => a <= b,
    }
}

/// True iff `a` is strictly better than `b` under `sense`. Equal values are
/// never strictly better: `strictly_better(x, x, _) == false` always
/// (irreflexive).
#[inline]
pub fn strictly_better(a: f64, b: f64, sense: Sense) -> bool {
    match sense {
        Sense::Max => a > b,
        Sense::Min => a < b,
    }
}

/// A named threshold rule plus the pure evaluator that produces the value it
/// checks. `evaluate` takes `&T` so the same law shape can be reused whether
/// `T` is `crate::agent::Individual` or a test fixture.
pub struct Law<T> {
    pub name: String,
    pub sense: Sense,
    pub threshold: Option<f64>,
    pub evaluate: Box<dyn Fn(&T) -> f64 + Send + Sync>,
}

impl<T> Law<T> {
    pub fn new(
        name: impl Into<String>,
        sense: Sense,
        threshold: Option<f64>,
        evaluate: impl Fn(&T) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), sense, threshold, evaluate: Box::new(evaluate) }
    }

    /// A value `v` satisfies a `Max` law iff `v >= threshold`; a `Min` law
    /// iff `v <= threshold`. A missing threshold is unconditionally
    /// satisfied.
    pub fn is_satisfied(&self, v: f64) -> bool {
        match self.threshold {
            None => true,
            Some(t) => no_worse(v, t, self.sense),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Invariant 6: reflexivity of no_worse, irreflexivity of strictly_better.
    #[test]
    fn invariant_reflexivity_and_irreflexivity() {
        for sense in [Sense::Max, Sense::Min] {
            for x in [-3.5, 0.0, 2.25] {
                assert!(no_worse(x, x, sense));
                assert!(!strictly_better(x, x, sense));
            }
        }
    }

    // Invariant 7: asymmetry of strictly_better and strictly_better => no_worse.
    #[test]
    fn invariant_asymmetry_and_implication() {
        for sense in [Sense::Max, Sense::Min] {
            let (a, b) = (3.0, 1.0);
            if strictly_better(a, b, sense) {
                assert!(!strictly_better(b, a, sense));
                assert!(no_worse(a, b, sense));
            }
            if strictly_better(b, a, sense) {
                assert!(!strictly_better(a, b, sense));
                assert!(no_worse(b, a, sense));
            }
        }
    }

    #[test]
    fn sense_duality_of_no_worse() {
        let (a, b) = (4.0, 2.0);
        assert_eq!(no_worse(a, b, Sense::Max), no_worse(-a, -b, Sense::Min));
    }

    // S4 — law thresholds.
    #[test]
    fn s4_law_thresholds_max_and_min() {
        let max_law = Law::<f64>::new("max-law", Sense::Max, Some(0.5), |v: &f64| *v);
        assert!(max_law.is_satisfied(0.6));
        assert!(max_law.is_satisfied(0.5));
        assert!(!max_law.is_satisfied(0.4));

        let min_law = Law::<f64>::new("min-law", Sense::Min, Some(1.0), |v: &f64| *v);
        assert!(min_law.is_satisfied(0.8));
        assert!(min_law.is_satisfied(1.0));
        assert!(!min_law.is_satisfied(1.2));
    }

    #[test]
    fn law_without_threshold_is_unconditionally_satisfied() {
        let law = Law::<f64>::new("no-threshold", Sense::Max, None, |v: &f64| *v);
        assert!(law.is_satisfied(-1000.0));
        assert!(law.is_satisfied(1000.0));
    }
}
