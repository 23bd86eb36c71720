//! Hilbert-space kernel: complex-vector algebra over a finite-dimensional
//! inner-product space.
//!
//! Every individual's perception state is a [`State`] — a finite sequence of
//! [`Complex`] scalars. This module is the only place that manipulates that
//! sequence numerically: norm, normalisation, inner product, distance,
//! consensus averaging ("spectral sync", used as the crossover operator),
//! a privacy-preserving projection, an energy functional, and a randomised
//! stability probe.
//!
//! # Invariants
//! - All state-valued operations preserve dimension. Operations that combine
//!   two states of unequal dimension return [`HilbertError::DimensionMismatch`]
//!   rather than panicking or silently truncating.
//! - NaN/Inf are not trapped: they propagate exactly as IEEE 754 arithmetic
//!   dictates. Callers that care must screen their own inputs.

#![forbid(unsafe_code)]

use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// A complex scalar `(re, im)` of double-precision reals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub const ZERO: Complex = Complex::new(0.0, 0.0);

    #[inline]
    pub fn magnitude(self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

impl std::ops::Add for Complex {
    type Output = Complex;
    #[inline]
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl std::ops::Sub for Complex {
    type Output = Complex;
    #[inline]
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

/// Shape errors raised by the kernel when operands disagree on dimension.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HilbertError {
    #[error("state dimension mismatch: {a} vs {b}")]
    DimensionMismatch { a: usize, b: usize },
}

/// A finite ordered sequence of complex scalars: the state of one individual.
///
/// The empty sequence is a legal state and acts as the identity element for
/// [`spectral_sync`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State(pub Vec<Complex>);

impl State {
    /// `n` complex zeros.
    pub fn zero(n: usize) -> Self {
        State(vec![Complex::ZERO; n])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Σᵢ (reᵢ² + imᵢ²)`. Always finite for finite input, never negative.
    pub fn norm_sq(&self) -> f64 {
        self.0.iter().map(|c| c.re * c.re + c.im * c.im).sum()
    }

    /// `√ norm_sq`.
    pub fn norm(&self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// Below this threshold a state is treated as numerically zero and
    /// [`State::normalise`] returns the zero vector rather than dividing.
    pub const NORM_EPSILON: f64 = 1e-12;

    /// Scalar-divide every component by the norm; the zero vector if the norm
    /// is below [`State::NORM_EPSILON`]. Idempotent up to floating-point
    /// tolerance.
    pub fn normalise(&self) -> State {
        let n = self.norm();
        if n < Self::NORM_EPSILON {
            return State::zero(self.len());
        }
        State(self.0.iter().map(|c| Complex::new(c.re / n, c.im / n)).collect())
    }

    fn sub_checked(&self, other: &State) -> Result<State, HilbertError> {
        require_equal_dim(self, other)?;
        Ok(State(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| *a - *b)
                .collect(),
        ))
    }
}

fn require_equal_dim(a: &State, b: &State) -> Result<(), HilbertError> {
    if a.len() != b.len() {
        return Err(HilbertError::DimensionMismatch { a: a.len(), b: b.len() });
    }
    Ok(())
}

/// `Σᵢ (aᵢ)* bᵢ`: real part `aᵢ.re·bᵢ.re + aᵢ.im·bᵢ.im`, imaginary part
/// `aᵢ.re·bᵢ.im − aᵢ.im·bᵢ.re`. Conjugate-symmetric:
/// `inner_product(a,b) == conj(inner_product(b,a))`.
pub fn inner_product(a: &State, b: &State) -> Result<Complex, HilbertError> {
    require_equal_dim(a, b)?;
    let mut re = 0.0;
    let mut im = 0.0;
    for (x, y) in a.0.iter().zip(b.0.iter()) {
        re += x.re * y.re + x.im * y.im;
        im += x.re * y.im - x.im * y.re;
    }
    Ok(Complex::new(re, im))
}

/// `norm(a − b)`. Non-negative, symmetric, zero iff `a == b` componentwise.
pub fn distance(a: &State, b: &State) -> Result<f64, HilbertError> {
    Ok(a.sub_checked(b)?.norm())
}

/// Componentwise perturbation: every real/imaginary part of `x` is shifted by
/// an independent uniform draw in `[target_level ≥ len(x) ? full state :
/// truncated state]`, per the `privacy_projection` contract below.
///
/// If `target >= x.len()`, every component of `x` is kept and perturbed by
/// independent uniform noise in `[-sigma, +sigma]` per real/imaginary part.
/// Otherwise only the first `target` components survive (perturbed the same
/// way); the rest are discarded.
pub fn privacy_projection(x: &State, target: usize, sigma: f64, rng: &mut Rng) -> State {
    let keep = if target >= x.len() { x.len() } else { target };
    let mut out = Vec::with_capacity(keep);
    for c in x.0.iter().take(keep) {
        let re = c.re + rng.uniform(-sigma, sigma);
        let im = c.im + rng.uniform(-sigma, sigma);
        out.push(Complex::new(re, im));
    }
    State(out)
}

/// Consensus average ("spectral sync"): componentwise arithmetic mean across
/// all inputs (equal dimension required), then normalised.
///
/// Empty input returns the empty state. For a single input `[s]` this equals
/// `normalise(s)`.
pub fn spectral_sync(states: &[State]) -> Result<State, HilbertError> {
    let Some(first) = states.first() else {
        return Ok(State(Vec::new()));
    };
    let dim = first.len();
    for s in states {
        require_equal_dim(first, s)?;
    }
    let n = states.len() as f64;
    let mut acc = vec![Complex::ZERO; dim];
    for s in states {
        for (a, c) in acc.iter_mut().zip(s.0.iter()) {
            *a = *a + *c;
        }
    }
    for a in acc.iter_mut() {
        *a = Complex::new(a.re / n, a.im / n);
    }
    Ok(State(acc).normalise())
}

/// Population variance of a slice of reals (mean-square deviation from mean,
/// divided by `n`). Returns `0.0` for empty or singleton input.
fn variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    xs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / xs.len() as f64
}

/// `|‖x‖ − 1| + 0.1 · variance(|xᵢ|)`. Non-negative; the engine's proxy for
/// "how far this state is from a well-conditioned unit-energy configuration".
/// Lower is better.
pub fn learning_energy(x: &State) -> f64 {
    let magnitudes: Vec<f64> = x.0.iter().map(|c| c.magnitude()).collect();
    (x.norm() - 1.0).abs() + 0.1 * variance(&magnitudes)
}

/// Randomised local-stability probe: draw 10 perturbations within an
/// `epsilon`-ball and check whether any of them has strictly lower energy
/// than the base state. Returns `false` (unstable) as soon as one does;
/// `true` otherwise.
///
/// This is a hint, not a proof — the probe is randomised and can yield false
/// negatives (reporting instability when a larger sample would not have
/// found a lower-energy neighbour), but never fabricates stability it did
/// not observe.
pub fn is_stable(x: &State, epsilon: f64, rng: &mut Rng) -> bool {
    let base_energy = learning_energy(x);
    for _ in 0..10 {
        let half = epsilon / 2.0;
        let perturbed: Vec<Complex> = x
            .0
            .iter()
            .map(|c| Complex::new(c.re + rng.uniform(-half, half), c.im + rng.uniform(-half, half)))
            .collect();
        let perturbed_energy = learning_energy(&State(perturbed));
        if perturbed_energy < base_energy {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(pairs: &[(f64, f64)]) -> State {
        State(pairs.iter().map(|&(re, im)| Complex::new(re, im)).collect())
    }

    // S1 — norm.
    #[test]
    fn s1_norm_of_3_4_pair() {
        let x = s(&[(3.0, 0.0), (4.0, 0.0)]);
        assert!((x.norm() - 5.0).abs() < 1e-9);
    }

    // S2 — normalised dual components.
    #[test]
    fn s2_normalised_dual_components() {
        let x = s(&[(1.0, 0.0), (0.0, 1.0)]);
        let n = x.normalise();
        assert!((n.norm() - 1.0).abs() < 1e-9);
        let ip = inner_product(&n, &n).unwrap();
        assert!((ip.re - 1.0).abs() < 1e-9);
        assert!(ip.im.abs() < 1e-9);
    }

    // S3 — consensus average.
    #[test]
    fn s3_consensus_average_of_two_scalars() {
        let a = s(&[(1.0, 0.0)]);
        let b = s(&[(3.0, 0.0)]);
        let avg = spectral_sync(&[a, b]).unwrap();
        assert!((avg.0[0].re - 1.0).abs() < 1e-9);
        assert!(avg.0[0].im.abs() < 1e-9);
    }

    #[test]
    fn spectral_sync_single_input_equals_normalise() {
        let x = s(&[(2.0, -1.0), (0.0, 3.0)]);
        let synced = spectral_sync(&[x.clone()]).unwrap();
        let normalised = x.normalise();
        assert!(distance(&synced, &normalised).unwrap() < 1e-9);
    }

    #[test]
    fn spectral_sync_empty_is_empty() {
        let out = spectral_sync(&[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_fatal_to_the_operation() {
        let a = s(&[(1.0, 0.0)]);
        let b = s(&[(1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(
            inner_product(&a, &b).unwrap_err(),
            HilbertError::DimensionMismatch { a: 1, b: 2 }
        );
        assert!(distance(&a, &b).is_err());
        assert!(spectral_sync(&[a, b]).is_err());
    }

    // Invariant 1: norm >= 0, and norm < eps iff every component ~zero.
    #[test]
    fn invariant_norm_nonnegative_and_zero_iff_components_zero() {
        let zero = State::zero(4);
        assert!(zero.norm() >= 0.0);
        assert!(zero.norm() < 1e-10);

        let nonzero = s(&[(1e-3, 0.0)]);
        assert!(nonzero.norm() >= 1e-10);
    }

    // Invariant 2: triangle inequality for norm of a sum.
    #[test]
    fn invariant_norm_triangle_inequality() {
        let a = s(&[(1.0, 2.0), (-3.0, 0.5)]);
        let b = s(&[(0.5, -1.0), (2.0, 2.0)]);
        let sum = State(a.0.iter().zip(b.0.iter()).map(|(x, y)| *x + *y).collect());
        assert!(sum.norm() <= a.norm() + b.norm() + 1e-9);
    }

    // Invariant 3: normalise produces unit norm and is idempotent.
    #[test]
    fn invariant_normalise_unit_norm_and_idempotent() {
        let x = s(&[(3.0, 4.0), (1.0, -1.0)]);
        let n1 = x.normalise();
        assert!((n1.norm() - 1.0).abs() < 1e-10);
        let n2 = n1.normalise();
        assert!(distance(&n1, &n2).unwrap() < 1e-10);
    }

    // Invariant 4: conjugate symmetry and Cauchy-Schwarz.
    #[test]
    fn invariant_inner_product_conjugate_symmetric_and_cauchy_schwarz() {
        let a = s(&[(1.0, 2.0), (-1.0, 0.0)]);
        let b = s(&[(0.5, -0.5), (2.0, 1.0)]);
        let ab = inner_product(&a, &b).unwrap();
        let ba = inner_product(&b, &a).unwrap();
        assert!((ab.re - ba.re).abs() < 1e-9);
        assert!((ab.im + ba.im).abs() < 1e-9);

        let lhs = ab.re * ab.re + ab.im * ab.im;
        let rhs = a.norm_sq() * b.norm_sq();
        assert!(lhs <= rhs + 1e-9);
    }

    // Invariant 5: distance is a metric (triangle inequality, symmetry, zero on diagonal).
    #[test]
    fn invariant_distance_is_a_metric() {
        let a = s(&[(1.0, 0.0)]);
        let b = s(&[(0.0, 1.0)]);
        let c = s(&[(-1.0, -1.0)]);
        let d_ac = distance(&a, &c).unwrap();
        let d_ab = distance(&a, &b).unwrap();
        let d_bc = distance(&b, &c).unwrap();
        assert!(d_ac <= d_ab + d_bc + 1e-9);
        assert!((distance(&a, &b).unwrap() - distance(&b, &a).unwrap()).abs() < 1e-12);
        assert!(distance(&a, &a).unwrap() < 1e-10);
    }

    #[test]
    fn learning_energy_is_nonnegative() {
        let x = s(&[(1.0, 0.0), (0.0, 1.0), (0.5, 0.5)]);
        assert!(learning_energy(&x) >= 0.0);
    }

    #[test]
    fn is_stable_returns_true_at_a_local_minimum_of_energy_often() {
        // A state already at unit norm with equal-magnitude components sits at
        // (close to) a local minimum of `learning_energy`; the probe should not
        // trivially find a strictly lower neighbour given a small epsilon.
        let x = State(vec![Complex::new(1.0 / 2f64.sqrt(), 0.0), Complex::new(0.0, 1.0 / 2f64.sqrt())]);
        let mut rng = Rng::seeded(42);
        // Not asserted as always-true (the probe is randomised): just exercise it.
        let _ = is_stable(&x, 1e-6, &mut rng);
    }

    #[test]
    fn privacy_projection_truncates_when_target_is_smaller() {
        let x = s(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let mut rng = Rng::seeded(3);
        let projected = privacy_projection(&x, 1, 0.0, &mut rng);
        assert_eq!(projected.len(), 1);
    }

    #[test]
    fn privacy_projection_keeps_all_when_target_covers_full_state() {
        let x = s(&[(1.0, 1.0), (2.0, 2.0)]);
        let mut rng = Rng::seeded(3);
        let projected = privacy_projection(&x, 10, 0.0, &mut rng);
        assert_eq!(projected.len(), 2);
        assert!((projected.0[0].re - 1.0).abs() < 1e-9);
    }
}
