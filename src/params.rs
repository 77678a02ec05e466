//! Public system parameters for the M-SIDH key exchange.
//!
//! A parameter set fixes the prime p = A·B·f - 1, the supersingular base
//! curve E0 : y² = x³ + x over F_p², and torsion bases for the A- and
//! B-torsion subgroups derived from two independent full-order generators:
//! PA = [B·f]G1, QA = [B·f]G2 and PB = [A·f]G1, QB = [A·f]G2.
//!
//! Construction is atomic: either every invariant holds and an immutable set
//! is returned, or `InvalidParameters` reports the full list of violations.

use crate::arithmetic::{modular, Fp2, PrimeField};
use crate::curves::{Curve, Point};
use crate::errors::{BasisPoint, ParameterViolation, ProtocolError, TorsionSide};
use log::{debug, info};
use rand_core::{CryptoRng, RngCore};
use rug::Integer;
use std::sync::Arc;

/// Multiplicative slack allowed between each torsion degree and √p, in both
/// directions. Security only needs A ≈ B ≈ √p up to a constant.
pub const TORSION_BAND: u32 = 1000;

/// Cofactor values tried by the parameter generators before giving up.
const COFACTOR_ATTEMPTS: usize = 64;

/// Inclusive [lower, upper] band around √p that both torsion degrees must
/// fall into.
pub fn sqrt_band(p: &Integer) -> (Integer, Integer) {
    let root = p.clone().sqrt();
    let lower = Integer::from(&root / TORSION_BAND);
    let upper = root * TORSION_BAND;
    (lower, upper)
}

/// Validated, immutable public parameters shared by both parties.
#[derive(Debug, Clone)]
pub struct MsidhParameters {
    security: u32,
    cofactor: Integer,
    p: Integer,
    field: Arc<PrimeField>,
    curve: Curve,
    degree_a: Integer,
    degree_b: Integer,
    basis_a: (Point, Point),
    basis_b: (Point, Point),
}

impl MsidhParameters {
    /// Construct and exhaustively validate a parameter set.
    ///
    /// The torsion bases are derived from the curve's two independent
    /// generators, first generator to first basis point of each pair. All
    /// nine invariants are checked; every violation found is reported.
    /// Integer-level failures (non-prime modulus, wrong p equation) abort
    /// before any curve work, since torsion bases over a broken field are
    /// meaningless.
    pub fn new<R: RngCore + CryptoRng>(
        security: u32,
        cofactor: Integer,
        p: Integer,
        curve: Curve,
        degree_a: Integer,
        degree_b: Integer,
        rng: &mut R,
    ) -> Result<Self, ProtocolError> {
        let mut violations = Vec::new();

        if !modular::is_prime(&p) {
            violations.push(ParameterViolation::ModulusNotPrime { p: p.clone() });
        }
        let expected = Integer::from(&degree_a * &degree_b) * &cofactor - 1u32;
        if p != expected {
            violations.push(ParameterViolation::ModulusMismatch {
                p: p.clone(),
                expected,
            });
        }
        let (lower, upper) = sqrt_band(&p);
        for (side, degree) in [(TorsionSide::A, &degree_a), (TorsionSide::B, &degree_b)] {
            if *degree < lower || *degree > upper {
                violations.push(ParameterViolation::DegreeOutOfBand {
                    side,
                    degree: degree.clone(),
                    lower: lower.clone(),
                    upper: upper.clone(),
                });
            }
        }
        let gcd = degree_a.clone().gcd(&degree_b);
        if gcd != 1 {
            violations.push(ParameterViolation::DegreesNotCoprime { gcd });
        }
        if violations
            .iter()
            .any(|v| matches!(v, ParameterViolation::ModulusNotPrime { .. } | ParameterViolation::ModulusMismatch { .. }))
        {
            return Err(ProtocolError::InvalidParameters { violations });
        }

        if !curve.is_supersingular(rng) {
            violations.push(ParameterViolation::CurveNotSupersingular);
            return Err(ProtocolError::InvalidParameters { violations });
        }

        debug!("searching for two independent generators of E0(F_p^2)");
        let (g1, g2) = curve.two_independent_generators(rng)?;

        // Scaling full-order generators by B·f (resp. A·f) is what pins the
        // basis points to exact order A (resp. B).
        let scale_a = Integer::from(&degree_b * &cofactor);
        let scale_b = Integer::from(&degree_a * &cofactor);
        let basis_a = (
            curve.scalar_mul(&scale_a, &g1),
            curve.scalar_mul(&scale_a, &g2),
        );
        let basis_b = (
            curve.scalar_mul(&scale_b, &g1),
            curve.scalar_mul(&scale_b, &g2),
        );

        let field = curve.field().clone();
        let params = Self {
            security,
            cofactor,
            p,
            field,
            curve,
            degree_a,
            degree_b,
            basis_a,
            basis_b,
        };

        let mut all = params.validate(rng);
        // Merge the pre-checks so nothing is reported twice.
        for violation in violations {
            if !all.contains(&violation) {
                all.push(violation);
            }
        }
        if all.is_empty() {
            info!(
                "parameter set validated: p has {} bits, A has {} bits, B has {} bits",
                params.p.significant_bits(),
                params.degree_a.significant_bits(),
                params.degree_b.significant_bits()
            );
            Ok(params)
        } else {
            Err(ProtocolError::InvalidParameters { violations: all })
        }
    }

    /// Run all nine invariants, returning every violation found (empty means
    /// the set is valid). Checks run in a fixed order without short-circuiting
    /// so a caller sees the complete diagnosis.
    pub fn validate<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<ParameterViolation> {
        let mut violations = Vec::new();

        // 1. Base curve is supersingular.
        if !self.curve.is_supersingular(rng) {
            violations.push(ParameterViolation::CurveNotSupersingular);
        }

        // 2. p is prime.
        if !modular::is_prime(&self.p) {
            violations.push(ParameterViolation::ModulusNotPrime { p: self.p.clone() });
        }

        // 3. p = A·B·f - 1.
        let expected = Integer::from(&self.degree_a * &self.degree_b) * &self.cofactor - 1u32;
        if self.p != expected {
            violations.push(ParameterViolation::ModulusMismatch {
                p: self.p.clone(),
                expected,
            });
        }

        // 4. A and B sit inside the √p band.
        let (lower, upper) = sqrt_band(&self.p);
        for (side, degree) in [
            (TorsionSide::A, &self.degree_a),
            (TorsionSide::B, &self.degree_b),
        ] {
            if *degree < lower || *degree > upper {
                violations.push(ParameterViolation::DegreeOutOfBand {
                    side,
                    degree: degree.clone(),
                    lower: lower.clone(),
                    upper: upper.clone(),
                });
            }
        }

        // 5. gcd(A, B) = 1.
        let gcd = self.degree_a.clone().gcd(&self.degree_b);
        if gcd != 1 {
            violations.push(ParameterViolation::DegreesNotCoprime { gcd });
        }

        let named_points = [
            (BasisPoint::Pa, &self.basis_a.0, &self.degree_a),
            (BasisPoint::Qa, &self.basis_a.1, &self.degree_a),
            (BasisPoint::Pb, &self.basis_b.0, &self.degree_b),
            (BasisPoint::Qb, &self.basis_b.1, &self.degree_b),
        ];

        // 6. Every basis point lies on the curve.
        for &(name, point, _) in &named_points {
            if !self.curve.contains(point) {
                violations.push(ParameterViolation::PointOffCurve { point: name });
            }
        }

        // 7. Basis points have exactly the degree of their torsion subgroup.
        let exponent = self.curve.group_exponent();
        let factors = modular::factorize(&exponent);
        for &(name, point, degree) in &named_points {
            let actual = self
                .curve
                .point_order(point, &exponent, &factors)
                .unwrap_or_else(Integer::new);
            if actual != *degree {
                violations.push(ParameterViolation::WrongPointOrder {
                    point: name,
                    expected: degree.clone(),
                    actual,
                });
            }
        }

        // 8. The two points of each basis are distinct.
        if self.basis_a.0 == self.basis_a.1 {
            violations.push(ParameterViolation::BasisPointsEqual {
                side: TorsionSide::A,
            });
        }
        if self.basis_b.0 == self.basis_b.1 {
            violations.push(ParameterViolation::BasisPointsEqual {
                side: TorsionSide::B,
            });
        }

        // 9. No basis point is the identity.
        for &(name, point, _) in &named_points {
            if point.is_identity() {
                violations.push(ParameterViolation::TrivialBasisPoint { point: name });
            }
        }

        violations
    }

    pub fn security(&self) -> u32 {
        self.security
    }

    pub fn cofactor(&self) -> &Integer {
        &self.cofactor
    }

    pub fn prime(&self) -> &Integer {
        &self.p
    }

    pub fn field(&self) -> &Arc<PrimeField> {
        &self.field
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn degree_a(&self) -> &Integer {
        &self.degree_a
    }

    pub fn degree_b(&self) -> &Integer {
        &self.degree_b
    }

    pub fn basis_a(&self) -> (&Point, &Point) {
        (&self.basis_a.0, &self.basis_a.1)
    }

    pub fn basis_b(&self) -> (&Point, &Point) {
        (&self.basis_b.0, &self.basis_b.1)
    }

    /// Toy-scale parameters for tests and demos: A = 3·5, B = 7·11, searching
    /// for the smallest cofactor that makes p = A·B·f - 1 prime with the base
    /// curve supersingular. Retries are bounded.
    pub fn toy<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, ProtocolError> {
        let degree_a = Integer::from(15);
        let degree_b = Integer::from(77);
        Self::search_cofactor(2, degree_a, degree_b, 2, rng)
    }

    /// Production-style parameter generation: take the `t` smallest primes,
    /// cube the first `lambda` of them, and split the list by index parity
    /// into the factors of A (even indices) and B (odd indices). The
    /// cofactor is then searched from `f0` until p = A·B·f - 1 is prime.
    pub fn generate<R: RngCore + CryptoRng>(
        lambda: u32,
        t: usize,
        f0: u64,
        rng: &mut R,
    ) -> Result<Self, ProtocolError> {
        assert!(t >= 2, "need at least one prime per torsion side");
        let primes = first_primes(t);
        let mut degree_a = Integer::from(1);
        let mut degree_b = Integer::from(1);
        for (index, prime) in primes.into_iter().enumerate() {
            let factor = if index < lambda as usize {
                Integer::from(prime * prime * prime)
            } else {
                Integer::from(prime)
            };
            if index % 2 == 0 {
                degree_a *= factor;
            } else {
                degree_b *= factor;
            }
        }
        Self::search_cofactor(lambda, degree_a, degree_b, f0, rng)
    }

    /// Shared cofactor search: walk f upward until p = A·B·f - 1 is prime
    /// and congruent to 3 mod 4 (so E0 : y² = x³ + x is supersingular),
    /// giving up after a bounded number of attempts.
    fn search_cofactor<R: RngCore + CryptoRng>(
        security: u32,
        degree_a: Integer,
        degree_b: Integer,
        f0: u64,
        rng: &mut R,
    ) -> Result<Self, ProtocolError> {
        let product = Integer::from(&degree_a * &degree_b);
        for attempt in 0..COFACTOR_ATTEMPTS {
            let cofactor = Integer::from(f0 + attempt as u64);
            let p = Integer::from(&product * &cofactor) - 1u32;
            if !modular::is_prime(&p) || Integer::from(&p % 4u32) != 3 {
                continue;
            }
            debug!("cofactor search: f = {cofactor} gives prime p = {p}");
            let field = PrimeField::new(p.clone());
            let curve = Curve::new(Fp2::one(&field), Fp2::zero(&field));
            return Self::new(
                security,
                cofactor,
                p,
                curve,
                degree_a.clone(),
                degree_b.clone(),
                rng,
            );
        }
        Err(ProtocolError::NoValidParametersFound {
            attempts: COFACTOR_ATTEMPTS,
        })
    }
}

/// The `count` smallest primes, by trial division.
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes.iter().all(|p| candidate % p != 0) {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}
