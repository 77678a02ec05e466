//! Short Weierstrass curves y² = x³ + ax + b over F_p² and their points.
//!
//! Affine coordinates throughout: the isogeny formulas and Miller's algorithm
//! both consume affine points, and protocol-scale performance is out of
//! scope. The supersingular curves of interest have group structure
//! (Z/(p+1))² over F_p², which the order and generator routines rely on.

use crate::arithmetic::{modular, Fp2, PrimeField};
use crate::errors::BackendError;
use rand_core::{CryptoRng, RngCore};
use rug::Integer;
use std::fmt;
use std::sync::Arc;

/// Point on a curve, affine or the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: Fp2, y: Fp2 },
}

impl Point {
    pub fn is_identity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    /// Affine coordinates; `None` for the identity.
    pub fn xy(&self) -> Option<(&Fp2, &Fp2)> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, y } => Some((x, y)),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Infinity => write!(f, "O"),
            Point::Affine { x, y } => write!(f, "({x}, {y})"),
        }
    }
}

/// Elliptic curve y² = x³ + ax + b over F_p².
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    a: Fp2,
    b: Fp2,
}

/// Random-point trials for the probabilistic supersingularity test. Each
/// trial on an ordinary curve passes with probability at most ~1/ℓ per large
/// prime factor, so a handful of trials is already decisive.
const SUPERSINGULAR_TRIALS: usize = 5;

/// Attempt cap for the independent-generator search.
const GENERATOR_ATTEMPTS: usize = 256;

impl Curve {
    pub fn new(a: Fp2, b: Fp2) -> Self {
        debug_assert_eq!(a.field().modulus(), b.field().modulus());
        Self { a, b }
    }

    pub fn a(&self) -> &Fp2 {
        &self.a
    }

    pub fn b(&self) -> &Fp2 {
        &self.b
    }

    pub fn field(&self) -> &Arc<PrimeField> {
        self.a.field()
    }

    /// 4a³ + 27b², zero exactly when the curve is singular.
    pub fn discriminant_core(&self) -> Fp2 {
        let a_cubed = self.a.square().mul(&self.a);
        let four_a3 = Fp2::from_u32(4, self.field()).mul(&a_cubed);
        let twenty_seven_b2 = Fp2::from_u32(27, self.field()).mul(&self.b.square());
        four_a3.add(&twenty_seven_b2)
    }

    pub fn is_singular(&self) -> bool {
        self.discriminant_core().is_zero()
    }

    /// j = 1728 · 4a³ / (4a³ + 27b²).
    pub fn j_invariant(&self) -> Result<Fp2, BackendError> {
        let denom = self.discriminant_core();
        if denom.is_zero() {
            return Err(BackendError::SingularCurve);
        }
        let a_cubed = self.a.square().mul(&self.a);
        let four_a3 = Fp2::from_u32(4, self.field()).mul(&a_cubed);
        Fp2::from_u32(1728, self.field()).mul(&four_a3).div(&denom)
    }

    pub fn identity(&self) -> Point {
        Point::Infinity
    }

    pub fn contains(&self, point: &Point) -> bool {
        match point.xy() {
            None => true,
            Some((x, y)) => {
                let lhs = y.square();
                let rhs = x.square().mul(x).add(&self.a.mul(x)).add(&self.b);
                lhs == rhs
            }
        }
    }

    pub fn negate(&self, point: &Point) -> Point {
        match point.xy() {
            None => Point::Infinity,
            Some((x, y)) => Point::Affine {
                x: x.clone(),
                y: y.neg(),
            },
        }
    }

    /// Affine chord-and-tangent addition.
    pub fn add(&self, p: &Point, q: &Point) -> Point {
        let (x1, y1) = match p.xy() {
            None => return q.clone(),
            Some(c) => c,
        };
        let (x2, y2) = match q.xy() {
            None => return p.clone(),
            Some(c) => c,
        };
        let slope = if x1 == x2 {
            if *y1 == y2.neg() {
                return Point::Infinity;
            }
            // Tangent: (3x² + a) / 2y
            let numerator = Fp2::from_u32(3, self.field()).mul(&x1.square()).add(&self.a);
            let denominator = y1.add(y1);
            numerator
                .div(&denominator)
                .expect("doubling a 2-torsion point is handled above")
        } else {
            y2.sub(y1)
                .div(&x2.sub(x1))
                .expect("distinct x-coordinates")
        };
        let x3 = slope.square().sub(x1).sub(x2);
        let y3 = slope.mul(&x1.sub(&x3)).sub(y1);
        Point::Affine { x: x3, y: y3 }
    }

    pub fn double(&self, p: &Point) -> Point {
        self.add(p, p)
    }

    /// Double-and-add scalar multiplication; negative scalars negate first.
    pub fn scalar_mul(&self, scalar: &Integer, point: &Point) -> Point {
        if *scalar < 0 {
            let positive = Integer::from(-scalar);
            return self.scalar_mul(&positive, &self.negate(point));
        }
        let mut result = Point::Infinity;
        let mut base = point.clone();
        for i in 0..scalar.significant_bits() {
            if scalar.get_bit(i) {
                result = self.add(&result, &base);
            }
            base = self.double(&base);
        }
        result
    }

    /// Lift an x-coordinate to a point, if x³ + ax + b is a square.
    pub fn lift_x(&self, x: Fp2) -> Result<Point, BackendError> {
        let rhs = x.square().mul(&x).add(&self.a.mul(&x)).add(&self.b);
        let y = rhs.sqrt()?;
        Ok(Point::Affine { x, y })
    }

    /// Uniformly-ish random affine point: random x until it lifts, then a
    /// random choice of sign.
    pub fn random_point<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Point {
        let field = self.field();
        loop {
            let re = modular::random_below(field.modulus(), rng);
            let im = modular::random_below(field.modulus(), rng);
            let x = Fp2::new(
                crate::arithmetic::Fp::new(re, field),
                crate::arithmetic::Fp::new(im, field),
            );
            if let Ok(point) = self.lift_x(x) {
                if rng.next_u32() & 1 == 1 {
                    return self.negate(&point);
                }
                return point;
            }
        }
    }

    /// Group exponent of E(F_p²) for the supersingular family: p + 1.
    pub fn group_exponent(&self) -> Integer {
        Integer::from(self.field().modulus() + 1u32)
    }

    /// Exact order of `point`, given the factored group exponent.
    ///
    /// Returns `None` when the exponent does not kill the point (which means
    /// the curve is not in the expected supersingular family).
    pub fn point_order(
        &self,
        point: &Point,
        exponent: &Integer,
        exponent_factors: &[(Integer, u32)],
    ) -> Option<Integer> {
        if !self.scalar_mul(exponent, point).is_identity() {
            return None;
        }
        let mut order = exponent.clone();
        for (prime, multiplicity) in exponent_factors {
            for _ in 0..*multiplicity {
                let reduced = Integer::from(&order / prime);
                if self.scalar_mul(&reduced, point).is_identity() {
                    order = reduced;
                } else {
                    break;
                }
            }
        }
        Some(order)
    }

    /// Probabilistic supersingularity test: every point of a supersingular
    /// curve over F_p² is killed by p + 1; on an ordinary curve a random
    /// point survives with overwhelming probability.
    pub fn is_supersingular<R: RngCore + CryptoRng>(&self, rng: &mut R) -> bool {
        if self.is_singular() {
            return false;
        }
        let exponent = self.group_exponent();
        for _ in 0..SUPERSINGULAR_TRIALS {
            let point = self.random_point(rng);
            if !self.scalar_mul(&exponent, &point).is_identity() {
                return false;
            }
        }
        true
    }

    /// Find two independent generators of E(F_p²) ≅ (Z/(p+1))².
    ///
    /// Independence is certified by the Weil pairing: e(G1, G2) must have
    /// full multiplicative order p + 1.
    pub fn two_independent_generators<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(Point, Point), BackendError> {
        let exponent = self.group_exponent();
        let factors = modular::factorize(&exponent);

        let mut first = None;
        for _ in 0..GENERATOR_ATTEMPTS {
            let candidate = self.random_point(rng);
            if self.point_order(&candidate, &exponent, &factors) == Some(exponent.clone()) {
                first = Some(candidate);
                break;
            }
        }
        let g1 = first.ok_or(BackendError::GeneratorSearchExhausted {
            attempts: GENERATOR_ATTEMPTS,
        })?;

        for _ in 0..GENERATOR_ATTEMPTS {
            let candidate = self.random_point(rng);
            if self.point_order(&candidate, &exponent, &factors) != Some(exponent.clone()) {
                continue;
            }
            let zeta = super::pairing::weil_pairing(self, &g1, &candidate, &exponent, rng)?;
            if super::pairing::has_full_order(&zeta, &exponent, &factors)? {
                return Ok((g1, candidate));
            }
        }
        Err(BackendError::GeneratorSearchExhausted {
            attempts: GENERATOR_ATTEMPTS,
        })
    }
}
