//! Prime field arithmetic over a runtime modulus.
//!
//! Unlike a fixed-prime deployment, the modulus here comes out of a parameter
//! search, so elements carry a shared [`PrimeField`] context instead of a
//! static parameter reference. All values are kept in canonical form in
//! `[0, p)`.

use crate::errors::BackendError;
use rug::integer::Order;
use rug::ops::RemRounding;
use rug::Integer;
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// Shared description of the field F_p. Cheap to clone via `Arc`.
#[derive(Debug, PartialEq, Eq)]
pub struct PrimeField {
    p: Integer,
}

impl PrimeField {
    /// Wrap a modulus in a shared field context.
    ///
    /// Primality is deliberately not enforced here: parameter validation
    /// reports a non-prime modulus as a structured violation rather than a
    /// panic deep inside the arithmetic.
    pub fn new(p: Integer) -> Arc<Self> {
        assert!(p > 2, "field modulus must exceed 2");
        Arc::new(Self { p })
    }

    pub fn modulus(&self) -> &Integer {
        &self.p
    }

    /// Number of bytes in the canonical encoding of one element.
    pub fn element_len(&self) -> usize {
        self.p.significant_bits().div_ceil(8) as usize
    }
}

/// Element of F_p in canonical representation.
#[derive(Debug, Clone)]
pub struct Fp {
    value: Integer,
    field: Arc<PrimeField>,
}

impl Fp {
    /// Create a new element, reducing the value into `[0, p)`.
    pub fn new(value: Integer, field: &Arc<PrimeField>) -> Self {
        let reduced = value.rem_euc(&field.p);
        Self {
            value: reduced,
            field: Arc::clone(field),
        }
    }

    pub fn zero(field: &Arc<PrimeField>) -> Self {
        Self::new(Integer::new(), field)
    }

    pub fn one(field: &Arc<PrimeField>) -> Self {
        Self::new(Integer::from(1), field)
    }

    pub fn value(&self) -> &Integer {
        &self.value
    }

    pub fn field(&self) -> &Arc<PrimeField> {
        &self.field
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn add(&self, other: &Self) -> Self {
        debug_assert_eq!(self.field.p, other.field.p, "mixed-field addition");
        let mut sum = Integer::from(&self.value + &other.value);
        if sum >= self.field.p {
            sum -= &self.field.p;
        }
        Self {
            value: sum,
            field: Arc::clone(&self.field),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        debug_assert_eq!(self.field.p, other.field.p, "mixed-field subtraction");
        let mut diff = Integer::from(&self.value - &other.value);
        if diff < 0 {
            diff += &self.field.p;
        }
        Self {
            value: diff,
            field: Arc::clone(&self.field),
        }
    }

    pub fn neg(&self) -> Self {
        Self::zero(&self.field).sub(self)
    }

    pub fn mul(&self, other: &Self) -> Self {
        debug_assert_eq!(self.field.p, other.field.p, "mixed-field multiplication");
        let product = Integer::from(&self.value * &other.value).rem_euc(&self.field.p);
        Self {
            value: product,
            field: Arc::clone(&self.field),
        }
    }

    pub fn square(&self) -> Self {
        self.mul(self)
    }

    /// Multiplicative inverse via the extended Euclidean algorithm.
    pub fn invert(&self) -> Result<Self, BackendError> {
        if self.is_zero() {
            return Err(BackendError::ZeroInversion);
        }
        let inv = self
            .value
            .clone()
            .invert(&self.field.p)
            .map_err(|_| BackendError::ZeroInversion)?;
        Ok(Self {
            value: inv,
            field: Arc::clone(&self.field),
        })
    }

    /// Binary exponentiation; negative exponents go through the inverse.
    pub fn pow(&self, exponent: &Integer) -> Result<Self, BackendError> {
        if *exponent < 0 {
            let positive = Integer::from(-exponent);
            return self.invert()?.pow(&positive);
        }
        let value = self
            .value
            .clone()
            .pow_mod(exponent, &self.field.p)
            .expect("non-negative exponent");
        Ok(Self {
            value,
            field: Arc::clone(&self.field),
        })
    }

    /// Square root for p ≡ 3 (mod 4), the congruence class the parameter
    /// family guarantees. Returns `None` for non-residues.
    pub fn sqrt(&self) -> Option<Self> {
        debug_assert!(
            Integer::from(&self.field.p % 4u32) == 3,
            "sqrt path requires p = 3 mod 4"
        );
        if self.is_zero() {
            return Some(self.clone());
        }
        let exp = Integer::from(&self.field.p + 1u32) / 4u32;
        let candidate = self.pow(&exp).expect("non-negative exponent");
        if candidate.square() == *self {
            Some(candidate)
        } else {
            None
        }
    }

    /// Canonical fixed-width big-endian encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.field.element_len();
        let digits = self.value.to_digits::<u8>(Order::MsfBe);
        let mut out = vec![0u8; width - digits.len()];
        out.extend_from_slice(&digits);
        out
    }
}

impl ConstantTimeEq for Fp {
    fn ct_eq(&self, other: &Self) -> Choice {
        Choice::from((self.value == other.value && self.field.p == other.field.p) as u8)
    }
}

impl PartialEq for Fp {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Fp {}

impl Zeroize for Fp {
    fn zeroize(&mut self) {
        self.value = Integer::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field() -> Arc<PrimeField> {
        // Toy modulus used across the backend tests: 1155 * 8 - 1.
        PrimeField::new(Integer::from(9239))
    }

    proptest! {
        #[test]
        fn field_axioms(a in 0u64..9239, b in 0u64..9239, c in 0u64..9239) {
            let f = field();
            let a = Fp::new(Integer::from(a), &f);
            let b = Fp::new(Integer::from(b), &f);
            let c = Fp::new(Integer::from(c), &f);

            prop_assert_eq!(a.add(&b), b.add(&a));
            prop_assert_eq!(a.mul(&b), b.mul(&a));
            prop_assert_eq!(a.add(&b).add(&c), a.add(&b.add(&c)));
            prop_assert_eq!(a.mul(&b).mul(&c), a.mul(&b.mul(&c)));
            prop_assert_eq!(a.add(&b).mul(&c), a.mul(&c).add(&b.mul(&c)));
            prop_assert_eq!(a.sub(&a), Fp::zero(&f));
            prop_assert_eq!(a.add(&a.neg()), Fp::zero(&f));
        }

        #[test]
        fn inversion_round_trips(a in 1u64..9239) {
            let f = field();
            let a = Fp::new(Integer::from(a), &f);
            let inv = a.invert().unwrap();
            prop_assert_eq!(a.mul(&inv), Fp::one(&f));
        }

        #[test]
        fn sqrt_of_square_is_plus_minus(a in 1u64..9239) {
            let f = field();
            let a = Fp::new(Integer::from(a), &f);
            let sq = a.square();
            let root = sq.sqrt().expect("squares are residues");
            prop_assert!(root == a || root == a.neg());
        }
    }

    #[test]
    fn zero_has_no_inverse() {
        let f = field();
        assert_eq!(
            Fp::zero(&f).invert().unwrap_err(),
            BackendError::ZeroInversion
        );
    }

    #[test]
    fn negative_values_reduce_canonically() {
        let f = field();
        let a = Fp::new(Integer::from(-1), &f);
        assert_eq!(*a.value(), Integer::from(9238));
    }

    #[test]
    fn negative_exponent_uses_inverse() {
        let f = field();
        let a = Fp::new(Integer::from(7), &f);
        let direct = a.invert().unwrap().pow(&Integer::from(3)).unwrap();
        let via_pow = a.pow(&Integer::from(-3)).unwrap();
        assert_eq!(direct, via_pow);
    }

    #[test]
    fn encoding_is_fixed_width() {
        let f = field();
        let small = Fp::new(Integer::from(5), &f);
        let large = Fp::new(Integer::from(9000), &f);
        assert_eq!(small.to_bytes().len(), large.to_bytes().len());
        assert_eq!(small.to_bytes().len(), f.element_len());
    }
}
