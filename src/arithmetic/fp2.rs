//! Quadratic extension F_p² = F_p[i]/(i² + 1).
//!
//! The parameter family keeps p ≡ 3 (mod 4), so -1 is a non-residue and the
//! polynomial i² + 1 stays irreducible. Square roots use the norm-based
//! two-step descent to F_p.

use crate::arithmetic::fp::{Fp, PrimeField};
use crate::errors::BackendError;
use rug::Integer;
use std::fmt;
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// Element a + b·i of F_p².
#[derive(Debug, Clone)]
pub struct Fp2 {
    real: Fp,
    imag: Fp,
}

impl Fp2 {
    pub fn new(real: Fp, imag: Fp) -> Self {
        debug_assert_eq!(real.field().modulus(), imag.field().modulus());
        Self { real, imag }
    }

    pub fn zero(field: &Arc<PrimeField>) -> Self {
        Self::new(Fp::zero(field), Fp::zero(field))
    }

    pub fn one(field: &Arc<PrimeField>) -> Self {
        Self::new(Fp::one(field), Fp::zero(field))
    }

    /// Embed a small integer constant into F_p².
    pub fn from_u32(value: u32, field: &Arc<PrimeField>) -> Self {
        Self::new(Fp::new(Integer::from(value), field), Fp::zero(field))
    }

    /// Embed an arbitrary integer into F_p² (reduced mod p).
    pub fn from_integer(value: &Integer, field: &Arc<PrimeField>) -> Self {
        Self::new(Fp::new(value.clone(), field), Fp::zero(field))
    }

    pub fn field(&self) -> &Arc<PrimeField> {
        self.real.field()
    }

    pub fn components(&self) -> (&Fp, &Fp) {
        (&self.real, &self.imag)
    }

    pub fn is_zero(&self) -> bool {
        self.real.is_zero() && self.imag.is_zero()
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.real.add(&other.real), self.imag.add(&other.imag))
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.real.sub(&other.real), self.imag.sub(&other.imag))
    }

    pub fn neg(&self) -> Self {
        Self::new(self.real.neg(), self.imag.neg())
    }

    /// (a + bi)(c + di) = (ac - bd) + (ad + bc)i
    pub fn mul(&self, other: &Self) -> Self {
        let ac = self.real.mul(&other.real);
        let bd = self.imag.mul(&other.imag);
        let ad = self.real.mul(&other.imag);
        let bc = self.imag.mul(&other.real);
        Self::new(ac.sub(&bd), ad.add(&bc))
    }

    pub fn square(&self) -> Self {
        self.mul(self)
    }

    /// a + bi -> a - bi
    pub fn conjugate(&self) -> Self {
        Self::new(self.real.clone(), self.imag.neg())
    }

    /// Multiplicative norm N(a + bi) = a² + b² in F_p.
    pub fn norm(&self) -> Fp {
        self.real.square().add(&self.imag.square())
    }

    /// (a + bi)⁻¹ = (a - bi) / (a² + b²)
    pub fn invert(&self) -> Result<Self, BackendError> {
        if self.is_zero() {
            return Err(BackendError::ZeroInversion);
        }
        let norm_inv = self.norm().invert()?;
        let conj = self.conjugate();
        Ok(Self::new(conj.real.mul(&norm_inv), conj.imag.mul(&norm_inv)))
    }

    pub fn div(&self, other: &Self) -> Result<Self, BackendError> {
        Ok(self.mul(&other.invert()?))
    }

    /// Binary exponentiation; negative exponents go through the inverse.
    pub fn pow(&self, exponent: &Integer) -> Result<Self, BackendError> {
        if *exponent < 0 {
            let positive = Integer::from(-exponent);
            return self.invert()?.pow(&positive);
        }
        let mut result = Self::one(self.field());
        let mut base = self.clone();
        let bits = exponent.significant_bits();
        for i in 0..bits {
            if exponent.get_bit(i) {
                result = result.mul(&base);
            }
            base = base.square();
        }
        Ok(result)
    }

    /// Square root in F_p², if one exists.
    ///
    /// For b ≠ 0: with α = √(a² + b²) in F_p, one of (a ± α)/2 is a residue;
    /// its root x yields √(a + bi) = x + (b / 2x)·i. For b = 0 the root is
    /// either √a or √(-a)·i, depending on which of ±a is a residue.
    pub fn sqrt(&self) -> Result<Self, BackendError> {
        let field = self.field();
        if self.is_zero() {
            return Ok(self.clone());
        }
        if self.imag.is_zero() {
            if let Some(root) = self.real.sqrt() {
                return Ok(Self::new(root, Fp::zero(field)));
            }
            let root = self.real.neg().sqrt().ok_or(BackendError::NonSquare)?;
            return Ok(Self::new(Fp::zero(field), root));
        }
        let alpha = self.norm().sqrt().ok_or(BackendError::NonSquare)?;
        let half = Fp::new(Integer::from(2), field).invert()?;
        let mut delta = self.real.add(&alpha).mul(&half);
        let x = match delta.sqrt() {
            Some(x) => x,
            None => {
                delta = self.real.sub(&alpha).mul(&half);
                delta.sqrt().ok_or(BackendError::NonSquare)?
            }
        };
        let two_x_inv = x.add(&x).invert()?;
        let y = self.imag.mul(&two_x_inv);
        let root = Self::new(x, y);
        debug_assert_eq!(root.square(), *self);
        Ok(root)
    }

    /// Canonical encoding: real part then imaginary part, fixed width each.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.real.to_bytes();
        out.extend_from_slice(&self.imag.to_bytes());
        out
    }
}

impl ConstantTimeEq for Fp2 {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.real.ct_eq(&other.real) & self.imag.ct_eq(&other.imag)
    }
}

impl PartialEq for Fp2 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Fp2 {}

impl Zeroize for Fp2 {
    fn zeroize(&mut self) {
        self.real.zeroize();
        self.imag.zeroize();
    }
}

impl fmt::Display for Fp2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}*i", self.real.value(), self.imag.value())
    }
}
