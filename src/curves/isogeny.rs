//! Separable isogenies from a kernel generator, via Vélu's formulas.
//!
//! A kernel of large smooth order is never handled in one step: the isogeny
//! is factored into a chain of prime-degree steps, pushing the remaining
//! kernel through each step. This is the "factored" construction the
//! protocol requests; a single Vélu evaluation of composite degree would be
//! computationally infeasible at protocol scale.

use crate::arithmetic::{modular, Fp2};
use crate::curves::elliptic_curve::{Curve, Point};
use crate::errors::BackendError;
use rug::Integer;

/// One Vélu summand: the x-coordinate of a kernel representative together
/// with its v and u coefficients.
#[derive(Debug, Clone)]
struct Summand {
    x: Fp2,
    v: Fp2,
    u: Fp2,
}

/// A prime-degree Vélu step with its codomain.
#[derive(Debug, Clone)]
struct VeluStep {
    codomain: Curve,
    summands: Vec<Summand>,
}

impl VeluStep {
    /// Build the degree-ℓ step with kernel ⟨k⟩, k of prime order ℓ.
    ///
    /// Representatives are one point per ±pair (all of them for ℓ = 2, where
    /// the single kernel point is its own negative). The codomain is
    /// y² = x³ + (a - 5v)x + (b - 7w) with v, w the Vélu sums.
    fn new(curve: &Curve, kernel: &Point, ell: u32) -> Result<Self, BackendError> {
        let field = curve.field();
        let mut representatives = Vec::with_capacity(((ell as usize) - 1) / 2 + 1);
        if ell == 2 {
            representatives.push(kernel.clone());
        } else {
            let mut current = kernel.clone();
            for _ in 0..(ell - 1) / 2 {
                representatives.push(current.clone());
                current = curve.add(&current, kernel);
            }
        }

        let three = Fp2::from_u32(3, field);
        let mut v_sum = Fp2::zero(field);
        let mut w_sum = Fp2::zero(field);
        let mut summands = Vec::with_capacity(representatives.len());
        for rep in &representatives {
            let (x, y) = rep.xy().ok_or(BackendError::KernelOrderInvalid {
                expected: Integer::from(ell),
                actual: Integer::from(1),
            })?;
            let gx = three.mul(&x.square()).add(curve.a());
            let (v, u) = if y.is_zero() {
                (gx, Fp2::zero(field))
            } else {
                let two_y = y.add(y);
                (gx.add(&gx), two_y.square())
            };
            v_sum = v_sum.add(&v);
            w_sum = w_sum.add(&u).add(&x.mul(&v));
            summands.push(Summand {
                x: x.clone(),
                v,
                u,
            });
        }

        let five_v = Fp2::from_u32(5, field).mul(&v_sum);
        let seven_w = Fp2::from_u32(7, field).mul(&w_sum);
        let codomain = Curve::new(curve.a().sub(&five_v), curve.b().sub(&seven_w));
        Ok(Self { codomain, summands })
    }

    /// Evaluate the step at a point. Kernel points (x matching a summand)
    /// map to the identity.
    ///
    /// The y-image uses the normalized form Y = y·X'(x), valid because
    /// Vélu's isogeny preserves the invariant differential.
    fn evaluate(&self, point: &Point) -> Point {
        let (x, y) = match point.xy() {
            None => return Point::Infinity,
            Some(c) => c,
        };
        let field = x.field();
        let two = Fp2::from_u32(2, field);
        let mut image_x = x.clone();
        let mut y_factor = Fp2::one(field);
        for summand in &self.summands {
            let dx = x.sub(&summand.x);
            let dx_inv = match dx.invert() {
                Ok(inv) => inv,
                Err(_) => return Point::Infinity,
            };
            let dx_inv2 = dx_inv.square();
            let dx_inv3 = dx_inv2.mul(&dx_inv);
            image_x = image_x
                .add(&summand.v.mul(&dx_inv))
                .add(&summand.u.mul(&dx_inv2));
            y_factor = y_factor
                .sub(&summand.v.mul(&dx_inv2))
                .sub(&two.mul(&summand.u).mul(&dx_inv3));
        }
        Point::Affine {
            x: image_x,
            y: y.mul(&y_factor),
        }
    }
}

/// A separable isogeny of smooth degree, stored as its prime-degree chain.
#[derive(Debug, Clone)]
pub struct Isogeny {
    domain: Curve,
    codomain: Curve,
    degree: Integer,
    steps: Vec<VeluStep>,
}

impl Isogeny {
    /// Construct the isogeny with kernel ⟨kernel⟩ of exact order `degree`,
    /// factored into prime-degree Vélu steps.
    pub fn from_kernel(
        curve: &Curve,
        kernel: &Point,
        degree: &Integer,
    ) -> Result<Self, BackendError> {
        let factors = modular::factorize(degree);

        // The kernel must generate a subgroup of exactly the claimed order.
        let exponent = curve.group_exponent();
        let exponent_factors = modular::factorize(&exponent);
        let actual = curve
            .point_order(kernel, &exponent, &exponent_factors)
            .unwrap_or_else(Integer::new);
        if actual != *degree {
            return Err(BackendError::KernelOrderInvalid {
                expected: degree.clone(),
                actual,
            });
        }

        let mut steps = Vec::new();
        let mut current_curve = curve.clone();
        let mut remaining = degree.clone();
        let mut carried_kernel = kernel.clone();
        for (prime, multiplicity) in &factors {
            let ell = prime
                .to_u32()
                .ok_or_else(|| BackendError::DegreeNotSmooth {
                    degree: degree.clone(),
                })?;
            for _ in 0..*multiplicity {
                let cofactor = Integer::from(&remaining / prime);
                let step_kernel = current_curve.scalar_mul(&cofactor, &carried_kernel);
                let step = VeluStep::new(&current_curve, &step_kernel, ell)?;
                current_curve = step.codomain.clone();
                remaining = cofactor;
                if remaining > 1 {
                    carried_kernel = step.evaluate(&carried_kernel);
                }
                steps.push(step);
            }
        }

        Ok(Self {
            domain: curve.clone(),
            codomain: current_curve,
            degree: degree.clone(),
            steps,
        })
    }

    pub fn domain(&self) -> &Curve {
        &self.domain
    }

    pub fn codomain(&self) -> &Curve {
        &self.codomain
    }

    pub fn degree(&self) -> &Integer {
        &self.degree
    }

    /// Evaluate the isogeny at a point of the domain curve.
    pub fn evaluate(&self, point: &Point) -> Point {
        let mut image = point.clone();
        for step in &self.steps {
            image = step.evaluate(&image);
        }
        image
    }
}
