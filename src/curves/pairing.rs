//! Weil pairing on n-torsion points via Miller's algorithm.
//!
//! Uses the auxiliary-point formulation
//!   e_n(P, Q) = [f_P(Q + S) / f_P(S)] / [f_Q(P - S) / f_Q(-S)]
//! with a fresh random S whenever a line function degenerates (evaluates to
//! zero or hits a pole). Retries are bounded; exhausting them surfaces as a
//! backend error rather than looping forever.

use crate::arithmetic::Fp2;
use crate::curves::elliptic_curve::{Curve, Point};
use crate::errors::BackendError;
use rand_core::{CryptoRng, RngCore};
use rug::Integer;

/// Auxiliary-point retry cap. Each retry fails only when the random S
/// collides with the handful of points excluded by the formula, so a few
/// dozen attempts is already far beyond what honest inputs need.
const AUX_POINT_RETRIES: usize = 64;

/// A zero or pole in an intermediate line evaluation; resolved by retrying
/// with a different auxiliary point.
struct Degenerate;

/// Weil pairing e_n(P, Q) of two points of order dividing n.
pub fn weil_pairing<R: RngCore + CryptoRng>(
    curve: &Curve,
    p: &Point,
    q: &Point,
    n: &Integer,
    rng: &mut R,
) -> Result<Fp2, BackendError> {
    let one = Fp2::one(curve.field());
    if p.is_identity() || q.is_identity() {
        return Ok(one);
    }
    debug_assert!(curve.scalar_mul(n, p).is_identity());
    debug_assert!(curve.scalar_mul(n, q).is_identity());

    for _ in 0..AUX_POINT_RETRIES {
        let s = curve.random_point(rng);
        let q_plus_s = curve.add(q, &s);
        let p_minus_s = curve.add(p, &curve.negate(&s));
        let neg_s = curve.negate(&s);
        if s.is_identity() || q_plus_s.is_identity() || p_minus_s.is_identity() {
            continue;
        }
        let attempt = (|| -> Result<Fp2, Degenerate> {
            let numerator = miller(curve, p, n, &q_plus_s)?.div_or_degenerate(&miller(
                curve, p, n, &s,
            )?)?;
            let denominator = miller(curve, q, n, &p_minus_s)?.div_or_degenerate(&miller(
                curve, q, n, &neg_s,
            )?)?;
            numerator.div_or_degenerate(&denominator)
        })();
        match attempt {
            Ok(value) => {
                debug_assert_eq!(
                    value.pow(n).expect("non-negative exponent"),
                    one,
                    "pairing value must be an n-th root of unity"
                );
                return Ok(value);
            }
            Err(Degenerate) => continue,
        }
    }
    Err(BackendError::PairingDegenerate {
        retries: AUX_POINT_RETRIES,
    })
}

/// True when `zeta` has multiplicative order exactly `n`, given n's
/// factorization. Used to certify independence of torsion generators.
pub fn has_full_order(
    zeta: &Fp2,
    n: &Integer,
    n_factors: &[(Integer, u32)],
) -> Result<bool, BackendError> {
    let one = Fp2::one(zeta.field());
    if zeta.pow(n)? != one {
        return Ok(false);
    }
    for (prime, _) in n_factors {
        let reduced = Integer::from(n / prime);
        if zeta.pow(&reduced)? == one {
            return Ok(false);
        }
    }
    Ok(true)
}

trait DivOrDegenerate: Sized {
    fn div_or_degenerate(&self, other: &Self) -> Result<Self, Degenerate>;
}

impl DivOrDegenerate for Fp2 {
    fn div_or_degenerate(&self, other: &Self) -> Result<Self, Degenerate> {
        self.div(other).map_err(|_| Degenerate)
    }
}

/// Miller loop: evaluates f_{m,P} at X, where f_{m,P} has divisor
/// m(P) - m(O) (using mP = O).
fn miller(curve: &Curve, p: &Point, m: &Integer, at: &Point) -> Result<Fp2, Degenerate> {
    let mut f = Fp2::one(curve.field());
    let mut t = p.clone();
    let bits = m.significant_bits();
    // Top bit contributes T = P itself; walk the remaining bits downward.
    for i in (0..bits.saturating_sub(1)).rev() {
        f = f.square().mul(&line(curve, &t, &t, at)?);
        t = curve.double(&t);
        if m.get_bit(i) {
            f = f.mul(&line(curve, &t, p, at)?);
            t = curve.add(&t, p);
        }
    }
    debug_assert!(t.is_identity(), "m must kill P");
    Ok(f)
}

/// g_{U,V}(X): the line through U and V divided by the vertical at U + V,
/// evaluated at X. Degenerates when X sits on either line.
fn line(curve: &Curve, u: &Point, v: &Point, at: &Point) -> Result<Fp2, Degenerate> {
    let (ax, ay) = at.xy().ok_or(Degenerate)?;
    let (ux, uy) = match u.xy() {
        // g_{O,V} = v_V / v_V = 1; same with the roles swapped.
        None => return Ok(Fp2::one(curve.field())),
        Some(c) => c,
    };
    let (vx, vy) = match v.xy() {
        None => return Ok(Fp2::one(curve.field())),
        Some(c) => c,
    };

    // U + V = O: the chord is the vertical at U, with no vertical to divide.
    if ux == vx && *uy == vy.neg() {
        let value = ax.sub(ux);
        if value.is_zero() {
            return Err(Degenerate);
        }
        return Ok(value);
    }

    let slope = if u == v {
        let numerator = Fp2::from_u32(3, curve.field())
            .mul(&ux.square())
            .add(curve.a());
        let denominator = uy.add(uy);
        numerator.div_or_degenerate(&denominator)?
    } else {
        vy.sub(uy).div_or_degenerate(&vx.sub(ux))?
    };

    let sum = curve.add(u, v);
    let (sx, _) = sum.xy().ok_or(Degenerate)?;
    let numerator = ay.sub(uy).sub(&slope.mul(&ax.sub(ux)));
    let denominator = ax.sub(sx);
    if numerator.is_zero() || denominator.is_zero() {
        return Err(Degenerate);
    }
    numerator.div_or_degenerate(&denominator)
}
