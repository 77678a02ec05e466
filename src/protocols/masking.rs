//! Sampling of masking coefficients.
//!
//! A masking coefficient for a party is a uniformly random square root of
//! unity modulo the *peer's* torsion degree. Squaring to one is exactly what
//! lets the masked public key still pass the peer's Weil pairing check, while
//! the mask itself hides the torsion point images.

use crate::arithmetic::modular;
use crate::errors::ProtocolError;
use rand_core::{CryptoRng, RngCore};
use rug::Integer;

/// Draw a uniform element of { x mod n : x² ≡ 1 (mod n) }.
///
/// Uniformity comes from sampling each CRT slot independently; the number of
/// roots is the product of the per-prime-power counts, so no rejection is
/// needed. Fails with `NoSquareRootFound` when the modulus has no unit group
/// to speak of (n < 2).
pub fn sample_masking_element<R: RngCore + CryptoRng>(
    modulus: &Integer,
    rng: &mut R,
) -> Result<Integer, ProtocolError> {
    if *modulus < 2 {
        return Err(ProtocolError::NoSquareRootFound {
            modulus: modulus.clone(),
        });
    }
    Ok(modular::sample_unit_root(modulus, rng))
}
