//! M-SIDH: a masked supersingular-isogeny Diffie-Hellman key exchange.
//!
//! Each party publishes the codomain of a secret isogeny together with the
//! images of the peer's torsion basis, scaled by a secret mask that squares
//! to 1 modulo the peer's torsion degree. The mask hides the raw torsion
//! images (the point of the construction) while staying invisible to the
//! Weil pairing check the receiver runs on every incoming public key.
//!
//! Layering, bottom up:
//! - [`arithmetic`]: F_p and F_p², plus the modular routines (factoring,
//!   CRT, square roots of unity) the masking layer needs.
//! - [`curves`]: short Weierstrass curves over F_p², Vélu isogenies
//!   factored into prime-degree steps, and the Weil pairing.
//! - [`params`]: validated public parameter sets, with the nine-invariant
//!   checker and two parameter generators.
//! - [`protocols`]: masking coefficients, the [`protocols::Party`]
//!   endpoint, and the [`protocols::KeyExchange`] state machine.
//!
//! ```
//! use msidh::params::MsidhParameters;
//! use msidh::protocols::{KeyExchange, Party, Role};
//! use rand_chacha::ChaCha20Rng;
//! use rand_core::SeedableRng;
//! use std::sync::Arc;
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(1);
//! let params = Arc::new(MsidhParameters::toy(&mut rng)?);
//! let mut exchange = KeyExchange::new(
//!     Party::new(params.clone(), Role::Alice),
//!     Party::new(params, Role::Bob),
//! );
//! // Each endpoint keeps its own randomness stream.
//! let mut rng_a = ChaCha20Rng::seed_from_u64(2);
//! let mut rng_b = ChaCha20Rng::seed_from_u64(3);
//! let (secret_a, secret_b) = exchange.run(&mut rng_a, &mut rng_b)?;
//! assert_eq!(secret_a, secret_b);
//! # Ok::<(), msidh::errors::ProtocolError>(())
//! ```

pub mod arithmetic;
pub mod curves;
pub mod errors;
pub mod params;
pub mod protocols;

pub use errors::{BackendError, ParameterViolation, ProtocolError};
pub use params::MsidhParameters;
pub use protocols::{KeyExchange, Party, Role, SharedSecret};
