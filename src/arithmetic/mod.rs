//! Field and modular arithmetic backend.

pub mod fp;
pub mod fp2;
pub mod modular;

pub use fp::{Fp, PrimeField};
pub use fp2::Fp2;
