//! Elliptic curves, isogenies and pairings over F_p².

pub mod elliptic_curve;
pub mod isogeny;
pub mod pairing;

pub use elliptic_curve::{Curve, Point};
pub use isogeny::Isogeny;
pub use pairing::weil_pairing;
