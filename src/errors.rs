//! Error taxonomy for the M-SIDH protocol core.
//!
//! Every failure is terminal for the current protocol run: bad parameters and
//! pairing mismatches are not transient conditions, so nothing here is meant
//! to be retried. Validation failures carry the offending values so a caller
//! can render its own diagnostics.

use rug::Integer;
use std::fmt;
use thiserror::Error;

/// Which of the two torsion degrees (or basis sides) a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorsionSide {
    A,
    B,
}

impl fmt::Display for TorsionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorsionSide::A => write!(f, "A"),
            TorsionSide::B => write!(f, "B"),
        }
    }
}

/// Names one of the four torsion basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisPoint {
    Pa,
    Qa,
    Pb,
    Qb,
}

impl fmt::Display for BasisPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasisPoint::Pa => write!(f, "PA"),
            BasisPoint::Qa => write!(f, "QA"),
            BasisPoint::Pb => write!(f, "PB"),
            BasisPoint::Qb => write!(f, "QB"),
        }
    }
}

/// A single failed parameter-set invariant.
///
/// Validation collects every violation instead of stopping at the first, so
/// `InvalidParameters` can report the complete picture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterViolation {
    #[error("base curve is not supersingular")]
    CurveNotSupersingular,

    #[error("modulus {p} is not prime")]
    ModulusNotPrime { p: Integer },

    #[error("modulus mismatch: p = {p} but A*B*f - 1 = {expected}")]
    ModulusMismatch { p: Integer, expected: Integer },

    #[error("torsion degree {side} = {degree} is outside the sqrt(p) band [{lower}, {upper}]")]
    DegreeOutOfBand {
        side: TorsionSide,
        degree: Integer,
        lower: Integer,
        upper: Integer,
    },

    #[error("torsion degrees are not coprime: gcd(A, B) = {gcd}")]
    DegreesNotCoprime { gcd: Integer },

    #[error("basis point {point} does not lie on the base curve")]
    PointOffCurve { point: BasisPoint },

    #[error("basis point {point} has order {actual}, expected {expected}")]
    WrongPointOrder {
        point: BasisPoint,
        expected: Integer,
        actual: Integer,
    },

    #[error("basis points of the {side}-torsion coincide")]
    BasisPointsEqual { side: TorsionSide },

    #[error("basis point {point} is the identity element")]
    TrivialBasisPoint { point: BasisPoint },
}

/// Failures originating in the algebraic backend (field, curve, isogeny and
/// pairing primitives). The protocol core surfaces these untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("inversion of zero in F_{{p^2}}")]
    ZeroInversion,

    #[error("element is not a square in F_{{p^2}}")]
    NonSquare,

    #[error("point does not lie on the curve")]
    PointNotOnCurve,

    #[error("kernel generator has order {actual}, expected {expected}")]
    KernelOrderInvalid { expected: Integer, actual: Integer },

    #[error("isogeny degree {degree} has a prime factor too large to step through")]
    DegreeNotSmooth { degree: Integer },

    #[error("curve is singular; j-invariant undefined")]
    SingularCurve,

    #[error("pairing stayed degenerate after {retries} auxiliary points")]
    PairingDegenerate { retries: usize },

    #[error("could not find two independent full-order generators after {attempts} attempts")]
    GeneratorSearchExhausted { attempts: usize },
}

/// Top-level protocol error. Terminal for the current run; see the module
/// docs for the no-retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid system parameters: {}", format_violations(violations))]
    InvalidParameters { violations: Vec<ParameterViolation> },

    #[error("no square root of 1 found modulo {modulus}")]
    NoSquareRootFound { modulus: Integer },

    #[error("Weil pairing consistency check failed for the {torsion}-torsion public key")]
    PairingMismatch { torsion: TorsionSide },

    #[error("no valid parameter set found after {attempts} attempts")]
    NoValidParametersFound { attempts: usize },

    #[error("algebraic backend failure: {0}")]
    Backend(#[from] BackendError),
}

fn format_violations(violations: &[ParameterViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
