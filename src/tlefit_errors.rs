use hifitime::Epoch;
use thiserror::Error;

/// Reasons an initial orbit determination can fail.
///
/// These are expected outcomes for a bad geometry or a solver that does not
/// converge; callers processing a batch skip the offending window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IodFailureKind {
    #[error("expected at least {expected} observations, got {got}")]
    NotEnoughObservations { expected: usize, got: usize },

    #[error("observations are not strictly increasing in time")]
    NotChronological,

    #[error(
        "unit direction matrix is singular (cannot be inverted); lines of sight may be coplanar"
    )]
    SingularDirectionMatrix,

    #[error("Aberth–Ehrlich method failed to find acceptable complex roots")]
    PolynomialRootFindingFailed,

    #[error("spurious root detected (negative or near-zero slant range)")]
    SpuriousRootDetected,

    #[error("range polynomial has no admissible root")]
    NoRootsFound,

    #[error("position vectors are not coplanar (|û₁·(û₂×û₃)| = {0:.3e})")]
    NonCoplanarPositions(f64),

    #[error("transfer geometry is degenerate (near 0° or 180° separation)")]
    DegenerateTransferAngle,

    #[error("{method} did not converge within {iterations} iterations")]
    NoConvergence {
        method: &'static str,
        iterations: usize,
    },

    #[error("Lambert problem has no solution for this geometry")]
    LambertFailure,

    #[error("universal Kepler equation did not converge")]
    KeplerFailure,

    #[error("orbit is not bound (eccentricity = {eccentricity:.6})")]
    UnboundOrbit { eccentricity: f64 },

    #[error("no circular orbit radius matches the observed arc")]
    NoCircularSolution,

    #[error("ill-conditioned geometry: {0}")]
    IllConditioned(&'static str),
}

#[derive(Error, Debug)]
pub enum TleFitError {
    #[error("Malformed angle or time string '{input}': {reason}")]
    ParseError { input: String, reason: String },

    #[error("Degenerate (zero-length) vector cannot define a direction")]
    DegenerateVector,

    #[error("Initial orbit determination failed: {0}")]
    IodFailure(IodFailureKind),

    #[error("Cannot render TLE: {0}")]
    FormatError(String),

    #[error("SGP4 propagation failed at {epoch}: {reason}")]
    PropagationFailure { epoch: Epoch, reason: String },

    #[error("Invalid TLE text: {0}")]
    InvalidTle(String),

    #[error("Invalid IOD parameter: {0}")]
    InvalidIODParameter(String),

    #[error("Invalid extraction parameter: {0}")]
    InvalidExtractionParameter(String),

    #[error("Invalid floating-point value: {0}")]
    InvalidFloatValue(#[from] ordered_float::FloatIsNan),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV reading error: {0}")]
    CsvError(#[from] csv::Error),
}

impl TleFitError {
    /// Shorthand for a [`TleFitError::ParseError`].
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        TleFitError::ParseError {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// `true` when the error only invalidates the current window, frame or sample.
    ///
    /// IOD and propagation failures are skipped by batch callers; parse, format and
    /// configuration errors always abort.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            TleFitError::IodFailure(_) | TleFitError::PropagationFailure { .. }
        )
    }
}

impl From<IodFailureKind> for TleFitError {
    fn from(kind: IodFailureKind) -> Self {
        TleFitError::IodFailure(kind)
    }
}

impl PartialEq for TleFitError {
    fn eq(&self, other: &Self) -> bool {
        use TleFitError::*;
        match (self, other) {
            (
                ParseError {
                    input: a,
                    reason: ra,
                },
                ParseError {
                    input: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (DegenerateVector, DegenerateVector) => true,
            (IodFailure(a), IodFailure(b)) => a == b,
            (FormatError(a), FormatError(b)) => a == b,
            (
                PropagationFailure {
                    epoch: ea,
                    reason: ra,
                },
                PropagationFailure {
                    epoch: eb,
                    reason: rb,
                },
            ) => ea == eb && ra == rb,
            (InvalidTle(a), InvalidTle(b)) => a == b,
            (InvalidIODParameter(a), InvalidIODParameter(b)) => a == b,
            (InvalidExtractionParameter(a), InvalidExtractionParameter(b)) => a == b,

            (InvalidFloatValue(_), InvalidFloatValue(_)) => true,

            // Not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
mod tlefit_errors_test {
    use super::*;

    #[test]
    fn skippable_errors() {
        assert!(TleFitError::IodFailure(IodFailureKind::NoRootsFound).is_skippable());
        assert!(!TleFitError::FormatError("eccentricity".into()).is_skippable());
        assert!(!TleFitError::parse("-10:99", "wrong field count").is_skippable());
        assert!(!TleFitError::DegenerateVector.is_skippable());
    }

    #[test]
    fn iod_kind_converts() {
        let err: TleFitError = IodFailureKind::NotChronological.into();
        assert_eq!(
            err,
            TleFitError::IodFailure(IodFailureKind::NotChronological)
        );
        assert_ne!(err, TleFitError::DegenerateVector);
    }
}
