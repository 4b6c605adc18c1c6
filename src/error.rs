//! Crate-level error for pipeline operations.

use thiserror::Error;

use crate::extract::ExtractionError;
use crate::gateway::OracleError;
use crate::map::MapError;
use crate::prompts::UnknownIntent;
use crate::sanitize::SanitizeError;

/// Everything a single pipeline operation can fail with. Failures are
/// per-call and never retried.
#[derive(Debug, Error)]
pub enum QuadrantError {
    #[error("unknown intent: {0}")]
    UnknownIntent(String),
    /// Credentials missing or the service could not be reached.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[source] OracleError),
    /// The service answered, but not with a usable completion.
    #[error("oracle error: {0}")]
    OracleError(#[source] OracleError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("oracle response has no numeric coordinates (missing or non-numeric {field})")]
    MissingCoordinates { field: &'static str },
    #[error("suggestion has no name")]
    MissingName,
    #[error("unknown axis: {0}")]
    UnknownAxis(String),
    #[error(transparent)]
    Map(MapError),
}

impl QuadrantError {
    /// Stable short code for logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            QuadrantError::UnknownIntent(_) => "unknown_intent",
            QuadrantError::OracleUnavailable(_) => "oracle_unavailable",
            QuadrantError::OracleError(_) => "oracle_error",
            QuadrantError::Extraction(_) => "extraction",
            QuadrantError::MissingCoordinates { .. } => "missing_coordinates",
            QuadrantError::MissingName => "missing_name",
            QuadrantError::UnknownAxis(_) => "unknown_axis",
            QuadrantError::Map(_) => "map",
        }
    }
}

impl From<OracleError> for QuadrantError {
    fn from(err: OracleError) -> Self {
        if err.is_unavailable() {
            QuadrantError::OracleUnavailable(err)
        } else {
            QuadrantError::OracleError(err)
        }
    }
}

impl From<SanitizeError> for QuadrantError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::MissingCoordinates { field } => {
                QuadrantError::MissingCoordinates { field }
            }
            SanitizeError::MissingName => QuadrantError::MissingName,
        }
    }
}

impl From<MapError> for QuadrantError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::UnknownAxis(id) => QuadrantError::UnknownAxis(id),
            other => QuadrantError::Map(other),
        }
    }
}

impl From<UnknownIntent> for QuadrantError {
    fn from(err: UnknownIntent) -> Self {
        QuadrantError::UnknownIntent(err.0)
    }
}
