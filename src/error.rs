//! Error types.
//!
//! - `FitError` is what the library returns. Each variant is a fatal input or
//!   environment problem; a solver that ran but did not converge is *not* an
//!   error (see `fit::FitOutcome::NotConverged`).
//! - `AppError` is the binary boundary: a message plus a process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    /// A parameter token could not be parsed.
    #[error("Invalid parameter `{token}`: {reason}")]
    MalformedParameter { token: String, reason: String },

    /// The transform library rejected a projection definition.
    #[error("Invalid projection `{definition}`: {reason}")]
    MalformedProjection { definition: String, reason: String },

    /// A coordinate tuple had neither 2 nor 3 components.
    #[error("Two or three coordinates expected, got {found}")]
    ArityMismatch { found: usize },

    /// The transform library could not transform a point.
    #[error("Cannot transform point `{label}`: {reason}")]
    Transform { label: String, reason: String },

    /// A line of a point file could not be parsed.
    #[error("Line {line}: {message}")]
    PointFormat { line: usize, message: String },

    /// A point file could not be decoded with the requested encoding.
    #[error("Cannot decode points as {encoding}: {reason}")]
    Encoding { encoding: String, reason: String },

    /// A definition has no mapping in the requested interchange format.
    #[error("Cannot export `{definition}`: {reason}")]
    UnsupportedExport { definition: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FitError {
    pub fn malformed_parameter(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedParameter {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::MalformedParameter { .. }
            | FitError::ArityMismatch { .. }
            | FitError::PointFormat { .. }
            | FitError::Encoding { .. }
            | FitError::Io { .. } => 2,
            FitError::MalformedProjection { .. } | FitError::Transform { .. } => 3,
            FitError::UnsupportedExport { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// An error whose message was already reported on stdout.
    pub fn silent(exit_code: u8) -> Self {
        Self::new(exit_code, String::new())
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn is_silent(&self) -> bool {
        self.message.is_empty()
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_input_and_projection_errors() {
        let param = FitError::malformed_parameter("+x_0~abc", "not a number");
        let proj = FitError::MalformedProjection {
            definition: "+proj=nope".to_string(),
            reason: "unknown projection".to_string(),
        };
        assert_eq!(AppError::from(param).exit_code(), 2);
        assert_eq!(AppError::from(proj).exit_code(), 3);
    }

    #[test]
    fn silent_error_has_no_message() {
        let err = AppError::silent(1);
        assert!(err.is_silent());
        assert_eq!(err.exit_code(), 1);
    }
}
