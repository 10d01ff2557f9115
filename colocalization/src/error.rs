use thiserror::Error;

/// Errors raised by the colocalization stages.
///
/// Empty outcomes (a channel without objects, a channel pair without any
/// partner inside the distance cutoff) are not errors; they come back as empty
/// but well-formed results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColocalizationError {
    /// A configuration value is out of range or unrecognized.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Cross-channel matching needs at least two channels.
    #[error("at least two channels are required for distance measurements, found {found}")]
    InsufficientChannels { found: usize },

    /// Two buffers that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
}

impl ColocalizationError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ColocalizationError::InvalidParameter(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ColocalizationError>;
