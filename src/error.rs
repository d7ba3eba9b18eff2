use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid index line {line}: {reason}")]
    InvalidIndex { line: usize, reason: String },

    #[error("{0} boundary fragment(s) could not be resolved")]
    UnresolvedFragments(usize),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body printed by the binary when a command fails.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    /// Short machine-readable name, used in JSON error output.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidRange(_) => "InvalidRange",
            Error::InvalidIndex { .. } => "InvalidIndex",
            Error::UnresolvedFragments(_) => "UnresolvedFragments",
            Error::Storage(_) => "StorageError",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error: self.error_type(),
            message: self.to_string(),
        }
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Storage and io failures are treated as transient; everything else is
    /// a property of the input and will fail again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }
}
