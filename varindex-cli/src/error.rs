//! Error type for CLI commands.

use std::fmt;

use varindex::IndexError;

/// Errors reported by CLI commands. Any of them exits the process non-zero.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be located or is unusable.
    Config(String),

    /// An argument could not be interpreted.
    InvalidArgument(String),

    /// The requested package is not in the index.
    NotFound(String),

    /// The index reported an error.
    Index(IndexError),

    /// A rebuild was superseded before it completed.
    Cancelled,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::NotFound(what) => write!(f, "Not found: {}", what),
            CliError::Index(e) => write!(f, "{}", e),
            CliError::Cancelled => write!(f, "Operation was cancelled"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Index(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}
