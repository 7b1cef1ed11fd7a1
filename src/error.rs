//! Crate-level error types

use thiserror::Error;

use crate::protocol::ParseError;

/// Error type for relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Handler registration was attempted after the broker left the
    /// configuring state.
    #[error("unable to add {kind} handler after broker setup")]
    HandlerRegistration {
        /// Which handler list the registration targeted
        kind: &'static str,
    },

    /// The broker has not been set up yet
    #[error("broker is not set up")]
    NotSetup,

    /// Frame parse failure
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// I/O error (bind, accept)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
