//! Error types for the OpenStack HTTP backend.

use thiserror::Error;

/// Errors raised by the OpenStack backend.
#[derive(Debug, Error)]
pub enum OpenStackError {
    /// Raised when the backend configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the HTTP request itself fails (connect, TLS, decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Raised when the service answers 404 for a resource.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind (`backup`, `volume`, `server`).
        resource: &'static str,
        /// Identifier used in the lookup.
        id: String,
    },
    /// Raised when the service answers any other non-success status.
    #[error("api error {status} for {resource} {id}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Resource kind the request addressed.
        resource: &'static str,
        /// Identifier used in the request.
        id: String,
        /// Response body, where one was readable.
        message: String,
    },
}
