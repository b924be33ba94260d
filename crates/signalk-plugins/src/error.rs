//! Errors a calculation can fail with.

use thiserror::Error;

/// Why a calculation cycle produced nothing.
///
/// None of these are fatal: the scheduler reports them as the plugin's
/// provider error and waits for the next trigger.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    /// Network or timeout failure talking to a provider.
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider answered but reported an error in the payload.
    #[error("error response: {0}")]
    Provider(String),

    /// No vessel position is available.
    #[error("no position")]
    NoPosition,

    /// A cache file exists but could not be parsed.
    #[error("malformed cache: {0}")]
    MalformedCache(String),

    /// An input value could not be decoded.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
