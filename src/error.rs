// Error types shared by the controller and messaging clients.
//
// The UI layer works with `anyhow::Result`; everything below it returns
// one of these typed errors so callers (and tests) can match on the
// failure instead of parsing strings.

use crate::transport::Verb;

/// Login to the controller was rejected or the controller was unreachable.
///
/// The underlying cause is logged, not carried; the message is shown to
/// the operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection to APIC-EM API failed, please verify user credentials")]
pub struct AuthenticationError;

/// Failure of a single network round trip.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("http error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Request(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Errors raised while dispatching one logical API call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Re-authentication during the session-expiry retry failed.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The server answered with a status the caller does not accept.
    #[error("the following status code was returned: {0}")]
    Status(u16),

    /// The verb exists in the request model but no transport call is wired
    /// to it. This is a programming error, not a runtime fault.
    #[error("unsupported verb: {0}")]
    UnsupportedVerb(Verb),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid json response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid xml response: {0}")]
    Xml(String),

    /// The body decoded fine but not in the encoding the caller asked for.
    #[error("unexpected response encoding, expected {0}")]
    UnexpectedEncoding(&'static str),

    #[error("invalid resource url: {0}")]
    Url(#[from] url::ParseError),
}

impl DispatchError {
    /// Status code carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Status(code) => Some(*code),
            _ => None,
        }
    }
}
