use meslink_schema::ParameterKind;

/// Errors raised while encoding or decoding service packages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Nothing follows the response preamble.
    #[error("response has no content after the preamble")]
    EmptyResponse,

    /// A segment does not contain exactly one `=`.
    #[error("malformed segment '{0}': expected exactly one '='")]
    MalformedSegment(String),

    /// A key occurs more than once in one response.
    #[error("duplicate key '{0}' in response")]
    DuplicateKey(String),

    /// A standard parameter value does not parse as its declared kind.
    #[error("value '{value}' of parameter '{name}' is not a valid {kind}")]
    InvalidValue {
        name: String,
        kind: ParameterKind,
        value: String,
    },

    /// A header field (`MClass`, `MNo`, `ErrorState`) is not a 16-bit integer.
    #[error("header field {name} has non-numeric value '{value}'")]
    InvalidHeader { name: &'static str, value: String },

    /// A request name or value would break the wire grammar.
    #[error("cannot encode '{token}': {reason}")]
    InvalidToken { token: String, reason: &'static str },

    /// The response bytes are not text.
    #[error("response is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
