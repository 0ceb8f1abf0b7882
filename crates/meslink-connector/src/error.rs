use meslink_codec::CodecError;
use meslink_schema::SchemaError;
use meslink_transport::TransportError;

/// Errors surfaced by the [`Connector`](crate::Connector).
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The configured host is empty.
    #[error("MES host must not be empty")]
    InvalidHost,

    /// The parameter schema failed validation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Opening the sessions failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// A service call could not be completed on the wire.
    #[error("service call failed: {0}")]
    ServiceCall(#[source] TransportError),

    /// The request could not be encoded or the response could not be decoded.
    #[error("protocol format error: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
