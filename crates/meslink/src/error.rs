/// Errors raised while loading configuration or building a connector.
#[derive(Debug, thiserror::Error)]
pub enum MeslinkError {
    /// The configuration file could not be read.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),

    /// The configuration document is not valid.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The parameter schema could not be loaded.
    #[error("schema error: {0}")]
    Schema(#[from] meslink_schema::SchemaError),

    /// The connector rejected its settings.
    #[error("connector error: {0}")]
    Connector(#[from] meslink_connector::ConnectorError),
}

pub type Result<T> = std::result::Result<T, MeslinkError>;
