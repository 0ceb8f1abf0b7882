/// Errors raised while building a parameter schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema document could not be read.
    #[error("failed to load parameter schema: {0}")]
    LoadFailed(String),

    /// The schema document does not match the expected shape.
    #[error("parameter schema document is invalid: {0}")]
    InvalidDocument(String),

    /// The schema document is not valid JSON.
    #[error("parameter schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A definition has an empty name.
    #[error("parameter {id} has no name")]
    MissingName { id: u32 },

    /// Two definitions share an id.
    #[error("parameter id {0} is defined more than once")]
    DuplicateId(u32),

    /// Two definitions share a name.
    #[error("parameter name '{0}' is defined more than once")]
    DuplicateName(String),

    /// Ids do not form the sequence 1..N.
    #[error("parameter ids are not contiguous: expected {expected}, found {found}")]
    NonContiguousIds { expected: u32, found: u32 },

    /// A kind code other than 1 (Int16), 2 (Int32) or 3 (String).
    #[error("unsupported parameter kind code {0} (expected 1, 2 or 3)")]
    UnsupportedKind(i64),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
