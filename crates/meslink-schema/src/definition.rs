use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Scalar kind of a standard parameter, with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ParameterKind {
    Int16 = 1,
    Int32 = 2,
    String = 3,
}

impl ParameterKind {
    /// Resolve a kind code as it appears in schema documents.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(Self::Int16),
            2 => Ok(Self::Int32),
            3 => Ok(Self::String),
            other => Err(SchemaError::UnsupportedKind(other)),
        }
    }

    /// Kind code as it appears in schema documents.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::String => "string",
        }
    }
}

impl TryFrom<u8> for ParameterKind {
    type Error = SchemaError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(i64::from(code))
    }
}

impl From<ParameterKind> for u8 {
    fn from(kind: ParameterKind) -> Self {
        kind.code()
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Sequential id, starting at 1.
    pub id: u32,
    /// Key used on the wire.
    pub name: String,
    pub kind: ParameterKind,
    /// Declared length for string parameters; informational.
    #[serde(default)]
    pub string_length: u32,
    /// PLC address the parameter maps to; informational.
    #[serde(default)]
    pub address: u32,
}

impl ParameterDefinition {
    pub fn new(id: u32, name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            string_length: 0,
            address: 0,
        }
    }

    pub fn with_string_length(mut self, string_length: u32) -> Self {
        self.string_length = string_length;
        self
    }

    pub fn with_address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }
}
