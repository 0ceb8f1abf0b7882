use std::fmt;

use indexmap::IndexMap;
use meslink_schema::ParameterKind;

/// A scalar carried by a service package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Int16(i16),
    Int32(i32),
    Str(String),
}

impl ParamValue {
    /// Schema kind this value belongs to.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Int16(_) => ParameterKind::Int16,
            Self::Int32(_) => ParameterKind::Int32,
            Self::Str(_) => ParameterKind::String,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::Int16(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer value, widening 16-bit values.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int16(value) => Some(i32::from(*value)),
            Self::Int32(value) => Some(*value),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16(value) => write!(f, "{value}"),
            Self::Int32(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<i16> for ParamValue {
    fn from(value: i16) -> Self {
        Self::Int16(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Insertion-ordered parameters keyed by name.
pub type ParameterMap = IndexMap<String, ParamValue>;

/// One request or response unit of the service protocol.
///
/// Requests are built by the caller; responses come out of
/// [`decode_response`](crate::decode_response). Only the standard
/// parameters of a request are written to the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePackage {
    pub message_class: i16,
    pub message_number: i16,
    pub error_state: i16,
    /// Schema-declared parameters, typed.
    pub standard_parameters: ParameterMap,
    /// Parameters unknown to the schema, passed through as strings.
    pub service_specific_parameters: ParameterMap,
}

impl ServicePackage {
    /// Start a request for service `message_class`/`message_number`.
    pub fn request(message_class: i16, message_number: i16) -> Self {
        Self {
            message_class,
            message_number,
            ..Self::default()
        }
    }

    pub fn with_error_state(mut self, error_state: i16) -> Self {
        self.error_state = error_state;
        self
    }

    /// Append a standard parameter, keeping insertion order.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.standard_parameters.insert(name.into(), value.into());
        self
    }

    /// Look a parameter up in the standard map, then the service-specific one.
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.standard_parameters
            .get(name)
            .or_else(|| self.service_specific_parameters.get(name))
    }

    /// Whether the MES flagged this package with a non-zero error state.
    pub fn is_error(&self) -> bool {
        self.error_state != 0
    }
}
