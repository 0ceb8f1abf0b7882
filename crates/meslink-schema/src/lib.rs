//! Ordered parameter schema for the MES service protocol.
//!
//! The schema tells the service codec which response keys are standard
//! parameters and which scalar kind each one decodes to. It is validated
//! once, when it is built: ids must run 1..N without gaps or duplicates and
//! every definition must carry a unique, non-empty name. A schema that
//! exists is therefore always usable.

pub mod definition;
pub mod document;
pub mod error;
pub mod registry;

pub use definition::{ParameterDefinition, ParameterKind};
pub use error::{Result, SchemaError};
pub use registry::ParameterSchema;
