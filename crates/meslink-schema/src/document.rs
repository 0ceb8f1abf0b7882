//! JSON schema documents.
//!
//! A schema document is a JSON array of definitions:
//!
//! ```json
//! [
//!   { "id": 1, "name": "ResourceID", "kind": 1, "address": 0 },
//!   { "id": 2, "name": "Barcode", "kind": 3, "stringLength": 40 }
//! ]
//! ```
//!
//! The document shape is checked against an embedded JSON Schema before any
//! definition is built, so malformed input reports every offending field at
//! once instead of failing on the first serde error.

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::Value;

use crate::definition::{ParameterDefinition, ParameterKind};
use crate::error::{Result, SchemaError};

const DOCUMENT_CONTRACT: &str = r#"{
    "type": "array",
    "items": {
        "type": "object",
        "properties": {
            "id": { "type": "integer", "minimum": 1 },
            "name": { "type": "string", "minLength": 1 },
            "kind": { "type": "integer" },
            "stringLength": { "type": "integer", "minimum": 0 },
            "address": { "type": "integer", "minimum": 0 }
        },
        "required": ["id", "name", "kind"],
        "additionalProperties": false
    }
}"#;

const MAX_REPORTED_ERRORS: usize = 4;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    id: u32,
    name: String,
    kind: i64,
    #[serde(default)]
    string_length: u32,
    #[serde(default)]
    address: u32,
}

impl TryFrom<RawDefinition> for ParameterDefinition {
    type Error = SchemaError;

    fn try_from(raw: RawDefinition) -> Result<Self> {
        Ok(ParameterDefinition {
            id: raw.id,
            name: raw.name,
            kind: ParameterKind::from_code(raw.kind)?,
            string_length: raw.string_length,
            address: raw.address,
        })
    }
}

/// Check a document against the contract and turn it into definitions.
///
/// Definitions come back in document order; contiguity is checked later by
/// [`ParameterSchema::new`](crate::ParameterSchema::new).
pub fn parse_definitions(document: &Value) -> Result<Vec<ParameterDefinition>> {
    let contract: Value = serde_json::from_str(DOCUMENT_CONTRACT)?;
    let validator = jsonschema::validator_for(&contract)
        .map_err(|err| SchemaError::LoadFailed(format!("document contract: {err}")))?;
    check_contract(document, &validator)?;

    let raw: Vec<RawDefinition> = serde_json::from_value(document.clone())?;
    raw.into_iter().map(ParameterDefinition::try_from).collect()
}

fn check_contract(document: &Value, validator: &Validator) -> Result<()> {
    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(MAX_REPORTED_ERRORS - 1) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(SchemaError::InvalidDocument(message));
    }
    Ok(())
}
