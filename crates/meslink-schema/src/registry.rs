use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::definition::{ParameterDefinition, ParameterKind};
use crate::document::parse_definitions;
use crate::error::{Result, SchemaError};

/// Name-keyed parameter definitions, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSchema {
    definitions: IndexMap<String, ParameterDefinition>,
}

impl ParameterSchema {
    /// Build a schema from an ordered definition list.
    ///
    /// Fails unless the ids read 1..N in list order and every name is
    /// non-empty and unique. Lists are never reordered.
    pub fn new(definitions: Vec<ParameterDefinition>) -> Result<Self> {
        validate(&definitions)?;

        let definitions: IndexMap<String, ParameterDefinition> = definitions
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();
        debug!(parameters = definitions.len(), "parameter schema loaded");
        Ok(Self { definitions })
    }

    /// A schema without standard parameters; every response key passes
    /// through untyped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a schema from a JSON document string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_json_value(&document)
    }

    /// Build a schema from a parsed JSON document.
    pub fn from_json_value(document: &Value) -> Result<Self> {
        Self::new(parse_definitions(document)?)
    }

    /// Load a schema from a JSON document on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Definition for a wire key.
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.get(name)
    }

    /// Declared kind for a wire key.
    pub fn kind_of(&self, name: &str) -> Option<ParameterKind> {
        self.get(name).map(|def| def.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition by sequential id.
    pub fn by_id(&self, id: u32) -> Option<&ParameterDefinition> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.definitions.get_index(index).map(|(_, def)| def)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.values()
    }
}

impl TryFrom<Vec<ParameterDefinition>> for ParameterSchema {
    type Error = SchemaError;

    fn try_from(definitions: Vec<ParameterDefinition>) -> Result<Self> {
        Self::new(definitions)
    }
}

/// The n-th definition must carry id n.
fn validate(definitions: &[ParameterDefinition]) -> Result<()> {
    let mut names = HashSet::with_capacity(definitions.len());
    let mut previous: Option<u32> = None;

    for (index, def) in definitions.iter().enumerate() {
        if def.name.trim().is_empty() {
            return Err(SchemaError::MissingName { id: def.id });
        }
        if previous == Some(def.id) {
            return Err(SchemaError::DuplicateId(def.id));
        }

        let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if def.id != expected {
            return Err(SchemaError::NonContiguousIds {
                expected,
                found: def.id,
            });
        }

        if !names.insert(def.name.as_str()) {
            return Err(SchemaError::DuplicateName(def.name.clone()));
        }
        previous = Some(def.id);
    }

    Ok(())
}
