use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::AppError;

/// Target type of the single field requested from the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Integer,
    String,
}

impl FieldType {
    /// JSON Schema type keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::String => "string",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" => Ok(FieldType::Number),
            "integer" => Ok(FieldType::Integer),
            "string" => Ok(FieldType::String),
            other => Err(format!(
                "Unknown field type '{other}' (expected number, integer or string)"
            )),
        }
    }
}

/// Describes the one value the extraction service should return.
///
/// The description is sent along with the schema and is what lets the
/// service pick the right number when the page shows several.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub field_name: String,
    pub value_type: FieldType,
    pub description: String,
}

impl SchemaDescriptor {
    pub fn new(
        field_name: impl Into<String>,
        value_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            value_type,
            description: description.into(),
        }
    }

    /// JSON Schema for an object holding exactly this field.
    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                self.field_name.clone(): {
                    "type": self.value_type.as_str(),
                    "description": self.description,
                }
            },
            "required": [self.field_name],
        })
    }

    /// Validates the service's `data` object against [`Self::to_json_schema`]
    /// and returns the requested field.
    pub fn select_field(&self, data: &Value) -> Result<Value, AppError> {
        let schema = self.to_json_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| AppError::SchemaValidationError(format!("Invalid schema: {e}")))?;

        let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            return Err(AppError::SchemaValidationError(format!(
                "Service data does not match schema for '{}': {}",
                self.field_name,
                errors.join("; ")
            )));
        }

        data.get(&self.field_name).cloned().ok_or_else(|| {
            AppError::SchemaValidationError(format!("Field '{}' missing", self.field_name))
        })
    }
}
