// Schema engine seam
//
// An engine compiles an effective schema, bound to the acting principal, into
// a validator that checks and sanitizes payloads. `JsonSchemaEngine` is the
// default implementation.

mod json_schema;
mod shape;

pub use json_schema::{JsonSchemaEngine, JsonSchemaValidator};
pub use shape::{coerce_types, remove_additional};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Principal;
use crate::error::{HookError, Violation};

/// Placeholder key replaced by a principal attribute at compile time:
/// `{ "const": { "$principal": "_id" } }`
pub const PRINCIPAL_REF: &str = "$principal";

/// Compiles effective schemas into executable validators
#[async_trait]
pub trait SchemaEngine: Send + Sync {
	/// Compile `schema` with `principal` as its evaluation context.
	///
	/// A schema the engine cannot compile is a configuration problem and is
	/// reported as [`HookError::Configuration`].
	async fn compile(&self, schema: &Value, principal: &Principal) -> Result<Arc<dyn CompiledSchema>, HookError>;
}

/// An executable validator
#[async_trait]
pub trait CompiledSchema: Send + Sync {
	/// Validate `payload`. On success the payload may have been rewritten
	/// (coerced, undeclared properties removed); on failure it is untouched.
	async fn validate(&self, payload: &mut Value) -> Result<(), Vec<Violation>>;
}

/// Replace every `{ "$principal": "<name>" }` node with the named principal
/// attribute (`_id`, `role` or any extra attribute). Missing attributes
/// become `null`.
pub fn bind_principal(schema: &Value, principal: &Principal) -> Value {
	match schema {
		Value::Object(map) => {
			if map.len() == 1 {
				if let Some(Value::String(name)) = map.get(PRINCIPAL_REF) {
					return principal_attribute(principal, name);
				}
			}
			Value::Object(
				map
					.iter()
					.map(|(k, v)| (k.clone(), bind_principal(v, principal)))
					.collect(),
			)
		},
		Value::Array(items) => Value::Array(items.iter().map(|v| bind_principal(v, principal)).collect()),
		other => other.clone(),
	}
}

fn principal_attribute(principal: &Principal, name: &str) -> Value {
	match name {
		"_id" => principal.id.clone().unwrap_or(Value::Null),
		"role" => principal.role.clone().map(Value::String).unwrap_or(Value::Null),
		other => principal.attribute(other).cloned().unwrap_or(Value::Null),
	}
}
