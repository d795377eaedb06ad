// Default schema engine backed by the `jsonschema` crate

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::shape::{coerce_types, remove_additional};
use super::{CompiledSchema, SchemaEngine, bind_principal};
use crate::config::EngineConfig;
use crate::context::Principal;
use crate::error::{HookError, Violation};

/// JSON Schema engine. Coerces and strips payloads according to its
/// [`EngineConfig`] before checking them.
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaEngine {
	config: EngineConfig,
}

impl JsonSchemaEngine {
	pub fn new(config: EngineConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}
}

#[async_trait]
impl SchemaEngine for JsonSchemaEngine {
	async fn compile(&self, schema: &Value, principal: &Principal) -> Result<Arc<dyn CompiledSchema>, HookError> {
		let bound = bind_principal(schema, principal);
		let validator = jsonschema::options()
			.should_validate_formats(self.config.validate_formats)
			.build(&bound)
			.map_err(|e| HookError::configuration(format!("invalid schema: {e}")))?;

		debug!(target: "schema_validation", role = ?principal.role, "compiled effective schema");
		Ok(Arc::new(JsonSchemaValidator {
			schema: bound,
			validator,
			config: self.config.clone(),
		}))
	}
}

/// A compiled JSON Schema bound to one principal
pub struct JsonSchemaValidator {
	schema: Value,
	validator: jsonschema::Validator,
	config: EngineConfig,
}

impl JsonSchemaValidator {
	/// The bound schema this validator was built from
	pub fn schema(&self) -> &Value {
		&self.schema
	}
}

impl fmt::Debug for JsonSchemaValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JsonSchemaValidator")
			.field("schema", &self.schema)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl CompiledSchema for JsonSchemaValidator {
	async fn validate(&self, payload: &mut Value) -> Result<(), Vec<Violation>> {
		let mut working = payload.clone();
		if self.config.coerce_types {
			coerce_types(&self.schema, &mut working);
		}
		if self.config.remove_additional {
			remove_additional(&self.schema, &mut working);
		}

		let violations: Vec<Violation> = self
			.validator
			.iter_errors(&working)
			.map(|e| Violation::new(e.instance_path().to_string(), e.schema_path().to_string(), e.to_string()))
			.collect();
		if !violations.is_empty() {
			return Err(violations);
		}

		*payload = working;
		Ok(())
	}
}
