// Hook configuration

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::defaults::{DefaultDeclaration, DefaultRule};
use crate::error::HookError;
use crate::registry::SchemaDeclaration;

/// Options of the default schema engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
	/// Coerce primitives to their declared type
	pub coerce_types: bool,
	/// Remove properties the schema does not declare
	pub remove_additional: bool,
	/// Assert `format` keywords
	pub validate_formats: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			coerce_types: true,
			remove_additional: true,
			validate_formats: false,
		}
	}
}

/// Static configuration of one resource's hooks.
///
/// ```yaml
/// resource: users
/// engine:
///   validateFormats: true
/// schemas:
///   before:
///     create:
///       all: { type: object, properties: { name: { type: string } } }
/// defaults:
///   member: { plan: free }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookConfig {
	pub resource: String,
	#[serde(default)]
	pub engine: EngineConfig,
	/// Declaration nested as phase -> method -> role -> schema
	#[serde(default)]
	pub schemas: Value,
	/// Static defaults keyed by role
	#[serde(default)]
	pub defaults: BTreeMap<String, Value>,
}

impl HookConfig {
	/// Read a YAML or JSON config file
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HookError> {
		let path = path.as_ref();
		info!(target: "schema_validation", "Loading hook config from file: {}", path.display());
		let content = fs_err::read_to_string(path)?;
		Self::from_yaml_str(&content)
	}

	pub fn from_yaml_str(content: &str) -> Result<Self, HookError> {
		let config: HookConfig = serde_yaml::from_str(content)?;
		Ok(config)
	}

	/// Schema declaration built from `schemas`
	pub fn declaration(&self) -> Result<SchemaDeclaration, HookError> {
		if self.schemas.is_null() {
			return Ok(SchemaDeclaration::new());
		}
		SchemaDeclaration::from_value(self.schemas.clone())
	}

	/// Default declaration built from `defaults`
	pub fn default_declaration(&self) -> DefaultDeclaration {
		self.defaults
			.iter()
			.fold(DefaultDeclaration::new(), |declaration, (role, value)| {
				declaration.role(role.as_str(), DefaultRule::Static(value.clone()))
			})
	}
}
