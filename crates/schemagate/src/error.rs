// Hook error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level violation reported by a compiled schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
	/// JSON pointer to the offending value inside the payload
	pub instance_path: String,
	/// JSON pointer to the schema keyword that failed
	pub schema_path: String,
	/// Failing keyword (e.g. `type`, `required`)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub keyword: Option<String>,
	/// Human-readable description
	pub message: String,
}

impl Violation {
	pub fn new(instance_path: impl Into<String>, schema_path: impl Into<String>, message: impl Into<String>) -> Self {
		let schema_path = schema_path.into();
		let keyword = schema_path
			.rsplit('/')
			.next()
			.filter(|k| !k.is_empty())
			.map(|k| k.to_string());
		Self {
			instance_path: instance_path.into(),
			schema_path,
			keyword,
			message: message.into(),
		}
	}
}

/// Errors raised by the validation and defaults hooks
#[derive(Error, Debug)]
pub enum HookError {
	/// Missing or malformed registration input. Raised at setup time.
	#[error("{0}")]
	Configuration(String),

	/// A dynamic rule or default provider could not produce its value
	#[error("resolution failed: {0}")]
	Resolution(String),

	/// The payload was rejected. Displays as the JSON array of violations.
	#[error("{}", render_violations(.violations))]
	Validation { violations: Vec<Violation> },
}

impl HookError {
	pub fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration(message.into())
	}

	pub fn resolution(message: impl Into<String>) -> Self {
		Self::Resolution(message.into())
	}

	pub fn validation(violations: Vec<Violation>) -> Self {
		Self::Validation { violations }
	}

	/// Violations carried by a validation failure, empty for other kinds
	pub fn violations(&self) -> &[Violation] {
		match self {
			HookError::Validation { violations } => violations,
			HookError::Configuration(_) | HookError::Resolution(_) => &[],
		}
	}
}

fn render_violations(violations: &[Violation]) -> String {
	serde_json::to_string(violations).unwrap_or_else(|_| "[]".to_string())
}

impl From<serde_json::Error> for HookError {
	fn from(e: serde_json::Error) -> Self {
		Self::Configuration(format!("failed to parse declaration: {e}"))
	}
}

impl From<serde_yaml::Error> for HookError {
	fn from(e: serde_yaml::Error) -> Self {
		Self::Configuration(format!("failed to parse declaration: {e}"))
	}
}

impl From<std::io::Error> for HookError {
	fn from(e: std::io::Error) -> Self {
		Self::Configuration(format!("failed to read declaration file: {e}"))
	}
}
