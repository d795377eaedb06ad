// Declaration client for loading static declarations from files

use std::path::{Path, PathBuf};

use tracing::info;

use super::declaration::SchemaDeclaration;
use crate::error::HookError;

/// Loads a static schema declaration from a YAML or JSON file
#[derive(Debug, Clone)]
pub struct DeclarationClient {
	path: PathBuf,
}

impl DeclarationClient {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Create a client from `file:///path` or a plain path
	pub fn from_uri(uri: &str) -> Result<Self, HookError> {
		if uri.is_empty() {
			return Err(HookError::configuration("empty declaration source"));
		}
		if let Some(path) = uri.strip_prefix("file://") {
			return Ok(Self::new(path));
		}
		if uri.contains("://") {
			return Err(HookError::configuration(format!("unsupported URI scheme: {uri}")));
		}
		Ok(Self::new(uri))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read and parse the declaration
	pub async fn fetch(&self) -> Result<SchemaDeclaration, HookError> {
		info!(target: "schema_validation", "Loading schema declaration from file: {}", self.path.display());
		let content = fs_err::tokio::read_to_string(&self.path).await?;
		let declaration = SchemaDeclaration::from_yaml_str(&content)?;
		info!(target: "schema_validation", "Loaded {} rules from declaration file", declaration.len());
		Ok(declaration)
	}
}
