// Validation rules and the selectors that address them

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::HookContext;
use crate::error::HookError;

/// Wildcard token accepted for methods and roles in declarations
pub const WILDCARD: &str = "all";

/// Method or role selector in a declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
	/// Matches every method (or role)
	All,
	/// Matches exactly one method (or role)
	Named(String),
}

impl Selector {
	pub fn named(name: impl Into<String>) -> Self {
		Self::Named(name.into())
	}

	pub fn as_str(&self) -> &str {
		match self {
			Selector::All => WILDCARD,
			Selector::Named(name) => name,
		}
	}
}

impl From<&str> for Selector {
	fn from(s: &str) -> Self {
		if s == WILDCARD { Self::All } else { Self::Named(s.to_string()) }
	}
}

impl From<String> for Selector {
	fn from(s: String) -> Self {
		if s == WILDCARD { Self::All } else { Self::Named(s) }
	}
}

impl From<Selector> for String {
	fn from(s: Selector) -> Self {
		match s {
			Selector::All => WILDCARD.to_string(),
			Selector::Named(name) => name,
		}
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A schema computed asynchronously from the invocation, e.g. after a lookup.
///
/// Implementations must be pure with respect to shared state: the resolver
/// may run several of them concurrently. An error aborts the invocation.
#[async_trait]
pub trait SchemaRule: Send + Sync {
	async fn resolve(&self, ctx: &HookContext, is_self: bool) -> Result<Value, HookError>;
}

/// Synchronous schema function of the invocation
pub type SchemaFn = dyn Fn(&HookContext, bool) -> Result<Value, HookError> + Send + Sync;

/// One validation rule as declared for a (phase, method, role) slot
#[derive(Clone)]
pub enum Rule {
	/// Fixed structural schema
	Static(Value),
	/// Schema computed from the context and the is-self flag
	Dynamic(Arc<SchemaFn>),
	/// Schema computed asynchronously
	DynamicAsync(Arc<dyn SchemaRule>),
}

impl Rule {
	pub fn dynamic<F>(f: F) -> Self
	where
		F: Fn(&HookContext, bool) -> Result<Value, HookError> + Send + Sync + 'static,
	{
		Self::Dynamic(Arc::new(f))
	}

	pub fn dynamic_async(rule: impl SchemaRule + 'static) -> Self {
		Self::DynamicAsync(Arc::new(rule))
	}

	/// Turn the rule into a concrete schema for this invocation
	pub async fn resolve(&self, ctx: &HookContext, is_self: bool) -> Result<Value, HookError> {
		match self {
			Rule::Static(schema) => Ok(schema.clone()),
			Rule::Dynamic(f) => f(ctx, is_self),
			Rule::DynamicAsync(rule) => rule.resolve(ctx, is_self).await,
		}
	}

	pub fn is_static(&self) -> bool {
		matches!(self, Rule::Static(_))
	}
}

impl From<Value> for Rule {
	fn from(schema: Value) -> Self {
		Self::Static(schema)
	}
}

impl fmt::Debug for Rule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Rule::Static(schema) => write!(f, "{schema}"),
			Rule::Dynamic(_) => f.write_str("[Function]"),
			Rule::DynamicAsync(_) => f.write_str("[AsyncFunction]"),
		}
	}
}
