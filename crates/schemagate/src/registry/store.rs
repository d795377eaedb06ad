// Registry store holding the flattened rule table
//
// The table is published as an immutable snapshot; registration builds a new
// snapshot and swaps it in, so readers never observe a half-registered
// resource.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use itertools::Itertools;
use tracing::info;

use super::declaration::SchemaDeclaration;
use crate::context::Phase;
use crate::error::HookError;
use crate::rule::{Rule, Selector};

/// Composite lookup key `resource:phase:method:role`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
	pub resource: String,
	pub phase: Phase,
	pub method: Selector,
	pub role: Selector,
}

impl RuleKey {
	pub fn new(
		resource: impl Into<String>,
		phase: Phase,
		method: impl Into<Selector>,
		role: impl Into<Selector>,
	) -> Self {
		Self {
			resource: resource.into(),
			phase,
			method: method.into(),
			role: role.into(),
		}
	}
}

impl fmt::Display for RuleKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}:{}", self.resource, self.phase, self.method, self.role)
	}
}

/// Immutable snapshot of every registered rule
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
	rules: HashMap<RuleKey, Rule>,
}

impl SchemaRegistry {
	pub fn get(&self, key: &RuleKey) -> Option<&Rule> {
		self.rules.get(key)
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Keys registered for one resource, in `resource:phase:method:role` order
	pub fn keys_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a RuleKey> + 'a {
		self
			.rules
			.keys()
			.filter(move |k| k.resource == resource)
			.sorted_by_key(|k| k.to_string())
	}
}

/// Shared handle to the rule table. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct RegistryStore {
	current: Arc<ArcSwap<SchemaRegistry>>,
}

impl RegistryStore {
	/// Create an empty store
	pub fn new() -> Self {
		Self::default()
	}

	/// Flatten a resource's declaration into the table.
	///
	/// Entries for the same keys are overwritten; keys of other resources, and
	/// keys of this resource absent from `declaration`, are left untouched.
	/// Returns the number of rules written.
	pub fn register(&self, resource: &str, declaration: &SchemaDeclaration) -> Result<usize, HookError> {
		if declaration.is_empty() {
			return Err(HookError::configuration(format!(
				"No schema definition provided for service: {resource}"
			)));
		}

		if resource.is_empty() {
			return Err(HookError::configuration(format!(
				"No service name provided from schema: {declaration:?}"
			)));
		}

		self.current.rcu(|current| {
			let mut next = SchemaRegistry::clone(current);
			for entry in declaration.iter() {
				let key = RuleKey::new(resource, entry.phase, entry.method.clone(), entry.role.clone());
				next.rules.insert(key, entry.rule.clone());
			}
			next
		});

		info!(
			target: "schema_validation",
			resource,
			rules = declaration.len(),
			"registered schema declaration"
		);
		Ok(declaration.len())
	}

	/// Current snapshot; stays valid while held even if a registration lands
	pub fn snapshot(&self) -> Arc<SchemaRegistry> {
		self.current.load_full()
	}

	pub fn get(&self, key: &RuleKey) -> Option<Rule> {
		self.current.load().get(key).cloned()
	}

	pub fn len(&self) -> usize {
		self.current.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.current.load().is_empty()
	}
}
