// Schema declarations: phase -> method -> role -> rule

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::context::Phase;
use crate::error::HookError;
use crate::rule::{Rule, Selector};

/// One rule together with the slot it was declared for
#[derive(Debug, Clone)]
pub struct DeclaredRule {
	pub phase: Phase,
	pub method: Selector,
	pub role: Selector,
	pub rule: Rule,
}

/// All rules declared for a single resource
#[derive(Clone, Default)]
pub struct SchemaDeclaration {
	entries: Vec<DeclaredRule>,
}

type StaticDeclaration = BTreeMap<Phase, BTreeMap<Selector, BTreeMap<Selector, Value>>>;

impl SchemaDeclaration {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`SchemaDeclaration::insert`]
	pub fn rule(
		mut self,
		phase: Phase,
		method: impl Into<Selector>,
		role: impl Into<Selector>,
		rule: impl Into<Rule>,
	) -> Self {
		self.insert(phase, method, role, rule);
		self
	}

	/// Declare a rule. A rule already declared for the same slot is replaced.
	pub fn insert(
		&mut self,
		phase: Phase,
		method: impl Into<Selector>,
		role: impl Into<Selector>,
		rule: impl Into<Rule>,
	) {
		let method = method.into();
		let role = role.into();
		let rule = rule.into();

		if let Some(existing) = self
			.entries
			.iter_mut()
			.find(|e| e.phase == phase && e.method == method && e.role == role)
		{
			existing.rule = rule;
			return;
		}

		self.entries.push(DeclaredRule {
			phase,
			method,
			role,
			rule,
		});
	}

	/// Parse a static declaration (`{ before: { create: { all: {...} } } }`)
	pub fn from_value(value: Value) -> Result<Self, HookError> {
		let parsed: StaticDeclaration = serde_json::from_value(value)?;

		let mut declaration = Self::new();
		for (phase, methods) in parsed {
			for (method, roles) in methods {
				for (role, schema) in roles {
					declaration.insert(phase, method.clone(), role, Rule::Static(schema));
				}
			}
		}
		Ok(declaration)
	}

	/// Parse a static declaration from YAML or JSON text
	pub fn from_yaml_str(content: &str) -> Result<Self, HookError> {
		let value: Value = serde_yaml::from_str(content)?;
		Self::from_value(value)
	}

	pub fn iter(&self) -> impl Iterator<Item = &DeclaredRule> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for SchemaDeclaration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut nested: BTreeMap<Phase, BTreeMap<&str, BTreeMap<&str, &Rule>>> = BTreeMap::new();
		for entry in &self.entries {
			nested
				.entry(entry.phase)
				.or_default()
				.entry(entry.method.as_str())
				.or_default()
				.insert(entry.role.as_str(), &entry.rule);
		}
		f.debug_map().entries(nested.iter()).finish()
	}
}
