// Schema resolver
//
// Collects the rules that apply to an invocation and merges them into one
// effective schema. Precedence, lowest first:
//   (all, all) < (all, role) < (method, all) < (method, role)

use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::context::HookContext;
use crate::error::HookError;
use crate::merge::{self, ArrayMerge};
use crate::registry::{RegistryStore, RuleKey};
use crate::rule::Selector;

/// Resolves the effective schema of an invocation against a registry
#[derive(Debug, Clone)]
pub struct SchemaResolver {
	registry: RegistryStore,
}

impl SchemaResolver {
	pub fn new(registry: RegistryStore) -> Self {
		Self { registry }
	}

	/// Candidate keys in precedence order. A principal without a role only
	/// reaches the wildcard-role slots.
	pub fn candidate_keys(ctx: &HookContext) -> Vec<RuleKey> {
		let method = Selector::Named(ctx.method.clone());
		let role = ctx.role().map(|r| Selector::Named(r.to_string()));

		let mut keys = Vec::with_capacity(4);
		keys.push(RuleKey::new(&ctx.path, ctx.phase, Selector::All, Selector::All));
		if let Some(role) = &role {
			keys.push(RuleKey::new(&ctx.path, ctx.phase, Selector::All, role.clone()));
		}
		keys.push(RuleKey::new(&ctx.path, ctx.phase, method.clone(), Selector::All));
		if let Some(role) = role {
			keys.push(RuleKey::new(&ctx.path, ctx.phase, method, role));
		}
		keys
	}

	/// Effective schema for `ctx`, or `None` when nothing applies. The first
	/// rule that fails to resolve fails the whole resolution.
	pub async fn resolve(&self, ctx: &HookContext) -> Result<Option<Value>, HookError> {
		let snapshot = self.registry.snapshot();
		let is_self = ctx.is_self();

		let matched: Vec<_> = Self::candidate_keys(ctx)
			.into_iter()
			.filter_map(|key| {
				let rule = snapshot.get(&key)?;
				debug!(target: "schema_validation", key = %key, "rule matched");
				Some(rule)
			})
			.collect();

		if matched.is_empty() {
			debug!(
				target: "schema_validation",
				path = %ctx.path,
				method = %ctx.method,
				phase = %ctx.phase,
				"no rules apply"
			);
			return Ok(None);
		}

		// Rules are side-effect free, so they are resolved concurrently; the
		// results keep slot order for the merge.
		let schemas = try_join_all(matched.iter().map(|rule| rule.resolve(ctx, is_self))).await?;
		let effective = merge::merge_all(schemas, ArrayMerge::Schema);

		if merge::is_empty(&effective) {
			Ok(None)
		} else {
			Ok(Some(effective))
		}
	}
}
