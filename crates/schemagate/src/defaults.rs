// Defaults Injector
//
// Merges role-specific default values into the input of creation calls. Runs
// after validation, so injected fields are never stripped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::{HookContext, METHOD_CREATE, Phase};
use crate::error::HookError;
use crate::merge::{self, ArrayMerge};
use crate::pipeline::Hook;
use crate::trusted::{NeverTrusted, TrustedSource};

/// Default values computed asynchronously from the invocation. An error
/// aborts the invocation.
#[async_trait]
pub trait DefaultProvider: Send + Sync {
	async fn defaults(&self, ctx: &HookContext) -> Result<Value, HookError>;
}

/// Synchronous default function of the invocation
pub type DefaultFn = dyn Fn(&HookContext) -> Result<Value, HookError> + Send + Sync;

/// Default values declared for one role
#[derive(Clone)]
pub enum DefaultRule {
	Static(Value),
	Dynamic(Arc<DefaultFn>),
	DynamicAsync(Arc<dyn DefaultProvider>),
}

impl DefaultRule {
	pub fn dynamic<F>(f: F) -> Self
	where
		F: Fn(&HookContext) -> Result<Value, HookError> + Send + Sync + 'static,
	{
		Self::Dynamic(Arc::new(f))
	}

	pub fn dynamic_async(provider: impl DefaultProvider + 'static) -> Self {
		Self::DynamicAsync(Arc::new(provider))
	}

	pub async fn resolve(&self, ctx: &HookContext) -> Result<Value, HookError> {
		match self {
			DefaultRule::Static(value) => Ok(value.clone()),
			DefaultRule::Dynamic(f) => f(ctx),
			DefaultRule::DynamicAsync(provider) => provider.defaults(ctx).await,
		}
	}
}

impl From<Value> for DefaultRule {
	fn from(value: Value) -> Self {
		Self::Static(value)
	}
}

impl fmt::Debug for DefaultRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DefaultRule::Static(value) => write!(f, "{value}"),
			DefaultRule::Dynamic(_) => f.write_str("[Function]"),
			DefaultRule::DynamicAsync(_) => f.write_str("[AsyncFunction]"),
		}
	}
}

/// Default rules keyed by role
#[derive(Debug, Clone, Default)]
pub struct DefaultDeclaration {
	roles: HashMap<String, DefaultRule>,
}

impl DefaultDeclaration {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`DefaultDeclaration::insert`]
	pub fn role(mut self, role: impl Into<String>, rule: impl Into<DefaultRule>) -> Self {
		self.insert(role, rule);
		self
	}

	pub fn insert(&mut self, role: impl Into<String>, rule: impl Into<DefaultRule>) {
		self.roles.insert(role.into(), rule.into());
	}

	pub fn get(&self, role: &str) -> Option<&DefaultRule> {
		self.roles.get(role)
	}

	pub fn len(&self) -> usize {
		self.roles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.roles.is_empty()
	}
}

/// Hook stage injecting defaults into `create` inputs
#[derive(Clone)]
pub struct DefaultsInjector {
	defaults: DefaultDeclaration,
	trusted: Arc<dyn TrustedSource>,
}

impl DefaultsInjector {
	pub fn new(defaults: DefaultDeclaration) -> Self {
		Self {
			defaults,
			trusted: Arc::new(NeverTrusted),
		}
	}

	pub fn with_trusted_source(mut self, trusted: impl TrustedSource + 'static) -> Self {
		self.trusted = Arc::new(trusted);
		self
	}

	pub(crate) fn with_shared_trusted_source(mut self, trusted: Arc<dyn TrustedSource>) -> Self {
		self.trusted = trusted;
		self
	}

	pub fn declaration(&self) -> &DefaultDeclaration {
		&self.defaults
	}

	/// Merge the role's defaults into `ctx.data`. Defaults win on collisions,
	/// and a default array replaces the input array instead of extending it.
	pub async fn set_defaults(&self, mut ctx: HookContext) -> Result<HookContext, HookError> {
		if !ctx.is_method(METHOD_CREATE) || ctx.phase != Phase::Before {
			return Ok(ctx);
		}
		if self.trusted.is_trusted(&ctx) {
			debug!(target: "schema_validation", path = %ctx.path, "trusted caller, defaults skipped");
			return Ok(ctx);
		}
		let Some(role) = ctx.role().map(str::to_string) else {
			return Ok(ctx);
		};
		let Some(rule) = self.defaults.get(&role) else {
			debug!(target: "schema_validation", path = %ctx.path, role = %role, "no defaults for role");
			return Ok(ctx);
		};

		let defaults = rule.resolve(&ctx).await?;
		debug!(target: "schema_validation", path = %ctx.path, role = %role, "injecting defaults");
		ctx.data = Some(match ctx.data.take() {
			None | Some(Value::Null) => defaults,
			// batch creation: every record receives the defaults
			Some(Value::Array(records)) => Value::Array(
				records
					.into_iter()
					.map(|record| merge::deep_merge(record, defaults.clone(), ArrayMerge::Replace))
					.collect(),
			),
			Some(data) => merge::deep_merge(data, defaults, ArrayMerge::Replace),
		});
		Ok(ctx)
	}
}

impl fmt::Debug for DefaultsInjector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DefaultsInjector")
			.field("defaults", &self.defaults)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Hook for DefaultsInjector {
	async fn call(&self, ctx: HookContext) -> Result<HookContext, HookError> {
		self.set_defaults(ctx).await
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::context::Principal;
	use crate::trusted::ProviderAbsent;

	fn injector() -> DefaultsInjector {
		DefaultsInjector::new(
			DefaultDeclaration::new()
				.role("member", json!({ "plan": "free", "tags": ["new"] }))
				.role(
					"super_admin",
					DefaultRule::dynamic(|ctx| Ok(json!({ "userProp": ctx.user().and_then(|u| u.attribute("userProp")) }))),
				),
		)
	}

	#[tokio::test]
	async fn test_defaults_win_on_collision() {
		let ctx = HookContext::before("users", "create")
			.with_user(Principal::new("member"))
			.with_data(json!({ "name": "a", "plan": "gold", "tags": ["x", "y"] }));

		let ctx = injector().set_defaults(ctx).await.unwrap();
		assert_eq!(ctx.data, Some(json!({ "name": "a", "plan": "free", "tags": ["new"] })));
	}

	#[tokio::test]
	async fn test_dynamic_defaults_read_context() {
		let ctx = HookContext::before("users", "create")
			.with_user(Principal::new("super_admin").with_attribute("userProp", "from-user"))
			.with_data(json!({ "name": "a" }));

		let ctx = injector().set_defaults(ctx).await.unwrap();
		assert_eq!(ctx.data, Some(json!({ "name": "a", "userProp": "from-user" })));
	}

	#[tokio::test]
	async fn test_only_create_before_receives_defaults() {
		let data = json!({ "name": "a" });
		for ctx in [
			HookContext::before("users", "patch"),
			HookContext::before("users", "update"),
			HookContext::after("users", "create"),
		] {
			let ctx = ctx.with_user(Principal::new("member")).with_data(data.clone());
			let ctx = injector().set_defaults(ctx).await.unwrap();
			assert_eq!(ctx.data, Some(data.clone()));
		}
	}

	#[tokio::test]
	async fn test_no_principal_or_unknown_role_is_noop() {
		let anonymous = HookContext::before("users", "create").with_data(json!({ "name": "a" }));
		assert_eq!(injector().set_defaults(anonymous).await.unwrap().data, Some(json!({ "name": "a" })));

		let guest = HookContext::before("users", "create")
			.with_user(Principal::new("guest"))
			.with_data(json!({ "name": "a" }));
		assert_eq!(injector().set_defaults(guest).await.unwrap().data, Some(json!({ "name": "a" })));
	}

	#[tokio::test]
	async fn test_trusted_caller_is_skipped() {
		let ctx = HookContext::before("users", "create")
			.with_user(Principal::new("member"))
			.with_data(json!({ "name": "a" }));

		let ctx = injector().with_trusted_source(ProviderAbsent).set_defaults(ctx).await.unwrap();
		assert_eq!(ctx.data, Some(json!({ "name": "a" })));
	}

	#[tokio::test]
	async fn test_missing_data_and_batches() {
		let empty = HookContext::before("users", "create").with_user(Principal::new("member"));
		assert_eq!(
			injector().set_defaults(empty).await.unwrap().data,
			Some(json!({ "plan": "free", "tags": ["new"] }))
		);

		let batch = HookContext::before("users", "create")
			.with_user(Principal::new("member"))
			.with_data(json!([{ "name": "a" }, { "name": "b" }]));
		assert_eq!(
			injector().set_defaults(batch).await.unwrap().data,
			Some(json!([
				{ "name": "a", "plan": "free", "tags": ["new"] },
				{ "name": "b", "plan": "free", "tags": ["new"] }
			]))
		);
	}

	struct TenantDefaults;

	#[async_trait]
	impl DefaultProvider for TenantDefaults {
		async fn defaults(&self, ctx: &HookContext) -> Result<Value, HookError> {
			tokio::task::yield_now().await;
			Ok(json!({ "tenant": ctx.user().and_then(|u| u.attribute("tenant")) }))
		}
	}

	#[tokio::test]
	async fn test_async_provider() {
		let injector = DefaultsInjector::new(DefaultDeclaration::new().role("member", DefaultRule::dynamic_async(TenantDefaults)));
		let ctx = HookContext::before("users", "create")
			.with_user(Principal::new("member").with_attribute("tenant", "acme"))
			.with_data(json!({}));

		let ctx = injector.call(ctx).await.unwrap();
		assert_eq!(ctx.data, Some(json!({ "tenant": "acme" })));
	}

	#[tokio::test]
	async fn test_failing_provider_aborts() {
		let injector = DefaultsInjector::new(
			DefaultDeclaration::new().role("member", DefaultRule::dynamic(|_| Err(HookError::resolution("plan lookup failed")))),
		);
		let ctx = HookContext::before("users", "create")
			.with_user(Principal::new("member"))
			.with_data(json!({ "name": "a" }));

		let err = injector.call(ctx).await.unwrap_err();
		assert!(matches!(err, HookError::Resolution(_)));
	}
}
