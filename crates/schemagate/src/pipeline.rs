// Hook pipeline
//
// Every stage consumes the invocation context and hands it back, possibly
// rewritten. A failing stage ends the pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HookContext;
use crate::defaults::{DefaultDeclaration, DefaultsInjector};
use crate::engine::SchemaEngine;
use crate::error::HookError;
use crate::registry::{RegistryStore, SchemaDeclaration};
use crate::trusted::TrustedSource;
use crate::validator::SchemaValidator;

/// A stage of the hook pipeline
#[async_trait]
pub trait Hook: Send + Sync {
	async fn call(&self, ctx: HookContext) -> Result<HookContext, HookError>;
}

/// Validation followed by default injection
#[derive(Debug, Clone)]
pub struct ValidateAndSetDefaults {
	validator: SchemaValidator,
	defaults: DefaultsInjector,
}

impl ValidateAndSetDefaults {
	pub fn new(validator: SchemaValidator, defaults: DefaultsInjector) -> Self {
		Self { validator, defaults }
	}

	/// Use one predicate for both stages
	pub fn with_trusted_source(self, trusted: impl TrustedSource + 'static) -> Self {
		let trusted: Arc<dyn TrustedSource> = Arc::new(trusted);
		Self {
			validator: self.validator.with_shared_trusted_source(trusted.clone()),
			defaults: self.defaults.with_shared_trusted_source(trusted),
		}
	}

	pub fn validator(&self) -> &SchemaValidator {
		&self.validator
	}

	pub fn defaults(&self) -> &DefaultsInjector {
		&self.defaults
	}
}

#[async_trait]
impl Hook for ValidateAndSetDefaults {
	async fn call(&self, ctx: HookContext) -> Result<HookContext, HookError> {
		let ctx = self.validator.validate(ctx).await?;
		self.defaults.set_defaults(ctx).await
	}
}

/// Register `declaration` for `resource` and build its validation stage
pub fn schema_validator(
	store: &RegistryStore,
	declaration: SchemaDeclaration,
	resource: &str,
	engine: impl SchemaEngine + 'static,
) -> Result<SchemaValidator, HookError> {
	SchemaValidator::register(store, declaration, resource, engine)
}

/// Build the defaults stage
pub fn set_defaults(defaults: DefaultDeclaration) -> DefaultsInjector {
	DefaultsInjector::new(defaults)
}

/// Register `declaration` for `resource` and build the composed stage
pub fn validate_schema_and_set_defaults(
	store: &RegistryStore,
	declaration: SchemaDeclaration,
	defaults: DefaultDeclaration,
	resource: &str,
	engine: impl SchemaEngine + 'static,
) -> Result<ValidateAndSetDefaults, HookError> {
	let validator = schema_validator(store, declaration, resource, engine)?;
	Ok(ValidateAndSetDefaults::new(validator, set_defaults(defaults)))
}

/// Run `ctx` through `hooks` in order
pub async fn run_all(hooks: &[&dyn Hook], ctx: HookContext) -> Result<HookContext, HookError> {
	let mut ctx = ctx;
	for hook in hooks {
		ctx = hook.call(ctx).await?;
	}
	Ok(ctx)
}
