// Validator Engine
//
// Validates the phase payload of an invocation against its effective schema.
// Successful validation rewrites the payload in place (coerced, undeclared
// properties removed).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{HookContext, METHOD_FIND, Phase};
use crate::engine::{CompiledSchema, SchemaEngine};
use crate::error::{HookError, Violation};
use crate::pipeline::Hook;
use crate::registry::{RegistryStore, SchemaDeclaration};
use crate::resolver::SchemaResolver;
use crate::trusted::{NeverTrusted, TrustedSource};

/// Marks the effective schema as asynchronous
pub const ASYNC_KEYWORD: &str = "$async";

/// Hook stage validating payloads against the registered rules
#[derive(Clone)]
pub struct SchemaValidator {
	resolver: SchemaResolver,
	engine: Arc<dyn SchemaEngine>,
	trusted: Arc<dyn TrustedSource>,
}

impl SchemaValidator {
	/// Validator over rules already registered in `store`
	pub fn new(store: RegistryStore, engine: impl SchemaEngine + 'static) -> Self {
		Self {
			resolver: SchemaResolver::new(store),
			engine: Arc::new(engine),
			trusted: Arc::new(NeverTrusted),
		}
	}

	/// Register `declaration` for `resource`, then build a validator over the store
	pub fn register(
		store: &RegistryStore,
		declaration: SchemaDeclaration,
		resource: &str,
		engine: impl SchemaEngine + 'static,
	) -> Result<Self, HookError> {
		store.register(resource, &declaration)?;
		Ok(Self::new(store.clone(), engine))
	}

	pub fn with_trusted_source(mut self, trusted: impl TrustedSource + 'static) -> Self {
		self.trusted = Arc::new(trusted);
		self
	}

	pub(crate) fn with_shared_trusted_source(mut self, trusted: Arc<dyn TrustedSource>) -> Self {
		self.trusted = trusted;
		self
	}

	/// Validate the payload of `ctx` for its phase
	pub async fn validate(&self, mut ctx: HookContext) -> Result<HookContext, HookError> {
		if self.trusted.is_trusted(&ctx) {
			debug!(target: "schema_validation", path = %ctx.path, method = %ctx.method, "trusted caller, validation skipped");
			return Ok(ctx);
		}

		let Some(mut schema) = self.resolver.resolve(&ctx).await? else {
			return Ok(ctx);
		};
		if let Value::Object(map) = &mut schema {
			map.insert(ASYNC_KEYWORD.to_string(), Value::Bool(true));
		}

		let principal = ctx.user().cloned().unwrap_or_default();
		let compiled = self.engine.compile(&schema, &principal).await?;

		let collection = ctx.is_method(METHOD_FIND) && ctx.phase == Phase::After;
		let outcome = if collection {
			validate_collection(compiled.as_ref(), ctx.payload_mut()).await
		} else {
			validate_record(compiled.as_ref(), ctx.payload_mut()).await
		};

		if let Err(violations) = outcome {
			warn!(
				target: "schema_validation",
				path = %ctx.path,
				method = %ctx.method,
				phase = %ctx.phase,
				violations = violations.len(),
				"payload rejected"
			);
			return Err(HookError::validation(violations));
		}
		Ok(ctx)
	}
}

impl fmt::Debug for SchemaValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SchemaValidator")
			.field("resolver", &self.resolver)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Hook for SchemaValidator {
	async fn call(&self, ctx: HookContext) -> Result<HookContext, HookError> {
		self.validate(ctx).await
	}
}

/// A missing payload is checked as `null` and stays missing
async fn validate_record(compiled: &dyn CompiledSchema, payload: &mut Option<Value>) -> Result<(), Vec<Violation>> {
	match payload {
		Some(value) => compiled.validate(value).await,
		None => compiled.validate(&mut Value::Null).await,
	}
}

/// Records of a paginated page (`{ data: [...] }`) or a bare array
fn records_mut(payload: &mut Option<Value>) -> Option<&mut Vec<Value>> {
	match payload.as_mut()? {
		Value::Array(records) => Some(records),
		Value::Object(page) => page.get_mut("data").and_then(Value::as_array_mut),
		_ => None,
	}
}

/// Records are checked in order; the first rejection ends the walk
async fn validate_collection(compiled: &dyn CompiledSchema, payload: &mut Option<Value>) -> Result<(), Vec<Violation>> {
	if let Some(records) = records_mut(payload) {
		for (index, record) in records.iter_mut().enumerate() {
			if let Err(violations) = compiled.validate(record).await {
				debug!(target: "schema_validation", index, "collection record rejected");
				return Err(violations);
			}
		}
		return Ok(());
	}
	validate_record(compiled, payload).await
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use serde_json::json;

	use super::*;
	use crate::context::Principal;
	use crate::engine::JsonSchemaEngine;
	use crate::trusted::ProviderAbsent;

	fn object(props: &[&str]) -> Value {
		let properties: serde_json::Map<String, Value> = props
			.iter()
			.map(|p| (p.to_string(), json!({ "type": "string" })))
			.collect();
		json!({ "type": "object", "properties": properties })
	}

	fn validator(declaration: SchemaDeclaration) -> SchemaValidator {
		SchemaValidator::register(&RegistryStore::new(), declaration, "service", JsonSchemaEngine::default()).unwrap()
	}

	#[tokio::test]
	async fn test_before_create_strips_by_role() {
		let validator = validator(
			SchemaDeclaration::new()
				.rule(Phase::Before, "create", "all", object(&["propA"]))
				.rule(Phase::Before, "create", "super_admin", object(&["propB"])),
		);
		let data = json!({ "propA": "a", "propB": "b", "extraProp": "x" });

		let admin = HookContext::before("service", "create")
			.with_user(Principal::new("super_admin"))
			.with_data(data.clone());
		let admin = validator.validate(admin).await.unwrap();
		assert_eq!(admin.data, Some(json!({ "propA": "a", "propB": "b" })));

		let anonymous = HookContext::before("service", "create").with_data(data);
		let anonymous = validator.validate(anonymous).await.unwrap();
		assert_eq!(anonymous.data, Some(json!({ "propA": "a" })));
	}

	#[tokio::test]
	async fn test_after_phase_validates_result() {
		let validator = validator(
			SchemaDeclaration::new()
				.rule(Phase::After, "all", "all", object(&["id"]))
				.rule(Phase::After, "create", "super_admin", object(&["propA"])),
		);
		let ctx = HookContext::after("service", "create")
			.with_user(Principal::new("super_admin"))
			.with_data(json!({ "untouched": true }))
			.with_result(json!({ "id": "1", "propA": "a", "secret": "s" }));

		let ctx = validator.validate(ctx).await.unwrap();
		assert_eq!(ctx.result, Some(json!({ "id": "1", "propA": "a" })));
		assert_eq!(ctx.data, Some(json!({ "untouched": true })));
	}

	#[tokio::test]
	async fn test_rejection_carries_violations() {
		let validator = validator(SchemaDeclaration::new().rule(
			Phase::Before,
			"create",
			"all",
			json!({ "type": "object", "properties": { "age": { "type": "integer" } }, "required": ["age"] }),
		));
		let ctx = HookContext::before("service", "create").with_data(json!({ "name": "a" }));

		let err = validator.validate(ctx).await.unwrap_err();
		assert!(matches!(err, HookError::Validation { .. }));
		assert_eq!(err.violations()[0].keyword.as_deref(), Some("required"));
	}

	#[tokio::test]
	async fn test_missing_payload_is_checked_as_null() {
		let validator = validator(SchemaDeclaration::new().rule(Phase::Before, "create", "all", object(&["propA"])));
		let err = validator.validate(HookContext::before("service", "create")).await.unwrap_err();
		assert_eq!(err.violations()[0].keyword.as_deref(), Some("type"));
	}

	#[tokio::test]
	async fn test_no_rules_passes_through() {
		let validator = validator(SchemaDeclaration::new().rule(Phase::Before, "create", "all", object(&["propA"])));
		let ctx = HookContext::before("service", "patch").with_data(json!({ "anything": 1 }));
		let ctx = validator.validate(ctx).await.unwrap();
		assert_eq!(ctx.data, Some(json!({ "anything": 1 })));
	}

	#[tokio::test]
	async fn test_trusted_caller_bypasses() {
		let validator = validator(SchemaDeclaration::new().rule(Phase::Before, "create", "all", object(&["propA"])))
			.with_trusted_source(ProviderAbsent);
		let internal = HookContext::before("service", "create").with_data(json!({ "extraProp": 1 }));
		let internal = validator.validate(internal).await.unwrap();
		assert_eq!(internal.data, Some(json!({ "extraProp": 1 })));

		let external = HookContext::before("service", "create")
			.with_provider("rest")
			.with_data(json!({ "extraProp": 1 }));
		let external = validator.validate(external).await.unwrap();
		assert_eq!(external.data, Some(json!({})));
	}

	#[tokio::test]
	async fn test_find_after_validates_each_record() {
		let validator = validator(SchemaDeclaration::new().rule(Phase::After, "find", "all", object(&["id"])));

		let page = HookContext::after("service", "find").with_result(json!({
			"total": 2,
			"data": [{ "id": "1", "secret": "a" }, { "id": "2", "secret": "b" }]
		}));
		let page = validator.validate(page).await.unwrap();
		assert_eq!(page.result, Some(json!({ "total": 2, "data": [{ "id": "1" }, { "id": "2" }] })));

		let bare = HookContext::after("service", "find").with_result(json!([{ "id": "1", "secret": "a" }]));
		let bare = validator.validate(bare).await.unwrap();
		assert_eq!(bare.result, Some(json!([{ "id": "1" }])));
	}

	struct RecordingSchema {
		seen: Arc<Mutex<Vec<Value>>>,
	}

	#[async_trait]
	impl CompiledSchema for RecordingSchema {
		async fn validate(&self, payload: &mut Value) -> Result<(), Vec<Violation>> {
			self.seen.lock().unwrap().push(payload.clone());
			if payload.get("bad").is_some() {
				Err(vec![Violation::new("/bad", "/not", "rejected")])
			} else {
				Ok(())
			}
		}
	}

	struct RecordingEngine {
		seen: Arc<Mutex<Vec<Value>>>,
	}

	#[async_trait]
	impl SchemaEngine for RecordingEngine {
		async fn compile(&self, _schema: &Value, _principal: &Principal) -> Result<Arc<dyn CompiledSchema>, HookError> {
			Ok(Arc::new(RecordingSchema { seen: self.seen.clone() }))
		}
	}

	#[tokio::test]
	async fn test_collection_stops_at_first_rejection() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let validator = SchemaValidator::register(
			&RegistryStore::new(),
			SchemaDeclaration::new().rule(Phase::After, "find", "all", object(&["id"])),
			"service",
			RecordingEngine { seen: seen.clone() },
		)
		.unwrap();

		let ctx = HookContext::after("service", "find").with_result(json!({
			"data": [{ "id": 1 }, { "bad": true }, { "id": 3 }]
		}));
		let err = validator.validate(ctx).await.unwrap_err();

		assert_eq!(err.violations().len(), 1);
		assert_eq!(*seen.lock().unwrap(), vec![json!({ "id": 1 }), json!({ "bad": true })]);
	}

	#[tokio::test]
	async fn test_effective_schema_marked_async() {
		struct SchemaCapture(Arc<Mutex<Option<Value>>>);

		#[async_trait]
		impl SchemaEngine for SchemaCapture {
			async fn compile(&self, schema: &Value, principal: &Principal) -> Result<Arc<dyn CompiledSchema>, HookError> {
				*self.0.lock().unwrap() = Some(schema.clone());
				JsonSchemaEngine::default().compile(schema, principal).await
			}
		}

		let captured = Arc::new(Mutex::new(None));
		let validator = SchemaValidator::register(
			&RegistryStore::new(),
			SchemaDeclaration::new().rule(Phase::Before, "all", "all", object(&["a"])),
			"service",
			SchemaCapture(captured.clone()),
		)
		.unwrap();

		validator
			.validate(HookContext::before("service", "get").with_data(json!({})))
			.await
			.unwrap();
		let schema = captured.lock().unwrap().clone().unwrap();
		assert_eq!(schema[ASYNC_KEYWORD], json!(true));
	}
}
