// Invocation context flowing through the hooks
//
// Mirrors the shape of a service hook call:
// { method, path, type, params: { user?, provider? }, data?, result?, id? }

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Multi-record read; its after-phase result is a (paginated) collection
pub const METHOD_FIND: &str = "find";
/// Single-record creation; the only method that receives defaults
pub const METHOD_CREATE: &str = "create";

/// Lifecycle phase of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
	/// Before the operation runs; `data` holds the input payload
	Before,
	/// After the operation produced a result; `result` holds the output payload
	After,
}

impl Phase {
	pub fn as_str(&self) -> &'static str {
		match self {
			Phase::Before => "before",
			Phase::After => "after",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The acting principal. Role assignment happens upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
	/// Identity of the principal, any JSON scalar
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
	/// Assigned role
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	/// Any other attributes carried by the principal
	#[serde(flatten)]
	pub attributes: Map<String, Value>,
}

impl Principal {
	pub fn new(role: impl Into<String>) -> Self {
		Self {
			role: Some(role.into()),
			..Default::default()
		}
	}

	pub fn with_id(mut self, id: impl Into<Value>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	/// String form of the identity, if any
	pub fn identity(&self) -> Option<String> {
		self.id.as_ref().and_then(scalar_to_string)
	}

	pub fn attribute(&self, name: &str) -> Option<&Value> {
		self.attributes.get(name)
	}
}

/// Call parameters attached by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
	/// Authenticated principal, absent for anonymous calls
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<Principal>,
	/// Transport the call came in through (`rest`, `socketio`, ...).
	/// Internal calls have none.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
}

/// One hook invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
	/// Operation name (`find`, `get`, `create`, `patch`, ...)
	pub method: String,
	/// Resource (service) name
	pub path: String,
	#[serde(rename = "type")]
	pub phase: Phase,
	#[serde(default)]
	pub params: Params,
	/// Input payload, before phase
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	/// Output payload, after phase
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Identifier of the record the call targets
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
}

impl HookContext {
	pub fn new(path: impl Into<String>, method: impl Into<String>, phase: Phase) -> Self {
		Self {
			method: method.into(),
			path: path.into(),
			phase,
			params: Params::default(),
			data: None,
			result: None,
			id: None,
		}
	}

	pub fn before(path: impl Into<String>, method: impl Into<String>) -> Self {
		Self::new(path, method, Phase::Before)
	}

	pub fn after(path: impl Into<String>, method: impl Into<String>) -> Self {
		Self::new(path, method, Phase::After)
	}

	pub fn with_user(mut self, user: Principal) -> Self {
		self.params.user = Some(user);
		self
	}

	pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
		self.params.provider = Some(provider.into());
		self
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	pub fn with_result(mut self, result: Value) -> Self {
		self.result = Some(result);
		self
	}

	pub fn with_id(mut self, id: impl Into<Value>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn user(&self) -> Option<&Principal> {
		self.params.user.as_ref()
	}

	pub fn role(&self) -> Option<&str> {
		self.params.user.as_ref().and_then(|u| u.role.as_deref())
	}

	pub fn is_method(&self, method: &str) -> bool {
		self.method == method
	}

	/// True when the principal is acting on its own record
	pub fn is_self(&self) -> bool {
		let Some(identity) = self.user().and_then(Principal::identity) else {
			return false;
		};
		self.id.as_ref().and_then(scalar_to_string).is_some_and(|id| id == identity)
	}

	/// Payload validated for this phase: `data` before, `result` after
	pub fn payload_mut(&mut self) -> &mut Option<Value> {
		match self.phase {
			Phase::Before => &mut self.data,
			Phase::After => &mut self.result,
		}
	}
}

fn scalar_to_string(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(s.clone()),
		other => Some(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_context_deserializes_hook_shape() {
		let ctx: HookContext = serde_json::from_value(json!({
			"method": "create",
			"path": "service",
			"type": "before",
			"params": { "user": { "_id": "u1", "role": "super_admin", "userProp": "x" } },
			"data": { "propA": "hello" }
		}))
		.unwrap();

		assert_eq!(ctx.phase, Phase::Before);
		assert_eq!(ctx.role(), Some("super_admin"));
		assert_eq!(ctx.user().unwrap().attribute("userProp"), Some(&json!("x")));
		assert_eq!(ctx.data, Some(json!({ "propA": "hello" })));
		assert!(ctx.result.is_none());
	}

	#[test]
	fn test_context_round_trips_type_field() {
		let ctx = HookContext::after("service", "get").with_result(json!({}));
		let value = serde_json::to_value(&ctx).unwrap();
		assert_eq!(value["type"], "after");
		assert!(value.get("data").is_none());
	}

	#[test]
	fn test_is_self_compares_string_forms() {
		let ctx = HookContext::before("users", "patch")
			.with_user(Principal::new("admin").with_id("42"))
			.with_id("42");
		assert!(ctx.is_self());

		let numeric = HookContext::before("users", "patch")
			.with_user(Principal::new("admin").with_id(42))
			.with_id("42");
		assert!(numeric.is_self());

		let other = HookContext::before("users", "patch")
			.with_user(Principal::new("admin").with_id("42"))
			.with_id("43");
		assert!(!other.is_self());
	}

	#[test]
	fn test_is_self_false_without_identity() {
		let ctx = HookContext::before("users", "patch")
			.with_user(Principal::new("admin"))
			.with_id("42");
		assert!(!ctx.is_self());

		let anonymous = HookContext::before("users", "patch").with_id("42");
		assert!(!anonymous.is_self());
	}

	#[test]
	fn test_payload_follows_phase() {
		let mut before = HookContext::before("s", "create").with_data(json!({"a": 1}));
		assert_eq!(before.payload_mut().as_ref(), Some(&json!({"a": 1})));

		let mut after = HookContext::after("s", "create").with_result(json!({"b": 2}));
		assert_eq!(after.payload_mut().as_ref(), Some(&json!({"b": 2})));
	}
}
