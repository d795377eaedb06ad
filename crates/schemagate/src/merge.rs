// Deep merge of JSON values
//
// Objects merge key by key, recursively. On any other collision the source
// value wins, except the set-valued schema keywords under `ArrayMerge::Schema`,
// which take the ordered union of both arrays.

use serde_json::{Map, Value};

/// Schema keywords whose arrays are sets and accumulate across rules
const UNION_KEYWORDS: &[&str] = &["required", "type"];

/// How two arrays found under the same key are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
	/// `required` and `type` take the union of both arrays, target order
	/// first and without duplicates. Any other array (`enum`, tuple `items`)
	/// is replaced by the source. Used for schemas.
	#[default]
	Schema,
	/// Source array replaces the target array. Used for defaults.
	Replace,
}

impl ArrayMerge {
	fn unions(self, key: Option<&str>) -> bool {
		self == ArrayMerge::Schema && key.is_some_and(|k| UNION_KEYWORDS.contains(&k))
	}
}

/// Merge `source` into `target` in place
pub fn merge_into(target: &mut Value, source: Value, arrays: ArrayMerge) {
	merge_at(None, target, source, arrays);
}

fn merge_at(key: Option<&str>, target: &mut Value, source: Value, arrays: ArrayMerge) {
	match (target, source) {
		(Value::Object(target), Value::Object(source)) => {
			for (key, value) in source {
				match target.get_mut(&key) {
					Some(existing) => merge_at(Some(key.as_str()), existing, value, arrays),
					None => {
						target.insert(key, value);
					},
				}
			}
		},
		(Value::Array(target), Value::Array(source)) if arrays.unions(key) => {
			for value in source {
				if !target.contains(&value) {
					target.push(value);
				}
			}
		},
		(target, source) => *target = source,
	}
}

/// Merge `source` into a copy of `target`
pub fn deep_merge(mut target: Value, source: Value, arrays: ArrayMerge) -> Value {
	merge_into(&mut target, source, arrays);
	target
}

/// Fold values left to right into one, starting from an empty object.
/// Later values override earlier ones; `null` and empty objects are skipped.
pub fn merge_all<I>(values: I, arrays: ArrayMerge) -> Value
where
	I: IntoIterator<Item = Value>,
{
	values
		.into_iter()
		.filter(|v| !is_empty(v))
		.fold(Value::Object(Map::new()), |acc, v| deep_merge(acc, v, arrays))
}

/// True for `null` and `{}`
pub fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}
