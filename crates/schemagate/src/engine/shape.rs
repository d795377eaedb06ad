// Payload shaping applied before schema checks: primitive coercion and
// removal of undeclared properties.

use regex::Regex;
use serde_json::{Map, Number, Value};

/// Coerce values to their declared primitive type where unambiguous.
///
/// Follows `properties` and `items` recursively. A value already matching one
/// of the declared types is left alone; otherwise the first declared type it
/// converts to wins.
pub fn coerce_types(schema: &Value, value: &mut Value) {
	let Some(schema) = schema.as_object() else {
		return;
	};

	let types = declared_types(schema);
	if !types.is_empty() && !types.iter().any(|t| matches_type(t, value)) {
		if let Some(coerced) = types.iter().find_map(|t| coerce_to(t, value)) {
			*value = coerced;
		}
	}

	match value {
		Value::Object(map) => {
			if let Some(Value::Object(properties)) = schema.get("properties") {
				for (name, sub) in properties {
					if let Some(v) = map.get_mut(name) {
						coerce_types(sub, v);
					}
				}
			}
		},
		Value::Array(items) => {
			if let Some(item_schema) = schema.get("items") {
				for item in items {
					coerce_types(item_schema, item);
				}
			}
		},
		_ => {},
	}
}

/// Drop every object key not listed in the governing schema's `properties`
/// and matched by none of its `patternProperties`.
///
/// Only object schemas that declare `properties` constrain the shape;
/// free-form objects are kept as they are. Patterns the `regex` crate cannot
/// compile (look-around, backreferences) match nothing.
pub fn remove_additional(schema: &Value, value: &mut Value) {
	let Some(schema) = schema.as_object() else {
		return;
	};

	match value {
		Value::Object(map) => {
			if let Some(Value::Object(properties)) = schema.get("properties") {
				let patterns = declared_patterns(schema);
				map.retain(|key, _| properties.contains_key(key) || patterns.iter().any(|(re, _)| re.is_match(key)));
				for (key, v) in map.iter_mut() {
					let sub = properties
						.get(key)
						.or_else(|| patterns.iter().find(|(re, _)| re.is_match(key)).map(|(_, sub)| *sub));
					if let Some(sub) = sub {
						remove_additional(sub, v);
					}
				}
			}
		},
		Value::Array(items) => {
			if let Some(item_schema) = schema.get("items") {
				for item in items {
					remove_additional(item_schema, item);
				}
			}
		},
		_ => {},
	}
}

fn declared_patterns(schema: &Map<String, Value>) -> Vec<(Regex, &Value)> {
	let Some(Value::Object(patterns)) = schema.get("patternProperties") else {
		return Vec::new();
	};
	patterns
		.iter()
		.filter_map(|(pattern, sub)| Regex::new(pattern).ok().map(|re| (re, sub)))
		.collect()
}

fn declared_types(schema: &Map<String, Value>) -> Vec<&str> {
	match schema.get("type") {
		Some(Value::String(t)) => vec![t.as_str()],
		Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
		_ => Vec::new(),
	}
}

fn matches_type(ty: &str, value: &Value) -> bool {
	match ty {
		"string" => value.is_string(),
		"number" => value.is_number(),
		"integer" => is_integer(value),
		"boolean" => value.is_boolean(),
		"null" => value.is_null(),
		"object" => value.is_object(),
		"array" => value.is_array(),
		// unknown type names are the engine's problem, not ours
		_ => true,
	}
}

fn is_integer(value: &Value) -> bool {
	match value {
		Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
		_ => false,
	}
}

fn coerce_to(ty: &str, value: &Value) -> Option<Value> {
	match (ty, value) {
		("number", Value::String(s)) => parse_number(s),
		("integer", Value::String(s)) => parse_integer(s),
		("number" | "integer", Value::Bool(b)) => Some(Value::from(u8::from(*b))),
		("number" | "integer", Value::Null) => Some(Value::from(0)),
		("string", Value::Number(n)) => Some(Value::String(n.to_string())),
		("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
		("string", Value::Null) => Some(Value::String(String::new())),
		("boolean", Value::String(s)) => match s.as_str() {
			"true" => Some(Value::Bool(true)),
			"false" => Some(Value::Bool(false)),
			_ => None,
		},
		("boolean", Value::Number(n)) => match n.as_f64() {
			Some(f) if f == 1.0 => Some(Value::Bool(true)),
			Some(f) if f == 0.0 => Some(Value::Bool(false)),
			_ => None,
		},
		("boolean", Value::Null) => Some(Value::Bool(false)),
		("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
		("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
		("null", Value::Bool(false)) => Some(Value::Null),
		_ => None,
	}
}

fn parse_number(s: &str) -> Option<Value> {
	let trimmed = s.trim();
	if trimmed.is_empty() {
		return None;
	}
	if let Some(int) = parse_integer(trimmed) {
		return Some(int);
	}
	trimmed
		.parse::<f64>()
		.ok()
		.and_then(Number::from_f64)
		.map(Value::Number)
}

fn parse_integer(s: &str) -> Option<Value> {
	let trimmed = s.trim();
	if let Ok(i) = trimmed.parse::<i64>() {
		return Some(Value::from(i));
	}
	trimmed.parse::<u64>().ok().map(Value::from)
}
