// ABOUTME: Environment module mapping flat dotted variable paths to runtime values

use crate::error::EnvError;
use crate::value::Value;
use std::collections::HashMap;

/// Caller-supplied variable bindings.
///
/// Keys are dot-joined path strings exactly as they appear in conditions
/// (`"foo.dfs.a"`, `"@foo.a"`). Lookup is by single flat key; the evaluator
/// never traverses into nested structures.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
        }
    }

    /// Bind a value under a dotted path, replacing any previous binding
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    /// Look up a dotted path as a single flat key
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Build an environment from a JSON object. Nested objects flatten into
    /// the dotted key space (`{"foo": {"dfs": true}}` binds `foo.dfs`), so a
    /// decoded document lines up with the flat-key resolution rule.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EnvError> {
        let serde_json::Value::Object(object) = json else {
            return Err(EnvError::NotAnObject);
        };
        let mut env = Environment::new();
        flatten_object("", object, &mut env)?;
        Ok(env)
    }

    pub fn from_json_str(text: &str) -> Result<Self, EnvError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Environment::from_json(&json)
    }
}

impl From<HashMap<String, Value>> for Environment {
    fn from(bindings: HashMap<String, Value>) -> Self {
        Environment { bindings }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Environment {
            bindings: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_object(
    prefix: &str,
    object: &serde_json::Map<String, serde_json::Value>,
    env: &mut Environment,
) -> Result<(), EnvError> {
    for (key, json) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match json {
            serde_json::Value::Object(inner) => flatten_object(&path, inner, env)?,
            other => {
                let value = json_value(&path, other)?;
                env.bindings.insert(path, value);
            }
        }
    }
    Ok(())
}

/// Convert a JSON scalar or array to a condition value
fn json_value(key: &str, json: &serde_json::Value) -> Result<Value, EnvError> {
    let unsupported = |detail: &str| EnvError::Unsupported {
        key: key.to_string(),
        detail: detail.to_string(),
    };

    match json {
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| unsupported("number does not fit a double")),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Array(items) => {
            if items.iter().all(serde_json::Value::is_string) {
                Ok(Value::StringList(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                ))
            } else if items.iter().all(serde_json::Value::is_number) {
                Ok(Value::NumberList(
                    items.iter().filter_map(serde_json::Value::as_f64).collect(),
                ))
            } else {
                Err(unsupported("arrays must hold only strings or only numbers"))
            }
        }
        serde_json::Value::Null => Err(unsupported("null is not a condition value")),
        serde_json::Value::Object(_) => Err(unsupported("nested objects flatten into dotted keys")),
    }
}
