/// Program state threaded from one fragment to the next
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Global a fragment assigns to mark its displayable result
pub const RESULT_BINDING: &str = "_";

/// Ordered identifier -> value bindings.
///
/// Always handed around by value: an evaluator receives a borrowed snapshot
/// and returns a brand new one, so a cached snapshot can never be changed
/// after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Remove a binding, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Hex SHA256 over the JSON form of the bindings, in binding order
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.bindings).unwrap_or_default();
        hex::encode(Sha256::digest(json.as_bytes()))
    }
}

impl FromIterator<(String, Value)> for Environment {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// What one fragment produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Bindings to feed the next fragment, never containing [`RESULT_BINDING`]
    pub environment: Environment,
    /// The fragment's designated result, if it set one
    pub value: Option<Value>,
}

impl Evaluation {
    /// Split the result binding out of a raw set of bindings.
    ///
    /// `null` counts as no result.
    pub fn from_bindings(mut bindings: Environment) -> Self {
        let value = bindings
            .remove(RESULT_BINDING)
            .filter(|value| !value.is_null());
        Self {
            environment: bindings,
            value,
        }
    }
}
