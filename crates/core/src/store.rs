//! Host variable store contract
//!
//! The bridge does not own host variables. It reads the current text of a
//! variable when a `v_name` input is marshalled, and writes function results
//! into the python-style variable a binding declared with `return v_name`.

use std::collections::HashMap;

/// Host-side named-variable store consumed by the bridge
pub trait VariableStore {
    /// Current text of `name`, or `None` if no such variable exists
    fn retrieve(&mut self, name: &str) -> Option<String>;

    /// Whether `variable` is a python-style variable bound to `binding`
    fn accepts(&self, binding: &str, variable: &str) -> bool;

    /// Store `text` as the value of `variable` on behalf of `binding`
    ///
    /// Returns `false` if `variable` is not bound to `binding`.
    fn publish_for(&mut self, binding: &str, variable: &str, text: &str) -> bool;
}

/// Kind of an entry in [`MapVariableStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredVariable {
    /// Plain text value
    Text(String),
    /// Result slot filled by the named binding; empty until first publish
    Python { binding: String, value: Option<String> },
}

/// In-memory variable store for hosts without a variable system of their own
#[derive(Debug, Clone, Default)]
pub struct MapVariableStore {
    variables: HashMap<String, StoredVariable>,
}

impl MapVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a plain text variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables
            .insert(name.into(), StoredVariable::Text(value.into()));
    }

    /// Declare `name` as the result slot of `binding`
    pub fn bind_python(&mut self, name: impl Into<String>, binding: impl Into<String>) {
        self.variables.insert(
            name.into(),
            StoredVariable::Python {
                binding: binding.into(),
                value: None,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<StoredVariable> {
        self.variables.remove(name)
    }

    pub fn entry(&self, name: &str) -> Option<&StoredVariable> {
        self.variables.get(name)
    }

    /// Current text of `name` without going through the bridge
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.variables.get(name)? {
            StoredVariable::Text(text) => Some(text),
            StoredVariable::Python { value, .. } => value.as_deref(),
        }
    }

    /// Binding that fills `name`, if it is a python-style variable
    pub fn python_binding(&self, name: &str) -> Option<&str> {
        match self.variables.get(name)? {
            StoredVariable::Python { binding, .. } => Some(binding),
            StoredVariable::Text(_) => None,
        }
    }
}

impl VariableStore for MapVariableStore {
    fn retrieve(&mut self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    fn accepts(&self, binding: &str, variable: &str) -> bool {
        self.python_binding(variable) == Some(binding)
    }

    fn publish_for(&mut self, binding: &str, variable: &str, text: &str) -> bool {
        match self.variables.get_mut(variable) {
            Some(StoredVariable::Python {
                binding: owner,
                value,
            }) if owner == binding => {
                *value = Some(text.to_string());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_variables() {
        let mut store = MapVariableStore::new();
        store.set("n", "12");
        assert_eq!(store.retrieve("n").as_deref(), Some("12"));
        store.set("n", "13");
        assert_eq!(store.retrieve("n").as_deref(), Some("13"));
        assert_eq!(store.retrieve("missing"), None);
    }

    #[test]
    fn test_python_variables_only_accept_their_binding() {
        let mut store = MapVariableStore::new();
        store.bind_python("area", "calc_area");
        assert!(store.accepts("calc_area", "area"));
        assert!(!store.accepts("other", "area"));
        assert_eq!(store.retrieve("area"), None);

        assert!(!store.publish_for("other", "area", "1"));
        assert!(store.publish_for("calc_area", "area", "2.5"));
        assert_eq!(store.get("area"), Some("2.5"));

        store.set("plain", "x");
        assert!(!store.accepts("calc_area", "plain"));
        assert!(!store.publish_for("calc_area", "plain", "y"));
        assert_eq!(store.get("plain"), Some("x"));
    }
}
