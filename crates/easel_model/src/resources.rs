use crate::value::{DesignValue, PropertyValue};
use std::collections::BTreeMap;

/// The resource/i18n collaborator. The core never reads bundle files; it
/// talks to this narrow contract.
pub trait ResourceStore {
    fn get(&self, key: &str) -> Option<PropertyValue>;
    /// Reconciles the store after a value change: the old entry is dropped,
    /// the new one written.
    fn update(&mut self, old: Option<&DesignValue>, new: Option<&DesignValue>);
    /// Moves a value under a new key, returning the rewritten design value.
    fn change_key(&mut self, value: &DesignValue, new_key: &str) -> DesignValue;
}

/// In-memory store used by tests and headless operation.
#[derive(Debug, Default)]
pub struct MemoryResources {
    values: BTreeMap<String, PropertyValue>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ResourceStore for MemoryResources {
    fn get(&self, key: &str) -> Option<PropertyValue> {
        self.values.get(key).cloned()
    }

    fn update(&mut self, old: Option<&DesignValue>, new: Option<&DesignValue>) {
        if let Some(old) = old
            && let Some(key) = old.key()
        {
            self.values.remove(key);
        }
        if let Some(new) = new
            && let Some(key) = new.key()
            && let Some(cached) = new.design_value()
        {
            self.values.insert(key.to_string(), cached);
        }
    }

    fn change_key(&mut self, value: &DesignValue, new_key: &str) -> DesignValue {
        if let Some(old_key) = value.key() {
            if let Some(stored) = self.values.remove(old_key) {
                self.values.insert(new_key.to_string(), stored);
            } else if let Some(cached) = value.design_value() {
                self.values.insert(new_key.to_string(), cached);
            }
        }
        value.with_key(new_key)
    }
}
