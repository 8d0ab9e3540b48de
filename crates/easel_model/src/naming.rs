use std::collections::{BTreeSet, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("invalid component name '{0}'")]
    InvalidName(String),
    #[error("component name already in use: {0}")]
    NameInUse(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
}

/// The code-structure collaborator: maps components to generated variable
/// names. The model never invents names on its own.
pub trait NameService {
    /// A fresh name for a class, optionally derived from a hint. With
    /// `force_unique` a taken hint gets a numeric suffix, otherwise a taken
    /// hint is an error surfaced by `reserve`.
    fn create_name(&mut self, prefix: &str, hint: Option<&str>, force_unique: bool) -> String;
    /// Reserves an exact name. Returns false when already taken.
    fn reserve(&mut self, name: &str) -> bool;
    fn rename(&mut self, old: &str, new: &str) -> Result<(), NameError>;
    fn release(&mut self, name: &str);
    fn is_reserved(&self, name: &str) -> bool;
}

/// Whether a string is usable as a generated variable name.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Default name pool: prefix + counter names in the host style
/// (btn1, lbl2, ...).
#[derive(Debug, Default)]
pub struct VariablePool {
    used: BTreeSet<String>,
    counters: HashMap<String, u32>,
}

impl VariablePool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameService for VariablePool {
    fn create_name(&mut self, prefix: &str, hint: Option<&str>, force_unique: bool) -> String {
        if let Some(hint) = hint {
            if !self.used.contains(hint) {
                self.used.insert(hint.to_string());
                return hint.to_string();
            }
            if force_unique {
                let mut n = 1;
                loop {
                    let candidate = format!("{}{}", hint, n);
                    if !self.used.contains(&candidate) {
                        self.used.insert(candidate.clone());
                        return candidate;
                    }
                    n += 1;
                }
            }
        }
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", prefix, counter);
            if !self.used.contains(&candidate) {
                self.used.insert(candidate.clone());
                return candidate;
            }
        }
    }

    fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_string())
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<(), NameError> {
        if !self.used.contains(old) {
            return Err(NameError::UnknownVariable(old.to_string()));
        }
        if self.used.contains(new) {
            return Err(NameError::NameInUse(new.to_string()));
        }
        self.used.remove(old);
        self.used.insert(new.to_string());
        Ok(())
    }

    fn release(&mut self, name: &str) {
        self.used.remove(name);
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefix_counter() {
        let mut pool = VariablePool::new();
        assert_eq!(pool.create_name("btn", None, false), "btn1");
        assert_eq!(pool.create_name("btn", None, false), "btn2");
        assert_eq!(pool.create_name("lbl", None, false), "lbl1");
    }

    #[test]
    fn hint_collision_appends_suffix() {
        let mut pool = VariablePool::new();
        assert_eq!(pool.create_name("btn", Some("okButton"), true), "okButton");
        assert_eq!(pool.create_name("btn", Some("okButton"), true), "okButton1");
    }
}
