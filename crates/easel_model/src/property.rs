use crate::bean::{BeanError, BeanInstance, PropertyDescriptor, DETACHED_READ, DETACHED_WRITE, NO_READ, NO_WRITE};
use crate::value::{DesignValue, PropertyValue, ValueType};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("property '{0}' is not writable")]
    ReadOnly(String),
    #[error("value of wrong type for property '{name}': expected {expected:?}")]
    TypeMismatch { name: String, expected: ValueType },
    #[error("failed writing property '{name}' to target: {reason}")]
    TargetWrite { name: String, reason: String },
}

impl PropertyError {
    fn target_write(name: &str, err: BeanError) -> Self {
        PropertyError::TargetWrite { name: name.to_string(), reason: err.to_string() }
    }
}

/// Input to `set_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueInput {
    /// The defaulting sentinel: substitute the property's default value.
    Default,
    Plain(PropertyValue),
    /// A paired value + property-editor override; fires one combined
    /// notification instead of two.
    WithEditor(PropertyValue, String),
}

/// Outcome of a successful, non-vetoed value change.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub property: String,
    pub old_value: Option<PropertyValue>,
    pub new_value: PropertyValue,
    pub editor_changed: bool,
}

/// Pluggable value convertor: the first stage returning a non-identity
/// result wins, the rest are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueConvertor {
    /// Wraps plain strings into localizable design values.
    AutoLocalize { key_prefix: String },
    /// Wraps plain color strings into resource-backed design values.
    AutoResource { key_prefix: String },
}

impl ValueConvertor {
    pub fn convert(&self, property: &str, value: &PropertyValue) -> Option<PropertyValue> {
        match self {
            ValueConvertor::AutoLocalize { key_prefix } => match value {
                PropertyValue::String(_) => Some(PropertyValue::design(DesignValue::Localized {
                    key: format!("{}.{}", key_prefix, property),
                    cached: Box::new(value.clone()),
                })),
                _ => None,
            },
            ValueConvertor::AutoResource { key_prefix } => match value {
                PropertyValue::Color(_) => Some(PropertyValue::design(DesignValue::Resource {
                    key: format!("{}.{}", key_prefix, property),
                    cached: Box::new(value.clone()),
                })),
                _ => None,
            },
        }
    }
}

/// A named, typed attribute of a meta-component's target object, with
/// detached/cached value semantics and default-value tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormProperty {
    name: String,
    value_type: ValueType,
    access: u8,
    default_value: Option<PropertyValue>,
    value: Option<PropertyValue>,
    value_set: bool,
    changed: bool,
    editor: Option<String>,
    default_editor: Option<String>,
    convertors: Vec<ValueConvertor>,
    pre_code: Option<String>,
    post_code: Option<String>,
    monitor_external_changes: bool,
    /// Value most recently pushed to the target, used by external-change
    /// monitoring.
    last_target_value: Option<PropertyValue>,
}

impl FormProperty {
    pub fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        Self {
            name: desc.name.clone(),
            value_type: desc.value_type,
            access: desc.access,
            default_value: desc.default.clone(),
            value: None,
            value_set: false,
            changed: false,
            editor: None,
            default_editor: None,
            convertors: Vec::new(),
            pre_code: None,
            post_code: None,
            monitor_external_changes: false,
            last_target_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn access(&self) -> u8 {
        self.access
    }

    pub fn is_readable(&self) -> bool {
        self.access & NO_READ == 0
    }

    pub fn is_writable(&self) -> bool {
        self.access & NO_WRITE == 0
    }

    fn writes_to_target(&self) -> bool {
        self.access & (NO_WRITE | DETACHED_WRITE) == 0
    }

    fn reads_from_target(&self) -> bool {
        self.access & (NO_READ | DETACHED_READ) == 0
    }

    pub fn is_value_set(&self) -> bool {
        self.value_set
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn default_value(&self) -> Option<&PropertyValue> {
        self.default_value.as_ref()
    }

    pub fn editor(&self) -> Option<&str> {
        self.editor.as_deref()
    }

    pub fn set_editor(&mut self, editor: Option<String>) {
        self.editor = editor;
    }

    pub fn set_default_editor(&mut self, editor: Option<String>) {
        self.default_editor = editor;
    }

    pub fn add_convertor(&mut self, convertor: ValueConvertor) {
        self.convertors.push(convertor);
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        self.monitor_external_changes = enabled;
    }

    pub fn pre_code(&self) -> Option<&str> {
        self.pre_code.as_deref()
    }

    pub fn post_code(&self) -> Option<&str> {
        self.post_code.as_deref()
    }

    pub fn set_pre_code(&mut self, code: Option<String>) {
        self.pre_code = code;
    }

    pub fn set_post_code(&mut self, code: Option<String>) {
        self.post_code = code;
    }

    /// Current value: the cache when explicitly set, the default for
    /// detached reads, otherwise a read-through from the target.
    ///
    /// With external-change monitoring on, a read re-validates the cache
    /// against the live target: a target that no longer holds what was last
    /// written and has reverted to the default demotes the property back to
    /// tracking (covers setters with side effects on other properties).
    pub fn get_value(&mut self, target: Option<&BeanInstance>) -> Option<PropertyValue> {
        if self.monitor_external_changes
            && self.value_set
            && self.reads_from_target()
            && let Some(target) = target
            && let Some(real) = target.get(&self.name)
            && self.last_target_value.as_ref() != Some(real)
            && self.default_value.as_ref() == Some(real)
        {
            self.value = None;
            self.value_set = false;
            self.changed = false;
        }

        if self.value_set {
            return self.value.clone();
        }
        if self.reads_from_target()
            && let Some(target) = target
            && let Some(real) = target.get(&self.name)
        {
            return Some(real.clone());
        }
        self.default_value.clone()
    }

    /// The cached value, if explicitly set.
    pub fn cached_value(&self) -> Option<&PropertyValue> {
        if self.value_set { self.value.as_ref() } else { None }
    }

    /// Unwrapped cached value, if explicitly set.
    pub fn peek_unwrapped(&self) -> Option<PropertyValue> {
        if self.value_set {
            self.value.as_ref().and_then(|v| v.unwrapped())
        } else {
            None
        }
    }

    /// Swaps the cached value in place without notifications or target
    /// writes. Used when a derived key inside the value is rewritten.
    pub(crate) fn replace_cached(&mut self, value: PropertyValue) {
        if self.value_set {
            self.value = Some(value);
        }
    }

    /// Read without any monitoring side effect, used for old-value capture.
    fn peek_value(&self, target: Option<&BeanInstance>) -> Option<PropertyValue> {
        if self.value_set {
            return self.value.clone();
        }
        if self.reads_from_target()
            && let Some(target) = target
            && let Some(real) = target.get(&self.name)
        {
            return Some(real.clone());
        }
        self.default_value.clone()
    }

    /// Sets the property value. Returns `Ok(None)` when the call was a
    /// no-op or was vetoed, `Ok(Some(change))` when a notification should
    /// fire. Target-write failures propagate; the cache is not updated in
    /// that case.
    pub fn set_value(
        &mut self,
        mut target: Option<&mut BeanInstance>,
        input: ValueInput,
        veto: Option<&dyn Fn(&PropertyChange) -> bool>,
    ) -> Result<Option<PropertyChange>, PropertyError> {
        // Paired value+editor: install the editor, recurse with the value
        // alone, report one combined notification.
        if let ValueInput::WithEditor(value, editor) = input {
            let saved_editor = self.editor.clone();
            self.editor = Some(editor);
            match self.set_value(target, ValueInput::Plain(value), veto) {
                Ok(Some(mut change)) => {
                    change.editor_changed = true;
                    return Ok(Some(change));
                }
                Ok(None) => {
                    self.editor = saved_editor;
                    return Ok(None);
                }
                Err(e) => {
                    self.editor = saved_editor;
                    return Err(e);
                }
            }
        }

        // (1) Defaulting sentinel substitutes the default value.
        let mut value = match input {
            ValueInput::Default => match &self.default_value {
                Some(default) => default.clone(),
                None => return Ok(None),
            },
            ValueInput::Plain(v) => v,
            ValueInput::WithEditor(..) => unreachable!("handled above"),
        };

        // (2) Convertor chain, first non-identity result wins.
        for convertor in &self.convertors {
            if let Some(converted) = convertor.convert(&self.name, &value) {
                value = converted;
                break;
            }
        }

        if !self.value_type.accepts(&value) {
            return Err(PropertyError::TypeMismatch {
                name: self.name.clone(),
                expected: self.value_type,
            });
        }

        // (3) Old value for change notification, best effort.
        let old_value = self.peek_value(target.as_deref());

        // (5) Deep-equal values are a no-op, design values excepted.
        if let Some(old) = &old_value
            && *old == value
            && !value.is_design()
        {
            return Ok(None);
        }

        // (6) Unwrap design indirections, (7) ignored sentinel falls back to
        // pushing the default.
        let real_value = match value.unwrapped() {
            Some(real) => Some(real),
            None => self.default_value.clone(),
        };

        let saved = (
            self.value.clone(),
            self.value_set,
            self.changed,
            self.last_target_value.clone(),
        );

        let mut wrote_target = false;
        if self.writes_to_target()
            && let Some(target) = target.as_deref_mut()
            && let Some(real) = &real_value
        {
            target
                .set(&self.name, real.clone())
                .map_err(|e| PropertyError::target_write(&self.name, e))?;
            self.last_target_value = Some(real.clone());
            wrote_target = true;
        }

        // (8) Cache and flags.
        self.value = Some(value.clone());
        self.value_set = true;
        self.changed = self.is_writable()
            && self.is_readable()
            && (self.default_value.is_none() || self.default_value.as_ref() != Some(&value));

        // (9) Notification; a veto silently rolls everything back.
        let change = PropertyChange {
            property: self.name.clone(),
            old_value: old_value.clone(),
            new_value: value,
            editor_changed: false,
        };
        if let Some(veto) = veto
            && !veto(&change)
        {
            let (value, value_set, changed, last_target) = saved;
            self.value = value;
            self.value_set = value_set;
            self.changed = changed;
            self.last_target_value = last_target;
            if wrote_target
                && let Some(target) = target
                && let Some(old) = old_value.as_ref().and_then(|v| v.unwrapped())
            {
                // Best effort, failures swallowed.
                let _ = target.set(&self.name, old);
            }
            return Ok(None);
        }
        Ok(Some(change))
    }

    /// Pushes the default back to the target, re-reads the target into the
    /// tracking cache, resets the editor, and marks the property unchanged.
    pub fn restore_default_value(
        &mut self,
        mut target: Option<&mut BeanInstance>,
    ) -> Result<(), PropertyError> {
        if self.writes_to_target()
            && let Some(target) = target.as_deref_mut()
            && let Some(default) = self.default_value.as_ref().and_then(|v| v.unwrapped())
        {
            target
                .set(&self.name, default)
                .map_err(|e| PropertyError::target_write(&self.name, e))?;
        }
        self.last_target_value = target
            .as_deref()
            .and_then(|t| t.get(&self.name))
            .cloned();
        self.value = None;
        self.value_set = false;
        self.changed = false;
        self.editor = self.default_editor.clone();
        Ok(())
    }
}
