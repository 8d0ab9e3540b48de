use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width &&
        y >= self.y && y < self.y + self.height
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// A property value as held by the meta-model. `PartialEq` gives the deep
/// equality used for change detection, including element-wise array
/// comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i32),
    Boolean(bool),
    Double(f64),
    Color(String),
    StringArray(Vec<String>),
    IntArray(Vec<i32>),
    /// An indirection standing in for a resource, localized string or a
    /// component reference. Unwrapped before reaching a real target.
    Design(Box<DesignValue>),
}

impl PropertyValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&Vec<String>> {
        match self {
            PropertyValue::StringArray(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_design(&self) -> Option<&DesignValue> {
        match self {
            PropertyValue::Design(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_design(&self) -> bool {
        matches!(self, PropertyValue::Design(_))
    }

    pub fn design(value: DesignValue) -> Self {
        PropertyValue::Design(Box::new(value))
    }

    /// The plain value to push to a target object: design values are
    /// unwrapped, `None` is the "ignored" sentinel (leave the target's own
    /// default untouched).
    pub fn unwrapped(&self) -> Option<PropertyValue> {
        match self {
            PropertyValue::Design(d) => d.design_value(),
            other => Some(other.clone()),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        PropertyValue::Double(d)
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
    Double,
    Color,
    StringArray,
    IntArray,
    Any,
}

impl ValueType {
    /// Whether a plain value is assignable to this type. Design values are
    /// always accepted; their cached value is checked when unwrapped.
    pub fn accepts(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (_, PropertyValue::Design(_)) => true,
            (ValueType::Any, _) => true,
            (ValueType::String, PropertyValue::String(_)) => true,
            (ValueType::Integer, PropertyValue::Integer(_)) => true,
            (ValueType::Boolean, PropertyValue::Boolean(_)) => true,
            (ValueType::Double, PropertyValue::Double(_)) => true,
            (ValueType::Color, PropertyValue::Color(_)) => true,
            (ValueType::Color, PropertyValue::String(_)) => true,
            (ValueType::StringArray, PropertyValue::StringArray(_)) => true,
            (ValueType::IntArray, PropertyValue::IntArray(_)) => true,
            _ => false,
        }
    }
}

/// The design-value indirection of the meta-model. The real target object
/// only ever receives the unwrapped plain value, or nothing at all for the
/// `Ignored` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DesignValue {
    /// Value backed by an externalized resource entry.
    Resource { key: String, cached: Box<PropertyValue> },
    /// Localized string; `cached` is the current-locale rendering.
    Localized { key: String, cached: Box<PropertyValue> },
    /// Reference to a sibling component, resolved at replication time.
    ComponentRef { target: String },
    /// Don't touch the target, leave its own default.
    Ignored,
}

impl DesignValue {
    /// The plain design-time value, or `None` for the ignored sentinel.
    pub fn design_value(&self) -> Option<PropertyValue> {
        match self {
            DesignValue::Resource { cached, .. } => Some((**cached).clone()),
            DesignValue::Localized { cached, .. } => Some((**cached).clone()),
            DesignValue::ComponentRef { .. } => None,
            DesignValue::Ignored => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            DesignValue::Resource { key, .. } | DesignValue::Localized { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn with_key(&self, new_key: impl Into<String>) -> DesignValue {
        match self {
            DesignValue::Resource { cached, .. } => DesignValue::Resource {
                key: new_key.into(),
                cached: cached.clone(),
            },
            DesignValue::Localized { cached, .. } => DesignValue::Localized {
                key: new_key.into(),
                cached: cached.clone(),
            },
            other => other.clone(),
        }
    }

    /// Resource-backed values are only representable in the newer persisted
    /// format and force a version bump on the owning model.
    pub fn raises_format_version(&self) -> bool {
        matches!(self, DesignValue::Resource { .. } | DesignValue::Localized { .. })
    }
}
