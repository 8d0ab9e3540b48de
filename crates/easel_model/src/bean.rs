use crate::events::EventSetDescriptor;
use crate::value::{PropertyValue, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

/// Access-mode bits of a property. A detached direction keeps the cached
/// value but never touches the target object.
pub const NO_READ: u8 = 0b0001;
pub const NO_WRITE: u8 = 0b0010;
pub const DETACHED_READ: u8 = 0b0100;
pub const DETACHED_WRITE: u8 = 0b1000;
pub const NORMAL_RW: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Preferred,
    Normal,
    Expert,
    Custom(String),
}

/// Registrable descriptor of one property: the capability-registry
/// replacement for runtime introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub default: Option<PropertyValue>,
    pub category: Category,
    pub access: u8,
    /// Explicitly marked as an action-style property.
    pub action: bool,
    /// Participates in data binding.
    pub bound: bool,
    /// Must not be pushed to rendering clones (would break the sandbox).
    pub suppressed_in_replica: bool,
    /// Localized text routed through the mnemonic helper on clones.
    pub mnemonic_text: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
            category: Category::Normal,
            access: NORMAL_RW,
            action: false,
            bound: false,
            suppressed_in_replica: false,
            mnemonic_text: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn preferred(mut self) -> Self {
        self.category = Category::Preferred;
        self
    }

    pub fn expert(mut self) -> Self {
        self.category = Category::Expert;
        self
    }

    pub fn custom(mut self, category: impl Into<String>) -> Self {
        self.category = Category::Custom(category.into());
        self
    }

    pub fn access(mut self, access: u8) -> Self {
        self.access = access;
        self
    }

    pub fn action(mut self) -> Self {
        self.action = true;
        self
    }

    pub fn bound(mut self) -> Self {
        self.bound = true;
        self
    }

    pub fn suppressed(mut self) -> Self {
        self.suppressed_in_replica = true;
        self
    }

    pub fn mnemonic_text(mut self) -> Self {
        self.mnemonic_text = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuRole {
    MenuBar,
    Menu,
    MenuItem,
    Separator,
}

/// Which classes a container accepts as visual children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChildPolicy {
    AnyVisual,
    Classes(Vec<String>),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerFacts {
    /// The layout is fixed for this container and cannot be replaced.
    pub dedicated_layout: bool,
    pub can_have_menu_bar: bool,
    pub child_policy: ChildPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFacts {
    /// Top-level window class: cannot have a visual parent.
    pub window: bool,
    pub container: Option<ContainerFacts>,
}

/// What a bean class is, for placement classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BeanRole {
    Layout,
    Border,
    Menu(MenuRole),
    Visual(VisualFacts),
    Other,
}

impl BeanRole {
    pub fn is_visual(&self) -> bool {
        matches!(self, BeanRole::Visual(_))
    }

    pub fn is_menu(&self) -> bool {
        matches!(self, BeanRole::Menu(_))
    }

    pub fn container_facts(&self) -> Option<&ContainerFacts> {
        match self {
            BeanRole::Visual(v) => v.container.as_ref(),
            _ => None,
        }
    }
}

/// A menu container accepts items depending on both roles.
pub fn menu_accepts(container: MenuRole, item: MenuRole) -> bool {
    match container {
        MenuRole::MenuBar => matches!(item, MenuRole::Menu),
        MenuRole::Menu => matches!(item, MenuRole::Menu | MenuRole::MenuItem | MenuRole::Separator),
        MenuRole::MenuItem | MenuRole::Separator => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanDescriptor {
    pub class_name: String,
    pub role: BeanRole,
    /// Cannot be default-instantiated; the "expected" failure kind.
    pub abstract_class: bool,
    pub properties: Vec<PropertyDescriptor>,
    pub event_sets: Vec<EventSetDescriptor>,
    pub default_event: Option<String>,
    /// Legacy peer-bound class: clones must be destroyed and re-created on
    /// property change, live update is not possible.
    pub recreate_on_peer_change: bool,
    /// Variable-name prefix for generated names.
    pub name_prefix: String,
    pub default_size: (i32, i32),
}

impl BeanDescriptor {
    pub fn new(class_name: impl Into<String>, role: BeanRole) -> Self {
        Self {
            class_name: class_name.into(),
            role,
            abstract_class: false,
            properties: Vec::new(),
            event_sets: Vec::new(),
            default_event: None,
            recreate_on_peer_change: false,
            name_prefix: "comp".to_string(),
            default_size: (100, 100),
        }
    }

    pub fn with_property(mut self, prop: PropertyDescriptor) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn with_event_set(mut self, set: EventSetDescriptor) -> Self {
        self.event_sets.push(set);
        self
    }

    pub fn default_event(mut self, name: impl Into<String>) -> Self {
        self.default_event = Some(name.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.abstract_class = true;
        self
    }

    pub fn peer_bound(mut self) -> Self {
        self.recreate_on_peer_change = true;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn size(mut self, width: i32, height: i32) -> Self {
        self.default_size = (width, height);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn event(&self, name: &str) -> Option<(&EventSetDescriptor, &crate::events::EventDescriptor)> {
        for set in &self.event_sets {
            if let Some(ev) = set.events.iter().find(|e| e.name == name) {
                return Some((set, ev));
            }
        }
        None
    }
}

/// The materialized bean object: a value map shaped by the descriptor. This
/// is both the design-time instance owned by a meta-component and the
/// render-only clone held by the replicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanInstance {
    pub class_name: String,
    declared: BTreeSet<String>,
    values: HashMap<String, PropertyValue>,
}

impl BeanInstance {
    fn from_descriptor(desc: &BeanDescriptor) -> Self {
        let declared: BTreeSet<String> = desc.properties.iter().map(|p| p.name.clone()).collect();
        let mut values = HashMap::new();
        for prop in &desc.properties {
            if let Some(default) = &prop.default {
                values.insert(prop.name.clone(), default.clone());
            }
        }
        Self { class_name: desc.class_name.clone(), declared, values }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Writes a value. Unknown property names fail, the analogue of an
    /// invocation failure on a reflective setter.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), BeanError> {
        if !self.declared.contains(name) {
            return Err(BeanError::NoSuchProperty {
                class: self.class_name.clone(),
                property: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declared.contains(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BeanError {
    #[error("unknown bean class '{0}'")]
    UnknownClass(String),
    #[error("cannot instantiate abstract class '{0}'")]
    AbstractClass(String),
    #[error("no property '{property}' on class '{class}'")]
    NoSuchProperty { class: String, property: String },
}

impl BeanError {
    /// Expected failures get plain user messaging; unexpected ones are shown
    /// with full detail.
    pub fn is_expected(&self) -> bool {
        matches!(self, BeanError::AbstractClass(_))
    }
}

/// Bounded LRU of default instances, keyed by class name. Owned by the
/// registry and reached from several collaborators, hence the mutex.
#[derive(Debug)]
struct InstanceCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, BeanInstance>,
}

impl InstanceCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::new(), entries: HashMap::new() }
    }

    fn get(&mut self, class: &str) -> Option<BeanInstance> {
        if let Some(instance) = self.entries.get(class) {
            let instance = instance.clone();
            self.order.retain(|c| c != class);
            self.order.push_back(class.to_string());
            Some(instance)
        } else {
            None
        }
    }

    fn put(&mut self, class: String, instance: BeanInstance) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&class) {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.retain(|c| c != &class);
        self.order.push_back(class.clone());
        self.entries.insert(class, instance);
    }
}

/// Lookup table of bean descriptors, keyed by class name. Third-party types
/// register their descriptors here instead of being introspected.
#[derive(Debug)]
pub struct BeanRegistry {
    descriptors: HashMap<String, BeanDescriptor>,
    /// Per-class (earlier, later) ordering constraints applied after
    /// partitioning, so e.g. a text property sorts before a color one.
    order_hints: HashMap<String, Vec<(String, String)>>,
    instance_cache: Mutex<InstanceCache>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
            order_hints: HashMap::new(),
            instance_cache: Mutex::new(InstanceCache::new(32)),
        }
    }

    pub fn register(&mut self, desc: BeanDescriptor) {
        self.descriptors.insert(desc.class_name.clone(), desc);
    }

    pub fn order_before(&mut self, class: &str, earlier: &str, later: &str) {
        self.order_hints
            .entry(class.to_string())
            .or_default()
            .push((earlier.to_string(), later.to_string()));
    }

    pub fn load_class(&self, name: &str) -> Result<&BeanDescriptor, BeanError> {
        self.descriptors
            .get(name)
            .ok_or_else(|| BeanError::UnknownClass(name.to_string()))
    }

    pub fn create_instance(&self, name: &str) -> Result<BeanInstance, BeanError> {
        let desc = self.load_class(name)?;
        if desc.abstract_class {
            return Err(BeanError::AbstractClass(name.to_string()));
        }
        Ok(BeanInstance::from_descriptor(desc))
    }

    /// A shared default instance, served from the bounded cache.
    pub fn default_instance(&self, name: &str) -> Result<BeanInstance, BeanError> {
        {
            let mut cache = self.instance_cache.lock().expect("instance cache poisoned");
            if let Some(instance) = cache.get(name) {
                return Ok(instance);
            }
        }
        let instance = self.create_instance(name)?;
        let mut cache = self.instance_cache.lock().expect("instance cache poisoned");
        cache.put(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Stable-sorts `names` so every registered (earlier, later) pair for the
    /// class is satisfied. A pluggable post-process, not hard-coded per
    /// property.
    pub fn apply_order_hints(&self, class: &str, names: &mut Vec<String>) {
        let Some(hints) = self.order_hints.get(class) else {
            return;
        };
        for (earlier, later) in hints {
            let earlier_pos = names.iter().position(|n| n == earlier);
            let later_pos = names.iter().position(|n| n == later);
            if let (Some(e), Some(l)) = (earlier_pos, later_pos)
                && e > l
            {
                let name = names.remove(e);
                names.insert(l, name);
            }
        }
    }

    fn visual(window: bool, container: Option<ContainerFacts>) -> BeanRole {
        BeanRole::Visual(VisualFacts { window, container })
    }

    fn general_container() -> Option<ContainerFacts> {
        Some(ContainerFacts {
            dedicated_layout: false,
            can_have_menu_bar: false,
            child_policy: ChildPolicy::AnyVisual,
        })
    }

    fn common_visual_props(desc: BeanDescriptor) -> BeanDescriptor {
        desc.with_property(PropertyDescriptor::new("Enabled", ValueType::Boolean).with_default(true))
            .with_property(PropertyDescriptor::new("Visible", ValueType::Boolean).with_default(true))
            .with_property(PropertyDescriptor::new("BackColor", ValueType::Color).with_default(PropertyValue::Color("#f8fafc".into())))
            .with_property(PropertyDescriptor::new("ForeColor", ValueType::Color).with_default(PropertyValue::Color("#0f172a".into())))
            .with_property(PropertyDescriptor::new("Font", ValueType::String).with_default("Segoe UI, 12px").expert())
            .with_property(PropertyDescriptor::new("X", ValueType::Integer).with_default(0).custom("layout"))
            .with_property(PropertyDescriptor::new("Y", ValueType::Integer).with_default(0).custom("layout"))
            .with_property(PropertyDescriptor::new("Width", ValueType::Integer).with_default(100).custom("layout"))
            .with_property(PropertyDescriptor::new("Height", ValueType::Integer).with_default(100).custom("layout"))
            .with_property(PropertyDescriptor::new("Mnemonic", ValueType::String).with_default("").expert())
            .with_property(PropertyDescriptor::new("Border", ValueType::String).with_default("").expert())
            .with_property(PropertyDescriptor::new("AccessibleName", ValueType::String).custom("accessibility"))
            .with_property(PropertyDescriptor::new("AccessibleDescription", ValueType::String).custom("accessibility"))
            .with_event_set(EventSetDescriptor::action())
            .with_event_set(EventSetDescriptor::mouse())
            .with_event_set(EventSetDescriptor::key())
            .with_event_set(EventSetDescriptor::focus())
    }

    /// The built-in widget set.
    pub fn standard() -> Self {
        let mut reg = Self::new();

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("Form", Self::visual(true, Some(ContainerFacts {
                dedicated_layout: false,
                can_have_menu_bar: true,
                child_policy: ChildPolicy::AnyVisual,
            }))))
            .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("Form").preferred().bound().mnemonic_text())
            .with_event_set(EventSetDescriptor::window())
            .default_event("Load")
            .prefix("frm")
            .size(640, 480),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("Panel", Self::visual(false, Self::general_container())))
                .with_property(PropertyDescriptor::new("BorderStyle", ValueType::String).with_default("None"))
                .prefix("pnl")
                .size(200, 150),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("GroupBox", Self::visual(false, Self::general_container())))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().bound().mnemonic_text())
                .prefix("grp")
                .size(200, 150),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("TabControl", Self::visual(false, Some(ContainerFacts {
                dedicated_layout: true,
                can_have_menu_bar: false,
                child_policy: ChildPolicy::Classes(vec!["TabPage".to_string()]),
            }))))
            .with_property(PropertyDescriptor::new("SelectedIndex", ValueType::Integer).with_default(0))
            .prefix("tab")
            .size(300, 200),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("TabPage", Self::visual(false, Self::general_container())))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().mnemonic_text())
                .prefix("tp")
                .size(300, 200),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("LayeredPanel", Self::visual(false, Self::general_container())))
                .prefix("lyp")
                .size(200, 150),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("Button", Self::visual(false, None)))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().bound().mnemonic_text())
                .with_property(PropertyDescriptor::new("Default", ValueType::Boolean).with_default(false).expert())
                .default_event("Click")
                .prefix("btn")
                .size(120, 30),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("Label", Self::visual(false, None)))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().bound().mnemonic_text())
                .with_property(PropertyDescriptor::new("AutoSize", ValueType::Boolean).with_default(false))
                .prefix("lbl")
                .size(80, 20),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("TextBox", Self::visual(false, None)))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().bound())
                .with_property(PropertyDescriptor::new("ReadOnly", ValueType::Boolean).with_default(false))
                .with_property(PropertyDescriptor::new("Focused", ValueType::Boolean).with_default(false).suppressed().access(NO_WRITE))
                .with_event_set(EventSetDescriptor::change())
                .default_event("TextChanged")
                .prefix("txt")
                .size(150, 25),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("CheckBox", Self::visual(false, None)))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().mnemonic_text())
                .with_property(PropertyDescriptor::new("Checked", ValueType::Boolean).with_default(false).preferred().bound().action())
                .with_event_set(EventSetDescriptor::change())
                .default_event("ValueChanged")
                .prefix("chk")
                .size(120, 20),
        );

        reg.register(
            Self::common_visual_props(BeanDescriptor::new("ListBox", Self::visual(false, None)))
                .with_property(PropertyDescriptor::new("List", ValueType::StringArray).with_default(PropertyValue::StringArray(vec![])))
                .with_property(PropertyDescriptor::new("ListIndex", ValueType::Integer).with_default(-1).bound())
                .with_event_set(EventSetDescriptor::change())
                .prefix("lst")
                .size(150, 100),
        );

        // Legacy peer-bound widget: its native sub-object cannot be live
        // updated, clones are recreated instead.
        reg.register(
            Self::common_visual_props(BeanDescriptor::new("NativeCanvas", Self::visual(false, None)))
                .peer_bound()
                .prefix("cnv")
                .size(100, 100),
        );

        reg.register(
            BeanDescriptor::new("MenuStrip", BeanRole::Menu(MenuRole::MenuBar))
                .with_property(PropertyDescriptor::new("Visible", ValueType::Boolean).with_default(true))
                .prefix("ms")
                .size(300, 24),
        );
        reg.register(
            BeanDescriptor::new("Menu", BeanRole::Menu(MenuRole::Menu))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().mnemonic_text())
                .prefix("mnu")
                .size(100, 22),
        );
        reg.register(
            BeanDescriptor::new("MenuItem", BeanRole::Menu(MenuRole::MenuItem))
                .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").preferred().mnemonic_text())
                .with_event_set(EventSetDescriptor::action())
                .default_event("Click")
                .prefix("mi")
                .size(100, 22),
        );
        reg.register(
            BeanDescriptor::new("MenuSeparator", BeanRole::Menu(MenuRole::Separator))
                .prefix("sep")
                .size(100, 2),
        );

        reg.register(BeanDescriptor::new("FlowLayout", BeanRole::Layout).prefix("flow"));
        reg.register(BeanDescriptor::new("GridLayout", BeanRole::Layout).prefix("grid"));
        reg.register(BeanDescriptor::new("AbsoluteLayout", BeanRole::Layout).prefix("abs"));

        reg.register(BeanDescriptor::new("LineBorder", BeanRole::Border).prefix("bdr"));
        reg.register(
            BeanDescriptor::new("TitledBorder", BeanRole::Border)
                .with_property(PropertyDescriptor::new("Title", ValueType::String).with_default(""))
                .prefix("bdr"),
        );

        reg.register(
            BeanDescriptor::new("Timer", BeanRole::Other)
                .with_property(PropertyDescriptor::new("Interval", ValueType::Integer).with_default(1000).preferred())
                .with_property(PropertyDescriptor::new("Active", ValueType::Boolean).with_default(false))
                .with_event_set(EventSetDescriptor::new("timer", crate::events::EventApplicability::Any)
                    .with_event("Tick", "sender As Object, e As EventArgs"))
                .default_event("Tick")
                .prefix("tmr"),
        );

        reg.register(
            BeanDescriptor::new("BindingSource", BeanRole::Other)
                .with_property(PropertyDescriptor::new("DataSource", ValueType::String).with_default(""))
                .with_property(PropertyDescriptor::new("DataMember", ValueType::String).with_default(""))
                .prefix("bs"),
        );

        // Abstract base class, kept registered so instantiation attempts
        // surface the expected-failure path.
        reg.register(
            BeanDescriptor::new("AbstractControl", Self::visual(false, None)).abstract_class().prefix("ctl"),
        );

        // Replica substitute for window classes: a plain root container.
        reg.register(
            Self::common_visual_props(BeanDescriptor::new("RootPanel", Self::visual(false, Some(ContainerFacts {
                dedicated_layout: false,
                can_have_menu_bar: true,
                child_policy: ChildPolicy::AnyVisual,
            }))))
            .with_property(PropertyDescriptor::new("Text", ValueType::String).with_default("").mnemonic_text())
            .prefix("root")
            .size(640, 480),
        );

        reg.order_before("Button", "Text", "BackColor");
        reg.order_before("Label", "Text", "BackColor");
        reg.order_before("TextBox", "Text", "BackColor");

        reg
    }
}

impl Default for BeanRegistry {
    fn default() -> Self {
        Self::new()
    }
}
