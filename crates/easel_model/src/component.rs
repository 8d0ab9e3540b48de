use crate::bean::{BeanDescriptor, BeanInstance, BeanRegistry, Category, MenuRole, DETACHED_READ, DETACHED_WRITE};
use crate::id::ComponentId;
use crate::property::FormProperty;
use crate::value::{Bounds, PropertyValue, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layout constraints of one child within a container, opaque to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutConstraints {
    Absolute(Bounds),
    Grid { row: i32, col: i32, row_span: i32, col_span: i32 },
    Edge(String),
    Index(i32),
    Custom(serde_json::Value),
}

/// Legacy layout-delegate mechanism: per-index constraints parallel to the
/// container's child list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDelegateState {
    pub class_name: String,
    pub constraints: Vec<Option<LayoutConstraints>>,
}

/// Newer constraint-based mechanism: a per-child constraint graph keyed by
/// component id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintGraph {
    pub class_name: String,
    pub by_child: BTreeMap<ComponentId, LayoutConstraints>,
}

impl ConstraintGraph {
    /// Clones the graph rewriting source child ids through the remap table.
    /// Entries for unknown children are dropped.
    pub fn clone_remapped(&self, remap: &BTreeMap<ComponentId, ComponentId>) -> ConstraintGraph {
        let mut by_child = BTreeMap::new();
        for (child, constraints) in &self.by_child {
            if let Some(new_id) = remap.get(child) {
                by_child.insert(*new_id, constraints.clone());
            }
        }
        ConstraintGraph { class_name: self.class_name.clone(), by_child }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutState {
    Delegate(LayoutDelegateState),
    Constraints(ConstraintGraph),
}

impl LayoutState {
    pub fn class_name(&self) -> &str {
        match self {
            LayoutState::Delegate(d) => &d.class_name,
            LayoutState::Constraints(g) => &g.class_name,
        }
    }

    pub fn constraints_for(&self, child: ComponentId, index: usize) -> Option<LayoutConstraints> {
        match self {
            LayoutState::Delegate(d) => d.constraints.get(index).cloned().flatten(),
            LayoutState::Constraints(g) => g.by_child.get(&child).cloned(),
        }
    }
}

/// The kind tag of a meta-component, dispatched by exhaustive matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentKind {
    Plain,
    Visual {
        /// Per-layout-class constraints remembered across layout switches.
        constraints: BTreeMap<String, LayoutConstraints>,
    },
    VisualContainer {
        constraints: BTreeMap<String, LayoutConstraints>,
        children: Vec<ComponentId>,
        layout: LayoutState,
        menu_bar: Option<ComponentId>,
    },
    Menu {
        role: MenuRole,
        items: Vec<ComponentId>,
    },
    MenuItem,
}

impl ComponentKind {
    pub fn for_descriptor(desc: &BeanDescriptor) -> Self {
        match &desc.role {
            crate::bean::BeanRole::Visual(facts) => {
                if facts.container.is_some() {
                    ComponentKind::VisualContainer {
                        constraints: BTreeMap::new(),
                        children: Vec::new(),
                        layout: LayoutState::Delegate(LayoutDelegateState {
                            class_name: "AbsoluteLayout".to_string(),
                            constraints: Vec::new(),
                        }),
                        menu_bar: None,
                    }
                } else {
                    ComponentKind::Visual { constraints: BTreeMap::new() }
                }
            }
            crate::bean::BeanRole::Menu(role) => match role {
                MenuRole::MenuBar | MenuRole::Menu => {
                    ComponentKind::Menu { role: *role, items: Vec::new() }
                }
                MenuRole::MenuItem | MenuRole::Separator => ComponentKind::MenuItem,
            },
            _ => ComponentKind::Plain,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ComponentKind::VisualContainer { .. } | ComponentKind::Menu { .. })
    }
}

/// Named partition of a property set (preferred / normal / expert / custom
/// categories / action-marked).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    pub name: String,
    pub members: Vec<String>,
}

/// Lazily created, cached property collections of one component. Recreated
/// only when the bean class changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCache {
    by_name: BTreeMap<String, FormProperty>,
    sets: Vec<PropertySet>,
    synthetic: BTreeMap<String, FormProperty>,
    binding: BTreeMap<String, FormProperty>,
    accessibility: Vec<String>,
}

impl PropertyCache {
    fn build(desc: &BeanDescriptor, registry: &BeanRegistry) -> Self {
        let mut by_name = BTreeMap::new();
        let mut preferred = Vec::new();
        let mut normal = Vec::new();
        let mut expert = Vec::new();
        let mut custom: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut action = Vec::new();
        let mut accessibility = Vec::new();
        let mut binding = BTreeMap::new();

        for prop in &desc.properties {
            by_name.insert(prop.name.clone(), FormProperty::from_descriptor(prop));
            match &prop.category {
                Category::Preferred => preferred.push(prop.name.clone()),
                Category::Normal => normal.push(prop.name.clone()),
                Category::Expert => expert.push(prop.name.clone()),
                Category::Custom(cat) => {
                    if cat == "accessibility" {
                        accessibility.push(prop.name.clone());
                    }
                    custom.entry(cat.clone()).or_default().push(prop.name.clone());
                }
            }
            if prop.action {
                action.push(prop.name.clone());
            }
            if prop.bound {
                // Binding properties live detached from the target; their
                // value is a component-reference design value.
                let mut binding_desc = prop.clone();
                binding_desc.value_type = ValueType::Any;
                binding_desc.access = DETACHED_READ | DETACHED_WRITE;
                binding_desc.default = None;
                binding.insert(prop.name.clone(), FormProperty::from_descriptor(&binding_desc));
            }
        }

        registry.apply_order_hints(&desc.class_name, &mut preferred);
        registry.apply_order_hints(&desc.class_name, &mut normal);
        registry.apply_order_hints(&desc.class_name, &mut expert);

        let mut sets = Vec::new();
        sets.push(PropertySet { name: "preferred".to_string(), members: preferred });
        sets.push(PropertySet { name: "normal".to_string(), members: normal });
        sets.push(PropertySet { name: "expert".to_string(), members: expert });
        for (name, members) in custom {
            sets.push(PropertySet { name, members });
        }
        sets.push(PropertySet { name: "action".to_string(), members: action });

        let mut synthetic = BTreeMap::new();
        let mut name_prop = crate::bean::PropertyDescriptor::new("variableName", ValueType::String);
        name_prop.access = DETACHED_READ | DETACHED_WRITE;
        synthetic.insert("variableName".to_string(), FormProperty::from_descriptor(&name_prop));

        Self { by_name, sets, synthetic, binding, accessibility }
    }

    pub fn get(&self, name: &str) -> Option<&FormProperty> {
        self.by_name.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FormProperty> {
        self.by_name.get_mut(name)
    }

    pub fn sets(&self) -> &[PropertySet] {
        &self.sets
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_name.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormProperty)> {
        self.by_name.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut FormProperty)> {
        self.by_name.iter_mut()
    }

    pub fn synthetic(&self, name: &str) -> Option<&FormProperty> {
        self.synthetic.get(name)
    }

    pub fn binding(&self, name: &str) -> Option<&FormProperty> {
        self.binding.get(name)
    }

    pub fn binding_mut(&mut self, name: &str) -> Option<&mut FormProperty> {
        self.binding.get_mut(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &FormProperty)> {
        self.binding.iter()
    }

    pub fn accessibility_names(&self) -> &[String] {
        &self.accessibility
    }
}

/// One design-time component: owns its bean instance, cached property
/// collections, auxiliary metadata, and its place in the component tree.
/// The parent edge is an id, never an owning reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaComponent {
    id: ComponentId,
    bean_class: String,
    instance: BeanInstance,
    pub kind: ComponentKind,
    pub parent: Option<ComponentId>,
    /// Variable name cached while detached from generated code.
    stored_name: Option<String>,
    name: Option<String>,
    aux_values: BTreeMap<String, serde_json::Value>,
    props: Option<PropertyCache>,
    /// Event name -> attached handler method names.
    pub event_handlers: BTreeMap<String, Vec<String>>,
    in_model: bool,
}

impl MetaComponent {
    pub fn new(desc: &BeanDescriptor, instance: BeanInstance) -> Self {
        Self {
            id: ComponentId::new(),
            bean_class: desc.class_name.clone(),
            instance,
            kind: ComponentKind::for_descriptor(desc),
            parent: None,
            stored_name: None,
            name: None,
            aux_values: BTreeMap::new(),
            props: None,
            event_handlers: BTreeMap::new(),
            in_model: false,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Used only when re-materializing a copied subtree with fresh ids.
    pub fn reassign_id(&mut self, id: ComponentId) {
        self.id = id;
    }

    /// A detached duplicate for copy and paste. The variable name becomes a
    /// stored-name hint for the attach-time name generator; event handlers
    /// are left behind for explicit re-attachment under remapped names.
    pub fn detached_copy(&self) -> MetaComponent {
        let mut copy = self.clone();
        copy.stored_name = self.name.clone().or_else(|| self.stored_name.clone());
        copy.name = None;
        copy.in_model = false;
        copy.event_handlers.clear();
        copy
    }

    /// Rewrites every component id held by this record through the remap
    /// table, including its own. Parent edges leading outside the table are
    /// severed.
    pub fn remap_refs(&mut self, remap: &BTreeMap<ComponentId, ComponentId>) {
        if let Some(new_id) = remap.get(&self.id) {
            self.id = *new_id;
        }
        self.parent = self.parent.and_then(|p| remap.get(&p).copied());
        match &mut self.kind {
            ComponentKind::VisualContainer { children, layout, menu_bar, .. } => {
                for child in children.iter_mut() {
                    if let Some(new_id) = remap.get(child) {
                        *child = *new_id;
                    }
                }
                if let Some(menu) = menu_bar
                    && let Some(new_id) = remap.get(menu)
                {
                    *menu = *new_id;
                }
                if let LayoutState::Constraints(graph) = layout {
                    *graph = graph.clone_remapped(remap);
                }
            }
            ComponentKind::Menu { items, .. } => {
                for item in items.iter_mut() {
                    if let Some(new_id) = remap.get(item) {
                        *item = *new_id;
                    }
                }
            }
            _ => {}
        }
    }

    /// Replaces resource and localization indirections with their cached
    /// plain values. Used when a copy crosses into another model, whose
    /// resource store does not hold the source's entries.
    pub fn resolve_design_values(&mut self) {
        if let Some(props) = &mut self.props {
            for (_, prop) in props.iter_mut() {
                let plain = match prop.cached_value() {
                    Some(PropertyValue::Design(design)) => design.design_value(),
                    _ => None,
                };
                if let Some(plain) = plain {
                    prop.replace_cached(plain);
                }
            }
        }
    }

    pub fn bean_class(&self) -> &str {
        &self.bean_class
    }

    pub fn instance(&self) -> &BeanInstance {
        &self.instance
    }

    /// Replaces the bean instance directly, keeping cached properties.
    pub fn set_instance(&mut self, instance: BeanInstance) {
        self.instance = instance;
    }

    /// Re-instantiates from a (possibly different) bean class. Introspection
    /// metadata is computed eagerly so failures surface here, not later. A
    /// class change invalidates all cached property collections.
    pub fn init_instance(
        &mut self,
        registry: &BeanRegistry,
        bean_class: &str,
    ) -> Result<(), crate::bean::BeanError> {
        let desc = registry.load_class(bean_class)?;
        let instance = registry.create_instance(bean_class)?;
        if self.bean_class != bean_class {
            self.props = None;
            self.event_handlers.clear();
            self.kind = ComponentKind::for_descriptor(desc);
        }
        self.bean_class = bean_class.to_string();
        self.instance = instance;
        // Eager introspection.
        self.ensure_props(registry);
        Ok(())
    }

    /// Replaces the instance with a fresh clone carrying the currently set
    /// property values (used after external edits to the bean).
    pub fn update_instance(&mut self, registry: &BeanRegistry) -> Result<(), crate::bean::BeanError> {
        let mut fresh = registry.create_instance(&self.bean_class)?;
        if let Some(props) = &self.props {
            for (name, prop) in props.iter() {
                if prop.is_value_set()
                    && let Some(value) = prop.peek_unwrapped()
                {
                    let _ = fresh.set(name, value);
                }
            }
        }
        self.instance = fresh;
        Ok(())
    }

    /// A render-only clone of the bean instance, reflecting all values
    /// currently pushed to the design instance.
    pub fn clone_bean_instance(&self) -> BeanInstance {
        self.instance.clone()
    }

    pub fn is_in_model(&self) -> bool {
        self.in_model
    }

    pub(crate) fn set_in_model(&mut self, in_model: bool) {
        self.in_model = in_model;
    }

    /// The externally visible variable name. In model this is the name
    /// registered with the code-structure collaborator; detached components
    /// fall back to the locally stored name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().or(self.stored_name.as_deref())
    }

    /// The name as registered with the model, without the stored-name
    /// fallback. Detached copies have none until they are attached.
    pub(crate) fn registered_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn stored_name(&self) -> Option<&str> {
        self.stored_name.as_deref()
    }

    pub fn set_stored_name(&mut self, name: Option<String>) {
        self.stored_name = name;
    }

    /// Lazily creates the property collections, exactly once per bean class.
    pub fn ensure_props(&mut self, registry: &BeanRegistry) -> &mut PropertyCache {
        if self.props.is_none() {
            let desc = registry
                .load_class(&self.bean_class)
                .expect("component holds an instance of a registered class");
            self.props = Some(PropertyCache::build(desc, registry));
        }
        self.props.as_mut().expect("just created")
    }

    pub fn props(&self) -> Option<&PropertyCache> {
        self.props.as_ref()
    }

    pub fn props_mut(&mut self) -> Option<&mut PropertyCache> {
        self.props.as_mut()
    }

    /// All bean properties in partition order.
    pub fn all_bean_properties(&mut self, registry: &BeanRegistry) -> Vec<String> {
        let props = self.ensure_props(registry);
        let mut names = Vec::new();
        for set in props.sets() {
            if set.name == "action" {
                continue; // action names duplicate entries of other sets
            }
            names.extend(set.members.iter().cloned());
        }
        names
    }

    pub fn bean_properties(
        &mut self,
        registry: &BeanRegistry,
        names: &[&str],
    ) -> Vec<Option<FormProperty>> {
        let props = self.ensure_props(registry);
        names.iter().map(|n| props.get(n).cloned()).collect()
    }

    /// Sets a property value against this component's own bean instance.
    /// Property cache and instance are disjoint fields, so the engine can
    /// write through while holding the property mutably.
    pub fn set_property(
        &mut self,
        registry: &BeanRegistry,
        name: &str,
        input: crate::property::ValueInput,
        veto: Option<&dyn Fn(&crate::property::PropertyChange) -> bool>,
    ) -> Result<Option<crate::property::PropertyChange>, crate::property::PropertyError> {
        if self.props.is_none() {
            self.ensure_props(registry);
        }
        let instance = &mut self.instance;
        let props = self.props.as_mut().expect("ensured above");
        match props.get_mut(name) {
            Some(prop) => prop.set_value(Some(instance), input, veto),
            None => Err(crate::property::PropertyError::TargetWrite {
                name: name.to_string(),
                reason: format!("no such property on class '{}'", self.bean_class),
            }),
        }
    }

    pub fn get_property_value(
        &mut self,
        registry: &BeanRegistry,
        name: &str,
    ) -> Option<PropertyValue> {
        if self.props.is_none() {
            self.ensure_props(registry);
        }
        let instance = &self.instance;
        let props = self.props.as_mut().expect("ensured above");
        props.get_mut(name).and_then(|p| p.get_value(Some(instance)))
    }

    pub fn restore_property_default(
        &mut self,
        registry: &BeanRegistry,
        name: &str,
    ) -> Result<(), crate::property::PropertyError> {
        if self.props.is_none() {
            self.ensure_props(registry);
        }
        let instance = &mut self.instance;
        let props = self.props.as_mut().expect("ensured above");
        if let Some(prop) = props.get_mut(name) {
            prop.restore_default_value(Some(instance))?;
        }
        Ok(())
    }

    /// The default event: the descriptor hint, or the first action-set
    /// event when present, or the first known event.
    pub fn default_event(&self, registry: &BeanRegistry) -> Option<String> {
        let desc = registry.load_class(&self.bean_class).ok()?;
        if let Some(ev) = &desc.default_event {
            return Some(ev.clone());
        }
        if let Some(action) = desc.event_sets.iter().find(|s| s.name == "action")
            && let Some(first) = action.events.first()
        {
            return Some(first.name.clone());
        }
        desc.event_sets.first().and_then(|s| s.events.first()).map(|e| e.name.clone())
    }

    pub fn aux_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.aux_values.get(key)
    }

    /// Adds or removes (value = None) an auxiliary persisted pair.
    pub fn set_aux_value(&mut self, key: &str, value: Option<serde_json::Value>) {
        match value {
            Some(v) => {
                self.aux_values.insert(key.to_string(), v);
            }
            None => {
                self.aux_values.remove(key);
            }
        }
    }

    pub fn aux_values(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.aux_values
    }

    /// Ordered child ids for container kinds, empty otherwise.
    pub fn children(&self) -> &[ComponentId] {
        match &self.kind {
            ComponentKind::VisualContainer { children, .. } => children,
            ComponentKind::Menu { items, .. } => items,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<ComponentId>> {
        match &mut self.kind {
            ComponentKind::VisualContainer { children, .. } => Some(children),
            ComponentKind::Menu { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<&LayoutState> {
        match &self.kind {
            ComponentKind::VisualContainer { layout, .. } => Some(layout),
            _ => None,
        }
    }

    pub fn layout_mut(&mut self) -> Option<&mut LayoutState> {
        match &mut self.kind {
            ComponentKind::VisualContainer { layout, .. } => Some(layout),
            _ => None,
        }
    }

    pub fn menu_bar(&self) -> Option<ComponentId> {
        match &self.kind {
            ComponentKind::VisualContainer { menu_bar, .. } => *menu_bar,
            _ => None,
        }
    }

    pub fn constraints_map(&self) -> Option<&BTreeMap<String, LayoutConstraints>> {
        match &self.kind {
            ComponentKind::Visual { constraints } => Some(constraints),
            ComponentKind::VisualContainer { constraints, .. } => Some(constraints),
            _ => None,
        }
    }

    pub fn constraints_map_mut(&mut self) -> Option<&mut BTreeMap<String, LayoutConstraints>> {
        match &mut self.kind {
            ComponentKind::Visual { constraints } => Some(constraints),
            ComponentKind::VisualContainer { constraints, .. } => Some(constraints),
            _ => None,
        }
    }
}
