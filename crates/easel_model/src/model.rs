use crate::bean::{BeanError, BeanRegistry};
use crate::component::{LayoutConstraints, LayoutState, MetaComponent};
use crate::events::{default_handler_name, EventTable};
use crate::history::{FormChange, FormModelEvent, FormUndoableEdit};
use crate::id::ComponentId;
use crate::naming::{is_valid_identifier, NameError, NameService, VariablePool};
use crate::property::{PropertyChange, PropertyError, ValueInput};
use crate::resources::{MemoryResources, ResourceStore};
use crate::value::{DesignValue, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum persisted-format version required by the model's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormVersion {
    V1,
    V2,
}

/// Where a new component goes.
#[derive(Debug, Clone)]
pub enum Placement {
    /// The designated root component of the form.
    Top,
    Child {
        parent: ComponentId,
        index: Option<usize>,
        constraints: Option<LayoutConstraints>,
    },
    MenuBar { container: ComponentId },
    /// Free-standing, held by the "other components" bucket.
    Free,
}

/// Resolved placement as recorded in change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementRecord {
    Top,
    Child {
        parent: ComponentId,
        index: usize,
        constraints: Option<LayoutConstraints>,
    },
    MenuBar { container: ComponentId },
    Free { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown component")]
    UnknownComponent,
    #[error("component has no event '{0}'")]
    UnknownEvent(String),
    #[error("component has no property '{0}'")]
    UnknownProperty(String),
    #[error("component is not a container")]
    NotContainer,
    #[error("not a permutation of the child list")]
    BadPermutation,
    #[error("container already holds a menu bar")]
    MenuBarInUse,
    #[error(transparent)]
    Bean(#[from] BeanError),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// The live, editable meta-model of one form: a flat component arena plus
/// the change log, the event table, and the collaborator seams.
///
/// The whole model is confined to a single owner; `&mut` takes the place of
/// the per-component synchronization of the original design.
pub struct FormModel {
    name: String,
    registry: Arc<BeanRegistry>,
    components: HashMap<ComponentId, MetaComponent>,
    top: Option<ComponentId>,
    others: Vec<ComponentId>,
    events: EventTable,
    naming: Box<dyn NameService>,
    resources: Box<dyn ResourceStore>,
    veto: Option<Box<dyn Fn(&PropertyChange) -> bool>>,
    recording: bool,
    pending: Vec<FormModelEvent>,
    compound: Option<Vec<FormModelEvent>>,
    version: FormVersion,
}

impl FormModel {
    pub fn new(name: impl Into<String>, registry: Arc<BeanRegistry>) -> Self {
        Self::with_collaborators(
            name,
            registry,
            Box::new(VariablePool::new()),
            Box::new(MemoryResources::new()),
        )
    }

    pub fn with_collaborators(
        name: impl Into<String>,
        registry: Arc<BeanRegistry>,
        naming: Box<dyn NameService>,
        resources: Box<dyn ResourceStore>,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            components: HashMap::new(),
            top: None,
            others: Vec::new(),
            events: EventTable::new(),
            naming,
            resources,
            veto: None,
            recording: true,
            pending: Vec::new(),
            compound: None,
            version: FormVersion::V1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<BeanRegistry> {
        &self.registry
    }

    pub fn version(&self) -> FormVersion {
        self.version
    }

    pub fn raise_version(&mut self, version: FormVersion) {
        if version > self.version {
            self.version = version;
        }
    }

    pub fn set_veto_hook(&mut self, veto: Option<Box<dyn Fn(&PropertyChange) -> bool>>) {
        self.veto = veto;
    }

    // ---------------------------------------------------------------- access

    pub fn component(&self, id: ComponentId) -> Option<&MetaComponent> {
        self.components.get(&id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut MetaComponent> {
        self.components.get_mut(&id)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&MetaComponent> {
        self.components.values().find(|c| c.name() == Some(name))
    }

    pub fn top_component(&self) -> Option<ComponentId> {
        self.top
    }

    pub fn other_components(&self) -> &[ComponentId] {
        &self.others
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_in_model(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    pub fn resources(&self) -> &dyn ResourceStore {
        self.resources.as_ref()
    }

    pub fn find_free_handler_name(&self, base: &str) -> String {
        self.events.find_free_handler_name(base)
    }

    /// True if `comp` is `ancestor` itself or lies underneath it.
    pub fn is_ancestor_or_self(&self, ancestor: ComponentId, mut comp: ComponentId) -> bool {
        loop {
            if comp == ancestor {
                return true;
            }
            match self.components.get(&comp).and_then(|c| c.parent) {
                Some(parent) => comp = parent,
                None => return false,
            }
        }
    }

    // ------------------------------------------------------------- recording

    fn record(&mut self, event: FormModelEvent) {
        if !self.recording {
            return;
        }
        if let Some(compound) = &mut self.compound {
            compound.push(event.clone());
        }
        self.pending.push(event);
    }

    /// Drains the events accumulated since the last call, for broadcast to
    /// the replication side.
    pub fn drain_events(&mut self) -> Vec<FormModelEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Runs `f` with change recording off, restoring the previous state
    /// unconditionally. Undo and redo run inside this scope so they never
    /// generate new history.
    pub fn with_recording_disabled<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.recording;
        self.recording = false;
        let result = f(self);
        self.recording = prev;
        result
    }

    pub fn start_compound_edit(&mut self) {
        if self.compound.is_none() {
            self.compound = Some(Vec::new());
        }
    }

    pub fn commit_compound_edit(&mut self) -> Option<FormUndoableEdit> {
        let events = self.compound.take()?;
        if events.is_empty() {
            None
        } else {
            Some(FormUndoableEdit::new(events))
        }
    }

    /// Throws away the in-progress compound edit, preventing a corrupt undo
    /// entry after a partial failure.
    pub fn discard_compound_edit(&mut self) {
        self.compound = None;
    }

    // ------------------------------------------------------------- lifecycle

    pub fn fire_form_loaded(&mut self) {
        self.record(FormModelEvent::new(FormChange::FormLoaded));
    }

    pub fn fire_form_to_be_saved(&mut self) {
        self.record(FormModelEvent::new(FormChange::FormToBeSaved));
    }

    pub fn fire_form_to_be_closed(&mut self) {
        self.record(FormModelEvent::new(FormChange::FormToBeClosed));
    }

    pub fn fire_other_change(&mut self) {
        self.record(FormModelEvent::new(FormChange::OtherChange));
    }

    // ------------------------------------------------- creation / structure

    /// Creates a detached component with a default-instantiated bean and
    /// eagerly computed property collections, so instantiation and
    /// introspection failures surface here and never leave a half
    /// initialized component behind.
    pub fn create_component(&mut self, bean_class: &str) -> Result<MetaComponent, BeanError> {
        let registry = Arc::clone(&self.registry);
        let desc = registry.load_class(bean_class)?;
        let instance = registry.create_instance(bean_class)?;
        let mut comp = MetaComponent::new(desc, instance);
        comp.ensure_props(&registry);
        Ok(comp)
    }

    /// Attaches a detached subtree (root first, depth-first) to the model.
    /// Components receive generated variable names, become "in model", and
    /// one `ComponentAdded` change is recorded for the whole subtree.
    pub fn add_component(
        &mut self,
        subtree: Vec<MetaComponent>,
        placement: Placement,
    ) -> Result<ComponentId, ModelError> {
        if subtree.is_empty() {
            return Err(ModelError::UnknownComponent);
        }
        let root = subtree[0].id();
        let record = match placement {
            Placement::Top => PlacementRecord::Top,
            Placement::Child { parent, index, constraints } => {
                let len = self
                    .components
                    .get(&parent)
                    .ok_or(ModelError::UnknownComponent)?
                    .children()
                    .len();
                if self.components.get(&parent).map(|c| !c.kind.is_container()).unwrap_or(true) {
                    return Err(ModelError::NotContainer);
                }
                PlacementRecord::Child {
                    parent,
                    index: index.unwrap_or(len).min(len),
                    constraints,
                }
            }
            Placement::MenuBar { container } => {
                let holder = self
                    .components
                    .get(&container)
                    .ok_or(ModelError::UnknownComponent)?;
                if !holder.kind.is_container() {
                    return Err(ModelError::NotContainer);
                }
                if holder.menu_bar().is_some() {
                    return Err(ModelError::MenuBarInUse);
                }
                PlacementRecord::MenuBar { container }
            }
            Placement::Free => PlacementRecord::Free { index: self.others.len() },
        };

        let ids: Vec<ComponentId> = subtree.iter().map(|c| c.id()).collect();
        self.insert_subtree(subtree, record.clone());

        let snapshot: Vec<MetaComponent> = ids
            .iter()
            .filter_map(|id| self.components.get(id).cloned())
            .collect();
        self.record(FormModelEvent::new(FormChange::ComponentAdded {
            placement: record,
            snapshot,
        }));
        Ok(root)
    }

    /// Detaches a component and its whole subtree. Event-handler
    /// detachments performed on the way are returned to the removal event
    /// as follow-ups, so the pair undoes as one unit.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<(), ModelError> {
        if !self.components.contains_key(&id) {
            return Err(ModelError::UnknownComponent);
        }
        let ids = self.collect_subtree_ids(id);
        let mut followups = Vec::new();
        for cid in &ids {
            for (event, handler) in self.events.detach_component(*cid) {
                followups.push(FormModelEvent::new(FormChange::EventHandlerRemoved {
                    component: *cid,
                    event,
                    handler,
                }));
            }
        }
        let (placement, subtree) = self
            .extract_subtree(id)
            .ok_or(ModelError::UnknownComponent)?;
        self.record(FormModelEvent::with_followups(
            FormChange::ComponentRemoved { placement, subtree },
            followups,
        ));
        Ok(())
    }

    /// Depth-first id list of a subtree, including an attached menu bar.
    pub fn collect_subtree_ids(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cid) = stack.pop() {
            out.push(cid);
            if let Some(comp) = self.components.get(&cid) {
                let mut kids: Vec<ComponentId> = comp.children().to_vec();
                if let Some(menu) = comp.menu_bar() {
                    kids.push(menu);
                }
                // preserve order under a LIFO stack
                for kid in kids.into_iter().rev() {
                    stack.push(kid);
                }
            }
        }
        out
    }

    /// Materializes a detached subtree in the arena and links its root.
    /// Components carrying a name have it re-reserved; unnamed ones get a
    /// fresh generated name. Handlers on the components are re-registered.
    pub fn insert_subtree(&mut self, subtree: Vec<MetaComponent>, placement: PlacementRecord) {
        let registry = Arc::clone(&self.registry);
        let root = subtree.first().map(|c| c.id());
        for mut comp in subtree {
            // only a registered name survives re-insertion as-is; a
            // stored name is a hint for the generator, never an exact claim
            match comp.registered_name().map(str::to_string) {
                Some(name) => {
                    self.naming.reserve(&name);
                    comp.set_name(Some(name));
                }
                None => {
                    let prefix = registry
                        .load_class(comp.bean_class())
                        .map(|d| d.name_prefix.clone())
                        .unwrap_or_else(|_| "comp".to_string());
                    let hint = comp.stored_name().map(str::to_string);
                    let name = self.naming.create_name(&prefix, hint.as_deref(), true);
                    comp.set_name(Some(name));
                }
            }
            comp.set_in_model(true);
            for (event, names) in comp.event_handlers.clone() {
                for handler in names {
                    self.events.attach(&handler, comp.id(), &event);
                }
            }
            self.components.insert(comp.id(), comp);
        }
        let Some(root) = root else { return };
        match placement {
            PlacementRecord::Top => {
                self.top = Some(root);
                if let Some(c) = self.components.get_mut(&root) {
                    c.parent = None;
                }
            }
            PlacementRecord::Child { parent, index, constraints } => {
                if let Some(p) = self.components.get_mut(&parent) {
                    if let Some(children) = p.children_mut() {
                        let at = index.min(children.len());
                        children.insert(at, root);
                        if let Some(layout) = p.layout_mut() {
                            match layout {
                                LayoutState::Delegate(d) => {
                                    while d.constraints.len() < at {
                                        d.constraints.push(None);
                                    }
                                    d.constraints.insert(at, constraints.clone());
                                }
                                LayoutState::Constraints(g) => {
                                    if let Some(c) = constraints.clone() {
                                        g.by_child.insert(root, c);
                                    }
                                }
                            }
                        }
                    }
                }
                if let Some(c) = self.components.get_mut(&root) {
                    c.parent = Some(parent);
                    if let Some(constraints) = constraints {
                        if let Some(layout_class) = self
                            .components
                            .get(&parent)
                            .and_then(|p| p.layout())
                            .map(|l| l.class_name().to_string())
                            && let Some(map) = self
                                .components
                                .get_mut(&root)
                                .and_then(|c| c.constraints_map_mut())
                        {
                            map.insert(layout_class, constraints);
                        }
                    }
                }
            }
            PlacementRecord::MenuBar { container } => {
                if let Some(p) = self.components.get_mut(&container)
                    && let crate::component::ComponentKind::VisualContainer { menu_bar, .. } =
                        &mut p.kind
                {
                    *menu_bar = Some(root);
                }
                if let Some(c) = self.components.get_mut(&root) {
                    c.parent = Some(container);
                }
            }
            PlacementRecord::Free { index } => {
                let at = index.min(self.others.len());
                self.others.insert(at, root);
                if let Some(c) = self.components.get_mut(&root) {
                    c.parent = None;
                }
            }
        }
    }

    /// Unlinks a subtree from the model, releasing names and returning the
    /// detached components (root first, depth-first) with the placement the
    /// root occupied.
    pub fn extract_subtree(
        &mut self,
        id: ComponentId,
    ) -> Option<(PlacementRecord, Vec<MetaComponent>)> {
        let parent = self.components.get(&id)?.parent;
        let placement = if self.top == Some(id) {
            self.top = None;
            PlacementRecord::Top
        } else if let Some(pid) = parent {
            let is_menu_bar = self.components.get(&pid)?.menu_bar() == Some(id);
            if is_menu_bar {
                if let Some(p) = self.components.get_mut(&pid)
                    && let crate::component::ComponentKind::VisualContainer { menu_bar, .. } =
                        &mut p.kind
                {
                    *menu_bar = None;
                }
                PlacementRecord::MenuBar { container: pid }
            } else {
                let p = self.components.get_mut(&pid)?;
                let index = p.children().iter().position(|c| *c == id)?;
                let mut constraints = None;
                if let Some(children) = p.children_mut() {
                    children.remove(index);
                }
                if let Some(layout) = p.layout_mut() {
                    match layout {
                        LayoutState::Delegate(d) => {
                            if index < d.constraints.len() {
                                constraints = d.constraints.remove(index);
                            }
                        }
                        LayoutState::Constraints(g) => {
                            constraints = g.by_child.remove(&id);
                        }
                    }
                }
                PlacementRecord::Child { parent: pid, index, constraints }
            }
        } else {
            let index = self.others.iter().position(|c| *c == id).unwrap_or(0);
            if index < self.others.len() {
                self.others.remove(index);
            }
            PlacementRecord::Free { index }
        };

        let ids = {
            // ids must be collected while components are still in the arena
            let mut out = Vec::new();
            let mut stack = vec![id];
            while let Some(cid) = stack.pop() {
                out.push(cid);
                if let Some(comp) = self.components.get(&cid) {
                    let mut kids: Vec<ComponentId> = comp.children().to_vec();
                    if let Some(menu) = comp.menu_bar() {
                        kids.push(menu);
                    }
                    for kid in kids.into_iter().rev() {
                        stack.push(kid);
                    }
                }
            }
            out
        };
        let mut subtree = Vec::with_capacity(ids.len());
        for cid in ids {
            if let Some(mut comp) = self.components.remove(&cid) {
                if let Some(name) = comp.registered_name().map(str::to_string) {
                    self.naming.release(&name);
                }
                comp.set_in_model(false);
                subtree.push(comp);
            }
        }
        Some((placement, subtree))
    }

    /// Applies a permutation to a container's child list: the child at
    /// position `i` moves to `perm[i]`.
    pub fn reorder_components(
        &mut self,
        container: ComponentId,
        perm: Vec<usize>,
    ) -> Result<(), ModelError> {
        self.apply_permutation(container, &perm)?;
        self.record(FormModelEvent::new(FormChange::ComponentsReordered {
            container,
            perm,
        }));
        Ok(())
    }

    pub(crate) fn apply_permutation(
        &mut self,
        container: ComponentId,
        perm: &[usize],
    ) -> Result<(), ModelError> {
        let comp = self
            .components
            .get_mut(&container)
            .ok_or(ModelError::UnknownComponent)?;
        let Some(children) = comp.children_mut() else {
            return Err(ModelError::NotContainer);
        };
        if perm.len() != children.len() {
            return Err(ModelError::BadPermutation);
        }
        let mut seen = vec![false; perm.len()];
        for &to in perm {
            if to >= perm.len() || std::mem::replace(&mut seen[to], true) {
                return Err(ModelError::BadPermutation);
            }
        }
        let old = children.clone();
        for (i, &to) in perm.iter().enumerate() {
            children[to] = old[i];
        }
        if let Some(LayoutState::Delegate(d)) = comp.layout_mut()
            && d.constraints.len() == perm.len()
        {
            let old_constraints = d.constraints.clone();
            for (i, &to) in perm.iter().enumerate() {
                d.constraints[to] = old_constraints[i].clone();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ properties

    /// Sets a bean property through the property engine, recording the
    /// change and reconciling resources and format version.
    pub fn set_property_value(
        &mut self,
        id: ComponentId,
        property: &str,
        input: ValueInput,
    ) -> Result<(), PropertyError> {
        self.set_property_internal(id, property, input, true)
    }

    pub(crate) fn set_property_internal(
        &mut self,
        id: ComponentId,
        property: &str,
        input: ValueInput,
        use_veto: bool,
    ) -> Result<(), PropertyError> {
        let registry = Arc::clone(&self.registry);
        let veto = if use_veto { self.veto.as_deref() } else { None };
        let comp = self
            .components
            .get_mut(&id)
            .ok_or_else(|| PropertyError::TargetWrite {
                name: property.to_string(),
                reason: "no such component".to_string(),
            })?;
        let change = comp.set_property(&registry, property, input, veto)?;
        if let Some(change) = change {
            if let Some(design) = change.new_value.as_design()
                && design.raises_format_version()
            {
                self.version = FormVersion::V2;
            }
            let old_design = change.old_value.as_ref().and_then(|v| v.as_design());
            let new_design = change.new_value.as_design();
            self.resources.update(old_design, new_design);
            self.record(FormModelEvent::new(FormChange::ComponentPropertyChanged {
                component: id,
                property: property.to_string(),
                old: change.old_value,
                new: Some(change.new_value),
            }));
        }
        Ok(())
    }

    /// Restores a property to its default; recorded with `new: None`.
    pub fn restore_property_default(
        &mut self,
        id: ComponentId,
        property: &str,
    ) -> Result<(), PropertyError> {
        let registry = Arc::clone(&self.registry);
        let comp = self
            .components
            .get_mut(&id)
            .ok_or_else(|| PropertyError::TargetWrite {
                name: property.to_string(),
                reason: "no such component".to_string(),
            })?;
        let old = comp
            .props()
            .and_then(|p| p.get(property))
            .and_then(|p| p.cached_value().cloned());
        comp.restore_property_default(&registry, property)?;
        if old.is_some() {
            self.record(FormModelEvent::new(FormChange::ComponentPropertyChanged {
                component: id,
                property: property.to_string(),
                old,
                new: None,
            }));
        }
        Ok(())
    }

    /// Sets a binding property (always detached from the target).
    pub fn set_binding_value(
        &mut self,
        id: ComponentId,
        property: &str,
        value: Option<PropertyValue>,
    ) -> Result<(), ModelError> {
        let registry = Arc::clone(&self.registry);
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(ModelError::UnknownComponent)?;
        comp.ensure_props(&registry);
        let props = comp.props_mut().ok_or(ModelError::UnknownComponent)?;
        let prop = props
            .binding_mut(property)
            .ok_or_else(|| ModelError::UnknownProperty(property.to_string()))?;
        let old = prop.cached_value().cloned();
        match &value {
            Some(v) => {
                prop.set_value(None, ValueInput::Plain(v.clone()), None)
                    .map_err(ModelError::Property)?;
            }
            None => {
                prop.restore_default_value(None).map_err(ModelError::Property)?;
            }
        }
        self.record(FormModelEvent::new(FormChange::BindingPropertyChanged {
            component: id,
            property: property.to_string(),
            old,
            new: value,
        }));
        Ok(())
    }

    /// Adds or removes (None) an auxiliary key/value pair.
    pub fn set_aux_value(
        &mut self,
        id: ComponentId,
        key: &str,
        value: Option<serde_json::Value>,
    ) -> Result<(), ModelError> {
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(ModelError::UnknownComponent)?;
        let old = comp.aux_value(key).cloned();
        if old == value {
            return Ok(());
        }
        comp.set_aux_value(key, value.clone());
        self.record(FormModelEvent::new(FormChange::SyntheticPropertyChanged {
            component: Some(id),
            property: format!("auxValue.{}", key),
            old,
            new: value,
        }));
        Ok(())
    }

    // ---------------------------------------------------------------- layout

    /// Exchanges a container's layout wholesale.
    pub fn set_container_layout(
        &mut self,
        container: ComponentId,
        mut layout: LayoutState,
    ) -> Result<(), ModelError> {
        let comp = self
            .components
            .get_mut(&container)
            .ok_or(ModelError::UnknownComponent)?;
        let child_count = comp.children().len();
        if let LayoutState::Delegate(d) = &mut layout {
            d.constraints.resize(child_count, None);
        }
        let Some(slot) = comp.layout_mut() else {
            return Err(ModelError::NotContainer);
        };
        let old = std::mem::replace(slot, layout.clone());
        self.record(FormModelEvent::new(FormChange::ContainerLayoutExchanged {
            container,
            old,
            new: layout,
        }));
        Ok(())
    }

    /// Sets (or clears) one child's constraints for a given layout class,
    /// updating the container's current layout when it matches.
    pub fn set_layout_constraints(
        &mut self,
        id: ComponentId,
        layout_class: &str,
        constraints: Option<LayoutConstraints>,
    ) -> Result<(), ModelError> {
        let parent = self
            .components
            .get(&id)
            .ok_or(ModelError::UnknownComponent)?
            .parent;
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(ModelError::UnknownComponent)?;
        let Some(map) = comp.constraints_map_mut() else {
            return Err(ModelError::NotContainer);
        };
        let old = map.get(layout_class).cloned();
        match &constraints {
            Some(c) => {
                map.insert(layout_class.to_string(), c.clone());
            }
            None => {
                map.remove(layout_class);
            }
        }
        if let Some(pid) = parent
            && let Some(p) = self.components.get_mut(&pid)
        {
            let index = p.children().iter().position(|c| *c == id);
            if let Some(layout) = p.layout_mut()
                && layout.class_name() == layout_class
            {
                match layout {
                    LayoutState::Delegate(d) => {
                        if let Some(i) = index {
                            while d.constraints.len() <= i {
                                d.constraints.push(None);
                            }
                            d.constraints[i] = constraints.clone();
                        }
                    }
                    LayoutState::Constraints(g) => match &constraints {
                        Some(c) => {
                            g.by_child.insert(id, c.clone());
                        }
                        None => {
                            g.by_child.remove(&id);
                        }
                    },
                }
            }
        }
        self.record(FormModelEvent::new(FormChange::ComponentLayoutChanged {
            component: id,
            layout_class: layout_class.to_string(),
            old,
            new: constraints,
        }));
        Ok(())
    }

    /// Marks a container's arrangement as changed without structural data.
    pub fn fire_container_layout_changed(&mut self, container: ComponentId) {
        self.record(FormModelEvent::new(FormChange::ContainerLayoutChanged {
            container,
        }));
    }

    // ---------------------------------------------------------------- naming

    /// Renames a component: validates the identifier, refuses reserved
    /// names, rewrites derived resource keys, renames default handlers
    /// containing the old name (collision-avoided), and records the change.
    pub fn rename_component(
        &mut self,
        id: ComponentId,
        new_name: &str,
    ) -> Result<(), ModelError> {
        if !is_valid_identifier(new_name) {
            return Err(NameError::InvalidName(new_name.to_string()).into());
        }
        let old_name = self
            .components
            .get(&id)
            .and_then(|c| c.name().map(str::to_string))
            .ok_or(ModelError::UnknownComponent)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.naming.is_reserved(new_name) {
            return Err(NameError::NameInUse(new_name.to_string()).into());
        }
        self.rename_core(id, &old_name, new_name)?;

        // Auto-generated handler names follow the component name.
        let mut followups = Vec::new();
        let handlers = self
            .components
            .get(&id)
            .map(|c| c.event_handlers.clone())
            .unwrap_or_default();
        for names in handlers.into_values() {
            for handler in names {
                let Some(at) = handler.find(&old_name) else {
                    continue;
                };
                let candidate = format!(
                    "{}{}{}",
                    &handler[..at],
                    new_name,
                    &handler[at + old_name.len()..]
                );
                let free = self.events.find_free_handler_name(&candidate);
                self.rename_handler_everywhere(&handler, &free);
                followups.push(FormModelEvent::new(FormChange::EventHandlerRenamed {
                    old: handler.clone(),
                    new: free,
                }));
            }
        }
        self.record(FormModelEvent::with_followups(
            FormChange::SyntheticPropertyChanged {
                component: Some(id),
                property: "variableName".to_string(),
                old: Some(serde_json::Value::String(old_name)),
                new: Some(serde_json::Value::String(new_name.to_string())),
            },
            followups,
        ));
        Ok(())
    }

    /// The name swap itself: naming service, the component record, and the
    /// resource keys derived from the old name.
    pub(crate) fn rename_core(
        &mut self,
        id: ComponentId,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ModelError> {
        self.naming.rename(old_name, new_name)?;
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(ModelError::UnknownComponent)?;
        comp.set_name(Some(new_name.to_string()));

        // Rewrite resource/i18n keys containing the old name as a segment.
        let mut rewrites: Vec<(String, DesignValue, String)> = Vec::new();
        if let Some(props) = comp.props() {
            for (prop_name, prop) in props.iter() {
                if let Some(PropertyValue::Design(design)) = prop.cached_value()
                    && let Some(key) = design.key()
                {
                    let segments: Vec<&str> = key.split('.').collect();
                    if segments.contains(&old_name) {
                        let new_key: String = segments
                            .iter()
                            .map(|s| if *s == old_name { new_name } else { s })
                            .collect::<Vec<_>>()
                            .join(".");
                        rewrites.push((prop_name.clone(), design.as_ref().clone(), new_key));
                    }
                }
            }
        }
        for (prop_name, old_design, new_key) in rewrites {
            let updated = self.resources.change_key(&old_design, &new_key);
            if let Some(props) = self
                .components
                .get_mut(&id)
                .and_then(|c| c.props_mut())
                && let Some(prop) = props.get_mut(&prop_name)
            {
                prop.replace_cached(PropertyValue::design(updated));
            }
        }
        Ok(())
    }

    pub(crate) fn rename_handler_everywhere(&mut self, old: &str, new: &str) {
        let attachments: Vec<(ComponentId, String)> = self.events.attachments(old).to_vec();
        self.events.rename_handler(old, new);
        for (cid, event) in attachments {
            if let Some(comp) = self.components.get_mut(&cid)
                && let Some(names) = comp.event_handlers.get_mut(&event)
            {
                for name in names.iter_mut() {
                    if name == old {
                        *name = new.to_string();
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------- events

    /// Attaches an event handler; a missing name gets the default
    /// `{component}_{event}` form.
    pub fn add_event_handler(
        &mut self,
        id: ComponentId,
        event: &str,
        handler: Option<String>,
    ) -> Result<String, ModelError> {
        let registry = Arc::clone(&self.registry);
        let comp = self
            .components
            .get(&id)
            .ok_or(ModelError::UnknownComponent)?;
        let desc = registry.load_class(comp.bean_class())?;
        if desc.event(event).is_none() {
            return Err(ModelError::UnknownEvent(event.to_string()));
        }
        let comp_name = comp.name().unwrap_or("component").to_string();
        let handler = handler.unwrap_or_else(|| default_handler_name(&comp_name, event));
        self.events.attach(&handler, id, event);
        if let Some(comp) = self.components.get_mut(&id) {
            let names = comp.event_handlers.entry(event.to_string()).or_default();
            if !names.contains(&handler) {
                names.push(handler.clone());
            }
        }
        self.record(FormModelEvent::new(FormChange::EventHandlerAdded {
            component: id,
            event: event.to_string(),
            handler: handler.clone(),
        }));
        Ok(handler)
    }

    pub fn remove_event_handler(
        &mut self,
        id: ComponentId,
        event: &str,
        handler: &str,
    ) -> Result<(), ModelError> {
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(ModelError::UnknownComponent)?;
        let Some(names) = comp.event_handlers.get_mut(event) else {
            return Ok(());
        };
        if !names.iter().any(|n| n == handler) {
            return Ok(());
        }
        names.retain(|n| n != handler);
        if names.is_empty() {
            comp.event_handlers.remove(event);
        }
        self.events.detach(handler, id, event);
        self.record(FormModelEvent::new(FormChange::EventHandlerRemoved {
            component: id,
            event: event.to_string(),
            handler: handler.to_string(),
        }));
        Ok(())
    }

    pub fn rename_event_handler(&mut self, old: &str, new: &str) -> Result<(), ModelError> {
        if !is_valid_identifier(new) {
            return Err(NameError::InvalidName(new.to_string()).into());
        }
        if self.events.is_handler(new) {
            return Err(NameError::NameInUse(new.to_string()).into());
        }
        if !self.events.is_handler(old) {
            return Ok(());
        }
        self.rename_handler_everywhere(old, new);
        self.record(FormModelEvent::new(FormChange::EventHandlerRenamed {
            old: old.to_string(),
            new: new.to_string(),
        }));
        Ok(())
    }

    // ------------------------------------------------------------- internals

    pub(crate) fn attach_handler_silent(&mut self, id: ComponentId, event: &str, handler: &str) {
        self.events.attach(handler, id, event);
        if let Some(comp) = self.components.get_mut(&id) {
            let names = comp.event_handlers.entry(event.to_string()).or_default();
            if !names.contains(&handler.to_string()) {
                names.push(handler.to_string());
            }
        }
    }

    pub(crate) fn detach_handler_silent(&mut self, id: ComponentId, event: &str, handler: &str) {
        self.events.detach(handler, id, event);
        if let Some(comp) = self.components.get_mut(&id) {
            if let Some(names) = comp.event_handlers.get_mut(event) {
                names.retain(|n| n != handler);
                if names.is_empty() {
                    comp.event_handlers.remove(event);
                }
            }
        }
    }

    pub(crate) fn set_aux_silent(
        &mut self,
        id: ComponentId,
        key: &str,
        value: Option<serde_json::Value>,
    ) {
        if let Some(comp) = self.components.get_mut(&id) {
            comp.set_aux_value(key, value);
        }
    }

    pub(crate) fn exchange_layout_silent(
        &mut self,
        container: ComponentId,
        layout: LayoutState,
    ) -> Option<LayoutState> {
        let comp = self.components.get_mut(&container)?;
        let slot = comp.layout_mut()?;
        Some(std::mem::replace(slot, layout))
    }
}
