use crate::layout::{LayoutError, LayoutFactory, LayoutItem};
use easel_model::{
    BeanDescriptor, BeanInstance, BeanRole, ComponentId, DesignValue, FormChange, FormModel,
    FormModelEvent, PropertyValue,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(Uuid);

impl ReplicaId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One render-only instantiation of a meta-component's class.
#[derive(Debug)]
pub struct Replica {
    id: ReplicaId,
    meta: ComponentId,
    class_name: String,
    instance: BeanInstance,
    parent: Option<ReplicaId>,
    children: Vec<ReplicaId>,
}

impl Replica {
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn meta(&self) -> ComponentId {
        self.meta
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn instance(&self) -> &BeanInstance {
        &self.instance
    }

    pub fn children(&self) -> &[ReplicaId] {
        &self.children
    }
}

/// Substitutes a renderable class for one that cannot be instantiated
/// inside the design surface as-is.
pub trait CloneConverter {
    fn substitute(&self, desc: &BeanDescriptor) -> Option<String>;
}

/// Window classes render as a plain root container so their content can
/// still be edited in place.
#[derive(Debug, Default)]
pub struct WindowConverter;

impl CloneConverter for WindowConverter {
    fn substitute(&self, desc: &BeanDescriptor) -> Option<String> {
        match &desc.role {
            BeanRole::Visual(facts) if facts.window => Some("RootPanel".to_string()),
            _ => None,
        }
    }
}

/// Strips mnemonic markers: `"&Save"` renders as `"Save"` with mnemonic
/// `S`; `"&&"` is a literal ampersand.
pub fn split_mnemonic(text: &str) -> (String, Option<char>) {
    let mut out = String::with_capacity(text.len());
    let mut mnemonic = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '&' {
            match chars.next() {
                Some('&') => out.push('&'),
                Some(next) => {
                    if mnemonic.is_none() {
                        mnemonic = Some(next);
                    }
                    out.push(next);
                }
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    (out, mnemonic)
}

/// Maintains a second, render-only object tree mirroring the meta-model
/// from a designated root: every in-model component reachable from the
/// root has exactly one replica, and the id maps reflect it. All update
/// paths degrade to a stale rendering instead of propagating failures.
pub struct VisualReplicator {
    root: Option<ComponentId>,
    replicas: HashMap<ReplicaId, Replica>,
    by_meta: HashMap<ComponentId, ReplicaId>,
    /// Live data-binding relations: (source component, property) -> target.
    bindings: HashMap<(ComponentId, String), ComponentId>,
    converters: Vec<Box<dyn CloneConverter>>,
    layouts: LayoutFactory,
}

impl VisualReplicator {
    pub fn new(layouts: LayoutFactory) -> Self {
        Self {
            root: None,
            replicas: HashMap::new(),
            by_meta: HashMap::new(),
            bindings: HashMap::new(),
            converters: vec![Box::new(WindowConverter)],
            layouts,
        }
    }

    pub fn add_converter(&mut self, converter: Box<dyn CloneConverter>) {
        self.converters.push(converter);
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.root
    }

    pub fn replica(&self, id: ReplicaId) -> Option<&Replica> {
        self.replicas.get(&id)
    }

    pub fn replica_for(&self, meta: ComponentId) -> Option<&Replica> {
        self.by_meta.get(&meta).and_then(|rid| self.replicas.get(rid))
    }

    pub fn meta_for(&self, id: ReplicaId) -> Option<ComponentId> {
        self.replicas.get(&id).map(|r| r.meta)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn binding_target(&self, source: ComponentId, property: &str) -> Option<ComponentId> {
        self.bindings.get(&(source, property.to_string())).copied()
    }

    // --------------------------------------------------------------- build

    /// Full build from `root`, replacing any previous replica tree.
    pub fn create_clone(&mut self, model: &FormModel, root: ComponentId) -> Option<ReplicaId> {
        self.replicas.clear();
        self.by_meta.clear();
        self.bindings.clear();
        self.root = Some(root);
        let rid = self.clone_tree(model, root, None)?;
        for id in model.collect_subtree_ids(root) {
            if model.component(id).and_then(|c| c.layout()).is_some()
                && let Err(err) = self.arrange_container(model, id)
            {
                tracing::warn!(%err, "container arrangement failed during full build");
            }
            self.apply_layer_order(model, id);
        }
        self.establish_bindings(model, root);
        Some(rid)
    }

    fn clone_tree(
        &mut self,
        model: &FormModel,
        id: ComponentId,
        parent: Option<ReplicaId>,
    ) -> Option<ReplicaId> {
        if let Some(rid) = self.by_meta.get(&id) {
            return Some(*rid);
        }
        let comp = model.component(id)?;
        let desc = match model.registry().load_class(comp.bean_class()) {
            Ok(desc) => desc,
            Err(err) => {
                tracing::warn!(class = comp.bean_class(), %err, "clone skipped");
                return None;
            }
        };
        let substitute = self.converters.iter().find_map(|c| c.substitute(desc));
        let mut instance = match &substitute {
            Some(class) => match model.registry().create_instance(class) {
                Ok(instance) => instance,
                Err(err) => {
                    tracing::warn!(class = %class, %err, "substitute instantiation failed");
                    return None;
                }
            },
            None => comp.clone_bean_instance(),
        };
        if substitute.is_some()
            && let Some(props) = comp.props()
        {
            // Carry set values the substitute class also declares.
            for (name, prop) in props.iter() {
                if desc.property(name).map(|d| d.suppressed_in_replica).unwrap_or(false) {
                    continue;
                }
                let Some(value) = prop.peek_unwrapped() else { continue };
                if instance.declares(name)
                    && let Err(err) = instance.set(name, value)
                {
                    tracing::debug!(property = %name, %err, "value not carried to substitute");
                }
            }
        }
        for pd in &desc.properties {
            // Suppressed properties never render, even if the design
            // instance carries a value.
            if pd.suppressed_in_replica {
                if let Some(default) = pd.default.clone() {
                    let _ = instance.set(&pd.name, default);
                }
                continue;
            }
            if pd.mnemonic_text
                && let Some(PropertyValue::String(text)) = instance.get(&pd.name).cloned()
            {
                let (stripped, mnemonic) = split_mnemonic(&text);
                let _ = instance.set(&pd.name, PropertyValue::String(stripped));
                if let Some(m) = mnemonic
                    && instance.declares("Mnemonic")
                {
                    let _ = instance.set("Mnemonic", PropertyValue::String(m.to_string()));
                }
            }
        }

        let rid = ReplicaId::new();
        let class_name = substitute.unwrap_or_else(|| comp.bean_class().to_string());
        let mut child_metas: Vec<ComponentId> = comp.children().to_vec();
        if let Some(menu) = comp.menu_bar() {
            child_metas.push(menu);
        }
        self.replicas.insert(
            rid,
            Replica { id: rid, meta: id, class_name, instance, parent, children: Vec::new() },
        );
        self.by_meta.insert(id, rid);
        let mut children = Vec::new();
        for child in child_metas {
            if let Some(child_rid) = self.clone_tree(model, child, Some(rid)) {
                children.push(child_rid);
            }
        }
        if let Some(replica) = self.replicas.get_mut(&rid) {
            replica.children = children;
        }
        Some(rid)
    }

    // ------------------------------------------------------------- updates

    /// Clones just the added subtree and inserts it at the meta-model's
    /// child position.
    pub fn add_component(&mut self, model: &FormModel, id: ComponentId) {
        let Some(comp) = model.component(id) else { return };
        let Some(parent_meta) = comp.parent else { return };
        let Some(&parent_rid) = self.by_meta.get(&parent_meta) else { return };
        let index = model
            .component(parent_meta)
            .map(|p| p.children().iter().position(|c| *c == id))
            .unwrap_or(None);
        let Some(rid) = self.clone_tree(model, id, Some(parent_rid)) else { return };
        if let Some(parent) = self.replicas.get_mut(&parent_rid) {
            match index {
                Some(at) => parent.children.insert(at.min(parent.children.len()), rid),
                None => parent.children.push(rid),
            }
        }
        if let Err(err) = self.arrange_container(model, parent_meta) {
            tracing::warn!(%err, "arrangement after add failed");
        }
        self.apply_layer_order(model, parent_meta);
        self.establish_bindings(model, id);
    }

    /// Removes the replica subtree. The container's layout collaborator is
    /// asked to take the one child out; if it cannot, the container's
    /// children are cleared and re-cloned from the meta-model.
    pub fn remove_component(&mut self, model: &FormModel, id: ComponentId) {
        let Some(&rid) = self.by_meta.get(&id) else { return };
        let parent_rid = self.replicas.get(&rid).and_then(|r| r.parent);
        let parent_meta = parent_rid
            .and_then(|prid| self.replicas.get(&prid))
            .map(|r| r.meta);

        let mut needs_rebuild = false;
        if let Some(parent_meta) = parent_meta {
            let layout_class = model
                .component(parent_meta)
                .and_then(|c| c.layout())
                .map(|l| l.class_name().to_string());
            if let Some(class) = layout_class
                && let Some(layout) = self.layouts.get(&class)
                && let Some(child) = self.replicas.get_mut(&rid)
            {
                needs_rebuild = !layout.remove_component(&mut child.instance);
            }
        }
        self.drop_subtree(id);
        if let Some(parent_meta) = parent_meta {
            if needs_rebuild {
                self.rebuild_container(model, parent_meta);
            } else if let Err(err) = self.arrange_container(model, parent_meta) {
                tracing::warn!(%err, "arrangement after removal failed");
            }
        }
    }

    /// Pushes one meta-property change onto the replica instance. Documented
    /// special cases: peer-bound classes get their replica destroyed and
    /// recreated, suppressed properties are skipped, and mnemonic-marked
    /// text is routed through the marker-splitting helper.
    pub fn update_component_property(&mut self, model: &FormModel, id: ComponentId, property: &str) {
        let Some(comp) = model.component(id) else { return };
        let Ok(desc) = model.registry().load_class(comp.bean_class()) else { return };

        if desc.recreate_on_peer_change {
            self.recreate_replica(model, id);
            return;
        }
        let prop_desc = desc.property(property);
        if prop_desc.map(|d| d.suppressed_in_replica).unwrap_or(false) {
            return;
        }
        if comp.props().and_then(|p| p.binding(property)).is_some() {
            self.update_binding(model, id, property);
        }
        let value = comp
            .props()
            .and_then(|p| p.get(property))
            .and_then(|p| p.peek_unwrapped())
            .or_else(|| comp.instance().get(property).cloned());
        let Some(value) = value else { return };

        let Some(replica) = self
            .by_meta
            .get(&id)
            .and_then(|rid| self.replicas.get_mut(rid))
        else {
            return;
        };
        if prop_desc.map(|d| d.mnemonic_text).unwrap_or(false)
            && let PropertyValue::String(text) = &value
        {
            let (stripped, mnemonic) = split_mnemonic(text);
            if let Err(err) = replica.instance.set(property, PropertyValue::String(stripped)) {
                tracing::warn!(property, %err, "replica update failed");
            }
            if let Some(m) = mnemonic
                && replica.instance.declares("Mnemonic")
            {
                let _ = replica.instance.set("Mnemonic", PropertyValue::String(m.to_string()));
            }
            return;
        }
        if let Err(err) = replica.instance.set(property, value) {
            tracing::warn!(property, %err, "replica update failed");
        }
    }

    /// Destroys and rebuilds one replica in place, keeping its slot in the
    /// parent's child list.
    fn recreate_replica(&mut self, model: &FormModel, id: ComponentId) {
        let Some(&rid) = self.by_meta.get(&id) else { return };
        let parent_rid = self.replicas.get(&rid).and_then(|r| r.parent);
        let index = parent_rid
            .and_then(|prid| self.replicas.get(&prid))
            .and_then(|p| p.children.iter().position(|c| *c == rid));
        let parent_meta = parent_rid
            .and_then(|prid| self.replicas.get(&prid))
            .map(|r| r.meta);
        self.drop_subtree(id);
        let Some(new_rid) = self.clone_tree(model, id, parent_rid) else { return };
        if let Some(prid) = parent_rid
            && let Some(parent) = self.replicas.get_mut(&prid)
        {
            match index {
                Some(at) => parent.children.insert(at.min(parent.children.len()), new_rid),
                None => parent.children.push(new_rid),
            }
        }
        if let Some(parent_meta) = parent_meta
            && let Err(err) = self.arrange_container(model, parent_meta)
        {
            tracing::warn!(%err, "arrangement after recreate failed");
        }
    }

    /// Rearranges a container. A failure is logged and forces the model to
    /// discard its in-progress compound edit, preventing a corrupt undo
    /// entry.
    pub fn update_container_layout(&mut self, model: &mut FormModel, container: ComponentId) {
        if let Err(err) = self.arrange_container(model, container) {
            tracing::warn!(%err, "layout setup failed, discarding compound edit");
            model.discard_compound_edit();
        }
        self.apply_layer_order(model, container);
    }

    /// Reorders replica children to match the meta-model's child order.
    pub fn reorder_components(&mut self, model: &FormModel, container: ComponentId) {
        let Some(&crid) = self.by_meta.get(&container) else { return };
        let Some(comp) = model.component(container) else { return };
        let mut metas: Vec<ComponentId> = comp.children().to_vec();
        if let Some(menu) = comp.menu_bar() {
            metas.push(menu);
        }
        let ordered: Vec<ReplicaId> = metas
            .iter()
            .filter_map(|m| self.by_meta.get(m).copied())
            .collect();
        if let Some(replica) = self.replicas.get_mut(&crid) {
            replica.children = ordered;
        }
        if let Err(err) = self.arrange_container(model, container) {
            tracing::warn!(%err, "arrangement after reorder failed");
        }
        self.apply_layer_order(model, container);
    }

    /// Re-reads a binding property and re-establishes (or releases) the
    /// live relation, cloning a not-yet-replicated peer on demand.
    pub fn update_binding(&mut self, model: &FormModel, id: ComponentId, property: &str) {
        let cached = model
            .component(id)
            .and_then(|c| c.props())
            .and_then(|p| p.binding(property))
            .and_then(|p| p.cached_value().cloned());
        match cached {
            Some(PropertyValue::Design(design)) => {
                if let DesignValue::ComponentRef { target } = design.as_ref() {
                    self.bind(model, id, property, target);
                } else {
                    self.bindings.remove(&(id, property.to_string()));
                }
            }
            _ => {
                self.bindings.remove(&(id, property.to_string()));
            }
        }
    }

    // --------------------------------------------------------------- events

    /// Feeds drained model events into the incremental update paths. Every
    /// failure is already absorbed inside the individual operations; a bad
    /// event degrades the rendering, never the model.
    pub fn apply_events(&mut self, model: &mut FormModel, events: &[FormModelEvent]) {
        for event in events {
            match &event.change {
                FormChange::ComponentAdded { snapshot, .. } => {
                    if let Some(root) = snapshot.first() {
                        self.add_component(model, root.id());
                    }
                }
                FormChange::ComponentRemoved { subtree, .. } => {
                    if let Some(root) = subtree.first() {
                        self.remove_component(model, root.id());
                    }
                }
                FormChange::ComponentPropertyChanged { component, property, .. } => {
                    self.update_component_property(model, *component, property);
                }
                FormChange::BindingPropertyChanged { component, property, .. } => {
                    self.update_binding(model, *component, property);
                }
                FormChange::ContainerLayoutExchanged { container, .. }
                | FormChange::ContainerLayoutChanged { container } => {
                    self.update_container_layout(model, *container);
                }
                FormChange::ComponentLayoutChanged { component, .. } => {
                    if let Some(parent) = model.component(*component).and_then(|c| c.parent) {
                        self.update_container_layout(model, parent);
                    }
                }
                FormChange::ComponentsReordered { container, .. } => {
                    self.reorder_components(model, *container);
                }
                _ => {}
            }
            self.apply_events(model, &event.followups);
        }
    }

    // ------------------------------------------------------------ internals

    fn arrange_container(
        &mut self,
        model: &FormModel,
        container: ComponentId,
    ) -> Result<(), LayoutError> {
        let Some(comp) = model.component(container) else { return Ok(()) };
        let Some(layout_state) = comp.layout() else { return Ok(()) };
        let Some(layout) = self.layouts.get(layout_state.class_name()) else {
            tracing::warn!(class = layout_state.class_name(), "no layout registered");
            return Ok(());
        };
        let Some(&crid) = self.by_meta.get(&container) else { return Ok(()) };
        let Some(mut container_replica) = self.replicas.remove(&crid) else { return Ok(()) };

        // Children leave the arena briefly so layout can hold them mutably.
        let child_metas: Vec<ComponentId> = comp.children().to_vec();
        let mut taken: Vec<Replica> = Vec::new();
        for meta in &child_metas {
            if let Some(rid) = self.by_meta.get(meta)
                && let Some(replica) = self.replicas.remove(rid)
            {
                taken.push(replica);
            }
        }
        let mut items: Vec<LayoutItem<'_>> = taken
            .iter_mut()
            .enumerate()
            .map(|(index, replica)| LayoutItem {
                constraints: layout_state.constraints_for(replica.meta, index),
                instance: &mut replica.instance,
            })
            .collect();
        let result = layout.arrange(&mut container_replica.instance, &mut items);
        drop(items);
        for replica in taken {
            self.replicas.insert(replica.id, replica);
        }
        self.replicas.insert(crid, container_replica);
        result
    }

    /// Layered panels re-apply a numeric stacking order per child after any
    /// insertion or reorder.
    fn apply_layer_order(&mut self, model: &FormModel, container: ComponentId) {
        let layered = model
            .component(container)
            .map(|c| c.bean_class() == "LayeredPanel")
            .unwrap_or(false);
        if !layered {
            return;
        }
        let Some(&crid) = self.by_meta.get(&container) else { return };
        let Some(children) = self.replicas.get(&crid).map(|r| r.children.clone()) else {
            return;
        };
        let mut keyed: Vec<(i64, ReplicaId)> = children
            .into_iter()
            .map(|rid| {
                let layer = self
                    .replicas
                    .get(&rid)
                    .map(|r| r.meta)
                    .and_then(|meta| model.component(meta))
                    .and_then(|c| c.aux_value("layer"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                (layer, rid)
            })
            .collect();
        keyed.sort_by_key(|(layer, _)| *layer);
        if let Some(replica) = self.replicas.get_mut(&crid) {
            replica.children = keyed.into_iter().map(|(_, rid)| rid).collect();
        }
    }

    fn establish_bindings(&mut self, model: &FormModel, root: ComponentId) {
        let mut relations: Vec<(ComponentId, String, String)> = Vec::new();
        for id in model.collect_subtree_ids(root) {
            let Some(props) = model.component(id).and_then(|c| c.props()) else { continue };
            for (name, prop) in props.bindings() {
                if let Some(PropertyValue::Design(design)) = prop.cached_value()
                    && let DesignValue::ComponentRef { target } = design.as_ref()
                {
                    relations.push((id, name.clone(), target.clone()));
                }
            }
        }
        for (id, property, target) in relations {
            self.bind(model, id, &property, &target);
        }
    }

    fn bind(&mut self, model: &FormModel, id: ComponentId, property: &str, target_name: &str) {
        let Some(target) = model.component_by_name(target_name).map(|c| c.id()) else {
            tracing::warn!(target = target_name, "binding target not in model");
            return;
        };
        if !self.by_meta.contains_key(&target) {
            // The referenced peer gets cloned on demand, outside the tree.
            if self.clone_tree(model, target, None).is_none() {
                return;
            }
        }
        self.bindings.insert((id, property.to_string()), target);
    }

    fn drop_subtree(&mut self, meta: ComponentId) {
        let Some(rid) = self.by_meta.get(&meta).copied() else { return };
        if let Some(parent_rid) = self.replicas.get(&rid).and_then(|r| r.parent)
            && let Some(parent) = self.replicas.get_mut(&parent_rid)
        {
            parent.children.retain(|c| *c != rid);
        }
        let mut removed_metas = Vec::new();
        let mut stack = vec![rid];
        while let Some(current) = stack.pop() {
            if let Some(replica) = self.replicas.remove(&current) {
                self.by_meta.remove(&replica.meta);
                removed_metas.push(replica.meta);
                stack.extend(replica.children);
            }
        }
        self.bindings
            .retain(|(source, _), target| {
                !removed_metas.contains(source) && !removed_metas.contains(target)
            });
    }

    fn rebuild_container(&mut self, model: &FormModel, container: ComponentId) {
        let Some(&crid) = self.by_meta.get(&container) else { return };
        let child_rids: Vec<ReplicaId> = self
            .replicas
            .get(&crid)
            .map(|r| r.children.clone())
            .unwrap_or_default();
        for rid in child_rids {
            if let Some(meta) = self.replicas.get(&rid).map(|r| r.meta) {
                self.drop_subtree(meta);
            }
        }
        let Some(comp) = model.component(container) else { return };
        let mut child_metas: Vec<ComponentId> = comp.children().to_vec();
        if let Some(menu) = comp.menu_bar() {
            child_metas.push(menu);
        }
        let mut children = Vec::new();
        for meta in child_metas {
            if let Some(rid) = self.clone_tree(model, meta, Some(crid)) {
                children.push(rid);
            }
        }
        if let Some(replica) = self.replicas.get_mut(&crid) {
            replica.children = children;
        }
        if let Err(err) = self.arrange_container(model, container) {
            tracing::warn!(%err, "arrangement after rebuild failed");
        }
        self.apply_layer_order(model, container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_splitting() {
        assert_eq!(split_mnemonic("&Save"), ("Save".to_string(), Some('S')));
        assert_eq!(split_mnemonic("Sa&ve"), ("Save".to_string(), Some('v')));
        assert_eq!(split_mnemonic("Black && White"), ("Black & White".to_string(), None));
        assert_eq!(split_mnemonic("plain"), ("plain".to_string(), None));
    }
}
