use easel_model::{
    BeanError, BeanRole, ChildPolicy, ComponentId, ConstraintGraph, FormModel,
    LayoutConstraints, LayoutDelegateState, LayoutState, MenuRole, MetaComponent, Placement,
    PropertyValue, ValueInput, menu_accepts,
};
use std::collections::BTreeMap;

/// The resolved kind of placement for one bean class at one drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Replace the container's layout with an instance of the class.
    LayoutExchange { container: ComponentId },
    /// Set the class as the target's border.
    Border { target: ComponentId },
    /// Attach as an item of a menu container.
    MenuItem { container: ComponentId },
    /// Attach as the menu bar of a window-like container.
    MenuBar { container: ComponentId },
    /// Attach as a visual child.
    VisualChild { container: ComponentId },
    /// Free-standing, in the model's other-components bucket.
    Free,
}

#[derive(Debug, thiserror::Error)]
#[error("no legal placement for '{bean_class}'")]
pub struct PlacementRejected {
    pub bean_class: String,
}

impl PlacementRejected {
    fn new(bean_class: &str) -> Self {
        Self { bean_class: bean_class.to_string() }
    }
}

fn accepts_child(policy: &ChildPolicy, bean_class: &str) -> bool {
    match policy {
        ChildPolicy::AnyVisual => true,
        ChildPolicy::Classes(classes) => classes.iter().any(|c| c == bean_class),
        ChildPolicy::None => false,
    }
}

/// Decides what adding `bean_class` at `target` would do, without touching
/// the model. A pure function of the class role, the target's state and the
/// two flags; a rejection is a user-facing condition, not a fault.
pub fn resolve_target(
    model: &FormModel,
    bean_class: &str,
    target: Option<ComponentId>,
    can_use_parent: bool,
    default_to_others: bool,
) -> Result<TargetKind, PlacementRejected> {
    let desc = model
        .registry()
        .load_class(bean_class)
        .map_err(|_| PlacementRejected::new(bean_class))?;

    match &desc.role {
        BeanRole::Layout => {
            let mut candidate = target;
            while let Some(id) = candidate {
                let comp = model.component(id).ok_or_else(|| PlacementRejected::new(bean_class))?;
                if let Ok(target_desc) = model.registry().load_class(comp.bean_class())
                    && let Some(facts) = target_desc.role.container_facts()
                {
                    if facts.dedicated_layout {
                        return Err(PlacementRejected::new(bean_class));
                    }
                    return Ok(TargetKind::LayoutExchange { container: id });
                }
                if !can_use_parent {
                    break;
                }
                candidate = comp.parent;
            }
            Err(PlacementRejected::new(bean_class))
        }

        BeanRole::Border => {
            let id = target.ok_or_else(|| PlacementRejected::new(bean_class))?;
            let comp = model.component(id).ok_or_else(|| PlacementRejected::new(bean_class))?;
            let target_desc = model
                .registry()
                .load_class(comp.bean_class())
                .map_err(|_| PlacementRejected::new(bean_class))?;
            if target_desc.role.is_visual() {
                Ok(TargetKind::Border { target: id })
            } else {
                Err(PlacementRejected::new(bean_class))
            }
        }

        BeanRole::Menu(role) => {
            if let Some(id) = target
                && let Some(comp) = model.component(id)
                && let Ok(target_desc) = model.registry().load_class(comp.bean_class())
                && let BeanRole::Menu(container_role) = &target_desc.role
                && menu_accepts(*container_role, *role)
            {
                return Ok(TargetKind::MenuItem { container: id });
            }
            if *role == MenuRole::MenuBar {
                let mut candidate = target;
                while let Some(id) = candidate {
                    let Some(comp) = model.component(id) else { break };
                    if let Ok(target_desc) = model.registry().load_class(comp.bean_class())
                        && let Some(facts) = target_desc.role.container_facts()
                        && facts.can_have_menu_bar
                        && comp.menu_bar().is_none()
                    {
                        return Ok(TargetKind::MenuBar { container: id });
                    }
                    if !can_use_parent {
                        break;
                    }
                    candidate = comp.parent;
                }
            }
            // A separator makes no sense outside a menu.
            if default_to_others && *role != MenuRole::Separator {
                Ok(TargetKind::Free)
            } else {
                Err(PlacementRejected::new(bean_class))
            }
        }

        BeanRole::Visual(facts) => {
            // Windows are never children of another component.
            if !facts.window {
                let mut candidate = target;
                while let Some(id) = candidate {
                    let Some(comp) = model.component(id) else { break };
                    if let Ok(target_desc) = model.registry().load_class(comp.bean_class())
                        && let Some(container) = target_desc.role.container_facts()
                        && accepts_child(&container.child_policy, bean_class)
                    {
                        return Ok(TargetKind::VisualChild { container: id });
                    }
                    if !can_use_parent {
                        break;
                    }
                    candidate = comp.parent;
                }
            }
            if default_to_others {
                Ok(TargetKind::Free)
            } else {
                Err(PlacementRejected::new(bean_class))
            }
        }

        BeanRole::Other => Ok(TargetKind::Free),
    }
}

/// User-notification seam for placement and instantiation outcomes.
pub trait CreationReporter {
    fn placement_rejected(&self, bean_class: &str);
    fn instantiation_failed(&self, bean_class: &str, error: &BeanError);
}

/// Reporter that routes everything into the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl CreationReporter for LogReporter {
    fn placement_rejected(&self, bean_class: &str) {
        tracing::info!(class = bean_class, "no legal placement here");
    }

    fn instantiation_failed(&self, bean_class: &str, error: &BeanError) {
        if error.is_expected() {
            tracing::info!(class = bean_class, %error, "cannot instantiate");
        } else {
            tracing::error!(class = bean_class, %error, "unexpected instantiation failure");
        }
    }
}

struct HandlerPlan {
    component: ComponentId,
    event: String,
    handler: String,
    old_name: String,
}

/// Executes placements decided by `resolve_target` and deep copies of
/// existing components. Failures abort without touching the model; the
/// reporter hears about them.
pub struct ComponentCreator {
    reporter: Box<dyn CreationReporter>,
    precreated: Option<MetaComponent>,
}

impl ComponentCreator {
    pub fn new(reporter: Box<dyn CreationReporter>) -> Self {
        Self { reporter, precreated: None }
    }

    /// Creates and attaches a component of `bean_class` at the resolved
    /// placement. Returns the affected component id, or `None` on
    /// rejection or instantiation failure.
    pub fn create_component(
        &self,
        model: &mut FormModel,
        bean_class: &str,
        target: Option<ComponentId>,
        constraints: Option<LayoutConstraints>,
    ) -> Option<ComponentId> {
        let kind = match resolve_target(model, bean_class, target, true, true) {
            Ok(kind) => kind,
            Err(rejected) => {
                self.reporter.placement_rejected(&rejected.bean_class);
                return None;
            }
        };
        self.execute(model, bean_class, kind, constraints)
    }

    fn execute(
        &self,
        model: &mut FormModel,
        bean_class: &str,
        kind: TargetKind,
        constraints: Option<LayoutConstraints>,
    ) -> Option<ComponentId> {
        match kind {
            TargetKind::LayoutExchange { container } => {
                if let Err(err) = model.set_container_layout(container, layout_state_for(bean_class)) {
                    tracing::warn!(class = bean_class, %err, "layout exchange failed");
                    return None;
                }
                Some(container)
            }
            TargetKind::Border { target } => {
                // A bad border must not abort anything beyond itself.
                if let Err(err) = model.set_property_value(
                    target,
                    "Border",
                    ValueInput::Plain(PropertyValue::String(bean_class.to_string())),
                ) {
                    tracing::warn!(class = bean_class, %err, "border could not be applied");
                    return None;
                }
                Some(target)
            }
            TargetKind::MenuItem { container } => {
                let comp = self.instantiate(model, bean_class)?;
                self.attach(
                    model,
                    vec![comp],
                    Placement::Child { parent: container, index: None, constraints: None },
                )
            }
            TargetKind::MenuBar { container } => {
                let comp = self.instantiate(model, bean_class)?;
                self.attach(model, vec![comp], Placement::MenuBar { container })
            }
            TargetKind::VisualChild { container } => {
                let comp = self.instantiate(model, bean_class)?;
                self.attach(
                    model,
                    vec![comp],
                    Placement::Child { parent: container, index: None, constraints },
                )
            }
            TargetKind::Free => {
                let comp = self.instantiate(model, bean_class)?;
                self.attach(model, vec![comp], Placement::Free)
            }
        }
    }

    fn instantiate(&self, model: &mut FormModel, bean_class: &str) -> Option<MetaComponent> {
        match model.create_component(bean_class) {
            Ok(comp) => Some(comp),
            Err(err) => {
                self.reporter.instantiation_failed(bean_class, &err);
                None
            }
        }
    }

    fn attach(
        &self,
        model: &mut FormModel,
        subtree: Vec<MetaComponent>,
        placement: Placement,
    ) -> Option<ComponentId> {
        match model.add_component(subtree, placement) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(%err, "attach failed");
                None
            }
        }
    }

    // ------------------------------------------------------------- staging

    /// Instantiates a component ahead of a drop, without attaching it.
    pub fn precreate(&mut self, model: &mut FormModel, bean_class: &str) -> Option<&MetaComponent> {
        self.precreated = self.instantiate(model, bean_class);
        self.precreated.as_ref()
    }

    /// Attaches the staged component at the resolved placement.
    pub fn add_precreated(
        &mut self,
        model: &mut FormModel,
        target: Option<ComponentId>,
        constraints: Option<LayoutConstraints>,
    ) -> Option<ComponentId> {
        let comp = self.precreated.take()?;
        let kind = match resolve_target(model, comp.bean_class(), target, true, true) {
            Ok(kind) => kind,
            Err(rejected) => {
                self.reporter.placement_rejected(&rejected.bean_class);
                return None;
            }
        };
        match kind {
            TargetKind::MenuItem { container } => self.attach(
                model,
                vec![comp],
                Placement::Child { parent: container, index: None, constraints: None },
            ),
            TargetKind::MenuBar { container } => {
                self.attach(model, vec![comp], Placement::MenuBar { container })
            }
            TargetKind::VisualChild { container } => self.attach(
                model,
                vec![comp],
                Placement::Child { parent: container, index: None, constraints },
            ),
            TargetKind::Free => self.attach(model, vec![comp], Placement::Free),
            // Layout and border placements don't attach the instance itself.
            other => self.execute(model, &comp.bean_class().to_string(), other, constraints),
        }
    }

    /// Drops the staged component, e.g. when the drag is cancelled.
    pub fn release_precreated(&mut self) {
        self.precreated = None;
    }

    pub fn precreated(&self) -> Option<&MetaComponent> {
        self.precreated.as_ref()
    }

    // ---------------------------------------------------------------- copy

    /// Duplicates a component subtree within one model. The copy gets fresh
    /// ids, keeps relative child order, changed property values and layout
    /// constraints, and re-attaches event handlers under remapped names.
    pub fn copy_component(
        &self,
        model: &mut FormModel,
        source: ComponentId,
        target: Option<ComponentId>,
    ) -> Option<ComponentId> {
        let (subtree, handler_plans) = match plan_copy(model, source, false) {
            Some(plan) => plan,
            None => return None,
        };
        self.paste(model, subtree, handler_plans, target)
    }

    /// Copies a subtree from another model. Resource and localization
    /// indirections are resolved to plain values, since the destination's
    /// resource store does not hold the source's entries.
    pub fn copy_from(
        &self,
        dest: &mut FormModel,
        source_model: &FormModel,
        source: ComponentId,
        target: Option<ComponentId>,
    ) -> Option<ComponentId> {
        let (subtree, handler_plans) = match plan_copy(source_model, source, true) {
            Some(plan) => plan,
            None => return None,
        };
        self.paste(dest, subtree, handler_plans, target)
    }

    fn paste(
        &self,
        model: &mut FormModel,
        subtree: Vec<MetaComponent>,
        handler_plans: Vec<HandlerPlan>,
        target: Option<ComponentId>,
    ) -> Option<ComponentId> {
        let root_class = subtree.first()?.bean_class().to_string();
        let kind = match resolve_target(model, &root_class, target, true, true) {
            Ok(kind) => kind,
            Err(rejected) => {
                self.reporter.placement_rejected(&rejected.bean_class);
                return None;
            }
        };
        let placement = match kind {
            TargetKind::MenuItem { container } => {
                Placement::Child { parent: container, index: None, constraints: None }
            }
            TargetKind::MenuBar { container } => Placement::MenuBar { container },
            TargetKind::VisualChild { container } => {
                let constraints = constraints_for_container(model, container, &subtree[0]);
                Placement::Child { parent: container, index: None, constraints }
            }
            TargetKind::Free => Placement::Free,
            // A copied component is never a layout or border drop.
            TargetKind::LayoutExchange { .. } | TargetKind::Border { .. } => Placement::Free,
        };
        let root = self.attach(model, subtree, placement)?;

        for plan in handler_plans {
            let Some(new_name) = model
                .component(plan.component)
                .and_then(|c| c.name().map(str::to_string))
            else {
                continue;
            };
            let candidate = match plan.handler.find(&plan.old_name) {
                Some(at) => format!(
                    "{}{}{}",
                    &plan.handler[..at],
                    new_name,
                    &plan.handler[at + plan.old_name.len()..]
                ),
                None => format!("{}_{}", new_name, plan.handler),
            };
            let free = model.find_free_handler_name(&candidate);
            if let Err(err) = model.add_event_handler(plan.component, &plan.event, Some(free)) {
                tracing::warn!(%err, event = %plan.event, "copied handler dropped");
            }
        }
        Some(root)
    }
}

/// The constraints the copied root should carry into its new container:
/// whatever it remembered for that container's current layout class.
fn constraints_for_container(
    model: &FormModel,
    container: ComponentId,
    comp: &MetaComponent,
) -> Option<LayoutConstraints> {
    let layout_class = model
        .component(container)
        .and_then(|c| c.layout())
        .map(|l| l.class_name().to_string())?;
    comp.constraints_map().and_then(|m| m.get(&layout_class).cloned())
}

/// Clones a subtree into detached components with fresh ids, collecting the
/// handler re-attachment plan. Auxiliary values that fail to re-serialize
/// are dropped per key, never aborting the copy.
fn plan_copy(
    source_model: &FormModel,
    root: ComponentId,
    cross_model: bool,
) -> Option<(Vec<MetaComponent>, Vec<HandlerPlan>)> {
    let ids = source_model.collect_subtree_ids(root);
    let mut remap: BTreeMap<ComponentId, ComponentId> = BTreeMap::new();
    for id in &ids {
        remap.insert(*id, ComponentId::new());
    }

    let mut subtree = Vec::with_capacity(ids.len());
    let mut handler_plans = Vec::new();
    for id in ids {
        let src = source_model.component(id)?;
        let mut copy = src.detached_copy();
        copy.remap_refs(&remap);
        if cross_model {
            copy.resolve_design_values();
            // Aux metadata crosses models best-effort, one key at a time.
            let aux = copy.aux_values().clone();
            for (key, value) in aux {
                match serde_json::to_string(&value).and_then(|s| serde_json::from_str(&s)) {
                    Ok(cloned) => copy.set_aux_value(&key, Some(cloned)),
                    Err(err) => {
                        tracing::warn!(%key, %err, "aux value dropped during copy");
                        copy.set_aux_value(&key, None);
                    }
                }
            }
        }
        if let Some(old_name) = src.name().map(str::to_string) {
            for (event, handlers) in &src.event_handlers {
                for handler in handlers {
                    handler_plans.push(HandlerPlan {
                        component: copy.id(),
                        event: event.clone(),
                        handler: handler.clone(),
                        old_name: old_name.clone(),
                    });
                }
            }
        }
        subtree.push(copy);
    }
    Some((subtree, handler_plans))
}

fn layout_state_for(bean_class: &str) -> LayoutState {
    match bean_class {
        // The grid keeps per-child constraints in a graph keyed by id.
        "GridLayout" => LayoutState::Constraints(ConstraintGraph {
            class_name: bean_class.to_string(),
            by_child: BTreeMap::new(),
        }),
        other => LayoutState::Delegate(LayoutDelegateState {
            class_name: other.to_string(),
            constraints: Vec::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bean_goes_free_standing() {
        let registry = std::sync::Arc::new(easel_model::BeanRegistry::standard());
        let model = FormModel::new("Form1", registry);
        let kind = resolve_target(&model, "Timer", None, true, true).unwrap();
        assert_eq!(kind, TargetKind::Free);
    }
}
