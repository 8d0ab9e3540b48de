use crate::component::{LayoutConstraints, LayoutState, MetaComponent};
use crate::id::ComponentId;
use crate::model::{FormModel, ModelError, PlacementRecord};
use crate::property::{PropertyError, ValueInput};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};

/// One recorded model change. Every variant carries enough data to undo
/// and redo itself against a model that still contains the original
/// component ids; once a component is truly gone the change is inert and
/// its undo steps are skipped with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormChange {
    FormLoaded,
    FormToBeSaved,
    FormToBeClosed,
    /// Subtree attached: the snapshot is depth-first, root first, taken
    /// after name assignment.
    ComponentAdded {
        placement: PlacementRecord,
        snapshot: Vec<MetaComponent>,
    },
    /// Subtree detached: carries the moved-out components by value.
    ComponentRemoved {
        placement: PlacementRecord,
        subtree: Vec<MetaComponent>,
    },
    /// The child at position `i` moved to `perm[i]`.
    ComponentsReordered {
        container: ComponentId,
        perm: Vec<usize>,
    },
    /// `old: None` means the property was previously unset; `new: None`
    /// means the change restored the default.
    ComponentPropertyChanged {
        component: ComponentId,
        property: String,
        old: Option<PropertyValue>,
        new: Option<PropertyValue>,
    },
    /// Model-level attributes outside the bean: the variable name
    /// ("variableName") and auxiliary values ("auxValue.{key}").
    SyntheticPropertyChanged {
        component: Option<ComponentId>,
        property: String,
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    },
    BindingPropertyChanged {
        component: ComponentId,
        property: String,
        old: Option<PropertyValue>,
        new: Option<PropertyValue>,
    },
    ContainerLayoutExchanged {
        container: ComponentId,
        old: LayoutState,
        new: LayoutState,
    },
    /// Arrangement changed without structural data; inert for undo.
    ContainerLayoutChanged { container: ComponentId },
    ComponentLayoutChanged {
        component: ComponentId,
        layout_class: String,
        old: Option<LayoutConstraints>,
        new: Option<LayoutConstraints>,
    },
    EventHandlerAdded {
        component: ComponentId,
        event: String,
        handler: String,
    },
    EventHandlerRemoved {
        component: ComponentId,
        event: String,
        handler: String,
    },
    EventHandlerRenamed { old: String, new: String },
    OtherChange,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("component no longer in the model")]
    MissingComponent,
    #[error("change carries no usable state")]
    BadState,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl FormChange {
    /// Variant name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FormChange::FormLoaded => "FormLoaded",
            FormChange::FormToBeSaved => "FormToBeSaved",
            FormChange::FormToBeClosed => "FormToBeClosed",
            FormChange::ComponentAdded { .. } => "ComponentAdded",
            FormChange::ComponentRemoved { .. } => "ComponentRemoved",
            FormChange::ComponentsReordered { .. } => "ComponentsReordered",
            FormChange::ComponentPropertyChanged { .. } => "ComponentPropertyChanged",
            FormChange::SyntheticPropertyChanged { .. } => "SyntheticPropertyChanged",
            FormChange::BindingPropertyChanged { .. } => "BindingPropertyChanged",
            FormChange::ContainerLayoutExchanged { .. } => "ContainerLayoutExchanged",
            FormChange::ContainerLayoutChanged { .. } => "ContainerLayoutChanged",
            FormChange::ComponentLayoutChanged { .. } => "ComponentLayoutChanged",
            FormChange::EventHandlerAdded { .. } => "EventHandlerAdded",
            FormChange::EventHandlerRemoved { .. } => "EventHandlerRemoved",
            FormChange::EventHandlerRenamed { .. } => "EventHandlerRenamed",
            FormChange::OtherChange => "OtherChange",
        }
    }

    fn undo_change(&self, model: &mut FormModel) -> Result<(), HistoryError> {
        match self {
            FormChange::FormLoaded
            | FormChange::FormToBeSaved
            | FormChange::FormToBeClosed
            | FormChange::ContainerLayoutChanged { .. }
            | FormChange::OtherChange => Ok(()),

            FormChange::ComponentAdded { snapshot, .. } => {
                let root = snapshot.first().map(|c| c.id()).ok_or(HistoryError::BadState)?;
                detach_subtree_handlers(model, root);
                model
                    .extract_subtree(root)
                    .ok_or(HistoryError::MissingComponent)?;
                Ok(())
            }
            FormChange::ComponentRemoved { placement, subtree } => {
                model.insert_subtree(subtree.clone(), placement.clone());
                Ok(())
            }
            FormChange::ComponentsReordered { container, perm } => {
                model.apply_permutation(*container, &invert_permutation(perm))?;
                Ok(())
            }
            FormChange::ComponentPropertyChanged { component, property, old, .. } => {
                match old {
                    Some(value) => model.set_property_internal(
                        *component,
                        property,
                        ValueInput::Plain(value.clone()),
                        false,
                    )?,
                    None => model.restore_property_default(*component, property)?,
                }
                Ok(())
            }
            FormChange::SyntheticPropertyChanged { component, property, old, new } => {
                apply_synthetic(model, *component, property, new, old)
            }
            FormChange::BindingPropertyChanged { component, property, old, .. } => {
                model.set_binding_value(*component, property, old.clone())?;
                Ok(())
            }
            FormChange::ContainerLayoutExchanged { container, old, .. } => model
                .exchange_layout_silent(*container, old.clone())
                .map(|_| ())
                .ok_or(HistoryError::MissingComponent),
            FormChange::ComponentLayoutChanged { component, layout_class, old, .. } => {
                model.set_layout_constraints(*component, layout_class, old.clone())?;
                Ok(())
            }
            FormChange::EventHandlerAdded { component, event, handler } => {
                model.detach_handler_silent(*component, event, handler);
                Ok(())
            }
            FormChange::EventHandlerRemoved { component, event, handler } => {
                model.attach_handler_silent(*component, event, handler);
                Ok(())
            }
            FormChange::EventHandlerRenamed { old, new } => {
                model.rename_handler_everywhere(new, old);
                Ok(())
            }
        }
    }

    fn redo_change(&self, model: &mut FormModel) -> Result<(), HistoryError> {
        match self {
            FormChange::FormLoaded
            | FormChange::FormToBeSaved
            | FormChange::FormToBeClosed
            | FormChange::ContainerLayoutChanged { .. }
            | FormChange::OtherChange => Ok(()),

            FormChange::ComponentAdded { placement, snapshot } => {
                model.insert_subtree(snapshot.clone(), placement.clone());
                Ok(())
            }
            FormChange::ComponentRemoved { subtree, .. } => {
                let root = subtree.first().map(|c| c.id()).ok_or(HistoryError::BadState)?;
                detach_subtree_handlers(model, root);
                model
                    .extract_subtree(root)
                    .ok_or(HistoryError::MissingComponent)?;
                Ok(())
            }
            FormChange::ComponentsReordered { container, perm } => {
                model.apply_permutation(*container, perm)?;
                Ok(())
            }
            FormChange::ComponentPropertyChanged { component, property, new, .. } => {
                match new {
                    Some(value) => model.set_property_internal(
                        *component,
                        property,
                        ValueInput::Plain(value.clone()),
                        false,
                    )?,
                    None => model.restore_property_default(*component, property)?,
                }
                Ok(())
            }
            FormChange::SyntheticPropertyChanged { component, property, old, new } => {
                apply_synthetic(model, *component, property, old, new)
            }
            FormChange::BindingPropertyChanged { component, property, new, .. } => {
                model.set_binding_value(*component, property, new.clone())?;
                Ok(())
            }
            FormChange::ContainerLayoutExchanged { container, new, .. } => model
                .exchange_layout_silent(*container, new.clone())
                .map(|_| ())
                .ok_or(HistoryError::MissingComponent),
            FormChange::ComponentLayoutChanged { component, layout_class, new, .. } => {
                model.set_layout_constraints(*component, layout_class, new.clone())?;
                Ok(())
            }
            FormChange::EventHandlerAdded { component, event, handler } => {
                model.attach_handler_silent(*component, event, handler);
                Ok(())
            }
            FormChange::EventHandlerRemoved { component, event, handler } => {
                model.detach_handler_silent(*component, event, handler);
                Ok(())
            }
            FormChange::EventHandlerRenamed { old, new } => {
                model.rename_handler_everywhere(old, new);
                Ok(())
            }
        }
    }
}

/// Moves a synthetic attribute from `from` to `to`.
fn apply_synthetic(
    model: &mut FormModel,
    component: Option<ComponentId>,
    property: &str,
    from: &Option<serde_json::Value>,
    to: &Option<serde_json::Value>,
) -> Result<(), HistoryError> {
    if property == "variableName" {
        let id = component.ok_or(HistoryError::BadState)?;
        let (Some(serde_json::Value::String(from)), Some(serde_json::Value::String(to))) =
            (from, to)
        else {
            return Err(HistoryError::BadState);
        };
        model.rename_core(id, from, to)?;
        return Ok(());
    }
    if let Some(key) = property.strip_prefix("auxValue.") {
        let id = component.ok_or(HistoryError::BadState)?;
        model.set_aux_silent(id, key, to.clone());
        return Ok(());
    }
    Ok(())
}

fn detach_subtree_handlers(model: &mut FormModel, root: ComponentId) {
    for id in model.collect_subtree_ids(root) {
        let handlers = model
            .component(id)
            .map(|c| c.event_handlers.clone())
            .unwrap_or_default();
        for (event, names) in handlers {
            for handler in names {
                model.detach_handler_silent(id, &event, &handler);
            }
        }
    }
}

fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &to) in perm.iter().enumerate() {
        if to < inverse.len() {
            inverse[to] = i;
        }
    }
    inverse
}

/// A change plus the secondary changes the same user operation produced.
/// Undo runs the main change first, then the follow-ups newest first;
/// redo replays the follow-ups in order and the main change last, matching
/// the order the pieces originally happened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormModelEvent {
    pub change: FormChange,
    pub followups: Vec<FormModelEvent>,
}

impl FormModelEvent {
    pub fn new(change: FormChange) -> Self {
        Self { change, followups: Vec::new() }
    }

    pub fn with_followups(change: FormChange, followups: Vec<FormModelEvent>) -> Self {
        Self { change, followups }
    }

    pub fn undo_in(&self, model: &mut FormModel) {
        model.with_recording_disabled(|m| self.undo_steps(m));
    }

    pub fn redo_in(&self, model: &mut FormModel) {
        model.with_recording_disabled(|m| self.redo_steps(m));
    }

    // A failed step is logged and the rest still run, so as much of the
    // model as possible returns to the recorded state.
    fn undo_steps(&self, model: &mut FormModel) {
        if let Err(err) = self.change.undo_change(model) {
            tracing::warn!(change = self.change.kind(), error = %err, "undo step failed");
        }
        for followup in self.followups.iter().rev() {
            followup.undo_steps(model);
        }
    }

    fn redo_steps(&self, model: &mut FormModel) {
        for followup in &self.followups {
            followup.redo_steps(model);
        }
        if let Err(err) = self.change.redo_change(model) {
            tracing::warn!(change = self.change.kind(), error = %err, "redo step failed");
        }
    }
}

/// The unit handed to the undo stack: all events of one user operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormUndoableEdit {
    events: Vec<FormModelEvent>,
}

impl FormUndoableEdit {
    pub fn new(events: Vec<FormModelEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[FormModelEvent] {
        &self.events
    }

    pub fn undo(&self, model: &mut FormModel) {
        for event in self.events.iter().rev() {
            event.undo_in(model);
        }
    }

    pub fn redo(&self, model: &mut FormModel) {
        for event in &self.events {
            event.redo_in(model);
        }
    }
}

/// Receiver of committed compound edits.
pub trait UndoHost {
    fn add_edit(&mut self, edit: FormUndoableEdit);
}

/// Linear undo stack with a cursor. Adding an edit drops the redo tail.
#[derive(Debug, Default)]
pub struct UndoLog {
    edits: Vec<FormUndoableEdit>,
    cursor: usize,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.edits.len()
    }

    pub fn undo(&mut self, model: &mut FormModel) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.edits[self.cursor].undo(model);
        true
    }

    pub fn redo(&mut self, model: &mut FormModel) -> bool {
        if self.cursor >= self.edits.len() {
            return false;
        }
        self.edits[self.cursor].redo(model);
        self.cursor += 1;
        true
    }
}

impl UndoHost for UndoLog {
    fn add_edit(&mut self, edit: FormUndoableEdit) {
        self.edits.truncate(self.cursor);
        self.edits.push(edit);
        self.cursor += 1;
    }
}
