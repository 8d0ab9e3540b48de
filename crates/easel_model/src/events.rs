use crate::id::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One callback signature within an event set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub name: String,
    /// Handler parameter list as it appears in generated code.
    pub params: String,
}

impl EventDescriptor {
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self { name: name.into(), params: params.into() }
    }
}

/// Which components an event set applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventApplicability {
    Any,
    VisualOnly,
    WindowOnly,
}

/// A named group of related callback signatures, e.g. all mouse callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSetDescriptor {
    pub name: String,
    pub applies: EventApplicability,
    pub events: Vec<EventDescriptor>,
}

impl EventSetDescriptor {
    pub fn new(name: impl Into<String>, applies: EventApplicability) -> Self {
        Self { name: name.into(), applies, events: Vec::new() }
    }

    pub fn with_event(mut self, name: &str, params: &str) -> Self {
        self.events.push(EventDescriptor::new(name, params));
        self
    }

    pub fn action() -> Self {
        Self::new("action", EventApplicability::Any)
            .with_event("Click", "sender As Object, e As EventArgs")
            .with_event("DoubleClick", "sender As Object, e As EventArgs")
    }

    pub fn mouse() -> Self {
        Self::new("mouse", EventApplicability::VisualOnly)
            .with_event("MouseDown", "sender As Object, e As MouseEventArgs")
            .with_event("MouseUp", "sender As Object, e As MouseEventArgs")
            .with_event("MouseMove", "sender As Object, e As MouseEventArgs")
            .with_event("MouseEnter", "sender As Object, e As EventArgs")
            .with_event("MouseLeave", "sender As Object, e As EventArgs")
    }

    pub fn key() -> Self {
        Self::new("key", EventApplicability::VisualOnly)
            .with_event("KeyDown", "sender As Object, e As KeyEventArgs")
            .with_event("KeyUp", "sender As Object, e As KeyEventArgs")
            .with_event("KeyPress", "sender As Object, e As KeyPressEventArgs")
    }

    pub fn focus() -> Self {
        Self::new("focus", EventApplicability::VisualOnly)
            .with_event("GotFocus", "sender As Object, e As EventArgs")
            .with_event("LostFocus", "sender As Object, e As EventArgs")
    }

    pub fn change() -> Self {
        Self::new("change", EventApplicability::Any)
            .with_event("TextChanged", "sender As Object, e As EventArgs")
            .with_event("ValueChanged", "sender As Object, e As EventArgs")
    }

    pub fn window() -> Self {
        Self::new("window", EventApplicability::WindowOnly)
            .with_event("Load", "sender As Object, e As EventArgs")
            .with_event("Shown", "sender As Object, e As EventArgs")
            .with_event("Closing", "sender As Object, e As FormClosingEventArgs")
            .with_event("Closed", "sender As Object, e As FormClosedEventArgs")
    }
}

/// Default handler name for a component/event pair.
pub fn default_handler_name(component_name: &str, event_name: &str) -> String {
    format!("{}_{}", component_name, event_name)
}

/// Model-wide registry of event handlers: handler method name to the
/// (component, event) pairs attached to it. One handler may serve several
/// events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    handlers: BTreeMap<String, Vec<(ComponentId, String)>>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a handler to a component's event. Returns true if the
    /// handler method is new to the table.
    pub fn attach(&mut self, handler: &str, component: ComponentId, event: &str) -> bool {
        let entry = self.handlers.entry(handler.to_string()).or_default();
        let created = entry.is_empty();
        if !entry.iter().any(|(c, e)| *c == component && e == event) {
            entry.push((component, event.to_string()));
        }
        created
    }

    /// Detaches one attachment. Returns true if the handler method has no
    /// remaining attachments and was dropped from the table.
    pub fn detach(&mut self, handler: &str, component: ComponentId, event: &str) -> bool {
        if let Some(entry) = self.handlers.get_mut(handler) {
            entry.retain(|(c, e)| !(*c == component && e == event));
            if entry.is_empty() {
                self.handlers.remove(handler);
                return true;
            }
        }
        false
    }

    /// Detaches every handler of one component, returning the removed
    /// (event, handler) pairs in table order.
    pub fn detach_component(&mut self, component: ComponentId) -> Vec<(String, String)> {
        let mut removed = Vec::new();
        let names: Vec<String> = self.handlers.keys().cloned().collect();
        for name in names {
            let entry = self.handlers.get_mut(&name).expect("handler just listed");
            let mut kept = Vec::new();
            for (c, e) in entry.drain(..) {
                if c == component {
                    removed.push((e, name.clone()));
                } else {
                    kept.push((c, e));
                }
            }
            if kept.is_empty() {
                self.handlers.remove(&name);
            } else {
                *self.handlers.get_mut(&name).expect("handler just listed") = kept;
            }
        }
        removed
    }

    pub fn rename_handler(&mut self, old: &str, new: &str) {
        if let Some(entry) = self.handlers.remove(old) {
            self.handlers.entry(new.to_string()).or_default().extend(entry);
        }
    }

    pub fn is_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn attachments(&self, handler: &str) -> &[(ComponentId, String)] {
        self.handlers.get(handler).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Finds a free handler method name, appending a numeric suffix when the
    /// base name is taken.
    pub fn find_free_handler_name(&self, base: &str) -> String {
        if !self.handlers.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.handlers.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_handler_name_appends_suffix() {
        let mut table = EventTable::new();
        let id = ComponentId::new();
        table.attach("btn1_Click", id, "Click");
        assert_eq!(table.find_free_handler_name("btn1_Click"), "btn1_Click1");
        assert_eq!(table.find_free_handler_name("btn2_Click"), "btn2_Click");
    }

    #[test]
    fn detach_component_releases_shared_handlers_partially() {
        let mut table = EventTable::new();
        let a = ComponentId::new();
        let b = ComponentId::new();
        table.attach("shared", a, "Click");
        table.attach("shared", b, "Click");
        let removed = table.detach_component(a);
        assert_eq!(removed, vec![("Click".to_string(), "shared".to_string())]);
        assert!(table.is_handler("shared"));
    }
}
