use easel_designer::{ComponentCreator, LogReporter, TargetKind, resolve_target};
use easel_model::{BeanRegistry, ComponentId, FormModel, Placement, PropertyValue};
use std::sync::Arc;

fn form_with_button() -> (FormModel, ComponentId, ComponentId) {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let form = model.create_component("Form").unwrap();
    let form_id = model.add_component(vec![form], Placement::Top).unwrap();
    let button = model.create_component("Button").unwrap();
    let button_id = model
        .add_component(
            vec![button],
            Placement::Child { parent: form_id, index: None, constraints: None },
        )
        .unwrap();
    model.drain_events();
    (model, form_id, button_id)
}

fn creator() -> ComponentCreator {
    ComponentCreator::new(Box::new(LogReporter))
}

#[test]
fn layout_exchanges_on_a_general_container() {
    let (mut model, form, _) = form_with_button();
    assert_eq!(
        resolve_target(&model, "FlowLayout", Some(form), true, true).unwrap(),
        TargetKind::LayoutExchange { container: form }
    );

    let affected = creator().create_component(&mut model, "FlowLayout", Some(form), None);
    assert_eq!(affected, Some(form));
    assert_eq!(
        model.component(form).unwrap().layout().unwrap().class_name(),
        "FlowLayout"
    );
    // A layout drop never adds a component of its own.
    assert_eq!(model.component_count(), 2);
}

#[test]
fn layout_is_rejected_by_a_dedicated_container() {
    let (mut model, form, _) = form_with_button();
    let tabs = model.create_component("TabControl").unwrap();
    let tabs = model
        .add_component(
            vec![tabs],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();

    assert!(resolve_target(&model, "FlowLayout", Some(tabs), true, true).is_err());
    let before = model.component(tabs).unwrap().layout().unwrap().clone();
    assert_eq!(
        creator().create_component(&mut model, "FlowLayout", Some(tabs), None),
        None
    );
    assert_eq!(model.component(tabs).unwrap().layout().unwrap(), &before);
}

#[test]
fn layout_climbs_to_an_accepting_ancestor() {
    let (model, form, button) = form_with_button();
    // The button is no container; its parent form takes the layout.
    assert_eq!(
        resolve_target(&model, "FlowLayout", Some(button), true, true).unwrap(),
        TargetKind::LayoutExchange { container: form }
    );
    // Without the parent-climb flag the drop has nowhere to go.
    assert!(resolve_target(&model, "FlowLayout", Some(button), false, true).is_err());
}

#[test]
fn border_applies_to_the_visual_target_only() {
    let (mut model, _, button) = form_with_button();
    assert_eq!(
        resolve_target(&model, "LineBorder", Some(button), true, true).unwrap(),
        TargetKind::Border { target: button }
    );
    assert!(resolve_target(&model, "LineBorder", None, true, true).is_err());

    let affected = creator().create_component(&mut model, "LineBorder", Some(button), None);
    assert_eq!(affected, Some(button));
    assert_eq!(
        model
            .component(button)
            .unwrap()
            .props()
            .unwrap()
            .get("Border")
            .unwrap()
            .cached_value(),
        Some(&PropertyValue::String("LineBorder".into()))
    );
}

#[test]
fn menu_bar_climbs_to_the_window() {
    let (mut model, form, button) = form_with_button();
    // Dropped on a plain child, the strip lands on the enclosing window.
    assert_eq!(
        resolve_target(&model, "MenuStrip", Some(button), true, true).unwrap(),
        TargetKind::MenuBar { container: form }
    );

    let strip = creator().create_component(&mut model, "MenuStrip", Some(button), None);
    assert_eq!(model.component(form).unwrap().menu_bar(), strip);

    // The slot is taken now, a second strip becomes free-standing.
    assert_eq!(
        resolve_target(&model, "MenuStrip", Some(button), true, true).unwrap(),
        TargetKind::Free
    );
}

#[test]
fn menu_items_nest_by_role() {
    let (mut model, form, _) = form_with_button();
    let strip = creator()
        .create_component(&mut model, "MenuStrip", Some(form), None)
        .unwrap();
    assert_eq!(
        resolve_target(&model, "Menu", Some(strip), true, true).unwrap(),
        TargetKind::MenuItem { container: strip }
    );
    let menu = creator()
        .create_component(&mut model, "Menu", Some(strip), None)
        .unwrap();
    assert_eq!(
        resolve_target(&model, "MenuItem", Some(menu), true, true).unwrap(),
        TargetKind::MenuItem { container: menu }
    );
    // A separator outside a menu has no fallback.
    assert!(resolve_target(&model, "MenuSeparator", Some(form), true, true).is_err());
}

#[test]
fn windows_never_nest() {
    let (model, form, _) = form_with_button();
    assert_eq!(
        resolve_target(&model, "Form", Some(form), true, true).unwrap(),
        TargetKind::Free
    );
}

#[test]
fn resolution_is_deterministic() {
    let (model, form, button) = form_with_button();
    for class in ["FlowLayout", "LineBorder", "MenuStrip", "Label", "Timer"] {
        let first = resolve_target(&model, class, Some(button), true, true).ok();
        let second = resolve_target(&model, class, Some(button), true, true).ok();
        assert_eq!(first, second, "{class} resolved differently on repeat");
    }
    let _ = form;
}

#[test]
fn abstract_classes_fail_instantiation_not_placement() {
    let (mut model, form, _) = form_with_button();
    assert!(resolve_target(&model, "AbstractControl", Some(form), true, true).is_ok());
    assert_eq!(
        creator().create_component(&mut model, "AbstractControl", Some(form), None),
        None
    );
}

#[test]
fn precreated_component_attaches_on_drop() {
    let (mut model, form, _) = form_with_button();
    let mut creator = creator();
    assert!(creator.precreate(&mut model, "Label").is_some());
    let id = creator.add_precreated(&mut model, Some(form), None).unwrap();
    assert_eq!(model.component(id).unwrap().parent, Some(form));
    assert!(creator.precreated().is_none());
}

#[test]
fn cancelled_precreate_leaves_no_trace() {
    let (mut model, _, _) = form_with_button();
    let count = model.component_count();
    let mut creator = creator();
    creator.precreate(&mut model, "Label");
    creator.release_precreated();
    assert!(creator.precreated().is_none());
    assert_eq!(model.component_count(), count);
}
