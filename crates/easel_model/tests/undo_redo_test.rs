use easel_model::{
    BeanRegistry, ComponentId, FormModel, LayoutDelegateState, LayoutState, Placement,
    PropertyValue, UndoHost, UndoLog, ValueInput,
};
use std::sync::Arc;

fn empty_form() -> (FormModel, ComponentId) {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let form = model.create_component("Form").unwrap();
    let form_id = model.add_component(vec![form], Placement::Top).unwrap();
    model.drain_events();
    (model, form_id)
}

fn add_button(model: &mut FormModel, parent: ComponentId) -> ComponentId {
    let button = model.create_component("Button").unwrap();
    model
        .add_component(
            vec![button],
            Placement::Child { parent, index: None, constraints: None },
        )
        .unwrap()
}

#[test]
fn undo_and_redo_component_addition() {
    let (mut model, form) = empty_form();
    let mut log = UndoLog::new();

    model.start_compound_edit();
    let button = add_button(&mut model, form);
    let name = model.component(button).unwrap().name().unwrap().to_string();
    let edit = model.commit_compound_edit().unwrap();
    log.add_edit(edit);

    assert!(log.undo(&mut model));
    assert!(model.component(button).is_none());
    assert!(model.component(form).unwrap().children().is_empty());

    assert!(log.redo(&mut model));
    let children = model.component(form).unwrap().children();
    assert_eq!(children, &[button]);
    assert_eq!(model.component(button).unwrap().name(), Some(name.as_str()));
    assert!(model.is_in_model(button));
}

#[test]
fn undo_and_redo_component_removal() {
    let (mut model, form) = empty_form();
    let button = add_button(&mut model, form);
    let handler = model
        .add_event_handler(button, "Click", None)
        .unwrap();
    model.drain_events();
    let mut log = UndoLog::new();

    model.start_compound_edit();
    model.remove_component(button).unwrap();
    log.add_edit(model.commit_compound_edit().unwrap());
    assert!(model.component(button).is_none());
    assert!(!model.events().is_handler(&handler));

    log.undo(&mut model);
    let comp = model.component(button).expect("subtree restored");
    assert_eq!(comp.parent, Some(form));
    assert!(model.events().is_handler(&handler));
    assert_eq!(
        model.events().attachments(&handler),
        &[(button, "Click".to_string())]
    );
}

#[test]
fn property_change_undoes_to_previous_value() {
    let (mut model, form) = empty_form();
    let button = add_button(&mut model, form);
    model
        .set_property_value(button, "Text", ValueInput::Plain("before".into()))
        .unwrap();
    model.drain_events();
    let mut log = UndoLog::new();

    model.start_compound_edit();
    model
        .set_property_value(button, "Text", ValueInput::Plain("after".into()))
        .unwrap();
    log.add_edit(model.commit_compound_edit().unwrap());

    let cached = |model: &FormModel| {
        model
            .component(button)
            .unwrap()
            .props()
            .unwrap()
            .get("Text")
            .unwrap()
            .cached_value()
            .cloned()
    };
    assert_eq!(cached(&model), Some(PropertyValue::String("after".into())));
    log.undo(&mut model);
    assert_eq!(cached(&model), Some(PropertyValue::String("before".into())));
    log.redo(&mut model);
    assert_eq!(cached(&model), Some(PropertyValue::String("after".into())));
}

#[test]
fn reorder_undoes_with_the_inverse_permutation() {
    let (mut model, form) = empty_form();
    let a = add_button(&mut model, form);
    let b = add_button(&mut model, form);
    let c = add_button(&mut model, form);
    model.drain_events();
    let mut log = UndoLog::new();

    model.start_compound_edit();
    // Child 0 moves to slot 2, child 1 to slot 0, child 2 to slot 1.
    model.reorder_components(form, vec![2, 0, 1]).unwrap();
    log.add_edit(model.commit_compound_edit().unwrap());
    assert_eq!(model.component(form).unwrap().children(), &[b, c, a]);

    log.undo(&mut model);
    assert_eq!(model.component(form).unwrap().children(), &[a, b, c]);
    log.redo(&mut model);
    assert_eq!(model.component(form).unwrap().children(), &[b, c, a]);
}

#[test]
fn layout_exchange_restores_the_old_layout() {
    let (mut model, form) = empty_form();
    add_button(&mut model, form);
    model.drain_events();
    let mut log = UndoLog::new();

    model.start_compound_edit();
    model
        .set_container_layout(
            form,
            LayoutState::Delegate(LayoutDelegateState {
                class_name: "FlowLayout".into(),
                constraints: Vec::new(),
            }),
        )
        .unwrap();
    log.add_edit(model.commit_compound_edit().unwrap());
    assert_eq!(
        model.component(form).unwrap().layout().unwrap().class_name(),
        "FlowLayout"
    );

    log.undo(&mut model);
    assert_eq!(
        model.component(form).unwrap().layout().unwrap().class_name(),
        "AbsoluteLayout"
    );
}

#[test]
fn redo_tail_is_dropped_by_a_new_edit() {
    let (mut model, form) = empty_form();
    let button = add_button(&mut model, form);
    model.drain_events();
    let mut log = UndoLog::new();

    let mut change = |model: &mut FormModel, log: &mut UndoLog, text: &str| {
        model.start_compound_edit();
        model
            .set_property_value(button, "Text", ValueInput::Plain(text.into()))
            .unwrap();
        log.add_edit(model.commit_compound_edit().unwrap());
    };

    change(&mut model, &mut log, "one");
    change(&mut model, &mut log, "two");
    assert!(log.can_undo());
    assert!(!log.can_redo());

    log.undo(&mut model);
    assert!(log.can_redo());
    change(&mut model, &mut log, "three");
    assert!(!log.can_redo());

    log.undo(&mut model);
    let comp = model.component(button).unwrap();
    assert_eq!(
        comp.props().unwrap().get("Text").unwrap().cached_value(),
        Some(&PropertyValue::String("one".into()))
    );
}

#[test]
fn undo_of_an_empty_log_is_a_noop() {
    let (mut model, _) = empty_form();
    let mut log = UndoLog::new();
    assert!(!log.undo(&mut model));
    assert!(!log.redo(&mut model));
}
