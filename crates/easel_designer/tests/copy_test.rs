use easel_designer::{ComponentCreator, LogReporter};
use easel_model::{
    BeanRegistry, ComponentId, ConstraintGraph, FormModel, LayoutConstraints, LayoutState,
    Placement, PropertyValue, ValueConvertor, ValueInput,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn creator() -> ComponentCreator {
    ComponentCreator::new(Box::new(LogReporter))
}

/// Form > Panel > (Button, Label), with a changed text and a Click handler
/// on the button.
fn panel_fixture() -> (FormModel, ComponentId, ComponentId, ComponentId) {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let form = model.create_component("Form").unwrap();
    let form = model.add_component(vec![form], Placement::Top).unwrap();
    let panel = model.create_component("Panel").unwrap();
    let panel = model
        .add_component(
            vec![panel],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();
    let button = model.create_component("Button").unwrap();
    let button = model
        .add_component(
            vec![button],
            Placement::Child { parent: panel, index: None, constraints: None },
        )
        .unwrap();
    let label = model.create_component("Label").unwrap();
    model
        .add_component(
            vec![label],
            Placement::Child { parent: panel, index: None, constraints: None },
        )
        .unwrap();
    model
        .set_property_value(button, "Text", ValueInput::Plain("Go".into()))
        .unwrap();
    model.add_event_handler(button, "Click", None).unwrap();
    model.drain_events();
    (model, form, panel, button)
}

#[test]
fn copy_duplicates_the_subtree_with_fresh_ids() {
    let (mut model, form, panel, _) = panel_fixture();
    let originals = model.collect_subtree_ids(panel);

    let copy = creator()
        .copy_component(&mut model, panel, Some(form))
        .unwrap();
    assert_ne!(copy, panel);
    let copied = model.collect_subtree_ids(copy);
    assert_eq!(copied.len(), originals.len());
    for id in &copied {
        assert!(!originals.contains(id), "copy shares an id with the source");
    }

    // Same classes in the same relative order.
    let classes = |ids: &[ComponentId], model: &FormModel| -> Vec<String> {
        ids.iter()
            .map(|id| model.component(*id).unwrap().bean_class().to_string())
            .collect()
    };
    assert_eq!(classes(&copied, &model), classes(&originals, &model));
    // Both panels are children of the form.
    assert_eq!(model.component(form).unwrap().children(), &[panel, copy][..]);
}

#[test]
fn copy_preserves_changed_values_and_regenerates_names() {
    let (mut model, form, panel, button) = panel_fixture();
    let copy = creator()
        .copy_component(&mut model, panel, Some(form))
        .unwrap();
    let copied_button = model.component(copy).unwrap().children()[0];
    assert_ne!(copied_button, button);
    assert_eq!(
        model
            .component(copied_button)
            .unwrap()
            .props()
            .unwrap()
            .get("Text")
            .unwrap()
            .cached_value(),
        Some(&PropertyValue::String("Go".into()))
    );
    // The taken name hints into a suffixed fresh one.
    assert_eq!(model.component(copied_button).unwrap().name(), Some("btn11"));
    assert_eq!(model.component(button).unwrap().name(), Some("btn1"));
}

#[test]
fn copied_handlers_are_remapped_to_the_new_name() {
    let (mut model, form, panel, button) = panel_fixture();
    let copy = creator()
        .copy_component(&mut model, panel, Some(form))
        .unwrap();
    let copied_button = model.component(copy).unwrap().children()[0];

    assert!(model.events().is_handler("btn11_Click"));
    assert_eq!(
        model.events().attachments("btn11_Click"),
        &[(copied_button, "Click".to_string())]
    );
    // The source attachment is untouched.
    assert_eq!(
        model.events().attachments("btn1_Click"),
        &[(button, "Click".to_string())]
    );
}

#[test]
fn cross_model_copy_resolves_localized_values() {
    let (mut source, _, panel, button) = panel_fixture();
    source
        .component_mut(button)
        .unwrap()
        .props_mut()
        .unwrap()
        .get_mut("Text")
        .unwrap()
        .add_convertor(ValueConvertor::AutoLocalize { key_prefix: "Form1.btn1".into() });
    source
        .set_property_value(button, "Text", ValueInput::Plain("Save".into()))
        .unwrap();

    let registry = Arc::new(BeanRegistry::standard());
    let mut dest = FormModel::new("Form2", registry);
    let form = dest.create_component("Form").unwrap();
    let form = dest.add_component(vec![form], Placement::Top).unwrap();

    let copy = creator()
        .copy_from(&mut dest, &source, panel, Some(form))
        .unwrap();
    let copied_button = dest.component(copy).unwrap().children()[0];
    // The destination has no matching resource entry, so the indirection
    // was flattened to the cached plain value.
    assert_eq!(
        dest.component(copied_button)
            .unwrap()
            .props()
            .unwrap()
            .get("Text")
            .unwrap()
            .cached_value(),
        Some(&PropertyValue::String("Save".into()))
    );
    // Fresh names in the fresh model need no suffixes.
    assert_eq!(dest.component(copied_button).unwrap().name(), Some("btn1"));
    assert!(dest.events().is_handler("btn1_Click"));
}

#[test]
fn copy_of_an_unknown_component_is_refused() {
    let (mut model, form, _, _) = panel_fixture();
    let before = model.component_count();
    assert_eq!(
        creator().copy_component(&mut model, ComponentId::new(), Some(form)),
        None
    );
    assert_eq!(model.component_count(), before);
}

#[test]
fn grid_constraints_are_remapped_in_a_copy() {
    let (mut model, form, panel, button) = panel_fixture();
    let mut by_child = BTreeMap::new();
    by_child.insert(
        button,
        LayoutConstraints::Grid { row: 1, col: 2, row_span: 1, col_span: 1 },
    );
    model
        .set_container_layout(
            panel,
            LayoutState::Constraints(ConstraintGraph {
                class_name: "GridLayout".into(),
                by_child,
            }),
        )
        .unwrap();

    let copy = creator()
        .copy_component(&mut model, panel, Some(form))
        .unwrap();
    let copied_button = model.component(copy).unwrap().children()[0];

    let Some(LayoutState::Constraints(graph)) = model.component(copy).unwrap().layout() else {
        panic!("copied panel lost its constraint graph");
    };
    assert_eq!(graph.class_name, "GridLayout");
    // The graph is keyed by the fresh child id, not the source's.
    assert_eq!(
        graph.by_child.get(&copied_button),
        Some(&LayoutConstraints::Grid { row: 1, col: 2, row_span: 1, col_span: 1 })
    );
    assert!(!graph.by_child.contains_key(&button));
}
