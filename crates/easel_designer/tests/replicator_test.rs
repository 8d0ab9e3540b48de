use easel_designer::{LayoutFactory, VisualReplicator};
use easel_model::{
    BeanRegistry, ComponentId, ConstraintGraph, DesignValue, FormModel, LayoutState, Placement,
    PropertyValue, ValueInput,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn replicator() -> VisualReplicator {
    VisualReplicator::new(LayoutFactory::standard())
}

fn form_with_children() -> (FormModel, ComponentId, ComponentId, ComponentId) {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let form = model.create_component("Form").unwrap();
    let form = model.add_component(vec![form], Placement::Top).unwrap();
    let button = model.create_component("Button").unwrap();
    let button = model
        .add_component(
            vec![button],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();
    let label = model.create_component("Label").unwrap();
    let label = model
        .add_component(
            vec![label],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();
    model.drain_events();
    (model, form, button, label)
}

#[test]
fn full_build_mirrors_the_subtree() {
    let (model, form, button, label) = form_with_children();
    let mut rep = replicator();
    let root = rep.create_clone(&model, form).unwrap();

    assert_eq!(rep.replica_count(), 3);
    assert_eq!(rep.root(), Some(form));
    for id in [form, button, label] {
        let replica = rep.replica_for(id).expect("every component has a replica");
        assert_eq!(rep.meta_for(replica.id()), Some(id));
    }
    // The window class renders as its editable substitute.
    let form_replica = rep.replica(root).unwrap();
    assert_eq!(form_replica.class_name(), "RootPanel");
    assert_eq!(rep.replica_for(button).unwrap().class_name(), "Button");
    assert_eq!(form_replica.children().len(), 2);
}

#[test]
fn added_component_appears_at_its_model_index() {
    let (mut model, form, button, label) = form_with_children();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    let check_box = model.create_component("CheckBox").unwrap();
    let check_box = model
        .add_component(
            vec![check_box],
            Placement::Child { parent: form, index: Some(1), constraints: None },
        )
        .unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    assert_eq!(rep.replica_count(), 4);
    let ordered: Vec<ComponentId> = rep
        .replica_for(form)
        .unwrap()
        .children()
        .iter()
        .map(|rid| rep.meta_for(*rid).unwrap())
        .collect();
    assert_eq!(ordered, vec![button, check_box, label]);
}

#[test]
fn removal_drops_the_replica_subtree() {
    let (mut model, form, button, _) = form_with_children();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    model.remove_component(button).unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    assert_eq!(rep.replica_count(), 2);
    assert!(rep.replica_for(button).is_none());
}

#[test]
fn grid_layout_removal_rebuilds_the_container() {
    let (mut model, form, button, label) = form_with_children();
    model
        .set_container_layout(
            form,
            LayoutState::Constraints(ConstraintGraph {
                class_name: "GridLayout".into(),
                by_child: BTreeMap::new(),
            }),
        )
        .unwrap();
    model.drain_events();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    // Grid slots cannot be removed one by one, so the container replica is
    // rebuilt from the meta-model.
    model.remove_component(button).unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    assert_eq!(rep.replica_count(), 2);
    assert!(rep.replica_for(button).is_none());
    let remaining: Vec<ComponentId> = rep
        .replica_for(form)
        .unwrap()
        .children()
        .iter()
        .map(|rid| rep.meta_for(*rid).unwrap())
        .collect();
    assert_eq!(remaining, vec![label]);
}

#[test]
fn property_changes_reach_the_replica_instance() {
    let (mut model, form, button, _) = form_with_children();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    model
        .set_property_value(button, "Text", ValueInput::Plain("Run".into()))
        .unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    assert_eq!(
        rep.replica_for(button).unwrap().instance().get("Text"),
        Some(&PropertyValue::String("Run".into()))
    );
}

#[test]
fn mnemonic_markers_are_split_for_rendering() {
    let (mut model, form, button, _) = form_with_children();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    model
        .set_property_value(button, "Text", ValueInput::Plain("&Save".into()))
        .unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    let instance = rep.replica_for(button).unwrap().instance();
    assert_eq!(instance.get("Text"), Some(&PropertyValue::String("Save".into())));
    assert_eq!(instance.get("Mnemonic"), Some(&PropertyValue::String("S".into())));
    // The design-time value keeps its marker.
    assert_eq!(
        model.component(button).unwrap().instance().get("Text"),
        Some(&PropertyValue::String("&Save".into()))
    );
}

#[test]
fn suppressed_properties_never_render() {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let form = model.create_component("Form").unwrap();
    let form = model.add_component(vec![form], Placement::Top).unwrap();
    let text_box = model.create_component("TextBox").unwrap();
    let text_box = model
        .add_component(
            vec![text_box],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();
    model.drain_events();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    model
        .set_property_value(text_box, "Focused", ValueInput::Plain(true.into()))
        .unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    assert_eq!(
        rep.replica_for(text_box).unwrap().instance().get("Focused"),
        Some(&PropertyValue::Boolean(false))
    );
}

#[test]
fn peer_bound_classes_are_recreated_on_change() {
    let (mut model, form, _, _) = form_with_children();
    let canvas = model.create_component("NativeCanvas").unwrap();
    let canvas = model
        .add_component(
            vec![canvas],
            Placement::Child { parent: form, index: None, constraints: None },
        )
        .unwrap();
    model.drain_events();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();
    let before = rep.replica_for(canvas).unwrap().id();
    let slot = rep
        .replica_for(form)
        .unwrap()
        .children()
        .iter()
        .position(|rid| rep.meta_for(*rid) == Some(canvas));

    model
        .set_property_value(canvas, "Width", ValueInput::Plain(250.into()))
        .unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    let after = rep.replica_for(canvas).unwrap().id();
    assert_ne!(before, after);
    // The rebuilt replica keeps its slot in the parent.
    let slot_after = rep
        .replica_for(form)
        .unwrap()
        .children()
        .iter()
        .position(|rid| rep.meta_for(*rid) == Some(canvas));
    assert_eq!(slot_after, slot);
    assert_eq!(rep.replica_count(), 4);
}

#[test]
fn reorder_follows_the_model_order() {
    let (mut model, form, button, label) = form_with_children();
    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();

    model.reorder_components(form, vec![1, 0]).unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);

    let ordered: Vec<ComponentId> = rep
        .replica_for(form)
        .unwrap()
        .children()
        .iter()
        .map(|rid| rep.meta_for(*rid).unwrap())
        .collect();
    assert_eq!(ordered, vec![label, button]);
}

#[test]
fn layered_panels_stack_by_layer_value() {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let panel = model.create_component("LayeredPanel").unwrap();
    let panel = model.add_component(vec![panel], Placement::Top).unwrap();
    let upper = model.create_component("Button").unwrap();
    let upper = model
        .add_component(
            vec![upper],
            Placement::Child { parent: panel, index: None, constraints: None },
        )
        .unwrap();
    let lower = model.create_component("Button").unwrap();
    let lower = model
        .add_component(
            vec![lower],
            Placement::Child { parent: panel, index: None, constraints: None },
        )
        .unwrap();
    model.set_aux_value(upper, "layer", Some(serde_json::json!(5))).unwrap();
    model.set_aux_value(lower, "layer", Some(serde_json::json!(1))).unwrap();
    model.drain_events();

    let mut rep = replicator();
    rep.create_clone(&model, panel).unwrap();
    let ordered: Vec<ComponentId> = rep
        .replica_for(panel)
        .unwrap()
        .children()
        .iter()
        .map(|rid| rep.meta_for(*rid).unwrap())
        .collect();
    assert_eq!(ordered, vec![lower, upper]);
}

#[test]
fn bindings_resolve_targets_and_clone_peers_on_demand() {
    let (mut model, form, button, label) = form_with_children();
    let label_name = model.component(label).unwrap().name().unwrap().to_string();
    model
        .set_binding_value(
            button,
            "Text",
            Some(PropertyValue::design(DesignValue::ComponentRef {
                target: label_name,
            })),
        )
        .unwrap();
    model.drain_events();

    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();
    assert_eq!(rep.binding_target(button, "Text"), Some(label));

    // Removing the source releases the relation.
    model.remove_component(button).unwrap();
    let events = model.drain_events();
    rep.apply_events(&mut model, &events);
    assert_eq!(rep.binding_target(button, "Text"), None);
}

#[test]
fn binding_to_an_out_of_tree_peer_clones_it() {
    let (mut model, form, button, _) = form_with_children();
    let timer = model.create_component("Timer").unwrap();
    let timer = model.add_component(vec![timer], Placement::Free).unwrap();
    let timer_name = model.component(timer).unwrap().name().unwrap().to_string();
    model
        .set_binding_value(
            button,
            "Text",
            Some(PropertyValue::design(DesignValue::ComponentRef { target: timer_name })),
        )
        .unwrap();
    model.drain_events();

    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();
    // Three in the subtree plus the peer cloned on demand.
    assert_eq!(rep.replica_count(), 4);
    assert_eq!(rep.binding_target(button, "Text"), Some(timer));
    assert!(rep.replica_for(timer).is_some());
}

#[test]
fn menu_bar_is_replicated_as_a_child() {
    let (mut model, form, _, _) = form_with_children();
    let strip = model.create_component("MenuStrip").unwrap();
    let strip = model
        .add_component(vec![strip], Placement::MenuBar { container: form })
        .unwrap();
    model.drain_events();

    let mut rep = replicator();
    rep.create_clone(&model, form).unwrap();
    assert_eq!(rep.replica_count(), 4);
    let form_children = rep.replica_for(form).unwrap().children();
    let last = form_children.last().copied().unwrap();
    assert_eq!(rep.meta_for(last), Some(strip));
}
