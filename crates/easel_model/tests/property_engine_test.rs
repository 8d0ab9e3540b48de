use easel_model::{
    BeanRegistry, DesignValue, FormModel, FormVersion, Placement, PropertyValue, ValueConvertor,
    ValueInput,
};
use std::sync::Arc;

fn model_with_button() -> (FormModel, easel_model::ComponentId) {
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
    (model, button_id)
}

#[test]
fn set_and_read_back() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Text", ValueInput::Plain("Hello".into()))
        .unwrap();

    let registry = Arc::clone(model.registry());
    let value = model
        .component_mut(button)
        .unwrap()
        .get_property_value(&registry, "Text");
    assert_eq!(value, Some(PropertyValue::String("Hello".into())));

    // The value was pushed through to the design instance.
    let comp = model.component(button).unwrap();
    assert_eq!(
        comp.instance().get("Text"),
        Some(&PropertyValue::String("Hello".into()))
    );
    assert!(comp.props().unwrap().get("Text").unwrap().is_changed());
}

#[test]
fn same_value_twice_is_a_noop() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Text", ValueInput::Plain("Hello".into()))
        .unwrap();
    model.drain_events();

    model
        .set_property_value(button, "Text", ValueInput::Plain("Hello".into()))
        .unwrap();
    assert!(model.drain_events().is_empty());
    assert!(model
        .component(button)
        .unwrap()
        .props()
        .unwrap()
        .get("Text")
        .unwrap()
        .is_changed());
}

#[test]
fn setting_the_default_back_does_not_mark_changed() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Width", ValueInput::Plain(200.into()))
        .unwrap();
    assert!(model
        .component(button)
        .unwrap()
        .props()
        .unwrap()
        .get("Width")
        .unwrap()
        .is_changed());

    // Back to the declared default of 100.
    model
        .set_property_value(button, "Width", ValueInput::Plain(100.into()))
        .unwrap();
    assert!(!model
        .component(button)
        .unwrap()
        .props()
        .unwrap()
        .get("Width")
        .unwrap()
        .is_changed());
}

#[test]
fn defaulting_sentinel_without_default_is_ignored() {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let label = model.create_component("Label").unwrap();
    let id = model.add_component(vec![label], Placement::Free).unwrap();
    model.drain_events();

    // AccessibleName has no declared default.
    model
        .set_property_value(id, "AccessibleName", ValueInput::Default)
        .unwrap();
    assert!(model.drain_events().is_empty());
}

#[test]
fn convertor_wraps_strings_and_raises_format_version() {
    let (mut model, button) = model_with_button();
    assert_eq!(model.version(), FormVersion::V1);

    model
        .component_mut(button)
        .unwrap()
        .props_mut()
        .unwrap()
        .get_mut("Text")
        .unwrap()
        .add_convertor(ValueConvertor::AutoLocalize { key_prefix: "Form1.btn1".into() });

    model
        .set_property_value(button, "Text", ValueInput::Plain("Hello".into()))
        .unwrap();
    assert_eq!(model.version(), FormVersion::V2);

    let comp = model.component(button).unwrap();
    let cached = comp.props().unwrap().get("Text").unwrap().cached_value().unwrap();
    match cached {
        PropertyValue::Design(design) => match design.as_ref() {
            DesignValue::Localized { key, cached } => {
                assert_eq!(key, "Form1.btn1.Text");
                assert_eq!(**cached, PropertyValue::String("Hello".into()));
            }
            other => panic!("unexpected design value {:?}", other),
        },
        other => panic!("value was not wrapped: {:?}", other),
    }
    // The target saw only the unwrapped plain string.
    assert_eq!(
        comp.instance().get("Text"),
        Some(&PropertyValue::String("Hello".into()))
    );
}

#[test]
fn ignored_design_value_pushes_the_default() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Width", ValueInput::Plain(333.into()))
        .unwrap();
    model
        .set_property_value(
            button,
            "Width",
            ValueInput::Plain(PropertyValue::design(DesignValue::Ignored)),
        )
        .unwrap();
    let comp = model.component(button).unwrap();
    assert_eq!(comp.instance().get("Width"), Some(&PropertyValue::Integer(100)));
    assert_eq!(
        comp.props().unwrap().get("Width").unwrap().cached_value(),
        Some(&PropertyValue::design(DesignValue::Ignored))
    );
}

#[test]
fn veto_rolls_back_value_and_target() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Text", ValueInput::Plain("ok".into()))
        .unwrap();
    model.drain_events();

    model.set_veto_hook(Some(Box::new(|change| {
        change.new_value.as_string() != Some("forbidden")
    })));
    model
        .set_property_value(button, "Text", ValueInput::Plain("forbidden".into()))
        .unwrap();

    assert!(model.drain_events().is_empty());
    let comp = model.component(button).unwrap();
    assert_eq!(comp.instance().get("Text"), Some(&PropertyValue::String("ok".into())));
    assert_eq!(
        comp.props().unwrap().get("Text").unwrap().cached_value(),
        Some(&PropertyValue::String("ok".into()))
    );
}

#[test]
fn restore_default_clears_the_cache() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Text", ValueInput::Plain("Hello".into()))
        .unwrap();
    model.drain_events();

    model.restore_property_default(button, "Text").unwrap();
    let comp = model.component(button).unwrap();
    let prop = comp.props().unwrap().get("Text").unwrap();
    assert!(!prop.is_value_set());
    assert!(!prop.is_changed());
    assert_eq!(comp.instance().get("Text"), Some(&PropertyValue::String("".into())));

    let events = model.drain_events();
    assert_eq!(events.len(), 1);
}

#[test]
fn write_protected_property_is_cached_only() {
    let registry = Arc::new(BeanRegistry::standard());
    let mut model = FormModel::new("Form1", registry);
    let text_box = model.create_component("TextBox").unwrap();
    let id = model.add_component(vec![text_box], Placement::Free).unwrap();
    model.drain_events();

    model
        .set_property_value(id, "Focused", ValueInput::Plain(true.into()))
        .unwrap();
    let comp = model.component(id).unwrap();
    let prop = comp.props().unwrap().get("Focused").unwrap();
    assert_eq!(prop.cached_value(), Some(&PropertyValue::Boolean(true)));
    assert!(!prop.is_changed());
    // The design instance never saw the write.
    assert_eq!(comp.instance().get("Focused"), Some(&PropertyValue::Boolean(false)));
}

#[test]
fn editor_override_fires_one_combined_change() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(
            button,
            "Text",
            ValueInput::WithEditor("Hello".into(), "StringEditor".into()),
        )
        .unwrap();
    assert_eq!(model.drain_events().len(), 1);
    let comp = model.component(button).unwrap();
    assert_eq!(comp.props().unwrap().get("Text").unwrap().editor(), Some("StringEditor"));
}

#[test]
fn external_reversion_demotes_a_monitored_property() {
    let (mut model, button) = model_with_button();
    model
        .set_property_value(button, "Text", ValueInput::Plain("on".into()))
        .unwrap();

    let registry = Arc::clone(model.registry());
    let comp = model.component_mut(button).unwrap();
    comp.props_mut()
        .unwrap()
        .get_mut("Text")
        .unwrap()
        .set_monitoring(true);
    // A side-effecting peer reset the target behind the engine's back.
    comp.set_instance(registry.create_instance("Button").unwrap());

    // The read sees the target back at its default and drops the stale cache.
    assert_eq!(
        comp.get_property_value(&registry, "Text"),
        Some(PropertyValue::String(String::new()))
    );
    let prop = comp.props().unwrap().get("Text").unwrap();
    assert!(!prop.is_changed());
    assert!(prop.cached_value().is_none());
}
