use indexmap::IndexMap;
use std::rc::Rc;

use xml_ormz::{
    Attributes, Cardinality, FieldDescriptor, Instance, ModelType, RecordingReporter,
    SchemaRegistry, SchemaType, StructuralError, ValidationError, Value,
};

fn registry() -> Rc<SchemaRegistry> {
    SchemaRegistry::build(
        SchemaType::new("Root")
            .child(
                SchemaType::new("Item")
                    .field("value", FieldDescriptor::integer())
                    .field("label", FieldDescriptor::string().optional().with_default("none"))
                    .count(Cardinality::range(0, 2)),
            )
            .child(SchemaType::new("Other")),
    )
    .unwrap()
}

fn model_type(registry: &Rc<SchemaRegistry>, path: &str) -> ModelType {
    registry.model_type(path).unwrap()
}

fn item(registry: &Rc<SchemaRegistry>, value: i64) -> Instance {
    let mut values = Attributes::new();
    values.insert("value".to_string(), Some(Value::Integer(value)));
    Instance::new(
        &model_type(registry, "Root.Item"),
        values,
        &RecordingReporter::new(),
    )
    .unwrap()
}

fn root(registry: &Rc<SchemaRegistry>) -> Instance {
    Instance::new(
        &model_type(registry, "Root"),
        IndexMap::new(),
        &RecordingReporter::new(),
    )
    .unwrap()
}

#[test]
fn test_detachment_is_idempotent() {
    let registry = registry();
    let root = root(&registry);
    let child = item(&registry, 1);

    root.append_child(&child).unwrap();
    assert!(child.parent().unwrap().ptr_eq(&root));

    child.remove_from_parent().unwrap();
    child.remove_from_parent().unwrap();
    assert!(child.parent().is_none());
    assert_eq!(root.child_count(), 0);
}

#[test]
fn test_reparenting_moves_the_child() {
    let registry = registry();
    let first = root(&registry);
    let second = root(&registry);
    let child = item(&registry, 1);

    child.set_parent(&first).unwrap();
    child.set_parent(&second).unwrap();

    assert_eq!(first.child_count(), 0);
    assert_eq!(second.children_of_type("Item").len(), 1);
}

#[test]
fn test_capacity_is_enforced_on_attach() {
    let registry = registry();
    let root = root(&registry);
    root.append_child(&item(&registry, 1)).unwrap();
    root.append_child(&item(&registry, 2)).unwrap();

    match root.append_child(&item(&registry, 3)) {
        Err(StructuralError::Capacity {
            count, expected, ..
        }) => {
            assert_eq!(count, 3);
            assert_eq!(expected, Cardinality::range(0, 2));
        }
        other => panic!("Expected capacity error, got {:?}", other),
    }
}

#[test]
fn test_structural_errors() {
    let registry = registry();
    let root_a = root(&registry);
    let root_b = root(&registry);
    let child = item(&registry, 1);

    assert!(matches!(
        root_a.remove_from_parent(),
        Err(StructuralError::RootType { .. })
    ));
    assert!(matches!(
        child.append_child(&root_a),
        Err(StructuralError::NotAChildType { .. })
    ));

    root_a.append_child(&child).unwrap();
    assert!(matches!(
        root_b.remove_child(&child),
        Err(StructuralError::NotParent { .. })
    ));
}

#[test]
fn test_construction_requires_declared_fields() {
    let registry = registry();
    let result = Instance::new(
        &model_type(&registry, "Root.Item"),
        Attributes::new(),
        &RecordingReporter::new(),
    );
    assert!(matches!(
        result,
        Err(ValidationError::MissingAttribute { field, .. }) if field == "value"
    ));
}

#[test]
fn test_set_is_type_checked() {
    let registry = registry();
    let child = item(&registry, 1);

    child.set("value", Some(Value::Integer(5))).unwrap();
    assert_eq!(child.get("value"), Some(Value::Integer(5)));

    assert!(matches!(
        child.set("value", Some(Value::from("five"))),
        Err(ValidationError::TypeMismatch { .. })
    ));
    assert!(matches!(
        child.set("value", None),
        Err(ValidationError::MissingAttribute { .. })
    ));
    assert!(matches!(
        child.set("colour", Some(Value::from("red"))),
        Err(ValidationError::UnknownField { .. })
    ));
}

#[test]
fn test_default_applied_on_read() {
    let registry = registry();
    let child = item(&registry, 1);

    assert_eq!(child.get("label"), None);
    assert_eq!(child.get_or_default("label"), Some(Value::from("none")));
    assert_eq!(child.get("label"), Some(Value::from("none")));
}

#[test]
fn test_display_lists_values() {
    let registry = registry();
    let child = item(&registry, 7);
    assert_eq!(format!("{:?}", child), "<class Root.Item>");
    assert!(child.to_string().contains("value: 7"));
}
