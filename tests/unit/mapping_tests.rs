use std::rc::Rc;

use xml_ormz::{
    Cardinality, DiagnosticKind, FieldDescriptor, MappingError, SchemaRegistry, SchemaType,
    ValidationError, Value,
};

use crate::common::test_helpers::*;

fn items_registry() -> Rc<SchemaRegistry> {
    SchemaRegistry::build(
        SchemaType::new("Root").child(
            SchemaType::new("Item")
                .field("value", FieldDescriptor::integer())
                .count(Cardinality::exact(2)),
        ),
    )
    .unwrap()
}

#[test]
fn test_exact_cardinality_maps_in_document_order() {
    let (result, reporter) = map_str(&items_registry(), ROOT_ITEMS_XML);
    let forest = result.unwrap();

    let root = forest.root().unwrap();
    let values: Vec<Option<Value>> = root
        .children_of_type("Item")
        .iter()
        .map(|item| item.get("value"))
        .collect();
    assert_eq!(values, vec![Some(Value::Integer(1)), Some(Value::Integer(2))]);
    assert_eq!(forest.len(), 3);
    assert_eq!(reporter.warnings(), 0);
}

#[test]
fn test_cardinality_off_by_one_names_counts() {
    for (xml, observed) in [(ONE_ITEM_XML, 1), (THREE_ITEMS_XML, 3)] {
        let (result, _) = map_str(&items_registry(), xml);
        match result {
            Err(MappingError::Validation(ValidationError::Cardinality {
                path,
                observed: count,
                expected,
                ..
            })) => {
                assert_eq!(path, "Root.Item");
                assert_eq!(count, observed);
                assert_eq!(expected, Cardinality::exact(2));
            }
            other => panic!("Expected cardinality error, got {:?}", other.map(|f| f.len())),
        }
    }
}

#[test]
fn test_type_mismatch_names_field() {
    let (result, _) = map_str(&items_registry(), BAD_VALUE_XML);
    let Err(MappingError::Validation(err)) = result else {
        panic!("Expected a validation error");
    };
    match err.root_cause() {
        ValidationError::TypeMismatch { field, value, .. } => {
            assert_eq!(field, "value");
            assert_eq!(value, "abc");
        }
        other => panic!("Expected type mismatch, got {}", other),
    }
    assert!(err.to_string().contains("test.xml, line 1"));
}

#[test]
fn test_integer_outside_i64_is_a_type_mismatch() {
    let xml = r#"<Root><Item value="1"/><Item value="99999999999999999999"/></Root>"#;
    let (result, _) = map_str(&items_registry(), xml);
    let Err(MappingError::Validation(err)) = result else {
        panic!("Expected a validation error");
    };
    match err.root_cause() {
        ValidationError::TypeMismatch { field, value, .. } => {
            assert_eq!(field, "value");
            assert_eq!(value, "99999999999999999999");
        }
        other => panic!("Expected type mismatch, got {}", other),
    }
}

#[test]
fn test_optional_field_tolerance() {
    let registry = library_registry();
    let (result, reporter) = map_str(
        &registry,
        r#"<Library name="Small"><Book title="Emma"/></Library>"#,
    );
    let forest = result.unwrap();

    let book = &forest.of_type("Book")[0];
    assert_eq!(book.get("price"), None);
    assert_eq!(book.get("author"), None);
    assert!(!book.has("isbn"));
    // Author and Note are declared but absent
    assert_eq!(reporter.count(DiagnosticKind::UnmappedSchemaType), 1);
}

#[test]
fn test_undeclared_element_rejected() {
    let (result, _) = map_str(
        &library_registry(),
        r#"<Library name="X"><Book title="A"/><Magazine/></Library>"#,
    );
    match result {
        Err(MappingError::Validation(ValidationError::UndeclaredElement { paths, .. })) => {
            assert_eq!(paths, vec!["Library.Magazine".to_string()]);
        }
        other => panic!("Expected undeclared element, got {:?}", other.map(|f| f.len())),
    }
}

#[test]
fn test_pattern_and_range_validators() {
    let registry = library_registry();

    let (bad_isbn, _) = map_str(
        &registry,
        r#"<Library name="X"><Book title="A" isbn="12-34"/></Library>"#,
    );
    assert!(matches!(
        bad_isbn.unwrap_err(),
        MappingError::Validation(err) if matches!(err.root_cause(), ValidationError::ConstraintViolation { field, .. } if field == "isbn")
    ));

    let (negative, _) = map_str(
        &registry,
        r#"<Library name="X"><Book title="A" price="-1"/></Library>"#,
    );
    assert!(negative.is_err());
}

#[test]
fn test_reference_attribute_in_document_is_ignored() {
    let (result, reporter) = map_str(
        &library_registry(),
        r#"<Library name="X"><Book title="A" author="Someone"/></Library>"#,
    );
    let forest = result.unwrap();
    assert_eq!(forest.of_type("Book")[0].get("author"), None);
    assert_eq!(reporter.count(DiagnosticKind::ReferenceAttribute), 1);
}

#[test]
fn test_nested_children_and_text() {
    let (result, _) = map_str(
        &library_registry(),
        r#"<Library name="X">
            <Book title="A"><Note> signed </Note><Note>worn</Note></Book>
        </Library>"#,
    );
    let forest = result.unwrap();
    let notes = forest.root().unwrap().find_children("Note", true);
    let texts: Vec<Option<String>> = notes.iter().map(|n| n.text()).collect();
    assert_eq!(
        texts,
        vec![Some("signed".to_string()), Some("worn".to_string())]
    );
    assert!(forest.contains("/Library/Book/Note[2]"));
}

#[test]
fn test_mixed_content_keeps_leading_text() {
    let xml = r#"<Library name="X"><Book title="A">bound in leather <Note>x</Note> rebound</Book></Library>"#;
    let (result, _) = map_str(&library_registry(), xml);
    let forest = result.unwrap();

    let book = forest.get("/Library/Book").unwrap();
    assert_eq!(book.text(), Some("bound in leather".to_string()));
    let dumped = xml_ormz::to_xml_string(forest.root().unwrap()).unwrap();
    assert!(!dumped.contains("rebound"));
}

#[test]
fn test_note_upper_bound() {
    let (result, _) = map_str(
        &library_registry(),
        r#"<Library name="X"><Book title="A"><Note/><Note/><Note/></Book></Library>"#,
    );
    assert!(matches!(
        result,
        Err(MappingError::Validation(ValidationError::Cardinality { observed: 3, .. }))
    ));
}
