use std::rc::Rc;

use xml_ormz::schema_loader::CountSpec;
use xml_ormz::{Cardinality, FieldKind, SchemaError, SchemaLoader, SchemaRegistry, TypeSpec};

use crate::common::test_helpers::*;

async fn load(path: &std::path::Path) -> Rc<SchemaRegistry> {
    SchemaRegistry::build(SchemaLoader::load(path).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_toml_and_json_fixtures_declare_the_same_types() {
    let fixtures = TestFixtures::new();
    let toml = load(&fixtures.library_schema()).await;
    let json = load(&fixtures.library_schema_json()).await;

    let toml_paths: Vec<&str> = toml.paths().collect();
    let json_paths: Vec<&str> = json.paths().collect();
    assert_eq!(
        toml_paths,
        vec!["Library", "Library.Author", "Library.Book", "Library.Book.Note"]
    );
    assert_eq!(toml_paths, json_paths);

    for path in toml_paths {
        let (a, b) = (toml.get(path).unwrap(), json.get(path).unwrap());
        assert_eq!(a.cardinality(), b.cardinality(), "{}", path);
        let a_fields: Vec<(&String, FieldKind)> =
            a.fields().iter().map(|(n, d)| (n, d.kind())).collect();
        let b_fields: Vec<(&String, FieldKind)> =
            b.fields().iter().map(|(n, d)| (n, d.kind())).collect();
        assert_eq!(a_fields, b_fields, "{}", path);
    }
}

#[tokio::test]
async fn test_loaded_schema_carries_constraints() {
    let registry = load(&TestFixtures::new().library_schema()).await;

    let book = registry.get("Library.Book").unwrap();
    assert_eq!(book.cardinality(), Cardinality::at_least(1));
    assert!(book.field("isbn").unwrap().validator().is_some());
    assert!(book.field("author").unwrap().resolver().is_some());
    assert_eq!(
        registry.get("Library.Book.Note").unwrap().cardinality(),
        Cardinality::range(0, 2)
    );

    let author = registry.get("Library.Author").unwrap();
    assert!(author.field("born").unwrap().is_optional());
    assert!(!author.field("name").unwrap().is_optional());
}

#[tokio::test]
async fn test_loaded_schema_maps_fixture() {
    let fixtures = TestFixtures::new();
    let registry = load(&fixtures.library_schema()).await;
    let xml = std::fs::read_to_string(fixtures.classics_xml()).unwrap();

    let (result, reporter) = map_str(&registry, &xml);
    let forest = result.unwrap();
    assert_eq!(forest.of_type("Book").len(), 2);
    assert_eq!(forest.of_type("Note").len(), 1);
    assert_eq!(reporter.warnings(), 0);
}

#[tokio::test]
async fn test_missing_schema_file() {
    let result = SchemaLoader::load(std::path::Path::new("/nonexistent/library.toml")).await;
    match result {
        Err(SchemaError::File { details, .. }) => assert_eq!(details, "schema file not found"),
        other => panic!("expected a file error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_unsupported_schema_extension() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("library.yaml");
    tokio::fs::write(&path, "name: Library").await.unwrap();

    let result = SchemaLoader::load(&path).await;
    assert!(matches!(
        result,
        Err(SchemaError::File { details, .. }) if details.contains("yaml")
    ));
}

#[test]
fn test_malformed_toml_names_the_file() {
    let result = SchemaLoader::parse_toml("broken.toml", "name = ");
    assert!(matches!(
        result,
        Err(SchemaError::File { file, .. }) if file == "broken.toml"
    ));
}

#[test]
fn test_invalid_counts_rejected_when_registered() {
    for count in [
        CountSpec::Exact(0),
        CountSpec::Pair([3, 1]),
        CountSpec::Pair([2, 2]),
    ] {
        let mut spec = TypeSpec::new("Root");
        spec.children.push(TypeSpec {
            count: Some(count.clone()),
            ..TypeSpec::new("Item")
        });

        let declared = SchemaLoader::build(&spec).unwrap();
        let result = SchemaRegistry::build(declared);
        assert!(
            matches!(result, Err(SchemaError::InvalidCardinality { ref path, .. }) if path == "Root.Item"),
            "{:?} should be rejected",
            count
        );
    }
}

#[test]
fn test_lookup_on_scalar_field_rejected() {
    let content = r#"
name = "Root"

[fields]
owner = { kind = "string", lookup = { key = "a", target = "B", field = "c" } }
"#;
    assert!(matches!(
        SchemaLoader::from_toml_str(content),
        Err(SchemaError::InvalidField { field, .. }) if field == "owner"
    ));
}

#[test]
fn test_primary_key_flag_is_loaded() {
    let content = r#"
name = "Root"

[fields]
id = { kind = "integer", primary_key = true }
name = "string"
"#;
    let root = SchemaLoader::from_toml_str(content).unwrap();
    let registry = SchemaRegistry::build(root).unwrap();
    assert!(registry.root().field("id").unwrap().is_primary_key());
    assert!(!registry.root().field("name").unwrap().is_primary_key());

    let optional_key = r#"
name = "Root"
fields = { id = { kind = "integer", optional = true, primary_key = true } }
"#;
    let root = SchemaLoader::from_toml_str(optional_key).unwrap();
    assert!(matches!(
        SchemaRegistry::build(root),
        Err(SchemaError::InvalidField { field, .. }) if field == "id"
    ));
}
