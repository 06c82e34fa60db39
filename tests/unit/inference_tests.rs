use xml_ormz::schema_loader::{FieldSpec, KindSpec};
use xml_ormz::{
    DiagnosticKind, Document, SchemaError, SchemaInference, SchemaLoader, SchemaRegistry, TypeSpec, infer_schema,
};

use crate::common::test_helpers::*;

fn library_documents() -> Vec<Document> {
    let fixtures = TestFixtures::new();
    vec![
        Document::open(fixtures.classics_xml()).unwrap(),
        Document::open(fixtures.scifi_xml()).unwrap(),
    ]
}

fn field<'a>(spec: &'a TypeSpec, name: &str) -> &'a FieldSpec {
    spec.fields.get(name).unwrap()
}

fn kind_and_optional(field: &FieldSpec) -> (KindSpec, bool) {
    match field {
        FieldSpec::Kind(kind) => (*kind, false),
        FieldSpec::Detailed(detailed) => (detailed.kind, detailed.optional),
    }
}

#[test]
fn test_infers_library_structure() {
    let spec = infer_schema(&library_documents()).unwrap();

    assert_eq!(spec.name, "Library");
    let children: Vec<&str> = spec.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(children, vec!["Author", "Book"]);

    let book = &spec.children[1];
    assert_eq!(book.children.len(), 1);
    assert_eq!(book.children[0].name, "Note");
    assert!(book.children[0].fields.is_empty());
}

#[test]
fn test_infers_field_kinds_and_optionality() {
    let spec = infer_schema(&library_documents()).unwrap();
    let author = &spec.children[0];
    let book = &spec.children[1];

    assert_eq!(kind_and_optional(field(&spec, "name")), (KindSpec::String, false));
    assert_eq!(kind_and_optional(field(author, "born")), (KindSpec::Integer, false));
    assert_eq!(kind_and_optional(field(book, "title")), (KindSpec::String, false));
    assert_eq!(kind_and_optional(field(book, "isbn")), (KindSpec::String, true));
    // "7.99" then absent then "9"
    assert_eq!(kind_and_optional(field(book, "price")), (KindSpec::Float, true));
    assert_eq!(kind_and_optional(field(book, "author_name")), (KindSpec::String, false));
}

#[test]
fn test_inferred_schema_maps_its_samples() {
    let documents = library_documents();
    let spec = infer_schema(&documents).unwrap();
    let registry = SchemaRegistry::build(SchemaLoader::build(&spec).unwrap()).unwrap();

    for document in &documents {
        let xml = std::fs::read_to_string(document.source()).unwrap();
        let (result, reporter) = map_str(&registry, &xml);
        assert!(result.is_ok(), "{}: {:?}", document.source(), result.err());
        assert_eq!(
            reporter.count(DiagnosticKind::UndeclaredAttribute),
            0,
            "{}",
            document.source()
        );
    }
}

#[test]
fn test_inferred_schema_survives_toml() {
    let spec = infer_schema(&library_documents()).unwrap();
    let text = spec.to_toml_string().unwrap();
    assert_eq!(SchemaLoader::parse_toml("library.toml", &text).unwrap(), spec);

    let text = spec.to_json_string().unwrap();
    assert_eq!(SchemaLoader::parse_json("library.json", &text).unwrap(), spec);
}

#[test]
fn test_mismatched_roots_and_no_documents() {
    let mut documents = library_documents();
    documents.push(Document::parse_str("other.xml", ROOT_ITEMS_XML).unwrap());
    assert!(matches!(infer_schema(&documents), Err(SchemaError::Inference(_))));

    let inference = SchemaInference::new();
    assert!(!inference.documents_seen());
    assert!(matches!(inference.finish(), Err(SchemaError::Inference(_))));
}
