use std::error::Error;

use xml_ormz::{
    Document, DocumentError, ErrorReporter, MappingError, SchemaError, SchemaRegistry,
    SchemaType, ValidationError, VerbosityLevel,
};

use crate::common::test_helpers::*;

#[tokio::test]
async fn test_malformed_document_names_its_file() {
    let path = TestFixtures::new().malformed_xml();
    let error = Document::load(&path).await.unwrap_err();

    match &error {
        DocumentError::Malformed { file, .. } => assert!(file.ends_with("unclosed.xml")),
        other => panic!("expected a malformed document, got {:?}", other),
    }
    assert!(error.to_string().starts_with("XML parsing error:"));
}

#[tokio::test]
async fn test_missing_document_is_io_error() {
    let error = Document::load("/nonexistent/library.xml").await.unwrap_err();
    assert!(matches!(error, DocumentError::Io(_)));

    let mapped: MappingError = error.into();
    assert!(matches!(mapped, MappingError::Document(DocumentError::Io(_))));
}

#[test]
fn test_empty_document_has_no_root() {
    let error = Document::parse_str("empty.xml", "<?xml version=\"1.0\"?>").unwrap_err();
    assert!(matches!(error, DocumentError::NoRoot { file } if file == "empty.xml"));
}

#[test]
fn test_validation_error_keeps_location_in_chain() {
    let registry = library_registry();
    let (result, _) = map_str(
        &registry,
        r#"<Library name="L"><Book title="T" price="cheap"/></Library>"#,
    );

    let error = result.unwrap_err();
    let MappingError::Validation(validation) = &error else {
        panic!("expected a validation error, got {:?}", error);
    };
    assert!(matches!(
        validation.root_cause(),
        ValidationError::TypeMismatch { field, .. } if field == "price"
    ));
    assert!(error.to_string().starts_with("test.xml, line 1:"));
    assert!(error.source().is_some());
}

#[test]
fn test_schema_errors_surface_through_mapping_error() {
    fn build() -> Result<(), MappingError> {
        SchemaRegistry::build(SchemaType::new("Root").child(SchemaType::new("bad name")))?;
        Ok(())
    }

    let error = build().unwrap_err();
    assert!(matches!(
        error,
        MappingError::Schema(SchemaError::InvalidName { ref name, .. }) if name == "bad name"
    ));

    let brief = ErrorReporter::new(VerbosityLevel::Quiet).format_error(&error);
    assert!(brief.starts_with("SCHEMA: "));
}
