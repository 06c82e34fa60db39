use std::rc::Rc;

use xml_ormz::{
    Config, ConfigManager, Document, EngineConfig, FileDiscovery, MappingEngine, Output,
    OutputFormat, RecordingReporter, SchemaLoader, SchemaRegistry, Value, VerbosityLevel,
    XmlNode, to_element,
};

use crate::common::test_helpers::*;

async fn engine(link: bool) -> MappingEngine {
    let root = SchemaLoader::load(&TestFixtures::new().library_schema())
        .await
        .unwrap();
    MappingEngine::new(
        SchemaRegistry::build(root).unwrap(),
        Rc::new(RecordingReporter::new()),
        EngineConfig {
            link,
            ..EngineConfig::default()
        },
    )
}

#[tokio::test]
async fn test_map_and_link_library_directory() {
    let dir = create_library_dir().await.unwrap();

    let session = engine(true)
        .await
        .map_path(dir.path(), &FileDiscovery::new())
        .await
        .unwrap();
    let results = &session.results;

    // readme.txt is skipped
    assert_eq!(results.total_files, 4);
    assert_eq!(results.mapped_files, 2);
    assert_eq!(results.invalid_files, 2);
    assert_eq!(results.error_files, 0);
    assert!(results.has_errors());

    let failed: Vec<String> = results
        .file_results
        .iter()
        .filter(|r| !r.status.is_mapped())
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, vec!["bad_price.xml", "no_books.xml"]);

    // only mapped documents take part in linking
    assert_eq!(session.forests.len(), 2);
    let link = results.link.as_ref().unwrap();
    assert!(link.succeeded());
    let report = link.report.unwrap();
    assert_eq!(report.assigned, 3);
    assert_eq!(report.unresolved, 0);
}

#[tokio::test]
async fn test_references_cross_documents() {
    let fixtures = TestFixtures::new();
    let session = engine(true)
        .await
        .map_files(vec![fixtures.classics_xml(), fixtures.scifi_xml()])
        .await
        .unwrap();

    let classics = &session.forests[0];
    let dune = classics
        .of_type("Book")
        .into_iter()
        .find(|book| book.get("title") == Some(Value::from("Dune")))
        .unwrap();
    let author = dune.get("author").unwrap();
    let author = author.as_reference().unwrap();

    // Frank Herbert is declared only in the second document
    assert_eq!(author.get("name"), Some(Value::from("Frank Herbert")));
    assert_eq!(author.get("born"), Some(Value::Integer(1920)));
    assert!(session.forests[1].root().unwrap().children().contains(author));
}

#[tokio::test]
async fn test_unlinked_session_leaves_references_empty() {
    let fixtures = TestFixtures::new();
    let session = engine(false)
        .await
        .map_files(vec![fixtures.classics_xml()])
        .await
        .unwrap();

    assert!(session.results.link.is_none());
    for book in session.forests[0].of_type("Book") {
        assert_eq!(book.get("author"), None);
    }
}

#[tokio::test]
async fn test_serialized_forest_matches_source() {
    let fixtures = TestFixtures::new();
    for path in [fixtures.classics_xml(), fixtures.scifi_xml()] {
        let session = engine(false)
            .await
            .map_files(vec![path.clone()])
            .await
            .unwrap();
        let root = session.forests[0].root().unwrap();

        let source = XmlNode::from_document(&Document::open(&path).unwrap());
        assert_eq!(
            to_element(root).normalized(),
            source.normalized(),
            "{}",
            path.display()
        );

        let reparsed = Document::parse_str("again.xml", &xml_ormz::to_xml_string(root).unwrap())
            .unwrap();
        assert_eq!(
            XmlNode::from_document(&reparsed).normalized(),
            source.normalized()
        );
    }
}

#[tokio::test]
async fn test_undeclared_attributes_are_dropped_on_write() {
    let registry = library_registry();
    let (result, _) = map_str(
        &registry,
        r#"<Library name="L" shelf="3"><Book title="T" color="red"/></Library>"#,
    );
    let forest = result.unwrap();
    let root = forest.root().unwrap();

    let mut source = XmlNode::from_document(
        &Document::parse_str(
            "test.xml",
            r#"<Library name="L" shelf="3"><Book title="T" color="red"/></Library>"#,
        )
        .unwrap(),
    );
    source.retain_attributes(&|name| name != "shelf" && name != "color");
    assert_eq!(to_element(root).normalized(), source.normalized());
}

#[tokio::test]
async fn test_config_file_drives_engine_and_output() {
    let fixtures = TestFixtures::new();
    let config: Config = ConfigManager::load_from_file(&fixtures.configs_dir().join("link.toml"))
        .await
        .unwrap();
    let engine_config = ConfigManager::engine_config(&config);
    assert!(engine_config.link);

    let root = SchemaLoader::load(&fixtures.library_schema()).await.unwrap();
    let engine = MappingEngine::new(
        SchemaRegistry::build(root).unwrap(),
        Rc::new(RecordingReporter::new()),
        engine_config,
    );
    let session = engine
        .map_path(&fixtures.xml_valid_dir(), &FileDiscovery::new())
        .await
        .unwrap();

    let output = Output::new(OutputFormat::from(config.output.format), VerbosityLevel::Normal)
        .with_colors(false);
    let text = output.format_results(&session.results).unwrap();
    assert_eq!(
        text,
        "2 files: 2 mapped, 0 invalid, 0 errors, 8 instances, 1 warnings, linked\n"
    );
}
