use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;
use tokio::fs;

use xml_ormz::{
    Document, Forest, Mapper, MappingError, RecordingReporter, SchemaLoader, SchemaRegistry,
};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn xml_valid_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml").join("valid")
    }

    pub fn xml_invalid_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml").join("invalid")
    }

    pub fn xml_malformed_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml").join("malformed")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.fixtures_dir.join("configs")
    }

    pub fn library_schema(&self) -> PathBuf {
        self.fixtures_dir.join("schemas").join("library.toml")
    }

    pub fn library_schema_json(&self) -> PathBuf {
        self.fixtures_dir.join("schemas").join("library.json")
    }

    pub fn classics_xml(&self) -> PathBuf {
        self.xml_valid_dir().join("classics.xml")
    }

    pub fn scifi_xml(&self) -> PathBuf {
        self.xml_valid_dir().join("scifi.xml")
    }

    pub fn malformed_xml(&self) -> PathBuf {
        self.xml_malformed_dir().join("unclosed.xml")
    }
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry built from the library schema fixture
pub fn library_registry() -> Rc<SchemaRegistry> {
    let content = std::fs::read_to_string(TestFixtures::new().library_schema()).unwrap();
    SchemaRegistry::build(SchemaLoader::from_toml_str(&content).unwrap()).unwrap()
}

/// Map `xml` against `registry`, returning the outcome and every diagnostic
pub fn map_str(
    registry: &Rc<SchemaRegistry>,
    xml: &str,
) -> (Result<Forest, MappingError>, Rc<RecordingReporter>) {
    let reporter = Rc::new(RecordingReporter::new());
    let document = Document::parse_str("test.xml", xml).unwrap();
    let result = Mapper::new(Rc::clone(registry), reporter.clone()).parse(&document);
    (result, reporter)
}

/// Temporary directory holding a copy of the valid and invalid fixtures
pub async fn create_library_dir() -> std::io::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let fixtures = TestFixtures::new();

    for (dir, target) in [
        (fixtures.xml_valid_dir(), "valid"),
        (fixtures.xml_invalid_dir(), "invalid"),
    ] {
        let target_dir = temp_dir.path().join(target);
        fs::create_dir_all(&target_dir).await?;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            fs::copy(entry.path(), target_dir.join(entry.file_name())).await?;
        }
    }

    fs::write(temp_dir.path().join("readme.txt"), "not a document").await?;
    Ok(temp_dir)
}

pub const ROOT_ITEMS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root>
    <Item value="1"/>
    <Item value="2"/>
</Root>"#;

pub const ONE_ITEM_XML: &str = r#"<Root><Item value="1"/></Root>"#;

pub const THREE_ITEMS_XML: &str =
    r#"<Root><Item value="1"/><Item value="2"/><Item value="3"/></Root>"#;

pub const BAD_VALUE_XML: &str = r#"<Root><Item value="abc"/><Item value="2"/></Root>"#;
