//! # xml-ormz Library
//!
//! Maps XML documents onto statically declared object schemas. A
//! [`SchemaType`] tree declares the element types, their attribute fields and
//! how many of each child an element may hold. The [`Mapper`] checks a parsed
//! [`Document`] against the resulting [`SchemaRegistry`] and builds a
//! [`Forest`] of typed [`Instance`]s; the [`Linker`] then fills reference
//! fields across any number of forests using per-field resolvers.
//!
//! ```
//! use std::rc::Rc;
//! use xml_ormz::{Cardinality, Document, FieldDescriptor, Mapper, RecordingReporter, SchemaRegistry, SchemaType};
//!
//! let registry = SchemaRegistry::build(
//!     SchemaType::new("Root").child(
//!         SchemaType::new("Item")
//!             .field("value", FieldDescriptor::integer())
//!             .count(Cardinality::exact(2)),
//!     ),
//! )
//! .unwrap();
//!
//! let document = Document::parse_str(
//!     "items.xml",
//!     r#"<Root><Item value="1"/><Item value="2"/></Root>"#,
//! )
//! .unwrap();
//!
//! let forest = Mapper::new(registry, Rc::new(RecordingReporter::new()))
//!     .parse(&document)
//!     .unwrap();
//! assert_eq!(forest.of_type("Item").len(), 2);
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod error_reporter;
pub mod field;
pub mod file_discovery;
pub mod inference;
pub mod linker;
pub mod mapper;
pub mod model;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod schema;
pub mod schema_loader;
pub mod serializer;

pub use cli::{Cli, Command, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use document::{Document, Element, ElementId, Location};
pub use engine::{
    DocumentResult, DocumentStatus, EngineConfig, LinkSummary, MappingEngine, MappingResults,
    MappingSession,
};
pub use error::{
    ConfigurationError, DocumentError, MappingError, SchemaError, StructuralError,
    ValidationError,
};
pub use error_reporter::ErrorReporter;
pub use field::{FieldDescriptor, FieldKind, Validator, Value};
pub use file_discovery::FileDiscovery;
pub use inference::{FieldMatcher, SchemaInference, infer_schema};
pub use linker::{LinkContext, LinkReport, Linker, Resolved, Resolver, key_lookup, resolver};
pub use mapper::{Forest, Mapper};
pub use model::{Attributes, Instance, ModelType};
pub use output::Output;
pub use registry::{SchemaRegistry, TypeEntry, TypeId};
pub use reporter::{Diagnostic, DiagnosticKind, Level, RecordingReporter, Reporter, TracingReporter};
pub use schema::{Cardinality, SchemaType};
pub use schema_loader::{SchemaLoader, TypeSpec};
pub use serializer::{XmlNode, to_element, to_xml_string};
