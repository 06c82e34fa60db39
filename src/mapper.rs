//! Document to model mapping
//!
//! [`Mapper::parse`] validates a [`Document`] against a [`SchemaRegistry`] and
//! builds one [`Instance`] per element:
//!
//! 1. every element path must name a declared type,
//! 2. every parent element must hold an allowed number of each child type,
//! 3. elements are instantiated in document order and attached to their
//!    already-built parents.
//!
//! The first violation aborts the document; there is no partial forest.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::document::{Document, Element};
use crate::error::{MappingError, Result, StructuralError, ValidationError};
use crate::field::Value;
use crate::model::{Attributes, Instance, TEXT_FIELD};
use crate::registry::{SchemaRegistry, TypeEntry};
use crate::reporter::{Diagnostic, DiagnosticKind, Reporter};

/// Cached regex for positional index suffixes (`[2]`)
static PATH_INDEX_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_path_index_regex() -> &'static Regex {
    PATH_INDEX_REGEX
        .get_or_init(|| Regex::new(r"\[\d+\]").expect("Failed to compile path index regex"))
}

/// Turn an element path into a qualified type path.
///
/// `/Contacts/Person[2]/Phone` becomes `Contacts.Person.Phone`.
pub fn normalize_path(path: &str) -> String {
    let stripped = get_path_index_regex().replace_all(path, "");
    stripped.trim_start_matches('/').replace('/', ".")
}

/// Mapped instances of one document, keyed by element path in document order
#[derive(Debug, Clone)]
pub struct Forest {
    source: String,
    registry: Rc<SchemaRegistry>,
    instances: IndexMap<String, Instance>,
}

impl Forest {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        &self.registry
    }

    /// Instance of the document's root element
    pub fn root(&self) -> Option<&Instance> {
        self.instances.get_index(0).map(|(_, instance)| instance)
    }

    pub fn get(&self, path: &str) -> Option<&Instance> {
        self.instances.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.instances.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.instances.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Instances whose type matches `name` (simple name or qualified path)
    pub fn of_type(&self, name: &str) -> Vec<Instance> {
        self.instances
            .values()
            .filter(|i| i.type_name() == name || i.type_path() == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Maps documents onto the types of one registry
pub struct Mapper {
    registry: Rc<SchemaRegistry>,
    reporter: Rc<dyn Reporter>,
}

impl Mapper {
    pub fn new(registry: Rc<SchemaRegistry>, reporter: Rc<dyn Reporter>) -> Self {
        Self { registry, reporter }
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        &self.registry
    }

    /// Validate `document` and build its forest
    pub fn parse(&self, document: &Document) -> Result<Forest> {
        let type_paths: Vec<String> = document.iter().map(|e| normalize_path(e.path())).collect();

        self.check_coverage(document, &type_paths)?;
        self.check_cardinality(document, &type_paths)?;
        self.instantiate(document, &type_paths)
    }

    fn check_coverage(
        &self,
        document: &Document,
        type_paths: &[String],
    ) -> std::result::Result<(), ValidationError> {
        let observed: HashSet<&str> = type_paths.iter().map(String::as_str).collect();

        let mut undeclared: Vec<String> = observed
            .iter()
            .filter(|p| !self.registry.contains(p))
            .map(|p| p.to_string())
            .collect();
        if !undeclared.is_empty() {
            undeclared.sort();
            return Err(ValidationError::UndeclaredElement {
                file: document.source().to_string(),
                paths: undeclared,
            });
        }

        let unmapped: Vec<&str> = self
            .registry
            .paths()
            .filter(|p| !observed.contains(p))
            .collect();
        if !unmapped.is_empty() {
            self.reporter.report(Diagnostic::warning(
                DiagnosticKind::UnmappedSchemaType,
                format!(
                    "{}: types {:?} defined in the schema are not found in the document",
                    document.source(),
                    unmapped
                ),
            ));
        }
        Ok(())
    }

    fn check_cardinality(
        &self,
        document: &Document,
        type_paths: &[String],
    ) -> std::result::Result<(), ValidationError> {
        for entry in self.registry.types().filter(|t| !t.is_root()) {
            let Some(parent_id) = entry.parent() else {
                continue;
            };
            let parent_path = self.registry.entry(parent_id).path();

            for (element, _) in document
                .iter()
                .zip(type_paths)
                .filter(|(_, path)| path.as_str() == parent_path)
            {
                let observed = document
                    .children(element)
                    .filter(|c| c.tag() == entry.name())
                    .count();
                if !entry.cardinality().contains(observed) {
                    return Err(ValidationError::Cardinality {
                        location: document.location(element),
                        path: entry.path().to_string(),
                        observed,
                        expected: entry.cardinality(),
                    });
                }
            }
        }
        Ok(())
    }

    fn instantiate(&self, document: &Document, type_paths: &[String]) -> Result<Forest> {
        let mut instances: IndexMap<String, Instance> = IndexMap::with_capacity(document.len());

        for (element, type_path) in document.iter().zip(type_paths) {
            let location = document.location(element);
            let model_type = self.registry.model_type(type_path)?;
            let entry = model_type.entry();

            let values = self
                .collect_values(document, element, entry)
                .map_err(|e| e.at(location.clone()))?;
            let instance = Instance::new(&model_type, values, self.reporter.as_ref())
                .map_err(|e| e.at(location.clone()))?;
            instances.insert(element.path().to_string(), instance.clone());

            let Some(parent_element) = document.parent(element) else {
                continue;
            };
            let parent = instances.get(parent_element.path()).ok_or_else(|| {
                StructuralError::NotParent {
                    parent: parent_element.path().to_string(),
                    child: element.path().to_string(),
                }
            })?;
            parent.append_child(&instance).map_err(|err| match err {
                StructuralError::Capacity {
                    count, expected, ..
                } => MappingError::Validation(ValidationError::Cardinality {
                    location: document.location(parent_element),
                    path: type_path.clone(),
                    observed: count,
                    expected,
                }),
                other => MappingError::Structural(other),
            })?;
        }

        Ok(Forest {
            source: document.source().to_string(),
            registry: Rc::clone(&self.registry),
            instances,
        })
    }

    /// Coerce the element's attributes and text into constructor values
    fn collect_values(
        &self,
        document: &Document,
        element: &Element,
        entry: &TypeEntry,
    ) -> std::result::Result<Attributes, ValidationError> {
        let mut values = Attributes::new();

        for (name, raw) in element.attributes() {
            match entry.field(name) {
                None => {
                    self.reporter.report(
                        Diagnostic::warning(
                            DiagnosticKind::UndeclaredAttribute,
                            format!(
                                "Try to assign extra attribute '{}' to undefined field of '{}', drop it",
                                name,
                                entry.path()
                            ),
                        )
                        .at(document.location(element)),
                    );
                }
                Some(descriptor) if descriptor.is_reference() => {
                    self.reporter.report(
                        Diagnostic::warning(
                            DiagnosticKind::ReferenceAttribute,
                            format!(
                                "Attribute '{}' of '{}' names a reference field, left for linking",
                                name,
                                entry.path()
                            ),
                        )
                        .at(document.location(element)),
                    );
                }
                Some(descriptor) => {
                    let value = descriptor.kind().coerce(raw).ok_or_else(|| {
                        ValidationError::TypeMismatch {
                            type_path: entry.path().to_string(),
                            field: name.clone(),
                            value: raw.clone(),
                            expected: descriptor.kind(),
                        }
                    })?;
                    values.insert(name.clone(), Some(value));
                }
            }
        }

        if let Some(text) = element.text() {
            let value = match entry.field(TEXT_FIELD) {
                Some(descriptor) if !descriptor.is_reference() => {
                    descriptor.kind().coerce(text).ok_or_else(|| {
                        ValidationError::TypeMismatch {
                            type_path: entry.path().to_string(),
                            field: TEXT_FIELD.to_string(),
                            value: text.to_string(),
                            expected: descriptor.kind(),
                        }
                    })?
                }
                _ => Value::String(text.to_string()),
            };
            values.insert(TEXT_FIELD.to_string(), Some(value));
        }

        Ok(values)
    }
}
