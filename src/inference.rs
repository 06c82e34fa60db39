//! Schema inference from sample documents
//!
//! Every attribute starts as Integer and widens to Float, then String, as
//! values that do not parse are seen. An attribute missing from any element
//! of its type becomes optional.

use indexmap::{IndexMap, IndexSet};

use crate::document::Document;
use crate::error::{SchemaError, SchemaResult};
use crate::mapper::normalize_path;
use crate::schema_loader::{DetailedField, FieldSpec, KindSpec, TypeSpec};

/// Narrowest kind that accepts every value seen so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatcher {
    kind: KindSpec,
    optional: bool,
}

impl Default for FieldMatcher {
    fn default() -> Self {
        Self {
            kind: KindSpec::Integer,
            optional: false,
        }
    }
}

impl FieldMatcher {
    /// Widen to accept `value`; `None` means the attribute was absent
    pub fn observe(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            self.optional = true;
            return;
        };
        let value = value.trim();
        self.kind = match self.kind {
            KindSpec::Integer if value.parse::<i64>().is_ok() => KindSpec::Integer,
            KindSpec::Integer | KindSpec::Float if value.parse::<f64>().is_ok() => KindSpec::Float,
            _ => KindSpec::String,
        };
    }

    pub fn kind(&self) -> KindSpec {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    fn to_spec(self) -> FieldSpec {
        if self.optional {
            FieldSpec::Detailed(DetailedField {
                optional: true,
                ..DetailedField::new(self.kind)
            })
        } else {
            FieldSpec::Kind(self.kind)
        }
    }
}

#[derive(Debug, Default)]
struct TypeStats {
    elements: usize,
    fields: IndexMap<String, FieldMatcher>,
}

/// Accumulates attribute statistics over documents with one root tag
#[derive(Debug, Default)]
pub struct SchemaInference {
    roots: IndexSet<String>,
    types: IndexMap<String, TypeStats>,
}

impl SchemaInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, document: &Document) {
        self.roots.insert(document.root().tag().to_string());

        for element in document.iter() {
            let stats = self.types.entry(normalize_path(element.path())).or_default();

            // attributes first seen now were absent on earlier elements
            if stats.elements > 0 {
                for key in element.attributes().keys() {
                    if !stats.fields.contains_key(key) {
                        stats.fields.entry(key.clone()).or_default().observe(None);
                    }
                }
            }
            for key in element.attributes().keys() {
                stats.fields.entry(key.clone()).or_default();
            }
            for (key, matcher) in stats.fields.iter_mut() {
                matcher.observe(element.attribute(key));
            }
            stats.elements += 1;
        }
    }

    pub fn documents_seen(&self) -> bool {
        !self.roots.is_empty()
    }

    /// Schema covering every observed type
    pub fn finish(&self) -> SchemaResult<TypeSpec> {
        match self.roots.len() {
            0 => Err(SchemaError::Inference("no documents observed".to_string())),
            1 => Ok(self.build(&self.roots[0])),
            _ => Err(SchemaError::Inference(format!(
                "documents have different root types {:?}",
                self.roots
            ))),
        }
    }

    fn build(&self, path: &str) -> TypeSpec {
        let name = path.rsplit('.').next().unwrap_or(path);
        let mut spec = TypeSpec::new(name);

        if let Some(stats) = self.types.get(path) {
            spec.fields = stats
                .fields
                .iter()
                .map(|(key, matcher)| (key.clone(), matcher.to_spec()))
                .collect();
        }

        spec.children = self
            .types
            .keys()
            .filter(|child| parent_path(child) == Some(path))
            .map(|child| self.build(child))
            .collect();
        spec
    }
}

fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(parent, _)| parent)
}

/// Infer one schema from documents sharing a root tag
pub fn infer_schema(documents: &[Document]) -> SchemaResult<TypeSpec> {
    let mut inference = SchemaInference::new();
    for document in documents {
        inference.observe(document);
    }
    inference.finish()
}
