//! Schema files
//!
//! Declarative TOML or JSON form of a [`SchemaType`] tree, for the CLI and for
//! callers that keep their models out of code:
//!
//! ```toml
//! name = "Contacts"
//!
//! [[children]]
//! name = "Person"
//! count = { min = 1 }
//!
//! [children.fields]
//! name = { kind = "string", primary_key = true }
//! age = { kind = "integer", optional = true, min = 0 }
//! home = { kind = "reference", targets = ["Addresses.Apartment"], lookup = { key = "address", target = "Apartment", field = "location" } }
//! ```
//!
//! Reference fields with a `lookup` table get a key-matching resolver; others
//! need one assigned in code with [`SchemaType::assign_resolver`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDescriptor, FieldKind, Validator, Value};
use crate::linker::key_lookup;
use crate::schema::{Cardinality, SchemaType};

/// One declared type of a schema file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountSpec>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TypeSpec>,
}

/// `count = 2`, `count = [1, 3]` or `count = { min = 1, max = 3 }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CountSpec {
    Exact(i64),
    Pair([i64; 2]),
    Bounds { min: i64, max: Option<i64> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KindSpec {
    String,
    Integer,
    Float,
    Reference,
    ReferenceArray,
}

impl From<KindSpec> for FieldKind {
    fn from(kind: KindSpec) -> Self {
        match kind {
            KindSpec::String => FieldKind::String,
            KindSpec::Integer => FieldKind::Integer,
            KindSpec::Float => FieldKind::Float,
            KindSpec::Reference => FieldKind::Reference,
            KindSpec::ReferenceArray => FieldKind::ReferenceArray,
        }
    }
}

/// `name = "string"` or a detailed table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldSpec {
    Kind(KindSpec),
    Detailed(DetailedField),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedField {
    pub kind: KindSpec,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupSpec>,
}

impl DetailedField {
    pub fn new(kind: KindSpec) -> Self {
        Self {
            kind,
            optional: false,
            primary_key: false,
            default: None,
            pattern: None,
            min: None,
            max: None,
            targets: Vec::new(),
            lookup: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DefaultSpec {
    Integer(i64),
    Float(f64),
    String(String),
}

/// Resolve a reference by matching `key` on the source against `field` on
/// instances of `target`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupSpec {
    pub key: String,
    pub target: String,
    pub field: String,
}

/// Reads schema files into [`SchemaType`] trees
pub struct SchemaLoader;

impl SchemaLoader {
    /// Load a schema file; the format follows the extension (TOML by default)
    pub async fn load(path: &Path) -> SchemaResult<SchemaType> {
        let file = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SchemaError::File {
                    file: file.clone(),
                    details: "schema file not found".to_string(),
                },
                _ => SchemaError::File {
                    file: file.clone(),
                    details: e.to_string(),
                },
            })?;

        let spec = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&file, &content)?,
            Some("toml") | None => Self::parse_toml(&file, &content)?,
            Some(ext) => {
                return Err(SchemaError::File {
                    file,
                    details: format!("unsupported schema file format: {}", ext),
                });
            }
        };
        Self::build(&spec)
    }

    pub fn parse_toml(file: &str, content: &str) -> SchemaResult<TypeSpec> {
        toml::from_str(content).map_err(|e| SchemaError::File {
            file: file.to_string(),
            details: e.to_string(),
        })
    }

    pub fn parse_json(file: &str, content: &str) -> SchemaResult<TypeSpec> {
        serde_json::from_str(content).map_err(|e| SchemaError::File {
            file: file.to_string(),
            details: e.to_string(),
        })
    }

    pub fn from_toml_str(content: &str) -> SchemaResult<SchemaType> {
        Self::build(&Self::parse_toml("<string>", content)?)
    }

    /// Turn a parsed spec into a schema type tree
    pub fn build(spec: &TypeSpec) -> SchemaResult<SchemaType> {
        Self::build_type(spec, &spec.name)
    }

    fn build_type(spec: &TypeSpec, path: &str) -> SchemaResult<SchemaType> {
        let mut declared = SchemaType::new(spec.name.clone());

        if let Some(count) = &spec.count {
            declared = declared.count(count_to_cardinality(count, path)?);
        }

        for (name, field) in &spec.fields {
            declared = declared.field(name.clone(), build_field(field, path, name)?);
        }

        for child in &spec.children {
            let child_path = format!("{}.{}", path, child.name);
            declared = declared.child(Self::build_type(child, &child_path)?);
        }

        Ok(declared)
    }
}

impl TypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: None,
            fields: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn to_toml_string(&self) -> SchemaResult<String> {
        toml::to_string_pretty(self).map_err(|e| SchemaError::File {
            file: self.name.clone(),
            details: e.to_string(),
        })
    }

    pub fn to_json_string(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SchemaError::File {
            file: self.name.clone(),
            details: e.to_string(),
        })
    }
}

fn count_to_cardinality(count: &CountSpec, path: &str) -> SchemaResult<Cardinality> {
    let invalid = |reason: String| SchemaError::InvalidCardinality {
        path: path.to_string(),
        reason,
    };
    let non_negative = |n: i64, what: &str| {
        usize::try_from(n).map_err(|_| invalid(format!("{} {} is below 0", what, n)))
    };

    match *count {
        CountSpec::Exact(n) => Ok(Cardinality::exact(non_negative(n, "exact count")?)),
        CountSpec::Pair([min, max]) => Ok(Cardinality::range(
            non_negative(min, "lower bound")?,
            non_negative(max, "upper bound")?,
        )),
        CountSpec::Bounds { min, max: None } => {
            Ok(Cardinality::at_least(non_negative(min, "lower bound")?))
        }
        CountSpec::Bounds { min, max: Some(max) } => Ok(Cardinality::range(
            non_negative(min, "lower bound")?,
            non_negative(max, "upper bound")?,
        )),
    }
}

fn build_field(spec: &FieldSpec, path: &str, name: &str) -> SchemaResult<FieldDescriptor> {
    let detailed = match spec {
        FieldSpec::Kind(kind) => DetailedField::new(*kind),
        FieldSpec::Detailed(detailed) => detailed.clone(),
    };
    let kind = FieldKind::from(detailed.kind);
    let invalid = |reason: &str| SchemaError::InvalidField {
        path: path.to_string(),
        field: name.to_string(),
        reason: reason.to_string(),
    };

    let mut descriptor = match kind {
        FieldKind::String => FieldDescriptor::string(),
        FieldKind::Integer => FieldDescriptor::integer(),
        FieldKind::Float => FieldDescriptor::float(),
        FieldKind::Reference => FieldDescriptor::reference(detailed.targets.clone()),
        FieldKind::ReferenceArray => FieldDescriptor::reference_array(detailed.targets.clone()),
    };

    if detailed.optional {
        descriptor = descriptor.optional();
    }
    if detailed.primary_key {
        descriptor = descriptor.primary_key();
    }

    if let Some(default) = &detailed.default {
        let value = match (kind, default) {
            (FieldKind::Float, DefaultSpec::Integer(i)) => Value::Float(*i as f64),
            (_, DefaultSpec::Integer(i)) => Value::Integer(*i),
            (_, DefaultSpec::Float(x)) => Value::Float(*x),
            (_, DefaultSpec::String(s)) => Value::String(s.clone()),
        };
        descriptor = descriptor.with_default(value);
    }

    if let Some(pattern) = &detailed.pattern {
        if kind != FieldKind::String {
            return Err(invalid("patterns only apply to string fields"));
        }
        let validator =
            Validator::pattern(pattern).map_err(|source| SchemaError::InvalidPattern {
                field: format!("{}.{}", path, name),
                source,
            })?;
        descriptor = descriptor.with_validator(validator);
    }

    if detailed.min.is_some() || detailed.max.is_some() {
        if !matches!(kind, FieldKind::Integer | FieldKind::Float) {
            return Err(invalid("bounds only apply to numeric fields"));
        }
        if descriptor.validator().is_some() {
            return Err(invalid("a field takes one validator"));
        }
        descriptor = descriptor.with_validator(Validator::range(detailed.min, detailed.max));
    }

    if let Some(lookup) = &detailed.lookup {
        if !kind.is_reference() {
            return Err(invalid("lookups only apply to reference fields"));
        }
        descriptor = descriptor.with_resolver(key_lookup(
            lookup.key.clone(),
            lookup.target.clone(),
            lookup.field.clone(),
            kind == FieldKind::ReferenceArray,
        ));
    }

    Ok(descriptor)
}
