//! Schema declarations
//!
//! A [`SchemaType`] is a named node of the model hierarchy. Nesting child
//! types inside a parent type declares the parent-child structure the mapped
//! documents must follow:
//!
//! ```
//! use xml_ormz::{Cardinality, FieldDescriptor, SchemaType};
//!
//! let contacts = SchemaType::new("Contacts").child(
//!     SchemaType::new("Person")
//!         .field("name", FieldDescriptor::string())
//!         .field("age", FieldDescriptor::integer().optional())
//!         .child(SchemaType::new("Phone").field("number", FieldDescriptor::integer()))
//!         .count(Cardinality::at_least(1)),
//! );
//! assert_eq!(contacts.children().len(), 1);
//! ```

use indexmap::IndexMap;
use std::fmt;

use crate::error::{SchemaError, SchemaResult};
use crate::field::FieldDescriptor;
use crate::linker::Resolver;

/// Allowed number of direct children of one type under one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly this many (positive)
    Exact(usize),
    /// Inclusive range; `max == None` means unbounded
    Range { min: usize, max: Option<usize> },
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Range { min: 0, max: None }
    }
}

impl Cardinality {
    pub fn exact(count: usize) -> Self {
        Cardinality::Exact(count)
    }

    pub fn range(min: usize, max: usize) -> Self {
        Cardinality::Range {
            min,
            max: Some(max),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Cardinality::Range { min, max: None }
    }

    pub fn any() -> Self {
        Self::default()
    }

    /// Whether `count` children satisfy the constraint
    pub fn contains(&self, count: usize) -> bool {
        match *self {
            Cardinality::Exact(n) => count == n,
            Cardinality::Range { min, max } => count >= min && max.is_none_or(|m| count <= m),
        }
    }

    /// Whether `count` is above the upper bound
    pub fn is_exceeded_by(&self, count: usize) -> bool {
        self.upper_bound().is_some_and(|max| count > max)
    }

    pub fn upper_bound(&self) -> Option<usize> {
        match *self {
            Cardinality::Exact(n) => Some(n),
            Cardinality::Range { max, .. } => max,
        }
    }

    /// Check the declaration itself is well formed
    pub fn check(&self) -> std::result::Result<(), String> {
        match *self {
            Cardinality::Exact(0) => Err("exact count must be greater than 0".to_string()),
            Cardinality::Range { min, max: Some(max) } if min >= max => Err(format!(
                "range lower bound {} must be below upper bound {}",
                min, max
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Cardinality::Exact(n) => write!(f, "exactly {}", n),
            Cardinality::Range { min, max: Some(max) } => {
                write!(f, "between {} and {}", min, max)
            }
            Cardinality::Range { min, max: None } => write!(f, "at least {}", min),
        }
    }
}

/// Declared node kind of the mapping schema
#[derive(Debug, Clone)]
pub struct SchemaType {
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    children: Vec<SchemaType>,
    cardinality: Cardinality,
}

impl SchemaType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            children: Vec::new(),
            cardinality: Cardinality::default(),
        }
    }

    /// Declare a field; a later declaration with the same name replaces it
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    /// Declare a nested child type
    pub fn child(mut self, child: SchemaType) -> Self {
        self.children.push(child);
        self
    }

    /// Constrain how many of this type may appear under one parent
    pub fn count(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn children(&self) -> &[SchemaType] {
        &self.children
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Find a nested type by its qualified path (`Root.Child.Grandchild`)
    pub fn find_mut(&mut self, path: &str) -> Option<&mut SchemaType> {
        let mut segments = path.split('.');
        if segments.next() != Some(self.name.as_str()) {
            return None;
        }
        let mut current = self;
        for segment in segments {
            current = current.children.iter_mut().find(|c| c.name == segment)?;
        }
        Some(current)
    }

    /// Attach a resolver to a reference field of a nested type.
    ///
    /// Used to wire code resolvers into schemas declared in files.
    pub fn assign_resolver(
        &mut self,
        type_path: &str,
        field: &str,
        resolver: Resolver,
    ) -> SchemaResult<()> {
        let target = self
            .find_mut(type_path)
            .ok_or_else(|| SchemaError::UnknownType {
                path: type_path.to_string(),
            })?;
        let descriptor =
            target
                .fields
                .get_mut(field)
                .ok_or_else(|| SchemaError::InvalidField {
                    path: type_path.to_string(),
                    field: field.to_string(),
                    reason: "no such field".to_string(),
                })?;
        if !descriptor.is_reference() {
            return Err(SchemaError::InvalidField {
                path: type_path.to_string(),
                field: field.to_string(),
                reason: "resolvers can only be assigned to reference fields".to_string(),
            });
        }
        *descriptor = descriptor.clone().with_resolver(resolver);
        Ok(())
    }
}
