//! Schema registry
//!
//! Flattens a declared [`SchemaType`] tree into an index keyed by qualified
//! path, plus parent/children maps. Every type gets a stable [`TypeId`] that
//! instances use to address their typed child lists.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{SchemaError, SchemaResult};
use crate::field::FieldDescriptor;
use crate::model::ModelType;
use crate::schema::{Cardinality, SchemaType};

/// Stable identifier of a schema type within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One registered schema type
#[derive(Debug)]
pub struct TypeEntry {
    id: TypeId,
    path: String,
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    cardinality: Cardinality,
    parent: Option<TypeId>,
    /// Position of this type in its parent's child list
    slot: Option<usize>,
    children: Vec<TypeId>,
}

impl TypeEntry {
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Qualified path, e.g. `Contacts.Person.Phone`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Simple name, the last path segment
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.path.split('.').count()
    }

    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn children(&self) -> &[TypeId] {
        &self.children
    }

    /// Reference-kind fields declared on this type
    pub fn reference_fields(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter().filter(|(_, d)| d.is_reference())
    }
}

/// Flat index of every type nested under one root schema type
#[derive(Debug)]
pub struct SchemaRegistry {
    types: Vec<TypeEntry>,
    by_path: HashMap<String, TypeId>,
}

impl SchemaRegistry {
    /// Enumerate every nested declaration of `root`, depth first
    pub fn build(root: SchemaType) -> SchemaResult<Rc<Self>> {
        let mut registry = Self {
            types: Vec::new(),
            by_path: HashMap::new(),
        };
        registry.register(root, None)?;
        Ok(Rc::new(registry))
    }

    fn register(&mut self, declared: SchemaType, parent: Option<TypeId>) -> SchemaResult<TypeId> {
        check_name(declared.name())?;

        let path = match parent {
            Some(pid) => format!("{}.{}", self.types[pid.0].path, declared.name()),
            None => declared.name().to_string(),
        };

        if self.by_path.contains_key(&path) {
            return Err(SchemaError::DuplicateType { path });
        }

        declared
            .cardinality()
            .check()
            .map_err(|reason| SchemaError::InvalidCardinality {
                path: path.clone(),
                reason,
            })?;

        let mut primary_key: Option<&str> = None;
        for (field, descriptor) in declared.fields() {
            check_field(&path, field, descriptor)?;
            if descriptor.is_primary_key() {
                if let Some(existing) = primary_key {
                    return Err(SchemaError::InvalidField {
                        path,
                        field: field.to_string(),
                        reason: format!("type already has primary key '{}'", existing),
                    });
                }
                primary_key = Some(field.as_str());
            }
        }

        let id = TypeId(self.types.len());
        let slot = parent.map(|pid| self.types[pid.0].children.len());
        self.types.push(TypeEntry {
            id,
            path: path.clone(),
            name: declared.name().to_string(),
            fields: declared.fields().clone(),
            cardinality: declared.cardinality(),
            parent,
            slot,
            children: Vec::new(),
        });
        self.by_path.insert(path, id);
        if let Some(pid) = parent {
            self.types[pid.0].children.push(id);
        }

        for child in declared.children() {
            self.register(child.clone(), Some(id))?;
        }

        Ok(id)
    }

    pub fn root(&self) -> &TypeEntry {
        &self.types[0]
    }

    /// Qualified path of the root type (its simple name)
    pub fn root_path(&self) -> &str {
        &self.types[0].path
    }

    pub fn get(&self, path: &str) -> Option<&TypeEntry> {
        self.by_path.get(path).map(|id| &self.types[id.0])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn id_of(&self, path: &str) -> Option<TypeId> {
        self.by_path.get(path).copied()
    }

    /// Entry for an id handed out by this registry
    pub fn entry(&self, id: TypeId) -> &TypeEntry {
        &self.types[id.0]
    }

    /// Ordered child paths of `path`
    pub fn children_of(&self, path: &str) -> Option<Vec<&str>> {
        let entry = self.get(path)?;
        Some(
            entry
                .children
                .iter()
                .map(|c| self.types[c.0].path.as_str())
                .collect(),
        )
    }

    /// Parent path of `path`, absent for the root
    pub fn parent_of(&self, path: &str) -> Option<&str> {
        let entry = self.get(path)?;
        entry.parent.map(|p| self.types[p.0].path.as_str())
    }

    /// All types in depth-first declaration order
    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Handle used to instantiate models of the type at `path`
    pub fn model_type(self: &Rc<Self>, path: &str) -> SchemaResult<ModelType> {
        let id = self.id_of(path).ok_or_else(|| SchemaError::UnknownType {
            path: path.to_string(),
        })?;
        Ok(ModelType::new(Rc::clone(self), id))
    }
}

fn check_name(name: &str) -> SchemaResult<()> {
    if name.is_empty() {
        return Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '.' | '/' | '[' | ']') || c.is_whitespace())
    {
        return Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: format!("name contains '{}'", c),
        });
    }
    Ok(())
}

fn check_field(path: &str, field: &str, descriptor: &FieldDescriptor) -> SchemaResult<()> {
    let invalid = |reason: &str| SchemaError::InvalidField {
        path: path.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if field.is_empty() {
        return Err(invalid("field name is empty"));
    }

    if descriptor.is_primary_key() {
        if descriptor.is_optional() {
            return Err(invalid("optional field cannot be a primary key"));
        }
        if descriptor.is_reference() {
            return Err(invalid("reference field cannot be a primary key"));
        }
    }

    if descriptor.is_reference() {
        if descriptor.targets().is_empty() {
            return Err(invalid("reference field declares no target type"));
        }
        if descriptor.is_optional() {
            return Err(invalid("reference fields cannot be wrapped as optional"));
        }
        if descriptor.default_value().is_some() {
            return Err(invalid("reference fields cannot declare a default"));
        }
    } else if let Some(default) = descriptor.default_value() {
        if default.kind() != descriptor.kind() {
            return Err(invalid(&format!(
                "default value '{}' is not of kind {}",
                default,
                descriptor.kind()
            )));
        }
    }
    Ok(())
}
