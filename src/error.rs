use thiserror::Error;

use crate::document::Location;
use crate::field::FieldKind;
use crate::schema::Cardinality;

/// Main error type that encompasses every failure mode of a mapping session
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("File discovery error: {0}")]
    Discovery(String),

    #[error("Concurrency error: {details}")]
    Concurrency { details: String },
}

/// Malformed schema declarations, detected while building a registry
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid cardinality for '{path}': {reason}")]
    InvalidCardinality { path: String, reason: String },

    #[error("Duplicate schema type: {path}")]
    DuplicateType { path: String },

    #[error("Invalid schema type name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid field '{field}' of '{path}': {reason}")]
    InvalidField {
        path: String,
        field: String,
        reason: String,
    },

    #[error("Invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown schema type: {path}")]
    UnknownType { path: String },

    #[error("Schema file error: {file} - {details}")]
    File { file: String, details: String },

    #[error("Schema inference error: {0}")]
    Inference(String),
}

/// Document does not conform to its schema
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{file}: undeclared element type {paths:?}")]
    UndeclaredElement { file: String, paths: Vec<String> },

    #[error(
        "{location}: cardinality mismatch for '{path}': count is {observed}, expected {expected}"
    )]
    Cardinality {
        location: Location,
        path: String,
        observed: usize,
        expected: Cardinality,
    },

    #[error("'{type_path}': type mismatch for field '{field}': got '{value}', expected {expected}")]
    TypeMismatch {
        type_path: String,
        field: String,
        value: String,
        expected: FieldKind,
    },

    #[error("'{type_path}': missing required attribute '{field}'")]
    MissingAttribute { type_path: String, field: String },

    #[error(
        "'{type_path}': constraint violation at attribute '{field}', constraint {constraint}, got '{value}'"
    )]
    ConstraintViolation {
        type_path: String,
        field: String,
        constraint: String,
        value: String,
    },

    #[error(
        "'{type_path}': reference field '{field}' cannot point to '{target}', allowed: {allowed:?}"
    )]
    ReferenceTarget {
        type_path: String,
        field: String,
        target: String,
        allowed: Vec<String>,
    },

    #[error("'{type_path}': no field named '{field}'")]
    UnknownField { type_path: String, field: String },

    #[error("{location}: {source}")]
    InDocument {
        location: Location,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Attach a document location to an error raised without one
    pub fn at(self, location: Location) -> Self {
        match self {
            ValidationError::Cardinality { .. } | ValidationError::InDocument { .. } => self,
            other => ValidationError::InDocument {
                location,
                source: Box::new(other),
            },
        }
    }

    /// The error with any location wrapper removed
    pub fn root_cause(&self) -> &ValidationError {
        match self {
            ValidationError::InDocument { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Illegal tree mutation attempted on mapped instances
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("'{parent}' does not declare '{child}' as a child type")]
    NotAChildType { parent: String, child: String },

    #[error("'{parent}' cannot hold {count} '{child}' children, expected {expected}")]
    Capacity {
        parent: String,
        child: String,
        count: usize,
        expected: Cardinality,
    },

    #[error("'{path}' is a root type and has no parent slot")]
    RootType { path: String },

    #[error("'{child}' is not a child of this '{parent}'")]
    NotParent { parent: String, child: String },
}

/// Linker misconfiguration, detected before any linking work
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Reference field '{field}' of '{type_path}' has no resolver assigned")]
    MissingResolver { type_path: String, field: String },

    #[error("Reference field '{field}' of '{type_path}' targets unknown type '{target}'")]
    UnknownTarget {
        type_path: String,
        field: String,
        target: String,
    },

    #[error("Forest '{source_id}' was mapped with a schema that is not registered with the linker")]
    UnregisteredSchema { source_id: String },
}

/// Errors raised by the element-tree collaborator
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {file} at position {position} - {details}")]
    Malformed {
        file: String,
        position: u64,
        details: String,
    },

    #[error("Document has no root element: {file}")]
    NoRoot { file: String },

    #[error("Document has more than one root element: {file}")]
    MultipleRoots { file: String },

    #[error("XML writing error: {details}")]
    Write { details: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MappingError>;

/// Schema result type alias
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Structural mutation result type alias
pub type StructuralResult<T> = std::result::Result<T, StructuralError>;
