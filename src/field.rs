//! Field descriptors
//!
//! Typed leaf declarations attached to a schema type. Scalar kinds (String,
//! Integer, Float) are filled from element attributes; reference kinds are
//! filled by the linker.

use regex::Regex;
use std::fmt;
use std::rc::Rc;

use crate::linker::{self, LinkContext, Resolved, Resolver};
use crate::model::Instance;

/// Declared kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Reference,
    ReferenceArray,
}

impl FieldKind {
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldKind::Reference | FieldKind::ReferenceArray)
    }

    /// Coerce a raw attribute string into a value of this kind.
    ///
    /// Returns `None` when the text does not parse, or when the kind is a
    /// reference kind (those are never filled from text).
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            FieldKind::String => Some(Value::String(raw.to_string())),
            FieldKind::Integer => raw.trim().parse::<i64>().ok().map(Value::Integer),
            FieldKind::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
            FieldKind::Reference | FieldKind::ReferenceArray => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "String",
            FieldKind::Integer => "Integer",
            FieldKind::Float => "Float",
            FieldKind::Reference => "Reference",
            FieldKind::ReferenceArray => "ReferenceArray",
        };
        f.write_str(name)
    }
}

/// A typed attribute value held by an instance
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Reference(Instance),
    References(Vec<Instance>),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::String(_) => FieldKind::String,
            Value::Integer(_) => FieldKind::Integer,
            Value::Float(_) => FieldKind::Float,
            Value::Reference(_) => FieldKind::Reference,
            Value::References(_) => FieldKind::ReferenceArray,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Instance> {
        match self {
            Value::Reference(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_references(&self) -> Option<&[Instance]> {
        match self {
            Value::References(instances) => Some(instances),
            _ => None,
        }
    }

    /// Numeric view used by range validators
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Reference(instance) => write!(f, "<{}>", instance.type_path()),
            Value::References(instances) => {
                let paths: Vec<String> = instances
                    .iter()
                    .map(|i| format!("<{}>", i.type_path()))
                    .collect();
                write!(f, "[{}]", paths.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Reference(value)
    }
}

impl From<Vec<Instance>> for Value {
    fn from(value: Vec<Instance>) -> Self {
        Value::References(value)
    }
}

/// Constraint checked after the kind check succeeds
#[derive(Clone)]
pub enum Validator {
    /// Regular expression matched at the start of the value
    Pattern { source: String, regex: Regex },
    /// Inclusive numeric bounds
    Range { min: Option<f64>, max: Option<f64> },
    /// Arbitrary check with a human readable description
    Predicate {
        description: String,
        check: Rc<dyn Fn(&Value) -> bool>,
    },
}

impl Validator {
    pub fn pattern(source: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", source))?;
        Ok(Validator::Pattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Validator::Range { min, max }
    }

    pub fn predicate(
        description: impl Into<String>,
        check: impl Fn(&Value) -> bool + 'static,
    ) -> Self {
        Validator::Predicate {
            description: description.into(),
            check: Rc::new(check),
        }
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        match self {
            Validator::Pattern { regex, .. } => match value {
                Value::String(s) => regex.is_match(s),
                other => regex.is_match(&other.to_string()),
            },
            Validator::Range { min, max } => match value.as_number() {
                Some(n) => min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi),
                None => false,
            },
            Validator::Predicate { check, .. } => check(value),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Pattern { source, .. } => write!(f, "pattern '{}'", source),
            Validator::Range { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "range [{}, {}]", lo, hi),
                (Some(lo), None) => write!(f, "range [{}, inf)", lo),
                (None, Some(hi)) => write!(f, "range (-inf, {}]", hi),
                (None, None) => f.write_str("range (-inf, inf)"),
            },
            Validator::Predicate { description, .. } => write!(f, "'{}'", description),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self)
    }
}

/// Typed field declaration
#[derive(Clone)]
pub struct FieldDescriptor {
    kind: FieldKind,
    optional: bool,
    primary_key: bool,
    default: Option<Value>,
    validator: Option<Validator>,
    targets: Vec<String>,
    resolver: Option<Resolver>,
}

impl FieldDescriptor {
    fn scalar(kind: FieldKind) -> Self {
        Self {
            kind,
            optional: false,
            primary_key: false,
            default: None,
            validator: None,
            targets: Vec::new(),
            resolver: None,
        }
    }

    pub fn string() -> Self {
        Self::scalar(FieldKind::String)
    }

    pub fn integer() -> Self {
        Self::scalar(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::scalar(FieldKind::Float)
    }

    /// Single reference to an instance of one of `targets` (qualified paths)
    pub fn reference<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::scalar(FieldKind::Reference)
        }
    }

    /// List of references to instances of `targets` (qualified paths)
    pub fn reference_array<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::scalar(FieldKind::ReferenceArray)
        }
    }

    /// Wrap the field as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the field as the identifying key of its type
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_pattern(self, pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(self.with_validator(Validator::pattern(pattern)?))
    }

    /// Assign the resolver the linker calls for this reference field
    pub fn resolved_by(
        mut self,
        resolver: impl Fn(&LinkContext<'_>, &Instance) -> Option<Resolved> + 'static,
    ) -> Self {
        self.resolver = Some(linker::resolver(resolver));
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_reference(&self) -> bool {
        self.kind.is_reference()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn resolver(&self) -> Option<&Resolver> {
        self.resolver.as_ref()
    }

    /// Whether `value` has the declared kind
    pub fn accepts_kind(&self, value: &Value) -> bool {
        value.kind() == self.kind
    }

    /// Whether an instance of `type_path` is an allowed reference target.
    ///
    /// Targets are matched on the qualified path; a target declared without
    /// a dot also matches on the simple name.
    pub fn allows_target(&self, type_path: &str) -> bool {
        let simple = type_path.rsplit('.').next().unwrap_or(type_path);
        self.targets
            .iter()
            .any(|t| t == type_path || (!t.contains('.') && t == simple))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("primary_key", &self.primary_key)
            .field("default", &self.default)
            .field("validator", &self.validator)
            .field("targets", &self.targets)
            .field("resolver", &self.resolver.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "Optional({})", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}
