//! Model instances
//!
//! An [`Instance`] is a shared handle to one mapped node. It owns its typed
//! child lists, holds a weak back-reference to its parent, and enforces the
//! schema's cardinality whenever the tree is mutated.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{StructuralError, StructuralResult, ValidationError};
use crate::field::{FieldDescriptor, FieldKind, Value};
use crate::registry::{SchemaRegistry, TypeEntry, TypeId};
use crate::reporter::{Diagnostic, DiagnosticKind, Reporter};

/// Name of the implicit field holding trimmed element text
pub const TEXT_FIELD: &str = "text";

/// Values supplied at construction; `None` is an explicit null
pub type Attributes = IndexMap<String, Option<Value>>;

/// A schema type bound to the registry it was declared in
#[derive(Debug, Clone)]
pub struct ModelType {
    registry: Rc<SchemaRegistry>,
    id: TypeId,
}

impl ModelType {
    pub(crate) fn new(registry: Rc<SchemaRegistry>, id: TypeId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        &self.registry
    }

    pub fn entry(&self) -> &TypeEntry {
        self.registry.entry(self.id)
    }

    pub fn path(&self) -> &str {
        self.entry().path()
    }

    fn same_as(&self, other: &ModelType) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry) && self.id == other.id
    }
}

type NodeRef = Rc<RefCell<Node>>;
type WeakNode = Weak<RefCell<Node>>;

enum Stored {
    Null,
    Scalar(Value),
    Reference(WeakNode),
    References(Vec<WeakNode>),
}

impl Stored {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            None => Stored::Null,
            Some(Value::Reference(instance)) => Stored::Reference(Rc::downgrade(&instance.0)),
            Some(Value::References(instances)) => {
                Stored::References(instances.iter().map(|i| Rc::downgrade(&i.0)).collect())
            }
            Some(scalar) => Stored::Scalar(scalar),
        }
    }

    fn to_value(&self) -> Option<Value> {
        match self {
            Stored::Null => None,
            Stored::Scalar(value) => Some(value.clone()),
            Stored::Reference(weak) => weak.upgrade().map(|rc| Value::Reference(Instance(rc))),
            Stored::References(weaks) => Some(Value::References(
                weaks
                    .iter()
                    .filter_map(|w| w.upgrade().map(Instance))
                    .collect(),
            )),
        }
    }
}

struct Node {
    ty: ModelType,
    values: IndexMap<String, Stored>,
    parent: Option<WeakNode>,
    /// One list per declared child type, indexed by the child's slot
    children: Vec<Vec<Instance>>,
}

/// Runtime object instantiated from a schema type
#[derive(Clone)]
pub struct Instance(NodeRef);

impl Instance {
    /// Validated construction.
    ///
    /// Required scalar fields must be present and non-null; present values are
    /// kind-checked and run through the field's validator. Reference fields
    /// may be left out. Keys matching no declared field are kept and reported
    /// as warnings.
    pub fn new(
        ty: &ModelType,
        values: Attributes,
        reporter: &dyn Reporter,
    ) -> Result<Instance, ValidationError> {
        let entry = ty.entry();
        let type_path = entry.path();

        for (name, descriptor) in entry.fields() {
            match values.get(name) {
                Some(Some(value)) => check_value(type_path, name, descriptor, value)?,
                Some(None) | None => {
                    if !descriptor.is_optional() && !descriptor.is_reference() {
                        return Err(ValidationError::MissingAttribute {
                            type_path: type_path.to_string(),
                            field: name.clone(),
                        });
                    }
                }
            }
        }

        let undeclared: Vec<&String> = values
            .keys()
            .filter(|k| entry.field(k).is_none() && k.as_str() != TEXT_FIELD)
            .collect();
        if !undeclared.is_empty() {
            reporter.report(Diagnostic::warning(
                DiagnosticKind::UndeclaredValue,
                format!(
                    "'{}': assigning undefined attributes: {:?}",
                    type_path, undeclared
                ),
            ));
        }

        let node = Node {
            ty: ty.clone(),
            values: values
                .into_iter()
                .map(|(k, v)| (k, Stored::from_value(v)))
                .collect(),
            parent: None,
            children: vec![Vec::new(); entry.children().len()],
        };
        Ok(Instance(Rc::new(RefCell::new(node))))
    }

    pub fn model_type(&self) -> ModelType {
        self.0.borrow().ty.clone()
    }

    pub fn type_id(&self) -> TypeId {
        self.0.borrow().ty.id
    }

    /// Qualified path of this instance's schema type
    pub fn type_path(&self) -> String {
        self.0.borrow().ty.path().to_string()
    }

    /// Simple name of this instance's schema type
    pub fn type_name(&self) -> String {
        self.0.borrow().ty.entry().name().to_string()
    }

    pub fn is_root_type(&self) -> bool {
        self.0.borrow().ty.entry().is_root()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the shared node, stable while any handle is alive
    pub(crate) fn node_key(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Current value of a field; `None` when unset, null, or a dropped reference
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().values.get(name).and_then(Stored::to_value)
    }

    /// Like [`Instance::get`], but applies the declared default on first read
    pub fn get_or_default(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }
        let default = {
            let node = self.0.borrow();
            node.ty.entry().field(name)?.default_value().cloned()?
        };
        self.0
            .borrow_mut()
            .values
            .insert(name.to_string(), Stored::Scalar(default.clone()));
        Some(default)
    }

    pub fn has(&self, name: &str) -> bool {
        self.0
            .borrow()
            .values
            .get(name)
            .is_some_and(|s| !matches!(s, Stored::Null))
    }

    /// Trimmed element text, if any
    pub fn text(&self) -> Option<String> {
        self.get(TEXT_FIELD)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Typed assignment of a declared field (or `text`).
    ///
    /// Checks the kind, the allowed target types for references, and the
    /// field's validator. `None` clears the field; required scalar fields
    /// cannot be cleared.
    pub fn set(&self, name: &str, value: Option<Value>) -> Result<(), ValidationError> {
        {
            let node = self.0.borrow();
            let entry = node.ty.entry();
            let type_path = entry.path();
            match entry.field(name) {
                Some(descriptor) => match &value {
                    Some(v) => check_value(type_path, name, descriptor, v)?,
                    None => {
                        if !descriptor.is_optional() && !descriptor.is_reference() {
                            return Err(ValidationError::MissingAttribute {
                                type_path: type_path.to_string(),
                                field: name.to_string(),
                            });
                        }
                    }
                },
                None if name == TEXT_FIELD => {
                    if let Some(v) = &value
                        && v.kind() != FieldKind::String
                    {
                        return Err(ValidationError::TypeMismatch {
                            type_path: type_path.to_string(),
                            field: name.to_string(),
                            value: v.to_string(),
                            expected: FieldKind::String,
                        });
                    }
                }
                None => {
                    return Err(ValidationError::UnknownField {
                        type_path: type_path.to_string(),
                        field: name.to_string(),
                    });
                }
            }
        }
        self.0
            .borrow_mut()
            .values
            .insert(name.to_string(), Stored::from_value(value));
        Ok(())
    }

    /// Non-null, non-reference values in declaration order, `text` last
    pub fn scalar_values(&self) -> Vec<(String, Value)> {
        let node = self.0.borrow();
        let entry = node.ty.entry();
        let mut out: Vec<(String, Value)> = entry
            .fields()
            .iter()
            .filter(|(name, d)| !d.is_reference() && name.as_str() != TEXT_FIELD)
            .filter_map(|(name, _)| match node.values.get(name) {
                Some(Stored::Scalar(v)) => Some((name.clone(), v.clone())),
                _ => None,
            })
            .collect();
        if let Some(Stored::Scalar(v)) = node.values.get(TEXT_FIELD) {
            out.push((TEXT_FIELD.to_string(), v.clone()));
        }
        out
    }

    pub fn parent(&self) -> Option<Instance> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Instance)
    }

    /// Attach this instance under `parent`.
    ///
    /// Detaches from any current parent first. Fails when `parent`'s type does
    /// not declare this type as a child, or when the insertion takes the
    /// parent's child list past the type's upper bound (the instance stays
    /// attached in that case).
    pub fn set_parent(&self, parent: &Instance) -> StructuralResult<()> {
        let child_ty = self.model_type();
        let parent_ty = parent.model_type();
        let child_entry = child_ty.entry();

        let declared = Rc::ptr_eq(child_ty.registry(), parent_ty.registry())
            && child_entry.parent() == Some(parent_ty.id());
        let slot = match (declared, child_entry.slot()) {
            (true, Some(slot)) => slot,
            _ => {
                return Err(StructuralError::NotAChildType {
                    parent: parent_ty.path().to_string(),
                    child: child_ty.path().to_string(),
                });
            }
        };

        self.remove_from_parent()?;

        let count = {
            let mut node = parent.0.borrow_mut();
            node.children[slot].push(self.clone());
            node.children[slot].len()
        };
        self.0.borrow_mut().parent = Some(Rc::downgrade(&parent.0));

        let cardinality = child_entry.cardinality();
        if cardinality.is_exceeded_by(count) {
            return Err(StructuralError::Capacity {
                parent: parent_ty.path().to_string(),
                child: child_ty.path().to_string(),
                count,
                expected: cardinality,
            });
        }
        Ok(())
    }

    /// Detach from the current parent; a no-op when already detached
    pub fn remove_from_parent(&self) -> StructuralResult<()> {
        let (slot, parent) = {
            let node = self.0.borrow();
            let entry = node.ty.entry();
            let slot = entry.slot().ok_or_else(|| StructuralError::RootType {
                path: entry.path().to_string(),
            })?;
            (slot, node.parent.as_ref().and_then(Weak::upgrade))
        };

        if let Some(parent) = parent {
            parent.borrow_mut().children[slot].retain(|c| !Rc::ptr_eq(&c.0, &self.0));
        }
        self.0.borrow_mut().parent = None;
        Ok(())
    }

    pub fn append_child(&self, child: &Instance) -> StructuralResult<()> {
        child.set_parent(self)
    }

    pub fn remove_child(&self, child: &Instance) -> StructuralResult<()> {
        match child.parent() {
            Some(p) if p.ptr_eq(self) => child.remove_from_parent(),
            _ => Err(StructuralError::NotParent {
                parent: self.type_path(),
                child: child.type_path(),
            }),
        }
    }

    /// Snapshot of every child, grouped in declared child-type order
    pub fn children(&self) -> Vec<Instance> {
        self.0.borrow().children.iter().flatten().cloned().collect()
    }

    /// Direct children whose type matches `name` (simple name or qualified path)
    pub fn children_of_type(&self, name: &str) -> Vec<Instance> {
        let node = self.0.borrow();
        let registry = node.ty.registry();
        node.ty
            .entry()
            .children()
            .iter()
            .zip(node.children.iter())
            .filter(|(id, _)| type_matches(registry.entry(**id), name))
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    /// Children of type `name`, optionally searching the whole subtree.
    ///
    /// Recursive results are in pre-order.
    pub fn find_children(&self, name: &str, recursive: bool) -> Vec<Instance> {
        if !recursive {
            return self.children_of_type(name);
        }
        let mut found = Vec::new();
        for child in self.children() {
            if type_matches(child.model_type().entry(), name) {
                found.push(child.clone());
            }
            found.extend(child.find_children(name, true));
        }
        found
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.iter().map(Vec::len).sum()
    }
}

fn type_matches(entry: &TypeEntry, name: &str) -> bool {
    entry.name() == name || entry.path() == name
}

fn check_value(
    type_path: &str,
    name: &str,
    descriptor: &FieldDescriptor,
    value: &Value,
) -> Result<(), ValidationError> {
    if !descriptor.accepts_kind(value) {
        return Err(ValidationError::TypeMismatch {
            type_path: type_path.to_string(),
            field: name.to_string(),
            value: value.to_string(),
            expected: descriptor.kind(),
        });
    }

    let targets: &[Instance] = match value {
        Value::Reference(target) => std::slice::from_ref(target),
        Value::References(targets) => targets,
        _ => &[],
    };
    for target in targets {
        let target_path = target.type_path();
        if !descriptor.allows_target(&target_path) {
            return Err(ValidationError::ReferenceTarget {
                type_path: type_path.to_string(),
                field: name.to_string(),
                target: target_path,
                allowed: descriptor.targets().to_vec(),
            });
        }
    }

    if let Some(validator) = descriptor.validator()
        && !validator.is_valid(value)
    {
        return Err(ValidationError::ConstraintViolation {
            type_path: type_path.to_string(),
            field: name.to_string(),
            constraint: validator.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(node) => write!(f, "<class {}>", node.ty.path()),
            Err(_) => f.write_str("<class ?>"),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self
            .scalar_values()
            .into_iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "<class {}>: {{{}}}", self.type_path(), values.join(", "))
    }
}

// ModelType equality is identity of (registry, id)
impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}
