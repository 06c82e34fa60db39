//! Cross-document reference linking
//!
//! Reference fields are left empty by the mapper. Once every document of a
//! session is mapped, a [`Linker`] walks all forests and fills each reference
//! field by calling the resolver declared on its descriptor.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{ConfigurationError, ValidationError};
use crate::field::{FieldKind, Value};
use crate::mapper::Forest;
use crate::model::Instance;
use crate::registry::SchemaRegistry;
use crate::reporter::{Diagnostic, DiagnosticKind, Reporter};

/// Resolver callback of a reference field
pub type Resolver = Rc<dyn Fn(&LinkContext<'_>, &Instance) -> Option<Resolved>>;

/// Wrap a closure as a [`Resolver`]
pub fn resolver<F>(f: F) -> Resolver
where
    F: Fn(&LinkContext<'_>, &Instance) -> Option<Resolved> + 'static,
{
    Rc::new(f)
}

/// What a resolver found
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    One(Instance),
    Many(Vec<Instance>),
}

impl Resolved {
    /// Value holding only instances in `owned`, and how many were left out
    fn retain_owned(self, owned: &HashSet<*const ()>) -> (Option<Value>, usize) {
        match self {
            Resolved::One(instance) if owned.contains(&instance.node_key()) => {
                (Some(Value::Reference(instance)), 0)
            }
            Resolved::One(_) => (None, 1),
            Resolved::Many(instances) => {
                let total = instances.len();
                let kept: Vec<Instance> = instances
                    .into_iter()
                    .filter(|i| owned.contains(&i.node_key()))
                    .collect();
                let dropped = total - kept.len();
                (Some(Value::References(kept)), dropped)
            }
        }
    }
}

impl From<Instance> for Resolved {
    fn from(instance: Instance) -> Self {
        Resolved::One(instance)
    }
}

impl From<Vec<Instance>> for Resolved {
    fn from(instances: Vec<Instance>) -> Self {
        Resolved::Many(instances)
    }
}

/// Everything a resolver may look at
pub struct LinkContext<'a> {
    environment: Option<&'a dyn Any>,
    forests: &'a [Forest],
}

impl<'a> LinkContext<'a> {
    pub fn new(environment: Option<&'a dyn Any>, forests: &'a [Forest]) -> Self {
        Self {
            environment,
            forests,
        }
    }

    /// The caller's environment, if one of type `T` was set
    pub fn env<T: Any>(&self) -> Option<&'a T> {
        self.environment.and_then(|env| env.downcast_ref::<T>())
    }

    pub fn forests(&self) -> &'a [Forest] {
        self.forests
    }

    /// Instances of type `name` (simple name or qualified path) across all forests
    pub fn instances_of(&self, name: &str) -> Vec<Instance> {
        self.forests.iter().flat_map(|f| f.of_type(name)).collect()
    }
}

/// Counts of one [`Linker::link`] pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub instances: usize,
    /// Reference fields that now hold what their resolver found
    pub assigned: usize,
    /// Resolvers that found nothing, or instances outside the forests
    pub unresolved: usize,
    pub empty: usize,
    pub failed: usize,
}

pub struct Linker {
    forests: Vec<Forest>,
    registries: Vec<Rc<SchemaRegistry>>,
    environment: Option<Box<dyn Any>>,
    reporter: Rc<dyn Reporter>,
}

impl Linker {
    /// Check every reference field of every registry before any linking work.
    ///
    /// Fails when a field has no resolver, when a declared target type exists
    /// in none of the registries, or when a forest was mapped with a registry
    /// not in `registries`.
    pub fn new(
        forests: Vec<Forest>,
        registries: Vec<Rc<SchemaRegistry>>,
        reporter: Rc<dyn Reporter>,
    ) -> Result<Self, ConfigurationError> {
        for forest in &forests {
            if !registries.iter().any(|r| Rc::ptr_eq(r, forest.registry())) {
                return Err(ConfigurationError::UnregisteredSchema {
                    source_id: forest.source().to_string(),
                });
            }
        }

        for registry in &registries {
            for entry in registry.types() {
                for (name, descriptor) in entry.reference_fields() {
                    if descriptor.resolver().is_none() {
                        return Err(ConfigurationError::MissingResolver {
                            type_path: entry.path().to_string(),
                            field: name.clone(),
                        });
                    }
                    if let Some(target) = descriptor
                        .targets()
                        .iter()
                        .find(|t| !target_exists(&registries, t))
                    {
                        return Err(ConfigurationError::UnknownTarget {
                            type_path: entry.path().to_string(),
                            field: name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            forests,
            registries,
            environment: None,
            reporter,
        })
    }

    /// Value handed to every resolver through [`LinkContext::env`]
    pub fn set_environment<T: Any>(&mut self, environment: T) {
        self.environment = Some(Box::new(environment));
    }

    pub fn forests(&self) -> &[Forest] {
        &self.forests
    }

    pub fn registries(&self) -> &[Rc<SchemaRegistry>] {
        &self.registries
    }

    pub fn into_forests(self) -> Vec<Forest> {
        self.forests
    }

    /// Resolve every reference field of every instance.
    ///
    /// Assignments are not rolled back. A failed assignment is reported and
    /// linking continues; the first failure is returned once the pass ends.
    /// Resolved instances owned by none of the forests are reported as
    /// unresolved and left out, since references do not keep targets alive.
    pub fn link(&self) -> Result<LinkReport, ValidationError> {
        let context = LinkContext::new(self.environment.as_deref(), &self.forests);
        let owned: HashSet<*const ()> = self
            .forests
            .iter()
            .flat_map(Forest::instances)
            .map(Instance::node_key)
            .collect();
        let mut report = LinkReport::default();
        let mut first_error: Option<ValidationError> = None;

        for forest in &self.forests {
            for (path, instance) in forest.iter() {
                report.instances += 1;
                let model_type = instance.model_type();

                for (name, descriptor) in model_type.entry().reference_fields() {
                    let Some(resolver) = descriptor.resolver() else {
                        continue;
                    };
                    let found = resolver(&context, instance);
                    let missing = || {
                        format!(
                            "Reference field '{}' of '{}' found nothing for '{}' at {} in {}",
                            name,
                            model_type.path(),
                            instance,
                            path,
                            forest.source()
                        )
                    };

                    let (value, resolved) = match (descriptor.kind(), found) {
                        (FieldKind::ReferenceArray, None) => {
                            report.unresolved += 1;
                            self.reporter.report(Diagnostic::warning(
                                DiagnosticKind::UnresolvedReference,
                                missing(),
                            ));
                            (Some(Value::References(Vec::new())), false)
                        }
                        (_, None) => {
                            report.unresolved += 1;
                            self.reporter.report(Diagnostic::warning(
                                DiagnosticKind::UnresolvedReference,
                                missing(),
                            ));
                            (None, false)
                        }
                        (FieldKind::ReferenceArray, Some(Resolved::Many(targets)))
                            if targets.is_empty() =>
                        {
                            report.empty += 1;
                            self.reporter.report(Diagnostic::info(
                                DiagnosticKind::EmptyReference,
                                missing(),
                            ));
                            (Some(Value::References(targets)), false)
                        }
                        (_, Some(found)) => {
                            let (value, dropped) = found.retain_owned(&owned);
                            if dropped > 0 {
                                report.unresolved += 1;
                                self.reporter.report(Diagnostic::warning(
                                    DiagnosticKind::UnresolvedReference,
                                    format!(
                                        "Reference field '{}' of '{}' at {} in {} resolved to {} instance(s) outside the linked forests",
                                        name,
                                        model_type.path(),
                                        path,
                                        forest.source(),
                                        dropped
                                    ),
                                ));
                            }
                            (value, dropped == 0)
                        }
                    };

                    match instance.set(name, value) {
                        Ok(()) if resolved => report.assigned += 1,
                        Ok(()) => {}
                        Err(err) => {
                            report.failed += 1;
                            self.reporter.report(Diagnostic::warning(
                                DiagnosticKind::LinkFailure,
                                format!("{} in {}: {}", path, forest.source(), err),
                            ));
                            first_error.get_or_insert(err);
                        }
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

fn target_exists(registries: &[Rc<SchemaRegistry>], target: &str) -> bool {
    registries.iter().any(|r| {
        r.contains(target) || (!target.contains('.') && r.types().any(|t| t.name() == target))
    })
}

/// Resolver matching a key field of the source instance against a key field
/// of every instance of `target_type`.
///
/// With `many == false` the first match is returned; otherwise all matches.
/// Nothing is found when the source has no key value.
pub fn key_lookup(
    source_field: impl Into<String>,
    target_type: impl Into<String>,
    target_field: impl Into<String>,
    many: bool,
) -> Resolver {
    let source_field = source_field.into();
    let target_type = target_type.into();
    let target_field = target_field.into();

    resolver(move |context, instance| {
        let key = instance.get(&source_field)?;
        let mut matches = context
            .instances_of(&target_type)
            .into_iter()
            .filter(|candidate| candidate.get(&target_field).as_ref() == Some(&key));
        if many {
            Some(Resolved::Many(matches.collect()))
        } else {
            matches.next().map(Resolved::One)
        }
    })
}
