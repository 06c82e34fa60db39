//! Diagnostic sink
//!
//! Non-fatal findings (dropped attributes, unmapped schema branches,
//! unresolved references) are handed to a [`Reporter`] supplied by the caller
//! of the mapper and linker.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::document::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => f.write_str("debug"),
            Level::Info => f.write_str("info"),
            Level::Warning => f.write_str("warning"),
        }
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Element attribute with no matching field, dropped
    UndeclaredAttribute,
    /// Attribute naming a reference field, left for the linker
    ReferenceAttribute,
    /// Constructor value with no matching field, kept
    UndeclaredValue,
    /// Declared schema type with no element in the document
    UnmappedSchemaType,
    /// Resolver returned nothing
    UnresolvedReference,
    /// Resolver returned an empty list
    EmptyReference,
    /// Linker could not assign a resolved value
    LinkFailure,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::UndeclaredAttribute => "undeclared-attribute",
            DiagnosticKind::ReferenceAttribute => "reference-attribute",
            DiagnosticKind::UndeclaredValue => "undeclared-value",
            DiagnosticKind::UnmappedSchemaType => "unmapped-schema-type",
            DiagnosticKind::UnresolvedReference => "unresolved-reference",
            DiagnosticKind::EmptyReference => "empty-reference",
            DiagnosticKind::LinkFailure => "link-failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(level: Level, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, kind, message)
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Level::Info, kind, message)
    }

    pub fn debug(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Level::Debug, kind, message)
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.level, self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// Receiver for non-fatal diagnostics
pub trait Reporter {
    fn report(&self, diagnostic: Diagnostic);
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing` events and counts warnings
#[derive(Debug, Default)]
pub struct TracingReporter {
    warnings: Cell<usize>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> usize {
        self.warnings.get()
    }
}

impl Reporter for TracingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        let kind = diagnostic.kind.to_string();
        let location = diagnostic
            .location
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        match diagnostic.level {
            Level::Warning => {
                self.warnings.set(self.warnings.get() + 1);
                tracing::warn!(kind = %kind, location = %location, "{}", diagnostic.message);
            }
            Level::Info => {
                tracing::info!(kind = %kind, location = %location, "{}", diagnostic.message);
            }
            Level::Debug => {
                tracing::debug!(kind = %kind, location = %location, "{}", diagnostic.message);
            }
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for std::rc::Rc<R> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}
