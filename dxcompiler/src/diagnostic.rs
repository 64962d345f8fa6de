//! Diagnostics produced by every stage of the pipeline
//!
//! A diagnostic renders as a single line:
//!
//! ```text
//! shader.hlsl:4:12: error: use of undeclared identifier 'colr' [compile]
//! warning: unknown pragma ignored [preprocess]
//! ```

use std::fmt;

/// Pipeline stage a diagnostic originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Macro expansion, includes and conditionals
    Preprocess,
    /// Parsing and semantic checks
    Compile,
    /// Optimizer pass parsing and execution
    Optimize,
    /// Container validation
    Validate,
    /// Module to container assembly
    Assemble,
    /// Program listing
    Disassemble,
    /// Container parsing and part manipulation
    Container,
}

impl Stage {
    /// Returns the stage tag printed after each message
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Compile => "compile",
            Stage::Optimize => "optimize",
            Stage::Validate => "validate",
            Stage::Assemble => "assemble",
            Stage::Disassemble => "disassemble",
            Stage::Container => "container",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Additional context for a previous diagnostic
    Note,
    /// Suspicious but accepted input
    Warning,
    /// Input rejected, processing may continue
    Error,
    /// Input rejected, processing stopped
    Fatal,
}

impl Severity {
    /// Returns the label printed before the message
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        }
    }

    /// Returns true for errors and fatal errors
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

/// Location within a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// File name as the preprocessor saw it
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A single message from a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Originating stage
    pub stage: Stage,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Source location, when one applies
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Creates a diagnostic without a location
    pub fn new(stage: Stage, severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            stage,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Creates an error
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Error, message)
    }

    /// Creates a fatal error
    pub fn fatal(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Fatal, message)
    }

    /// Creates a warning
    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Warning, message)
    }

    /// Creates a note
    pub fn note(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Note, message)
    }

    /// Attaches a source location
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Returns true for errors and fatal errors
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(
            f,
            "{}: {} [{}]",
            self.severity.label(),
            self.message,
            self.stage
        )
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    /// Appends a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Appends every diagnostic from `other`
    pub fn append(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Returns true if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if any error or fatal error was reported
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Number of errors and fatal errors
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    /// Number of warnings
    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Turns every warning into an error
    pub fn promote_warnings(&mut self) {
        for d in &mut self.items {
            if d.severity == Severity::Warning {
                d.severity = Severity::Error;
            }
        }
    }

    /// Drops every warning
    pub fn drop_warnings(&mut self) {
        self.items.retain(|d| d.severity != Severity::Warning);
    }

    /// Iterates over the diagnostics in report order
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Renders every diagnostic, one per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for d in &self.items {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Diagnostics {
            items: vec![diagnostic],
        }
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_location() {
        let d = Diagnostic::error(Stage::Compile, "use of undeclared identifier 'x'")
            .at(SourceLocation::new("a.hlsl", 3, 7));
        assert_eq!(
            d.to_string(),
            "a.hlsl:3:7: error: use of undeclared identifier 'x' [compile]"
        );
    }

    #[test]
    fn test_render_without_location() {
        let d = Diagnostic::fatal(Stage::Preprocess, "'x.h' file not found");
        assert_eq!(
            d.to_string(),
            "fatal error: 'x.h' file not found [preprocess]"
        );
    }

    #[test]
    fn test_promote_and_drop_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(Stage::Compile, "w"));
        diags.push(Diagnostic::note(Stage::Compile, "n"));
        assert!(!diags.has_errors());

        let mut promoted = diags.clone();
        promoted.promote_warnings();
        assert_eq!(promoted.error_count(), 1);

        diags.drop_warnings();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.warning_count(), 0);
    }
}
