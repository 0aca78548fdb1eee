//! Diagnostic reporting for lowering failures
//!
//! Wraps `codespan-reporting` so a host can render a [`LowerError`] against
//! the source text it parsed.

use awaitless_ast::Span;
use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use termcolor::{ColorChoice, NoColor, StandardStream};

use crate::error::LowerError;

/// Error code for a diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        self.0
    }
}

/// A diagnostic message with source code context
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    code: Option<ErrorCode>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            inner: CsDiagnostic::new(severity).with_message(message),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Internal invariant failures are reported as bugs
    pub fn bug(message: impl Into<String>) -> Self {
        Self::new(Severity::Bug, message)
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code.clone());
        self.inner = self.inner.with_code(code.0);
        self
    }

    /// Add a primary label (main error location)
    pub fn with_primary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        let label = Label::primary(SOURCE, span.start..span.end).with_message(message);
        self.inner.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.notes.push(format!("help: {}", help.into()));
        self
    }

    /// Create diagnostic from a LowerError
    pub fn from_lower_error(error: &LowerError) -> Self {
        match error {
            LowerError::UnsupportedConstruct { construct, span } => {
                Diagnostic::error(format!("'{}' cannot be used inside an async function", construct))
                    .with_code(error_code(error))
                    .with_primary_label(*span, "unsupported here")
                    .with_help("move the construct into a separate synchronous function")
            }

            LowerError::AwaitOutsideAsync { span } => {
                Diagnostic::error("'await' is only valid inside async functions")
                    .with_code(error_code(error))
                    .with_primary_label(*span, "not inside an async function")
            }

            LowerError::Internal { message, span } => {
                let mut diag = Diagnostic::bug(format!("Internal lowering error: {}", message))
                    .with_code(error_code(error));
                if !span.is_synthetic() {
                    diag = diag.with_primary_label(*span, "while lowering this");
                }
                diag.with_note("this is a defect in the lowering, not in the input program")
            }
        }
    }

    /// Render against the source text the tree was parsed from, without
    /// colors
    pub fn render(&self, name: &str, source: &str) -> Result<String, codespan_reporting::files::Error> {
        let files = source_files(name, source);
        let mut writer = NoColor::new(Vec::new());
        term::emit(&mut writer, &term::Config::default(), &files, &self.inner)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// Emit to stderr with colors
    pub fn emit(&self, name: &str, source: &str) -> Result<(), codespan_reporting::files::Error> {
        let files = source_files(name, source);
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        term::emit(&mut writer, &term::Config::default(), &files, &self.inner)
    }

    /// Get the underlying codespan diagnostic
    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }
}

/// Get error code for a LowerError
pub fn error_code(error: &LowerError) -> ErrorCode {
    match error {
        LowerError::UnsupportedConstruct { .. } => ErrorCode("E4001"),
        LowerError::AwaitOutsideAsync { .. } => ErrorCode("E4002"),
        LowerError::Internal { .. } => ErrorCode("E4900"),
    }
}

/// The single source a diagnostic is rendered against
const SOURCE: usize = 0;

fn source_files(name: &str, source: &str) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(name.to_string(), source.to_string());
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_construct_diagnostic() {
        let error = LowerError::UnsupportedConstruct {
            construct: "eval".to_string(),
            span: Span::new(22, 30, 1, 23),
        };
        let diag = Diagnostic::from_lower_error(&error);
        assert_eq!(diag.code(), Some(&ErrorCode("E4001")));
        assert_eq!(diag.inner().severity, Severity::Error);
        assert_eq!(diag.inner().labels.len(), 1);
        assert_eq!(diag.inner().labels[0].range, 22..30);
    }

    #[test]
    fn test_internal_error_without_location() {
        let error = LowerError::Internal {
            message: "missing statement ancestor".to_string(),
            span: Span::default(),
        };
        let diag = Diagnostic::from_lower_error(&error);
        assert_eq!(diag.inner().severity, Severity::Bug);
        assert!(diag.inner().labels.is_empty());
        assert_eq!(error_code(&error).as_str(), "E4900");
    }

    #[test]
    fn test_render_points_at_the_construct() {
        let source = "async function f() { eval(x); }";
        let error = LowerError::UnsupportedConstruct {
            construct: "eval".to_string(),
            span: Span::new(21, 28, 1, 22),
        };
        let rendered = Diagnostic::from_lower_error(&error)
            .render("input.js", source)
            .unwrap();
        assert!(rendered.contains("error[E4001]"), "{}", rendered);
        assert!(rendered.contains("input.js:1:22"), "{}", rendered);
        assert!(rendered.contains("unsupported here"), "{}", rendered);
        assert!(rendered.contains("help: move the construct"), "{}", rendered);
    }

    #[test]
    fn test_render_await_outside_async() {
        let source = "function g() { await p; }";
        let error = LowerError::AwaitOutsideAsync {
            span: Span::new(15, 22, 1, 16),
        };
        let rendered = Diagnostic::from_lower_error(&error)
            .render("input.js", source)
            .unwrap();
        assert!(rendered.contains("error[E4002]"), "{}", rendered);
        assert!(rendered.contains("not inside an async function"), "{}", rendered);
    }
}
