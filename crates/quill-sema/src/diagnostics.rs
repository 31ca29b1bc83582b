//! The diagnostics sink and ariadne-based rendering of semantic errors.
//!
//! Passes set the current source context before working on a node and
//! report errors against it. Reports accumulate; nothing here aborts a pass.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use rowan::TextRange;

use crate::error::{SemanticError, SemanticErrorKind};

/// Accumulates semantic errors with the source context active at report time.
#[derive(Debug, Default)]
pub struct Diagnostics {
    context: Option<TextRange>,
    errors: Vec<SemanticError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `loc` the context of subsequent reports.
    pub fn set_context(&mut self, loc: TextRange) {
        self.context = Some(loc);
    }

    pub fn context(&self) -> Option<TextRange> {
        self.context
    }

    pub fn report(&mut self, kind: SemanticErrorKind) {
        log::debug!("semantic error: {}", kind);
        self.errors.push(SemanticError {
            kind,
            loc: self.context,
        });
    }

    /// Report against an explicit location, leaving the context untouched.
    pub fn report_at(&mut self, loc: TextRange, kind: SemanticErrorKind) {
        log::debug!("semantic error: {}", kind);
        self.errors.push(SemanticError {
            kind,
            loc: Some(loc),
        });
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Drain the accumulated errors.
    pub fn take(&mut self) -> Vec<SemanticError> {
        std::mem::take(&mut self.errors)
    }

    pub fn render_all(&self, source: &str, filename: &str) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| render_diagnostic(e, source, filename))
            .collect()
    }
}

// ── Error Codes ────────────────────────────────────────────────────────

fn error_code(kind: &SemanticErrorKind) -> &'static str {
    match kind {
        SemanticErrorKind::DuplicateName { .. } => "Q0001",
        SemanticErrorKind::UnresolvedIdentifier { .. } => "Q0002",
        SemanticErrorKind::UnknownType { .. } => "Q0003",
        SemanticErrorKind::UnknownMember { .. } => "Q0004",
        SemanticErrorKind::NoMatchingOverload { .. } => "Q0005",
        SemanticErrorKind::AmbiguousOverload { .. } => "Q0006",
        SemanticErrorKind::TypeMismatch { .. } => "Q0007",
        SemanticErrorKind::MissingSumDecomposition { .. } => "Q0008",
        SemanticErrorKind::TemplateNeverInstantiated { .. } => "Q0009",
        SemanticErrorKind::TemplateArity { .. } => "Q0010",
        SemanticErrorKind::TemplateArgumentKind { .. } => "Q0011",
        SemanticErrorKind::NotATemplate { .. } => "Q0012",
        SemanticErrorKind::MissingTemplateArguments { .. } => "Q0013",
        SemanticErrorKind::TemplateDepthExceeded { .. } => "Q0014",
        SemanticErrorKind::ShadowedName { .. } => "Q0015",
        SemanticErrorKind::RecursiveInference { .. } => "Q0016",
        SemanticErrorKind::NotAnLvalue => "Q0017",
        SemanticErrorKind::InvalidOperator { .. } => "Q0018",
        SemanticErrorKind::NotCallable { .. } => "Q0019",
    }
}

// ── Labels and help ────────────────────────────────────────────────────

fn label_message(kind: &SemanticErrorKind) -> String {
    match kind {
        SemanticErrorKind::DuplicateName { what, .. } => format!("{} declared again here", what),
        SemanticErrorKind::UnresolvedIdentifier { .. } => "not found in this scope".to_string(),
        SemanticErrorKind::UnknownType { .. } => "unknown type".to_string(),
        SemanticErrorKind::UnknownMember { member, .. } => format!("no member `{}`", member),
        SemanticErrorKind::NoMatchingOverload { .. } => {
            "no overload accepts these arguments".to_string()
        }
        SemanticErrorKind::AmbiguousOverload { candidates, .. } => {
            format!("{} overloads match", candidates.len())
        }
        SemanticErrorKind::TypeMismatch { expected, .. } => format!("expected {}", expected),
        SemanticErrorKind::MissingSumDecomposition { .. } => {
            "runtime dispatch is incomplete".to_string()
        }
        SemanticErrorKind::TemplateNeverInstantiated { .. } => "declared here".to_string(),
        SemanticErrorKind::TemplateArity { expected, .. } => {
            format!("expected {} template argument(s)", expected)
        }
        SemanticErrorKind::TemplateArgumentKind { .. } => "not a sum type".to_string(),
        SemanticErrorKind::NotATemplate { .. } => "template arguments given here".to_string(),
        SemanticErrorKind::MissingTemplateArguments { .. } => {
            "template arguments required".to_string()
        }
        SemanticErrorKind::TemplateDepthExceeded { .. } => "instantiated here".to_string(),
        SemanticErrorKind::ShadowedName { .. } => "declared here".to_string(),
        SemanticErrorKind::RecursiveInference { .. } => "recursive call here".to_string(),
        SemanticErrorKind::NotAnLvalue => "cannot assign to this".to_string(),
        SemanticErrorKind::InvalidOperator { arity, .. } => {
            format!("used with {} operand(s)", arity)
        }
        SemanticErrorKind::NotCallable { .. } => "called here".to_string(),
    }
}

fn help_text(kind: &SemanticErrorKind) -> Option<String> {
    match kind {
        SemanticErrorKind::MissingSumDecomposition { missing, .. } => Some(format!(
            "add overloads for: {}",
            missing.join("; ")
        )),
        SemanticErrorKind::ShadowedName { name, .. } => {
            Some(format!("rename `{}` to a name not already in scope", name))
        }
        SemanticErrorKind::RecursiveInference { .. } => {
            Some("declare the return type or add a literal-pattern base case".to_string())
        }
        SemanticErrorKind::MissingTemplateArguments { name } => {
            Some(format!("write `{}<...>` with concrete types", name))
        }
        SemanticErrorKind::AmbiguousOverload { candidates, .. } => {
            Some(format!("candidates: {}", candidates.join(", ")))
        }
        _ => None,
    }
}

fn text_range_to_range(range: TextRange) -> Range<usize> {
    let start: usize = range.start().into();
    let end: usize = range.end().into();
    start..end
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Render one semantic error with ariadne, without colors.
pub fn render_diagnostic(error: &SemanticError, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };

    let span = clamp(
        error
            .loc
            .map(text_range_to_range)
            .unwrap_or(0..source_len.min(1)),
    );

    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(error_code(&error.kind))
        .with_message(error.kind.to_string())
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(label_message(&error.kind))
                .with_color(Color::Red),
        );
    if let Some(help) = help_text(&error.kind) {
        builder.set_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return error.to_string();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn reports_carry_the_current_context() {
        let mut diags = Diagnostics::new();
        diags.report(SemanticErrorKind::NotAnLvalue);
        diags.set_context(range(3, 7));
        diags.report(SemanticErrorKind::UnresolvedIdentifier { name: "y".into() });

        let errors = diags.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].loc, None);
        assert_eq!(errors[1].loc, Some(range(3, 7)));
    }

    #[test]
    fn take_drains() {
        let mut diags = Diagnostics::new();
        diags.report(SemanticErrorKind::NotAnLvalue);
        assert!(diags.has_errors());
        assert_eq!(diags.take().len(), 1);
        assert!(!diags.has_errors());
    }

    #[test]
    fn rendering_includes_code_and_message() {
        let error = SemanticError {
            kind: SemanticErrorKind::UnresolvedIdentifier { name: "zz".into() },
            loc: Some(range(4, 6)),
        };
        let out = render_diagnostic(&error, "x = zz + 1", "main.ql");
        assert!(out.contains("Q0002"), "{}", out);
        assert!(out.contains("unresolved identifier `zz`"), "{}", out);
        assert!(out.contains("not found in this scope"), "{}", out);
    }

    #[test]
    fn rendering_without_location_still_works() {
        let error = SemanticError {
            kind: SemanticErrorKind::TemplateNeverInstantiated { name: "Box".into() },
            loc: None,
        };
        let out = render_diagnostic(&error, "structure Box<T>", "main.ql");
        assert!(out.contains("Q0009"), "{}", out);
    }
}
