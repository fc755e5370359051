//! Human-readable rendering of accumulated diagnostics.
//!
//! Each diagnostic renders independently: with a source attached it becomes
//! an annotate-snippets report with a caret under the offending span,
//! otherwise it falls back to the one-line `Display` form. The printer is
//! configured fluently from [`Diagnostics::printer`].

use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet};

use super::collection::Diagnostics;
use super::message::Diagnostic;
use crate::span::Span;

/// Fluent configuration for rendering a [`Diagnostics`] collection.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self {
            diagnostics,
            source: None,
            path: None,
            colored: false,
        }
    }

    /// Attach the source text; enables caret snippets.
    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    /// Label snippets with an origin path.
    pub fn path(mut self, path: &'s str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    /// Renders every diagnostic, one report per diagnostic, joined with
    /// newlines. Empty collections render as the empty string.
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(|diag| self.render_one(diag))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_one(&self, diag: &Diagnostic) -> String {
        let Some(source) = self.source else {
            return diag.to_string();
        };

        let mut snippet = Snippet::source(source).line_start(1).annotation(
            AnnotationKind::Primary
                .span(caret_range(diag.span, source.len()))
                .label(&diag.message),
        );
        if let Some(path) = self.path {
            snippet = snippet.path(path);
        }

        let title = format!("{} error: {}", diag.kind, diag.message);
        let report = [Level::ERROR.primary_title(&title).element(snippet)];

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };
        format!("{}", renderer.render(&report))
    }
}

/// End-of-input diagnostics carry a zero-width span; the caret still needs
/// one column to sit under.
fn caret_range(span: Span, source_len: usize) -> std::ops::Range<usize> {
    let range = std::ops::Range::<usize>::from(span);
    if range.is_empty() {
        range.start..(range.start + 1).min(source_len)
    } else {
        range
    }
}
