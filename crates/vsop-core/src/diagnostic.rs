// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Positional diagnostics accumulated across compilation stages.
//!
//! Every stage of the pipeline reports problems as [`Diagnostic`] values and
//! keeps going; the driver prints the collected list at the end and uses its
//! length as the process exit code. A diagnostic renders as
//! `<line>:<column>: <stage> error: <message>` — the driver prepends the
//! file name. Diagnostics also implement [`miette::Diagnostic`] so drivers
//! can hand them to a fancy report handler instead.

use ecow::EcoString;
use thiserror::Error;

use crate::source_analysis::Position;

/// The pipeline stage a diagnostic originates from.
///
/// The stage selects the `<lexical|syntax|semantic>` word of the rendered
/// message. Verifier failures in the IR library are reported as
/// [`Stage::Internal`] — they indicate a compiler bug, not a source bug —
/// but still count towards the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
    Internal,
}

impl Stage {
    /// The word used in the rendered diagnostic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Syntax => "syntax",
            Self::Semantic => "semantic",
            Self::Internal => "internal",
        }
    }
}

/// A single positional diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
#[error("{}:{}: {} error: {}", .pos.line, .pos.column, .stage.as_str(), .message)]
#[diagnostic(code(vsopc::diagnostic))]
pub struct Diagnostic {
    /// Stage that produced the diagnostic.
    pub stage: Stage,
    /// Human-readable message, without position or stage prefix.
    pub message: EcoString,
    /// Source position the message refers to.
    pub pos: Position,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(stage: Stage, message: impl Into<EcoString>, pos: Position) -> Self {
        Self {
            stage,
            message: message.into(),
            pos,
        }
    }

    /// Creates a lexical-stage diagnostic.
    #[must_use]
    pub fn lexical(message: impl Into<EcoString>, pos: Position) -> Self {
        Self::new(Stage::Lexical, message, pos)
    }

    /// Creates a syntax-stage diagnostic.
    #[must_use]
    pub fn syntax(message: impl Into<EcoString>, pos: Position) -> Self {
        Self::new(Stage::Syntax, message, pos)
    }

    /// Creates a semantic-stage diagnostic.
    #[must_use]
    pub fn semantic(message: impl Into<EcoString>, pos: Position) -> Self {
        Self::new(Stage::Semantic, message, pos)
    }

    /// Creates an internal-consistency diagnostic.
    #[must_use]
    pub fn internal(message: impl Into<EcoString>, pos: Position) -> Self {
        Self::new(Stage::Internal, message, pos)
    }
}

/// Accumulator for diagnostics across all stages.
///
/// Components receive a `&mut Diagnostics` and push into it; nothing short
/// of an I/O failure aborts the pipeline early.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.list.push(diagnostic);
    }

    /// Number of diagnostics collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterates over the collected diagnostics in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.into_iter()
    }
}
