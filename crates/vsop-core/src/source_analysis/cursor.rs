// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Positional read head over source text.
//!
//! A [`Cursor`] walks the input byte by byte, tracking the 1-based line and
//! column of the next unread byte. Pattern matching works by handing a
//! *clone* of the cursor to a predicate and committing the clone back on
//! success, so cloning must be cheap and position tracking must travel with
//! the clone.

use std::cmp::Ordering;

/// A 1-based line/column position in a source file.
///
/// Produced by the cursor, attached to every token and AST node, and
/// referenced by every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub column: u32,
}

impl Position {
    /// Creates a position from line and column.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A read head over the input text.
///
/// Cursors compare by byte offset; two cursors at the same offset are equal
/// regardless of how they got there. A cursor never rewinds — callers that
/// need backtracking keep a clone and write it back.
#[derive(Debug, Clone)]
pub struct Cursor<'src> {
    src: &'src [u8],
    offset: usize,
    line: u32,
    column: u32,
}

impl<'src> Cursor<'src> {
    /// Creates a cursor at the start of `source`.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            src: source.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// The next unread byte, or `None` past the end of input.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    /// Consumes one byte, updating line/column. No-op at end of input.
    pub fn advance(&mut self) {
        let Some(b) = self.peek() else { return };
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Byte offset from the start of input.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the next unread byte.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Returns `true` if the whole input has been consumed.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.offset >= self.src.len()
    }

    /// The bytes between `self` and a further-advanced cursor `end`.
    #[must_use]
    pub fn bytes_until(&self, end: &Cursor<'src>) -> &'src [u8] {
        &self.src[self.offset..end.offset]
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl Eq for Cursor<'_> {}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset.cmp(&other.offset)
    }
}
