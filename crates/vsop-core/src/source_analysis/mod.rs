// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for VSOP source code.
//!
//! This module converts source text into a stream of [`Token`]s. The lexer
//! is built on a small pattern-combinator engine ([`pattern`]) driving a
//! positional [`Cursor`], rather than being hand-fused: each token kind is
//! described by a composable [`pattern::Pattern`], and the driver picks the
//! longest match across the rule table.

mod cursor;
mod lexer;
pub mod pattern;
mod token;

#[cfg(test)]
mod lexer_property_tests;

pub use cursor::{Cursor, Position};
pub use lexer::{canonical_decode, canonical_encode, Dialect, Lexer};
pub use token::{Keyword, Token, TokenKind};
