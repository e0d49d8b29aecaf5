// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Parsing: the bridge from the token stream to the AST.
//!
//! A hand-written recursive-descent parser with operator-precedence
//! expression parsing. Syntax errors are reported positionally and the
//! parser re-synchronizes on declaration boundaries, so a single run
//! surfaces several errors.

mod parser;

#[cfg(test)]
mod property_tests;

pub use parser::parse_program;
