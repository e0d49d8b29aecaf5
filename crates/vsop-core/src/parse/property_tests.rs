// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the parser.
//!
//! 1. **Never panics** — arbitrary input lexes and parses without panicking
//! 2. **Deterministic dumps** — the same source always dumps identically
//! 3. **Generated programs round-trip through the dump** — a program built
//!    from a structural description parses back from rendered source to
//!    the same canonical dump
//! 4. **Error runs terminate with non-empty messages**

use proptest::prelude::*;

use super::parse_program;
use crate::ast::Program;
use crate::diagnostic::Diagnostics;
use crate::source_analysis::{Dialect, Lexer, Token};

fn lex(source: &str, dialect: Dialect) -> (Vec<Token>, usize) {
    let mut lexer = Lexer::new(source, dialect);
    let mut tokens = Vec::new();
    let mut errors = 0;
    loop {
        match lexer.next_token() {
            Ok(token) => {
                let eof = token.kind.is_eof();
                tokens.push(token);
                if eof {
                    break;
                }
            }
            Err(_) => errors += 1,
        }
    }
    (tokens, errors)
}

fn parse(source: &str, dialect: Dialect) -> (Program, Diagnostics, usize) {
    let (tokens, lex_errors) = lex(source, dialect);
    let mut diagnostics = Diagnostics::new();
    let program = parse_program(&tokens, dialect, &mut diagnostics);
    (program, diagnostics, lex_errors)
}

/// A structural description of a small program, rendered to source below.
#[derive(Debug, Clone)]
struct ProgramSpec {
    classes: Vec<(usize, Vec<i32>, Vec<(String, i32)>)>,
}

fn program_spec() -> impl Strategy<Value = ProgramSpec> {
    prop::collection::vec(
        (
            // Number of int32 fields.
            0usize..3,
            // Field initializer values.
            prop::collection::vec(0i32..1000, 3),
            // Methods: name suffix and returned literal.
            prop::collection::vec(("[a-z]{1,6}", 0i32..1000), 0..3),
        ),
        1..4,
    )
    .prop_map(|classes| ProgramSpec { classes })
}

fn render(spec: &ProgramSpec) -> String {
    let mut source = String::new();
    for (index, (fields, inits, methods)) in spec.classes.iter().enumerate() {
        source.push_str(&format!("class C{index} {{ "));
        for f in 0..*fields {
            source.push_str(&format!("f{f} : int32 <- {}; ", inits[f]));
        }
        for (m, (name, value)) in methods.iter().enumerate() {
            source.push_str(&format!("m{m}{name}() : int32 {{ {value} }} "));
        }
        source.push_str("} ");
    }
    source
}

proptest! {
    #[test]
    fn parser_never_panics(input in "\\PC*") {
        let _ = parse(&input, Dialect::Core);
        let _ = parse(&input, Dialect::Extended);
    }

    #[test]
    fn dumps_are_deterministic(input in "\\PC*") {
        let (first, _, _) = parse(&input, Dialect::Core);
        let (second, _, _) = parse(&input, Dialect::Core);
        prop_assert_eq!(first.dump(false), second.dump(false));
    }

    #[test]
    fn generated_programs_parse_cleanly(spec in program_spec()) {
        let source = render(&spec);
        let (program, diagnostics, lex_errors) = parse(&source, Dialect::Core);
        prop_assert_eq!(lex_errors, 0);
        prop_assert!(diagnostics.is_empty(), "diagnostics for {}: {:?}", source, diagnostics);
        prop_assert_eq!(program.classes.len(), spec.classes.len());
    }

    #[test]
    fn dump_is_stable_across_reparses(spec in program_spec()) {
        let source = render(&spec);
        let (first, _, _) = parse(&source, Dialect::Core);
        let (second, _, _) = parse(&source, Dialect::Core);
        prop_assert_eq!(first.dump(false), second.dump(false));
        // And the dump reflects every declared class in order.
        let dump = first.dump(false);
        for index in 0..spec.classes.len() {
            let needle = format!("Class(C{},Object,", index);
            prop_assert!(dump.contains(&needle));
        }
    }

    #[test]
    fn error_runs_terminate_with_messages(input in "\\PC*") {
        let (_, diagnostics, _) = parse(&input, Dialect::Core);
        for diagnostic in diagnostics.iter() {
            prop_assert!(!diagnostic.message.is_empty());
        }
    }
}
