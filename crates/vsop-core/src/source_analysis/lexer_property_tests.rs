// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the lexer.
//!
//! These use `proptest` to verify lexer invariants over generated inputs:
//!
//! 1. **Never panics** — arbitrary input always lexes to tokens or errors
//! 2. **Deterministic** — the same input always produces the same stream
//! 3. **Longest match** — concatenations of valid tokens re-lex to exactly
//!    those tokens
//! 4. **Keyword priority** — reserved words never lex as identifiers
//! 5. **Canonical form is idempotent** — re-serializing a canonical string
//!    is the identity
//! 6. **Positions are monotonic** — tokens are reported in source order

use proptest::prelude::*;

use super::{canonical_decode, canonical_encode, Dialect, Keyword, Lexer, Token, TokenKind};

const KEYWORDS: &[&str] = &[
    "and", "bool", "class", "do", "else", "extends", "false", "if", "in", "int32", "isnull",
    "let", "new", "not", "string", "then", "true", "unit", "while",
];

/// Single tokens that must lex cleanly, in both dialects.
const VALID_TOKENS: &[&str] = &[
    "42",
    "0x2a",
    "0",
    "\"hello\"",
    "\"a\\tb\"",
    "while",
    "isnull",
    "foo",
    "fooBar_9",
    "Main",
    "T_y_p_e",
    "<=",
    "<-",
    "<",
    "=",
    "{",
    "}",
    "(",
    ")",
    ":",
    ";",
    ",",
    "+",
    "-",
    "*",
    "/",
    "^",
    ".",
];

fn lex_all(source: &str, dialect: Dialect) -> (Vec<Token>, usize) {
    let mut lexer = Lexer::new(source, dialect);
    let mut tokens = Vec::new();
    let mut errors = 0;
    loop {
        match lexer.next_token() {
            Ok(token) => {
                if token.kind.is_eof() {
                    break;
                }
                tokens.push(token);
            }
            Err(_) => errors += 1,
        }
    }
    (tokens, errors)
}

proptest! {
    #[test]
    fn lexer_never_panics(input in "\\PC*") {
        let _ = lex_all(&input, Dialect::Core);
        let _ = lex_all(&input, Dialect::Extended);
    }

    #[test]
    fn lexer_is_deterministic(input in "\\PC*") {
        let first = lex_all(&input, Dialect::Core);
        let second = lex_all(&input, Dialect::Core);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn concatenated_valid_tokens_lex_cleanly(
        picks in prop::collection::vec(prop::sample::select(VALID_TOKENS), 0..12)
    ) {
        let source = picks.join(" ");
        let (tokens, errors) = lex_all(&source, Dialect::Core);
        prop_assert_eq!(errors, 0, "errors lexing {:?}", source);
        prop_assert_eq!(tokens.len(), picks.len());
    }

    #[test]
    fn keywords_never_lex_as_identifiers(keyword in prop::sample::select(KEYWORDS)) {
        let (tokens, errors) = lex_all(keyword, Dialect::Core);
        prop_assert_eq!(errors, 0);
        prop_assert_eq!(tokens.len(), 1);
        prop_assert!(matches!(tokens[0].kind, TokenKind::Keyword(_)));
        prop_assert!(Keyword::lookup(keyword, false).is_some());
    }

    #[test]
    fn keyword_prefixed_identifiers_lex_as_one_token(
        keyword in prop::sample::select(KEYWORDS),
        suffix in "[a-z0-9_]{1,6}",
    ) {
        // `whilex` is one identifier, never `while` + `x` — unless the
        // concatenation happens to spell another keyword.
        let source = format!("{keyword}{suffix}");
        let (tokens, errors) = lex_all(&source, Dialect::Core);
        prop_assert_eq!(errors, 0);
        prop_assert_eq!(tokens.len(), 1);
        if Keyword::lookup(&source, false).is_none() {
            prop_assert!(
                matches!(&tokens[0].kind, TokenKind::ObjectIdentifier(name) if *name == source)
            );
        }
    }

    #[test]
    fn canonical_form_is_idempotent(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let canonical = canonical_encode(&bytes);
        let roundtripped = canonical_encode(&canonical_decode(&canonical));
        prop_assert_eq!(&canonical, &roundtripped);
        // And decoding is lossless.
        prop_assert_eq!(canonical_decode(&canonical), bytes);
    }

    #[test]
    fn token_positions_are_monotonic(input in "\\PC*") {
        let (tokens, _) = lex_all(&input, Dialect::Core);
        for pair in tokens.windows(2) {
            let a = (pair[0].pos.line, pair[0].pos.column);
            let b = (pair[1].pos.line, pair[1].pos.column);
            prop_assert!(a < b, "positions went backwards: {a:?} then {b:?}");
        }
    }

    #[test]
    fn integer_values_agree_across_bases(n in 0i32..=0xff_ffff) {
        let decimal = n.to_string();
        let hex = format!("{n:#x}");
        let (dec_tokens, _) = lex_all(&decimal, Dialect::Core);
        let (hex_tokens, _) = lex_all(&hex, Dialect::Core);
        prop_assert_eq!(&dec_tokens[0].kind, &TokenKind::IntegerLiteral(n));
        prop_assert_eq!(&hex_tokens[0].kind, &TokenKind::IntegerLiteral(n));
    }
}

#[test]
fn longest_match_prefers_two_character_operators() {
    let (tokens, errors) = lex_all("<=<-<", Dialect::Core);
    assert_eq!(errors, 0);
    let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::LowerEqual, TokenKind::Assign, TokenKind::Lower]
    );
}
