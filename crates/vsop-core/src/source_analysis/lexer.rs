// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The VSOP token rules and lexer driver.
//!
//! Token shapes are described with [`Pattern`] combinators and collected in
//! a rule table. On each step the driver tries every rule on a clone of the
//! current cursor and takes the first rule whose match reaches at least as
//! far as every failure seen so far — longest match, with ties resolved in
//! table order. Whitespace and comments are consumed silently; object
//! identifiers that spell a reserved word are re-tagged as keywords.
//!
//! # Error recovery
//!
//! The lexer never stops at the first problem. The driver tracks the rule
//! that advanced deepest before failing and uses it to pick a specific
//! message (unterminated comment, unterminated string, bad escape, invalid
//! integer literal, stray character); the offending input is consumed so
//! the caller can simply ask for the next token.

use ecow::EcoString;

use super::pattern::Pattern;
use super::{Cursor, Keyword, Position, Token, TokenKind};
use crate::diagnostic::Diagnostic;

/// Which surface dialect the lexer (and parser) accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The base language.
    #[default]
    Core,
    /// The `-ext` dialect: `or`, `mod`, `!=`, `>`, `>=`, `for`, `break`,
    /// `double`, top-level functions, variadic methods, multi-binding lets.
    Extended,
}

impl Dialect {
    /// Returns `true` for the extended dialect.
    #[must_use]
    pub const fn is_extended(self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// What a rule recognizes; selects value extraction and error messages.
#[derive(Debug, Clone, PartialEq)]
enum RuleKind {
    Whitespace,
    Comment,
    Integer16,
    Integer10,
    Real,
    Str,
    TypeIdentifier,
    ObjectIdentifier,
    Operator(TokenKind),
}

struct Rule {
    kind: RuleKind,
    pattern: Pattern,
}

/// Matches the recursive body of a `(* ... *)` comment, starting after the
/// opening `(*`. Null and form-feed bytes are not valid inside comments.
fn comment_tail(cursor: &mut Cursor<'_>) -> bool {
    loop {
        match cursor.peek() {
            Some(b'*') => {
                cursor.advance();
                if cursor.peek() == Some(b')') {
                    cursor.advance();
                    return true;
                }
            }
            Some(b'(') => {
                cursor.advance();
                if cursor.peek() == Some(b'*') {
                    cursor.advance();
                    if !comment_tail(cursor) {
                        return false;
                    }
                }
            }
            None | Some(0) | Some(0x0c) => return false,
            Some(_) => cursor.advance(),
        }
    }
}

/// Builds the rule table for a dialect, in priority order.
fn build_rules(dialect: Dialect) -> Vec<Rule> {
    let any = Pattern::any;
    let null = Pattern::byte(0);
    let tab = Pattern::byte(b'\t');
    let lf = Pattern::byte(b'\n');
    let ff = Pattern::byte(0x0c);
    let cr = Pattern::byte(b'\r');
    let double_quote = Pattern::byte(b'"');
    let backslash = Pattern::byte(b'\\');
    let space = Pattern::byte(b' ');
    let underscore = Pattern::byte(b'_');
    let dot = Pattern::byte(b'.');

    // Letters and digits
    let lowercase = Pattern::range(b'a', b'z');
    let uppercase = Pattern::range(b'A', b'Z');
    let letter = lowercase.or(&uppercase);
    let digit = Pattern::range(b'0', b'9');
    let hex_digit = digit.or(&Pattern::range(b'a', b'f')).or(&Pattern::range(b'A', b'F'));

    // Identifiers
    let base_identifier = letter.or(&digit).or(&underscore);
    let type_identifier = uppercase.then(&base_identifier.repeat());
    let object_identifier = lowercase.then(&base_identifier.repeat());

    // Integer literals
    let base10_literal = digit.then(&digit.repeat());
    let base16_literal = Pattern::lit("0x").then(&hex_digit).then(&hex_digit.repeat());

    // Real literals (extended dialect): `12.`, `12.5` or `.5`
    let real_literal = base10_literal
        .then(&dot)
        .then(&digit.repeat())
        .or(&dot.then(&digit).then(&digit.repeat()));

    // String literals
    let regular_char = any()
        .but_not(&null)
        .but_not(&lf)
        .but_not(&ff)
        .but_not(&double_quote)
        .but_not(&backslash);
    let escape_char = Pattern::byte(b'b')
        .or(&Pattern::byte(b't'))
        .or(&Pattern::byte(b'n'))
        .or(&Pattern::byte(b'r'))
        .or(&double_quote)
        .or(&backslash)
        .or(&Pattern::byte(b'x').then(&hex_digit).then(&hex_digit))
        .or(&lf.then(&space.or(&tab).repeat()));
    let string_literal = double_quote
        .then(&regular_char.or(&backslash.then(&escape_char)).repeat())
        .then(&double_quote);

    // Whitespace
    let blankspace = space.or(&tab).or(&lf).or(&cr);
    let whitespace = blankspace.then(&blankspace.repeat());

    // Comments
    let single_line_comment = Pattern::lit("//")
        .then(&any().but_not(&null).but_not(&ff).but_not(&lf).repeat())
        .then(&lf.or(&ff));
    let multiline_comment = Pattern::lit("(*").then(&Pattern::special(comment_tail));
    let comment = single_line_comment.or(&multiline_comment);

    let mut rules = vec![
        Rule { kind: RuleKind::Whitespace, pattern: whitespace },
        Rule { kind: RuleKind::Comment, pattern: comment },
    ];
    if dialect.is_extended() {
        rules.push(Rule { kind: RuleKind::Real, pattern: real_literal });
    }
    rules.push(Rule { kind: RuleKind::Integer16, pattern: base16_literal });
    rules.push(Rule { kind: RuleKind::Integer10, pattern: base10_literal });
    rules.push(Rule { kind: RuleKind::Str, pattern: string_literal });
    rules.push(Rule { kind: RuleKind::TypeIdentifier, pattern: type_identifier });
    rules.push(Rule { kind: RuleKind::ObjectIdentifier, pattern: object_identifier });

    let mut op = |kind: TokenKind, pattern: Pattern| {
        rules.push(Rule { kind: RuleKind::Operator(kind), pattern });
    };
    op(TokenKind::LowerEqual, Pattern::lit("<="));
    op(TokenKind::Assign, Pattern::lit("<-"));
    if dialect.is_extended() {
        op(TokenKind::GreaterEqual, Pattern::lit(">="));
        op(TokenKind::NotEqual, Pattern::lit("!="));
        op(TokenKind::Greater, Pattern::byte(b'>'));
    }
    op(TokenKind::LBrace, Pattern::byte(b'{'));
    op(TokenKind::RBrace, Pattern::byte(b'}'));
    op(TokenKind::LPar, Pattern::byte(b'('));
    op(TokenKind::RPar, Pattern::byte(b')'));
    op(TokenKind::Colon, Pattern::byte(b':'));
    op(TokenKind::Semicolon, Pattern::byte(b';'));
    op(TokenKind::Comma, Pattern::byte(b','));
    op(TokenKind::Plus, Pattern::byte(b'+'));
    op(TokenKind::Minus, Pattern::byte(b'-'));
    op(TokenKind::Times, Pattern::byte(b'*'));
    op(TokenKind::Div, Pattern::byte(b'/'));
    op(TokenKind::Pow, Pattern::byte(b'^'));
    op(TokenKind::Dot, Pattern::byte(b'.'));
    op(TokenKind::Equal, Pattern::byte(b'='));
    op(TokenKind::Lower, Pattern::byte(b'<'));

    rules
}

/// Appends one raw byte to a canonical string.
///
/// Printable ASCII passes through, except `"` and `\` which — like every
/// non-printable byte — render as `\xhh` with lowercase hex digits.
fn canonical_push(out: &mut String, byte: u8) {
    if (32..=126).contains(&byte) && byte != b'"' && byte != b'\\' {
        out.push(byte as char);
    } else {
        out.push_str(&format!("\\x{byte:02x}"));
    }
}

/// Re-serializes raw bytes into the canonical string form.
#[must_use]
pub fn canonical_encode(bytes: &[u8]) -> EcoString {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        canonical_push(&mut out, b);
    }
    out.into()
}

/// Decodes a canonical string back into raw bytes.
///
/// The inverse of [`canonical_encode`]: `\xhh` sequences become single
/// bytes, everything else is taken literally.
#[must_use]
pub fn canonical_decode(canonical: &str) -> Vec<u8> {
    let bytes = canonical.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).unwrap_or("");
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Translates the source bytes of a matched string literal (without the
/// surrounding quotes) into canonical form.
fn canonicalize_string_body(body: &[u8]) -> EcoString {
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b == b'\\' {
            match body[i + 1] {
                b'b' => canonical_push(&mut out, 0x08),
                b't' => canonical_push(&mut out, b'\t'),
                b'n' => canonical_push(&mut out, b'\n'),
                b'r' => canonical_push(&mut out, b'\r'),
                b'"' => out.push_str("\\x22"),
                b'\\' => out.push_str("\\x5c"),
                b'x' => {
                    let byte = hex_value(body[i + 2]) * 16 + hex_value(body[i + 3]);
                    canonical_push(&mut out, byte);
                    i += 4;
                    continue;
                }
                b'\n' => {
                    // Line continuation: skip the newline and the indent.
                    i += 2;
                    while i < body.len() && (body[i] == b' ' || body[i] == b'\t') {
                        i += 1;
                    }
                    continue;
                }
                _ => unreachable!("escape validated by the string rule"),
            }
            i += 2;
        } else {
            canonical_push(&mut out, b);
            i += 1;
        }
    }
    out.into()
}

/// A lexer over a single source file.
///
/// `next_token` yields tokens until [`TokenKind::Eof`]; lexical errors are
/// returned as `Err` and the offending input is consumed, so callers can
/// keep pulling tokens to surface every error in one run.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    rules: Vec<Rule>,
    ident_tail: Pattern,
    dialect: Dialect,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.cursor.position())
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl<'src> Lexer<'src> {
    /// Creates a lexer for the given source text and dialect.
    #[must_use]
    pub fn new(source: &'src str, dialect: Dialect) -> Self {
        let letter = Pattern::range(b'a', b'z').or(&Pattern::range(b'A', b'Z'));
        let base_identifier = letter
            .or(&Pattern::range(b'0', b'9'))
            .or(&Pattern::byte(b'_'));
        Self {
            cursor: Cursor::new(source),
            rules: build_rules(dialect),
            ident_tail: base_identifier.then(&base_identifier.repeat()),
            dialect,
        }
    }

    /// Current position of the read head.
    #[must_use]
    pub fn position(&self) -> Position {
        self.cursor.position()
    }

    /// Produces the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        loop {
            if self.cursor.at_end() {
                return Ok(Token::new(TokenKind::Eof, self.cursor.position()));
            }

            let start = self.cursor.clone();
            let start_pos = start.position();

            // Deepest non-accepting rule, for error selection.
            let mut deepest_kind = RuleKind::Whitespace;
            let mut deepest = start.clone();
            let mut winner: Option<(RuleKind, Cursor<'src>)> = None;

            for rule in &self.rules {
                let mut probe = start.clone();
                if rule.pattern.matches(&mut probe) && deepest <= probe {
                    if matches!(
                        rule.kind,
                        RuleKind::Integer10 | RuleKind::Integer16 | RuleKind::Real
                    ) {
                        // A literal glued to identifier characters is one
                        // malformed literal, not two tokens.
                        let mut tail = probe.clone();
                        if self.ident_tail.matches(&mut tail) {
                            deepest_kind = rule.kind.clone();
                            deepest = tail;
                            continue;
                        }
                    }
                    winner = Some((rule.kind.clone(), probe));
                    break;
                } else if deepest < probe {
                    deepest_kind = rule.kind.clone();
                    deepest = probe;
                }
            }

            let Some((kind, end)) = winner else {
                return Err(self.recover(&start, start_pos, &deepest_kind, deepest));
            };

            let lexeme = start.bytes_until(&end);
            self.cursor = end;

            let token_kind = match kind {
                RuleKind::Whitespace | RuleKind::Comment => continue,
                RuleKind::Integer10 => TokenKind::IntegerLiteral(parse_int(lexeme, 10)),
                RuleKind::Integer16 => TokenKind::IntegerLiteral(parse_int(&lexeme[2..], 16)),
                RuleKind::Real => {
                    let text = std::str::from_utf8(lexeme).unwrap_or("0");
                    TokenKind::RealLiteral(text.parse().unwrap_or(0.0))
                }
                RuleKind::Str => {
                    TokenKind::StringLiteral(canonicalize_string_body(&lexeme[1..lexeme.len() - 1]))
                }
                RuleKind::TypeIdentifier => {
                    TokenKind::TypeIdentifier(String::from_utf8_lossy(lexeme).as_ref().into())
                }
                RuleKind::ObjectIdentifier => {
                    let name: EcoString = String::from_utf8_lossy(lexeme).as_ref().into();
                    match Keyword::lookup(&name, self.dialect.is_extended()) {
                        Some(keyword) => TokenKind::Keyword(keyword),
                        None => TokenKind::ObjectIdentifier(name),
                    }
                }
                RuleKind::Operator(op) => op,
            };

            return Ok(Token::new(token_kind, start_pos));
        }
    }

    /// Consumes the unlexable region and picks a diagnostic from the
    /// deepest non-accepting rule.
    fn recover(
        &mut self,
        start: &Cursor<'src>,
        start_pos: Position,
        deepest_kind: &RuleKind,
        deepest: Cursor<'src>,
    ) -> Diagnostic {
        match deepest_kind {
            RuleKind::Comment if deepest.at_end() => {
                self.cursor = deepest;
                Diagnostic::lexical("unterminated comment", start_pos)
            }
            RuleKind::Str if deepest.at_end() => {
                self.cursor = deepest;
                Diagnostic::lexical("unterminated string-literal", start_pos)
            }
            RuleKind::Str => {
                let pos = deepest.position();
                let byte = deepest.peek().unwrap_or(0);
                self.cursor = deepest;
                self.cursor.advance();
                let message = match byte {
                    0 => "null character in string-literal",
                    b'\n' => "raw line feed in string-literal",
                    b'\\' => "invalid escape sequence in string-literal",
                    _ => return Self::invalid_character(byte, pos),
                };
                Diagnostic::lexical(message, pos)
            }
            RuleKind::Integer10 | RuleKind::Integer16 | RuleKind::Real => {
                let lexeme = String::from_utf8_lossy(start.bytes_until(&deepest)).into_owned();
                self.cursor = deepest;
                let what = if *deepest_kind == RuleKind::Real {
                    "real-literal"
                } else {
                    "integer-literal"
                };
                Diagnostic::lexical(format!("invalid {what} {lexeme}"), start_pos)
            }
            _ => {
                let at = if deepest > *start && !deepest.at_end() {
                    deepest
                } else {
                    start.clone()
                };
                let pos = at.position();
                let byte = at.peek().unwrap_or(0);
                self.cursor = at;
                self.cursor.advance();
                Self::invalid_character(byte, pos)
            }
        }
    }

    fn invalid_character(byte: u8, pos: Position) -> Diagnostic {
        let shown = if (32..=126).contains(&byte) {
            format!("{}", byte as char)
        } else {
            format!("\\x{byte:02x}")
        };
        Diagnostic::lexical(format!("invalid character {shown}"), pos)
    }
}

fn parse_int(digits: &[u8], radix: u32) -> i32 {
    let text = std::str::from_utf8(digits).unwrap_or("0");
    i64::from_str_radix(text, radix).map_or(i32::MAX, |v| v as i32)
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) if token.kind.is_eof() => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str, dialect: Dialect) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut lexer = Lexer::new(source, dialect);
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match lexer.next_token() {
                Ok(token) => {
                    let eof = token.kind.is_eof();
                    tokens.push(token);
                    if eof {
                        break;
                    }
                }
                Err(diagnostic) => errors.push(diagnostic),
            }
        }
        (tokens, errors)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex_all(source, Dialect::Core);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_operators_with_longest_match() {
        assert_eq!(
            kinds("<= <- < ="),
            vec![
                TokenKind::LowerEqual,
                TokenKind::Assign,
                TokenKind::Lower,
                TokenKind::Equal,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            kinds("while whilex"),
            vec![
                TokenKind::Keyword(Keyword::While),
                TokenKind::ObjectIdentifier("whilex".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn extended_keywords_are_identifiers_in_core() {
        assert_eq!(
            kinds("break"),
            vec![TokenKind::ObjectIdentifier("break".into()), TokenKind::Eof]
        );
        let (tokens, _) = lex_all("break", Dialect::Extended);
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Break));
    }

    #[test]
    fn integer_literals_in_both_bases() {
        assert_eq!(
            kinds("42 0x2a"),
            vec![
                TokenKind::IntegerLiteral(42),
                TokenKind::IntegerLiteral(42),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn integer_glued_to_identifier_is_an_error() {
        let (tokens, errors) = lex_all("0x29z", Dialect::Core);
        assert_eq!(tokens.len(), 1); // just EOF
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "1:1: lexical error: invalid integer-literal 0x29z"
        );
    }

    #[test]
    fn real_literals_extended_only() {
        let (tokens, errors) = lex_all("3.14 .5 2.", Dialect::Extended);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::RealLiteral(3.14));
        assert_eq!(tokens[1].kind, TokenKind::RealLiteral(0.5));
        assert_eq!(tokens[2].kind, TokenKind::RealLiteral(2.0));
    }

    #[test]
    fn string_escapes_are_canonicalized() {
        let (tokens, errors) = lex_all(r#""a\tb\x41\"\\""#, Dialect::Core);
        assert!(errors.is_empty());
        assert_eq!(
            tokens[0].kind,
            TokenKind::StringLiteral("a\\x09bA\\x22\\x5c".into())
        );
    }

    #[test]
    fn string_line_continuation_elides_indent() {
        let source = "\"ab\\\n    cd\"";
        let (tokens, errors) = lex_all(source, Dialect::Core);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("abcd".into()));
    }

    #[test]
    fn nested_comments_count_lines() {
        let source = "(* outer (* inner\nstill inner *)\nouter *) x";
        let (tokens, errors) = lex_all(source, Dialect::Core);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::ObjectIdentifier("x".into()));
        assert_eq!(tokens[0].pos, Position::new(3, 10));
    }

    #[test]
    fn unterminated_comment_reports_start() {
        let (_, errors) = lex_all("(* never (* closed *)", Dialect::Core);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "1:1: lexical error: unterminated comment");
    }

    #[test]
    fn unterminated_string_reports_start() {
        let (_, errors) = lex_all("\"open", Dialect::Core);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "1:1: lexical error: unterminated string-literal"
        );
    }

    #[test]
    fn raw_line_feed_in_string() {
        let (_, errors) = lex_all("\"a\nb\"", Dialect::Core);
        assert!(!errors.is_empty());
        assert!(errors[0].message.contains("raw line feed"));
    }

    #[test]
    fn invalid_escape_in_string() {
        let (_, errors) = lex_all(r#""a\qb""#, Dialect::Core);
        assert!(!errors.is_empty());
        assert!(errors[0].message.contains("invalid escape sequence"));
    }

    #[test]
    fn stray_character_is_reported_and_skipped() {
        let (tokens, errors) = lex_all("a # b", Dialect::Core);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("invalid character #"));
        assert_eq!(tokens.len(), 3); // a, b, EOF
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            kinds("// line comment\n1 (* block *) 2"),
            vec![
                TokenKind::IntegerLiteral(1),
                TokenKind::IntegerLiteral(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn canonical_encode_decode_roundtrip() {
        let bytes = b"ab\x00\n\"\\\x7f";
        let encoded = canonical_encode(bytes);
        assert_eq!(encoded, "ab\\x00\\x0a\\x22\\x5c\\x7f");
        assert_eq!(canonical_decode(&encoded), bytes);
    }
}
