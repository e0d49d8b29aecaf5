// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive-descent parser for VSOP.
//!
//! Operator precedence, loosest to tightest: `<-`, `or`, `and`, `not`,
//! comparisons (non-associative), `+ -`, `* / mod`, unary `-`/`isnull`,
//! `^` (right-associative), `.` dispatch. A bare call `f(…)` is sugar for
//! `self.f(…)` and parses to a call whose scope is the identifier `self`.
//!
//! Extended-dialect forms (`for`, `break`, `or`, `mod`, real literals,
//! multi-binding `let`, top-level functions, `...` variadic tails) are only
//! accepted when the lexer ran in [`Dialect::Extended`]; their keywords
//! otherwise never reach the parser as keywords.

use ecow::{eco_format, EcoString};

use crate::ast::{BinaryOp, Class, Expr, ExprKind, Field, Formal, Method, Program, UnaryOp};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::source_analysis::{Dialect, Keyword, Position, Token, TokenKind};

/// Parses a full token stream (ending in `Eof`) into a [`Program`].
///
/// Syntax errors are reported into `diagnostics`; the returned program
/// contains every declaration that parsed cleanly.
pub fn parse_program(
    tokens: &[Token],
    dialect: Dialect,
    diagnostics: &mut Diagnostics,
) -> Program {
    Parser {
        tokens,
        index: 0,
        dialect,
        diagnostics,
    }
    .program()
}

struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
    dialect: Dialect,
    diagnostics: &'a mut Diagnostics,
}

/// Parse failure marker; the diagnostic is already reported.
struct Failed;

type Parsed<T> = Result<T, Failed>;

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.index)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn pos(&self) -> Position {
        self.peek().pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.kind.is_eof() {
            self.index += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: impl Into<EcoString>) -> Failed {
        let pos = self.pos();
        self.diagnostics.report(Diagnostic::syntax(message, pos));
        Failed
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Parsed<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(eco_format!("expected {what}")))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, what: &str) -> Parsed<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(eco_format!("expected {what}")))
        }
    }

    fn object_identifier(&mut self, what: &str) -> Parsed<(EcoString, Position)> {
        match self.peek_kind() {
            TokenKind::ObjectIdentifier(name) => {
                let name = name.clone();
                let pos = self.pos();
                self.advance();
                Ok((name, pos))
            }
            _ => Err(self.error(eco_format!("expected {what}"))),
        }
    }

    fn type_identifier(&mut self, what: &str) -> Parsed<(EcoString, Position)> {
        match self.peek_kind() {
            TokenKind::TypeIdentifier(name) => {
                let name = name.clone();
                let pos = self.pos();
                self.advance();
                Ok((name, pos))
            }
            _ => Err(self.error(eco_format!("expected {what}"))),
        }
    }

    /// A type name: a primitive keyword or a type identifier.
    fn type_name(&mut self) -> Parsed<EcoString> {
        let name: EcoString = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Int32) => "int32".into(),
            TokenKind::Keyword(Keyword::Bool) => "bool".into(),
            TokenKind::Keyword(Keyword::String) => "string".into(),
            TokenKind::Keyword(Keyword::Unit) => "unit".into(),
            TokenKind::Keyword(Keyword::Double) => "double".into(),
            TokenKind::TypeIdentifier(name) => name.clone(),
            _ => return Err(self.error("expected type")),
        };
        self.advance();
        Ok(name)
    }

    // === Declarations ===

    fn program(mut self) -> Program {
        let mut program = Program::default();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Keyword(Keyword::Class) => {
                    if let Ok(class) = self.class() {
                        program.classes.push(class);
                    } else {
                        self.sync_to_declaration();
                    }
                }
                TokenKind::ObjectIdentifier(_) if self.dialect.is_extended() => {
                    if let Ok(function) = self.method() {
                        program.functions.push(function);
                    } else {
                        self.sync_to_declaration();
                    }
                }
                _ => {
                    let _ = self.error("expected class declaration");
                    self.advance();
                    self.sync_to_declaration();
                }
            }
        }
        program
    }

    /// Skips ahead to the next plausible declaration start.
    fn sync_to_declaration(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::Keyword(Keyword::Class) => return,
                TokenKind::ObjectIdentifier(_) if self.dialect.is_extended() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skips to the end of a malformed class member.
    fn sync_to_member(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn class(&mut self) -> Parsed<Class> {
        let pos = self.pos();
        self.expect_keyword(Keyword::Class, "class")?;
        let (name, _) = self.type_identifier("class name")?;
        let parent = if self.eat_keyword(Keyword::Extends) {
            self.type_identifier("parent class name")?.0
        } else {
            "Object".into()
        };
        self.expect(&TokenKind::LBrace, "{")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            match self.member() {
                Ok(Member::Field(field)) => fields.push(field),
                Ok(Member::Method(method)) => methods.push(method),
                Err(Failed) => self.sync_to_member(),
            }
        }
        self.expect(&TokenKind::RBrace, "}")?;

        Ok(Class {
            name,
            parent,
            fields,
            methods,
            pos,
        })
    }

    fn member(&mut self) -> Parsed<Member> {
        // Both members start with an object identifier; the next token
        // decides which one this is.
        if !matches!(self.peek_kind(), TokenKind::ObjectIdentifier(_)) {
            return Err(self.error("expected field or method"));
        }
        if self.tokens.get(self.index + 1).map(|t| &t.kind) == Some(&TokenKind::LPar) {
            self.method().map(Member::Method)
        } else {
            self.field().map(Member::Field)
        }
    }

    fn field(&mut self) -> Parsed<Field> {
        let (name, pos) = self.object_identifier("field name")?;
        self.expect(&TokenKind::Colon, ":")?;
        let ty = self.type_name()?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, ";")?;
        Ok(Field {
            name,
            ty,
            init,
            pos,
        })
    }

    fn method(&mut self) -> Parsed<Method> {
        let (name, pos) = self.object_identifier("method name")?;
        self.expect(&TokenKind::LPar, "(")?;
        let (formals, variadic) = self.formals()?;
        self.expect(&TokenKind::RPar, ")")?;
        self.expect(&TokenKind::Colon, ":")?;
        let ret = self.type_name()?;
        let body = self.block()?;
        Ok(Method {
            name,
            formals,
            ret,
            body: Some(body),
            variadic,
            pos,
        })
    }

    fn formals(&mut self) -> Parsed<(Vec<Formal>, bool)> {
        let mut formals = Vec::new();
        if self.at(&TokenKind::RPar) {
            return Ok((formals, false));
        }
        loop {
            if self.dialect.is_extended() && self.at(&TokenKind::Dot) {
                self.variadic_tail()?;
                return Ok((formals, true));
            }
            let (name, pos) = self.object_identifier("formal name")?;
            self.expect(&TokenKind::Colon, ":")?;
            let ty = self.type_name()?;
            formals.push(Formal { name, ty, pos });
            if !self.eat(&TokenKind::Comma) {
                return Ok((formals, false));
            }
        }
    }

    /// The `...` marking a variadic tail (extended dialect).
    fn variadic_tail(&mut self) -> Parsed<()> {
        for _ in 0..3 {
            self.expect(&TokenKind::Dot, "...")?;
        }
        Ok(())
    }

    // === Expressions ===

    fn block(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        self.expect(&TokenKind::LBrace, "{")?;
        let mut exprs = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            exprs.push(self.expr()?);
            while self.eat(&TokenKind::Semicolon) {
                exprs.push(self.expr()?);
            }
        }
        self.expect(&TokenKind::RBrace, "}")?;
        Ok(Expr::new(ExprKind::Block(exprs), pos))
    }

    fn expr(&mut self) -> Parsed<Expr> {
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::If) => self.if_expr(),
            TokenKind::Keyword(Keyword::While) => self.while_expr(),
            TokenKind::Keyword(Keyword::For) => self.for_expr(),
            TokenKind::Keyword(Keyword::Let) => self.let_expr(),
            TokenKind::ObjectIdentifier(_)
                if self.tokens.get(self.index + 1).map(|t| &t.kind)
                    == Some(&TokenKind::Assign) =>
            {
                let (name, pos) = self.object_identifier("identifier")?;
                self.advance(); // <-
                let value = self.expr()?;
                Ok(Expr::new(
                    ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    },
                    pos,
                ))
            }
            _ => self.or_expr(),
        }
    }

    fn if_expr(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        self.advance(); // if
        let cond = self.expr()?;
        self.expect_keyword(Keyword::Then, "then")?;
        let then = self.expr()?;
        let els = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els,
            },
            pos,
        ))
    }

    fn while_expr(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        self.advance(); // while
        let cond = self.expr()?;
        self.expect_keyword(Keyword::Do, "do")?;
        let body = self.expr()?;
        Ok(Expr::new(
            ExprKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            pos,
        ))
    }

    fn for_expr(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        self.advance(); // for
        let (name, _) = self.object_identifier("loop variable")?;
        self.expect(&TokenKind::Assign, "<-")?;
        let first = self.expr()?;
        self.expect_keyword(Keyword::To, "to")?;
        let last = self.expr()?;
        self.expect_keyword(Keyword::Do, "do")?;
        let body = self.expr()?;
        Ok(Expr::new(
            ExprKind::For {
                name,
                first: Box::new(first),
                last: Box::new(last),
                body: Box::new(body),
            },
            pos,
        ))
    }

    fn let_expr(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        self.advance(); // let
        let mut bindings = Vec::new();
        loop {
            let (name, binding_pos) = self.object_identifier("binding name")?;
            self.expect(&TokenKind::Colon, ":")?;
            let ty = self.type_name()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.expr()?)
            } else {
                None
            };
            bindings.push(Field {
                name,
                ty,
                init,
                pos: binding_pos,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if !self.dialect.is_extended() {
                return Err(self.error("expected in"));
            }
        }
        self.expect_keyword(Keyword::In, "in")?;
        let scope = self.expr()?;

        if bindings.len() == 1 {
            let binding = bindings.pop().expect("one binding");
            Ok(Expr::new(
                ExprKind::Let {
                    name: binding.name,
                    ty: binding.ty,
                    init: binding.init.map(Box::new),
                    scope: Box::new(scope),
                },
                pos,
            ))
        } else {
            Ok(Expr::new(
                ExprKind::Lets {
                    bindings,
                    scope: Box::new(scope),
                },
                pos,
            ))
        }
    }

    fn or_expr(&mut self) -> Parsed<Expr> {
        let mut lhs = self.and_expr()?;
        while self.at_keyword(Keyword::Or) {
            let pos = lhs.pos;
            self.advance();
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Parsed<Expr> {
        let mut lhs = self.not_expr()?;
        while self.at_keyword(Keyword::And) {
            let pos = lhs.pos;
            self.advance();
            let rhs = self.not_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Parsed<Expr> {
        if self.at_keyword(Keyword::Not) {
            let pos = self.pos();
            self.advance();
            let value = self.not_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    value: Box::new(value),
                },
                pos,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Parsed<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek_kind() {
            TokenKind::Equal => BinaryOp::Equal,
            TokenKind::Lower => BinaryOp::Lower,
            TokenKind::LowerEqual => BinaryOp::LowerEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            _ => return Ok(lhs),
        };
        let pos = lhs.pos;
        self.advance();
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs, pos))
    }

    fn additive(&mut self) -> Parsed<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Plus,
                TokenKind::Minus => BinaryOp::Minus,
                _ => return Ok(lhs),
            };
            let pos = lhs.pos;
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn multiplicative(&mut self) -> Parsed<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Times => BinaryOp::Times,
                TokenKind::Div => BinaryOp::Div,
                TokenKind::Keyword(Keyword::Mod) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            let pos = lhs.pos;
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn unary(&mut self) -> Parsed<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Keyword(Keyword::Isnull) => UnaryOp::Isnull,
            _ => return self.power(),
        };
        let pos = self.pos();
        self.advance();
        let value = self.unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                value: Box::new(value),
            },
            pos,
        ))
    }

    fn power(&mut self) -> Parsed<Expr> {
        let lhs = self.postfix()?;
        if self.at(&TokenKind::Pow) {
            let pos = lhs.pos;
            self.advance();
            // Right-associative; the right side may carry a unary prefix.
            let rhs = self.unary()?;
            return Ok(binary(BinaryOp::Pow, lhs, rhs, pos));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> Parsed<Expr> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::Dot) {
            let (name, _) = self.object_identifier("member name")?;
            // `scope.m(args)` dispatches; `scope.f` reads a field.
            let args = if self.eat(&TokenKind::LPar) {
                let args = self.args()?;
                self.expect(&TokenKind::RPar, ")")?;
                args
            } else {
                Vec::new()
            };
            let pos = expr.pos;
            expr = Expr::new(
                ExprKind::Call {
                    scope: Box::new(expr),
                    name,
                    args,
                },
                pos,
            );
        }
        Ok(expr)
    }

    fn args(&mut self) -> Parsed<Vec<Expr>> {
        let mut args = Vec::new();
        if self.at(&TokenKind::RPar) {
            return Ok(args);
        }
        args.push(self.expr()?);
        while self.eat(&TokenKind::Comma) {
            args.push(self.expr()?);
        }
        Ok(args)
    }

    fn primary(&mut self) -> Parsed<Expr> {
        let pos = self.pos();
        let kind = match self.peek_kind().clone() {
            TokenKind::IntegerLiteral(value) => {
                self.advance();
                ExprKind::Integer(value)
            }
            TokenKind::RealLiteral(value) => {
                self.advance();
                ExprKind::Real(value)
            }
            TokenKind::StringLiteral(canonical) => {
                self.advance();
                ExprKind::Str(canonical)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Boolean(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Boolean(false)
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                ExprKind::Break
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let (class, _) = self.type_identifier("class name")?;
                ExprKind::New { class }
            }
            TokenKind::Keyword(Keyword::If) => return self.if_expr(),
            TokenKind::Keyword(Keyword::While) => return self.while_expr(),
            TokenKind::Keyword(Keyword::For) => return self.for_expr(),
            TokenKind::Keyword(Keyword::Let) => return self.let_expr(),
            TokenKind::ObjectIdentifier(name) => {
                self.advance();
                if self.at(&TokenKind::LPar) {
                    // Bare call: sugar for a dispatch on `self`.
                    self.advance();
                    let args = self.args()?;
                    self.expect(&TokenKind::RPar, ")")?;
                    ExprKind::Call {
                        scope: Box::new(Expr::new(
                            ExprKind::Identifier("self".into()),
                            pos,
                        )),
                        name,
                        args,
                    }
                } else {
                    ExprKind::Identifier(name)
                }
            }
            TokenKind::LBrace => return self.block(),
            TokenKind::LPar => {
                self.advance();
                if self.eat(&TokenKind::RPar) {
                    ExprKind::Unit
                } else {
                    let inner = self.expr()?;
                    self.expect(&TokenKind::RPar, ")")?;
                    return Ok(inner);
                }
            }
            _ => return Err(self.error("expected expression")),
        };
        Ok(Expr::new(kind, pos))
    }
}

enum Member {
    Field(Field),
    Method(Method),
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: Position) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    )
}
