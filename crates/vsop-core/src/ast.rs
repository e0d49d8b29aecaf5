// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Abstract syntax tree for VSOP programs.
//!
//! Every node carries the [`Position`] of its first constituent token.
//! Expressions additionally carry a `ty` slot that the checker fills in
//! during the combined type-check/lowering pass; the typed AST dump reads
//! it back.
//!
//! The printed form is deterministic: each node renders as
//! `Tag(child,child,…)`, lists as `[e1,e2,…]`, and a block of exactly one
//! expression renders as that expression. With types enabled every
//! expression is suffixed `:T`.

use ecow::EcoString;

use crate::semantic_analysis::Type;
use crate::source_analysis::Position;

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Isnull,
}

impl UnaryOp {
    /// Spelling used in the AST dump.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Minus => "-",
            Self::Isnull => "isnull",
        }
    }
}

/// Binary operator kinds.
///
/// `Or`, `NotEqual`, `Greater`, `GreaterEqual` and `Mod` only reach the AST
/// in the extended dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Equal,
    NotEqual,
    Lower,
    LowerEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Times,
    Div,
    Pow,
    Mod,
}

impl BinaryOp {
    /// Spelling used in the AST dump.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Lower => "<",
            Self::LowerEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Mod => "mod",
        }
    }

    /// Returns `true` for `<`, `<=`, `>`, `>=` — operators that compare
    /// two numerics and yield `bool`.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Lower | Self::LowerEqual | Self::Greater | Self::GreaterEqual
        )
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// The expression variant.
    pub kind: ExprKind,
    /// Position of the first constituent token.
    pub pos: Position,
    /// Static type, filled in by the checker.
    pub ty: Option<Type>,
}

impl Expr {
    /// Creates an expression with no type assigned yet.
    #[must_use]
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos, ty: None }
    }

    /// Returns `true` if this is the literal identifier `self`.
    #[must_use]
    pub fn is_self(&self) -> bool {
        matches!(&self.kind, ExprKind::Identifier(name) if name == "self")
    }

    /// The type name the dump prints for this expression.
    fn type_name(&self) -> EcoString {
        self.ty.as_ref().map_or_else(|| "unit".into(), Type::name)
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `{ e1; e2; … }`
    Block(Vec<Expr>),
    /// `if cond then t [else e]`
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Option<Box<Expr>>,
    },
    /// `while cond do body`
    While { cond: Box<Expr>, body: Box<Expr> },
    /// `for name <- first to last do body` (extended)
    For {
        name: EcoString,
        first: Box<Expr>,
        last: Box<Expr>,
        body: Box<Expr>,
    },
    /// `break` (extended)
    Break,
    /// `let name : ty [<- init] in scope`
    Let {
        name: EcoString,
        ty: EcoString,
        init: Option<Box<Expr>>,
        scope: Box<Expr>,
    },
    /// Multi-binding `let` sugar (extended).
    Lets {
        bindings: Vec<Field>,
        scope: Box<Expr>,
    },
    /// `name <- value`
    Assign { name: EcoString, value: Box<Expr> },
    /// `not e`, `-e`, `isnull e`
    Unary { op: UnaryOp, value: Box<Expr> },
    /// `l op r`
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `scope.name(args)`; bare calls carry a synthesized `self` scope.
    Call {
        scope: Box<Expr>,
        name: EcoString,
        args: Vec<Expr>,
    },
    /// `new T`
    New { class: EcoString },
    /// An object identifier, including the distinguished `self`.
    Identifier(EcoString),
    /// Integer literal.
    Integer(i32),
    /// Real literal (extended).
    Real(f64),
    /// Boolean literal.
    Boolean(bool),
    /// String literal, stored in canonical form without quotes.
    Str(EcoString),
    /// `()`
    Unit,
}

/// A class field, also used for the bindings of the extended `Lets` sugar.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: EcoString,
    /// Declared type name, resolved during declaration analysis.
    pub ty: EcoString,
    pub init: Option<Expr>,
    pub pos: Position,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Formal {
    pub name: EcoString,
    pub ty: EcoString,
    pub pos: Position,
}

/// A method, or a top-level function in the extended dialect.
///
/// A method without a body is external: its implementation comes from the
/// runtime. External methods may be variadic in the extended dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: EcoString,
    pub formals: Vec<Formal>,
    /// Declared return type name.
    pub ret: EcoString,
    /// Body block; `None` marks an external method.
    pub body: Option<Expr>,
    pub variadic: bool,
    pub pos: Position,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: EcoString,
    pub parent: EcoString,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub pos: Position,
}

/// The outermost container: the classes of a source file, plus top-level
/// functions in the extended dialect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub classes: Vec<Class>,
    pub functions: Vec<Method>,
}

// === Printing ===

fn dump_list<T>(out: &mut String, items: &[T], mut render: impl FnMut(&mut String, &T)) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        render(out, item);
    }
    out.push(']');
}

impl Expr {
    /// Renders the expression, appending `:T` annotations when `typed`.
    fn dump_into(&self, out: &mut String, typed: bool) {
        // `break` never prints an annotation.
        if matches!(self.kind, ExprKind::Break) {
            out.push_str("break");
            return;
        }
        self.dump_inner(out, typed);
        if typed {
            out.push(':');
            out.push_str(&self.type_name());
        }
    }

    /// Renders the expression without its own annotation.
    fn dump_inner(&self, out: &mut String, typed: bool) {
        match &self.kind {
            ExprKind::Block(exprs) => {
                if let [only] = exprs.as_slice() {
                    only.dump_inner(out, typed);
                } else {
                    dump_list(out, exprs, |out, e| e.dump_into(out, typed));
                }
            }
            ExprKind::If { cond, then, els } => {
                out.push_str("If(");
                cond.dump_into(out, typed);
                out.push(',');
                then.dump_into(out, typed);
                if let Some(els) = els {
                    out.push(',');
                    els.dump_into(out, typed);
                }
                out.push(')');
            }
            ExprKind::While { cond, body } => {
                out.push_str("While(");
                cond.dump_into(out, typed);
                out.push(',');
                body.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::For {
                name,
                first,
                last,
                body,
            } => {
                out.push_str("For(");
                out.push_str(name);
                out.push(',');
                first.dump_into(out, typed);
                out.push(',');
                last.dump_into(out, typed);
                out.push(',');
                body.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Break => out.push_str("break"),
            ExprKind::Let {
                name,
                ty,
                init,
                scope,
            } => {
                out.push_str("Let(");
                out.push_str(name);
                out.push(',');
                out.push_str(ty);
                out.push(',');
                if let Some(init) = init {
                    init.dump_into(out, typed);
                    out.push(',');
                }
                scope.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Lets { bindings, scope } => {
                out.push_str("Lets(");
                dump_list(out, bindings, |out, f| f.dump_into(out, typed));
                out.push(',');
                scope.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Assign { name, value } => {
                out.push_str("Assign(");
                out.push_str(name);
                out.push(',');
                value.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Unary { op, value } => {
                out.push_str("UnOp(");
                out.push_str(op.as_str());
                out.push(',');
                value.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Binary { op, lhs, rhs } => {
                out.push_str("BinOp(");
                out.push_str(op.as_str());
                out.push(',');
                lhs.dump_into(out, typed);
                out.push(',');
                rhs.dump_into(out, typed);
                out.push(')');
            }
            ExprKind::Call { scope, name, args } => {
                out.push_str("Call(");
                scope.dump_into(out, typed);
                out.push(',');
                out.push_str(name);
                out.push(',');
                dump_list(out, args, |out, e| e.dump_into(out, typed));
                out.push(')');
            }
            ExprKind::New { class } => {
                out.push_str("New(");
                out.push_str(class);
                out.push(')');
            }
            ExprKind::Identifier(name) => out.push_str(name),
            ExprKind::Integer(value) => out.push_str(&value.to_string()),
            ExprKind::Real(value) => out.push_str(&value.to_string()),
            ExprKind::Boolean(value) => out.push_str(if *value { "true" } else { "false" }),
            ExprKind::Str(canonical) => {
                out.push('"');
                out.push_str(canonical);
                out.push('"');
            }
            ExprKind::Unit => out.push_str("()"),
        }
    }
}

impl Field {
    fn dump_into(&self, out: &mut String, typed: bool) {
        out.push_str("Field(");
        out.push_str(&self.name);
        out.push(',');
        out.push_str(&self.ty);
        if let Some(init) = &self.init {
            out.push(',');
            init.dump_into(out, typed);
        }
        out.push(')');
    }
}

impl Formal {
    fn dump_into(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push(':');
        out.push_str(&self.ty);
    }
}

impl Method {
    fn dump_into(&self, out: &mut String, typed: bool) {
        out.push_str("Method(");
        out.push_str(&self.name);
        out.push(',');
        dump_list(out, &self.formals, |out, f| f.dump_into(out));
        out.push(',');
        out.push_str(&self.ret);
        if let Some(body) = &self.body {
            out.push(',');
            body.dump_into(out, typed);
        }
        out.push(')');
    }
}

impl Class {
    fn dump_into(&self, out: &mut String, typed: bool) {
        out.push_str("Class(");
        out.push_str(&self.name);
        out.push(',');
        out.push_str(&self.parent);
        out.push(',');
        dump_list(out, &self.fields, |out, f| f.dump_into(out, typed));
        out.push(',');
        dump_list(out, &self.methods, |out, m| m.dump_into(out, typed));
        out.push(')');
    }
}

impl Program {
    /// Renders the whole program in dump form.
    ///
    /// `typed` appends the checker-assigned `:T` to every expression.
    #[must_use]
    pub fn dump(&self, typed: bool) -> String {
        let mut out = String::new();
        dump_list(&mut out, &self.classes, |out, c| c.dump_into(out, typed));
        if !self.functions.is_empty() {
            out.push(',');
            dump_list(&mut out, &self.functions, |out, m| m.dump_into(out, typed));
        }
        out
    }
}
