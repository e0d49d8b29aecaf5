// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression lowering: the expression-level type checker and emitter.
//!
//! Every expression is assigned its static type and lowered in one pass.
//! Syntactic forms that are sugar — `and`, `or`, `!=`, `for` — lower
//! through the same control-flow shapes as `if` and `while` rather than
//! having IR shapes of their own.

use ecow::{eco_format, EcoString};

use super::emitter::{Emitted, Emitter, TypedValue};
use super::ir_ty;
use super::scope::Binding;
use crate::ast::{BinaryOp, Expr, ExprKind, Field, UnaryOp};
use crate::ir::{BinOp, CastOp, Cond, FCond, FnSig, Ty, Value};
use crate::semantic_analysis::{MethodInfo, Type};
use crate::source_analysis::Position;

/// The static type of an emitted value; unit when there is none.
pub(crate) fn ty_of(value: &Emitted) -> Type {
    value.as_ref().map_or(Type::Unit, |tv| tv.ty.clone())
}

impl Emitter<'_, '_> {
    /// Emits one expression, recording its static type on the node.
    pub(crate) fn emit_expr(&mut self, expr: &mut Expr) -> Emitted {
        let pos = expr.pos;
        let result = match &mut expr.kind {
            ExprKind::Block(exprs) => {
                let mut last = None;
                for e in exprs {
                    last = self.emit_expr(e);
                }
                last
            }
            ExprKind::If { cond, then, els } => {
                self.emit_if(cond, then, els.as_deref_mut(), pos)
            }
            ExprKind::While { cond, body } => self.emit_while(cond, body),
            ExprKind::For {
                name,
                first,
                last,
                body,
            } => {
                let name = name.clone();
                self.emit_for(&name, first, last, body)
            }
            ExprKind::Break => {
                match self.exits.last().copied() {
                    Some(exit) => {
                        self.builder.br(exit);
                        // Whatever follows the break lands in a block that
                        // control flow never reaches.
                        let dead = self.builder.add_block("unreachable");
                        self.builder.select_block(dead);
                    }
                    None => self.error(pos, "break outside of a loop"),
                }
                None
            }
            ExprKind::Let {
                name,
                ty,
                init,
                scope,
            } => {
                let (name, ty) = (name.clone(), ty.clone());
                let pushed = self.bind_let(&name, &ty, init.as_deref_mut(), pos);
                let result = self.emit_expr(scope);
                if let Some(name) = pushed {
                    self.scope.pop(&name);
                }
                result
            }
            ExprKind::Lets { bindings, scope } => {
                let mut pushed = Vec::new();
                for binding in bindings.iter_mut() {
                    pushed.push(self.bind_lets_field(binding));
                }
                let result = self.emit_expr(scope);
                for name in pushed.into_iter().rev().flatten() {
                    self.scope.pop(&name);
                }
                result
            }
            ExprKind::Assign { name, value } => {
                let name = name.clone();
                self.emit_assign(&name, value, pos)
            }
            ExprKind::Unary { op, value } => {
                let op = *op;
                self.emit_unary(op, value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.emit_binary(op, lhs, rhs, pos)
            }
            ExprKind::Call { scope, name, args } => {
                let name = name.clone();
                self.emit_call(scope, &name, args, pos)
            }
            ExprKind::New { class } => {
                let class = class.clone();
                if self.table.has_class(&class) {
                    let callee = self.builder.func(&eco_format!("{class}_new"));
                    let value = self.builder.call(callee, vec![]);
                    Some(TypedValue {
                        value,
                        ty: Type::Class(class),
                    })
                } else {
                    self.error(pos, eco_format!("unknown class type {class}"));
                    None
                }
            }
            ExprKind::Identifier(name) => {
                let name = name.clone();
                self.emit_identifier(&name, pos)
            }
            ExprKind::Integer(n) => Some(TypedValue {
                value: Value::I32(*n),
                ty: Type::Int32,
            }),
            ExprKind::Real(x) => Some(TypedValue {
                value: Value::F64(*x),
                ty: Type::Double,
            }),
            ExprKind::Boolean(b) => Some(TypedValue {
                value: Value::I1(*b),
                ty: Type::Bool,
            }),
            ExprKind::Str(canonical) => {
                let bytes = crate::source_analysis::canonical_decode(canonical);
                let value = self.builder.cstring(&bytes);
                Some(TypedValue {
                    value,
                    ty: Type::Str,
                })
            }
            ExprKind::Unit => None,
        };
        expr.ty = Some(ty_of(&result));
        result
    }

    // === Control flow ===

    fn emit_if(
        &mut self,
        cond: &mut Expr,
        then: &mut Expr,
        els: Option<&mut Expr>,
        pos: Position,
    ) -> Emitted {
        let cond_pos = cond.pos;
        let cond_val = self.emit_expr(cond);
        let cond_value = self.check_bool(cond_val, cond_pos);

        let then_block = self.builder.add_block("then");
        let else_block = self.builder.add_block("else");
        let end_block = self.builder.add_block("end");
        self.builder.cond_br(cond_value, then_block, else_block);

        self.builder.select_block(then_block);
        let then_val = self.emit_expr(then);
        let then_end = self.builder.current_block();

        self.builder.select_block(else_block);
        let else_val = match els {
            Some(els) => self.emit_expr(els),
            None => None,
        };
        let else_end = self.builder.current_block();

        let then_ty = ty_of(&then_val);
        let else_ty = ty_of(&else_val);
        let result_ty = self.branch_result_ty(&then_ty, &else_ty, pos);

        // Each edge casts its value to the merged type before branching.
        self.builder.select_block(then_end);
        let then_in = (!result_ty.is_unit()).then(|| self.edge_value(then_val, &result_ty, pos));
        self.builder.br(end_block);

        self.builder.select_block(else_end);
        let else_in = (!result_ty.is_unit()).then(|| self.edge_value(else_val, &result_ty, pos));
        self.builder.br(end_block);

        self.builder.select_block(end_block);
        match (then_in, else_in) {
            (Some(then_in), Some(else_in)) => {
                let phi = self.builder.phi(
                    ir_ty(&result_ty),
                    vec![(then_in, then_end), (else_in, else_end)],
                );
                Some(TypedValue {
                    value: phi,
                    ty: result_ty,
                })
            }
            _ => None,
        }
    }

    /// The result type of a two-armed conditional: equal types, the LUB
    /// of two classes, the wider numeric (extended), and unit absorbing
    /// everything else that has a unit side.
    fn branch_result_ty(&mut self, then_ty: &Type, else_ty: &Type, pos: Position) -> Type {
        if then_ty == else_ty {
            return then_ty.clone();
        }
        if let (Type::Class(a), Type::Class(b)) = (then_ty, else_ty) {
            return Type::Class(self.table.lub(a, b));
        }
        if self.table.dialect().is_extended() && then_ty.is_numeric() && else_ty.is_numeric() {
            return Type::Double;
        }
        if !then_ty.is_unit() && !else_ty.is_unit() {
            self.error(
                pos,
                eco_format!(
                    "expected agreeing types, but got {} and {}",
                    then_ty.name(),
                    else_ty.name()
                ),
            );
        }
        Type::Unit
    }

    fn edge_value(&mut self, value: Emitted, ty: &Type, pos: Position) -> Value {
        match self.coerce(value, ty, pos) {
            Some(tv) => tv.value,
            None => Value::I32(0), // unreachable for non-unit targets
        }
    }

    fn emit_while(&mut self, cond: &mut Expr, body: &mut Expr) -> Emitted {
        let cond_block = self.builder.add_block("cond");
        let body_block = self.builder.add_block("body");
        let end_block = self.builder.add_block("end");

        self.builder.br(cond_block);
        self.builder.select_block(cond_block);
        let cond_pos = cond.pos;
        let cond_val = self.emit_expr(cond);
        let cond_value = self.check_bool(cond_val, cond_pos);
        self.builder.cond_br(cond_value, body_block, end_block);

        self.builder.select_block(body_block);
        self.exits.push(end_block);
        self.emit_expr(body);
        self.exits.pop();
        self.builder.br(cond_block);

        self.builder.select_block(end_block);
        None
    }

    /// `for` lowers to a counted `while`: the bound is evaluated once, the
    /// loop variable lives in a slot and is visible (and assignable) in
    /// the body.
    fn emit_for(
        &mut self,
        name: &EcoString,
        first: &mut Expr,
        last: &mut Expr,
        body: &mut Expr,
    ) -> Emitted {
        let first_pos = first.pos;
        let first_val = self.emit_expr(first);
        let first_val = self.int_operand(first_val, first_pos);
        let last_pos = last.pos;
        let last_val = self.emit_expr(last);
        let last_val = self.int_operand(last_val, last_pos);

        let slot = self.builder.alloca(Ty::I32);
        self.builder.store(first_val, slot.clone());
        self.scope.push(
            name.clone(),
            Binding::Slot {
                ptr: slot.clone(),
                ty: Type::Int32,
            },
        );

        let cond_block = self.builder.add_block("cond");
        let body_block = self.builder.add_block("body");
        let end_block = self.builder.add_block("end");

        self.builder.br(cond_block);
        self.builder.select_block(cond_block);
        let current = self.builder.load(slot.clone());
        let in_range = self.builder.icmp(Cond::Sle, current, last_val);
        self.builder.cond_br(in_range, body_block, end_block);

        self.builder.select_block(body_block);
        self.exits.push(end_block);
        self.emit_expr(body);
        self.exits.pop();
        let current = self.builder.load(slot.clone());
        let next = self.builder.bin(BinOp::Add, current, Value::I32(1));
        self.builder.store(next, slot);
        self.builder.br(cond_block);

        self.builder.select_block(end_block);
        self.scope.pop(name);
        None
    }

    fn int_operand(&mut self, value: Emitted, pos: Position) -> Value {
        match self.coerce(value, &Type::Int32, pos) {
            Some(tv) => tv.value,
            None => Value::I32(0),
        }
    }

    // === Bindings ===

    fn bind_lets_field(&mut self, field: &mut Field) -> Option<EcoString> {
        let (name, ty) = (field.name.clone(), field.ty.clone());
        self.bind_let(&name, &ty, field.init.as_mut(), field.pos)
    }

    /// Declares one `let` binding: emits the initializer (or the type
    /// default), allocates the slot, and pushes the name. Returns the
    /// pushed name, or `None` when the declared type is unknown.
    fn bind_let(
        &mut self,
        name: &EcoString,
        ty_name: &EcoString,
        init: Option<&mut Expr>,
        pos: Position,
    ) -> Option<EcoString> {
        let Some(ty) = self.table.resolve_type(ty_name) else {
            self.error(pos, eco_format!("unknown type {ty_name}"));
            return None;
        };

        let value = match init {
            Some(init) => {
                let init_pos = init.pos;
                let emitted = self.emit_expr(init);
                self.coerce(emitted, &ty, init_pos)
            }
            None => self.default_value(&ty),
        };

        let binding = match value {
            Some(tv) => {
                let slot = self.builder.alloca(ir_ty(&ty));
                self.builder.store(tv.value, slot.clone());
                Binding::Slot { ptr: slot, ty }
            }
            None => Binding::Unit,
        };
        self.scope.push(name.clone(), binding);
        Some(name.clone())
    }

    // === Names ===

    fn emit_identifier(&mut self, name: &EcoString, pos: Position) -> Emitted {
        if let Some(binding) = self.scope.get(name).cloned() {
            return match binding {
                Binding::Slot { ptr, ty } => {
                    let value = self.builder.load(ptr);
                    Some(TypedValue { value, ty })
                }
                Binding::Direct { value, ty } => Some(TypedValue { value, ty }),
                Binding::Unit => None,
            };
        }
        if let Some((ty, index)) = self.self_field(name) {
            if ty.is_unit() {
                return None;
            }
            let receiver = self.self_value()?;
            let slot = self.builder.struct_gep(receiver, index);
            let value = self.builder.load(slot);
            return Some(TypedValue { value, ty });
        }
        self.error(pos, eco_format!("use of undeclared identifier {name}"));
        None
    }

    fn self_field(&self, name: &str) -> Option<(Type, u32)> {
        let class = self.self_class.as_ref()?;
        let info = self.table.field(class, name)?;
        Some((info.ty.clone(), info.index))
    }

    fn self_value(&self) -> Option<Value> {
        match self.scope.get("self") {
            Some(Binding::Direct { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    fn emit_assign(&mut self, name: &EcoString, value: &mut Expr, pos: Position) -> Emitted {
        let value_pos = value.pos;
        let emitted = self.emit_expr(value);

        if let Some(binding) = self.scope.get(name).cloned() {
            return match binding {
                Binding::Slot { ptr, ty } => {
                    let coerced = self.coerce(emitted, &ty, value_pos);
                    if let Some(tv) = &coerced {
                        self.builder.store(tv.value.clone(), ptr);
                    }
                    coerced
                }
                Binding::Unit => self.coerce(emitted, &Type::Unit, value_pos),
                Binding::Direct { .. } => {
                    self.error(pos, eco_format!("cannot assign to {name}"));
                    emitted
                }
            };
        }
        if let Some((ty, index)) = self.self_field(name) {
            let coerced = self.coerce(emitted, &ty, value_pos);
            if !ty.is_unit() {
                if let (Some(tv), Some(receiver)) = (&coerced, self.self_value()) {
                    let slot = self.builder.struct_gep(receiver, index);
                    self.builder.store(tv.value.clone(), slot);
                }
            }
            return coerced;
        }
        self.error(
            pos,
            eco_format!("assignment to undeclared identifier {name}"),
        );
        None
    }

    // === Operators ===

    fn check_bool(&mut self, value: Emitted, pos: Position) -> Value {
        match value {
            Some(tv) if tv.ty == Type::Bool => tv.value,
            other => {
                self.error(
                    pos,
                    eco_format!("expected type bool, but got type {}", ty_of(&other).name()),
                );
                Value::I1(false)
            }
        }
    }

    fn emit_unary(&mut self, op: UnaryOp, value: &mut Expr) -> Emitted {
        let pos = value.pos;
        let emitted = self.emit_expr(value);
        let ty = ty_of(&emitted);

        let (result, result_ty) = match op {
            UnaryOp::Not => {
                let operand = self.check_bool(emitted, pos);
                (self.builder.not(operand), Type::Bool)
            }
            UnaryOp::Minus => match (&ty, emitted) {
                (Type::Int32, Some(tv)) => (self.builder.neg(tv.value), Type::Int32),
                (Type::Double, Some(tv)) if self.table.dialect().is_extended() => (
                    self.builder.bin(BinOp::FSub, Value::F64(0.0), tv.value),
                    Type::Double,
                ),
                _ => {
                    self.error(
                        pos,
                        eco_format!("expected type int32, but got type {}", ty.name()),
                    );
                    (Value::I32(0), Type::Int32)
                }
            },
            UnaryOp::Isnull => match emitted {
                Some(tv) if tv.ty.is_class() => (self.builder.is_null(tv.value), Type::Bool),
                _ => {
                    self.error(
                        pos,
                        eco_format!("expected type Object, but got type {}", ty.name()),
                    );
                    (Value::I1(false), Type::Bool)
                }
            },
        };
        Some(TypedValue {
            value: result,
            ty: result_ty,
        })
    }

    fn emit_binary(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        pos: Position,
    ) -> Emitted {
        match op {
            BinaryOp::And => self.emit_short_circuit(true, lhs, rhs),
            BinaryOp::Or => self.emit_short_circuit(false, lhs, rhs),
            BinaryOp::Equal => Some(self.emit_equality(lhs, rhs, pos)),
            BinaryOp::NotEqual => {
                let eq = self.emit_equality(lhs, rhs, pos);
                Some(TypedValue {
                    value: self.builder.not(eq.value),
                    ty: Type::Bool,
                })
            }
            _ => self.emit_arith(op, lhs, rhs, pos),
        }
    }

    /// `and`/`or` lower exactly like the `if` they desugar to:
    /// `a and b` is `if a then b else false`, `a or b` is
    /// `if a then true else b`.
    fn emit_short_circuit(&mut self, is_and: bool, lhs: &mut Expr, rhs: &mut Expr) -> Emitted {
        let lhs_pos = lhs.pos;
        let lhs_val = self.emit_expr(lhs);
        let cond = self.check_bool(lhs_val, lhs_pos);

        let then_block = self.builder.add_block("then");
        let else_block = self.builder.add_block("else");
        let end_block = self.builder.add_block("end");
        self.builder.cond_br(cond, then_block, else_block);

        let rhs_pos = rhs.pos;
        let (rhs_block, short_block, short_value) = if is_and {
            (then_block, else_block, Value::I1(false))
        } else {
            (else_block, then_block, Value::I1(true))
        };

        self.builder.select_block(rhs_block);
        let rhs_val = self.emit_expr(rhs);
        let rhs_value = self.check_bool(rhs_val, rhs_pos);
        let rhs_end = self.builder.current_block();
        self.builder.br(end_block);

        self.builder.select_block(short_block);
        self.builder.br(end_block);

        self.builder.select_block(end_block);
        let phi = self.builder.phi(
            Ty::I1,
            vec![(rhs_value, rhs_end), (short_value, short_block)],
        );
        Some(TypedValue {
            value: phi,
            ty: Type::Bool,
        })
    }

    fn emit_equality(&mut self, lhs: &mut Expr, rhs: &mut Expr, pos: Position) -> TypedValue {
        let lhs_val = self.emit_expr(lhs);
        let rhs_val = self.emit_expr(rhs);
        let lhs_ty = ty_of(&lhs_val);
        let rhs_ty = ty_of(&rhs_val);

        let value = if lhs_ty == rhs_ty {
            match (&lhs_ty, lhs_val, rhs_val) {
                (Type::Unit, _, _) => Value::I1(true),
                (Type::Str, Some(l), Some(r)) => {
                    let strcmp = self.runtime_fn("strcmp", || {
                        FnSig::new(Ty::I32, vec![Ty::i8_ptr(), Ty::i8_ptr()])
                    });
                    let cmp = self.builder.call(strcmp, vec![l.value, r.value]);
                    self.builder.icmp(Cond::Eq, cmp, Value::I32(0))
                }
                (Type::Double, Some(l), Some(r)) => {
                    self.builder.fcmp(FCond::Oeq, l.value, r.value)
                }
                (_, Some(l), Some(r)) => self.builder.icmp(Cond::Eq, l.value, r.value),
                _ => Value::I1(false),
            }
        } else if let (Type::Class(a), Type::Class(b)) = (&lhs_ty, &rhs_ty) {
            // Compare pointers at the lowest common ancestor type.
            let lub = Type::Class(self.table.lub(a, b));
            let lub_ir = ir_ty(&lub);
            let l = lhs_val.map(|tv| self.builder.bitcast(tv.value, lub_ir.clone()));
            let r = rhs_val.map(|tv| self.builder.bitcast(tv.value, lub_ir));
            match (l, r) {
                (Some(l), Some(r)) => self.builder.icmp(Cond::Eq, l, r),
                _ => Value::I1(false),
            }
        } else if self.table.dialect().is_extended()
            && lhs_ty.is_numeric()
            && rhs_ty.is_numeric()
        {
            let l = self.widen(lhs_val);
            let r = self.widen(rhs_val);
            self.builder.fcmp(FCond::Oeq, l, r)
        } else {
            self.error(
                pos,
                eco_format!(
                    "expected agreeing types, but got {} and {}",
                    lhs_ty.name(),
                    rhs_ty.name()
                ),
            );
            Value::I1(false)
        };

        TypedValue {
            value,
            ty: Type::Bool,
        }
    }

    /// Widens an emitted numeric to `double`, defaulting on error paths.
    fn widen(&mut self, value: Emitted) -> Value {
        match value {
            Some(tv) if tv.ty == Type::Int32 => self.builder.cast(CastOp::SiToFp, tv.value),
            Some(tv) => tv.value,
            None => Value::F64(0.0),
        }
    }

    fn emit_arith(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        pos: Position,
    ) -> Emitted {
        let lhs_val = self.emit_expr(lhs);
        let rhs_val = self.emit_expr(rhs);
        let lhs_ty = ty_of(&lhs_val);
        let rhs_ty = ty_of(&rhs_val);

        if lhs_ty == Type::Int32 && rhs_ty == Type::Int32 {
            let l = lhs_val.map(|tv| tv.value).unwrap_or(Value::I32(0));
            let r = rhs_val.map(|tv| tv.value).unwrap_or(Value::I32(0));
            let (value, ty) = match op {
                BinaryOp::Lower => (self.builder.icmp(Cond::Slt, l, r), Type::Bool),
                BinaryOp::LowerEqual => (self.builder.icmp(Cond::Sle, l, r), Type::Bool),
                BinaryOp::Greater => (self.builder.icmp(Cond::Sgt, l, r), Type::Bool),
                BinaryOp::GreaterEqual => (self.builder.icmp(Cond::Sge, l, r), Type::Bool),
                BinaryOp::Plus => (self.builder.bin(BinOp::Add, l, r), Type::Int32),
                BinaryOp::Minus => (self.builder.bin(BinOp::Sub, l, r), Type::Int32),
                BinaryOp::Times => (self.builder.bin(BinOp::Mul, l, r), Type::Int32),
                BinaryOp::Div => (self.builder.bin(BinOp::SDiv, l, r), Type::Int32),
                BinaryOp::Mod => (self.builder.bin(BinOp::SRem, l, r), Type::Int32),
                BinaryOp::Pow => {
                    // Integer power goes through the float intrinsic and
                    // truncates back; out-of-range results are undefined.
                    let powi = self.runtime_fn("llvm.powi.f64.i32", || {
                        FnSig::new(Ty::F64, vec![Ty::F64, Ty::I32])
                    });
                    let base = self.builder.cast(CastOp::SiToFp, l);
                    let raised = self.builder.call(powi, vec![base, r]);
                    (self.builder.cast(CastOp::FpToSi, raised), Type::Int32)
                }
                _ => unreachable!("handled in emit_binary"),
            };
            return Some(TypedValue { value, ty });
        }

        if self.table.dialect().is_extended() && lhs_ty.is_numeric() && rhs_ty.is_numeric() {
            let l = self.widen(lhs_val);
            let r = self.widen(rhs_val);
            let (value, ty) = match op {
                BinaryOp::Lower => (self.builder.fcmp(FCond::Olt, l, r), Type::Bool),
                BinaryOp::LowerEqual => (self.builder.fcmp(FCond::Ole, l, r), Type::Bool),
                BinaryOp::Greater => (self.builder.fcmp(FCond::Ogt, l, r), Type::Bool),
                BinaryOp::GreaterEqual => (self.builder.fcmp(FCond::Oge, l, r), Type::Bool),
                BinaryOp::Plus => (self.builder.bin(BinOp::FAdd, l, r), Type::Double),
                BinaryOp::Minus => (self.builder.bin(BinOp::FSub, l, r), Type::Double),
                BinaryOp::Times => (self.builder.bin(BinOp::FMul, l, r), Type::Double),
                BinaryOp::Div => (self.builder.bin(BinOp::FDiv, l, r), Type::Double),
                BinaryOp::Mod => (self.builder.bin(BinOp::FRem, l, r), Type::Double),
                BinaryOp::Pow => {
                    let pow = self.runtime_fn("llvm.pow.f64", || {
                        FnSig::new(Ty::F64, vec![Ty::F64, Ty::F64])
                    });
                    (self.builder.call(pow, vec![l, r]), Type::Double)
                }
                _ => unreachable!("handled in emit_binary"),
            };
            return Some(TypedValue { value, ty });
        }

        self.error(
            pos,
            eco_format!(
                "expected type int32, but got types {} and {}",
                lhs_ty.name(),
                rhs_ty.name()
            ),
        );
        if op.is_comparison() {
            Some(TypedValue {
                value: Value::I1(false),
                ty: Type::Bool,
            })
        } else {
            Some(TypedValue {
                value: Value::I32(0),
                ty: Type::Int32,
            })
        }
    }

    // === Calls ===

    fn emit_call(
        &mut self,
        scope: &mut Expr,
        name: &EcoString,
        args: &mut [Expr],
        pos: Position,
    ) -> Emitted {
        let is_bare = scope.is_self();

        // A bare call outside any method can only be a top-level function
        // (extended dialect); the scope is then unit and never emitted.
        if is_bare && !self.scope.contains("self") {
            if let Some(info) = self.table.function(name).cloned() {
                scope.ty = Some(Type::Unit);
                let values = self.emit_args(args);
                return self.direct_call(&info, values, args, pos);
            }
        }

        let scope_pos = scope.pos;
        let scope_val = self.emit_expr(scope);
        let values = self.emit_args(args);

        let scope_ty = ty_of(&scope_val);
        let Type::Class(class) = &scope_ty else {
            self.error(
                scope_pos,
                eco_format!("expected class type, but got type {}", scope_ty.name()),
            );
            return None;
        };

        if let Some(info) = self.table.method(class, name).cloned() {
            let receiver = scope_val.expect("class-typed scope");
            let Some(call_args) = self.coerce_args(&info, "method", values, args, pos) else {
                return self.default_value(&info.ret);
            };
            return self.dispatch_method(receiver, &info, call_args);
        }
        // A zero-argument dispatch with no matching method reads a field.
        if args.is_empty() {
            if let Some(info) = self.table.field(class, name) {
                let (ty, index) = (info.ty.clone(), info.index);
                if ty.is_unit() {
                    return None;
                }
                let receiver = scope_val.expect("class-typed scope");
                let slot = self.builder.struct_gep(receiver.value, index);
                let value = self.builder.load(slot);
                return Some(TypedValue { value, ty });
            }
        }
        if is_bare {
            if let Some(info) = self.table.function(name).cloned() {
                return self.direct_call(&info, values, args, pos);
            }
        }
        self.error(pos, eco_format!("call to undeclared method {name}"));
        None
    }

    fn emit_args(&mut self, args: &mut [Expr]) -> Vec<Emitted> {
        args.iter_mut().map(|arg| self.emit_expr(arg)).collect()
    }

    fn direct_call(
        &mut self,
        info: &MethodInfo,
        values: Vec<Emitted>,
        args: &[Expr],
        pos: Position,
    ) -> Emitted {
        let Some(call_args) = self.coerce_args(info, "function", values, args, pos) else {
            return self.default_value(&info.ret);
        };
        let callee = self.builder.func(&info.symbol());
        let result = self.builder.call(callee, call_args);
        (!info.ret.is_unit()).then(|| TypedValue {
            value: result,
            ty: info.ret.clone(),
        })
    }

    /// Checks arity and conformance of call arguments. Unit-typed
    /// parameters carry no IR value; a variadic tail accepts any extras
    /// by position.
    fn coerce_args(
        &mut self,
        info: &MethodInfo,
        what: &str,
        values: Vec<Emitted>,
        args: &[Expr],
        pos: Position,
    ) -> Option<Vec<Value>> {
        let expected = info.formals.len();
        let arity_ok = if info.variadic {
            values.len() >= expected
        } else {
            values.len() == expected
        };
        if !arity_ok {
            self.error(
                pos,
                eco_format!("call to {what} {} with wrong number of arguments", info.name),
            );
            return None;
        }

        let mut out = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let arg_pos = args.get(index).map_or(pos, |arg| arg.pos);
            if index < expected {
                let ty = info.formals[index].1.clone();
                let coerced = self.coerce(value, &ty, arg_pos);
                if !ty.is_unit() {
                    if let Some(tv) = coerced {
                        out.push(tv.value);
                    }
                }
            } else if let Some(tv) = value {
                out.push(tv.value);
            }
        }
        Some(out)
    }

    fn runtime_fn(&mut self, name: &str, sig: impl FnOnce() -> FnSig) -> Value {
        self.builder.module_mut().get_or_declare_function(name, sig);
        self.builder.func(name)
    }
}
