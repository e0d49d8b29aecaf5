// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Function-level emission: `_init`/`_new` pairs, method and function
//! bodies, and the synthesized `main`.
//!
//! Object construction follows the two-function pattern: `C_new` allocates
//! with `malloc`, propagates a null pointer on allocation failure, and
//! otherwise calls `C_init` and installs the vtable pointer; `C_init`
//! first runs the parent's `_init` on the same memory (through a bitcast)
//! and then assigns each field from its initializer or the type default.
//! Field initializers run with an empty scope: they cannot see `self` or
//! other fields.

use std::collections::HashSet;

use ecow::{eco_format, EcoString};

use super::scope::{Binding, Scope};
use super::{ir_ty, struct_name};
use crate::ast::{Class, Method, Program};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::ir::{BlockId, Builder, FnSig, Module, Ty, Value};
use crate::semantic_analysis::{ClassTable, MethodInfo, Type};
use crate::source_analysis::Position;

/// An emitted expression: its SSA value and VSOP type. Unit expressions
/// carry no value at all and are represented by `None` at the call site.
#[derive(Debug, Clone)]
pub(crate) struct TypedValue {
    pub value: Value,
    pub ty: Type,
}

/// `Some(value)` for typed expressions, `None` for unit.
pub(crate) type Emitted = Option<TypedValue>;

/// The interleaved type checker and IR emitter.
pub(crate) struct Emitter<'a, 'm> {
    pub builder: Builder<'m>,
    pub table: &'a ClassTable,
    pub diagnostics: &'a mut Diagnostics,
    /// Lexical identifier stack; push/pop balanced on all paths.
    pub scope: Scope,
    /// Innermost loop exit blocks, for `break`.
    pub exits: Vec<BlockId>,
    /// The class whose method body is being emitted, if any.
    pub self_class: Option<EcoString>,
}

impl<'a, 'm> Emitter<'a, 'm> {
    /// Emits the whole program into `module`.
    pub fn run(
        program: &mut Program,
        table: &'a ClassTable,
        module: &'m mut Module,
        diagnostics: &'a mut Diagnostics,
    ) {
        let mut emitter = Emitter {
            builder: Builder::new(module),
            table,
            diagnostics,
            scope: Scope::default(),
            exits: Vec::new(),
            self_class: None,
        };
        for class in &mut program.classes {
            emitter.emit_class(class);
        }
        for function in &mut program.functions {
            emitter.emit_function(function);
        }
        emitter.emit_main();
    }

    pub(crate) fn error(&mut self, pos: Position, message: impl Into<EcoString>) {
        self.diagnostics.report(Diagnostic::semantic(message, pos));
    }

    // === Classes ===

    fn emit_class(&mut self, class: &mut Class) {
        if !self.table.has_class(&class.name) {
            return;
        }
        let name = class.name.clone();
        self.emit_init(class);
        self.emit_new(&name);
        for method in &mut class.methods {
            self.emit_method(&name, method);
        }
    }

    /// `C_init`: parent init, then field initializers in declaration order.
    fn emit_init(&mut self, class: &mut Class) {
        let name = class.name.clone();
        self.builder.start_function(&eco_format!("{name}_init"));
        self.self_class = None;

        let parent = self
            .table
            .class(&name)
            .and_then(|info| info.parent.clone());
        if let Some(parent) = parent {
            let parent_ptr = Ty::Struct(struct_name(&parent)).ptr();
            let as_parent = self.builder.bitcast(Value::Arg(0), parent_ptr);
            let callee = self.builder.func(&eco_format!("{parent}_init"));
            self.builder.call(callee, vec![as_parent]);
        }

        let mut seen: HashSet<EcoString> = HashSet::new();
        for field in &mut class.fields {
            let Some(info) = self.table.field(&name, &field.name) else {
                continue; // rejected during resolution
            };
            if info.owner != name || !seen.insert(field.name.clone()) {
                continue;
            }
            let (field_ty, index) = (info.ty.clone(), info.index);

            let value = match &mut field.init {
                Some(init) => {
                    let pos = init.pos;
                    let emitted = self.emit_expr(init);
                    self.coerce(emitted, &field_ty, pos)
                }
                None => self.default_value(&field_ty),
            };
            if field_ty.is_unit() {
                continue;
            }
            if let Some(tv) = value {
                let slot = self.builder.struct_gep(Value::Arg(0), index);
                self.builder.store(tv.value, slot);
            }
        }
        self.builder.ret(None);
    }

    /// `C_new`: malloc, null propagation, init call, vtable install.
    fn emit_new(&mut self, name: &EcoString) {
        self.builder.start_function(&eco_format!("{name}_new"));
        let self_ty = Ty::Struct(struct_name(name)).ptr();

        let init_block = self.builder.add_block("init");
        let null_block = self.builder.add_block("null");

        let size = struct_alloc_size(self.builder.module(), &struct_name(name));
        let malloc = self.builder.func("malloc");
        let memory = self.builder.call(malloc, vec![Value::I64(size as i64)]);
        let is_null = self.builder.is_null(memory.clone());
        self.builder.cond_br(is_null, null_block, init_block);

        self.builder.select_block(init_block);
        let instance = self.builder.bitcast(memory, self_ty.clone());
        let init_fn = self.builder.func(&eco_format!("{name}_init"));
        self.builder.call(init_fn, vec![instance.clone()]);
        let vtable_slot = self.builder.struct_gep(instance.clone(), 0);
        self.builder
            .store(Value::Global(eco_format!("vtable.{name}")), vtable_slot);
        self.builder.ret(Some(instance));

        self.builder.select_block(null_block);
        self.builder.ret(Some(Value::Null(self_ty)));
    }

    // === Methods and functions ===

    fn emit_method(&mut self, class_name: &EcoString, method: &mut Method) {
        let Some(info) = self.table.method(class_name, &method.name) else {
            return;
        };
        // Rejected members resolve to another declaration's entry; the
        // position ties the table entry back to this AST node.
        if info.owner.as_ref() != Some(class_name) || info.pos != method.pos {
            return;
        }
        let Some(body) = &mut method.body else {
            return;
        };
        let info = info.clone();

        self.builder.start_function(&info.symbol());
        self.self_class = Some(class_name.clone());
        self.scope.push(
            "self",
            Binding::Direct {
                value: Value::Arg(0),
                ty: Type::Class(class_name.clone()),
            },
        );
        self.bind_formals(&info, 1);

        let pos = body.pos;
        let result = self.emit_expr(body);
        self.finish_body(result, &info, pos);

        for (name, _) in info.formals.iter().rev() {
            self.scope.pop(name);
        }
        self.scope.pop("self");
        self.self_class = None;
    }

    fn emit_function(&mut self, function: &mut Method) {
        let Some(info) = self.table.function(&function.name) else {
            return;
        };
        if info.pos != function.pos {
            return;
        }
        let Some(body) = &mut function.body else {
            return;
        };
        let info = info.clone();

        self.builder.start_function(&info.symbol());
        self.self_class = None;
        self.bind_formals(&info, 0);

        let pos = body.pos;
        let result = self.emit_expr(body);
        self.finish_body(result, &info, pos);

        for (name, _) in info.formals.iter().rev() {
            self.scope.pop(name);
        }
    }

    /// Installs formals into the scope. Non-unit formals get a stack slot
    /// initialized from their argument; unit formals have no storage and
    /// no IR argument.
    fn bind_formals(&mut self, info: &MethodInfo, first_arg: u32) {
        let mut arg = first_arg;
        for (name, ty) in &info.formals {
            let binding = if ty.is_unit() {
                Binding::Unit
            } else {
                let slot = self.builder.alloca(ir_ty(ty));
                self.builder.store(Value::Arg(arg), slot.clone());
                arg += 1;
                Binding::Slot {
                    ptr: slot,
                    ty: ty.clone(),
                }
            };
            self.scope.push(name.clone(), binding);
        }
    }

    /// Coerces the body result to the declared return type and returns.
    fn finish_body(&mut self, result: Emitted, info: &MethodInfo, pos: Position) {
        if info.ret.is_unit() {
            self.builder.ret(None);
            return;
        }
        match self.coerce(result, &info.ret, pos) {
            Some(tv) => self.builder.ret(Some(tv.value)),
            None => {
                // coerce only yields None for unit targets; keep the IR
                // well-formed regardless.
                let fallback = self.default_value(&info.ret);
                self.builder.ret(fallback.map(|tv| tv.value));
            }
        }
    }

    /// The external `main` for the class form: `{ (new Main).main() }`.
    fn emit_main(&mut self) {
        if self.table.dialect().is_extended() && self.table.function("main").is_some() {
            return;
        }
        let Some(main) = self.table.method("Main", "main") else {
            return;
        };
        if !main.formals.is_empty() || main.ret != Type::Int32 {
            return;
        }
        let main = main.clone();

        if !self
            .builder
            .module_mut()
            .declare_function("main", FnSig::new(Ty::I32, vec![]), vec![])
        {
            return;
        }
        self.builder.start_function("main");
        let new_fn = self.builder.func("Main_new");
        let instance = self.builder.call(new_fn, vec![]);
        let receiver = TypedValue {
            value: instance,
            ty: Type::Class("Main".into()),
        };
        let result = self.dispatch_method(receiver, &main, vec![]);
        let value = result.map(|tv| tv.value).unwrap_or(Value::I32(0));
        self.builder.ret(Some(value));
    }

    // === Shared lowering helpers ===

    /// Calls a method through the receiver's vtable.
    pub(crate) fn dispatch_method(
        &mut self,
        receiver: TypedValue,
        info: &MethodInfo,
        args: Vec<Value>,
    ) -> Emitted {
        let vtable_slot = self.builder.struct_gep(receiver.value.clone(), 0);
        let vtable = self.builder.load(vtable_slot);
        let method_slot = self.builder.struct_gep(vtable, info.slot);
        let callee = self.builder.load(method_slot);

        let mut call_args = vec![receiver.value];
        call_args.extend(args);
        let result = self.builder.call(callee, call_args);
        (!info.ret.is_unit()).then(|| TypedValue {
            value: result,
            ty: info.ret.clone(),
        })
    }

    /// The default value of a type: `null` for classes, `""`, `0`,
    /// `false`; unit has none.
    pub(crate) fn default_value(&mut self, ty: &Type) -> Emitted {
        let value = match ty {
            Type::Unit => return None,
            Type::Bool => Value::I1(false),
            Type::Int32 => Value::I32(0),
            Type::Double => Value::F64(0.0),
            Type::Str => self.builder.cstring(b""),
            Type::Class(_) => Value::Null(ir_ty(ty)),
        };
        Some(TypedValue {
            value,
            ty: ty.clone(),
        })
    }

    /// Makes `value` acceptable where `target` is expected: identical
    /// types pass through, subclasses are upcast, and in the extended
    /// dialect numerics convert. Anything else is a type error; the
    /// target's default value keeps lowering going.
    pub(crate) fn coerce(&mut self, value: Emitted, target: &Type, pos: Position) -> Emitted {
        let got = value.as_ref().map_or(Type::Unit, |tv| tv.ty.clone());
        if got == *target {
            return value;
        }

        if let (Type::Class(from), Type::Class(to)) = (&got, target) {
            if self.table.is_subclass(from, to) {
                let tv = value.expect("class-typed value");
                let cast = self.builder.bitcast(tv.value, ir_ty(target));
                return Some(TypedValue {
                    value: cast,
                    ty: target.clone(),
                });
            }
        }

        if self.table.dialect().is_extended() && got.is_numeric() && target.is_numeric() {
            let tv = value.expect("numeric value");
            return Some(self.numeric_cast(tv, target));
        }

        self.error(
            pos,
            eco_format!(
                "expected type {}, but got type {}",
                target.name(),
                got.name()
            ),
        );
        self.default_value(target)
    }

    /// Converts between `int32` and `double` (extended dialect).
    pub(crate) fn numeric_cast(&mut self, value: TypedValue, target: &Type) -> TypedValue {
        use crate::ir::CastOp;
        if value.ty == *target {
            return value;
        }
        let cast = match target {
            Type::Double => self.builder.cast(CastOp::SiToFp, value.value),
            _ => self.builder.cast(CastOp::FpToSi, value.value),
        };
        TypedValue {
            value: cast,
            ty: target.clone(),
        }
    }
}

/// x86-64 allocation size of a struct body, with natural alignment.
fn struct_alloc_size(module: &Module, name: &str) -> u64 {
    fn size_align(ty: &Ty) -> (u64, u64) {
        match ty {
            Ty::I1 | Ty::I8 => (1, 1),
            Ty::I32 => (4, 4),
            _ => (8, 8),
        }
    }

    let Some(body) = module.struct_body(name) else {
        return 8;
    };
    let mut offset = 0u64;
    let mut max_align = 1u64;
    for ty in body {
        let (size, align) = size_align(ty);
        max_align = max_align.max(align);
        offset = offset.div_ceil(align) * align + size;
    }
    offset.div_ceil(max_align) * max_align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_sizes_follow_natural_alignment() {
        let mut module = Module::new("m");
        module.declare_struct("struct.A");
        // vtable*, i32 → 8 + 4, padded to 16.
        module.set_struct_body(
            "struct.A",
            vec![Ty::Struct("struct.AVTable".into()).ptr(), Ty::I32],
        );
        assert_eq!(struct_alloc_size(&module, "struct.A"), 16);

        module.declare_struct("struct.B");
        // vtable* only → 8.
        module.set_struct_body("struct.B", vec![Ty::Struct("struct.BVTable".into()).ptr()]);
        assert_eq!(struct_alloc_size(&module, "struct.B"), 8);

        module.declare_struct("struct.C");
        // vtable*, i32, i1, i8* → 8 + 4 + 1, pad to 16 + 8 = 24.
        module.set_struct_body(
            "struct.C",
            vec![
                Ty::Struct("struct.CVTable".into()).ptr(),
                Ty::I32,
                Ty::I1,
                Ty::i8_ptr(),
            ],
        );
        assert_eq!(struct_alloc_size(&module, "struct.C"), 24);
    }
}
