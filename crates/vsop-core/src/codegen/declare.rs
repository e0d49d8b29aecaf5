// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Realizes the resolved tables in the IR module.
//!
//! For every class this declares the object struct (vtable pointer at slot
//! 0, fields at their resolved indices), the vtable struct and its global
//! constant, the `_new`/`_init` pair and all method prototypes. Method
//! prototypes type `self` as the *defining* class; subclass vtables bitcast
//! the inherited pointer to re-type the receiver, which is sound because
//! of the prefix layout invariant.
//!
//! `Object`'s methods, `Object_new` and `Object_init` stay declarations:
//! their definitions come from the runtime.

use std::rc::Rc;

use ecow::{eco_format, EcoString};

use super::{ir_ty, struct_name, vtable_struct_name};
use crate::ir::{FnSig, Module, Ty, VtableSlot};
use crate::semantic_analysis::{ClassTable, MethodInfo};

/// Declares every struct, vtable, and function the program needs.
pub(crate) fn declare_all(table: &ClassTable, module: &mut Module) {
    // Forward-declare all object structs first so that field and formal
    // types may reference classes declared later in the file.
    for class in table.classes_in_order() {
        module.declare_struct(struct_name(&class.name));
        module.declare_struct(vtable_struct_name(&class.name));
    }

    module.declare_function(
        "malloc",
        FnSig::new(Ty::i8_ptr(), vec![Ty::I64]),
        vec!["size".into()],
    );

    for class in table.classes_in_order() {
        declare_class(table, module, &class.name);
    }

    for function in functions_in_source_order(table) {
        declare_function(module, &function);
    }
}

/// IR parameter types of a method's formals. Unit formals carry no value
/// and are dropped from the IR signature.
fn formal_params(method: &MethodInfo) -> impl Iterator<Item = (&EcoString, Ty)> {
    method
        .formals
        .iter()
        .filter(|(_, ty)| !ty.is_unit())
        .map(|(name, ty)| (name, ir_ty(ty)))
}

/// The method function type with `self` typed as `receiver`.
fn method_fn_ty(method: &MethodInfo, receiver: &str) -> Ty {
    let mut params = vec![Ty::Struct(struct_name(receiver)).ptr()];
    params.extend(formal_params(method).map(|(_, ty)| ty));
    let sig = if method.variadic {
        FnSig::variadic(ir_ty(&method.ret), params)
    } else {
        FnSig::new(ir_ty(&method.ret), params)
    };
    Ty::Fn(Rc::new(sig)).ptr()
}

fn declare_class(table: &ClassTable, module: &mut Module, name: &str) {
    let class = table.class(name).expect("declared class");
    let self_ty = Ty::Struct(struct_name(name)).ptr();

    // Object struct body: vtable pointer, then fields by index.
    let mut body = vec![Ty::Struct(vtable_struct_name(name)).ptr()];
    for field in class.fields_by_index() {
        body.push(ir_ty(&field.ty));
    }
    module.set_struct_body(&struct_name(name), body);

    // VTable struct and its constant instance.
    let methods = class.methods_by_slot();
    let mut slot_tys = Vec::with_capacity(methods.len());
    let mut slots = Vec::with_capacity(methods.len());
    for method in &methods {
        let owner = method.owner.as_deref().expect("class methods have an owner");
        let declared = method_fn_ty(method, owner);
        let retyped = method_fn_ty(method, name);
        slot_tys.push(retyped.clone());
        slots.push(VtableSlot {
            func: method.symbol(),
            func_ty: declared,
            slot_ty: retyped,
        });
    }
    module.set_struct_body(&vtable_struct_name(name), slot_tys);
    module.add_vtable(
        eco_format!("vtable.{name}"),
        Ty::Struct(vtable_struct_name(name)),
        slots,
    );

    // Method prototypes, for the methods this class defines.
    for method in &methods {
        if method.owner.as_deref() != Some(name) {
            continue;
        }
        let mut params = vec![Ty::Struct(struct_name(name)).ptr()];
        params.extend(formal_params(method).map(|(_, ty)| ty));
        let mut names: Vec<EcoString> = vec!["self".into()];
        names.extend(formal_params(method).map(|(n, _)| n.clone()));
        let sig = if method.variadic {
            FnSig::variadic(ir_ty(&method.ret), params)
        } else {
            FnSig::new(ir_ty(&method.ret), params)
        };
        module.declare_function(method.symbol(), sig, names);
    }

    // Allocation and initialization pair.
    module.declare_function(
        eco_format!("{name}_new"),
        FnSig::new(self_ty.clone(), vec![]),
        vec![],
    );
    module.declare_function(
        eco_format!("{name}_init"),
        FnSig::new(Ty::Void, vec![self_ty]),
        vec!["self".into()],
    );
}

fn declare_function(module: &mut Module, function: &MethodInfo) {
    let params: Vec<Ty> = formal_params(function).map(|(_, ty)| ty).collect();
    let names: Vec<EcoString> = formal_params(function).map(|(n, _)| n.clone()).collect();
    let sig = if function.variadic {
        FnSig::variadic(ir_ty(&function.ret), params)
    } else {
        FnSig::new(ir_ty(&function.ret), params)
    };
    module.declare_function(function.symbol(), sig, names);
}

/// Top-level functions; iteration order of the underlying map is
/// irrelevant because declarations are independent.
fn functions_in_source_order(table: &ClassTable) -> Vec<MethodInfo> {
    let mut functions: Vec<MethodInfo> = Vec::new();
    // ClassTable does not retain declaration order for functions; sort by
    // source position for a deterministic module layout.
    let mut all: Vec<&MethodInfo> = table.functions().collect();
    all.sort_by_key(|f| (f.pos.line, f.pos.column));
    for function in all {
        functions.push(function.clone());
    }
    functions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::diagnostic::Diagnostics;
    use crate::parse::parse_program;
    use crate::semantic_analysis::resolve;
    use crate::source_analysis::{Dialect, Lexer};

    fn declare_source(source: &str) -> Module {
        let tokens: Vec<_> = Lexer::new(source, Dialect::Core)
            .collect::<Result<_, _>>()
            .unwrap();
        let mut tokens = tokens;
        tokens.push(crate::source_analysis::Token::new(
            crate::source_analysis::TokenKind::Eof,
            crate::source_analysis::Position::new(99, 1),
        ));
        let mut diagnostics = Diagnostics::new();
        let mut program: Program = parse_program(&tokens, Dialect::Core, &mut diagnostics);
        let table = resolve(&mut program, Dialect::Core, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let mut module = Module::new("test");
        declare_all(&table, &mut module);
        module
    }

    #[test]
    fn object_struct_is_just_a_vtable_pointer() {
        let module = declare_source("class Main { main() : int32 { 0 } }");
        assert_eq!(
            module.struct_body("struct.Object"),
            Some(&[Ty::Struct("struct.ObjectVTable".into()).ptr()][..])
        );
        // Object's builtins are declarations.
        let print = module.function("Object_print").unwrap();
        assert!(print.is_declaration());
        assert_eq!(print.sig.params.len(), 2);
    }

    #[test]
    fn fields_follow_the_vtable_pointer() {
        let module =
            declare_source("class A { x : int32; s : string; } class Main { main() : int32 { 0 } }");
        let body = module.struct_body("struct.A").unwrap();
        assert_eq!(body.len(), 3);
        assert_eq!(body[1], Ty::I32);
        assert_eq!(body[2], Ty::i8_ptr());
    }

    #[test]
    fn subclass_vtable_retypes_inherited_receivers() {
        let module = declare_source(
            "class A { m() : int32 { 0 } } class B extends A { } \
             class Main { main() : int32 { 0 } }",
        );
        let text = module.to_ir_text();
        assert!(
            text.contains("bitcast (i32 (%struct.A*)* @A_m to i32 (%struct.B*)*)"),
            "{text}"
        );
        // B defines no methods of its own: no B_m symbol.
        assert!(module.function("B_m").is_none());
        assert!(module.function("B_new").is_some());
        assert!(module.function("B_init").is_some());
    }
}
