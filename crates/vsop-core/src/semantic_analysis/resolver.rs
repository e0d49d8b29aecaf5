// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Declaration resolution.
//!
//! Builds the [`ClassTable`] from a parsed [`Program`]:
//!
//! 1. **Class graph.** Seed the table with `Object`, then repeatedly
//!    install classes whose parent is already present. Whatever is left at
//!    quiescence has an unknown parent or sits on a cycle and is rejected.
//! 2. **Members.** Per class, in installation order (parents first):
//!    assign struct indices to fields and vtable slots to methods, check
//!    redefinitions, field shadowing and override signatures, then merge
//!    the parent's tables.
//! 3. **Functions.** Register top-level functions (extended dialect).
//! 4. **Entry point.** Require `Main.main() : int32`, or a top-level
//!    `main() : int32` in the extended dialect.
//!
//! Rejected declarations are dropped from the table (and rejected classes
//! from the AST) so that later stages only ever see resolved names.

use std::collections::HashMap;

use ecow::{eco_format, EcoString};
use tracing::debug;

use super::{builtins, ClassInfo, ClassTable, FieldInfo, MethodInfo, Type};
use crate::ast::{Method, Program};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::source_analysis::{Dialect, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Installed,
    Removed,
}

/// Resolves all declarations of `program`, reporting problems into
/// `diagnostics`. Classes that cannot be installed are removed from the
/// AST; invalid members are simply absent from the returned table.
pub fn resolve(
    program: &mut Program,
    dialect: Dialect,
    diagnostics: &mut Diagnostics,
) -> ClassTable {
    let mut table = ClassTable::new(dialect);
    table.install(builtins::object_class());

    link_class_graph(program, &mut table, diagnostics);

    let order: Vec<EcoString> = table
        .classes_in_order()
        .map(|c| c.name.clone())
        .filter(|name| name != "Object")
        .collect();
    let ast_index: HashMap<EcoString, usize> = program
        .classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();

    for name in &order {
        let Some(&index) = ast_index.get(name) else {
            continue;
        };
        resolve_members(program, index, &mut table, diagnostics);
    }

    if dialect.is_extended() {
        resolve_functions(program, &mut table, diagnostics);
    }

    check_entry_point(program, &table, diagnostics);

    debug!(
        classes = order.len(),
        errors = diagnostics.len(),
        "declaration resolution finished"
    );
    table
}

/// Installs classes until quiescence, then rejects the stranded ones.
fn link_class_graph(program: &mut Program, table: &mut ClassTable, diagnostics: &mut Diagnostics) {
    let mut states = vec![State::Pending; program.classes.len()];

    loop {
        let mut progress = false;
        for (i, class) in program.classes.iter().enumerate() {
            if states[i] != State::Pending {
                continue;
            }
            if table.has_class(&class.name) {
                diagnostics.report(Diagnostic::semantic(
                    eco_format!("redefinition of class {}", class.name),
                    class.pos,
                ));
                states[i] = State::Removed;
                progress = true;
            } else if table.has_class(&class.parent) {
                table.install(ClassInfo {
                    name: class.name.clone(),
                    parent: Some(class.parent.clone()),
                    fields: HashMap::new(),
                    methods: HashMap::new(),
                    pos: class.pos,
                });
                states[i] = State::Installed;
                progress = true;
            }
        }
        if !progress {
            break;
        }
    }

    // Unknown parents and cycles both strand their classes.
    for (i, class) in program.classes.iter().enumerate() {
        if states[i] == State::Pending {
            diagnostics.report(Diagnostic::semantic(
                eco_format!(
                    "class {} cannot extend class {}",
                    class.name,
                    class.parent
                ),
                class.pos,
            ));
            states[i] = State::Removed;
        }
    }

    let mut keep = states.into_iter().map(|s| s == State::Installed);
    program.classes.retain(|_| keep.next().unwrap_or(false));
}

/// Resolves the fields and methods of one class. The parent is fully
/// resolved when this runs.
fn resolve_members(
    program: &Program,
    class_index: usize,
    table: &mut ClassTable,
    diagnostics: &mut Diagnostics,
) {
    let class = &program.classes[class_index];
    let parent = table
        .class(&class.parent)
        .cloned()
        .expect("parent installed before child");

    let mut next_field_index = 1;
    for field in parent.fields.values() {
        next_field_index = next_field_index.max(field.index + 1);
    }
    let mut next_slot = 0;
    for method in parent.methods.values() {
        next_slot = next_slot.max(method.slot + 1);
    }

    // Fields, in declaration order.
    let mut fields: HashMap<EcoString, FieldInfo> = HashMap::new();
    for field in &class.fields {
        let Some(ty) = table.resolve_type(&field.ty) else {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("unknown type {}", field.ty),
                field.pos,
            ));
            continue;
        };
        if fields.contains_key(&field.name) {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("redefinition of field {}", field.name),
                field.pos,
            ));
            continue;
        }
        if parent.fields.contains_key(&field.name) {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("overriding field {}", field.name),
                field.pos,
            ));
            continue;
        }
        // Unit fields occupy no slot and share the sentinel index.
        let index = if ty.is_unit() {
            next_field_index
        } else {
            next_field_index += 1;
            next_field_index - 1
        };
        fields.insert(
            field.name.clone(),
            FieldInfo {
                name: field.name.clone(),
                ty,
                index,
                owner: class.name.clone(),
            },
        );
    }
    for (name, field) in &parent.fields {
        fields.entry(name.clone()).or_insert_with(|| field.clone());
    }

    // Methods.
    let mut methods: HashMap<EcoString, MethodInfo> = HashMap::new();
    for method in &class.methods {
        if methods.contains_key(&method.name) {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("redefinition of method {}", method.name),
                method.pos,
            ));
            continue;
        }
        let Some((formals, ret)) = resolve_signature(method, table, diagnostics) else {
            continue;
        };
        let slot = if let Some(inherited) = parent.methods.get(&method.name) {
            let same_signature = inherited.ret == ret
                && inherited.formals.len() == formals.len()
                && inherited
                    .formals
                    .iter()
                    .zip(&formals)
                    .all(|((_, a), (_, b))| a == b);
            if !same_signature {
                diagnostics.report(Diagnostic::semantic(
                    eco_format!(
                        "overriding method {} with different signature",
                        method.name
                    ),
                    method.pos,
                ));
                continue;
            }
            inherited.slot
        } else {
            next_slot += 1;
            next_slot - 1
        };
        methods.insert(
            method.name.clone(),
            MethodInfo {
                name: method.name.clone(),
                owner: Some(class.name.clone()),
                formals,
                ret,
                slot,
                external: method.body.is_none(),
                variadic: method.variadic,
                pos: method.pos,
            },
        );
    }
    for (name, method) in &parent.methods {
        methods.entry(name.clone()).or_insert_with(|| method.clone());
    }

    let info = table.class_mut(&class.name).expect("class installed");
    info.fields = fields;
    info.methods = methods;
}

/// Resolves a method's formal types and return type. Invalid formals are
/// dropped; an invalid return type drops the whole method.
fn resolve_signature(
    method: &Method,
    table: &ClassTable,
    diagnostics: &mut Diagnostics,
) -> Option<(Vec<(EcoString, Type)>, Type)> {
    let mut formals: Vec<(EcoString, Type)> = Vec::with_capacity(method.formals.len());
    for formal in &method.formals {
        let Some(ty) = table.resolve_type(&formal.ty) else {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("unknown type {}", formal.ty),
                formal.pos,
            ));
            continue;
        };
        if formals.iter().any(|(name, _)| name == &formal.name) {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("redefinition of formal {}", formal.name),
                formal.pos,
            ));
            continue;
        }
        formals.push((formal.name.clone(), ty));
    }

    let Some(ret) = table.resolve_type(&method.ret) else {
        diagnostics.report(Diagnostic::semantic(
            eco_format!("unknown type {}", method.ret),
            method.pos,
        ));
        return None;
    };
    Some((formals, ret))
}

/// Registers top-level functions (extended dialect only).
fn resolve_functions(program: &Program, table: &mut ClassTable, diagnostics: &mut Diagnostics) {
    for function in &program.functions {
        if table.function(&function.name).is_some() {
            diagnostics.report(Diagnostic::semantic(
                eco_format!("redefinition of function {}", function.name),
                function.pos,
            ));
            continue;
        }
        let Some((formals, ret)) = resolve_signature(function, table, diagnostics) else {
            continue;
        };
        table.install_function(MethodInfo {
            name: function.name.clone(),
            owner: None,
            formals,
            ret,
            slot: 0,
            external: function.body.is_none(),
            variadic: function.variadic,
            pos: function.pos,
        });
    }
}

/// Validates the program entry point.
fn check_entry_point(program: &Program, table: &ClassTable, diagnostics: &mut Diagnostics) {
    if table.dialect().is_extended() {
        if let Some(main) = table.function("main") {
            if !main.formals.is_empty() || main.ret != Type::Int32 {
                diagnostics.report(Diagnostic::semantic(
                    "function main declared with wrong signature",
                    main.pos,
                ));
            }
            return;
        }
    }

    let Some(main_class) = table.class("Main") else {
        diagnostics.report(Diagnostic::semantic(
            "undeclared class Main",
            Position::new(1, 1),
        ));
        return;
    };
    match main_class.methods.get("main") {
        Some(main) => {
            if !main.formals.is_empty() || main.ret != Type::Int32 {
                diagnostics.report(Diagnostic::semantic(
                    "method main declared with wrong signature",
                    main.pos,
                ));
            }
        }
        None => {
            let pos = program
                .classes
                .iter()
                .find(|c| c.name == "Main")
                .map_or(main_class.pos, |c| c.pos);
            diagnostics.report(Diagnostic::semantic(
                "undeclared method main in class Main",
                pos,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Class, Expr, ExprKind, Field, Formal};

    fn pos() -> Position {
        Position::new(1, 1)
    }

    fn block_zero() -> Option<Expr> {
        Some(Expr::new(
            ExprKind::Block(vec![Expr::new(ExprKind::Integer(0), pos())]),
            pos(),
        ))
    }

    fn method(name: &str, formals: Vec<Formal>, ret: &str) -> Method {
        Method {
            name: name.into(),
            formals,
            ret: ret.into(),
            body: block_zero(),
            variadic: false,
            pos: pos(),
        }
    }

    fn field(name: &str, ty: &str) -> Field {
        Field {
            name: name.into(),
            ty: ty.into(),
            init: None,
            pos: pos(),
        }
    }

    fn class(name: &str, parent: &str, fields: Vec<Field>, methods: Vec<Method>) -> Class {
        Class {
            name: name.into(),
            parent: parent.into(),
            fields,
            methods,
            pos: pos(),
        }
    }

    fn main_class() -> Class {
        class("Main", "Object", vec![], vec![method("main", vec![], "int32")])
    }

    fn run(classes: Vec<Class>) -> (Program, ClassTable, Diagnostics) {
        let mut program = Program {
            classes,
            functions: vec![],
        };
        let mut diagnostics = Diagnostics::new();
        let table = resolve(&mut program, Dialect::Core, &mut diagnostics);
        (program, table, diagnostics)
    }

    #[test]
    fn resolves_a_minimal_program() {
        let (_, table, diagnostics) = run(vec![main_class()]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let main = table.class("Main").unwrap();
        assert_eq!(main.parent.as_deref(), Some("Object"));
        // Object's six builtins are merged in.
        assert_eq!(main.methods.len(), 7);
        assert_eq!(main.methods["main"].slot, 6);
    }

    #[test]
    fn self_extension_is_rejected_by_quiescence() {
        let (program, _, diagnostics) = run(vec![
            class("Main", "Main", vec![], vec![method("main", vec![], "int32")]),
        ]);
        assert!(program.classes.is_empty());
        let messages: Vec<_> = diagnostics.iter().map(ToString::to_string).collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("class Main cannot extend class Main")));
    }

    #[test]
    fn inheritance_cycle_is_rejected() {
        let (_, table, diagnostics) = run(vec![
            class("A", "B", vec![], vec![]),
            class("B", "A", vec![], vec![]),
            main_class(),
        ]);
        assert!(!table.has_class("A"));
        assert!(!table.has_class("B"));
        assert_eq!(
            diagnostics
                .iter()
                .filter(|d| d.message.contains("cannot extend"))
                .count(),
            2
        );
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let (program, _, diagnostics) = run(vec![
            main_class(),
            class("Main", "Object", vec![], vec![]),
        ]);
        assert_eq!(program.classes.len(), 1);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("redefinition of class Main")));
    }

    #[test]
    fn field_indices_start_after_vtable_slot() {
        let (_, table, diagnostics) = run(vec![
            class(
                "A",
                "Object",
                vec![field("x", "int32"), field("y", "string")],
                vec![],
            ),
            main_class(),
        ]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let a = table.class("A").unwrap();
        assert_eq!(a.fields["x"].index, 1);
        assert_eq!(a.fields["y"].index, 2);
    }

    #[test]
    fn subclass_preserves_parent_field_indices() {
        let (_, table, _) = run(vec![
            class("A", "Object", vec![field("x", "int32")], vec![]),
            class("B", "A", vec![field("z", "bool")], vec![]),
            main_class(),
        ]);
        let a = table.class("A").unwrap();
        let b = table.class("B").unwrap();
        assert_eq!(b.fields["x"].index, a.fields["x"].index);
        assert_eq!(b.fields["z"].index, 2);
    }

    #[test]
    fn unit_fields_share_the_sentinel_index() {
        let (_, table, _) = run(vec![
            class(
                "A",
                "Object",
                vec![field("u", "unit"), field("x", "int32"), field("v", "unit")],
                vec![],
            ),
            main_class(),
        ]);
        let a = table.class("A").unwrap();
        assert_eq!(a.fields["u"].index, 1);
        assert_eq!(a.fields["x"].index, 1);
        assert_eq!(a.fields["v"].index, 2);
        // Only non-unit fields occupy struct slots.
        assert_eq!(a.fields_by_index().len(), 1);
    }

    #[test]
    fn field_shadowing_is_rejected() {
        let (_, table, diagnostics) = run(vec![
            class("A", "Object", vec![field("x", "int32")], vec![]),
            class("B", "A", vec![field("x", "int32")], vec![]),
            main_class(),
        ]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("overriding field x")));
        // The inherited field survives.
        assert_eq!(table.class("B").unwrap().fields["x"].owner, "A");
    }

    #[test]
    fn override_keeps_vtable_slot() {
        let (_, table, diagnostics) = run(vec![
            class(
                "A",
                "Object",
                vec![],
                vec![method("go", vec![], "int32")],
            ),
            class("B", "A", vec![], vec![method("go", vec![], "int32")]),
            main_class(),
        ]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let a = table.class("A").unwrap();
        let b = table.class("B").unwrap();
        assert_eq!(a.methods["go"].slot, b.methods["go"].slot);
        assert_eq!(b.methods["go"].owner.as_deref(), Some("B"));
    }

    #[test]
    fn override_with_different_signature_is_rejected() {
        let (_, table, diagnostics) = run(vec![
            class(
                "A",
                "Object",
                vec![],
                vec![method("go", vec![], "int32")],
            ),
            class("B", "A", vec![], vec![method("go", vec![], "bool")]),
            main_class(),
        ]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("overriding method go with different signature")));
        // The parent's version is inherited instead.
        assert_eq!(table.class("B").unwrap().methods["go"].owner.as_deref(), Some("A"));
    }

    #[test]
    fn builtin_override_with_same_signature_is_allowed() {
        let (_, table, diagnostics) = run(vec![
            class(
                "A",
                "Object",
                vec![],
                vec![Method {
                    name: "print".into(),
                    formals: vec![Formal {
                        name: "s".into(),
                        ty: "string".into(),
                        pos: pos(),
                    }],
                    ret: "Object".into(),
                    body: block_zero(),
                    variadic: false,
                    pos: pos(),
                }],
            ),
            main_class(),
        ]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(table.class("A").unwrap().methods["print"].slot, 0);
    }

    #[test]
    fn missing_main_is_reported() {
        let (_, _, diagnostics) = run(vec![class("A", "Object", vec![], vec![])]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("undeclared class Main")));

        let (_, _, diagnostics) = run(vec![class("Main", "Object", vec![], vec![])]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("undeclared method main in class Main")));

        let (_, _, diagnostics) = run(vec![class(
            "Main",
            "Object",
            vec![],
            vec![method("main", vec![], "bool")],
        )]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("method main declared with wrong signature")));
    }

    #[test]
    fn unknown_field_type_is_reported_and_dropped() {
        let (_, table, diagnostics) = run(vec![
            class("A", "Object", vec![field("x", "Missing")], vec![]),
            main_class(),
        ]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("unknown type Missing")));
        assert!(table.class("A").unwrap().fields.is_empty());
    }

    #[test]
    fn extended_top_level_main_satisfies_entry_point() {
        let mut program = Program {
            classes: vec![],
            functions: vec![method("main", vec![], "int32")],
        };
        let mut diagnostics = Diagnostics::new();
        let table = resolve(&mut program, Dialect::Extended, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert!(table.function("main").is_some());
    }
}
