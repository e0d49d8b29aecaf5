// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the type lattice and declaration resolver.
//!
//! These use `proptest` over generated class hierarchies to verify:
//!
//! 1. **Subtyping is reflexive and transitive**
//! 2. **LUB is the lowest common ancestor** — an ancestor of both sides,
//!    with no proper subclass that is also one
//! 3. **Overrides keep their vtable slot**
//! 4. **Field layout is a prefix of every subclass layout**

use proptest::prelude::*;

use super::{resolve, ClassTable};
use crate::ast::{Class, Expr, ExprKind, Field, Method, Program};
use crate::diagnostic::Diagnostics;
use crate::source_analysis::{Dialect, Position};

/// A generated hierarchy description: for each class `Ci`, the index of its
/// parent among the previous classes (`None` = `Object`), its field count,
/// and which inherited-visible method names it overrides.
#[derive(Debug, Clone)]
struct HierarchySpec {
    parents: Vec<Option<usize>>,
    field_counts: Vec<usize>,
    method_counts: Vec<usize>,
}

fn hierarchy_spec() -> impl Strategy<Value = HierarchySpec> {
    (2usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(any::<u16>(), n),
            prop::collection::vec(0usize..4, n),
            prop::collection::vec(0usize..3, n),
        )
            .prop_map(|(seeds, field_counts, method_counts)| {
                // Class 0 extends Object; every later class picks either
                // Object or one of the earlier classes as its parent, so
                // the hierarchy is always a well-formed forest.
                let parents = seeds
                    .iter()
                    .enumerate()
                    .map(|(i, &seed)| {
                        let choice = usize::from(seed) % (i + 1);
                        (choice < i).then_some(choice)
                    })
                    .collect();
                HierarchySpec {
                    parents,
                    field_counts,
                    method_counts,
                }
            })
    })
}

fn class_name(i: usize) -> String {
    format!("C{i}")
}

fn pos() -> Position {
    Position::new(1, 1)
}

fn int_method(name: String) -> Method {
    Method {
        name: name.into(),
        formals: vec![],
        ret: "int32".into(),
        body: Some(Expr::new(
            ExprKind::Block(vec![Expr::new(ExprKind::Integer(0), pos())]),
            pos(),
        )),
        variadic: false,
        pos: pos(),
    }
}

/// Builds and resolves a program from a hierarchy spec.
///
/// Every class `Ci` declares fields `fi_0..` and methods `mi_0..`; on top
/// of that, each class re-declares (overrides) method `m{p}_0` of its
/// parent `Cp` when the parent has one.
fn resolve_spec(spec: &HierarchySpec) -> ClassTable {
    let mut classes = Vec::new();
    for (i, parent) in spec.parents.iter().enumerate() {
        let parent_name = match parent {
            Some(p) => class_name(*p),
            None => "Object".to_string(),
        };

        let fields = (0..spec.field_counts[i])
            .map(|j| Field {
                name: format!("f{i}_{j}").into(),
                ty: "int32".into(),
                init: None,
                pos: pos(),
            })
            .collect();

        let mut methods: Vec<Method> = (0..spec.method_counts[i])
            .map(|j| int_method(format!("m{i}_{j}")))
            .collect();
        if let Some(p) = parent {
            if spec.method_counts[*p] > 0 {
                methods.push(int_method(format!("m{p}_0")));
            }
        }

        classes.push(Class {
            name: class_name(i).into(),
            parent: parent_name.into(),
            fields,
            methods,
            pos: pos(),
        });
    }
    // Entry point, so the resolver has nothing else to complain about.
    classes.push(Class {
        name: "Main".into(),
        parent: "Object".into(),
        fields: vec![],
        methods: vec![int_method("main".to_string())],
        pos: pos(),
    });

    let mut program = Program {
        classes,
        functions: vec![],
    };
    let mut diagnostics = Diagnostics::new();
    let table = resolve(&mut program, Dialect::Core, &mut diagnostics);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    table
}

proptest! {
    #[test]
    fn subtyping_is_reflexive(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        for i in 0..spec.parents.len() {
            prop_assert!(table.is_subclass(&class_name(i), &class_name(i)));
        }
    }

    #[test]
    fn subtyping_is_transitive(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        let n = spec.parents.len();
        for a in 0..n {
            for b in 0..n {
                for c in 0..n {
                    let ab = table.is_subclass(&class_name(a), &class_name(b));
                    let bc = table.is_subclass(&class_name(b), &class_name(c));
                    if ab && bc {
                        prop_assert!(table.is_subclass(&class_name(a), &class_name(c)));
                    }
                }
            }
        }
    }

    #[test]
    fn lub_is_the_lowest_common_ancestor(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        let n = spec.parents.len();
        for a in 0..n {
            for b in 0..n {
                let a = class_name(a);
                let b = class_name(b);
                let lub = table.lub(&a, &b);
                // An upper bound of both sides.
                prop_assert!(table.is_subclass(&a, &lub));
                prop_assert!(table.is_subclass(&b, &lub));
                // And the lowest one: no class strictly below it bounds both.
                for c in (0..n).map(class_name).chain(["Object".to_string()]) {
                    if table.is_subclass(&a, &c) && table.is_subclass(&b, &c) {
                        prop_assert!(table.is_subclass(&lub, &c));
                    }
                }
            }
        }
    }

    #[test]
    fn override_preserves_vtable_slot(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        for (i, parent) in spec.parents.iter().enumerate() {
            let Some(p) = parent else { continue };
            if spec.method_counts[*p] == 0 {
                continue;
            }
            let overridden = format!("m{p}_0");
            let child_slot = table.method(&class_name(i), &overridden).unwrap().slot;
            let parent_slot = table.method(&class_name(*p), &overridden).unwrap().slot;
            prop_assert_eq!(child_slot, parent_slot);
        }
    }

    #[test]
    fn field_layout_is_a_prefix_of_subclasses(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        for (i, parent) in spec.parents.iter().enumerate() {
            let Some(p) = parent else { continue };
            let parent_info = table.class(&class_name(*p)).unwrap();
            for field in parent_info.fields.values() {
                let inherited = table.field(&class_name(i), &field.name).unwrap();
                prop_assert_eq!(inherited.index, field.index);
            }
        }
    }

    #[test]
    fn field_indices_are_dense_from_one(spec in hierarchy_spec()) {
        let table = resolve_spec(&spec);
        for i in 0..spec.parents.len() {
            let info = table.class(&class_name(i)).unwrap();
            let slots: Vec<u32> = info.fields_by_index().iter().map(|f| f.index).collect();
            let expected: Vec<u32> = (1..=slots.len() as u32).collect();
            prop_assert_eq!(slots, expected);
        }
    }
}
