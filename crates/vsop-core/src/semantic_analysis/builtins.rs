// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The built-in `Object` class.
//!
//! `Object` roots the class hierarchy and declares the runtime-provided
//! I/O methods. All of them are external: the linker resolves their symbols
//! (`Object_print`, …) against the runtime object file.

use std::collections::HashMap;

use ecow::EcoString;

use super::{ClassInfo, MethodInfo, Type};
use crate::source_analysis::Position;

fn external(name: &str, formals: Vec<(EcoString, Type)>, ret: Type, slot: u32) -> MethodInfo {
    MethodInfo {
        name: name.into(),
        owner: Some("Object".into()),
        formals,
        ret,
        slot,
        external: true,
        variadic: false,
        pos: Position::new(1, 1),
    }
}

/// Builds the `Object` class info with its six built-in methods.
///
/// Slot order is fixed: overriding any of these in a subclass must keep
/// the same vtable slot.
#[must_use]
pub fn object_class() -> ClassInfo {
    let object = Type::Class("Object".into());
    let methods = [
        external("print", vec![("s".into(), Type::Str)], object.clone(), 0),
        external("printBool", vec![("b".into(), Type::Bool)], object.clone(), 1),
        external("printInt32", vec![("i".into(), Type::Int32)], object.clone(), 2),
        external("inputLine", vec![], Type::Str, 3),
        external("inputBool", vec![], Type::Bool, 4),
        external("inputInt32", vec![], Type::Int32, 5),
    ];

    ClassInfo {
        name: "Object".into(),
        parent: None,
        fields: HashMap::new(),
        methods: methods
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect(),
        pos: Position::new(1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_declares_the_six_builtins() {
        let object = object_class();
        assert_eq!(object.methods.len(), 6);
        assert!(object.parent.is_none());

        let print = &object.methods["print"];
        assert!(print.external);
        assert_eq!(print.slot, 0);
        assert_eq!(print.symbol(), "Object_print");
        assert_eq!(print.ret, Type::Class("Object".into()));

        let input_int = &object.methods["inputInt32"];
        assert_eq!(input_int.slot, 5);
        assert_eq!(input_int.ret, Type::Int32);
        assert!(input_int.formals.is_empty());
    }
}
