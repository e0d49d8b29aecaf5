// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The lexical identifier stack shared by the checker and the emitter.
//!
//! A name maps to a stack of bindings; shadowing pushes, leaving a scope
//! pops. Every component that pushes in its prologue pops in its epilogue
//! regardless of how the body went, so the stack stays balanced even on
//! error paths.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ir::Value;
use crate::semantic_analysis::Type;

/// Where a name's value lives.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// A stack slot; reads load, writes store.
    Slot { ptr: Value, ty: Type },
    /// A plain SSA value (`self`), never written.
    Direct { value: Value, ty: Type },
    /// A unit-typed binding with no storage.
    Unit,
}

impl Binding {
    /// The VSOP type of the binding.
    pub fn ty(&self) -> Type {
        match self {
            Self::Slot { ty, .. } | Self::Direct { ty, .. } => ty.clone(),
            Self::Unit => Type::Unit,
        }
    }
}

/// Stack-structured map from identifier to storage.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    names: HashMap<EcoString, Vec<Binding>>,
}

impl Scope {
    /// Pushes a binding, shadowing any outer one with the same name.
    pub fn push(&mut self, name: impl Into<EcoString>, binding: Binding) {
        self.names.entry(name.into()).or_default().push(binding);
    }

    /// Pops the innermost binding of `name`.
    pub fn pop(&mut self, name: &str) {
        if let Some(stack) = self.names.get_mut(name) {
            stack.pop();
            if stack.is_empty() {
                self.names.remove(name);
            }
        }
    }

    /// The innermost binding of `name`.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.names.get(name)?.last()
    }

    /// Returns `true` if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_pushes_and_pops() {
        let mut scope = Scope::default();
        scope.push("x", Binding::Slot { ptr: Value::I32(0), ty: Type::Int32 });
        scope.push("x", Binding::Unit);

        assert!(matches!(scope.get("x"), Some(Binding::Unit)));
        scope.pop("x");
        assert!(matches!(scope.get("x"), Some(Binding::Slot { .. })));
        scope.pop("x");
        assert!(!scope.contains("x"));
    }

    #[test]
    fn pop_of_unknown_name_is_a_noop() {
        let mut scope = Scope::default();
        scope.pop("ghost");
        assert!(!scope.contains("ghost"));
    }
}
