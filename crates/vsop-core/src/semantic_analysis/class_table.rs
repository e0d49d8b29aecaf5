// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Resolved class, field, method and function tables.
//!
//! The tables are name-keyed and own no AST: parent links are class names
//! resolved through the table on demand, which keeps the hierarchy a plain
//! value with no back-pointers.

use std::collections::HashMap;

use ecow::EcoString;

use super::Type;
use crate::source_analysis::{Dialect, Position};

/// A resolved field with its slot in the object struct.
///
/// Struct slot 0 is the vtable pointer, so field indices start at 1 and are
/// preserved down the hierarchy (prefix layout). Unit-typed fields occupy
/// no storage and share the next free index as a sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: EcoString,
    pub ty: Type,
    /// Index into the object struct.
    pub index: u32,
    /// Class that declares the field.
    pub owner: EcoString,
}

/// A resolved method (or top-level function) with its vtable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: EcoString,
    /// Declaring class; `None` for a top-level function.
    pub owner: Option<EcoString>,
    /// Resolved formal names and types, in declaration order.
    pub formals: Vec<(EcoString, Type)>,
    pub ret: Type,
    /// Index into the vtable. Stable across overrides. Zero for functions.
    pub slot: u32,
    /// `true` when the body is provided by the runtime.
    pub external: bool,
    /// `true` when the method accepts a variadic tail (extended dialect).
    pub variadic: bool,
    pub pos: Position,
}

impl MethodInfo {
    /// The symbol the method lowers to: `Owner_name`, or the bare name for
    /// top-level functions.
    #[must_use]
    pub fn symbol(&self) -> EcoString {
        match &self.owner {
            Some(owner) => ecow::eco_format!("{owner}_{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A resolved class with its merged member tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: EcoString,
    /// Parent class name; `None` only for `Object`.
    pub parent: Option<EcoString>,
    /// All fields, own and inherited, by name.
    pub fields: HashMap<EcoString, FieldInfo>,
    /// All methods, own and inherited (minus overridden), by name.
    pub methods: HashMap<EcoString, MethodInfo>,
    pub pos: Position,
}

impl ClassInfo {
    /// Fields that occupy struct slots, ordered by index.
    #[must_use]
    pub fn fields_by_index(&self) -> Vec<&FieldInfo> {
        let mut fields: Vec<_> = self.fields.values().filter(|f| !f.ty.is_unit()).collect();
        fields.sort_by_key(|f| f.index);
        fields
    }

    /// All methods ordered by vtable slot.
    #[must_use]
    pub fn methods_by_slot(&self) -> Vec<&MethodInfo> {
        let mut methods: Vec<_> = self.methods.values().collect();
        methods.sort_by_key(|m| m.slot);
        methods
    }
}

/// The resolved program: classes, top-level functions, and the subtype
/// relation induced by `extends`.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<EcoString, ClassInfo>,
    /// Installation order: every parent precedes its children.
    order: Vec<EcoString>,
    functions: HashMap<EcoString, MethodInfo>,
    dialect: Dialect,
}

impl ClassTable {
    /// Creates an empty table for the given dialect.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// The dialect the table was resolved under.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Returns `true` if a class with this name exists.
    #[must_use]
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Installs a class. Parents must be installed first.
    pub fn install(&mut self, class: ClassInfo) {
        self.order.push(class.name.clone());
        self.classes.insert(class.name.clone(), class);
    }

    /// Classes in installation order (parents before children).
    pub fn classes_in_order(&self) -> impl Iterator<Item = &ClassInfo> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }

    /// Mutable access to a class being resolved.
    pub(super) fn class_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    /// Looks up a top-level function (extended dialect).
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&MethodInfo> {
        self.functions.get(name)
    }

    /// Registers a top-level function.
    pub fn install_function(&mut self, function: MethodInfo) {
        self.functions.insert(function.name.clone(), function);
    }

    /// All top-level functions, in no particular order.
    pub fn functions(&self) -> impl Iterator<Item = &MethodInfo> {
        self.functions.values()
    }

    /// Looks up a method on a class, own or inherited.
    #[must_use]
    pub fn method(&self, class: &str, name: &str) -> Option<&MethodInfo> {
        self.classes.get(class)?.methods.get(name)
    }

    /// Looks up a field on a class, own or inherited.
    #[must_use]
    pub fn field(&self, class: &str, name: &str) -> Option<&FieldInfo> {
        self.classes.get(class)?.fields.get(name)
    }

    /// Resolves a surface type name to a [`Type`].
    ///
    /// `double` only resolves in the extended dialect; class names resolve
    /// once the class is installed.
    #[must_use]
    pub fn resolve_type(&self, name: &str) -> Option<Type> {
        match name {
            "unit" => Some(Type::Unit),
            "bool" => Some(Type::Bool),
            "int32" => Some(Type::Int32),
            "string" => Some(Type::Str),
            "double" if self.dialect.is_extended() => Some(Type::Double),
            _ if self.has_class(name) => Some(Type::Class(name.into())),
            _ => None,
        }
    }

    /// Returns `true` if class `a` is `b` or a descendant of `b`.
    #[must_use]
    pub fn is_subclass(&self, a: &str, b: &str) -> bool {
        let mut current = Some(a);
        while let Some(name) = current {
            if name == b {
                return true;
            }
            current = self
                .classes
                .get(name)
                .and_then(|c| c.parent.as_deref());
        }
        false
    }

    /// Returns `true` if a value of type `from` is acceptable where `to` is
    /// expected: identical types, or a class and one of its ancestors.
    ///
    /// Numeric widening is not conformance — the emitter inserts explicit
    /// casts where the dialect allows it.
    #[must_use]
    pub fn conforms(&self, from: &Type, to: &Type) -> bool {
        match (from, to) {
            (Type::Class(a), Type::Class(b)) => self.is_subclass(a, b),
            _ => from == to,
        }
    }

    /// The least upper bound of two class types: their lowest common
    /// ancestor, which exists because `Object` roots every class.
    #[must_use]
    pub fn lub(&self, a: &str, b: &str) -> EcoString {
        let mut current = a;
        loop {
            if self.is_subclass(b, current) {
                return current.into();
            }
            match self.classes.get(current).and_then(|c| c.parent.as_deref()) {
                Some(parent) => current = parent,
                None => return current.into(),
            }
        }
    }
}
