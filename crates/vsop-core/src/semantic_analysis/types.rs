// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The VSOP type lattice.

use ecow::EcoString;

/// A VSOP static type.
///
/// The closed set of primitives plus class names. `Double` only exists in
/// the extended dialect. Only class types are nullable; primitives are
/// unrelated to each other and to classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Unit,
    Bool,
    Int32,
    /// Extended dialect only.
    Double,
    Str,
    Class(EcoString),
}

impl Type {
    /// The surface name of the type, as printed in dumps and diagnostics.
    #[must_use]
    pub fn name(&self) -> EcoString {
        match self {
            Self::Unit => "unit".into(),
            Self::Bool => "bool".into(),
            Self::Int32 => "int32".into(),
            Self::Double => "double".into(),
            Self::Str => "string".into(),
            Self::Class(name) => name.clone(),
        }
    }

    /// Returns the class name for class types.
    #[must_use]
    pub fn class_name(&self) -> Option<&EcoString> {
        match self {
            Self::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` for class types.
    #[must_use]
    pub const fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }

    /// Returns `true` for `int32` and `double`.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int32 | Self::Double)
    }

    /// Returns `true` for `unit`.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}
