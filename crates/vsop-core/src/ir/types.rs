// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! IR types.

use std::rc::Rc;

use ecow::EcoString;

/// An IR type.
///
/// Named struct types carry only their name; the body lives in the
/// [`Module`](super::Module) so that forward references and recursive
/// layouts (a struct pointing at its own vtable struct) work naturally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Void,
    I1,
    I8,
    I32,
    I64,
    F64,
    /// Pointer to a pointee type.
    Ptr(Box<Ty>),
    /// A named struct such as `%struct.Main`.
    Struct(EcoString),
    /// A fixed-size array, used for string constants.
    Array(u32, Box<Ty>),
    /// A function type; only ever used behind [`Ty::Ptr`].
    Fn(Rc<FnSig>),
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnSig {
    pub ret: Ty,
    pub params: Vec<Ty>,
    /// Accepts extra arguments past `params`.
    pub variadic: bool,
}

impl FnSig {
    /// Creates a non-variadic signature.
    #[must_use]
    pub fn new(ret: Ty, params: Vec<Ty>) -> Self {
        Self {
            ret,
            params,
            variadic: false,
        }
    }

    /// Creates a variadic signature.
    #[must_use]
    pub fn variadic(ret: Ty, params: Vec<Ty>) -> Self {
        Self {
            ret,
            params,
            variadic: true,
        }
    }
}

impl Ty {
    /// Wraps the type in a pointer.
    #[must_use]
    pub fn ptr(self) -> Self {
        Self::Ptr(Box::new(self))
    }

    /// `i8*`, the C string type.
    #[must_use]
    pub fn i8_ptr() -> Self {
        Self::I8.ptr()
    }

    /// The pointee of a pointer type.
    #[must_use]
    pub fn pointee(&self) -> Option<&Ty> {
        match self {
            Self::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns `true` for `void`.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns `true` for pointer types.
    #[must_use]
    pub const fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    /// The function signature behind a function-pointer type.
    #[must_use]
    pub fn fn_sig(&self) -> Option<&Rc<FnSig>> {
        match self {
            Self::Ptr(inner) => match inner.as_ref() {
                Self::Fn(sig) => Some(sig),
                _ => None,
            },
            Self::Fn(sig) => Some(sig),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::I1 => f.write_str("i1"),
            Self::I8 => f.write_str("i8"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::F64 => f.write_str("double"),
            Self::Ptr(inner) => write!(f, "{inner}*"),
            Self::Struct(name) => write!(f, "%{name}"),
            Self::Array(len, elem) => write!(f, "[{len} x {elem}]"),
            Self::Fn(sig) => {
                write!(f, "{} (", sig.ret)?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                if sig.variadic {
                    if !sig.params.is_empty() {
                        f.write_str(", ")?;
                    }
                    f.write_str("...")?;
                }
                f.write_str(")")
            }
        }
    }
}
