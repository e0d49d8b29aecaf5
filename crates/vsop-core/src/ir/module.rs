// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The IR module: named struct types, globals and functions.

use std::collections::HashMap;
use std::rc::Rc;

use ecow::{eco_format, EcoString};

use super::function::{Function, Value};
use super::types::{FnSig, Ty};

/// A module-level constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: EcoString,
    pub ty: Ty,
    pub init: GlobalInit,
}

/// Global initializers.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    /// A NUL-terminated C string constant.
    CString(Vec<u8>),
    /// A vtable: a struct of function pointers, each possibly bitcast to
    /// re-type the receiver.
    Vtable(Vec<VtableSlot>),
}

/// One function pointer in a vtable.
///
/// `func_ty` is the type the function was declared with (receiver typed as
/// the defining class); `slot_ty` re-types the receiver to the concrete
/// class. When the two agree the printer emits the bare symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct VtableSlot {
    pub func: EcoString,
    pub func_ty: Ty,
    pub slot_ty: Ty,
}

/// A compilation module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: EcoString,
    structs: Vec<(EcoString, Option<Vec<Ty>>)>,
    struct_index: HashMap<EcoString, usize>,
    pub globals: Vec<Global>,
    functions: Vec<Function>,
    function_index: HashMap<EcoString, usize>,
    string_count: u32,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<EcoString>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // === Struct types ===

    /// Declares a named struct type, initially opaque. Idempotent.
    pub fn declare_struct(&mut self, name: impl Into<EcoString>) -> Ty {
        let name = name.into();
        if !self.struct_index.contains_key(&name) {
            self.struct_index.insert(name.clone(), self.structs.len());
            self.structs.push((name.clone(), None));
        }
        Ty::Struct(name)
    }

    /// Sets the body of a declared struct type.
    pub fn set_struct_body(&mut self, name: &str, body: Vec<Ty>) {
        let index = self.struct_index[name];
        self.structs[index].1 = Some(body);
    }

    /// The body of a struct type, if defined.
    #[must_use]
    pub fn struct_body(&self, name: &str) -> Option<&[Ty]> {
        let index = *self.struct_index.get(name)?;
        self.structs[index].1.as_deref()
    }

    /// All struct types in declaration order.
    pub fn structs(&self) -> impl Iterator<Item = (&EcoString, Option<&[Ty]>)> {
        self.structs.iter().map(|(name, body)| (name, body.as_deref()))
    }

    // === Functions ===

    /// Declares a function. Returns `false` when the name already exists.
    pub fn declare_function(
        &mut self,
        name: impl Into<EcoString>,
        sig: FnSig,
        params: Vec<EcoString>,
    ) -> bool {
        let name = name.into();
        if self.function_index.contains_key(&name) {
            return false;
        }
        self.function_index.insert(name.clone(), self.functions.len());
        self.functions.push(Function::declaration(name, sig, params));
        true
    }

    /// Declares a function if absent and returns a reference to it, like
    /// `getOrInsertFunction`.
    pub fn get_or_declare_function(
        &mut self,
        name: &str,
        sig: impl FnOnce() -> FnSig,
    ) -> &Function {
        if !self.function_index.contains_key(name) {
            let sig = sig();
            let params = (0..sig.params.len())
                .map(|i| eco_format!("a{i}"))
                .collect();
            self.declare_function(name, sig, params);
        }
        self.function(name).expect("just declared")
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        Some(&self.functions[*self.function_index.get(name)?])
    }

    /// Mutable access to a function.
    #[must_use]
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        Some(&mut self.functions[*self.function_index.get(name)?])
    }

    /// All functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Mutable iteration over all functions.
    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut()
    }

    /// A [`Value::Func`] for a declared function, with its signature.
    #[must_use]
    pub fn function_value(&self, name: &str) -> Option<(Value, Rc<FnSig>)> {
        let function = self.function(name)?;
        Some((Value::Func(name.into()), Rc::clone(&function.sig)))
    }

    // === Globals ===

    /// Interns a C string constant and returns an `i8*` to it.
    pub fn add_cstring(&mut self, bytes: &[u8]) -> Value {
        let name = eco_format!("str.{}", self.string_count);
        self.string_count += 1;
        self.globals.push(Global {
            name: name.clone(),
            ty: Ty::Array(bytes.len() as u32 + 1, Box::new(Ty::I8)),
            init: GlobalInit::CString(bytes.to_vec()),
        });
        Value::StrPtr(name)
    }

    /// Adds a vtable constant of the given struct type.
    pub fn add_vtable(&mut self, name: impl Into<EcoString>, ty: Ty, slots: Vec<VtableSlot>) {
        self.globals.push(Global {
            name: name.into(),
            ty,
            init: GlobalInit::Vtable(slots),
        });
    }

    /// Looks up a global by name.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    // === Typing ===

    /// The type of a value in the context of a function.
    #[must_use]
    pub fn value_ty(&self, function: &Function, value: &Value) -> Ty {
        match value {
            Value::Instr(id) => function.instr(*id).ty.clone(),
            Value::Arg(index) => function.sig.params[*index as usize].clone(),
            Value::I1(_) => Ty::I1,
            Value::I32(_) => Ty::I32,
            Value::I64(_) => Ty::I64,
            Value::F64(_) => Ty::F64,
            Value::Null(ty) => ty.clone(),
            Value::Global(name) => self
                .global(name)
                .map_or(Ty::i8_ptr(), |g| g.ty.clone().ptr()),
            Value::Func(name) => self
                .function(name)
                .map_or(Ty::i8_ptr(), |f| Ty::Fn(Rc::clone(&f.sig)).ptr()),
            Value::StrPtr(_) => Ty::i8_ptr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_declaration_is_idempotent() {
        let mut module = Module::new("test");
        module.declare_struct("struct.A");
        module.declare_struct("struct.A");
        assert_eq!(module.structs().count(), 1);
        assert_eq!(module.struct_body("struct.A"), None);

        module.set_struct_body("struct.A", vec![Ty::I32]);
        assert_eq!(module.struct_body("struct.A"), Some(&[Ty::I32][..]));
    }

    #[test]
    fn function_names_are_unique() {
        let mut module = Module::new("test");
        assert!(module.declare_function("f", FnSig::new(Ty::Void, vec![]), vec![]));
        assert!(!module.declare_function("f", FnSig::new(Ty::I32, vec![]), vec![]));
        assert_eq!(module.function("f").unwrap().sig.ret, Ty::Void);
    }

    #[test]
    fn cstrings_are_numbered() {
        let mut module = Module::new("test");
        let a = module.add_cstring(b"hello");
        let b = module.add_cstring(b"");
        assert_eq!(a, Value::StrPtr("str.0".into()));
        assert_eq!(b, Value::StrPtr("str.1".into()));
        // Array length includes the NUL terminator.
        assert_eq!(
            module.global("str.0").unwrap().ty,
            Ty::Array(6, Box::new(Ty::I8))
        );
    }

    #[test]
    fn value_types_resolve_through_the_module() {
        let mut module = Module::new("test");
        module.declare_function("f", FnSig::new(Ty::I32, vec![Ty::I1]), vec!["x".into()]);
        let f = module.function("f").unwrap().clone();

        assert_eq!(module.value_ty(&f, &Value::I32(1)), Ty::I32);
        assert_eq!(module.value_ty(&f, &Value::Arg(0)), Ty::I1);
        assert_eq!(
            module.value_ty(&f, &Value::Func("f".into())).to_string(),
            "i32 (i1)*"
        );
        let s = module.add_cstring(b"x");
        assert_eq!(module.value_ty(&f, &s), Ty::i8_ptr());
    }
}
