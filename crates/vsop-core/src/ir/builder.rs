// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Instruction builder.
//!
//! A [`Builder`] owns the module for the duration of code generation and
//! keeps an insertion cursor (current function and block). Helpers append
//! one instruction each and return the result [`Value`], deriving result
//! types from their operands so callers never spell them twice.

use ecow::EcoString;

use super::function::{BinOp, BlockId, CastOp, Cond, FCond, Instr, Op, Value};
use super::module::Module;
use super::types::Ty;

/// An insertion cursor over a [`Module`].
#[derive(Debug)]
pub struct Builder<'m> {
    module: &'m mut Module,
    function: Option<EcoString>,
    block: BlockId,
}

impl<'m> Builder<'m> {
    /// Creates a builder with no insertion point yet.
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            function: None,
            block: BlockId(0),
        }
    }

    /// Read access to the underlying module.
    #[must_use]
    pub fn module(&self) -> &Module {
        self.module
    }

    /// Mutable access to the underlying module.
    pub fn module_mut(&mut self) -> &mut Module {
        self.module
    }

    fn function_name(&self) -> &EcoString {
        // INVARIANT: every emission helper runs after start_function.
        self.function.as_ref().expect("builder has no current function")
    }

    fn current(&mut self) -> &mut super::function::Function {
        let name = self.function_name().clone();
        self.module
            .function_mut(&name)
            .expect("current function exists")
    }

    /// Positions at a declared, still body-less function and opens its
    /// entry block.
    pub fn start_function(&mut self, name: &str) -> BlockId {
        self.function = Some(name.into());
        let entry = self.current().add_block("entry");
        self.block = entry;
        entry
    }

    /// Appends a new block to the current function without moving the
    /// cursor.
    pub fn add_block(&mut self, label: &str) -> BlockId {
        self.current().add_block(label)
    }

    /// Moves the cursor to a block.
    pub fn select_block(&mut self, block: BlockId) {
        self.block = block;
    }

    /// The block the cursor sits in.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.block
    }

    /// Returns `true` if the current block already ends in a terminator.
    #[must_use]
    pub fn block_terminated(&self) -> bool {
        let name = self.function_name();
        let function = self.module.function(name).expect("current function exists");
        function.terminator(self.block).is_some()
    }

    /// The type of a value in the current function.
    #[must_use]
    pub fn value_ty(&self, value: &Value) -> Ty {
        let name = self.function_name();
        let function = self.module.function(name).expect("current function exists");
        self.module.value_ty(function, value)
    }

    fn push(&mut self, ty: Ty, op: Op) -> Value {
        let block = self.block;
        let id = self.current().push_instr(block, Instr { ty, op });
        Value::Instr(id)
    }

    // === Memory ===

    /// Stack slot; returns a pointer to it.
    pub fn alloca(&mut self, ty: Ty) -> Value {
        self.push(ty.clone().ptr(), Op::Alloca(ty))
    }

    pub fn load(&mut self, ptr: Value) -> Value {
        let ty = self
            .value_ty(&ptr)
            .pointee()
            .cloned()
            .expect("load from non-pointer");
        self.push(ty, Op::Load { ptr })
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.push(Ty::Void, Op::Store { value, ptr });
    }

    /// Address of struct member `field` of the struct `ptr` points at.
    pub fn struct_gep(&mut self, ptr: Value, field: u32) -> Value {
        let struct_name = match self.value_ty(&ptr).pointee() {
            Some(Ty::Struct(name)) => name.clone(),
            other => panic!("struct_gep on non-struct pointer: {other:?}"),
        };
        let body = self
            .module
            .struct_body(&struct_name)
            .expect("gep into opaque struct");
        let field_ty = body[field as usize].clone();
        self.push(field_ty.ptr(), Op::Gep { ptr, field })
    }

    pub fn bitcast(&mut self, value: Value, ty: Ty) -> Value {
        if self.value_ty(&value) == ty {
            return value;
        }
        self.push(ty, Op::Bitcast { value })
    }

    // === Arithmetic ===

    pub fn bin(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.value_ty(&lhs);
        self.push(ty, Op::Bin { op, lhs, rhs })
    }

    pub fn icmp(&mut self, cond: Cond, lhs: Value, rhs: Value) -> Value {
        self.push(Ty::I1, Op::Icmp { cond, lhs, rhs })
    }

    pub fn fcmp(&mut self, cond: FCond, lhs: Value, rhs: Value) -> Value {
        self.push(Ty::I1, Op::Fcmp { cond, lhs, rhs })
    }

    /// Boolean negation: `xor i1 v, true`.
    pub fn not(&mut self, value: Value) -> Value {
        self.bin(BinOp::Xor, value, Value::I1(true))
    }

    /// Integer negation: `sub i32 0, v`.
    pub fn neg(&mut self, value: Value) -> Value {
        self.bin(BinOp::Sub, Value::I32(0), value)
    }

    /// Null test for a pointer value.
    pub fn is_null(&mut self, value: Value) -> Value {
        let ty = self.value_ty(&value);
        self.icmp(Cond::Eq, value, Value::Null(ty))
    }

    pub fn cast(&mut self, op: CastOp, value: Value) -> Value {
        let ty = match op {
            CastOp::SiToFp => Ty::F64,
            CastOp::FpToSi => Ty::I32,
        };
        self.push(ty, Op::Cast { op, value })
    }

    // === Calls ===

    /// Calls a function value; the result type comes from its signature.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Value {
        let ret = self
            .value_ty(&callee)
            .fn_sig()
            .map(|sig| sig.ret.clone())
            .expect("call of non-function value");
        self.push(ret, Op::Call { callee, args })
    }

    /// A [`Value::Func`] for a module function.
    #[must_use]
    pub fn func(&self, name: &str) -> Value {
        Value::Func(name.into())
    }

    // === Control flow ===

    pub fn br(&mut self, dest: BlockId) {
        self.push(Ty::Void, Op::Br { dest });
    }

    pub fn cond_br(&mut self, cond: Value, then_dest: BlockId, else_dest: BlockId) {
        self.push(
            Ty::Void,
            Op::CondBr {
                cond,
                then_dest,
                else_dest,
            },
        );
    }

    pub fn phi(&mut self, ty: Ty, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push(ty, Op::Phi { incoming })
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(Ty::Void, Op::Ret(value));
    }

    // === Constants ===

    /// Interns a C string constant and returns an `i8*` to it.
    pub fn cstring(&mut self, bytes: &[u8]) -> Value {
        self.module.add_cstring(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::FnSig;

    #[test]
    fn builds_a_small_function() {
        let mut module = Module::new("test");
        module.declare_function(
            "add1",
            FnSig::new(Ty::I32, vec![Ty::I32]),
            vec!["x".into()],
        );

        let mut builder = Builder::new(&mut module);
        builder.start_function("add1");
        let sum = builder.bin(BinOp::Add, Value::Arg(0), Value::I32(1));
        builder.ret(Some(sum));

        let f = module.function("add1").unwrap();
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.instrs.len(), 2);
        assert_eq!(f.instr(crate::ir::InstrId(0)).ty, Ty::I32);
    }

    #[test]
    fn load_derives_type_from_pointer() {
        let mut module = Module::new("test");
        module.declare_function("f", FnSig::new(Ty::Void, vec![]), vec![]);
        let mut builder = Builder::new(&mut module);
        builder.start_function("f");

        let slot = builder.alloca(Ty::I32);
        assert_eq!(builder.value_ty(&slot), Ty::I32.ptr());
        let loaded = builder.load(slot.clone());
        assert_eq!(builder.value_ty(&loaded), Ty::I32);
        builder.store(Value::I32(3), slot);
        builder.ret(None);
    }

    #[test]
    fn struct_gep_resolves_field_types() {
        let mut module = Module::new("test");
        module.declare_struct("struct.A");
        module.set_struct_body("struct.A", vec![Ty::i8_ptr(), Ty::I32]);
        module.declare_function(
            "f",
            FnSig::new(Ty::I32, vec![Ty::Struct("struct.A".into()).ptr()]),
            vec!["a".into()],
        );

        let mut builder = Builder::new(&mut module);
        builder.start_function("f");
        let field = builder.struct_gep(Value::Arg(0), 1);
        assert_eq!(builder.value_ty(&field), Ty::I32.ptr());
        let value = builder.load(field);
        builder.ret(Some(value));
    }

    #[test]
    fn bitcast_to_same_type_is_a_noop() {
        let mut module = Module::new("test");
        module.declare_function("f", FnSig::new(Ty::Void, vec![Ty::i8_ptr()]), vec!["p".into()]);
        let mut builder = Builder::new(&mut module);
        builder.start_function("f");

        let same = builder.bitcast(Value::Arg(0), Ty::i8_ptr());
        assert_eq!(same, Value::Arg(0));
        let cast = builder.bitcast(Value::Arg(0), Ty::I32.ptr());
        assert!(matches!(cast, Value::Instr(_)));
        builder.ret(None);
    }
}
