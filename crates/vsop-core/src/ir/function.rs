// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Functions, basic blocks, instructions and SSA values.
//!
//! Instructions live in a per-function arena and blocks hold ordered lists
//! of instruction ids. A [`Value`] is either an instruction result, a
//! function argument, or a constant; every value's type can be recovered
//! through [`super::Module::value_ty`].

use std::rc::Rc;

use ecow::{eco_format, EcoString};

use super::types::{FnSig, Ty};

/// Index of an instruction in its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrId(pub u32);

/// Index of a basic block in its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// An SSA value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The result of an instruction.
    Instr(InstrId),
    /// A function argument, by index.
    Arg(u32),
    /// `i1` constant.
    I1(bool),
    /// `i32` constant.
    I32(i32),
    /// `i64` constant.
    I64(i64),
    /// `double` constant.
    F64(f64),
    /// A typed null pointer; the type is the full pointer type.
    Null(Ty),
    /// The address of a module global.
    Global(EcoString),
    /// The address of a module function.
    Func(EcoString),
    /// An `i8*` into a module string constant.
    StrPtr(EcoString),
}

impl Value {
    /// Returns `true` for constants (everything but instruction results
    /// and arguments).
    #[must_use]
    pub const fn is_const(&self) -> bool {
        !matches!(self, Self::Instr(_) | Self::Arg(_))
    }
}

/// Integer comparison conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Cond {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
        }
    }
}

/// Ordered floating-point comparison conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FCond {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FCond {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Oeq => "oeq",
            Self::One => "one",
            Self::Olt => "olt",
            Self::Ole => "ole",
            Self::Ogt => "ogt",
            Self::Oge => "oge",
        }
    }
}

/// Two-operand arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    Xor,
}

impl BinOp {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::SDiv => "sdiv",
            Self::SRem => "srem",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FDiv => "fdiv",
            Self::FRem => "frem",
            Self::Xor => "xor",
        }
    }

    /// Returns `true` if operand order does not matter.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::FAdd | Self::FMul | Self::Xor)
    }
}

/// Numeric conversion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Signed integer to floating point.
    SiToFp,
    /// Floating point to signed integer.
    FpToSi,
}

impl CastOp {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::SiToFp => "sitofp",
            Self::FpToSi => "fptosi",
        }
    }
}

/// An instruction operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Stack slot of the given type; result is a pointer to it.
    Alloca(Ty),
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    /// Struct member address: `getelementptr ptr, 0, field`.
    Gep {
        ptr: Value,
        field: u32,
    },
    /// Pointer reinterpretation to the instruction's result type.
    Bitcast {
        value: Value,
    },
    Bin {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Icmp {
        cond: Cond,
        lhs: Value,
        rhs: Value,
    },
    Fcmp {
        cond: FCond,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
    },
    Call {
        callee: Value,
        args: Vec<Value>,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret(Option<Value>),
}

impl Op {
    /// Returns `true` for block terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Br { .. } | Self::CondBr { .. } | Self::Ret(_))
    }

    /// Returns `true` for instructions without side effects, whose removal
    /// is safe when the result is unused.
    #[must_use]
    pub const fn is_pure(&self) -> bool {
        matches!(
            self,
            Self::Gep { .. }
                | Self::Bitcast { .. }
                | Self::Bin { .. }
                | Self::Icmp { .. }
                | Self::Fcmp { .. }
                | Self::Cast { .. }
                | Self::Phi { .. }
                | Self::Load { .. }
                | Self::Alloca(_)
        )
    }

    /// The operand values, in order.
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Self::Alloca(_) => vec![],
            Self::Load { ptr } => vec![ptr],
            Self::Store { value, ptr } => vec![value, ptr],
            Self::Gep { ptr, .. } => vec![ptr],
            Self::Bitcast { value } | Self::Cast { value, .. } => vec![value],
            Self::Bin { lhs, rhs, .. }
            | Self::Icmp { lhs, rhs, .. }
            | Self::Fcmp { lhs, rhs, .. } => vec![lhs, rhs],
            Self::Call { callee, args } => {
                let mut operands = vec![callee];
                operands.extend(args.iter());
                operands
            }
            Self::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
            Self::Br { .. } => vec![],
            Self::CondBr { cond, .. } => vec![cond],
            Self::Ret(value) => value.iter().collect(),
        }
    }

    /// Applies `f` to every operand value in place.
    pub fn map_operands(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            Self::Alloca(_) | Self::Br { .. } => {}
            Self::Load { ptr } => f(ptr),
            Self::Store { value, ptr } => {
                f(value);
                f(ptr);
            }
            Self::Gep { ptr, .. } => f(ptr),
            Self::Bitcast { value } | Self::Cast { value, .. } => f(value),
            Self::Bin { lhs, rhs, .. }
            | Self::Icmp { lhs, rhs, .. }
            | Self::Fcmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Self::Call { callee, args } => {
                f(callee);
                for arg in args {
                    f(arg);
                }
            }
            Self::Phi { incoming } => {
                for (value, _) in incoming {
                    f(value);
                }
            }
            Self::CondBr { cond, .. } => f(cond),
            Self::Ret(value) => {
                if let Some(value) = value {
                    f(value);
                }
            }
        }
    }
}

/// A typed instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// Result type; `void` for instructions without a result.
    pub ty: Ty,
    pub op: Op,
}

/// A basic block: a label and an ordered run of instructions, the last of
/// which is the terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: EcoString,
    pub instrs: Vec<InstrId>,
}

/// A function: a signature plus, unless it is a declaration, a body of
/// basic blocks. The first block is the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: EcoString,
    pub sig: Rc<FnSig>,
    /// Argument names, matching `sig.params`.
    pub params: Vec<EcoString>,
    pub blocks: Vec<Block>,
    pub instrs: Vec<Instr>,
}

impl Function {
    /// Creates a bodiless function (an external declaration until blocks
    /// are added).
    #[must_use]
    pub fn declaration(name: EcoString, sig: FnSig, params: Vec<EcoString>) -> Self {
        Self {
            name,
            sig: Rc::new(sig),
            params,
            blocks: Vec::new(),
            instrs: Vec::new(),
        }
    }

    /// Returns `true` if the function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Appends a new empty block; the label is made unique with a counter.
    pub fn add_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let label = if self.blocks.is_empty() {
            EcoString::from("entry")
        } else {
            eco_format!("{label}{}", self.blocks.len())
        };
        self.blocks.push(Block {
            label,
            instrs: Vec::new(),
        });
        id
    }

    /// Appends an instruction to a block and returns its id.
    pub fn push_instr(&mut self, block: BlockId, instr: Instr) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);
        self.blocks[block.0 as usize].instrs.push(id);
        id
    }

    /// The instruction behind an id.
    #[must_use]
    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.0 as usize]
    }

    /// Mutable access to an instruction.
    #[must_use]
    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id.0 as usize]
    }

    /// The terminator of a block, if it has one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<&Instr> {
        let last = *self.blocks[block.0 as usize].instrs.last()?;
        let instr = self.instr(last);
        instr.op.is_terminator().then_some(instr)
    }

    /// The blocks a block branches to.
    #[must_use]
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        match self.terminator(block).map(|t| &t.op) {
            Some(Op::Br { dest }) => vec![*dest],
            Some(Op::CondBr {
                then_dest,
                else_dest,
                ..
            }) => vec![*then_dest, *else_dest],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_get_unique_labels() {
        let mut f = Function::declaration("f".into(), FnSig::new(Ty::Void, vec![]), vec![]);
        assert!(f.is_declaration());

        let entry = f.add_block("entry");
        let then = f.add_block("then");
        let other_then = f.add_block("then");
        assert_eq!(f.blocks[entry.0 as usize].label, "entry");
        assert_eq!(f.blocks[then.0 as usize].label, "then1");
        assert_eq!(f.blocks[other_then.0 as usize].label, "then2");
        assert!(!f.is_declaration());
    }

    #[test]
    fn successors_follow_terminators() {
        let mut f = Function::declaration("f".into(), FnSig::new(Ty::Void, vec![]), vec![]);
        let entry = f.add_block("entry");
        let a = f.add_block("a");
        let b = f.add_block("b");
        f.push_instr(
            entry,
            Instr {
                ty: Ty::Void,
                op: Op::CondBr {
                    cond: Value::I1(true),
                    then_dest: a,
                    else_dest: b,
                },
            },
        );
        f.push_instr(a, Instr { ty: Ty::Void, op: Op::Br { dest: b } });
        f.push_instr(b, Instr { ty: Ty::Void, op: Op::Ret(None) });

        assert_eq!(f.successors(entry), vec![a, b]);
        assert_eq!(f.successors(a), vec![b]);
        assert!(f.successors(b).is_empty());
    }

    #[test]
    fn operands_cover_calls_and_phis() {
        let call = Op::Call {
            callee: Value::Func("f".into()),
            args: vec![Value::I32(1), Value::I32(2)],
        };
        assert_eq!(call.operands().len(), 3);

        let mut phi = Op::Phi {
            incoming: vec![(Value::I32(1), BlockId(0)), (Value::I32(2), BlockId(1))],
        };
        phi.map_operands(|v| *v = Value::I32(9));
        assert_eq!(
            phi.operands(),
            vec![&Value::I32(9), &Value::I32(9)]
        );
    }
}
