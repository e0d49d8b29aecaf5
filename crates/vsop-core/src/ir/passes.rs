// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Elementary IR clean-up passes.
//!
//! After lowering, [`run_cleanup`] verifies every function and then runs a
//! fixed pipeline over the valid ones: instruction combining (peephole and
//! constant folding), reassociation (canonical operand order), local value
//! numbering, and CFG simplification. Verification failures are returned
//! for the caller to report as internal errors; the offending function is
//! left untouched.

use std::collections::{HashMap, HashSet};

use ecow::EcoString;

use super::function::{BinOp, BlockId, Cond, FCond, Function, Instr, InstrId, Op, Value};
use super::module::Module;
use super::types::Ty;
use super::verify::verify_function;

/// Verifies and cleans up every function of the module.
///
/// Returns the verification failures, in function order.
pub fn run_cleanup(module: &mut Module) -> Vec<String> {
    let names: Vec<EcoString> = module.functions().map(|f| f.name.clone()).collect();
    let mut errors = Vec::new();

    for name in names {
        let function = module.function(&name).expect("listed function");
        if function.is_declaration() {
            continue;
        }
        if let Err(error) = verify_function(module, function) {
            errors.push(error);
            continue;
        }

        let mut function = function.clone();
        instcombine(&mut function);
        reassociate(&mut function);
        instcombine(&mut function);
        value_numbering(&mut function);
        simplify_cfg(&mut function);
        *module.function_mut(&name).expect("listed function") = function;
    }
    errors
}

/// Rewrites every use of the mapped instructions, chasing chains.
fn replace_uses(function: &mut Function, map: &HashMap<InstrId, Value>) {
    if map.is_empty() {
        return;
    }
    for instr in &mut function.instrs {
        instr.op.map_operands(|value| {
            while let Value::Instr(id) = value {
                match map.get(id) {
                    Some(replacement) => *value = replacement.clone(),
                    None => break,
                }
            }
        });
    }
}

/// Drops the mapped instructions from their blocks.
fn drop_replaced(function: &mut Function, map: &HashMap<InstrId, Value>) {
    for block in &mut function.blocks {
        block.instrs.retain(|id| !map.contains_key(id));
    }
}

// === Instruction combining ===

/// Peephole simplification and constant folding, to fixpoint, followed by
/// dead-code elimination.
pub fn instcombine(function: &mut Function) {
    loop {
        let mut map: HashMap<InstrId, Value> = HashMap::new();
        for block in &function.blocks {
            for &id in &block.instrs {
                let instr = function.instr(id);
                if let Some(value) = simplify(instr) {
                    map.insert(id, value);
                }
            }
        }
        if map.is_empty() {
            break;
        }
        replace_uses(function, &map);
        drop_replaced(function, &map);
    }
    eliminate_dead_code(function);
}

fn simplify(instr: &Instr) -> Option<Value> {
    match &instr.op {
        Op::Bin { op, lhs, rhs } => simplify_bin(*op, lhs, rhs),
        Op::Icmp { cond, lhs, rhs } => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Some(Value::I1(match cond {
                Cond::Eq => a == b,
                Cond::Ne => a != b,
                Cond::Slt => a < b,
                Cond::Sle => a <= b,
                Cond::Sgt => a > b,
                Cond::Sge => a >= b,
            })),
            (Value::I1(a), Value::I1(b)) if *cond == Cond::Eq => Some(Value::I1(a == b)),
            (Value::Null(_), Value::Null(_)) if *cond == Cond::Eq => Some(Value::I1(true)),
            _ => None,
        },
        Op::Fcmp { cond, lhs, rhs } => match (lhs, rhs) {
            (Value::F64(a), Value::F64(b)) => Some(Value::I1(match cond {
                FCond::Oeq => a == b,
                FCond::One => a != b,
                FCond::Olt => a < b,
                FCond::Ole => a <= b,
                FCond::Ogt => a > b,
                FCond::Oge => a >= b,
            })),
            _ => None,
        },
        Op::Cast { op, value } => match (op, value) {
            (super::function::CastOp::SiToFp, Value::I32(n)) => Some(Value::F64(f64::from(*n))),
            (super::function::CastOp::FpToSi, Value::F64(x)) => Some(Value::I32(*x as i32)),
            _ => None,
        },
        Op::Bitcast { value } if value.is_const() => match value {
            Value::Null(_) => Some(Value::Null(instr.ty.clone())),
            _ => None,
        },
        Op::Phi { incoming } => {
            if let [(only, _)] = incoming.as_slice() {
                return Some(only.clone());
            }
            let first = &incoming.first()?.0;
            let all_same = incoming.iter().all(|(v, _)| v == first);
            (all_same && first.is_const()).then(|| first.clone())
        }
        _ => None,
    }
}

fn simplify_bin(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    use BinOp::*;

    // Constant folding.
    if let (Value::I32(a), Value::I32(b)) = (lhs, rhs) {
        let folded = match op {
            Add => Some(a.wrapping_add(*b)),
            Sub => Some(a.wrapping_sub(*b)),
            Mul => Some(a.wrapping_mul(*b)),
            SDiv if *b != 0 => Some(a.wrapping_div(*b)),
            SRem if *b != 0 => Some(a.wrapping_rem(*b)),
            _ => None,
        };
        if let Some(n) = folded {
            return Some(Value::I32(n));
        }
    }
    if let (Value::F64(a), Value::F64(b)) = (lhs, rhs) {
        let folded = match op {
            FAdd => Some(a + b),
            FSub => Some(a - b),
            FMul => Some(a * b),
            FDiv => Some(a / b),
            _ => None,
        };
        if let Some(x) = folded {
            return Some(Value::F64(x));
        }
    }
    if let (Value::I1(a), Value::I1(b)) = (lhs, rhs) {
        if op == Xor {
            return Some(Value::I1(a ^ b));
        }
    }

    // Identities.
    match (op, lhs, rhs) {
        (Add, v, Value::I32(0)) | (Add, Value::I32(0), v) => Some(v.clone()),
        (Sub, v, Value::I32(0)) => Some(v.clone()),
        (Mul, v, Value::I32(1)) | (Mul, Value::I32(1), v) => Some(v.clone()),
        (Mul, _, Value::I32(0)) | (Mul, Value::I32(0), _) => Some(Value::I32(0)),
        (SDiv, v, Value::I32(1)) => Some(v.clone()),
        (Xor, v, Value::I1(false)) | (Xor, Value::I1(false), v) => Some(v.clone()),
        (FAdd, v, Value::F64(x)) | (FAdd, Value::F64(x), v) if *x == 0.0 => Some(v.clone()),
        (FMul, v, Value::F64(x)) | (FMul, Value::F64(x), v) if *x == 1.0 => Some(v.clone()),
        _ => None,
    }
}

/// Removes unused pure instructions.
fn eliminate_dead_code(function: &mut Function) {
    loop {
        let mut used: HashSet<InstrId> = HashSet::new();
        for block in &function.blocks {
            for &id in &block.instrs {
                for operand in function.instr(id).op.operands() {
                    if let Value::Instr(op_id) = operand {
                        used.insert(*op_id);
                    }
                }
            }
        }

        let mut removed = false;
        for block in &mut function.blocks {
            block.instrs.retain(|&id| {
                let instr = &function.instrs[id.0 as usize];
                let dead = instr.op.is_pure() && !used.contains(&id);
                removed |= dead;
                !dead
            });
        }
        if !removed {
            break;
        }
    }
}

// === Reassociation ===

/// Canonicalizes commutative operations so that constants sit on the
/// right, exposing identities and value-numbering matches.
pub fn reassociate(function: &mut Function) {
    for instr in &mut function.instrs {
        if let Op::Bin { op, lhs, rhs } = &mut instr.op {
            if op.is_commutative() && lhs.is_const() && !rhs.is_const() {
                std::mem::swap(lhs, rhs);
            }
        }
    }
}

// === Value numbering ===

/// Local common-subexpression elimination: within each block, identical
/// pure computations collapse to the first occurrence.
pub fn value_numbering(function: &mut Function) {
    let mut map: HashMap<InstrId, Value> = HashMap::new();

    for block in &function.blocks {
        let mut seen: Vec<InstrId> = Vec::new();
        for &id in &block.instrs {
            let instr = function.instr(id);
            let eligible = matches!(
                instr.op,
                Op::Bin { .. }
                    | Op::Icmp { .. }
                    | Op::Fcmp { .. }
                    | Op::Cast { .. }
                    | Op::Bitcast { .. }
                    | Op::Gep { .. }
            );
            if !eligible {
                continue;
            }
            if let Some(&prev) = seen
                .iter()
                .find(|&&prev| function.instr(prev) == instr)
            {
                map.insert(id, Value::Instr(prev));
            } else {
                seen.push(id);
            }
        }
    }

    replace_uses(function, &map);
    drop_replaced(function, &map);
}

// === CFG simplification ===

/// Folds constant conditional branches and removes unreachable blocks.
pub fn simplify_cfg(function: &mut Function) {
    // Constant conditions become plain branches.
    for instr in &mut function.instrs {
        if let Op::CondBr {
            cond: Value::I1(c),
            then_dest,
            else_dest,
        } = instr.op
        {
            instr.op = Op::Br {
                dest: if c { then_dest } else { else_dest },
            };
        }
    }

    // Reachability from the entry block.
    let mut reachable: HashSet<BlockId> = HashSet::new();
    let mut work = vec![BlockId(0)];
    while let Some(block) = work.pop() {
        if !reachable.insert(block) {
            continue;
        }
        work.extend(function.successors(block));
    }
    if reachable.len() == function.blocks.len() {
        return;
    }

    // Compact the block list and remap branch targets and phi inputs.
    let mut remap: HashMap<BlockId, BlockId> = HashMap::new();
    let mut kept = Vec::new();
    for (index, block) in function.blocks.drain(..).enumerate() {
        let old = BlockId(index as u32);
        if reachable.contains(&old) {
            remap.insert(old, BlockId(kept.len() as u32));
            kept.push(block);
        }
    }
    function.blocks = kept;

    // Only the surviving blocks' instructions need their targets fixed;
    // orphaned instructions of removed blocks stay stale in the arena.
    let live: Vec<InstrId> = function
        .blocks
        .iter()
        .flat_map(|block| block.instrs.iter().copied())
        .collect();
    for id in live {
        match &mut function.instrs[id.0 as usize].op {
            Op::Br { dest } => *dest = remap[dest],
            Op::CondBr {
                then_dest,
                else_dest,
                ..
            } => {
                *then_dest = remap[then_dest];
                *else_dest = remap[else_dest];
            }
            Op::Phi { incoming } => {
                incoming.retain(|(_, block)| remap.contains_key(block));
                for (_, block) in incoming {
                    *block = remap[block];
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, FnSig};

    fn body_text(module: &Module, name: &str) -> String {
        let text = module.to_ir_text();
        let start = text.find(&format!("@{name}")).unwrap();
        text[start..].to_string()
    }

    #[test]
    fn instcombine_folds_constants_and_identities() {
        let mut module = Module::new("m");
        module.declare_function("f", FnSig::new(Ty::I32, vec![Ty::I32]), vec!["x".into()]);
        let mut b = Builder::new(&mut module);
        b.start_function("f");
        // (x + 0) * (2 + 3) → x * 5
        let zero_sum = b.bin(BinOp::Add, Value::Arg(0), Value::I32(0));
        let const_sum = b.bin(BinOp::Add, Value::I32(2), Value::I32(3));
        let product = b.bin(BinOp::Mul, zero_sum, const_sum);
        b.ret(Some(product));

        let mut f = module.function("f").unwrap().clone();
        instcombine(&mut f);
        *module.function_mut("f").unwrap() = f;

        let text = body_text(&module, "f");
        assert!(text.contains("mul i32 %x, 5"), "{text}");
        assert!(!text.contains("add"), "{text}");
    }

    #[test]
    fn dead_pure_instructions_are_removed() {
        let mut module = Module::new("m");
        module.declare_function("f", FnSig::new(Ty::I32, vec![Ty::I32]), vec!["x".into()]);
        let mut b = Builder::new(&mut module);
        b.start_function("f");
        b.bin(BinOp::Mul, Value::Arg(0), Value::Arg(0)); // unused
        b.ret(Some(Value::Arg(0)));

        let mut f = module.function("f").unwrap().clone();
        instcombine(&mut f);

        assert_eq!(f.blocks[0].instrs.len(), 1); // just the ret
    }

    #[test]
    fn value_numbering_reuses_identical_computations() {
        let mut module = Module::new("m");
        module.declare_function("f", FnSig::new(Ty::I32, vec![Ty::I32]), vec!["x".into()]);
        let mut b = Builder::new(&mut module);
        b.start_function("f");
        let a = b.bin(BinOp::Mul, Value::Arg(0), Value::Arg(0));
        let c = b.bin(BinOp::Mul, Value::Arg(0), Value::Arg(0));
        let sum = b.bin(BinOp::Add, a, c);
        b.ret(Some(sum));

        let mut f = module.function("f").unwrap().clone();
        value_numbering(&mut f);
        instcombine(&mut f);

        // One multiply, one add, one ret.
        assert_eq!(f.blocks[0].instrs.len(), 3);
        let text = {
            *module.function_mut("f").unwrap() = f;
            body_text(&module, "f")
        };
        assert!(text.contains("add i32 %t0, %t0"), "{text}");
    }

    #[test]
    fn simplify_cfg_removes_unreachable_blocks() {
        let mut module = Module::new("m");
        module.declare_function("f", FnSig::new(Ty::I32, vec![]), vec![]);
        let mut b = Builder::new(&mut module);
        b.start_function("f");
        let live = b.add_block("live");
        let dead = b.add_block("dead");
        b.cond_br(Value::I1(true), live, dead);
        b.select_block(live);
        b.ret(Some(Value::I32(1)));
        b.select_block(dead);
        b.ret(Some(Value::I32(2)));

        let mut f = module.function("f").unwrap().clone();
        simplify_cfg(&mut f);

        assert_eq!(f.blocks.len(), 2);
        *module.function_mut("f").unwrap() = f;
        let text = body_text(&module, "f");
        assert!(!text.contains("ret i32 2"), "{text}");
        assert!(text.contains("br label %live1"), "{text}");
    }

    #[test]
    fn phi_incomings_from_removed_blocks_are_pruned() {
        let mut module = Module::new("m");
        module.declare_function("f", FnSig::new(Ty::I32, vec![]), vec![]);
        let mut b = Builder::new(&mut module);
        let entry = b.start_function("f");
        let dead = b.add_block("dead");
        let end = b.add_block("end");
        b.br(end);
        b.select_block(dead);
        b.br(end);
        b.select_block(end);
        let merged = b.phi(Ty::I32, vec![(Value::I32(1), entry), (Value::I32(2), dead)]);
        b.ret(Some(merged));

        let mut f = module.function("f").unwrap().clone();
        simplify_cfg(&mut f);
        instcombine(&mut f);

        // The phi collapsed to its single live incoming.
        *module.function_mut("f").unwrap() = f;
        let text = body_text(&module, "f");
        assert!(text.contains("ret i32 1"), "{text}");
        assert!(!text.contains("phi"), "{text}");
    }

    #[test]
    fn run_cleanup_reports_verifier_failures() {
        let mut module = Module::new("m");
        module.declare_function("bad", FnSig::new(Ty::I32, vec![]), vec![]);
        let mut b = Builder::new(&mut module);
        b.start_function("bad");
        b.ret(None); // wrong: function returns i32

        let errors = run_cleanup(&mut module);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("function bad"), "{}", errors[0]);
    }
}
