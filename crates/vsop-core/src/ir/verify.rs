// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Function well-formedness checks.
//!
//! The verifier runs before the clean-up passes. A failure here means the
//! emitter produced malformed IR — a compiler bug, reported as an internal
//! diagnostic rather than a panic.

use super::function::{Function, Op, Value};
use super::module::Module;
use super::types::Ty;

/// Checks structural and type well-formedness of one function.
pub fn verify_function(module: &Module, function: &Function) -> Result<(), String> {
    if function.is_declaration() {
        return Ok(());
    }

    let fail = |block: &str, message: String| {
        Err(format!(
            "function {}, block {block}: {message}",
            function.name
        ))
    };

    for block in &function.blocks {
        let label = block.label.as_str();
        if block.instrs.is_empty() {
            return fail(label, "empty block".to_string());
        }

        let last = *block.instrs.last().expect("non-empty");
        if !function.instr(last).op.is_terminator() {
            return fail(label, "missing terminator".to_string());
        }

        let mut past_phis = false;
        for (position, &id) in block.instrs.iter().enumerate() {
            let instr = function.instr(id);
            let is_last = position + 1 == block.instrs.len();

            if instr.op.is_terminator() && !is_last {
                return fail(label, "terminator before end of block".to_string());
            }
            match &instr.op {
                Op::Phi { .. } if past_phis => {
                    return fail(label, "phi after non-phi instruction".to_string());
                }
                Op::Phi { .. } => {}
                _ => past_phis = true,
            }

            if let Err(message) = check_instr(module, function, instr) {
                return fail(label, message);
            }
        }
    }
    Ok(())
}

fn check_instr(
    module: &Module,
    function: &Function,
    instr: &super::function::Instr,
) -> Result<(), String> {
    let ty_of = |v: &Value| module.value_ty(function, v);
    let in_range = |b: &super::function::BlockId| (b.0 as usize) < function.blocks.len();

    match &instr.op {
        Op::Load { ptr } => {
            let ptr_ty = ty_of(ptr);
            if ptr_ty.pointee() != Some(&instr.ty) {
                return Err(format!("load of {} from {ptr_ty}", instr.ty));
            }
        }
        Op::Store { value, ptr } => {
            let value_ty = ty_of(value);
            let ptr_ty = ty_of(ptr);
            if ptr_ty.pointee() != Some(&value_ty) {
                return Err(format!("store of {value_ty} into {ptr_ty}"));
            }
        }
        Op::Bin { lhs, rhs, .. } => {
            let (l, r) = (ty_of(lhs), ty_of(rhs));
            if l != r {
                return Err(format!("binary operands disagree: {l} vs {r}"));
            }
        }
        Op::Icmp { lhs, rhs, .. } => {
            let (l, r) = (ty_of(lhs), ty_of(rhs));
            if l != r {
                return Err(format!("icmp operands disagree: {l} vs {r}"));
            }
        }
        Op::Fcmp { lhs, rhs, .. } => {
            if ty_of(lhs) != Ty::F64 || ty_of(rhs) != Ty::F64 {
                return Err("fcmp on non-double operands".to_string());
            }
        }
        Op::Call { callee, args } => {
            let callee_ty = ty_of(callee);
            let Some(sig) = callee_ty.fn_sig() else {
                return Err(format!("call of non-function value of type {callee_ty}"));
            };
            let fixed = sig.params.len();
            if args.len() < fixed || (!sig.variadic && args.len() != fixed) {
                return Err(format!(
                    "call with {} arguments to function of {} parameters",
                    args.len(),
                    fixed
                ));
            }
            for (arg, param) in args.iter().zip(&sig.params) {
                let arg_ty = ty_of(arg);
                if arg_ty != *param {
                    return Err(format!("argument of type {arg_ty}, expected {param}"));
                }
            }
            if sig.ret != instr.ty {
                return Err(format!(
                    "call result typed {}, signature returns {}",
                    instr.ty, sig.ret
                ));
            }
        }
        Op::Phi { incoming } => {
            if incoming.is_empty() {
                return Err("phi with no incoming values".to_string());
            }
            for (value, block) in incoming {
                if !in_range(block) {
                    return Err("phi references unknown block".to_string());
                }
                let value_ty = ty_of(value);
                if value_ty != instr.ty {
                    return Err(format!(
                        "phi incoming of type {value_ty}, expected {}",
                        instr.ty
                    ));
                }
            }
        }
        Op::Br { dest } => {
            if !in_range(dest) {
                return Err("branch to unknown block".to_string());
            }
        }
        Op::CondBr {
            cond,
            then_dest,
            else_dest,
        } => {
            if ty_of(cond) != Ty::I1 {
                return Err("conditional branch on non-i1 value".to_string());
            }
            if !in_range(then_dest) || !in_range(else_dest) {
                return Err("branch to unknown block".to_string());
            }
        }
        Op::Ret(value) => {
            let returned = value.as_ref().map_or(Ty::Void, &ty_of);
            if returned != function.sig.ret {
                return Err(format!(
                    "return of {returned} from function returning {}",
                    function.sig.ret
                ));
            }
        }
        Op::Alloca(_) | Op::Gep { .. } | Op::Bitcast { .. } | Op::Cast { .. } => {}
    }
    Ok(())
}
