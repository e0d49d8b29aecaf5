// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Textual IR output in LLVM assembly syntax.

use std::collections::HashMap;
use std::fmt::Write;

use super::function::{Function, InstrId, Op, Value};
use super::module::{GlobalInit, Module};
use super::types::Ty;

impl Module {
    /// Renders the whole module as LLVM-style assembly text.
    #[must_use]
    pub fn to_ir_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", self.name);

        for (name, body) in self.structs() {
            match body {
                None => {
                    let _ = writeln!(out, "%{name} = type opaque");
                }
                Some(body) => {
                    let fields: Vec<String> = body.iter().map(Ty::to_string).collect();
                    if fields.is_empty() {
                        let _ = writeln!(out, "%{name} = type {{}}");
                    } else {
                        let _ = writeln!(out, "%{name} = type {{ {} }}", fields.join(", "));
                    }
                }
            }
        }
        if self.structs().next().is_some() {
            out.push('\n');
        }

        for global in &self.globals {
            match &global.init {
                GlobalInit::CString(bytes) => {
                    let _ = writeln!(
                        out,
                        "@{} = private unnamed_addr constant {} c\"{}\\00\"",
                        global.name,
                        global.ty,
                        escape_cstring(bytes)
                    );
                }
                GlobalInit::Vtable(slots) => {
                    let rendered: Vec<String> = slots
                        .iter()
                        .map(|slot| {
                            if slot.func_ty == slot.slot_ty {
                                format!("{} @{}", slot.slot_ty, slot.func)
                            } else {
                                format!(
                                    "{} bitcast ({} @{} to {})",
                                    slot.slot_ty, slot.func_ty, slot.func, slot.slot_ty
                                )
                            }
                        })
                        .collect();
                    let _ = writeln!(
                        out,
                        "@{} = internal constant {} {{ {} }}",
                        global.name,
                        global.ty,
                        rendered.join(", ")
                    );
                }
            }
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }

        for function in self.functions() {
            self.print_function(&mut out, function);
        }
        out
    }

    fn print_function(&self, out: &mut String, function: &Function) {
        let params: Vec<String> = function
            .sig
            .params
            .iter()
            .zip(&function.params)
            .map(|(ty, name)| format!("{ty} %{name}"))
            .collect();
        let mut params = params.join(", ");
        if function.sig.variadic {
            if !params.is_empty() {
                params.push_str(", ");
            }
            params.push_str("...");
        }

        if function.is_declaration() {
            let _ = writeln!(out, "declare {} @{}({})", function.sig.ret, function.name, params);
            return;
        }

        let names = ValueNames::for_function(function);
        let _ = writeln!(out, "\ndefine {} @{}({}) {{", function.sig.ret, function.name, params);
        for block in &function.blocks {
            let _ = writeln!(out, "{}:", block.label);
            for &id in &block.instrs {
                let _ = writeln!(out, "  {}", self.render_instr(function, &names, id));
            }
        }
        let _ = writeln!(out, "}}");
    }

    fn render_instr(&self, f: &Function, names: &ValueNames, id: InstrId) -> String {
        let instr = f.instr(id);
        let result = names.instr(id);
        let val = |v: &Value| self.render_value(f, names, v);
        let typed = |v: &Value| format!("{} {}", self.value_ty(f, v), self.render_value(f, names, v));

        match &instr.op {
            Op::Alloca(ty) => format!("{result} = alloca {ty}"),
            Op::Load { ptr } => {
                format!("{result} = load {}, {}", instr.ty, typed(ptr))
            }
            Op::Store { value, ptr } => format!("store {}, {}", typed(value), typed(ptr)),
            Op::Gep { ptr, field } => {
                let struct_ty = self
                    .value_ty(f, ptr)
                    .pointee()
                    .cloned()
                    .unwrap_or(Ty::I8);
                format!(
                    "{result} = getelementptr inbounds {struct_ty}, {}, i32 0, i32 {field}",
                    typed(ptr)
                )
            }
            Op::Bitcast { value } => {
                format!("{result} = bitcast {} to {}", typed(value), instr.ty)
            }
            Op::Bin { op, lhs, rhs } => {
                format!(
                    "{result} = {} {}, {}",
                    op.as_str(),
                    typed(lhs),
                    val(rhs)
                )
            }
            Op::Icmp { cond, lhs, rhs } => {
                format!(
                    "{result} = icmp {} {}, {}",
                    cond.as_str(),
                    typed(lhs),
                    val(rhs)
                )
            }
            Op::Fcmp { cond, lhs, rhs } => {
                format!(
                    "{result} = fcmp {} {}, {}",
                    cond.as_str(),
                    typed(lhs),
                    val(rhs)
                )
            }
            Op::Cast { op, value } => {
                format!("{result} = {} {} to {}", op.as_str(), typed(value), instr.ty)
            }
            Op::Call { callee, args } => {
                let rendered: Vec<String> = args.iter().map(typed).collect();
                let callee_ty = self.value_ty(f, callee);
                let sig = callee_ty.fn_sig();
                // Variadic calls spell out the full function type.
                let ret = sig.map_or_else(
                    || instr.ty.to_string(),
                    |sig| {
                        if sig.variadic {
                            Ty::Fn(std::rc::Rc::clone(sig)).to_string()
                        } else {
                            sig.ret.to_string()
                        }
                    },
                );
                let call = format!("call {ret} {}({})", val(callee), rendered.join(", "));
                if instr.ty.is_void() {
                    call
                } else {
                    format!("{result} = {call}")
                }
            }
            Op::Phi { incoming } => {
                let rendered: Vec<String> = incoming
                    .iter()
                    .map(|(value, block)| {
                        format!(
                            "[ {}, %{} ]",
                            val(value),
                            f.blocks[block.0 as usize].label
                        )
                    })
                    .collect();
                format!("{result} = phi {} {}", instr.ty, rendered.join(", "))
            }
            Op::Br { dest } => format!("br label %{}", f.blocks[dest.0 as usize].label),
            Op::CondBr {
                cond,
                then_dest,
                else_dest,
            } => format!(
                "br {}, label %{}, label %{}",
                typed(cond),
                f.blocks[then_dest.0 as usize].label,
                f.blocks[else_dest.0 as usize].label
            ),
            Op::Ret(None) => "ret void".to_string(),
            Op::Ret(Some(value)) => format!("ret {}", typed(value)),
        }
    }

    fn render_value(&self, f: &Function, names: &ValueNames, value: &Value) -> String {
        match value {
            Value::Instr(id) => names.instr(*id),
            Value::Arg(index) => format!("%{}", f.params[*index as usize]),
            Value::I1(b) => b.to_string(),
            Value::I32(n) => n.to_string(),
            Value::I64(n) => n.to_string(),
            Value::F64(x) => format!("{x:?}"),
            Value::Null(_) => "null".to_string(),
            Value::Global(name) | Value::Func(name) => format!("@{name}"),
            Value::StrPtr(name) => {
                let ty = self
                    .global(name)
                    .map_or_else(|| Ty::Array(1, Box::new(Ty::I8)), |g| g.ty.clone());
                format!("getelementptr inbounds ({ty}, {ty}* @{name}, i32 0, i32 0)")
            }
        }
    }
}

/// Printer-assigned `%tN` names for instruction results.
struct ValueNames {
    names: HashMap<InstrId, String>,
}

impl ValueNames {
    fn for_function(function: &Function) -> Self {
        let mut names = HashMap::new();
        let mut counter = 0;
        for block in &function.blocks {
            for &id in &block.instrs {
                if !function.instr(id).ty.is_void() {
                    names.insert(id, format!("%t{counter}"));
                    counter += 1;
                }
            }
        }
        Self { names }
    }

    fn instr(&self, id: InstrId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| "%t?".to_string())
    }
}

/// Escapes bytes for an LLVM `c"…"` constant.
fn escape_cstring(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (32..=126).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Builder, Cond, FnSig, VtableSlot};
    use std::rc::Rc;

    #[test]
    fn prints_a_function_with_control_flow() {
        let mut module = Module::new("test.vsop");
        module.declare_function(
            "abs",
            FnSig::new(Ty::I32, vec![Ty::I32]),
            vec!["x".into()],
        );

        let mut b = Builder::new(&mut module);
        b.start_function("abs");
        let neg_block = b.add_block("neg");
        let end_block = b.add_block("end");
        let is_neg = b.icmp(Cond::Slt, Value::Arg(0), Value::I32(0));
        b.cond_br(is_neg, neg_block, end_block);
        b.select_block(neg_block);
        let negated = b.neg(Value::Arg(0));
        b.br(end_block);
        b.select_block(end_block);
        let entry = crate::ir::BlockId(0);
        let merged = b.phi(Ty::I32, vec![(Value::Arg(0), entry), (negated, neg_block)]);
        b.ret(Some(merged));

        let text = module.to_ir_text();
        assert!(text.contains("define i32 @abs(i32 %x) {"));
        assert!(text.contains("%t0 = icmp slt i32 %x, 0"));
        assert!(text.contains("br i1 %t0, label %neg1, label %end2"));
        assert!(text.contains("%t1 = sub i32 0, %x"));
        assert!(text.contains("%t2 = phi i32 [ %x, %entry ], [ %t1, %neg1 ]"));
        assert!(text.contains("ret i32 %t2"));
    }

    #[test]
    fn prints_structs_globals_and_declarations() {
        let mut module = Module::new("m");
        module.declare_struct("struct.A");
        module.set_struct_body(
            "struct.A",
            vec![Ty::Struct("struct.AVTable".into()).ptr(), Ty::I32],
        );
        module.declare_struct("struct.AVTable");
        let method_ty = Ty::Fn(Rc::new(FnSig::new(
            Ty::I32,
            vec![Ty::Struct("struct.A".into()).ptr()],
        )))
        .ptr();
        module.set_struct_body("struct.AVTable", vec![method_ty.clone()]);
        module.add_vtable(
            "vtable.A",
            Ty::Struct("struct.AVTable".into()),
            vec![VtableSlot {
                func: "A_get".into(),
                func_ty: method_ty.clone(),
                slot_ty: method_ty,
            }],
        );
        module.add_cstring(b"hi\n");
        module.declare_function(
            "malloc",
            FnSig::new(Ty::i8_ptr(), vec![Ty::I64]),
            vec!["size".into()],
        );

        let text = module.to_ir_text();
        assert!(text.contains("%struct.A = type { %struct.AVTable*, i32 }"));
        assert!(text.contains(
            "@vtable.A = internal constant %struct.AVTable { i32 (%struct.A*)* @A_get }"
        ));
        assert!(text.contains(
            "@str.0 = private unnamed_addr constant [4 x i8] c\"hi\\0A\\00\""
        ));
        assert!(text.contains("declare i8* @malloc(i64)"));
    }

    #[test]
    fn vtable_slots_with_retyped_receiver_are_bitcast() {
        let mut module = Module::new("m");
        let parent_ty = Ty::Fn(Rc::new(FnSig::new(
            Ty::Void,
            vec![Ty::Struct("struct.P".into()).ptr()],
        )))
        .ptr();
        let child_ty = Ty::Fn(Rc::new(FnSig::new(
            Ty::Void,
            vec![Ty::Struct("struct.C".into()).ptr()],
        )))
        .ptr();
        module.declare_struct("struct.CVTable");
        module.set_struct_body("struct.CVTable", vec![child_ty.clone()]);
        module.add_vtable(
            "vtable.C",
            Ty::Struct("struct.CVTable".into()),
            vec![VtableSlot {
                func: "P_m".into(),
                func_ty: parent_ty,
                slot_ty: child_ty,
            }],
        );

        let text = module.to_ir_text();
        assert!(text.contains(
            "bitcast (void (%struct.P*)* @P_m to void (%struct.C*)*)"
        ));
    }
}
