//! Instruction lowering for the Haxe backend.
//!
//! Each SSA instruction becomes one or more Haxe statements. Blocks are cases
//! of a `switch(_Next)` inside a `while(true)` loop, so control transfer is
//! `_Next=<block>;continue;`. Inside a split-off sub-unit the same transfer
//! becomes `return 2;` (jumped) and a return becomes `_res=...;return 1;`,
//! which the caller propagates.
//!
//! 32-bit integer arithmetic is wrapped in the destination's width/sign
//! coercion; 64-bit integer arithmetic goes through the runtime's `GOint64`.

use crate::codegen::{EmitCx, Frame};
use crate::ssa::{
    BasicBlock, BasicKind, BinOp, Builtin, CallCommon, CallMode, Callee, InstrKind, Instruction,
    Operand, Pos, Register, SelectState, Ty, TypeKind, TypeTable, UnOp,
};

use super::convert::{IntCoercion, convert};
use super::interface::{change_interface, change_type, invoke, make_interface, type_assert};
use super::names::{func_class, phi_temp_name, register_name};
use super::types::{accessor, lang_type, results_type};
use super::value::{const_int, int_literal, int_value, value as val};

/// Sub-unit signal: control left through a `return`.
pub(crate) const SIGNAL_RETURNED: u8 = 1;
/// Sub-unit signal: control left through a jump to another block.
pub(crate) const SIGNAL_JUMPED: u8 = 2;

/// Emits one instruction.
pub(crate) fn instruction(cx: &mut EmitCx<'_>, frame: &Frame<'_>, instr: &Instruction) -> String {
    let pos = &instr.pos;
    let dest = instr.dest.as_ref();
    let reg = dest.map(|r| register_name(&r.name));

    match &instr.kind {
        InstrKind::BinOp { op, x, y } => {
            let expr = bin_op(cx, *op, x, y, pos);
            assign(dest, expr)
        }
        InstrKind::UnOp { op, x, comma_ok } => un_op(cx, dest, *op, x, *comma_ok, pos),
        InstrKind::Store { addr, value } => {
            let a = val(cx, addr, pos);
            let v = val(cx, value, pos);
            match cx.types.elem(addr.ty()) {
                Some(elem) => format!("{}.{};", a, accessor(cx, "store", elem, &[v])),
                None => format!("{};", unsupported(cx, "store through a non-pointer", pos)),
            }
        }
        InstrKind::Send { chan, value } => {
            let c = val(cx, chan, pos);
            let v = val(cx, value, pos);
            format!("{}.send({});", c, v)
        }
        InstrKind::Ret(values) => ret(cx, frame, values, pos),
        InstrKind::Jump => match frame.current_block().succs.first() {
            Some(&target) => format!("{}{}", edge_moves(cx, frame, target, pos), transfer(frame, target)),
            None => format!("{};", unsupported(cx, "jump without a successor", pos)),
        },
        InstrKind::If { cond } => {
            let succs = &frame.current_block().succs;
            let (Some(&then_block), Some(&else_block)) = (succs.first(), succs.get(1)) else {
                return format!("{};", unsupported(cx, "if without two successors", pos));
            };
            let c = val(cx, cond, pos);
            let then_moves = edge_moves(cx, frame, then_block, pos);
            let else_moves = edge_moves(cx, frame, else_block, pos);
            format!(
                "if({}){{{}_Next={};}}else{{{}_Next={};}}{}",
                c,
                then_moves,
                then_block,
                else_moves,
                else_block,
                continue_stmt(frame)
            )
        }
        // resolved on the incoming edges
        InstrKind::Phi { .. } => String::new(),
        InstrKind::Call { call: common, mode } => call(cx, dest, common, *mode, pos),
        InstrKind::Convert { x } => match (dest, reg) {
            (Some(d), Some(r)) => {
                let dest_lang = lang_type(cx, d.ty, false, pos);
                convert(cx, &r, &dest_lang, d.ty, x, pos)
            }
            _ => String::new(),
        },
        InstrKind::ChangeType { x } => match (dest, reg) {
            (Some(d), Some(r)) => change_type(cx, &r, d.ty, x, pos),
            _ => String::new(),
        },
        InstrKind::ChangeInterface { x } => match (dest, reg) {
            (Some(d), Some(r)) => change_interface(cx, &r, d.ty, x, pos),
            _ => String::new(),
        },
        InstrKind::MakeInterface { x } => match (dest, reg) {
            (Some(d), Some(r)) => make_interface(cx, &r, d.ty, x, pos),
            _ => String::new(),
        },
        InstrKind::TypeAssert {
            x,
            asserted,
            comma_ok,
        } => type_assert(cx, reg.as_deref(), x, *asserted, *comma_ok, pos),
        InstrKind::Alloc { .. } => {
            let Some(d) = dest else {
                return String::new();
            };
            match cx.types.elem(d.ty) {
                Some(elem) => {
                    let zero = lang_type(cx, elem, true, pos);
                    assign(dest, format!("Pointer.make({})", zero))
                }
                None => assign(dest, unsupported(cx, "alloc of a non-pointer type", pos)),
            }
        }
        InstrKind::MakeClosure { func, bindings } => {
            let mut bound = Vec::with_capacity(bindings.len());
            for b in bindings {
                bound.push(val(cx, b, pos));
            }
            let class = func_class(cx.types, func);
            assign(dest, format!("new Closure({}.call,[{}])", class, bound.join(",")))
        }
        InstrKind::MakeSlice { len, cap } => {
            let Some(d) = dest else {
                return String::new();
            };
            let Some(elem) = cx.types.elem(d.ty) else {
                return assign(dest, unsupported(cx, "make of a non-slice type", pos));
            };
            let size = cx.sizes.sizeof(cx.types, elem);
            let mut checks = String::new();
            let len = length_bound(cx, len, &mut checks, pos);
            let cap = length_bound(cx, cap, &mut checks, pos);
            let make = assign(
                dest,
                format!(
                    "new Slice(Pointer.make(Object.make({}*{})),0,{},{},{})",
                    cap, size, len, cap, size
                ),
            );
            format!("{}{}", checks, make)
        }
        InstrKind::MakeMap { .. } => match dest {
            Some(d) => {
                let zero = lang_type(cx, d.ty, true, pos);
                assign(dest, zero)
            }
            None => String::new(),
        },
        InstrKind::MakeChan { size } => match dest {
            Some(d) => {
                let chan = lang_type(cx, d.ty, false, pos);
                let size = int_value(cx, size, pos);
                assign(dest, format!("new {}({})", chan, size))
            }
            None => String::new(),
        },
        InstrKind::Slice { x, low, high } => slice(cx, dest, x, low.as_ref(), high.as_ref(), pos),
        InstrKind::FieldAddr { x, field } => match field_offset(cx, x.ty(), *field) {
            Some((offset, _)) => {
                let a = val(cx, x, pos);
                assign(dest, format!("{}.fieldAddr({})", a, offset))
            }
            None => assign(dest, unsupported(cx, "field address of a non-struct", pos)),
        },
        InstrKind::Field { x, field } => match field_offset(cx, x.ty(), *field) {
            Some((offset, field_ty)) => {
                let a = val(cx, x, pos);
                let get = accessor(cx, "get", field_ty, &[offset.to_string()]);
                assign(dest, format!("{}.{}", a, get))
            }
            None => assign(dest, unsupported(cx, "field of a non-struct", pos)),
        },
        InstrKind::IndexAddr { x, index } => index_addr(cx, dest, x, index, pos),
        InstrKind::Index { x, index: i } => index(cx, dest, x, i, pos),
        InstrKind::Lookup {
            x,
            index: key,
            comma_ok,
        } => lookup(cx, dest, x, key, *comma_ok, pos),
        InstrKind::MapUpdate { map, key, value } => {
            let m = val(cx, map, pos);
            let k = val(cx, key, pos);
            let v = val(cx, value, pos);
            format!("{}.set({},{});", m, k, v)
        }
        InstrKind::Extract { tuple, index } => {
            let t = val(cx, tuple, pos);
            assign(dest, format!("{}.r{}", t, index))
        }
        InstrKind::Range { x } => {
            let a = val(cx, x, pos);
            let expr = match cx.types.basic_kind(x.ty()) {
                Some(kind) if kind.is_string() => format!("Force.stringRange({})", a),
                _ => format!("{}.range()", a),
            };
            assign(dest, expr)
        }
        InstrKind::Next { iter, .. } => {
            let it = val(cx, iter, pos);
            assign(dest, format!("{}.next()", it))
        }
        InstrKind::Select { states, blocking } => select(cx, dest, states, *blocking, pos),
        InstrKind::Panic { x } => {
            let v = val(cx, x, pos);
            format!("Scheduler.panic({});", v)
        }
        InstrKind::RunDefers => "Scheduler.runDefers(_defers);".to_string(),
    }
}

/// `reg=expr;`, or `expr;` when the value is unused.
fn assign(dest: Option<&Register>, expr: String) -> String {
    match dest {
        Some(r) => format!("{}={};", register_name(&r.name), expr),
        None => format!("{};", expr),
    }
}

/// Logs an error and returns the sentinel expression.
fn unsupported(cx: &mut EmitCx<'_>, what: &str, pos: &Pos) -> String {
    cx.error(pos, format!("instruction(): {}", what));
    "UNSUPPORTED_OPERATION".to_string()
}

fn continue_stmt(frame: &Frame<'_>) -> String {
    if frame.in_sub_fn {
        format!("return {};", SIGNAL_JUMPED)
    } else {
        "continue;".to_string()
    }
}

fn transfer(frame: &Frame<'_>, target: usize) -> String {
    format!("_Next={};{}", target, continue_stmt(frame))
}

/// Phi instructions of a block, with their incoming edges.
pub(crate) fn block_phis(block: &BasicBlock) -> Vec<(&Register, &[(usize, Operand)])> {
    block
        .instrs
        .iter()
        .filter_map(|i| match (&i.kind, &i.dest) {
            (InstrKind::Phi { edges }, Some(r)) => Some((r, edges.as_slice())),
            _ => None,
        })
        .collect()
}

/// Assignments for the phis of `target` on the edge from the current block.
///
/// With several phis the values go through temporaries first, so phis that
/// read each other see the values from before the edge.
fn edge_moves(cx: &mut EmitCx<'_>, frame: &Frame<'_>, target: usize, pos: &Pos) -> String {
    let Some(block) = frame.func.blocks.get(target) else {
        return String::new();
    };
    let phis = block_phis(block);
    let mut values = Vec::with_capacity(phis.len());
    for (reg, edges) in &phis {
        let v = match edges.iter().find(|(pred, _)| *pred == frame.block) {
            Some((_, op)) => val(cx, op, pos),
            None => lang_type(cx, reg.ty, true, pos),
        };
        values.push(v);
    }

    match phis.as_slice() {
        [] => String::new(),
        [(reg, _)] => format!("{}={};", register_name(&reg.name), values[0]),
        _ => {
            let mut out = String::new();
            for ((reg, _), v) in phis.iter().zip(&values) {
                out.push_str(&format!("{}={};", phi_temp_name(&reg.name), v));
            }
            for (reg, _) in &phis {
                out.push_str(&format!(
                    "{}={};",
                    register_name(&reg.name),
                    phi_temp_name(&reg.name)
                ));
            }
            out
        }
    }
}

fn ret(cx: &mut EmitCx<'_>, frame: &Frame<'_>, values: &[Operand], pos: &Pos) -> String {
    let mut rendered = Vec::with_capacity(values.len());
    for v in values {
        rendered.push(val(cx, v, pos));
    }
    let result = match rendered.len() {
        0 => None,
        1 => rendered.pop(),
        _ => {
            let fields: Vec<String> = rendered
                .iter()
                .enumerate()
                .map(|(i, v)| format!("r{}:{}", i, v))
                .collect();
            Some(format!("{{{}}}", fields.join(",")))
        }
    };
    match (frame.in_sub_fn, result) {
        (true, Some(r)) => format!("_res={};return {};", r, SIGNAL_RETURNED),
        (true, None) => format!("return {};", SIGNAL_RETURNED),
        (false, Some(r)) => format!("return {};", r),
        (false, None) => "return;".to_string(),
    }
}

/// Wraps a 32-bit integer expression in the coercion for `ty`.
fn coerce(types: &TypeTable, ty: Ty, expr: String) -> String {
    let coercion = types
        .basic_kind(ty)
        .and_then(IntCoercion::for_kind)
        .unwrap_or(IntCoercion::Int32);
    format!("{}({})", coercion.runtime_fn(), expr)
}

fn un_op(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    op: UnOp,
    x: &Operand,
    comma_ok: bool,
    pos: &Pos,
) -> String {
    let types = cx.types;
    let ty = x.ty();
    let a = val(cx, x, pos);
    let expr = match op {
        UnOp::Not => format!("(!{})", a),
        UnOp::Neg | UnOp::Xor => {
            let lowered = lang_type(cx, ty, false, pos);
            match (op, lowered.as_str()) {
                (UnOp::Neg, "Int") => coerce(types, ty, format!("-{}", a)),
                (UnOp::Xor, "Int") => coerce(types, ty, format!("~{}", a)),
                (UnOp::Neg, "GOint64") => format!("GOint64.neg({})", a),
                (UnOp::Xor, "GOint64") => format!("GOint64.xor({},GOint64.make(-1,-1))", a),
                (UnOp::Neg, "Float") => format!("(-{})", a),
                (UnOp::Neg, "Complex") => format!("Complex.neg({})", a),
                _ => unsupported(cx, &format!("unary {:?} on {}", op, lowered), pos),
            }
        }
        UnOp::Deref => match types.elem(ty) {
            Some(elem) => format!("{}.{}", a, accessor(cx, "load", elem, &[])),
            None => unsupported(cx, "load through a non-pointer", pos),
        },
        UnOp::Recv => match types.elem(ty) {
            Some(elem) => {
                let zero = lang_type(cx, elem, true, pos);
                if comma_ok {
                    format!("{}.receive({})", a, zero)
                } else {
                    format!("{}.receive({}).r0", a, zero)
                }
            }
            None => unsupported(cx, "receive from a non-channel", pos),
        },
    };
    assign(dest, expr)
}

fn bin_op(cx: &mut EmitCx<'_>, op: BinOp, x: &Operand, y: &Operand, pos: &Pos) -> String {
    let ty = x.ty();
    let lowered = lang_type(cx, ty, false, pos);
    let kind = cx.types.basic_kind(ty);
    let unsigned = kind.is_some_and(BasicKind::is_unsigned);
    let shift = matches!(op, BinOp::Shl | BinOp::Shr);
    let a = val(cx, x, pos);
    let (b, out_of_range) = if shift {
        let width = if lowered == "GOint64" { 64 } else { 32 };
        shift_count(cx, y, width, pos)
    } else {
        (val(cx, y, pos), String::new())
    };
    let sym = op.symbol();

    match lowered.as_str() {
        "Int" => {
            let coercion = kind
                .and_then(IntCoercion::for_kind)
                .unwrap_or(IntCoercion::Int32);
            let wrap = |e: String| format!("{}({})", coercion.runtime_fn(), e);
            match op {
                BinOp::Add | BinOp::Sub => wrap(format!("{}{}{}", a, sym, b)),
                BinOp::Mul => wrap(format!("Force.mul32({},{})", a, b)),
                BinOp::Quo if unsigned => wrap(format!("Force.uintDiv({},{})", a, b)),
                BinOp::Quo => wrap(format!("Force.intDiv({},{})", a, b)),
                BinOp::Rem if unsigned => wrap(format!("Force.uintMod({},{})", a, b)),
                BinOp::Rem => wrap(format!("Force.intMod({},{})", a, b)),
                BinOp::And | BinOp::Or | BinOp::Xor => format!("({}{}{})", a, sym, b),
                BinOp::AndNot => format!("({}&~{})", a, b),
                BinOp::Shl => wrap(format!("{}?0:{}<<{}", out_of_range, a, b)),
                BinOp::Shr if unsigned => format!("({}?0:{}>>>{})", out_of_range, a, b),
                BinOp::Shr => format!("({}>>({}?31:{}))", a, out_of_range, b),
                BinOp::Eql | BinOp::Neq => format!("({}{}{})", a, sym, b),
                _ if coercion == IntCoercion::Uint32 => {
                    format!("(Force.uintCompare({},{}){}0)", a, b, sym)
                }
                _ => format!("({}{}{})", a, sym, b),
            }
        }
        "GOint64" => {
            let f = match op {
                BinOp::Add => "add",
                BinOp::Sub => "sub",
                BinOp::Mul => "mul",
                BinOp::Quo if unsigned => "udiv",
                BinOp::Quo => "div",
                BinOp::Rem if unsigned => "umod",
                BinOp::Rem => "mod",
                BinOp::And => "and",
                BinOp::Or => "or",
                BinOp::Xor => "xor",
                BinOp::AndNot => "andNot",
                BinOp::Shl => {
                    return format!("({}?GOint64.make(0,0):GOint64.shl({},{}))", out_of_range, a, b);
                }
                BinOp::Shr if unsigned => {
                    return format!("({}?GOint64.make(0,0):GOint64.ushr({},{}))", out_of_range, a, b);
                }
                BinOp::Shr => return format!("GOint64.shr({},({}?63:{}))", a, out_of_range, b),
                _ => {
                    let cmp = if unsigned { "ucompare" } else { "compare" };
                    return format!("(GOint64.{}({},{}){}0)", cmp, a, b, sym);
                }
            };
            format!("GOint64.{}({},{})", f, a, b)
        }
        "Float" => {
            let expr = match op {
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Quo => {
                    format!("({}{}{})", a, sym, b)
                }
                BinOp::Rem => format!("Force.floatMod({},{})", a, b),
                _ if op.is_comparison() => return format!("({}{}{})", a, sym, b),
                _ => return unsupported(cx, &format!("{:?} on floats", op), pos),
            };
            if kind == Some(BasicKind::Float32) {
                format!("Force.toFloat32({})", expr)
            } else {
                expr
            }
        }
        "String" => match op {
            BinOp::Add | BinOp::Eql | BinOp::Neq => format!("({}{}{})", a, sym, b),
            _ if op.is_comparison() => format!("(Force.stringCompare({},{}){}0)", a, b, sym),
            _ => unsupported(cx, &format!("{:?} on strings", op), pos),
        },
        "Complex" => match op {
            BinOp::Add => format!("Complex.add({},{})", a, b),
            BinOp::Sub => format!("Complex.sub({},{})", a, b),
            BinOp::Mul => format!("Complex.mul({},{})", a, b),
            BinOp::Quo => format!("Complex.div({},{})", a, b),
            BinOp::Eql => format!("Complex.eq({},{})", a, b),
            BinOp::Neq => format!("(!Complex.eq({},{}))", a, b),
            _ => unsupported(cx, &format!("{:?} on complex numbers", op), pos),
        },
        "Interface" | "Pointer" | "Object" => match op {
            BinOp::Eql => format!("{}.isEqual({},{})", lowered, a, b),
            BinOp::Neq => format!("(!{}.isEqual({},{}))", lowered, a, b),
            _ => unsupported(cx, &format!("{:?} on {}", op, lowered), pos),
        },
        _ => match op {
            BinOp::Eql | BinOp::Neq => format!("({}{}{})", a, sym, b),
            _ => unsupported(cx, &format!("{:?} on {}", op, lowered), pos),
        },
    }
}

/// Shift count as a native `Int`, with the condition under which it is at
/// least `width` (negative counts included).
fn shift_count(cx: &mut EmitCx<'_>, y: &Operand, width: u32, pos: &Pos) -> (String, String) {
    let count = IndexOperand::new(cx, y, pos);
    match (count.constant, &count.wide) {
        (Some(c), _) if c < 0 || c >= i128::from(width) => ("0".to_string(), "true".to_string()),
        (_, Some(w)) => {
            let out = format!("(GOint64.ucompare({},GOint64.ofInt({}))>=0)", w, width);
            (count.int.clone(), out)
        }
        _ => {
            let out = format!("({}<0||{}>={})", count.int, count.int, width);
            (count.int, out)
        }
    }
}

fn call(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    common: &CallCommon,
    mode: CallMode,
    pos: &Pos,
) -> String {
    // go and defer evaluate their operands now and call later
    let bind = mode != CallMode::Call;
    let mut prelude = String::new();
    let mut args = Vec::with_capacity(common.args.len());
    for (i, arg) in common.args.iter().enumerate() {
        let text = val(cx, arg, pos);
        if bind {
            prelude.push_str(&format!("var _a{}={};", i, text));
            args.push(format!("_a{}", i));
        } else {
            args.push(text);
        }
    }
    let expr = match &common.callee {
        Callee::Static(func) => format!("{}.call({})", func_class(cx.types, func), args.join(",")),
        Callee::Value(f) => {
            let f = val(cx, f, pos);
            let f = bind_callee(&mut prelude, bind, f);
            format!("{}.callFn([{}])", f, args.join(","))
        }
        Callee::Invoke { recv, method } => {
            let r = val(cx, recv, pos);
            let r = bind_callee(&mut prelude, bind, r);
            invoke(&r, method, &args)
        }
        Callee::Builtin(builtin) => builtin_call(cx, *builtin, &common.args, &args, pos),
    };

    match mode {
        CallMode::Call => assign(dest, expr),
        CallMode::Go => format!("{{{}Scheduler.go(function(){{{};}});}}", prelude, expr),
        CallMode::Defer => format!("{{{}_defers.push(function(){{{};}});}}", prelude, expr),
    }
}

/// Binds a callee to `_f` when the call is deferred.
fn bind_callee(prelude: &mut String, bind: bool, text: String) -> String {
    if bind {
        prelude.push_str(&format!("var _f={};", text));
        "_f".to_string()
    } else {
        text
    }
}

/// Length of an array, or of the array a pointer points to.
fn array_len(types: &TypeTable, ty: Ty) -> Option<u64> {
    match types.underlying_kind(ty) {
        TypeKind::Array { len, .. } => Some(*len),
        TypeKind::Pointer(elem) => match types.underlying_kind(*elem) {
            TypeKind::Array { len, .. } => Some(*len),
            _ => None,
        },
        _ => None,
    }
}

fn builtin_call(
    cx: &mut EmitCx<'_>,
    builtin: Builtin,
    ops: &[Operand],
    args: &[String],
    pos: &Pos,
) -> String {
    let arity = match builtin {
        Builtin::Recover | Builtin::Print | Builtin::Println => 0,
        Builtin::Len | Builtin::Cap | Builtin::Close | Builtin::Real | Builtin::Imag => 1,
        Builtin::Append | Builtin::Copy | Builtin::Delete | Builtin::Complex => 2,
    };
    if args.len() < arity {
        return unsupported(cx, &format!("{:?} with {} arguments", builtin, args.len()), pos);
    }
    let types = cx.types;

    match builtin {
        Builtin::Len | Builtin::Cap => {
            let ty = ops[0].ty();
            if let Some(n) = array_len(types, ty) {
                return n.to_string();
            }
            let a = &args[0];
            let method = if builtin == Builtin::Len { "len" } else { "cap" };
            match types.underlying_kind(ty) {
                TypeKind::Basic(kind) if kind.is_string() && builtin == Builtin::Len => {
                    format!("Force.toUTF8length({})", a)
                }
                TypeKind::Slice(_) | TypeKind::Chan { .. } => {
                    format!("({}==null?0:{}.{}())", a, a, method)
                }
                TypeKind::Map { .. } if builtin == Builtin::Len => {
                    format!("({}==null?0:{}.len())", a, a)
                }
                _ => unsupported(cx, &format!("{:?} of {}", builtin, types.type_string(ty)), pos),
            }
        }
        Builtin::Append | Builtin::Copy => {
            let from_string = types.basic_kind(ops[1].ty()).is_some_and(BasicKind::is_string);
            let f = match (builtin, from_string) {
                (Builtin::Append, true) => "appendString",
                (Builtin::Append, false) => "append",
                (_, true) => "copyString",
                (_, false) => "copy",
            };
            format!("Slice.{}({},{})", f, args[0], args[1])
        }
        Builtin::Delete => format!("if({}!=null){}.remove({})", args[0], args[0], args[1]),
        Builtin::Close => format!("{}.close()", args[0]),
        Builtin::Print => format!("Console.print([{}])", args.join(",")),
        Builtin::Println => format!("Console.println([{}])", args.join(",")),
        Builtin::Real => format!("{}.real", args[0]),
        Builtin::Imag => format!("{}.imag", args[0]),
        Builtin::Complex => format!("new Complex({},{})", args[0], args[1]),
        Builtin::Recover => "Scheduler.recover()".to_string(),
    }
}

/// Length operand of a bounds check.
enum Len {
    Const(u64),
    Expr(String),
}

/// An integer operand used as an index, a length or a shift count.
struct IndexOperand {
    /// Native `Int` expression used for the access.
    int: String,
    /// Exact value of a constant operand.
    constant: Option<i128>,
    /// Full-width expression of an emulated 64-bit operand.
    wide: Option<String>,
}

impl IndexOperand {
    fn new(cx: &mut EmitCx<'_>, op: &Operand, pos: &Pos) -> Self {
        if let Some(c) = op.as_const().and_then(const_int) {
            return Self {
                int: int_literal(c as i32),
                constant: Some(c),
                wide: None,
            };
        }
        let text = val(cx, op, pos);
        if lang_type(cx, op.ty(), false, pos) == "GOint64" {
            Self {
                int: format!("GOint64.toInt({})", text),
                constant: None,
                wide: Some(text),
            }
        } else {
            Self {
                int: text,
                constant: None,
                wide: None,
            }
        }
    }

    /// A constant outside the range of a native `Int` length.
    fn const_out_of_range(&self) -> bool {
        self.constant.is_some_and(|c| c < 0 || c > i128::from(i32::MAX))
    }
}

/// `if(i<0||i>=len) Scheduler.ioor();`, omitted when a constant index is
/// known to be inside a constant length. Emulated 64-bit indexes are
/// compared at full width before being narrowed for the access.
fn bounds_check(index: &IndexOperand, len: Len) -> String {
    if index.const_out_of_range() {
        return "Scheduler.ioor();".to_string();
    }
    if let (Some(c), Len::Const(n)) = (index.constant, &len)
        && (c as u64) < *n
    {
        return String::new();
    }
    let len = match len {
        Len::Const(n) => n.to_string(),
        Len::Expr(e) => e,
    };
    match &index.wide {
        Some(w) => format!(
            "if(GOint64.ucompare({},GOint64.ofInt({}))>=0) Scheduler.ioor();",
            w, len
        ),
        None => format!(
            "if({}<0||{}>={}) Scheduler.ioor();",
            index.int, index.int, len
        ),
    }
}

/// Native `Int` form of a slice bound or length, appending a check to
/// `checks` when the full value cannot fit.
fn length_bound(cx: &mut EmitCx<'_>, op: &Operand, checks: &mut String, pos: &Pos) -> String {
    let bound = IndexOperand::new(cx, op, pos);
    if bound.const_out_of_range() {
        checks.push_str("Scheduler.ioor();");
    } else if let Some(w) = &bound.wide {
        checks.push_str(&format!(
            "if(GOint64.ucompare({},GOint64.ofInt({}))>0) Scheduler.ioor();",
            w,
            i32::MAX
        ));
    }
    bound.int
}

fn index_addr(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    x: &Operand,
    index: &Operand,
    pos: &Pos,
) -> String {
    let types = cx.types;
    let a = val(cx, x, pos);
    let i = IndexOperand::new(cx, index, pos);

    match types.underlying_kind(x.ty()) {
        TypeKind::Slice(_) => {
            let check = bounds_check(&i, Len::Expr(format!("{}.len()", a)));
            format!("{}{}", check, assign(dest, format!("{}.itemAddr({})", a, i.int)))
        }
        TypeKind::Pointer(base) => match types.underlying_kind(*base) {
            TypeKind::Array { elem, len } => {
                let size = cx.sizes.sizeof(types, *elem);
                let check = bounds_check(&i, Len::Const(*len));
                format!(
                    "{}{}",
                    check,
                    assign(dest, format!("{}.fieldAddr({}*{})", a, i.int, size))
                )
            }
            _ => assign(dest, unsupported(cx, "index address of a non-array pointer", pos)),
        },
        _ => assign(dest, unsupported(cx, "index address of a non-indexable value", pos)),
    }
}

fn index(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    x: &Operand,
    index: &Operand,
    pos: &Pos,
) -> String {
    let types = cx.types;
    let a = val(cx, x, pos);
    let i = IndexOperand::new(cx, index, pos);

    match types.underlying_kind(x.ty()) {
        TypeKind::Array { elem, len } => {
            let size = cx.sizes.sizeof(types, *elem);
            let check = bounds_check(&i, Len::Const(*len));
            let get = accessor(cx, "get", *elem, &[format!("{}*{}", i.int, size)]);
            format!("{}{}", check, assign(dest, format!("{}.{}", a, get)))
        }
        TypeKind::Slice(elem) => {
            let check = bounds_check(&i, Len::Expr(format!("{}.len()", a)));
            let load = accessor(cx, "load", *elem, &[]);
            format!(
                "{}{}",
                check,
                assign(dest, format!("{}.itemAddr({}).{}", a, i.int, load))
            )
        }
        TypeKind::Basic(kind) if kind.is_string() => string_index(dest, &a, &i),
        _ => assign(dest, unsupported(cx, "index of a non-indexable value", pos)),
    }
}

fn string_index(dest: Option<&Register>, s: &str, i: &IndexOperand) -> String {
    let check = bounds_check(i, Len::Expr(format!("Force.toUTF8length({})", s)));
    format!("{}{}", check, assign(dest, format!("Force.byteAt({},{})", s, i.int)))
}

fn lookup(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    x: &Operand,
    key: &Operand,
    comma_ok: bool,
    pos: &Pos,
) -> String {
    let types = cx.types;
    match types.underlying_kind(x.ty()) {
        TypeKind::Map { value, .. } => {
            let m = val(cx, x, pos);
            let k = val(cx, key, pos);
            let zero = lang_type(cx, *value, true, pos);
            let expr = if comma_ok {
                format!("({}==null?{{r0:{},r1:false}}:{}.getOk({}))", m, zero, m, k)
            } else {
                format!("({}==null?{}:{}.get({}))", m, zero, m, k)
            };
            assign(dest, expr)
        }
        TypeKind::Basic(kind) if kind.is_string() => {
            let s = val(cx, x, pos);
            let i = IndexOperand::new(cx, key, pos);
            string_index(dest, &s, &i)
        }
        _ => assign(dest, unsupported(cx, "lookup in a non-map", pos)),
    }
}

fn slice(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    x: &Operand,
    low: Option<&Operand>,
    high: Option<&Operand>,
    pos: &Pos,
) -> String {
    let types = cx.types;
    let a = val(cx, x, pos);
    let mut checks = String::new();
    let low = match low {
        Some(l) => length_bound(cx, l, &mut checks, pos),
        None => "0".to_string(),
    };
    let high = high.map(|h| length_bound(cx, h, &mut checks, pos));

    let expr = match types.underlying_kind(x.ty()) {
        TypeKind::Basic(kind) if kind.is_string() => format!(
            "Force.substr({},{},{})",
            a,
            low,
            high.unwrap_or_else(|| "-1".to_string())
        ),
        TypeKind::Slice(_) => format!(
            "{}.subSlice({},{})",
            a,
            low,
            high.unwrap_or_else(|| "-1".to_string())
        ),
        TypeKind::Pointer(base) => match types.underlying_kind(*base) {
            TypeKind::Array { elem, len } => {
                let size = cx.sizes.sizeof(types, *elem);
                format!(
                    "Slice.fromPointer({},{},{},{},{})",
                    a,
                    low,
                    high.unwrap_or_else(|| len.to_string()),
                    len,
                    size
                )
            }
            _ => unsupported(cx, "slice of a non-array pointer", pos),
        },
        _ => unsupported(cx, "slice of a non-sliceable value", pos),
    };
    format!("{}{}", checks, assign(dest, expr))
}

/// Byte offset and type of field `field` of a struct or pointer to struct.
fn field_offset(cx: &EmitCx<'_>, ty: Ty, field: usize) -> Option<(u64, Ty)> {
    let fields = cx.types.struct_fields(ty)?;
    let target = fields.get(field)?;
    let offsets = cx.sizes.offsetsof(cx.types, fields);
    Some((*offsets.get(field)?, target.ty))
}

fn select(
    cx: &mut EmitCx<'_>,
    dest: Option<&Register>,
    states: &[SelectState],
    blocking: bool,
    pos: &Pos,
) -> String {
    let mut cases = Vec::with_capacity(states.len());
    for state in states {
        let c = val(cx, &state.chan, pos);
        let case = match &state.send {
            Some(v) => {
                let v = val(cx, v, pos);
                format!("{{ch:{},send:true,val:{}}}", c, v)
            }
            None => format!("{{ch:{},send:false,val:null}}", c),
        };
        cases.push(case);
    }
    assign(
        dest,
        format!("Channel.select([{}],{})", cases.join(","), blocking),
    )
}

/// Haxe return type of a function with the given results.
pub(crate) fn return_type(cx: &mut EmitCx<'_>, results: &[Ty], pos: &Pos) -> String {
    match results_type(cx, results, false, pos) {
        t if t.is_empty() => "Void".to_string(),
        t => t,
    }
}
