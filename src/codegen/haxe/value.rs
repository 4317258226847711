//! Operand and constant rendering for the Haxe backend.

use crate::codegen::EmitCx;
use crate::ssa::{BasicKind, ConstValue, Operand, Pos, Ty, TypeKind};

use super::names::{func_class, global_class, param_name, register_name, string_literal};
use super::types::lang_type;

/// Renders an operand as a Haxe expression.
pub(crate) fn value(cx: &mut EmitCx<'_>, op: &Operand, pos: &Pos) -> String {
    match op {
        Operand::Register(r) => register_name(&r.name),
        Operand::Param(p) => param_name(&p.name),
        Operand::FreeVar { index, .. } => format!("_bds[{}]", index),
        Operand::Global { package, name, .. } => format!("{}.v", global_class(package, name)),
        Operand::Function(f) => format!("new Closure({}.call,[])", func_class(cx.types, f)),
        Operand::Const { value, ty } => const_literal(cx, value, *ty, pos),
        Operand::Nil(_) => "null".to_string(),
    }
}

/// Renders an integer-valued operand as a native `Int` expression.
///
/// Emulated 64-bit values are truncated with `GOint64.toInt`.
pub(crate) fn int_value(cx: &mut EmitCx<'_>, op: &Operand, pos: &Pos) -> String {
    if let Some(v) = op.as_const().and_then(const_i64) {
        return int_literal(v as i32);
    }
    let text = value(cx, op, pos);
    if lang_type(cx, op.ty(), false, pos) == "GOint64" {
        format!("GOint64.toInt({})", text)
    } else {
        text
    }
}

/// Integer value of a numeric constant.
pub(crate) fn const_i64(value: &ConstValue) -> Option<i64> {
    match value {
        ConstValue::Int(v) => Some(*v),
        ConstValue::Uint(v) => Some(*v as i64),
        ConstValue::Float(f) if f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

/// Exact value of an integral constant, wide enough for every `int64` and
/// `uint64`.
pub(crate) fn const_int(value: &ConstValue) -> Option<i128> {
    match value {
        ConstValue::Int(v) => Some(i128::from(*v)),
        ConstValue::Uint(v) => Some(i128::from(*v)),
        ConstValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i128),
        _ => None,
    }
}

fn const_f64(value: &ConstValue) -> Option<f64> {
    match value {
        ConstValue::Int(v) => Some(*v as f64),
        ConstValue::Uint(v) => Some(*v as f64),
        ConstValue::Float(f) => Some(*f),
        ConstValue::Complex(re, _) => Some(*re),
        _ => None,
    }
}

/// A 32-bit integer literal; negative values are parenthesised.
pub(crate) fn int_literal(v: i32) -> String {
    if v < 0 {
        format!("({})", v)
    } else {
        v.to_string()
    }
}

/// An emulated 64-bit literal from its two's complement bits.
pub(crate) fn int64_literal(v: i64) -> String {
    format!("GOint64.make({},{})", (v >> 32) as i32, v as i32)
}

pub(crate) fn float_literal(f: f64) -> String {
    if f.is_nan() {
        return "Math.NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 {
            "Math.POSITIVE_INFINITY".to_string()
        } else {
            "Math.NEGATIVE_INFINITY".to_string()
        };
    }
    let text = format!("{:?}", f);
    if f.is_sign_negative() {
        format!("({})", text)
    } else {
        text
    }
}

/// Renders a constant of type `ty`.
pub(crate) fn const_literal(cx: &mut EmitCx<'_>, value: &ConstValue, ty: Ty, pos: &Pos) -> String {
    if matches!(value, ConstValue::Nil) {
        return "null".to_string();
    }
    let types = cx.types;
    let kind = match types.underlying_kind(ty) {
        TypeKind::Basic(kind) => *kind,
        _ => {
            cx.error(
                pos,
                format!(
                    "unexpected constant {:?} of type {}",
                    value,
                    types.type_string(ty)
                ),
            );
            return "INVALID_CONSTANT".to_string();
        }
    };

    use BasicKind::*;
    let rendered = match (kind, value) {
        (Bool | UntypedBool, ConstValue::Bool(b)) => Some(b.to_string()),
        (String | UntypedString, ConstValue::String(s)) => Some(string_literal(s)),
        (Float32 | Float64 | UntypedFloat, v) => const_f64(v).map(float_literal),
        (Complex64 | Complex128 | UntypedComplex, ConstValue::Complex(re, im)) => Some(format!(
            "new Complex({},{})",
            float_literal(*re),
            float_literal(*im)
        )),
        (Complex64 | Complex128 | UntypedComplex, v) => const_f64(v)
            .map(|re| format!("new Complex({},0.0)", float_literal(re))),
        (Int64 | Uint64, v) => const_i64(v).map(int64_literal),
        (UntypedInt, v) => const_i64(v).map(|v| {
            if i32::try_from(v).is_ok() {
                v.to_string()
            } else {
                int64_literal(v)
            }
        }),
        (Uintptr, v) => const_i64(v).map(|v| v.to_string()),
        (k, v) if k.is_integer() => const_i64(v).map(|v| int_literal(v as i32)),
        (UnsafePointer | UntypedNil, _) => Some("null".to_string()),
        _ => None,
    };

    rendered.unwrap_or_else(|| {
        cx.error(
            pos,
            format!("constant {:?} does not fit type {}", value, kind.name()),
        );
        "INVALID_CONSTANT".to_string()
    })
}
