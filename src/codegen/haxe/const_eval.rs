//! Compile-time evaluation of conversions over constant operands.
//!
//! When the operand of a conversion is a constant, the result is computed
//! here and emitted as a literal instead of a runtime call. The arithmetic
//! reproduces the source language's exact semantics: integer narrowing wraps,
//! float to integer truncates toward zero, float32 narrowing rounds to the
//! nearest `f32`, and string/byte/rune conversions go through UTF-8.
//!
//! Integer values are held as the source language sees them for types of up
//! to 32 bits, and as two's complement bits for 64-bit types.

use crate::codegen::EmitCx;
use crate::ssa::{BasicKind, ConstValue, Pos, Ty};

use super::convert::{ConversionPlan, IntSource};
use super::value::const_literal;

/// A constant value in the middle of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Runes(Vec<i32>),
}

impl Folded {
    pub fn from_const(value: &ConstValue) -> Option<Folded> {
        match value {
            ConstValue::Bool(b) => Some(Folded::Bool(*b)),
            ConstValue::Int(v) => Some(Folded::Int(*v)),
            ConstValue::Uint(v) => Some(Folded::Int(*v as i64)),
            ConstValue::Float(f) => Some(Folded::Float(*f)),
            ConstValue::String(s) => Some(Folded::String(s.clone())),
            ConstValue::Complex(..) | ConstValue::Nil => None,
        }
    }

    /// Renders the value as a literal of type `ty`.
    ///
    /// Returns `None` when `ty` has no literal form for this value.
    pub(crate) fn literal(&self, cx: &mut EmitCx<'_>, ty: Ty, pos: &Pos) -> Option<String> {
        let value = match self {
            Folded::Bytes(bytes) => {
                let items: Vec<String> = bytes.iter().map(u8::to_string).collect();
                return Some(format!("Slice.fromBytes([{}])", items.join(",")));
            }
            Folded::Runes(runes) => {
                let items: Vec<String> = runes.iter().map(i32::to_string).collect();
                return Some(format!("Slice.fromRunes([{}])", items.join(",")));
            }
            Folded::Bool(b) => ConstValue::Bool(*b),
            Folded::Int(v) => ConstValue::Int(*v),
            Folded::Float(f) => ConstValue::Float(*f),
            Folded::String(s) => ConstValue::String(s.clone()),
        };
        match cx.types.basic_kind(ty) {
            None | Some(BasicKind::UnsafePointer) | Some(BasicKind::UntypedNil) => None,
            Some(_) => Some(const_literal(cx, &value, ty, pos)),
        }
    }
}

const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Truncates toward zero and wraps modulo 2^64. NaN and infinities give 0.
fn float_to_bits(f: f64) -> i64 {
    if !f.is_finite() {
        return 0;
    }
    let t = f.trunc();
    if (-TWO_POW_63..TWO_POW_63).contains(&t) {
        t as i64
    } else if (TWO_POW_63..TWO_POW_64).contains(&t) {
        t as u64 as i64
    } else {
        t.rem_euclid(TWO_POW_64) as u64 as i64
    }
}

/// Truncates toward zero and reduces into `0..2^32`, ready for a 32-bit
/// coercion.
fn float_to_word(f: f64) -> i64 {
    if !f.is_finite() {
        return 0;
    }
    let t = f.trunc();
    if (-TWO_POW_63..TWO_POW_63).contains(&t) {
        t as i64
    } else {
        t.rem_euclid(TWO_POW_32) as i64
    }
}

fn rune_char(v: i64) -> char {
    u32::try_from(v)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn narrow(f: f64, to_f32: bool) -> f64 {
    if to_f32 { f as f32 as f64 } else { f }
}

/// Applies a conversion plan to a constant.
///
/// Returns `None` when the result can only be known at run time.
pub fn fold(plan: &ConversionPlan, value: Folded) -> Option<Folded> {
    use ConversionPlan as P;
    match (plan, value) {
        (P::Assign | P::UnsafePointer, v) => Some(v),
        (P::DynamicFromInt64, Folded::Int(bits)) => Some(Folded::Int(bits as i32 as i64)),
        (P::Float32Narrow, Folded::Float(f)) => Some(Folded::Float(narrow(f, true))),
        (P::Float32Narrow, Folded::Int(v)) => Some(Folded::Float(narrow(v as f64, true))),
        (P::StringFromRunes, Folded::Runes(runes)) => Some(Folded::String(
            runes.iter().map(|r| rune_char(*r as i64)).collect(),
        )),
        (P::StringFromBytes, Folded::Bytes(bytes)) => {
            Some(Folded::String(String::from_utf8_lossy(&bytes).into_owned()))
        }
        (P::StringFromRune { .. }, Folded::Int(v)) => {
            Some(Folded::String(rune_char(v).to_string()))
        }
        (P::RunesFromString, Folded::String(s)) => {
            Some(Folded::Runes(s.chars().map(|c| c as i32).collect()))
        }
        (P::BytesFromString, Folded::String(s)) => Some(Folded::Bytes(s.into_bytes())),
        (P::ToInt { source, coercion }, v) => {
            let word = match (source, v) {
                (IntSource::Float, Folded::Float(f)) => float_to_word(f),
                (IntSource::Int64 | IntSource::Int, Folded::Int(v)) => v,
                (IntSource::Cast, Folded::Int(v)) => v,
                _ => return None,
            };
            Some(Folded::Int(coercion.apply(word)))
        }
        (P::Int64FromInt { unsigned }, Folded::Int(v)) => {
            Some(Folded::Int(if *unsigned { v as u32 as i64 } else { v }))
        }
        (P::Int64FromFloat { .. }, Folded::Float(f)) => Some(Folded::Int(float_to_bits(f))),
        (P::FloatFromInt64 { unsigned, narrow: n }, Folded::Int(bits)) => {
            let f = if *unsigned {
                bits as u64 as f64
            } else {
                bits as f64
            };
            Some(Folded::Float(narrow(f, *n)))
        }
        (P::FloatFromInt { unsigned, narrow: n }, Folded::Int(v)) => {
            let f = if *unsigned {
                v as u32 as f64
            } else {
                v as f64
            };
            Some(Folded::Float(narrow(f, *n)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::haxe::convert::IntCoercion;

    fn to_int(source: IntSource, coercion: IntCoercion) -> ConversionPlan {
        ConversionPlan::ToInt { source, coercion }
    }

    #[test]
    fn test_int32_through_int64_round_trip() {
        let widen = ConversionPlan::Int64FromInt { unsigned: false };
        let back = to_int(IntSource::Int64, IntCoercion::Int32);
        for v in [i32::MIN, i32::MIN + 1, -65536, -1, 0, 1, 123_456_789, i32::MAX] {
            let wide = fold(&widen, Folded::Int(v as i64));
            assert_eq!(wide, Some(Folded::Int(v as i64)));
            let narrow = wide.and_then(|w| fold(&back, w));
            assert_eq!(narrow, Some(Folded::Int(v as i64)), "value {}", v);
        }
    }

    #[test]
    fn test_float_to_int_truncates_then_wraps() {
        let plan = to_int(IntSource::Float, IntCoercion::Int32);
        assert_eq!(fold(&plan, Folded::Float(1.0e20)), Some(Folded::Int(1_661_992_960)));
        assert_eq!(fold(&plan, Folded::Float(-3.7)), Some(Folded::Int(-3)));
        assert_eq!(fold(&plan, Folded::Float(3.7)), Some(Folded::Int(3)));
        assert_eq!(fold(&plan, Folded::Float(f64::NAN)), Some(Folded::Int(0)));
        assert_eq!(
            fold(&plan, Folded::Float(2_147_483_648.0)),
            Some(Folded::Int(i32::MIN as i64))
        );

        let bytes = to_int(IntSource::Float, IntCoercion::Uint8);
        assert_eq!(fold(&bytes, Folded::Float(300.9)), Some(Folded::Int(44)));
    }

    #[test]
    fn test_integer_narrowing_wraps() {
        let plan = to_int(IntSource::Int, IntCoercion::Int8);
        assert_eq!(fold(&plan, Folded::Int(200)), Some(Folded::Int(-56)));
        let plan = to_int(IntSource::Int, IntCoercion::Uint16);
        assert_eq!(fold(&plan, Folded::Int(-1)), Some(Folded::Int(65535)));
        let plan = to_int(IntSource::Int, IntCoercion::Uint32);
        assert_eq!(fold(&plan, Folded::Int(-1)), Some(Folded::Int(4_294_967_295)));
    }

    #[test]
    fn test_int64_from_float() {
        let signed = ConversionPlan::Int64FromFloat { unsigned: false };
        let unsigned = ConversionPlan::Int64FromFloat { unsigned: true };
        assert_eq!(fold(&signed, Folded::Float(-3.9)), Some(Folded::Int(-3)));
        assert_eq!(
            fold(&unsigned, Folded::Float(9_223_372_036_854_775_808.0)),
            Some(Folded::Int(i64::MIN))
        );
        assert_eq!(fold(&signed, Folded::Float(f64::INFINITY)), Some(Folded::Int(0)));
    }

    #[test]
    fn test_float_from_integers() {
        let plan = ConversionPlan::FloatFromInt64 {
            unsigned: true,
            narrow: false,
        };
        assert_eq!(
            fold(&plan, Folded::Int(-1)),
            Some(Folded::Float(18_446_744_073_709_551_615u64 as f64))
        );
        let plan = ConversionPlan::FloatFromInt {
            unsigned: false,
            narrow: true,
        };
        assert_eq!(
            fold(&plan, Folded::Int(16_777_217)),
            Some(Folded::Float(16_777_216.0))
        );
    }

    #[test]
    fn test_float32_narrowing_rounds() {
        let folded = fold(&ConversionPlan::Float32Narrow, Folded::Float(0.1));
        assert_eq!(folded, Some(Folded::Float(0.1f32 as f64)));
        assert_ne!(folded, Some(Folded::Float(0.1)));
    }

    #[test]
    fn test_string_bytes_round_trip() {
        let text = "héllo, 世界 𝄞".to_string();
        let bytes = fold(&ConversionPlan::BytesFromString, Folded::String(text.clone()));
        match &bytes {
            Some(Folded::Bytes(b)) => {
                assert_eq!(b.len(), text.len());
                assert!(b.ends_with(&[0xF0, 0x9D, 0x84, 0x9E]));
            }
            other => panic!("expected bytes, got {:?}", other),
        }
        let back = bytes.and_then(|b| fold(&ConversionPlan::StringFromBytes, b));
        assert_eq!(back, Some(Folded::String(text)));
    }

    #[test]
    fn test_string_runes_round_trip() {
        let text = "a𝄞é".to_string();
        let runes = fold(&ConversionPlan::RunesFromString, Folded::String(text.clone()));
        assert_eq!(runes, Some(Folded::Runes(vec![0x61, 0x1D11E, 0xE9])));
        let back = runes.and_then(|r| fold(&ConversionPlan::StringFromRunes, r));
        assert_eq!(back, Some(Folded::String(text)));
    }

    #[test]
    fn test_invalid_rune_is_replacement_char() {
        let plan = ConversionPlan::StringFromRune { int64: false };
        let replacement = Some(Folded::String("\u{FFFD}".to_string()));
        assert_eq!(fold(&plan, Folded::Int(0x11_0000)), replacement);
        assert_eq!(fold(&plan, Folded::Int(0xD800)), replacement);
        assert_eq!(fold(&plan, Folded::Int(-1)), replacement);
        assert_eq!(
            fold(&plan, Folded::Int(0x1D11E)),
            Some(Folded::String("𝄞".to_string()))
        );

        // the low 32 bits would read as 'A'
        let wide = ConversionPlan::StringFromRune { int64: true };
        assert_eq!(fold(&wide, Folded::Int(0x1_0000_0041)), replacement);
        assert_eq!(
            fold(&wide, Folded::Int(0x41)),
            Some(Folded::String("A".to_string()))
        );
    }

    #[test]
    fn test_runtime_only_plans_do_not_fold() {
        assert_eq!(fold(&ConversionPlan::StringCast, Folded::Int(1)), None);
        assert_eq!(
            fold(&ConversionPlan::Cast("Int".to_string()), Folded::Int(1)),
            None
        );
        assert_eq!(fold(&ConversionPlan::BytesFromString, Folded::Int(1)), None);
    }
}
