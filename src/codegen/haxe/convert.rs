//! Value conversions for the Haxe backend.
//!
//! A conversion is first classified into a [`ConversionPlan`] from the
//! lowered source and destination types, then either rendered as Haxe
//! statements or, for constant operands, folded at compile time.
//!
//! # Dispatch
//!
//! | Destination | Source                | Emitted                                   |
//! |-------------|-----------------------|-------------------------------------------|
//! | `Dynamic`   | `GOint64`             | `GOint64.toInt(x)`                        |
//! | `String`    | `[]rune` / `[]byte`   | runtime rune decoding / `Force.toRawString` |
//! | `String`    | `Int` / `GOint64`     | one code point via `RRune2RRaw`           |
//! | `[]rune`    | `String`              | `UUTTFF8toRRunes(Force.toUTF8slice(x))`   |
//! | `[]byte`    | `String`              | `Force.toUTF8slice(x)`                    |
//! | `Int`       | `GOint64`/`Float`/... | truncate, then width/sign coercion        |
//! | `GOint64`   | `Int` / `Float`       | `ofInt`, `make(0,x)`, `ofFloat`, `ofUFloat` |
//! | `Float`     | `GOint64` / `Int`     | `toFloat`, `toUFloat`, then float32 narrowing |
//! | other       | any                   | `cast(x,T)`                               |

use crate::codegen::EmitCx;
use crate::ssa::{BasicKind, Operand, Pos, Ty, TypeKind};

use super::const_eval::{Folded, fold};
use super::types::lang_type;
use super::value::value;

/// Width and signedness coercion applied after every conversion to `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCoercion {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    /// Stored as its 32-bit pattern.
    Uint32,
}

impl IntCoercion {
    pub fn for_kind(kind: BasicKind) -> Option<IntCoercion> {
        use BasicKind::*;
        Some(match kind {
            Int8 => IntCoercion::Int8,
            Int16 => IntCoercion::Int16,
            Int | Int32 | UntypedRune => IntCoercion::Int32,
            Uint8 => IntCoercion::Uint8,
            Uint16 => IntCoercion::Uint16,
            Uint | Uint32 => IntCoercion::Uint32,
            _ => return None,
        })
    }

    /// Runtime function performing the coercion.
    pub fn runtime_fn(self) -> &'static str {
        match self {
            IntCoercion::Int8 => "Force.toInt8",
            IntCoercion::Int16 => "Force.toInt16",
            IntCoercion::Int32 => "Force.toInt32",
            IntCoercion::Uint8 => "Force.toUint8",
            IntCoercion::Uint16 => "Force.toUint16",
            IntCoercion::Uint32 => "Force.toUint32",
        }
    }

    /// The coercion on a compile-time value.
    pub fn apply(self, v: i64) -> i64 {
        match self {
            IntCoercion::Int8 => v as i8 as i64,
            IntCoercion::Int16 => v as i16 as i64,
            IntCoercion::Int32 => v as i32 as i64,
            IntCoercion::Uint8 => v as u8 as i64,
            IntCoercion::Uint16 => v as u16 as i64,
            IntCoercion::Uint32 => v as u32 as i64,
        }
    }

    /// Range of values the coerced type holds.
    fn range(self) -> (i64, i64) {
        match self {
            IntCoercion::Int8 => (i8::MIN as i64, i8::MAX as i64),
            IntCoercion::Int16 => (i16::MIN as i64, i16::MAX as i64),
            IntCoercion::Int32 => (i32::MIN as i64, i32::MAX as i64),
            IntCoercion::Uint8 => (0, u8::MAX as i64),
            IntCoercion::Uint16 => (0, u16::MAX as i64),
            IntCoercion::Uint32 => (0, u32::MAX as i64),
        }
    }

    /// Returns true if every value of `other` is a value of `self`.
    fn contains(self, other: IntCoercion) -> bool {
        let (lo, hi) = self.range();
        let (olo, ohi) = other.range();
        lo <= olo && ohi <= hi
    }
}

/// How the native integer is obtained before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSource {
    /// `GOint64.toInt(x)`
    Int64,
    /// Truncation toward zero.
    Float,
    /// Already a native `Int` of another width.
    Int,
    /// `cast(x,Int)`
    Cast,
}

/// Classification of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionPlan {
    Assign,
    /// Plain assignment involving an unsafe pointer; reported as a warning.
    UnsafePointer,
    Float32Narrow,
    DynamicFromInt64,
    StringFromRunes,
    StringFromBytes,
    /// A single code point, held in a `GOint64` when `int64` is set.
    StringFromRune { int64: bool },
    StringCast,
    RunesFromString,
    BytesFromString,
    ToInt { source: IntSource, coercion: IntCoercion },
    Int64FromInt { unsigned: bool },
    /// Signedness of the destination picks the runtime rule.
    Int64FromFloat { unsigned: bool },
    /// Signedness of the source picks the runtime rule.
    FloatFromInt64 { unsigned: bool, narrow: bool },
    FloatFromInt { unsigned: bool, narrow: bool },
    Cast(String),
    Invalid(String),
}

fn is_unsigned(cx: &EmitCx<'_>, ty: Ty) -> bool {
    cx.types.basic_kind(ty).is_some_and(BasicKind::is_unsigned)
}

fn is_kind(cx: &EmitCx<'_>, ty: Ty, kind: BasicKind) -> bool {
    cx.types.basic_kind(ty) == Some(kind)
}

/// Basic kind of a slice's element, if the type is a slice of a basic type.
fn slice_elem_kind(cx: &EmitCx<'_>, ty: Ty) -> Option<BasicKind> {
    match cx.types.underlying_kind(ty) {
        TypeKind::Slice(elem) => cx.types.basic_kind(*elem),
        _ => None,
    }
}

/// Classifies the conversion of a `src_ty` value to `dest_ty`, whose Haxe
/// type is `dest_lang`.
pub fn plan_conversion(
    cx: &mut EmitCx<'_>,
    dest_lang: &str,
    dest_ty: Ty,
    src_ty: Ty,
    pos: &Pos,
) -> ConversionPlan {
    if is_kind(cx, src_ty, BasicKind::UnsafePointer) || is_kind(cx, dest_ty, BasicKind::UnsafePointer)
    {
        return ConversionPlan::UnsafePointer;
    }

    let src_lang = lang_type(cx, src_ty, false, pos);
    if src_lang == dest_lang && dest_lang != "Float" && dest_lang != "Int" {
        return ConversionPlan::Assign;
    }

    match dest_lang {
        "Dynamic" => match src_lang.as_str() {
            "GOint64" => ConversionPlan::DynamicFromInt64,
            _ => ConversionPlan::Assign,
        },
        "String" => match src_lang.as_str() {
            "Slice" => match slice_elem_kind(cx, src_ty) {
                Some(BasicKind::Int32) => ConversionPlan::StringFromRunes,
                Some(BasicKind::Uint8) => ConversionPlan::StringFromBytes,
                _ => ConversionPlan::Invalid(format!(
                    "unexpected slice type {} to convert to string",
                    cx.types.type_string(src_ty)
                )),
            },
            "Int" => ConversionPlan::StringFromRune { int64: false },
            "GOint64" => ConversionPlan::StringFromRune { int64: true },
            "Dynamic" => ConversionPlan::StringCast,
            other => ConversionPlan::Invalid(format!(
                "unexpected type {} to convert to String",
                other
            )),
        },
        "Slice" => {
            if src_lang != "String" {
                return ConversionPlan::Invalid(format!(
                    "unexpected type {} to convert to []rune or []byte",
                    src_lang
                ));
            }
            match slice_elem_kind(cx, dest_ty) {
                Some(BasicKind::Int32) => ConversionPlan::RunesFromString,
                Some(BasicKind::Uint8) => ConversionPlan::BytesFromString,
                _ => ConversionPlan::Invalid(format!(
                    "unexpected slice element to convert to {}",
                    cx.types.type_string(dest_ty)
                )),
            }
        }
        "Int" => {
            let Some(coercion) = cx.types.basic_kind(dest_ty).and_then(IntCoercion::for_kind)
            else {
                return ConversionPlan::Invalid(format!(
                    "no integer coercion for {}",
                    cx.types.type_string(dest_ty)
                ));
            };
            let source = match src_lang.as_str() {
                "GOint64" => IntSource::Int64,
                "Float" => IntSource::Float,
                "Int" => {
                    let from = cx.types.basic_kind(src_ty).and_then(IntCoercion::for_kind);
                    if from.is_some_and(|from| coercion.contains(from)) {
                        return ConversionPlan::Assign;
                    }
                    IntSource::Int
                }
                _ => IntSource::Cast,
            };
            ConversionPlan::ToInt { source, coercion }
        }
        "GOint64" => match src_lang.as_str() {
            "Int" => ConversionPlan::Int64FromInt {
                unsigned: is_unsigned(cx, src_ty),
            },
            "Float" => ConversionPlan::Int64FromFloat {
                unsigned: is_unsigned(cx, dest_ty),
            },
            "Dynamic" => ConversionPlan::Assign,
            _ => ConversionPlan::Cast(dest_lang.to_string()),
        },
        "Float" => {
            let narrow = is_kind(cx, dest_ty, BasicKind::Float32);
            match src_lang.as_str() {
                "GOint64" => ConversionPlan::FloatFromInt64 {
                    unsigned: is_unsigned(cx, src_ty),
                    narrow,
                },
                "Int" => ConversionPlan::FloatFromInt {
                    unsigned: is_unsigned(cx, src_ty),
                    narrow,
                },
                "Float" if narrow && !is_kind(cx, src_ty, BasicKind::Float32) => {
                    ConversionPlan::Float32Narrow
                }
                "Float" => ConversionPlan::Assign,
                _ => ConversionPlan::Cast(dest_lang.to_string()),
            }
        }
        _ => {
            if src_lang == "Object" {
                ConversionPlan::Invalid(format!(
                    "no way to convert to {} from {}",
                    dest_lang,
                    cx.types.type_string(src_ty)
                ))
            } else {
                ConversionPlan::Cast(dest_lang.to_string())
            }
        }
    }
}

/// Loop materialising a string from the rune slice returned by a runtime
/// decoding entry point.
fn runes_to_string(reg: &str, call: &str) -> String {
    format!(
        "{{var _r:Slice={};{}=\"\";for(_i in 0..._r.len()){}+=String.fromCharCode(_r.itemAddr(_i).load_int32());}};",
        call, reg, reg
    )
}

fn narrowed(expr: String, narrow: bool) -> String {
    if narrow {
        format!("Force.toFloat32({})", expr)
    } else {
        expr
    }
}

/// Renders a plan as Haxe statements assigning `reg` from expression `x`.
pub fn render(plan: &ConversionPlan, reg: &str, x: &str) -> String {
    use ConversionPlan as P;
    let rhs = match plan {
        P::Assign | P::UnsafePointer => x.to_string(),
        P::Float32Narrow => format!("Force.toFloat32({})", x),
        P::DynamicFromInt64 => format!("GOint64.toInt({})", x),
        P::StringFromRunes => {
            return runes_to_string(
                reg,
                &format!("Go_haxegoruntime_RRunes2RRaw.callFromRT({})", x),
            );
        }
        P::StringFromBytes => format!("Force.toRawString({})", x),
        P::StringFromRune { int64 } => {
            // a 64-bit value past U+10FFFF must not narrow into a valid rune
            let arg = if *int64 {
                format!(
                    "(GOint64.ucompare({},GOint64.ofInt(1114111))>0?65533:GOint64.toInt({}))",
                    x, x
                )
            } else {
                x.to_string()
            };
            return runes_to_string(
                reg,
                &format!("Go_haxegoruntime_RRune2RRaw.callFromRT({})", arg),
            );
        }
        P::StringCast => format!("cast({},String)", x),
        P::RunesFromString => format!(
            "Go_haxegoruntime_UUTTFF8toRRunes.callFromRT(Force.toUTF8slice({}))",
            x
        ),
        P::BytesFromString => format!("Force.toUTF8slice({})", x),
        P::ToInt { source, coercion } => {
            let native = match source {
                IntSource::Int64 => format!("GOint64.toInt({})", x),
                IntSource::Float => {
                    format!("{{var _f:Float={};_f>=0?Math.floor(_f):Math.ceil(_f);}}", x)
                }
                IntSource::Int => x.to_string(),
                IntSource::Cast => format!("cast({},Int)", x),
            };
            format!("{}({})", coercion.runtime_fn(), native)
        }
        P::Int64FromInt { unsigned: true } => format!("GOint64.make(0,{})", x),
        P::Int64FromInt { unsigned: false } => format!("GOint64.ofInt({})", x),
        P::Int64FromFloat { unsigned: true } => format!("GOint64.ofUFloat({})", x),
        P::Int64FromFloat { unsigned: false } => format!("GOint64.ofFloat({})", x),
        P::FloatFromInt64 { unsigned, narrow } => {
            let f = if *unsigned { "toUFloat" } else { "toFloat" };
            narrowed(format!("GOint64.{}({})", f, x), *narrow)
        }
        P::FloatFromInt { unsigned, narrow } => {
            let widened = if *unsigned {
                format!("GOint64.toUFloat(GOint64.make(0,{}))", x)
            } else {
                x.to_string()
            };
            narrowed(widened, *narrow)
        }
        P::Cast(target) => format!("cast({},{})", x, target),
        P::Invalid(_) => "INVALID_CONVERSION".to_string(),
    };
    format!("{}={};", reg, rhs)
}

/// Emits the conversion of `src` into register `reg` of type `dest_ty`.
///
/// Constant operands are folded to a literal when the result is known at
/// compile time.
pub(crate) fn convert(
    cx: &mut EmitCx<'_>,
    reg: &str,
    dest_lang: &str,
    dest_ty: Ty,
    src: &Operand,
    pos: &Pos,
) -> String {
    let plan = plan_conversion(cx, dest_lang, dest_ty, src.ty(), pos);
    match &plan {
        ConversionPlan::Invalid(reason) => {
            cx.error(pos, format!("convert(): {}", reason));
            return render(&plan, reg, "");
        }
        ConversionPlan::UnsafePointer => {
            cx.warn(pos, "convert(): unsafe pointer conversion");
        }
        _ => {}
    }

    if let Some(folded) = src
        .as_const()
        .and_then(Folded::from_const)
        .and_then(|c| fold(&plan, c))
        && let Some(literal) = folded.literal(cx, dest_ty, pos)
    {
        log::trace!("folded {:?} to {}", plan, literal);
        return format!("{}={};", reg, literal);
    }

    let x = value(cx, src, pos);
    render(&plan, reg, &x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::registry::TypeRegistry;
    use crate::ssa::{ConstValue, Register, TypeTable};

    struct Fixture {
        types: TypeTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                types: TypeTable::new(),
            }
        }

        fn basic(&mut self, kind: BasicKind) -> Ty {
            self.types.basic(kind)
        }

        /// Converts register `t0` of `src` to `dest`.
        fn convert(&self, dest: Ty, src: Ty) -> (String, Diagnostics) {
            self.convert_operand(dest, &Operand::from(Register::new("t0", src)))
        }

        fn convert_operand(&self, dest: Ty, src: &Operand) -> (String, Diagnostics) {
            let mut reg = TypeRegistry::new();
            let mut diags = Diagnostics::new("haxe");
            let text = {
                let mut cx = EmitCx::new(&self.types, &mut reg, &mut diags);
                let pos = Pos::default();
                let dest_lang = lang_type(&mut cx, dest, false, &pos);
                convert(&mut cx, "_t1", &dest_lang, dest, src, &pos)
            };
            (text, diags)
        }
    }

    #[test]
    fn test_integer_conversions() {
        let mut f = Fixture::new();
        let int = f.basic(BasicKind::Int);
        let i8_ = f.basic(BasicKind::Int8);
        let u8_ = f.basic(BasicKind::Uint8);
        let i64_ = f.basic(BasicKind::Int64);
        let u64_ = f.basic(BasicKind::Uint64);
        let u32_ = f.basic(BasicKind::Uint32);

        assert_eq!(f.convert(int, i8_).0, "_t1=_t0;");
        assert_eq!(f.convert(i8_, int).0, "_t1=Force.toInt8(_t0);");
        assert_eq!(f.convert(int, u32_).0, "_t1=Force.toInt32(_t0);");
        assert_eq!(f.convert(u8_, i64_).0, "_t1=Force.toUint8(GOint64.toInt(_t0));");
        assert_eq!(f.convert(i64_, int).0, "_t1=GOint64.ofInt(_t0);");
        assert_eq!(f.convert(u64_, u32_).0, "_t1=GOint64.make(0,_t0);");
        assert_eq!(f.convert(u64_, i64_).0, "_t1=_t0;");
    }

    #[test]
    fn test_float_conversions() {
        let mut f = Fixture::new();
        let int = f.basic(BasicKind::Int);
        let u32_ = f.basic(BasicKind::Uint32);
        let i64_ = f.basic(BasicKind::Int64);
        let u64_ = f.basic(BasicKind::Uint64);
        let f32_ = f.basic(BasicKind::Float32);
        let f64_ = f.basic(BasicKind::Float64);

        assert_eq!(
            f.convert(int, f64_).0,
            "_t1=Force.toInt32({var _f:Float=_t0;_f>=0?Math.floor(_f):Math.ceil(_f);});"
        );
        assert_eq!(f.convert(f32_, f64_).0, "_t1=Force.toFloat32(_t0);");
        assert_eq!(f.convert(f64_, f32_).0, "_t1=_t0;");
        assert_eq!(f.convert(f64_, int).0, "_t1=_t0;");
        assert_eq!(
            f.convert(f64_, u32_).0,
            "_t1=GOint64.toUFloat(GOint64.make(0,_t0));"
        );
        assert_eq!(f.convert(f32_, int).0, "_t1=Force.toFloat32(_t0);");
        assert_eq!(f.convert(f64_, u64_).0, "_t1=GOint64.toUFloat(_t0);");
        assert_eq!(f.convert(f64_, i64_).0, "_t1=GOint64.toFloat(_t0);");
        assert_eq!(f.convert(u64_, f64_).0, "_t1=GOint64.ofUFloat(_t0);");
        assert_eq!(f.convert(i64_, f64_).0, "_t1=GOint64.ofFloat(_t0);");
    }

    #[test]
    fn test_string_conversions() {
        let mut f = Fixture::new();
        let s = f.basic(BasicKind::String);
        let int = f.basic(BasicKind::Int);
        let i64_ = f.basic(BasicKind::Int64);
        let rune = f.basic(BasicKind::Int32);
        let byte = f.basic(BasicKind::Uint8);
        let runes = f.types.slice(rune);
        let bytes = f.types.slice(byte);

        assert_eq!(f.convert(s, bytes).0, "_t1=Force.toRawString(_t0);");
        assert_eq!(f.convert(bytes, s).0, "_t1=Force.toUTF8slice(_t0);");
        assert_eq!(
            f.convert(runes, s).0,
            "_t1=Go_haxegoruntime_UUTTFF8toRRunes.callFromRT(Force.toUTF8slice(_t0));"
        );
        assert_eq!(
            f.convert(s, runes).0,
            "{var _r:Slice=Go_haxegoruntime_RRunes2RRaw.callFromRT(_t0);_t1=\"\";\
             for(_i in 0..._r.len())_t1+=String.fromCharCode(_r.itemAddr(_i).load_int32());};"
        );
        assert!(f.convert(s, int).0.contains("Go_haxegoruntime_RRune2RRaw.callFromRT(_t0)"));
        assert!(
            f.convert(s, i64_)
                .0
                .contains(
                    "RRune2RRaw.callFromRT((GOint64.ucompare(_t0,GOint64.ofInt(1114111))>0?65533:GOint64.toInt(_t0)))"
                )
        );
    }

    #[test]
    fn test_invalid_conversion_is_error() {
        let mut f = Fixture::new();
        let s = f.basic(BasicKind::String);
        let int = f.basic(BasicKind::Int);
        let st = f.types.struct_type(vec![crate::ssa::Field::new("a", int)]);
        let ints = f.types.slice(int);

        let (text, diags) = f.convert(s, st);
        assert_eq!(text, "_t1=INVALID_CONVERSION;");
        assert_eq!(diags.error_count(), 1);

        let (text, diags) = f.convert(ints, int);
        assert_eq!(text, "_t1=INVALID_CONVERSION;");
        assert!(diags.has_errors());
    }

    #[test]
    fn test_unsafe_pointer_warns() {
        let mut f = Fixture::new();
        let up = f.basic(BasicKind::UnsafePointer);
        let int = f.basic(BasicKind::Int);
        let ptr = f.types.pointer(int);
        let (text, diags) = f.convert(ptr, up);
        assert_eq!(text, "_t1=_t0;");
        assert!(diags.warning_count() >= 1);
        assert!(!diags.has_errors());
    }

    #[test]
    fn test_constants_are_folded() {
        let mut f = Fixture::new();
        let int = f.basic(BasicKind::Int);
        let i64_ = f.basic(BasicKind::Int64);
        let f64_ = f.basic(BasicKind::Float64);
        let f32_ = f.basic(BasicKind::Float32);
        let s = f.basic(BasicKind::String);
        let byte = f.basic(BasicKind::Uint8);
        let bytes = f.types.slice(byte);

        let c = |v, ty| Operand::constant(v, ty);
        assert_eq!(
            f.convert_operand(int, &c(ConstValue::Float(1.0e20), f64_)).0,
            "_t1=1661992960;"
        );
        assert_eq!(
            f.convert_operand(i64_, &c(ConstValue::Int(-1), int)).0,
            "_t1=GOint64.make(-1,-1);"
        );
        assert_eq!(
            f.convert_operand(f32_, &c(ConstValue::Float(0.5), f64_)).0,
            "_t1=0.5;"
        );
        assert_eq!(
            f.convert_operand(bytes, &c(ConstValue::String("hé".to_string()), s)).0,
            "_t1=Slice.fromBytes([104,195,169]);"
        );
        assert_eq!(
            f.convert_operand(s, &c(ConstValue::Int(0x41), int)).0,
            "_t1=\"A\";"
        );
    }
}
