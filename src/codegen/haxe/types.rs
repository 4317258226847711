//! Type lowering for the Haxe backend.
//!
//! Maps source types onto Haxe types, or onto the Haxe expression for their
//! zero value.
//!
//! # Type Mapping
//!
//! | Source type                         | Haxe type        | Zero value                     |
//! |-------------------------------------|------------------|--------------------------------|
//! | bool                                | `Bool`           | `false`                        |
//! | string                              | `String`         | `""`                           |
//! | float32, float64                    | `Float`          | `0.0`                          |
//! | complex64, complex128               | `Complex`        | `new Complex(0.0,0.0)`         |
//! | int, uint, (u)int8..32, rune        | `Int`            | `0`                            |
//! | int64, uint64                       | `GOint64`        | `GOint64.make(0,0)`            |
//! | uintptr, untyped int                | `Dynamic`        | `null`                         |
//! | unsafe.Pointer, *T                  | `Pointer`        | `null`                         |
//! | interface                           | `Interface`      | `null`                         |
//! | chan T                              | `Channel<T>`     | `new Channel<T>(1)`            |
//! | map                                 | `GOmap`          | `new GOmap(zeroK,zeroV)`       |
//! | slice                               | `Slice`          | empty slice over `Object.make(0)` |
//! | array, struct                       | `Object`         | `Object.make(size)`            |
//! | func                                | `Closure`        | `null`                         |
//!
//! Named types in a package whose last path element starts with `_` are
//! bound to native Haxe classes (`_js.XBrowser_Window` → `Browser.Window`).

use crate::codegen::EmitCx;
use crate::ssa::types::INCOMPLETE;
use crate::ssa::{BasicKind, Pos, Ty, TypeKind, TypeTable};

/// Native Haxe class a named type is bound to.
pub(crate) fn native_class(types: &TypeTable, ty: Ty) -> Option<String> {
    let named = types.as_named(ty)?;
    if !is_native_package(&named.package) {
        return None;
    }
    let mut chars = named.name.chars();
    chars.next()?;
    let rest = chars.as_str();
    if rest.is_empty() {
        return None;
    }
    Some(rest.replace('_', ".").replace("...", "."))
}

/// Packages whose last path element starts with `_` hold native bindings.
pub(crate) fn is_native_package(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| last.starts_with('_'))
}

fn pick(zero: bool, ty: &str, value: &str) -> String {
    if zero { value.to_string() } else { ty.to_string() }
}

/// Lowers `ty` to its Haxe type, or to its zero value when `zero` is set.
pub(crate) fn lang_type(cx: &mut EmitCx<'_>, ty: Ty, zero: bool, pos: &Pos) -> String {
    let types = cx.types;
    match types.kind(ty) {
        TypeKind::Basic(kind) => basic_type(cx, *kind, zero, pos),
        TypeKind::Named(named) => match native_class(types, ty) {
            Some(class) => pick(zero, &class, "null"),
            None => lang_type(cx, types.underlying(ty), zero, pos),
        },
        TypeKind::Interface(_) => pick(zero, "Interface", "null"),
        TypeKind::Pointer(_) => pick(zero, "Pointer", "null"),
        TypeKind::Signature(_) => pick(zero, "Closure", "null"),
        TypeKind::Chan { elem, .. } => {
            let elem = chan_elem_type(cx, *elem, pos);
            if zero {
                format!("new Channel<{}>(1)", elem)
            } else {
                format!("Channel<{}>", elem)
            }
        }
        TypeKind::Map { key, value } => {
            if zero {
                let k = component_zero(cx, *key, pos);
                let v = component_zero(cx, *value, pos);
                format!("new GOmap({},{})", k, v)
            } else {
                "GOmap".to_string()
            }
        }
        TypeKind::Slice(elem) => {
            if zero {
                let size = cx.sizes.sizeof(types, *elem);
                format!("new Slice(Pointer.make(Object.make(0)),0,0,0,{})", size)
            } else {
                "Slice".to_string()
            }
        }
        TypeKind::Array { .. } | TypeKind::Struct(_) => {
            if zero {
                format!("Object.make({})", cx.sizes.sizeof(types, ty))
            } else {
                "Object".to_string()
            }
        }
        TypeKind::Tuple(elems) => results_type(cx, elems, zero, pos),
        TypeKind::Opaque(name) if name.as_str() == INCOMPLETE => {
            cx.error(pos, "lang_type(): named type has no underlying type");
            "UNKNOWN_LANGTYPE".to_string()
        }
        TypeKind::Opaque(_) => pick(zero, "Dynamic", "null"),
    }
}

/// Lowering of a tuple or result list: nothing, the sole element, or an
/// anonymous record with fields `r0`, `r1`, ...
pub(crate) fn results_type(cx: &mut EmitCx<'_>, elems: &[Ty], zero: bool, pos: &Pos) -> String {
    match elems {
        [] => String::new(),
        [only] => lang_type(cx, *only, zero, pos),
        _ => {
            let fields: Vec<String> = elems
                .iter()
                .enumerate()
                .map(|(i, e)| format!("r{}:{}", i, lang_type(cx, *e, zero, pos)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    }
}

/// Element type parameter of a channel. Channels of channels use `Dynamic`,
/// which keeps self-referencing channel types finite.
fn chan_elem_type(cx: &mut EmitCx<'_>, elem: Ty, pos: &Pos) -> String {
    match cx.types.underlying_kind(elem) {
        TypeKind::Chan { .. } => "Dynamic".to_string(),
        _ => lang_type(cx, elem, false, pos),
    }
}

/// Zero value of a map key or value. Nested maps and channels start out
/// `null`, which keeps self-referencing map types finite.
fn component_zero(cx: &mut EmitCx<'_>, ty: Ty, pos: &Pos) -> String {
    match cx.types.underlying_kind(ty) {
        TypeKind::Map { .. } | TypeKind::Chan { .. } => "null".to_string(),
        _ => lang_type(cx, ty, true, pos),
    }
}

fn basic_type(cx: &mut EmitCx<'_>, kind: BasicKind, zero: bool, pos: &Pos) -> String {
    use BasicKind::*;
    match kind {
        Bool | UntypedBool => pick(zero, "Bool", "false"),
        String | UntypedString => pick(zero, "String", "\"\""),
        Float32 | Float64 | UntypedFloat => pick(zero, "Float", "0.0"),
        Complex64 | Complex128 | UntypedComplex => pick(zero, "Complex", "new Complex(0.0,0.0)"),
        Int | Int8 | Int16 | Int32 | Uint | Uint8 | Uint16 | Uint32 | UntypedRune => {
            pick(zero, "Int", "0")
        }
        Int64 | Uint64 => pick(zero, "GOint64", "GOint64.make(0,0)"),
        UntypedInt => {
            cx.warn(pos, "lang_type(): untyped int is ambiguous, Dynamic assumed");
            pick(zero, "Dynamic", "null")
        }
        UnsafePointer => {
            cx.warn(pos, "lang_type(): unsafe pointer");
            pick(zero, "Pointer", "null")
        }
        Uintptr => pick(zero, "Dynamic", "null"),
        UntypedNil => {
            cx.warn(pos, "lang_type(): untyped nil, Dynamic assumed");
            pick(zero, "Dynamic", "null")
        }
    }
}

/// Suffix of the typed `load`/`store`/`get` runtime accessors.
///
/// Returns `None` for values stored as plain references.
pub(crate) fn access_suffix(types: &TypeTable, ty: Ty) -> Option<&'static str> {
    use BasicKind::*;
    let kind = types.basic_kind(ty)?;
    Some(match kind {
        Bool | UntypedBool => "bool",
        Int8 => "int8",
        Int16 => "int16",
        Int | Int32 | UntypedRune => "int32",
        Int64 => "int64",
        Uint8 => "uint8",
        Uint16 => "uint16",
        Uint | Uint32 => "uint32",
        Uint64 => "uint64",
        Uintptr => "uintptr",
        Float32 => "float32",
        Float64 | UntypedFloat => "float64",
        Complex64 => "complex64",
        Complex128 | UntypedComplex => "complex128",
        String | UntypedString => "string",
        UnsafePointer | UntypedInt | UntypedNil => return None,
    })
}

/// Renders a typed runtime accessor call such as `load_int32()`,
/// `store_object(24,v)` or `get(8)`.
pub(crate) fn accessor(cx: &EmitCx<'_>, method: &str, ty: Ty, args: &[String]) -> String {
    let types = cx.types;
    if matches!(
        types.underlying_kind(ty),
        TypeKind::Array { .. } | TypeKind::Struct(_)
    ) {
        let mut all = vec![cx.sizes.sizeof(types, ty).to_string()];
        all.extend(args.iter().cloned());
        return format!("{}_object({})", method, all.join(","));
    }
    match access_suffix(types, ty) {
        Some(suffix) => format!("{}_{}({})", method, suffix, args.join(",")),
        None => format!("{}({})", method, args.join(",")),
    }
}
