//! Identifier synthesis for the Haxe backend.
//!
//! Source names may contain characters Haxe identifiers cannot (`.`, `/`,
//! `*`, non-ASCII letters). [`make_id`] maps any string to a valid, unique
//! identifier fragment: ASCII letters and digits are kept, `_` is doubled,
//! and everything else becomes `_<hex code point>_`.

use crate::ssa::{FuncRef, TypeTable};

/// Maps an arbitrary string to an identifier fragment.
pub(crate) fn make_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '_' => out.push_str("__"),
            _ => out.push_str(&format!("_{:x}_", c as u32)),
        }
    }
    out
}

/// Joins the two halves of a [`lang_name`]. After a `_`, [`make_id`] only
/// ever writes another `_` or lowercase hex digits closed by `_`, so `_do`
/// can never start a fragment and the split point stays unambiguous.
const NAME_SEPARATOR: &str = "_dot_";

/// Identifier for object `object` of package (or receiver type) `package`.
pub(crate) fn lang_name(package: &str, object: &str) -> String {
    format!("{}{}{}", make_id(package), NAME_SEPARATOR, make_id(object))
}

pub(crate) fn register_name(name: &str) -> String {
    format!("_{}", make_id(name))
}

/// Temporary used while resolving several phis on one edge.
pub(crate) fn phi_temp_name(name: &str) -> String {
    format!("_p{}", register_name(name))
}

pub(crate) fn param_name(name: &str) -> String {
    format!("p_{}", make_id(name))
}

/// Class implementing a function or method.
///
/// Methods are named after the receiver's type string, so the wrapper for
/// `(*main.T).M` is distinct from the one for `(main.T).M`.
pub(crate) fn func_class(types: &TypeTable, func: &FuncRef) -> String {
    match func.receiver {
        Some(recv) => format!("Go_{}", lang_name(&types.type_string(recv), &func.name)),
        None => format!("Go_{}", lang_name(&func.package, &func.name)),
    }
}

/// Class holding a package-level variable or constant.
pub(crate) fn global_class(package: &str, name: &str) -> String {
    format!("Go_{}", lang_name(package, name))
}

/// Output unit for a package.
pub(crate) fn package_unit(package: &str) -> String {
    format!("Go_{}", make_id(package))
}

/// Escapes text for a double-quoted Haxe string literal.
pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02X}", c as u32))
            }
            c if c.is_ascii() => out.push(c),
            c => out.push_str(&format!("\\u{{{:X}}}", c as u32)),
        }
    }
    out
}

pub(crate) fn string_literal(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{BasicKind, TypeTable};

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("main"), "main");
        assert_eq!(make_id("unicode/utf8"), "unicode_2f_utf8");
        assert_eq!(make_id("a_b"), "a__b");
        assert_eq!(make_id("*main.T"), "_2a_main_2e_T");
        assert_eq!(make_id("é"), "_e9_");
    }

    #[test]
    fn test_lang_name() {
        assert_eq!(lang_name("main", "main"), "main_dot_main");
        assert_ne!(lang_name("a", "_b"), lang_name("a_", "b"));
        assert_ne!(lang_name("a", "b_c"), lang_name("a_b", "c"));
        assert_ne!(lang_name("x", "\u{d}o_t"), lang_name("x_", "t"));
        assert_eq!(global_class("main", "count"), "Go_main_dot_count");
        assert_eq!(package_unit("unicode/utf8"), "Go_unicode_2f_utf8");
        assert_eq!(register_name("t3"), "_t3");
        assert_eq!(phi_temp_name("t3"), "_p_t3");
        assert_eq!(param_name("x"), "p_x");
    }

    #[test]
    fn test_func_class() {
        let mut t = TypeTable::new();
        let sig = t.signature(vec![], vec![], false);
        let named = t.named("main", "T");
        let int = t.basic(BasicKind::Int);
        t.set_underlying(named, int);
        let ptr = t.pointer(named);

        let plain = FuncRef {
            package: "main".to_string(),
            name: "run".to_string(),
            receiver: None,
            sig,
        };
        let method = FuncRef {
            receiver: Some(ptr),
            name: "Get".to_string(),
            ..plain.clone()
        };
        assert_eq!(func_class(&t, &plain), "Go_main_dot_run");
        assert_eq!(func_class(&t, &method), "Go__2a_main_2e_T_dot_Get");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(string_literal("a\"b"), "\"a\\\"b\"");
        assert_eq!(escape_string("x\\y\n"), "x\\\\y\\n");
        assert_eq!(escape_string("\u{1}"), "\\x01");
        assert_eq!(escape_string("日"), "\\u{65E5}");
        assert_eq!(escape_string("𝄞"), "\\u{1D11E}");
    }
}
