//! Interface values and dynamic types for the Haxe backend.
//!
//! An interface value is a runtime `Interface` object pairing a value with
//! the registry ID of its dynamic type. Boxing registers the dynamic type and
//! requests its method set, so the runtime metadata can dispatch calls on it.

use crate::codegen::EmitCx;
use crate::ssa::{BasicKind, Operand, Pos, Ty, TypeKind};

use super::names::func_class;
use super::types::{lang_type, native_class};
use super::value::value;

/// `reg = new Interface(id, v)`.
pub(crate) fn make_interface(
    cx: &mut EmitCx<'_>,
    reg: &str,
    dest_ty: Ty,
    src: &Operand,
    pos: &Pos,
) -> String {
    let id = cx.registry.request_method_set(src.ty());
    let boxed = format!("new Interface({},{})", id, value(cx, src, pos));
    if native_class(cx.types, dest_ty).is_some() {
        format!("{}=Force.toHaxeParam({});", reg, boxed)
    } else {
        format!("{}={};", reg, boxed)
    }
}

/// Re-boxes an interface value under another interface type. The change is
/// tagged with the source value's static type, not its underlying type;
/// `dest_ty` is only registered so the metadata can answer checks against it.
pub(crate) fn change_interface(
    cx: &mut EmitCx<'_>,
    reg: &str,
    dest_ty: Ty,
    src: &Operand,
    pos: &Pos,
) -> String {
    cx.registry.log_type_use(dest_ty);
    let id = cx.registry.log_type_use(src.ty());
    format!("{}=Interface.change({},{});", reg, id, value(cx, src, pos))
}

/// A representation-preserving type change.
pub(crate) fn change_type(
    cx: &mut EmitCx<'_>,
    reg: &str,
    dest_ty: Ty,
    src: &Operand,
    pos: &Pos,
) -> String {
    if let Operand::Function(func) = src {
        return format!("{}=new Closure({}.call,[]);", reg, func_class(cx.types, func));
    }

    let types = cx.types;
    if native_class(types, dest_ty).is_some() {
        let v = value(cx, src, pos);
        return match types.underlying_kind(src.ty()) {
            TypeKind::Interface(_) => format!("{}={}.val;", reg, v),
            _ => format!("{}=cast {};", reg, v),
        };
    }

    if types.basic_kind(src.ty()) == Some(BasicKind::UnsafePointer) {
        cx.warn(
            pos,
            format!(
                "change_type(): unsafe pointer to {} yields a fresh zero value",
                types.type_string(dest_ty)
            ),
        );
        let zero = lang_type(cx, dest_ty, true, pos);
        return format!("{}={};", reg, zero);
    }

    format!("{}={};", reg, value(cx, src, pos))
}

/// Type assertion of interface value `src` to `asserted`.
///
/// The comma-ok form yields `{r0:value,r1:ok}`; the plain form aborts
/// through the runtime panic path. Nothing is emitted without a register.
pub(crate) fn type_assert(
    cx: &mut EmitCx<'_>,
    reg: Option<&str>,
    src: &Operand,
    asserted: Ty,
    comma_ok: bool,
    pos: &Pos,
) -> String {
    let Some(reg) = reg else {
        return String::new();
    };
    let id = cx.registry.log_type_use(asserted);
    let method = if comma_ok { "assertOk" } else { "assert" };
    format!("{}=Interface.{}({},{});", reg, method, id, value(cx, src, pos))
}

/// Dynamic call of `method` on the interface value `recv`.
pub(crate) fn invoke(recv: &str, method: &str, args: &[String]) -> String {
    format!("Interface.invoke({},\"{}\",[{}])", recv, method, args.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::registry::{TypeId, TypeRegistry};
    use crate::ssa::{FuncRef, Register, TypeTable};

    #[test]
    fn test_make_interface_registers_method_set() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let any = t.interface(vec![]);
        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let text = {
            let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
            let src = Operand::from(Register::new("t0", int));
            make_interface(&mut cx, "_t1", any, &src, &Pos::default())
        };
        assert_eq!(text, "_t1=new Interface(1,_t0);");
        assert_eq!(reg.id(int), Some(TypeId(1)));
        assert!(reg.method_set_requested(TypeId(1)));
    }

    #[test]
    fn test_make_interface_native_destination() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let any = t.interface(vec![]);
        let dyn_ty = t.named("github.com/x/_haxe", "XDynamic");
        t.set_underlying(dyn_ty, any);
        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
        let src = Operand::from(Register::new("t0", int));
        assert_eq!(
            make_interface(&mut cx, "_t1", dyn_ty, &src, &Pos::default()),
            "_t1=Force.toHaxeParam(new Interface(1,_t0));"
        );
    }

    #[test]
    fn test_change_interface_uses_source_id() {
        let mut t = TypeTable::new();
        let any = t.interface(vec![]);
        let sig = t.signature(vec![], vec![], false);
        let closer = t.interface(vec![crate::ssa::InterfaceMethod {
            name: "Close".to_string(),
            sig,
        }]);
        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        // the destination is already known, so the source gets ID 2
        reg.log_type_use(any);
        let text = {
            let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
            let src = Operand::from(Register::new("t0", closer));
            change_interface(&mut cx, "_t1", any, &src, &Pos::default())
        };
        assert_eq!(text, "_t1=Interface.change(2,_t0);");
        assert_eq!(reg.id(closer), Some(TypeId(2)));
        assert_eq!(reg.len(), 2);

        // a named interface keeps its own ID rather than its underlying one
        let named = t.named("main", "Closer");
        t.set_underlying(named, closer);
        let mut reg = TypeRegistry::new();
        reg.log_type_use(closer);
        let text = {
            let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
            let src = Operand::from(Register::new("t0", named));
            change_interface(&mut cx, "_t1", any, &src, &Pos::default())
        };
        assert_eq!(text, "_t1=Interface.change(3,_t0);");
        assert_eq!(reg.id(named), Some(TypeId(3)));
    }

    #[test]
    fn test_change_type() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let up = t.basic(BasicKind::UnsafePointer);
        let point = t.named("main", "Point");
        let st = t.struct_type(vec![crate::ssa::Field::new("x", int)]);
        t.set_underlying(point, st);
        let ptr = t.pointer(point);
        let my = t.named("main", "MyInt");
        t.set_underlying(my, int);
        let sig = t.signature(vec![], vec![], false);

        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        {
            let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
            let pos = Pos::default();
            let plain = Operand::from(Register::new("t0", int));
            assert_eq!(change_type(&mut cx, "_t1", my, &plain, &pos), "_t1=_t0;");

            let f = Operand::Function(FuncRef {
                package: "main".to_string(),
                name: "run".to_string(),
                receiver: None,
                sig,
            });
            assert_eq!(
                change_type(&mut cx, "_t1", sig, &f, &pos),
                "_t1=new Closure(Go_main_dot_run.call,[]);"
            );

            let raw = Operand::from(Register::new("t0", up));
            assert_eq!(change_type(&mut cx, "_t1", point, &raw, &pos), "_t1=Object.make(4);");
            assert_eq!(change_type(&mut cx, "_t1", ptr, &raw, &pos), "_t1=null;");
        }
        assert_eq!(diags.warning_count(), 2);
    }

    #[test]
    fn test_type_assert_forms() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let any = t.interface(vec![]);
        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
        let pos = Pos::default();
        let src = Operand::from(Register::new("t0", any));
        assert_eq!(
            type_assert(&mut cx, Some("_t1"), &src, int, true, &pos),
            "_t1=Interface.assertOk(1,_t0);"
        );
        assert_eq!(
            type_assert(&mut cx, Some("_t2"), &src, int, false, &pos),
            "_t2=Interface.assert(1,_t0);"
        );
        assert_eq!(type_assert(&mut cx, None, &src, int, true, &pos), "");
    }

    #[test]
    fn test_invoke() {
        assert_eq!(
            invoke("_t0", "String", &[]),
            "Interface.invoke(_t0,\"String\",[])"
        );
        assert_eq!(
            invoke("p_r", "Write", &["_t1".to_string(), "3".to_string()]),
            "Interface.invoke(p_r,\"Write\",[_t1,3])"
        );
    }
}
