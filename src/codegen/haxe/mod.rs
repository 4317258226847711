//! Haxe backend.
//!
//! Every function becomes a class `Go_<name>` with a static `call` method.
//! Its blocks are the cases of a `switch(_Next)` inside `while(true)`, and
//! registers are locals declared up front so that any block can assign any
//! register.
//!
//! The generated code targets a hand-written runtime (`Force`, `GOint64`,
//! `Interface`, `Scheduler`, `Slice`, `Pointer`, `Object`, `GOmap`,
//! `Channel`, `Closure`, `Console`) and a generated `TypeInfo` class.

mod const_eval;
mod convert;
mod instr;
mod interface;
mod names;
mod typeinfo;
mod types;
mod value;

use crate::codegen::{Backend, EmitCx, Frame, TypeInfoTable};
use crate::ssa::{
    BasicBlock, FuncRef, Function, Global, Instruction, NamedConst, Pos, Register, Ty, TypeKind,
    TypeTable,
};

use self::instr::{SIGNAL_JUMPED, SIGNAL_RETURNED, block_phis, return_type};
use self::names::{func_class, global_class, lang_name, param_name, phi_temp_name};
use self::types::results_type;
use self::value::const_literal;

/// The Haxe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaxeBackend {
    name: String,
}

impl HaxeBackend {
    pub fn new() -> Self {
        Self::named("haxe")
    }

    /// A Haxe backend registered under another name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for HaxeBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Result types of a signature type.
fn sig_results(types: &TypeTable, sig: Ty) -> &[Ty] {
    match types.underlying_kind(sig) {
        TypeKind::Signature(s) => &s.results,
        _ => &[],
    }
}

impl Backend for HaxeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_suffix(&self) -> &str {
        ".hx"
    }

    fn package_unit(&self, package: &str) -> String {
        names::package_unit(package)
    }

    fn type_info_unit(&self) -> &str {
        "TypeInfo"
    }

    fn comment(&self, text: &str) -> String {
        format!("// {}", text)
    }

    fn register_name(&self, reg: &Register) -> String {
        names::register_name(&reg.name)
    }

    fn lang_name(&self, package: &str, object: &str) -> String {
        lang_name(package, object)
    }

    fn func_name(&self, types: &TypeTable, func: &FuncRef) -> String {
        func_class(types, func)
    }

    fn file_start(&self, package: &str, header: &str) -> String {
        let mut out = format!("package {};\n\n", package);
        if !header.is_empty() {
            out.push_str(header);
            out.push('\n');
        }
        out
    }

    fn file_end(&self) -> String {
        String::new()
    }

    fn type_start(&self, cx: &mut EmitCx<'_>, named: Ty) -> String {
        let lowered = types::lang_type(cx, named, false, &Pos::default());
        format!(
            "// type {} is {}\n",
            cx.types.type_string(named),
            if lowered.is_empty() { "Void" } else { lowered.as_str() }
        )
    }

    fn global(&self, cx: &mut EmitCx<'_>, package: &str, global: &Global) -> String {
        let zero = types::lang_type(cx, global.ty, true, &Pos::default());
        format!(
            "class {} {{\n\tpublic static var v:Pointer=Pointer.make({});\n}}\n",
            global_class(package, &global.name),
            zero
        )
    }

    fn named_const(&self, cx: &mut EmitCx<'_>, package: &str, constant: &NamedConst) -> String {
        let pos = Pos::default();
        let ty = types::lang_type(cx, constant.ty, false, &pos);
        let lit = const_literal(cx, &constant.value, constant.ty, &pos);
        format!(
            "class {} {{\n\tpublic static var v:{}={};\n}}\n",
            global_class(package, &constant.name),
            ty,
            lit
        )
    }

    fn func_start(&self, cx: &mut EmitCx<'_>, func: &Function, must_split: bool) -> String {
        let pos = &func.pos;
        let table = cx.types;
        let results = sig_results(table, func.sig);

        let mut params = Vec::new();
        if !func.free_vars.is_empty() {
            params.push("_bds:Array<Dynamic>".to_string());
        }
        for p in func.receiver.iter().chain(&func.params) {
            let ty = types::lang_type(cx, p.ty, false, pos);
            params.push(format!("{}:{}", param_name(&p.name), ty));
        }
        let ret = return_type(cx, results, pos);

        let mut out = format!(
            "class {} {{\n\tpublic static function call({}):{} {{\n",
            func_class(table, &func.func_ref()),
            params.join(","),
            ret
        );
        out.push_str("\t\tvar _Next:Int=0;\n");

        for reg in func.registers() {
            let ty = types::lang_type(cx, reg.ty, false, pos);
            if ty.is_empty() {
                continue;
            }
            let zero = types::lang_type(cx, reg.ty, true, pos);
            out.push_str(&format!(
                "\t\tvar {}:{}={};\n",
                names::register_name(&reg.name),
                ty,
                zero
            ));
        }

        for block in &func.blocks {
            let phis = block_phis(block);
            if phis.len() < 2 {
                continue;
            }
            for (reg, _) in phis {
                let ty = types::lang_type(cx, reg.ty, false, pos);
                let zero = types::lang_type(cx, reg.ty, true, pos);
                out.push_str(&format!("\t\tvar {}:{}={};\n", phi_temp_name(&reg.name), ty, zero));
            }
        }

        if must_split && !results.is_empty() {
            let zero = results_type(cx, results, true, pos);
            out.push_str(&format!("\t\tvar _res:{}={};\n", ret, zero));
        }
        if func.has_defers() {
            out.push_str("\t\tvar _defers:Array<Void->Void>=[];\n");
        }
        out
    }

    fn blocks_start(&self, _func: &Function) -> String {
        "\t\twhile(true){\n\t\t\tswitch(_Next){\n".to_string()
    }

    fn func_end(&self, _func: &Function) -> String {
        "\t\t\tdefault: Scheduler.badBlock(_Next);\n\t\t\t}\n\t\t}\n\t}\n}\n".to_string()
    }

    fn block_start(&self, block: &BasicBlock) -> String {
        if block.comment.is_empty() {
            format!("\t\t\tcase {}:\n", block.index)
        } else {
            format!("\t\t\tcase {}: // {}\n", block.index, block.comment)
        }
    }

    fn block_end(&self, _block: &BasicBlock) -> String {
        String::new()
    }

    fn sub_fn_start(&self, id: usize) -> String {
        format!("\t\tvar _SF{}=function():Int{{\n", id)
    }

    fn sub_fn_call(&self, cx: &mut EmitCx<'_>, frame: &Frame<'_>, id: usize) -> String {
        if frame.in_sub_fn {
            return format!("{{var _s=_SF{}();if(_s!=0)return _s;}}\n", id);
        }
        let returned = if sig_results(cx.types, frame.func.sig).is_empty() {
            "return;"
        } else {
            "return _res;"
        };
        format!(
            "switch(_SF{}()){{case {}: {} case {}: continue; default:}}\n",
            id, SIGNAL_RETURNED, returned, SIGNAL_JUMPED
        )
    }

    fn sub_fn_end(&self, _id: usize) -> String {
        "\t\t\treturn 0;\n\t\t};\n".to_string()
    }

    fn instruction(&self, cx: &mut EmitCx<'_>, frame: &Frame<'_>, instr: &Instruction) -> String {
        instr::instruction(cx, frame, instr)
    }

    fn lang_type(&self, cx: &mut EmitCx<'_>, ty: Ty, zero: bool, pos: &Pos) -> String {
        types::lang_type(cx, ty, zero, pos)
    }

    fn native_class(&self, types: &TypeTable, ty: Ty) -> Option<String> {
        types::native_class(types, ty)
    }

    fn is_native_package(&self, package: &str) -> bool {
        types::is_native_package(package)
    }

    fn method_target(&self, types: &TypeTable, recv: Ty, method: &str) -> String {
        format!("Go_{}.call", lang_name(&types.type_string(recv), method))
    }

    fn emit_type_info(&self, _cx: &mut EmitCx<'_>, table: &TypeInfoTable) -> String {
        typeinfo::emit_type_info(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::registry::TypeRegistry;
    use crate::ssa::builder::int_const;
    use crate::ssa::{BasicKind, BinOp, ConstValue, FunctionBuilder, InstrKind};

    #[test]
    fn test_framing() {
        let b = HaxeBackend::new();
        assert_eq!(b.name(), "haxe");
        assert_eq!(b.package_unit("main"), "Go_main");
        assert_eq!(b.file_start("go", ""), "package go;\n\n");
        assert_eq!(
            b.file_start("go", "import js.Browser;"),
            "package go;\n\nimport js.Browser;\n"
        );
        assert_eq!(b.comment("hi"), "// hi");
        assert_eq!(b.sub_fn_start(3), "\t\tvar _SF3=function():Int{\n");
    }

    #[test]
    fn test_declarations() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let i64_ = t.basic(BasicKind::Int64);
        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
        let b = HaxeBackend::new();

        let global = Global {
            name: "count".to_string(),
            ty: int,
        };
        assert_eq!(
            b.global(&mut cx, "main", &global),
            "class Go_main_dot_count {\n\tpublic static var v:Pointer=Pointer.make(0);\n}\n"
        );
        let constant = NamedConst {
            name: "Big".to_string(),
            value: ConstValue::Int(-1),
            ty: i64_,
        };
        assert_eq!(
            b.named_const(&mut cx, "main", &constant),
            "class Go_main_dot_Big {\n\tpublic static var v:GOint64=GOint64.make(-1,-1);\n}\n"
        );
    }

    #[test]
    fn test_func_start_declares_registers() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let sig = t.signature(vec![int], vec![int], false);
        let mut fb = FunctionBuilder::new("main", "inc", sig);
        let x = fb.param("x", int);
        let r = fb.value(
            int,
            InstrKind::BinOp {
                op: BinOp::Add,
                x,
                y: int_const(1, int),
            },
        );
        fb.ret(vec![r.into()]);
        let func = fb.build();

        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
        let b = HaxeBackend::new();
        let text = b.func_start(&mut cx, &func, false);
        assert_eq!(
            text,
            "class Go_main_dot_inc {\n\tpublic static function call(p_x:Int):Int {\n\
             \t\tvar _Next:Int=0;\n\t\tvar _t0:Int=0;\n"
        );
        let split = b.func_start(&mut cx, &func, true);
        assert!(split.ends_with("\t\tvar _res:Int=0;\n"));
    }

    #[test]
    fn test_sub_fn_call_signals() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let void_sig = t.signature(vec![], vec![], false);
        let int_sig = t.signature(vec![], vec![int], false);
        let void_fn = FunctionBuilder::new("main", "v", void_sig).build();
        let int_fn = FunctionBuilder::new("main", "i", int_sig).build();

        let mut reg = TypeRegistry::new();
        let mut diags = Diagnostics::new("haxe");
        let mut cx = EmitCx::new(&t, &mut reg, &mut diags);
        let b = HaxeBackend::new();

        assert_eq!(
            b.sub_fn_call(&mut cx, &Frame::new(&void_fn, 0), 2),
            "switch(_SF2()){case 1: return; case 2: continue; default:}\n"
        );
        assert_eq!(
            b.sub_fn_call(&mut cx, &Frame::new(&int_fn, 0), 2),
            "switch(_SF2()){case 1: return _res; case 2: continue; default:}\n"
        );
        let nested = Frame {
            in_sub_fn: true,
            ..Frame::new(&int_fn, 0)
        };
        assert_eq!(
            b.sub_fn_call(&mut cx, &nested, 0),
            "{var _s=_SF0();if(_s!=0)return _s;}\n"
        );
    }

    #[test]
    fn test_method_target_matches_func_class() {
        let mut t = TypeTable::new();
        let s = t.basic(BasicKind::String);
        let sig = t.signature(vec![], vec![s], false);
        let named = t.named("main", "Name");
        t.set_underlying(named, s);
        let b = HaxeBackend::new();
        let method = FuncRef {
            package: "main".to_string(),
            name: "String".to_string(),
            receiver: Some(named),
            sig,
        };
        assert_eq!(b.method_target(&t, named, "String"), "Go_main_2e_Name_dot_String.call");
        assert_eq!(
            format!("{}.call", b.func_name(&t, &method)),
            b.method_target(&t, named, "String")
        );
    }
}
