//! Haxe rendering of the runtime type metadata.
//!
//! The whole table becomes one `TypeInfo` class of static data and lookup
//! functions. Type IDs start at 1; ID 0 is the nil interface's type and has
//! no entry.

use crate::codegen::typeinfo::{MethodTarget, TypeInfoTable};
use crate::registry::TypeId;

use super::names::string_literal;

/// Renders `table` as the `TypeInfo` class.
pub(crate) fn emit_type_info(table: &TypeInfoTable) -> String {
    let mut out = String::new();
    out.push_str("class TypeInfo{\n\n");
    out.push_str(&format!(
        "\tpublic static var nextTypeID={};\n\n",
        table.next_type_id()
    ));

    type_table(&mut out, table);
    flag_switch(
        &mut out,
        "isHaxeClass",
        table.entries().iter().filter(|e| e.native).map(|e| e.id),
        true,
    );
    names(&mut out, table);
    flag_switch(
        &mut out,
        "isDuplicate",
        table.entries().iter().filter(|e| e.duplicate).map(|e| e.id),
        true,
    );
    pair_switch(&mut out, "isAssignableTo", table.assignable_pairs());
    pair_switch(&mut out, "isIdentical", table.identical_pairs());
    flag_switch(
        &mut out,
        "isConcrete",
        table.entries().iter().filter(|e| !e.concrete).map(|e| e.id),
        false,
    );
    zero_values(&mut out, table);
    methods(&mut out, table);

    out.push_str("}\n");
    out
}

fn type_table(out: &mut String, table: &TypeInfoTable) {
    out.push_str("\tpublic static var typesByID:Array<Dynamic>=[\n");
    out.push_str("\t\tnull, // 0 is the nil type\n");
    for e in table.entries() {
        out.push_str(&format!(
            "\t\t{{isValid:{},size:{},align:{},fieldAlign:{},kind:{},stringForm:{},name:{}}}, // {}\n",
            e.valid,
            e.size,
            e.align,
            e.field_align,
            e.kind as u8,
            string_literal(&e.string_form),
            string_literal(&e.name),
            e.id
        ));
    }
    out.push_str("\t];\n\n");
}

/// `function name(id:Int):Bool` returning `hit` for the listed IDs.
fn flag_switch(out: &mut String, name: &str, ids: impl Iterator<Item = TypeId>, hit: bool) {
    let ids: Vec<String> = ids.map(|id| id.to_string()).collect();
    out.push_str(&format!("\tpublic static function {}(id:Int):Bool {{\n", name));
    if !ids.is_empty() {
        out.push_str(&format!(
            "\t\tswitch(id){{ case {}: return {}; default: }}\n",
            ids.join(","),
            hit
        ));
    }
    out.push_str(&format!("\t\treturn {};\n\t}}\n\n", !hit));
}

fn names(out: &mut String, table: &TypeInfoTable) {
    out.push_str(
        "\tpublic static function getName(id:Int):String {\n\
         \t\tif(id<=0||id>=nextTypeID) return \"UNKNOWN\";\n\
         \t\treturn typesByID[id].stringForm;\n\t}\n\n",
    );
    out.push_str(
        "\tpublic static function typeString(i:Interface):String {\n\
         \t\treturn getName(i.typ);\n\t}\n\n",
    );

    let entries: Vec<String> = table
        .names()
        .iter()
        .map(|(name, id)| format!("\t\t{}=>{}", string_literal(name), id))
        .collect();
    if entries.is_empty() {
        out.push_str("\tstatic var typIDs:Map<String,Int>=new Map<String,Int>();\n\n");
    } else {
        out.push_str(&format!(
            "\tstatic var typIDs:Map<String,Int>=[\n{}\n\t];\n\n",
            entries.join(",\n")
        ));
    }
    out.push_str(
        "\tpublic static function getId(name:String):Int {\n\
         \t\tif(typIDs.exists(name)) return typIDs[name];\n\
         \t\treturn 0;\n\t}\n\n",
    );
}

/// `function name(v:Int,t:Int):Bool` true for exactly the listed pairs.
fn pair_switch<'a>(
    out: &mut String,
    name: &str,
    pairs: impl Iterator<Item = &'a (TypeId, TypeId)>,
) {
    out.push_str(&format!(
        "\tpublic static function {}(v:Int,t:Int):Bool {{\n\t\tswitch(v){{\n",
        name
    ));
    // pairs arrive sorted, so each v is one run
    let mut current: Option<(TypeId, Vec<String>)> = None;
    for &(v, t) in pairs {
        match &mut current {
            Some((cv, ts)) if *cv == v => ts.push(t.to_string()),
            _ => {
                if let Some((cv, ts)) = current.take() {
                    pair_case(out, cv, &ts);
                }
                current = Some((v, vec![t.to_string()]));
            }
        }
    }
    if let Some((cv, ts)) = current {
        pair_case(out, cv, &ts);
    }
    out.push_str("\t\tdefault:\n\t\t}\n\t\treturn false;\n\t}\n\n");
}

fn pair_case(out: &mut String, v: TypeId, ts: &[String]) {
    out.push_str(&format!(
        "\t\tcase {}: switch(t){{ case {}: return true; default: }}\n",
        v,
        ts.join(",")
    ));
}

fn zero_values(out: &mut String, table: &TypeInfoTable) {
    out.push_str("\tpublic static function zeroValue(id:Int):Dynamic {\n\t\tswitch(id){\n");
    for e in table.entries() {
        out.push_str(&format!("\t\tcase {}: return {};\n", e.id, e.zero));
    }
    out.push_str("\t\tdefault:\n\t\t}\n\t\treturn null;\n\t}\n\n");
}

fn methods(out: &mut String, table: &TypeInfoTable) {
    out.push_str("\tpublic static function method(t:Int,m:String):Dynamic {\n\t\tswitch(t){\n");
    let mut open: Option<TypeId> = None;
    for m in table.methods() {
        if open != Some(m.id) {
            if open.is_some() {
                out.push_str("\t\t\tdefault:\n\t\t\t}\n");
            }
            out.push_str(&format!("\t\tcase {}: switch(m){{\n", m.id));
            open = Some(m.id);
        }
        match &m.target {
            MethodTarget::Wrapper(target) => out.push_str(&format!(
                "\t\t\tcase {}: return {};\n",
                string_literal(&m.name),
                target
            )),
            MethodTarget::NativeSkipped { package } => out.push_str(&format!(
                "\t\t\t// {} is declared in native package {}\n",
                m.name, package
            )),
        }
    }
    if open.is_some() {
        out.push_str("\t\t\tdefault:\n\t\t\t}\n");
    }
    out.push_str(
        "\t\tdefault:\n\t\t}\n\
         \t\tScheduler.panicFromHaxe(\"no method found!\");\n\
         \t\treturn null;\n\t}\n",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{EmitCx, HaxeBackend};
    use crate::diagnostics::Diagnostics;
    use crate::registry::TypeRegistry;
    use crate::ssa::{BasicKind, InterfaceMethod, TypeTable};

    fn render(types: &TypeTable, registry: &mut TypeRegistry) -> String {
        let mut diags = Diagnostics::new("haxe");
        let backend = HaxeBackend::new();
        let mut cx = EmitCx::new(types, registry, &mut diags);
        let table = TypeInfoTable::build(&backend, &mut cx);
        emit_type_info(&table)
    }

    #[test]
    fn test_empty_table() {
        let t = TypeTable::new();
        let mut reg = TypeRegistry::new();
        let text = render(&t, &mut reg);
        assert!(text.starts_with("class TypeInfo{"));
        assert!(text.contains("nextTypeID=1;"));
        assert!(text.contains("typIDs:Map<String,Int>=new Map<String,Int>();"));
        assert!(text.contains("Scheduler.panicFromHaxe(\"no method found!\");"));
    }

    #[test]
    fn test_entries_and_relations() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let s = t.basic(BasicKind::String);
        let sig = t.signature(vec![], vec![s], false);
        let stringer = t.interface(vec![InterfaceMethod {
            name: "String".to_string(),
            sig,
        }]);
        let named = t.named("main", "Name");
        t.set_underlying(named, s);
        t.add_method(named, "String", sig, false);

        let mut reg = TypeRegistry::new();
        reg.log_type_use(int);
        reg.request_method_set(named);
        reg.log_type_use(stringer);
        let text = render(&t, &mut reg);

        assert!(text.contains("nextTypeID=4;"));
        assert!(text.contains(
            "{isValid:true,size:4,align:4,fieldAlign:4,kind:2,stringForm:\"int\",name:\"\"}, // 1"
        ));
        assert!(text.contains("stringForm:\"main.Name\",name:\"Name\"}, // 2"));
        assert!(text.contains("\t\t\"main.Name\"=>2"));
        assert!(text.contains("case 2: switch(t){ case 2,3: return true; default: }"));
        assert!(text.contains("case 1: switch(t){ case 1: return true; default: }"));
        // only the interface is not concrete
        assert!(text.contains("switch(id){ case 3: return false; default: }"));
        assert!(text.contains("case 1: return 0;"));
        assert!(text.contains("case 2: return \"\";"));
        assert!(text.contains("case \"String\": return Go_main_2e_Name_dot_String.call;"));
    }

    #[test]
    fn test_native_methods_are_skipped() {
        let mut t = TypeTable::new();
        let s = t.basic(BasicKind::String);
        let sig = t.signature(vec![], vec![s], false);
        let native = t.named("github.com/x/_js", "XWindow");
        let st = t.struct_type(vec![]);
        t.set_underlying(native, st);
        t.add_method(native, "Title", sig, false);

        let mut reg = TypeRegistry::new();
        reg.request_method_set(native);
        let text = render(&t, &mut reg);

        assert!(text.contains("// Title is declared in native package github.com/x/_js"));
        assert!(text.contains("isHaxeClass(id:Int):Bool {\n\t\tswitch(id){ case 1: return true;"));
    }
}
