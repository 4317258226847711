//! Compilation driver.
//!
//! A [`Compilation`] owns everything one run needs: the selected backend
//! entry, the type registry and the diagnostics sink. It walks the program
//! package by package, asks the backend for the text of every declaration,
//! function, block and instruction, and finally emits the runtime type
//! metadata, which must come last because it covers every type registered
//! while emitting code.
//!
//! Files are held in memory and only released by [`Compilation::finish`]
//! when no error was logged.

use std::sync::Arc;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::registry::TypeRegistry;
use crate::ssa::{ConstValue, Function, Package, Program};

use super::backends::{self, BackendConfig, BackendEntry};
use super::split::{Segment, SplitPlan, plan_function};
use super::typeinfo::TypeInfoTable;
use super::{Backend, CodeGenError, EmitCx, Frame, GeneratedFile};

/// Options for a single compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Target package name used when the program does not name one.
    pub default_package: String,
    /// Header text used when the program does not supply one.
    pub header: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_package: "go".to_string(),
            header: String::new(),
        }
    }
}

/// The result of a successful compilation.
#[derive(Debug)]
pub struct CompileOutput {
    pub files: Vec<GeneratedFile>,
    /// Warnings logged during the run.
    pub diagnostics: Vec<Diagnostic>,
    pub type_info: TypeInfoTable,
}

impl CompileOutput {
    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// One compilation run.
pub struct Compilation<'p> {
    entry: Arc<BackendEntry>,
    program: &'p Program,
    options: CompileOptions,
    registry: TypeRegistry,
    diagnostics: Diagnostics,
    files: Vec<GeneratedFile>,
    type_info: TypeInfoTable,
}

impl<'p> Compilation<'p> {
    pub fn new(entry: Arc<BackendEntry>, program: &'p Program, options: CompileOptions) -> Self {
        let diagnostics = Diagnostics::new(entry.name());
        Self {
            entry,
            program,
            options,
            registry: TypeRegistry::new(),
            diagnostics,
            files: Vec::new(),
            type_info: TypeInfoTable::default(),
        }
    }

    /// Creates a compilation for the registered backend named `target`.
    pub fn for_target(
        target: &str,
        program: &'p Program,
        options: CompileOptions,
    ) -> Result<Self, CodeGenError> {
        let entry = backends::find(target)?;
        Ok(Self::new(entry, program, options))
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Emits every package and then the type metadata.
    pub fn run(&mut self) {
        let backend = self.entry.backend();
        let config = self.entry.config();
        let program = self.program;
        let target = special_const(program, &config.package_const_name)
            .unwrap_or_else(|| self.options.default_package.clone());
        let header = special_const(program, &config.header_const_name)
            .unwrap_or_else(|| self.options.header.clone());

        let mut cx = EmitCx::new(&program.types, &mut self.registry, &mut self.diagnostics);

        for package in &program.packages {
            let text = emit_package(backend, config, &mut cx, package, &target, &header);
            let name = backend.file_name(&backend.package_unit(&package.path));
            self.files.push(GeneratedFile::new(name, text));
        }

        let table = TypeInfoTable::build(backend, &mut cx);
        let mut text = backend.file_start(&target, &header);
        text.push_str(&backend.emit_type_info(&mut cx, &table));
        text.push_str(&backend.file_end());
        self.files.push(GeneratedFile::new(
            backend.file_name(backend.type_info_unit()),
            text,
        ));
        self.type_info = table;
    }

    /// Releases the generated files, or fails if any error was logged.
    pub fn finish(self) -> Result<CompileOutput, CodeGenError> {
        if self.diagnostics.has_errors() {
            let errors = self.diagnostics.error_count();
            log::info!(
                "{}: compilation failed with {} error(s)",
                self.entry.name(),
                errors
            );
            return Err(CodeGenError::Failed {
                errors,
                diagnostics: self.diagnostics.into_vec(),
            });
        }
        log::info!(
            "{}: generated {} file(s), {} type(s), {} warning(s)",
            self.entry.name(),
            self.files.len(),
            self.registry.len(),
            self.diagnostics.warning_count()
        );
        Ok(CompileOutput {
            files: self.files,
            diagnostics: self.diagnostics.into_vec(),
            type_info: self.type_info,
        })
    }
}

/// Compiles `program` with the registered backend named `target`.
pub fn compile(
    target: &str,
    program: &Program,
    options: CompileOptions,
) -> Result<CompileOutput, CodeGenError> {
    let mut compilation = Compilation::for_target(target, program, options)?;
    compilation.run();
    compilation.finish()
}

/// String value of the first package constant named `name`.
fn special_const(program: &Program, name: &str) -> Option<String> {
    program
        .packages
        .iter()
        .filter_map(|p| p.find_const(name))
        .find_map(|c| match &c.value {
            ConstValue::String(s) => Some(s.clone()),
            _ => None,
        })
}

fn emit_package(
    backend: &dyn Backend,
    config: &BackendConfig,
    cx: &mut EmitCx<'_>,
    package: &Package,
    target: &str,
    header: &str,
) -> String {
    let mut out = backend.file_start(target, header);

    for &named in &package.types {
        out.push_str(&backend.type_start(cx, named));
    }
    for constant in &package.consts {
        if constant.name == config.package_const_name || constant.name == config.header_const_name
        {
            continue;
        }
        out.push_str(&backend.named_const(cx, &package.path, constant));
    }
    for global in &package.globals {
        out.push_str(&backend.global(cx, &package.path, global));
    }
    for func in &package.functions {
        out.push_str(&emit_function(backend, config, cx, func));
    }

    out.push_str(&backend.file_end());
    out
}

fn emit_function(
    backend: &dyn Backend,
    config: &BackendConfig,
    cx: &mut EmitCx<'_>,
    func: &Function,
) -> String {
    let plan = plan_function(
        func,
        config.instruction_limit,
        config.sub_fn_instruction_limit,
    );
    log::debug!(
        "emitting {}.{} ({} blocks, {} instructions, {} sub-units)",
        func.package,
        func.name,
        func.blocks.len(),
        func.instruction_count(),
        plan.units.len()
    );

    let mut out = backend.func_start(cx, func, plan.is_split());
    for unit in &plan.units {
        out.push_str(&backend.sub_fn_start(unit.id));
        let frame = Frame {
            func,
            block: unit.block,
            in_sub_fn: true,
        };
        emit_segments(backend, cx, &frame, &unit.body, &mut out);
        out.push_str(&backend.sub_fn_end(unit.id));
    }

    out.push_str(&backend.blocks_start(func));
    for (index, block) in func.blocks.iter().enumerate() {
        out.push_str(&backend.block_start(block));
        let frame = Frame::new(func, index);
        emit_segments(backend, cx, &frame, block_body(&plan, index), &mut out);
        out.push_str(&backend.block_end(block));
    }
    out.push_str(&backend.func_end(func));
    out
}

fn block_body(plan: &SplitPlan, index: usize) -> &[Segment] {
    plan.blocks.get(index).map(Vec::as_slice).unwrap_or(&[])
}

fn emit_segments(
    backend: &dyn Backend,
    cx: &mut EmitCx<'_>,
    frame: &Frame<'_>,
    body: &[Segment],
    out: &mut String,
) {
    let block = frame.current_block();
    for segment in body {
        match segment {
            Segment::Instrs(range) => {
                for instr in block.instrs.get(range.clone()).unwrap_or(&[]) {
                    let text = backend.instruction(cx, frame, instr);
                    if !text.is_empty() {
                        out.push_str("\t\t\t\t");
                        out.push_str(&text);
                        out.push('\n');
                    }
                }
            }
            Segment::Call(id) => {
                out.push_str("\t\t\t\t");
                out.push_str(&backend.sub_fn_call(cx, frame, *id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::HaxeBackend;
    use crate::registry::TypeId;
    use crate::ssa::builder::int_const;
    use crate::ssa::{BasicKind, BinOp, FunctionBuilder, InstrKind, NamedConst, TypeTable};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// `main.main` boxes 42 and asserts it to int and to string.
    fn assert_program() -> Program {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let s = t.basic(BasicKind::String);
        let bool_ = t.basic(BasicKind::Bool);
        let any = t.interface(vec![]);
        let as_int = t.tuple(vec![int, bool_]);
        let as_string = t.tuple(vec![s, bool_]);
        let sig = t.signature(vec![], vec![], false);

        let mut b = FunctionBuilder::new("main", "main", sig);
        let boxed = b.value(
            any,
            InstrKind::MakeInterface {
                x: int_const(42, int),
            },
        );
        b.value(
            as_int,
            InstrKind::TypeAssert {
                x: boxed.clone().into(),
                asserted: int,
                comma_ok: true,
            },
        );
        b.value(
            as_string,
            InstrKind::TypeAssert {
                x: boxed.into(),
                asserted: s,
                comma_ok: true,
            },
        );
        b.ret(vec![]);

        let mut main = Package::new("main");
        main.functions.push(b.build());
        let mut program = Program::new(t);
        program.packages.push(main);
        program
    }

    #[test]
    fn test_box_and_assert_end_to_end() {
        init_logging();
        let program = assert_program();
        let output = compile("haxe", &program, CompileOptions::default()).unwrap();

        assert_eq!(output.files.len(), 2);
        let main = output.file("Go_main.hx").unwrap().text().to_string();
        assert!(main.starts_with("package go;"));
        assert!(main.contains("class Go_main_dot_main {"));
        assert!(main.contains("_t0=new Interface(1,42);"));
        assert!(main.contains("_t1=Interface.assertOk(1,_t0);"));
        assert!(main.contains("_t2=Interface.assertOk(2,_t0);"));
        assert!(main.contains("var _t2:{r0:String,r1:Bool}={r0:\"\",r1:false};"));
        assert!(main.contains("default: Scheduler.badBlock(_Next);"));

        let info = output.file("TypeInfo.hx").unwrap().text().to_string();
        assert!(info.contains("nextTypeID=3;"));
        assert!(info.contains("case 2: return \"\";"));

        let table = &output.type_info;
        assert!(table.assert_ok(TypeId(1), TypeId(1)));
        assert!(!table.assert_ok(TypeId(1), TypeId(2)));
        assert_eq!(
            table.entry(TypeId(2)).map(|e| e.zero.as_str()),
            Some("\"\"")
        );
    }

    #[test]
    fn test_package_and_header_constants() {
        init_logging();
        let mut program = assert_program();
        let s = program.types.basic(BasicKind::String);
        let main = &mut program.packages[0];
        main.consts.push(NamedConst {
            name: "haxePackage".to_string(),
            value: ConstValue::String("tardis".to_string()),
            ty: s,
        });
        main.consts.push(NamedConst {
            name: "haxeHeader".to_string(),
            value: ConstValue::String("import haxe.io.Bytes;".to_string()),
            ty: s,
        });
        let output = compile("haxe", &program, CompileOptions::default()).unwrap();
        for file in &output.files {
            assert!(
                file.text().starts_with("package tardis;\n\nimport haxe.io.Bytes;\n"),
                "{}",
                file.name
            );
        }
        let main = output.file("Go_main.hx").unwrap().text().to_string();
        assert!(!main.contains("Go_main_dot_haxePackage"));
    }

    #[test]
    fn test_failed_compilation_returns_no_files() {
        init_logging();
        let mut t = TypeTable::new();
        let s = t.basic(BasicKind::String);
        let sig = t.signature(vec![s, s], vec![s], false);
        let mut b = FunctionBuilder::new("main", "bad", sig);
        let x = b.param("x", s);
        let y = b.param("y", s);
        let r = b.value(s, InstrKind::BinOp { op: BinOp::Sub, x, y });
        b.ret(vec![r.into()]);
        let mut main = Package::new("main");
        main.functions.push(b.build());
        let mut program = Program::new(t);
        program.packages.push(main);

        match compile("haxe", &program, CompileOptions::default()) {
            Err(err) => {
                assert!(matches!(err, CodeGenError::Failed { errors: 1, .. }));
                assert_eq!(err.diagnostics().len(), 1);
            }
            Ok(output) => panic!("expected failure, got {} files", output.files.len()),
        }
    }

    #[test]
    fn test_unknown_target() {
        let program = Program::default();
        assert!(matches!(
            compile("cobol", &program, CompileOptions::default()),
            Err(CodeGenError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_long_function_is_split() {
        init_logging();
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let sig = t.signature(vec![], vec![int], false);
        let mut b = FunctionBuilder::new("main", "long", sig);
        let exit = b.create_block("exit");
        let mut last = None;
        for i in 0..20 {
            last = Some(b.value(
                int,
                InstrKind::BinOp {
                    op: BinOp::Add,
                    x: int_const(i, int),
                    y: int_const(1, int),
                },
            ));
        }
        b.jump(exit);
        b.switch_to_block(exit);
        b.ret(last.into_iter().map(Into::into).collect());
        let mut main = Package::new("main");
        main.functions.push(b.build());
        let mut program = Program::new(t);
        program.packages.push(main);

        let config = BackendConfig {
            instruction_limit: 8,
            sub_fn_instruction_limit: 2,
            ..BackendConfig::default()
        };
        let entry = Arc::new(BackendEntry::new(HaxeBackend::named("haxe-small"), config).unwrap());
        let mut compilation = Compilation::new(entry, &program, CompileOptions::default());
        compilation.run();
        let output = compilation.finish().unwrap();
        let text = output.file("Go_main.hx").unwrap().text().to_string();

        assert!(text.contains("var _res:Int=0;"));
        assert!(text.contains("var _SF0=function():Int{"));
        assert!(text.contains("_Next=1;return 2;"));
        assert!(text.contains("_res=_t19;return 1;"));
        assert!(text.contains("if(_s!=0)return _s;"));
        assert!(text.contains("case 1: return _res; case 2: continue;"));
    }
}
