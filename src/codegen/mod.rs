//! Code generation for ssa-retarget.
//!
//! This module turns an [`ssa::Program`](crate::ssa::Program) into source
//! text for a target language. The architecture is a trait-based backend
//! system: the driver walks packages, functions, blocks and instructions and
//! asks the selected [`Backend`] for the target text of each piece.
//!
//! # Architecture
//!
//! ```text
//! Program → Compilation (driver) → CompileOutput
//!                 │
//!                 ├── split      (sub-units for over-long functions)
//!                 ├── typeinfo   (runtime type metadata model)
//!                 └── Backend    (HaxeBackend)
//! ```
//!
//! # Current Backends
//!
//! - **Haxe** ([`HaxeBackend`]): 32-bit `Int`, 64-bit `Float`, 64-bit
//!   integers emulated by the runtime's `GOint64`.
//!
//! # Example
//!
//! ```ignore
//! use ssa_retarget::codegen::{compile, CompileOptions};
//!
//! let output = compile("haxe", &program, CompileOptions::default())?;
//! for file in &output.files {
//!     std::fs::write(&file.name, &file.data)?;
//! }
//! ```

pub mod backends;
pub mod driver;
mod error;
pub mod haxe;
pub mod split;
pub mod typeinfo;

pub use backends::{BackendConfig, BackendEntry};
pub use driver::{CompileOptions, CompileOutput, Compilation, compile};
pub use error::CodeGenError;
pub use haxe::HaxeBackend;
pub use typeinfo::TypeInfoTable;

use std::fmt;

use crate::diagnostics::Diagnostics;
use crate::registry::TypeRegistry;
use crate::ssa::{
    BasicBlock, FuncRef, Function, Global, Instruction, NamedConst, Pos, Register, StdSizes, Ty,
    TypeTable,
};

/// A generated file, held in memory until the compilation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, text: String) -> Self {
        Self {
            name: name.into(),
            data: text.into_bytes(),
        }
    }

    /// The file contents as text.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.data).unwrap_or("")
    }
}

/// Compilation-scoped state handed to backend operations.
///
/// Backends only read the type table; their side effects are limited to
/// recording type uses and logging diagnostics.
pub struct EmitCx<'a> {
    pub types: &'a TypeTable,
    pub registry: &'a mut TypeRegistry,
    pub diagnostics: &'a mut Diagnostics,
    pub sizes: StdSizes,
}

impl<'a> EmitCx<'a> {
    pub fn new(
        types: &'a TypeTable,
        registry: &'a mut TypeRegistry,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            types,
            registry,
            diagnostics,
            sizes: StdSizes::default(),
        }
    }

    pub fn warn(&mut self, pos: &dyn fmt::Display, message: impl Into<String>) {
        self.diagnostics.warn(pos, message);
    }

    pub fn error(&mut self, pos: &dyn fmt::Display, message: impl Into<String>) {
        self.diagnostics.error(pos, message);
    }
}

/// Where an instruction is being emitted.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'f> {
    pub func: &'f Function,
    /// Index of the current block.
    pub block: usize,
    /// True inside a split-off sub-unit, where control transfers must be
    /// signalled to the caller instead of performed directly.
    pub in_sub_fn: bool,
}

impl<'f> Frame<'f> {
    pub fn new(func: &'f Function, block: usize) -> Self {
        Self {
            func,
            block,
            in_sub_fn: false,
        }
    }

    pub fn current_block(&self) -> &'f BasicBlock {
        &self.func.blocks[self.block]
    }
}

/// The capability set every target language implements.
///
/// Each operation returns target text. Apart from recording type uses in
/// the registry and logging diagnostics through the [`EmitCx`], operations
/// have no side effects.
///
/// # Failure policy
///
/// A warning is logged and a best-effort fallback emitted. An error is
/// logged and sentinel text emitted that cannot compile in the target.
pub trait Backend: Send + Sync {
    /// Name used to select this backend.
    fn name(&self) -> &str;

    /// Output file suffix, including the dot.
    fn file_suffix(&self) -> &str;

    /// File name for an output unit.
    fn file_name(&self, unit: &str) -> String {
        format!("{}{}", unit, self.file_suffix())
    }

    /// Output unit (file stem) for a source package.
    fn package_unit(&self, package: &str) -> String;

    /// Output unit for the runtime type metadata.
    fn type_info_unit(&self) -> &str;

    /// A single-line comment.
    fn comment(&self, text: &str) -> String;

    // === Naming ===

    /// Target identifier for an SSA register.
    fn register_name(&self, reg: &Register) -> String;

    /// Target identifier for object `object` declared in package `package`.
    fn lang_name(&self, package: &str, object: &str) -> String;

    /// Target name of the class or function implementing `func`.
    fn func_name(&self, types: &TypeTable, func: &FuncRef) -> String;

    // === File framing ===

    fn file_start(&self, package: &str, header: &str) -> String;

    fn file_end(&self) -> String;

    // === Declarations ===

    /// Declaration hook for a named type.
    fn type_start(&self, cx: &mut EmitCx<'_>, named: Ty) -> String;

    fn global(&self, cx: &mut EmitCx<'_>, package: &str, global: &Global) -> String;

    fn named_const(&self, cx: &mut EmitCx<'_>, package: &str, constant: &NamedConst) -> String;

    // === Function and block framing ===

    /// Opens a function. `must_split` is set when the function's blocks are
    /// emitted through sub-units.
    fn func_start(&self, cx: &mut EmitCx<'_>, func: &Function, must_split: bool) -> String;

    /// Opens block dispatch, after any sub-units have been declared.
    fn blocks_start(&self, func: &Function) -> String;

    fn func_end(&self, func: &Function) -> String;

    fn block_start(&self, block: &BasicBlock) -> String;

    fn block_end(&self, block: &BasicBlock) -> String;

    // === Function splitting ===

    fn sub_fn_start(&self, id: usize) -> String;

    /// Invokes sub-unit `id` and propagates its control signal.
    fn sub_fn_call(&self, cx: &mut EmitCx<'_>, frame: &Frame<'_>, id: usize) -> String;

    fn sub_fn_end(&self, id: usize) -> String;

    // === Instructions ===

    fn instruction(&self, cx: &mut EmitCx<'_>, frame: &Frame<'_>, instr: &Instruction) -> String;

    // === Types ===

    /// Lowers a source type to a target type name, or to its zero value
    /// when `zero` is set.
    fn lang_type(&self, cx: &mut EmitCx<'_>, ty: Ty, zero: bool, pos: &Pos) -> String;

    /// Target-native class a named type is bound to, if any.
    fn native_class(&self, types: &TypeTable, ty: Ty) -> Option<String>;

    /// Returns true if methods declared in `package` live in target-native
    /// classes.
    fn is_native_package(&self, package: &str) -> bool;

    /// Callable reference for method `method` of `recv`'s method set.
    fn method_target(&self, types: &TypeTable, recv: Ty, method: &str) -> String;

    /// Emits the runtime type metadata unit.
    fn emit_type_info(&self, cx: &mut EmitCx<'_>, table: &TypeInfoTable) -> String;
}
