//! # ssa-retarget
//!
//! A retargetable code generation backend for programs in Go-style static
//! single assignment form. The first target is Haxe.
//!
//! ## Architecture
//!
//! ```text
//! ssa::Program → codegen::Compilation → Backend (Haxe) → generated files
//!                        │
//!                        ├── registry     (type → runtime ID)
//!                        ├── diagnostics  (warnings and errors)
//!                        └── typeinfo     (runtime type metadata)
//! ```
//!
//! - [`ssa`] - The input model: types, functions, blocks and instructions
//! - [`registry`] - Stable runtime IDs for every type the output uses
//! - [`diagnostics`] - Per-compilation warning and error sink
//! - [`codegen`] - The backend contract, the driver and the Haxe backend
//!
//! ## Example
//!
//! ```
//! use ssa_retarget::codegen::{compile, CompileOptions};
//! use ssa_retarget::ssa::{BasicKind, FunctionBuilder, Package, Program, TypeTable};
//!
//! let mut types = TypeTable::new();
//! let sig = types.signature(vec![], vec![], false);
//! let mut b = FunctionBuilder::new("main", "main", sig);
//! b.ret(vec![]);
//!
//! let mut main = Package::new("main");
//! main.functions.push(b.build());
//! let mut program = Program::new(types);
//! program.packages.push(main);
//!
//! let output = compile("haxe", &program, CompileOptions::default()).expect("compiles");
//! assert_eq!(output.files.len(), 2);
//! # let _ = BasicKind::Int;
//! ```

pub mod codegen;
pub mod diagnostics;
pub mod registry;
pub mod ssa;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::codegen::{
        Backend, BackendConfig, CodeGenError, CompileOptions, CompileOutput, Compilation,
        HaxeBackend, compile,
    };
    pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
    pub use crate::registry::{TypeId, TypeRegistry};
    pub use crate::ssa::{FunctionBuilder, Program, TypeTable};
}
