//! SSA input model.
//!
//! The backend consumes a program that a front end has already parsed,
//! type-checked and lowered to static single assignment form. This module
//! is the read-only shape of that program:
//!
//! ```text
//! Program ─┬─ TypeTable
//!          └─ Package ─┬─ NamedConst / Global / named types
//!                      └─ Function ── BasicBlock ── Instruction
//! ```
//!
//! Instructions name their result with a [`Register`] and read
//! [`Operand`]s. Control flow is carried by block successor lists: a `Jump`
//! goes to `succs[0]`, an `If` to `succs[0]` when true and `succs[1]` when
//! false.

pub mod builder;
pub mod sizes;
pub mod types;

use std::fmt;

pub use self::builder::FunctionBuilder;
pub use self::sizes::StdSizes;
pub use self::types::{
    BasicKind, ChanDir, Field, InterfaceMethod, Method, NamedType, Selection, Signature, Ty,
    TypeKind, TypeTable,
};

/// Source position tag attached to functions and instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Returns true if the front end supplied no position.
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "-")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    /// Signed integers and untyped integer constants.
    Int(i64),
    /// Unsigned integers.
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    String(String),
    Nil,
}

/// An SSA value produced by an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    pub name: String,
    pub ty: Ty,
}

impl Register {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A function parameter, receiver or free variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Reference to a declared function or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncRef {
    /// Import path of the declaring package.
    pub package: String,
    pub name: String,
    /// Receiver type for methods.
    pub receiver: Option<Ty>,
    /// Signature type, excluding the receiver.
    pub sig: Ty,
}

/// A value read by an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    Param(Param),
    /// Closure binding, by position in the function's free variable list.
    FreeVar { index: usize, name: String, ty: Ty },
    /// Address of a package-level variable; `ty` is the pointer type.
    Global { package: String, name: String, ty: Ty },
    Function(FuncRef),
    Const { value: ConstValue, ty: Ty },
    Nil(Ty),
}

impl Operand {
    /// Convenience constructor for constants.
    pub fn constant(value: ConstValue, ty: Ty) -> Self {
        Operand::Const { value, ty }
    }

    pub fn ty(&self) -> Ty {
        match self {
            Operand::Register(r) => r.ty,
            Operand::Param(p) => p.ty,
            Operand::FreeVar { ty, .. }
            | Operand::Global { ty, .. }
            | Operand::Const { ty, .. }
            | Operand::Nil(ty) => *ty,
            Operand::Function(f) => f.sig,
        }
    }

    pub fn as_const(&self) -> Option<&ConstValue> {
        match self {
            Operand::Const { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<Register> for Operand {
    fn from(r: Register) -> Self {
        Operand::Register(r)
    }
}

impl From<&Register> for Operand {
    fn from(r: &Register) -> Self {
        Operand::Register(r.clone())
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eql | BinOp::Neq | BinOp::Lss | BinOp::Leq | BinOp::Gtr | BinOp::Geq
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Quo => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::AndNot => "&^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eql => "==",
            BinOp::Neq => "!=",
            BinOp::Lss => "<",
            BinOp::Leq => "<=",
            BinOp::Gtr => ">",
            BinOp::Geq => ">=",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not.
    Not,
    /// Bitwise complement.
    Xor,
    /// Pointer load.
    Deref,
    /// Channel receive.
    Recv,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Cap,
    Append,
    Copy,
    Delete,
    Close,
    Print,
    Println,
    Real,
    Imag,
    Complex,
    Recover,
}

/// What a call instruction calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A statically known function or method.
    Static(FuncRef),
    /// A closure value.
    Value(Operand),
    /// Dynamic dispatch through an interface value.
    Invoke { recv: Operand, method: String },
    Builtin(Builtin),
}

/// Callee and arguments of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCommon {
    pub callee: Callee,
    pub args: Vec<Operand>,
}

/// How a call is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    #[default]
    Call,
    /// Start a new task.
    Go,
    /// Run when the enclosing function returns.
    Defer,
}

/// One case of a `select`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectState {
    pub chan: Operand,
    /// Value to send, or `None` for a receive.
    pub send: Option<Operand>,
}

/// The closed set of instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    BinOp { op: BinOp, x: Operand, y: Operand },
    UnOp { op: UnOp, x: Operand, comma_ok: bool },
    Store { addr: Operand, value: Operand },
    Send { chan: Operand, value: Operand },
    Ret(Vec<Operand>),
    Jump,
    If { cond: Operand },
    /// Value per predecessor block index.
    Phi { edges: Vec<(usize, Operand)> },
    Call { call: CallCommon, mode: CallMode },
    Convert { x: Operand },
    ChangeType { x: Operand },
    ChangeInterface { x: Operand },
    MakeInterface { x: Operand },
    TypeAssert { x: Operand, asserted: Ty, comma_ok: bool },
    /// Allocates a zero value; the destination is a pointer to it.
    Alloc { heap: bool },
    MakeClosure { func: FuncRef, bindings: Vec<Operand> },
    MakeSlice { len: Operand, cap: Operand },
    MakeMap { reserve: Option<Operand> },
    MakeChan { size: Operand },
    Slice { x: Operand, low: Option<Operand>, high: Option<Operand> },
    FieldAddr { x: Operand, field: usize },
    Field { x: Operand, field: usize },
    IndexAddr { x: Operand, index: Operand },
    Index { x: Operand, index: Operand },
    Lookup { x: Operand, index: Operand, comma_ok: bool },
    MapUpdate { map: Operand, key: Operand, value: Operand },
    Extract { tuple: Operand, index: usize },
    Range { x: Operand },
    Next { iter: Operand, is_string: bool },
    Select { states: Vec<SelectState>, blocking: bool },
    Panic { x: Operand },
    RunDefers,
}

impl InstrKind {
    /// Returns true for instructions that end a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstrKind::Jump | InstrKind::If { .. } | InstrKind::Ret(_) | InstrKind::Panic { .. }
        )
    }
}

/// A single SSA instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub dest: Option<Register>,
    pub kind: InstrKind,
    pub pos: Pos,
}

impl Instruction {
    pub fn new(kind: InstrKind) -> Self {
        Self {
            dest: None,
            kind,
            pos: Pos::default(),
        }
    }

    pub fn with_dest(mut self, dest: Register) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }
}

/// A basic block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    pub index: usize,
    /// Front-end annotation such as `for.body`.
    pub comment: String,
    pub instrs: Vec<Instruction>,
    pub preds: Vec<usize>,
    pub succs: Vec<usize>,
}

/// A function or method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub package: String,
    pub name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub free_vars: Vec<Param>,
    /// Signature type, excluding the receiver.
    pub sig: Ty,
    pub blocks: Vec<BasicBlock>,
    pub pos: Pos,
}

impl Function {
    pub fn func_ref(&self) -> FuncRef {
        FuncRef {
            package: self.package.clone(),
            name: self.name.clone(),
            receiver: self.receiver.as_ref().map(|r| r.ty),
            sig: self.sig,
        }
    }

    /// Total number of instructions across all blocks.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    /// Returns true if any block contains a `defer` call.
    pub fn has_defers(&self) -> bool {
        self.blocks.iter().flat_map(|b| &b.instrs).any(|i| {
            matches!(
                i.kind,
                InstrKind::Call {
                    mode: CallMode::Defer,
                    ..
                }
            )
        })
    }

    /// Registers defined in this function, in definition order.
    pub fn registers(&self) -> impl Iterator<Item = &Register> {
        self.blocks
            .iter()
            .flat_map(|b| &b.instrs)
            .filter_map(|i| i.dest.as_ref())
    }
}

/// A package-level constant.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedConst {
    pub name: String,
    pub value: ConstValue,
    pub ty: Ty,
}

/// A package-level variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    /// Type of the stored value (not the pointer to it).
    pub ty: Ty,
}

/// A compiled package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    /// Full import path, e.g. `main` or `unicode/utf8`.
    pub path: String,
    pub consts: Vec<NamedConst>,
    pub globals: Vec<Global>,
    /// Named types declared in this package.
    pub types: Vec<Ty>,
    pub functions: Vec<Function>,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Last element of the import path.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn find_const(&self, name: &str) -> Option<&NamedConst> {
        self.consts.iter().find(|c| c.name == name)
    }
}

/// The whole program handed to the backend.
#[derive(Debug, Default)]
pub struct Program {
    pub types: TypeTable,
    pub packages: Vec<Package>,
}

impl Program {
    pub fn new(types: TypeTable) -> Self {
        Self {
            types,
            packages: Vec::new(),
        }
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        assert_eq!(Pos::new("main.go", 3, 7).to_string(), "main.go:3:7");
        assert_eq!(Pos::default().to_string(), "-");
    }

    #[test]
    fn test_package_name() {
        assert_eq!(Package::new("unicode/utf8").name(), "utf8");
        assert_eq!(Package::new("main").name(), "main");
    }

    #[test]
    fn test_operand_ty() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let r = Register::new("t0", int);
        assert_eq!(Operand::from(&r).ty(), int);
        assert_eq!(Operand::constant(ConstValue::Int(1), int).ty(), int);
    }
}
