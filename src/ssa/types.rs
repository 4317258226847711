//! Source type system for the SSA input.
//!
//! This module models the front end's type universe: the handles every other
//! part of the backend passes around, and the type-relation queries
//! (identity, assignability, method sets) that the runtime metadata emitter
//! replays at compile time.
//!
//! # Representation
//!
//! Types live in a [`TypeTable`] and are referred to by copyable [`Ty`]
//! handles. Structural (unnamed) types are hash-consed, so two identical
//! structural types always share one handle. Named types are nominal: every
//! call to [`TypeTable::named`] creates a distinct type, even when the name
//! repeats. Together these make type identity a handle comparison.
//!
//! Named types may refer to themselves through pointers, slices, maps and so
//! on; the underlying type is attached after creation with
//! [`TypeTable::set_underlying`].

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Name of the opaque placeholder a named type holds until its underlying
/// type is attached.
pub const INCOMPLETE: &str = "<incomplete>";

/// Handle to a type in a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ty(u32);

impl Ty {
    /// Index of this type inside its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic (predeclared) type kinds.
///
/// `byte` and `rune` are aliases of [`BasicKind::Uint8`] and
/// [`BasicKind::Int32`]; the untyped kinds only appear on constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    /// Returns true for every integer kind, typed or untyped.
    pub fn is_integer(self) -> bool {
        use BasicKind::*;
        matches!(
            self,
            Int | Int8
                | Int16
                | Int32
                | Int64
                | Uint
                | Uint8
                | Uint16
                | Uint32
                | Uint64
                | Uintptr
                | UntypedInt
                | UntypedRune
        )
    }

    /// Returns true for the unsigned integer kinds.
    pub fn is_unsigned(self) -> bool {
        use BasicKind::*;
        matches!(self, Uint | Uint8 | Uint16 | Uint32 | Uint64 | Uintptr)
    }

    /// Returns true for floating-point kinds.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat
        )
    }

    /// Returns true for complex kinds.
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UntypedComplex
        )
    }

    /// Returns true for numeric kinds (integer, float or complex).
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    /// Returns true for string kinds.
    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    /// Returns true for the untyped constant kinds.
    pub fn is_untyped(self) -> bool {
        use BasicKind::*;
        matches!(
            self,
            UntypedBool
                | UntypedInt
                | UntypedRune
                | UntypedFloat
                | UntypedComplex
                | UntypedString
                | UntypedNil
        )
    }

    /// Bit width of an integer kind, assuming a 32-bit word.
    ///
    /// Returns `None` for non-integer kinds and untyped integers.
    pub fn int_bits(self) -> Option<u32> {
        use BasicKind::*;
        match self {
            Int8 | Uint8 => Some(8),
            Int16 | Uint16 => Some(16),
            Int32 | Uint32 | Int | Uint | Uintptr | UntypedRune => Some(32),
            Int64 | Uint64 => Some(64),
            _ => None,
        }
    }

    /// The name used when rendering the type.
    pub fn name(self) -> &'static str {
        use BasicKind::*;
        match self {
            Bool => "bool",
            Int => "int",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Uint => "uint",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Uintptr => "uintptr",
            Float32 => "float32",
            Float64 => "float64",
            Complex64 => "complex64",
            Complex128 => "complex128",
            String => "string",
            UnsafePointer => "unsafe.Pointer",
            UntypedBool => "untyped bool",
            UntypedInt => "untyped int",
            UntypedRune => "untyped rune",
            UntypedFloat => "untyped float",
            UntypedComplex => "untyped complex",
            UntypedString => "untyped string",
            UntypedNil => "untyped nil",
        }
    }
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    /// Embedded (anonymous) field, whose methods are promoted.
    pub embedded: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
        }
    }

    pub fn embedded(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: true,
        }
    }
}

/// A function signature, excluding any receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub results: Vec<Ty>,
    /// The last parameter is a `...T` slice.
    pub variadic: bool,
}

/// A method declared in an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    pub name: String,
    /// A [`TypeKind::Signature`] type.
    pub sig: Ty,
}

/// A method declared on a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    pub sig: Ty,
    /// Declared with a `*T` receiver.
    pub pointer_receiver: bool,
}

/// A nominal type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    /// Full import path of the declaring package (empty for universe types).
    pub package: String,
    pub name: String,
    pub underlying: Ty,
    pub methods: Vec<Method>,
}

/// The closed set of type variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic(BasicKind),
    Named(NamedType),
    Pointer(Ty),
    Slice(Ty),
    Array { elem: Ty, len: u64 },
    Struct(Vec<Field>),
    Map { key: Ty, value: Ty },
    Chan { elem: Ty, dir: ChanDir },
    Signature(Signature),
    /// Methods sorted by name; embedded interfaces are already flattened.
    Interface(Vec<InterfaceMethod>),
    /// Multiple results of a call.
    Tuple(Vec<Ty>),
    /// Internal type with no source-level counterpart (range iterators).
    Opaque(String),
}

/// An entry of a method set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The type whose method set this is.
    pub recv: Ty,
    pub name: String,
    pub sig: Ty,
    /// Import path of the package declaring the method.
    pub package: String,
    /// Reaching the method requires dereferencing a pointer.
    pub indirect: bool,
    /// Depth of embedding the method was promoted through (0 = declared).
    pub depth: usize,
}

/// The front end's type universe.
#[derive(Debug, Default)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    interned: HashMap<TypeKind, Ty>,
}

impl TypeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: TypeKind) -> Ty {
        if let Some(&ty) = self.interned.get(&kind) {
            return ty;
        }
        let ty = self.push(kind.clone());
        self.interned.insert(kind, ty);
        ty
    }

    fn push(&mut self, kind: TypeKind) -> Ty {
        let ty = Ty(self.kinds.len() as u32);
        self.kinds.push(kind);
        ty
    }

    /// Number of types in the table.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn basic(&mut self, kind: BasicKind) -> Ty {
        self.intern(TypeKind::Basic(kind))
    }

    pub fn pointer(&mut self, elem: Ty) -> Ty {
        self.intern(TypeKind::Pointer(elem))
    }

    pub fn slice(&mut self, elem: Ty) -> Ty {
        self.intern(TypeKind::Slice(elem))
    }

    pub fn array(&mut self, elem: Ty, len: u64) -> Ty {
        self.intern(TypeKind::Array { elem, len })
    }

    pub fn struct_type(&mut self, fields: Vec<Field>) -> Ty {
        self.intern(TypeKind::Struct(fields))
    }

    pub fn map(&mut self, key: Ty, value: Ty) -> Ty {
        self.intern(TypeKind::Map { key, value })
    }

    pub fn chan(&mut self, elem: Ty, dir: ChanDir) -> Ty {
        self.intern(TypeKind::Chan { elem, dir })
    }

    pub fn signature(&mut self, params: Vec<Ty>, results: Vec<Ty>, variadic: bool) -> Ty {
        self.intern(TypeKind::Signature(Signature {
            params,
            results,
            variadic,
        }))
    }

    /// Creates an interface type. Method order does not matter.
    pub fn interface(&mut self, mut methods: Vec<InterfaceMethod>) -> Ty {
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods.dedup_by(|a, b| a.name == b.name);
        self.intern(TypeKind::Interface(methods))
    }

    pub fn tuple(&mut self, elems: Vec<Ty>) -> Ty {
        self.intern(TypeKind::Tuple(elems))
    }

    pub fn opaque(&mut self, name: impl Into<String>) -> Ty {
        self.intern(TypeKind::Opaque(name.into()))
    }

    /// Declares a new named type.
    ///
    /// Until [`TypeTable::set_underlying`] is called the underlying type is an
    /// opaque placeholder, which lets self-referencing declarations be built.
    pub fn named(&mut self, package: impl Into<String>, name: impl Into<String>) -> Ty {
        let placeholder = self.opaque(INCOMPLETE);
        self.push(TypeKind::Named(NamedType {
            package: package.into(),
            name: name.into(),
            underlying: placeholder,
            methods: Vec::new(),
        }))
    }

    /// Attaches the underlying type of a named type.
    ///
    /// `underlying` may itself be a named type that is not complete yet;
    /// chains are followed by [`TypeTable::underlying`].
    pub fn set_underlying(&mut self, named: Ty, underlying: Ty) {
        if let TypeKind::Named(n) = &mut self.kinds[named.index()] {
            n.underlying = underlying;
        }
    }

    /// Declares a method on a named type.
    pub fn add_method(
        &mut self,
        named: Ty,
        name: impl Into<String>,
        sig: Ty,
        pointer_receiver: bool,
    ) {
        if let TypeKind::Named(n) = &mut self.kinds[named.index()] {
            n.methods.push(Method {
                name: name.into(),
                sig,
                pointer_receiver,
            });
        }
    }

    pub fn kind(&self, ty: Ty) -> &TypeKind {
        &self.kinds[ty.index()]
    }

    /// Follows named types down to a structural type.
    ///
    /// A cycle of named types has no structural type and resolves to the
    /// incomplete placeholder.
    pub fn underlying(&self, ty: Ty) -> Ty {
        let mut current = ty;
        for _ in 0..self.kinds.len() {
            match self.kind(current) {
                TypeKind::Named(n) => current = n.underlying,
                _ => return current,
            }
        }
        self.interned
            .get(&TypeKind::Opaque(INCOMPLETE.to_string()))
            .copied()
            .unwrap_or(current)
    }

    /// Kind of the underlying type.
    pub fn underlying_kind(&self, ty: Ty) -> &TypeKind {
        self.kind(self.underlying(ty))
    }

    /// Basic kind of the underlying type, if it is basic.
    pub fn basic_kind(&self, ty: Ty) -> Option<BasicKind> {
        match self.underlying_kind(ty) {
            TypeKind::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_named(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TypeKind::Named(_))
    }

    pub fn as_named(&self, ty: Ty) -> Option<&NamedType> {
        match self.kind(ty) {
            TypeKind::Named(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_interface(&self, ty: Ty) -> bool {
        matches!(self.underlying_kind(ty), TypeKind::Interface(_))
    }

    /// Element type of pointers, slices, arrays and channels.
    pub fn elem(&self, ty: Ty) -> Option<Ty> {
        match self.underlying_kind(ty) {
            TypeKind::Pointer(e) | TypeKind::Slice(e) => Some(*e),
            TypeKind::Array { elem, .. } | TypeKind::Chan { elem, .. } => Some(*elem),
            TypeKind::Map { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Fields of a struct type (through named and one pointer indirection).
    pub fn struct_fields(&self, ty: Ty) -> Option<&[Field]> {
        match self.underlying_kind(ty) {
            TypeKind::Struct(fields) => Some(fields),
            TypeKind::Pointer(elem) => match self.underlying_kind(*elem) {
                TypeKind::Struct(fields) => Some(fields),
                _ => None,
            },
            _ => None,
        }
    }

    /// Type identity.
    ///
    /// Structural types are hash-consed and named types are nominal, so two
    /// types are identical exactly when their handles are equal.
    pub fn identical(&self, a: Ty, b: Ty) -> bool {
        a == b
    }

    /// Reports whether a value of type `v` is assignable to type `t`.
    pub fn assignable_to(&self, v: Ty, t: Ty) -> bool {
        if self.identical(v, t) {
            return true;
        }

        let vu = self.underlying(v);
        let tu = self.underlying(t);

        if let TypeKind::Basic(kind) = self.kind(v)
            && kind.is_untyped()
        {
            return self.untyped_assignable(*kind, tu);
        }

        let either_unnamed = !self.is_named(v) || !self.is_named(t);

        if self.identical(vu, tu) && either_unnamed {
            return true;
        }

        if let TypeKind::Interface(_) = self.kind(tu) {
            return self.implements(v, t);
        }

        if let (
            TypeKind::Chan {
                elem: ve,
                dir: ChanDir::Both,
            },
            TypeKind::Chan { elem: te, .. },
        ) = (self.kind(vu), self.kind(tu))
        {
            return self.identical(*ve, *te) && either_unnamed;
        }

        false
    }

    fn untyped_assignable(&self, kind: BasicKind, target_underlying: Ty) -> bool {
        let target = self.kind(target_underlying);
        if let TypeKind::Interface(methods) = target {
            return methods.is_empty() && kind != BasicKind::UntypedNil;
        }
        match kind {
            BasicKind::UntypedNil => matches!(
                target,
                TypeKind::Pointer(_)
                    | TypeKind::Signature(_)
                    | TypeKind::Slice(_)
                    | TypeKind::Map { .. }
                    | TypeKind::Chan { .. }
                    | TypeKind::Basic(BasicKind::UnsafePointer)
            ),
            BasicKind::UntypedBool => matches!(target, TypeKind::Basic(BasicKind::Bool)),
            BasicKind::UntypedInt | BasicKind::UntypedRune => {
                matches!(target, TypeKind::Basic(k) if k.is_numeric())
            }
            BasicKind::UntypedFloat => {
                matches!(target, TypeKind::Basic(k) if k.is_float() || k.is_complex())
            }
            BasicKind::UntypedComplex => matches!(target, TypeKind::Basic(k) if k.is_complex()),
            BasicKind::UntypedString => matches!(target, TypeKind::Basic(BasicKind::String)),
            _ => false,
        }
    }

    /// Reports whether `v` implements the interface `iface`.
    pub fn implements(&self, v: Ty, iface: Ty) -> bool {
        let TypeKind::Interface(wanted) = self.underlying_kind(iface) else {
            return false;
        };
        if wanted.is_empty() {
            return true;
        }
        let have = self.method_set(v);
        wanted.iter().all(|m| {
            have.iter()
                .any(|s| s.name == m.name && self.identical(s.sig, m.sig))
        })
    }

    /// Computes the method set of a type.
    ///
    /// A value type `T` gets the value-receiver methods of `T`; `*T` gets
    /// every method of `T`; methods of embedded fields are promoted, the
    /// shallowest declaration of a name winning. A name declared more than
    /// once at its shallowest depth is ambiguous and left out. Interfaces
    /// report their own methods. The result is sorted by method name.
    pub fn method_set(&self, ty: Ty) -> Vec<Selection> {
        if let TypeKind::Interface(methods) = self.underlying_kind(ty) {
            let package = self.as_named(ty).map(|n| n.package.clone()).unwrap_or_default();
            return methods
                .iter()
                .map(|m| Selection {
                    recv: ty,
                    name: m.name.clone(),
                    sig: m.sig,
                    package: package.clone(),
                    indirect: false,
                    depth: 0,
                })
                .collect();
        }

        let (base, addressable) = match self.kind(ty) {
            TypeKind::Pointer(elem) if self.is_named(*elem) => (*elem, true),
            _ => (ty, false),
        };

        let mut found: Vec<Selection> = Vec::new();
        // names selected (or made ambiguous) at a shallower depth
        let mut blocked: HashSet<String> = HashSet::new();
        let mut visited: HashSet<Ty> = HashSet::new();
        let mut level: Vec<(Ty, bool)> = vec![(base, addressable)];
        let mut depth = 0;

        while !level.is_empty() {
            // fields are recorded without a selection: they shadow but add nothing
            let mut candidates: Vec<(String, Option<Selection>)> = Vec::new();
            let mut next: Vec<(Ty, bool)> = Vec::new();

            for &(current, via_pointer) in &level {
                if visited.contains(&current) {
                    continue;
                }
                if let Some(named) = self.as_named(current) {
                    for m in &named.methods {
                        if m.pointer_receiver && !via_pointer {
                            continue;
                        }
                        candidates.push((
                            m.name.clone(),
                            Some(Selection {
                                recv: ty,
                                name: m.name.clone(),
                                sig: m.sig,
                                package: named.package.clone(),
                                indirect: via_pointer && !m.pointer_receiver,
                                depth,
                            }),
                        ));
                    }
                }

                match self.underlying_kind(current) {
                    TypeKind::Struct(fields) => {
                        for field in fields {
                            candidates.push((field.name.clone(), None));
                            if !field.embedded {
                                continue;
                            }
                            match self.kind(field.ty) {
                                TypeKind::Pointer(elem) => next.push((*elem, true)),
                                _ => next.push((field.ty, via_pointer)),
                            }
                        }
                    }
                    TypeKind::Interface(methods) if depth > 0 => {
                        let package = self
                            .as_named(current)
                            .map(|n| n.package.clone())
                            .unwrap_or_default();
                        for m in methods {
                            candidates.push((
                                m.name.clone(),
                                Some(Selection {
                                    recv: ty,
                                    name: m.name.clone(),
                                    sig: m.sig,
                                    package: package.clone(),
                                    indirect: false,
                                    depth,
                                }),
                            ));
                        }
                    }
                    _ => {}
                }
            }
            visited.extend(level.iter().map(|&(t, _)| t));

            // a name found more than once at one depth is ambiguous
            let mut counts: HashMap<String, usize> = HashMap::new();
            for (name, _) in &candidates {
                *counts.entry(name.clone()).or_default() += 1;
            }
            for (name, sel) in candidates {
                if blocked.contains(&name) || counts[&name] > 1 {
                    continue;
                }
                if let Some(sel) = sel {
                    found.push(sel);
                }
            }
            blocked.extend(counts.into_keys());

            level = next;
            depth += 1;
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Renders a type the way the source language prints it.
    pub fn type_string(&self, ty: Ty) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty);
        out
    }

    fn write_type(&self, out: &mut String, ty: Ty) {
        match self.kind(ty) {
            TypeKind::Basic(kind) => out.push_str(kind.name()),
            TypeKind::Named(n) => {
                if !n.package.is_empty() {
                    out.push_str(&n.package);
                    out.push('.');
                }
                out.push_str(&n.name);
            }
            TypeKind::Pointer(elem) => {
                out.push('*');
                self.write_type(out, *elem);
            }
            TypeKind::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, *elem);
            }
            TypeKind::Array { elem, len } => {
                out.push_str(&format!("[{}]", len));
                self.write_type(out, *elem);
            }
            TypeKind::Struct(fields) => {
                out.push_str("struct{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, field.ty);
                }
                out.push('}');
            }
            TypeKind::Map { key, value } => {
                out.push_str("map[");
                self.write_type(out, *key);
                out.push(']');
                self.write_type(out, *value);
            }
            TypeKind::Chan { elem, dir } => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.write_type(out, *elem);
            }
            TypeKind::Signature(sig) => {
                out.push_str("func");
                self.write_signature(out, sig);
            }
            TypeKind::Interface(methods) => {
                out.push_str("interface{");
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    out.push_str(&m.name);
                    if let TypeKind::Signature(sig) = self.kind(m.sig) {
                        self.write_signature(out, sig);
                    }
                }
                out.push('}');
            }
            TypeKind::Tuple(elems) => {
                out.push('(');
                self.write_list(out, elems, false);
                out.push(')');
            }
            TypeKind::Opaque(name) => out.push_str(name),
        }
    }

    fn write_signature(&self, out: &mut String, sig: &Signature) {
        out.push('(');
        self.write_list(out, &sig.params, sig.variadic);
        out.push(')');
        match sig.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                self.write_type(out, sig.results[0]);
            }
            _ => {
                out.push_str(" (");
                self.write_list(out, &sig.results, false);
                out.push(')');
            }
        }
    }

    fn write_list(&self, out: &mut String, tys: &[Ty], variadic: bool) {
        for (i, ty) in tys.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if variadic && i == tys.len() - 1 {
                out.push_str("...");
                match self.kind(*ty) {
                    TypeKind::Slice(elem) => self.write_type(out, *elem),
                    _ => self.write_type(out, *ty),
                }
            } else {
                self.write_type(out, *ty);
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
