//! Runtime type metadata model.
//!
//! Generated programs answer reflection-style questions (type name, kind,
//! size, zero value, method lookup, assignability, identity) from a table
//! indexed by registry ID instead of relying on the target's own reflection.
//! This module computes that table once, at the end of a compilation, by
//! replaying the front end's type-relation queries over every registered
//! type. Backends then render it in their own syntax.
//!
//! # Name collisions
//!
//! Distinct types can render the same string form (two `main.T` declared in
//! different scopes). The first keeps its plain name in the name index; every
//! later one is indexed as `"<name>#<id>"` and flagged as a duplicate.

use std::collections::{BTreeSet, HashMap};

use crate::registry::TypeId;
use crate::ssa::{BasicKind, Pos, Ty, TypeKind, TypeTable};

use super::{Backend, EmitCx};

/// Reflect-style kind numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,
    Bool = 1,
    Int = 2,
    Int8 = 3,
    Int16 = 4,
    Int32 = 5,
    Int64 = 6,
    Uint = 7,
    Uint8 = 8,
    Uint16 = 9,
    Uint32 = 10,
    Uint64 = 11,
    Uintptr = 12,
    Float32 = 13,
    Float64 = 14,
    Complex64 = 15,
    Complex128 = 16,
    Array = 17,
    Chan = 18,
    Func = 19,
    Interface = 20,
    Map = 21,
    Ptr = 22,
    Slice = 23,
    String = 24,
    Struct = 25,
    UnsafePointer = 26,
}

impl Kind {
    /// Kind of a type, looking through named types.
    ///
    /// Untyped constants take the kind of their default type. Tuples,
    /// iterators and untyped nil have no runtime kind.
    pub fn of(types: &TypeTable, ty: Ty) -> Kind {
        match types.underlying_kind(ty) {
            TypeKind::Basic(kind) => Self::of_basic(*kind),
            TypeKind::Array { .. } => Kind::Array,
            TypeKind::Chan { .. } => Kind::Chan,
            TypeKind::Signature(_) => Kind::Func,
            TypeKind::Interface(_) => Kind::Interface,
            TypeKind::Map { .. } => Kind::Map,
            TypeKind::Pointer(_) => Kind::Ptr,
            TypeKind::Slice(_) => Kind::Slice,
            TypeKind::Struct(_) => Kind::Struct,
            TypeKind::Named(_) | TypeKind::Tuple(_) | TypeKind::Opaque(_) => Kind::Invalid,
        }
    }

    fn of_basic(kind: BasicKind) -> Kind {
        use BasicKind as B;
        match kind {
            B::Bool | B::UntypedBool => Kind::Bool,
            B::Int | B::UntypedInt => Kind::Int,
            B::Int8 => Kind::Int8,
            B::Int16 => Kind::Int16,
            B::Int32 | B::UntypedRune => Kind::Int32,
            B::Int64 => Kind::Int64,
            B::Uint => Kind::Uint,
            B::Uint8 => Kind::Uint8,
            B::Uint16 => Kind::Uint16,
            B::Uint32 => Kind::Uint32,
            B::Uint64 => Kind::Uint64,
            B::Uintptr => Kind::Uintptr,
            B::Float32 => Kind::Float32,
            B::Float64 | B::UntypedFloat => Kind::Float64,
            B::Complex64 => Kind::Complex64,
            B::Complex128 | B::UntypedComplex => Kind::Complex128,
            B::String | B::UntypedString => Kind::String,
            B::UnsafePointer => Kind::UnsafePointer,
            B::UntypedNil => Kind::Invalid,
        }
    }
}

/// Metadata for one registered type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfoEntry {
    pub id: TypeId,
    pub ty: Ty,
    pub valid: bool,
    pub size: u64,
    pub align: u64,
    pub field_align: u64,
    pub kind: Kind,
    /// Full rendering, e.g. `*main.Point`.
    pub string_form: String,
    /// Short name of named types, empty otherwise.
    pub name: String,
    /// Key of this type in the name index.
    pub index_name: String,
    /// Target zero value, `null` when the lowering is empty.
    pub zero: String,
    /// Bound to a target-native class.
    pub native: bool,
    /// False for interface types.
    pub concrete: bool,
    /// Another registered type has the same string form and a lower ID.
    pub duplicate: bool,
}

/// Where a method-table entry dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodTarget {
    /// Callable reference to the generated wrapper.
    Wrapper(String),
    /// Declared in a native-mapped package; not reachable through a boxed
    /// interface call.
    NativeSkipped { package: String },
}

/// One method-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub id: TypeId,
    pub name: String,
    pub target: MethodTarget,
}

/// The complete runtime type metadata of a compilation.
#[derive(Debug, Clone, Default)]
pub struct TypeInfoTable {
    entries: Vec<TypeInfoEntry>,
    names: Vec<(String, TypeId)>,
    name_index: HashMap<String, TypeId>,
    assignable: BTreeSet<(TypeId, TypeId)>,
    identical: BTreeSet<(TypeId, TypeId)>,
    methods: Vec<MethodEntry>,
}

impl TypeInfoTable {
    /// Builds the table from every type registered so far.
    ///
    /// Zero values and native bindings come from `backend`. Types with no
    /// runtime kind are recorded as invalid and reported as errors.
    pub fn build(backend: &dyn Backend, cx: &mut EmitCx<'_>) -> Self {
        let registered: Vec<(TypeId, Ty)> = cx.registry.iter().collect();
        let types = cx.types;
        let mut table = TypeInfoTable::default();
        let mut first_by_name: HashMap<String, TypeId> = HashMap::new();

        for (id, ty) in &registered {
            let (id, ty) = (*id, *ty);
            let kind = Kind::of(types, ty);
            let string_form = types.type_string(ty);
            if kind == Kind::Invalid {
                cx.error(
                    &Pos::default(),
                    format!("no runtime type information for {} (id {})", string_form, id),
                );
            }

            let zero = backend.lang_type(cx, ty, true, &Pos::default());
            let zero = if zero.is_empty() { "null".to_string() } else { zero };

            let duplicate = first_by_name.contains_key(&string_form);
            let index_name = if duplicate {
                format!("{}#{}", string_form, id)
            } else {
                first_by_name.insert(string_form.clone(), id);
                string_form.clone()
            };

            table.entries.push(TypeInfoEntry {
                id,
                ty,
                valid: kind != Kind::Invalid,
                size: cx.sizes.sizeof(types, ty),
                align: cx.sizes.alignof(types, ty),
                field_align: cx.sizes.alignof(types, types.underlying(ty)),
                kind,
                name: types.as_named(ty).map(|n| n.name.clone()).unwrap_or_default(),
                index_name: index_name.clone(),
                string_form,
                zero,
                native: backend.native_class(types, ty).is_some(),
                concrete: !types.is_interface(ty),
                duplicate,
            });
            table.names.push((index_name.clone(), id));
            table.name_index.insert(index_name, id);
        }

        for (v_id, v) in &registered {
            for (t_id, t) in &registered {
                if types.identical(*v, *t) {
                    table.identical.insert((*v_id, *t_id));
                }
                if types.assignable_to(*v, *t) {
                    table.assignable.insert((*v_id, *t_id));
                }
            }
        }

        let requested: Vec<(TypeId, Ty)> = cx.registry.types_with_method_sets().collect();
        for (id, ty) in requested {
            for sel in types.method_set(ty) {
                let target = if backend.is_native_package(&sel.package) {
                    MethodTarget::NativeSkipped {
                        package: sel.package.clone(),
                    }
                } else {
                    MethodTarget::Wrapper(backend.method_target(types, ty, &sel.name))
                };
                table.methods.push(MethodEntry {
                    id,
                    name: sel.name,
                    target,
                });
            }
        }

        log::debug!(
            "type info: {} types, {} methods",
            table.entries.len(),
            table.methods.len()
        );
        table
    }

    /// The ID the generated program's `nextTypeID` holds.
    pub fn next_type_id(&self) -> u32 {
        self.entries.len() as u32 + 1
    }

    /// Entries in ID order.
    pub fn entries(&self) -> &[TypeInfoEntry] {
        &self.entries
    }

    pub fn entry(&self, id: TypeId) -> Option<&TypeInfoEntry> {
        if !id.is_valid() {
            return None;
        }
        self.entries.get(id.0 as usize - 1)
    }

    /// Name index in ID order.
    pub fn names(&self) -> &[(String, TypeId)] {
        &self.names
    }

    /// Looks up a type by index name; [`TypeId::INVALID`] if absent.
    pub fn get_id(&self, name: &str) -> TypeId {
        self.name_index.get(name).copied().unwrap_or(TypeId::INVALID)
    }

    pub fn is_duplicate(&self, id: TypeId) -> bool {
        self.entry(id).is_some_and(|e| e.duplicate)
    }

    pub fn is_assignable_to(&self, v: TypeId, t: TypeId) -> bool {
        self.assignable.contains(&(v, t))
    }

    pub fn is_identical(&self, v: TypeId, t: TypeId) -> bool {
        self.identical.contains(&(v, t))
    }

    pub fn assignable_pairs(&self) -> impl Iterator<Item = &(TypeId, TypeId)> {
        self.assignable.iter()
    }

    pub fn identical_pairs(&self) -> impl Iterator<Item = &(TypeId, TypeId)> {
        self.identical.iter()
    }

    pub fn is_concrete(&self, id: TypeId) -> bool {
        self.entry(id).is_some_and(|e| e.concrete)
    }

    /// The check behind a type assertion of a boxed value with dynamic type
    /// `dynamic` to type `asserted`.
    ///
    /// Concrete targets require identity; interface targets require
    /// assignability. A nil interface (ID 0) never satisfies an assertion.
    pub fn assert_ok(&self, dynamic: TypeId, asserted: TypeId) -> bool {
        if !dynamic.is_valid() {
            return false;
        }
        if self.is_concrete(asserted) {
            self.is_identical(dynamic, asserted)
        } else {
            self.is_assignable_to(dynamic, asserted)
        }
    }

    /// Method-table entries, grouped by type ID.
    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn method(&self, id: TypeId, name: &str) -> Option<&MethodTarget> {
        self.methods
            .iter()
            .find(|m| m.id == id && m.name == name)
            .map(|m| &m.target)
    }
}
