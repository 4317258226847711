//! Type encounter registry.
//!
//! Every distinct source type the backend emits code for gets a stable
//! integer ID the first time it is seen. The generated program uses these IDs
//! for interface boxing, type switches and assertions, and the runtime
//! metadata emitter builds its tables in ID order.
//!
//! IDs start at 1 and are never reused; 0 means "no type" (a nil interface).
//! The registry is owned by one compilation; concurrent compilations each
//! have their own.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::ssa::Ty;

/// Runtime type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The reserved "absent" ID.
    pub const INVALID: TypeId = TypeId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Insertion-ordered `Ty → TypeId` map.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    ids: HashMap<Ty, TypeId>,
    /// Indexed by `id - 1`.
    order: Vec<Ty>,
    method_sets: BTreeSet<TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a use of `ty`, returning its ID (assigning one if new).
    pub fn log_type_use(&mut self, ty: Ty) -> TypeId {
        if let Some(&id) = self.ids.get(&ty) {
            return id;
        }
        self.order.push(ty);
        let id = TypeId(self.order.len() as u32);
        self.ids.insert(ty, id);
        id
    }

    /// ID of an already registered type.
    pub fn id(&self, ty: Ty) -> Option<TypeId> {
        self.ids.get(&ty).copied()
    }

    /// Type registered under `id`.
    pub fn ty(&self, id: TypeId) -> Option<Ty> {
        if !id.is_valid() {
            return None;
        }
        self.order.get(id.0 as usize - 1).copied()
    }

    /// The ID the next new type would receive.
    pub fn next_id(&self) -> TypeId {
        TypeId(self.order.len() as u32 + 1)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered types in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, Ty)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32 + 1), *ty))
    }

    /// Registers `ty` and marks its method set as needed at run time.
    pub fn request_method_set(&mut self, ty: Ty) -> TypeId {
        let id = self.log_type_use(ty);
        self.method_sets.insert(id);
        id
    }

    pub fn method_set_requested(&self, id: TypeId) -> bool {
        self.method_sets.contains(&id)
    }

    /// Types whose method sets were requested, in ID order.
    pub fn types_with_method_sets(&self) -> impl Iterator<Item = (TypeId, Ty)> + '_ {
        self.method_sets
            .iter()
            .filter_map(|id| self.ty(*id).map(|ty| (*id, ty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{BasicKind, TypeTable};

    #[test]
    fn test_ids_start_at_one_and_are_stable() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let s = t.basic(BasicKind::String);
        let mut reg = TypeRegistry::new();

        assert_eq!(reg.next_id(), TypeId(1));
        let a = reg.log_type_use(int);
        let b = reg.log_type_use(s);
        let again = reg.log_type_use(int);

        assert_eq!(a, TypeId(1));
        assert_eq!(b, TypeId(2));
        assert_eq!(again, a);
        assert_eq!(reg.len(), 2);
        assert!(reg.iter().all(|(id, _)| id.is_valid()));
    }

    #[test]
    fn test_lookup_both_ways() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let mut reg = TypeRegistry::new();
        let id = reg.log_type_use(int);
        assert_eq!(reg.id(int), Some(id));
        assert_eq!(reg.ty(id), Some(int));
        assert_eq!(reg.ty(TypeId::INVALID), None);
        assert_eq!(reg.ty(TypeId(99)), None);
    }

    #[test]
    fn test_method_set_requests() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let s = t.basic(BasicKind::String);
        let mut reg = TypeRegistry::new();
        reg.log_type_use(int);
        let id = reg.request_method_set(s);
        assert!(reg.method_set_requested(id));
        assert!(!reg.method_set_requested(TypeId(1)));
        assert_eq!(reg.types_with_method_sets().collect::<Vec<_>>(), vec![(id, s)]);
    }
}
