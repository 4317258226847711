//! Standard type sizing.
//!
//! Sizes, alignments and field offsets of source types for a target with a
//! given word size and maximum alignment. The Haxe target uses a 4-byte word
//! and an 8-byte maximum alignment.

use super::types::{BasicKind, Ty, TypeKind, TypeTable};

/// Sizing rules parameterised by word size and maximum alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdSizes {
    pub word_size: u64,
    pub max_align: u64,
}

impl Default for StdSizes {
    fn default() -> Self {
        Self {
            word_size: 4,
            max_align: 8,
        }
    }
}

fn align_up(x: u64, a: u64) -> u64 {
    if a == 0 { x } else { x.div_ceil(a) * a }
}

impl StdSizes {
    /// Alignment of a type in bytes.
    pub fn alignof(&self, types: &TypeTable, ty: Ty) -> u64 {
        match types.underlying_kind(ty) {
            TypeKind::Array { elem, .. } => self.alignof(types, *elem),
            TypeKind::Struct(fields) => fields
                .iter()
                .map(|f| self.alignof(types, f.ty))
                .max()
                .unwrap_or(1),
            TypeKind::Slice(_) | TypeKind::Interface(_) => self.word_size,
            TypeKind::Basic(BasicKind::String) => self.word_size,
            _ => {
                let size = self.sizeof(types, ty);
                size.clamp(1, self.max_align)
            }
        }
    }

    /// Byte offsets of each field of a struct.
    pub fn offsetsof(&self, types: &TypeTable, fields: &[super::types::Field]) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for field in fields {
            let a = self.alignof(types, field.ty);
            offset = align_up(offset, a);
            offsets.push(offset);
            offset += self.sizeof(types, field.ty);
        }
        offsets
    }

    /// Size of a type in bytes.
    pub fn sizeof(&self, types: &TypeTable, ty: Ty) -> u64 {
        match types.underlying_kind(ty) {
            TypeKind::Basic(kind) => self.basic_size(*kind),
            TypeKind::Array { elem, len } => {
                if *len == 0 {
                    return 0;
                }
                let a = self.alignof(types, *elem);
                let z = self.sizeof(types, *elem);
                align_up(z, a) * (len - 1) + z
            }
            TypeKind::Slice(_) => self.word_size * 3,
            TypeKind::Struct(fields) => {
                if fields.is_empty() {
                    return 0;
                }
                let offsets = self.offsetsof(types, fields);
                let last = fields.len() - 1;
                let end = offsets[last] + self.sizeof(types, fields[last].ty);
                align_up(end, self.alignof(types, ty))
            }
            TypeKind::Interface(_) => self.word_size * 2,
            TypeKind::Tuple(elems) => elems.iter().map(|e| self.sizeof(types, *e)).sum(),
            _ => self.word_size,
        }
    }

    fn basic_size(&self, kind: BasicKind) -> u64 {
        use BasicKind::*;
        match kind {
            Bool | Int8 | Uint8 | UntypedBool => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 | Float32 | UntypedRune => 4,
            Int64 | Uint64 | Float64 | Complex64 | UntypedFloat => 8,
            Complex128 | UntypedComplex => 16,
            String | UntypedString => self.word_size * 2,
            _ => self.word_size,
        }
    }
}
