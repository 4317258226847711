//! Function splitting.
//!
//! Some targets limit how large a single function body may be. When a
//! function has more instructions than the backend's instruction limit, the
//! instructions of every block are partitioned into callable sub-units of
//! at most the sub-function limit, and the partitioning is repeated over the
//! resulting calls until the block body itself fits the limit. The result is
//! a tree per block:
//!
//! ```text
//! block 3 ── call SF4 ─┬─ call SF0 ── instrs 0..256
//!                      ├─ call SF1 ── instrs 256..512
//!                      └─ ...
//! ```
//!
//! A sub-unit reports how control left it (fell through, returned from the
//! function, or jumped to another block), and every caller propagates that
//! signal outward.

use std::ops::Range;

use crate::ssa::Function;

/// A piece of a block body or sub-unit body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Instructions of the enclosing block, by index.
    Instrs(Range<usize>),
    /// A call to sub-unit `id`.
    Call(usize),
}

impl Segment {
    /// Number of emitted statements this segment accounts for.
    pub fn weight(&self) -> usize {
        match self {
            Segment::Instrs(r) => r.len(),
            Segment::Call(_) => 1,
        }
    }
}

/// A callable sub-unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubUnit {
    pub id: usize,
    /// Block whose instructions this unit holds.
    pub block: usize,
    pub body: Vec<Segment>,
}

impl SubUnit {
    pub fn weight(&self) -> usize {
        self.body.iter().map(Segment::weight).sum()
    }
}

/// How a function's blocks are emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitPlan {
    /// Sub-units in creation order; a unit only calls units created before it.
    pub units: Vec<SubUnit>,
    /// Body of each block, indexed like `Function::blocks`.
    pub blocks: Vec<Vec<Segment>>,
}

impl SplitPlan {
    /// A plan that emits every block inline.
    pub fn inline(func: &Function) -> Self {
        Self {
            units: Vec::new(),
            blocks: func
                .blocks
                .iter()
                .map(|b| vec![Segment::Instrs(0..b.instrs.len())])
                .collect(),
        }
    }

    pub fn is_split(&self) -> bool {
        !self.units.is_empty()
    }

    /// Partitions every block of `func` into sub-units of at most
    /// `sub_limit` statements.
    pub fn partition(func: &Function, sub_limit: usize) -> Self {
        let leaf_size = sub_limit.max(1);
        // a group must hold at least two calls to make progress
        let group_size = sub_limit.max(2);

        let mut plan = SplitPlan::default();
        for (index, block) in func.blocks.iter().enumerate() {
            let n = block.instrs.len();
            let mut level: Vec<usize> = Vec::new();

            let mut start = 0;
            while start < n {
                let end = (start + leaf_size).min(n);
                level.push(plan.push_unit(index, vec![Segment::Instrs(start..end)]));
                start = end;
            }

            while level.len() > group_size {
                let mut next = Vec::with_capacity(level.len().div_ceil(group_size));
                for chunk in level.chunks(group_size) {
                    let body = chunk.iter().map(|id| Segment::Call(*id)).collect();
                    next.push(plan.push_unit(index, body));
                }
                level = next;
            }

            plan.blocks
                .push(level.into_iter().map(Segment::Call).collect());
        }

        log::debug!(
            "split {} into {} sub-units (limit {})",
            func.name,
            plan.units.len(),
            sub_limit
        );
        plan
    }

    fn push_unit(&mut self, block: usize, body: Vec<Segment>) -> usize {
        let id = self.units.len();
        self.units.push(SubUnit { id, block, body });
        id
    }
}

/// Chooses inline or partitioned emission for a function.
pub fn plan_function(func: &Function, instruction_limit: usize, sub_limit: usize) -> SplitPlan {
    if func.instruction_count() > instruction_limit {
        SplitPlan::partition(func, sub_limit)
    } else {
        SplitPlan::inline(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::builder::int_const;
    use crate::ssa::{BasicKind, BinOp, FunctionBuilder, InstrKind, TypeTable};

    fn long_function(n: usize) -> Function {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let sig = t.signature(vec![], vec![], false);
        let mut b = FunctionBuilder::new("main", "long", sig);
        for i in 0..n {
            b.value(
                int,
                InstrKind::BinOp {
                    op: BinOp::Add,
                    x: int_const(i as i64, int),
                    y: int_const(1, int),
                },
            );
        }
        b.ret(vec![]);
        b.build()
    }

    #[test]
    fn test_small_function_is_inline() {
        let f = long_function(10);
        let plan = plan_function(&f, 512, 256);
        assert!(!plan.is_split());
        assert_eq!(plan.blocks, vec![vec![Segment::Instrs(0..11)]]);
    }

    #[test]
    fn test_units_respect_limit() {
        let f = long_function(99);
        let plan = plan_function(&f, 20, 4);
        assert!(plan.is_split());
        for unit in &plan.units {
            assert!(unit.weight() <= 4, "unit {} too large", unit.id);
        }
        let body: usize = plan.blocks[0].iter().map(Segment::weight).sum();
        assert!(body <= 4);
    }

    #[test]
    fn test_units_cover_every_instruction_once() {
        let f = long_function(37);
        let plan = SplitPlan::partition(&f, 5);
        let mut covered = vec![0usize; 38];
        for unit in &plan.units {
            for seg in &unit.body {
                if let Segment::Instrs(r) = seg {
                    for i in r.clone() {
                        covered[i] += 1;
                    }
                }
            }
        }
        assert!(covered.iter().all(|c| *c == 1));
    }

    #[test]
    fn test_units_are_nested_in_creation_order() {
        let f = long_function(60);
        let plan = SplitPlan::partition(&f, 3);
        assert!(plan.units.iter().any(|u| matches!(u.body[0], Segment::Call(_))));
        for unit in &plan.units {
            for seg in &unit.body {
                if let Segment::Call(child) = seg {
                    assert!(*child < unit.id);
                }
            }
        }
    }

    #[test]
    fn test_limit_of_one_terminates() {
        let f = long_function(9);
        let plan = SplitPlan::partition(&f, 1);
        assert!(plan.blocks[0].len() <= 2);
    }
}
