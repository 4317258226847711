//! Function builder.
//!
//! Assembles [`Function`]s block by block. Registers are named `t0`, `t1`,
//! ... in creation order; control-flow helpers keep predecessor and
//! successor lists consistent.

use super::{
    BasicBlock, ConstValue, Function, InstrKind, Instruction, Operand, Param, Pos, Register, Ty,
};

/// Builder for a single function.
pub struct FunctionBuilder {
    function: Function,
    current_block: usize,
    next_register: usize,
    pos: Pos,
}

impl FunctionBuilder {
    /// Creates a builder with one empty entry block.
    pub fn new(package: impl Into<String>, name: impl Into<String>, sig: Ty) -> Self {
        let mut function = Function {
            package: package.into(),
            name: name.into(),
            receiver: None,
            params: Vec::new(),
            free_vars: Vec::new(),
            sig,
            blocks: Vec::new(),
            pos: Pos::default(),
        };
        function.blocks.push(BasicBlock {
            index: 0,
            comment: "entry".to_string(),
            ..BasicBlock::default()
        });
        Self {
            function,
            current_block: 0,
            next_register: 0,
            pos: Pos::default(),
        }
    }

    /// Adds a parameter and returns it as an operand.
    pub fn param(&mut self, name: impl Into<String>, ty: Ty) -> Operand {
        let p = Param::new(name, ty);
        self.function.params.push(p.clone());
        Operand::Param(p)
    }

    /// Sets the method receiver.
    pub fn receiver(&mut self, name: impl Into<String>, ty: Ty) -> Operand {
        let p = Param::new(name, ty);
        self.function.receiver = Some(p.clone());
        Operand::Param(p)
    }

    /// Adds a closure binding.
    pub fn free_var(&mut self, name: impl Into<String>, ty: Ty) -> Operand {
        let index = self.function.free_vars.len();
        let name = name.into();
        self.function.free_vars.push(Param::new(name.clone(), ty));
        Operand::FreeVar { index, name, ty }
    }

    /// Position attached to subsequently added instructions.
    pub fn set_pos(&mut self, pos: Pos) {
        if self.function.pos.is_unknown() {
            self.function.pos = pos.clone();
        }
        self.pos = pos;
    }

    /// Appends a new block and returns its index.
    pub fn create_block(&mut self, comment: impl Into<String>) -> usize {
        let index = self.function.blocks.len();
        self.function.blocks.push(BasicBlock {
            index,
            comment: comment.into(),
            ..BasicBlock::default()
        });
        index
    }

    pub fn switch_to_block(&mut self, block: usize) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> usize {
        self.current_block
    }

    /// Appends an instruction with no result.
    pub fn push(&mut self, kind: InstrKind) {
        let instr = Instruction::new(kind).at(self.pos.clone());
        self.function.blocks[self.current_block].instrs.push(instr);
    }

    /// Appends an instruction producing a fresh register of type `ty`.
    pub fn value(&mut self, ty: Ty, kind: InstrKind) -> Register {
        let reg = Register::new(format!("t{}", self.next_register), ty);
        self.next_register += 1;
        let instr = Instruction::new(kind)
            .with_dest(reg.clone())
            .at(self.pos.clone());
        self.function.blocks[self.current_block].instrs.push(instr);
        reg
    }

    fn link(&mut self, from: usize, to: usize) {
        self.function.blocks[from].succs.push(to);
        self.function.blocks[to].preds.push(from);
    }

    /// Ends the current block with an unconditional jump.
    pub fn jump(&mut self, target: usize) {
        let from = self.current_block;
        self.link(from, target);
        self.push(InstrKind::Jump);
    }

    /// Ends the current block with a two-way branch.
    pub fn branch(&mut self, cond: Operand, then_block: usize, else_block: usize) {
        let from = self.current_block;
        self.link(from, then_block);
        self.link(from, else_block);
        self.push(InstrKind::If { cond });
    }

    /// Ends the current block with a return.
    pub fn ret(&mut self, values: Vec<Operand>) {
        self.push(InstrKind::Ret(values));
    }

    /// Finishes building.
    pub fn build(self) -> Function {
        self.function
    }
}

/// Shorthand for an integer constant operand.
pub fn int_const(value: i64, ty: Ty) -> Operand {
    Operand::constant(ConstValue::Int(value), ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{BasicKind, BinOp, TypeTable};

    #[test]
    fn test_builder_links_blocks() {
        let mut t = TypeTable::new();
        let int = t.basic(BasicKind::Int);
        let bool_ = t.basic(BasicKind::Bool);
        let sig = t.signature(vec![int], vec![int], false);

        let mut b = FunctionBuilder::new("main", "abs", sig);
        let x = b.param("x", int);
        let neg = b.create_block("if.then");
        let done = b.create_block("if.done");
        let cond = b.value(
            bool_,
            InstrKind::BinOp {
                op: BinOp::Lss,
                x: x.clone(),
                y: int_const(0, int),
            },
        );
        b.branch(cond.into(), neg, done);
        b.switch_to_block(neg);
        b.jump(done);
        b.switch_to_block(done);
        b.ret(vec![x]);
        let f = b.build();

        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.blocks[0].succs, vec![1, 2]);
        assert_eq!(f.blocks[2].preds, vec![0, 1]);
        assert_eq!(f.instruction_count(), 4);
        assert_eq!(f.registers().count(), 1);
    }
}
