use crate::inst::{Inst, Op};
use crate::types::Ty;
use crate::value::{BlockId, InstId, Operand, ValueId};

/// A basic block: an ordered list of instructions ending in a terminator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    insts: Vec<InstId>,
}

/// A function in SSA form.
///
/// Instructions live in an arena indexed by [`InstId`]; blocks hold ordered
/// lists of those ids. Ids stay stable across insertions and block splits,
/// which is what allows the instrumentation pass to snapshot the instruction
/// list up front and rewrite the function while walking the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
    insts: Vec<Inst>,
    parent: Vec<Option<BlockId>>,
    blocks: Vec<Block>,
}

impl Function {
    /// Create an empty function with a single entry block.
    pub fn new(name: impl Into<String>, params: Vec<Ty>, ret: Ty) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            insts: Vec::new(),
            parent: Vec::new(),
            blocks: vec![Block::default()],
        }
    }

    pub const fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_insts(&self, block: BlockId) -> &[InstId] {
        &self.blocks[block.0 as usize].insts
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0 as usize]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.0 as usize]
    }

    /// All instruction ids currently attached to a block, in block order.
    pub fn all_insts(&self) -> Vec<InstId> {
        self.block_ids()
            .flat_map(|b| self.block_insts(b).to_vec())
            .collect()
    }

    pub fn value_ty(&self, value: ValueId) -> Ty {
        match value {
            ValueId::Arg(i) => self.params[i as usize].clone(),
            ValueId::Inst(id) => self.inst(id).ty.clone(),
        }
    }

    pub fn operand_ty(&self, operand: &Operand) -> Ty {
        match operand {
            Operand::Value(v) => self.value_ty(*v),
            Operand::Const(c) => c.ty(),
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        BlockId(self.blocks.len() as u32 - 1)
    }

    fn alloc(&mut self, inst: Inst, block: BlockId) -> InstId {
        self.insts.push(inst);
        self.parent.push(Some(block));
        InstId(self.insts.len() as u32 - 1)
    }

    /// Append an instruction at the end of a block.
    pub fn append(&mut self, block: BlockId, inst: Inst) -> InstId {
        let id = self.alloc(inst, block);
        self.blocks[block.0 as usize].insts.push(id);
        id
    }

    /// Insert an instruction at a position within a block.
    pub fn insert_at(&mut self, block: BlockId, index: usize, inst: Inst) -> InstId {
        let id = self.alloc(inst, block);
        self.blocks[block.0 as usize].insts.insert(index, id);
        id
    }

    /// Insert an instruction directly before another.
    pub fn insert_before(&mut self, before: InstId, inst: Inst) -> InstId {
        let (block, index) = self.position(before).expect("instruction is detached");
        self.insert_at(block, index, inst)
    }

    /// Insert an instruction directly after another.
    pub fn insert_after(&mut self, after: InstId, inst: Inst) -> InstId {
        let (block, index) = self.position(after).expect("instruction is detached");
        self.insert_at(block, index + 1, inst)
    }

    pub fn block_of(&self, id: InstId) -> Option<BlockId> {
        self.parent[id.0 as usize]
    }

    /// Block and in-block index of an attached instruction.
    pub fn position(&self, id: InstId) -> Option<(BlockId, usize)> {
        let block = self.parent[id.0 as usize]?;
        let index = self.blocks[block.0 as usize]
            .insts
            .iter()
            .position(|&i| i == id)?;
        Some((block, index))
    }

    /// The instruction following `id` in its block, if any.
    pub fn next_inst(&self, id: InstId) -> Option<InstId> {
        let (block, index) = self.position(id)?;
        self.blocks[block.0 as usize].insts.get(index + 1).copied()
    }

    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.blocks[block.0 as usize].insts.last()?;
        self.inst(last).op.is_terminator().then_some(last)
    }

    /// Index of the first non-PHI instruction of a block (the block length if
    /// every instruction is a PHI).
    pub fn first_non_phi_index(&self, block: BlockId) -> usize {
        self.block_insts(block)
            .iter()
            .position(|&i| !self.inst(i).op.is_phi())
            .unwrap_or_else(|| self.block_insts(block).len())
    }

    pub fn preds(&self, block: BlockId) -> Vec<BlockId> {
        self.block_ids()
            .filter(|&b| {
                self.terminator(b)
                    .is_some_and(|t| self.inst(t).op.successors().contains(&block))
            })
            .collect()
    }

    /// Swap out the operation of an instruction, keeping its id and type.
    pub fn replace_op(&mut self, id: InstId, op: Op) {
        self.inst_mut(id).op = op;
    }

    /// Detach an instruction from its block. Its id remains allocated but is
    /// no longer reachable through any block.
    pub fn remove_inst(&mut self, id: InstId) {
        if let Some((block, index)) = self.position(id) {
            self.blocks[block.0 as usize].insts.remove(index);
            self.parent[id.0 as usize] = None;
        }
    }

    /// Replace every use of a value with another operand.
    pub fn replace_uses(&mut self, of: ValueId, with: &Operand) {
        for inst in &mut self.insts {
            inst.op.for_each_operand_mut(|operand| {
                if operand.value() == Some(of) {
                    *operand = with.clone();
                }
            });
        }
    }

    /// Whether any attached instruction uses the value.
    pub fn has_uses(&self, of: ValueId) -> bool {
        self.all_insts().iter().any(|&id| {
            let mut used = false;
            self.inst(id).op.for_each_operand(|operand| {
                used |= operand.value() == Some(of);
            });
            used
        })
    }

    /// Split the block containing `at` so that `at` and everything after it
    /// move to a fresh block; the old block falls through with an
    /// unconditional branch. PHI nodes in the moved terminator's successors
    /// are retargeted to the new block.
    pub fn split_block(&mut self, at: InstId) -> BlockId {
        let (old, index) = self.position(at).expect("instruction is detached");
        let new = self.add_block();

        let moved: Vec<InstId> = self.blocks[old.0 as usize].insts.split_off(index);
        for &id in &moved {
            self.parent[id.0 as usize] = Some(new);
        }
        self.blocks[new.0 as usize].insts = moved;

        self.append(old, Inst::new(Ty::Void, Op::Br { dest: new }));

        if let Some(term) = self.terminator(new) {
            for succ in self.inst(term).op.successors() {
                self.retarget_phis(succ, old, new);
            }
        }

        new
    }

    /// Rewrite PHI incoming-block references in `block` from `from` to `to`.
    pub fn retarget_phis(&mut self, block: BlockId, from: BlockId, to: BlockId) {
        let insts = self.block_insts(block).to_vec();
        for id in insts {
            if let Op::Phi { incoming } = &mut self.inst_mut(id).op {
                for (pred, _) in incoming {
                    if *pred == from {
                        *pred = to;
                    }
                }
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::BinOp;
    use crate::value::Const;

    fn add_i32(lhs: Operand, rhs: Operand) -> Inst {
        Inst::new(
            Ty::I32,
            Op::Bin {
                op: BinOp::Add,
                lhs,
                rhs,
            },
        )
    }

    #[test]
    fn split_moves_tail_and_branches() {
        let mut f = Function::new("f", vec![Ty::I32], Ty::I32);
        let entry = f.entry();
        let a = f.append(
            entry,
            add_i32(
                Operand::Value(ValueId::Arg(0)),
                Operand::Const(Const::int(1, 32)),
            ),
        );
        let b = f.append(entry, add_i32(Operand::from(a), Operand::from(a)));
        f.append(
            entry,
            Inst::new(
                Ty::Void,
                Op::Ret {
                    value: Some(Operand::from(b)),
                },
            ),
        );

        let tail = f.split_block(b);
        assert_eq!(f.block_insts(entry).len(), 2);
        assert_eq!(f.block_insts(tail).len(), 2);
        assert_eq!(f.block_of(b), Some(tail));
        assert!(matches!(
            f.inst(f.terminator(entry).unwrap()).op,
            Op::Br { dest } if dest == tail
        ));
    }

    #[test]
    fn split_retargets_successor_phis() {
        let mut f = Function::new("f", vec![Ty::I32], Ty::I32);
        let entry = f.entry();
        let merge = f.add_block();

        let a = f.append(
            entry,
            add_i32(
                Operand::Value(ValueId::Arg(0)),
                Operand::Const(Const::int(1, 32)),
            ),
        );
        f.append(entry, Inst::new(Ty::Void, Op::Br { dest: merge }));
        let phi = f.append(
            merge,
            Inst::new(
                Ty::I32,
                Op::Phi {
                    incoming: vec![(entry, Operand::from(a))],
                },
            ),
        );
        f.append(
            merge,
            Inst::new(
                Ty::Void,
                Op::Ret {
                    value: Some(Operand::from(phi)),
                },
            ),
        );

        let term = f.terminator(entry).unwrap();
        let new = f.split_block(term);

        match &f.inst(phi).op {
            Op::Phi { incoming } => assert_eq!(incoming[0].0, new),
            other => panic!("expected phi, found {other:?}"),
        }
    }

    #[test]
    fn replace_uses_rewrites_operands() {
        let mut f = Function::new("f", vec![Ty::I32], Ty::I32);
        let entry = f.entry();
        let a = f.append(
            entry,
            add_i32(
                Operand::Value(ValueId::Arg(0)),
                Operand::Const(Const::int(1, 32)),
            ),
        );
        let b = f.append(entry, add_i32(Operand::from(a), Operand::from(a)));

        f.replace_uses(ValueId::Inst(a), &Operand::Const(Const::int(7, 32)));

        match &f.inst(b).op {
            Op::Bin { lhs, rhs, .. } => {
                assert_eq!(lhs, &Operand::Const(Const::int(7, 32)));
                assert_eq!(rhs, &Operand::Const(Const::int(7, 32)));
            }
            other => panic!("expected bin, found {other:?}"),
        }
        assert!(!f.has_uses(ValueId::Inst(a)));
    }
}
