use crate::function::Function;
use crate::inst::{BinOp, Callee, CastOp, FcmpPred, IcmpPred, Inst, Op};
use crate::types::Ty;
use crate::value::{BlockId, Const, InstId, Operand, ValueId};

/// Convenience layer for constructing functions instruction by instruction.
///
/// The instrumentation pass rewrites existing functions through the
/// [`Function`] API directly; the builder exists for frontends and tests that
/// assemble fresh IR.
pub struct FunctionBuilder {
    func: Function,
    block: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, params: Vec<Ty>, ret: Ty) -> Self {
        let func = Function::new(name, params, ret);
        let block = func.entry();
        Self { func, block }
    }

    pub fn finish(self) -> Function {
        self.func
    }

    pub fn func(&self) -> &Function {
        &self.func
    }

    pub fn arg(&self, index: u32) -> Operand {
        Operand::Value(ValueId::Arg(index))
    }

    pub fn current_block(&self) -> BlockId {
        self.block
    }

    pub fn new_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.block = block;
    }

    fn push(&mut self, ty: Ty, op: Op) -> InstId {
        self.func.append(self.block, Inst::new(ty, op))
    }

    pub fn bin(&mut self, op: BinOp, ty: Ty, lhs: Operand, rhs: Operand) -> Operand {
        self.push(ty, Op::Bin { op, lhs, rhs }).into()
    }

    pub fn icmp(&mut self, pred: IcmpPred, lhs: Operand, rhs: Operand) -> Operand {
        self.push(Ty::I1, Op::Icmp { pred, lhs, rhs }).into()
    }

    pub fn fcmp(&mut self, pred: FcmpPred, lhs: Operand, rhs: Operand) -> Operand {
        self.push(Ty::I1, Op::Fcmp { pred, lhs, rhs }).into()
    }

    pub fn cast(&mut self, op: CastOp, value: Operand, to: Ty) -> Operand {
        self.push(to, Op::Cast { op, value }).into()
    }

    pub fn load(&mut self, ty: Ty, addr: Operand) -> Operand {
        self.push(ty, Op::Load { addr }).into()
    }

    pub fn store(&mut self, value: Operand, addr: Operand) -> InstId {
        self.push(Ty::Void, Op::Store { value, addr })
    }

    pub fn gep(&mut self, base: Operand, base_ty: Ty, indices: Vec<Operand>) -> Operand {
        self.push(
            Ty::Ptr,
            Op::Gep {
                base,
                base_ty,
                indices,
            },
        )
        .into()
    }

    pub fn alloca(&mut self, ty: Ty) -> Operand {
        self.push(Ty::Ptr, Op::Alloca { ty }).into()
    }

    pub fn select(&mut self, ty: Ty, cond: Operand, on_true: Operand, on_false: Operand) -> Operand {
        self.push(
            ty,
            Op::Select {
                cond,
                on_true,
                on_false,
            },
        )
        .into()
    }

    pub fn phi(&mut self, ty: Ty, incoming: Vec<(BlockId, Operand)>) -> Operand {
        self.push(ty, Op::Phi { incoming }).into()
    }

    pub fn call(&mut self, ty: Ty, callee: Callee, args: Vec<Operand>) -> Operand {
        self.push(ty, Op::Call { callee, args }).into()
    }

    pub fn insert_value(&mut self, ty: Ty, agg: Operand, value: Operand, indices: Vec<u32>) -> Operand {
        self.push(
            ty,
            Op::InsertValue {
                agg,
                value,
                indices,
            },
        )
        .into()
    }

    pub fn extract_value(&mut self, ty: Ty, agg: Operand, indices: Vec<u32>) -> Operand {
        self.push(ty, Op::ExtractValue { agg, indices }).into()
    }

    pub fn br(&mut self, dest: BlockId) -> InstId {
        self.push(Ty::Void, Op::Br { dest })
    }

    pub fn cond_br(&mut self, cond: Operand, on_true: BlockId, on_false: BlockId) -> InstId {
        self.push(
            Ty::Void,
            Op::CondBr {
                cond,
                on_true,
                on_false,
            },
        )
    }

    pub fn switch(
        &mut self,
        value: Operand,
        default: BlockId,
        cases: Vec<(u128, BlockId)>,
    ) -> InstId {
        self.push(
            Ty::Void,
            Op::Switch {
                value,
                default,
                cases,
            },
        )
    }

    pub fn ret(&mut self, value: Option<Operand>) -> InstId {
        self.push(Ty::Void, Op::Ret { value })
    }

    pub fn unreachable(&mut self) -> InstId {
        self.push(Ty::Void, Op::Unreachable)
    }

    pub fn int(&self, value: u128, bits: u32) -> Operand {
        Operand::Const(Const::int(value, bits))
    }
}
