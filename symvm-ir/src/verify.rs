//! Structural verification of functions after construction or rewriting.
//!
//! The checks are deliberately linear: blocks must be well-terminated, PHIs
//! grouped at block heads and consistent with predecessors, operands must
//! reference live definitions, and operations must be applied at matching
//! types. Instrumentation runs the verifier after rewriting every function
//! and treats a failure as a fatal build error.

use std::collections::HashSet;

use crate::error::IrError;
use crate::function::Function;
use crate::inst::{CastOp, Op};
use crate::module::Module;
use crate::types::Ty;
use crate::value::{BlockId, InstId, Operand, ValueId};

pub fn verify_module(module: &Module) -> Result<(), IrError> {
    module.functions.iter().try_for_each(verify_function)
}

pub fn verify_function(f: &Function) -> Result<(), IrError> {
    let attached: HashSet<InstId> = f.all_insts().into_iter().collect();

    for block in f.block_ids() {
        verify_block(f, block, &attached)?;
    }

    Ok(())
}

fn verify_block(f: &Function, block: BlockId, attached: &HashSet<InstId>) -> Result<(), IrError> {
    let insts = f.block_insts(block);
    if insts.is_empty() {
        return Err(IrError::EmptyBlock(block));
    }

    let last = *insts.last().expect("non-empty");
    if !f.inst(last).op.is_terminator() {
        return Err(IrError::MissingTerminator(block));
    }

    let mut seen_non_phi = false;
    let mut defined: HashSet<InstId> = HashSet::new();

    for (index, &id) in insts.iter().enumerate() {
        let inst = f.inst(id);

        if inst.op.is_terminator() && index + 1 != insts.len() {
            return Err(IrError::TerminatorInMiddle(block));
        }

        if inst.op.is_phi() {
            if seen_non_phi {
                return Err(IrError::PhiAfterNonPhi(block));
            }
            verify_phi(f, block, id)?;
        } else {
            seen_non_phi = true;
        }

        // PHIs take their values along edges, so they are exempt from the
        // same-block ordering check.
        if !inst.op.is_phi() {
            let mut err = None;
            inst.op.for_each_operand(|operand| {
                if err.is_some() {
                    return;
                }
                err = check_operand(f, block, operand, attached, &defined).err();
            });
            if let Some(e) = err {
                return Err(e);
            }
        } else {
            let mut err = None;
            inst.op.for_each_operand(|operand| {
                if err.is_some() {
                    return;
                }
                err = check_value_exists(f, operand, attached).err();
            });
            if let Some(e) = err {
                return Err(e);
            }
        }

        for succ in inst.op.successors() {
            if succ.0 as usize >= f.num_blocks() {
                return Err(IrError::UnknownBlock(succ));
            }
        }

        verify_types(f, id)?;
        defined.insert(id);
    }

    Ok(())
}

fn check_value_exists(
    f: &Function,
    operand: &Operand,
    attached: &HashSet<InstId>,
) -> Result<(), IrError> {
    match operand.value() {
        Some(ValueId::Arg(i)) if (i as usize) < f.params.len() => Ok(()),
        Some(v @ ValueId::Arg(_)) => Err(IrError::UnknownValue(v)),
        Some(v @ ValueId::Inst(id)) => attached
            .contains(&id)
            .then_some(())
            .ok_or(IrError::UnknownValue(v)),
        None => Ok(()),
    }
}

fn check_operand(
    f: &Function,
    block: BlockId,
    operand: &Operand,
    attached: &HashSet<InstId>,
    defined: &HashSet<InstId>,
) -> Result<(), IrError> {
    check_value_exists(f, operand, attached)?;

    if let Some(ValueId::Inst(id)) = operand.value() {
        // Same-block uses must come after the definition; cross-block uses
        // are accepted without a dominance analysis.
        if f.block_of(id) == Some(block) && !defined.contains(&id) {
            return Err(IrError::UseBeforeDef {
                value: ValueId::Inst(id),
                block,
            });
        }
    }

    Ok(())
}

fn verify_phi(f: &Function, block: BlockId, id: InstId) -> Result<(), IrError> {
    let Op::Phi { incoming } = &f.inst(id).op else {
        unreachable!("caller checked");
    };

    let preds: HashSet<BlockId> = f.preds(block).into_iter().collect();
    let mut seen: HashSet<BlockId> = HashSet::new();

    for (pred, value) in incoming {
        if !preds.contains(pred) {
            return Err(IrError::PhiIncomingMismatch {
                block,
                reason: format!("{pred} is not a predecessor"),
            });
        }
        if !seen.insert(*pred) {
            return Err(IrError::PhiIncomingMismatch {
                block,
                reason: format!("duplicate incoming edge from {pred}"),
            });
        }
        let found = f.operand_ty(value);
        if found != f.inst(id).ty {
            return Err(IrError::TypeMismatch {
                inst: id,
                expected: f.inst(id).ty.clone(),
                found,
            });
        }
    }

    if seen.len() != preds.len() {
        return Err(IrError::PhiIncomingMismatch {
            block,
            reason: "missing incoming edge".into(),
        });
    }

    Ok(())
}

fn verify_types(f: &Function, id: InstId) -> Result<(), IrError> {
    let inst = f.inst(id);
    let mismatch = |expected: Ty, found: Ty| IrError::TypeMismatch {
        inst: id,
        expected,
        found,
    };
    let invalid = |reason: &str| IrError::InvalidInst {
        inst: id,
        reason: reason.into(),
    };

    match &inst.op {
        Op::Bin { lhs, rhs, .. } => {
            let lt = f.operand_ty(lhs);
            let rt = f.operand_ty(rhs);
            if lt != rt {
                return Err(mismatch(lt, rt));
            }
            if inst.ty != lt {
                return Err(mismatch(lt, inst.ty.clone()));
            }
        }
        Op::Icmp { lhs, rhs, .. } | Op::Fcmp { lhs, rhs, .. } => {
            let lt = f.operand_ty(lhs);
            let rt = f.operand_ty(rhs);
            if lt != rt {
                return Err(mismatch(lt, rt));
            }
            if inst.ty != Ty::I1 {
                return Err(mismatch(Ty::I1, inst.ty.clone()));
            }
        }
        Op::Cast { op, value } => verify_cast(f, id, *op, value)?,
        Op::Load { addr } => {
            if !f.operand_ty(addr).is_ptr() {
                return Err(mismatch(Ty::Ptr, f.operand_ty(addr)));
            }
        }
        Op::Store { addr, .. } => {
            if !f.operand_ty(addr).is_ptr() {
                return Err(mismatch(Ty::Ptr, f.operand_ty(addr)));
            }
            if inst.ty != Ty::Void {
                return Err(mismatch(Ty::Void, inst.ty.clone()));
            }
        }
        Op::Gep { base, indices, .. } => {
            if !f.operand_ty(base).is_ptr() {
                return Err(mismatch(Ty::Ptr, f.operand_ty(base)));
            }
            if indices.is_empty() {
                return Err(invalid("gep without indices"));
            }
            if inst.ty != Ty::Ptr {
                return Err(mismatch(Ty::Ptr, inst.ty.clone()));
            }
        }
        Op::Select {
            cond,
            on_true,
            on_false,
        } => {
            if f.operand_ty(cond) != Ty::I1 {
                return Err(mismatch(Ty::I1, f.operand_ty(cond)));
            }
            let tt = f.operand_ty(on_true);
            let ft = f.operand_ty(on_false);
            if tt != ft || inst.ty != tt {
                return Err(mismatch(tt, ft));
            }
        }
        Op::CondBr { cond, .. } => {
            if f.operand_ty(cond) != Ty::I1 {
                return Err(mismatch(Ty::I1, f.operand_ty(cond)));
            }
        }
        Op::Switch { value, .. } => {
            if !f.operand_ty(value).is_int() {
                return Err(invalid("switch on non-integer value"));
            }
        }
        Op::IndirectBr { addr, dests } => {
            if !f.operand_ty(addr).is_ptr() {
                return Err(mismatch(Ty::Ptr, f.operand_ty(addr)));
            }
            if dests.is_empty() {
                return Err(invalid("indirectbr without destinations"));
            }
        }
        Op::Ret { value } => match (value, &f.ret) {
            (None, Ty::Void) => {}
            (None, ret) => return Err(mismatch(ret.clone(), Ty::Void)),
            (Some(v), ret) => {
                let found = f.operand_ty(v);
                if &found != ret {
                    return Err(mismatch(ret.clone(), found));
                }
            }
        },
        Op::InsertValue { agg, .. } => {
            if f.operand_ty(agg) != inst.ty {
                return Err(mismatch(f.operand_ty(agg), inst.ty.clone()));
            }
        }
        Op::ExtractValue { agg, indices } => {
            if !f.operand_ty(agg).is_aggregate() {
                return Err(invalid("extractvalue from non-aggregate"));
            }
            if indices.is_empty() {
                return Err(invalid("extractvalue without indices"));
            }
        }
        _ => {}
    }

    Ok(())
}

fn verify_cast(f: &Function, id: InstId, op: CastOp, value: &Operand) -> Result<(), IrError> {
    let src = f.operand_ty(value);
    let dst = f.inst(id).ty.clone();
    let invalid = |reason: String| IrError::InvalidInst { inst: id, reason };

    let ok = match op {
        CastOp::Trunc => match (src.int_bits(), dst.int_bits()) {
            (Some(s), Some(d)) => d < s,
            _ => false,
        },
        CastOp::ZExt | CastOp::SExt => match (src.int_bits(), dst.int_bits()) {
            (Some(s), Some(d)) => d > s,
            _ => false,
        },
        CastOp::FpTrunc => src == Ty::Double && dst == Ty::Float,
        CastOp::FpExt => src == Ty::Float && dst == Ty::Double,
        CastOp::FpToUi | CastOp::FpToSi => src.is_float() && dst.is_int(),
        CastOp::UiToFp | CastOp::SiToFp => src.is_int() && dst.is_float(),
        CastOp::PtrToInt => src.is_ptr() && dst.is_int(),
        CastOp::IntToPtr => src.is_int() && dst.is_ptr(),
        CastOp::Bitcast => {
            (src.is_ptr() && dst.is_ptr())
                || (src.is_int() && dst.is_float())
                || (src.is_float() && dst.is_int())
        }
    };

    if ok {
        Ok(())
    } else {
        Err(invalid(format!("cannot {op:?} from {src} to {dst}")))
    }
}
