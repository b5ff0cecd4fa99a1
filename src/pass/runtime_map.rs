//! Dispatch tables from IR operators to runtime builder functions.

use symvm_ir::{BinOp, FcmpPred, IcmpPred, RuntimeFn};

/// The runtime handler for a binary operator. Boolean (`i1`) operands use
/// the dedicated Boolean connectives; the bit-vector variants would reject
/// their width.
pub fn binary_operator_handler(op: BinOp, is_bool: bool) -> RuntimeFn {
    use RuntimeFn::*;

    if is_bool {
        return match op {
            BinOp::And => BuildBoolAnd,
            BinOp::Or => BuildBoolOr,
            BinOp::Xor => BuildBoolXor,
            _ => unreachable!("non-logical operator on Boolean operands"),
        };
    }

    match op {
        BinOp::Add => BuildAdd,
        BinOp::Sub => BuildSub,
        BinOp::Mul => BuildMul,
        BinOp::UDiv => BuildUnsignedDiv,
        BinOp::SDiv => BuildSignedDiv,
        BinOp::URem => BuildUnsignedRem,
        BinOp::SRem => BuildSignedRem,
        BinOp::Shl => BuildShiftLeft,
        BinOp::LShr => BuildLogicalShiftRight,
        BinOp::AShr => BuildArithmeticShiftRight,
        BinOp::And => BuildAnd,
        BinOp::Or => BuildOr,
        BinOp::Xor => BuildXor,
        BinOp::FAdd => BuildFpAdd,
        BinOp::FSub => BuildFpSub,
        BinOp::FMul => BuildFpMul,
        BinOp::FDiv => BuildFpDiv,
        BinOp::FRem => BuildFpRem,
    }
}

pub fn icmp_handler(pred: IcmpPred) -> RuntimeFn {
    use RuntimeFn::*;

    match pred {
        IcmpPred::Eq => BuildEqual,
        IcmpPred::Ne => BuildNotEqual,
        IcmpPred::Ult => BuildUnsignedLessThan,
        IcmpPred::Ule => BuildUnsignedLessEqual,
        IcmpPred::Ugt => BuildUnsignedGreaterThan,
        IcmpPred::Uge => BuildUnsignedGreaterEqual,
        IcmpPred::Slt => BuildSignedLessThan,
        IcmpPred::Sle => BuildSignedLessEqual,
        IcmpPred::Sgt => BuildSignedGreaterThan,
        IcmpPred::Sge => BuildSignedGreaterEqual,
    }
}

pub fn fcmp_handler(pred: FcmpPred) -> RuntimeFn {
    use RuntimeFn::*;

    match pred {
        FcmpPred::Oeq => BuildFloatOrderedEqual,
        FcmpPred::Ogt => BuildFloatOrderedGreaterThan,
        FcmpPred::Oge => BuildFloatOrderedGreaterEqual,
        FcmpPred::Olt => BuildFloatOrderedLessThan,
        FcmpPred::Ole => BuildFloatOrderedLessEqual,
        FcmpPred::One => BuildFloatOrderedNotEqual,
        FcmpPred::Ord => BuildFloatOrdered,
        FcmpPred::Uno => BuildFloatUnordered,
        FcmpPred::Ueq => BuildFloatUnorderedEqual,
        FcmpPred::Ugt => BuildFloatUnorderedGreaterThan,
        FcmpPred::Uge => BuildFloatUnorderedGreaterEqual,
        FcmpPred::Ult => BuildFloatUnorderedLessThan,
        FcmpPred::Ule => BuildFloatUnorderedLessEqual,
        FcmpPred::Une => BuildFloatUnorderedNotEqual,
    }
}
