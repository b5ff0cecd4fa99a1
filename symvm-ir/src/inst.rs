use crate::types::Ty;
use crate::value::{BlockId, Operand};

/// Integer and floating-point binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinOp {
    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        )
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcmpPred {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Floating-point comparison predicates (ordered and unordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FcmpPred {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
}

/// Cast operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

/// Intrinsics the pass knows how to handle (or deliberately concretize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    LifetimeStart,
    LifetimeEnd,
    DbgDeclare,
    DbgValue,
    Assume,
    Trap,
    Expect,
    Memcpy,
    Memset,
    Memmove,
    Fabs,
    Bswap,
    Ctpop,
    Ctlz,
    Cttz,
    ReturnAddress,
    StackSave,
    StackRestore,
    Sqrt,
    Sin,
    Cos,
    Pow,
    Exp,
    Log,
    Floor,
    Ceil,
    Round,
    Copysign,
    SaddWithOverflow,
    UaddWithOverflow,
    SsubWithOverflow,
    UsubWithOverflow,
    SmulWithOverflow,
    UmulWithOverflow,
    SaddSat,
    UaddSat,
    SsubSat,
    UsubSat,
    SshlSat,
    UshlSat,
    Fshl,
    Fshr,
    Abs,
}

/// The run-time library functions the pass may emit calls to.
///
/// This is the IR-level mirror of the C linkage contract; `symbol` yields the
/// name the linker resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    Initialize,
    // Value construction.
    BuildInteger,
    BuildInteger128,
    BuildFloat,
    BuildNullPointer,
    BuildTrue,
    BuildFalse,
    BuildBool,
    // Integer arithmetic and shifts.
    BuildNeg,
    BuildAdd,
    BuildSub,
    BuildMul,
    BuildUnsignedDiv,
    BuildSignedDiv,
    BuildUnsignedRem,
    BuildSignedRem,
    BuildShiftLeft,
    BuildLogicalShiftRight,
    BuildArithmeticShiftRight,
    BuildFunnelShiftLeft,
    BuildFunnelShiftRight,
    BuildAbs,
    // Arithmetic with overflow and saturation.
    BuildAddOverflow,
    BuildSubOverflow,
    BuildMulOverflow,
    BuildSaddSat,
    BuildUaddSat,
    BuildSsubSat,
    BuildUsubSat,
    BuildSshlSat,
    BuildUshlSat,
    // Floating-point arithmetic.
    BuildFpAdd,
    BuildFpSub,
    BuildFpMul,
    BuildFpDiv,
    BuildFpRem,
    BuildFpAbs,
    BuildFpNeg,
    // Boolean connectives and relations.
    BuildNot,
    BuildSignedLessThan,
    BuildSignedLessEqual,
    BuildSignedGreaterThan,
    BuildSignedGreaterEqual,
    BuildUnsignedLessThan,
    BuildUnsignedLessEqual,
    BuildUnsignedGreaterThan,
    BuildUnsignedGreaterEqual,
    BuildEqual,
    BuildNotEqual,
    BuildBoolAnd,
    BuildAnd,
    BuildBoolOr,
    BuildOr,
    BuildBoolXor,
    BuildXor,
    BuildIte,
    // Floating-point comparisons.
    BuildFloatOrderedGreaterThan,
    BuildFloatOrderedGreaterEqual,
    BuildFloatOrderedLessThan,
    BuildFloatOrderedLessEqual,
    BuildFloatOrderedEqual,
    BuildFloatOrderedNotEqual,
    BuildFloatOrdered,
    BuildFloatUnordered,
    BuildFloatUnorderedGreaterThan,
    BuildFloatUnorderedGreaterEqual,
    BuildFloatUnorderedLessThan,
    BuildFloatUnorderedLessEqual,
    BuildFloatUnorderedEqual,
    BuildFloatUnorderedNotEqual,
    // Casts.
    BuildSext,
    BuildZext,
    BuildTrunc,
    BuildBswap,
    BuildIntToFloat,
    BuildFloatToFloat,
    BuildBitsToFloat,
    BuildFloatToBits,
    BuildFloatToSignedInteger,
    BuildFloatToUnsignedInteger,
    BuildBoolToBit,
    BuildBitToBool,
    // Bit-array helpers.
    ConcatHelper,
    ExtractHelper,
    BitsHelper,
    // Function-call slots.
    SetParameterExpression,
    GetParameterExpression,
    SetReturnExpression,
    GetReturnExpression,
    // Constraints and input.
    PushPathConstraint,
    GetInputByte,
    MakeSymbolic,
    // Memory.
    ReadMemory,
    WriteMemory,
    Memcpy,
    Memset,
    Memmove,
    BuildZeroBytes,
    BuildInsert,
    BuildExtract,
    // Call-stack notifications.
    NotifyCall,
    NotifyRet,
    NotifyBasicBlock,
    // Garbage collection.
    RegisterExpressionRegion,
    CollectGarbage,
}

impl RuntimeFn {
    /// Linker-level symbol name for this runtime function.
    pub const fn symbol(&self) -> &'static str {
        use RuntimeFn::*;
        match self {
            Initialize => "_sym_initialize",
            BuildInteger => "_sym_build_integer",
            BuildInteger128 => "_sym_build_integer128",
            BuildFloat => "_sym_build_float",
            BuildNullPointer => "_sym_build_null_pointer",
            BuildTrue => "_sym_build_true",
            BuildFalse => "_sym_build_false",
            BuildBool => "_sym_build_bool",
            BuildNeg => "_sym_build_neg",
            BuildAdd => "_sym_build_add",
            BuildSub => "_sym_build_sub",
            BuildMul => "_sym_build_mul",
            BuildUnsignedDiv => "_sym_build_unsigned_div",
            BuildSignedDiv => "_sym_build_signed_div",
            BuildUnsignedRem => "_sym_build_unsigned_rem",
            BuildSignedRem => "_sym_build_signed_rem",
            BuildShiftLeft => "_sym_build_shift_left",
            BuildLogicalShiftRight => "_sym_build_logical_shift_right",
            BuildArithmeticShiftRight => "_sym_build_arithmetic_shift_right",
            BuildFunnelShiftLeft => "_sym_build_funnel_shift_left",
            BuildFunnelShiftRight => "_sym_build_funnel_shift_right",
            BuildAbs => "_sym_build_abs",
            BuildAddOverflow => "_sym_build_add_overflow",
            BuildSubOverflow => "_sym_build_sub_overflow",
            BuildMulOverflow => "_sym_build_mul_overflow",
            BuildSaddSat => "_sym_build_sadd_sat",
            BuildUaddSat => "_sym_build_uadd_sat",
            BuildSsubSat => "_sym_build_ssub_sat",
            BuildUsubSat => "_sym_build_usub_sat",
            BuildSshlSat => "_sym_build_sshl_sat",
            BuildUshlSat => "_sym_build_ushl_sat",
            BuildFpAdd => "_sym_build_fp_add",
            BuildFpSub => "_sym_build_fp_sub",
            BuildFpMul => "_sym_build_fp_mul",
            BuildFpDiv => "_sym_build_fp_div",
            BuildFpRem => "_sym_build_fp_rem",
            BuildFpAbs => "_sym_build_fp_abs",
            BuildFpNeg => "_sym_build_fp_neg",
            BuildNot => "_sym_build_not",
            BuildSignedLessThan => "_sym_build_signed_less_than",
            BuildSignedLessEqual => "_sym_build_signed_less_equal",
            BuildSignedGreaterThan => "_sym_build_signed_greater_than",
            BuildSignedGreaterEqual => "_sym_build_signed_greater_equal",
            BuildUnsignedLessThan => "_sym_build_unsigned_less_than",
            BuildUnsignedLessEqual => "_sym_build_unsigned_less_equal",
            BuildUnsignedGreaterThan => "_sym_build_unsigned_greater_than",
            BuildUnsignedGreaterEqual => "_sym_build_unsigned_greater_equal",
            BuildEqual => "_sym_build_equal",
            BuildNotEqual => "_sym_build_not_equal",
            BuildBoolAnd => "_sym_build_bool_and",
            BuildAnd => "_sym_build_and",
            BuildBoolOr => "_sym_build_bool_or",
            BuildOr => "_sym_build_or",
            BuildBoolXor => "_sym_build_bool_xor",
            BuildXor => "_sym_build_xor",
            BuildIte => "_sym_build_ite",
            BuildFloatOrderedGreaterThan => "_sym_build_float_ordered_greater_than",
            BuildFloatOrderedGreaterEqual => "_sym_build_float_ordered_greater_equal",
            BuildFloatOrderedLessThan => "_sym_build_float_ordered_less_than",
            BuildFloatOrderedLessEqual => "_sym_build_float_ordered_less_equal",
            BuildFloatOrderedEqual => "_sym_build_float_ordered_equal",
            BuildFloatOrderedNotEqual => "_sym_build_float_ordered_not_equal",
            BuildFloatOrdered => "_sym_build_float_ordered",
            BuildFloatUnordered => "_sym_build_float_unordered",
            BuildFloatUnorderedGreaterThan => "_sym_build_float_unordered_greater_than",
            BuildFloatUnorderedGreaterEqual => "_sym_build_float_unordered_greater_equal",
            BuildFloatUnorderedLessThan => "_sym_build_float_unordered_less_than",
            BuildFloatUnorderedLessEqual => "_sym_build_float_unordered_less_equal",
            BuildFloatUnorderedEqual => "_sym_build_float_unordered_equal",
            BuildFloatUnorderedNotEqual => "_sym_build_float_unordered_not_equal",
            BuildSext => "_sym_build_sext",
            BuildZext => "_sym_build_zext",
            BuildTrunc => "_sym_build_trunc",
            BuildBswap => "_sym_build_bswap",
            BuildIntToFloat => "_sym_build_int_to_float",
            BuildFloatToFloat => "_sym_build_float_to_float",
            BuildBitsToFloat => "_sym_build_bits_to_float",
            BuildFloatToBits => "_sym_build_float_to_bits",
            BuildFloatToSignedInteger => "_sym_build_float_to_signed_integer",
            BuildFloatToUnsignedInteger => "_sym_build_float_to_unsigned_integer",
            BuildBoolToBit => "_sym_build_bool_to_bit",
            BuildBitToBool => "_sym_build_bit_to_bool",
            ConcatHelper => "_sym_concat_helper",
            ExtractHelper => "_sym_extract_helper",
            BitsHelper => "_sym_bits_helper",
            SetParameterExpression => "_sym_set_parameter_expression",
            GetParameterExpression => "_sym_get_parameter_expression",
            SetReturnExpression => "_sym_set_return_expression",
            GetReturnExpression => "_sym_get_return_expression",
            PushPathConstraint => "_sym_push_path_constraint",
            GetInputByte => "_sym_get_input_byte",
            MakeSymbolic => "_sym_make_symbolic",
            ReadMemory => "_sym_read_memory",
            WriteMemory => "_sym_write_memory",
            Memcpy => "_sym_memcpy",
            Memset => "_sym_memset",
            Memmove => "_sym_memmove",
            BuildZeroBytes => "_sym_build_zero_bytes",
            BuildInsert => "_sym_build_insert",
            BuildExtract => "_sym_build_extract",
            NotifyCall => "_sym_notify_call",
            NotifyRet => "_sym_notify_ret",
            NotifyBasicBlock => "_sym_notify_basic_block",
            RegisterExpressionRegion => "_sym_register_expression_region",
            CollectGarbage => "_sym_collect_garbage",
        }
    }
}

/// The target of a call instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A function known by name (possibly external).
    Function(String),
    /// A function of the symbolic run-time library.
    Runtime(RuntimeFn),
    /// A compiler intrinsic.
    Intrinsic(Intrinsic),
    /// An indirect call through a pointer value.
    Indirect(Operand),
    /// Inline assembly; opaque to instrumentation.
    Asm(String),
}

/// Instruction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Bin {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Icmp {
        pred: IcmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    Fcmp {
        pred: FcmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        op: CastOp,
        value: Operand,
    },
    Load {
        addr: Operand,
    },
    Store {
        value: Operand,
        addr: Operand,
    },
    Gep {
        base: Operand,
        /// Element type the base pointer points at.
        base_ty: Ty,
        indices: Vec<Operand>,
    },
    Alloca {
        ty: Ty,
    },
    Select {
        cond: Operand,
        on_true: Operand,
        on_false: Operand,
    },
    Phi {
        incoming: Vec<(BlockId, Operand)>,
    },
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    Invoke {
        callee: Callee,
        args: Vec<Operand>,
        normal: BlockId,
        unwind: BlockId,
    },
    InsertValue {
        agg: Operand,
        value: Operand,
        indices: Vec<u32>,
    },
    ExtractValue {
        agg: Operand,
        indices: Vec<u32>,
    },
    LandingPad,
    Resume {
        value: Operand,
    },
    // Terminators.
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: Operand,
        on_true: BlockId,
        on_false: BlockId,
    },
    Switch {
        value: Operand,
        default: BlockId,
        cases: Vec<(u128, BlockId)>,
    },
    IndirectBr {
        addr: Operand,
        dests: Vec<BlockId>,
    },
    Ret {
        value: Option<Operand>,
    },
    Unreachable,
}

/// An instruction: a typed operation. `Ty::Void` marks instructions that do
/// not produce an SSA value.
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub ty: Ty,
    pub op: Op,
}

impl Inst {
    pub fn new(ty: Ty, op: Op) -> Self {
        Self { ty, op }
    }
}

impl Op {
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br { .. }
                | Op::CondBr { .. }
                | Op::Switch { .. }
                | Op::IndirectBr { .. }
                | Op::Invoke { .. }
                | Op::Ret { .. }
                | Op::Resume { .. }
                | Op::Unreachable
        )
    }

    pub const fn is_phi(&self) -> bool {
        matches!(self, Op::Phi { .. })
    }

    /// Visit every operand.
    pub fn for_each_operand<'a>(&'a self, mut f: impl FnMut(&'a Operand)) {
        match self {
            Op::Bin { lhs, rhs, .. } | Op::Icmp { lhs, rhs, .. } | Op::Fcmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Op::Cast { value, .. } | Op::Resume { value } => f(value),
            Op::Load { addr } | Op::IndirectBr { addr, .. } => f(addr),
            Op::Store { value, addr } => {
                f(value);
                f(addr);
            }
            Op::Gep { base, indices, .. } => {
                f(base);
                indices.iter().for_each(f);
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                f(cond);
                f(on_true);
                f(on_false);
            }
            Op::Phi { incoming } => incoming.iter().for_each(|(_, v)| f(v)),
            Op::Call { callee, args } | Op::Invoke { callee, args, .. } => {
                if let Callee::Indirect(target) = callee {
                    f(target);
                }
                args.iter().for_each(f);
            }
            Op::InsertValue { agg, value, .. } => {
                f(agg);
                f(value);
            }
            Op::ExtractValue { agg, .. } => f(agg),
            Op::CondBr { cond, .. } => f(cond),
            Op::Switch { value, .. } => f(value),
            Op::Ret { value } => {
                if let Some(value) = value {
                    f(value);
                }
            }
            Op::Alloca { .. } | Op::LandingPad | Op::Br { .. } | Op::Unreachable => {}
        }
    }

    /// Visit every operand mutably.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Op::Bin { lhs, rhs, .. } | Op::Icmp { lhs, rhs, .. } | Op::Fcmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Op::Cast { value, .. } | Op::Resume { value } => f(value),
            Op::Load { addr } | Op::IndirectBr { addr, .. } => f(addr),
            Op::Store { value, addr } => {
                f(value);
                f(addr);
            }
            Op::Gep { base, indices, .. } => {
                f(base);
                indices.iter_mut().for_each(f);
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                f(cond);
                f(on_true);
                f(on_false);
            }
            Op::Phi { incoming } => incoming.iter_mut().for_each(|(_, v)| f(v)),
            Op::Call { callee, args } | Op::Invoke { callee, args, .. } => {
                if let Callee::Indirect(target) = callee {
                    f(target);
                }
                args.iter_mut().for_each(f);
            }
            Op::InsertValue { agg, value, .. } => {
                f(agg);
                f(value);
            }
            Op::ExtractValue { agg, .. } => f(agg),
            Op::CondBr { cond, .. } => f(cond),
            Op::Switch { value, .. } => f(value),
            Op::Ret { value } => {
                if let Some(value) = value {
                    f(value);
                }
            }
            Op::Alloca { .. } | Op::LandingPad | Op::Br { .. } | Op::Unreachable => {}
        }
    }

    /// Successor blocks of a terminator; empty for non-terminators.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Br { dest } => vec![*dest],
            Op::CondBr {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Op::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|(_, b)| *b));
                out
            }
            Op::IndirectBr { dests, .. } => dests.clone(),
            Op::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            _ => Vec::new(),
        }
    }

    /// Rewrite successor references of a terminator.
    pub fn retarget_successors(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            Op::Br { dest } => *dest = f(*dest),
            Op::CondBr {
                on_true, on_false, ..
            } => {
                *on_true = f(*on_true);
                *on_false = f(*on_false);
            }
            Op::Switch { default, cases, .. } => {
                *default = f(*default);
                for (_, dest) in cases {
                    *dest = f(*dest);
                }
            }
            Op::IndirectBr { dests, .. } => {
                for dest in dests {
                    *dest = f(*dest);
                }
            }
            Op::Invoke { normal, unwind, .. } => {
                *normal = f(*normal);
                *unwind = f(*unwind);
            }
            _ => {}
        }
    }
}
