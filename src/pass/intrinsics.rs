//! Intrinsic lowering and the symbolic handling of intrinsic calls.

use tracing::warn;

use symvm_ir::{Callee, Const, Function, InstId, Intrinsic, Op, Operand, RuntimeFn, Ty, ValueId};

use crate::pass::Symbolizer;

/// Pre-pass: rewrite the intrinsics that have scalar equivalents (or none at
/// all) so the main visitation only sees regular instructions.
///
/// `expect` forwards its first operand; the lifetime, debug-info and
/// optimizer-hint markers disappear entirely.
pub fn lower_intrinsics(f: &mut Function) {
    for inst in f.all_insts() {
        let (intrinsic, first_arg) = match &f.inst(inst).op {
            Op::Call {
                callee: Callee::Intrinsic(intrinsic),
                args,
            } => (*intrinsic, args.first().cloned()),
            _ => continue,
        };

        match intrinsic {
            Intrinsic::Expect => {
                let value = first_arg.expect("expect has an operand");
                f.replace_uses(ValueId::Inst(inst), &value);
                f.remove_inst(inst);
            }
            Intrinsic::LifetimeStart
            | Intrinsic::LifetimeEnd
            | Intrinsic::DbgDeclare
            | Intrinsic::DbgValue
            | Intrinsic::Assume => {
                f.remove_inst(inst);
            }
            _ => {}
        }
    }
}

impl Symbolizer {
    pub(super) fn handle_intrinsic_call(
        &mut self,
        f: &mut Function,
        id: InstId,
        intrinsic: Intrinsic,
        args: &[Operand],
    ) {
        use Intrinsic::*;

        match intrinsic {
            LifetimeStart | LifetimeEnd | DbgDeclare | DbgValue | Assume | Trap => {
                // Safe to ignore.
            }
            StackSave | StackRestore => {
                // The saved pointer is opaque and only flows back into
                // stackrestore; treat it as a constant.
            }
            Expect => {
                if let Some(expr) = self.get_symbolic_expression(&args[0]) {
                    self.symbolic_expressions.insert(ValueId::Inst(id), expr);
                }
            }
            Memcpy | Memmove => {
                self.try_alternative(f, id, &args[0].clone());
                self.try_alternative(f, id, &args[1].clone());
                self.try_alternative(f, id, &args[2].clone());

                let func = if intrinsic == Memcpy {
                    RuntimeFn::Memcpy
                } else {
                    RuntimeFn::Memmove
                };
                self.plain_call(f, id, func, vec![args[0].clone(), args[1].clone(), args[2].clone()]);
            }
            Memset => {
                self.try_alternative(f, id, &args[0].clone());
                self.try_alternative(f, id, &args[2].clone());

                let value_expr = self.get_symbolic_expression_or_null(&args[1]);
                self.plain_call(
                    f,
                    id,
                    RuntimeFn::Memset,
                    vec![args[0].clone(), value_expr, args[2].clone()],
                );
            }
            Fabs => {
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::BuildFpAbs,
                    &[(args[0].clone(), true)],
                );
                self.register_intrinsic(comp, id);
            }
            Bswap => {
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::BuildBswap,
                    &[(args[0].clone(), true)],
                );
                self.register_intrinsic(comp, id);
            }
            Abs => {
                // The second operand only controls poison on INT_MIN.
                let comp =
                    self.build_runtime_call(f, id, RuntimeFn::BuildAbs, &[(args[0].clone(), true)]);
                self.register_intrinsic(comp, id);
            }
            Fshl | Fshr => {
                let func = if intrinsic == Fshl {
                    RuntimeFn::BuildFunnelShiftLeft
                } else {
                    RuntimeFn::BuildFunnelShiftRight
                };
                let comp = self.build_runtime_call(
                    f,
                    id,
                    func,
                    &[
                        (args[0].clone(), true),
                        (args[1].clone(), true),
                        (args[2].clone(), true),
                    ],
                );
                self.register_intrinsic(comp, id);
            }
            SaddWithOverflow | UaddWithOverflow | SsubWithOverflow | UsubWithOverflow
            | SmulWithOverflow | UmulWithOverflow => {
                let (func, signed) = match intrinsic {
                    SaddWithOverflow => (RuntimeFn::BuildAddOverflow, true),
                    UaddWithOverflow => (RuntimeFn::BuildAddOverflow, false),
                    SsubWithOverflow => (RuntimeFn::BuildSubOverflow, true),
                    UsubWithOverflow => (RuntimeFn::BuildSubOverflow, false),
                    SmulWithOverflow => (RuntimeFn::BuildMulOverflow, true),
                    _ => (RuntimeFn::BuildMulOverflow, false),
                };
                let comp = self.build_runtime_call(
                    f,
                    id,
                    func,
                    &[
                        (args[0].clone(), true),
                        (args[1].clone(), true),
                        (Operand::Const(Const::bool(signed)), false),
                        (
                            Operand::Const(Const::bool(self.data_layout.little_endian)),
                            false,
                        ),
                    ],
                );
                self.register_intrinsic(comp, id);
            }
            SaddSat | UaddSat | SsubSat | UsubSat | SshlSat | UshlSat => {
                let func = match intrinsic {
                    SaddSat => RuntimeFn::BuildSaddSat,
                    UaddSat => RuntimeFn::BuildUaddSat,
                    SsubSat => RuntimeFn::BuildSsubSat,
                    UsubSat => RuntimeFn::BuildUsubSat,
                    SshlSat => RuntimeFn::BuildSshlSat,
                    _ => RuntimeFn::BuildUshlSat,
                };
                let comp = self.build_runtime_call(
                    f,
                    id,
                    func,
                    &[(args[0].clone(), true), (args[1].clone(), true)],
                );
                self.register_intrinsic(comp, id);
            }
            Ctpop | Ctlz | Cttz => {
                warn!("losing track of symbolic expressions at bit-count operation");
            }
            ReturnAddress => {
                warn!("using concrete value for return address");
            }
            Sqrt | Sin | Cos | Pow | Exp | Log | Floor | Ceil | Round | Copysign => {
                warn!(?intrinsic, "unhandled floating-point intrinsic; the result will be concretized");
            }
        }
    }

    fn plain_call(&self, f: &mut Function, before: InstId, func: RuntimeFn, args: Vec<Operand>) {
        f.insert_before(
            before,
            symvm_ir::Inst::new(
                Ty::Void,
                Op::Call {
                    callee: Callee::Runtime(func),
                    args,
                },
            ),
        );
    }

    fn register_intrinsic(
        &mut self,
        comp: Option<super::symbolizer::SymbolicComputation>,
        id: InstId,
    ) {
        self.register(comp, Some(id));
    }
}
