//! The concrete-operands fast path.
//!
//! Most values in a program are concrete even when that is not known at
//! compile time, and there is no point paying a runtime call to build a
//! formula over nulls. Every recorded computation is therefore rewritten
//! into a guarded form: the head block tests whether all expression operands
//! are null and skips the construction entirely if so; the slow path checks
//! each operand individually and materializes expressions for the concrete
//! ones before running the original calls.

use symvm_ir::{BinOp, Function, IcmpPred, Inst, InstId, Op, Operand, Ty};

use crate::pass::symbolizer::{SymbolicComputation, Symbolizer};

impl Symbolizer {
    pub fn short_circuit_expression_uses(&mut self, f: &mut Function) {
        let computations = std::mem::take(&mut self.expression_uses);
        for computation in computations {
            self.short_circuit(f, computation);
        }
    }

    fn short_circuit(&mut self, f: &mut Function, computation: SymbolicComputation) {
        assert!(
            !computation.inputs.is_empty(),
            "symbolic computation has no inputs"
        );
        let first = computation.first.expect("computation spans instructions");
        let last = computation.last.expect("computation spans instructions");

        // One null check per input, evaluated ahead of the computation.
        let null_checks: Vec<InstId> = computation
            .inputs
            .iter()
            .map(|input| {
                let operand = input.symbolic_operand(f);
                f.insert_before(
                    first,
                    Inst::new(
                        Ty::I1,
                        Op::Icmp {
                            pred: IcmpPred::Eq,
                            lhs: Operand::NULL,
                            rhs: operand,
                        },
                    ),
                )
            })
            .collect();

        let mut all_concrete = Operand::from(null_checks[0]);
        for &check in &null_checks[1..] {
            let joined = f.insert_before(
                first,
                Inst::new(
                    Ty::I1,
                    Op::Bin {
                        op: BinOp::And,
                        lhs: all_concrete.clone(),
                        rhs: Operand::from(check),
                    },
                ),
            );
            all_concrete = Operand::from(joined);
        }

        // head | slow path (the computation) | tail
        let head = f.block_of(first).expect("computation is attached");
        let _slow_path = f.split_block(first);
        let after_last = f.next_inst(last).expect("terminator follows computation");
        let tail = f.split_block(after_last);

        let head_terminator = f.terminator(head).expect("split added a branch");
        f.replace_op(
            head_terminator,
            Op::CondBr {
                cond: all_concrete,
                on_true: tail,
                on_false: f.block_of(first).expect("slow path exists"),
            },
        );

        // In the slow path, materialize expressions for operands that turn
        // out concrete. When exactly one input has unknown concreteness,
        // reaching the slow path already proves it symbolic.
        let unknown_concreteness = computation
            .inputs
            .iter()
            .filter(|input| input.symbolic_operand(f) != Operand::NULL)
            .count();

        for (index, input) in computation.inputs.iter().enumerate() {
            let original_expr = input.symbolic_operand(f);
            let needs_runtime_check = original_expr != Operand::NULL;

            if needs_runtime_check && unknown_concreteness == 1 {
                continue;
            }

            if needs_runtime_check {
                // Branch around the materialization when the expression is
                // already present.
                let check_block = f.block_of(first).expect("slow path exists");
                let rest = f.split_block(first);
                let materialize = f.add_block();
                let join = f.append(
                    materialize,
                    Inst::new(Ty::Void, Op::Br { dest: rest }),
                );

                let check_terminator = f.terminator(check_block).expect("split added a branch");
                f.replace_op(
                    check_terminator,
                    Op::CondBr {
                        cond: Operand::from(null_checks[index]),
                        on_true: materialize,
                        on_false: rest,
                    },
                );

                let new_expr = self.create_value_expression(f, join, &input.concrete);

                let phi = f.insert_before(
                    first,
                    Inst::new(
                        Ty::Ptr,
                        Op::Phi {
                            incoming: vec![
                                (check_block, original_expr),
                                (materialize, Operand::from(new_expr)),
                            ],
                        },
                    ),
                );
                input.replace_operand(f, Operand::from(phi));
            } else {
                let new_expr = self.create_value_expression(f, first, &input.concrete);
                input.replace_operand(f, Operand::from(new_expr));
            }
        }

        // The overall result is null on the fast path and the computed
        // expression otherwise.
        if f.has_uses(symvm_ir::ValueId::Inst(last)) {
            let slow_exit = f.block_of(last).expect("computation is attached");
            let anchor = f.block_insts(tail)[0];
            let phi = f.insert_before(
                anchor,
                Inst::new(
                    Ty::Ptr,
                    Op::Phi {
                        incoming: vec![(head, Operand::NULL), (slow_exit, Operand::NULL)],
                    },
                ),
            );
            f.replace_uses(symvm_ir::ValueId::Inst(last), &Operand::from(phi));
            if let Op::Phi { incoming } = &mut f.inst_mut(phi).op {
                incoming[1].1 = Operand::from(last);
            }
        }
    }
}
