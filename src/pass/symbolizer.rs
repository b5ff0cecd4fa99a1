//! Per-instruction construction of symbolic counterparts.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::warn;

use symvm_ir::{
    BlockId, Callee, CastOp, Const, DataLayout, Function, IcmpPred, Inst, InstId, Op, Operand,
    RuntimeFn, Ty, ValueId,
};

use crate::pass::runtime_map::{binary_operator_handler, fcmp_handler, icmp_handler};

/// One symbolic operand of a recorded computation: the concrete IR value it
/// mirrors and the position where the call receives its expression.
pub(super) struct Input {
    pub concrete: Operand,
    pub operand_index: usize,
    pub user: InstId,
}

impl Input {
    pub(super) fn symbolic_operand(&self, f: &Function) -> Operand {
        match &f.inst(self.user).op {
            Op::Call { args, .. } => args[self.operand_index].clone(),
            other => unreachable!("input user is not a call: {other:?}"),
        }
    }

    pub(super) fn replace_operand(&self, f: &mut Function, new: Operand) {
        match &mut f.inst_mut(self.user).op {
            Op::Call { args, .. } => args[self.operand_index] = new,
            other => unreachable!("input user is not a call: {other:?}"),
        }
    }
}

/// A run of inserted instructions that constructs one symbolic expression,
/// recorded for the short-circuit rewriter.
#[derive(Default)]
pub(super) struct SymbolicComputation {
    pub first: Option<InstId>,
    pub last: Option<InstId>,
    pub inputs: Vec<Input>,
}

impl SymbolicComputation {
    fn of(call: InstId, inputs: Vec<Input>) -> Self {
        Self {
            first: Some(call),
            last: Some(call),
            inputs,
        }
    }

    /// Append a later computation to this one.
    pub(super) fn merge(&mut self, other: SymbolicComputation) {
        if self.first.is_none() {
            self.first = other.first;
        }
        self.last = other.last;
        self.inputs.extend(other.inputs);
    }
}

pub struct Symbolizer {
    pub(super) data_layout: DataLayout,
    pub(super) ptr_bits: u32,
    site_base: u64,
    /// Mapping from SSA values to the IR values holding their symbolic
    /// expressions. Keyed on identity; invalidated by PHI finalization.
    pub(super) symbolic_expressions: HashMap<ValueId, Operand>,
    /// Concrete PHI paired with its eagerly inserted expression PHI.
    pub(super) phi_nodes: Vec<(InstId, InstId)>,
    /// Computations eligible for the concrete-operands fast path.
    pub(super) expression_uses: Vec<SymbolicComputation>,
}

impl Symbolizer {
    pub fn new(data_layout: DataLayout, function_name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        function_name.hash(&mut hasher);

        Self {
            data_layout,
            ptr_bits: data_layout.ptr_bits,
            site_base: hasher.finish(),
            symbolic_expressions: HashMap::new(),
            phi_nodes: Vec::new(),
            expression_uses: Vec::new(),
        }
    }

    /// Stable location identifier for a constraint or notification site.
    fn site_id(&self, marker: u64) -> u128 {
        let mut hasher = DefaultHasher::new();
        self.site_base.hash(&mut hasher);
        marker.hash(&mut hasher);
        u128::from(hasher.finish() & (usize::MAX as u64))
    }

    fn site_operand(&self, inst: InstId) -> Operand {
        Operand::Const(Const::int(self.site_id(u64::from(inst.0)), self.ptr_bits))
    }

    fn block_site_operand(&self, block: BlockId) -> Operand {
        let marker = 0x8000_0000_0000_0000u64 | u64::from(block.0);
        Operand::Const(Const::int(self.site_id(marker), self.ptr_bits))
    }

    pub(super) fn get_symbolic_expression(&self, operand: &Operand) -> Option<Operand> {
        match operand {
            Operand::Value(value) => self.symbolic_expressions.get(value).cloned(),
            Operand::Const(_) => None,
        }
    }

    pub(super) fn get_symbolic_expression_or_null(&self, operand: &Operand) -> Operand {
        self.get_symbolic_expression(operand)
            .unwrap_or(Operand::NULL)
    }

    fn is_little_endian(&self, ty: &Ty) -> bool {
        !ty.is_aggregate() && self.data_layout.little_endian
    }

    fn runtime_call(
        &self,
        f: &mut Function,
        before: InstId,
        ty: Ty,
        func: RuntimeFn,
        args: Vec<Operand>,
    ) -> InstId {
        f.insert_before(
            before,
            Inst::new(
                ty,
                Op::Call {
                    callee: Callee::Runtime(func),
                    args,
                },
            ),
        )
    }

    /// Create a call to the run-time library, tracking which arguments are
    /// symbolic. Returns nothing when every symbolic argument is known
    /// concrete at compile time — no code is emitted then.
    pub(super) fn build_runtime_call(
        &mut self,
        f: &mut Function,
        before: InstId,
        func: RuntimeFn,
        args: &[(Operand, bool)],
    ) -> Option<SymbolicComputation> {
        if args
            .iter()
            .filter(|(_, symbolic)| *symbolic)
            .all(|(arg, _)| self.get_symbolic_expression(arg).is_none())
        {
            return None;
        }

        Some(self.force_build_runtime_call(f, before, func, args))
    }

    /// Like [`Self::build_runtime_call`], but the call is always generated.
    pub(super) fn force_build_runtime_call(
        &mut self,
        f: &mut Function,
        before: InstId,
        func: RuntimeFn,
        args: &[(Operand, bool)],
    ) -> SymbolicComputation {
        let call_args: Vec<Operand> = args
            .iter()
            .map(|(arg, symbolic)| {
                if *symbolic {
                    self.get_symbolic_expression_or_null(arg)
                } else {
                    arg.clone()
                }
            })
            .collect();

        let call = self.runtime_call(f, before, Ty::Ptr, func, call_args);

        let inputs = args
            .iter()
            .enumerate()
            .filter(|(_, (_, symbolic))| *symbolic)
            .map(|(index, (arg, _))| Input {
                concrete: arg.clone(),
                operand_index: index,
                user: call,
            })
            .collect();

        SymbolicComputation::of(call, inputs)
    }

    /// Record a computation for short-circuiting, optionally binding its
    /// result as the symbolic expression of a concrete value.
    pub(super) fn register(
        &mut self,
        computation: Option<SymbolicComputation>,
        concrete: Option<InstId>,
    ) {
        let Some(computation) = computation else {
            return;
        };
        if let Some(inst) = concrete {
            let last = computation.last.expect("computation produced a value");
            self.symbolic_expressions
                .insert(ValueId::Inst(inst), Operand::from(last));
        }
        self.expression_uses.push(computation);
    }

    /// Insert the symbolic-arguments prologue: each used argument reads its
    /// expression from the parameter slots. `main` receives concrete
    /// arguments.
    pub fn symbolize_function_arguments(&mut self, f: &mut Function) {
        if f.name == "main" {
            return;
        }

        let entry = f.entry();
        let mut index = f.first_non_phi_index(entry);

        for arg in 0..f.params.len() as u32 {
            if !f.has_uses(ValueId::Arg(arg)) {
                continue;
            }
            let call = f.insert_at(
                entry,
                index,
                Inst::new(
                    Ty::Ptr,
                    Op::Call {
                        callee: Callee::Runtime(RuntimeFn::GetParameterExpression),
                        args: vec![Operand::Const(Const::int(u128::from(arg), 8))],
                    },
                ),
            );
            index += 1;
            self.symbolic_expressions
                .insert(ValueId::Arg(arg), Operand::from(call));
        }
    }

    pub fn insert_basic_block_notification(&self, f: &mut Function, block: BlockId) {
        let index = f.first_non_phi_index(block);
        let site = self.block_site_operand(block);
        f.insert_at(
            block,
            index,
            Inst::new(
                Ty::Void,
                Op::Call {
                    callee: Callee::Runtime(RuntimeFn::NotifyBasicBlock),
                    args: vec![site],
                },
            ),
        );
    }

    /// Dispatch on one snapshotted instruction.
    pub fn visit(&mut self, f: &mut Function, id: InstId) {
        let Inst { ty, op } = f.inst(id).clone();

        match op {
            Op::Bin { op, lhs, rhs } => self.visit_binary_operator(f, id, op, lhs, rhs),
            Op::Icmp { pred, lhs, rhs } => {
                let comp =
                    self.build_runtime_call(f, id, icmp_handler(pred), &[(lhs, true), (rhs, true)]);
                self.register(comp, Some(id));
            }
            Op::Fcmp { pred, lhs, rhs } => {
                let comp =
                    self.build_runtime_call(f, id, fcmp_handler(pred), &[(lhs, true), (rhs, true)]);
                self.register(comp, Some(id));
            }
            Op::Cast { op, value } => self.visit_cast(f, id, op, value, ty),
            Op::Load { addr } => self.visit_load(f, id, addr, ty),
            Op::Store { value, addr } => self.visit_store(f, id, value, addr),
            Op::Gep {
                base,
                base_ty,
                indices,
            } => self.visit_gep(f, id, base, base_ty, indices),
            Op::Alloca { .. } => {
                // The shadow for the new region is created lazily on first
                // symbolic write; until then the memory is concrete.
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => self.visit_select(f, id, cond, on_true, on_false),
            Op::Phi { incoming } => self.visit_phi(f, id, &incoming),
            Op::Call { callee, args } => self.visit_call(f, id, callee, args),
            Op::Invoke { callee, args, .. } => self.visit_invoke(f, id, callee, args),
            Op::InsertValue {
                agg,
                value,
                indices,
            } => self.visit_insert_value(f, id, agg, value, indices),
            Op::ExtractValue { agg, indices } => self.visit_extract_value(f, id, agg, indices, ty),
            Op::Br { .. } => {}
            Op::CondBr { cond, .. } => {
                let site = self.site_operand(id);
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::PushPathConstraint,
                    &[(cond.clone(), true), (cond, false), (site, false)],
                );
                self.register(comp, None);
            }
            Op::Switch {
                value,
                default: _,
                cases,
            } => self.visit_switch(f, id, value, cases),
            Op::IndirectBr { addr, .. } => self.try_alternative(f, id, &addr),
            Op::Ret { value } => {
                let Some(value) = value else {
                    return;
                };
                // The return expression must be set even when it is null;
                // otherwise the caller reads a stale slot. Never
                // short-circuited.
                let expr = self.get_symbolic_expression_or_null(&value);
                self.runtime_call(f, id, Ty::Void, RuntimeFn::SetReturnExpression, vec![expr]);
            }
            Op::LandingPad | Op::Resume { .. } => {
                // Exception handling is out of scope.
            }
            Op::Unreachable => {}
        }
    }

    fn visit_binary_operator(
        &mut self,
        f: &mut Function,
        id: InstId,
        op: symvm_ir::BinOp,
        lhs: Operand,
        rhs: Operand,
    ) {
        let is_bool = f.operand_ty(&lhs) == Ty::I1;
        let handler = binary_operator_handler(op, is_bool);
        let comp = self.build_runtime_call(f, id, handler, &[(lhs, true), (rhs, true)]);
        self.register(comp, Some(id));
    }

    fn visit_cast(&mut self, f: &mut Function, id: InstId, op: CastOp, value: Operand, dest: Ty) {
        let src = f.operand_ty(&value);

        match op {
            CastOp::Trunc => {
                let bits = dest.int_bits().expect("trunc to integer");
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::BuildTrunc,
                    &[
                        (value, true),
                        (Operand::Const(Const::int(u128::from(bits), 8)), false),
                    ],
                );
                self.register(comp, Some(id));
            }
            CastOp::ZExt | CastOp::SExt => {
                let src_bits = src.int_bits().expect("ext from integer");
                let dest_bits = dest.int_bits().expect("ext to integer");

                // Boolean values are not bit vectors; they need the
                // dedicated conversion.
                if src_bits == 1 {
                    let comp = self.build_runtime_call(
                        f,
                        id,
                        RuntimeFn::BuildBoolToBit,
                        &[
                            (value, true),
                            (Operand::Const(Const::int(u128::from(dest_bits), 8)), false),
                        ],
                    );
                    self.register(comp, Some(id));
                    return;
                }

                let handler = if op == CastOp::SExt {
                    RuntimeFn::BuildSext
                } else {
                    RuntimeFn::BuildZext
                };
                let comp = self.build_runtime_call(
                    f,
                    id,
                    handler,
                    &[
                        (value, true),
                        (
                            Operand::Const(Const::int(u128::from(dest_bits - src_bits), 8)),
                            false,
                        ),
                    ],
                );
                self.register(comp, Some(id));
            }
            CastOp::FpExt | CastOp::FpTrunc => {
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::BuildFloatToFloat,
                    &[
                        (value, true),
                        (Operand::Const(Const::bool(dest.is_double())), false),
                    ],
                );
                self.register(comp, Some(id));
            }
            CastOp::SiToFp | CastOp::UiToFp => {
                let comp = self.build_runtime_call(
                    f,
                    id,
                    RuntimeFn::BuildIntToFloat,
                    &[
                        (value, true),
                        (Operand::Const(Const::bool(dest.is_double())), false),
                        (Operand::Const(Const::bool(op == CastOp::SiToFp)), false),
                    ],
                );
                self.register(comp, Some(id));
            }
            CastOp::FpToSi | CastOp::FpToUi => {
                let bits = dest.int_bits().expect("fptoint to integer");
                let handler = if op == CastOp::FpToSi {
                    RuntimeFn::BuildFloatToSignedInteger
                } else {
                    RuntimeFn::BuildFloatToUnsignedInteger
                };
                let comp = self.build_runtime_call(
                    f,
                    id,
                    handler,
                    &[
                        (value, true),
                        (Operand::Const(Const::int(u128::from(bits), 8)), false),
                    ],
                );
                self.register(comp, Some(id));
            }
            CastOp::PtrToInt | CastOp::IntToPtr => {
                // Address expressions propagate unchanged.
                if let Some(expr) = self.get_symbolic_expression(&value) {
                    self.symbolic_expressions.insert(ValueId::Inst(id), expr);
                }
            }
            CastOp::Bitcast => {
                if src.is_int() && dest.is_float() {
                    let comp = self.build_runtime_call(
                        f,
                        id,
                        RuntimeFn::BuildBitsToFloat,
                        &[
                            (value, true),
                            (Operand::Const(Const::bool(dest.is_double())), false),
                        ],
                    );
                    self.register(comp, Some(id));
                } else if src.is_float() && dest.is_int() {
                    let comp = self.build_runtime_call(
                        f,
                        id,
                        RuntimeFn::BuildFloatToBits,
                        &[(value, true)],
                    );
                    self.register(comp, Some(id));
                } else {
                    // Pointer-to-pointer casts propagate the expression.
                    if let Some(expr) = self.get_symbolic_expression(&value) {
                        self.symbolic_expressions.insert(ValueId::Inst(id), expr);
                    }
                }
            }
        }
    }

    fn visit_load(&mut self, f: &mut Function, id: InstId, addr: Operand, dest: Ty) {
        self.try_alternative(f, id, &addr);

        let size = self.data_layout.store_size(&dest);
        let little_endian = self.is_little_endian(&dest);
        let mut data = self.runtime_call(
            f,
            id,
            Ty::Ptr,
            RuntimeFn::ReadMemory,
            vec![
                addr,
                Operand::Const(Const::int(u128::from(size), self.ptr_bits)),
                Operand::Const(Const::int(u128::from(little_endian), 8)),
            ],
        );

        if dest.is_float() {
            data = self.runtime_call(
                f,
                id,
                Ty::Ptr,
                RuntimeFn::BuildBitsToFloat,
                vec![
                    Operand::from(data),
                    Operand::Const(Const::bool(dest.is_double())),
                ],
            );
        }

        self.symbolic_expressions
            .insert(ValueId::Inst(id), Operand::from(data));
    }

    fn visit_store(&mut self, f: &mut Function, id: InstId, value: Operand, addr: Operand) {
        self.try_alternative(f, id, &addr);

        let data_ty = f.operand_ty(&value);
        let mut data = self.get_symbolic_expression_or_null(&value);
        if data_ty.is_float() {
            let conv = self.runtime_call(f, id, Ty::Ptr, RuntimeFn::BuildFloatToBits, vec![data]);
            data = Operand::from(conv);
        }

        let size = self.data_layout.store_size(&data_ty);
        let little_endian = self.data_layout.little_endian;
        self.runtime_call(
            f,
            id,
            Ty::Void,
            RuntimeFn::WriteMemory,
            vec![
                addr,
                Operand::Const(Const::int(u128::from(size), self.ptr_bits)),
                data,
                Operand::Const(Const::int(u128::from(little_endian), 8)),
            ],
        );
    }

    /// GEP only computes an address; duplicate the arithmetic at the
    /// symbolic level so the result carries an expression for the final
    /// address.
    fn visit_gep(
        &mut self,
        f: &mut Function,
        id: InstId,
        base: Operand,
        base_ty: Ty,
        indices: Vec<Operand>,
    ) {
        // Fully concrete address computations need no code.
        if self.get_symbolic_expression(&base).is_none()
            && indices
                .iter()
                .all(|index| self.get_symbolic_expression(index).is_none())
        {
            return;
        }

        // All-zero indices leave the address unchanged.
        if indices.iter().all(Operand::is_zero_int) {
            if let Some(expr) = self.get_symbolic_expression(&base) {
                self.symbolic_expressions.insert(ValueId::Inst(id), expr);
            }
            return;
        }

        let mut computation = SymbolicComputation::default();
        let mut current_address = (base.clone(), true);
        let mut current_ty: Option<Ty> = None;

        for index in &indices {
            let contribution: (Operand, bool);

            match &current_ty {
                Some(Ty::Struct(fields)) => {
                    // Structs can only be indexed with constants.
                    let member = index
                        .as_const()
                        .and_then(Const::as_int)
                        .expect("struct index must be constant") as usize;
                    let offset = self.data_layout.struct_offset(fields, member);
                    let next = fields[member].clone();
                    contribution = (
                        Operand::Const(Const::int(u128::from(offset), self.ptr_bits)),
                        true,
                    );
                    current_ty = Some(next);
                }
                stepped => {
                    // The first index steps over the pointee; later ones
                    // descend into arrays.
                    let element = match stepped {
                        None => base_ty.clone(),
                        Some(Ty::Array(element, _)) => (**element).clone(),
                        Some(other) => {
                            unreachable!("gep index into non-indexable type {other}")
                        }
                    };
                    let element_size = self.data_layout.alloc_size(&element);

                    if stepped.is_none() {
                        current_ty = Some(base_ty.clone());
                    } else {
                        current_ty = Some(element.clone());
                    }

                    if index.is_zero_int() {
                        // An index of zero performs no calculation.
                        continue;
                    }

                    let index_bits = f
                        .operand_ty(index)
                        .int_bits()
                        .expect("gep index is an integer");
                    let size_const = (
                        Operand::Const(Const::int(u128::from(element_size), self.ptr_bits)),
                        true,
                    );

                    if index_bits != self.ptr_bits {
                        let zext = self.force_build_runtime_call(
                            f,
                            id,
                            RuntimeFn::BuildZext,
                            &[
                                (index.clone(), true),
                                (
                                    Operand::Const(Const::int(
                                        u128::from(self.ptr_bits - index_bits),
                                        8,
                                    )),
                                    false,
                                ),
                            ],
                        );
                        let zext_result = zext.last.expect("zext call");
                        computation.merge(zext);
                        let mul = self.force_build_runtime_call(
                            f,
                            id,
                            RuntimeFn::BuildMul,
                            &[(Operand::from(zext_result), false), size_const],
                        );
                        computation.merge(mul);
                    } else {
                        let mul = self.force_build_runtime_call(
                            f,
                            id,
                            RuntimeFn::BuildMul,
                            &[(index.clone(), true), size_const],
                        );
                        computation.merge(mul);
                    }

                    contribution = (
                        Operand::from(computation.last.expect("multiplication emitted")),
                        false,
                    );
                }
            }

            let is_original_base = current_address.0 == base && current_address.1;
            let add = self.force_build_runtime_call(
                f,
                id,
                RuntimeFn::BuildAdd,
                &[
                    contribution,
                    (current_address.0.clone(), is_original_base),
                ],
            );
            let add_result = add.last.expect("addition emitted");
            computation.merge(add);
            current_address = (Operand::from(add_result), false);
        }

        if computation.first.is_some() {
            self.register(Some(computation), Some(id));
        }
    }

    /// Select behaves like a branch: push the condition with the direction
    /// actually taken, then propagate the chosen side's expression.
    fn visit_select(
        &mut self,
        f: &mut Function,
        id: InstId,
        cond: Operand,
        on_true: Operand,
        on_false: Operand,
    ) {
        let site = self.site_operand(id);
        let comp = self.build_runtime_call(
            f,
            id,
            RuntimeFn::PushPathConstraint,
            &[(cond.clone(), true), (cond.clone(), false), (site, false)],
        );
        self.register(comp, None);

        if self.get_symbolic_expression(&on_true).is_some()
            || self.get_symbolic_expression(&on_false).is_some()
        {
            let on_true = self.get_symbolic_expression_or_null(&on_true);
            let on_false = self.get_symbolic_expression_or_null(&on_false);
            let select = f.insert_before(
                id,
                Inst::new(
                    Ty::Ptr,
                    Op::Select {
                        cond,
                        on_true,
                        on_false,
                    },
                ),
            );
            self.symbolic_expressions
                .insert(ValueId::Inst(id), Operand::from(select));
        }
    }

    fn visit_phi(&mut self, f: &mut Function, id: InstId, incoming: &[(BlockId, Operand)]) {
        // PHI nodes may reference their own output through back-edges, so
        // only a dummy is inserted here; finalize_phi_nodes fills it in.
        let placeholder = incoming
            .iter()
            .map(|(block, _)| (*block, Operand::NULL))
            .collect();
        let expr_phi = f.insert_before(
            id,
            Inst::new(
                Ty::Ptr,
                Op::Phi {
                    incoming: placeholder,
                },
            ),
        );
        self.symbolic_expressions
            .insert(ValueId::Inst(id), Operand::from(expr_phi));
        self.phi_nodes.push((id, expr_phi));
    }

    fn visit_call(&mut self, f: &mut Function, id: InstId, callee: Callee, args: Vec<Operand>) {
        match callee {
            Callee::Intrinsic(intrinsic) => self.handle_intrinsic_call(f, id, intrinsic, &args),
            Callee::Asm(_) => {
                if f.inst(id).ty == Ty::Void {
                    warn!("skipping over inline assembly");
                } else {
                    warn!("losing track of symbolic expressions at inline assembly");
                }
            }
            Callee::Runtime(_) => {}
            callee => {
                let return_point = f.next_inst(id).expect("call inside a terminated block");
                self.handle_function_call(f, id, &callee, &args, return_point);
            }
        }
    }

    /// Invoke establishes an exception handler alongside the call. The
    /// return expression is only valid on the normal edge, which may be
    /// critical; split it so the slot is read on our edge alone.
    fn visit_invoke(&mut self, f: &mut Function, id: InstId, callee: Callee, args: Vec<Operand>) {
        if let Callee::Intrinsic(intrinsic) = callee {
            self.handle_intrinsic_call(f, id, intrinsic, &args);
            return;
        }

        let invoke_block = f.block_of(id).expect("invoke is attached");
        let Op::Invoke { normal, .. } = f.inst(id).op.clone() else {
            unreachable!("caller checked");
        };

        let landing = if f.preds(normal).len() > 1 {
            let edge = f.add_block();
            f.append(edge, Inst::new(Ty::Void, Op::Br { dest: normal }));
            if let Op::Invoke { normal: n, .. } = &mut f.inst_mut(id).op {
                *n = edge;
            }
            f.retarget_phis(normal, invoke_block, edge);
            edge
        } else {
            normal
        };

        let index = f.first_non_phi_index(landing);
        let return_point = f.block_insts(landing)[index];
        self.handle_function_call(f, id, &callee, &args, return_point);
    }

    /// The parameter-slot protocol around a call: notify the call-stack
    /// tracker, pass every argument's expression by position, clear the
    /// return slot, and read it back if the result is used.
    fn handle_function_call(
        &mut self,
        f: &mut Function,
        id: InstId,
        callee: &Callee,
        args: &[Operand],
        return_point: InstId,
    ) {
        let site = self.site_operand(id);
        self.runtime_call(
            f,
            return_point,
            Ty::Void,
            RuntimeFn::NotifyRet,
            vec![site.clone()],
        );
        self.runtime_call(f, id, Ty::Void, RuntimeFn::NotifyCall, vec![site]);

        if let Callee::Indirect(target) = callee {
            let target = target.clone();
            self.try_alternative(f, id, &target);
        }

        for (index, arg) in args.iter().enumerate() {
            let expr = self.get_symbolic_expression_or_null(arg);
            self.runtime_call(
                f,
                id,
                Ty::Void,
                RuntimeFn::SetParameterExpression,
                vec![Operand::Const(Const::int(index as u128, 8)), expr],
            );
        }

        if f.has_uses(ValueId::Inst(id)) {
            // The callee may not be instrumented; clearing the slot keeps a
            // stale expression from the previous call out of our result.
            self.runtime_call(
                f,
                id,
                Ty::Void,
                RuntimeFn::SetReturnExpression,
                vec![Operand::NULL],
            );
            let result = self.runtime_call(
                f,
                return_point,
                Ty::Ptr,
                RuntimeFn::GetReturnExpression,
                vec![],
            );
            self.symbolic_expressions
                .insert(ValueId::Inst(id), Operand::from(result));
        }
    }

    fn visit_insert_value(
        &mut self,
        f: &mut Function,
        id: InstId,
        agg: Operand,
        value: Operand,
        indices: Vec<u32>,
    ) {
        let agg_ty = f.operand_ty(&agg);
        let value_ty = f.operand_ty(&value);
        let offset = self.data_layout.aggregate_offset(&agg_ty, &indices);
        let little_endian = self.is_little_endian(&value_ty);

        let comp = self.build_runtime_call(
            f,
            id,
            RuntimeFn::BuildInsert,
            &[
                (agg, true),
                (value, true),
                (Operand::Const(Const::int(u128::from(offset), 64)), false),
                (
                    Operand::Const(Const::int(u128::from(little_endian), 8)),
                    false,
                ),
            ],
        );
        self.register(comp, Some(id));
    }

    fn visit_extract_value(
        &mut self,
        f: &mut Function,
        id: InstId,
        agg: Operand,
        indices: Vec<u32>,
        result_ty: Ty,
    ) {
        let agg_ty = f.operand_ty(&agg);
        let offset = self.data_layout.aggregate_offset(&agg_ty, &indices);
        let size = self.data_layout.store_size(&result_ty);
        let little_endian = self.is_little_endian(&result_ty);

        let comp = self.build_runtime_call(
            f,
            id,
            RuntimeFn::BuildExtract,
            &[
                (agg, true),
                (Operand::Const(Const::int(u128::from(offset), 64)), false),
                (Operand::Const(Const::int(u128::from(size), 64)), false),
                (
                    Operand::Const(Const::int(u128::from(little_endian), 8)),
                    false,
                ),
            ],
        );
        self.register(comp, Some(id));
    }

    /// Switch compares a value against integer constants. The constraints
    /// are only worth pushing when the value is symbolic, which is a
    /// runtime property; guard a dedicated constraint block on it.
    fn visit_switch(&mut self, f: &mut Function, id: InstId, value: Operand, cases: Vec<(u128, BlockId)>) {
        let Some(cond_expr) = self.get_symbolic_expression(&value) else {
            return;
        };

        let value_ty = f.operand_ty(&value);
        let site = self.site_operand(id);

        let have_symbolic = f.insert_before(
            id,
            Inst::new(
                Ty::I1,
                Op::Icmp {
                    pred: IcmpPred::Ne,
                    lhs: cond_expr.clone(),
                    rhs: Operand::NULL,
                },
            ),
        );

        let cont = f.split_block(id);
        let head = f.block_of(have_symbolic).expect("check is attached");
        let constraint_block = f.add_block();
        let back_edge = f.append(
            constraint_block,
            Inst::new(Ty::Void, Op::Br { dest: cont }),
        );

        let head_terminator = f.terminator(head).expect("split added a branch");
        f.replace_op(
            head_terminator,
            Op::CondBr {
                cond: Operand::from(have_symbolic),
                on_true: constraint_block,
                on_false: cont,
            },
        );

        for (case_value, _) in cases {
            let case_const = Operand::Const(Const::Int {
                value: case_value,
                ty: value_ty.clone(),
            });
            let case_taken = f.insert_before(
                back_edge,
                Inst::new(
                    Ty::I1,
                    Op::Icmp {
                        pred: IcmpPred::Eq,
                        lhs: value.clone(),
                        rhs: case_const.clone(),
                    },
                ),
            );
            let case_expr = self.create_value_expression(f, back_edge, &case_const);
            let constraint = self.runtime_call(
                f,
                back_edge,
                Ty::Ptr,
                RuntimeFn::BuildEqual,
                vec![cond_expr.clone(), Operand::from(case_expr)],
            );
            self.runtime_call(
                f,
                back_edge,
                Ty::Void,
                RuntimeFn::PushPathConstraint,
                vec![
                    Operand::from(constraint),
                    Operand::from(case_taken),
                    site.clone(),
                ],
            );
        }
    }

    /// Ask the solver for an alternative to a symbolic pointer or length:
    /// assert equality with the concrete value, which mines a diverging
    /// test case while keeping the path consistent.
    pub(super) fn try_alternative(&mut self, f: &mut Function, before: InstId, operand: &Operand) {
        let Some(expr) = self.get_symbolic_expression(operand) else {
            return;
        };

        let site = self.site_operand(before);
        let concrete_expr = self.create_value_expression(f, before, operand);
        let assertion = self.runtime_call(
            f,
            before,
            Ty::Ptr,
            RuntimeFn::BuildEqual,
            vec![expr, Operand::from(concrete_expr)],
        );
        let push = self.runtime_call(
            f,
            before,
            Ty::Void,
            RuntimeFn::PushPathConstraint,
            vec![
                Operand::from(assertion),
                Operand::Const(Const::bool(true)),
                site,
            ],
        );

        self.expression_uses.push(SymbolicComputation {
            first: Some(concrete_expr),
            last: Some(push),
            inputs: vec![Input {
                concrete: operand.clone(),
                operand_index: 0,
                user: assertion,
            }],
        });
    }

    /// Create an expression for the concrete value of `operand`, inserting
    /// any conversion instructions before `before`. Returns the call whose
    /// result is the expression.
    pub(super) fn create_value_expression(
        &mut self,
        f: &mut Function,
        before: InstId,
        operand: &Operand,
    ) -> InstId {
        if operand.is_null() {
            return self.runtime_call(f, before, Ty::Ptr, RuntimeFn::BuildNullPointer, vec![]);
        }

        let ty = f.operand_ty(operand);
        match ty {
            Ty::Int(1) => self.runtime_call(
                f,
                before,
                Ty::Ptr,
                RuntimeFn::BuildBool,
                vec![operand.clone()],
            ),
            Ty::Int(bits) if bits <= 64 => {
                let value64 = match operand.as_const().and_then(Const::as_int) {
                    Some(value) => Operand::Const(Const::int(value, 64)),
                    None if bits < 64 => Operand::from(f.insert_before(
                        before,
                        Inst::new(
                            Ty::I64,
                            Op::Cast {
                                op: CastOp::ZExt,
                                value: operand.clone(),
                            },
                        ),
                    )),
                    None => operand.clone(),
                };
                self.runtime_call(
                    f,
                    before,
                    Ty::Ptr,
                    RuntimeFn::BuildInteger,
                    vec![value64, Operand::Const(Const::int(u128::from(bits), 8))],
                )
            }
            Ty::Int(bits) => {
                // 65 to 128 bits: assemble from two 64-bit halves.
                let (high, low) = match operand.as_const().and_then(Const::as_int) {
                    Some(value) => (
                        Operand::Const(Const::int(value >> 64, 64)),
                        Operand::Const(Const::int(value, 64)),
                    ),
                    None => {
                        let shifted = f.insert_before(
                            before,
                            Inst::new(
                                Ty::Int(bits),
                                Op::Bin {
                                    op: symvm_ir::BinOp::LShr,
                                    lhs: operand.clone(),
                                    rhs: Operand::Const(Const::int(64, bits)),
                                },
                            ),
                        );
                        let high = f.insert_before(
                            before,
                            Inst::new(
                                Ty::I64,
                                Op::Cast {
                                    op: CastOp::Trunc,
                                    value: Operand::from(shifted),
                                },
                            ),
                        );
                        let low = f.insert_before(
                            before,
                            Inst::new(
                                Ty::I64,
                                Op::Cast {
                                    op: CastOp::Trunc,
                                    value: operand.clone(),
                                },
                            ),
                        );
                        (Operand::from(high), Operand::from(low))
                    }
                };
                self.runtime_call(
                    f,
                    before,
                    Ty::Ptr,
                    RuntimeFn::BuildInteger128,
                    vec![high, low],
                )
            }
            Ty::Float | Ty::Double => {
                let is_double = ty.is_double();
                let as_double = if is_double {
                    operand.clone()
                } else {
                    match operand.as_const() {
                        Some(Const::Float { value, .. }) => Operand::Const(Const::Float {
                            value: *value,
                            double: true,
                        }),
                        _ => Operand::from(f.insert_before(
                            before,
                            Inst::new(
                                Ty::Double,
                                Op::Cast {
                                    op: CastOp::FpExt,
                                    value: operand.clone(),
                                },
                            ),
                        )),
                    }
                };
                self.runtime_call(
                    f,
                    before,
                    Ty::Ptr,
                    RuntimeFn::BuildFloat,
                    vec![as_double, Operand::Const(Const::bool(is_double))],
                )
            }
            Ty::Ptr => {
                let as_int = f.insert_before(
                    before,
                    Inst::new(
                        Ty::Int(self.ptr_bits),
                        Op::Cast {
                            op: CastOp::PtrToInt,
                            value: operand.clone(),
                        },
                    ),
                );
                self.runtime_call(
                    f,
                    before,
                    Ty::Ptr,
                    RuntimeFn::BuildInteger,
                    vec![
                        Operand::from(as_int),
                        Operand::Const(Const::int(u128::from(self.ptr_bits), 8)),
                    ],
                )
            }
            Ty::Struct(_) => {
                // Structures in SSA registers have no address; spill to a
                // stack slot and read the expression from memory.
                let size = self.data_layout.store_size(&ty);
                let slot = f.insert_before(before, Inst::new(Ty::Ptr, Op::Alloca { ty }));
                f.insert_before(
                    before,
                    Inst::new(
                        Ty::Void,
                        Op::Store {
                            value: operand.clone(),
                            addr: Operand::from(slot),
                        },
                    ),
                );
                self.runtime_call(
                    f,
                    before,
                    Ty::Ptr,
                    RuntimeFn::ReadMemory,
                    vec![
                        Operand::from(slot),
                        Operand::Const(Const::int(u128::from(size), self.ptr_bits)),
                        Operand::Const(Const::int(0, 8)),
                    ],
                )
            }
            other => unreachable!("cannot express constant of type {other}"),
        }
    }

    /// Fill in the dummy expression PHIs now that every incoming value has
    /// been processed. PHIs whose every incoming value is concrete are
    /// erased and their uses replaced with null.
    pub fn finalize_phi_nodes(&mut self, f: &mut Function) {
        let mut to_erase = Vec::new();

        for (phi, expr_phi) in &self.phi_nodes {
            let Op::Phi { incoming } = f.inst(*phi).op.clone() else {
                unreachable!("recorded phi changed shape");
            };

            if incoming
                .iter()
                .all(|(_, value)| self.get_symbolic_expression(value).is_none())
            {
                to_erase.push(*expr_phi);
                continue;
            }

            let filled: Vec<(BlockId, Operand)> = incoming
                .iter()
                .map(|(block, value)| (*block, self.get_symbolic_expression_or_null(value)))
                .collect();
            if let Op::Phi { incoming: slots } = &mut f.inst_mut(*expr_phi).op {
                *slots = filled;
            }
        }

        for expr_phi in to_erase {
            f.replace_uses(ValueId::Inst(expr_phi), &Operand::NULL);
            f.remove_inst(expr_phi);
        }

        // Uses in the code are fixed, but the map still points at the erased
        // nodes; it must not be consulted afterwards.
        self.symbolic_expressions.clear();
    }
}
