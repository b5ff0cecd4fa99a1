//! Structural checks on instrumented IR: the pass must emit the right
//! runtime calls, keep SSA form intact (it re-verifies every function), and
//! install the concrete-operands fast path.

use symvm::pass::{instrument_function, instrument_module, CTOR_NAME};
use symvm_ir::{
    BinOp, Callee, Const, DataLayout, Function, FunctionBuilder, IcmpPred, Intrinsic, Module, Op,
    Operand, RuntimeFn, Ty,
};

fn layout() -> DataLayout {
    DataLayout {
        little_endian: true,
        ptr_bits: 64,
    }
}

/// All calls to a given runtime function, in block order.
fn runtime_calls(f: &Function, target: RuntimeFn) -> Vec<symvm_ir::InstId> {
    f.all_insts()
        .into_iter()
        .filter(|&id| {
            matches!(
                &f.inst(id).op,
                Op::Call { callee: Callee::Runtime(rf), .. } if *rf == target
            )
        })
        .collect()
}

fn call_args(f: &Function, id: symvm_ir::InstId) -> Vec<Operand> {
    match &f.inst(id).op {
        Op::Call { args, .. } => args.clone(),
        other => panic!("not a call: {other:?}"),
    }
}

#[test]
fn arguments_get_a_symbolic_prologue() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32, Ty::I32], Ty::I32);
    let sum = b.bin(BinOp::Add, Ty::I32, b.arg(0), b.arg(1));
    b.ret(Some(sum));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // Both arguments are used, so both slots are read.
    let prologue = runtime_calls(&f, RuntimeFn::GetParameterExpression);
    assert_eq!(prologue.len(), 2);
    assert_eq!(
        call_args(&f, prologue[0])[0],
        Operand::Const(Const::int(0, 8))
    );
    assert_eq!(
        call_args(&f, prologue[1])[0],
        Operand::Const(Const::int(1, 8))
    );
}

#[test]
fn main_receives_concrete_arguments() {
    let mut b = FunctionBuilder::new("main", vec![Ty::I32], Ty::I32);
    let arg = b.arg(0);
    b.ret(Some(arg));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    assert!(runtime_calls(&f, RuntimeFn::GetParameterExpression).is_empty());
}

#[test]
fn every_original_block_is_notified() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I1], Ty::Void);
    let then_block = b.new_block();
    let else_block = b.new_block();
    b.cond_br(b.arg(0), then_block, else_block);
    b.switch_to(then_block);
    b.ret(None);
    b.switch_to(else_block);
    b.ret(None);
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    assert_eq!(runtime_calls(&f, RuntimeFn::NotifyBasicBlock).len(), 3);
}

#[test]
fn conditional_branches_push_the_condition_with_its_direction() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
    let then_block = b.new_block();
    let else_block = b.new_block();
    let cond = b.icmp(IcmpPred::Eq, b.arg(0), b.int(5, 32));
    b.cond_br(cond.clone(), then_block, else_block);
    b.switch_to(then_block);
    b.ret(Some(b.int(1, 32)));
    b.switch_to(else_block);
    b.ret(Some(b.int(0, 32)));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    let compares = runtime_calls(&f, RuntimeFn::BuildEqual);
    assert_eq!(compares.len(), 1);

    let pushes = runtime_calls(&f, RuntimeFn::PushPathConstraint);
    assert_eq!(pushes.len(), 1);
    let args = call_args(&f, pushes[0]);
    assert_eq!(args.len(), 3);
    // The second argument is the concrete direction: the branch condition
    // itself.
    assert_eq!(args[1], cond);
}

#[test]
fn binary_operations_are_short_circuited() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
    let sum = b.bin(BinOp::Add, Ty::I32, b.arg(0), b.int(1, 32));
    b.ret(Some(sum));
    let mut f = b.finish();

    let blocks_before = f.num_blocks();
    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // head | slow path | tail
    assert_eq!(f.num_blocks(), blocks_before + 2);

    let adds = runtime_calls(&f, RuntimeFn::BuildAdd);
    assert_eq!(adds.len(), 1);

    // The entry block now ends in the fast-path dispatch.
    let entry_term = f.terminator(f.entry()).expect("terminator");
    assert!(matches!(f.inst(entry_term).op, Op::CondBr { .. }));

    // A null-or-result PHI feeds the return expression.
    let tail_phis: Vec<_> = f
        .all_insts()
        .into_iter()
        .filter(|&id| f.inst(id).op.is_phi() && f.inst(id).ty == Ty::Ptr)
        .collect();
    assert_eq!(tail_phis.len(), 1);
    let set_ret = runtime_calls(&f, RuntimeFn::SetReturnExpression);
    assert_eq!(set_ret.len(), 1);
    assert_eq!(call_args(&f, set_ret[0])[0], Operand::from(tail_phis[0]));

    // With a single input of unknown concreteness, the slow path needs no
    // per-operand null check, but the constant operand is materialized.
    assert_eq!(runtime_calls(&f, RuntimeFn::BuildInteger).len(), 1);
}

#[test]
fn loads_and_stores_mirror_memory_through_the_runtime() {
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr, Ty::Ptr], Ty::Void);
    let value = b.load(Ty::I32, b.arg(0));
    b.store(value, b.arg(1));
    b.ret(None);
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    let reads = runtime_calls(&f, RuntimeFn::ReadMemory);
    assert_eq!(reads.len(), 1);
    let read_args = call_args(&f, reads[0]);
    assert_eq!(read_args[1], Operand::Const(Const::int(4, 64)));
    assert_eq!(read_args[2], Operand::Const(Const::int(1, 8)));

    let writes = runtime_calls(&f, RuntimeFn::WriteMemory);
    assert_eq!(writes.len(), 1);
    // The stored expression is the one the load produced.
    assert_eq!(call_args(&f, writes[0])[2], Operand::from(reads[0]));
}

#[test]
fn float_loads_are_reinterpreted() {
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr], Ty::Double);
    let value = b.load(Ty::Double, b.arg(0));
    b.ret(Some(value));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    assert_eq!(runtime_calls(&f, RuntimeFn::BuildBitsToFloat).len(), 1);
}

#[test]
fn gep_duplicates_address_arithmetic() {
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr, Ty::I64], Ty::Ptr);
    let addr = b.gep(b.arg(0), Ty::I32, vec![b.arg(1)]);
    b.ret(Some(addr));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // index * sizeof(i32) + base
    let muls = runtime_calls(&f, RuntimeFn::BuildMul);
    assert_eq!(muls.len(), 1);
    let adds = runtime_calls(&f, RuntimeFn::BuildAdd);
    assert_eq!(adds.len(), 1);
    // The index is 64-bit already; no widening needed.
    assert!(runtime_calls(&f, RuntimeFn::BuildZext).is_empty());
}

#[test]
fn narrow_gep_indices_are_widened() {
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr, Ty::I32], Ty::Ptr);
    let addr = b.gep(b.arg(0), Ty::I8, vec![b.arg(1)]);
    b.ret(Some(addr));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    let zexts = runtime_calls(&f, RuntimeFn::BuildZext);
    assert_eq!(zexts.len(), 1);
    assert_eq!(
        call_args(&f, zexts[0])[1],
        Operand::Const(Const::int(32, 8))
    );
}

#[test]
fn concrete_geps_emit_nothing() {
    let mut b = FunctionBuilder::new("main", vec![], Ty::Ptr);
    let slot = b.alloca(Ty::Array(Box::new(Ty::I32), 8));
    let addr = b.gep(slot, Ty::I32, vec![b.int(3, 64)]);
    b.ret(Some(addr));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    assert!(runtime_calls(&f, RuntimeFn::BuildMul).is_empty());
    assert!(runtime_calls(&f, RuntimeFn::BuildAdd).is_empty());
}

#[test]
fn switches_expand_into_guarded_case_constraints() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::Void);
    let default = b.new_block();
    let case3 = b.new_block();
    let case4 = b.new_block();
    let case5 = b.new_block();
    b.switch(
        b.arg(0),
        default,
        vec![(3, case3), (4, case4), (5, case5)],
    );
    for block in [default, case3, case4, case5] {
        b.switch_to(block);
        b.ret(None);
    }
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // One equality and one constraint push per case, all inside a block
    // guarded by "is the scrutinee symbolic".
    let case_constraints = runtime_calls(&f, RuntimeFn::BuildEqual);
    assert_eq!(case_constraints.len(), 3);
    let pushes = runtime_calls(&f, RuntimeFn::PushPathConstraint);
    assert_eq!(pushes.len(), 3);

    let guard_block = f.block_of(case_constraints[0]).expect("attached");
    for &push in &pushes {
        assert_eq!(f.block_of(push), Some(guard_block));
    }

    // Each case materializes its constant for the comparison.
    assert_eq!(runtime_calls(&f, RuntimeFn::BuildInteger).len(), 3);
}

#[test]
fn calls_follow_the_parameter_slot_protocol() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
    let result = b.call(
        Ty::I32,
        Callee::Function("helper".into()),
        vec![b.arg(0), b.int(7, 32)],
    );
    b.ret(Some(result));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    let set_params = runtime_calls(&f, RuntimeFn::SetParameterExpression);
    assert_eq!(set_params.len(), 2);

    let call = f
        .all_insts()
        .into_iter()
        .find(|&id| {
            matches!(&f.inst(id).op, Op::Call { callee: Callee::Function(name), .. } if name == "helper")
        })
        .expect("original call survives");

    let notify_call = runtime_calls(&f, RuntimeFn::NotifyCall)[0];
    let notify_ret = runtime_calls(&f, RuntimeFn::NotifyRet)[0];
    let get_ret = runtime_calls(&f, RuntimeFn::GetReturnExpression)[0];
    let clear_ret = runtime_calls(&f, RuntimeFn::SetReturnExpression)
        .into_iter()
        .find(|&id| call_args(&f, id)[0].is_null())
        .expect("return slot cleared before the call");

    let block = f.block_of(call).expect("attached");
    let order = f.block_insts(block);
    let position = |needle| order.iter().position(|&i| i == needle).expect("in block");

    assert!(position(notify_call) < position(call));
    assert!(position(clear_ret) < position(call));
    assert!(position(call) < position(notify_ret));
    assert!(position(notify_ret) < position(get_ret));
}

#[test]
fn select_pushes_and_propagates() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I1, Ty::I32, Ty::I32], Ty::I32);
    let picked = b.select(Ty::I32, b.arg(0), b.arg(1), b.arg(2));
    b.ret(Some(picked));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    assert_eq!(runtime_calls(&f, RuntimeFn::PushPathConstraint).len(), 1);

    // The expression of the chosen side travels through a parallel select.
    let expr_selects: Vec<_> = f
        .all_insts()
        .into_iter()
        .filter(|&id| matches!(f.inst(id).op, Op::Select { .. }) && f.inst(id).ty == Ty::Ptr)
        .collect();
    assert_eq!(expr_selects.len(), 1);
}

#[test]
fn all_concrete_phis_are_erased() {
    let mut b = FunctionBuilder::new("main", vec![Ty::I1], Ty::I32);
    let left = b.new_block();
    let right = b.new_block();
    let join = b.new_block();
    b.cond_br(b.arg(0), left, right);
    b.switch_to(left);
    b.br(join);
    b.switch_to(right);
    b.br(join);
    b.switch_to(join);
    let entry_left = b.int(1, 32);
    let entry_right = b.int(2, 32);
    let merged = b.phi(Ty::I32, vec![(left, entry_left), (right, entry_right)]);
    b.ret(Some(merged));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // No pointer-typed PHI survives: both incoming values are concrete.
    let expr_phis = f
        .all_insts()
        .into_iter()
        .filter(|&id| f.inst(id).op.is_phi() && f.inst(id).ty == Ty::Ptr)
        .count();
    assert_eq!(expr_phis, 0);
}

#[test]
fn loop_carried_phis_are_finalized_with_their_expressions() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
    let header = b.new_block();
    let exit = b.new_block();
    b.br(header);

    b.switch_to(header);
    let counter = b.phi(Ty::I32, vec![(b.func().entry(), b.int(0, 32))]);
    let next = b.bin(BinOp::Add, Ty::I32, counter.clone(), b.arg(0));
    let done = b.icmp(IcmpPred::Uge, next.clone(), b.int(100, 32));
    // Complete the loop edge by hand.
    b.cond_br(done, exit, header);

    b.switch_to(exit);
    b.ret(Some(counter.clone()));
    let mut f = b.finish();

    // Register the back-edge in the phi.
    let phi_inst = counter.value().and_then(|v| match v {
        symvm_ir::ValueId::Inst(id) => Some(id),
        _ => None,
    });
    if let Op::Phi { incoming } = &mut f.inst_mut(phi_inst.unwrap()).op {
        incoming.push((header, next));
    }

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    // The loop-carried value is symbolic (it depends on the argument), so
    // an expression PHI must survive finalization.
    let expr_phis = f
        .all_insts()
        .into_iter()
        .filter(|&id| f.inst(id).op.is_phi() && f.inst(id).ty == Ty::Ptr)
        .count();
    assert!(expr_phis >= 1);
}

#[test]
fn overflow_intrinsics_use_the_packing_builders() {
    let agg = Ty::Struct(vec![Ty::I32, Ty::I1]);
    let mut b = FunctionBuilder::new("f", vec![Ty::I32, Ty::I32], agg.clone());
    let packed = b.call(
        agg,
        Callee::Intrinsic(Intrinsic::SaddWithOverflow),
        vec![b.arg(0), b.arg(1)],
    );
    b.ret(Some(packed));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    let overflow = runtime_calls(&f, RuntimeFn::BuildAddOverflow);
    assert_eq!(overflow.len(), 1);
    let args = call_args(&f, overflow[0]);
    assert_eq!(args[2], Operand::Const(Const::bool(true)), "signed variant");
    assert_eq!(
        args[3],
        Operand::Const(Const::bool(true)),
        "little-endian layout"
    );
}

#[test]
fn memcpy_intrinsics_route_to_the_runtime_analogue() {
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr, Ty::Ptr, Ty::I64], Ty::Void);
    b.call(
        Ty::Void,
        Callee::Intrinsic(Intrinsic::Memcpy),
        vec![b.arg(0), b.arg(1), b.arg(2)],
    );
    b.ret(None);
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    assert_eq!(runtime_calls(&f, RuntimeFn::Memcpy).len(), 1);
}

#[test]
fn bit_count_intrinsics_concretize() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I32], Ty::I32);
    let count = b.call(
        Ty::I32,
        Callee::Intrinsic(Intrinsic::Ctpop),
        vec![b.arg(0)],
    );
    b.ret(Some(count));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
    // The result carries no expression: the return sees a null slot.
    let set_ret = runtime_calls(&f, RuntimeFn::SetReturnExpression);
    assert_eq!(set_ret.len(), 1);
    assert!(call_args(&f, set_ret[0])[0].is_null());
}

#[test]
fn modules_are_rewired_for_interception_and_startup() {
    let mut module = Module::new(layout());

    let mut b = FunctionBuilder::new("main", vec![], Ty::I32);
    b.call(
        Ty::Ptr,
        Callee::Function("memcpy".into()),
        vec![Operand::NULL, Operand::NULL, b.int(0, 64)],
    );
    b.ret(Some(b.int(0, 32)));
    module.add_function(b.finish());

    instrument_module(&mut module).expect("instrumentation verifies");

    assert_eq!(module.ctors.len(), 1);
    assert_eq!(module.ctors[0].priority, 0);
    assert_eq!(module.ctors[0].function, CTOR_NAME);

    let ctor = module.function(CTOR_NAME).expect("constructor injected");
    assert_eq!(runtime_calls(ctor, RuntimeFn::Initialize).len(), 1);

    let main = module.function("main").expect("main survives");
    let renamed = main.all_insts().into_iter().any(|id| {
        matches!(
            &main.inst(id).op,
            Op::Call { callee: Callee::Function(name), .. } if name == "memcpy_symbolized"
        )
    });
    assert!(renamed, "intercepted call must be routed to the wrapper");
}

#[test]
fn casts_pick_the_matching_builder() {
    let mut b = FunctionBuilder::new("f", vec![Ty::I8, Ty::I1], Ty::I64);
    let widened = b.cast(symvm_ir::CastOp::SExt, b.arg(0), Ty::I64);
    let from_bool = b.cast(symvm_ir::CastOp::ZExt, b.arg(1), Ty::I64);
    let sum = b.bin(BinOp::Add, Ty::I64, widened, from_bool);
    b.ret(Some(sum));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");

    let sexts = runtime_calls(&f, RuntimeFn::BuildSext);
    assert_eq!(sexts.len(), 1);
    assert_eq!(
        call_args(&f, sexts[0])[1],
        Operand::Const(Const::int(56, 8)),
        "sext grows by the width difference"
    );
    assert_eq!(runtime_calls(&f, RuntimeFn::BuildBoolToBit).len(), 1);
}

#[test]
fn instrumented_functions_always_reverify() {
    // A slightly larger function mixing several features; the pass
    // verifying it is the core assertion.
    let mut b = FunctionBuilder::new("f", vec![Ty::Ptr, Ty::I32], Ty::I32);
    let loop_block = b.new_block();
    let done = b.new_block();

    let value = b.load(Ty::I32, b.arg(0));
    b.br(loop_block);

    b.switch_to(loop_block);
    let doubled = b.bin(BinOp::Mul, Ty::I32, value.clone(), b.int(2, 32));
    let cond = b.icmp(IcmpPred::Slt, doubled.clone(), b.arg(1));
    b.cond_br(cond, loop_block, done);

    b.switch_to(done);
    b.ret(Some(doubled));
    let mut f = b.finish();

    instrument_function(&mut f, layout()).expect("instrumentation verifies");
}
