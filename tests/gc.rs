//! Garbage collection of the expression registry.

mod common;

use std::rc::Rc;

use symvm::config::Config;
use symvm::expr::{expr_id, SymExpr};
use symvm::runtime::Runtime;
use symvm::solver::ScriptedSolver;

use common::runtime;

fn gc_runtime(threshold: usize) -> (Runtime<ScriptedSolver>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        output_dir: dir.path().to_path_buf(),
        gc_threshold: threshold,
        ..Config::default()
    };
    let runtime = Runtime::new(config, ScriptedSolver::new()).expect("runtime setup");
    (runtime, dir)
}

#[test]
fn transient_expressions_are_reclaimed() {
    let (mut rt, _dir) = gc_runtime(100);

    // Roots that must survive: one byte in the shadow, one in a slot.
    let buf = [0u8; 1];
    let addr = buf.as_ptr() as usize;
    unsafe { rt.make_symbolic(addr, 1, 0) };
    let rooted = rt.get_input_byte(1, 0x7f);
    rt.set_parameter_expression(0, Some(rooted.clone()));

    // A loop allocating transient expressions, unreachable after each
    // iteration.
    let base = rt.get_input_byte(2, 1);
    for i in 0..10_000u32 {
        let _transient = rt.build(|b| {
            let offset = b.integer(u128::from(i), 8);
            b.add(base.clone(), offset)
        });
    }
    assert!(rt.allocated().len() > 10_000);

    rt.collect_garbage();

    // The allocation set shrinks to the order of the live roots, not the
    // iteration count.
    assert!(
        rt.allocated().len() < 100,
        "expected only roots to survive, found {}",
        rt.allocated().len()
    );
    assert!(rt.allocated().contains(expr_id(&rooted)));
    let shadow_byte = rt.shadow().get(addr).cloned().expect("shadowed byte");
    assert!(rt.allocated().contains(expr_id(&shadow_byte)));
}

#[test]
fn collection_is_a_no_op_below_the_threshold() {
    let (mut rt, _dir) = gc_runtime(1000);

    for i in 0..50u32 {
        rt.build(|b| b.integer(u128::from(i), 32));
    }
    let before = rt.allocated().len();
    rt.collect_garbage();
    assert_eq!(rt.allocated().len(), before);
}

#[test]
fn registered_regions_are_roots() {
    let (mut rt, _dir) = gc_runtime(1);

    let kept = rt.get_input_byte(0, 1);
    let dropped = rt.get_input_byte(1, 2);

    let slots: Vec<*const SymExpr> = vec![Rc::as_ptr(&kept), std::ptr::null()];
    unsafe { rt.register_expression_region(slots.as_ptr(), slots.len()) };

    // Keep no other references.
    drop(kept);
    let dropped_id = expr_id(&dropped);
    drop(dropped);

    rt.collect_garbage();

    assert!(rt.allocated().contains(symvm::expr::ExprId(slots[0] as usize)));
    assert!(!rt.allocated().contains(dropped_id));
}

#[test]
fn solver_frames_keep_their_expressions_alive() {
    let (mut rt, _dir) = gc_runtime(1);

    let byte = rt.get_input_byte(0, 5);
    let constraint = rt.build(|b| {
        let zero = b.integer(0, 8);
        b.not_equal(byte, zero)
    });
    let id = expr_id(&constraint);
    rt.gateway_mut().assert(constraint);

    rt.collect_garbage();
    assert!(rt.allocated().contains(id));
}

#[test]
fn backends_learn_about_unreachable_expressions() {
    let (mut rt, _dir) = gc_runtime(1);

    let transient = rt.build(|b| b.integer(42, 32));
    let id = expr_id(&transient);
    drop(transient);

    rt.collect_garbage();

    assert!(!rt.allocated().contains(id));
    assert!(rt
        .gateway()
        .solver()
        .unreachable_ids()
        .contains(&id));
}

#[test]
fn pages_survive_collection_even_when_emptied() {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 4];
    let addr = buf.as_ptr() as usize;

    unsafe { rt.make_symbolic(addr, 4, 0) };
    let pages = rt.shadow().page_count();
    rt.write_memory(addr, 4, None, true);

    assert_eq!(rt.shadow().page_count(), pages);
}
