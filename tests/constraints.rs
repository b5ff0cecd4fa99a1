//! The constraint manager and the solver gateway.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use symvm::config::Config;
use symvm::expr::ExprKind;
use symvm::runtime::Runtime;
use symvm::solver::{ScriptedSolver, SolverResult};

use common::{emitted_test_cases, model, runtime, runtime_with};

#[test]
fn negation_is_queried_and_the_taken_direction_asserted() {
    let solver = ScriptedSolver::new().sat(model(&[(0, b'a')]));
    let (mut rt, dir) = runtime_with(solver);

    // The program read byte 'b' and branched on it being 'a'.
    let byte = rt.get_input_byte(0, b'b');
    let constraint = rt.build(|b| {
        let wanted = b.integer(u128::from(b'a'), 8);
        b.equal(byte.clone(), wanted)
    });

    rt.push_path_constraint(Some(constraint.clone()), false, 0x100);

    let solver = rt.gateway().solver();
    assert_eq!(solver.checks(), 1);
    assert_eq!(solver.depth(), 0, "speculative frame must be popped");

    // Not taken: the negation is what the execution commits to.
    let permanent: Vec<_> = solver.permanent_assertions().collect();
    assert_eq!(permanent.len(), 1);
    assert!(matches!(permanent[0].kind(), ExprKind::BoolNot { .. }));

    // The mined test case flips byte 0 to 'a'.
    assert_eq!(emitted_test_cases(&dir), vec![vec![b'a']]);
}

#[test]
fn taken_branches_assert_the_constraint_itself() {
    let solver = ScriptedSolver::new().unsat();
    let (mut rt, dir) = runtime_with(solver);

    let byte = rt.get_input_byte(0, b'a');
    let constraint = rt.build(|b| {
        let wanted = b.integer(u128::from(b'a'), 8);
        b.equal(byte, wanted)
    });

    rt.push_path_constraint(Some(constraint.clone()), true, 0x101);

    let solver = rt.gateway().solver();
    let permanent: Vec<_> = solver.permanent_assertions().collect();
    assert_eq!(permanent.len(), 1);
    assert!(Rc::ptr_eq(permanent[0], &constraint));

    // UNSAT means no diverging input; not an error.
    assert!(emitted_test_cases(&dir).is_empty());
}

#[test]
fn unknown_results_are_tolerated() {
    let solver = ScriptedSolver::new().unknown();
    let (mut rt, dir) = runtime_with(solver);

    let byte = rt.get_input_byte(0, 7);
    let constraint = rt.build(|b| {
        let zero = b.integer(0, 8);
        b.not_equal(byte, zero)
    });
    rt.push_path_constraint(Some(constraint), true, 0x102);

    assert!(emitted_test_cases(&dir).is_empty());
    assert_eq!(rt.gateway().solver().permanent_assertions().count(), 1);
}

#[test]
fn null_and_folded_constraints_are_skipped() {
    let (mut rt, _dir) = runtime();

    rt.push_path_constraint(None, true, 0x103);

    // A condition that folded to the taken direction needs no query.
    let always = rt.build(|b| {
        let three = b.integer(3, 8);
        let five = b.integer(5, 8);
        b.unsigned_less_than(three, five)
    });
    assert_eq!(always.as_const_bool(), Some(true));
    rt.push_path_constraint(Some(always), true, 0x104);

    let solver = rt.gateway().solver();
    assert_eq!(solver.checks(), 0);
    assert_eq!(solver.assertions().len(), 0);
}

#[test]
fn test_cases_reach_an_installed_handler_instead_of_disk() {
    let solver = ScriptedSolver::new().sat(model(&[(0, 0x61)]));
    let (mut rt, dir) = runtime_with(solver);

    let received: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let sink = received.clone();
    rt.gateway_mut()
        .set_test_case_handler(Some(Box::new(move |bytes: &[u8]| {
            sink.borrow_mut().push(bytes.to_vec());
        })));

    let byte = rt.get_input_byte(0, 0x62);
    let constraint = rt.build(|b| {
        let wanted = b.integer(0x61, 8);
        b.equal(byte, wanted)
    });
    rt.push_path_constraint(Some(constraint), false, 0x105);

    assert_eq!(*received.borrow(), vec![vec![0x61]]);
    assert!(emitted_test_cases(&dir).is_empty());
}

#[test]
fn feasibility_checks_use_a_speculative_frame() {
    let solver = ScriptedSolver::new().sat(model(&[]));
    let (mut rt, _dir) = runtime_with(solver);

    let byte = rt.get_input_byte(0, 1);
    let constraint = rt.build(|b| {
        let zero = b.integer(0, 8);
        b.not_equal(byte, zero)
    });

    assert!(rt.gateway_mut().feasible(constraint));
    let solver = rt.gateway().solver();
    assert_eq!(solver.depth(), 0);
    assert_eq!(solver.permanent_assertions().count(), 0);
}

#[test]
fn try_alternative_mines_and_pins_the_concrete_value() {
    let solver = ScriptedSolver::new().sat(model(&[(0, 9)]));
    let (mut rt, dir) = runtime_with(solver);

    let length = rt.get_input_byte(0, 3);
    let wide = rt.build(|b| b.zext(length, 56));
    rt.try_alternative(3, Some(wide), 0x106);

    // One query for the alternative, then equality with the observed value.
    assert_eq!(rt.gateway().solver().checks(), 1);
    let permanent: Vec<_> = rt.gateway().solver().permanent_assertions().collect();
    assert_eq!(permanent.len(), 1);
    assert!(matches!(permanent[0].kind(), ExprKind::Cmp { .. }));

    assert_eq!(emitted_test_cases(&dir), vec![vec![9]]);
}

#[test]
fn pruning_stops_querying_hot_sites() {
    let solver = (0..64).fold(ScriptedSolver::new(), |s, _| s.unsat());
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        output_dir: dir.path().to_path_buf(),
        pruning: true,
        ..Config::default()
    };
    let mut rt = Runtime::new(config, solver).expect("runtime setup");

    let byte = rt.get_input_byte(0, 1);
    for _ in 0..64 {
        let constraint = rt.build(|b| {
            let zero = b.integer(0, 8);
            b.not_equal(byte.clone(), zero)
        });
        rt.push_path_constraint(Some(constraint), true, 0x107);
    }

    let checks = rt.gateway().solver().checks();
    assert!(checks < 64, "hot site must stop generating queries");
    assert!(checks > 0, "cold site must be queried");
}

#[test]
fn mined_inputs_extend_beyond_the_recorded_bytes() {
    let solver = ScriptedSolver::new().sat(model(&[(3, 0xff)]));
    let (mut rt, dir) = runtime_with(solver);

    let byte = rt.get_input_byte(0, 0x10);
    let constraint = rt.build(|b| {
        let zero = b.integer(0, 8);
        b.not_equal(byte, zero)
    });
    rt.push_path_constraint(Some(constraint), false, 0x108);

    // Only offset 0 was consumed, but the model constrains offset 3; the
    // test case grows to cover it.
    assert_eq!(emitted_test_cases(&dir), vec![vec![0x10, 0, 0, 0xff]]);
}

#[test]
fn byte_swapped_comparison_mines_the_swapped_input() {
    // A program reads four bytes, applies ntohl, compares to 0xcafebeef.
    let solver = ScriptedSolver::new().sat(model(&[(0, 0xef), (1, 0xbe), (2, 0xfe), (3, 0xca)]));
    let (mut rt, dir) = runtime_with(solver);

    let word = {
        let b0 = rt.get_input_byte(0, 0x04);
        let b1 = rt.get_input_byte(1, 0x03);
        let b2 = rt.get_input_byte(2, 0x02);
        let b3 = rt.get_input_byte(3, 0x01);
        // Little-endian in-memory value: byte 0 is least significant.
        rt.build(|b| {
            let lo = b.concat(b1.clone(), b0.clone());
            let hi = b.concat(b3.clone(), b2.clone());
            b.concat(hi, lo)
        })
    };
    let swapped = rt.build(|b| b.bswap(word));
    let constraint = rt.build(|b| {
        let wanted = b.integer(0xcafe_beef, 32);
        b.equal(swapped, wanted)
    });
    rt.push_path_constraint(Some(constraint), false, 0x109);

    assert_eq!(emitted_test_cases(&dir), vec![vec![0xef, 0xbe, 0xfe, 0xca]]);
}

#[test]
fn solver_results_reflect_the_script() {
    let mut solver = ScriptedSolver::new().sat(model(&[])).unsat().unknown();
    use symvm::solver::Solver;
    assert_eq!(
        solver.check(std::time::Duration::from_secs(1)),
        SolverResult::Sat
    );
    assert_eq!(
        solver.check(std::time::Duration::from_secs(1)),
        SolverResult::Unsat
    );
    assert_eq!(
        solver.check(std::time::Duration::from_secs(1)),
        SolverResult::Unknown
    );
}
