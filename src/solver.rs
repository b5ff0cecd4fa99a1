//! The seam to the SMT solver.
//!
//! The solver itself is an external collaborator: the runtime only needs an
//! assertion stack with push/pop, satisfiability checks and model
//! extraction. [`SolverGateway`] drives an implementation of [`Solver`],
//! keeps the frame discipline, and turns models into test cases.

mod gateway;

pub use gateway::{SolverGateway, TestCaseHandler};

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use crate::expr::{ExprId, ExprRef};

/// Outcome of a satisfiability check. UNSAT and UNKNOWN are not errors; a
/// timeout reports UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    Sat,
    Unsat,
    Unknown,
}

/// An assignment of input bytes, keyed by input offset.
pub type Model = HashMap<usize, u8>;

/// Assertion-stack interface of an SMT solver.
pub trait Solver {
    fn push(&mut self);
    fn pop(&mut self);
    fn assert(&mut self, constraint: &ExprRef);
    fn check(&mut self, timeout: Duration) -> SolverResult;
    /// The model of the last successful check.
    fn model(&mut self) -> Model;
    /// Invoked by the garbage collector for expressions that no runtime
    /// root references anymore. Backends that keep their own reference
    /// counts can ignore this.
    fn expression_unreachable(&mut self, _exprs: &[ExprId]) {}
}

impl Solver for Box<dyn Solver> {
    fn push(&mut self) {
        (**self).push();
    }

    fn pop(&mut self) {
        (**self).pop();
    }

    fn assert(&mut self, constraint: &ExprRef) {
        (**self).assert(constraint);
    }

    fn check(&mut self, timeout: Duration) -> SolverResult {
        (**self).check(timeout)
    }

    fn model(&mut self) -> Model {
        (**self).model()
    }

    fn expression_unreachable(&mut self, exprs: &[ExprId]) {
        (**self).expression_unreachable(exprs);
    }
}

/// A solver that never finds anything. Used when no backend is linked; the
/// target then runs concretely while still exercising the instrumentation.
#[derive(Debug, Default)]
pub struct NullSolver;

impl Solver for NullSolver {
    fn push(&mut self) {}

    fn pop(&mut self) {}

    fn assert(&mut self, _constraint: &ExprRef) {}

    fn check(&mut self, _timeout: Duration) -> SolverResult {
        SolverResult::Unknown
    }

    fn model(&mut self) -> Model {
        Model::new()
    }
}

/// A solver double that replays scripted outcomes and records every
/// interaction. This is what the test suite drives the gateway with.
#[derive(Default)]
pub struct ScriptedSolver {
    outcomes: VecDeque<(SolverResult, Model)>,
    depth: usize,
    asserted: Vec<(usize, ExprRef)>,
    checks: usize,
    last_model: Model,
    unreachable: Vec<ExprId>,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next check to be SAT with the given model.
    pub fn sat(mut self, model: Model) -> Self {
        self.outcomes.push_back((SolverResult::Sat, model));
        self
    }

    pub fn unsat(mut self) -> Self {
        self.outcomes.push_back((SolverResult::Unsat, Model::new()));
        self
    }

    pub fn unknown(mut self) -> Self {
        self.outcomes.push_back((SolverResult::Unknown, Model::new()));
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn checks(&self) -> usize {
        self.checks
    }

    /// Every assertion seen, with the frame depth it was made at.
    pub fn assertions(&self) -> &[(usize, ExprRef)] {
        &self.asserted
    }

    /// Assertions made outside any speculative frame, i.e. the path
    /// constraints the execution is committed to.
    pub fn permanent_assertions(&self) -> impl Iterator<Item = &ExprRef> {
        self.asserted
            .iter()
            .filter(|(depth, _)| *depth == 0)
            .map(|(_, e)| e)
    }

    pub fn unreachable_ids(&self) -> &[ExprId] {
        &self.unreachable
    }
}

impl Solver for ScriptedSolver {
    fn push(&mut self) {
        self.depth += 1;
    }

    fn pop(&mut self) {
        assert!(self.depth > 0, "pop without matching push");
        self.depth -= 1;
        self.asserted.retain(|(depth, _)| *depth <= self.depth);
    }

    fn assert(&mut self, constraint: &ExprRef) {
        self.asserted.push((self.depth, constraint.clone()));
    }

    fn check(&mut self, _timeout: Duration) -> SolverResult {
        self.checks += 1;
        match self.outcomes.pop_front() {
            Some((result, model)) => {
                self.last_model = model;
                result
            }
            None => SolverResult::Unsat,
        }
    }

    fn model(&mut self) -> Model {
        self.last_model.clone()
    }

    fn expression_unreachable(&mut self, exprs: &[ExprId]) {
        self.unreachable.extend_from_slice(exprs);
    }
}
