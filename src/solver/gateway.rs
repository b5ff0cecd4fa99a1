use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::consts::SOLVER_TIMEOUT;
use crate::expr::ExprRef;
use crate::solver::{Model, Solver, SolverResult};

/// Callback receiving every newly generated test case in-process.
pub type TestCaseHandler = Box<dyn FnMut(&[u8])>;

/// Owns the solver session: the stack of assertion frames, the concrete
/// input the run started from, and the test-case sink.
///
/// Frames are strictly LIFO around every speculative query. The expressions
/// asserted in live frames are part of the garbage collector's root set.
pub struct SolverGateway<S> {
    solver: S,
    frames: Vec<Vec<ExprRef>>,
    input: Vec<u8>,
    output_dir: PathBuf,
    handler: Option<TestCaseHandler>,
    next_test_case: usize,
    timeout: Duration,
}

impl<S: Solver> SolverGateway<S> {
    pub fn new(solver: S, output_dir: PathBuf) -> Self {
        Self {
            solver,
            frames: vec![Vec::new()],
            input: Vec::new(),
            output_dir,
            handler: None,
            next_test_case: 0,
            timeout: SOLVER_TIMEOUT,
        }
    }

    /// Install (or remove) the in-process test-case handler. With a handler
    /// installed, nothing is written to the output directory.
    pub fn set_test_case_handler(&mut self, handler: Option<TestCaseHandler>) {
        self.handler = handler;
    }

    /// Seed the concrete input the run executes on.
    pub fn seed_input(&mut self, bytes: Vec<u8>) {
        self.input = bytes;
    }

    /// Record a concrete input byte observed at `offset`. Keeps the mined
    /// test cases faithful for inputs that arrive byte by byte.
    pub fn record_input_byte(&mut self, offset: usize, value: u8) {
        if self.input.len() <= offset {
            self.input.resize(offset + 1, 0);
        }
        self.input[offset] = value;
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Assert a constraint in the current frame.
    pub fn assert(&mut self, constraint: ExprRef) {
        self.solver.assert(&constraint);
        self.frames
            .last_mut()
            .expect("the permanent frame always exists")
            .push(constraint);
    }

    pub fn push(&mut self) {
        self.solver.push();
        self.frames.push(Vec::new());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "attempt to pop the permanent frame");
        self.solver.pop();
        self.frames.pop();
    }

    pub fn check(&mut self) -> SolverResult {
        self.solver.check(self.timeout)
    }

    /// Whether the constraint is satisfiable together with the current
    /// assertion set.
    pub fn feasible(&mut self, constraint: ExprRef) -> bool {
        self.push();
        self.assert(constraint);
        let result = self.check();
        self.pop();
        result == SolverResult::Sat
    }

    /// Ask for an input that satisfies `diverging` on top of the current
    /// path, and emit it as a test case. Returns the mined input, if any.
    pub fn mine_alternative(&mut self, diverging: ExprRef) -> Option<Vec<u8>> {
        self.push();
        self.assert(diverging);

        let mined = match self.check() {
            SolverResult::Sat => {
                let model = self.solver.model();
                Some(self.apply_model(&model))
            }
            SolverResult::Unsat | SolverResult::Unknown => {
                debug!("can't find a diverging input at this point");
                None
            }
        };

        self.pop();

        if let Some(bytes) = &mined {
            self.emit_test_case(bytes);
        }

        mined
    }

    /// Overlay a model onto the current concrete input.
    fn apply_model(&self, model: &Model) -> Vec<u8> {
        let mut bytes = self.input.clone();
        for (&offset, &value) in model {
            if bytes.len() <= offset {
                bytes.resize(offset + 1, 0);
            }
            bytes[offset] = value;
        }
        bytes
    }

    fn emit_test_case(&mut self, bytes: &[u8]) {
        debug!(length = bytes.len(), "found diverging input");

        if let Some(handler) = &mut self.handler {
            handler(bytes);
            return;
        }

        let path = self.output_dir.join(format!("{:06}", self.next_test_case));
        self.next_test_case += 1;
        if let Err(e) = fs::write(&path, bytes) {
            warn!("failed to write test case to {}: {e}", path.display());
        }
    }

    /// Expressions asserted in live frames; part of the GC root set.
    pub fn expressions(&self) -> impl Iterator<Item = &ExprRef> {
        self.frames.iter().flatten()
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }
}
