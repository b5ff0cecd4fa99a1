//! The symbolic runtime: the state an instrumented program computes
//! against, and the surface it calls into.
//!
//! [`Runtime`] owns the expression builder, the shadow memory, the
//! parameter/return slots, the allocation registry and the solver gateway.
//! It is generic over the [`Solver`] seam the same way the design keeps the
//! SMT solver an external collaborator. All state is logically thread-local;
//! the C ABI layer instantiates one runtime per thread.

mod constraints;
mod coverage;
mod gc;
mod input;
mod memory;
mod slots;

pub use coverage::CallStackTracker;
pub use gc::{AllocationSet, ExprRegion};

use std::collections::HashMap;
use std::fs;

use crate::config::{Config, InputSource};
use crate::consts::MAX_FUNCTION_ARGS;
use crate::error::{ConfigError, RuntimeError};
use crate::expr::{ExprBuilder, ExprRef};
use crate::shadow::Shadow;
use crate::solver::{Solver, SolverGateway};

pub struct Runtime<S> {
    config: Config,
    builder: ExprBuilder,
    shadow: Shadow,
    params: Vec<Option<ExprRef>>,
    return_value: Option<ExprRef>,
    allocated: AllocationSet,
    gateway: SolverGateway<S>,
    coverage: CallStackTracker,
    /// Position in the symbolic input; advanced by the I/O wrappers.
    input_offset: usize,
    /// Descriptor latched onto the symbolic input, once opened.
    input_fd: Option<i32>,
    site_counts: HashMap<usize, u32>,
}

impl<S: Solver> Runtime<S> {
    /// Set up a runtime for the given configuration and solver backend.
    ///
    /// For file inputs, the input file is read here so that mined test
    /// cases start from the bytes the program actually processes.
    pub fn new(config: Config, solver: S) -> Result<Self, RuntimeError> {
        if config.input != InputSource::None && !config.output_dir.is_dir() {
            return Err(ConfigError::MissingOutputDir(
                config.output_dir.display().to_string(),
            )
            .into());
        }

        let coverage = CallStackTracker::new(config.coverage_map.clone())?;
        let mut gateway = SolverGateway::new(solver, config.output_dir.clone());

        if let InputSource::File(path) = &config.input {
            gateway.seed_input(fs::read(path)?);
        }

        Ok(Self {
            config,
            builder: ExprBuilder::new(),
            shadow: Shadow::new(),
            params: vec![None; MAX_FUNCTION_ARGS],
            return_value: None,
            allocated: AllocationSet::default(),
            gateway,
            coverage,
            input_offset: 0,
            input_fd: None,
            site_counts: HashMap::new(),
        })
    }

    /// Build an expression and register it in the allocation set. Everything
    /// handed to instrumented code goes through here so that the garbage
    /// collector knows about it.
    pub fn build(&mut self, f: impl FnOnce(&mut ExprBuilder) -> ExprRef) -> ExprRef {
        let expr = f(&mut self.builder);
        self.allocated.register(expr.clone());
        expr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn builder_mut(&mut self) -> &mut ExprBuilder {
        &mut self.builder
    }

    pub fn shadow(&self) -> &Shadow {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut Shadow {
        &mut self.shadow
    }

    pub fn gateway(&self) -> &SolverGateway<S> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut SolverGateway<S> {
        &mut self.gateway
    }

    pub fn allocated(&self) -> &AllocationSet {
        &self.allocated
    }

    pub fn coverage(&self) -> &CallStackTracker {
        &self.coverage
    }

    /// The current position in the symbolic input.
    pub fn input_offset(&self) -> usize {
        self.input_offset
    }

    pub fn set_input_offset(&mut self, offset: usize) {
        self.input_offset = offset;
    }

    /// The descriptor currently treated as the symbolic input, if any.
    pub fn input_fd(&self) -> Option<i32> {
        self.input_fd
    }

    pub fn set_input_fd(&mut self, fd: Option<i32>) {
        self.input_fd = fd;
    }

    /// Latch the symbolic input descriptor if `path` names the configured
    /// input file. Resets the input cursor.
    pub fn maybe_set_input_file(&mut self, path: &str, fd: i32) {
        let InputSource::File(input_path) = &self.config.input else {
            return;
        };

        let name = input_path.to_string_lossy();
        if !path.contains(name.as_ref()) {
            return;
        }

        if self.input_fd.is_some() {
            tracing::warn!("input file opened multiple times; this is not yet supported");
        }

        self.input_fd = Some(fd);
        self.input_offset = 0;
    }

    pub fn notify_call(&mut self, site_id: usize) {
        self.coverage.visit_call(site_id);
    }

    pub fn notify_ret(&mut self, site_id: usize) {
        self.coverage.visit_ret(site_id);
    }

    pub fn notify_basic_block(&mut self, site_id: usize) {
        self.coverage.visit_basic_block(site_id);
    }
}
