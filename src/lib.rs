//! Compilation-based concolic execution.
//!
//! The crate has two halves. The *instrumentation pass* ([`pass`]) rewrites
//! bitcode-level IR (see the `symvm-ir` crate) so that every instruction is
//! shadowed by a call constructing, propagating or querying a symbolic
//! expression for the same value. The *symbolic runtime* ([`runtime`] and
//! friends) is what those calls land in when the instrumented program runs:
//! it maintains an expression DAG over the input bytes, mirrors memory in a
//! per-byte shadow, and at every symbolic branch asks an SMT solver for an
//! input taking the other direction, emitting the answers as new test
//! cases.
//!
//! The SMT solver itself is consumed through the [`solver::Solver`] trait;
//! backends register themselves with [`ffi::set_solver_factory`] before the
//! instrumented program's constructors run.

pub mod config;
pub mod consts;
pub mod error;
pub mod expr;
pub mod ffi;
pub mod pass;
pub mod runtime;
pub mod shadow;
pub mod solver;
pub mod wrappers;

pub mod prelude {
    pub use crate::config::{Config, InputSource};
    pub use crate::error::{ConfigError, PassError, RuntimeError};
    pub use crate::expr::{ExprBuilder, ExprRef, SymExpr};
    pub use crate::pass::{instrument_function, instrument_module, Symbolizer};
    pub use crate::runtime::Runtime;
    pub use crate::shadow::Shadow;
    pub use crate::solver::{
        NullSolver, ScriptedSolver, Solver, SolverGateway, SolverResult,
    };
}
