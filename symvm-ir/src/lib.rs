//! Typed, SSA, basic-block-structured intermediate representation.
//!
//! Instrumentation operates on modules of this IR: the pass rewrites
//! functions in place, inserting calls to the symbolic runtime next to every
//! computation. The IR deliberately models only what instrumentation needs —
//! it is produced by a bitcode frontend that is not part of this crate.

pub mod builder;
pub mod error;
pub mod function;
pub mod inst;
pub mod module;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::FunctionBuilder;
pub use error::IrError;
pub use function::{Block, Function};
pub use inst::{BinOp, Callee, CastOp, FcmpPred, IcmpPred, Inst, Intrinsic, Op, RuntimeFn};
pub use module::{Ctor, Module};
pub use types::{DataLayout, Ty};
pub use value::{BlockId, Const, InstId, Operand, ValueId};
pub use verify::{verify_function, verify_module};
