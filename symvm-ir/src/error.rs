use thiserror::Error;

use crate::types::Ty;
use crate::value::{BlockId, InstId, ValueId};

/// Structural and type errors detected by the verifier.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("block {0} is empty")]
    EmptyBlock(BlockId),
    #[error("block {0} does not end in a terminator")]
    MissingTerminator(BlockId),
    #[error("terminator in the middle of block {0}")]
    TerminatorInMiddle(BlockId),
    #[error("phi after a non-phi instruction in block {0}")]
    PhiAfterNonPhi(BlockId),
    #[error("phi in block {block} disagrees with predecessors: {reason}")]
    PhiIncomingMismatch { block: BlockId, reason: String },
    #[error("use of undefined or detached value {0:?}")]
    UnknownValue(ValueId),
    #[error("use of {value:?} before its definition in block {block}")]
    UseBeforeDef { value: ValueId, block: BlockId },
    #[error("type mismatch at {inst:?}: expected {expected}, found {found}")]
    TypeMismatch {
        inst: InstId,
        expected: Ty,
        found: Ty,
    },
    #[error("invalid instruction at {inst:?}: {reason}")]
    InvalidInst { inst: InstId, reason: String },
    #[error("branch to unknown block {0}")]
    UnknownBlock(BlockId),
}
