//! Runtime and build-time error implementation.

use std::io;
use std::num::ParseIntError;

use thiserror::Error;

use symvm_ir::IrError;

/// Startup configuration errors. These abort the target before any symbolic
/// state exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A flag variable held something other than `1|on|yes` or `0|off|no`.
    #[error("unknown flag value {value:?} for {variable}")]
    UnknownFlagValue { variable: String, value: String },
    /// File and memory input are mutually exclusive.
    #[error("can't enable file and memory input at the same time")]
    ConflictingInputModes,
    #[error("can't convert {value:?} to a garbage collection threshold")]
    InvalidGcThreshold {
        value: String,
        #[source]
        source: ParseIntError,
    },
    /// The test-case output directory must exist before the run starts.
    #[error("the output directory {0} does not exist")]
    MissingOutputDir(String),
}

/// Errors of the symbolic runtime proper.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `symcc_make_symbolic` requires the memory input source.
    #[error("calls to symcc_make_symbolic aren't allowed when SYMCC_MEMORY_INPUT isn't set")]
    MakeSymbolicWithoutMemoryInput,
    /// I/O and OS related errors; unrecoverable.
    #[error("unrecoverable error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while instrumenting a module.
#[derive(Debug, Error)]
pub enum PassError {
    /// The rewritten function no longer verifies; the build must abort.
    #[error("instrumentation produced invalid IR in {function}: {source}")]
    InvalidIr {
        function: String,
        #[source]
        source: IrError,
    },
}
