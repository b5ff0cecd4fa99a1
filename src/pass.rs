//! The instrumentation pass.
//!
//! Rewrites a module so that every instruction is shadowed by calls into the
//! symbolic runtime. Per function the pass proceeds in phases: lower a
//! whitelisted set of intrinsics, emit the symbolic-arguments prologue,
//! insert basic-block notifications, visit every snapshotted instruction to
//! build its symbolic counterpart, finalize PHI nodes, and finally run the
//! short-circuit rewriter so that fully concrete computations skip the
//! runtime calls. The rewritten function must still verify; anything else
//! aborts the build.

mod intrinsics;
mod runtime_map;
mod short_circuit;
mod symbolizer;

pub use symbolizer::Symbolizer;

use symvm_ir::{verify_function, Callee, FunctionBuilder, Module, Op, RuntimeFn, Ty};

use crate::error::PassError;

/// Name of the injected module constructor.
pub const CTOR_NAME: &str = "__sym_ctor";

/// Marker appended to intercepted libc functions; calls are thereby routed
/// to the wrapper set.
pub const INTERCEPT_SUFFIX: &str = "_symbolized";

/// The libc functions with symbolic wrappers.
pub const INTERCEPTED_FUNCTIONS: &[&str] = &[
    "malloc", "calloc", "mmap", "mmap64", "open", "read", "lseek", "lseek64", "fopen", "fopen64",
    "fread", "fgets", "rewind", "fseek", "fseeko", "fseeko64", "getc", "fgetc", "getchar",
    "ungetc", "memcpy", "memset", "memmove", "bzero", "bcopy", "strncpy", "strchr", "memcmp",
    "bcmp", "ntohl",
];

pub fn is_intercepted_function(name: &str) -> bool {
    INTERCEPTED_FUNCTIONS.contains(&name)
}

/// Instrument a whole module: route intercepted calls to the wrappers,
/// inject the initialization constructor, and instrument every function.
pub fn instrument_module(module: &mut Module) -> Result<(), PassError> {
    redirect_intercepted_calls(module);
    inject_constructor(module);

    let data_layout = module.data_layout;
    for function in &mut module.functions {
        if function.name == CTOR_NAME {
            continue;
        }
        instrument_function(function, data_layout)?;
    }

    Ok(())
}

/// Instrument a single function in place.
pub fn instrument_function(
    function: &mut symvm_ir::Function,
    data_layout: symvm_ir::DataLayout,
) -> Result<(), PassError> {
    tracing::debug!(name = %function.name, "symbolizing function");

    intrinsics::lower_intrinsics(function);

    let mut symbolizer = Symbolizer::new(data_layout, &function.name);
    symbolizer.symbolize_function_arguments(function);

    for block in function.block_ids().collect::<Vec<_>>() {
        symbolizer.insert_basic_block_notification(function, block);
    }

    for inst in function.all_insts() {
        symbolizer.visit(function, inst);
    }

    symbolizer.finalize_phi_nodes(function);
    symbolizer.short_circuit_expression_uses(function);

    verify_function(function).map_err(|source| PassError::InvalidIr {
        function: function.name.clone(),
        source,
    })
}

/// Rename intercepted callees so the linker resolves them to the wrappers.
fn redirect_intercepted_calls(module: &mut Module) {
    for function in &mut module.functions {
        for inst in function.all_insts() {
            let op = &mut function.inst_mut(inst).op;
            if let Op::Call { callee, .. } | Op::Invoke { callee, .. } = op {
                if let Callee::Function(name) = callee {
                    if is_intercepted_function(name) {
                        name.push_str(INTERCEPT_SUFFIX);
                    }
                }
            }
        }
    }
}

/// Inject a constructor that initializes the runtime before anything else
/// runs.
fn inject_constructor(module: &mut Module) {
    if module.function(CTOR_NAME).is_some() {
        return;
    }

    let mut builder = FunctionBuilder::new(CTOR_NAME, vec![], Ty::Void);
    builder.call(Ty::Void, Callee::Runtime(RuntimeFn::Initialize), vec![]);
    builder.ret(None);
    module.add_function(builder.finish());
    module.add_ctor(0, CTOR_NAME);
}
