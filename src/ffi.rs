//! The C linkage surface an instrumented binary links against.
//!
//! Expressions cross this boundary as nullable raw pointers; the allocation
//! registry keeps the pointed-to nodes alive and maps raw handles back to
//! shared references. The runtime instance lives in a thread-local; solver
//! backends register a factory before the module constructors run, and a
//! missing backend degrades to fully concrete execution.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::fs::File;
use std::io::Read;
use std::process;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

use crate::config::{Config, InputSource};
use crate::expr::{ExprRef, SymExpr};
use crate::runtime::Runtime;
use crate::solver::{NullSolver, Solver};

/// Nullable raw expression handle, as seen by instrumented code.
pub type RSymExpr = *const SymExpr;

/// Producer of the solver backend the runtime should use.
pub type SolverFactory = fn() -> Box<dyn Solver>;

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static CONFIG: OnceLock<Config> = OnceLock::new();
static SOLVER_FACTORY: Mutex<Option<SolverFactory>> = Mutex::new(None);
static INPUT_SEED: Mutex<Vec<u8>> = Mutex::new(Vec::new());

thread_local! {
    static RUNTIME: RefCell<Option<Runtime<Box<dyn Solver>>>> = const { RefCell::new(None) };
}

thread_local! {
    static EXPR_STRING: RefCell<CString> = RefCell::new(CString::default());
}

/// Install the solver backend. Must run before `_sym_initialize`, i.e.
/// before the instrumented program's constructors.
pub fn set_solver_factory(factory: SolverFactory) {
    *SOLVER_FACTORY.lock().expect("solver factory lock") = Some(factory);
}

fn make_runtime() -> Runtime<Box<dyn Solver>> {
    let config = CONFIG.get().cloned().unwrap_or_default();
    let solver = match *SOLVER_FACTORY.lock().expect("solver factory lock") {
        Some(factory) => factory(),
        None => {
            tracing::warn!("no solver backend registered; running concretely");
            Box::new(NullSolver)
        }
    };

    match Runtime::new(config.clone(), solver) {
        Ok(mut runtime) => {
            let seed = INPUT_SEED.lock().expect("input seed lock");
            if !seed.is_empty() {
                runtime.gateway_mut().seed_input(seed.clone());
            }
            if config.input == InputSource::Stdin {
                runtime.set_input_fd(Some(0));
            }
            runtime
        }
        Err(e) => {
            eprintln!("symvm: {e}");
            process::exit(1);
        }
    }
}

fn with<R>(f: impl FnOnce(&mut Runtime<Box<dyn Solver>>) -> R) -> R {
    RUNTIME.with(|cell| {
        let mut slot = cell.borrow_mut();
        f(slot.get_or_insert_with(make_runtime))
    })
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match &config.log_file {
        Some(path) => match File::create(path) {
            Ok(file) => builder
                .with_writer(move || file.try_clone().expect("log file handle"))
                .with_ansi(false)
                .try_init(),
            Err(e) => {
                eprintln!("symvm: can't open log file: {e}");
                process::exit(1);
            }
        },
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    // A subscriber may already be installed when the runtime is embedded.
    let _ = result;
}

/// Read all of standard input into a temporary file and point descriptor 0
/// at it, so that the solver session roots at a file even for stdin input.
fn seed_stdin() {
    let mut bytes = Vec::new();
    if let Err(e) = std::io::stdin().read_to_end(&mut bytes) {
        eprintln!("symvm: failed to read stdin: {e}");
        process::exit(1);
    }

    let path = std::env::temp_dir().join(format!("symvm-input-{}", process::id()));
    if let Err(e) = std::fs::write(&path, &bytes) {
        eprintln!("symvm: failed to stage stdin input: {e}");
        process::exit(1);
    }

    *INPUT_SEED.lock().expect("input seed lock") = bytes;

    let c_path = CString::new(path.into_os_string().into_string().expect("temp path"))
        .expect("temp path without NUL");
    unsafe {
        let fd = libc::open(c_path.as_ptr(), libc::O_RDONLY);
        if fd >= 0 {
            libc::dup2(fd, 0);
            libc::close(fd);
        }
    }
}

fn to_raw(expr: Option<ExprRef>) -> RSymExpr {
    match expr {
        Some(expr) => Rc::as_ptr(&expr),
        None => std::ptr::null(),
    }
}

fn from_raw<S: Solver>(runtime: &Runtime<S>, raw: RSymExpr) -> Option<ExprRef> {
    if raw.is_null() {
        return None;
    }
    Some(
        runtime
            .allocated()
            .resolve(raw)
            .expect("unknown expression handle"),
    )
}

fn expect_raw<S: Solver>(runtime: &Runtime<S>, raw: RSymExpr) -> ExprRef {
    from_raw(runtime, raw).expect("unexpected null expression")
}

/*
 * Initialization
 */

#[no_mangle]
pub extern "C" fn _sym_initialize() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("symvm: {e}");
            process::exit(1);
        }
    };

    init_logging(&config);

    if config.input == InputSource::Stdin {
        seed_stdin();
    }

    let _ = CONFIG.set(config);
}

/*
 * Construction of simple values
 */

#[no_mangle]
pub extern "C" fn _sym_build_integer(value: u64, bits: u8) -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.integer(u128::from(value), u32::from(bits))))))
}

#[no_mangle]
pub extern "C" fn _sym_build_integer128(high: u64, low: u64) -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.integer128(high, low)))))
}

#[no_mangle]
pub extern "C" fn _sym_build_float(value: f64, is_double: c_int) -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.float(value, is_double != 0)))))
}

#[no_mangle]
pub extern "C" fn _sym_build_null_pointer() -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.null_pointer()))))
}

#[no_mangle]
pub extern "C" fn _sym_build_true() -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.bool_true()))))
}

#[no_mangle]
pub extern "C" fn _sym_build_false() -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.bool_false()))))
}

#[no_mangle]
pub extern "C" fn _sym_build_bool(value: bool) -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.bool(value)))))
}

/*
 * Binary operations
 */

macro_rules! binary_builders {
    ($($c_name:ident => $method:ident,)*) => {$(
        #[no_mangle]
        pub extern "C" fn $c_name(a: RSymExpr, b: RSymExpr) -> RSymExpr {
            with(|rt| {
                let a = expect_raw(rt, a);
                let b = expect_raw(rt, b);
                to_raw(Some(rt.build(|builder| builder.$method(a, b))))
            })
        }
    )*};
}

binary_builders! {
    _sym_build_add => add,
    _sym_build_sub => sub,
    _sym_build_mul => mul,
    _sym_build_unsigned_div => unsigned_div,
    _sym_build_signed_div => signed_div,
    _sym_build_unsigned_rem => unsigned_rem,
    _sym_build_signed_rem => signed_rem,
    _sym_build_shift_left => shift_left,
    _sym_build_logical_shift_right => logical_shift_right,
    _sym_build_arithmetic_shift_right => arithmetic_shift_right,
    _sym_build_and => and,
    _sym_build_or => or,
    _sym_build_xor => xor,
    _sym_build_signed_less_than => signed_less_than,
    _sym_build_signed_less_equal => signed_less_equal,
    _sym_build_signed_greater_than => signed_greater_than,
    _sym_build_signed_greater_equal => signed_greater_equal,
    _sym_build_unsigned_less_than => unsigned_less_than,
    _sym_build_unsigned_less_equal => unsigned_less_equal,
    _sym_build_unsigned_greater_than => unsigned_greater_than,
    _sym_build_unsigned_greater_equal => unsigned_greater_equal,
    _sym_build_equal => equal,
    _sym_build_not_equal => not_equal,
    _sym_build_bool_and => bool_and,
    _sym_build_bool_or => bool_or,
    _sym_build_bool_xor => bool_xor,
    _sym_build_fp_add => fp_add,
    _sym_build_fp_sub => fp_sub,
    _sym_build_fp_mul => fp_mul,
    _sym_build_fp_div => fp_div,
    _sym_build_fp_rem => fp_rem,
    _sym_build_float_ordered_greater_than => float_ordered_greater_than,
    _sym_build_float_ordered_greater_equal => float_ordered_greater_equal,
    _sym_build_float_ordered_less_than => float_ordered_less_than,
    _sym_build_float_ordered_less_equal => float_ordered_less_equal,
    _sym_build_float_ordered_equal => float_ordered_equal,
    _sym_build_float_ordered_not_equal => float_ordered_not_equal,
    _sym_build_float_ordered => fp_ordered,
    _sym_build_float_unordered => fp_unordered,
    _sym_build_float_unordered_greater_than => float_unordered_greater_than,
    _sym_build_float_unordered_greater_equal => float_unordered_greater_equal,
    _sym_build_float_unordered_less_than => float_unordered_less_than,
    _sym_build_float_unordered_less_equal => float_unordered_less_equal,
    _sym_build_float_unordered_equal => float_unordered_equal,
    _sym_build_float_unordered_not_equal => float_unordered_not_equal,
    _sym_build_sadd_sat => sadd_sat,
    _sym_build_uadd_sat => uadd_sat,
    _sym_build_ssub_sat => ssub_sat,
    _sym_build_usub_sat => usub_sat,
    _sym_build_sshl_sat => sshl_sat,
    _sym_build_ushl_sat => ushl_sat,
}

macro_rules! unary_builders {
    ($($c_name:ident => $method:ident,)*) => {$(
        #[no_mangle]
        pub extern "C" fn $c_name(expr: RSymExpr) -> RSymExpr {
            with(|rt| {
                let expr = expect_raw(rt, expr);
                to_raw(Some(rt.build(|builder| builder.$method(expr))))
            })
        }
    )*};
}

unary_builders! {
    _sym_build_neg => neg,
    _sym_build_not => not,
    _sym_build_fp_abs => fp_abs,
    _sym_build_fp_neg => fp_neg,
    _sym_build_abs => abs,
    _sym_build_bswap => bswap,
}

#[no_mangle]
pub extern "C" fn _sym_build_float_to_bits(expr: RSymExpr) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.float_to_bits(expr)))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_ite(cond: RSymExpr, a: RSymExpr, b: RSymExpr) -> RSymExpr {
    with(|rt| {
        let cond = expect_raw(rt, cond);
        let a = expect_raw(rt, a);
        let b = expect_raw(rt, b);
        to_raw(Some(rt.build(|builder| builder.ite(cond, a, b))))
    })
}

/*
 * Arithmetic with overflow
 */

macro_rules! overflow_builders {
    ($($c_name:ident => $method:ident,)*) => {$(
        #[no_mangle]
        pub extern "C" fn $c_name(
            a: RSymExpr,
            b: RSymExpr,
            is_signed: bool,
            little_endian: bool,
        ) -> RSymExpr {
            with(|rt| {
                let a = expect_raw(rt, a);
                let b = expect_raw(rt, b);
                to_raw(Some(
                    rt.build(|builder| builder.$method(a, b, is_signed, little_endian)),
                ))
            })
        }
    )*};
}

overflow_builders! {
    _sym_build_add_overflow => add_overflow,
    _sym_build_sub_overflow => sub_overflow,
    _sym_build_mul_overflow => mul_overflow,
}

#[no_mangle]
pub extern "C" fn _sym_build_funnel_shift_left(a: RSymExpr, b: RSymExpr, c: RSymExpr) -> RSymExpr {
    with(|rt| {
        let a = expect_raw(rt, a);
        let b = expect_raw(rt, b);
        let c = expect_raw(rt, c);
        to_raw(Some(rt.build(|builder| builder.funnel_shift_left(a, b, c))))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_funnel_shift_right(a: RSymExpr, b: RSymExpr, c: RSymExpr) -> RSymExpr {
    with(|rt| {
        let a = expect_raw(rt, a);
        let b = expect_raw(rt, b);
        let c = expect_raw(rt, c);
        to_raw(Some(rt.build(|builder| builder.funnel_shift_right(a, b, c))))
    })
}

/*
 * Casts
 */

#[no_mangle]
pub extern "C" fn _sym_build_sext(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.sext(expr, u32::from(bits))))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_zext(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.zext(expr, u32::from(bits))))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_trunc(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.trunc(expr, u32::from(bits))))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_int_to_float(
    value: RSymExpr,
    is_double: c_int,
    is_signed: c_int,
) -> RSymExpr {
    with(|rt| {
        let value = expect_raw(rt, value);
        to_raw(Some(rt.build(|b| {
            b.int_to_float(value, is_double != 0, is_signed != 0)
        })))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_float_to_float(expr: RSymExpr, to_double: c_int) -> RSymExpr {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        to_raw(Some(rt.build(|b| b.float_to_float(expr, to_double != 0))))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_bits_to_float(expr: RSymExpr, to_double: c_int) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.bits_to_float(expr, to_double != 0)))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_float_to_signed_integer(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        to_raw(Some(rt.build(|b| b.float_to_int(expr, u32::from(bits), true))))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_float_to_unsigned_integer(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        to_raw(Some(rt.build(|b| b.float_to_int(expr, u32::from(bits), false))))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_bool_to_bit(expr: RSymExpr, bits: u8) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.bool_to_bit(expr, u32::from(bits))))),
        None => std::ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_bit_to_bool(expr: RSymExpr) -> RSymExpr {
    with(|rt| match from_raw(rt, expr) {
        Some(expr) => to_raw(Some(rt.build(|b| b.bit_to_bool(expr)))),
        None => std::ptr::null(),
    })
}

/*
 * Bit-array helpers
 */

#[no_mangle]
pub extern "C" fn _sym_concat_helper(a: RSymExpr, b: RSymExpr) -> RSymExpr {
    with(|rt| {
        let a = expect_raw(rt, a);
        let b = expect_raw(rt, b);
        to_raw(Some(rt.build(|builder| builder.concat(a, b))))
    })
}

#[no_mangle]
pub extern "C" fn _sym_extract_helper(expr: RSymExpr, first_bit: usize, last_bit: usize) -> RSymExpr {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        to_raw(Some(rt.build(|b| {
            b.extract(expr, first_bit as u32, last_bit as u32)
        })))
    })
}

#[no_mangle]
pub extern "C" fn _sym_bits_helper(expr: RSymExpr) -> usize {
    with(|rt| expect_raw(rt, expr).bits() as usize)
}

#[no_mangle]
pub extern "C" fn _sym_build_extract(
    expr: RSymExpr,
    offset: u64,
    length: u64,
    little_endian: bool,
) -> RSymExpr {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        to_raw(Some(rt.build(|b| {
            b.extract_bytes(expr, offset, length, little_endian)
        })))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_insert(
    target: RSymExpr,
    to_insert: RSymExpr,
    offset: u64,
    little_endian: bool,
) -> RSymExpr {
    with(|rt| {
        let target = expect_raw(rt, target);
        let to_insert = expect_raw(rt, to_insert);
        to_raw(Some(rt.build(|b| {
            b.insert_bytes(target, to_insert, offset, little_endian)
        })))
    })
}

#[no_mangle]
pub extern "C" fn _sym_build_zero_bytes(length: usize) -> RSymExpr {
    with(|rt| to_raw(Some(rt.build(|b| b.zero_bytes(length as u64)))))
}

/*
 * Function-call helpers
 */

#[no_mangle]
pub extern "C" fn _sym_set_parameter_expression(index: u8, expr: RSymExpr) {
    with(|rt| {
        let expr = from_raw(rt, expr);
        rt.set_parameter_expression(usize::from(index), expr);
    });
}

#[no_mangle]
pub extern "C" fn _sym_get_parameter_expression(index: u8) -> RSymExpr {
    with(|rt| to_raw(rt.get_parameter_expression(usize::from(index))))
}

#[no_mangle]
pub extern "C" fn _sym_set_return_expression(expr: RSymExpr) {
    with(|rt| {
        let expr = from_raw(rt, expr);
        rt.set_return_expression(expr);
    });
}

#[no_mangle]
pub extern "C" fn _sym_get_return_expression() -> RSymExpr {
    with(|rt| to_raw(rt.get_return_expression()))
}

/*
 * Constraint handling
 */

#[no_mangle]
pub extern "C" fn _sym_push_path_constraint(constraint: RSymExpr, taken: c_int, site_id: usize) {
    with(|rt| {
        let constraint = from_raw(rt, constraint);
        rt.push_path_constraint(constraint, taken != 0, site_id);
    });
}

#[no_mangle]
pub extern "C" fn _sym_get_input_byte(offset: usize, concrete_value: u8) -> RSymExpr {
    with(|rt| to_raw(Some(rt.get_input_byte(offset, concrete_value))))
}

#[no_mangle]
pub unsafe extern "C" fn _sym_make_symbolic(
    data: *const c_void,
    byte_length: usize,
    input_offset: usize,
) {
    with(|rt| unsafe { rt.make_symbolic(data as usize, byte_length, input_offset) });
}

/*
 * Memory management
 */

#[no_mangle]
pub unsafe extern "C" fn _sym_read_memory(
    addr: *mut u8,
    length: usize,
    little_endian: bool,
) -> RSymExpr {
    with(|rt| to_raw(unsafe { rt.read_memory(addr as usize, length, little_endian) }))
}

#[no_mangle]
pub unsafe extern "C" fn _sym_write_memory(
    addr: *mut u8,
    length: usize,
    expr: RSymExpr,
    little_endian: bool,
) {
    with(|rt| {
        let expr = from_raw(rt, expr);
        rt.write_memory(addr as usize, length, expr, little_endian);
    });
}

#[no_mangle]
pub unsafe extern "C" fn _sym_memcpy(dest: *mut u8, src: *const u8, length: usize) {
    with(|rt| rt.memcpy(dest as usize, src as usize, length));
}

#[no_mangle]
pub unsafe extern "C" fn _sym_memset(memory: *mut u8, value: RSymExpr, length: usize) {
    with(|rt| {
        let value = from_raw(rt, value);
        rt.memset(memory as usize, value, length);
    });
}

#[no_mangle]
pub unsafe extern "C" fn _sym_memmove(dest: *mut u8, src: *const u8, length: usize) {
    with(|rt| rt.memmove(dest as usize, src as usize, length));
}

/*
 * Call-stack tracing
 */

#[no_mangle]
pub extern "C" fn _sym_notify_call(site_id: usize) {
    with(|rt| rt.notify_call(site_id));
}

#[no_mangle]
pub extern "C" fn _sym_notify_ret(site_id: usize) {
    with(|rt| rt.notify_ret(site_id));
}

#[no_mangle]
pub extern "C" fn _sym_notify_basic_block(site_id: usize) {
    with(|rt| {
        rt.notify_basic_block(site_id);
    });
}

/*
 * Debugging
 */

#[no_mangle]
pub extern "C" fn _sym_expr_to_string(expr: RSymExpr) -> *const c_char {
    with(|rt| {
        let rendered = expect_raw(rt, expr).to_string();
        EXPR_STRING.with(|cell| {
            let mut slot = cell.borrow_mut();
            *slot = CString::new(rendered).unwrap_or_default();
            slot.as_ptr()
        })
    })
}

#[no_mangle]
pub extern "C" fn _sym_feasible(expr: RSymExpr) -> bool {
    with(|rt| {
        let expr = expect_raw(rt, expr);
        rt.gateway_mut().feasible(expr)
    })
}

/*
 * Garbage collection
 */

#[no_mangle]
pub unsafe extern "C" fn _sym_register_expression_region(start: *mut RSymExpr, length: usize) {
    with(|rt| unsafe { rt.register_expression_region(start as *const RSymExpr, length) });
}

#[no_mangle]
pub extern "C" fn _sym_collect_garbage() {
    with(|rt| rt.collect_garbage());
}

/*
 * User-facing functionality
 */

#[no_mangle]
pub unsafe extern "C" fn symcc_make_symbolic(start: *const c_void, byte_length: usize) {
    with(|rt| {
        if let Err(e) = unsafe { rt.user_make_symbolic(start as usize, byte_length) } {
            eprintln!("symvm: {e}");
            process::abort();
        }
    });
}

/// Callback type delivering test cases in-process.
pub type CTestCaseHandler = extern "C" fn(*const c_void, usize);

#[no_mangle]
pub extern "C" fn symcc_set_test_case_handler(handler: Option<CTestCaseHandler>) {
    with(|rt| {
        let wrapped = handler.map(|handler| {
            Box::new(move |bytes: &[u8]| {
                handler(bytes.as_ptr() as *const c_void, bytes.len());
            }) as Box<dyn FnMut(&[u8])>
        });
        rt.gateway_mut().set_test_case_handler(wrapped);
    });
}

/*
 * Libc wrappers. The pass renames intercepted calls to these entry points;
 * each invokes the real function and then updates the symbolic state.
 */

#[no_mangle]
pub unsafe extern "C" fn malloc_symbolized(size: usize) -> *mut c_void {
    let result = libc::malloc(size);
    with(|rt| rt.wrap_malloc(size as u64));
    result
}

#[no_mangle]
pub unsafe extern "C" fn calloc_symbolized(nmemb: usize, size: usize) -> *mut c_void {
    let result = libc::calloc(nmemb, size);
    with(|rt| rt.wrap_calloc(nmemb as u64, size as u64));
    result
}

#[no_mangle]
pub unsafe extern "C" fn mmap64_symbolized(
    addr: *mut c_void,
    len: usize,
    prot: c_int,
    flags: c_int,
    fildes: c_int,
    off: u64,
) -> *mut c_void {
    let result = libc::mmap(addr, len, prot, flags, fildes, off as libc::off_t);
    if result == libc::MAP_FAILED {
        with(|rt| rt.set_return_expression(None));
        return result;
    }

    with(|rt| unsafe { rt.wrap_mmap(fildes, result as usize, len, off) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn mmap_symbolized(
    addr: *mut c_void,
    len: usize,
    prot: c_int,
    flags: c_int,
    fildes: c_int,
    off: u32,
) -> *mut c_void {
    mmap64_symbolized(addr, len, prot, flags, fildes, u64::from(off))
}

#[no_mangle]
pub unsafe extern "C" fn open_symbolized(
    path: *const c_char,
    oflag: c_int,
    mode: libc::mode_t,
) -> c_int {
    let result = libc::open(path, oflag, mode as c_int);
    let path = CStr::from_ptr(path).to_string_lossy().into_owned();
    with(|rt| rt.wrap_open(&path, result));
    result
}

#[no_mangle]
pub unsafe extern "C" fn read_symbolized(fildes: c_int, buf: *mut c_void, nbyte: usize) -> isize {
    let result = libc::read(fildes, buf, nbyte);
    with(|rt| unsafe { rt.wrap_read(fildes, buf as usize, result) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn lseek64_symbolized(fd: c_int, offset: u64, whence: c_int) -> u64 {
    let result = libc::lseek(fd, offset as libc::off_t, whence);
    if result == -1 {
        with(|rt| rt.set_return_expression(None));
        return result as u64;
    }

    with(|rt| rt.wrap_lseek(fd, result as u64, whence == libc::SEEK_SET));
    result as u64
}

#[no_mangle]
pub unsafe extern "C" fn lseek_symbolized(fd: c_int, offset: u32, whence: c_int) -> u32 {
    let result = lseek64_symbolized(fd, u64::from(offset), whence);

    // Mirror glibc's overflow check in the 32-bit variant.
    let result32 = result as u32;
    if u64::from(result32) == result {
        result32
    } else {
        *libc::__errno_location() = libc::EOVERFLOW;
        u32::MAX
    }
}

#[no_mangle]
pub unsafe extern "C" fn fopen_symbolized(
    pathname: *const c_char,
    mode: *const c_char,
) -> *mut libc::FILE {
    let result = libc::fopen(pathname, mode);
    let path = CStr::from_ptr(pathname).to_string_lossy().into_owned();
    let fd = (!result.is_null()).then(|| libc::fileno(result));
    with(|rt| rt.wrap_fopen(&path, fd));
    result
}

#[no_mangle]
pub unsafe extern "C" fn fopen64_symbolized(
    pathname: *const c_char,
    mode: *const c_char,
) -> *mut libc::FILE {
    fopen_symbolized(pathname, mode)
}

#[no_mangle]
pub unsafe extern "C" fn fread_symbolized(
    ptr: *mut c_void,
    size: usize,
    nmemb: usize,
    stream: *mut libc::FILE,
) -> usize {
    let result = libc::fread(ptr, size, nmemb, stream);
    let fd = libc::fileno(stream);
    with(|rt| unsafe { rt.wrap_fread(fd, ptr as usize, size as u64, nmemb as u64, result * size) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn fgets_symbolized(
    str: *mut c_char,
    n: c_int,
    stream: *mut libc::FILE,
) -> *mut c_char {
    let result = libc::fgets(str, n, stream);
    if result.is_null() {
        with(|rt| rt.set_return_expression(None));
        return result;
    }

    let fd = libc::fileno(stream);
    with(|rt| unsafe { rt.wrap_fgets(fd, str as usize, n) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn rewind_symbolized(stream: *mut libc::FILE) {
    libc::rewind(stream);
    let fd = libc::fileno(stream);
    with(|rt| rt.wrap_rewind(fd));
}

#[no_mangle]
pub unsafe extern "C" fn fseek_symbolized(
    stream: *mut libc::FILE,
    offset: libc::c_long,
    whence: c_int,
) -> c_int {
    let result = libc::fseek(stream, offset, whence);
    let fd = libc::fileno(stream);
    let new_pos = (result != -1).then(|| libc::ftell(stream)).filter(|&p| p != -1);
    with(|rt| rt.wrap_fseek(fd, offset as u64, new_pos.map(|p| p as u64)));
    result
}

#[no_mangle]
pub unsafe extern "C" fn fseeko_symbolized(
    stream: *mut libc::FILE,
    offset: libc::off_t,
    whence: c_int,
) -> c_int {
    let result = libc::fseeko(stream, offset, whence);
    let fd = libc::fileno(stream);
    let new_pos = (result != -1).then(|| libc::ftello(stream)).filter(|&p| p != -1);
    with(|rt| rt.wrap_fseek(fd, offset as u64, new_pos.map(|p| p as u64)));
    result
}

#[no_mangle]
pub unsafe extern "C" fn fseeko64_symbolized(
    stream: *mut libc::FILE,
    offset: u64,
    whence: c_int,
) -> c_int {
    fseeko_symbolized(stream, offset as libc::off_t, whence)
}

#[no_mangle]
pub unsafe extern "C" fn getc_symbolized(stream: *mut libc::FILE) -> c_int {
    let result = libc::fgetc(stream);
    let fd = libc::fileno(stream);
    with(|rt| rt.wrap_getc(fd, result));
    result
}

#[no_mangle]
pub unsafe extern "C" fn fgetc_symbolized(stream: *mut libc::FILE) -> c_int {
    getc_symbolized(stream)
}

#[no_mangle]
pub unsafe extern "C" fn getchar_symbolized() -> c_int {
    let result = libc::getchar();
    with(|rt| rt.wrap_getc(0, result));
    result
}

#[no_mangle]
pub unsafe extern "C" fn ungetc_symbolized(c: c_int, stream: *mut libc::FILE) -> c_int {
    let result = libc::ungetc(c, stream);
    let fd = libc::fileno(stream);
    with(|rt| rt.wrap_ungetc(fd, result));
    result
}

#[no_mangle]
pub unsafe extern "C" fn memcpy_symbolized(
    dest: *mut c_void,
    src: *const c_void,
    n: usize,
) -> *mut c_void {
    let result = libc::memcpy(dest, src, n);
    with(|rt| rt.wrap_memcpy(dest as usize, src as usize, n));
    result
}

#[no_mangle]
pub unsafe extern "C" fn memset_symbolized(s: *mut c_void, c: c_int, n: usize) -> *mut c_void {
    let result = libc::memset(s, c, n);
    with(|rt| rt.wrap_memset(s as usize, n));
    result
}

#[no_mangle]
pub unsafe extern "C" fn memmove_symbolized(
    dest: *mut c_void,
    src: *const c_void,
    n: usize,
) -> *mut c_void {
    let result = libc::memmove(dest, src, n);
    with(|rt| rt.wrap_memmove(dest as usize, src as usize, n));
    result
}

#[no_mangle]
pub unsafe extern "C" fn bzero_symbolized(s: *mut c_void, n: usize) {
    libc::memset(s, 0, n);
    with(|rt| rt.wrap_bzero(s as usize, n));
}

#[no_mangle]
pub unsafe extern "C" fn bcopy_symbolized(src: *const c_void, dest: *mut c_void, n: usize) {
    libc::memmove(dest, src, n);
    with(|rt| rt.wrap_bcopy(src as usize, dest as usize, n));
}

#[no_mangle]
pub unsafe extern "C" fn strncpy_symbolized(
    dest: *mut c_char,
    src: *const c_char,
    n: usize,
) -> *mut c_char {
    let result = libc::strncpy(dest, src, n);
    with(|rt| unsafe { rt.wrap_strncpy(dest as usize, src as usize, n) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn strchr_symbolized(s: *const c_char, c: c_int) -> *const c_char {
    let result = libc::strchr(s, c);
    with(|rt| unsafe { rt.wrap_strchr(s as usize, c, result as usize) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn memcmp_symbolized(a: *const c_void, b: *const c_void, n: usize) -> c_int {
    let result = libc::memcmp(a, b, n);
    with(|rt| unsafe { rt.wrap_memcmp(a as usize, b as usize, n, result) });
    result
}

#[no_mangle]
pub unsafe extern "C" fn bcmp_symbolized(a: *const c_void, b: *const c_void, n: usize) -> c_int {
    let result = libc::memcmp(a, b, n);
    with(|rt| unsafe { rt.wrap_bcmp(a as usize, b as usize, n, result) });
    result
}

#[no_mangle]
pub extern "C" fn ntohl_symbolized(netlong: u32) -> u32 {
    let result = u32::from_be(netlong);
    with(|rt| rt.wrap_ntohl());
    result
}
