//! Shared builders for the compilation-tier integration tests.

use std::sync::Arc;

use molten_bytecode::{CodeObject, FunctionBuilder, Register};
use molten_core::Value;
use molten_vm::{JitConfig, VirtualMachine};

/// A VM whose tier treats every call as hot on arrival.
pub fn create_test_vm() -> VirtualMachine {
    VirtualMachine::with_jit_config(JitConfig::for_testing())
}

/// Shorthand for small-integer values in test bodies.
pub fn int(n: i64) -> Value {
    Value::int(n).expect("test integer fits the small-int range")
}

/// The arguments `1, 2, .., n`.
pub fn one_to(n: u16) -> Vec<Value> {
    (1..=i64::from(n)).map(int).collect()
}

/// Build a function of the given arity:
///
/// ```text
/// def sum<N>(p0, .., pN-1):
///     return 1 + 2 + 3 + 4 + p0 + .. + pN-1
/// ```
///
/// The fixed locals keep every body a real computation, so each arity
/// produces a distinct code object rather than a trivial return.
pub fn sum_function(arity: u16) -> Arc<CodeObject> {
    let mut b = FunctionBuilder::new(&format!("sum{arity}"));
    b.set_arg_count(arity);
    b.reserve_parameters(arity);

    let acc = b.alloc_register();
    let tmp = b.alloc_register();

    let one = b.add_int(1).unwrap();
    b.emit_load_const(acc, one);
    for local in 2..=4 {
        let idx = b.add_int(local).unwrap();
        b.emit_load_const(tmp, idx);
        b.emit_add(acc, acc, tmp);
    }
    for param in 0..arity {
        b.emit_add(acc, acc, Register::new(param as u8));
    }
    b.emit_return(acc);
    Arc::new(b.finish())
}

/// What [`sum_function`]`(arity)` returns for the arguments [`one_to`]`(arity)`.
pub fn expected_sum(arity: u16) -> i64 {
    10 + (1..=i64::from(arity)).sum::<i64>()
}

/// Build the self-recursive list grower:
///
/// ```text
/// def grow(xs):
///     xs.append(len(xs))
///     if len(xs) < limit:
///         grow(xs)
///     return xs
/// ```
///
/// The function finds itself through the global binding `grow`, so
/// callers must install it with [`VirtualMachine::set_global`] first.
pub fn grow_function(limit: i64) -> Arc<CodeObject> {
    let mut b = FunctionBuilder::new("grow");
    b.set_arg_count(1);
    b.reserve_parameters(1);
    let xs = Register::new(0);

    let len = b.alloc_register();
    let bound = b.alloc_register();
    let cond = b.alloc_register();
    let callee = b.alloc_register();
    let window = b.alloc_register_block(2);
    let arg0 = Register::new(window.0 + 1);

    let limit_idx = b.add_int(limit).unwrap();
    let grow_name = b.add_name("grow");
    let done = b.create_label();

    b.emit_len(len, xs);
    b.emit_list_append(xs, len);
    b.emit_len(len, xs);
    b.emit_load_const(bound, limit_idx);
    b.emit_lt(cond, len, bound);
    b.emit_jump_if_false(cond, done);
    b.emit_load_global(callee, grow_name);
    b.emit_move(arg0, xs);
    b.emit_call(window, callee, 1);
    b.bind_label(done);
    b.emit_return(xs);
    Arc::new(b.finish())
}

/// A zero-argument function that calls itself through its global name
/// with no base case. Drives the recursion guard.
pub fn runaway_function() -> Arc<CodeObject> {
    let mut b = FunctionBuilder::new("runaway");
    let callee = b.alloc_register();
    let out = b.alloc_register_block(1);
    let name = b.add_name("runaway");

    b.emit_load_global(callee, name);
    b.emit_call(out, callee, 0);
    b.emit_return(out);
    Arc::new(b.finish())
}

/// Call `func` repeatedly, returning the last result.
pub fn call_times(
    vm: &mut VirtualMachine,
    func: Value,
    args: &[Value],
    times: usize,
) -> Value {
    let mut result = Value::none();
    for _ in 0..times {
        result = vm.call_function(func, args).expect("call failed");
    }
    result
}
