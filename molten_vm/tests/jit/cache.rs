//! Cache lifecycle: invalidation, generation stamps, permanent
//! fallbacks, and capacity pressure.

use std::sync::Arc;

use molten_bytecode::{CodeObject, FunctionBuilder};
use molten_jit::UnitState;
use molten_vm::{JitConfig, VirtualMachine};

use super::test_utils::*;

/// A function whose body defines another function. The emitter rejects
/// nested definitions, so this body can never compile.
fn defines_inner() -> Arc<CodeObject> {
    let inner = {
        let mut b = FunctionBuilder::new("inner");
        b.emit_return_none();
        Arc::new(b.finish())
    };

    let mut b = FunctionBuilder::new("outer");
    let dst = b.alloc_register();
    let idx = b.add_code(inner);
    b.emit_make_function(dst, idx);
    b.emit_return(dst);
    Arc::new(b.finish())
}

// =============================================================================
// Invalidation and Generations
// =============================================================================

#[test]
fn test_invalidate_forces_recompilation() {
    let mut vm = create_test_vm();
    let code = sum_function(1);
    let func = vm.make_function(Arc::clone(&code));

    vm.call_function(func, &[int(9)]).expect("call failed");
    let first = vm.jit().unwrap().info(&code);
    assert!(first.compiled);
    let first_gen = first.generation.unwrap();

    assert!(vm.jit().unwrap().invalidate(&code));
    assert_eq!(vm.jit().unwrap().info(&code).state, UnitState::Uncompiled);

    let result = vm.call_function(func, &[int(9)]).expect("call failed");
    assert_eq!(result.as_int(), Some(19));

    let second = vm.jit().unwrap().info(&code);
    assert!(second.compiled);
    assert!(second.generation.unwrap() > first_gen);
    assert_eq!(vm.jit().unwrap().stats().compilation_attempts, 2);
}

#[test]
fn test_invalidate_without_a_unit_is_a_no_op() {
    let vm = create_test_vm();
    let code = sum_function(1);
    assert!(!vm.jit().unwrap().invalidate(&code));
}

// =============================================================================
// Permanent Fallback
// =============================================================================

#[test]
fn test_unsupported_body_is_a_permanent_fallback() {
    let mut vm = create_test_vm();
    let code = defines_inner();
    let func = vm.make_function(Arc::clone(&code));

    // The call still succeeds through the interpreter and produces a
    // callable result.
    let result = vm.call_function(func, &[]).expect("call failed");
    assert!(vm.jit().unwrap().info_callable(result).is_some());

    let jit = vm.jit().unwrap();
    assert_eq!(jit.info(&code).state, UnitState::PermanentFallback);
    assert_eq!(jit.stats().compilation_attempts, 1);
    assert_eq!(jit.cache_stats().permanent_fallbacks, 1);

    // Later calls skip the emitter entirely.
    call_times(&mut vm, func, &[], 10);
    let jit = vm.jit().unwrap();
    assert_eq!(jit.stats().compilation_attempts, 1);
    assert_eq!(jit.stats().interpreted_calls, 11);
    assert_eq!(jit.stats().compiled_calls, 0);
}

#[test]
fn test_invalidate_does_not_lift_a_fallback() {
    let mut vm = create_test_vm();
    let code = defines_inner();
    let func = vm.make_function(Arc::clone(&code));
    vm.call_function(func, &[]).expect("call failed");

    assert!(!vm.jit().unwrap().invalidate(&code));
    assert_eq!(
        vm.jit().unwrap().info(&code).state,
        UnitState::PermanentFallback
    );

    vm.call_function(func, &[]).expect("call failed");
    assert_eq!(vm.jit().unwrap().stats().compilation_attempts, 1);
}

#[test]
fn test_clear_resets_fallback_verdicts() {
    let mut vm = create_test_vm();
    let code = defines_inner();
    let func = vm.make_function(Arc::clone(&code));
    vm.call_function(func, &[]).expect("call failed");

    vm.jit().unwrap().clear();
    assert_eq!(vm.jit().unwrap().info(&code).state, UnitState::Uncompiled);

    // The body is still uncompilable; clearing only buys a retry.
    vm.call_function(func, &[]).expect("call failed");
    let jit = vm.jit().unwrap();
    assert_eq!(jit.stats().compilation_attempts, 2);
    assert_eq!(jit.info(&code).state, UnitState::PermanentFallback);
    assert_eq!(jit.cache_stats().permanent_fallbacks, 2);
}

// =============================================================================
// Capacity Pressure
// =============================================================================

#[test]
fn test_oversized_units_are_rejected_but_retried() {
    let config = JitConfig {
        max_cache_bytes: 8,
        ..JitConfig::for_testing()
    };
    let mut vm = VirtualMachine::with_jit_config(config);
    let code = sum_function(1);
    let func = vm.make_function(Arc::clone(&code));

    // Every unit is bigger than the budget, so every hot call compiles,
    // fails to commit, and falls back to the interpreter.
    let result = call_times(&mut vm, func, &[int(9)], 3);
    assert_eq!(result.as_int(), Some(19));

    let jit = vm.jit().unwrap();
    assert_eq!(jit.info(&code).state, UnitState::Uncompiled);
    assert_eq!(jit.compiled_count(), 0);
    assert_eq!(jit.stats().compilation_attempts, 3);
    assert_eq!(jit.stats().interpreted_calls, 3);
    assert_eq!(jit.cache_stats().resource_rejections, 3);
}
