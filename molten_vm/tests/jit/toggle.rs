//! Runtime enable/disable of the compiled tier.

use std::sync::Arc;

use molten_jit::UnitState;
use molten_vm::{JitConfig, VirtualMachine};

use super::test_utils::*;

#[test]
fn test_disabled_config_never_compiles() {
    let mut vm = VirtualMachine::with_jit_config(JitConfig::disabled());
    let code = sum_function(1);
    let func = vm.make_function(Arc::clone(&code));

    let result = call_times(&mut vm, func, &[int(9)], 10);
    assert_eq!(result.as_int(), Some(19));

    let jit = vm.jit().unwrap();
    assert!(!jit.is_enabled());

    let report = jit.info(&code);
    assert!(!report.compiled);
    assert_eq!(report.state, UnitState::Uncompiled);
    assert_eq!(report.generation, None);

    // A disabled tier stays out of the cache entirely.
    let cache = jit.cache_stats();
    assert_eq!(cache.hits, 0);
    assert_eq!(cache.misses, 0);

    let stats = jit.stats();
    assert_eq!(stats.interpreted_calls, 10);
    assert_eq!(stats.compiled_calls, 0);
}

#[test]
fn test_disable_after_compile_keeps_the_unit() {
    let mut vm = create_test_vm();
    let code = sum_function(1);
    let func = vm.make_function(Arc::clone(&code));

    let hot = vm.call_function(func, &[int(9)]).expect("call failed");
    assert_eq!(hot.as_int(), Some(19));
    assert!(vm.jit().unwrap().info(&code).compiled);

    vm.jit().unwrap().disable();
    let cold = call_times(&mut vm, func, &[int(9)], 3);
    assert_eq!(cold.as_int(), Some(19));

    // The unit survives the toggle; only dispatch changes.
    let jit = vm.jit().unwrap();
    assert!(jit.info(&code).compiled);
    let stats = jit.stats();
    assert_eq!(stats.compiled_calls, 1);
    assert_eq!(stats.interpreted_calls, 3);
}

#[test]
fn test_reenable_serves_the_cached_unit() {
    let mut vm = create_test_vm();
    let func = vm.make_function(sum_function(1));

    vm.call_function(func, &[int(9)]).expect("call failed");
    vm.jit().unwrap().disable();
    call_times(&mut vm, func, &[int(9)], 2);
    vm.jit().unwrap().enable();

    let result = call_times(&mut vm, func, &[int(9)], 2);
    assert_eq!(result.as_int(), Some(19));

    // No recompilation happened; the cached unit was picked back up.
    let stats = vm.jit().unwrap().stats();
    assert_eq!(stats.compilation_attempts, 1);
    assert_eq!(stats.compiled_calls, 3);
    assert_eq!(stats.interpreted_calls, 2);
}

#[test]
fn test_toggle_is_idempotent() {
    let vm = create_test_vm();
    let jit = vm.jit().unwrap();
    assert!(jit.is_enabled());

    jit.disable();
    jit.disable();
    assert!(!jit.is_enabled());

    jit.enable();
    jit.enable();
    assert!(jit.is_enabled());
}
