//! Function calls through the compiled tier: arity coverage, bound
//! methods, thresholds, and the reporting surface.

use std::sync::Arc;

use molten_core::Value;
use molten_jit::UnitState;
use molten_vm::{JitConfig, VirtualMachine};

use super::test_utils::*;

// =============================================================================
// Arity Coverage
// =============================================================================

#[test]
fn test_compiles_every_arity_up_to_eleven() {
    // Past eight arguments the adapter's inline argument buffer spills.
    for arity in 0..=11u16 {
        let mut vm = create_test_vm();
        let code = sum_function(arity);
        let func = vm.make_function(Arc::clone(&code));
        let args = one_to(arity);

        let first = vm.call_function(func, &args).expect("call failed");
        assert_eq!(first.as_int(), Some(expected_sum(arity)), "arity {arity}");

        let later = call_times(&mut vm, func, &args, 10);
        assert_eq!(later.as_int(), Some(expected_sum(arity)), "arity {arity}");

        let report = vm.jit().unwrap().info(&code);
        assert!(report.compiled, "arity {arity} never compiled");
        assert_eq!(report.state, UnitState::Compiled);
    }
}

#[test]
fn test_three_argument_sum_survives_toggle_orderings() {
    // Every enable/disable ordering that ends enabled must leave the
    // callable compiled and the result unchanged.
    let orderings: [&[bool]; 3] = [&[], &[false, true], &[true, false, true]];

    for ordering in orderings {
        let mut vm = create_test_vm();
        let code = sum_function(3);
        let func = vm.make_function(Arc::clone(&code));
        let args = [int(5), int(6), int(7)];

        for &enabled in ordering {
            let jit = vm.jit().unwrap();
            if enabled {
                jit.enable();
            } else {
                jit.disable();
            }
            vm.call_function(func, &args).expect("call failed");
        }

        let result = vm.call_function(func, &args).expect("call failed");
        assert_eq!(result.as_int(), Some(28), "ordering {ordering:?}");
        assert!(
            vm.jit().unwrap().info(&code).compiled,
            "ordering {ordering:?}"
        );
    }
}

#[test]
fn test_compiled_results_match_interpreter() {
    let code = sum_function(4);
    let args = [int(2), int(4), int(6), int(8)];

    let mut plain = VirtualMachine::new();
    let func = plain.make_function(Arc::clone(&code));
    let expected = plain.call_function(func, &args).expect("call failed");

    let mut tiered = create_test_vm();
    let func = tiered.make_function(code);
    let got = call_times(&mut tiered, func, &args, 20);

    assert_eq!(got.as_int(), expected.as_int());
    assert_eq!(got.as_int(), Some(30));
}

// =============================================================================
// Thresholds and Stats
// =============================================================================

#[test]
fn test_first_call_compiles_at_threshold_one() {
    let mut vm = create_test_vm();
    let func = vm.make_function(sum_function(0));

    let result = vm.call_function(func, &[]).expect("call failed");
    assert_eq!(result.as_int(), Some(10));

    let stats = vm.jit().unwrap().stats();
    assert_eq!(stats.compiled_calls, 1);
    assert_eq!(stats.interpreted_calls, 0);
    assert_eq!(stats.compilation_attempts, 1);
}

#[test]
fn test_threshold_defers_compilation() {
    let config = JitConfig {
        call_threshold: 3,
        ..JitConfig::for_testing()
    };
    let mut vm = VirtualMachine::with_jit_config(config);
    let func = vm.make_function(sum_function(1));

    let result = call_times(&mut vm, func, &[int(5)], 5);
    assert_eq!(result.as_int(), Some(15));

    // Calls one and two run cold; the third crosses the threshold and
    // compiles, and everything after is served from the cache.
    let stats = vm.jit().unwrap().stats();
    assert_eq!(stats.interpreted_calls, 2);
    assert_eq!(stats.compiled_calls, 3);
    assert_eq!(stats.compilation_attempts, 1);
}

// =============================================================================
// Bound Methods
// =============================================================================

#[test]
fn test_bound_method_through_the_tier() {
    let mut vm = create_test_vm();
    let code = sum_function(2);
    let method = vm.make_bound_method(Arc::clone(&code), int(100));

    // The receiver fills the first parameter, so one argument remains.
    let result = call_times(&mut vm, method, &[int(7)], 5);
    assert_eq!(result.as_int(), Some(117));

    let report = vm.jit().unwrap().info(&code);
    assert!(report.compiled);
}

// =============================================================================
// Reports
// =============================================================================

#[test]
fn test_info_callable_resolves_functions_only() {
    let mut vm = create_test_vm();
    let func = vm.make_function(sum_function(0));
    vm.call_function(func, &[]).expect("call failed");

    let report = vm.jit().unwrap().info_callable(func).unwrap();
    assert!(report.compiled);
    assert!(report.generation.is_some());

    assert!(vm.jit().unwrap().info_callable(int(3)).is_none());
    assert!(vm.jit().unwrap().info_callable(Value::none()).is_none());
}
