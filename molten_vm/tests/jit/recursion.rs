//! Self-recursive guests: recursion through compiled units and the
//! shared depth guard.

use molten_vm::{VirtualMachine, MAX_RECURSION_DEPTH};

use super::test_utils::*;

#[test]
fn test_recursive_growth_runs_through_templates() {
    let mut vm = create_test_vm();
    let code = grow_function(5);
    let func = vm.make_function(code);
    vm.set_global("grow", func);

    let xs = vm.alloc_list(&[]);
    let result = vm.call_function(func, &[xs]).expect("call failed");

    // The grower returns the very list it was given.
    assert_eq!(result.as_object_ptr(), xs.as_object_ptr());

    let items = vm.list_items(xs).unwrap();
    assert_eq!(items.len(), 5);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.as_int(), Some(i as i64));
    }

    // Five activations, all through the one compiled unit.
    assert!(vm.jit().unwrap().info_callable(func).unwrap().compiled);
    let stats = vm.jit().unwrap().stats();
    assert_eq!(stats.compiled_calls, 5);
    assert_eq!(stats.compilation_attempts, 1);
}

#[test]
fn test_interpreted_growth_agrees() {
    let mut vm = VirtualMachine::new();
    let func = vm.make_function(grow_function(5));
    vm.set_global("grow", func);

    let xs = vm.alloc_list(&[]);
    let result = vm.call_function(func, &[xs]).expect("call failed");

    assert_eq!(result.as_object_ptr(), xs.as_object_ptr());
    let items = vm.list_items(xs).unwrap();
    assert_eq!(items.len(), 5);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.as_int(), Some(i as i64));
    }
}

#[test]
fn test_runaway_recursion_hits_the_guard() {
    let mut vm = create_test_vm();
    let func = vm.make_function(runaway_function());
    vm.set_global("runaway", func);

    let err = vm.call_function(func, &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "RecursionError: maximum recursion depth exceeded ({})",
            MAX_RECURSION_DEPTH
        )
    );
}

#[test]
fn test_runaway_recursion_guard_without_tier() {
    // The guard is charged in the call adapter, so the interpreter
    // trips it at the same depth as the compiled tier.
    let mut vm = VirtualMachine::new();
    let func = vm.make_function(runaway_function());
    vm.set_global("runaway", func);

    let err = vm.call_function(func, &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "RecursionError: maximum recursion depth exceeded ({})",
            MAX_RECURSION_DEPTH
        )
    );
}
