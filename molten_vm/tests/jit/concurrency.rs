//! One shared compilation context feeding several VMs, on one thread
//! and across many.

use std::sync::{Arc, Barrier};
use std::thread;

use molten_vm::{JitConfig, JitContext, VirtualMachine};

use super::test_utils::*;

#[test]
fn test_unit_compiled_by_one_vm_serves_another() {
    let context = JitContext::new(JitConfig::for_testing());
    let code = sum_function(1);

    let mut first = VirtualMachine::with_jit(context.clone());
    let func = first.make_function(Arc::clone(&code));
    first.call_function(func, &[int(5)]).expect("call failed");
    assert_eq!(context.compiled_count(), 1);

    let mut second = VirtualMachine::with_jit(context.clone());
    let func = second.make_function(Arc::clone(&code));
    let result = second.call_function(func, &[int(5)]).expect("call failed");
    assert_eq!(result.as_int(), Some(15));

    // The second VM's first call hit the shared cache instead of
    // compiling again.
    assert_eq!(context.stats().compilation_attempts, 1);
    assert_eq!(context.stats().compiled_calls, 2);
}

#[test]
fn test_shared_cache_across_threads() {
    let context = JitContext::new(JitConfig::for_testing());
    let code = sum_function(2);
    let threads = 4;
    let calls_per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::new();
    for _ in 0..threads {
        let jit = context.clone();
        let code = Arc::clone(&code);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let mut vm = VirtualMachine::with_jit(jit);
            let func = vm.make_function(code);
            // Line up so the claim is actually contended.
            barrier.wait();
            for _ in 0..calls_per_thread {
                let result = vm
                    .call_function(func, &[int(1), int(2)])
                    .expect("call failed");
                assert_eq!(result.as_int(), Some(13));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    // One identity, one claim winner, one committed unit. Threads that
    // lost the race interpreted until the unit landed.
    assert_eq!(context.compiled_count(), 1);
    assert_eq!(context.cache_stats().insertions, 1);

    let stats = context.stats();
    assert_eq!(stats.compilation_attempts, 1);
    assert_eq!(
        stats.compiled_calls + stats.interpreted_calls,
        (threads * calls_per_thread) as u64
    );
}

#[test]
fn test_threads_compile_distinct_identities() {
    let context = JitContext::new(JitConfig::for_testing());

    let mut handles = Vec::new();
    for arity in 0..4u16 {
        let jit = context.clone();
        handles.push(thread::spawn(move || {
            let mut vm = VirtualMachine::with_jit(jit);
            let func = vm.make_function(sum_function(arity));
            let args = one_to(arity);
            for _ in 0..20 {
                let result = vm.call_function(func, &args).expect("call failed");
                assert_eq!(result.as_int(), Some(expected_sum(arity)));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(context.compiled_count(), 4);
    assert_eq!(context.stats().compilation_attempts, 4);
}
