//! Call and function materialization handlers.

use std::sync::Arc;

use smallvec::SmallVec;

use molten_bytecode::{CodeObject, Instruction};
use molten_core::Value;
use molten_runtime::FunctionObject;

use super::ControlFlow;
use crate::error::RuntimeError;
use crate::vm::VirtualMachine;

/// Call: dst = func(args...).
///
/// The callee sits in src1 and the argument count in src2; the argument
/// values occupy the register window `r(dst+1)..=r(dst+argc)` that the
/// builder reserved above the destination.
#[inline(always)]
pub fn call(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let dst = inst.dst().0;
    let argc = inst.src2().0;

    let frame = vm.current_frame();
    let callee = frame.get_reg(inst.src1().0);
    let args: SmallVec<[Value; 8]> = (0..argc).map(|i| frame.get_reg(dst + 1 + i)).collect();

    match vm.call_function(callee, &args) {
        Ok(value) => {
            vm.current_frame_mut().set_reg(dst, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// MakeFunction: dst = function object for the code constant at imm16.
pub fn make_function(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let value = vm.current_frame().get_const(inst.imm16());
    let Some(ptr) = value.as_object_ptr() else {
        return ControlFlow::Error(RuntimeError::internal(
            "invalid code object in constant pool",
        ));
    };

    // Safety: the builder stores nested code constants as leaked Arc
    // pointers and holds a matching strong reference in
    // `CodeObject::nested`, so the pointer is a live Arc<CodeObject>.
    // Reconstruct it without consuming the leaked count.
    let code = unsafe {
        let borrowed = Arc::from_raw(ptr as *const CodeObject);
        let code = Arc::clone(&borrowed);
        std::mem::forget(borrowed);
        code
    };

    let function = vm.heap.alloc_function_value(FunctionObject::new(code));
    vm.current_frame_mut().set_reg(inst.dst().0, function);
    ControlFlow::Continue
}
