//! List construction and mutation handlers.

use molten_bytecode::Instruction;
use molten_runtime::ListObject;

use super::ControlFlow;
use crate::vm::VirtualMachine;

/// Len: dst = len(src1).
#[inline(always)]
pub fn len(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let value = frame.get_reg(inst.src1().0);
    match super::value_len(value) {
        Ok(length) => {
            frame.set_reg(inst.dst().0, length);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// BuildList: dst = [r(src1), ..., r(src1 + src2 - 1)].
#[inline(always)]
pub fn build_list(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let start = inst.src1().0;
    let count = inst.src2().0;

    let frame = vm.current_frame();
    let list = ListObject::from_iter((0..count).map(|i| frame.get_reg(start + i)));

    let value = vm.heap.alloc_list_value(list);
    vm.current_frame_mut().set_reg(inst.dst().0, value);
    ControlFlow::Continue
}

/// ListAppend: r(src1).append(r(src2)).
#[inline(always)]
pub fn list_append(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let (list, item) = vm
        .current_frame()
        .get_regs2(inst.src1().0, inst.src2().0);
    match super::list_append_value(list, item) {
        Ok(()) => ControlFlow::Continue,
        Err(err) => ControlFlow::Error(err),
    }
}
