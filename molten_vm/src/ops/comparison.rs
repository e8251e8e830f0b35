//! Comparison and logic handlers.

use molten_bytecode::Instruction;
use molten_core::Value;

use super::ControlFlow;
use crate::vm::VirtualMachine;

/// Lt: dst = src1 < src2.
#[inline(always)]
pub fn lt(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_lt(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Le: dst = src1 <= src2.
#[inline(always)]
pub fn le(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_le(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Eq: dst = src1 == src2. Never fails; unlike ordering, equality is
/// defined for every value pair.
#[inline(always)]
pub fn eq(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    frame.set_reg(inst.dst().0, Value::bool(a == b));
    ControlFlow::Continue
}

/// Ne: dst = src1 != src2.
#[inline(always)]
pub fn ne(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    frame.set_reg(inst.dst().0, Value::bool(a != b));
    ControlFlow::Continue
}

/// Gt: dst = src1 > src2.
#[inline(always)]
pub fn gt(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_gt(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Ge: dst = src1 >= src2.
#[inline(always)]
pub fn ge(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_ge(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Not: dst = not src1, by truthiness.
#[inline(always)]
pub fn not(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let value = frame.get_reg(inst.src1().0);
    frame.set_reg(inst.dst().0, Value::bool(!value.is_truthy()));
    ControlFlow::Continue
}
