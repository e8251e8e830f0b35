//! Control flow handlers.

use molten_bytecode::Instruction;
use molten_core::Value;

use super::ControlFlow;
use crate::vm::VirtualMachine;

/// Nop: do nothing.
#[inline(always)]
pub fn nop(_vm: &mut VirtualMachine, _inst: Instruction) -> ControlFlow {
    ControlFlow::Continue
}

/// Return: finish the frame with the value in the dst slot.
#[inline(always)]
pub fn return_value(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let value = vm.current_frame().get_reg(inst.dst().0);
    ControlFlow::Return(value)
}

/// ReturnNone: finish the frame with None.
#[inline(always)]
pub fn return_none(_vm: &mut VirtualMachine, _inst: Instruction) -> ControlFlow {
    ControlFlow::Return(Value::none())
}

/// Jump: unconditional relative jump.
#[inline(always)]
pub fn jump(_vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    ControlFlow::Jump(inst.imm16() as i16)
}

/// JumpIfFalse: relative jump when the condition register is falsy.
#[inline(always)]
pub fn jump_if_false(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let cond = vm.current_frame().get_reg(inst.dst().0);
    if cond.is_truthy() {
        ControlFlow::Continue
    } else {
        ControlFlow::Jump(inst.imm16() as i16)
    }
}

/// JumpIfTrue: relative jump when the condition register is truthy.
#[inline(always)]
pub fn jump_if_true(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let cond = vm.current_frame().get_reg(inst.dst().0);
    if cond.is_truthy() {
        ControlFlow::Jump(inst.imm16() as i16)
    } else {
        ControlFlow::Continue
    }
}
