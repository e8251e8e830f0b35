//! Constant, register, and global load/store handlers.

use molten_bytecode::Instruction;
use molten_core::Value;

use super::ControlFlow;
use crate::error::RuntimeError;
use crate::vm::VirtualMachine;

/// Finish a load by writing the produced value into the dst slot.
#[inline(always)]
fn write_dst(vm: &mut VirtualMachine, inst: Instruction, value: Value) -> ControlFlow {
    vm.current_frame_mut().set_reg(inst.dst().0, value);
    ControlFlow::Continue
}

/// LoadConst: dst = consts[imm16].
#[inline(always)]
pub fn load_const(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let value = vm.current_frame().get_const(inst.imm16());
    write_dst(vm, inst, value)
}

/// LoadNone: dst = None.
#[inline(always)]
pub fn load_none(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    write_dst(vm, inst, Value::none())
}

/// LoadTrue: dst = True.
#[inline(always)]
pub fn load_true(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    write_dst(vm, inst, Value::bool(true))
}

/// LoadFalse: dst = False.
#[inline(always)]
pub fn load_false(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    write_dst(vm, inst, Value::bool(false))
}

/// LoadGlobal: dst = globals[names[imm16]].
#[inline(always)]
pub fn load_global(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let name = vm.current_frame().get_name(inst.imm16()).clone();
    match vm.globals.get(&name).copied() {
        Some(value) => write_dst(vm, inst, value),
        None => ControlFlow::Error(RuntimeError::name_error(name.get_arc())),
    }
}

/// StoreGlobal: globals[names[imm16]] = value in the dst slot.
#[inline(always)]
pub fn store_global(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame();
    let value = frame.get_reg(inst.dst().0);
    let name = frame.get_name(inst.imm16()).clone();
    vm.globals.insert(name, value);
    ControlFlow::Continue
}

/// Move: dst = src1.
#[inline(always)]
pub fn move_reg(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let value = vm.current_frame().get_reg(inst.src1().0);
    write_dst(vm, inst, value)
}
