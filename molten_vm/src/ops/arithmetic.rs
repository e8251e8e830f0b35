//! Arithmetic handlers.
//!
//! Each handler is a thin register shim over the shared value operations in
//! [`super`], which also back the template executor.

use molten_bytecode::Instruction;

use super::ControlFlow;
use crate::vm::VirtualMachine;

/// Add: dst = src1 + src2.
#[inline(always)]
pub fn add(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_add(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Sub: dst = src1 - src2.
#[inline(always)]
pub fn sub(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_sub(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Mul: dst = src1 * src2.
#[inline(always)]
pub fn mul(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_mul(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// FloorDiv: dst = src1 // src2.
#[inline(always)]
pub fn floor_div(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_floor_div(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Mod: dst = src1 % src2.
#[inline(always)]
pub fn modulo(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let (a, b) = frame.get_regs2(inst.src1().0, inst.src2().0);
    match super::value_mod(a, b) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

/// Neg: dst = -src1.
#[inline(always)]
pub fn neg(vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    let frame = vm.current_frame_mut();
    let value = frame.get_reg(inst.src1().0);
    match super::value_neg(value) {
        Ok(value) => {
            frame.set_reg(inst.dst().0, value);
            ControlFlow::Continue
        }
        Err(err) => ControlFlow::Error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use molten_bytecode::{FunctionBuilder, Opcode, Register};
    use molten_core::Value;

    use crate::frame::Frame;

    fn vm_with_regs(values: &[Value]) -> VirtualMachine {
        let mut b = FunctionBuilder::new("arith");
        b.alloc_register_block(values.len() as u8 + 1);
        b.emit_return_none();
        let mut vm = VirtualMachine::new();
        vm.frames.push(Frame::new(Arc::new(b.finish())));
        for (i, &v) in values.iter().enumerate() {
            vm.current_frame_mut().set_reg(i as u8, v);
        }
        vm
    }

    #[test]
    fn test_add_writes_destination() {
        let mut vm = vm_with_regs(&[Value::int_unchecked(4), Value::int_unchecked(5)]);
        let inst = Instruction::op_dss(Opcode::Add, Register::new(2), Register::new(0), Register::new(1));
        assert!(matches!(add(&mut vm, inst), ControlFlow::Continue));
        assert_eq!(vm.current_frame().get_reg(2).as_int(), Some(9));
    }

    #[test]
    fn test_type_error_surfaces_as_control_flow_error() {
        let mut vm = vm_with_regs(&[Value::bool(true), Value::none()]);
        let inst = Instruction::op_dss(Opcode::Sub, Register::new(2), Register::new(0), Register::new(1));
        match sub(&mut vm, inst) {
            ControlFlow::Error(err) => {
                assert!(err.to_string().contains("unsupported operand"));
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }
}
