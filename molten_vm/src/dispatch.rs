//! Opcode dispatch table.
//!
//! Dispatch is a single indexed load from a 256-entry function pointer
//! table, built at compile time. Unassigned slots point at a handler
//! that raises `InvalidOpcode`, so a corrupt instruction stream fails
//! loudly instead of executing garbage.

use molten_bytecode::{Instruction, Opcode};
use molten_core::Value;

use crate::error::RuntimeError;
use crate::ops;
use crate::vm::VirtualMachine;

/// What the interpreter loop does after a handler runs.
#[derive(Debug)]
pub enum ControlFlow {
    /// Fall through to the next instruction.
    Continue,
    /// Adjust the instruction pointer by a signed offset.
    Jump(i16),
    /// Finish the current activation with a value.
    Return(Value),
    /// Abort execution with a runtime error.
    Error(RuntimeError),
}

/// Signature of an opcode handler.
pub type OpHandler = fn(&mut VirtualMachine, Instruction) -> ControlFlow;

/// Handler for opcode bytes with no assigned operation.
#[inline(always)]
fn op_unassigned(_vm: &mut VirtualMachine, inst: Instruction) -> ControlFlow {
    ControlFlow::Error(RuntimeError::invalid_opcode(inst.opcode()))
}

const fn build_dispatch_table() -> [OpHandler; 256] {
    let mut table: [OpHandler; 256] = [op_unassigned; 256];

    // Control flow
    table[Opcode::Nop as usize] = ops::control::nop;
    table[Opcode::Return as usize] = ops::control::return_value;
    table[Opcode::ReturnNone as usize] = ops::control::return_none;
    table[Opcode::Jump as usize] = ops::control::jump;
    table[Opcode::JumpIfFalse as usize] = ops::control::jump_if_false;
    table[Opcode::JumpIfTrue as usize] = ops::control::jump_if_true;

    // Loads, stores and moves
    table[Opcode::LoadConst as usize] = ops::load_store::load_const;
    table[Opcode::LoadNone as usize] = ops::load_store::load_none;
    table[Opcode::LoadTrue as usize] = ops::load_store::load_true;
    table[Opcode::LoadFalse as usize] = ops::load_store::load_false;
    table[Opcode::LoadGlobal as usize] = ops::load_store::load_global;
    table[Opcode::StoreGlobal as usize] = ops::load_store::store_global;
    table[Opcode::Move as usize] = ops::load_store::move_reg;

    // Arithmetic
    table[Opcode::Add as usize] = ops::arithmetic::add;
    table[Opcode::Sub as usize] = ops::arithmetic::sub;
    table[Opcode::Mul as usize] = ops::arithmetic::mul;
    table[Opcode::FloorDiv as usize] = ops::arithmetic::floor_div;
    table[Opcode::Mod as usize] = ops::arithmetic::modulo;
    table[Opcode::Neg as usize] = ops::arithmetic::neg;

    // Comparisons and logic
    table[Opcode::Lt as usize] = ops::comparison::lt;
    table[Opcode::Le as usize] = ops::comparison::le;
    table[Opcode::Eq as usize] = ops::comparison::eq;
    table[Opcode::Ne as usize] = ops::comparison::ne;
    table[Opcode::Gt as usize] = ops::comparison::gt;
    table[Opcode::Ge as usize] = ops::comparison::ge;
    table[Opcode::Not as usize] = ops::comparison::not;

    // Containers
    table[Opcode::Len as usize] = ops::containers::len;
    table[Opcode::BuildList as usize] = ops::containers::build_list;
    table[Opcode::ListAppend as usize] = ops::containers::list_append;

    // Calls and function creation
    table[Opcode::Call as usize] = ops::calls::call;
    table[Opcode::MakeFunction as usize] = ops::calls::make_function;

    table
}

/// The dispatch table, one handler per opcode byte.
pub static DISPATCH_TABLE: [OpHandler; 256] = build_dispatch_table();

/// Look up the handler for an opcode byte.
#[inline(always)]
pub fn get_handler(opcode: u8) -> OpHandler {
    // Safety: every u8 indexes within the 256-entry table.
    unsafe { *DISPATCH_TABLE.get_unchecked(opcode as usize) }
}
