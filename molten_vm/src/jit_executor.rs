//! Template execution engine.
//!
//! Runs a [`CompiledUnit`]'s pre-decoded op stream over a transient
//! register file. Activations here never push an interpreter frame; the
//! register file lives on the host stack (spilling to the heap for wide
//! units) and guest calls re-enter the VM's call adapter, so compiled
//! and interpreted activations nest freely.
//!
//! Register indices, jump targets, and call windows were all validated
//! when the unit was lowered, so plain indexing cannot fail here.

use smallvec::{smallvec, SmallVec};

use molten_core::Value;
use molten_jit::{CompiledUnit, TemplateOp};
use molten_runtime::ListObject;

use crate::error::{RuntimeError, VmResult};
use crate::ops;
use crate::vm::VirtualMachine;

/// Execute a compiled unit with the given effective arguments.
///
/// `args` must already match the unit's declared arity; the call adapter
/// checks that before it ever consults the cache.
pub(crate) fn execute(
    vm: &mut VirtualMachine,
    unit: &CompiledUnit,
    args: &[Value],
) -> VmResult<Value> {
    let mut regs: SmallVec<[Value; 16]> = smallvec![Value::none(); unit.register_count as usize];
    regs[..args.len()].copy_from_slice(args);

    let mut pc: usize = 0;
    loop {
        if pc >= unit.ops.len() {
            // Falling off the end returns None, like the interpreter.
            return Ok(Value::none());
        }
        let op = &unit.ops[pc];
        pc += 1;

        match *op {
            // Value loading
            TemplateOp::LoadConst { dst, value } => regs[dst as usize] = value,
            TemplateOp::LoadNone { dst } => regs[dst as usize] = Value::none(),
            TemplateOp::LoadBool { dst, value } => regs[dst as usize] = Value::bool(value),
            TemplateOp::Move { dst, src } => regs[dst as usize] = regs[src as usize],

            // Globals
            TemplateOp::LoadGlobal { dst, ref name } => {
                match vm.globals.get(name).copied() {
                    Some(value) => regs[dst as usize] = value,
                    None => return Err(RuntimeError::name_error(name.get_arc())),
                }
            }
            TemplateOp::StoreGlobal { src, ref name } => {
                vm.globals.insert(name.clone(), regs[src as usize]);
            }

            // Arithmetic
            TemplateOp::Add { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_add(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Sub { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_sub(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Mul { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_mul(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::FloorDiv { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_floor_div(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Mod { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_mod(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Neg { dst, src } => {
                regs[dst as usize] = ops::value_neg(regs[src as usize])?;
            }

            // Comparisons and logic
            TemplateOp::Lt { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_lt(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Le { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_le(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Eq { dst, lhs, rhs } => {
                regs[dst as usize] = Value::bool(regs[lhs as usize] == regs[rhs as usize]);
            }
            TemplateOp::Ne { dst, lhs, rhs } => {
                regs[dst as usize] = Value::bool(regs[lhs as usize] != regs[rhs as usize]);
            }
            TemplateOp::Gt { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_gt(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Ge { dst, lhs, rhs } => {
                regs[dst as usize] = ops::value_ge(regs[lhs as usize], regs[rhs as usize])?;
            }
            TemplateOp::Not { dst, src } => {
                regs[dst as usize] = Value::bool(!regs[src as usize].is_truthy());
            }

            // Control flow
            TemplateOp::Jump { target } => pc = target as usize,
            TemplateOp::JumpIfFalse { cond, target } => {
                if !regs[cond as usize].is_truthy() {
                    pc = target as usize;
                }
            }
            TemplateOp::JumpIfTrue { cond, target } => {
                if regs[cond as usize].is_truthy() {
                    pc = target as usize;
                }
            }

            // Containers
            TemplateOp::BuildList { dst, start, count } => {
                let first = start as usize;
                let list = ListObject::from_slice(&regs[first..first + count as usize]);
                regs[dst as usize] = vm.heap.alloc_list_value(list);
            }
            TemplateOp::ListAppend { list, item } => {
                ops::list_append_value(regs[list as usize], regs[item as usize])?;
            }
            TemplateOp::Len { dst, src } => {
                regs[dst as usize] = ops::value_len(regs[src as usize])?;
            }

            // Calls
            TemplateOp::Call { dst, func, argc } => {
                let callee = regs[func as usize];
                let first = dst as usize + 1;
                let call_args: SmallVec<[Value; 8]> =
                    SmallVec::from_slice(&regs[first..first + argc as usize]);
                regs[dst as usize] = vm.call_function(callee, &call_args)?;
            }

            TemplateOp::Return { src } => return Ok(regs[src as usize]),
            TemplateOp::ReturnNone => return Ok(Value::none()),
        }
    }
}
