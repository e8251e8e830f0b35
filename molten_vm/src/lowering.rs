//! Bytecode to template lowering.
//!
//! Walks a code unit's packed instruction stream and re-expresses it as
//! [`TemplateOp`]s: constants inlined, global names resolved to interned
//! handles, and relative jump offsets rewritten to absolute op indices.
//! Every operand is validated against the unit it came from here, so the
//! template executor can index registers and targets without per-step
//! checks. Nothing invalid may survive this pass.

use molten_bytecode::{CodeObject, Instruction, Opcode};
use molten_core::{InternedString, Value};
use molten_jit::{CompiledUnit, JitError, JitResult, TemplateOp};

/// Lower a code unit into a compiled template.
///
/// `Nop` instructions are elided; jump targets that land on one are
/// redirected to the next real op. A jump one past the last instruction
/// resolves to the op count, which the executor treats as an implicit
/// `return None`.
///
/// Fails with [`JitError::UnsupportedOperation`] on instructions outside
/// the template set (`MakeFunction`, object constants) and with
/// [`JitError::Malformed`] on operands that do not validate.
pub(crate) fn lower_code_to_unit(code_id: u64, code: &CodeObject) -> JitResult<CompiledUnit> {
    let instructions = &code.instructions;
    let register_count = code.register_count;

    // The executor binds arguments into the low registers, so the
    // declared counts must at least be consistent with each other.
    if code.arg_count > register_count {
        return Err(JitError::malformed(format!(
            "arg count {} exceeds register count {}",
            code.arg_count, register_count
        )));
    }

    // First pass: decode opcodes and map instruction indices to the op
    // indices they will occupy once Nops are gone.
    let mut decoded = Vec::with_capacity(instructions.len());
    let mut op_index = Vec::with_capacity(instructions.len());
    let mut op_total: u32 = 0;
    for (index, inst) in instructions.iter().enumerate() {
        let opcode = Opcode::from_u8(inst.opcode()).ok_or_else(|| {
            JitError::malformed(format!(
                "invalid opcode byte {:#04x} at instruction {}",
                inst.opcode(),
                index
            ))
        })?;
        decoded.push(opcode);
        op_index.push(op_total);
        if opcode != Opcode::Nop {
            op_total += 1;
        }
    }

    // Second pass: emit ops with operands resolved and checked.
    let mut ops = Vec::with_capacity(op_total as usize);
    for (index, (&opcode, inst)) in decoded.iter().zip(instructions.iter()).enumerate() {
        match opcode {
            Opcode::Nop => continue,

            // Control flow
            Opcode::Return => {
                let src = check_reg(inst.dst().0, register_count, index)?;
                ops.push(TemplateOp::Return { src });
            }
            Opcode::ReturnNone => ops.push(TemplateOp::ReturnNone),
            Opcode::Jump => {
                let target = resolve_jump(&op_index, op_total, index, inst.imm16())?;
                ops.push(TemplateOp::Jump { target });
            }
            Opcode::JumpIfFalse => {
                let cond = check_reg(inst.dst().0, register_count, index)?;
                let target = resolve_jump(&op_index, op_total, index, inst.imm16())?;
                ops.push(TemplateOp::JumpIfFalse { cond, target });
            }
            Opcode::JumpIfTrue => {
                let cond = check_reg(inst.dst().0, register_count, index)?;
                let target = resolve_jump(&op_index, op_total, index, inst.imm16())?;
                ops.push(TemplateOp::JumpIfTrue { cond, target });
            }

            // Loads, stores, and moves
            Opcode::LoadConst => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let value = resolve_constant(code, inst.imm16(), index)?;
                ops.push(TemplateOp::LoadConst { dst, value });
            }
            Opcode::LoadNone => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                ops.push(TemplateOp::LoadNone { dst });
            }
            Opcode::LoadTrue => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                ops.push(TemplateOp::LoadBool { dst, value: true });
            }
            Opcode::LoadFalse => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                ops.push(TemplateOp::LoadBool { dst, value: false });
            }
            Opcode::LoadGlobal => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let name = resolve_name(code, inst.imm16(), index)?;
                ops.push(TemplateOp::LoadGlobal { dst, name });
            }
            Opcode::StoreGlobal => {
                // The source register travels in the dst slot.
                let src = check_reg(inst.dst().0, register_count, index)?;
                let name = resolve_name(code, inst.imm16(), index)?;
                ops.push(TemplateOp::StoreGlobal { src, name });
            }
            Opcode::Move => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let src = check_reg(inst.src1().0, register_count, index)?;
                ops.push(TemplateOp::Move { dst, src });
            }

            // Arithmetic
            Opcode::Add => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Add { dst, lhs, rhs });
            }
            Opcode::Sub => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Sub { dst, lhs, rhs });
            }
            Opcode::Mul => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Mul { dst, lhs, rhs });
            }
            Opcode::FloorDiv => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::FloorDiv { dst, lhs, rhs });
            }
            Opcode::Mod => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Mod { dst, lhs, rhs });
            }
            Opcode::Neg => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let src = check_reg(inst.src1().0, register_count, index)?;
                ops.push(TemplateOp::Neg { dst, src });
            }

            // Comparisons and logic
            Opcode::Lt => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Lt { dst, lhs, rhs });
            }
            Opcode::Le => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Le { dst, lhs, rhs });
            }
            Opcode::Eq => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Eq { dst, lhs, rhs });
            }
            Opcode::Ne => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Ne { dst, lhs, rhs });
            }
            Opcode::Gt => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Gt { dst, lhs, rhs });
            }
            Opcode::Ge => {
                let (dst, lhs, rhs) = check_regs3(inst, register_count, index)?;
                ops.push(TemplateOp::Ge { dst, lhs, rhs });
            }
            Opcode::Not => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let src = check_reg(inst.src1().0, register_count, index)?;
                ops.push(TemplateOp::Not { dst, src });
            }

            // Containers
            Opcode::Len => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let src = check_reg(inst.src1().0, register_count, index)?;
                ops.push(TemplateOp::Len { dst, src });
            }
            Opcode::BuildList => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let start = inst.src1().0;
                let count = inst.src2().0;
                check_span(start as u16, count as u16, register_count, index)?;
                ops.push(TemplateOp::BuildList { dst, start, count });
            }
            Opcode::ListAppend => {
                let list = check_reg(inst.src1().0, register_count, index)?;
                let item = check_reg(inst.src2().0, register_count, index)?;
                ops.push(TemplateOp::ListAppend { list, item });
            }

            // Calls
            Opcode::Call => {
                let dst = check_reg(inst.dst().0, register_count, index)?;
                let func = check_reg(inst.src1().0, register_count, index)?;
                let argc = inst.src2().0;
                check_span(dst as u16 + 1, argc as u16, register_count, index)?;
                ops.push(TemplateOp::Call { dst, func, argc });
            }
            Opcode::MakeFunction => {
                return Err(JitError::unsupported(opcode, index));
            }
        }
    }
    debug_assert_eq!(ops.len(), op_total as usize);

    Ok(CompiledUnit::new(
        code_id,
        code.name.clone(),
        ops,
        code.arg_count,
        register_count,
    ))
}

/// Validate a register operand against the unit's declared count.
fn check_reg(reg: u8, register_count: u16, index: usize) -> JitResult<u8> {
    if (reg as u16) < register_count {
        Ok(reg)
    } else {
        Err(JitError::malformed(format!(
            "register r{} out of range at instruction {} (unit declares {})",
            reg, index, register_count
        )))
    }
}

/// Validate the common dst/lhs/rhs triple.
fn check_regs3(inst: &Instruction, register_count: u16, index: usize) -> JitResult<(u8, u8, u8)> {
    let dst = check_reg(inst.dst().0, register_count, index)?;
    let lhs = check_reg(inst.src1().0, register_count, index)?;
    let rhs = check_reg(inst.src2().0, register_count, index)?;
    Ok((dst, lhs, rhs))
}

/// Validate a contiguous register window `first..first + count`.
///
/// Computed in u16, so a window reaching past r255 cannot wrap.
fn check_span(first: u16, count: u16, register_count: u16, index: usize) -> JitResult<()> {
    if first + count <= register_count {
        Ok(())
    } else {
        Err(JitError::malformed(format!(
            "register window r{}..r{} out of range at instruction {} (unit declares {})",
            first,
            first + count,
            index,
            register_count
        )))
    }
}

/// Resolve a relative jump offset to an absolute op index.
///
/// The offset counts from the instruction after the jump, matching the
/// interpreter's already-advanced ip.
fn resolve_jump(op_index: &[u32], op_total: u32, index: usize, offset: u16) -> JitResult<u32> {
    let target = index as i64 + 1 + (offset as i16) as i64;
    if target < 0 || target > op_index.len() as i64 {
        return Err(JitError::malformed(format!(
            "jump target {} out of range at instruction {} ({} instructions)",
            target,
            index,
            op_index.len()
        )));
    }
    if target == op_index.len() as i64 {
        // One past the end is the implicit return None.
        return Ok(op_total);
    }
    Ok(op_index[target as usize])
}

/// Inline a constant pool entry.
///
/// Object constants are nested code units; a template holds no heap
/// references, so their presence disqualifies the unit.
fn resolve_constant(code: &CodeObject, idx: u16, index: usize) -> JitResult<Value> {
    let value = code.constants.get(idx as usize).copied().ok_or_else(|| {
        JitError::malformed(format!(
            "invalid constant index {} at instruction {} ({} constants)",
            idx,
            index,
            code.constants.len()
        ))
    })?;
    if value.is_object() {
        return Err(JitError::unsupported(Opcode::LoadConst, index));
    }
    Ok(value)
}

/// Resolve a names table entry to its interned handle.
fn resolve_name(code: &CodeObject, idx: u16, index: usize) -> JitResult<InternedString> {
    code.names.get(idx as usize).cloned().ok_or_else(|| {
        JitError::malformed(format!(
            "invalid name index {} at instruction {} ({} names)",
            idx,
            index,
            code.names.len()
        ))
    })
}
