//! Packed register-bytecode instruction definitions.
//!
//! An instruction is one 32-bit word, decoded by shifts alone:
//!
//! ```text
//! bit 31        24        16         8         0
//!     | opcode  |   dst   |  src1   |  src2   |
//! ```
//!
//! The low half (`src1:src2`) doubles as a 16-bit immediate, used for
//! constant-pool indices, name-table indices and signed jump offsets.

use std::fmt;

/// Index into a frame's register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Register(pub u8);

impl Register {
    /// Register at the given slot.
    #[inline]
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Register(index)
    }

    /// Slot number of this register.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Index into a code unit's constant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ConstIndex(pub u16);

impl ConstIndex {
    /// Constant-pool slot at the given index.
    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        ConstIndex(index)
    }
}

/// One packed 32-bit instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Instruction(u32);

impl Instruction {
    /// Pack an instruction from opcode and raw operand bytes.
    #[inline]
    #[must_use]
    pub const fn new(opcode: Opcode, dst: u8, src1: u8, src2: u8) -> Self {
        Instruction(
            ((opcode as u32) << 24) | ((dst as u32) << 16) | ((src1 as u32) << 8) | (src2 as u32),
        )
    }

    /// An instruction with no operands.
    #[inline]
    #[must_use]
    pub const fn op(opcode: Opcode) -> Self {
        Self::new(opcode, 0, 0, 0)
    }

    /// An instruction with a destination register only.
    #[inline]
    #[must_use]
    pub const fn op_d(opcode: Opcode, dst: Register) -> Self {
        Self::new(opcode, dst.0, 0, 0)
    }

    /// An instruction with destination and one source.
    #[inline]
    #[must_use]
    pub const fn op_ds(opcode: Opcode, dst: Register, src: Register) -> Self {
        Self::new(opcode, dst.0, src.0, 0)
    }

    /// An instruction with destination and two sources.
    #[inline]
    #[must_use]
    pub const fn op_dss(opcode: Opcode, dst: Register, src1: Register, src2: Register) -> Self {
        Self::new(opcode, dst.0, src1.0, src2.0)
    }

    /// An instruction with a destination and a 16-bit immediate in src1:src2.
    #[inline]
    #[must_use]
    pub const fn op_di(opcode: Opcode, dst: Register, imm16: u16) -> Self {
        Self::new(opcode, dst.0, (imm16 >> 8) as u8, imm16 as u8)
    }

    /// The opcode byte.
    #[inline]
    #[must_use]
    pub const fn opcode(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The destination register.
    #[inline]
    #[must_use]
    pub const fn dst(self) -> Register {
        Register(((self.0 >> 16) & 0xFF) as u8)
    }

    /// The first source register.
    #[inline]
    #[must_use]
    pub const fn src1(self) -> Register {
        Register(((self.0 >> 8) & 0xFF) as u8)
    }

    /// The second source register.
    #[inline]
    #[must_use]
    pub const fn src2(self) -> Register {
        Register((self.0 & 0xFF) as u8)
    }

    /// The 16-bit immediate packed into src1:src2.
    #[inline]
    #[must_use]
    pub const fn imm16(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// The raw packed word.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild from a raw packed word.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Instruction(raw)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instruction(op=0x{:02x} {} {} {})",
            self.opcode(),
            self.dst(),
            self.src1(),
            self.src2()
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(op) = Opcode::from_u8(self.opcode()) {
            write!(f, "{op:?}")?;
            match op.format() {
                InstructionFormat::NoOp => {}
                InstructionFormat::Dst => write!(f, " {}", self.dst())?,
                InstructionFormat::DstSrc => write!(f, " {}, {}", self.dst(), self.src1())?,
                InstructionFormat::DstSrcSrc => {
                    write!(f, " {}, {}, {}", self.dst(), self.src1(), self.src2())?;
                }
                InstructionFormat::DstImm16 => write!(f, " {}, #{}", self.dst(), self.imm16())?,
                InstructionFormat::Imm16 => write!(f, " #{}", self.imm16())?,
            }
            Ok(())
        } else {
            write!(f, "INVALID({:08x})", self.0)
        }
    }
}

/// Operand layout categories, used for disassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionFormat {
    /// No operands.
    NoOp,
    /// Destination register only.
    Dst,
    /// Destination and one source register.
    DstSrc,
    /// Destination and two source registers.
    DstSrcSrc,
    /// Destination and 16-bit immediate.
    DstImm16,
    /// 16-bit immediate only.
    Imm16,
}

/// Bytecode opcodes.
///
/// The byte space is banked by handler category, leaving room in each
/// bank for growth:
/// - `0x00`: control flow
/// - `0x08`: loads, stores and moves
/// - `0x20`: arithmetic (dynamic dispatch on operand types)
/// - `0x30`: comparison and logic
/// - `0x40`: containers
/// - `0x50`: calls and function creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // =========================================================================
    // Control flow
    // =========================================================================
    /// No operation.
    Nop = 0x00,
    /// Return value in dst.
    Return = 0x01,
    /// Return None.
    ReturnNone = 0x02,
    /// Unconditional jump, signed 16-bit instruction offset in imm16.
    Jump = 0x03,
    /// Jump if dst is falsy, signed offset in imm16.
    JumpIfFalse = 0x04,
    /// Jump if dst is truthy, signed offset in imm16.
    JumpIfTrue = 0x05,

    // =========================================================================
    // Loads, stores and moves
    // =========================================================================
    /// dst = consts\[imm16\].
    LoadConst = 0x08,
    /// dst = None.
    LoadNone = 0x09,
    /// dst = True.
    LoadTrue = 0x0A,
    /// dst = False.
    LoadFalse = 0x0B,
    /// dst = src1.
    Move = 0x0C,
    /// dst = globals\[names\[imm16\]\].
    LoadGlobal = 0x0D,
    /// globals\[names\[imm16\]\] = dst.
    StoreGlobal = 0x0E,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    /// dst = src1 + src2.
    Add = 0x20,
    /// dst = src1 - src2.
    Sub = 0x21,
    /// dst = src1 * src2.
    Mul = 0x22,
    /// dst = src1 // src2, flooring division.
    FloorDiv = 0x23,
    /// dst = src1 % src2, sign follows the divisor.
    Mod = 0x24,
    /// dst = -src1.
    Neg = 0x25,

    // =========================================================================
    // Comparison and logic
    // =========================================================================
    /// dst = src1 < src2.
    Lt = 0x30,
    /// dst = src1 <= src2.
    Le = 0x31,
    /// dst = src1 == src2.
    Eq = 0x32,
    /// dst = src1 != src2.
    Ne = 0x33,
    /// dst = src1 > src2.
    Gt = 0x34,
    /// dst = src1 >= src2.
    Ge = 0x35,
    /// dst = not src1 (truthiness negation).
    Not = 0x36,

    // =========================================================================
    // Containers
    // =========================================================================
    /// dst = \[r(src1)..r(src1+src2)\].
    BuildList = 0x40,
    /// src1.append(src2).
    ListAppend = 0x41,
    /// dst = len(src1).
    Len = 0x42,

    // =========================================================================
    // Calls and function creation
    // =========================================================================
    /// dst = src1(args...), argc in src2, args in r(dst+1)..r(dst+argc).
    Call = 0x50,
    /// dst = function object for the code constant at consts\[imm16\].
    MakeFunction = 0x51,
}

impl Opcode {
    /// Decode an opcode byte, returning `None` for invalid bytes.
    #[inline]
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Return),
            0x02 => Some(Opcode::ReturnNone),
            0x03 => Some(Opcode::Jump),
            0x04 => Some(Opcode::JumpIfFalse),
            0x05 => Some(Opcode::JumpIfTrue),

            0x08 => Some(Opcode::LoadConst),
            0x09 => Some(Opcode::LoadNone),
            0x0A => Some(Opcode::LoadTrue),
            0x0B => Some(Opcode::LoadFalse),
            0x0C => Some(Opcode::Move),
            0x0D => Some(Opcode::LoadGlobal),
            0x0E => Some(Opcode::StoreGlobal),

            0x20 => Some(Opcode::Add),
            0x21 => Some(Opcode::Sub),
            0x22 => Some(Opcode::Mul),
            0x23 => Some(Opcode::FloorDiv),
            0x24 => Some(Opcode::Mod),
            0x25 => Some(Opcode::Neg),

            0x30 => Some(Opcode::Lt),
            0x31 => Some(Opcode::Le),
            0x32 => Some(Opcode::Eq),
            0x33 => Some(Opcode::Ne),
            0x34 => Some(Opcode::Gt),
            0x35 => Some(Opcode::Ge),
            0x36 => Some(Opcode::Not),

            0x40 => Some(Opcode::BuildList),
            0x41 => Some(Opcode::ListAppend),
            0x42 => Some(Opcode::Len),

            0x50 => Some(Opcode::Call),
            0x51 => Some(Opcode::MakeFunction),

            _ => None,
        }
    }

    /// The operand layout for this opcode.
    #[inline]
    #[must_use]
    pub const fn format(self) -> InstructionFormat {
        use InstructionFormat::*;
        use Opcode::*;

        match self {
            Nop | ReturnNone => NoOp,

            Return | LoadNone | LoadTrue | LoadFalse => Dst,

            Jump => Imm16,
            JumpIfFalse | JumpIfTrue => DstImm16,

            LoadConst | LoadGlobal | StoreGlobal | MakeFunction => DstImm16,

            Move | Neg | Not | Len => DstSrc,

            Add | Sub | Mul | FloorDiv | Mod | Lt | Le | Eq | Ne | Gt | Ge => DstSrcSrc,

            Call | BuildList | ListAppend => DstSrcSrc,
        }
    }
}
