//! Register bytecode shared by the interpreter and the template compiler.
//!
//! A guest function is a [`CodeObject`]: a flat run of 32-bit
//! [`Instruction`] words plus the constant pool, global-name table and
//! register requirements that run needs. [`FunctionBuilder`] assembles
//! one programmatically, resolving jump labels and deduplicating
//! constants; both execution tiers consume the finished object as-is.
//!
//! ```
//! use molten_bytecode::{FunctionBuilder, Register};
//!
//! let mut builder = FunctionBuilder::new("add");
//! builder.set_arg_count(2);
//! builder.reserve_parameters(2);
//!
//! let result = builder.alloc_register();
//! builder.emit_add(result, Register(0), Register(1));
//! builder.emit_return(result);
//!
//! let code = builder.finish();
//! assert_eq!(code.instructions.len(), 2);
//! assert_eq!(code.register_count, 3);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod builder;
pub mod code;
pub mod instruction;

// Re-export main types
pub use builder::{FunctionBuilder, Label};
pub use code::{CodeFlags, CodeObject};
pub use instruction::{ConstIndex, Instruction, InstructionFormat, Opcode, Register};
