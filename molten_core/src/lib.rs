//! Foundational types shared across the Molten workspace.
//!
//! Everything downstream builds on the NaN-boxed [`Value`] word defined
//! here, the global string interner behind [`InternedString`], and the
//! value-level error types in [`error`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod intern;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use intern::{InternedString, StringInterner};
pub use value::Value;

/// Workspace version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
