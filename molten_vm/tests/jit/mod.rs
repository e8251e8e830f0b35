//! Compilation-tier integration test suite.
//!
//! End-to-end tests that drive guest functions through the call adapter
//! and verify the compiled tier against the interpreter. Organized by
//! category:
//! - functions: arity coverage, bound methods, stats and reports
//! - recursion: self-recursive guests and the recursion guard
//! - toggle: runtime enable/disable of the tier
//! - cache: invalidation, generations, fallbacks, capacity pressure
//! - concurrency: one shared cache feeding several VMs

pub mod cache;
pub mod concurrency;
pub mod functions;
pub mod recursion;
pub mod test_utils;
pub mod toggle;
