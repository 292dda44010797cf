//! Intermediate representation for the defuse binary deobfuscator.
//!
//! This crate provides the two-level IR the folding passes analyze:
//! plain data types for instructions, operand trees, storage locations
//! and SSA values, plus the [`IrQuery`] contract a front end must
//! satisfy. The folding logic itself lives in `defuse-fold`.

mod expr;
mod function;
mod instr;
mod query;
mod storage;

pub use expr::*;
pub use function::*;
pub use instr::*;
pub use query::*;
pub use storage::*;
