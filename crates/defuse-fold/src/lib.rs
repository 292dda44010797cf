//! Chain folding core.
//!
//! Finds two deobfuscation opportunities in a function's two-level
//! SSA IR and rewrites the binary image in place:
//!
//! - chains of instructions that recompute an already-known constant
//!   through dead intermediate transformations, and
//! - chains of unconditional transfers that land on one real target.
//!
//! Intermediate instructions become no-ops and exactly one
//! instruction in the chain is rewritten to encode the collapsed
//! effect. Every mutation is a same-length byte replacement, so all
//! surrounding addresses stay stable.
//!
//! Each entry point is synchronous and self-contained: it reads
//! through [`defuse_ir::IrQuery`], performs at most one ordered write
//! sequence, and retains nothing between calls. The core is not
//! internally thread-safe; the image is a shared mutable resource and
//! the caller must serialize mutations.

mod constant;
mod dispatch;
mod outcome;
mod transfer;
mod walker;

pub use constant::*;
pub use dispatch::*;
pub use outcome::*;
pub use transfer::*;
pub use walker::*;

use defuse_ir::Addr;

/// Earliest phase at which indirect transfers through constant
/// pointers may be folded. Before the IR has stabilized, a constant
/// pointer read may still be rewritten by other passes.
pub const INDIRECT_FOLD_PHASE: u32 = 3;

/// Queue of addresses for later re-analysis. Fire and forget; the
/// core only produces entries, the driver consumes them.
pub trait WorkSink {
    fn enqueue(&mut self, addr: Addr);
}

impl WorkSink for Vec<Addr> {
    fn enqueue(&mut self, addr: Addr) {
        self.push(addr);
    }
}
