//! Control-transfer chain resolution.
//!
//! Follows a run of unconditional transfers down to the instruction
//! that actually does work, so a whole trampoline chain can be
//! replaced with one direct jump.

use defuse_ir::{Addr, InstrIdx, InstrKind, IrLevel, IrQuery};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::INDIRECT_FOLD_PHASE;

/// Verdict of one transfer resolution, before any bytes move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferFold {
    /// Not a foldable transfer, or the chain could not be followed.
    NoOpportunity,
    /// The transfer already lands on its final target. Holds the
    /// variable-level index of that target.
    Resolved(InstrIdx),
    /// The transfer at `at` should become a direct jump to `target`.
    Rewrite { at: Addr, target: Addr },
}

/// Resolve the transfer chain starting at the variable-level
/// instruction `idx`.
///
/// Indirect transfers participate only from [`INDIRECT_FOLD_PHASE`]
/// on, and only when the value analysis proves their destination is a
/// constant pointer; resolving one bypasses SSA lookup for that step.
/// A revisited instruction means the chain loops and nothing is done.
pub fn resolve_transfer<Q: IrQuery>(query: &Q, idx: InstrIdx, phase: u32) -> TransferFold {
    let Some(low) = query.low_level_index(idx) else {
        debug!(idx, "transfer has no register-level counterpart");
        return TransferFold::NoOpportunity;
    };
    let Some(start) = query.instr(IrLevel::Register, low) else {
        return TransferFold::NoOpportunity;
    };

    // Declared target of a direct goto; an indirect start declares
    // nothing, so any constant resolution is a rewrite.
    let (declared, mut cur) = match start.kind {
        InstrKind::Goto { target } => (Some(target), target),
        InstrKind::JumpIndirect { .. } => {
            if phase < INDIRECT_FOLD_PHASE {
                debug!(phase, "indirect transfer before fold phase");
                return TransferFold::NoOpportunity;
            }
            match indirect_target(query, low) {
                Some(target) => (None, target),
                None => return TransferFold::NoOpportunity,
            }
        }
        _ => return TransferFold::NoOpportunity,
    };

    let mut seen: FxHashSet<InstrIdx> = FxHashSet::default();
    seen.insert(low);
    seen.insert(cur);

    loop {
        let next = match query.instr(IrLevel::Register, cur).map(|i| &i.kind) {
            Some(InstrKind::Goto { target }) => Some(*target),
            Some(InstrKind::JumpIndirect { .. }) if phase >= INDIRECT_FOLD_PHASE => {
                indirect_target(query, cur)
            }
            _ => None,
        };
        let Some(next) = next else {
            break;
        };
        if !seen.insert(next) {
            debug!("transfer chain loops");
            return TransferFold::NoOpportunity;
        }
        trace!(next, "following transfer");
        cur = next;
    }

    if declared == Some(cur) {
        return match query.high_level_index(cur) {
            Some(high) => TransferFold::Resolved(high),
            None => TransferFold::NoOpportunity,
        };
    }
    let Some(target) = query.instr(IrLevel::Register, cur) else {
        return TransferFold::NoOpportunity;
    };
    TransferFold::Rewrite {
        at: start.addr,
        target: target.addr,
    }
}

/// Instruction a constant-pointer indirect transfer lands on.
fn indirect_target<Q: IrQuery>(query: &Q, idx: InstrIdx) -> Option<InstrIdx> {
    let ptr = query.value_of(IrLevel::Register, idx).as_const_ptr()?;
    let target = query.index_at(IrLevel::Register, ptr);
    if target.is_none() {
        debug!(ptr = format_args!("{ptr:#x}"), "no instruction at pointer");
    }
    target
}
