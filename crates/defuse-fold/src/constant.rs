//! Constant chain folding.
//!
//! Consumes a dependency chain whose use the value analysis has
//! already pinned to a constant, and synthesizes the patch that
//! encodes the constant directly at the chain-terminating definition.

use defuse_asm::Encode;
use defuse_ir::{Addr, Expr, InstrIdx, InstrKind, IrLevel, IrQuery, StackDir, VarKind};
use tracing::debug;

use crate::outcome::{FoldError, Result};
use crate::walker::{reg_chain, var_chain};

/// A synthesized binary patch: neutralize `nops` (oldest first), then
/// place `bytes` at `at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchPlan {
    /// Addresses to replace with no-ops, oldest first.
    pub nops: Vec<Addr>,
    /// Replacement encoding for the patch point.
    pub bytes: Vec<u8>,
    /// Address of the instruction being rewritten.
    pub at: Addr,
}

/// Fold a variable-level constant use into a patch plan.
///
/// `Ok(None)` means no fold was found; this is the frequent, non-error
/// outcome.
pub fn fold_var_constant<Q: IrQuery, E: Encode>(
    query: &Q,
    encoder: &E,
    idx: InstrIdx,
) -> Result<Option<PatchPlan>> {
    let Some(use_instr) = query.instr(IrLevel::Variable, idx) else {
        return Ok(None);
    };
    let Some(src) = use_instr.src() else {
        return Ok(None);
    };
    // Temporaries are never foldable.
    if matches!(src, Expr::VarSsa(ssa) if ssa.var.is_temp()) {
        debug!("use reads a temporary");
        return Ok(None);
    }
    let Some(value) = query.value_of(IrLevel::Variable, idx).as_constant() else {
        return Ok(None);
    };
    debug!(value = format_args!("{value:#x}"), "folding variable use");

    let chain = match var_chain(query, src) {
        Ok(chain) => chain,
        Err(stop) => {
            debug!(?stop, "no variable chain");
            return Ok(None);
        }
    };
    let mut defs = chain.defs;
    let Some(patch_idx) = defs.pop() else {
        return Ok(None);
    };
    let Some(patch) = query.instr(IrLevel::Variable, patch_idx) else {
        return Ok(None);
    };
    let InstrKind::SetVar { dest, .. } = &patch.kind else {
        debug!("patch point is not an assignment");
        return Ok(None);
    };

    let text = if dest.kind == VarKind::Stack {
        match query.stack_dir(patch_idx) {
            Some(StackDir::Grow) => format!("push 0x{value:x}"),
            Some(StackDir::Shrink) => format!("pop 0x{value:x}"),
            None => {
                debug!("stack write without a known direction");
                return Ok(None);
            }
        }
    } else if dest.kind != VarKind::Temp && !dest.name.is_empty() {
        format!("mov {}, 0x{value:x}", dest.name)
    } else {
        debug!("no encodable destination");
        return Ok(None);
    };
    let Some(bytes) = encode_text(encoder, &text, patch.addr)? else {
        return Ok(None);
    };

    // Remaining chain addresses oldest first, then the use site.
    let mut nops: Vec<Addr> = defs
        .iter()
        .rev()
        .filter_map(|&d| Some(query.instr(IrLevel::Variable, d)?.addr))
        .collect();
    nops.push(use_instr.addr);

    Ok(Some(PatchPlan {
        nops,
        bytes,
        at: patch.addr,
    }))
}

/// Fold a register-level constant use into a patch plan.
///
/// The rewrite always targets the full architectural register, even
/// when the use read a narrower view. The use site itself stays in
/// place.
pub fn fold_reg_constant<Q: IrQuery, E: Encode>(
    query: &Q,
    encoder: &E,
    idx: InstrIdx,
) -> Result<Option<PatchPlan>> {
    let Some(use_instr) = query.instr(IrLevel::Register, idx) else {
        return Ok(None);
    };
    let Some(src) = use_instr.src() else {
        return Ok(None);
    };
    let Some(value) = query.value_of(IrLevel::Register, idx).as_constant() else {
        return Ok(None);
    };
    debug!(value = format_args!("{value:#x}"), "folding register use");

    let chain = match reg_chain(query, src) {
        Ok(chain) => chain,
        Err(stop) => {
            debug!(?stop, "no register chain");
            return Ok(None);
        }
    };
    let Some(patch) = query.instr(IrLevel::Register, chain.patch) else {
        return Ok(None);
    };

    let text = format!("mov {}, 0x{value:x}", chain.full.reg.name);
    let Some(bytes) = encode_text(encoder, &text, patch.addr)? else {
        return Ok(None);
    };

    let nops: Vec<Addr> = chain
        .deps
        .iter()
        .rev()
        .filter_map(|&d| Some(query.instr(IrLevel::Register, d)?.addr))
        .collect();

    Ok(Some(PatchPlan {
        nops,
        bytes,
        at: patch.addr,
    }))
}

/// Encode `text`, mapping "target not encodable" to `None` and every
/// other encoder failure to a contract violation.
pub(crate) fn encode_text<E: Encode>(
    encoder: &E,
    text: &str,
    anchor: Addr,
) -> Result<Option<Vec<u8>>> {
    match encoder.encode(text, anchor) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.is_unencodable() => {
            debug!(%err, text, "no encoding");
            Ok(None)
        }
        Err(err) => Err(FoldError::Encoder(err)),
    }
}
