//! Patch dispatch.
//!
//! Turns fold plans into ordered image mutations and reports the
//! outcome. All writes happen here; the folders and walkers never
//! touch the image.

use defuse_asm::Encode;
use defuse_image::{ImageError, PatchImage};
use defuse_ir::{InstrIdx, IrLevel, IrQuery};
use tracing::{debug, info, warn};

use crate::constant::{PatchPlan, encode_text, fold_reg_constant, fold_var_constant};
use crate::outcome::{FoldError, FoldOutcome, Result};
use crate::transfer::{TransferFold, resolve_transfer};
use crate::WorkSink;

/// Attempt a constant chain fold at the instruction `idx` of `level`.
pub fn fold_constant<Q, I, E, S>(
    query: &Q,
    image: &mut I,
    encoder: &E,
    sink: &mut S,
    level: IrLevel,
    idx: InstrIdx,
) -> Result<FoldOutcome>
where
    Q: IrQuery,
    I: PatchImage,
    E: Encode,
    S: WorkSink,
{
    let plan = match level {
        IrLevel::Variable => fold_var_constant(query, encoder, idx)?,
        IrLevel::Register => fold_reg_constant(query, encoder, idx)?,
    };
    match plan {
        Some(plan) => apply(image, sink, plan),
        None => Ok(FoldOutcome::NoOpportunity),
    }
}

/// Attempt a transfer chain fold at the variable-level instruction
/// `idx`.
pub fn fold_transfer<Q, I, E, S>(
    query: &Q,
    image: &mut I,
    encoder: &E,
    sink: &mut S,
    idx: InstrIdx,
    phase: u32,
) -> Result<FoldOutcome>
where
    Q: IrQuery,
    I: PatchImage,
    E: Encode,
    S: WorkSink,
{
    let (at, target) = match resolve_transfer(query, idx, phase) {
        TransferFold::NoOpportunity => return Ok(FoldOutcome::NoOpportunity),
        TransferFold::Resolved(high) => return Ok(FoldOutcome::Resolved(high)),
        TransferFold::Rewrite { at, target } => (at, target),
    };

    let text = format!("jmp 0x{target:x}");
    let Some(bytes) = encode_text(encoder, &text, at)? else {
        return Ok(FoldOutcome::NoOpportunity);
    };
    let Some(have) = image.instr_len(at) else {
        return Err(FoldError::Image(ImageError::NoBoundary(at)));
    };
    if bytes.len() > have {
        // A jump that does not fit is just a transfer left alone.
        debug!(
            at = format_args!("{at:#x}"),
            have,
            need = bytes.len(),
            "folded jump does not fit"
        );
        return Ok(FoldOutcome::NoOpportunity);
    }

    image.fill_nop(at)?;
    image.write(at, &bytes)?;
    sink.enqueue(target);
    info!(
        at = format_args!("{at:#x}"),
        target = format_args!("{target:#x}"),
        "transfer chain folded"
    );
    Ok(FoldOutcome::Mutated {
        nops: Vec::new(),
        patch_addr: at,
        queued: Some(target),
    })
}

/// Carry out a patch plan: no-ops first, oldest to youngest, then the
/// rewrite. The patch slot is no-op filled before the shorter
/// replacement lands so no stale tail bytes survive.
fn apply<I: PatchImage, S: WorkSink>(
    image: &mut I,
    sink: &mut S,
    plan: PatchPlan,
) -> Result<FoldOutcome> {
    let Some(have) = image.instr_len(plan.at) else {
        return Err(FoldError::Image(ImageError::NoBoundary(plan.at)));
    };
    if plan.bytes.len() > have {
        warn!(
            at = format_args!("{:#x}", plan.at),
            have,
            need = plan.bytes.len(),
            "replacement longer than patched instruction"
        );
        return Ok(FoldOutcome::TooShort {
            addr: plan.at,
            have,
            need: plan.bytes.len(),
        });
    }

    for &addr in &plan.nops {
        image.fill_nop(addr)?;
    }
    image.fill_nop(plan.at)?;
    image.write(plan.at, &plan.bytes)?;

    let queued = plan.nops.first().copied();
    if let Some(addr) = queued {
        sink.enqueue(addr);
    }
    info!(
        at = format_args!("{:#x}", plan.at),
        nops = plan.nops.len(),
        "constant chain folded"
    );
    Ok(FoldOutcome::Mutated {
        nops: plan.nops,
        patch_addr: plan.at,
        queued,
    })
}
