//! Fixed-point fold driver.
//!
//! Pops one address at a time, re-lifts the function around it, and
//! dispatches the matching fold. Every mutation re-enqueues a
//! follow-up site, so a run ends when no queued site yields a
//! mutation anymore. No-op filling is idempotent and the queue
//! deduplicates, so that fixed point is always reached.

use defuse_asm::Encode;
use defuse_fold::{FoldOutcome, WorkSink, fold_constant, fold_transfer};
use defuse_image::RawImage;
use defuse_ir::{Addr, IrFunction, IrLevel, IrQuery};
use tracing::{debug, info};

use crate::error::Result;
use crate::queue::WorkQueue;

/// Front end that disassembles the current image into the two-level
/// IR. Called before every fold attempt; the core never reads stale
/// IR.
pub trait Lift {
    fn lift(&mut self, image: &RawImage) -> IrFunction;
}

impl<F: FnMut(&RawImage) -> IrFunction> Lift for F {
    fn lift(&mut self, image: &RawImage) -> IrFunction {
        self(image)
    }
}

/// Counters for one driver run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Sites whose fold mutated the image.
    pub folds: usize,
    /// Transfers found already collapsed.
    pub resolves: usize,
    /// Sites with no opportunity or an unmet length precondition.
    pub skipped: usize,
}

/// Drives fold passes over one image until the work queue drains.
#[derive(Debug)]
pub struct Driver<L, E> {
    lifter: L,
    encoder: E,
    queue: WorkQueue,
    phase: u32,
}

impl<L: Lift, E: Encode> Driver<L, E> {
    pub fn new(lifter: L, encoder: E) -> Self {
        Self {
            lifter,
            encoder,
            queue: WorkQueue::new(),
            phase: 0,
        }
    }

    /// Queue starting addresses, typically the use sites an outer
    /// analysis flagged.
    pub fn seed(&mut self, addrs: impl IntoIterator<Item = Addr>) {
        for addr in addrs {
            self.queue.enqueue(addr);
        }
    }

    /// Move to the next analysis phase. Monotonic; phases never
    /// rewind.
    pub fn advance_phase(&mut self) {
        self.phase += 1;
    }

    pub const fn phase(&self) -> u32 {
        self.phase
    }

    /// Process the queue to exhaustion, mutating `image` in place.
    pub fn run(&mut self, image: &mut RawImage) -> Result<DriverStats> {
        let mut stats = DriverStats::default();
        while let Some(addr) = self.queue.pop() {
            let func = self.lifter.lift(image);
            let outcome = self.fold_at(&func, image, addr)?;
            match outcome {
                FoldOutcome::Mutated { .. } => stats.folds += 1,
                FoldOutcome::Resolved(_) => stats.resolves += 1,
                FoldOutcome::NoOpportunity | FoldOutcome::TooShort { .. } => {
                    stats.skipped += 1;
                }
            }
        }
        info!(?stats, "work queue drained");
        Ok(stats)
    }

    /// Classify the instruction at `addr` and run the matching fold.
    /// A value use is tried at the variable level first, then at its
    /// register-level counterpart.
    fn fold_at(
        &mut self,
        func: &IrFunction,
        image: &mut RawImage,
        addr: Addr,
    ) -> Result<FoldOutcome> {
        let Some(idx) = func.index_at(IrLevel::Variable, addr) else {
            debug!(addr = format_args!("{addr:#x}"), "no instruction at site");
            return Ok(FoldOutcome::NoOpportunity);
        };
        let is_transfer = func
            .instr(IrLevel::Variable, idx)
            .is_some_and(defuse_ir::Instr::is_transfer);
        if is_transfer {
            let out = fold_transfer(func, image, &self.encoder, &mut self.queue, idx, self.phase)?;
            return Ok(out);
        }

        let out = fold_constant(
            func,
            image,
            &self.encoder,
            &mut self.queue,
            IrLevel::Variable,
            idx,
        )?;
        if out != FoldOutcome::NoOpportunity {
            return Ok(out);
        }
        let Some(low) = func.low_level_index(idx) else {
            return Ok(FoldOutcome::NoOpportunity);
        };
        let out = fold_constant(
            func,
            image,
            &self.encoder,
            &mut self.queue,
            IrLevel::Register,
            low,
        )?;
        Ok(out)
    }
}
