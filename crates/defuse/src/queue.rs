//! Re-analysis work queue.

use std::collections::VecDeque;

use defuse_fold::WorkSink;
use defuse_ir::Addr;
use rustc_hash::FxHashSet;

/// FIFO of addresses awaiting re-analysis.
///
/// An address already pending is not enqueued twice; once popped it
/// may be enqueued again, since a later mutation can make the same
/// site foldable.
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: VecDeque<Addr>,
    queued: FxHashSet<Addr>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest pending address.
    pub fn pop(&mut self) -> Option<Addr> {
        let addr = self.pending.pop_front()?;
        self.queued.remove(&addr);
        Some(addr)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl WorkSink for WorkQueue {
    fn enqueue(&mut self, addr: Addr) {
        if self.queued.insert(addr) {
            self.pending.push_back(addr);
        }
    }
}
