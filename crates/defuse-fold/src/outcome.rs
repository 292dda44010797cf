//! Fold outcome reporting.

use defuse_asm::EncodeError;
use defuse_ir::{Addr, InstrIdx};
use defuse_image::ImageError;
use thiserror::Error;

/// Result of one fold attempt.
///
/// Unmet preconditions are values, not errors: the caller moves on to
/// the next candidate and the overall process never aborts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoldOutcome {
    /// A precondition was unmet; nothing was written. The common
    /// case.
    NoOpportunity,
    /// The replacement encoding does not fit the original
    /// instruction at `addr`; nothing was written. Reported so the
    /// driver can log and skip.
    TooShort {
        addr: Addr,
        have: usize,
        need: usize,
    },
    /// The chain was already collapsed; no mutation was needed. Holds
    /// the variable-level index of the final target.
    Resolved(InstrIdx),
    /// The image was rewritten.
    Mutated {
        /// Addresses neutralized, oldest first.
        nops: Vec<Addr>,
        /// Address of the rewritten instruction.
        patch_addr: Addr,
        /// Follow-up work handed to the sink, if any.
        queued: Option<Addr>,
    },
}

impl FoldOutcome {
    /// Check if the image was changed.
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Mutated { .. })
    }

    /// Check if the attempt succeeded, with or without mutation.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Mutated { .. })
    }
}

/// Collaborator-contract violations.
///
/// Distinct from [`FoldOutcome`]: an encoder that cannot parse a
/// synthesized mnemonic, or an image that rejects an in-bounds write,
/// is broken, not an absent opportunity.
#[derive(Error, Debug)]
pub enum FoldError {
    #[error("image rejected a patch write: {0}")]
    Image(#[from] ImageError),
    #[error("encoder rejected synthesized mnemonic: {0}")]
    Encoder(EncodeError),
}

pub type Result<T> = std::result::Result<T, FoldError>;
