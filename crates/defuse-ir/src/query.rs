//! Query surface contract over a function's two-level IR.

use crate::instr::{Instr, IrLevel};
use crate::storage::{Addr, InstrIdx, SsaReg, SsaVar};

/// Verdict of the external value analysis for an instruction's source
/// operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    /// Not a compile-time constant.
    Unknown,
    /// Definite integer.
    Constant(u64),
    /// Definite pointer into the image.
    ConstPtr(u64),
}

impl Value {
    /// The constant integer, if the value is definite.
    pub const fn as_constant(self) -> Option<u64> {
        match self {
            Self::Constant(v) | Self::ConstPtr(v) => Some(v),
            Self::Unknown => None,
        }
    }

    /// The constant pointer, if the value is one.
    pub const fn as_const_ptr(self) -> Option<u64> {
        match self {
            Self::ConstPtr(v) => Some(v),
            _ => None,
        }
    }
}

/// Reaching-definition lookup result.
///
/// Exactly one definition per SSA value is an invariant of the query
/// surface. `Ambiguous` reports a violation of that invariant; callers
/// must back off rather than pick a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaching {
    /// The unique defining instruction.
    Unique(InstrIdx),
    /// More than one definition reaches the use.
    Ambiguous,
    /// No definition is known.
    Missing,
}

/// Low-level stack-pointer effect of a stack-destination write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackDir {
    /// Stack pointer decremented; push-like.
    Grow,
    /// Stack pointer incremented; pop-like.
    Shrink,
}

/// Read-only IR queries the folding passes rely on.
///
/// Implementations hand out immutable per-call views; the folds never
/// cache anything across calls, so a query surface may be rebuilt
/// freely between invocations.
pub trait IrQuery {
    /// Instruction by per-level index.
    fn instr(&self, level: IrLevel, idx: InstrIdx) -> Option<&Instr>;

    /// Index of the instruction at `addr`, per level.
    fn index_at(&self, level: IrLevel, addr: Addr) -> Option<InstrIdx>;

    /// Reaching definition of an SSA variable.
    fn var_def(&self, ssa: &SsaVar) -> Reaching;

    /// Reaching definition of an SSA register.
    fn reg_def(&self, ssa: &SsaReg) -> Reaching;

    /// Number of uses of an SSA register across the whole function.
    fn reg_use_count(&self, ssa: &SsaReg) -> usize;

    /// Value-analysis verdict for the source operand of the
    /// instruction at `idx`.
    fn value_of(&self, level: IrLevel, idx: InstrIdx) -> Value;

    /// Register-level counterpart of a variable-level instruction.
    fn low_level_index(&self, idx: InstrIdx) -> Option<InstrIdx>;

    /// Variable-level counterpart of a register-level instruction.
    fn high_level_index(&self, idx: InstrIdx) -> Option<InstrIdx>;

    /// Stack-pointer direction of the variable-level write at `idx`,
    /// when its destination is a stack slot.
    fn stack_dir(&self, idx: InstrIdx) -> Option<StackDir>;
}
