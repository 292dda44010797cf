//! Two-level instruction IR.

use crate::expr::Expr;
use crate::storage::{Addr, InstrIdx, Reg, SsaReg, SsaVar, Var};

/// The two IR levels the folding passes operate on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrLevel {
    /// Architectural registers, partial-width writes visible.
    Register,
    /// Named variables, stack slots abstracted.
    Variable,
}

/// Instruction kinds across both levels.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrKind {
    /// Variable-level assignment `dest := src`.
    SetVar {
        dest: Var,
        ssa_dest: Option<SsaVar>,
        src: Expr,
    },
    /// Register-level assignment `dest := src`.
    SetReg {
        dest: Reg,
        ssa_dest: Option<SsaReg>,
        src: Expr,
    },
    /// Partial-width register write: only the narrow sub-register
    /// `dest` changes, the rest of the architectural register keeps
    /// its earlier value.
    SetRegPartial {
        dest: Reg,
        ssa_dest: Option<SsaReg>,
        src: Expr,
    },
    /// Push of a value onto the stack; a value use site.
    Push { src: Expr },
    /// Unconditional direct transfer to another instruction of the
    /// same level.
    Goto { target: InstrIdx },
    /// Unconditional transfer through a computed destination.
    JumpIndirect { dest: Expr },
    /// No operation. Patched-out slots decode to this.
    Nop,
}

/// One immutable IR instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    pub addr: Addr,
    pub kind: InstrKind,
}

impl Instr {
    /// Create an instruction at `addr`.
    pub const fn new(addr: Addr, kind: InstrKind) -> Self {
        Self { addr, kind }
    }

    /// Source operand tree feeding this instruction, if it has one.
    /// For indirect transfers this is the destination expression.
    pub const fn src(&self) -> Option<&Expr> {
        match &self.kind {
            InstrKind::SetVar { src, .. }
            | InstrKind::SetReg { src, .. }
            | InstrKind::SetRegPartial { src, .. }
            | InstrKind::Push { src } => Some(src),
            InstrKind::JumpIndirect { dest } => Some(dest),
            InstrKind::Goto { .. } | InstrKind::Nop => None,
        }
    }

    /// Check if this is an unconditional direct transfer.
    pub const fn is_goto(&self) -> bool {
        matches!(self.kind, InstrKind::Goto { .. })
    }

    /// Check if this is an indirect transfer.
    pub const fn is_indirect_jump(&self) -> bool {
        matches!(self.kind, InstrKind::JumpIndirect { .. })
    }

    /// Check if this is any unconditional transfer.
    pub const fn is_transfer(&self) -> bool {
        self.is_goto() || self.is_indirect_jump()
    }

    /// Check if this writes only a narrow sub-register.
    pub const fn is_partial_write(&self) -> bool {
        matches!(self.kind, InstrKind::SetRegPartial { .. })
    }

    /// Check if this is a no-op.
    pub const fn is_nop(&self) -> bool {
        matches!(self.kind, InstrKind::Nop)
    }
}
