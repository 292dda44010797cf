//! Operand trees.

use crate::storage::{Reg, SsaReg, SsaVar, Var};

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Operand tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Const(u64),
    /// Raw architectural register reference, not tracked by SSA.
    Reg(Reg),
    /// Full-width SSA register read.
    RegSsa(SsaReg),
    /// Narrow read of a sub-register `part`, annotated with the
    /// enclosing full SSA register.
    RegSsaPartial { full: SsaReg, part: Reg },
    /// Variable reference without SSA annotation.
    Var(Var),
    /// SSA variable read.
    VarSsa(SsaVar),
    /// Memory load through a computed address.
    Load { addr: Box<Expr>, width: u8 },
    /// Unary operation.
    Unary { op: UnaryOp, arg: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Create a memory load.
    pub fn load(addr: Self, width: u8) -> Self {
        Self::Load {
            addr: Box::new(addr),
            width,
        }
    }

    /// Create a unary operation.
    pub fn unary(op: UnaryOp, arg: Self) -> Self {
        Self::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    /// Create a binary operation.
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn xor(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Xor, lhs, rhs)
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Or, lhs, rhs)
    }

    /// Pre-order iterator over every node of this tree: the flattened
    /// operand list the chain walker scans. Depth one over the list,
    /// never recursive evaluation.
    pub fn prefix_operands(&self) -> PrefixOperands<'_> {
        PrefixOperands { stack: vec![self] }
    }

    /// The SSA variable read, if this node is one.
    pub const fn as_var_ssa(&self) -> Option<&SsaVar> {
        match self {
            Self::VarSsa(ssa) => Some(ssa),
            _ => None,
        }
    }
}

/// Pre-order traversal over an operand tree.
pub struct PrefixOperands<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for PrefixOperands<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        match node {
            Expr::Load { addr: child, .. } | Expr::Unary { arg: child, .. } => {
                self.stack.push(child);
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.stack.push(rhs);
                self.stack.push(lhs);
            }
            _ => {}
        }
        Some(node)
    }
}
