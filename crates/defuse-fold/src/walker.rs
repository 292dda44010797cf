//! Definition-use chain discovery.
//!
//! Walks backward from an SSA use through the definitions feeding it,
//! staying on one storage identity. Each step is a depth-one scan of
//! the current definition's flattened operand list, never recursive
//! expression evaluation.

use defuse_ir::{Expr, Instr, InstrIdx, IrLevel, IrQuery, Reaching, Reg, SsaReg};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// Why a walk produced no chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoChain {
    /// The use has no SSA form. A normal non-opportunity.
    NotApplicable,
    /// The query surface reported more than one reaching definition;
    /// the walker backs off rather than pick one.
    Ambiguous,
    /// The chain hit a step that cannot be collapsed.
    Broken,
}

/// Variable-level dependency chain: every definition feeding the use,
/// youngest first. The oldest entry is the definition whose source no
/// longer references the variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarChain {
    pub defs: Vec<InstrIdx>,
}

/// Register-level dependency chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegChain {
    /// Definitions stepped through, youngest first.
    pub deps: Vec<InstrIdx>,
    /// The chain-terminating definition; the rewrite target.
    pub patch: InstrIdx,
    /// The full architectural register the use reads.
    pub full: SsaReg,
}

fn unique(reaching: Reaching) -> Result<InstrIdx, NoChain> {
    match reaching {
        Reaching::Unique(idx) => Ok(idx),
        Reaching::Ambiguous => Err(NoChain::Ambiguous),
        Reaching::Missing => Err(NoChain::NotApplicable),
    }
}

/// Walk the definitions feeding a variable-level SSA use.
///
/// Follows the reaching definition of the same underlying variable
/// identity (version ignored) found among each definition's operands,
/// stopping at the first definition that no longer references it.
pub fn var_chain<Q: IrQuery>(query: &Q, use_src: &Expr) -> Result<VarChain, NoChain> {
    let Expr::VarSsa(use_ssa) = use_src else {
        return Err(NoChain::NotApplicable);
    };
    let mut cur = unique(query.var_def(use_ssa))?;
    debug!(def = cur, var = %use_ssa.var.name, "variable defined");

    let mut defs = vec![cur];
    let mut seen: FxHashSet<InstrIdx> = FxHashSet::default();
    seen.insert(cur);

    loop {
        let Some(src) = query.instr(IrLevel::Variable, cur).and_then(Instr::src) else {
            break;
        };
        let same = src.prefix_operands().find_map(|op| match op {
            Expr::VarSsa(ssa) if ssa.var.same_storage(&use_ssa.var) => Some(ssa),
            _ => None,
        });
        let Some(ssa) = same else {
            break;
        };
        cur = unique(query.var_def(ssa))?;
        if !seen.insert(cur) {
            debug!("definition cycle");
            return Err(NoChain::Broken);
        }
        trace!(def = cur, "following definition");
        defs.push(cur);
    }
    Ok(VarChain { defs })
}

/// Walk the definitions feeding a register-level SSA use.
///
/// A full-register read walks on single-use predecessors of the same
/// architectural identity. A sub-register read additionally tracks a
/// raw anchor: a non-SSA reference with the narrow index. When both
/// appear in one definition, the walk continues only if the
/// predecessor's definition is itself a partial-width write; this is
/// a heuristic for one observed compiler pattern, not an identity
/// law, and anything else breaks the chain.
pub fn reg_chain<Q: IrQuery>(query: &Q, use_src: &Expr) -> Result<RegChain, NoChain> {
    let (full, part): (SsaReg, Option<Reg>) = match use_src {
        Expr::RegSsa(ssa) => (*ssa, None),
        Expr::RegSsaPartial { full, part } => (*full, Some(*part)),
        _ => return Err(NoChain::NotApplicable),
    };
    let arch = full.reg.full;
    let mut cur = unique(query.reg_def(&full))?;
    debug!(def = cur, reg = full.reg.name, "register defined");

    let mut deps = Vec::new();
    let mut seen: FxHashSet<InstrIdx> = FxHashSet::default();
    seen.insert(cur);

    loop {
        let Some(src) = query.instr(IrLevel::Register, cur).and_then(Instr::src) else {
            break;
        };

        let anchored = part.is_some_and(|p| {
            src.prefix_operands()
                .any(|op| matches!(op, Expr::Reg(r) if r.index == p.index))
        });
        let pred = src.prefix_operands().find_map(|op| match op {
            Expr::RegSsa(ssa) if ssa.reg.full == arch && query.reg_use_count(ssa) == 1 => {
                Some(*ssa)
            }
            _ => None,
        });

        // No predecessor: the current definition is the patch point.
        let Some(pred) = pred else {
            break;
        };
        let next = unique(query.reg_def(&pred))?;
        if anchored {
            let partial = query
                .instr(IrLevel::Register, next)
                .is_some_and(Instr::is_partial_write);
            if !partial {
                debug!("anchored predecessor is not a partial write");
                return Err(NoChain::Broken);
            }
        }
        if !seen.insert(next) {
            debug!("definition cycle");
            return Err(NoChain::Broken);
        }
        trace!(def = next, "following predecessor");
        deps.push(cur);
        cur = next;
    }
    Ok(RegChain { deps, patch: cur, full })
}

#[cfg(test)]
mod tests {
    use super::*;
    use defuse_asm::{EAX, RAX};
    use defuse_ir::{FunctionBuilder, InstrKind, SsaVar, Var};

    fn set_var(dest: &SsaVar, src: Expr) -> InstrKind {
        InstrKind::SetVar {
            dest: dest.var.clone(),
            ssa_dest: Some(dest.clone()),
            src,
        }
    }

    #[test]
    fn test_var_chain_walks_to_terminating_def() {
        let mut b = FunctionBuilder::new();
        let v = Var::stack("var_8", 8);
        let v1 = SsaVar::new(v.clone(), 1);
        let v2 = SsaVar::new(v.clone(), 2);

        let d0 = b.var_instr(0x1000, set_var(&v1, Expr::Const(5)));
        let d1 = b.var_instr(
            0x1007,
            set_var(&v2, Expr::add(Expr::VarSsa(v1), Expr::Const(0))),
        );
        b.var_instr(
            0x100b,
            InstrKind::Push {
                src: Expr::VarSsa(v2.clone()),
            },
        );
        let func = b.build();

        let chain = var_chain(&func, &Expr::VarSsa(v2)).unwrap();
        assert_eq!(chain.defs, vec![d1, d0]);
    }

    #[test]
    fn test_var_chain_requires_ssa_form() {
        let func = FunctionBuilder::new().build();
        let err = var_chain(&func, &Expr::Const(5)).unwrap_err();
        assert_eq!(err, NoChain::NotApplicable);
    }

    #[test]
    fn test_var_chain_reports_ambiguity() {
        let mut b = FunctionBuilder::new();
        let v1 = SsaVar::new(Var::register("rbx", 3), 1);
        b.var_instr(0x2000, set_var(&v1, Expr::Const(1)));
        b.var_instr(0x2007, set_var(&v1, Expr::Const(2)));
        let func = b.build();

        let err = var_chain(&func, &Expr::VarSsa(v1)).unwrap_err();
        assert_eq!(err, NoChain::Ambiguous);
    }

    #[test]
    fn test_reg_chain_single_use_predecessors() {
        let mut b = FunctionBuilder::new();
        let rax1 = SsaReg::new(RAX, 1);
        let rax2 = SsaReg::new(RAX, 2);

        let d0 = b.reg_instr(
            0x1000,
            InstrKind::SetReg {
                dest: RAX,
                ssa_dest: Some(rax1),
                src: Expr::Const(5),
            },
        );
        let d1 = b.reg_instr(
            0x1007,
            InstrKind::SetReg {
                dest: RAX,
                ssa_dest: Some(rax2),
                src: Expr::add(Expr::RegSsa(rax1), Expr::Const(0)),
            },
        );
        b.reg_instr(
            0x100b,
            InstrKind::Push {
                src: Expr::RegSsa(rax2),
            },
        );
        let func = b.build();

        let chain = reg_chain(&func, &Expr::RegSsa(rax2)).unwrap();
        assert_eq!(chain.deps, vec![d1]);
        assert_eq!(chain.patch, d0);
        assert_eq!(chain.full, rax2);
    }

    #[test]
    fn test_reg_chain_stops_on_multi_use_predecessor() {
        let mut b = FunctionBuilder::new();
        let rax1 = SsaReg::new(RAX, 1);
        let rax2 = SsaReg::new(RAX, 2);

        b.reg_instr(
            0x1000,
            InstrKind::SetReg {
                dest: RAX,
                ssa_dest: Some(rax1),
                src: Expr::Const(5),
            },
        );
        let d1 = b.reg_instr(
            0x1007,
            InstrKind::SetReg {
                dest: RAX,
                ssa_dest: Some(rax2),
                src: Expr::add(Expr::RegSsa(rax1), Expr::Const(0)),
            },
        );
        // Second use of rax1 makes it multi-use.
        b.reg_instr(
            0x100b,
            InstrKind::Push {
                src: Expr::RegSsa(rax1),
            },
        );
        b.reg_instr(
            0x100c,
            InstrKind::Push {
                src: Expr::RegSsa(rax2),
            },
        );
        let func = b.build();

        let chain = reg_chain(&func, &Expr::RegSsa(rax2)).unwrap();
        assert!(chain.deps.is_empty());
        assert_eq!(chain.patch, d1);
    }

    #[test]
    fn test_reg_chain_anchor_breaks_on_full_write() {
        let mut b = FunctionBuilder::new();
        let rax1 = SsaReg::new(RAX, 1);
        let rax2 = SsaReg::new(RAX, 2);

        // Full-width write feeding an anchored partial step.
        b.reg_instr(
            0x1000,
            InstrKind::SetReg {
                dest: RAX,
                ssa_dest: Some(rax1),
                src: Expr::Const(5),
            },
        );
        b.reg_instr(
            0x1007,
            InstrKind::SetRegPartial {
                dest: EAX,
                ssa_dest: Some(rax2),
                src: Expr::add(Expr::Reg(EAX), Expr::RegSsa(rax1)),
            },
        );
        b.reg_instr(
            0x100b,
            InstrKind::Push {
                src: Expr::RegSsaPartial {
                    full: rax2,
                    part: EAX,
                },
            },
        );
        let func = b.build();

        let err = reg_chain(
            &func,
            &Expr::RegSsaPartial {
                full: rax2,
                part: EAX,
            },
        )
        .unwrap_err();
        assert_eq!(err, NoChain::Broken);
    }

    #[test]
    fn test_reg_chain_anchor_continues_through_partial_writes() {
        let mut b = FunctionBuilder::new();
        let rax1 = SsaReg::new(RAX, 1);
        let rax2 = SsaReg::new(RAX, 2);
        let rax3 = SsaReg::new(RAX, 3);

        let d0 = b.reg_instr(
            0x1000,
            InstrKind::SetRegPartial {
                dest: EAX,
                ssa_dest: Some(rax1),
                src: Expr::Const(7),
            },
        );
        let d1 = b.reg_instr(
            0x1006,
            InstrKind::SetRegPartial {
                dest: EAX,
                ssa_dest: Some(rax2),
                src: Expr::add(Expr::Reg(EAX), Expr::RegSsa(rax1)),
            },
        );
        let d2 = b.reg_instr(
            0x100c,
            InstrKind::SetRegPartial {
                dest: EAX,
                ssa_dest: Some(rax3),
                src: Expr::xor(Expr::Reg(EAX), Expr::RegSsa(rax2)),
            },
        );
        b.reg_instr(
            0x1012,
            InstrKind::Push {
                src: Expr::RegSsaPartial {
                    full: rax3,
                    part: EAX,
                },
            },
        );
        let func = b.build();

        let chain = reg_chain(
            &func,
            &Expr::RegSsaPartial {
                full: rax3,
                part: EAX,
            },
        )
        .unwrap();
        assert_eq!(chain.deps, vec![d2, d1]);
        assert_eq!(chain.patch, d0);
    }
}
