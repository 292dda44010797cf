//! In-memory query surface implementation.

use rustc_hash::FxHashMap;

use crate::expr::Expr;
use crate::instr::{Instr, InstrKind, IrLevel};
use crate::query::{IrQuery, Reaching, StackDir, Value};
use crate::storage::{Addr, InstrIdx, SsaReg, SsaVar};

/// A function's two-level IR with derived SSA tables.
///
/// Front ends that lift real binaries can implement [`IrQuery`]
/// directly; this concrete form exists for drivers and tests that
/// assemble IR by hand.
#[derive(Debug, Default)]
pub struct IrFunction {
    reg_instrs: Vec<Instr>,
    var_instrs: Vec<Instr>,
    reg_by_addr: FxHashMap<Addr, InstrIdx>,
    var_by_addr: FxHashMap<Addr, InstrIdx>,
    var_defs: FxHashMap<SsaVar, Vec<InstrIdx>>,
    reg_defs: FxHashMap<SsaReg, Vec<InstrIdx>>,
    reg_uses: FxHashMap<SsaReg, usize>,
    values: FxHashMap<(IrLevel, InstrIdx), Value>,
    to_low: FxHashMap<InstrIdx, InstrIdx>,
    to_high: FxHashMap<InstrIdx, InstrIdx>,
    stack_dirs: FxHashMap<InstrIdx, StackDir>,
}

impl IrFunction {
    /// Number of instructions at `level`.
    pub fn len(&self, level: IrLevel) -> usize {
        self.instrs(level).len()
    }

    /// Check if the level holds no instructions.
    pub fn is_empty(&self, level: IrLevel) -> bool {
        self.instrs(level).is_empty()
    }

    fn instrs(&self, level: IrLevel) -> &[Instr] {
        match level {
            IrLevel::Register => &self.reg_instrs,
            IrLevel::Variable => &self.var_instrs,
        }
    }
}

impl IrQuery for IrFunction {
    fn instr(&self, level: IrLevel, idx: InstrIdx) -> Option<&Instr> {
        self.instrs(level).get(idx)
    }

    fn index_at(&self, level: IrLevel, addr: Addr) -> Option<InstrIdx> {
        match level {
            IrLevel::Register => self.reg_by_addr.get(&addr).copied(),
            IrLevel::Variable => self.var_by_addr.get(&addr).copied(),
        }
    }

    fn var_def(&self, ssa: &SsaVar) -> Reaching {
        reaching(self.var_defs.get(ssa))
    }

    fn reg_def(&self, ssa: &SsaReg) -> Reaching {
        reaching(self.reg_defs.get(ssa))
    }

    fn reg_use_count(&self, ssa: &SsaReg) -> usize {
        self.reg_uses.get(ssa).copied().unwrap_or(0)
    }

    fn value_of(&self, level: IrLevel, idx: InstrIdx) -> Value {
        self.values
            .get(&(level, idx))
            .copied()
            .unwrap_or(Value::Unknown)
    }

    fn low_level_index(&self, idx: InstrIdx) -> Option<InstrIdx> {
        self.to_low.get(&idx).copied()
    }

    fn high_level_index(&self, idx: InstrIdx) -> Option<InstrIdx> {
        self.to_high.get(&idx).copied()
    }

    fn stack_dir(&self, idx: InstrIdx) -> Option<StackDir> {
        self.stack_dirs.get(&idx).copied()
    }
}

fn reaching(defs: Option<&Vec<InstrIdx>>) -> Reaching {
    match defs.map(Vec::as_slice) {
        None | Some([]) => Reaching::Missing,
        Some([idx]) => Reaching::Unique(*idx),
        Some(_) => Reaching::Ambiguous,
    }
}

/// Builder assembling an [`IrFunction`], deriving SSA definition and
/// use-count tables from the pushed instructions.
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    func: IrFunction,
}

impl FunctionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a register-level instruction, returning its index.
    pub fn reg_instr(&mut self, addr: Addr, kind: InstrKind) -> InstrIdx {
        let idx = self.func.reg_instrs.len();
        match &kind {
            InstrKind::SetReg {
                ssa_dest: Some(dest),
                ..
            }
            | InstrKind::SetRegPartial {
                ssa_dest: Some(dest),
                ..
            } => {
                self.func.reg_defs.entry(*dest).or_default().push(idx);
            }
            _ => {}
        }
        let instr = Instr::new(addr, kind);
        if let Some(src) = instr.src() {
            self.count_reg_uses(src);
        }
        self.func.reg_by_addr.insert(addr, idx);
        self.func.reg_instrs.push(instr);
        idx
    }

    /// Append a variable-level instruction, returning its index.
    pub fn var_instr(&mut self, addr: Addr, kind: InstrKind) -> InstrIdx {
        let idx = self.func.var_instrs.len();
        if let InstrKind::SetVar {
            ssa_dest: Some(dest),
            ..
        } = &kind
        {
            self.func
                .var_defs
                .entry(dest.clone())
                .or_default()
                .push(idx);
        }
        self.func.var_by_addr.insert(addr, idx);
        self.func.var_instrs.push(Instr::new(addr, kind));
        idx
    }

    /// Link a variable-level instruction to its register-level
    /// counterpart.
    pub fn link(&mut self, var_idx: InstrIdx, reg_idx: InstrIdx) {
        self.func.to_low.insert(var_idx, reg_idx);
        self.func.to_high.insert(reg_idx, var_idx);
    }

    /// Record the value-analysis verdict for an instruction.
    pub fn value(&mut self, level: IrLevel, idx: InstrIdx, value: Value) {
        self.func.values.insert((level, idx), value);
    }

    /// Record the low-level stack direction of a variable-level write.
    pub fn stack_dir(&mut self, idx: InstrIdx, dir: StackDir) {
        self.func.stack_dirs.insert(idx, dir);
    }

    /// Finish building.
    pub fn build(self) -> IrFunction {
        self.func
    }

    fn count_reg_uses(&mut self, src: &Expr) {
        for op in src.prefix_operands() {
            match op {
                Expr::RegSsa(ssa) => {
                    *self.func.reg_uses.entry(*ssa).or_insert(0) += 1;
                }
                Expr::RegSsaPartial { full, .. } => {
                    *self.func.reg_uses.entry(*full).or_insert(0) += 1;
                }
                _ => {}
            }
        }
    }
}
