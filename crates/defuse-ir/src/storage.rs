//! Storage locations and SSA values.

/// Byte address in the binary image.
pub type Addr = u64;

/// Index of an instruction within one IR level's instruction list.
pub type InstrIdx = usize;

/// First synthetic identifier used for analysis temporaries.
pub const TEMP_ID_BASE: u64 = 0x8000_0000;

/// Architectural register description.
///
/// Sub-registers carry their own `index` plus the `full` index of the
/// register they are a narrower view of; full registers have
/// `index == full`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reg {
    /// Name as it appears in mnemonic text.
    pub name: &'static str,
    /// Index in the architecture's register file.
    pub index: u16,
    /// Index of the enclosing full-width register.
    pub full: u16,
    /// Width in bytes.
    pub width: u8,
}

impl Reg {
    /// Create a full-width register.
    pub const fn full_width(name: &'static str, index: u16, width: u8) -> Self {
        Self {
            name,
            index,
            full: index,
            width,
        }
    }

    /// Create a sub-register view of the full register `full`.
    pub const fn sub(name: &'static str, index: u16, full: u16, width: u8) -> Self {
        Self {
            name,
            index,
            full,
            width,
        }
    }

    /// Check if this register is a narrower view of a full register.
    pub const fn is_sub(&self) -> bool {
        self.index != self.full
    }
}

/// Where a variable lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Backed by an architectural register.
    Register,
    /// Stack-relative slot.
    Stack,
    /// Analysis temporary. Never a fold target.
    Temp,
}

/// A named variable at the variable IR level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Var {
    /// Display name, usable in mnemonic text for register-backed vars.
    pub name: String,
    pub kind: VarKind,
    /// Storage slot id. Temporaries use ids at or above [`TEMP_ID_BASE`].
    pub id: u64,
}

impl Var {
    /// Create a register-backed variable.
    pub fn register(name: &str, id: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: VarKind::Register,
            id,
        }
    }

    /// Create a stack-relative variable.
    pub fn stack(name: &str, id: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: VarKind::Stack,
            id,
        }
    }

    /// Create an analysis temporary with the given serial.
    pub fn temp(serial: u64) -> Self {
        Self {
            name: format!("temp{serial}"),
            kind: VarKind::Temp,
            id: TEMP_ID_BASE + serial,
        }
    }

    /// Check if this is a temporary (synthetic out-of-range id).
    pub const fn is_temp(&self) -> bool {
        matches!(self.kind, VarKind::Temp) || self.id >= TEMP_ID_BASE
    }

    /// Check if two variables name the same storage, ignoring SSA
    /// versions entirely.
    pub fn same_storage(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// A versioned SSA binding of a variable to its unique definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SsaVar {
    pub var: Var,
    pub version: u32,
}

impl SsaVar {
    /// Create an SSA variable binding.
    pub const fn new(var: Var, version: u32) -> Self {
        Self { var, version }
    }
}

/// A versioned SSA binding of a register to its unique definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SsaReg {
    pub reg: Reg,
    pub version: u32,
}

impl SsaReg {
    /// Create an SSA register binding.
    pub const fn new(reg: Reg, version: u32) -> Self {
        Self { reg, version }
    }
}
