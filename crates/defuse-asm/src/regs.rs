//! x86-64 general-purpose register descriptions.
//!
//! Indices follow hardware encoding order for the full registers;
//! narrower views get their own index ranges so a sub-register never
//! aliases a full register's index.

use defuse_ir::Reg;

/// Index base of the 32-bit views.
pub const SUB32_BASE: u16 = 16;
/// Index base of the 16-bit views.
pub const SUB16_BASE: u16 = 32;
/// Index base of the low 8-bit views.
pub const SUB8_BASE: u16 = 48;

pub const RAX: Reg = Reg::full_width("rax", 0, 8);
pub const RCX: Reg = Reg::full_width("rcx", 1, 8);
pub const RDX: Reg = Reg::full_width("rdx", 2, 8);
pub const RBX: Reg = Reg::full_width("rbx", 3, 8);
pub const RSP: Reg = Reg::full_width("rsp", 4, 8);
pub const RBP: Reg = Reg::full_width("rbp", 5, 8);
pub const RSI: Reg = Reg::full_width("rsi", 6, 8);
pub const RDI: Reg = Reg::full_width("rdi", 7, 8);
pub const R8: Reg = Reg::full_width("r8", 8, 8);
pub const R9: Reg = Reg::full_width("r9", 9, 8);
pub const R10: Reg = Reg::full_width("r10", 10, 8);
pub const R11: Reg = Reg::full_width("r11", 11, 8);
pub const R12: Reg = Reg::full_width("r12", 12, 8);
pub const R13: Reg = Reg::full_width("r13", 13, 8);
pub const R14: Reg = Reg::full_width("r14", 14, 8);
pub const R15: Reg = Reg::full_width("r15", 15, 8);

pub const EAX: Reg = Reg::sub("eax", SUB32_BASE, 0, 4);
pub const ECX: Reg = Reg::sub("ecx", SUB32_BASE + 1, 1, 4);
pub const EDX: Reg = Reg::sub("edx", SUB32_BASE + 2, 2, 4);
pub const EBX: Reg = Reg::sub("ebx", SUB32_BASE + 3, 3, 4);

pub const AX: Reg = Reg::sub("ax", SUB16_BASE, 0, 2);
pub const CX: Reg = Reg::sub("cx", SUB16_BASE + 1, 1, 2);
pub const DX: Reg = Reg::sub("dx", SUB16_BASE + 2, 2, 2);

pub const AL: Reg = Reg::sub("al", SUB8_BASE, 0, 1);
pub const CL: Reg = Reg::sub("cl", SUB8_BASE + 1, 1, 1);
pub const DL: Reg = Reg::sub("dl", SUB8_BASE + 2, 2, 1);

const TABLE: &[Reg] = &[
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI, R8, R9, R10, R11, R12, R13, R14, R15, EAX, ECX, EDX,
    EBX, AX, CX, DX, AL, CL, DL,
];

/// Look up a register description by name.
pub fn reg_named(name: &str) -> Option<Reg> {
    TABLE.iter().copied().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(reg_named("rax"), Some(RAX));
        assert_eq!(reg_named("eax"), Some(EAX));
        assert!(reg_named("xmm0").is_none());
    }

    #[test]
    fn test_sub_view_identity() {
        assert_eq!(EAX.full, RAX.index);
        assert_eq!(AL.full, RAX.index);
        assert_ne!(EAX.index, RAX.index);
    }
}
