//! x86-64 encoder for the mnemonics the folding passes emit.

use defuse_ir::Addr;

use crate::{Encode, EncodeError};

const REX_W: u8 = 0x48;
const REX_B: u8 = 0x41;

/// Hardware encoding order of the full general-purpose registers.
const GP64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];

const GP32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];

/// Encoder for `mov reg, imm` / `push imm` / `pop reg` / `jmp addr` /
/// `nop` on x86-64. Chooses the shortest form; the patch dispatcher
/// separately verifies the result fits the slot being rewritten.
#[derive(Clone, Copy, Debug, Default)]
pub struct X86Encoder;

impl X86Encoder {
    /// Create an encoder.
    pub const fn new() -> Self {
        Self
    }
}

impl Encode for X86Encoder {
    fn encode(&self, text: &str, anchor: Addr) -> Result<Vec<u8>, EncodeError> {
        let trimmed = text.trim();
        let (mnemonic, rest) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(m, r)| (m, r.trim()));

        match mnemonic {
            "nop" => Ok(vec![0x90]),
            "mov" => {
                let (dst, imm) = rest
                    .split_once(',')
                    .ok_or_else(|| EncodeError::Parse(text.to_string()))?;
                let value = parse_imm(imm.trim(), text)?;
                mov_reg_imm(dst.trim(), value)
            }
            "push" => {
                let value = parse_imm(rest, text)?;
                push_imm(value)
            }
            "pop" => {
                if parse_imm(rest, text).is_ok() {
                    // No pop-immediate exists on x86.
                    return Err(EncodeError::NoEncoding(text.to_string()));
                }
                pop_reg(rest)
            }
            "jmp" => {
                let target = parse_imm(rest, text)?;
                jmp_rel(target, anchor)
            }
            _ => Err(EncodeError::Parse(text.to_string())),
        }
    }
}

fn parse_imm(s: &str, whole: &str) -> Result<u64, EncodeError> {
    let parse = |t: &str| {
        t.strip_prefix("0x").map_or_else(
            || t.parse::<u64>().ok(),
            |hex| u64::from_str_radix(hex, 16).ok(),
        )
    };
    if let Some(neg) = s.strip_prefix('-') {
        return parse(neg)
            .map(|v| v.wrapping_neg())
            .ok_or_else(|| EncodeError::Parse(whole.to_string()));
    }
    parse(s).ok_or_else(|| EncodeError::Parse(whole.to_string()))
}

fn gp_index(table: &[&str; 16], name: &str) -> Option<u8> {
    table.iter().position(|&r| r == name).map(|i| i as u8)
}

#[allow(clippy::cast_possible_wrap)]
fn mov_reg_imm(dst: &str, value: u64) -> Result<Vec<u8>, EncodeError> {
    if let Some(rd) = gp_index(&GP32, dst) {
        let imm = u32::try_from(value).map_err(|_| EncodeError::ImmOutOfRange(value))?;
        let mut out = Vec::with_capacity(6);
        if rd >= 8 {
            out.push(REX_B);
        }
        out.push(0xB8 + (rd & 7));
        out.extend_from_slice(&imm.to_le_bytes());
        return Ok(out);
    }

    let Some(rd) = gp_index(&GP64, dst) else {
        return Err(EncodeError::UnknownRegister(dst.to_string()));
    };

    // Writing the 32-bit view zero-extends, so small values get the
    // short form.
    if let Ok(imm) = u32::try_from(value) {
        let mut out = Vec::with_capacity(6);
        if rd >= 8 {
            out.push(REX_B);
        }
        out.push(0xB8 + (rd & 7));
        out.extend_from_slice(&imm.to_le_bytes());
        return Ok(out);
    }

    if let Ok(imm) = i32::try_from(value as i64) {
        let rex = if rd >= 8 { REX_W | 0x01 } else { REX_W };
        let mut out = vec![rex, 0xC7, 0xC0 + (rd & 7)];
        out.extend_from_slice(&imm.to_le_bytes());
        return Ok(out);
    }

    let rex = if rd >= 8 { REX_W | 0x01 } else { REX_W };
    let mut out = vec![rex, 0xB8 + (rd & 7)];
    out.extend_from_slice(&value.to_le_bytes());
    Ok(out)
}

#[allow(clippy::cast_possible_wrap)]
fn push_imm(value: u64) -> Result<Vec<u8>, EncodeError> {
    let signed = value as i64;
    if let Ok(imm) = i8::try_from(signed) {
        return Ok(vec![0x6A, imm as u8]);
    }
    if let Ok(imm) = i32::try_from(signed) {
        let mut out = vec![0x68];
        out.extend_from_slice(&imm.to_le_bytes());
        return Ok(out);
    }
    Err(EncodeError::ImmOutOfRange(value))
}

fn pop_reg(name: &str) -> Result<Vec<u8>, EncodeError> {
    let Some(rd) = gp_index(&GP64, name) else {
        return Err(EncodeError::UnknownRegister(name.to_string()));
    };
    if rd >= 8 {
        Ok(vec![REX_B, 0x58 + (rd & 7)])
    } else {
        Ok(vec![0x58 + rd])
    }
}

fn jmp_rel(target: u64, anchor: Addr) -> Result<Vec<u8>, EncodeError> {
    let target = i128::from(target);
    let anchor = i128::from(anchor);

    let rel8 = target - (anchor + 2);
    if let Ok(rel) = i8::try_from(rel8) {
        #[allow(clippy::cast_sign_loss)]
        return Ok(vec![0xEB, rel as u8]);
    }

    let rel32 = target - (anchor + 5);
    if let Ok(rel) = i32::try_from(rel32) {
        let mut out = vec![0xE9];
        out.extend_from_slice(&rel.to_le_bytes());
        return Ok(out);
    }

    #[allow(clippy::cast_possible_truncation)]
    Err(EncodeError::DispOutOfRange(rel32 as i64))
}
