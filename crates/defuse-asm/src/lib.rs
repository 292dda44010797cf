//! Instruction encoding from mnemonic text.
//!
//! The folding passes synthesize replacement instructions as short
//! mnemonic strings (`mov rax, 0x5`, `jmp 0x401000`) and hand them to
//! an [`Encode`] implementation together with the address the bytes
//! will be placed at. [`X86Encoder`] covers the instructions the
//! folds emit on x86-64.

mod regs;
mod x86;

pub use regs::*;
pub use x86::*;

use defuse_ir::Addr;
use thiserror::Error;

/// Encoding errors.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot parse mnemonic text `{0}`")]
    Parse(String),
    #[error("unknown register `{0}`")]
    UnknownRegister(String),
    #[error("no encoding for `{0}` with these operands")]
    NoEncoding(String),
    #[error("immediate {0:#x} out of range for destination")]
    ImmOutOfRange(u64),
    #[error("displacement {0} out of range")]
    DispOutOfRange(i64),
}

impl EncodeError {
    /// True when the request was understood but the target has no
    /// encoding. The folds treat this as the absence of an
    /// opportunity; every other variant is a collaborator-contract
    /// violation.
    pub const fn is_unencodable(&self) -> bool {
        matches!(
            self,
            Self::NoEncoding(_) | Self::ImmOutOfRange(_) | Self::DispOutOfRange(_)
        )
    }
}

/// Turns mnemonic text into instruction bytes anchored at an address.
pub trait Encode {
    /// Encode `text` as the bytes of one instruction placed at
    /// `anchor`. Relative encodings are computed against `anchor`.
    fn encode(&self, text: &str, anchor: Addr) -> Result<Vec<u8>, EncodeError>;
}
