//! Patchable binary image.
//!
//! The folding passes mutate the program byte-for-byte: every
//! replacement is exactly as long as what it overwrites, so the
//! addresses of all surrounding code stay stable. [`PatchImage`] is
//! the contract those passes write through; [`RawImage`] is a flat
//! in-memory implementation with a table of instruction boundaries.

use defuse_ir::Addr;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Image access errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("address {0:#x} outside the image")]
    OutOfRange(Addr),
    #[error("no instruction boundary at {0:#x}")]
    NoBoundary(Addr),
    #[error("write of {len} bytes at {addr:#x} crosses the image end")]
    WriteBeyondEnd { addr: Addr, len: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// Mutable view of the binary being rewritten.
///
/// Not internally synchronized; a mutation sequence assumes exclusive
/// access, which the driver is responsible for arranging.
pub trait PatchImage {
    /// Length in bytes of the instruction at `addr`.
    fn instr_len(&self, addr: Addr) -> Option<usize>;

    /// Overwrite exactly `bytes.len()` bytes at `addr`.
    fn write(&mut self, addr: Addr, bytes: &[u8]) -> Result<()>;

    /// Replace the whole instruction at `addr` with no-ops, length
    /// for length.
    fn fill_nop(&mut self, addr: Addr) -> Result<()>;
}

/// Single-byte x86 no-op.
pub const NOP: u8 = 0x90;

/// Flat in-memory image with instruction boundaries supplied by the
/// front end that disassembled it.
#[derive(Clone, Debug)]
pub struct RawImage {
    base: Addr,
    data: Vec<u8>,
    lengths: FxHashMap<Addr, usize>,
    nop: u8,
}

impl RawImage {
    /// Create an image of `data` loaded at `base`, using the x86
    /// single-byte no-op.
    pub fn new(base: Addr, data: Vec<u8>) -> Self {
        Self::with_nop(base, data, NOP)
    }

    /// Create an image with an explicit no-op byte.
    pub fn with_nop(base: Addr, data: Vec<u8>, nop: u8) -> Self {
        Self {
            base,
            data,
            lengths: FxHashMap::default(),
            nop,
        }
    }

    /// Declare an instruction boundary of `len` bytes at `addr`.
    pub fn mark_instr(&mut self, addr: Addr, len: usize) {
        self.lengths.insert(addr, len);
    }

    /// Base address of the image.
    pub const fn base(&self) -> Addr {
        self.base
    }

    /// All image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The bytes of the instruction at `addr`, per the boundary table.
    pub fn instr_bytes(&self, addr: Addr) -> Option<&[u8]> {
        let len = self.lengths.get(&addr).copied()?;
        let off = self.offset(addr)?;
        self.data.get(off..off + len)
    }

    fn offset(&self, addr: Addr) -> Option<usize> {
        let off = addr.checked_sub(self.base)?;
        let off = usize::try_from(off).ok()?;
        (off < self.data.len()).then_some(off)
    }
}

impl PatchImage for RawImage {
    fn instr_len(&self, addr: Addr) -> Option<usize> {
        self.lengths.get(&addr).copied()
    }

    fn write(&mut self, addr: Addr, bytes: &[u8]) -> Result<()> {
        let off = self.offset(addr).ok_or(ImageError::OutOfRange(addr))?;
        let end = off + bytes.len();
        if end > self.data.len() {
            return Err(ImageError::WriteBeyondEnd {
                addr,
                len: bytes.len(),
            });
        }
        self.data[off..end].copy_from_slice(bytes);
        Ok(())
    }

    fn fill_nop(&mut self, addr: Addr) -> Result<()> {
        let len = self
            .lengths
            .get(&addr)
            .copied()
            .ok_or(ImageError::NoBoundary(addr))?;
        let nops = vec![self.nop; len];
        self.write(addr, &nops)
    }
}
