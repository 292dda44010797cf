//! Binary deobfuscation by chain folding.
//!
//! `defuse` collapses two obfuscation patterns directly in the binary
//! image: constant chains, where a value is rebuilt through dead
//! intermediate arithmetic, and transfer chains, where control bounces
//! through trampolines before reaching real code. The folding passes
//! live in [`defuse_fold`]; this crate adds the work queue and the
//! fixed-point driver that runs them to exhaustion.
//!
//! ```no_run
//! use defuse::{Driver, WorkQueue};
//! use defuse_asm::X86Encoder;
//! use defuse_image::RawImage;
//! use defuse_ir::IrFunction;
//!
//! let lifter = |image: &RawImage| -> IrFunction {
//!     // Disassemble the current image bytes into the two-level IR.
//!     unimplemented!()
//! };
//! let mut driver = Driver::new(lifter, X86Encoder::new());
//! let mut image = RawImage::new(0x1000, vec![0x90; 64]);
//! driver.seed([0x1000]);
//! let stats = driver.run(&mut image)?;
//! # Ok::<(), defuse::Error>(())
//! ```

mod driver;
mod error;
mod queue;

pub use driver::{Driver, DriverStats, Lift};
pub use error::{Error, Result};
pub use queue::WorkQueue;
