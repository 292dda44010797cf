//! Driver-level errors.

use defuse_fold::FoldError;
use defuse_image::ImageError;
use thiserror::Error;

/// Failures a driver run can surface to its caller. Absent fold
/// opportunities are outcomes, not errors, and never land here.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fold(#[from] FoldError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
