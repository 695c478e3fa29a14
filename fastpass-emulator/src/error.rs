use thiserror::Error;

use crate::classifier::ClassifyError;

/// Umbrella error type for the fabric emulator, unifying the per-module
/// errors a caller driving a full router step may need to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmulatorError {
    #[error("classify error: {0}")]
    Classify(#[from] ClassifyError),
}
