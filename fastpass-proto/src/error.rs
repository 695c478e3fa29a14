use thiserror::Error;

/// Errors surfaced by the protocol engine. Never thrown across a ring or
/// callback boundary (§7) — always returned as a typed result the caller
/// matches on, or folded into a per-component stat counter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error("packet shorter than the 8-byte header")]
    TooShort,
    #[error("unknown payload section type {0}")]
    UnknownPayload(u8),
    #[error("payload section truncated for its declared type")]
    Incomplete,
    #[error("checksum verification failed")]
    ChecksumError,
    #[error("sequence number is out of window")]
    OutOfWindow,
    #[error("AREQ count exceeds the requested counter (invariant violation)")]
    CountExceedsRequested,
    #[error("ALLOC section declares more than 15 destinations")]
    TooManyAllocDestinations,
    #[error("ALLOC dst_index references an unlisted destination")]
    InvalidAllocDestIndex,
}

/// Outcome of validating and processing one received packet (§4.B receive
/// path), modeled as a plain enum rather than an `Err` so recoverable
/// cases never unwind anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    Process,
    Duplicate,
    OutOfOrder,
    OutOfWindow,
    Format,
}
