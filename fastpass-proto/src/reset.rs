//! Reset negotiation (§4.B): both ends keep `last_reset_time`; a RESET
//! payload carries a timestamp. The three-way decision rule below settles
//! which of two concurrently-offered resets wins.

/// Whether a peer's reset timestamp `T` is accepted, and if so, what the
/// new agreed `last_reset_time` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    /// `T` is outside `rst_win_ns` of `now` — rejected outright.
    OutOfWindow,
    /// Neither side had a recent reset, or peer's `T` otherwise wins.
    Accept { new_reset_time: i64 },
    /// Our own reset is recent and the peer's is stale — ignored.
    Ignore,
}

/// Decides whether to accept a peer-offered reset timestamp `peer_t`,
/// given our own `self_last_reset`, the peer's claimed `peer_last_reset`
/// (as last known to us, or `None` if we've never heard one), `now`, and
/// the acceptance window `rst_win_ns`.
///
/// Implements the three rules from §4.B literally:
/// - neither side has a recent reset: the received `T` wins;
/// - both are recent: the later-in-time `T` wins;
/// - self's reset recent, peer's old: ignore.
pub fn decide_reset(
    self_last_reset: Option<i64>,
    peer_t: i64,
    now: i64,
    rst_win_ns: i64,
) -> ResetDecision {
    if (peer_t - now).abs() > rst_win_ns {
        return ResetDecision::OutOfWindow;
    }

    let self_recent = self_last_reset
        .map(|t| (now - t).abs() <= rst_win_ns)
        .unwrap_or(false);

    match (self_recent, self_last_reset) {
        (false, _) => ResetDecision::Accept { new_reset_time: peer_t },
        (true, Some(self_t)) if peer_t > self_t => ResetDecision::Accept { new_reset_time: peer_t },
        (true, Some(_)) => ResetDecision::Ignore,
        (true, None) => unreachable!("self_recent implies self_last_reset is Some"),
    }
}
