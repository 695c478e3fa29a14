//! The protocol engine (§4.B): per-connection state tying the sliding-window
//! tracker, wire codec, and reset negotiation together into the send/receive
//! state machine.
//!
//! The engine never calls back into application code directly — every
//! notable outcome (`handle_ack`, `handle_neg_ack`, `handle_reset`, forced
//! reset) is pushed onto an internal queue and drained by the caller with
//! [`ProtocolEngine::drain_events`]. This keeps the engine free of
//! trait-object/lifetime entanglement with whatever owns the demand table
//! on the other side of the callback — an explicit `events: VecDeque<_>`
//! field instead.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::RxOutcome;
use crate::reset::{decide_reset, ResetDecision};
use crate::wire::{self, Header, Section};
use crate::window::{self, SlidingWindow, WIDTH};

/// Outcomes the caller must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `seq` was acked by the peer; its descriptor is returned for cleanup
    /// (demand-table bookkeeping, freeing the send buffer, etc).
    Ack { seq: u64, sections: Vec<Section> },
    /// `seq` fell off the outgoing window or timed out unacked. Ownership of
    /// the descriptor reverts to the caller, who may resubmit it.
    NegAck { seq: u64, sections: Vec<Section> },
    /// A RESET was accepted; both windows are now cleared and `in_sync`.
    Reset { new_reset_time: i64 },
    /// Non-control sections from a successfully processed packet, in
    /// arrival order, for the caller to apply to the demand table.
    Received { seq: u64, sections: Vec<Section> },
    /// `consecutive_bad_pkts` crossed the threshold (or the caller called
    /// [`ProtocolEngine::force_reset`] directly); the caller should queue a
    /// RESET section on the next outgoing packet.
    ForcedReset,
}

const CONSECUTIVE_BAD_PKTS_LIMIT: u32 = 10;

struct OutgoingEntry {
    seq: u64,
    sent_at: Instant,
    sections: Vec<Section>,
}

/// Per-connection state (§3 "Connection state"), plus the two sliding
/// windows and the codec/reset glue from §4.B.
pub struct ProtocolEngine {
    rst_win_ns: i64,
    send_timeout_ns: i64,
    last_reset_time: Option<i64>,
    next_seqno: u64,
    in_max_seqno: u64,
    in_sync: bool,
    consecutive_bad_pkts: u32,

    /// Indexed by `seq % WIDTH`; `None` once acked, neg-acked, or never
    /// committed. A fixed-size array rather than a hash map mirrors the
    /// fixed-width window itself: a slot is only ever reused once its
    /// previous occupant has necessarily fallen out of window.
    outwnd_entries: Vec<Option<OutgoingEntry>>,
    /// Committed seqnos in send order, used only to find the oldest still-
    /// outstanding one without scanning the whole array; entries whose
    /// slot has already been freed are skipped lazily.
    in_flight: VecDeque<u64>,

    inwnd: SlidingWindow,

    events: VecDeque<EngineEvent>,
}

impl ProtocolEngine {
    pub fn new(rst_win_ns: i64, send_timeout_ns: i64) -> Self {
        Self {
            rst_win_ns,
            send_timeout_ns,
            last_reset_time: None,
            next_seqno: 1,
            in_max_seqno: 0,
            in_sync: false,
            consecutive_bad_pkts: 0,
            outwnd_entries: (0..WIDTH).map(|_| None).collect(),
            in_flight: VecDeque::new(),
            inwnd: SlidingWindow::new(0),
            events: VecDeque::new(),
        }
    }

    pub fn in_sync(&self) -> bool {
        self.in_sync
    }

    pub fn last_reset_time(&self) -> Option<i64> {
        self.last_reset_time
    }

    pub fn consecutive_bad_pkts(&self) -> u32 {
        self.consecutive_bad_pkts
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = EngineEvent> + '_ {
        self.events.drain(..)
    }

    fn bump_bad(&mut self) {
        self.consecutive_bad_pkts += 1;
        if self.consecutive_bad_pkts >= CONSECUTIVE_BAD_PKTS_LIMIT {
            self.force_reset();
        }
    }

    /// User- or engine-triggered forced reset (§4.B: "a forced reset may be
    /// requested by the user"). Marks the connection out of sync; the
    /// caller is expected to send a RESET section next and the windows are
    /// cleared only once that reset is actually accepted by both ends.
    pub fn force_reset(&mut self) {
        tracing::warn!(
            consecutive_bad_pkts = self.consecutive_bad_pkts,
            "forcing protocol reset"
        );
        self.in_sync = false;
        self.consecutive_bad_pkts = 0;
        self.events.push_back(EngineEvent::ForcedReset);
    }

    // ---- send path -----------------------------------------------------

    /// Freezes the tail of the outwnd: if committing the next packet would
    /// overwrite a slot still holding an unacked descriptor, that descriptor
    /// falls off the window and is surrendered back to the caller via a
    /// `NegAck` event before the slot is reused.
    pub fn prepare_to_send(&mut self) {
        let idx = (self.next_seqno % WIDTH) as usize;
        if let Some(old) = self.outwnd_entries[idx].take() {
            self.events.push_back(EngineEvent::NegAck {
                seq: old.seq,
                sections: old.sections,
            });
        }
    }

    /// Assigns the next sequence number, records the descriptor, and arms
    /// the retransmit timer implicitly (the caller polls
    /// [`ProtocolEngine::next_timer_deadline`] / calls
    /// [`ProtocolEngine::check_retransmit_timer`] itself; there is no
    /// internal thread here).
    pub fn commit_packet(&mut self, sections: Vec<Section>, now: Instant) -> u64 {
        self.prepare_to_send();
        let seq = self.next_seqno;
        let idx = (seq % WIDTH) as usize;
        self.outwnd_entries[idx] = Some(OutgoingEntry {
            seq,
            sent_at: now,
            sections,
        });
        self.in_flight.push_back(seq);
        self.next_seqno += 1;
        seq
    }

    /// Builds a full wire packet: header (with piggy-backed ack state) plus
    /// the committed sections.
    pub fn build_packet(&mut self, sections: Vec<Section>, now: Instant) -> (u64, Vec<u8>) {
        let (ack_seq, ack_vec) = self.ack_fields();
        let seq = self.commit_packet(sections.clone(), now);
        let header = Header {
            seqno_low: (seq & 0xFFFF) as u16,
            flags: 0,
            ack_seq_low14: (ack_seq & 0x3FFF) as u16,
            ack_vec,
        };
        let mut buf = header.encode().to_vec();
        buf.extend(wire::encode_sections(&sections));
        (seq, buf)
    }

    /// The `(ack_seq, ack_vec)` pair this end would currently report to its
    /// peer: `ack_seq` is the highest sequence number ever received
    /// (`in_max_seqno`), and bit `i` of `ack_vec` is set iff sequence
    /// `ack_seq - i` has been received, for `i` in `0..16`. This is a
    /// right-edge selective-ack rather than a pure cumulative one, so a
    /// single dropped packet doesn't stall acking everything sent after it.
    pub fn ack_fields(&self) -> (u64, u16) {
        let ack_seq = self.in_max_seqno;
        let mut vec = 0u16;
        for i in 0..16u64 {
            let seq = match ack_seq.checked_sub(i) {
                Some(s) if s > 0 => s,
                _ => continue,
            };
            let acked = seq <= self.inwnd.base() || self.inwnd.is_present(seq);
            if acked {
                vec |= 1 << i;
            }
        }
        (ack_seq, vec)
    }

    fn earliest_unacked(&mut self) -> Option<u64> {
        while let Some(&seq) = self.in_flight.front() {
            let idx = (seq % WIDTH) as usize;
            match &self.outwnd_entries[idx] {
                Some(e) if e.seq == seq => return Some(seq),
                _ => {
                    self.in_flight.pop_front();
                }
            }
        }
        None
    }

    /// When the single retransmit timer should next fire, or `None` if
    /// nothing is outstanding.
    pub fn next_timer_deadline(&mut self) -> Option<Instant> {
        let seq = self.earliest_unacked()?;
        let idx = (seq % WIDTH) as usize;
        let sent_at = self.outwnd_entries[idx].as_ref().unwrap().sent_at;
        Some(sent_at + Duration::from_nanos(self.send_timeout_ns.max(0) as u64))
    }

    /// Fires the retransmit timer: any outstanding entry whose
    /// `sent_timestamp + send_timeout_ns` has passed is neg-acked and
    /// freed, and the timer conceptually rearms for the next-earliest.
    pub fn check_retransmit_timer(&mut self, now: Instant) {
        let timeout = Duration::from_nanos(self.send_timeout_ns.max(0) as u64);
        while let Some(seq) = self.earliest_unacked() {
            let idx = (seq % WIDTH) as usize;
            let expired = self.outwnd_entries[idx]
                .as_ref()
                .map(|e| now.saturating_duration_since(e.sent_at) >= timeout)
                .unwrap_or(false);
            if !expired {
                break;
            }
            let entry = self.outwnd_entries[idx].take().unwrap();
            self.in_flight.pop_front();
            tracing::debug!(seq = entry.seq, "retransmit timer expired, neg-acking");
            self.events.push_back(EngineEvent::NegAck {
                seq: entry.seq,
                sections: entry.sections,
            });
        }
    }

    // ---- receive path ----------------------------------------------------

    fn try_free(&mut self, seq: u64) -> Option<Vec<Section>> {
        if seq == 0 {
            return None;
        }
        let idx = (seq % WIDTH) as usize;
        match &self.outwnd_entries[idx] {
            Some(e) if e.seq == seq => self.outwnd_entries[idx].take().map(|e| e.sections),
            _ => None,
        }
    }

    /// Applies a peer-reported `(ack_seq, ack_vec)` pair using the
    /// right-edge selective-ack convention from [`Self::ack_fields`]: fires
    /// one `Ack` event (and frees the outwnd entry) per sequence number
    /// that transitions from "in-flight" to "acked" (§5: "ack-vector
    /// delivery may collapse multiple acks into one callback invocation
    /// per acked sequence" — i.e. exactly one event per sequence, however
    /// many packets carried that ack).
    fn apply_ack(&mut self, ack_seq: u64, ack_vec: u16) {
        for i in 0..16u64 {
            if ack_vec & (1 << i) == 0 {
                continue;
            }
            let seq = match ack_seq.checked_sub(i) {
                Some(s) if s > 0 => s,
                _ => continue,
            };
            if let Some(sections) = self.try_free(seq) {
                self.events.push_back(EngineEvent::Ack { seq, sections });
            }
        }
    }

    /// Validates a received packet and, if it's new information, applies it.
    pub fn handle_rx_packet(&mut self, buf: &[u8], now_wall_ns: i64) -> RxOutcome {
        let header = match Header::decode(buf) {
            Ok(h) => h,
            Err(_) => {
                self.bump_bad();
                return RxOutcome::Format;
            }
        };
        let sections = match wire::decode_sections(&buf[wire::HEADER_LEN..]) {
            Ok(s) => s,
            Err(_) => {
                self.bump_bad();
                return RxOutcome::Format;
            }
        };

        let seq = window::reconstruct_seqno16(header.seqno_low, self.in_max_seqno);

        let outcome = if seq <= self.inwnd.base() {
            RxOutcome::Duplicate
        } else if seq > self.inwnd.base() + WIDTH {
            RxOutcome::OutOfWindow
        } else if seq == self.inwnd.base() + 1 {
            RxOutcome::Process
        } else {
            RxOutcome::OutOfOrder
        };

        match outcome {
            RxOutcome::Duplicate | RxOutcome::OutOfWindow => {
                self.bump_bad();
                return outcome;
            }
            _ => {}
        }

        // Sections are only applied when they arrive in order; an
        // out-of-order packet still gets tracked in the window (so it can
        // be acked and not re-requested) but its payload is dropped per
        // §7's "protocol-recoverable" handling rather than risk applying
        // state out of sequence-number order.
        if self.inwnd.mark_present(seq).is_err() {
            self.bump_bad();
            return RxOutcome::OutOfWindow;
        }
        while self.inwnd.is_present(self.inwnd.base() + 1) {
            let new_base = self.inwnd.base() + 1;
            self.inwnd.advance(new_base);
        }

        let reset_happened = if outcome == RxOutcome::Process {
            self.perform_rx_callbacks(seq, &sections, now_wall_ns)
        } else {
            self.bump_bad();
            false
        };

        // A reset already zeroed the windows and counters; applying the
        // pre-reset packet's own seqno/ack bookkeeping on top would just
        // reintroduce the state the reset was meant to wipe.
        if !reset_happened {
            self.successful_rx(seq, &header);
        }
        if outcome == RxOutcome::Process {
            self.consecutive_bad_pkts = 0;
        }
        outcome
    }

    /// Returns `true` iff a RESET section in this packet was accepted.
    fn perform_rx_callbacks(&mut self, seq: u64, sections: &[Section], now_wall_ns: i64) -> bool {
        let mut delivered = Vec::new();
        let mut reset_happened = false;
        for section in sections {
            match section {
                Section::Reset { timestamp_ns } => {
                    reset_happened |= self.handle_reset_section(*timestamp_ns as i64, now_wall_ns);
                }
                Section::Ack {
                    ack_seq_low14,
                    ack_vec,
                } => {
                    let ack_seq =
                        window::reconstruct_seqno(*ack_seq_low14, self.next_seqno.saturating_sub(1));
                    self.apply_ack(ack_seq, *ack_vec);
                }
                Section::Pad => {}
                Section::Areq { .. } | Section::Alloc { .. } => {
                    delivered.push(section.clone());
                }
            }
        }
        if !delivered.is_empty() {
            self.events.push_back(EngineEvent::Received {
                seq,
                sections: delivered,
            });
        }
        reset_happened
    }

    /// Returns `true` iff the reset was accepted.
    fn handle_reset_section(&mut self, peer_t: i64, now_wall_ns: i64) -> bool {
        match decide_reset(self.last_reset_time, peer_t, now_wall_ns, self.rst_win_ns) {
            ResetDecision::Accept { new_reset_time } => {
                tracing::info!(new_reset_time, "peer reset accepted, resyncing");
                self.last_reset_time = Some(new_reset_time);
                self.in_sync = true;
                self.next_seqno = 1;
                self.in_max_seqno = 0;
                self.inwnd.clear(0);
                for slot in self.outwnd_entries.iter_mut() {
                    *slot = None;
                }
                self.in_flight.clear();
                self.events.push_back(EngineEvent::Reset { new_reset_time });
                true
            }
            decision @ (ResetDecision::OutOfWindow | ResetDecision::Ignore) => {
                tracing::debug!(?decision, peer_t, "peer reset rejected");
                false
            }
        }
    }

    fn successful_rx(&mut self, seq: u64, header: &Header) {
        self.in_max_seqno = self.in_max_seqno.max(seq);
        let ack_seq = window::reconstruct_seqno(header.ack_seq_low14, self.next_seqno.saturating_sub(1));
        self.apply_ack(ack_seq, header.ack_vec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn areq(dst: u16, count: u16) -> Vec<Section> {
        vec![Section::Areq {
            entries: vec![(dst, count)],
        }]
    }

    #[test]
    fn commit_assigns_increasing_seqnos() {
        let mut e = ProtocolEngine::new(1_000_000, 5_000_000);
        let now = Instant::now();
        let s1 = e.commit_packet(areq(1, 1), now);
        let s2 = e.commit_packet(areq(2, 1), now);
        assert_eq!(s2, s1 + 1);
    }

    // S2: commit seqnos 100..107, peer acks with a right-edge selective ack
    // anchored at 107 covering the 7 sequences below and including it
    // (101..107); 100 must remain outstanding.
    #[test]
    fn s2_ack_vector_collapse() {
        let mut e = ProtocolEngine::new(1_000_000, 5_000_000);
        let now = Instant::now();
        e.next_seqno = 100;
        for slot in e.outwnd_entries.iter_mut() {
            *slot = None;
        }
        for seq in 100..=107u64 {
            let idx = (seq % WIDTH) as usize;
            e.outwnd_entries[idx] = Some(OutgoingEntry {
                seq,
                sent_at: now,
                sections: areq(seq as u16, 1),
            });
            e.in_flight.push_back(seq);
        }

        // bits 0..6 set: 0x007F, anchored at ack_seq=107 -> acks 101..107.
        e.apply_ack(107, 0x007F);

        let mut acked: Vec<u64> = e
            .drain_events()
            .map(|ev| match ev {
                EngineEvent::Ack { seq, .. } => seq,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        acked.sort_unstable();
        assert_eq!(acked, (101..=107).collect::<Vec<_>>());

        assert_eq!(e.earliest_unacked(), Some(100));
    }

    #[test]
    fn retransmit_timer_neg_acks_expired_entries() {
        let mut e = ProtocolEngine::new(1_000_000, 10);
        let now = Instant::now();
        e.commit_packet(areq(1, 1), now);
        e.check_retransmit_timer(now + Duration::from_nanos(100));
        let events: Vec<_> = e.drain_events().collect();
        assert!(matches!(events.as_slice(), [EngineEvent::NegAck { .. }]));
        assert_eq!(e.earliest_unacked(), None);
    }

    #[test]
    fn forced_reset_fires_after_threshold_bad_packets() {
        let mut e = ProtocolEngine::new(1_000_000, 5_000_000);
        for _ in 0..CONSECUTIVE_BAD_PKTS_LIMIT {
            // too-short packets are always rejected as FORMAT.
            assert_eq!(e.handle_rx_packet(&[0u8; 2], 0), RxOutcome::Format);
        }
        let events: Vec<_> = e.drain_events().collect();
        assert!(events.contains(&EngineEvent::ForcedReset));
        assert!(!e.in_sync());
    }

    #[test]
    fn accepted_reset_clears_windows_and_resyncs() {
        let mut e = ProtocolEngine::new(1_000_000, 5_000_000);
        let now = Instant::now();
        e.commit_packet(areq(1, 1), now);

        let header = Header {
            seqno_low: 1,
            flags: 0,
            ack_seq_low14: 0,
            ack_vec: 0,
        };
        let sections = vec![Section::Reset { timestamp_ns: 10 }];
        let mut buf = header.encode().to_vec();
        buf.extend(wire::encode_sections(&sections));

        let outcome = e.handle_rx_packet(&buf, 10);
        assert_eq!(outcome, RxOutcome::Process);
        assert!(e.in_sync());
        assert_eq!(e.last_reset_time(), Some(10));
        let events: Vec<_> = e.drain_events().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Reset {
                new_reset_time: 10
            }
        )));
    }

    #[test]
    fn out_of_order_packet_is_tracked_but_not_delivered() {
        let mut e = ProtocolEngine::new(1_000_000, 5_000_000);
        let header = Header {
            seqno_low: 5,
            flags: 0,
            ack_seq_low14: 0,
            ack_vec: 0,
        };
        let sections = areq(9, 9);
        let mut buf = header.encode().to_vec();
        buf.extend(wire::encode_sections(&sections));

        let outcome = e.handle_rx_packet(&buf, 0);
        assert_eq!(outcome, RxOutcome::OutOfOrder);
        let events: Vec<_> = e.drain_events().collect();
        assert!(!events.iter().any(|e| matches!(e, EngineEvent::Received { .. })));
    }
}
