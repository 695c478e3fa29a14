//! Horizon scheduler (§4.E): a 64-timeslot circular bitmap mapping near-
//! future timeslots to the destination key they've been allocated to,
//! feeding the endpoint's dequeue watchdog.

use fastpass_proto::{reconstruct_base_tslot, AllocSlot, Section};
use thiserror::Error;

const HORIZON_LEN: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HorizonError {
    #[error("tslot {0} is outside the current horizon window")]
    OutOfBounds(u64),
}

/// The result of advancing the horizon past one or more timeslot
/// boundaries: either the slot that just elapsed carried an allocation
/// (the caller should dequeue one timeslot's worth of packets for it), or
/// it was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElapsedSlot {
    Allocated(u64),
    Empty,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Horizon {
    base_tslot: u64,
    mask: u64,
    schedule: [u64; HORIZON_LEN as usize],
    tslot_len_ns: u64,
}

impl Horizon {
    pub fn new(tslot_len_ns: u64) -> Self {
        Self {
            base_tslot: 0,
            mask: 0,
            schedule: [0; HORIZON_LEN as usize],
            tslot_len_ns,
        }
    }

    pub fn base_tslot(&self) -> u64 {
        self.base_tslot
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Allocates `tslot` to `dst_key`. Fails if `tslot` falls outside
    /// `[base, base+64)`.
    pub fn set(&mut self, tslot: u64, dst_key: u64) -> Result<(), HorizonError> {
        if tslot < self.base_tslot || tslot >= self.base_tslot + HORIZON_LEN {
            return Err(HorizonError::OutOfBounds(tslot));
        }
        let idx = (tslot % HORIZON_LEN) as usize;
        self.mask |= 1u64 << (tslot - self.base_tslot);
        self.schedule[idx] = dst_key;
        Ok(())
    }

    /// Index of the lowest set bit (the soonest-upcoming allocation), if
    /// any.
    pub fn next_nonempty(&self) -> Option<u64> {
        if self.mask == 0 {
            None
        } else {
            Some(self.base_tslot + self.mask.trailing_zeros() as u64)
        }
    }

    /// The wall-clock deadline of the timeslot currently occupying bit 0,
    /// used by the watchdog to arm its single timer.
    pub fn current_slot_deadline(&self, slot_start_ns: u64) -> u64 {
        slot_start_ns + self.tslot_len_ns
    }

    /// Advances the horizon so that bit 0 always corresponds to the
    /// timeslot containing `now`. Idempotent if called twice at the same
    /// `now` with no intervening `set`. Returns one [`ElapsedSlot`] per
    /// timeslot boundary crossed, in chronological order.
    pub fn advance_to(&mut self, now_ns: u64, slot_start_ns: &mut u64) -> Vec<ElapsedSlot> {
        let mut elapsed = Vec::new();
        while now_ns >= *slot_start_ns + self.tslot_len_ns {
            let bit0_set = self.mask & 1 != 0;
            let dst = self.schedule[(self.base_tslot % HORIZON_LEN) as usize];
            elapsed.push(if bit0_set {
                ElapsedSlot::Allocated(dst)
            } else {
                ElapsedSlot::Empty
            });
            self.mask >>= 1;
            self.base_tslot += 1;
            *slot_start_ns += self.tslot_len_ns;
        }
        elapsed
    }

    /// Clears all allocations, e.g. on a protocol reset.
    pub fn clear(&mut self, new_base_tslot: u64) {
        self.base_tslot = new_base_tslot;
        self.mask = 0;
        self.schedule = [0; HORIZON_LEN as usize];
    }
}

/// Applies one received ALLOC section to `horizon` (§2's endpoint
/// `B → F` leg, §4.B → §4.E): reconstructs the section's wrapped
/// `base_tslot` against `current_tslot`, then walks `slots`, where a
/// skip-16 advances the cursor 16 timeslots and an assignment books
/// `dst_list[dst_index - 1]` into the horizon at the cursor's current
/// offset from `base_tslot`. A slot whose absolute tslot already falls
/// outside the horizon window is skipped rather than failing the whole
/// section — a stale tail entry shouldn't discard the ones still ahead.
/// Sections other than `Alloc` are a no-op.
pub fn apply_alloc_section(horizon: &mut Horizon, section: &Section, current_tslot: u64) {
    let Section::Alloc {
        base_tslot_low20,
        dst_list,
        slots,
    } = section
    else {
        return;
    };
    let base_tslot = reconstruct_base_tslot(*base_tslot_low20, current_tslot);
    let mut offset = 0u64;
    for slot in slots {
        match slot {
            AllocSlot::Skip16 => offset += 16,
            AllocSlot::Assign { dst_index, .. } => {
                if let Some(&dst) = dst_list.get(*dst_index as usize - 1) {
                    if let Err(err) = horizon.set(base_tslot + offset, dst as u64) {
                        tracing::warn!(?err, tslot = base_tslot + offset, "dropping out-of-window ALLOC slot");
                    }
                }
                offset += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_out_of_window_is_rejected() {
        let mut h = Horizon::new(1_000);
        assert_eq!(h.set(64, 1), Err(HorizonError::OutOfBounds(64)));
        assert!(h.set(63, 1).is_ok());
    }

    #[test]
    fn next_nonempty_reports_lowest_bit() {
        let mut h = Horizon::new(1_000);
        h.set(5, 42).unwrap();
        h.set(2, 7).unwrap();
        assert_eq!(h.next_nonempty(), Some(2));
    }

    #[test]
    fn advance_reports_allocated_and_empty_slots_in_order() {
        let mut h = Horizon::new(1_000);
        h.set(0, 42).unwrap();
        h.set(2, 7).unwrap();
        let mut slot_start = 0u64;
        let elapsed = h.advance_to(2_500, &mut slot_start);
        assert_eq!(
            elapsed,
            vec![ElapsedSlot::Allocated(42), ElapsedSlot::Empty]
        );
        assert_eq!(h.base_tslot(), 2);
        assert_eq!(slot_start, 2_000);
    }

    #[test]
    fn advance_is_idempotent_at_same_now() {
        let mut h = Horizon::new(1_000);
        h.set(0, 1).unwrap();
        let mut slot_start = 0u64;
        h.advance_to(500, &mut slot_start);
        let second = h.advance_to(500, &mut slot_start);
        assert!(second.is_empty());
    }

    #[test]
    fn horizon_miss_leaves_schedule_bit_clearable_by_caller() {
        // S4: tslot 10 allocated at t0, watchdog fires at t0 + 11*tslot_len.
        let mut h = Horizon::new(100);
        h.set(10, 42).unwrap();
        let mut slot_start = 0u64;
        let elapsed = h.advance_to(11 * 100, &mut slot_start);
        assert_eq!(elapsed.len(), 11);
        assert_eq!(elapsed[10], ElapsedSlot::Allocated(42));
        assert_eq!(h.base_tslot(), 11);
    }

    #[test]
    fn apply_alloc_section_books_assignments_at_their_offset() {
        let mut h = Horizon::new(1_000);
        let section = Section::Alloc {
            base_tslot_low20: 0,
            dst_list: vec![42, 7],
            slots: vec![
                AllocSlot::Assign { dst_index: 1, flags: 0 },
                AllocSlot::Skip16,
                AllocSlot::Assign { dst_index: 2, flags: 0 },
            ],
        };
        apply_alloc_section(&mut h, &section, 0);
        assert_eq!(h.next_nonempty(), Some(0), "first slot assigned to dst_list[0]");

        let mut slot_start = 0u64;
        let elapsed = h.advance_to(1_000, &mut slot_start);
        assert_eq!(elapsed[0], ElapsedSlot::Allocated(42));

        // tslot 17 (offset 1, then the 16-slot skip) assigned to dst_list[1];
        // it's the 17th tslot to elapse from here (base_tslot is already 1).
        let elapsed = h.advance_to(18 * 1_000, &mut slot_start);
        assert_eq!(elapsed[16], ElapsedSlot::Allocated(7));
    }

    #[test]
    fn apply_alloc_section_ignores_non_alloc_sections() {
        let mut h = Horizon::new(1_000);
        apply_alloc_section(&mut h, &Section::Pad, 0);
        assert_eq!(h.next_nonempty(), None);
    }
}
