//! The arbiter core (§4.H): the dense per-destination demand table, a
//! pluggable timeslot allocator (PIM or emulator-backed), deterministic
//! per-core demand-table sharding, bounded inter-core rings, and the
//! per-timeslot pipeline tying them together.

pub mod admitted;
pub mod allocator;
pub mod arbiter_loop;
pub mod flow_ids;
pub mod partition;
pub mod rings;

pub use admitted::{AdmittedEntry, AdmittedRecord, EMU_ADMITS_PER_ADMITTED};
pub use allocator::{Allocator, AllocatorPolicy, EmulatorBacked, PendingRequest, Pim};
pub use arbiter_loop::{ArbiterLoop, RxDemand};
pub use flow_ids::{FlowIdAssigner, FlowIdsFull};
pub use partition::partition_for;
pub use rings::{OnRingFull, PushOutcome, Ring, RingError};
