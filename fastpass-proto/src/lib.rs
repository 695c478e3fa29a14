//! Reliable windowed transport shared by Fastpass endpoints and the
//! arbiter (§4.A, §4.B): sliding-window tracking, bit-exact wire framing,
//! reset negotiation, and the protocol engine that ties them together.

pub mod bitset;
pub mod demand;
pub mod engine;
pub mod error;
pub mod reset;
pub mod rtt;
pub mod time;
pub mod window;
pub mod wire;

pub use demand::{DemandError, DemandRecord, DenseDemandTable, FlowQueueState, SparseDemandTable};
pub use engine::{EngineEvent, ProtocolEngine};
pub use error::{ProtoError, RxOutcome};
pub use reset::{decide_reset, ResetDecision};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
pub use window::SlidingWindow;
pub use wire::{reconstruct_base_tslot, reconstruct_count_low16, AllocSlot, Header, Section};
