//! Endpoint-side queueing discipline (§4.C–§4.F): demand tracking,
//! request pacing, the horizon scheduler, and the flow state machine that
//! decides which destinations to request timeslots for next.

pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod horizon;
pub mod pacer;

pub use client::{AreqEntries, AreqEntry, DemandLookup, EndpointClient};
pub use config::{ConfigError, QdiscConfig};
pub use error::EndpointError;
pub use flow::{classify, Flow, FlowKind, PendingPacket};
pub use horizon::{apply_alloc_section, ElapsedSlot, Horizon, HorizonError};
pub use pacer::RequestPacer;
