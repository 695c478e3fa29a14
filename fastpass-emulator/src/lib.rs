//! Packet-switched fabric emulation (§4.G): pluggable queue managers and
//! schedulers, a classifier/routing-table/dropper trio, and the router
//! step function that ties them together over a shared queue bank.

pub mod classifier;
pub mod dropper;
pub mod endpoint;
pub mod error;
pub mod packet;
pub mod queue_bank;
pub mod queue_manager;
pub mod router;
pub mod routing_table;
pub mod scheduler;
pub mod telemetry;

pub use classifier::{Classifier, ClassifyError};
pub use dropper::{Dropper, DropperStats};
pub use error::EmulatorError;
pub use endpoint::EndpointGroup;
pub use packet::{Packet, PacketPool};
pub use queue_bank::{PortDropStats, QueueBank, QueueStats};
pub use queue_manager::{Dctcp, DropTail, EnqueueOutcome, Hull, QueueManager, QueueManagerPolicy, Red};
pub use router::{Router, RouterConfig, ROUTER_MAX_BURST};
pub use routing_table::RoutingTable;
pub use scheduler::{RoundRobin, Scheduler, SchedulerPolicy, StrictPriority, NUM_PRIORITIES};
