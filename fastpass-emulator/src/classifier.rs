//! `Classifier` (§4.G): maps a packet to `(port, queue)`, consulting the
//! [`RoutingTable`] for port selection and the packet's own priority for
//! queue selection.

use thiserror::Error;

use crate::packet::Packet;
use crate::routing_table::RoutingTable;
use crate::scheduler::NUM_PRIORITIES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("no route to destination")]
    NoRoute,
}

pub struct Classifier<'a> {
    pub routing_table: &'a RoutingTable,
}

impl<'a> Classifier<'a> {
    pub fn new(routing_table: &'a RoutingTable) -> Self {
        Self { routing_table }
    }

    pub fn classify(&self, packet: &Packet) -> Result<(usize, usize), ClassifyError> {
        let port = self.routing_table.port_for(packet.dst).ok_or(ClassifyError::NoRoute)?;
        let priority = (packet.priority as usize).min(NUM_PRIORITIES - 1);
        Ok((port, priority))
    }
}
