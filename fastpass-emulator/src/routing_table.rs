//! `RoutingTable` (§4.G): destination-endpoint-ID to egress-port lookup.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<u16, usize>,
    default_port: Option<usize>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_route(&mut self, dst: u16, port: usize) {
        self.routes.insert(dst, port);
    }

    pub fn set_default_port(&mut self, port: usize) {
        self.default_port = Some(port);
    }

    pub fn port_for(&self, dst: u16) -> Option<usize> {
        self.routes.get(&dst).copied().or(self.default_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_route_wins_over_default() {
        let mut rt = RoutingTable::new();
        rt.set_default_port(0);
        rt.set_route(42, 3);
        assert_eq!(rt.port_for(42), Some(3));
        assert_eq!(rt.port_for(99), Some(0));
    }

    #[test]
    fn unknown_dst_with_no_default_is_none() {
        let rt = RoutingTable::new();
        assert_eq!(rt.port_for(1), None);
    }
}
