//! The endpoint → kernel qdisc configuration surface (§6): a plain struct
//! validated at construction: "parse once, reject
//! out-of-range fields up front" rather than deferring validation to
//! first use.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("hash_tbl_log must be in [1, 18], got {0}")]
    HashTblLogOutOfRange(u8),
    #[error("data_rate_bytes_per_sec must be nonzero")]
    ZeroDataRate,
}

/// Endpoint qdisc parameters (§6). Reconfiguration may trigger
/// reconnection to the arbiter; this type itself is just the validated
/// value — reconnection is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QdiscConfig {
    pub packet_limit: u32,
    pub flow_packet_limit: u32,
    pub hash_tbl_log: u8,
    pub data_rate_bytes_per_sec: u64,
    pub tslot_nsec: u64,
    pub req_cost_ns: u64,
    pub req_bucket_ns: u64,
    pub req_min_gap_ns: u64,
    /// Network-byte-order IPv4 address of the arbiter.
    pub controller_ip: u32,
    pub reset_window_us: u64,
    pub send_timeout_us: u64,
}

impl QdiscConfig {
    pub const DEFAULT_RESET_WINDOW_US: u64 = 2_000_000;
    pub const DEFAULT_SEND_TIMEOUT_US: u64 = 5_000;

    pub fn new(
        packet_limit: u32,
        flow_packet_limit: u32,
        hash_tbl_log: u8,
        data_rate_bytes_per_sec: u64,
        tslot_nsec: u64,
        req_cost_ns: u64,
        req_bucket_ns: u64,
        req_min_gap_ns: u64,
        controller_ip: u32,
    ) -> Result<Self, ConfigError> {
        if !(1..=18).contains(&hash_tbl_log) {
            return Err(ConfigError::HashTblLogOutOfRange(hash_tbl_log));
        }
        if data_rate_bytes_per_sec == 0 {
            return Err(ConfigError::ZeroDataRate);
        }
        Ok(Self {
            packet_limit,
            flow_packet_limit,
            hash_tbl_log,
            data_rate_bytes_per_sec,
            tslot_nsec,
            req_cost_ns,
            req_bucket_ns,
            req_min_gap_ns,
            controller_ip,
            reset_window_us: Self::DEFAULT_RESET_WINDOW_US,
            send_timeout_us: Self::DEFAULT_SEND_TIMEOUT_US,
        })
    }

    pub fn rst_win_ns(&self) -> i64 {
        self.reset_window_us as i64 * 1_000
    }

    pub fn send_timeout_ns(&self) -> i64 {
        self.send_timeout_us as i64 * 1_000
    }

    pub fn hash_tbl_capacity(&self) -> usize {
        1usize << self.hash_tbl_log
    }
}
