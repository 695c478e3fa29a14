//! Deterministic demand-table sharding across admission cores (§5): a
//! pure `hash(dst_key) -> partition` function, so each partition is
//! unambiguously owned by exactly one core for writes.

/// Picks the admission-core partition that owns `dst_key`, for
/// `num_partitions` cores (need not be a power of two, though the arbiter
/// is typically configured with one).
pub fn partition_for(dst_key: u64, num_partitions: usize) -> usize {
    debug_assert!(num_partitions > 0);
    let h = dst_key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (h % num_partitions as u64) as usize
}
