//! Uniform-block partition math for the batched submission path.
//!
//! Each instance occupies 8 floats of block storage (five parameters padded
//! to two 16-byte rows), so a device block of `B` bytes holds `B / 32`
//! instances. Capacity is split into fixed-size blocks; only blocks
//! overlapping the live range are drawn.

/// Bytes of uniform-block storage per instance.
pub const BYTES_PER_INSTANCE: u32 = 32;

/// Maximum instances that fit one uniform block of `block_bytes`.
pub fn max_block_instances(block_bytes: u32) -> usize {
    (block_bytes / BYTES_PER_INSTANCE) as usize
}

/// Blocks needed to cover `count` instances.
pub fn block_count(count: usize, per_block: usize) -> usize {
    debug_assert!(per_block > 0);
    count.div_ceil(per_block)
}

/// Live instances within block `index`, clamped to the live count.
pub fn live_in_block(live: usize, per_block: usize, index: usize) -> usize {
    debug_assert!(per_block > 0);
    live.saturating_sub(index * per_block).min(per_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_instances_from_device_limit() {
        // The common 64 KiB device limit yields 2048 instances per block.
        assert_eq!(max_block_instances(65_536), 2_048);
        assert_eq!(max_block_instances(16_384), 512);
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(block_count(0, 512), 0);
        assert_eq!(block_count(1, 512), 1);
        assert_eq!(block_count(512, 512), 1);
        assert_eq!(block_count(513, 512), 2);
        assert_eq!(block_count(2_048, 512), 4);
    }

    #[test]
    fn live_counts_clamp_to_block_and_tail() {
        // live = 1300, blocks of 512: full, full, 276, then nothing.
        assert_eq!(live_in_block(1_300, 512, 0), 512);
        assert_eq!(live_in_block(1_300, 512, 1), 512);
        assert_eq!(live_in_block(1_300, 512, 2), 276);
        assert_eq!(live_in_block(1_300, 512, 3), 0);
    }

    #[test]
    fn live_blocks_cover_exactly_the_live_range() {
        let per_block = 512;
        for live in [0usize, 1, 511, 512, 513, 1_300, 4_096] {
            let blocks = block_count(live, per_block);
            let total: usize = (0..blocks).map(|i| live_in_block(live, per_block, i)).sum();
            assert_eq!(total, live);
        }
    }
}
