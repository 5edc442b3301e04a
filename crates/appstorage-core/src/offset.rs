//! Offset Codec
//!
//! Splits a 64-bit log offset (or record id) into a storage partition number
//! and a clustering position within that partition:
//!
//! ```text
//!  63                              12 11          0
//! ┌──────────────────────────────────┬─────────────┐
//! │            hi (partition)        │ lo (0..4095)│
//! └──────────────────────────────────┴─────────────┘
//! ```
//!
//! `hi` lands in the `offset_hi` / `id_hi` partition-key column (bigint), `lo`
//! in the `offset_low` / `id_low` clustering column (smallint). Ordering by
//! `(hi, lo)` equals ordering by the full offset.
//!
//! Widening either half changes the on-disk layout, so the split is a
//! compile-time constant.

/// Number of low bits kept in the clustering column.
pub const PARTITION_BITS: u32 = 12;

/// Mask selecting the clustering bits.
pub const LOW_MASK: u64 = (1 << PARTITION_BITS) - 1;

/// Rows per storage partition (and upper bound of one log sub-query).
pub const PARTITION_RECORD_COUNT: u64 = 1 << PARTITION_BITS;

/// Largest clustering value, as stored.
pub const MAX_CLUSTERING: i16 = LOW_MASK as i16;

/// Split `value` into `(hi, lo)`.
///
/// For any `u64` the high part fits in 52 bits, so it is always a
/// non-negative `i64`.
#[inline]
pub fn crack(value: u64) -> (i64, i16) {
    ((value >> PARTITION_BITS) as i64, (value & LOW_MASK) as i16)
}

/// Inverse of [`crack`].
#[inline]
pub fn uncrack(hi: i64, lo: i16) -> u64 {
    ((hi as u64) << PARTITION_BITS) | (lo as u64 & LOW_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crack_known_values() {
        assert_eq!(crack(0), (0, 0));
        assert_eq!(crack(4095), (0, 4095));
        assert_eq!(crack(4096), (1, 0));
        assert_eq!(crack(14_000 - 1), (3, 1711));
        assert_eq!(crack(u64::MAX), ((1i64 << 52) - 1, 4095));
    }

    #[test]
    fn test_roundtrip_over_interesting_values() {
        let mut values = vec![0u64, 1, 4095, 4096, 4097, i64::MAX as u64, u64::MAX];
        values.extend((0..64).map(|shift| 1u64 << shift));
        values.extend((0..64).map(|shift| (1u64 << shift) - 1));

        for x in values {
            let (hi, lo) = crack(x);
            assert!((0..=MAX_CLUSTERING).contains(&lo), "lo out of range for {x}");
            assert!(hi >= 0, "hi negative for {x}");
            assert_eq!(uncrack(hi, lo), x, "roundtrip failed for {x}");
        }
    }

    #[test]
    fn test_order_preserved() {
        let samples = [0u64, 5, 4095, 4096, 8191, 8192, 1 << 40, (1 << 40) + 1];
        for pair in samples.windows(2) {
            assert!(crack(pair[0]) < crack(pair[1]));
        }
    }
}
