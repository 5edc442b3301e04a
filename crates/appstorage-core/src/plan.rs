//! Log Range Planner
//!
//! Turns "read `count` events starting at `offset`" into a sequence of
//! single-partition sub-queries. Each [`LogPart`] names one storage partition
//! (`offset_hi`) and the inclusive clustering window (`offset_low`) to fetch in
//! it, so no sub-query ever spans more than 4096 events.
//!
//! ```text
//! start = 4000, count = 10 000
//!
//!   part 0: 4000…4095   part 1: 0…4095   part 2: 0…4095   part 3: 0…1711
//! ```
//!
//! The plan for [`ReadCount::ToTheEnd`] is practically unbounded; readers stop
//! iterating as soon as a sub-query comes back empty.

use crate::offset::{crack, uncrack, MAX_CLUSTERING};
use crate::types::{Offset, ReadCount};

/// One single-partition sub-query of a log read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPart {
    /// Partition number (`offset_hi`).
    pub part: i64,
    /// First clustering value to fetch, inclusive.
    pub clust_from: i16,
    /// Last clustering value to fetch, inclusive.
    pub clust_to: i16,
}

impl LogPart {
    /// First offset covered by this part.
    pub fn first_offset(&self) -> Offset {
        Offset(uncrack(self.part, self.clust_from))
    }

    /// Last offset covered by this part.
    pub fn last_offset(&self) -> Offset {
        Offset(uncrack(self.part, self.clust_to))
    }

    /// Whether the window starts after the partition's first row.
    pub fn has_lower_bound(&self) -> bool {
        self.clust_from > 0
    }

    /// Whether the window ends before the partition's last row.
    pub fn has_upper_bound(&self) -> bool {
        self.clust_to < MAX_CLUSTERING
    }
}

/// Iterator over the [`LogPart`]s covering a log range.
#[derive(Debug, Clone)]
pub struct LogRangePlan {
    next_part: i64,
    min: (i64, i16),
    max: (i64, i16),
    empty: bool,
}

impl LogRangePlan {
    pub fn new(start: Offset, count: ReadCount) -> Self {
        let finish = match count {
            ReadCount::Exactly(0) => None,
            ReadCount::Exactly(n) => Some(start.0.saturating_add(n - 1)),
            ReadCount::ToTheEnd => Some(u64::MAX),
        };

        let min = crack(start.0);
        match finish {
            Some(finish) => Self {
                next_part: min.0,
                min,
                max: crack(finish),
                empty: false,
            },
            None => Self {
                next_part: min.0,
                min,
                max: min,
                empty: true,
            },
        }
    }
}

impl Iterator for LogRangePlan {
    type Item = LogPart;

    fn next(&mut self) -> Option<LogPart> {
        if self.empty || self.next_part > self.max.0 {
            return None;
        }

        let part = self.next_part;
        let clust_from = if part == self.min.0 { self.min.1 } else { 0 };
        let clust_to = if part == self.max.0 {
            self.max.1
        } else {
            MAX_CLUSTERING
        };

        if part == self.max.0 {
            self.empty = true;
        } else {
            self.next_part += 1;
        }

        Some(LogPart {
            part,
            clust_from,
            clust_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(start: u64, count: ReadCount) -> Vec<String> {
        LogRangePlan::new(Offset(start), count)
            .map(|p| format!("{}: {}…{}", p.part, p.clust_from, p.clust_to))
            .collect()
    }

    #[test]
    fn test_read_whole_first_partition() {
        assert_eq!(parts(0, 4096.into()), vec!["0: 0…4095"]);
    }

    #[test]
    fn test_read_head_of_first_partition() {
        assert_eq!(parts(0, 8.into()), vec!["0: 0…7"]);
    }

    #[test]
    fn test_read_tail_of_first_partition() {
        assert_eq!(parts(4090, 6.into()), vec!["0: 4090…4095"]);
    }

    #[test]
    fn test_read_across_partition_boundary() {
        assert_eq!(parts(4090, 10.into()), vec!["0: 4090…4095", "1: 0…3"]);
    }

    fn part(part: i64, clust_from: i16, clust_to: i16) -> LogPart {
        LogPart {
            part,
            clust_from,
            clust_to,
        }
    }

    #[test]
    fn test_read_ten_thousand_from_4000() {
        let plan: Vec<LogPart> = LogRangePlan::new(Offset(4000), 10_000.into()).collect();
        assert_eq!(
            plan,
            vec![
                part(0, 4000, 4095),
                part(1, 0, 4095),
                part(2, 0, 4095),
                part(3, 0, 1711),
            ]
        );
        let total: u64 = plan
            .iter()
            .map(|p| (p.clust_to - p.clust_from) as u64 + 1)
            .sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn test_zero_count_plans_nothing() {
        assert!(parts(0, 0.into()).is_empty());
        assert!(parts(12_345, 0.into()).is_empty());
    }

    #[test]
    fn test_exact_partition_boundary_needs_two_parts() {
        assert_eq!(parts(1, 4096.into()), vec!["0: 1…4095", "1: 0…0"]);
    }

    #[test]
    fn test_read_to_the_end_is_unbounded() {
        let mut plan = LogRangePlan::new(Offset(4000), ReadCount::ToTheEnd);
        assert_eq!(
            plan.next(),
            Some(part(0, 4000, 4095))
        );
        let later: Vec<LogPart> = plan.take(1000).collect();
        assert_eq!(later.len(), 1000);
        assert!(later.iter().all(|p| p.clust_from == 0 && p.clust_to == 4095));
    }

    #[test]
    fn test_huge_count_saturates() {
        let mut plan = LogRangePlan::new(Offset(u64::MAX - 1), u64::MAX.into());
        assert_eq!(
            plan.next(),
            Some(LogPart {
                part: (1i64 << 52) - 1,
                clust_from: 4094,
                clust_to: 4095
            })
        );
        assert_eq!(plan.next(), None);
    }

    #[test]
    fn test_bounds_flags() {
        let p = part(0, 0, 4095);
        assert!(!p.has_lower_bound() && !p.has_upper_bound());
        let p = part(0, 1, 4094);
        assert!(p.has_lower_bound() && p.has_upper_bound());
    }

    #[test]
    fn test_plans_cover_range_without_gaps() {
        for start in [0u64, 1, 4095, 4096, 10_000, 1 << 33] {
            for count in [1u64, 2, 4095, 4096, 4097, 9000, 20_000] {
                let plan: Vec<LogPart> = LogRangePlan::new(Offset(start), count.into()).collect();
                let mut expected = start;
                for p in &plan {
                    assert_eq!(p.first_offset().0, expected, "gap at {start}+{count}");
                    assert!(p.first_offset() <= p.last_offset());
                    expected = p.last_offset().0 + 1;
                }
                assert_eq!(expected, start + count, "coverage mismatch at {start}+{count}");
            }
        }
    }
}
