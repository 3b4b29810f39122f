/// Gaps at or above this are treated as a stream reset rather than loss.
pub const MAX_LOSS_GAP: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LastSequence {
    #[default]
    Uninitialized,
    Seen(u16),
}

/// Classification of one observed sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// First packet on the track.
    Initialized,
    InOrder,
    Lost {
        expected: u16,
        received: u16,
        missing: u16,
    },
    /// Duplicate, reorder or restart; loss is not adjusted.
    Discontinuity { gap: u16 },
}

/// Per-track loss estimator over 16-bit wrapping transport sequence numbers.
#[derive(Debug, Clone, Default)]
pub struct SequenceLossEstimator {
    last: LastSequence,
    received: u64,
    lost: u64,
}

impl SequenceLossEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sequence: u16) -> SequenceEvent {
        self.received += 1;

        let event = match self.last {
            LastSequence::Uninitialized => SequenceEvent::Initialized,
            LastSequence::Seen(last) => {
                let gap = sequence.wrapping_sub(last);
                match gap {
                    1 => SequenceEvent::InOrder,
                    gap if gap > 1 && gap < MAX_LOSS_GAP => {
                        let missing = gap - 1;
                        self.lost += u64::from(missing);
                        SequenceEvent::Lost {
                            expected: last.wrapping_add(1),
                            received: sequence,
                            missing,
                        }
                    }
                    _ => SequenceEvent::Discontinuity { gap },
                }
            }
        };

        self.last = LastSequence::Seen(sequence);
        event
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn loss_rate_percent(&self) -> f64 {
        loss_rate_percent(self.received, self.lost)
    }
}

/// `lost / (received + lost) * 100`, or 0 with nothing observed.
pub fn loss_rate_percent(received: u64, lost: u64) -> f64 {
    let total = received + lost;
    if total == 0 {
        return 0.0;
    }
    lost as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loss_after(last: u16, current: u16) -> (SequenceEvent, u64) {
        let mut est = SequenceLossEstimator::new();
        est.observe(last);
        let event = est.observe(current);
        (event, est.lost())
    }

    #[test]
    fn test_first_packet_initializes() {
        let mut est = SequenceLossEstimator::new();
        assert_eq!(est.observe(4242), SequenceEvent::Initialized);
        assert_eq!(est.lost(), 0);
        assert_eq!(est.received(), 1);
    }

    #[test]
    fn test_in_order_no_loss() {
        assert_eq!(loss_after(10, 11), (SequenceEvent::InOrder, 0));
        assert_eq!(loss_after(u16::MAX, 0), (SequenceEvent::InOrder, 0));
    }

    #[test]
    fn test_gap_counts_missing_packets() {
        let (event, lost) = loss_after(100, 105);
        assert_eq!(lost, 4);
        assert_eq!(
            event,
            SequenceEvent::Lost {
                expected: 101,
                received: 105,
                missing: 4
            }
        );

        // across the wrap: 65534 -> 2 skips 65535, 0, 1
        assert_eq!(loss_after(65534, 2).1, 3);
        // largest counted gap
        assert_eq!(loss_after(0, 999).1, 998);
    }

    #[test]
    fn test_reset_and_duplicates_ignored() {
        assert_eq!(
            loss_after(7, 7),
            (SequenceEvent::Discontinuity { gap: 0 }, 0)
        );
        assert_eq!(
            loss_after(0, 1000),
            (SequenceEvent::Discontinuity { gap: 1000 }, 0)
        );
        // reorder: one step back is a gap of 65535
        assert_eq!(
            loss_after(500, 499),
            (SequenceEvent::Discontinuity { gap: u16::MAX }, 0)
        );
    }

    #[test]
    fn test_gap_policy_over_all_gaps() {
        for gap in 0..=u16::MAX {
            let last = 40_000u16;
            let (_, lost) = loss_after(last, last.wrapping_add(gap));
            let expected = if gap > 1 && gap < MAX_LOSS_GAP {
                u64::from(gap - 1)
            } else {
                0
            };
            assert_eq!(lost, expected, "gap {gap}");
        }
    }

    #[test]
    fn test_reference_follows_latest_sequence() {
        let mut est = SequenceLossEstimator::new();
        est.observe(10);
        est.observe(5000); // reset
        assert_eq!(est.observe(5001), SequenceEvent::InOrder);
        assert_eq!(est.lost(), 0);
    }

    #[test]
    fn test_loss_rate() {
        assert_eq!(loss_rate_percent(99, 1), 1.0);
        assert_eq!(loss_rate_percent(0, 0), 0.0);

        let mut est = SequenceLossEstimator::new();
        est.observe(1);
        est.observe(3);
        // 2 received, 1 lost
        assert!((est.loss_rate_percent() - 100.0 / 3.0).abs() < 1e-9);
    }
}
