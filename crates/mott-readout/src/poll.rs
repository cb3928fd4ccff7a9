//! Bounded busy-polling.
//!
//! Readout waits on module status registers with a fixed number of reads and
//! no sleep, so the worst case per trigger is known up front.

/// Status reads before a wait is given up.
pub const MAX_POLL_ATTEMPTS: u32 = 100;

/// Result of [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The condition held.
    Ready {
        /// The value that satisfied it.
        value: T,
        /// Reads taken, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed.
    Expired {
        /// Value of the final read.
        last: T,
        /// Reads taken.
        attempts: u32,
    },
}

impl<T> PollOutcome<T> {
    /// True for [`PollOutcome::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// The last value read, ready or not.
    pub fn value(&self) -> &T {
        match self {
            Self::Ready { value, .. } => value,
            Self::Expired { last, .. } => last,
        }
    }

    /// Reads taken.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::Expired { attempts, .. } => *attempts,
        }
    }
}

/// Call `probe` until `done` accepts its value, at most `max_attempts` times
/// (at least once).
pub fn poll_until<T>(
    max_attempts: u32,
    mut probe: impl FnMut() -> T,
    done: impl Fn(&T) -> bool,
) -> PollOutcome<T> {
    let limit = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        let value = probe();
        attempts += 1;
        if done(&value) {
            return PollOutcome::Ready { value, attempts };
        }
        if attempts >= limit {
            return PollOutcome::Expired {
                last: value,
                attempts,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_on_first_read() {
        let out = poll_until(MAX_POLL_ATTEMPTS, || true, |r| *r);
        assert_eq!(out, PollOutcome::Ready { value: true, attempts: 1 });
    }

    #[test]
    fn test_ready_on_last_allowed_read() {
        let mut n = 0;
        let out = poll_until(
            MAX_POLL_ATTEMPTS,
            || {
                n += 1;
                n
            },
            |v| *v == MAX_POLL_ATTEMPTS,
        );
        assert!(out.is_ready());
        assert_eq!(out.attempts(), MAX_POLL_ATTEMPTS);
    }

    #[test]
    fn test_expires_after_bound() {
        let mut reads = 0;
        let out = poll_until(
            MAX_POLL_ATTEMPTS,
            || {
                reads += 1;
                0b0100u32
            },
            |mask| mask & 0b1100 == 0b1100,
        );
        assert_eq!(reads, MAX_POLL_ATTEMPTS);
        assert_eq!(
            out,
            PollOutcome::Expired {
                last: 0b0100,
                attempts: MAX_POLL_ATTEMPTS
            }
        );
        assert_eq!(*out.value(), 0b0100);
    }

    #[test]
    fn test_zero_bound_still_reads_once() {
        let out = poll_until(0, || 5u32, |_| false);
        assert_eq!(out.attempts(), 1);
    }
}
