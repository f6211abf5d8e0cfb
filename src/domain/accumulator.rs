//! In-memory running total of streamed readings awaiting upload.

/// A drained snapshot of the accumulator, handed to the uploader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch {
    pub total: f64,
    pub samples: u64,
}

/// Running calorie total plus sample count for the streaming session.
///
/// Mutated only from the session's single consumer loop, so `drain` is
/// atomic with respect to notification-driven additions: no sample can
/// land between the read and the reset.
#[derive(Debug, Default)]
pub struct ReadingAccumulator {
    total: f64,
    samples: u64,
}

impl ReadingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.total += value;
        self.samples += 1;
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Read-and-reset. The returned batch is the uploader's to deliver.
    pub fn drain(&mut self) -> Batch {
        let batch = Batch {
            total: self.total,
            samples: self.samples,
        };
        self.total = 0.0;
        self.samples = 0;
        batch
    }

    /// Return a failed batch so no reading is lost to a transient upload
    /// failure. The amount merges with anything accumulated since the
    /// drain; this is at-least-once delivery, and per-sample batch
    /// boundaries are not preserved across failures, only the total.
    pub fn restore(&mut self, batch: Batch) {
        self.total += batch.total;
        self.samples += batch.samples;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_sum_and_resets() {
        let mut acc = ReadingAccumulator::new();
        acc.add(10.0);
        acc.add(15.0);
        let batch = acc.drain();
        assert_eq!(batch, Batch { total: 25.0, samples: 2 });
        assert_eq!(acc.total(), 0.0);
    }

    #[test]
    fn restore_merges_with_later_samples() {
        let mut acc = ReadingAccumulator::new();
        acc.add(10.0);
        acc.add(15.0);
        let failed = acc.drain();
        acc.add(5.0); // arrives while the failed upload is in flight
        acc.restore(failed);
        let next = acc.drain();
        assert_eq!(next.total, 30.0);
        assert_eq!(next.samples, 3);
    }
}
