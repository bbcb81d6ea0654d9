//! Fixed-capacity moving-average buffer.
//!
//! Writes overwrite the oldest slot; the mean is rounded half-up in integer
//! arithmetic. Storage is allocated once at construction.
use crate::error::BuildError;

/// Policy for slots that have not been written yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrefillPolicy {
    /// Unwritten slots hold zero and count toward the mean.
    #[default]
    Zeros,
    /// The first write is copied into every slot.
    FirstSample,
}

#[derive(Debug, Clone)]
pub struct RingFilter {
    buf: Box<[u32]>,
    /// Index of the next slot to write (also the oldest value).
    head: usize,
    prefill: PrefillPolicy,
    primed: bool,
}

impl RingFilter {
    pub fn new(capacity: usize, prefill: PrefillPolicy) -> Result<Self, BuildError> {
        if capacity == 0 {
            return Err(BuildError::ZeroCapacity);
        }
        Ok(Self {
            buf: vec![0; capacity].into_boxed_slice(),
            head: 0,
            prefill,
            primed: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn write(&mut self, value: u32) {
        if !self.primed {
            self.primed = true;
            if self.prefill == PrefillPolicy::FirstSample {
                self.buf.fill(value);
            }
        }
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.buf.len();
    }

    /// All `capacity` slots, oldest first. Restartable; does not consume.
    pub fn read_in_order(&self) -> impl Iterator<Item = u32> + '_ {
        let (newer, older) = self.buf.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    /// `(2*sum + n) / (2*n)`: mean rounded half-up.
    pub fn mean(&self) -> u32 {
        let n = self.buf.len() as u64;
        let sum: u64 = self.buf.iter().map(|&v| u64::from(v)).sum();
        // sum <= n * u32::MAX, so the quotient fits in u32
        ((2 * sum + n) / (2 * n)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            RingFilter::new(0, PrefillPolicy::Zeros).unwrap_err(),
            BuildError::ZeroCapacity
        );
    }

    #[test]
    fn startup_mean_is_biased_by_zero_slots() {
        let mut f = RingFilter::new(5, PrefillPolicy::Zeros).unwrap();
        f.write(1000);
        assert_eq!(f.mean(), 200);
    }

    #[test]
    fn first_sample_prefill_removes_startup_bias() {
        let mut f = RingFilter::new(5, PrefillPolicy::FirstSample).unwrap();
        f.write(1000);
        assert_eq!(f.mean(), 1000);
        f.write(0);
        assert_eq!(f.mean(), 800);
    }

    #[test]
    fn read_in_order_is_oldest_first_after_wrap() {
        let mut f = RingFilter::new(3, PrefillPolicy::Zeros).unwrap();
        for v in 1..=4 {
            f.write(v);
        }
        assert_eq!(f.read_in_order().collect::<Vec<_>>(), vec![2, 3, 4]);
        // restartable
        assert_eq!(f.read_in_order().count(), 3);
    }
}
