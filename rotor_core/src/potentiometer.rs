//! Operator potentiometer smoothing.
//!
//! Raw readings go through a first-sample-prefilled moving average. A new
//! value is reported only once the smoothed reading leaves a +/- `variance`
//! band around the last reported value.
use crate::error::BuildError;
use crate::ring_filter::{PrefillPolicy, RingFilter};
use rotor_traits::HeightAdc;

pub const DEFAULT_VARIANCE: u32 = 5;

#[derive(Debug, Clone)]
pub struct PotMonitor {
    filter: RingFilter,
    variance: u32,
    reported: u32,
}

impl PotMonitor {
    pub fn new(window: usize, variance: u32) -> Result<Self, BuildError> {
        Ok(Self {
            filter: RingFilter::new(window, PrefillPolicy::FirstSample)?,
            variance,
            reported: 0,
        })
    }

    pub fn reported(&self) -> u32 {
        self.reported
    }

    /// Feed one raw reading; returns the smoothed value when it moved.
    pub fn poll(&mut self, raw: u32) -> Option<u32> {
        self.filter.write(raw);
        let current = self.filter.mean();
        if current.abs_diff(self.reported) > self.variance {
            self.reported = current;
            tracing::info!(value = current, "potentiometer changed");
            Some(current)
        } else {
            None
        }
    }

    /// One conversion on `adc`, fed through `poll`.
    pub fn sample(&mut self, adc: &mut impl HeightAdc) -> Option<u32> {
        adc.trigger_conversion();
        let raw = adc.read_conversion();
        self.poll(raw)
    }
}
