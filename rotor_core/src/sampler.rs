//! Per-cycle height and yaw sampling.
//!
//! The sampler owns the ADC and the height filter. Each cycle it converts
//! once, folds the code into the moving average, reads the decoder's yaw and
//! publishes both to the control feeds (every cycle) and to the display
//! feeds (every Nth cycle).
use crate::error::FatalError;
use crate::mailbox::Feed;
use crate::quadrature::QuadratureDecoder;
use crate::ring_filter::RingFilter;
use rotor_traits::HeightAdc;
use std::sync::Arc;

/// One sampler cycle's readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub raw: u32,
    pub filtered: u32,
    pub yaw: i32,
}

/// Downstream feeds written by the sampler.
#[derive(Debug, Clone)]
pub struct SamplerFeeds {
    pub height_control: Feed<u32>,
    pub yaw_control: Feed<i32>,
    pub height_display: Feed<u32>,
    pub yaw_display: Feed<i32>,
}

pub struct Sampler<A> {
    adc: A,
    filter: RingFilter,
    decoder: Arc<QuadratureDecoder>,
    feeds: SamplerFeeds,
    display_decimation: u32,
    cycles: u64,
}

impl<A: HeightAdc> Sampler<A> {
    pub fn new(
        adc: A,
        filter: RingFilter,
        decoder: Arc<QuadratureDecoder>,
        feeds: SamplerFeeds,
        display_decimation: u32,
    ) -> Self {
        Self {
            adc,
            filter,
            decoder,
            feeds,
            display_decimation: display_decimation.max(1),
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn filter(&self) -> &RingFilter {
        &self.filter
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    pub fn cycle(&mut self) -> Result<Sample, FatalError> {
        self.adc.trigger_conversion();
        let raw = self.adc.read_conversion();
        self.filter.write(raw);
        let filtered = self.filter.mean();
        let yaw = self.decoder.current_yaw();

        self.feeds.yaw_control.publish(yaw)?;
        self.feeds.height_control.publish(filtered)?;
        if self.cycles % u64::from(self.display_decimation) == 0 {
            self.feeds.height_display.publish(filtered)?;
            self.feeds.yaw_display.publish(yaw)?;
        }
        self.cycles += 1;

        tracing::trace!(raw, filtered, yaw, "sampled");
        Ok(Sample { raw, filtered, yaw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::feed;
    use crate::ring_filter::PrefillPolicy;

    struct StepAdc(Vec<u32>, usize, u32);

    impl HeightAdc for StepAdc {
        fn trigger_conversion(&mut self) {
            self.2 += 1;
        }
        fn read_conversion(&mut self) -> u32 {
            let v = self.0[self.1 % self.0.len()];
            self.1 += 1;
            v
        }
    }

    #[test]
    fn publishes_control_every_cycle_and_display_decimated() {
        let (hc, mut hc_rx) = feed("hc", 16, 0u32);
        let (yc, yc_rx) = feed("yc", 16, 0i32);
        let (hd, hd_rx) = feed("hd", 16, 0u32);
        let (yd, _yd_rx) = feed("yd", 16, 0i32);
        let decoder = Arc::new(QuadratureDecoder::new(false, false));
        let mut s = Sampler::new(
            StepAdc(vec![1000], 0, 0),
            RingFilter::new(5, PrefillPolicy::Zeros).unwrap(),
            decoder,
            SamplerFeeds {
                height_control: hc,
                yaw_control: yc,
                height_display: hd,
                yaw_display: yd,
            },
            5,
        );
        let first = s.cycle().unwrap();
        assert_eq!(first.filtered, 200);
        for _ in 0..5 {
            s.cycle().unwrap();
        }
        assert_eq!(yc_rx.pending(), 6);
        assert_eq!(hd_rx.pending(), 2);
        assert_eq!(hc_rx.latest(), 1000);
        assert_eq!(s.adc_mut().2, 6);
    }

    #[test]
    fn undrained_control_feed_overflows() {
        let (hc, _hc_rx) = feed("height control feed", 2, 0u32);
        let (yc, _yc_rx) = feed("yaw control feed", 8, 0i32);
        let (hd, _hd_rx) = feed("hd", 8, 0u32);
        let (yd, _yd_rx) = feed("yd", 8, 0i32);
        let mut s = Sampler::new(
            StepAdc(vec![5], 0, 0),
            RingFilter::new(1, PrefillPolicy::Zeros).unwrap(),
            Arc::new(QuadratureDecoder::new(false, false)),
            SamplerFeeds {
                height_control: hc,
                yaw_control: yc,
                height_display: hd,
                yaw_display: yd,
            },
            100,
        );
        s.cycle().unwrap();
        s.cycle().unwrap();
        assert_eq!(
            s.cycle().unwrap_err(),
            FatalError::MailboxOverflow("height control feed")
        );
    }
}
