pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Height sensor ADC. Conversion is processor-triggered and polled; by the
/// time `read_conversion` is called the result is assumed ready.
pub trait HeightAdc {
    fn trigger_conversion(&mut self);
    /// Raw 12-bit code in `0..=4095`.
    fn read_conversion(&mut self) -> u32;
}

/// Free-running, decrementing hardware counter used to measure loop time.
pub trait TickCounter {
    fn current_ticks(&self) -> u32;
    /// Load a new starting value; the counter keeps decrementing from it.
    fn reload(&mut self, value: u32);
}

/// Receiver of quadrature edge events (phase A/B levels after the edge)
/// and of the one-shot reference marker.
///
/// Implementations run in interrupt/callback context and must be callable
/// concurrently from several pins.
pub trait EdgeSink: Send + Sync {
    fn on_phase_edge(&self, phase_a: bool, phase_b: bool);
    fn on_reference_edge(&self);
}
