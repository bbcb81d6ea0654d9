//! Common time helpers for rotor_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Counter ticks covering `ms` milliseconds, rounded to the nearest tick.
/// Saturates at `u32::MAX`; a non-positive tick length yields 0.
#[inline]
pub fn ms_to_ticks(ms: u32, ms_per_tick: f64) -> u32 {
    if ms_per_tick <= 0.0 || !ms_per_tick.is_finite() {
        return 0;
    }
    let ticks = (f64::from(ms) / ms_per_tick).round();
    if ticks >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Loop rate in Hz for a measured cycle time (0 ms counts as 1 ms).
#[inline]
pub fn rate_hz(dt_ms: u32) -> u64 {
    MILLIS_PER_SEC / u64::from(dt_ms.max(1))
}
