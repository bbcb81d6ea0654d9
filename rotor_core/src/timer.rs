//! Loop timing from a decrementing hardware counter.
use rotor_traits::TickCounter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerCfg {
    pub reload_threshold: u32,
    pub reload_value: u32,
    pub ms_per_tick: f64,
}

impl Default for TimerCfg {
    fn default() -> Self {
        Self {
            reload_threshold: 400_000_000,
            reload_value: 1_000_000_000,
            ms_per_tick: 12.5e-6,
        }
    }
}

#[derive(Debug)]
pub struct ElapsedTimer {
    cfg: TimerCfg,
    last: u32,
}

impl ElapsedTimer {
    /// Load the counter with the reload value and start measuring from it.
    pub fn start<T: TickCounter + ?Sized>(cfg: TimerCfg, ticks: &mut T) -> Self {
        ticks.reload(cfg.reload_value);
        Self {
            cfg,
            last: cfg.reload_value,
        }
    }

    /// Whole milliseconds since the previous call (truncated).
    ///
    /// Once the counter has run below the threshold it is reloaded, so the
    /// next interval is measured from the reload value.
    pub fn elapsed_ms<T: TickCounter + ?Sized>(&mut self, ticks: &mut T) -> u32 {
        let now = ticks.current_ticks();
        let dt = (f64::from(self.last.wrapping_sub(now)) * self.cfg.ms_per_tick) as u32;
        self.last = now;
        if self.last < self.cfg.reload_threshold {
            tracing::trace!(now, "loop timer reloaded");
            self.last = self.cfg.reload_value;
            ticks.reload(self.cfg.reload_value);
        }
        dt
    }
}
