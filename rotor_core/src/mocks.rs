//! Test and helper mocks for rotor_core

use rotor_traits::{HeightAdc, TickCounter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// ADC that replays a fixed script, repeating the last code once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedAdc {
    codes: Vec<u32>,
    next: usize,
    triggers: u64,
}

impl ScriptedAdc {
    pub fn new(codes: Vec<u32>) -> Self {
        Self {
            codes,
            next: 0,
            triggers: 0,
        }
    }

    /// Always reads `code`.
    pub fn constant(code: u32) -> Self {
        Self::new(vec![code])
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }
}

impl HeightAdc for ScriptedAdc {
    fn trigger_conversion(&mut self) {
        self.triggers += 1;
    }

    fn read_conversion(&mut self) -> u32 {
        let i = self.next.min(self.codes.len().saturating_sub(1));
        self.next += 1;
        self.codes.get(i).copied().unwrap_or(0)
    }
}

/// Tick counter whose value is driven from outside through a shared handle.
#[derive(Debug, Clone, Default)]
pub struct ManualTicks {
    value: Arc<AtomicU32>,
    reloads: Arc<AtomicU32>,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `ms` of loop time pass at `ms_per_tick`.
    pub fn advance_ms(&self, ms: u32, ms_per_tick: f64) {
        let ticks = crate::util::ms_to_ticks(ms, ms_per_tick);
        let _ = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(ticks))
            });
    }

    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::Acquire)
    }
}

impl TickCounter for ManualTicks {
    fn current_ticks(&self) -> u32 {
        self.value()
    }

    fn reload(&mut self, value: u32) {
        self.value.store(value, Ordering::Release);
        self.reloads.fetch_add(1, Ordering::AcqRel);
    }
}
