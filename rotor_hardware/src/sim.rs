//! Simulated rotor rig.
//!
//! A first-order plant: height moves at a rate proportional to how far the
//! main duty is from hover, heading moves at a rate proportional to how far
//! the tail duty is from neutral. The plant is exposed through the same
//! seams as real hardware:
//! - `SimAdc` returns `ground - height` (plus optional noise) as a 12-bit code
//! - heading changes are turned into quadrature edges on an `EdgeSink`
//! - `SimTicks` is a decrementing counter advanced by `cycle_ms` per step
//! - `SimPot` is the operator potentiometer on a second ADC channel
use crate::error::{HwError, Result};
use rotor_traits::{EdgeSink, HeightAdc, TickCounter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Encoder ticks per revolution of the simulated rig.
pub const SIM_TICKS_PER_REV: i64 = 448;
/// Phase levels (A, B) in clockwise order, starting from 00.
const GRAY: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];
/// Upper bound on edges emitted in one step (two revolutions).
const MAX_EDGES_PER_STEP: i64 = 2 * SIM_TICKS_PER_REV;

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    /// ADC code with the rig on the ground.
    pub ground_raw: u32,
    /// Main duty at which height holds.
    pub hover_duty: u32,
    /// Height units per step per duty point above hover.
    pub climb_per_duty: f64,
    /// Tail duty at which heading holds.
    pub tail_neutral_duty: u32,
    /// Degrees per step per duty point below neutral (more tail turns back).
    pub spin_per_duty: f64,
    /// Peak ADC noise (counts).
    pub noise: u32,
    /// Loop time per step (ms).
    pub cycle_ms: u64,
    /// Tick counter resolution (ms per tick).
    pub ms_per_tick: f64,
    /// Initial potentiometer code.
    pub pot_raw: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            ground_raw: 3000,
            hover_duty: 50,
            climb_per_duty: 0.5,
            tail_neutral_duty: 40,
            spin_per_duty: 0.05,
            noise: 0,
            cycle_ms: 10,
            ms_per_tick: 12.5e-6,
            pot_raw: 2048,
        }
    }
}

impl SimParams {
    fn validate(&self) -> Result<()> {
        if self.ground_raw > 4095 {
            return Err(HwError::InvalidParam("ground_raw must be <= 4095"));
        }
        if self.pot_raw > 4095 {
            return Err(HwError::InvalidParam("pot_raw must be <= 4095"));
        }
        if !(self.climb_per_duty.is_finite() && self.spin_per_duty.is_finite()) {
            return Err(HwError::InvalidParam("plant rates must be finite"));
        }
        if !(self.ms_per_tick.is_finite() && self.ms_per_tick > 0.0) {
            return Err(HwError::InvalidParam("ms_per_tick must be > 0"));
        }
        Ok(())
    }

    fn ticks_per_step(&self) -> u32 {
        let t = (self.cycle_ms as f64 / self.ms_per_tick).round();
        if t >= f64::from(u32::MAX) { u32::MAX } else { t as u32 }
    }
}

#[derive(Debug)]
struct Plant {
    height: f64,
    yaw_deg: f64,
    /// Unbounded encoder position in ticks.
    encoder: i64,
    rng: u32,
}

impl Plant {
    fn next_noise(&mut self, amp: u32) -> i64 {
        if amp == 0 {
            return 0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        i64::from(x % (2 * amp + 1)) - i64::from(amp)
    }
}

fn lock(plant: &Mutex<Plant>) -> MutexGuard<'_, Plant> {
    // A panic while holding the lock leaves plain numbers behind; keep going.
    plant.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Height sensor view of the plant.
#[derive(Debug, Clone)]
pub struct SimAdc {
    plant: Arc<Mutex<Plant>>,
    ground_raw: u32,
    noise: u32,
    latched: u32,
}

impl HeightAdc for SimAdc {
    fn trigger_conversion(&mut self) {
        let mut p = lock(&self.plant);
        let n = p.next_noise(self.noise);
        let code = i64::from(self.ground_raw) - p.height.round() as i64 + n;
        self.latched = code.clamp(0, 4095) as u32;
    }

    fn read_conversion(&mut self) -> u32 {
        self.latched
    }
}

/// Loop timer view of the plant.
#[derive(Debug, Clone, Default)]
pub struct SimTicks {
    value: Arc<AtomicU32>,
}

impl TickCounter for SimTicks {
    fn current_ticks(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    fn reload(&mut self, value: u32) {
        self.value.store(value, Ordering::Release);
    }
}

/// Operator potentiometer. The knob is set from outside; conversions read
/// whatever it was last set to.
#[derive(Debug, Clone, Default)]
pub struct SimPot {
    code: Arc<AtomicU32>,
    latched: u32,
}

impl SimPot {
    /// Turn the knob; codes above 4095 read as 4095.
    pub fn set(&self, code: u32) {
        self.code.store(code.min(4095), Ordering::Release);
    }
}

impl HeightAdc for SimPot {
    fn trigger_conversion(&mut self) {
        self.latched = self.code.load(Ordering::Acquire);
    }

    fn read_conversion(&mut self) -> u32 {
        self.latched
    }
}

/// Plant state after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantSnapshot {
    pub height: f64,
    pub yaw_deg: f64,
    pub encoder: i64,
    pub main_duty: u32,
    pub tail_duty: u32,
}

pub struct SimRig {
    params: SimParams,
    plant: Arc<Mutex<Plant>>,
    ticks: SimTicks,
    pot: SimPot,
    sink: Arc<dyn EdgeSink>,
    main_duty: u32,
    tail_duty: u32,
    steps: u64,
}

impl SimRig {
    /// Start on the ground, heading 0, encoder at phase 00.
    pub fn new(params: SimParams, sink: Arc<dyn EdgeSink>) -> Result<Self> {
        params.validate()?;
        let pot_raw = params.pot_raw;
        Ok(Self {
            params,
            plant: Arc::new(Mutex::new(Plant {
                height: 0.0,
                yaw_deg: 0.0,
                encoder: 0,
                rng: 0x9E37_79B9,
            })),
            ticks: SimTicks::default(),
            pot: SimPot {
                code: Arc::new(AtomicU32::new(pot_raw)),
                latched: pot_raw,
            },
            sink,
            main_duty: 0,
            tail_duty: 0,
            steps: 0,
        })
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc {
            plant: Arc::clone(&self.plant),
            ground_raw: self.params.ground_raw,
            noise: self.params.noise,
            latched: self.params.ground_raw,
        }
    }

    pub fn ticks(&self) -> SimTicks {
        self.ticks.clone()
    }

    pub fn pot(&self) -> SimPot {
        self.pot.clone()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn set_main_duty(&mut self, duty: u32) {
        self.main_duty = duty.min(100);
    }

    pub fn set_tail_duty(&mut self, duty: u32) {
        self.tail_duty = duty.min(100);
    }

    pub fn snapshot(&self) -> PlantSnapshot {
        let p = lock(&self.plant);
        PlantSnapshot {
            height: p.height,
            yaw_deg: p.yaw_deg,
            encoder: p.encoder,
            main_duty: self.main_duty,
            tail_duty: self.tail_duty,
        }
    }

    /// Advance the plant by one loop period under the current duties.
    pub fn step(&mut self) -> PlantSnapshot {
        let p = &self.params;
        let climb = (f64::from(self.main_duty) - f64::from(p.hover_duty)) * p.climb_per_duty;
        let turn = (f64::from(p.tail_neutral_duty) - f64::from(self.tail_duty)) * p.spin_per_duty;
        let ceiling = f64::from(p.ground_raw);

        let (from, to) = {
            let mut plant = lock(&self.plant);
            plant.height = (plant.height + climb).clamp(0.0, ceiling);
            // Resting on the ground the rig cannot turn.
            if plant.height > 0.0 {
                plant.yaw_deg += turn;
            }
            let from = plant.encoder;
            let target = (plant.yaw_deg * SIM_TICKS_PER_REV as f64 / 360.0).round() as i64;
            let to = target.clamp(from - MAX_EDGES_PER_STEP, from + MAX_EDGES_PER_STEP);
            plant.encoder = to;
            (from, to)
        };
        self.emit_edges(from, to);

        self.ticks
            .value
            .fetch_sub(self.params.ticks_per_step(), Ordering::AcqRel);
        self.steps += 1;
        let snap = self.snapshot();
        tracing::trace!(
            height = snap.height,
            yaw = snap.yaw_deg,
            encoder = snap.encoder,
            "sim step"
        );
        snap
    }

    /// Turn the rig directly by `ticks` encoder steps (positive = clockwise).
    pub fn spin(&mut self, ticks: i64) {
        let (from, to) = {
            let mut plant = lock(&self.plant);
            let from = plant.encoder;
            plant.encoder += ticks;
            plant.yaw_deg += ticks as f64 * 360.0 / SIM_TICKS_PER_REV as f64;
            (from, plant.encoder)
        };
        self.emit_edges(from, to);
    }

    fn emit_edges(&self, from: i64, to: i64) {
        let dir: i64 = if to >= from { 1 } else { -1 };
        let mut pos = from;
        while pos != to {
            pos += dir;
            let (a, b) = GRAY[pos.rem_euclid(4) as usize];
            self.sink.on_phase_edge(a, b);
            if pos.rem_euclid(SIM_TICKS_PER_REV) == 0 {
                self.sink.on_reference_edge();
            }
        }
    }
}
