//! Quadrature yaw decoder.
//!
//! Edge handlers feed the current phase levels; the decoder looks up the
//! direction from the previous and current 2-bit phase, moves a bounded tick
//! counter and publishes it through a single packed atomic word, so readers
//! never see a counter that disagrees with the phase it was derived from.
use rotor_traits::EdgeSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Encoder ticks per full revolution.
pub const TICKS_PER_REV: i32 = 448;
/// Counter upper bound; anything above wraps by one revolution.
pub const TICK_MAX: i32 = 224;
/// Counter lower bound; anything below wraps by one revolution.
pub const TICK_MIN: i32 = -223;

/// Indexed by `prevB<<3 | prevA<<2 | curB<<1 | curA`.
const DIRECTION_TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    Still,
    Anticlockwise,
}

impl Direction {
    /// Tick delta for this direction (clockwise counts up).
    pub const fn delta(self) -> i32 {
        match self {
            Self::Clockwise => 1,
            Self::Still => 0,
            Self::Anticlockwise => -1,
        }
    }
}

/// Pack two phase levels as `B<<1 | A`.
#[inline]
pub const fn phase_bits(phase_a: bool, phase_b: bool) -> u8 {
    ((phase_b as u8) << 1) | phase_a as u8
}

/// Direction of travel between two 2-bit phase states.
///
/// Illegal transitions (both bits flipping) and repeats decode as `Still`.
pub const fn direction(prev: u8, cur: u8) -> Direction {
    let index = (((prev & 0b11) << 2) | (cur & 0b11)) as usize;
    match DIRECTION_TABLE[index] {
        -1 => Direction::Clockwise,
        1 => Direction::Anticlockwise,
        _ => Direction::Still,
    }
}

/// Apply one step and fold the counter back into `[TICK_MIN, TICK_MAX]`.
#[inline]
pub const fn step_counter(counter: i32, dir: Direction) -> i32 {
    let next = counter + dir.delta();
    if next > TICK_MAX {
        next - TICKS_PER_REV
    } else if next < TICK_MIN {
        next + TICKS_PER_REV
    } else {
        next
    }
}

/// Degrees for a tick count, truncated toward zero.
#[inline]
pub const fn ticks_to_degrees(ticks: i32) -> i32 {
    ticks * 360 / TICKS_PER_REV
}

const PHASE_SHIFT: u32 = 32;

#[inline]
const fn pack(counter: i32, phase: u8) -> u64 {
    ((phase as u64) << PHASE_SHIFT) | (counter as u32 as u64)
}

#[inline]
const fn unpack(word: u64) -> (i32, u8) {
    (word as u32 as i32, ((word >> PHASE_SHIFT) & 0b11) as u8)
}

#[derive(Debug)]
pub struct QuadratureDecoder {
    /// Low 32 bits: counter. Bits 32..34: last phase.
    state: AtomicU64,
    reference_armed: AtomicBool,
    reference_seen: AtomicBool,
}

impl QuadratureDecoder {
    /// Start at zero ticks with the phase levels read at power-up.
    pub fn new(phase_a: bool, phase_b: bool) -> Self {
        Self {
            state: AtomicU64::new(pack(0, phase_bits(phase_a, phase_b))),
            reference_armed: AtomicBool::new(true),
            reference_seen: AtomicBool::new(false),
        }
    }

    /// Feed the phase levels observed after an edge on either pin.
    pub fn update(&self, phase_a: bool, phase_b: bool) -> Direction {
        let cur = phase_bits(phase_a, phase_b);
        let mut dir = Direction::Still;
        // The closure always returns Some, so this cannot fail.
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (counter, prev) = unpack(word);
                dir = direction(prev, cur);
                Some(pack(step_counter(counter, dir), cur))
            });
        dir
    }

    pub fn ticks(&self) -> i32 {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    /// Current yaw in degrees, in `(-180, 180]`.
    pub fn current_yaw(&self) -> i32 {
        ticks_to_degrees(self.ticks())
    }

    /// Falling edge on the reference pin. Only the first call has any
    /// effect: it records the marker and disarms itself. The counter is
    /// left untouched.
    pub fn mark_reference(&self) -> bool {
        if self.reference_armed.swap(false, Ordering::AcqRel) {
            self.reference_seen.store(true, Ordering::Release);
            tracing::debug!(ticks = self.ticks(), "yaw reference found");
            true
        } else {
            false
        }
    }

    pub fn reference_seen(&self) -> bool {
        self.reference_seen.load(Ordering::Acquire)
    }
}

impl EdgeSink for QuadratureDecoder {
    fn on_phase_edge(&self, phase_a: bool, phase_b: bool) {
        self.update(phase_a, phase_b);
    }

    fn on_reference_edge(&self) {
        self.mark_reference();
    }
}
