//! Phase edge forwarding from one waiting thread.
//!
//! Interrupts on both phase pins are taken one at a time, and every dispatch
//! reads both levels. The sink therefore sees pairs the pins really showed,
//! in the order the events were taken.
use crate::error::Result;
use rotor_traits::EdgeSink;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run until `stop` is set or `wait` fails.
///
/// `wait` blocks for the next phase interrupt and returns `true` if one
/// fired, `false` on timeout. `levels` reads `(phase_a, phase_b)`. Returns
/// the number of edges forwarded.
pub fn forward_phase_edges<W, L>(
    mut wait: W,
    levels: L,
    sink: &dyn EdgeSink,
    stop: &AtomicBool,
) -> Result<u64>
where
    W: FnMut() -> Result<bool>,
    L: Fn() -> (bool, bool),
{
    let mut edges = 0u64;
    while !stop.load(Ordering::Acquire) {
        if wait()? {
            let (a, b) = levels();
            sink.on_phase_edge(a, b);
            edges += 1;
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HwError;
    use rotor_core::QuadratureDecoder;
    use std::cell::Cell;

    const CW: [(bool, bool); 4] = [(true, false), (true, true), (false, true), (false, false)];

    #[test]
    fn every_event_reads_both_pins() {
        let decoder = QuadratureDecoder::new(false, false);
        let stop = AtomicBool::new(false);
        let step = Cell::new(0usize);
        let n = forward_phase_edges(
            || {
                step.set(step.get() + 1);
                if step.get() == 12 {
                    stop.store(true, Ordering::Release);
                }
                // every third wait times out
                Ok(step.get() % 3 != 0)
            },
            || CW[(step.get() - step.get() / 3 - 1) % 4],
            &decoder,
            &stop,
        )
        .unwrap();
        assert_eq!(n, 8);
        assert_eq!(decoder.ticks(), 8);
    }

    #[test]
    fn double_flip_between_events_is_not_counted() {
        let decoder = QuadratureDecoder::new(false, false);
        let stop = AtomicBool::new(false);
        // 00 -> 10 -> 01: the second event saw both pins change
        let seen = [(true, false), (false, true)];
        let i = Cell::new(0usize);
        forward_phase_edges(
            || {
                if i.get() + 1 == seen.len() {
                    stop.store(true, Ordering::Release);
                }
                Ok(true)
            },
            || {
                let l = seen[i.get()];
                i.set(i.get() + 1);
                l
            },
            &decoder,
            &stop,
        )
        .unwrap();
        assert_eq!(decoder.ticks(), 1);
    }

    #[test]
    fn wait_failure_stops_forwarding() {
        let decoder = QuadratureDecoder::new(false, false);
        let stop = AtomicBool::new(false);
        let err = forward_phase_edges(
            || Err(HwError::Gpio("poll failed".into())),
            || (true, false),
            &decoder,
            &stop,
        )
        .unwrap_err();
        assert!(matches!(err, HwError::Gpio(_)));
        assert_eq!(decoder.ticks(), 0);
    }
}
