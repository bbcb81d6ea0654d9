//! Quadrature encoder inputs on Raspberry Pi GPIO.
//!
//! Both phase pins raise synchronous interrupts on either edge and are
//! drained by a single edge thread (see `edges`). The reference pin uses an
//! asynchronous falling-edge interrupt; its ordering against phase edges
//! does not matter.
use crate::edges::forward_phase_edges;
use crate::error::{HwError, Result};
use rotor_traits::EdgeSink;
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the edge thread waits before re-checking for shutdown.
const EDGE_POLL: Duration = Duration::from_millis(50);

pub struct EncoderInputs {
    gpio: Gpio,
    phase_a: InputPin,
    phase_b: InputPin,
    reference: Option<InputPin>,
}

/// Encoder with interrupts armed. Dropping it stops the edge thread and
/// disarms the reference interrupt.
pub struct BoundEncoder {
    stop: Arc<AtomicBool>,
    edges: Option<JoinHandle<Result<u64>>>,
    _reference: Option<InputPin>,
}

impl Drop for BoundEncoder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.edges.take() {
            match handle.join() {
                Ok(Ok(n)) => tracing::info!(edges = n, "encoder edge thread stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "encoder edge thread failed"),
                Err(_) => tracing::error!("encoder edge thread panicked"),
            }
        }
    }
}

impl EncoderInputs {
    pub fn open(phase_a: u8, phase_b: u8, reference: Option<u8>) -> Result<Self> {
        if phase_a == phase_b {
            return Err(HwError::InvalidParam("phase pins must differ"));
        }
        let gpio = Gpio::new()?;
        let input = |pin: u8| -> Result<InputPin> {
            gpio.get(pin)
                .map(rppal::gpio::Pin::into_input_pullup)
                .map_err(|e| HwError::Pin {
                    pin,
                    reason: e.to_string(),
                })
        };
        let phase_a = input(phase_a)?;
        let phase_b = input(phase_b)?;
        let reference = reference.map(input).transpose()?;
        Ok(Self {
            gpio,
            phase_a,
            phase_b,
            reference,
        })
    }

    /// Levels to seed the decoder with.
    pub fn initial_phase(&self) -> (bool, bool) {
        (self.phase_a.is_high(), self.phase_b.is_high())
    }

    pub fn bind(self, sink: Arc<dyn EdgeSink>) -> Result<BoundEncoder> {
        let Self {
            gpio,
            mut phase_a,
            mut phase_b,
            mut reference,
        } = self;
        phase_a.set_interrupt(Trigger::Both)?;
        phase_b.set_interrupt(Trigger::Both)?;
        if let Some(pin) = reference.as_mut() {
            let sink = Arc::clone(&sink);
            pin.set_async_interrupt(Trigger::FallingEdge, move |_| sink.on_reference_edge())?;
        }
        tracing::info!(
            phase_a = phase_a.pin(),
            phase_b = phase_b.pin(),
            reference = ?reference.as_ref().map(InputPin::pin),
            "encoder interrupts armed"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let edges = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("encoder-edges".into())
                .spawn(move || {
                    forward_phase_edges(
                        || {
                            Ok(gpio
                                .poll_interrupts(&[&phase_a, &phase_b], false, Some(EDGE_POLL))?
                                .is_some())
                        },
                        || (phase_a.is_high(), phase_b.is_high()),
                        sink.as_ref(),
                        &stop,
                    )
                })?
        };
        Ok(BoundEncoder {
            stop,
            edges: Some(edges),
            _reference: reference,
        })
    }
}
