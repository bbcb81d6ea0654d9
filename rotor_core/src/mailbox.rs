//! Bounded mailboxes between tasks.
//!
//! - `Feed`/`FeedReader`: multi-slot, non-blocking publish. A full feed means
//!   the consumer missed its deadline and is reported as fatal.
//! - `Duty`/`DutyReader`: single-slot actuator command, blocking publish with
//!   an optional bound.
//!
//! Readers use sample-and-hold: the newest queued value wins, and with nothing
//! queued the previously received value is returned again.
use crate::error::FatalError;
use crossbeam_channel as xch;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Feed<T> {
    tx: xch::Sender<T>,
    name: &'static str,
}

impl<T> Feed<T> {
    pub fn publish(&self, value: T) -> Result<(), FatalError> {
        self.tx.try_send(value).map_err(|e| match e {
            xch::TrySendError::Full(_) => FatalError::MailboxOverflow(self.name),
            xch::TrySendError::Disconnected(_) => FatalError::Disconnected(self.name),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub struct FeedReader<T> {
    rx: xch::Receiver<T>,
    held: T,
}

impl<T: Copy> FeedReader<T> {
    /// Drain everything queued and return the newest value (or the held one).
    pub fn latest(&mut self) -> T {
        if let Some(v) = self.rx.try_iter().last() {
            self.held = v;
        }
        self.held
    }

    /// Drain and return the newest value only if something new arrived.
    pub fn fresh(&mut self) -> Option<T> {
        let v = self.rx.try_iter().last()?;
        self.held = v;
        Some(v)
    }

    pub fn held(&self) -> T {
        self.held
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Create a feed of `capacity` slots whose reader holds `initial` until the
/// first value arrives.
pub fn feed<T>(name: &'static str, capacity: usize, initial: T) -> (Feed<T>, FeedReader<T>) {
    let (tx, rx) = xch::bounded(capacity);
    (Feed { tx, name }, FeedReader { rx, held: initial })
}

#[derive(Debug, Clone)]
pub struct Duty {
    tx: xch::Sender<u32>,
    name: &'static str,
    timeout: Option<Duration>,
}

impl Duty {
    /// Blocks while the previous command is still unconsumed.
    pub fn publish(&self, duty: u32) -> Result<(), FatalError> {
        match self.timeout {
            None => self
                .tx
                .send(duty)
                .map_err(|_| FatalError::Disconnected(self.name)),
            Some(t) => self.tx.send_timeout(duty, t).map_err(|e| match e {
                xch::SendTimeoutError::Timeout(_) => FatalError::PublishTimeout(self.name),
                xch::SendTimeoutError::Disconnected(_) => FatalError::Disconnected(self.name),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DutyReader {
    rx: xch::Receiver<u32>,
}

impl DutyReader {
    pub fn try_take(&self) -> Option<u32> {
        self.rx.try_recv().ok()
    }

    pub fn take_timeout(&self, timeout: Duration) -> Option<u32> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Single-slot duty mailbox. `timeout = None` blocks the publisher forever.
pub fn duty(name: &'static str, timeout: Option<Duration>) -> (Duty, DutyReader) {
    let (tx, rx) = xch::bounded(1);
    (Duty { tx, name, timeout }, DutyReader { rx })
}

/// Every mailbox of the rig, created together from one capacity.
pub struct Bus {
    pub height_control: (Feed<u32>, FeedReader<u32>),
    pub yaw_control: (Feed<i32>, FeedReader<i32>),
    pub height_display: (Feed<u32>, FeedReader<u32>),
    pub yaw_display: (Feed<i32>, FeedReader<i32>),
    pub target_height: (Feed<usize>, FeedReader<usize>),
    pub target_yaw: (Feed<usize>, FeedReader<usize>),
    pub main_duty: (Duty, DutyReader),
    pub tail_duty: (Duty, DutyReader),
}

impl Bus {
    pub fn new(capacity: usize, duty_timeout: Option<Duration>) -> Self {
        Self {
            height_control: feed("height control feed", capacity, 0),
            yaw_control: feed("yaw control feed", capacity, 0),
            height_display: feed("height display feed", capacity, 0),
            yaw_display: feed("yaw display feed", capacity, 0),
            target_height: feed("target height", capacity, 0),
            target_yaw: feed("target yaw", capacity, 0),
            main_duty: duty("main duty", duty_timeout),
            tail_duty: duty("tail duty", duty_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_feed_is_fatal_overflow() {
        let (tx, _rx) = feed("test feed", 2, 0u32);
        tx.publish(1).unwrap();
        tx.publish(2).unwrap();
        assert_eq!(tx.publish(3), Err(FatalError::MailboxOverflow("test feed")));
    }

    #[test]
    fn dropped_reader_is_disconnect() {
        let (tx, rx) = feed("test feed", 2, 0u32);
        drop(rx);
        assert_eq!(tx.publish(1), Err(FatalError::Disconnected("test feed")));
    }

    #[test]
    fn reader_holds_last_value() {
        let (tx, mut rx) = feed("test feed", 4, 7i32);
        assert_eq!(rx.latest(), 7);
        tx.publish(1).unwrap();
        tx.publish(2).unwrap();
        assert_eq!(rx.latest(), 2);
        assert_eq!(rx.latest(), 2);
        assert_eq!(rx.fresh(), None);
    }

    #[test]
    fn bounded_duty_publish_times_out_when_slot_taken() {
        let (tx, rx) = duty("main duty", Some(Duration::from_millis(5)));
        tx.publish(10).unwrap();
        assert_eq!(tx.publish(11), Err(FatalError::PublishTimeout("main duty")));
        assert_eq!(rx.try_take(), Some(10));
        assert_eq!(rx.try_take(), None);
    }
}
