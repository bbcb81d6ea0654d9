//! Ground reference for the height sensor.
//!
//! The sensor code falls as the rig climbs, so height above ground is
//! `ground - raw`, clamped at zero.
//!
//! Ground is seeded on the first cycle whose target height index is zero.
//! Until the height window has taken `warmup` samples the mean still carries
//! prefill, so the seeded value follows the filtered reading through the
//! warm-up and is frozen once the window is full. After that it never moves.

#[derive(Debug, Clone)]
pub struct GroundCalibration {
    ground: Option<u32>,
    frozen: bool,
    samples: usize,
    warmup: usize,
    warned_unset: bool,
}

impl Default for GroundCalibration {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GroundCalibration {
    /// `warmup` is the number of samples before the filtered mean is free of
    /// prefill; 1 when the filter is prefilled from its first sample.
    pub fn new(warmup: usize) -> Self {
        Self {
            ground: None,
            frozen: false,
            samples: 0,
            warmup: warmup.max(1),
            warned_unset: false,
        }
    }

    /// Called once per cycle with that cycle's filtered reading.
    pub fn observe(&mut self, target_index: usize, filtered: u32) {
        self.samples = self.samples.saturating_add(1);
        if self.frozen {
            return;
        }
        if self.ground.is_none() && target_index != 0 {
            return;
        }
        self.ground = Some(filtered);
        if self.samples >= self.warmup {
            self.frozen = true;
            tracing::info!(ground = filtered, "ground captured");
        } else {
            tracing::debug!(ground = filtered, samples = self.samples, "ground warming up");
        }
    }

    pub fn ground(&self) -> Option<u32> {
        self.ground
    }

    /// True once the ground can no longer change.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Height above the captured ground. Until ground is captured it is
    /// treated as 0, so every reading maps to 0.
    pub fn height_above_ground(&mut self, filtered: u32) -> u32 {
        let ground = match self.ground {
            Some(g) => g,
            None => {
                if !self.warned_unset {
                    self.warned_unset = true;
                    tracing::warn!("ground not captured; target height was nonzero at start");
                }
                0
            }
        };
        ground.saturating_sub(filtered)
    }
}
