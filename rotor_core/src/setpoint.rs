//! Operator target tables and index stepping.
use crate::error::FatalError;
use crate::mailbox::Feed;
use std::fmt;

/// Target heights, in height units above ground, selected by index.
pub const HEIGHT_TABLE: [i32; 11] = [0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];

/// Target headings in degrees, 15 degree steps. Index 12 is 179 rather than
/// 180 so every entry stays inside `(-180, 180)`.
pub const YAW_TABLE: [i32; 24] = [
    0, 15, 30, 45, 60, 75, 90, 105, 120, 135, 150, 165, 179, -165, -150, -135, -120, -105, -90,
    -75, -60, -45, -30, -15,
];

pub const HEIGHT_MAX_INDEX: usize = HEIGHT_TABLE.len() - 1;
pub const YAW_MAX_INDEX: usize = YAW_TABLE.len() - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Height,
    Yaw,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Height => "height",
            Self::Yaw => "yaw",
        })
    }
}

fn lookup(axis: Axis, table: &[i32], index: usize) -> Result<i32, FatalError> {
    table
        .get(index)
        .copied()
        .ok_or(FatalError::SetpointOutOfRange {
            axis,
            index,
            max: table.len() - 1,
        })
}

pub fn height_target(index: usize) -> Result<i32, FatalError> {
    lookup(Axis::Height, &HEIGHT_TABLE, index)
}

pub fn yaw_target(index: usize) -> Result<i32, FatalError> {
    lookup(Axis::Yaw, &YAW_TABLE, index)
}

/// Operator-side target selection.
///
/// Height saturates at both ends of its table; yaw wraps around. Every
/// change publishes both indices so the control loop never holds a stale
/// pairing.
pub struct TargetStepper {
    height: usize,
    yaw: usize,
    height_tx: Feed<usize>,
    yaw_tx: Feed<usize>,
}

impl TargetStepper {
    pub fn new(height_tx: Feed<usize>, yaw_tx: Feed<usize>) -> Self {
        Self {
            height: 0,
            yaw: 0,
            height_tx,
            yaw_tx,
        }
    }

    pub fn height_index(&self) -> usize {
        self.height
    }

    pub fn yaw_index(&self) -> usize {
        self.yaw
    }

    pub fn height_up(&mut self) -> Result<(), FatalError> {
        self.height = (self.height + 1).min(HEIGHT_MAX_INDEX);
        self.publish()
    }

    pub fn height_down(&mut self) -> Result<(), FatalError> {
        self.height = self.height.saturating_sub(1);
        self.publish()
    }

    pub fn yaw_right(&mut self) -> Result<(), FatalError> {
        self.yaw = (self.yaw + 1) % YAW_TABLE.len();
        self.publish()
    }

    pub fn yaw_left(&mut self) -> Result<(), FatalError> {
        self.yaw = self.yaw.checked_sub(1).unwrap_or(YAW_MAX_INDEX);
        self.publish()
    }

    /// Jump straight to the given indices (validated against the tables).
    pub fn set(&mut self, height: usize, yaw: usize) -> Result<(), FatalError> {
        height_target(height)?;
        yaw_target(yaw)?;
        self.height = height;
        self.yaw = yaw;
        self.publish()
    }

    fn publish(&self) -> Result<(), FatalError> {
        tracing::debug!(height = self.height, yaw = self.yaw, "targets changed");
        self.height_tx.publish(self.height)?;
        self.yaw_tx.publish(self.yaw)
    }
}
