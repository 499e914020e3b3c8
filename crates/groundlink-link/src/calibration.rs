//! Per-channel linear calibration.

use std::collections::HashMap;

use groundlink_wire::ChannelId;

/// Linear `raw -> physical units` transforms, one per sensor channel.
///
/// The `(scale, offset)` pairs come from an external curve-fitting step
/// run during stand bring-up; this table only applies them.
#[derive(Debug, Default, Clone)]
pub struct CalibrationTable {
    entries: HashMap<ChannelId, (f64, f64)>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the transform for a channel.
    pub fn register(&mut self, channel: ChannelId, scale: f64, offset: f64) {
        self.entries.insert(channel, (scale, offset));
    }

    /// Drop every registered transform.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The registered `(scale, offset)` pair for a channel, if any.
    pub fn get(&self, channel: ChannelId) -> Option<(f64, f64)> {
        self.entries.get(&channel).copied()
    }

    /// Apply the channel's transform to a raw reading.
    ///
    /// A lookup miss is not an error: during bring-up channels routinely
    /// have no calibration configured yet, and the defined sentinel for
    /// that state is `0.0`.
    pub fn apply(&self, channel: ChannelId, raw: u64) -> f64 {
        match self.entries.get(&channel) {
            Some(&(scale, offset)) => raw as f64 * scale + offset,
            None => 0.0,
        }
    }

    /// Number of channels with a registered transform.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
