//! Per-channel view record: the latest wire levels merged with the meter's
//! held peak. Pure projection, rebuilt on every update.

use crate::net::protocol::VuFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub ch: usize,
    pub rms_db: f64,
    pub peak_db: f64,
    pub held_peak_db: f64,
    pub clip: bool,
    pub limit: bool,
    pub protect: bool,
    pub reason: Option<String>,
}

impl ChannelView {
    /// Merge the latest frame with the engine's held peak for that channel.
    pub fn from_frame(frame: &VuFrame, held_peak_db: f64, floor_db: f64) -> Self {
        Self {
            ch: frame.ch,
            rms_db: frame.rms_db_or(floor_db),
            peak_db: frame.peak_db_or(floor_db),
            held_peak_db,
            clip: frame.clip,
            limit: frame.limit,
            protect: frame.protect,
            reason: frame.reason.clone().filter(|r| !r.is_empty()),
        }
    }
}
