//! Peak-hold meter ballistics: rise instantly, hold, then decay linearly.
//!
//! Audio peaks last single-digit milliseconds and are invisible if drawn
//! instantaneously, so the meter holds the highest recent peak for a fixed
//! window before letting it fall at a constant dB/s rate. Samples only ever
//! raise the hold; decay is driven solely by the periodic tick, which keeps
//! the fall smooth regardless of how irregularly frames arrive off the wire.

use std::time::{Duration, Instant};

/// Meter ballistics tuning.
#[derive(Debug, Clone, Copy)]
pub struct MeterConfig {
    /// Decay tick interval in milliseconds.
    pub tick_ms: u64,
    /// How long a new peak is held before decay starts, in milliseconds.
    pub hold_ms: u64,
    /// Linear decay rate once the hold window has elapsed.
    pub drop_db_per_sec: f64,
    /// Minimum displayable level; effective silence.
    pub floor_db: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            hold_ms: 450,
            drop_db_per_sec: 10.0,
            floor_db: -80.0,
        }
    }
}

/// Per-channel hold state. Created lazily on the first sample.
#[derive(Debug, Clone, Copy)]
struct HoldSlot {
    held_db: f64,
    /// Latest RMS seen on this channel; the decay never passes below it.
    rms_db: f64,
    last_peak_at: Instant,
}

/// One meter engine per channel-selection scope: N channel slots indexed by
/// channel number, fed by `on_sample` and decayed by `on_tick`.
///
/// Never panics and never errors: non-finite input is coerced to the floor
/// and unknown channels get a slot on first contact.
#[derive(Debug)]
pub struct PeakHoldMeter {
    config: MeterConfig,
    slots: Vec<Option<HoldSlot>>,
    last_tick_at: Option<Instant>,
}

impl PeakHoldMeter {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            last_tick_at: None,
        }
    }

    pub fn config(&self) -> MeterConfig {
        self.config
    }

    /// Record a level observation for `ch`.
    ///
    /// The hold rises instantly when `peak_db` exceeds it (and on the first
    /// sample a channel ever reports); lower peaks leave it untouched.
    pub fn on_sample(&mut self, ch: usize, rms_db: f64, peak_db: f64, now: Instant) {
        let floor = self.config.floor_db;
        let rms = if rms_db.is_finite() { rms_db } else { floor };
        let peak = if peak_db.is_finite() { peak_db } else { floor };

        let slot = self.slot_entry(ch).get_or_insert_with(|| HoldSlot {
            held_db: floor,
            rms_db: rms,
            last_peak_at: now,
        });
        slot.rms_db = rms;
        if peak > slot.held_db {
            slot.held_db = peak;
            slot.last_peak_at = now;
        }
    }

    /// Advance decay. Called on a fixed wall-clock interval.
    ///
    /// A tick with zero elapsed time since the previous one is a no-op, so
    /// replaying the same instant can never double-decay. Channels still
    /// inside their hold window are left alone; the rest drop by one tick's
    /// worth of dB, clamped to `max(floor, latest rms)`.
    pub fn on_tick(&mut self, now: Instant) {
        if let Some(prev) = self.last_tick_at {
            if now <= prev {
                return;
            }
        }
        self.last_tick_at = Some(now);

        let hold = Duration::from_millis(self.config.hold_ms);
        let drop = self.config.drop_db_per_sec * self.config.tick_ms as f64 / 1000.0;
        let floor = self.config.floor_db;

        for slot in self.slots.iter_mut().flatten() {
            if now.duration_since(slot.last_peak_at) < hold {
                continue;
            }
            let clamp = floor.max(slot.rms_db);
            if slot.held_db > clamp {
                slot.held_db = (slot.held_db - drop).max(clamp);
            }
        }
    }

    /// Drop `ch` back to the floor and restart its hold window from `now`.
    ///
    /// Called when the channel selection changes so a stale hold from the
    /// previously watched channel is never displayed.
    pub fn reset_channel(&mut self, ch: usize, now: Instant) {
        let floor = self.config.floor_db;
        *self.slot_entry(ch) = Some(HoldSlot {
            held_db: floor,
            rms_db: floor,
            last_peak_at: now,
        });
    }

    /// Current held peak for `ch`; the floor if it never reported a sample.
    pub fn held_peak_db(&self, ch: usize) -> f64 {
        self.slots
            .get(ch)
            .and_then(|s| s.as_ref())
            .map(|s| s.held_db)
            .unwrap_or(self.config.floor_db)
    }

    fn slot_entry(&mut self, ch: usize) -> &mut Option<HoldSlot> {
        if ch >= self.slots.len() {
            self.slots.resize(ch + 1, None);
        }
        &mut self.slots[ch]
    }
}

impl Default for PeakHoldMeter {
    fn default() -> Self {
        Self::new(MeterConfig::default())
    }
}
