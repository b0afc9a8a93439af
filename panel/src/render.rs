//! In-place terminal VU bar: RMS fill, peak tick, held-peak tick, numeric
//! readouts, and flag badges. Rewrites the same line on every update.

use std::io::{self, Write};

use crate::meter::view::ChannelView;

const VU_MIN_DB: f64 = -48.0;
const VU_MAX_DB: f64 = 3.0;

pub struct MeterBar {
    bar_length: usize,
    initialized: bool,
}

impl MeterBar {
    pub fn new() -> Self {
        Self {
            bar_length: 40,
            initialized: false,
        }
    }

    pub fn display(&mut self, view: &ChannelView) -> io::Result<()> {
        if !self.initialized {
            println!();
            self.initialized = true;
        }

        let bar = self.render_bar(view);
        let flags = flag_badges(view);

        let mut out = io::stdout().lock();
        write!(
            out,
            "\x1b[2K\rCH{} [{}] RMS {:>6.1} dB  Peak {:>6.1}  Hold {:>6.1}{}",
            view.ch, bar, view.rms_db, view.peak_db, view.held_peak_db, flags
        )?;
        out.flush()
    }

    fn render_bar(&self, view: &ChannelView) -> String {
        let mut cells: Vec<char> = vec![' '; self.bar_length];
        let fill = self.cell(view.rms_db);
        for c in cells.iter_mut().take(fill) {
            *c = '█';
        }
        // Peak and hold ticks overlay the fill; hold wins on collision.
        if view.peak_db > VU_MIN_DB {
            cells[self.cell(view.peak_db).min(self.bar_length - 1)] = '▒';
        }
        if view.held_peak_db > VU_MIN_DB {
            cells[self.cell(view.held_peak_db).min(self.bar_length - 1)] = '▌';
        }
        cells.into_iter().collect()
    }

    /// Map a dB value onto the -48..+3 scale as a bar cell index.
    fn cell(&self, db: f64) -> usize {
        let pct = ((db - VU_MIN_DB) / (VU_MAX_DB - VU_MIN_DB)).clamp(0.0, 1.0);
        (pct * self.bar_length as f64) as usize
    }
}

impl Default for MeterBar {
    fn default() -> Self {
        Self::new()
    }
}

fn flag_badges(view: &ChannelView) -> String {
    let mut badges = String::new();
    if view.clip {
        badges.push_str("  CLIP");
    }
    if view.limit {
        badges.push_str("  LIMIT");
    }
    if view.protect {
        match &view.reason {
            Some(reason) => badges.push_str(&format!("  PROTECT ({reason})")),
            None => badges.push_str("  PROTECT"),
        }
    }
    badges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(rms: f64, peak: f64, hold: f64) -> ChannelView {
        ChannelView {
            ch: 1,
            rms_db: rms,
            peak_db: peak,
            held_peak_db: hold,
            clip: false,
            limit: false,
            protect: false,
            reason: None,
        }
    }

    #[test]
    fn bar_fill_scales_with_rms() {
        let bar = MeterBar::new();
        assert_eq!(bar.cell(VU_MIN_DB), 0);
        assert_eq!(bar.cell(VU_MAX_DB), 40);
        assert_eq!(bar.cell(-200.0), 0); // clamped
        let mid = bar.cell((VU_MIN_DB + VU_MAX_DB) / 2.0);
        assert_eq!(mid, 20);
    }

    #[test]
    fn hold_tick_survives_peak_collision() {
        let bar = MeterBar::new();
        let rendered = bar.render_bar(&view(-48.0, -10.0, -10.0));
        assert_eq!(rendered.chars().filter(|&c| c == '▌').count(), 1);
        assert_eq!(rendered.chars().filter(|&c| c == '▒').count(), 0);
    }

    #[test]
    fn protect_badge_carries_the_reason() {
        let mut v = view(-30.0, -20.0, -15.0);
        v.protect = true;
        v.reason = Some("POWER OFF".into());
        assert!(flag_badges(&v).contains("PROTECT (POWER OFF)"));
    }
}
