//! Live meter simulation pushed over `GET /ws?deviceId=..[&ch=..]`.
//!
//! Every 80 ms the connection synthesizes fresh RMS/peak levels for each
//! subscribed channel from the channel's gain, stores them back into the
//! registry (so REST status reflects live meters), and pushes one `vu`
//! frame per channel. Each frame stands alone; clients may join or drop at
//! any point.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::AppState;
use crate::device::{ChannelFlags, DeviceStatus};

const TICK: Duration = Duration::from_millis(80);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VuQuery {
    pub device_id: String,
    #[serde(default)]
    pub ch: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VuFrame {
    pub t: &'static str,
    pub device_id: String,
    pub ch: usize,
    pub rms_db: f64,
    pub peak_db: f64,
    pub clip: bool,
    pub limit: bool,
    pub protect: bool,
    pub reason: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<VuQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_vu(socket, state, query))
}

async fn stream_vu(mut socket: WebSocket, state: AppState, query: VuQuery) {
    if state.registry.read().await.get(&query.device_id).is_none() {
        warn!("vu subscription for unknown device {}", query.device_id);
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    info!(
        "vu subscriber: device {} channel {:?}",
        query.device_id, query.ch
    );

    let mut timer = interval(TICK);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let frames = {
                    let mut registry = state.registry.write().await;
                    let Some(dev) = registry.get_mut(&query.device_id) else { break };
                    advance_meters(dev, query.ch)
                };
                for frame in frames {
                    let Ok(json) = serde_json::to_string(&frame) else { continue };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        info!("vu subscriber went away");
                        return;
                    }
                }
            }
            // Drain inbound traffic so closes are noticed promptly.
            msg = socket.recv() => match msg {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("vu subscriber closed: device {}", query.device_id);
}

/// One simulation step: jitter the meters of every subscribed channel,
/// refresh the channel flags, and emit the corresponding frames.
fn advance_meters(dev: &mut DeviceStatus, ch_filter: Option<usize>) -> Vec<VuFrame> {
    let mut rng = rand::thread_rng();
    let power_on = dev.power_on;
    let device_id = dev.device_id.clone();
    let mut frames = Vec::new();

    for channel in dev
        .channels
        .iter_mut()
        .filter(|c| ch_filter.is_none_or(|ch| c.ch == ch))
    {
        let (rms, peak) = synth_levels(
            channel.audio.gain_db,
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(0.0..1.0),
        );
        let flags = flags_for(peak, power_on);

        channel.meters.rms_db = rms;
        channel.meters.peak_db = peak;
        channel.flags = flags.clone();

        frames.push(VuFrame {
            t: "vu",
            device_id: device_id.clone(),
            ch: channel.ch,
            rms_db: rms,
            peak_db: peak,
            clip: flags.clip,
            limit: flags.limit,
            protect: flags.protect,
            reason: flags.reason,
        });
    }
    frames
}

/// Levels derived from the channel gain: the RMS sits around
/// `-28 + gain/3` dB with ±6 dB of jitter, the peak rides 0..6 dB above it.
fn synth_levels(gain_db: f64, jitter_unit: f64, peak_unit: f64) -> (f64, f64) {
    let base = -28.0 + gain_db / 3.0;
    let rms = base + jitter_unit * 6.0;
    let peak = rms + peak_unit * 6.0;
    (rms, peak)
}

fn flags_for(peak_db: f64, power_on: bool) -> ChannelFlags {
    let protect = !power_on;
    ChannelFlags {
        clip: peak_db > 1.5,
        limit: peak_db > -0.5 && peak_db <= 1.5,
        protect,
        reason: if protect { "POWER OFF".to_string() } else { String::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Registry;

    #[test]
    fn levels_center_on_the_gain_derived_base() {
        // Zero jitter: rms is exactly the base, peak equals rms.
        let (rms, peak) = synth_levels(-24.0, 0.0, 0.0);
        assert_eq!(rms, -36.0);
        assert_eq!(peak, rms);

        let (rms, peak) = synth_levels(0.0, 1.0, 1.0);
        assert_eq!(rms, -22.0);
        assert_eq!(peak, -16.0);
    }

    #[test]
    fn flag_thresholds_match_the_limiter_bands() {
        assert!(flags_for(2.0, true).clip);
        assert!(!flags_for(2.0, true).limit);

        let limit_band = flags_for(0.0, true);
        assert!(limit_band.limit && !limit_band.clip);

        let quiet = flags_for(-20.0, true);
        assert!(!quiet.clip && !quiet.limit && !quiet.protect);
        assert!(quiet.reason.is_empty());
    }

    #[test]
    fn protect_follows_power_with_reason() {
        let flags = flags_for(-20.0, false);
        assert!(flags.protect);
        assert_eq!(flags.reason, "POWER OFF");
    }

    #[test]
    fn advance_writes_meters_back_and_respects_the_filter() {
        let mut reg = Registry::seeded();
        let dev = reg.get_mut("SMX-KPRO-002").unwrap();

        let frames = advance_meters(dev, Some(3));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].ch, 3);
        assert_eq!(frames[0].t, "vu");
        // The registry copy now carries the pushed levels.
        let ch3 = dev.channel(3).unwrap();
        assert_eq!(ch3.meters.rms_db, frames[0].rms_db);
        assert_eq!(ch3.meters.peak_db, frames[0].peak_db);
        // Unfiltered channels still sit at the floor.
        assert_eq!(dev.channel(1).unwrap().meters.rms_db, -80.0);

        let frames = advance_meters(dev, None);
        assert_eq!(frames.len(), 4);
    }
}
