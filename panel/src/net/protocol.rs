//! Wire types for the K Pro mock backend: the `vu` push frame and the REST
//! command/response payloads. Field names are camelCase on the wire.
//!
//! The push channel is best-effort, so the frame is deserialized leniently:
//! missing levels fall back per the meter defaulting rules and unknown
//! message types are simply skipped by the stream client.

use serde::{Deserialize, Serialize};

/// One level observation for one channel, pushed over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VuFrame {
    /// Message tag; only `"vu"` frames are meaningful.
    pub t: String,
    pub device_id: String,
    pub ch: usize,
    #[serde(default)]
    pub rms_db: Option<f64>,
    #[serde(default)]
    pub peak_db: Option<f64>,
    #[serde(default)]
    pub clip: bool,
    #[serde(default)]
    pub limit: bool,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl VuFrame {
    pub fn is_vu(&self) -> bool {
        self.t == "vu"
    }

    /// RMS level, defaulting to the floor when absent or non-finite.
    pub fn rms_db_or(&self, floor_db: f64) -> f64 {
        self.rms_db.filter(|v| v.is_finite()).unwrap_or(floor_db)
    }

    /// Peak level, defaulting to the RMS level when absent or non-finite.
    pub fn peak_db_or(&self, floor_db: f64) -> f64 {
        self.peak_db
            .filter(|v| v.is_finite())
            .unwrap_or_else(|| self.rms_db_or(floor_db))
    }
}

/// Entry in the `GET /api/v1/devices` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub model: String,
    pub ip: String,
    pub fw: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceList {
    pub devices: Vec<DeviceSummary>,
}

/// Full device status as returned by `GET /api/v1/devices/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: String,
    pub fw: String,
    pub net: NetInfo,
    pub temps: Temps,
    pub rails: Rails,
    pub power_on: bool,
    pub channels_count: usize,
    pub dsp: DspInfo,
    pub channels: Vec<ChannelStatus>,
}

impl DeviceStatus {
    pub fn channel(&self, ch: usize) -> Option<&ChannelStatus> {
        self.channels.iter().find(|c| c.ch == ch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetInfo {
    pub wifi: String,
    pub lan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Temps {
    pub heatsink: f64,
    pub board: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rails {
    pub vbat: f64,
    pub vbus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DspInfo {
    pub sample_rate: u32,
    pub delay_max_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub ch: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub audio: AudioParams,
    pub meters: Meters,
    pub delay: DelayParams,
    pub flags: ChannelFlags,
    #[serde(default)]
    pub route: Option<Route>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParams {
    pub mute: bool,
    pub gain_db: f64,
    /// +1 or -1.
    pub polarity: i8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meters {
    pub rms_db: f64,
    pub peak_db: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayParams {
    pub enabled: bool,
    pub value_samples: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelFlags {
    #[serde(default)]
    pub clip: bool,
    #[serde(default)]
    pub limit: bool,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
}

// ---- command payloads ----
//
// Partial updates: absent fields leave the device value unchanged, and the
// response carries the authoritative post-update state.

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarity: Option<i8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioResponse {
    pub audio: AudioParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerCommand {
    pub power_on: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerResponse {
    pub power_on: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_samples: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayResponse {
    pub enabled: bool,
    pub value_samples: u32,
    pub sample_rate: u32,
    pub max_ms: u32,
    pub max_samples: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vu_frame_parses_full_message() {
        let json = r#"{"t":"vu","deviceId":"SMX-KPRO-001","ch":2,
            "rmsDb":-28.5,"peakDb":-24.0,
            "clip":false,"limit":true,"protect":false,"reason":""}"#;
        let frame: VuFrame = serde_json::from_str(json).unwrap();
        assert!(frame.is_vu());
        assert_eq!(frame.device_id, "SMX-KPRO-001");
        assert_eq!(frame.ch, 2);
        assert_eq!(frame.rms_db_or(-80.0), -28.5);
        assert_eq!(frame.peak_db_or(-80.0), -24.0);
        assert!(frame.limit);
        assert!(!frame.clip);
    }

    #[test]
    fn missing_rms_defaults_to_floor_and_missing_peak_to_rms() {
        let frame: VuFrame =
            serde_json::from_str(r#"{"t":"vu","deviceId":"d","ch":1}"#).unwrap();
        assert_eq!(frame.rms_db_or(-80.0), -80.0);
        assert_eq!(frame.peak_db_or(-80.0), -80.0);

        let frame: VuFrame =
            serde_json::from_str(r#"{"t":"vu","deviceId":"d","ch":1,"rmsDb":-30.0}"#)
                .unwrap();
        assert_eq!(frame.peak_db_or(-80.0), -30.0);
    }

    #[test]
    fn partial_audio_command_serializes_only_set_fields() {
        let cmd = AudioCommand {
            mute: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&cmd).unwrap(), r#"{"mute":true}"#);

        let cmd = AudioCommand {
            gain_db: Some(-12.0),
            polarity: Some(-1),
            ..Default::default()
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""gainDb":-12.0"#));
        assert!(json.contains(r#""polarity":-1"#));
        assert!(!json.contains("mute"));
    }

    #[test]
    fn device_status_roundtrips_camel_case() {
        let json = r#"{
          "deviceId":"SMX-KPRO-001","fw":"0.1.0",
          "net":{"wifi":"192.168.4.1","lan":"10.10.1.1"},
          "temps":{"heatsink":42.3,"board":38.8},
          "rails":{"vbat":12.6,"vbus":5.1},
          "powerOn":true,"channelsCount":2,
          "dsp":{"sampleRate":48000,"delayMaxMs":100},
          "channels":[{
            "ch":1,"name":"CH1",
            "audio":{"mute":false,"gainDb":-24.0,"polarity":1},
            "meters":{"rmsDb":-80.0,"peakDb":-80.0},
            "delay":{"enabled":true,"valueSamples":0},
            "flags":{"clip":false,"limit":false,"protect":false,"reason":""},
            "route":{"from":"Input 1","to":"Out 1"}
          }]
        }"#;
        let status: DeviceStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.channels_count, 2);
        assert_eq!(status.dsp.sample_rate, 48000);
        let ch = status.channel(1).unwrap();
        assert_eq!(ch.audio.gain_db, -24.0);
        assert!(status.channel(3).is_none());
    }
}
