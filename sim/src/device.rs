//! Simulated K Pro amplifier fleet: the per-device/per-channel state and
//! the registry mutations behind the REST surface.
//!
//! Clamp rules mirror the hardware limits: gain is -48..0 dB, polarity is
//! strictly ±1, delay is 0..`sampleRate * delayMaxMs / 1000` samples.
//! Partial commands leave absent fields untouched and the authoritative
//! post-update state is returned to the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const FLOOR_DB: f64 = -80.0;
pub const GAIN_MIN_DB: f64 = -48.0;
pub const GAIN_MAX_DB: f64 = 0.0;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("device not found")]
    DeviceNotFound,
    #[error("channel not found")]
    ChannelNotFound,
}

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetInfo {
    pub wifi: String,
    pub lan: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Temps {
    pub heatsink: f64,
    pub board: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rails {
    pub vbat: f64,
    pub vbus: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DspInfo {
    pub sample_rate: u32,
    pub delay_max_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub ch: usize,
    pub name: String,
    pub audio: AudioParams,
    pub meters: Meters,
    pub delay: DelayParams,
    pub flags: ChannelFlags,
    pub route: Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParams {
    pub mute: bool,
    pub gain_db: f64,
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
    pub clip: bool,
    pub limit: bool,
    pub protect: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
}

impl DeviceStatus {
    /// Delay ceiling in samples for this device's DSP settings.
    pub fn max_delay_samples(&self) -> u32 {
        (self.dsp.sample_rate as f64 * self.dsp.delay_max_ms as f64 / 1000.0).round() as u32
    }

    pub fn channel(&self, ch: usize) -> Option<&ChannelStatus> {
        self.channels.iter().find(|c| c.ch == ch)
    }

    pub fn channel_mut(&mut self, ch: usize) -> Option<&mut ChannelStatus> {
        self.channels.iter_mut().find(|c| c.ch == ch)
    }
}

// ---- REST payloads ----

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

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCommand {
    pub mute: Option<bool>,
    pub gain_db: Option<f64>,
    pub polarity: Option<i8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioResponse {
    pub audio: AudioParams,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerCommand {
    pub power_on: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerResponse {
    pub power_on: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayCommand {
    pub enabled: Option<bool>,
    pub value_samples: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayResponse {
    pub enabled: bool,
    pub value_samples: u32,
    pub sample_rate: u32,
    pub max_ms: u32,
    pub max_samples: u32,
}

// ---- registry ----

#[derive(Debug)]
pub struct Registry {
    devices: HashMap<String, DeviceStatus>,
}

impl Registry {
    /// The simulated fleet: a 2-channel and a 4-channel K Pro.
    pub fn seeded() -> Self {
        let mut devices = HashMap::new();
        for (id, channels) in [("SMX-KPRO-001", 2), ("SMX-KPRO-002", 4)] {
            devices.insert(id.to_string(), make_device(id, channels));
        }
        Self { devices }
    }

    pub fn list(&self) -> DeviceList {
        let mut devices: Vec<DeviceSummary> = self
            .devices
            .values()
            .map(|d| DeviceSummary {
                id: d.device_id.clone(),
                name: d.device_id.clone(),
                model: "K Pro".to_string(),
                ip: d.net.wifi.clone(),
                fw: d.fw.clone(),
                status: if d.power_on { "ONLINE" } else { "OFF" }.to_string(),
            })
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        DeviceList { devices }
    }

    pub fn get(&self, id: &str) -> Option<&DeviceStatus> {
        self.devices.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DeviceStatus> {
        self.devices.get_mut(id)
    }

    pub fn set_power(&mut self, id: &str, cmd: PowerCommand) -> Result<PowerResponse, RegistryError> {
        let dev = self.devices.get_mut(id).ok_or(RegistryError::DeviceNotFound)?;
        dev.power_on = cmd.power_on.unwrap_or(false);
        Ok(PowerResponse {
            power_on: dev.power_on,
        })
    }

    pub fn update_audio(
        &mut self,
        id: &str,
        ch: usize,
        cmd: AudioCommand,
    ) -> Result<AudioResponse, RegistryError> {
        let dev = self.devices.get_mut(id).ok_or(RegistryError::DeviceNotFound)?;
        let channel = dev.channel_mut(ch).ok_or(RegistryError::ChannelNotFound)?;

        if let Some(mute) = cmd.mute {
            channel.audio.mute = mute;
        }
        if let Some(gain) = cmd.gain_db {
            channel.audio.gain_db = gain.clamp(GAIN_MIN_DB, GAIN_MAX_DB);
        }
        if let Some(polarity) = cmd.polarity {
            if polarity == 1 || polarity == -1 {
                channel.audio.polarity = polarity;
            }
        }
        Ok(AudioResponse {
            audio: channel.audio,
        })
    }

    pub fn delay_state(&self, id: &str, ch: usize) -> Result<DelayResponse, RegistryError> {
        let dev = self.devices.get(id).ok_or(RegistryError::DeviceNotFound)?;
        let channel = dev.channel(ch).ok_or(RegistryError::ChannelNotFound)?;
        Ok(delay_response(dev, channel))
    }

    pub fn update_delay(
        &mut self,
        id: &str,
        ch: usize,
        cmd: DelayCommand,
    ) -> Result<DelayResponse, RegistryError> {
        let dev = self.devices.get_mut(id).ok_or(RegistryError::DeviceNotFound)?;
        let max_samples = dev.max_delay_samples();
        let channel = dev.channel_mut(ch).ok_or(RegistryError::ChannelNotFound)?;

        if let Some(enabled) = cmd.enabled {
            channel.delay.enabled = enabled;
        }
        if let Some(samples) = cmd.value_samples {
            let samples = samples.round().clamp(0.0, max_samples as f64);
            channel.delay.value_samples = samples as u32;
        }
        let channel = dev.channel(ch).ok_or(RegistryError::ChannelNotFound)?;
        Ok(delay_response(dev, channel))
    }
}

fn delay_response(dev: &DeviceStatus, channel: &ChannelStatus) -> DelayResponse {
    DelayResponse {
        enabled: channel.delay.enabled,
        value_samples: channel.delay.value_samples,
        sample_rate: dev.dsp.sample_rate,
        max_ms: dev.dsp.delay_max_ms,
        max_samples: dev.max_delay_samples(),
    }
}

fn make_device(id: &str, channels_count: usize) -> DeviceStatus {
    DeviceStatus {
        device_id: id.to_string(),
        fw: "0.1.0".to_string(),
        net: NetInfo {
            wifi: "192.168.4.1".to_string(),
            lan: "10.10.1.1".to_string(),
        },
        temps: Temps {
            heatsink: 42.3,
            board: 38.8,
        },
        rails: Rails {
            vbat: 12.6,
            vbus: 5.1,
        },
        power_on: true,
        channels_count,
        dsp: DspInfo {
            sample_rate: 48_000,
            delay_max_ms: 100,
        },
        channels: (1..=channels_count)
            .map(|ch| ChannelStatus {
                ch,
                name: format!("CH{ch}"),
                audio: AudioParams {
                    mute: false,
                    gain_db: -24.0,
                    polarity: 1,
                },
                meters: Meters {
                    rms_db: FLOOR_DB,
                    peak_db: FLOOR_DB,
                },
                delay: DelayParams {
                    enabled: true,
                    value_samples: 0,
                },
                flags: ChannelFlags {
                    clip: false,
                    limit: false,
                    protect: false,
                    reason: String::new(),
                },
                route: Route {
                    from: "Input 1".to_string(),
                    to: format!("Out {ch}"),
                },
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_two_devices_with_expected_channel_counts() {
        let reg = Registry::seeded();
        assert_eq!(reg.get("SMX-KPRO-001").unwrap().channels.len(), 2);
        assert_eq!(reg.get("SMX-KPRO-002").unwrap().channels.len(), 4);
        assert!(reg.get("SMX-KPRO-999").is_none());
    }

    #[test]
    fn listing_reflects_power_state() {
        let mut reg = Registry::seeded();
        let list = reg.list();
        assert_eq!(list.devices.len(), 2);
        assert!(list.devices.iter().all(|d| d.status == "ONLINE"));
        assert_eq!(list.devices[0].model, "K Pro");

        reg.set_power("SMX-KPRO-001", PowerCommand { power_on: Some(false) })
            .unwrap();
        let list = reg.list();
        let off = list.devices.iter().find(|d| d.id == "SMX-KPRO-001").unwrap();
        assert_eq!(off.status, "OFF");
    }

    #[test]
    fn gain_clamps_to_hardware_range() {
        let mut reg = Registry::seeded();
        let cmd = AudioCommand {
            gain_db: Some(12.0),
            ..Default::default()
        };
        let resp = reg.update_audio("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.audio.gain_db, 0.0);

        let cmd = AudioCommand {
            gain_db: Some(-90.0),
            ..Default::default()
        };
        let resp = reg.update_audio("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.audio.gain_db, -48.0);
    }

    #[test]
    fn invalid_polarity_is_ignored() {
        let mut reg = Registry::seeded();
        let cmd = AudioCommand {
            polarity: Some(0),
            ..Default::default()
        };
        let resp = reg.update_audio("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.audio.polarity, 1);

        let cmd = AudioCommand {
            polarity: Some(-1),
            ..Default::default()
        };
        let resp = reg.update_audio("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.audio.polarity, -1);
    }

    #[test]
    fn partial_audio_command_leaves_other_fields() {
        let mut reg = Registry::seeded();
        let cmd = AudioCommand {
            mute: Some(true),
            ..Default::default()
        };
        let resp = reg.update_audio("SMX-KPRO-001", 2, cmd).unwrap();
        assert!(resp.audio.mute);
        assert_eq!(resp.audio.gain_db, -24.0);
        assert_eq!(resp.audio.polarity, 1);
    }

    #[test]
    fn delay_rounds_and_clamps_to_max_samples() {
        let mut reg = Registry::seeded();
        // 48 kHz * 100 ms = 4800 samples max.
        assert_eq!(reg.get("SMX-KPRO-001").unwrap().max_delay_samples(), 4800);

        let cmd = DelayCommand {
            value_samples: Some(480.4),
            ..Default::default()
        };
        let resp = reg.update_delay("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.value_samples, 480);
        assert_eq!(resp.max_samples, 4800);
        assert_eq!(resp.sample_rate, 48_000);

        let cmd = DelayCommand {
            value_samples: Some(1e9),
            ..Default::default()
        };
        let resp = reg.update_delay("SMX-KPRO-001", 1, cmd).unwrap();
        assert_eq!(resp.value_samples, 4800);

        let cmd = DelayCommand {
            enabled: Some(false),
            ..Default::default()
        };
        let resp = reg.update_delay("SMX-KPRO-001", 1, cmd).unwrap();
        assert!(!resp.enabled);
        assert_eq!(resp.value_samples, 4800); // untouched
    }

    #[test]
    fn unknown_device_and_channel_are_errors() {
        let mut reg = Registry::seeded();
        assert_eq!(
            reg.update_audio("nope", 1, AudioCommand::default()),
            Err(RegistryError::DeviceNotFound)
        );
        assert_eq!(
            reg.update_audio("SMX-KPRO-001", 3, AudioCommand::default()),
            Err(RegistryError::ChannelNotFound)
        );
        assert_eq!(
            reg.delay_state("SMX-KPRO-001", 99),
            Err(RegistryError::ChannelNotFound)
        );
    }
}
