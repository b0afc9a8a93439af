//! Command dispatcher: request/response against the device registry REST
//! API. Pure pass-through; each call returns the authoritative post-update
//! state for the display layer to merge. Meter state is never written here.

use thiserror::Error;

use crate::net::protocol::{
    AudioCommand, AudioResponse, DelayCommand, DelayResponse, DeviceList, DeviceStatus,
    PowerCommand, PowerResponse,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("http error: {0}")]
    Http(#[from] ureq::Error),
}

/// Blocking REST client for one backend. Commands are user-triggered and
/// rare; callers on an async runtime wrap these in `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct CommandClient {
    api_base: String,
}

impl CommandClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    pub fn list_devices(&self) -> Result<DeviceList, CommandError> {
        let url = format!("{}/api/v1/devices", self.api_base);
        Ok(ureq::get(&url).call()?.body_mut().read_json()?)
    }

    pub fn status(&self, device_id: &str) -> Result<DeviceStatus, CommandError> {
        let url = format!("{}/api/v1/devices/{device_id}/status", self.api_base);
        Ok(ureq::get(&url).call()?.body_mut().read_json()?)
    }

    pub fn set_power(&self, device_id: &str, power_on: bool) -> Result<PowerResponse, CommandError> {
        let url = format!("{}/api/v1/devices/{device_id}/power", self.api_base);
        Ok(ureq::post(&url)
            .send_json(PowerCommand { power_on })?
            .body_mut()
            .read_json()?)
    }

    pub fn set_audio(
        &self,
        device_id: &str,
        ch: usize,
        cmd: AudioCommand,
    ) -> Result<AudioResponse, CommandError> {
        let url = format!("{}/api/v1/devices/{device_id}/ch/{ch}/audio", self.api_base);
        Ok(ureq::post(&url).send_json(cmd)?.body_mut().read_json()?)
    }

    pub fn get_delay(&self, device_id: &str, ch: usize) -> Result<DelayResponse, CommandError> {
        let url = format!("{}/api/v1/devices/{device_id}/ch/{ch}/delay", self.api_base);
        Ok(ureq::get(&url).call()?.body_mut().read_json()?)
    }

    pub fn set_delay(
        &self,
        device_id: &str,
        ch: usize,
        cmd: DelayCommand,
    ) -> Result<DelayResponse, CommandError> {
        let url = format!("{}/api/v1/devices/{device_id}/ch/{ch}/delay", self.api_base);
        Ok(ureq::post(&url).send_json(cmd)?.body_mut().read_json()?)
    }
}
