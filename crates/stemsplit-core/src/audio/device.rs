//! Output devices across all CPAL hosts
//!
//! A configured device may sit on a host other than the platform default
//! (JACK or PulseAudio next to ALSA, ASIO next to WASAPI), so listing and
//! lookup walk every host CPAL can open.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Rates checked against each device's supported ranges when listing
const LISTED_SAMPLE_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

fn host_label(id: HostId) -> String {
    match id.name() {
        "Alsa" => String::from("ALSA"),
        "Jack" => String::from("JACK"),
        "Wasapi" => String::from("WASAPI"),
        other => other.to_string(),
    }
}

fn open_host(label: &str) -> Option<Host> {
    let id = cpal::available_hosts()
        .into_iter()
        .find(|id| host_label(*id).eq_ignore_ascii_case(label))?;
    cpal::host_from_id(id).ok()
}

fn has_name(device: &cpal::Device, name: &str) -> bool {
    device.name().map_or(false, |n| n == name)
}

/// One output device as shown in the startup log
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    /// Default output of its own host
    pub is_default: bool,
    /// Entries of the standard rate list the device accepts, ascending
    pub sample_rates: Vec<u32>,
    pub max_channels: u16,
}

impl AudioDevice {
    /// "44100/48000 Hz, up to 2 ch"
    pub fn capabilities(&self) -> String {
        let rates = self
            .sample_rates
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/");
        if rates.is_empty() {
            format!("non-standard rates, up to {} ch", self.max_channels)
        } else {
            format!("{} Hz, up to {} ch", rates, self.max_channels)
        }
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.display_label())?;
        if self.is_default {
            f.write_str(" (default)")?;
        }
        Ok(())
    }
}

/// Describe one device from its supported configuration ranges
fn describe(device: &cpal::Device, host: &str, default_name: Option<&str>) -> Option<AudioDevice> {
    let name = device.name().ok()?;
    let ranges: Vec<_> = device.supported_output_configs().ok()?.collect();
    if ranges.is_empty() {
        return None;
    }

    let max_channels = ranges.iter().map(|r| r.channels()).max().unwrap_or(0);
    let sample_rates = LISTED_SAMPLE_RATES
        .into_iter()
        .filter(|rate| {
            ranges
                .iter()
                .any(|r| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(rate))
        })
        .collect();

    Some(AudioDevice {
        id: DeviceId::with_host(&name, host),
        is_default: default_name == Some(name.as_str()),
        host: host.to_string(),
        name,
        sample_rates,
        max_channels,
    })
}

/// List output devices of every host; defaults first, then by host and name
pub fn get_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                log::debug!("Skipping host {}: {}", host_label(host_id), e);
                continue;
            }
        };
        let label = host_label(host_id);
        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        match host.output_devices() {
            Ok(outputs) => devices.extend(
                outputs.filter_map(|d| describe(&d, &label, default_name.as_deref())),
            ),
            Err(e) => log::debug!("Cannot list outputs of {}: {}", label, e),
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        (!a.is_default, &a.host, &a.name).cmp(&(!b.is_default, &b.host, &b.name))
    });
    Ok(devices)
}

/// Resolve a configured device, searching every host if its own is missing
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(host) = id.host.as_deref().and_then(open_host) {
        let mut outputs = host
            .output_devices()
            .map_err(|e| AudioError::Query(e.to_string()))?;
        return outputs
            .find(|d| has_name(d, &id.name))
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .filter_map(|host| host.output_devices().ok())
        .flatten()
        .find(|d| has_name(d, &id.name))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}

/// Default output of the platform's default host
pub fn get_cpal_default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)
}
