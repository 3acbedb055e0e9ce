//! # Compute Device Selection
//!
//! Picks the device the Whisper model runs on from the `models.device`
//! setting. GPU backends that fail to initialise fall back to the CPU, so a
//! misconfigured host still serves transcriptions, only slower.

use candle_core::Device;
use tracing::{debug, info, warn};

/// Where inference should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// CUDA, then Metal, then CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("Unknown device preference: {}", s)),
        }
    }
}

/// Resolve a preference to a concrete device.
pub fn select_device(preference: DevicePreference) -> Device {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => cuda_device().unwrap_or(Device::Cpu),
        DevicePreference::Metal => metal_device().unwrap_or(Device::Cpu),
        DevicePreference::Auto => cuda_device().or_else(metal_device).unwrap_or(Device::Cpu),
    };
    info!("Using {} for speech inference ({:?} requested)", describe(&device), preference);
    device
}

/// Parse the configured device string; unknown values mean `auto`.
pub fn device_from_config(value: &str) -> Device {
    let preference = value.parse::<DevicePreference>().unwrap_or_else(|e| {
        warn!("{}, falling back to auto", e);
        DevicePreference::Auto
    });
    select_device(preference)
}

/// Short label for logs and status responses.
pub fn describe(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA GPU",
        Device::Metal(_) => "Metal GPU",
    }
}

fn cuda_device() -> Option<Device> {
    Device::new_cuda(0)
        .map_err(|e| debug!("CUDA not available: {}", e))
        .ok()
}

fn metal_device() -> Option<Device> {
    Device::new_metal(0)
        .map_err(|e| debug!("Metal not available: {}", e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!(" CPU ".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("gpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("metal".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_cpu_is_always_available() {
        let device = select_device(DevicePreference::Cpu);
        assert!(matches!(device, Device::Cpu));
        assert_eq!(describe(&device), "CPU");
    }

    #[test]
    fn test_unknown_config_value_still_yields_a_device() {
        let device = device_from_config("quantum");
        assert!(!describe(&device).is_empty());
    }
}
