use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RaplError, Result};

pub const CPUINFO_PATH: &str = "/proc/cpuinfo";
pub const SYSFS_CPU_DIR: &str = "/sys/devices/system/cpu";

/// Upper bounds of the topology scan
pub const MAX_CPUS: usize = 1024;
pub const MAX_PACKAGES: usize = 16;

/// Package power limit range accepted on the command line, in watts
pub const MIN_WATTS: u32 = 10;
pub const MAX_WATTS: u32 = 215;

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub cpuinfo_path: PathBuf,
    pub sysfs_cpu_dir: PathBuf,
    pub msr_dev_dir: PathBuf,
    pub max_cpus: usize,
    pub max_packages: usize,
    pub min_watts: u32,
    pub max_watts: u32,
    /// Measure energy over this window before applying the limit
    pub sample: Option<Duration>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            cpuinfo_path: PathBuf::from(CPUINFO_PATH),
            sysfs_cpu_dir: PathBuf::from(SYSFS_CPU_DIR),
            msr_dev_dir: PathBuf::from(raplcap_raw::msr::MSR_DEV_DIR),
            max_cpus: MAX_CPUS,
            max_packages: MAX_PACKAGES,
            min_watts: MIN_WATTS,
            max_watts: MAX_WATTS,
            sample: None,
        }
    }
}

impl ToolConfig {
    /// Check a requested package limit against the supported range
    pub fn power_request(&self, watts: u32) -> Result<PowerRequest> {
        if watts < self.min_watts || watts > self.max_watts {
            return Err(RaplError::InvalidPowerRequest(format!(
                "Power spec {} - {} Watts",
                self.min_watts, self.max_watts
            )));
        }

        Ok(PowerRequest {
            watts: f64::from(watts),
        })
    }
}

/// A package power limit that passed the command-line range check
///
/// It still has to fit the register encoding of each package, see
/// [`crate::counters::rapl::encode_limit_field`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRequest {
    pub watts: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_request_bounds_are_inclusive() {
        let config = ToolConfig::default();

        assert_eq!(config.power_request(10).unwrap().watts, 10.0);
        assert_eq!(config.power_request(215).unwrap().watts, 215.0);
    }

    #[test]
    fn test_power_request_out_of_range() {
        let config = ToolConfig::default();

        for watts in [0, 9, 216, 1000] {
            let err = config.power_request(watts).unwrap_err();
            assert!(matches!(err, RaplError::InvalidPowerRequest(_)));
            assert_eq!(
                err.to_string(),
                "Invalid power request: Power spec 10 - 215 Watts"
            );
        }
    }

    #[test]
    fn test_default_paths() {
        let config = ToolConfig::default();
        assert_eq!(config.msr_dev_dir, PathBuf::from("/dev/cpu"));
        assert_eq!(config.max_cpus, 1024);
        assert_eq!(config.max_packages, 16);
        assert!(config.sample.is_none());
    }
}
