use raplcap_raw::intel::rapl::{RaplDomainLimit, RaplPowerInfo};
use raplcap_raw::RegisterLayout;

use super::units::UnitSet;
use crate::common::MsrAccess;
use crate::error::Result;
use crate::system::RaplSystem;

/// `MSR_PKG_POWER_INFO` in physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackagePowerInfo {
    pub thermal_spec_watts: f64,
    pub minimum_watts: f64,
    pub maximum_watts: f64,
    pub maximum_window_seconds: f64,
}

pub fn decode_power_info(value: u64, units: &UnitSet) -> PackagePowerInfo {
    let info = RaplPowerInfo::from_msr_value(value);

    PackagePowerInfo {
        thermal_spec_watts: units.power_unit * f64::from(info.thermal_spec_power),
        minimum_watts: units.power_unit * f64::from(info.minimum_power),
        maximum_watts: units.power_unit * f64::from(info.maximum_power),
        maximum_window_seconds: units.time_unit * f64::from(info.maximum_time_window),
    }
}

/// Single-window PP0 or DRAM power limit in physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainPowerLimit {
    pub watts: f64,
    pub seconds: f64,
    pub enabled: bool,
    pub clamped: bool,
    pub locked: bool,
}

pub fn decode_domain_limit(value: u64, units: &UnitSet) -> DomainPowerLimit {
    let limit = RaplDomainLimit::from_msr_value(value);

    DomainPowerLimit {
        watts: units.power_unit * f64::from(limit.power_limit),
        seconds: units.time_unit * f64::from(limit.time_window),
        enabled: limit.enable,
        clamped: limit.clamp,
        locked: limit.lock,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageInfo {
    pub package_index: usize,
    pub power_info: PackagePowerInfo,
    pub pp0_limit: Option<DomainPowerLimit>,
    pub dram_limit: Option<DomainPowerLimit>,
}

/// Read the power info and the PP0/DRAM limits of one package
pub fn read_package_info<M: MsrAccess>(
    system: &RaplSystem,
    msr: &M,
    index: usize,
) -> Result<PackageInfo> {
    let package = system.package(index)?;
    let units = system.units(index)?;
    let registers = &system.registers;
    let caps = system.capabilities;

    let handle = msr.open(package.cpu)?;
    let power_info = decode_power_info(msr.read(&handle, registers.pkg_power_info)?, units);

    let domain = |available: bool, addr: u64| -> Result<Option<DomainPowerLimit>> {
        if !available {
            return Ok(None);
        }
        Ok(Some(decode_domain_limit(msr.read(&handle, addr)?, units)))
    };

    Ok(PackageInfo {
        package_index: index,
        power_info,
        pp0_limit: domain(caps.pp0, registers.pp0_power_limit)?,
        dram_limit: domain(caps.dram, registers.dram_power_limit)?,
    })
}
