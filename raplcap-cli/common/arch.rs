// CPU identification: vendor/family/model, microarchitecture and RAPL domains

use std::path::Path;

use raplcap_raw::intel::models;
use raplcap_raw::intel::rapl::msr;

use crate::error::{RaplError, Result};

const VENDOR_INTEL: &str = "GenuineIntel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Intel,
    Other,
}

/// Vendor, family and model as reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuIdentity {
    pub vendor_id: String,
    pub family: u32,
    pub model: u32,
}

impl CpuIdentity {
    /// Read and parse `/proc/cpuinfo` (or a file in the same format)
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RaplError::CpuInfo {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse `/proc/cpuinfo` text
    ///
    /// Keys are matched exactly, so `model name` does not shadow `model`.
    /// Every processor block repeats the same fields; the last one wins.
    pub fn parse(text: &str) -> Result<Self> {
        let mut vendor_id = None;
        let mut family = None;
        let mut model = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };

            match key.trim() {
                "vendor_id" => vendor_id = Some(value.trim().to_string()),
                "cpu family" => family = Some(parse_number("cpu family", value)?),
                "model" => model = Some(parse_number("model", value)?),
                _ => {}
            }
        }

        let vendor_id = vendor_id.ok_or_else(|| {
            RaplError::UnsupportedCpu("no vendor_id in CPU information".to_string())
        })?;
        let family =
            family.ok_or_else(|| RaplError::ParseError("no cpu family field".to_string()))?;
        let model = model.ok_or_else(|| RaplError::ParseError("no model field".to_string()))?;

        Ok(Self {
            vendor_id,
            family,
            model,
        })
    }

    pub fn vendor(&self) -> Vendor {
        if self.vendor_id == VENDOR_INTEL {
            Vendor::Intel
        } else {
            Vendor::Other
        }
    }

    /// Resolve the microarchitecture, failing for anything but a known
    /// family 6 Intel model
    pub fn microarchitecture(&self) -> Result<Microarchitecture> {
        if self.vendor() != Vendor::Intel {
            return Err(RaplError::UnsupportedCpu(format!(
                "vendor {} is not {VENDOR_INTEL}",
                self.vendor_id
            )));
        }

        if self.family != models::FAMILY {
            return Err(RaplError::UnsupportedCpu(format!(
                "Wrong CPU family {}",
                self.family
            )));
        }

        Microarchitecture::from_model(self.model).ok_or_else(|| {
            RaplError::UnsupportedCpu(format!("Unsupported model {}", self.model))
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|e| RaplError::ParseError(format!("invalid {key} {:?}: {e}", value.trim())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Microarchitecture {
    Sandybridge,
    SandybridgeEp,
    Ivybridge,
    IvybridgeEp,
    Haswell,
    HaswellEp,
    Broadwell,
    BroadwellEp,
    Skylake,
    SkylakeX,
    KabyLake,
    KnightsLanding,
    KnightsMill,
    Atom,
}

impl Microarchitecture {
    // Reference: Intel® 64 and IA-32 Architectures Software Developer's Manual
    pub fn from_model(model: u32) -> Option<Self> {
        let arch = match model {
            models::SANDYBRIDGE => Microarchitecture::Sandybridge,
            models::SANDYBRIDGE_EP => Microarchitecture::SandybridgeEp,
            models::IVYBRIDGE => Microarchitecture::Ivybridge,
            models::IVYBRIDGE_EP => Microarchitecture::IvybridgeEp,
            models::HASWELL | models::HASWELL_ULT | models::HASWELL_GT3E => {
                Microarchitecture::Haswell
            }
            models::HASWELL_EP => Microarchitecture::HaswellEp,
            models::BROADWELL | models::BROADWELL_GT3E => Microarchitecture::Broadwell,
            models::BROADWELL_EP => Microarchitecture::BroadwellEp,
            models::SKYLAKE | models::SKYLAKE_HS => Microarchitecture::Skylake,
            models::SKYLAKE_X => Microarchitecture::SkylakeX,
            models::KABYLAKE | models::KABYLAKE_MOBILE => Microarchitecture::KabyLake,
            models::KNIGHTS_LANDING => Microarchitecture::KnightsLanding,
            models::KNIGHTS_MILL => Microarchitecture::KnightsMill,
            models::ATOM_GOLDMONT | models::ATOM_GEMINI_LAKE | models::ATOM_DENVERTON => {
                Microarchitecture::Atom
            }
            // RAPL-capable, but never validated with this tool
            models::BROADWELL_DE
            | models::ATOM_SILVERMONT
            | models::ATOM_AIRMONT
            | models::ATOM_MERRIFIELD
            | models::ATOM_MOOREFIELD => return None,
            _ => return None,
        };
        Some(arch)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Microarchitecture::Sandybridge => "Sandybridge",
            Microarchitecture::SandybridgeEp => "Sandybridge-EP",
            Microarchitecture::Ivybridge => "Ivybridge",
            Microarchitecture::IvybridgeEp => "Ivybridge-EP",
            Microarchitecture::Haswell => "Haswell",
            Microarchitecture::HaswellEp => "Haswell-EP",
            Microarchitecture::Broadwell => "Broadwell",
            Microarchitecture::BroadwellEp => "Broadwell-EP",
            Microarchitecture::Skylake => "Skylake",
            Microarchitecture::SkylakeX => "Skylake-X",
            Microarchitecture::KabyLake => "Kaby Lake",
            Microarchitecture::KnightsLanding => "Knight's Landing",
            Microarchitecture::KnightsMill => "Knight's Mill",
            Microarchitecture::Atom => "Atom",
        }
    }

    /// RAPL sub-domains available besides the package
    ///
    /// Only the EP server parts have a validated entry. Every other named
    /// microarchitecture is rejected here rather than guessed at.
    pub fn capabilities(&self) -> Result<Capabilities> {
        match self {
            Microarchitecture::SandybridgeEp | Microarchitecture::IvybridgeEp => Ok(Capabilities {
                pp0: true,
                dram: true,
            }),
            other => Err(RaplError::UnsupportedCpu(format!(
                "no RAPL domain table for {}",
                other.name()
            ))),
        }
    }
}

/// Which RAPL energy domains exist beyond the package
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub pp0: bool,
    pub dram: bool,
}

/// MSR addresses of the RAPL registers for one vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub power_unit: u64,
    pub pkg_power_limit: u64,
    pub pkg_energy_status: u64,
    pub pkg_power_info: u64,
    pub pp0_power_limit: u64,
    pub pp0_energy_status: u64,
    pub dram_power_limit: u64,
    pub dram_energy_status: u64,
}

impl RegisterMap {
    pub const INTEL: RegisterMap = RegisterMap {
        power_unit: msr::MSR_RAPL_POWER_UNIT,
        pkg_power_limit: msr::MSR_PKG_POWER_LIMIT,
        pkg_energy_status: msr::MSR_PKG_ENERGY_STATUS,
        pkg_power_info: msr::MSR_PKG_POWER_INFO,
        pp0_power_limit: msr::MSR_PP0_POWER_LIMIT,
        pp0_energy_status: msr::MSR_PP0_ENERGY_STATUS,
        dram_power_limit: msr::MSR_DRAM_POWER_LIMIT,
        dram_energy_status: msr::MSR_DRAM_ENERGY_STATUS,
    };

    pub fn for_vendor(vendor: Vendor) -> Option<RegisterMap> {
        match vendor {
            Vendor::Intel => Some(RegisterMap::INTEL),
            Vendor::Other => None,
        }
    }
}
