use crate::common::{
    Capabilities, CpuIdentity, Microarchitecture, MsrAccess, Package, PackageTopology,
    RegisterMap, SysfsTopology, TopologySource,
};
use crate::config::ToolConfig;
use crate::counters::rapl::{read_units, UnitSet};
use crate::error::{RaplError, Result};

/// Everything detected once at startup and read-only afterwards
#[derive(Debug, Clone)]
pub struct RaplSystem {
    pub identity: CpuIdentity,
    pub arch: Microarchitecture,
    pub capabilities: Capabilities,
    pub registers: RegisterMap,
    pub topology: PackageTopology,
    units: Vec<UnitSet>,
}

impl RaplSystem {
    /// Identify the CPU, scan the package topology, resolve the RAPL domains
    /// and read the units of every package, in that order
    pub fn detect<M: MsrAccess>(config: &ToolConfig, msr: &M) -> Result<Self> {
        let identity = CpuIdentity::read(&config.cpuinfo_path)?;
        let source = SysfsTopology::new(&config.sysfs_cpu_dir);
        Self::from_parts(identity, &source, config, msr)
    }

    pub fn from_parts<M: MsrAccess>(
        identity: CpuIdentity,
        source: &impl TopologySource,
        config: &ToolConfig,
        msr: &M,
    ) -> Result<Self> {
        let arch = identity.microarchitecture()?;
        let registers = RegisterMap::for_vendor(identity.vendor()).ok_or_else(|| {
            RaplError::UnsupportedCpu(format!("no RAPL registers for {}", identity.vendor_id))
        })?;
        tracing::info!("Found {} processor (model {})", arch.name(), identity.model);

        let topology = PackageTopology::scan(source, config.max_cpus, config.max_packages)?;
        if topology.total_packages() == 0 {
            return Err(RaplError::NoPackages(
                config.sysfs_cpu_dir.display().to_string(),
            ));
        }

        let capabilities = arch.capabilities()?;

        let units = topology
            .packages()
            .iter()
            .map(|package| {
                let handle = msr.open(package.cpu)?;
                read_units(msr, &handle, &registers)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            identity,
            arch,
            capabilities,
            registers,
            topology,
            units,
        })
    }

    pub fn total_packages(&self) -> usize {
        self.topology.total_packages()
    }

    pub fn package(&self, index: usize) -> Result<&Package> {
        self.topology.package(index)
    }

    pub fn units(&self, index: usize) -> Result<&UnitSet> {
        self.units.get(index).ok_or(RaplError::UnknownPackage {
            index,
            total: self.units.len(),
        })
    }
}
