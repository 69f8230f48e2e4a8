use raplcap_raw::intel::rapl::energy_counter;

use crate::common::MsrAccess;
use crate::error::{RaplError, Result};
use crate::metrics::rapl::RaplDomain;
use crate::system::RaplSystem;

/// One energy status counter, raw and scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainReading {
    pub raw: u32,
    pub joules: f64,
}

impl DomainReading {
    fn new(raw: u64, unit: f64) -> Self {
        let raw = energy_counter(raw);
        Self {
            raw,
            joules: f64::from(raw) * unit,
        }
    }
}

/// Energy counters of one package at one point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySnapshot {
    pub package_index: usize,
    pub package: DomainReading,
    /// `None` when the CPU has no PP0 domain
    pub pp0: Option<DomainReading>,
    /// `None` when the CPU has no DRAM domain
    pub dram: Option<DomainReading>,
}

impl EnergySnapshot {
    /// Per-domain energy consumed between `self` and a later snapshot
    pub fn delta(&self, after: &EnergySnapshot) -> PackageEnergy {
        let pair = |before: Option<DomainReading>, after: Option<DomainReading>| {
            before
                .zip(after)
                .map(|(before, after)| EnergyDelta::between(&before, &after))
        };

        PackageEnergy {
            package_index: self.package_index,
            package: EnergyDelta::between(&self.package, &after.package),
            pp0: pair(self.pp0, after.pp0),
            dram: pair(self.dram, after.dram),
        }
    }
}

/// Energy consumed in one domain over a measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyDelta {
    Joules(f64),
    /// The 32-bit counter went backwards; the real consumption is unknown
    CounterWrapped { before: u32, after: u32 },
}

impl EnergyDelta {
    pub fn between(before: &DomainReading, after: &DomainReading) -> Self {
        if after.raw < before.raw {
            EnergyDelta::CounterWrapped {
                before: before.raw,
                after: after.raw,
            }
        } else {
            EnergyDelta::Joules(after.joules - before.joules)
        }
    }

    pub fn joules(&self) -> Option<f64> {
        match self {
            EnergyDelta::Joules(j) => Some(*j),
            EnergyDelta::CounterWrapped { .. } => None,
        }
    }
}

/// Energy consumed by one package over a measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageEnergy {
    pub package_index: usize,
    pub package: EnergyDelta,
    pub pp0: Option<EnergyDelta>,
    pub dram: Option<EnergyDelta>,
}

impl PackageEnergy {
    /// Domains with a measurement, in reporting order
    pub fn domains(&self) -> Vec<(RaplDomain, EnergyDelta)> {
        RaplDomain::all()
            .into_iter()
            .filter_map(|domain| {
                let delta = match domain {
                    RaplDomain::Package => Some(self.package),
                    RaplDomain::Pp0 => self.pp0,
                    RaplDomain::Dram => self.dram,
                };
                delta.map(|delta| (domain, delta))
            })
            .collect()
    }
}

/// Before/after sampler of the package, PP0 and DRAM energy counters
pub struct RaplMonitor<'a, M: MsrAccess> {
    system: &'a RaplSystem,
    msr: &'a M,
    before: Option<Vec<EnergySnapshot>>,
}

impl<'a, M: MsrAccess> RaplMonitor<'a, M> {
    pub fn new(system: &'a RaplSystem, msr: &'a M) -> Self {
        Self {
            system,
            msr,
            before: None,
        }
    }

    /// Read the energy counters of one package
    ///
    /// PP0 and DRAM are only read when the CPU has them.
    pub fn sample(&self, index: usize) -> Result<EnergySnapshot> {
        let package = self.system.package(index)?;
        let units = self.system.units(index)?;
        let registers = &self.system.registers;
        let caps = self.system.capabilities;

        let handle = self.msr.open(package.cpu)?;
        let read = |addr: u64, unit: f64| -> Result<DomainReading> {
            Ok(DomainReading::new(self.msr.read(&handle, addr)?, unit))
        };

        let snapshot = EnergySnapshot {
            package_index: index,
            package: read(registers.pkg_energy_status, units.energy_unit)?,
            pp0: caps
                .pp0
                .then(|| read(registers.pp0_energy_status, units.energy_unit))
                .transpose()?,
            dram: caps
                .dram
                .then(|| read(registers.dram_energy_status, units.dram_energy_unit))
                .transpose()?,
        };

        tracing::trace!("Package {} energy snapshot: {:?}", index, snapshot);
        Ok(snapshot)
    }

    pub fn sample_all(&self) -> Result<Vec<EnergySnapshot>> {
        (0..self.system.total_packages())
            .map(|index| self.sample(index))
            .collect()
    }

    /// Take the "before" snapshot of every package
    pub fn start(&mut self) -> Result<()> {
        self.before = Some(self.sample_all()?);
        tracing::debug!("Energy measurement started");
        Ok(())
    }

    /// Take the "after" snapshot and return the per-package consumption
    pub fn stop(&mut self) -> Result<Vec<PackageEnergy>> {
        let before = self.before.take().ok_or(RaplError::MeasurementNotStarted)?;
        let after = self.sample_all()?;

        let energy: Vec<PackageEnergy> = before
            .iter()
            .zip(after.iter())
            .map(|(before, after)| before.delta(after))
            .collect();

        for package in &energy {
            for (domain, delta) in package.domains() {
                if let EnergyDelta::CounterWrapped { before, after } = delta {
                    tracing::warn!(
                        "Package {} {:?} energy counter wrapped ({} -> {})",
                        package.package_index,
                        domain,
                        before,
                        after
                    );
                }
            }
        }

        Ok(energy)
    }
}
