use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use crate::error::{RaplError, Result};

/// Per-CPU physical package ids, addressed by logical CPU index
pub trait TopologySource {
    /// Package id of `cpu`, or `None` if the CPU is not present
    fn package_id(&self, cpu: usize) -> Result<Option<u32>>;
}

/// `/sys/devices/system/cpu/cpu<N>/topology/physical_package_id`
#[derive(Debug, Clone)]
pub struct SysfsTopology {
    dir: PathBuf,
}

impl SysfsTopology {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TopologySource for SysfsTopology {
    fn package_id(&self, cpu: usize) -> Result<Option<u32>> {
        let path = self
            .dir
            .join(format!("cpu{cpu}"))
            .join("topology")
            .join("physical_package_id");

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        text.trim().parse().map(Some).map_err(|e| {
            RaplError::ParseError(format!("{}: {:?}: {e}", path.display(), text.trim()))
        })
    }
}

/// One physical package and the logical CPU used to reach its MSRs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    /// Position in `0..total_packages`
    pub index: usize,
    /// Id reported by the kernel
    pub package_id: u32,
    /// First logical CPU seen on this package
    pub cpu: u32,
}

/// Logical CPU and the package it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuPackage {
    pub cpu: u32,
    pub package_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTopology {
    packages: Vec<Package>,
    cpus: Vec<CpuPackage>,
}

impl PackageTopology {
    /// Scan CPUs `0, 1, 2, ...` until the first one that is not present
    ///
    /// CPU indices are assumed contiguous from 0. A CPU at index `max_cpus`
    /// or a package id `>= max_packages` fails with `TopologyOverflow`.
    pub fn scan(
        source: &impl TopologySource,
        max_cpus: usize,
        max_packages: usize,
    ) -> Result<Self> {
        let mut cpus = Vec::new();
        let mut first_cpu: BTreeMap<u32, u32> = BTreeMap::new();

        for cpu in 0.. {
            let Some(package_id) = source.package_id(cpu)? else {
                break;
            };

            if cpu >= max_cpus {
                return Err(RaplError::TopologyOverflow(format!(
                    "more than {max_cpus} logical CPUs"
                )));
            }

            if package_id as usize >= max_packages {
                return Err(RaplError::TopologyOverflow(format!(
                    "package id {package_id} of CPU {cpu} exceeds the limit of {max_packages} packages"
                )));
            }

            let cpu = cpu as u32;
            cpus.push(CpuPackage { cpu, package_id });
            first_cpu.entry(package_id).or_insert(cpu);
        }

        let packages: Vec<Package> = first_cpu
            .into_iter()
            .enumerate()
            .map(|(index, (package_id, cpu))| Package {
                index,
                package_id,
                cpu,
            })
            .collect();

        tracing::info!(
            "Detected {} packages over {} logical CPUs",
            packages.len(),
            cpus.len()
        );

        Ok(Self { packages, cpus })
    }

    pub fn total_packages(&self) -> usize {
        self.packages.len()
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn cpus(&self) -> &[CpuPackage] {
        &self.cpus
    }

    pub fn package(&self, index: usize) -> Result<&Package> {
        self.packages.get(index).ok_or(RaplError::UnknownPackage {
            index,
            total: self.packages.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Package id per CPU index; CPUs past the end are absent
    pub(crate) struct FixedTopology(pub Vec<u32>);

    impl TopologySource for FixedTopology {
        fn package_id(&self, cpu: usize) -> Result<Option<u32>> {
            Ok(self.0.get(cpu).copied())
        }
    }

    #[test]
    fn test_two_sockets_interleaved() {
        let topo = PackageTopology::scan(&FixedTopology(vec![0, 1, 0, 1, 0, 1]), 1024, 16)
            .unwrap();

        assert_eq!(topo.total_packages(), 2);
        assert_eq!(topo.package(0).unwrap().cpu, 0);
        assert_eq!(topo.package(1).unwrap().cpu, 1);
        assert_eq!(topo.cpus().len(), 6);
    }

    #[test]
    fn test_non_contiguous_package_ids() {
        let topo = PackageTopology::scan(&FixedTopology(vec![3, 3, 0, 0]), 1024, 16).unwrap();

        assert_eq!(topo.total_packages(), 2);
        assert_eq!(
            topo.packages(),
            &[
                Package {
                    index: 0,
                    package_id: 0,
                    cpu: 2
                },
                Package {
                    index: 1,
                    package_id: 3,
                    cpu: 0
                },
            ]
        );
    }

    #[test]
    fn test_unknown_package_index() {
        let topo = PackageTopology::scan(&FixedTopology(vec![0, 0]), 1024, 16).unwrap();
        let err = topo.package(1).unwrap_err();
        assert!(matches!(
            err,
            RaplError::UnknownPackage { index: 1, total: 1 }
        ));
    }

    #[test]
    fn test_overflow() {
        let err = PackageTopology::scan(&FixedTopology(vec![0; 5]), 4, 16).unwrap_err();
        assert!(matches!(err, RaplError::TopologyOverflow(_)));

        let ok = PackageTopology::scan(&FixedTopology(vec![0; 4]), 4, 16).unwrap();
        assert_eq!(ok.cpus().len(), 4);

        let err = PackageTopology::scan(&FixedTopology(vec![0, 16]), 1024, 16).unwrap_err();
        assert!(matches!(err, RaplError::TopologyOverflow(_)));
    }

    #[test]
    fn test_empty_topology() {
        let topo = PackageTopology::scan(&FixedTopology(vec![]), 1024, 16).unwrap();
        assert_eq!(topo.total_packages(), 0);
    }

    #[test]
    fn test_sysfs_scan_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        for (cpu, package) in [(0, "0\n"), (1, "1\n"), (3, "1\n")] {
            let topo = dir.path().join(format!("cpu{cpu}")).join("topology");
            std::fs::create_dir_all(&topo).unwrap();
            std::fs::write(topo.join("physical_package_id"), package).unwrap();
        }

        let source = SysfsTopology::new(dir.path());
        let topo = PackageTopology::scan(&source, 1024, 16).unwrap();
        assert_eq!(topo.cpus().len(), 2);
        assert_eq!(topo.total_packages(), 2);
    }

    #[test]
    fn test_sysfs_garbage_package_id() {
        let dir = tempfile::tempdir().unwrap();
        let topo = dir.path().join("cpu0").join("topology");
        std::fs::create_dir_all(&topo).unwrap();
        std::fs::write(topo.join("physical_package_id"), "socket0\n").unwrap();

        let err = SysfsTopology::new(dir.path()).package_id(0).unwrap_err();
        assert!(matches!(err, RaplError::ParseError(_)));
    }
}
