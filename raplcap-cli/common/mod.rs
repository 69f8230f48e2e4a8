pub mod arch;
pub mod msr;
pub mod topology;

pub use arch::{Capabilities, CpuIdentity, Microarchitecture, RegisterMap, Vendor};
pub use msr::{DevMsr, MsrAccess};
pub use topology::{Package, PackageTopology, SysfsTopology, TopologySource};
