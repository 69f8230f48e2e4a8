pub mod info;
pub mod limit;
pub mod monitor;
pub mod units;

pub use info::{read_package_info, DomainPowerLimit, PackageInfo, PackagePowerInfo};
pub use limit::{
    decode_limit, encode_limit_field, LimitOutcome, LimitWarning, LimitWindow, PackagePowerLimit,
    PowerLimiter,
};
pub use monitor::{DomainReading, EnergyDelta, EnergySnapshot, PackageEnergy, RaplMonitor};
pub use units::{decode_units, read_units, UnitSet};
