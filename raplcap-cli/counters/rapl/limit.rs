use raplcap_raw::intel::rapl::{
    build_limit_register, PowerField, RaplPowerLimit, POWER_LIMIT_MASK, WINDOW_2_SHIFT,
};
use raplcap_raw::RegisterLayout;

use super::units::UnitSet;
use crate::common::MsrAccess;
use crate::config::PowerRequest;
use crate::error::{RaplError, Result};
use crate::system::RaplSystem;

const POWER_FIELDS: u64 = POWER_LIMIT_MASK | (POWER_LIMIT_MASK << WINDOW_2_SHIFT);

/// Convert watts to the 15-bit power field of one package
///
/// Requests below one power unit or above the largest field value cannot be
/// represented and are rejected rather than truncated.
pub fn encode_limit_field(watts: f64, power_unit: f64) -> Result<PowerField> {
    let min = power_unit;
    let max = power_unit * f64::from(PowerField::MAX);

    if !(min..=max).contains(&watts) {
        return Err(RaplError::InvalidPowerRequest(format!(
            "{watts} W is outside the encodable range {min:.3} - {max:.3} W"
        )));
    }

    let raw = (watts / power_unit).round() as u16;
    PowerField::new(raw).ok_or_else(|| {
        RaplError::InvalidPowerRequest(format!("{watts} W does not fit the power limit field"))
    })
}

/// One of the two package power limit windows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitWindow {
    pub watts: f64,
    pub seconds: f64,
    pub enabled: bool,
    pub clamped: bool,
}

/// `MSR_PKG_POWER_LIMIT` in physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackagePowerLimit {
    pub locked: bool,
    pub windows: [LimitWindow; 2],
}

pub fn decode_limit(value: u64, units: &UnitSet) -> PackagePowerLimit {
    let limit = RaplPowerLimit::from_msr_value(value);

    PackagePowerLimit {
        locked: limit.lock,
        windows: [
            LimitWindow {
                watts: units.power_unit * f64::from(limit.power_limit_1),
                seconds: units.time_unit * f64::from(limit.time_window_1),
                enabled: limit.enable_1,
                clamped: limit.clamp_1,
            },
            LimitWindow {
                watts: units.power_unit * f64::from(limit.power_limit_2),
                seconds: units.time_unit * f64::from(limit.time_window_2),
                enabled: limit.enable_2,
                clamped: limit.clamp_2,
            },
        ],
    }
}

/// Non-fatal findings of the read-back after a limit write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWarning {
    /// The lock bit is set; the hardware may ignore the new limit until reset
    RegisterLocked,
    /// The power fields read back differ from the ones written
    NotApplied { expected: u64, actual: u64 },
}

/// Result of writing the limit of one package
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOutcome {
    pub package_index: usize,
    /// Register value before the write
    pub previous: u64,
    pub written: u64,
    pub readback: u64,
    /// Decoded read-back value
    pub limit: PackagePowerLimit,
    pub warnings: Vec<LimitWarning>,
}

impl LimitOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct PowerLimiter<'a, M: MsrAccess> {
    system: &'a RaplSystem,
    msr: &'a M,
}

impl<'a, M: MsrAccess> PowerLimiter<'a, M> {
    pub fn new(system: &'a RaplSystem, msr: &'a M) -> Self {
        Self { system, msr }
    }

    /// Current package power limit of one package
    pub fn read_limit(&self, index: usize) -> Result<PackagePowerLimit> {
        let package = self.system.package(index)?;
        let units = self.system.units(index)?;

        let handle = self.msr.open(package.cpu)?;
        let value = self.msr.read(&handle, self.system.registers.pkg_power_limit)?;
        Ok(decode_limit(value, units))
    }

    /// Set both package limit windows of one package to `request`
    ///
    /// The register is read right before the write so the lock bit, time
    /// windows and reserved bits are carried over, then read back.
    pub fn apply(&self, index: usize, request: PowerRequest) -> Result<LimitOutcome> {
        let units = self.system.units(index)?;
        let field = encode_limit_field(request.watts, units.power_unit)?;
        self.write_field(index, field)
    }

    /// Apply `request` to every package
    ///
    /// The request is encoded for all packages before the first write.
    pub fn apply_all(&self, request: PowerRequest) -> Result<Vec<LimitOutcome>> {
        let fields = (0..self.system.total_packages())
            .map(|index| {
                let units = self.system.units(index)?;
                encode_limit_field(request.watts, units.power_unit)
            })
            .collect::<Result<Vec<_>>>()?;

        fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| self.write_field(index, field))
            .collect()
    }

    fn write_field(&self, index: usize, field: PowerField) -> Result<LimitOutcome> {
        let package = self.system.package(index)?;
        let units = self.system.units(index)?;
        let addr = self.system.registers.pkg_power_limit;

        let handle = self.msr.open(package.cpu)?;
        let previous = self.msr.read(&handle, addr)?;

        let current = decode_limit(previous, units);
        tracing::info!(
            "Package {} current limit: {:.3}W for {:.6}s / {:.3}W for {:.6}s{}",
            index,
            current.windows[0].watts,
            current.windows[0].seconds,
            current.windows[1].watts,
            current.windows[1].seconds,
            if current.locked { " (locked)" } else { "" }
        );

        let written = build_limit_register(previous, field);
        self.msr.write(&handle, addr, written)?;
        let readback = self.msr.read(&handle, addr)?;

        let limit = decode_limit(readback, units);
        let mut warnings = Vec::new();

        if limit.locked {
            tracing::warn!(
                "Package {} power limit register is locked, the new limit may be ignored",
                index
            );
            warnings.push(LimitWarning::RegisterLocked);
        }

        if readback & POWER_FIELDS != written & POWER_FIELDS {
            tracing::warn!(
                "Package {} power limit not applied: wrote 0x{:016x}, read back 0x{:016x}",
                index,
                written,
                readback
            );
            warnings.push(LimitWarning::NotApplied {
                expected: written,
                actual: readback,
            });
        }

        Ok(LimitOutcome {
            package_index: index,
            previous,
            written,
            readback,
            limit,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::msr::fake::FakeMsr;
    use crate::config::ToolConfig;
    use crate::system::tests::two_socket_system;
    use raplcap_raw::intel::rapl::LIMIT_LOCK;

    fn sandybridge_units() -> UnitSet {
        crate::counters::rapl::decode_units(0x000A_1003)
    }

    #[test]
    fn test_encode_rounds_to_nearest_unit() {
        assert_eq!(encode_limit_field(100.0, 0.125).unwrap().get(), 800);
        assert_eq!(encode_limit_field(10.06, 0.125).unwrap().get(), 80);
        assert_eq!(encode_limit_field(10.07, 0.125).unwrap().get(), 81);
    }

    #[test]
    fn test_encode_range() {
        assert_eq!(encode_limit_field(0.125, 0.125).unwrap().get(), 1);
        assert_eq!(
            encode_limit_field(0.125 * 32767.0, 0.125).unwrap().get(),
            0x7FFF
        );

        for watts in [0.0, 0.1, 4096.0, -5.0] {
            let err = encode_limit_field(watts, 0.125).unwrap_err();
            assert_eq!(err.exit_code(), 64);
        }
    }

    #[test]
    fn test_cli_range_encodes_on_every_power_unit_up_to_one_watt() {
        let config = ToolConfig::default();
        for power in 0..=3 {
            let unit = 1.0 / f64::from(1u32 << power);
            for watts in [config.min_watts, config.max_watts] {
                let request = config.power_request(watts).unwrap();
                assert!(encode_limit_field(request.watts, unit).is_ok());
            }
        }
        assert!(config.power_request(9).is_err());
        assert!(config.power_request(216).is_err());
    }

    #[test]
    fn test_decode_limit() {
        let units = sandybridge_units();
        // 100 W, window 1 = 10 units, window 2 = 3 units, both enabled and clamped
        let value = 0x8007_8320_0015_8320;
        let limit = decode_limit(value, &units);

        assert!(limit.locked);
        assert_eq!(limit.windows[0].watts, 100.0);
        assert_eq!(limit.windows[0].seconds, 10.0 / 1024.0);
        assert!(limit.windows[0].enabled && limit.windows[0].clamped);
        assert_eq!(limit.windows[1].watts, 100.0);
        assert_eq!(limit.windows[1].seconds, 3.0 / 1024.0);
        assert!(limit.windows[1].enabled && limit.windows[1].clamped);
    }

    #[test]
    fn test_apply_locked_register() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);
        msr.set(0, 0x610, LIMIT_LOCK);

        let request = ToolConfig::default().power_request(100).unwrap();
        let outcome = PowerLimiter::new(&system, &msr).apply(0, request).unwrap();

        assert_eq!(outcome.previous, LIMIT_LOCK);
        assert_eq!(outcome.written, 0x8001_8320_0001_8320);
        assert_eq!(msr.get(0, 0x610), Some(0x8001_8320_0001_8320));
        assert_eq!(outcome.warnings, vec![LimitWarning::RegisterLocked]);
        assert_eq!(outcome.limit.windows[0].watts, 100.0);
    }

    #[test]
    fn test_apply_preserves_time_windows() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);
        let previous = 0x0007_0000_00DE_0000 | 0x0000_0000_0000_0123;
        msr.set(1, 0x610, previous);

        let request = ToolConfig::default().power_request(50).unwrap();
        let outcome = PowerLimiter::new(&system, &msr).apply(1, request).unwrap();

        assert!(outcome.is_clean());
        assert_eq!(outcome.written & 0x00FE_0000_00FE_0000, previous & 0x00FE_0000_00FE_0000);
        assert_eq!(outcome.limit.windows[0].watts, 50.0);
        assert_eq!(outcome.limit.windows[1].watts, 50.0);
    }

    #[test]
    fn test_round_trip_within_one_unit() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);
        msr.set(0, 0x610, 0);
        let config = ToolConfig::default();
        let limiter = PowerLimiter::new(&system, &msr);

        for watts in config.min_watts..=config.max_watts {
            let request = config.power_request(watts).unwrap();
            limiter.apply(0, request).unwrap();

            let limit = limiter.read_limit(0).unwrap();
            for window in limit.windows {
                assert!((window.watts - request.watts).abs() <= 0.125);
                assert!(window.enabled);
                assert!(window.clamped);
            }
        }
    }

    #[test]
    fn test_apply_is_idempotent() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);
        msr.set(0, 0x610, 0x0000_8000_0000_00AB);

        let request = ToolConfig::default().power_request(120).unwrap();
        let limiter = PowerLimiter::new(&system, &msr);
        let first = limiter.apply(0, request).unwrap();
        let second = limiter.apply(0, request).unwrap();

        assert_eq!(first.written, second.written);
        assert_eq!(second.previous, first.written);
    }

    #[test]
    fn test_ignored_write_is_reported() {
        let mut msr = FakeMsr::with_cpus(0..4);
        msr.freeze(0, 0x610);
        let system = two_socket_system(&msr);
        msr.set(0, 0x610, 0x0000_0000_0000_0320);

        let request = ToolConfig::default().power_request(100).unwrap();
        let outcome = PowerLimiter::new(&system, &msr).apply(0, request).unwrap();

        assert_eq!(
            outcome.warnings,
            vec![LimitWarning::NotApplied {
                expected: 0x0001_8320_0001_8320,
                actual: 0x0000_0000_0000_0320,
            }]
        );
    }

    #[test]
    fn test_apply_all_packages() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);
        msr.set(0, 0x610, 0);
        msr.set(1, 0x610, 0);

        let request = ToolConfig::default().power_request(215).unwrap();
        let outcomes = PowerLimiter::new(&system, &msr).apply_all(request).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(msr.get(0, 0x610), Some(0x0001_86B8_0001_86B8));
        assert_eq!(msr.get(1, 0x610), Some(0x0001_86B8_0001_86B8));
    }

    #[test]
    fn test_apply_all_validates_before_writing() {
        let msr = FakeMsr::with_cpus(0..2);
        msr.set(0, 0x606, 0x000A_1003);
        // 1 W power unit on the second package cannot encode 0.5 W
        msr.set(1, 0x606, 0x000A_1000);
        msr.set(0, 0x610, 0);
        msr.set(1, 0x610, 0);
        let system = RaplSystem::from_parts(
            crate::system::tests::identity(45),
            &crate::common::topology::tests::FixedTopology(vec![0, 1]),
            &ToolConfig::default(),
            &msr,
        )
        .unwrap();

        let err = PowerLimiter::new(&system, &msr)
            .apply_all(PowerRequest { watts: 0.5 })
            .unwrap_err();
        assert!(matches!(err, RaplError::InvalidPowerRequest(_)));
        assert!(msr.writes.borrow().is_empty());
    }
}
