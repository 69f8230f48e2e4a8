use raplcap_raw::intel::rapl::RaplPowerUnit;
use raplcap_raw::RegisterLayout;

use crate::common::{MsrAccess, RegisterMap};
use crate::error::Result;

/// Scaling factors of one package, decoded from `MSR_RAPL_POWER_UNIT`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSet {
    /// Watts per LSB
    pub power_unit: f64,
    /// Joules per LSB of the package and PP0 counters
    pub energy_unit: f64,
    /// Joules per LSB of the DRAM counter
    pub dram_energy_unit: f64,
    /// Seconds per LSB
    pub time_unit: f64,
}

/// Decode the three unit exponents: each unit is `2^-field`
///
/// The DRAM energy unit equals the CPU energy unit on every part with a
/// capability entry. Haswell-EP and later use a fixed DRAM unit instead.
pub fn decode_units(raw: u64) -> UnitSet {
    let unit = RaplPowerUnit::from_msr_value(raw);
    let energy_unit = unit.energy_unit_multiplier();

    UnitSet {
        power_unit: unit.power_unit_multiplier(),
        energy_unit,
        dram_energy_unit: energy_unit,
        time_unit: unit.time_unit_multiplier(),
    }
}

/// Read and decode the unit register through an open handle
pub fn read_units<M: MsrAccess>(
    msr: &M,
    handle: &M::Handle,
    registers: &RegisterMap,
) -> Result<UnitSet> {
    let raw = msr.read(handle, registers.power_unit)?;
    let units = decode_units(raw);

    tracing::debug!(
        "RAPL units: power {} W, energy {} J, time {} s",
        units.power_unit,
        units.energy_unit,
        units.time_unit
    );

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::msr::fake::FakeMsr;

    #[test]
    fn test_decode_units_literal() {
        let units = decode_units(0x50000);
        assert_eq!(units.power_unit, 1.0);
        assert_eq!(units.energy_unit, 1.0);
        assert_eq!(units.dram_energy_unit, 1.0);
        assert_eq!(units.time_unit, 0.03125);
    }

    #[test]
    fn test_decode_units_sandybridge_defaults() {
        // 1/8 W, 1/65536 J (15.3 uJ), 1/1024 s
        let units = decode_units(0x000A_1003);
        assert_eq!(units.power_unit, 0.125);
        assert_eq!(units.energy_unit, 1.0 / 65536.0);
        assert_eq!(units.time_unit, 1.0 / 1024.0);
    }

    #[test]
    fn test_decode_units_every_field_value() {
        for power in 0..16u64 {
            for energy in 0..32u64 {
                let raw = power | (energy << 8) | ((15 - power) << 16);
                let units = decode_units(raw);

                assert!(units.power_unit > 0.0);
                assert!(units.energy_unit > 0.0);
                assert!(units.time_unit > 0.0);
                assert_eq!(units.power_unit, 2f64.powi(-(power as i32)));
                assert_eq!(units.energy_unit, 2f64.powi(-(energy as i32)));
                assert_eq!(units.time_unit, 2f64.powi(-((15 - power) as i32)));
                assert_eq!(units.dram_energy_unit, units.energy_unit);
            }
        }
    }

    #[test]
    fn test_read_units_uses_unit_register() {
        let msr = FakeMsr::with_cpus([0]);
        msr.set(0, 0x606, 0x000A_0E03);

        let handle = msr.open(0).unwrap();
        let units = read_units(&msr, &handle, &RegisterMap::INTEL).unwrap();
        assert_eq!(units.power_unit, 0.125);
        assert_eq!(units.energy_unit, 1.0 / 16384.0);
    }
}
