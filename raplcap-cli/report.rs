//! Human-readable report written to stdout
//!
//! The layout is informational only; nothing parses it.

use std::io::Write;

use crate::common::PackageTopology;
use crate::counters::rapl::{
    EnergyDelta, LimitOutcome, LimitWarning, LimitWindow, PackageEnergy, PackageInfo,
};
use crate::error::Result;
use crate::system::RaplSystem;

const CPUS_PER_LINE: usize = 8;

pub fn write_identity(out: &mut impl Write, system: &RaplSystem) -> Result<()> {
    writeln!(out, "Found {} Processor type", system.arch.name())?;
    Ok(())
}

/// `cpu (package)` pairs, eight per line
pub fn write_topology(out: &mut impl Write, topology: &PackageTopology) -> Result<()> {
    let cpus = topology.cpus();
    write!(out, "\t")?;
    for (i, cpu) in cpus.iter().enumerate() {
        write!(out, "{} ({})", cpu.cpu, cpu.package_id)?;
        if i + 1 == cpus.len() {
            break;
        }
        if i % CPUS_PER_LINE == CPUS_PER_LINE - 1 {
            write!(out, "\n\t")?;
        } else {
            write!(out, ", ")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "\tDetected {} packages", topology.total_packages())?;
    writeln!(out)?;
    Ok(())
}

pub fn write_units(out: &mut impl Write, system: &RaplSystem) -> Result<()> {
    for package in system.topology.packages() {
        let units = system.units(package.index)?;
        writeln!(out, "\tListing parameters for package #{}", package.index)?;
        writeln!(out, "\t\tPower units = {:.3}W", units.power_unit)?;
        writeln!(out, "\t\tCPU Energy units = {:.8}J", units.energy_unit)?;
        writeln!(out, "\t\tDRAM Energy units = {:.8}J", units.dram_energy_unit)?;
        writeln!(out, "\t\tTime units = {:.8}s", units.time_unit)?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_package_info(out: &mut impl Write, info: &PackageInfo) -> Result<()> {
    let power = &info.power_info;
    writeln!(out, "\tPackage {} power info:", info.package_index)?;
    writeln!(
        out,
        "\t\tThermal spec: {:.3}W, minimum {:.3}W, maximum {:.3}W, max window {:.6}s",
        power.thermal_spec_watts,
        power.minimum_watts,
        power.maximum_watts,
        power.maximum_window_seconds
    )?;

    for (name, limit) in [("PowerPlane0", info.pp0_limit), ("DRAM", info.dram_limit)] {
        if let Some(limit) = limit {
            writeln!(
                out,
                "\t\t{} limit: {:.3}W for {:.6}s ({}, {}){}",
                name,
                limit.watts,
                limit.seconds,
                enabled_label(limit.enabled),
                clamped_label(limit.clamped),
                if limit.locked { " locked" } else { "" }
            )?;
        }
    }
    Ok(())
}

pub fn write_energy(out: &mut impl Write, energy: &[PackageEnergy]) -> Result<()> {
    for package in energy {
        writeln!(out, "\tPackage {}:", package.package_index)?;
        for (domain, delta) in package.domains() {
            match delta {
                EnergyDelta::Joules(joules) => {
                    writeln!(out, "\t\t{}: {:.6}J", domain.name(), joules)?
                }
                EnergyDelta::CounterWrapped { before, after } => writeln!(
                    out,
                    "\t\t{}: counter wrapped ({} -> {})",
                    domain.name(),
                    before,
                    after
                )?,
            }
        }
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_limit(out: &mut impl Write, outcome: &LimitOutcome) -> Result<()> {
    writeln!(out, "Package {}:", outcome.package_index)?;
    writeln!(
        out,
        "Package power limits are {}",
        if outcome.limit.locked {
            "locked"
        } else {
            "unlocked"
        }
    )?;
    for (n, window) in outcome.limit.windows.iter().enumerate() {
        write_window(out, n + 1, window)?;
    }
    for warning in &outcome.warnings {
        match warning {
            LimitWarning::RegisterLocked => {
                writeln!(out, "Warning: limit register is locked until reset")?
            }
            LimitWarning::NotApplied { expected, actual } => writeln!(
                out,
                "Warning: limit not applied (wrote 0x{expected:016x}, read 0x{actual:016x})"
            )?,
        }
    }
    Ok(())
}

fn write_window(out: &mut impl Write, n: usize, window: &LimitWindow) -> Result<()> {
    writeln!(
        out,
        "Package power limit #{}: {:.3}W for {:.6}s ({}, {})",
        n,
        window.watts,
        window.seconds,
        enabled_label(window.enabled),
        clamped_label(window.clamped)
    )?;
    Ok(())
}

fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "enable power limit"
    } else {
        "disabled"
    }
}

fn clamped_label(clamped: bool) -> &'static str {
    if clamped {
        "clamped"
    } else {
        "not_clamped"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::msr::fake::FakeMsr;
    use crate::common::topology::tests::FixedTopology;
    use crate::counters::rapl::decode_limit;
    use crate::system::tests::two_socket_system;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_identity_and_units() {
        let msr = FakeMsr::with_cpus(0..4);
        let system = two_socket_system(&msr);

        let text = render(|out| write_identity(out, &system));
        assert_eq!(text, "Found Sandybridge-EP Processor type\n");

        let text = render(|out| write_units(out, &system));
        assert!(text.contains("\tListing parameters for package #1\n"));
        assert!(text.contains("\t\tPower units = 0.125W\n"));
        assert!(text.contains("\t\tCPU Energy units = 0.00001526J\n"));
        assert!(text.contains("\t\tTime units = 0.00097656s\n"));
    }

    #[test]
    fn test_topology_wraps_every_eight_cpus() {
        let topology =
            PackageTopology::scan(&FixedTopology(vec![0; 9]), 1024, 16).unwrap();

        let text = render(|out| write_topology(out, &topology));
        assert_eq!(
            text,
            "\t0 (0), 1 (0), 2 (0), 3 (0), 4 (0), 5 (0), 6 (0), 7 (0)\n\t8 (0)\n\tDetected 1 packages\n\n"
        );
    }

    #[test]
    fn test_energy_report() {
        let energy = PackageEnergy {
            package_index: 0,
            package: EnergyDelta::Joules(12.5),
            pp0: Some(EnergyDelta::CounterWrapped {
                before: 1000,
                after: 10,
            }),
            dram: None,
        };

        let text = render(|out| write_energy(out, &[energy]));
        assert_eq!(
            text,
            "\tPackage 0:\n\t\tPackage energy: 12.500000J\n\t\tPowerPlane0 (cores): counter wrapped (1000 -> 10)\n\n"
        );
    }

    #[test]
    fn test_limit_report() {
        let units = crate::counters::rapl::decode_units(0x000A_1003);
        let value = 0x8001_8320_0001_8320;
        let outcome = LimitOutcome {
            package_index: 0,
            previous: 1 << 63,
            written: value,
            readback: value,
            limit: decode_limit(value, &units),
            warnings: vec![LimitWarning::RegisterLocked],
        };

        let text = render(|out| write_limit(out, &outcome));
        assert_eq!(
            text,
            "Package 0:\n\
             Package power limits are locked\n\
             Package power limit #1: 100.000W for 0.000000s (enable power limit, clamped)\n\
             Package power limit #2: 100.000W for 0.000000s (enable power limit, clamped)\n\
             Warning: limit register is locked until reset\n"
        );
    }
}
