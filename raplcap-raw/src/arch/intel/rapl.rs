//! RAPL (Running Average Power Limit) register definitions for Intel client and
//! server parts from Sandy Bridge onwards
//!
//! RAPL provides energy consumption monitoring and power capping for the
//! package, PP0 (cores) and DRAM power domains.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Section 14.9: Platform Specific Power Management Support

use crate::register::{bit, field, RegisterLayout};

/// MSR addresses for RAPL
pub mod msr {
    /// RAPL Power Unit MSR - Defines energy, power, and time units
    pub const MSR_RAPL_POWER_UNIT: u64 = 0x606;

    /// Package Power Limit - Configure package power limits
    pub const MSR_PKG_POWER_LIMIT: u64 = 0x610;

    /// Package Energy Status - Total package energy consumption
    pub const MSR_PKG_ENERGY_STATUS: u64 = 0x611;

    /// Package Power Info - Package TDP and limits
    pub const MSR_PKG_POWER_INFO: u64 = 0x614;

    /// DRAM Power Limit - Memory power limits
    pub const MSR_DRAM_POWER_LIMIT: u64 = 0x618;

    /// DRAM Energy Status - Memory controller energy consumption
    pub const MSR_DRAM_ENERGY_STATUS: u64 = 0x619;

    /// PP0 Power Limit - Core power limits
    pub const MSR_PP0_POWER_LIMIT: u64 = 0x638;

    /// PP0 Energy Status - Core energy consumption
    pub const MSR_PP0_ENERGY_STATUS: u64 = 0x639;
}

/// Energy status counters are 32 bits wide; bits 63:32 are reserved.
pub const ENERGY_STATUS_MASK: u64 = 0xFFFF_FFFF;

/// Extract the energy counter from a raw `*_ENERGY_STATUS` value
pub const fn energy_counter(value: u64) -> u32 {
    (value & ENERGY_STATUS_MASK) as u32
}

/// RAPL Power Unit Register layout
///
/// Defines the units for energy, power, and time measurements.
///
/// ## Register Format
///
/// | Bits   | Field        | Description                           |
/// |--------|--------------|---------------------------------------|
/// | 0-3    | power_units  | Power units (1/2^PU watts)           |
/// | 4-7    | reserved     |                                       |
/// | 8-12   | energy_units | Energy units (1/2^ESU joules)        |
/// | 13-15  | reserved     |                                       |
/// | 16-19  | time_units   | Time units (1/2^TU seconds)          |
/// | 20-63  | reserved     |                                       |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerUnit {
    /// Power units: watts = value * (1.0 / 2^power_units)
    pub power_units: u8,

    /// Energy units: joules = value * (1.0 / 2^energy_units)
    pub energy_units: u8,

    /// Time units: seconds = value * (1.0 / 2^time_units)
    pub time_units: u8,
}

impl RegisterLayout for RaplPowerUnit {
    fn to_msr_value(&self) -> u64 {
        (self.power_units as u64 & 0x0F)
            | ((self.energy_units as u64 & 0x1F) << 8)
            | ((self.time_units as u64 & 0x0F) << 16)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            power_units: field(value, 0, 4) as u8,
            energy_units: field(value, 8, 5) as u8,
            time_units: field(value, 16, 4) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.power_units > 15 {
            return Err("Power units must be <= 15 (4 bits)");
        }
        if self.energy_units > 31 {
            return Err("Energy units must be <= 31 (5 bits)");
        }
        if self.time_units > 15 {
            return Err("Time units must be <= 15 (4 bits)");
        }
        Ok(())
    }
}

impl RaplPowerUnit {
    /// Get power unit multiplier (watts per LSB)
    pub fn power_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.power_units) as f64
    }

    /// Get energy unit multiplier (joules per LSB)
    pub fn energy_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.energy_units) as f64
    }

    /// Get time unit multiplier (seconds per LSB)
    pub fn time_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.time_units) as f64
    }
}

/// Mask of one 15-bit power limit field
pub const POWER_LIMIT_MASK: u64 = 0x7FFF;
/// Mask of one 7-bit time window field
pub const TIME_WINDOW_MASK: u64 = 0x7F;
/// Bit offset of the second limit window
pub const WINDOW_2_SHIFT: u32 = 32;

pub const LIMIT_1_ENABLE: u64 = 1 << 15;
pub const LIMIT_1_CLAMP: u64 = 1 << 16;
pub const LIMIT_2_ENABLE: u64 = 1 << 47;
pub const LIMIT_2_CLAMP: u64 = 1 << 48;
pub const LIMIT_LOCK: u64 = 1 << 63;

/// A value that fits the 15-bit power field of a limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PowerField(u16);

impl PowerField {
    pub const MAX: u16 = POWER_LIMIT_MASK as u16;

    /// Returns `None` if `raw` does not fit in 15 bits
    pub const fn new(raw: u16) -> Option<Self> {
        if raw <= Self::MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

/// Build the package power limit value to write from the value currently in
/// the register.
///
/// Both power limit fields are set to `power`, and the enable and clamp bits
/// of both windows are set. Every other bit of `current` is preserved: time
/// windows, reserved bits and the lock bit.
pub const fn build_limit_register(current: u64, power: PowerField) -> u64 {
    let power = power.get() as u64;
    let cleared = current & !POWER_LIMIT_MASK & !(POWER_LIMIT_MASK << WINDOW_2_SHIFT);

    cleared
        | power
        | (power << WINDOW_2_SHIFT)
        | LIMIT_1_ENABLE
        | LIMIT_1_CLAMP
        | LIMIT_2_ENABLE
        | LIMIT_2_CLAMP
}

/// RAPL Power Limit Register layout
///
/// Configures power limits and time windows for the package power domain.
///
/// ## Register Format
///
/// | Bits   | Field          | Description                        |
/// |--------|----------------|------------------------------------|
/// | 0-14   | power_limit_1  | Power limit 1 (power units)       |
/// | 15     | enable_1       | Enable power limit 1              |
/// | 16     | clamp_1        | Clamp to power limit 1            |
/// | 17-23  | time_window_1  | Time window 1 (time units)        |
/// | 24-31  | reserved       |                                    |
/// | 32-46  | power_limit_2  | Power limit 2 (power units)       |
/// | 47     | enable_2       | Enable power limit 2              |
/// | 48     | clamp_2        | Clamp to power limit 2            |
/// | 49-55  | time_window_2  | Time window 2 (time units)        |
/// | 56-62  | reserved       |                                    |
/// | 63     | lock           | Lock register                     |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerLimit {
    /// Power limit 1 (scaled by power units)
    pub power_limit_1: u16,

    /// Enable power limit 1
    pub enable_1: bool,

    /// Clamp to power limit 1
    pub clamp_1: bool,

    /// Time window 1 (bits 17-23)
    pub time_window_1: u8,

    /// Power limit 2 (scaled by power units)
    pub power_limit_2: u16,

    /// Enable power limit 2
    pub enable_2: bool,

    /// Clamp to power limit 2
    pub clamp_2: bool,

    /// Time window 2 (bits 49-55)
    pub time_window_2: u8,

    /// Lock register (prevents further writes until reset)
    pub lock: bool,
}

impl RegisterLayout for RaplPowerLimit {
    fn to_msr_value(&self) -> u64 {
        (self.power_limit_1 as u64 & POWER_LIMIT_MASK)
            | (if self.enable_1 { LIMIT_1_ENABLE } else { 0 })
            | (if self.clamp_1 { LIMIT_1_CLAMP } else { 0 })
            | ((self.time_window_1 as u64 & TIME_WINDOW_MASK) << 17)
            | ((self.power_limit_2 as u64 & POWER_LIMIT_MASK) << WINDOW_2_SHIFT)
            | (if self.enable_2 { LIMIT_2_ENABLE } else { 0 })
            | (if self.clamp_2 { LIMIT_2_CLAMP } else { 0 })
            | ((self.time_window_2 as u64 & TIME_WINDOW_MASK) << 49)
            | (if self.lock { LIMIT_LOCK } else { 0 })
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            power_limit_1: field(value, 0, 15) as u16,
            enable_1: bit(value, 15),
            clamp_1: bit(value, 16),
            time_window_1: field(value, 17, 7) as u8,
            power_limit_2: field(value, 32, 15) as u16,
            enable_2: bit(value, 47),
            clamp_2: bit(value, 48),
            time_window_2: field(value, 49, 7) as u8,
            lock: bit(value, 63),
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.power_limit_1 > PowerField::MAX {
            return Err("Power limit 1 must be <= 0x7FFF (15 bits)");
        }
        if self.time_window_1 > 127 {
            return Err("Time window 1 must be <= 127 (7 bits)");
        }
        if self.power_limit_2 > PowerField::MAX {
            return Err("Power limit 2 must be <= 0x7FFF (15 bits)");
        }
        if self.time_window_2 > 127 {
            return Err("Time window 2 must be <= 127 (7 bits)");
        }
        Ok(())
    }
}

/// Single-window power limit layout used by the PP0 and DRAM domains
///
/// | Bits   | Field        |
/// |--------|--------------|
/// | 0-14   | power_limit  |
/// | 15     | enable       |
/// | 16     | clamp        |
/// | 17-23  | time_window  |
/// | 31     | lock         |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplDomainLimit {
    pub power_limit: u16,
    pub enable: bool,
    pub clamp: bool,
    pub time_window: u8,
    pub lock: bool,
}

impl RegisterLayout for RaplDomainLimit {
    fn to_msr_value(&self) -> u64 {
        (self.power_limit as u64 & POWER_LIMIT_MASK)
            | (if self.enable { LIMIT_1_ENABLE } else { 0 })
            | (if self.clamp { LIMIT_1_CLAMP } else { 0 })
            | ((self.time_window as u64 & TIME_WINDOW_MASK) << 17)
            | (if self.lock { 1 << 31 } else { 0 })
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            power_limit: field(value, 0, 15) as u16,
            enable: bit(value, 15),
            clamp: bit(value, 16),
            time_window: field(value, 17, 7) as u8,
            lock: bit(value, 31),
        }
    }
}

/// Package Power Info layout (read-only)
///
/// | Bits   | Field               |
/// |--------|---------------------|
/// | 0-14   | thermal_spec_power  |
/// | 16-30  | minimum_power       |
/// | 32-46  | maximum_power       |
/// | 48-54  | maximum_time_window |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerInfo {
    pub thermal_spec_power: u16,
    pub minimum_power: u16,
    pub maximum_power: u16,
    pub maximum_time_window: u8,
}

impl RegisterLayout for RaplPowerInfo {
    fn to_msr_value(&self) -> u64 {
        (self.thermal_spec_power as u64 & POWER_LIMIT_MASK)
            | ((self.minimum_power as u64 & POWER_LIMIT_MASK) << 16)
            | ((self.maximum_power as u64 & POWER_LIMIT_MASK) << 32)
            | ((self.maximum_time_window as u64 & TIME_WINDOW_MASK) << 48)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            thermal_spec_power: field(value, 0, 15) as u16,
            minimum_power: field(value, 16, 15) as u16,
            maximum_power: field(value, 32, 15) as u16,
            maximum_time_window: field(value, 48, 7) as u8,
        }
    }
}
