//! # raplcap-raw
//!
//! Register definitions and MSR primitives for Intel RAPL (Running Average
//! Power Limit).
//!
//! This crate provides type-safe abstractions over MSR (Model-Specific Register)
//! access through `/dev/cpu/*/msr`, and the bit layouts of the RAPL unit,
//! energy status, power info and power limit registers.
//!
//! ## Usage
//!
//! ```ignore
//! use raplcap_raw::intel::rapl::{self, msr, PowerField, RaplPowerLimit};
//! use raplcap_raw::{MsrFile, RegisterLayout};
//!
//! let dev = MsrFile::open(0)?;
//! let current = dev.read(msr::MSR_PKG_POWER_LIMIT)?;
//!
//! // 100 W at 1/8 W power units
//! let value = rapl::build_limit_register(current, PowerField::new(800).unwrap());
//! dev.write(msr::MSR_PKG_POWER_LIMIT, value)?;
//!
//! let limit = RaplPowerLimit::from_msr_value(dev.read(msr::MSR_PKG_POWER_LIMIT)?);
//! println!("locked: {}", limit.lock);
//! ```

pub mod arch;
pub mod msr;
pub mod register;

// Re-export for convenience
pub use arch::intel;
pub use msr::{MsrError, MsrFile, Result};
pub use register::RegisterLayout;
