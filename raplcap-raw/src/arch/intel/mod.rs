//! Intel register definitions
//!
//! ## Power Domains
//!
//! - **Package** - the whole socket; power limit, power info, energy status
//! - **PP0** (Power Plane 0) - the cores
//! - **DRAM** - the memory controller, on server parts
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B

pub mod models;
pub mod rapl;
