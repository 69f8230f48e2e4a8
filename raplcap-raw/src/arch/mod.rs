//! Architecture-specific register definitions
//!
//! RAPL MSR addresses and layouts are fixed by the vendor's hardware
//! documentation. Only Intel is described here.

pub mod intel;
