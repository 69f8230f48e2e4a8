//! Family 6 model numbers of Intel parts with RAPL
//!
//! Display model as reported in the `model` field of `/proc/cpuinfo`
//! (extended model << 4 | model).

pub const SANDYBRIDGE: u32 = 42;
pub const SANDYBRIDGE_EP: u32 = 45;
pub const IVYBRIDGE: u32 = 58;
pub const IVYBRIDGE_EP: u32 = 62;
pub const HASWELL: u32 = 60;
pub const HASWELL_ULT: u32 = 69;
pub const HASWELL_GT3E: u32 = 70;
pub const HASWELL_EP: u32 = 63;
pub const BROADWELL: u32 = 61;
pub const BROADWELL_GT3E: u32 = 71;
pub const BROADWELL_EP: u32 = 79;
pub const BROADWELL_DE: u32 = 86;
pub const SKYLAKE: u32 = 78;
pub const SKYLAKE_HS: u32 = 94;
pub const SKYLAKE_X: u32 = 85;
pub const KNIGHTS_LANDING: u32 = 87;
pub const KNIGHTS_MILL: u32 = 133;
pub const KABYLAKE_MOBILE: u32 = 142;
pub const KABYLAKE: u32 = 158;
pub const ATOM_SILVERMONT: u32 = 55;
pub const ATOM_AIRMONT: u32 = 76;
pub const ATOM_MERRIFIELD: u32 = 74;
pub const ATOM_MOOREFIELD: u32 = 90;
pub const ATOM_GOLDMONT: u32 = 92;
pub const ATOM_GEMINI_LAKE: u32 = 122;
pub const ATOM_DENVERTON: u32 = 95;

/// The only CPU family with RAPL MSRs at these addresses
pub const FAMILY: u32 = 6;
