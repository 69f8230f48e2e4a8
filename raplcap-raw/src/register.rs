//! Generic register abstractions for type-safe MSR programming

/// Trait for register layouts that can be converted to/from raw MSR values
///
/// This trait provides type-safe conversion between structured register
/// layouts and the raw 64-bit values that are written to/read from MSRs.
///
/// # Example
///
/// ```ignore
/// use raplcap_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct EnergyStatus {
///     counter: u32,
/// }
///
/// impl RegisterLayout for EnergyStatus {
///     fn to_msr_value(&self) -> u64 {
///         self.counter as u64
///     }
///
///     fn from_msr_value(value: u64) -> Self {
///         Self {
///             counter: (value & 0xFFFF_FFFF) as u32,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw MSR value
    ///
    /// Reserved bits come out as zero. Use a read-modify-write helper when
    /// reserved bits must survive a write.
    fn to_msr_value(&self) -> u64;

    /// Parse a raw MSR value into this register layout
    fn from_msr_value(value: u64) -> Self;

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// Extract `width` bits of `value` starting at bit `shift`
#[inline]
pub const fn field(value: u64, shift: u32, width: u32) -> u64 {
    (value >> shift) & ((1u64 << width) - 1)
}

/// Test a single bit
#[inline]
pub const fn bit(value: u64, index: u32) -> bool {
    value & (1u64 << index) != 0
}
