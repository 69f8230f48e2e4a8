use std::io;
use std::process::ExitCode;

use raplcap_raw::MsrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaplError {
    #[error(transparent)]
    Msr(#[from] MsrError),

    #[error("Unsupported CPU: {0}")]
    UnsupportedCpu(String),

    #[error("Topology overflow: {0}")]
    TopologyOverflow(String),

    #[error("No CPU packages detected under {0}")]
    NoPackages(String),

    #[error("Package {index} not detected ({total} packages present)")]
    UnknownPackage { index: usize, total: usize },

    #[error("Invalid power request: {0}")]
    InvalidPowerRequest(String),

    #[error("Energy measurement was not started")]
    MeasurementNotStarted,

    #[error("Failed to read {path}: {source}")]
    CpuInfo { path: String, source: io::Error },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// sysexits.h `EX_USAGE`: bad command line or out-of-range power request
pub const EX_USAGE: u8 = 64;

impl RaplError {
    /// Process exit status for this error
    ///
    /// The MSR codes match what `rdmsr` reports: 2 for a missing CPU, 3 for a
    /// CPU without MSRs and 127 for any other device failure. The rest follow
    /// sysexits.h.
    pub fn exit_code(&self) -> u8 {
        match self {
            RaplError::Msr(MsrError::NoSuchCpu { .. }) => 2,
            RaplError::Msr(MsrError::Unsupported { .. }) => 3,
            RaplError::Msr(_) => 127,
            RaplError::InvalidPowerRequest(_) => EX_USAGE,
            RaplError::UnsupportedCpu(_) => 69,
            RaplError::TopologyOverflow(_)
            | RaplError::NoPackages(_)
            | RaplError::UnknownPackage { .. }
            | RaplError::MeasurementNotStarted => 70,
            RaplError::CpuInfo { .. } | RaplError::ParseError(_) | RaplError::IoError(_) => 74,
        }
    }
}

impl From<&RaplError> for ExitCode {
    fn from(err: &RaplError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

pub type Result<T> = std::result::Result<T, RaplError>;
