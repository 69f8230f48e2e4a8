//! MSR (Model-Specific Register) read/write primitives
//!
//! This module provides low-level MSR access through `/dev/cpu/*/msr`.
//! Every access is a positional 8-byte transfer at a byte offset equal to the
//! register address. Anything shorter is an error, never a partial value.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

/// Directory holding the per-CPU MSR device nodes.
pub const MSR_DEV_DIR: &str = "/dev/cpu";

pub type Result<T> = std::result::Result<T, MsrError>;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("No CPU {cpu}")]
    NoSuchCpu { cpu: u32 },

    #[error("CPU {cpu} doesn't support MSRs")]
    Unsupported { cpu: u32 },

    #[error("Failed to open {path} for CPU {cpu}: {source}")]
    OpenFailed {
        cpu: u32,
        path: String,
        source: io::Error,
    },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u64,
        source: io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u64,
        source: io::Error,
    },

    #[error("Short read of MSR 0x{msr:X} on CPU {cpu}: got {len} of 8 bytes")]
    ShortRead { cpu: u32, msr: u64, len: usize },

    #[error("Short write of MSR 0x{msr:X} on CPU {cpu}: wrote {len} of 8 bytes")]
    ShortWrite { cpu: u32, msr: u64, len: usize },
}

impl MsrError {
    /// Map a failed `open(2)` of the MSR device onto the error kinds the
    /// msr driver reports: `ENXIO` for a missing CPU, `EIO` when the CPU has
    /// no MSR support.
    fn from_open(cpu: u32, path: &Path, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::ENXIO) => MsrError::NoSuchCpu { cpu },
            Some(libc::EIO) => MsrError::Unsupported { cpu },
            _ => MsrError::OpenFailed {
                cpu,
                path: path.display().to_string(),
                source,
            },
        }
    }

    /// CPU the failed operation was addressed to
    pub fn cpu(&self) -> u32 {
        match self {
            MsrError::NoSuchCpu { cpu }
            | MsrError::Unsupported { cpu }
            | MsrError::OpenFailed { cpu, .. }
            | MsrError::ReadFailed { cpu, .. }
            | MsrError::WriteFailed { cpu, .. }
            | MsrError::ShortRead { cpu, .. }
            | MsrError::ShortWrite { cpu, .. } => *cpu,
        }
    }
}

/// An open MSR device for one logical CPU
///
/// The device is closed when the value is dropped.
#[derive(Debug)]
pub struct MsrFile {
    file: File,
    cpu: u32,
}

impl MsrFile {
    /// Open `/dev/cpu/<cpu>/msr` for reading and writing
    ///
    /// # Errors
    ///
    /// - [`MsrError::NoSuchCpu`] if the CPU does not exist
    /// - [`MsrError::Unsupported`] if the CPU has no MSRs
    /// - [`MsrError::OpenFailed`] otherwise (missing `msr` module, no
    ///   root/CAP_SYS_RAWIO, ...)
    pub fn open(cpu: u32) -> Result<Self> {
        Self::open_in(Path::new(MSR_DEV_DIR), cpu)
    }

    /// Open `<dir>/<cpu>/msr`
    pub fn open_in(dir: &Path, cpu: u32) -> Result<Self> {
        let path = dir.join(cpu.to_string()).join("msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC) // Ensure synchronous writes
            .open(&path)
            .map_err(|e| MsrError::from_open(cpu, &path, e))?;

        Ok(Self { file, cpu })
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    /// Read a 64-bit value from an MSR
    ///
    /// # Example
    ///
    /// ```ignore
    /// use raplcap_raw::MsrFile;
    ///
    /// let msr = MsrFile::open(0)?;
    /// let value = msr.read(0x606)?;
    /// println!("MSR 0x606 = 0x{:016X}", value);
    /// ```
    pub fn read(&self, msr: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        let len = self
            .file
            .read_at(&mut buffer, msr)
            .map_err(|e| MsrError::ReadFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })?;

        if len != buffer.len() {
            return Err(MsrError::ShortRead {
                cpu: self.cpu,
                msr,
                len,
            });
        }

        Ok(u64::from_ne_bytes(buffer))
    }

    /// Write a 64-bit value to an MSR
    ///
    /// # Safety
    ///
    /// Not `unsafe` in the Rust sense, but writing incorrect values to MSRs can
    /// cause system instability. Build values with the layouts in
    /// [`crate::arch`] instead of by hand.
    pub fn write(&self, msr: u64, value: u64) -> Result<()> {
        let buffer = value.to_ne_bytes();
        let len = self
            .file
            .write_at(&buffer, msr)
            .map_err(|e| MsrError::WriteFailed {
                cpu: self.cpu,
                msr,
                source: e,
            })?;

        if len != buffer.len() {
            return Err(MsrError::ShortWrite {
                cpu: self.cpu,
                msr,
                len,
            });
        }

        Ok(())
    }
}
