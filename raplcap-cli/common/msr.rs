use std::path::PathBuf;

use raplcap_raw::MsrFile;

use crate::error::Result;

/// Access to the per-CPU MSR address space
///
/// A handle is opened per logical CPU and closed when dropped. Everything
/// above this trait (unit decoding, energy sampling, limit encoding) only sees
/// `open/read/write`, so it runs unchanged against a fake register file.
pub trait MsrAccess {
    type Handle;

    fn open(&self, cpu: u32) -> Result<Self::Handle>;

    fn read(&self, handle: &Self::Handle, addr: u64) -> Result<u64>;

    fn write(&self, handle: &Self::Handle, addr: u64, value: u64) -> Result<()>;
}

/// The Linux `msr` driver: `/dev/cpu/<n>/msr`
#[derive(Debug, Clone)]
pub struct DevMsr {
    dir: PathBuf,
}

impl DevMsr {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MsrAccess for DevMsr {
    type Handle = MsrFile;

    fn open(&self, cpu: u32) -> Result<MsrFile> {
        let file = MsrFile::open_in(&self.dir, cpu)?;
        tracing::trace!("Opened MSR device for CPU {}", cpu);
        Ok(file)
    }

    fn read(&self, handle: &MsrFile, addr: u64) -> Result<u64> {
        let value = handle.read(addr)?;
        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            handle.cpu(),
            addr,
            value
        );
        Ok(value)
    }

    fn write(&self, handle: &MsrFile, addr: u64, value: u64) -> Result<()> {
        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} <- 0x{:016x}",
            handle.cpu(),
            addr,
            value
        );
        handle.write(addr, value).map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::io;

    use nix::errno::Errno;
    use raplcap_raw::MsrError;

    use super::MsrAccess;
    use crate::error::Result;

    /// In-memory register file keyed by (cpu, address)
    ///
    /// Reading a register that was never set fails with `EIO`, like the
    /// driver does for an unimplemented MSR.
    #[derive(Debug, Default)]
    pub struct FakeMsr {
        cpus: HashSet<u32>,
        regs: RefCell<HashMap<(u32, u64), u64>>,
        frozen: HashSet<(u32, u64)>,
        pub writes: RefCell<Vec<(u32, u64, u64)>>,
        pub opens: RefCell<usize>,
    }

    impl FakeMsr {
        pub fn with_cpus(cpus: impl IntoIterator<Item = u32>) -> Self {
            Self {
                cpus: cpus.into_iter().collect(),
                ..Default::default()
            }
        }

        pub fn set(&self, cpu: u32, addr: u64, value: u64) {
            self.regs.borrow_mut().insert((cpu, addr), value);
        }

        pub fn get(&self, cpu: u32, addr: u64) -> Option<u64> {
            self.regs.borrow().get(&(cpu, addr)).copied()
        }

        /// Accept writes to this register without changing it
        pub fn freeze(&mut self, cpu: u32, addr: u64) {
            self.frozen.insert((cpu, addr));
        }
    }

    impl MsrAccess for FakeMsr {
        type Handle = u32;

        fn open(&self, cpu: u32) -> Result<u32> {
            if !self.cpus.contains(&cpu) {
                return Err(MsrError::NoSuchCpu { cpu }.into());
            }
            *self.opens.borrow_mut() += 1;
            Ok(cpu)
        }

        fn read(&self, cpu: &u32, addr: u64) -> Result<u64> {
            self.get(*cpu, addr).ok_or_else(|| {
                MsrError::ReadFailed {
                    cpu: *cpu,
                    msr: addr,
                    source: io::Error::from_raw_os_error(Errno::EIO as i32),
                }
                .into()
            })
        }

        fn write(&self, cpu: &u32, addr: u64, value: u64) -> Result<()> {
            self.writes.borrow_mut().push((*cpu, addr, value));
            if !self.frozen.contains(&(*cpu, addr)) {
                self.set(*cpu, addr, value);
            }
            Ok(())
        }
    }
}
