// One invocation of the tool, start to finish:
// validate -> detect -> report -> (sample energy) -> write limits -> report

use std::io::Write;

use crate::common::MsrAccess;
use crate::config::{PowerRequest, ToolConfig};
use crate::counters::rapl::{read_package_info, LimitOutcome, PowerLimiter, RaplMonitor};
use crate::error::Result;
use crate::report;
use crate::system::RaplSystem;

pub struct Session<'a, M: MsrAccess> {
    config: &'a ToolConfig,
    msr: &'a M,
}

impl<'a, M: MsrAccess> Session<'a, M> {
    pub fn new(config: &'a ToolConfig, msr: &'a M) -> Self {
        Self { config, msr }
    }

    /// Cap every package at `watts`, writing the report to `out`
    ///
    /// The request is range-checked before any file or register is touched.
    pub fn run(&self, watts: u32, out: &mut impl Write) -> Result<Vec<LimitOutcome>> {
        let request = self.config.power_request(watts)?;
        let system = RaplSystem::detect(self.config, self.msr)?;
        self.run_on(&system, request, out)
    }

    pub fn run_on(
        &self,
        system: &RaplSystem,
        request: PowerRequest,
        out: &mut impl Write,
    ) -> Result<Vec<LimitOutcome>> {
        report::write_identity(out, system)?;
        report::write_topology(out, &system.topology)?;
        report::write_units(out, system)?;

        for index in 0..system.total_packages() {
            let info = read_package_info(system, self.msr, index)?;
            report::write_package_info(out, &info)?;
        }

        if let Some(window) = self.config.sample {
            let mut monitor = RaplMonitor::new(system, self.msr);
            monitor.start()?;
            tracing::info!("Sampling energy for {:?}", window);
            std::thread::sleep(window);
            let energy = monitor.stop()?;
            report::write_energy(out, &energy)?;
        }

        tracing::info!(
            "Setting package power limit to {}W on {} packages",
            request.watts,
            system.total_packages()
        );
        let outcomes = PowerLimiter::new(system, self.msr).apply_all(request)?;
        for outcome in &outcomes {
            report::write_limit(out, outcome)?;
        }

        Ok(outcomes)
    }
}
