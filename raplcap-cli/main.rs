use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use nix::unistd::Uid;
use tracing_subscriber::EnvFilter;

use raplcap::common::DevMsr;
use raplcap::error::EX_USAGE;
use raplcap::{Session, ToolConfig};

#[derive(Parser, Debug)]
#[command(name = "raplcap")]
#[command(about = "Set the Intel RAPL package power limit on every CPU package")]
struct Args {
    #[arg(value_name = "WATTS", help = "Package power limit in watts (10 - 215)")]
    watts: u32,

    #[arg(
        long = "sample-ms",
        value_name = "MS",
        help = "Measure package/PP0/DRAM energy over this many milliseconds before applying the limit"
    )]
    sample_ms: Option<u64>,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows all MSR read/write operations)"
    )]
    verbose: bool,
}

fn check_permissions() {
    if !Uid::effective().is_root() {
        tracing::warn!("Not running as root, opening /dev/cpu/*/msr will probably fail");
    }
}

/// `--help`/`--version` succeed; every other parse failure is a usage error,
/// kept apart from the MSR device codes
fn parse_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EX_USAGE
    } else {
        0
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_exit_code(&e));
        }
    };

    // RUST_LOG wins over the verbose flag
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    check_permissions();

    let config = ToolConfig {
        sample: args.sample_ms.map(Duration::from_millis),
        ..ToolConfig::default()
    };
    let msr = DevMsr::new(&config.msr_dev_dir);

    let mut stdout = std::io::stdout().lock();
    match Session::new(&config, &msr).run(args.watts, &mut stdout) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(&e)
        }
    }
}
