//! tuxniffer binary entry point: parse flags, handle the early-exit
//! informational flags, resolve the run configuration, then hand off to the
//! orchestrator (spec §6).

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tuxniffer::config::{Cli, RunConfig};
use tuxniffer::{orchestrator, radio_mode, signals};

fn init_logging(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_radio_modes() {
    for (row, entries) in radio_mode::RADIO_MODE_TABLE.iter().enumerate() {
        for (mode, entry) in entries.iter().enumerate() {
            if entry.phy_id != radio_mode::UNSUPPORTED {
                println!("firmware_row={row} radio_mode={mode} phy_id={:#04x} base_freq={}MHz", entry.phy_id, entry.base_freq_mhz);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    if cli.list_modes {
        print_radio_modes();
        return;
    }
    if cli.yaml_example {
        print!("{}", tuxniffer::config::yaml_example());
        return;
    }

    let config = match RunConfig::resolve(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    signals::install_handler();

    if let Err(e) = orchestrator::run(config) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
