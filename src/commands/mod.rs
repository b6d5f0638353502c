// Command handlers module
pub mod check;
pub mod once;
pub mod run;
pub mod version;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use crate::core::config::ProviderConfig;

// Re-exports for cleaner imports
pub use check::execute as check;
pub use once::execute as once;
pub use run::execute as run;
pub use version::execute as version;

/// Load the configuration named by `--config`, or the default file.
pub fn load_config(matches: &ArgMatches) -> Result<ProviderConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ProviderConfig::load(path),
        None => {
            let path = ProviderConfig::default_path()?;
            ProviderConfig::load(&path)
                .with_context(|| format!("No usable config at default location {:?}", path))
        }
    }
}

/// Multi-threaded runtime for the polling commands
pub(crate) fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("prom-sensors-worker")
        .build()
        .context("Failed to start async runtime")
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .help("Path to the JSON configuration file")
        .value_parser(clap::value_parser!(PathBuf))
}

/// Command-line definition shared by the binary and its tests
pub fn cli() -> Command {
    Command::new("prom-sensors")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Expose Prometheus series as sensors")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
        )
        .subcommand(
            Command::new("check")
                .about("Validate the configuration and list every target")
                .arg(config_arg())
        )
        .subcommand(
            Command::new("once")
                .about("Poll every target once and print the resulting sensors")
                .arg(config_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print snapshots as JSON")
                        .action(ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("run")
                .about("Poll every target on its interval and print sensor changes")
                .arg(config_arg())
                .arg(
                    Arg::new("all-events")
                        .long("all-events")
                        .help("Also print updates that did not change anything")
                        .action(ArgAction::SetTrue)
                )
        )
}
