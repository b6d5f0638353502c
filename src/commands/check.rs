use anyhow::Result;
use clap::ArgMatches;
use colored::*;

use crate::ui::print_config_report;

/// Validate the configuration without contacting Prometheus.
///
/// Invalid targets are reported but do not fail the command; only an
/// unreadable or globally invalid file does.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = super::load_config(matches)?;
    print_config_report(&config);

    if config.targets.is_empty() {
        println!("\n{}", "No valid targets configured".yellow().bold());
    }
    Ok(())
}
