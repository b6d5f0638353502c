use anyhow::Result;

use prom_sensors::commands;

fn main() -> Result<()> {
    prom_sensors::init_logging();

    let matches = commands::cli().get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }

    match matches.subcommand() {
        Some(("version", _)) => commands::version()?,
        Some(("check", sub_matches)) => commands::check(sub_matches)?,
        Some(("once", sub_matches)) => commands::once(sub_matches)?,
        Some(("run", sub_matches)) => commands::run(sub_matches)?,
        _ => {
            println!("Welcome to prom-sensors!");
            println!("Use 'prom-sensors --help' for more information.");
        }
    }

    Ok(())
}
