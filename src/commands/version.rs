use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("prom-sensors version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
