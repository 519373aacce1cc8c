use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("selfmon version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
