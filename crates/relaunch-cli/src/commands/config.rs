use relaunch_core::RelaunchConfig;

/// Print a default relaunch.toml to stdout.
pub fn init() -> anyhow::Result<()> {
    print!("{}", RelaunchConfig::default().to_toml_string()?);
    Ok(())
}
