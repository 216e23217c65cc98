fn main() -> anyhow::Result<()> {
    signoff::run()?;
    Ok(())
}
