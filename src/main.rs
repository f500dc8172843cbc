fn main() -> anyhow::Result<()> {
    quorum::run()?;
    Ok(())
}
