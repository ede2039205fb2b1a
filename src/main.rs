use camview::Config;

fn main() -> anyhow::Result<()> {
    camview::init_logger!();

    let config = Config::from_env()?;
    let stats = camview::run(config)?;
    log::info!(
        "window closed after {} iterations ({} frames shown, {} skipped)",
        stats.iterations,
        stats.rendered,
        stats.skipped,
    );
    Ok(())
}
