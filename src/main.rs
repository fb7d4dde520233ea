//! marksite - a static site generator for markdown trees.

use anyhow::{Context, Result, bail};
use clap::Parser;
use marksite::{
    build::{BuildSummary, build_site},
    cli::{Cli, Commands},
    config::SiteConfig,
    init::new_site,
    log,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Init { name } => new_site(&config, name.is_some()),
        Commands::Build { .. } => build_all(&config).map(|_| ()),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() && !cli.is_init() {
        SiteConfig::from_path(&config_path)?
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);

    // Validate config state based on command
    let config_exists = config.config_path.exists();
    match (cli.is_init(), config_exists) {
        (true, true) => {
            bail!("Config file already exists. Remove it manually or init in a different path.")
        }
        (false, false) => bail!("Config file not found."),
        _ => {}
    }

    if !cli.is_init() {
        config.validate()?;
    }

    Ok(config)
}

/// Run the bulk build on a multi-threaded runtime; Ctrl-C cancels it.
fn build_all(config: &SiteConfig) -> Result<BuildSummary> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel()).context("failed to set Ctrl-C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(build_site(config, cancel, |kind, path| {
        log!(kind.name(); "{path}");
    }));

    match result {
        Ok(summary) => {
            log!(
                "build";
                "{} files, max concurrency {}",
                summary.count,
                summary.max_concurrency
            );
            Ok(summary)
        }
        Err(err) => {
            log!("error"; "{err:#}");
            bail!("Build failed")
        }
    }
}
