use anyhow::{Context, Result};
use clap::Args;
use cytonet_core::config::resolve_config;
use std::io::Write;
use std::path::PathBuf;

use crate::output::OutputMode;

/// Arguments for `cytonet config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file layered over the user config and the defaults.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,
}

/// Print the effective configuration: TOML, or JSON in JSON mode.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or parsed.
pub fn run_config(args: &ConfigArgs, output: OutputMode) -> Result<()> {
    let config = resolve_config(args.config.as_deref())?;
    let rendered = if output == OutputMode::Json {
        serde_json::to_string_pretty(&config).context("failed to serialize config as JSON")?
    } else {
        config.to_toml()?
    };
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}
