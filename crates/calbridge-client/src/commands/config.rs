//! Configuration commands.

use super::Context;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(ctx: &Context) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&ctx.config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# {}", ctx.config_path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(ctx: &Context) -> ClientResult<()> {
    check(ctx)?;
    if ctx.client_id.is_some() || ctx.config.google.client_id.is_some() {
        println!("Google client id is valid.");
    } else {
        println!("No Google client id configured; `calbridge auth login` will need one.");
    }
    println!("Configuration is valid.");
    Ok(())
}

fn check(ctx: &Context) -> ClientResult<()> {
    let google = &ctx.config.google;
    if google.calendar_id.trim().is_empty() {
        return Err(ClientError::Config(
            "google.calendar_id must not be empty".to_string(),
        ));
    }
    if google.timeout_secs == 0 {
        return Err(ClientError::Config(
            "google.timeout_secs must be at least 1".to_string(),
        ));
    }

    if ctx.client_id.is_some() || google.client_id.is_some() {
        ctx.session_config()?.validate()?;
    }
    Ok(())
}

/// Show the configuration file path.
pub fn path(ctx: &Context) -> ClientResult<()> {
    println!("config: {}", ctx.config_path.display());
    Ok(())
}
