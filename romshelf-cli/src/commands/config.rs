use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use romshelf_lib::{Settings, settings_path};

use crate::error::CliError;

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(settings_path)
}

/// Print the effective settings as TOML.
pub(crate) fn run_config_show(settings: &Settings) -> Result<(), CliError> {
    let rendered = toml::to_string_pretty(settings)
        .map_err(|e| CliError::invalid(format!("could not render settings: {e}")))?;
    log::info!(
        "{}",
        "Effective settings".if_supports_color(Stdout, |t| t.bold())
    );
    log::info!("  Database: {}", settings.database_path().display());
    log::info!("  Data dir: {}", settings.data_dir().display());
    log::info!("");
    for line in rendered.lines() {
        log::info!("{}", line);
    }
    Ok(())
}

pub(crate) fn run_config_path(path: Option<&Path>) -> Result<(), CliError> {
    let path = resolve(path);
    log::info!(
        "{} {}",
        path.display(),
        if path.exists() {
            "(exists)".if_supports_color(Stdout, |t| t.green()).to_string()
        } else {
            "(not found)".if_supports_color(Stdout, |t| t.dimmed()).to_string()
        },
    );
    Ok(())
}

/// Write `settings` to the settings file. Refuses to clobber an existing
/// file unless `force` is set.
pub(crate) fn run_config_init(
    settings: &Settings,
    path: Option<&Path>,
    force: bool,
) -> Result<(), CliError> {
    let path = resolve(path);
    if path.exists() && !force {
        return Err(CliError::invalid(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        )));
    }
    settings.save(&path)?;
    log::info!(
        "Wrote settings to {}",
        path.display().if_supports_color(Stdout, |t| t.cyan())
    );
    Ok(())
}
