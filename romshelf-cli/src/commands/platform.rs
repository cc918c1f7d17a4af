use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_core::{Platform, normalize_extension};
use romshelf_db::{get_platform, list_platforms, upsert_platform};

use crate::error::CliError;

/// Add a platform, or update its name, extensions and source URL.
pub(crate) fn run_platform_add(
    conn: &Connection,
    id: String,
    name: String,
    ext: Vec<String>,
    dat_url: Option<String>,
) -> Result<(), CliError> {
    let id = id.trim().to_lowercase();
    if id.is_empty() {
        return Err(CliError::invalid("platform id must not be empty"));
    }

    let mut extensions: Vec<String> = ext
        .iter()
        .map(|e| normalize_extension(e))
        .filter(|e| !e.is_empty())
        .collect();
    extensions.dedup();

    let existed = get_platform(conn, &id)?.is_some();
    upsert_platform(
        conn,
        &Platform {
            id: id.clone(),
            name,
            extensions,
            dat_source_url: dat_url,
            active_dat_file_id: None,
        },
    )?;

    log::info!(
        "{} platform {}",
        if existed { "Updated" } else { "Added" },
        id.if_supports_color(Stdout, |t| t.bold()),
    );
    Ok(())
}

pub(crate) fn run_platform_list(conn: &Connection) -> Result<(), CliError> {
    let platforms = list_platforms(conn)?;
    if platforms.is_empty() {
        log::info!("No platforms. Add one with 'romshelf platform add'.");
        return Ok(());
    }

    for p in &platforms {
        log::info!(
            "{} [{}]",
            p.id.if_supports_color(Stdout, |t| t.bold()),
            p.name.if_supports_color(Stdout, |t| t.cyan()),
        );
        let extensions = if p.extensions.is_empty() {
            "(any)".to_string()
        } else {
            p.extensions.join(", ")
        };
        log::info!("    Extensions: {}", extensions);
        match p.active_dat_file_id {
            Some(id) => log::info!(
                "    Active DAT: {}",
                id.if_supports_color(Stdout, |t| t.green())
            ),
            None => log::info!(
                "    Active DAT: {}",
                "none".if_supports_color(Stdout, |t| t.dimmed())
            ),
        }
        if let Some(url) = &p.dat_source_url {
            log::info!("    DAT source: {}", url);
        }
    }
    Ok(())
}
