//! romshelf CLI
//!
//! Operator tooling for the ingestion pipeline: manage platforms, libraries
//! and DAT catalogs, inspect the activity log, and run queue workers.

mod cli_types;
mod commands;
mod error;

use std::io::Write;

use clap::Parser;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use romshelf_lib::Settings;

use cli_types::{
    ActivityAction, Cli, Commands, ConfigAction, DatAction, DupesAction, LibraryAction,
    PlatformAction,
};
use error::CliError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Install the logger. Info lines are printed bare so command output reads
/// like plain text; other levels carry a colored label.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stdout)
        .format(move |buf, record| {
            let level = record.level();
            if verbose {
                let ts = buf.timestamp_millis();
                writeln!(
                    buf,
                    "{} {} {}: {}",
                    ts,
                    level_label(level),
                    record.target(),
                    record.args()
                )
            } else if level == log::Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", level_label(level), record.args())
            }
        })
        .init();
}

fn level_label(level: log::Level) -> String {
    let label = level.as_str().to_lowercase();
    match level {
        log::Level::Error => label.if_supports_color(Stdout, |t| t.red()).to_string(),
        log::Level::Warn => label.if_supports_color(Stdout, |t| t.yellow()).to_string(),
        log::Level::Info => label.if_supports_color(Stdout, |t| t.green()).to_string(),
        _ => label.if_supports_color(Stdout, |t| t.dimmed()).to_string(),
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config,
        db,
        verbose: _,
        command,
    } = cli;

    let mut settings = Settings::load(config.as_deref())?;
    if let Some(db) = db {
        settings.database_path = Some(db);
    }

    match command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(&settings),
            ConfigAction::Path => commands::config::run_config_path(config.as_deref()),
            ConfigAction::Init { force } => {
                commands::config::run_config_init(&settings, config.as_deref(), force)
            }
        },
        Commands::Worker {
            concurrency,
            drain,
            kinds,
        } => commands::worker::run_worker(settings, concurrency, drain, kinds),
        command => {
            let conn = commands::open_db(&settings)?;
            dispatch(&conn, &settings, command)
        }
    }
}

/// Commands that only need a database connection.
fn dispatch(
    conn: &rusqlite::Connection,
    settings: &Settings,
    command: Commands,
) -> Result<(), CliError> {
    use commands::{activity, dat, dupes, jobs, library, platform, status};

    match command {
        Commands::Platform { action } => match action {
            PlatformAction::Add {
                id,
                name,
                ext,
                dat_url,
            } => platform::run_platform_add(conn, id, name, ext, dat_url),
            PlatformAction::List => platform::run_platform_list(conn),
        },
        Commands::Library { action } => match action {
            LibraryAction::Add {
                root,
                platform,
                auto_organize,
            } => library::run_library_add(conn, &root, &platform, auto_organize),
            LibraryAction::List => library::run_library_list(conn),
            LibraryAction::Remove { id } => library::run_library_remove(conn, id),
            LibraryAction::Scan { id } => library::run_library_scan(conn, id),
        },
        Commands::Dat { action } => match action {
            DatAction::Add { platform, file } => dat::run_dat_add(conn, settings, &platform, &file),
            DatAction::Fetch { platform } => dat::run_dat_fetch(conn, &platform),
            DatAction::List { platform } => dat::run_dat_list(conn, &platform),
            DatAction::Import { dat_id } => dat::run_dat_import(conn, settings, dat_id),
            DatAction::Activate { platform, dat_id } => {
                dat::run_dat_activate(conn, &platform, dat_id)
            }
            DatAction::Deactivate { platform } => dat::run_dat_deactivate(conn, &platform),
            DatAction::Recheck { platform } => dat::run_dat_recheck(conn, &platform),
            DatAction::Prune { keep } => dat::run_dat_prune(conn, keep),
        },
        Commands::Activity { action } => match action {
            ActivityAction::List {
                offset,
                limit,
                kind,
                module,
            } => activity::run_activity_list(conn, offset, limit, kind, module),
            ActivityAction::Retry { id } => activity::run_activity_retry(conn, id),
            ActivityAction::Ack { id } => activity::run_activity_ack(conn, id),
        },
        Commands::Dupes { action } => match action {
            DupesAction::List { platform } => dupes::run_dupes_list(conn, platform.as_deref()),
            DupesAction::Preview { game_id, policy } => {
                dupes::run_dupes_preview(conn, game_id, &policy.apply(&settings.selection))
            }
            DupesAction::Apply { game_id, policy } => {
                dupes::run_dupes_apply(conn, game_id, &policy.apply(&settings.selection))
            }
        },
        Commands::Jobs { status, limit } => jobs::run_jobs_list(conn, status, limit),
        Commands::Status => status::run_status(conn),
        Commands::Config { .. } | Commands::Worker { .. } => Ok(()),
    }
}
