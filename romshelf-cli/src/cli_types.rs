//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use romshelf_core::{ActivityKind, JobKind, JobStatus};
use romshelf_lib::SelectionPolicy;

#[derive(Parser)]
#[command(name = "romshelf")]
#[command(about = "Fingerprint ROM collections and identify them against DAT catalogs", long_about = None)]
pub(crate) struct Cli {
    /// Settings file (defaults to ~/.config/romshelf/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the settings
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run queue workers until Ctrl-C (or until the queue is empty with --drain)
    Worker {
        /// Number of concurrent workers (default from settings)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Exit once no job is due and none is running
        #[arg(long)]
        drain: bool,

        /// Only claim these job kinds (e.g., scan,hash,datImport)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<JobKind>,
    },

    /// Manage platforms
    Platform {
        #[command(subcommand)]
        action: PlatformAction,
    },

    /// Manage libraries (watched ROM directories)
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Manage DAT catalog files
    Dat {
        #[command(subcommand)]
        action: DatAction,
    },

    /// Inspect and act on the activity log
    Activity {
        #[command(subcommand)]
        action: ActivityAction,
    },

    /// Find duplicate copies and pick the preferred one
    Dupes {
        #[command(subcommand)]
        action: DupesAction,
    },

    /// List jobs in the queue
    Jobs {
        /// Only show jobs with this status (queued, running, done, failed)
        #[arg(long)]
        status: Option<JobStatus>,

        /// Maximum number of jobs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show queue and pipeline counts
    Status,

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum PlatformAction {
    /// Add or update a platform
    Add {
        /// Short identifier (e.g., nes, psx)
        id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Accepted file extensions (e.g., .nes,.zip); empty accepts everything
        #[arg(long, value_delimiter = ',')]
        ext: Vec<String>,

        /// URL the DAT catalog can be fetched from
        #[arg(long)]
        dat_url: Option<String>,
    },

    /// List platforms
    List,
}

#[derive(Subcommand)]
pub(crate) enum LibraryAction {
    /// Register a directory as a library
    Add {
        /// Root directory
        root: PathBuf,

        /// Platform the library holds
        #[arg(short, long)]
        platform: String,

        /// Allow files to be reorganized in place
        #[arg(long)]
        auto_organize: bool,
    },

    /// List libraries
    List,

    /// Remove a library and its artifacts
    Remove {
        id: i64,
    },

    /// Queue a scan of a library
    Scan {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum DatAction {
    /// Store a local DAT (or .zip/.7z) file and queue its import
    Add {
        platform: String,
        file: PathBuf,
    },

    /// Queue a download of the platform's DAT from its source URL
    Fetch {
        platform: String,
    },

    /// List stored DAT files of a platform
    List {
        platform: String,
    },

    /// Import a stored DAT file now, with a progress bar
    Import {
        dat_id: i64,
    },

    /// Make a DAT file the active catalog of its platform
    Activate {
        platform: String,
        dat_id: i64,
    },

    /// Clear the active catalog of a platform
    Deactivate {
        platform: String,
    },

    /// Queue a re-match of the platform's unmatched artifacts
    Recheck {
        platform: String,
    },

    /// Queue deletion of superseded DAT files
    Prune {
        /// Inactive files kept per platform (default from settings)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ActivityAction {
    /// List entries, newest first
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Only this kind (scan, hash, match, import, error)
        #[arg(long)]
        kind: Option<ActivityKind>,

        /// Only this pipeline stage (e.g., scan, hash, datImport)
        #[arg(long)]
        module: Option<String>,
    },

    /// Re-enqueue the job attached to an entry and remove the entry
    Retry {
        id: i64,
    },

    /// Acknowledge (remove) an entry
    Ack {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum DupesAction {
    /// List games with more than one copy
    List {
        #[arg(short, long)]
        platform: Option<String>,
    },

    /// Show how each copy of a game scores
    Preview {
        game_id: i64,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Mark the winning copy of a game as preferred
    Apply {
        game_id: i64,

        #[command(flatten)]
        policy: PolicyArgs,
    },
}

/// Overrides for the selection policy from the settings file.
#[derive(Args, Clone)]
pub(crate) struct PolicyArgs {
    /// Region priority, most preferred first (e.g., USA,Europe,Japan)
    #[arg(long, value_delimiter = ',')]
    pub regions: Option<Vec<String>>,

    /// Do not favor verified copies
    #[arg(long)]
    pub no_prefer_verified: bool,

    /// Do not favor higher revisions
    #[arg(long)]
    pub no_prefer_revision: bool,
}

impl PolicyArgs {
    pub(crate) fn apply(&self, base: &SelectionPolicy) -> SelectionPolicy {
        SelectionPolicy {
            region_priority: self
                .regions
                .clone()
                .unwrap_or_else(|| base.region_priority.clone()),
            prefer_verified: base.prefer_verified && !self.no_prefer_verified,
            prefer_highest_revision: base.prefer_highest_revision && !self.no_prefer_revision,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Print the settings file path
    Path,

    /// Write the current settings (defaults if none) to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
