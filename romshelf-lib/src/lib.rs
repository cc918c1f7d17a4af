//! Local building blocks for the ingestion pipeline.
//!
//! Everything here works on plain values or the local filesystem: directory
//! walking, content hashing, multi-track disc sidecar parsing, duplicate
//! selection scoring, and application settings. Nothing touches the database.

pub mod disc;
pub mod error;
pub mod hasher;
pub mod selection;
pub mod settings;
pub mod walker;

pub use disc::{CueFile, GdiTrack, SidecarKind, group_id, parse_cue, parse_gdi, sibling_path};
pub use error::{SettingsError, WalkError};
pub use hasher::{FileHashes, hash_file, hash_reader, sha256_reader};
pub use selection::{Candidate, Selection, SelectionPolicy, parse_revision, select};
pub use settings::{
    DatSettings, ScanSettings, Settings, WorkerSettings, default_data_dir, settings_path,
};
pub use walker::Walker;
