//! Entity types for the ingestion pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;
use crate::job::Job;

// ── Platform ────────────────────────────────────────────────────────────────

/// A target system and the file extensions that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
    /// Lower-cased, without the leading dot. Empty accepts every file.
    pub extensions: Vec<String>,
    /// Where `dat fetch` downloads the reference catalog from.
    pub dat_source_url: Option<String>,
    /// Always references a catalog file belonging to this platform.
    pub active_dat_file_id: Option<i64>,
}

impl Platform {
    /// Whether a file with this extension should be picked up by a scan.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = normalize_extension(ext);
        self.extensions.iter().any(|e| *e == ext)
    }
}

/// Normalize an extension to lower case with no leading dot (`".NES"` -> `"nes"`).
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

// ── Library ─────────────────────────────────────────────────────────────────

/// A watched root directory bound to one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: i64,
    pub root: PathBuf,
    pub platform_id: String,
    pub auto_organize: bool,
    pub last_scanned_at: Option<String>,
}

// ── Catalog ─────────────────────────────────────────────────────────────────

/// An uploaded or fetched reference catalog document ("DAT file").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: i64,
    pub platform_id: String,
    /// Name of the file as it was uploaded or downloaded.
    pub filename: String,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 of the stored bytes, used to de-duplicate re-uploads.
    pub sha256: String,
    /// Version declared in the document header, stamped after import.
    pub version: Option<String>,
    pub source: String,
    pub uploaded_at: String,
    pub activated_at: Option<String>,
}

/// One normalized fingerprint parsed out of a catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Canonical title (rom name, falling back to the game name).
    pub name: String,
    pub crc32: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub region: Option<String>,
    pub languages: Vec<String>,
    pub serial: Option<String>,
    pub revision: Option<String>,
}

/// A stored reference fingerprint, unique per (catalog file, canonical name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub dat_file_id: i64,
    pub platform_id: String,
    pub canonical_name: String,
    pub crc32: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub region: Option<String>,
    pub languages: Vec<String>,
    pub serial: Option<String>,
    pub revision: Option<String>,
    pub verified: bool,
    pub source: String,
}

// ── Artifact ────────────────────────────────────────────────────────────────

/// Where an artifact sits in the scan -> hash -> match pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    /// Seen by a scan, not hashed yet.
    Discovered,
    /// Hashed, match not attempted yet.
    Hashed,
    /// Linked to a fallback identity keyed by its own SHA1.
    Fallback,
    /// Linked to a release resolved from the active catalog.
    Matched,
}

impl ArtifactState {
    pub const ALL: &'static [ArtifactState] = &[
        ArtifactState::Discovered,
        ArtifactState::Hashed,
        ArtifactState::Fallback,
        ArtifactState::Matched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactState::Discovered => "discovered",
            ArtifactState::Hashed => "hashed",
            ArtifactState::Fallback => "fallback",
            ArtifactState::Matched => "matched",
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("artifact state", s))
    }
}

/// One scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub library_id: i64,
    /// Relative to the library root, always `/`-separated.
    pub path: String,
    pub size_bytes: u64,
    pub crc32: Option<String>,
    pub sha1: Option<String>,
    /// Lower-cased container extension (`bin`, `cue`, `zip`, ...).
    pub format: Option<String>,
    /// Shared by every file of one multi-part disc image.
    pub group_id: Option<String>,
    pub release_id: Option<i64>,
    pub preferred: bool,
    pub state: ArtifactState,
    /// Set when the release came from a trusted catalog entry.
    pub verified: bool,
    pub revision: Option<String>,
}

impl Artifact {
    pub fn has_hash(&self) -> bool {
        self.crc32.is_some() || self.sha1.is_some()
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }
}

// ── Game / Release ──────────────────────────────────────────────────────────

/// A canonical title, identified by (provider, provider id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub title: String,
    /// Catalog source tag, or `file` for fallback identities.
    pub provider: String,
    /// Catalog canonical name, or the content SHA1 for fallback identities.
    pub provider_id: String,
}

/// One regional/language edition of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub game_id: i64,
    pub region: Option<String>,
    pub language: Option<String>,
}

// ── Activity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Scan,
    Hash,
    Match,
    Import,
    Error,
}

impl ActivityKind {
    pub const ALL: &'static [ActivityKind] = &[
        ActivityKind::Scan,
        ActivityKind::Hash,
        ActivityKind::Match,
        ActivityKind::Import,
        ActivityKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Scan => "scan",
            ActivityKind::Hash => "hash",
            ActivityKind::Match => "match",
            ActivityKind::Import => "import",
            ActivityKind::Error => "error",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("activity kind", s))
    }
}

/// An append-only audit record of a pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub timestamp: String,
    pub kind: ActivityKind,
    /// Stage that produced the entry (`scan`, `hash`, `datImport`, ...).
    pub module: String,
    pub message: String,
    pub details: serde_json::Value,
    /// Job that re-runs the failed item, for error entries.
    pub retry: Option<Job>,
}

/// An activity entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub module: String,
    pub message: String,
    pub details: serde_json::Value,
    pub retry: Option<Job>,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            module: module.into(),
            message: message.into(),
            details: serde_json::Value::Null,
            retry: None,
        }
    }

    /// An error entry carrying the job that retries the failed item.
    pub fn error(module: impl Into<String>, message: impl Into<String>, retry: Job) -> Self {
        Self::new(ActivityKind::Error, module, message).retry(retry)
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn retry(mut self, job: Job) -> Self {
        self.retry = Some(job);
        self
    }
}
