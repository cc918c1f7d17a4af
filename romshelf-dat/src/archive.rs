//! Catalog containers: plain XML, or a single-file ZIP/7Z wrapping it.
//!
//! Listing and extraction sit behind [`ArchiveExtractor`] so the import
//! stage can be exercised without external tools. [`SystemExtractor`]
//! reads ZIP in-process and shells out to `7z` under a bounded timeout.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::document::{CatalogDocument, parse_catalog};
use crate::error::DatError;

/// Extensions recognized as catalog documents inside an archive.
const CATALOG_EXTENSIONS: &[&str] = &[".dat", ".xml"];

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const SEVEN_ZIP_MAGIC: &[u8] = b"7z\xBC\xAF\x27\x1C";

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
}

impl ArchiveKind {
    /// Detect a container from the file extension, falling back to magic bytes.
    pub fn detect(path: &Path) -> Result<Option<Self>, DatError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "zip" => return Ok(Some(ArchiveKind::Zip)),
            "7z" => return Ok(Some(ArchiveKind::SevenZip)),
            _ => {}
        }

        let mut magic = [0u8; 6];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < magic.len() {
            match file.read(&mut magic[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        let magic = &magic[..filled];
        if magic.starts_with(ZIP_MAGIC) {
            Ok(Some(ArchiveKind::Zip))
        } else if magic.starts_with(SEVEN_ZIP_MAGIC) {
            Ok(Some(ArchiveKind::SevenZip))
        } else {
            Ok(None)
        }
    }
}

/// List and extract archive entries.
pub trait ArchiveExtractor: Send + Sync {
    /// File entries of the archive, in archive order. Directories are omitted.
    fn list(&self, kind: ArchiveKind, path: &Path) -> Result<Vec<String>, DatError>;

    /// Full contents of one named entry.
    fn extract(&self, kind: ArchiveKind, path: &Path, entry: &str) -> Result<Vec<u8>, DatError>;
}

/// Whether an archive entry name looks like a catalog document.
pub fn is_catalog_entry(name: &str) -> bool {
    let lower = name.to_lowercase();
    CATALOG_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Pick the one entry to import.
///
/// The first entry must be a catalog document. A lone non-catalog entry
/// means there is nothing to import; with several entries the archive is
/// ambiguous and rejected as well.
pub fn choose_entry(entries: &[String]) -> Result<&str, DatError> {
    let first = entries
        .first()
        .ok_or_else(|| DatError::invalid_dat("archive contains no files"))?;
    if is_catalog_entry(first) {
        return Ok(first);
    }
    if entries.len() > 1 {
        Err(DatError::invalid_dat(format!(
            "archive holds {} entries and the first, '{}', is not a .dat/.xml document",
            entries.len(),
            first
        )))
    } else {
        Err(DatError::invalid_dat(format!(
            "archive entry '{first}' is not a .dat/.xml document"
        )))
    }
}

/// Read and parse the catalog stored at `path`, unwrapping an archive if
/// it is one.
pub fn read_catalog(
    path: &Path,
    extractor: &dyn ArchiveExtractor,
) -> Result<CatalogDocument, DatError> {
    match ArchiveKind::detect(path)? {
        Some(kind) => {
            let entries = extractor.list(kind, path)?;
            let entry = choose_entry(&entries)?;
            log::debug!("Reading catalog entry '{}' from {}", entry, path.display());
            let bytes = extractor.extract(kind, path, entry)?;
            parse_catalog(bytes.as_slice())
        }
        None => {
            let file = File::open(path)?;
            parse_catalog(BufReader::new(file))
        }
    }
}

// ---------------------------------------------------------------------------
// System extractor
// ---------------------------------------------------------------------------

/// Extractor backed by the `zip` crate and the `7z` command-line tool.
#[derive(Debug, Clone)]
pub struct SystemExtractor {
    /// Upper bound on one `7z` invocation.
    pub timeout: Duration,
    /// Program used for 7Z archives.
    pub seven_zip: String,
}

impl SystemExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            seven_zip: "7z".to_string(),
        }
    }

    fn run_7z(&self, args: &[&str], path: &Path) -> Result<Vec<u8>, DatError> {
        let mut cmd = Command::new(&self.seven_zip);
        cmd.args(args).arg(path);
        run_with_timeout(cmd, &self.seven_zip, self.timeout)
    }
}

impl ArchiveExtractor for SystemExtractor {
    fn list(&self, kind: ArchiveKind, path: &Path) -> Result<Vec<String>, DatError> {
        match kind {
            ArchiveKind::Zip => {
                let mut archive = zip::ZipArchive::new(File::open(path)?)?;
                let mut names = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    let entry = archive.by_index_raw(i)?;
                    if !entry.is_dir() {
                        names.push(entry.name().to_string());
                    }
                }
                Ok(names)
            }
            ArchiveKind::SevenZip => {
                let stdout = self.run_7z(&["l", "-ba", "-slt"], path)?;
                Ok(parse_7z_listing(&String::from_utf8_lossy(&stdout)))
            }
        }
    }

    fn extract(&self, kind: ArchiveKind, path: &Path, entry: &str) -> Result<Vec<u8>, DatError> {
        match kind {
            ArchiveKind::Zip => {
                let mut archive = zip::ZipArchive::new(File::open(path)?)?;
                let mut file = archive.by_name(entry)?;
                let mut bytes = Vec::with_capacity(prealloc_hint(file.size()));
                file.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            ArchiveKind::SevenZip => {
                let mut cmd = Command::new(&self.seven_zip);
                cmd.args(["x", "-so"]).arg(path).arg(entry);
                run_with_timeout(cmd, &self.seven_zip, self.timeout)
            }
        }
    }
}

/// Extract file paths from `7z l -ba -slt` output, skipping folders.
pub fn parse_7z_listing(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut path: Option<String> = None;
    let mut is_dir = false;

    let mut flush = |path: &mut Option<String>, is_dir: &mut bool| {
        if let Some(p) = path.take()
            && !*is_dir
        {
            names.push(p);
        }
        *is_dir = false;
    };

    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Path = ") {
            flush(&mut path, &mut is_dir);
            path = Some(value.to_string());
        } else if line == "Folder = +" || line.starts_with("Attributes = D") {
            is_dir = true;
        }
    }
    flush(&mut path, &mut is_dir);

    names
}

/// Run a command to completion, capturing stdout, and kill it if it is
/// still running after `timeout`.
/// Capacity to reserve for an entry whose header claims `declared` bytes.
/// The header is untrusted, so the reservation is capped and the buffer
/// grows past it only as real data arrives.
fn prealloc_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC))
}

fn run_with_timeout(mut cmd: Command, program: &str, timeout: Duration) -> Result<Vec<u8>, DatError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DatError::subprocess(program, format!("failed to run command: {e}")))?;

    // Drain both pipes on their own threads so a full pipe cannot stall the child.
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            out.read_to_end(&mut buf).map(|_| buf)
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("{} killed after {}s", program, timeout.as_secs());
            return Err(DatError::Timeout(program.to_string(), timeout.as_secs()));
        }
        std::thread::sleep(Duration::from_millis(25));
    };

    let stdout = match stdout_reader {
        Some(handle) => handle
            .join()
            .map_err(|_| DatError::subprocess(program, "stdout reader panicked"))??,
        None => Vec::new(),
    };
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(DatError::subprocess(
            program,
            format!(
                "exit code {:?}: {}",
                status.code(),
                stderr.lines().take(5).collect::<Vec<_>>().join("\n")
            ),
        ));
    }

    Ok(stdout)
}

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;
