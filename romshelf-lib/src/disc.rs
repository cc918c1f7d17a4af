//! Multi-track disc sidecar parsers (CUE sheets and GDI track lists).
//!
//! Both parsers are pure text -> list functions. They never touch the
//! filesystem; callers resolve the returned filenames against the directory
//! that contains the sidecar.

/// One track declaration in a CUE sheet, paired with the file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFile {
    pub filename: String,
    pub track: u32,
}

/// One line of a GDI track list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdiTrack {
    pub track: u32,
    pub lba: u64,
    pub filename: String,
}

/// Sidecar formats that describe a multi-file disc image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    Cue,
    Gdi,
}

impl SidecarKind {
    /// Detect a sidecar from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match romshelf_core::normalize_extension(ext).as_str() {
            "cue" => Some(SidecarKind::Cue),
            "gdi" => Some(SidecarKind::Gdi),
            _ => None,
        }
    }

    /// Distinct data files referenced by a sidecar, in declaration order.
    pub fn referenced_files(&self, content: &str) -> Vec<String> {
        let names: Vec<String> = match self {
            SidecarKind::Cue => parse_cue(content).into_iter().map(|f| f.filename).collect(),
            SidecarKind::Gdi => parse_gdi(content).into_iter().map(|t| t.filename).collect(),
        };
        let mut seen = Vec::with_capacity(names.len());
        for name in names {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

/// Group identifier for the files of a sidecar: its file name without extension.
pub fn group_id(sidecar_path: &str) -> String {
    let name = sidecar_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(sidecar_path);
    match name.rfind('.') {
        Some(0) | None => name.to_string(),
        Some(idx) => name[..idx].to_string(),
    }
}

/// Resolve a filename referenced by a sidecar against the sidecar's directory.
///
/// Both inputs are library-relative and `/`-separated; backslashes in the
/// referenced name are normalized.
pub fn sibling_path(sidecar_path: &str, filename: &str) -> String {
    let filename = filename.replace('\\', "/");
    match sidecar_path.rfind('/') {
        Some(idx) => format!("{}/{}", &sidecar_path[..idx], filename),
        None => filename,
    }
}

// ---------------------------------------------------------------------------
// CUE sheets
// ---------------------------------------------------------------------------

/// Parse a CUE sheet into `(filename, track)` pairs, in order.
///
/// Each `TRACK` line is attributed to the most recent `FILE` line. Tracks
/// before any `FILE`, and every other directive, are ignored.
pub fn parse_cue(content: &str) -> Vec<CueFile> {
    let mut entries = Vec::new();
    let mut current_file: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let upper = line.to_uppercase();

        if upper.starts_with("FILE ") {
            current_file = parse_cue_file_line(line);
        } else if upper.starts_with("TRACK ")
            && let Some(ref filename) = current_file
            && let Some(track) = parse_cue_track_number(line)
        {
            entries.push(CueFile {
                filename: filename.clone(),
                track,
            });
        }
        // Ignore INDEX, PREGAP, POSTGAP, REM, etc.
    }

    entries
}

/// Parse a FILE line: `FILE "filename.bin" BINARY`
fn parse_cue_file_line(line: &str) -> Option<String> {
    let rest = line.get(5..)?.trim_start(); // skip "FILE "

    let filename = if let Some(after_quote) = rest.strip_prefix('"') {
        let end_quote = after_quote.find('"')?;
        &after_quote[..end_quote]
    } else {
        rest.split_whitespace().next()?
    };

    if filename.is_empty() {
        None
    } else {
        Some(filename.to_string())
    }
}

/// Parse a TRACK line: `TRACK 01 MODE2/2352`
fn parse_cue_track_number(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

// ---------------------------------------------------------------------------
// GDI track lists
// ---------------------------------------------------------------------------

/// Parse a GDI track list.
///
/// The first line (track count) is skipped. Every other line holds
/// `track lba type sector-size filename flags`; lines with fewer than five
/// fields or non-numeric track/lba values are ignored.
pub fn parse_gdi(content: &str) -> Vec<GdiTrack> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields = tokenize_gdi_line(line);
            if fields.len() < 5 {
                return None;
            }
            let track = fields[0].parse().ok()?;
            let lba = fields[1].parse().ok()?;
            let filename = fields[4].trim_matches('"').to_string();
            if filename.is_empty() {
                return None;
            }
            Some(GdiTrack {
                track,
                lba,
                filename,
            })
        })
        .collect()
}

/// Split on whitespace, keeping double-quoted runs (filenames with spaces)
/// together.
fn tokenize_gdi_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
#[path = "tests/disc_tests.rs"]
mod tests;
