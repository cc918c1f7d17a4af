use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use romshelf_core::CatalogRecord;

use crate::error::DatError;

/// Root element every catalog document must have.
const ROOT_ELEMENT: &str = "datafile";

/// A parsed catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDocument {
    pub name: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    /// One record per `<rom>` element, in document order.
    pub records: Vec<CatalogRecord>,
}

impl CatalogDocument {
    /// Provenance tag sniffed from the header's author.
    pub fn source(&self) -> &'static str {
        detect_source(self.author.as_deref())
    }
}

/// Map a header author onto a known catalog publisher (case-insensitive
/// substring match), or `"unknown"`.
pub fn detect_source(author: Option<&str>) -> &'static str {
    let author = author.unwrap_or_default().to_lowercase();
    if author.contains("no-intro") {
        "no-intro"
    } else if author.contains("redump") {
        "redump"
    } else if author.contains("tosec") {
        "tosec"
    } else {
        "unknown"
    }
}

/// Split a language list on any of `, / \ | ;`, trimming each part.
pub fn split_languages(input: &str) -> Vec<String> {
    input
        .split([',', '/', '\\', '|', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fields gathered for one `<game>`, from attributes or child elements.
#[derive(Debug, Default)]
struct GameFields {
    name: String,
    region: Option<String>,
    location: Option<String>,
    languages: Option<String>,
    language: Option<String>,
    serial: Option<String>,
    catalog: Option<String>,
    productcode: Option<String>,
    version: Option<String>,
    roms: Vec<RomFields>,
}

impl GameFields {
    fn set(&mut self, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        match key {
            "name" => self.name = value,
            "region" => self.region = Some(value),
            "location" => self.location = Some(value),
            "languages" => self.languages = Some(value),
            "language" => self.language = Some(value),
            "serial" => self.serial = Some(value),
            "catalog" => self.catalog = Some(value),
            "productcode" => self.productcode = Some(value),
            "version" => self.version = Some(value),
            _ => {}
        }
    }

    fn into_records(self) -> impl Iterator<Item = CatalogRecord> {
        let region = self.region.or(self.location);
        let languages = self
            .languages
            .or(self.language)
            .map(|l| split_languages(&l))
            .unwrap_or_default();
        let serial = self.serial.or(self.catalog).or(self.productcode);
        let game_name = self.name;
        let game_version = self.version;

        self.roms.into_iter().map(move |rom| CatalogRecord {
            name: rom.name.unwrap_or_else(|| game_name.clone()),
            crc32: rom.crc,
            md5: rom.md5,
            sha1: rom.sha1,
            region: region.clone(),
            languages: languages.clone(),
            serial: serial.clone().or(rom.serial),
            revision: rom.version.or_else(|| game_version.clone()),
        })
    }
}

#[derive(Debug, Default)]
struct RomFields {
    name: Option<String>,
    crc: Option<String>,
    md5: Option<String>,
    sha1: Option<String>,
    version: Option<String>,
    serial: Option<String>,
}

impl RomFields {
    fn from_attributes(e: &BytesStart<'_>) -> Result<Self, DatError> {
        let mut rom = RomFields::default();
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match attr.key.as_ref() {
                b"name" => rom.name = Some(value),
                b"crc" => rom.crc = Some(value.to_lowercase()),
                b"md5" => rom.md5 = Some(value.to_lowercase()),
                b"sha1" => rom.sha1 = Some(value.to_lowercase()),
                b"version" => rom.version = Some(value),
                b"serial" => rom.serial = Some(value),
                _ => {}
            }
        }
        Ok(rom)
    }
}

fn is_game_tag(tag: &str) -> bool {
    tag == "game" || tag == "machine"
}

/// Accumulated state while walking the XML event stream.
#[derive(Default)]
struct ParseState {
    doc: CatalogDocument,
    /// Open elements, root first.
    stack: Vec<String>,
    text: String,
    game: Option<GameFields>,
    saw_root: bool,
}

impl ParseState {
    fn open(&mut self, e: &BytesStart<'_>, is_empty: bool) -> Result<(), DatError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();

        if self.stack.is_empty() {
            if self.saw_root || tag != ROOT_ELEMENT {
                return Err(DatError::invalid_dat(format!(
                    "expected a single <{ROOT_ELEMENT}> root element, found <{tag}>"
                )));
            }
            self.saw_root = true;
        } else if is_game_tag(&tag) && self.stack.len() == 1 {
            let mut fields = GameFields::default();
            for attr in e.attributes() {
                let attr = attr?;
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                fields.set(&key, attr.unescape_value()?.trim().to_string());
            }
            if is_empty {
                self.doc.records.extend(fields.into_records());
            } else {
                self.game = Some(fields);
            }
        } else if tag == "rom"
            && let Some(ref mut game) = self.game
        {
            game.roms.push(RomFields::from_attributes(e)?);
        }

        if !is_empty {
            self.stack.push(tag);
            self.text.clear();
        }
        Ok(())
    }

    /// Apply the text of the element being closed to whatever it belongs to.
    fn close(&mut self) {
        let tag = self.stack.pop().unwrap_or_default();
        let value = std::mem::take(&mut self.text).trim().to_string();

        if is_game_tag(&tag) && self.stack.len() == 1 {
            if let Some(game) = self.game.take() {
                self.doc.records.extend(game.into_records());
            }
            return;
        }
        if value.is_empty() {
            return;
        }

        match self.stack.last().map(String::as_str) {
            Some("header") => match tag.as_str() {
                "name" => self.doc.name = Some(value),
                "author" => self.doc.author = Some(value),
                "version" => self.doc.version = Some(value),
                _ => {}
            },
            Some(parent) if is_game_tag(parent) && self.stack.len() == 2 => {
                if let Some(game) = self.game.as_mut() {
                    game.set(&tag, value);
                }
            }
            _ => {}
        }
    }
}

/// Parse a catalog document.
///
/// The root element must be `<datafile>`. Game fields may be attributes or
/// child elements; rom fields are attributes. Unknown elements are skipped.
pub fn parse_catalog<R: BufRead>(reader: R) -> Result<CatalogDocument, DatError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut state = ParseState::default();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => state.open(e, false)?,
            Event::Empty(ref e) => state.open(e, true)?,
            Event::Text(ref e) => state.text.push_str(&e.unescape()?),
            Event::CData(ref e) => state.text.push_str(&String::from_utf8_lossy(e)),
            Event::End(_) => state.close(),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !state.saw_root {
        return Err(DatError::invalid_dat(format!(
            "document has no <{ROOT_ELEMENT}> root element"
        )));
    }

    Ok(state.doc)
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
