//! Reference catalog (DAT) documents: parsing, container extraction and
//! network fetch.
//!
//! A catalog is a Logiqx-style XML document, possibly wrapped in a
//! single-file ZIP or 7Z archive. Parsing yields normalized
//! [`CatalogRecord`](romshelf_core::CatalogRecord)s ready to be upserted.

pub mod archive;
pub mod document;
pub mod error;
pub mod fetch;

pub use archive::{ArchiveExtractor, ArchiveKind, SystemExtractor, read_catalog};
pub use document::{CatalogDocument, detect_source, parse_catalog, split_languages};
pub use error::DatError;
pub use fetch::{DownloadedCatalog, fetch_catalog};
