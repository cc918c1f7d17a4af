/// Errors that can occur while reading, extracting or fetching a catalog.
#[derive(Debug, thiserror::Error)]
pub enum DatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid DAT file: {0}")]
    InvalidDat(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{program} failed: {message}")]
    Subprocess { program: String, message: String },

    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("Download failed: {0}")]
    Download(String),
}

impl DatError {
    pub fn invalid_dat(msg: impl Into<String>) -> Self {
        Self::InvalidDat(msg.into())
    }

    pub fn subprocess(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Subprocess {
            program: program.into(),
            message: msg.into(),
        }
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Whether the failure lies in the document itself, so retrying the same
    /// input cannot succeed.
    pub fn is_validation(&self) -> bool {
        match self {
            DatError::XmlParse(_)
            | DatError::XmlAttribute(_)
            | DatError::InvalidDat(_) => true,
            DatError::Zip(e) => !matches!(e, zip::result::ZipError::Io(_)),
            _ => false,
        }
    }
}
