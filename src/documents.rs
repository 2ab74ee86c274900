use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversizePolicy {
    Reject,
    Truncate,
}

impl OversizePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Truncate => "truncate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentLimit {
    /// `None` disables the guard.
    pub max_bytes: Option<usize>,
    pub on_oversize: OversizePolicy,
}

impl DocumentLimit {
    pub fn unlimited() -> Self {
        Self {
            max_bytes: None,
            on_oversize: OversizePolicy::Reject,
        }
    }
}

impl Default for DocumentLimit {
    fn default() -> Self {
        Self {
            max_bytes: Some(1024 * 1024),
            on_oversize: OversizePolicy::Reject,
        }
    }
}

#[derive(Debug)]
pub enum DocumentLoadError {
    Read { path: PathBuf, source: io::Error },
    InvalidUtf8 { path: PathBuf },
    TooLarge { path: PathBuf, size: usize, max_bytes: usize },
}

impl fmt::Display for DocumentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::InvalidUtf8 { path } => {
                write!(f, "'{}' is not valid UTF-8 text", path.display())
            }
            Self::TooLarge {
                path,
                size,
                max_bytes,
            } => write!(
                f,
                "'{}' is {} bytes, over the {} byte limit (set DOCUMENT_MAX_BYTES or DOCUMENT_OVERSIZE=truncate)",
                path.display(),
                size,
                max_bytes
            ),
        }
    }
}

impl Error for DocumentLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub content: String,
    pub truncated: bool,
}

/// Reads a whole UTF-8 text file, applying `limit`.
pub fn read_document(path: &Path, limit: DocumentLimit) -> Result<Document, DocumentLoadError> {
    let bytes = fs::read(path).map_err(|source| DocumentLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut content = String::from_utf8(bytes).map_err(|_| DocumentLoadError::InvalidUtf8 {
        path: path.to_path_buf(),
    })?;

    let mut truncated = false;
    if let Some(max_bytes) = limit.max_bytes
        && content.len() > max_bytes
    {
        match limit.on_oversize {
            OversizePolicy::Reject => {
                return Err(DocumentLoadError::TooLarge {
                    path: path.to_path_buf(),
                    size: content.len(),
                    max_bytes,
                });
            }
            OversizePolicy::Truncate => {
                content.truncate(floor_char_boundary(&content, max_bytes));
                content.push_str(&format!("\n[truncated to {max_bytes} bytes]"));
                truncated = true;
            }
        }
    }

    Ok(Document {
        filename: file_name_of(path),
        content,
        truncated,
    })
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Filename to content, for everything loaded this session.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: HashMap<String, String>,
}

impl DocumentStore {
    pub fn insert(&mut self, filename: impl Into<String>, content: impl Into<String>) {
        self.documents.insert(filename.into(), content.into());
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.documents.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }
}
