use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct ContentLoadRequest {
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    JsonMalformed,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentLoadError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentLoadError {}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
