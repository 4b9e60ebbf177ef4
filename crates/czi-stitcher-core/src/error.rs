use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StitcherError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {message}", path.display())]
    FormatRead { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    FormatWrite { path: PathBuf, message: String },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("External tool '{tool}' failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("OME-XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid OME metadata: {0}")]
    InvalidMetadata(String),

    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StitcherError {
    pub(crate) fn read(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::FormatRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::FormatWrite {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for StitcherError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StitcherError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<glob::PatternError> for StitcherError {
    fn from(err: glob::PatternError) -> Self {
        Self::Usage(format!("invalid filename pattern: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, StitcherError>;
