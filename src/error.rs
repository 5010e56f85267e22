//! Error types for fillpdf

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fillpdf
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fillpdf
#[derive(Error, Debug)]
pub enum Error {
    /// Absolute path could not be computed
    #[error("Failed to create the absolute path for '{path}': {source}")]
    PathResolution {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Source PDF not found
    #[error("Form PDF file does not exist: {path}")]
    NotFound { path: PathBuf },

    /// External executable not resolvable
    #[error("{tool} utility is not installed")]
    ToolNotInstalled { tool: String },

    /// Scratch directory or file could not be created or removed
    #[error("Temporary resource error: {reason}: {source}")]
    TemporaryResource {
        reason: String,
        #[source]
        source: std::io::Error,
    },

    /// Value cannot be represented in Latin-1 (FDF only)
    #[error("Field '{field}' contains {character:?} which is not representable in Latin-1")]
    Encoding { field: String, character: char },

    /// External tool exited unsuccessfully
    #[error("{tool} error: {stderr}")]
    ToolInvocation { tool: String, stderr: String },

    /// Destination present and overwrite not permitted
    #[error("Destination PDF file already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Final copy or removal at the destination failed
    #[error("Failed to write destination PDF {path}: {source}")]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid PDF data
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Field value that has no text rendering
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Blocking task failed to complete
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },

    /// XFDF serialization error
    #[error("XML serialization error: {reason}")]
    Xml { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, tool output, io errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PathResolution { .. } => "Failed to resolve path".to_string(),
            Error::NotFound { .. } => "PDF not found".to_string(),
            Error::ToolNotInstalled { tool } => format!("{} utility is not installed", tool),
            Error::TemporaryResource { .. } => "Temporary storage error".to_string(),
            Error::Encoding { field, character } => format!(
                "Field '{}' contains {:?} which is not representable in Latin-1",
                field, character
            ),
            Error::ToolInvocation { tool, .. } => format!("{} failed", tool),
            Error::DestinationExists { .. } => "Destination PDF file already exists".to_string(),
            Error::DestinationWrite { .. } => "Failed to write destination PDF".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::InvalidFieldValue { field, reason } => {
                format!("Invalid value for field '{}': {}", field, reason)
            }
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::TaskJoin { .. } => "Internal error".to_string(),
            Error::Xml { .. } => "XML serialization error".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }
}
