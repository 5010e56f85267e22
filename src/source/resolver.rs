//! Source resolution for PDF input
//!
//! pdftk reads its input from disk, so every source is resolved to a file:
//! paths are checked in place and base64 payloads are spilled into a
//! scratch directory that lives as long as the [`ResolvedPdf`].

use crate::error::{Error, Result};
use base64::Engine;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A PDF available on disk
#[derive(Debug)]
pub struct ResolvedPdf {
    pub path: PathBuf,
    pub source_name: String,
    _spill: Option<TempDir>,
}

fn check_pdf_header(data: &[u8], what: &str) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: format!("{} is not a valid PDF file", what),
        });
    }
    Ok(())
}

/// Resolve a file path to a PDF on disk
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::NotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(ResolvedPdf {
        path: path.to_path_buf(),
        source_name: path.display().to_string(),
        _spill: None,
    })
}

/// Resolve base64 encoded data into a scratch PDF file
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;

    check_pdf_header(&data, "Decoded data")?;

    let spill = tempfile::Builder::new()
        .prefix("fillpdf-source-")
        .tempdir()
        .map_err(|source| Error::TemporaryResource {
            reason: "failed to create source directory".to_string(),
            source,
        })?;
    let path = spill.path().join("source.pdf");
    std::fs::write(&path, &data).map_err(|source| Error::TemporaryResource {
        reason: "failed to write source PDF".to_string(),
        source,
    })?;

    Ok(ResolvedPdf {
        path,
        source_name: "<base64>".to_string(),
        _spill: Some(spill),
    })
}
