//! Form filling through pdftk
//!
//! Every operation validates its input, resolves the tools it needs, and
//! only then creates a private scratch directory. The scratch directory is
//! removed on every exit path.

use crate::dump::{
    parse_field_dump, parse_info_dump, render_info_update, DocumentInfo, FieldDescriptor, InfoEntry,
};
use crate::error::{Error, Result};
use crate::form::{FillOptions, Form};
use crate::tool::{ExternalTool, Toolchain};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OUTPUT_FILE: &str = "output.pdf";
const STRIPPED_FILE: &str = "stripped.pdf";
const INFO_FILE: &str = "info.txt";

/// Result of a fill or info update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutput {
    /// No destination was given; the PDF bytes are returned
    Bytes(Vec<u8>),
    /// The PDF was written to this absolute path
    Written(PathBuf),
}

impl FillOutput {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            FillOutput::Bytes(bytes) => Some(bytes),
            FillOutput::Written(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FillOutput::Bytes(_) => None,
            FillOutput::Written(path) => Some(path),
        }
    }
}

/// Scratch directory that logs instead of panicking when removal fails
struct Scratch {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Scratch {
    fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("fillpdf-")
            .tempdir()
            .map_err(|source| Error::TemporaryResource {
                reason: "failed to create temporary directory".to_string(),
                source,
            })?;
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.join(name);
        std::fs::write(&path, contents).map_err(|source| Error::TemporaryResource {
            reason: format!("failed to write {}", name),
            source,
        })?;
        Ok(path)
    }

    /// Remove the directory now. Failure is logged; the work is already done.
    fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    dir = %self.path.display(),
                    error = %e,
                    "failed to remove temporary directory"
                );
            }
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Make a path absolute against the current directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| Error::PathResolution {
            path: path.display().to_string(),
            source,
        })
}

/// Absolute path of an existing source PDF
fn existing_source(path: &Path) -> Result<PathBuf> {
    let path = absolute(path)?;
    if !path.is_file() {
        return Err(Error::NotFound { path });
    }
    Ok(path)
}

fn check_destination(destination: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && destination.exists() {
        return Err(Error::DestinationExists {
            path: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// Copy a finished PDF to its destination, honoring `overwrite`
fn place(output: &Path, destination: &Path, overwrite: bool) -> Result<()> {
    let write_error = |source| Error::DestinationWrite {
        path: destination.to_path_buf(),
        source,
    };

    if destination.exists() {
        if !overwrite {
            return Err(Error::DestinationExists {
                path: destination.to_path_buf(),
            });
        }
        std::fs::remove_file(destination).map_err(write_error)?;
    }

    std::fs::copy(output, destination).map_err(write_error)?;
    Ok(())
}

fn deliver(output: &Path, destination: Option<&Path>, overwrite: bool) -> Result<FillOutput> {
    match destination {
        Some(destination) => {
            place(output, destination, overwrite)?;
            Ok(FillOutput::Written(destination.to_path_buf()))
        }
        None => {
            let bytes = std::fs::read(output).map_err(|source| Error::TemporaryResource {
                reason: "failed to read output PDF".to_string(),
                source,
            })?;
            Ok(FillOutput::Bytes(bytes))
        }
    }
}

/// Fills PDF forms and inspects them using a [`Toolchain`]
#[derive(Debug, Clone, Default)]
pub struct PdfFiller {
    tools: Toolchain,
}

impl PdfFiller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toolchain(tools: Toolchain) -> Self {
        Self { tools }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.tools
    }

    fn pdftk(&self) -> Result<ExternalTool> {
        self.tools.pdftk.resolve().map(ExternalTool::new)
    }

    /// Resolve the tools an operation needs without running anything.
    /// The metadata stripper is only required with `remove_metadata`.
    pub fn check_tools(&self, remove_metadata: bool) -> Result<()> {
        self.pdftk()?;
        if remove_metadata {
            self.tools.metadata_stripper.resolve()?;
        }
        Ok(())
    }

    /// Fill `source` with `form`.
    ///
    /// Without a destination the filled PDF is returned as bytes. With one,
    /// an existing file there is only replaced when `options.overwrite` is set.
    /// Failing to remove the scratch directory afterwards is logged, not returned.
    pub fn fill(
        &self,
        form: &Form,
        source: impl AsRef<Path>,
        destination: Option<&Path>,
        options: FillOptions,
    ) -> Result<FillOutput> {
        let source = existing_source(source.as_ref())?;
        let destination = destination.map(absolute).transpose()?;

        let pdftk = self.pdftk()?;
        let stripper = if options.remove_metadata {
            Some(self.tools.metadata_stripper.resolve().map(ExternalTool::new)?)
        } else {
            None
        };

        if let Some(destination) = &destination {
            check_destination(destination, options.overwrite)?;
        }

        let payload = form.encode(options.format)?;

        let scratch = Scratch::new()?;
        let definition = scratch.write(options.format.file_name(), &payload)?;
        let mut output = scratch.join(OUTPUT_FILE);

        let mut args = vec![
            source.into_os_string(),
            "fill_form".into(),
            definition.into_os_string(),
            "output".into(),
            output.clone().into_os_string(),
        ];
        if options.flatten {
            args.push("flatten".into());
        }
        pdftk.run(Some(scratch.path()), &args)?;

        if let Some(stripper) = &stripper {
            output = strip_metadata(&pdftk, stripper, &scratch, &output)?;
        }

        let delivered = deliver(&output, destination.as_deref(), options.overwrite)?;
        scratch.close();

        tracing::info!(
            fields = form.len(),
            format = ?options.format,
            flatten = options.flatten,
            remove_metadata = options.remove_metadata,
            destination = ?delivered.path(),
            "filled PDF form"
        );
        Ok(delivered)
    }

    /// List the interactive form fields of `source`
    pub fn get_fields(&self, source: impl AsRef<Path>) -> Result<Vec<FieldDescriptor>> {
        let source = existing_source(source.as_ref())?;
        let pdftk = self.pdftk()?;

        let dump = pdftk.run(None, [source.as_os_str(), OsStr::new("dump_data_fields_utf8")])?;
        Ok(parse_field_dump(&String::from_utf8_lossy(&dump)))
    }

    /// Read the document information dictionary of `source`
    pub fn read_info(&self, source: impl AsRef<Path>) -> Result<DocumentInfo> {
        let source = existing_source(source.as_ref())?;
        let pdftk = self.pdftk()?;

        let dump = pdftk.run(None, [source.as_os_str(), OsStr::new("dump_data_utf8")])?;
        Ok(parse_info_dump(&String::from_utf8_lossy(&dump)))
    }

    /// Write `entries` into the information dictionary of a copy of `source`.
    /// An entry with an empty value clears that key.
    pub fn update_info(
        &self,
        source: impl AsRef<Path>,
        entries: &[InfoEntry],
        destination: Option<&Path>,
        overwrite: bool,
    ) -> Result<FillOutput> {
        let source = existing_source(source.as_ref())?;
        let destination = destination.map(absolute).transpose()?;
        let pdftk = self.pdftk()?;

        if let Some(destination) = &destination {
            check_destination(destination, overwrite)?;
        }

        let scratch = Scratch::new()?;
        let output = scratch.join(OUTPUT_FILE);
        write_info(&pdftk, &scratch, &source, entries, &output)?;

        let delivered = deliver(&output, destination.as_deref(), overwrite)?;
        scratch.close();

        tracing::info!(entries = entries.len(), destination = ?delivered.path(), "updated document info");
        Ok(delivered)
    }
}

fn write_info(
    pdftk: &ExternalTool,
    scratch: &Scratch,
    input: &Path,
    entries: &[InfoEntry],
    output: &Path,
) -> Result<()> {
    let info_file = scratch.write(INFO_FILE, render_info_update(entries).as_bytes())?;
    pdftk.run(
        Some(scratch.path()),
        [
            input.as_os_str(),
            OsStr::new("update_info_utf8"),
            info_file.as_os_str(),
            OsStr::new("output"),
            output.as_os_str(),
        ],
    )?;
    Ok(())
}

/// Blank every info dictionary key, then strip XMP in place.
/// Returns the path of the stripped copy inside `scratch`.
fn strip_metadata(
    pdftk: &ExternalTool,
    stripper: &ExternalTool,
    scratch: &Scratch,
    input: &Path,
) -> Result<PathBuf> {
    let dump = pdftk.run(Some(scratch.path()), [input.as_os_str(), OsStr::new("dump_data_utf8")])?;
    let info = parse_info_dump(&String::from_utf8_lossy(&dump));

    let stripped = scratch.join(STRIPPED_FILE);
    if info.entries.is_empty() {
        std::fs::copy(input, &stripped).map_err(|source| Error::TemporaryResource {
            reason: "failed to copy output PDF".to_string(),
            source,
        })?;
    } else {
        let cleared: Vec<InfoEntry> = info
            .entries
            .into_iter()
            .map(|entry| InfoEntry::new(entry.key, ""))
            .collect();
        write_info(pdftk, scratch, input, &cleared, &stripped)?;
    }

    stripper.run(
        Some(scratch.path()),
        [
            OsStr::new("-all:all="),
            OsStr::new("-overwrite_original"),
            stripped.as_os_str(),
        ],
    )?;

    tracing::debug!(file = %stripped.display(), "removed document metadata");
    Ok(stripped)
}

/// Fill a form using the default toolchain. See [`PdfFiller::fill`].
pub fn fill(
    form: &Form,
    source: impl AsRef<Path>,
    destination: Option<&Path>,
    options: FillOptions,
) -> Result<FillOutput> {
    PdfFiller::new().fill(form, source, destination, options)
}

/// List form fields using the default toolchain. See [`PdfFiller::get_fields`].
pub fn get_fields(source: impl AsRef<Path>) -> Result<Vec<FieldDescriptor>> {
    PdfFiller::new().get_fields(source)
}
