//! External executables (pdftk and the metadata stripper)
//!
//! Tools are resolved against `PATH` before any scratch storage is created
//! and are run synchronously with captured output.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Default form-filling tool
pub const PDFTK: &str = "pdftk";

/// Default metadata-stripping tool
pub const EXIFTOOL: &str = "exiftool";

/// An executable named either bare (looked up on `PATH`) or by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    program: PathBuf,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Short name used in errors and logs
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Locate the executable, failing with [`Error::ToolNotInstalled`]
    pub fn resolve(&self) -> Result<PathBuf> {
        let not_installed = || Error::ToolNotInstalled { tool: self.name() };

        if self.program.as_os_str().is_empty() {
            return Err(not_installed());
        }

        // Anything with a directory component is taken as a path
        if self.program.components().count() > 1 || self.program.is_absolute() {
            return if is_executable(&self.program) {
                Ok(self.program.clone())
            } else {
                Err(not_installed())
            };
        }

        let path_var = std::env::var_os("PATH").ok_or_else(not_installed)?;
        std::env::split_paths(&path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .flat_map(|dir| candidates(&dir, &self.program))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(not_installed)
    }

    /// Run the tool, optionally inside `dir`, and return its stdout.
    ///
    /// A nonzero exit becomes [`Error::ToolInvocation`] carrying the trimmed
    /// stderr text.
    pub fn run<I, S>(&self, dir: Option<&Path>, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        tracing::debug!(tool = %self.name(), ?args, ?dir, "running external tool");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null());
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|e| Error::ToolInvocation {
                tool: self.name(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(tool = %self.name(), status = ?output.status, %stderr, "external tool failed");
            return Err(Error::ToolInvocation {
                tool: self.name(),
                stderr: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(output.stdout)
    }
}

fn candidates(dir: &Path, program: &Path) -> Vec<PathBuf> {
    let mut found = vec![dir.join(program)];
    if cfg!(windows) && program.extension().is_none() {
        found.push(dir.join(program).with_extension("exe"));
    }
    found
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The external tools a [`crate::PdfFiller`] delegates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Fills forms, dumps fields and reads/writes document info
    pub pdftk: ExternalTool,
    /// Strips XMP metadata in place; only needed for `remove_metadata`
    pub metadata_stripper: ExternalTool,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            pdftk: ExternalTool::new(PDFTK),
            metadata_stripper: ExternalTool::new(EXIFTOOL),
        }
    }
}

impl Toolchain {
    pub fn with_pdftk(mut self, program: impl Into<PathBuf>) -> Self {
        self.pdftk = ExternalTool::new(program);
        self
    }

    pub fn with_metadata_stripper(mut self, program: impl Into<PathBuf>) -> Self {
        self.metadata_stripper = ExternalTool::new(program);
        self
    }
}
