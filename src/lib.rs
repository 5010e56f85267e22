//! fillpdf - fill PDF forms with pdftk
//!
//! This crate generates the field-definition payloads pdftk's `fill_form`
//! consumes and orchestrates the external tools:
//! - [`form`]: the [`Form`] model with FDF and XFDF encoders
//! - [`dump`]: parsers for pdftk's field and document-info dumps
//! - [`filler`]: [`PdfFiller`], which fills, flattens, inspects and strips metadata
//! - [`server`]: an MCP server exposing `fill_form`, `get_form_fields`,
//!   `get_document_info` and `update_document_info`

pub mod dump;
pub mod error;
pub mod filler;
pub mod form;
pub mod server;
pub mod source;
pub mod tool;

pub use dump::{DocumentInfo, FieldDescriptor, InfoEntry};
pub use error::{Error, Result};
pub use filler::{fill, get_fields, FillOutput, PdfFiller};
pub use form::{FieldFormat, FillOptions, Form};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, PdfServer, PdfSource, ServerConfig,
};
pub use tool::{ExternalTool, Toolchain};
