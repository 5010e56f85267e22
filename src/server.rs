//! MCP Server implementation using rmcp

use crate::dump::{FieldDescriptor, InfoEntry};
use crate::error::Error;
use crate::filler::{FillOutput, PdfFiller};
use crate::form::{FillOptions, Form};
use crate::source::{resolve_base64, resolve_path, ResolvedPdf};
use crate::tool::{Toolchain, EXIFTOOL, PDFTK};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                if let Some(s) = v.as_str() {
                    return Ok(PdfSource::Base64 {
                        base64: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"base64\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// Sandbox and toolchain configuration for the fillpdf MCP server
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Directories input and output paths must stay within (empty: no restriction)
    pub resource_dirs: Vec<String>,
    /// External tools used for filling and inspection
    pub toolchain: Toolchain,
}

impl ServerConfig {
    /// Build a configuration from the process environment:
    /// - `FILLPDF_RESOURCE_DIRS`: platform path list of sandbox directories
    /// - `FILLPDF_PDFTK`: pdftk executable (default: `pdftk`)
    /// - `FILLPDF_METADATA_STRIPPER`: metadata stripper (default: `exiftool`)
    pub fn from_env() -> Self {
        let resource_dirs = std::env::var_os("FILLPDF_RESOURCE_DIRS")
            .map(|dirs| {
                std::env::split_paths(&dirs)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(|dir| dir.to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        let pdftk = std::env::var_os("FILLPDF_PDFTK").unwrap_or_else(|| PDFTK.into());
        let stripper =
            std::env::var_os("FILLPDF_METADATA_STRIPPER").unwrap_or_else(|| EXIFTOOL.into());

        Self {
            resource_dirs,
            toolchain: Toolchain::default()
                .with_pdftk(pdftk)
                .with_metadata_stripper(stripper),
        }
    }
}

/// fillpdf MCP Server
#[derive(Clone)]
pub struct PdfServer {
    filler: Arc<PdfFiller>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for fill_form
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FillFormParams {
    /// Source PDF containing the form
    pub source: PdfSource,
    /// Field values keyed by field name. Strings, numbers, booleans and null are accepted.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Output file path (optional). Without it the filled PDF is returned as base64.
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(flatten)]
    pub options: FillOptions,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FillFormResult {
    /// Source identifier
    pub source: String,
    /// Number of field values written
    pub fields_written: usize,
    /// Path where the PDF was saved (if output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Base64 encoded filled PDF (if no output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_form_fields
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFormFieldsParams {
    /// PDF sources to inspect
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetFormFieldsResult {
    pub source: String,
    /// Fields in document order
    pub fields: Vec<FieldDescriptor>,
    pub total_fields: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_document_info
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentInfoParams {
    /// PDF sources to inspect
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetDocumentInfoResult {
    pub source: String,
    /// Document information dictionary entries
    pub entries: Vec<InfoEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for update_document_info
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDocumentInfoParams {
    /// Source PDF to update
    pub source: PdfSource,
    /// Entries to set. An empty value clears the key.
    pub entries: Vec<InfoEntry>,
    /// Output file path (optional). Without it the PDF is returned as base64.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Replace an existing output file (default: false)
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UpdateDocumentInfoResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Render a JSON scalar the way it would be typed into the field
fn field_text(name: &str, value: &serde_json::Value) -> crate::error::Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Err(Error::InvalidFieldValue {
                field: name.to_string(),
                reason: "expected a string, number, boolean or null".to_string(),
            })
        }
    }
}

fn form_from_json(fields: &serde_json::Map<String, serde_json::Value>) -> crate::error::Result<Form> {
    let mut form = Form::new();
    for (name, value) in fields {
        form.insert(name.clone(), field_text(name, value)?);
    }
    Ok(form)
}

fn output_fields(output: FillOutput) -> (Option<String>, Option<String>) {
    match output {
        FillOutput::Written(path) => (Some(path.display().to_string()), None),
        FillOutput::Bytes(bytes) => (
            None,
            Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        ),
    }
}

async fn run_blocking<T, F>(task: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::TaskJoin {
            reason: e.to_string(),
        })?
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new PdfServer with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a new PdfServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            filler: Arc::new(PdfFiller::with_toolchain(config.toolchain.clone())),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Fill form fields in a PDF
    #[tool(
        description = "Fill the form fields of a PDF using pdftk and produce a new PDF.

fields maps field names to values (use get_form_fields to discover names). Checkbox and radio values must match one of the field's export states (commonly \"Yes\"/\"Off\").

Options:
- flatten (default: true): make the filled fields non-editable
- format (default: \"fdf\"): \"fdf\" supports Latin-1 values only, \"xfdf\" supports full UTF-8
- remove_metadata (default: false): clear the document info and strip XMP metadata
- overwrite (default: false): replace an existing output_path

Without output_path the filled PDF is returned as output_base64.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn fill_form(&self, Parameters(params): Parameters<FillFormParams>) -> String {
        let result = self
            .process_fill_form(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "fill_form failed");
                FillFormResult {
                    source: Self::source_name(&params.source),
                    fields_written: 0,
                    output_path: None,
                    output_base64: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List form fields of PDF files
    #[tool(
        description = "List the interactive form fields of PDF files as reported by pdftk. Returns each field's type (text, button, choice, signature), name, alternate name and flags in document order.

Use this before fill_form to discover field names.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn get_form_fields(&self, Parameters(params): Parameters<GetFormFieldsParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_get_form_fields(source)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "get_form_fields failed");
                    GetFormFieldsResult {
                        source: Self::source_name(source),
                        fields: vec![],
                        total_fields: 0,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Read document information of PDF files
    #[tool(
        description = "Read the document information dictionary (Title, Author, Producer, ...) and page count of PDF files.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn get_document_info(
        &self,
        Parameters(params): Parameters<GetDocumentInfoParams>,
    ) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_get_document_info(source)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "get_document_info failed");
                    GetDocumentInfoResult {
                        source: Self::source_name(source),
                        entries: vec![],
                        page_count: None,
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Update document information of a PDF
    #[tool(
        description = "Set entries of a PDF's document information dictionary and produce a new PDF. An entry with an empty value clears that key.

Without output_path the PDF is returned as output_base64. An existing output_path is only replaced when overwrite is true.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}"
    )]
    async fn update_document_info(
        &self,
        Parameters(params): Parameters<UpdateDocumentInfoParams>,
    ) -> String {
        let result = self
            .process_update_document_info(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "update_document_info failed");
                UpdateDocumentInfoResult {
                    source: Self::source_name(&params.source),
                    output_path: None,
                    output_base64: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
        }
    }

    /// Resolve a source to a local file. A base64 source is only spilled to
    /// disk once the tools the operation needs have been found.
    fn resolve_source(
        &self,
        source: &PdfSource,
        remove_metadata: bool,
    ) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => {
                self.filler.check_tools(remove_metadata)?;
                resolve_base64(base64)
            }
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let canonical_parent = std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate an optional output path and create its parent directories
    fn prepare_output(&self, output_path: &Option<String>) -> crate::error::Result<Option<PathBuf>> {
        let Some(path_str) = output_path else {
            return Ok(None);
        };

        let path = self.validate_output_path_access(path_str)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Some(path))
    }

    pub async fn process_fill_form(
        &self,
        params: &FillFormParams,
    ) -> crate::error::Result<FillFormResult> {
        let resolved = self.resolve_source(&params.source, params.options.remove_metadata)?;
        let source_name = resolved.source_name.clone();
        let form = form_from_json(&params.fields)?;
        let output_path = self.prepare_output(&params.output_path)?;

        let filler = Arc::clone(&self.filler);
        let options = params.options;
        let fields_written = form.len();

        let output = run_blocking(move || {
            filler.fill(&form, &resolved.path, output_path.as_deref(), options)
        })
        .await?;

        let (output_path, output_base64) = output_fields(output);

        Ok(FillFormResult {
            source: source_name,
            fields_written,
            output_path,
            output_base64,
            error: None,
        })
    }

    pub async fn process_get_form_fields(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<GetFormFieldsResult> {
        let resolved = self.resolve_source(source, false)?;
        let source_name = resolved.source_name.clone();
        let filler = Arc::clone(&self.filler);

        let fields = run_blocking(move || filler.get_fields(&resolved.path)).await?;
        let total_fields = fields.len();

        Ok(GetFormFieldsResult {
            source: source_name,
            fields,
            total_fields,
            error: None,
        })
    }

    pub async fn process_get_document_info(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<GetDocumentInfoResult> {
        let resolved = self.resolve_source(source, false)?;
        let source_name = resolved.source_name.clone();
        let filler = Arc::clone(&self.filler);

        let info = run_blocking(move || filler.read_info(&resolved.path)).await?;

        Ok(GetDocumentInfoResult {
            source: source_name,
            entries: info.entries,
            page_count: info.page_count,
            error: None,
        })
    }

    pub async fn process_update_document_info(
        &self,
        params: &UpdateDocumentInfoParams,
    ) -> crate::error::Result<UpdateDocumentInfoResult> {
        let resolved = self.resolve_source(&params.source, false)?;
        let source_name = resolved.source_name.clone();
        let output_path = self.prepare_output(&params.output_path)?;

        let filler = Arc::clone(&self.filler);
        let entries = params.entries.clone();
        let overwrite = params.overwrite;

        let output = run_blocking(move || {
            filler.update_info(&resolved.path, &entries, output_path.as_deref(), overwrite)
        })
        .await?;

        let (output_path, output_base64) = output_fields(output);

        Ok(UpdateDocumentInfoResult {
            source: source_name,
            output_path,
            output_base64,
            error: None,
        })
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "fillpdf fills PDF forms with pdftk. Use get_form_fields to discover field \
                 names, then fill_form to produce a filled (optionally flattened) PDF."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with the default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        pdftk = %config.toolchain.pdftk.program().display(),
        resource_dirs = ?config.resource_dirs,
        "fillpdf MCP server ready, waiting for connections..."
    );

    let server = PdfServer::with_config(config);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
