//! Form data model and field-definition encoders
//!
//! A [`Form`] maps field names to their text values. It is serialized into
//! one of two sidecar formats understood by pdftk's `fill_form`:
//! - FDF: the classic Forms Data Format, values transliterated to Latin-1
//! - XFDF: the XML variant, UTF-8 native

mod fdf;
mod xfdf;

pub use fdf::{encode_fdf, to_latin1, FDF_FOOTER, FDF_HEADER};
pub use xfdf::{encode_xfdf, XFDF_NAMESPACE};

use crate::error::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Field values keyed by field name.
///
/// Values are rendered to text when inserted. Iteration is sorted by field
/// name so encoded payloads are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: BTreeMap<String, String>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) -> Option<String> {
        self.fields.insert(name.into(), value.to_string())
    }

    /// Chaining variant of [`Form::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode the form in the requested sidecar format
    pub fn encode(&self, format: FieldFormat) -> Result<Vec<u8>> {
        match format {
            FieldFormat::Fdf => encode_fdf(self),
            FieldFormat::Xfdf => encode_xfdf(self).map(String::into_bytes),
        }
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for Form {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Form::new();
        form.extend(iter);
        form
    }
}

impl<K: Into<String>, V: Display> Extend<(K, V)> for Form {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<'a> IntoIterator for &'a Form {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Sidecar format handed to pdftk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    /// Forms Data Format, Latin-1 values
    #[default]
    Fdf,
    /// XML Forms Data Format, UTF-8 values
    Xfdf,
}

impl FieldFormat {
    /// Name of the scratch file the payload is written to
    pub fn file_name(self) -> &'static str {
        match self {
            FieldFormat::Fdf => "data.fdf",
            FieldFormat::Xfdf => "data.xfdf",
        }
    }
}

fn default_true() -> bool {
    true
}

/// Options for a fill run.
///
/// Defaults: `overwrite = false`, `flatten = true`, `remove_metadata = false`,
/// `format = Fdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct FillOptions {
    /// Replace an existing destination file (default: false)
    #[serde(default)]
    pub overwrite: bool,
    /// Render the fields into static page content (default: true)
    #[serde(default = "default_true")]
    pub flatten: bool,
    /// Clear the info dictionary and strip XMP metadata (default: false)
    #[serde(default)]
    pub remove_metadata: bool,
    /// Sidecar format: "fdf" (default) or "xfdf"
    #[serde(default)]
    pub format: FieldFormat,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            flatten: true,
            remove_metadata: false,
            format: FieldFormat::Fdf,
        }
    }
}

impl FillOptions {
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_remove_metadata(mut self, remove_metadata: bool) -> Self {
        self.remove_metadata = remove_metadata;
        self
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    /// True when the XFDF encoder is selected
    pub fn use_alternate_field_format(&self) -> bool {
        self.format == FieldFormat::Xfdf
    }
}
