//! Parser and renderer for the document-info records of `pdftk dump_data_utf8`
//!
//! ```text
//! InfoBegin
//! InfoKey: Title
//! InfoValue: Application form
//! PdfID0: 8b9e...
//! NumberOfPages: 2
//! ```
//!
//! The same `InfoBegin`/`InfoKey`/`InfoValue` records are accepted by
//! `update_info_utf8`. Records other than info entries and the page count
//! (bookmarks, page media, labels) are ignored.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One key/value pair of the document information dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InfoEntry {
    /// Dictionary key (e.g. "Title", "Author", "Producer")
    pub key: String,
    /// Text value, empty to clear the key
    pub value: String,
}

impl InfoEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Document information reported by pdftk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DocumentInfo {
    /// Info dictionary entries in dump order
    pub entries: Vec<InfoEntry>,
    /// Page count, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl DocumentInfo {
    /// Value of the first entry with the given key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

#[derive(Default)]
struct PendingEntry {
    key: Option<String>,
    value: String,
}

fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parse dump text. Never fails; records without an `InfoKey` are dropped.
pub fn parse_info_dump(dump: &str) -> DocumentInfo {
    let mut info = DocumentInfo::default();
    let mut pending: Option<PendingEntry> = None;

    let flush = |pending: &mut Option<PendingEntry>, entries: &mut Vec<InfoEntry>| {
        if let Some(PendingEntry {
            key: Some(key),
            value,
        }) = pending.take()
        {
            entries.push(InfoEntry { key, value });
        }
    };

    for line in dump.lines() {
        if line == "InfoBegin" {
            flush(&mut pending, &mut info.entries);
            pending = Some(PendingEntry::default());
            continue;
        }

        if let Some(entry) = pending.as_mut() {
            if let Some(key) = field_value(line, "InfoKey") {
                entry.key = Some(key.to_string());
                continue;
            }
            if let Some(value) = field_value(line, "InfoValue") {
                entry.value = value.to_string();
                continue;
            }
        }

        flush(&mut pending, &mut info.entries);

        if let Some(count) = field_value(line, "NumberOfPages") {
            info.page_count = count.trim().parse().ok();
        }
    }

    flush(&mut pending, &mut info.entries);
    info
}

/// Render entries in the record format read by `update_info_utf8`.
///
/// Line breaks inside values would start a new record, so they are
/// replaced with spaces.
pub fn render_info_update(entries: &[InfoEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str("InfoBegin\nInfoKey: ");
        out.push_str(&single_line(&entry.key));
        out.push_str("\nInfoValue: ");
        out.push_str(&single_line(&entry.value));
        out.push('\n');
    }
    out
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
