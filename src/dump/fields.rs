//! Parser for `pdftk dump_data_fields` output
//!
//! The dump is a sequence of records separated by `---` lines:
//!
//! ```text
//! ---
//! FieldType: Text
//! FieldName: field_1
//! FieldFlags: 0
//! FieldJustification: Left
//! ---
//! ```
//!
//! Parsing is permissive and never fails: records with fewer than three
//! lines are dropped, lines without a `": "` separator are skipped, and
//! unknown keys are ignored.

use schemars::JsonSchema;
use serde::Serialize;

const RECORD_SEPARATOR: &str = "---\n";

/// One interactive form field as reported by pdftk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FieldDescriptor {
    /// Lower-cased field type (e.g. "text", "button", "choice")
    #[serde(rename = "type")]
    pub field_type: String,
    /// Fully qualified field name
    pub name: String,
    /// Alternate (user-facing) name, empty when absent
    pub alt_name: String,
    /// Raw field flags as printed by pdftk
    pub flags: String,
}

/// Parse field dump text into descriptors, in the order they appear
pub fn parse_field_dump(dump: &str) -> Vec<FieldDescriptor> {
    dump.split(RECORD_SEPARATOR)
        .filter(|record| record.split('\n').count() > 2)
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> FieldDescriptor {
    let mut field = FieldDescriptor::default();

    for line in record.split('\n') {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };

        match key {
            "FieldType" => field.field_type = value.to_lowercase(),
            "FieldName" => field.name = value.to_string(),
            "FieldNameAlt" => field.alt_name = value.to_string(),
            "FieldFlags" => field.flags = value.to_string(),
            _ => {}
        }
    }

    field
}
