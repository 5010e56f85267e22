//! Parsers for pdftk's plain-text dump output

mod fields;
mod info;

pub use fields::{parse_field_dump, FieldDescriptor};
pub use info::{parse_info_dump, render_info_update, DocumentInfo, InfoEntry};
