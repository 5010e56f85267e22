//! XFDF payload encoder

use super::Form;
use crate::error::{Error, Result};
use serde::Serialize;

/// Namespace of the `xfdf` root element
pub const XFDF_NAMESPACE: &str = "http://ns.adobe.com/xfdf/";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Serialize)]
struct XfdfDocument<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@xml:space")]
    space: &'static str,
    fields: XfdfFields<'a>,
}

#[derive(Serialize)]
struct XfdfFields<'a> {
    field: Vec<XfdfField<'a>>,
}

#[derive(Serialize)]
struct XfdfField<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    value: &'a str,
}

/// Whether `c` matches the XML 1.0 `Char` production
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn check_xml_text(field: &str, what: &str, text: &str) -> Result<()> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(Error::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("{} contains U+{:04X} which is not allowed in XML", what, c as u32),
        }),
        None => Ok(()),
    }
}

/// Encode a form as an XFDF document. Values are kept as UTF-8.
///
/// Names and values must consist of XML characters; control characters
/// other than tab, line feed and carriage return are rejected.
pub fn encode_xfdf(form: &Form) -> Result<String> {
    for (name, value) in form.iter() {
        check_xml_text(name, "name", name)?;
        check_xml_text(name, "value", value)?;
    }

    let document = XfdfDocument {
        xmlns: XFDF_NAMESPACE,
        space: "preserve",
        fields: XfdfFields {
            field: form
                .iter()
                .map(|(name, value)| XfdfField { name, value })
                .collect(),
        },
    };

    let mut out = String::from(XML_DECLARATION);
    out.push('\n');

    let serializer = quick_xml::se::Serializer::with_root(&mut out, Some("xfdf"))
        .map_err(|e| Error::Xml {
            reason: e.to_string(),
        })?;
    document.serialize(serializer).map_err(|e| Error::Xml {
        reason: e.to_string(),
    })?;

    out.push('\n');
    Ok(out)
}
