//! FDF payload encoder
//!
//! pdftk does not read UTF-8 from FDF files, so values are transliterated
//! to Latin-1 (ISO-8859-1). Field names are written verbatim and neither
//! names nor values have `(`, `)` or `\` escaped.

use super::Form;
use crate::error::{Error, Result};

/// Fixed FDF preamble opening the `/Fields` array
pub const FDF_HEADER: &str = "%FDF-1.2\n%,,oe\"\n1 0 obj\n<<\n/FDF << /Fields [";

/// Fixed FDF trailer closing the array and declaring the root object
pub const FDF_FOOTER: &str = "]\n>>\n>>\nendobj\ntrailer\n<<\n/Root 1 0 R\n>>\n%%EOF";

/// Transliterate text into Latin-1 bytes.
///
/// Returns the first character outside U+0000..=U+00FF on failure.
pub fn to_latin1(text: &str) -> std::result::Result<Vec<u8>, char> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| c))
        .collect()
}

/// Encode a form as an FDF payload
pub fn encode_fdf(form: &Form) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(FDF_HEADER.len() + FDF_FOOTER.len() + form.len() * 32);

    out.extend_from_slice(FDF_HEADER.as_bytes());
    out.push(b'\n');

    for (name, value) in form.iter() {
        let value = to_latin1(value).map_err(|character| Error::Encoding {
            field: name.to_string(),
            character,
        })?;

        out.extend_from_slice(b"<< /T (");
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b") /V (");
        out.extend_from_slice(&value);
        out.extend_from_slice(b")>>\n");
    }

    out.extend_from_slice(FDF_FOOTER.as_bytes());
    out.push(b'\n');

    Ok(out)
}
