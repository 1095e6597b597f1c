//! Minimal OOXML helpers shared by the DOCX and XLSX strategies.
//!
//! Both formats are zip containers of WordprocessingML/SpreadsheetML parts.
//! We pull the handful of elements we need with regular expressions rather
//! than a full XML stack; the parts are machine-generated and regular.

use std::io::Read;
use std::path::Path;

use crate::ExtractionError;

/// Read one named part out of an OOXML container.
pub fn read_part(path: &Path, part: &str) -> Result<String, ExtractionError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ExtractionError::Parse(format!("not a zip container: {e}")))?;

    let mut entry = archive
        .by_name(part)
        .map_err(|e| ExtractionError::Parse(format!("missing part {part}: {e}")))?;

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ExtractionError::Parse(format!("unreadable part {part}: {e}")))?;
    Ok(content)
}

/// Like [`read_part`] but returns None for absent optional parts.
pub fn read_optional_part(path: &Path, part: &str) -> Option<String> {
    read_part(path, part).ok()
}

/// List entry names inside the container.
pub fn list_parts(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let file = std::fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file)
        .map_err(|e| ExtractionError::Parse(format!("not a zip container: {e}")))?;
    Ok(archive.file_names().map(|n| n.to_string()).collect())
}

/// Decode the five XML character entities plus decimal/hex references.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let end = match rest.find(';') {
            Some(end) if end <= 10 => end,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };

        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                        continue;
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unescapes_named_and_numeric_entities() {
        assert_eq!(unescape_entities("P&amp;L &lt;audited&gt;"), "P&L <audited>");
        assert_eq!(unescape_entities("&#8377;100 &#x20B9;200"), "\u{20B9}100 \u{20B9}200");
    }

    #[test]
    fn leaves_bare_ampersands_alone() {
        assert_eq!(unescape_entities("AT&T & Sons"), "AT&T & Sons");
    }
}
