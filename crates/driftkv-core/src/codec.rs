//! Text codec and record-line format
//!
//! A record is one line: `key|Type|value`. String values are base64 encoded
//! so they may contain `|` and newlines. Int/Float/Bool values are written
//! as plain locale-independent literals.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::entry::{Entry, UnknownTypeTag, ValueType};

/// Field separator between key, type tag, and value.
pub const FIELD_SEPARATOR: char = '|';

/// Encode a string value for the file. Empty input passes through unchanged.
pub fn encode_string(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    STANDARD.encode(value.as_bytes())
}

/// Inverse of [`encode_string`].
pub fn decode_string(encoded: &str) -> Result<String, String> {
    if encoded.is_empty() {
        return Ok(String::new());
    }
    let bytes = STANDARD.decode(encoded).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Render one entry as a record line (without the trailing newline).
pub fn encode_line(entry: &Entry) -> String {
    let value = match entry.value_type {
        ValueType::String => encode_string(&entry.value),
        ValueType::Int | ValueType::Float | ValueType::Bool => entry.value.clone(),
    };
    format!("{}{sep}{}{sep}{}", entry.key, entry.value_type, value, sep = FIELD_SEPARATOR)
}

/// True if the pair renders as exactly one record line that parses back to
/// the same key and value. Keys and plain (non-String) values must not
/// contain the field separator or a line break.
pub fn fits_record(key: &str, value_type: ValueType, value: &str) -> bool {
    let unsafe_text = |text: &str| text.contains([FIELD_SEPARATOR, '\n', '\r']);
    if unsafe_text(key) {
        return false;
    }
    match value_type {
        ValueType::String => true,
        ValueType::Int | ValueType::Float | ValueType::Bool => !unsafe_text(value),
    }
}

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParse {
    /// A well-formed record
    Record(Entry),
    /// Wrong number of fields; skipped by the loader
    Malformed,
}

/// Why a line with three fields could not become an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    UnknownTypeTag(String),
    Decode(String),
}

impl From<UnknownTypeTag> for LineError {
    fn from(err: UnknownTypeTag) -> Self {
        LineError::UnknownTypeTag(err.0)
    }
}

/// Parse one record line. A trailing `\r` is tolerated.
pub fn decode_line(line: &str) -> Result<LineParse, LineError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let [key, tag, raw] = fields.as_slice() else {
        return Ok(LineParse::Malformed);
    };

    let value_type: ValueType = tag.parse()?;
    let value = match value_type {
        ValueType::String => decode_string(raw).map_err(LineError::Decode)?,
        ValueType::Int | ValueType::Float | ValueType::Bool => raw.to_string(),
    };
    Ok(LineParse::Record(Entry::new(*key, value_type, value)))
}

/// Integer literal, e.g. `-42`.
pub fn format_int(value: i64) -> String {
    value.to_string()
}

pub fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Shortest decimal text that parses back to the same `f64`.
/// Non-finite values use `NaN`, `inf`, `-inf`.
pub fn format_float(value: f64) -> String {
    value.to_string()
}

pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

/// `true` / `false`.
pub fn format_bool(value: bool) -> String {
    value.to_string()
}

/// Accepts `true` / `false` in any ASCII case.
pub fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_passes_through() {
        assert_eq!(encode_string(""), "");
        assert_eq!(decode_string("").unwrap(), "");
    }

    #[test]
    fn test_encoded_string_is_delimiter_safe() {
        let raw = "a|b\nc\r\nd";
        let encoded = encode_string(raw);
        assert!(!encoded.contains('|'));
        assert!(!encoded.contains('\n'));
        assert_eq!(decode_string(&encoded).unwrap(), raw);
    }

    #[test]
    fn test_known_encoding() {
        assert_eq!(encode_string("hello"), "aGVsbG8=");
        assert_eq!(decode_string("aGVsbG8=").unwrap(), "hello");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(decode_string("not base64!").is_err());
    }

    #[test]
    fn test_encode_line_numeric_is_plain() {
        let line = encode_line(&Entry::new("score", ValueType::Int, "100"));
        assert_eq!(line, "score|Int|100");

        let line = encode_line(&Entry::new("ratio", ValueType::Float, "0.25"));
        assert_eq!(line, "ratio|Float|0.25");
    }

    #[test]
    fn test_encode_line_string_is_encoded() {
        let line = encode_line(&Entry::new("name", ValueType::String, "hello"));
        assert_eq!(line, "name|String|aGVsbG8=");
    }

    #[test]
    fn test_fits_record() {
        assert!(fits_record("score", ValueType::Int, "100"));
        assert!(fits_record("name", ValueType::String, "a|b\nc"));
        assert!(!fits_record("z|Nope|0\nk", ValueType::Int, "1"));
        assert!(!fits_record("k\r", ValueType::String, "v"));
        assert!(!fits_record("k", ValueType::Int, "1\nz|Nope|0"));
        assert!(!fits_record("k", ValueType::Bool, "true\r"));
    }

    #[test]
    fn test_decode_line_record() {
        let parsed = decode_line("name|String|aGVsbG8=").unwrap();
        assert_eq!(parsed, LineParse::Record(Entry::new("name", ValueType::String, "hello")));

        let parsed = decode_line("flag|Bool|true\r").unwrap();
        assert_eq!(parsed, LineParse::Record(Entry::new("flag", ValueType::Bool, "true")));
    }

    #[test]
    fn test_decode_line_wrong_field_count() {
        assert_eq!(decode_line("a|Int|1|extra").unwrap(), LineParse::Malformed);
        assert_eq!(decode_line("a|Int").unwrap(), LineParse::Malformed);
        assert_eq!(decode_line("").unwrap(), LineParse::Malformed);
    }

    #[test]
    fn test_decode_line_unknown_tag() {
        assert_eq!(
            decode_line("a|Long|1"),
            Err(LineError::UnknownTypeTag("Long".into()))
        );
    }

    #[test]
    fn test_empty_string_value_line() {
        let entry = Entry::new("blank", ValueType::String, "");
        let line = encode_line(&entry);
        assert_eq!(line, "blank|String|");
        assert_eq!(decode_line(&line).unwrap(), LineParse::Record(entry));
    }

    #[test]
    fn test_float_text_is_locale_free() {
        assert_eq!(format_float(1234567.5), "1234567.5");
        assert_eq!(parse_float("1234567.5"), Some(1234567.5));
        assert_eq!(parse_float(&format_float(0.1 + 0.2)), Some(0.1 + 0.2));
        assert_eq!(parse_float("1,5"), None);
    }

    #[test]
    fn test_bool_parse_any_case() {
        assert_eq!(format_bool(true), "true");
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_int_round_trip() {
        assert_eq!(parse_int(&format_int(i64::MIN)), Some(i64::MIN));
        assert_eq!(parse_int("12a"), None);
    }
}
