//! Author-list column codec
//!
//! Authors are stored as a JSON array so names containing commas
//! round-trip exactly. Rows written before the JSON format used a
//! comma-joined string; the reader still accepts that form.

/// Encode an ordered author list for storage.
pub fn to_column(authors: &[String]) -> String {
    serde_json::to_string(authors).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored author column, falling back to the legacy
/// comma-joined representation when the value is not a JSON array.
pub fn from_column(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if raw.starts_with('[') {
        if let Ok(authors) = serde_json::from_str::<Vec<String>>(raw) {
            return authors;
        }
    }
    raw.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_delimiter_in_name() {
        let authors = vec!["Smith, Jr., John".to_string(), "Alice".to_string()];
        assert_eq!(from_column(&to_column(&authors)), authors);
    }

    #[test]
    fn roundtrip_empty() {
        let authors: Vec<String> = Vec::new();
        assert_eq!(to_column(&authors), "[]");
        assert_eq!(from_column("[]"), authors);
        assert!(from_column("").is_empty());
    }

    #[test]
    fn legacy_comma_joined_parses() {
        assert_eq!(
            from_column("Author One,Author Two"),
            vec!["Author One".to_string(), "Author Two".to_string()]
        );
    }

    #[test]
    fn malformed_json_falls_back_to_legacy_split() {
        assert_eq!(from_column("[broken"), vec!["[broken".to_string()]);
    }

    #[test]
    fn unicode_names_roundtrip() {
        let authors = vec!["山田 太郎".to_string(), "Müller, K.".to_string()];
        assert_eq!(from_column(&to_column(&authors)), authors);
    }
}
