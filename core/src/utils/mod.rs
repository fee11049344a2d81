pub mod wordlist;

use crate::error::ConfigError;

/// Parses `"Key: Value"` entries into ordered pairs, skipping ones without a key.
pub fn parse_custom_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter()
        .filter_map(|h| {
            let mut parts = h.splitn(2, ':');
            let key = parts.next()?.trim().to_string();
            let val = parts.next().unwrap_or("").trim().to_string();
            if key.is_empty() {
                return None;
            }
            Some((key, val))
        })
        .collect()
}

/// Parses a comma-separated status code list such as `"200, 404"`.
pub fn parse_status_list(raw: &str) -> Result<Vec<u16>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .ok()
                .filter(|code| (100..=999).contains(code))
                .ok_or_else(|| ConfigError::InvalidStatusList(s.to_string()))
        })
        .collect()
}

/// Maps every character outside `[A-Za-z0-9._-]` to `_` so the result is a
/// single path component.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_") + "_"
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_custom_headers() {
        let raw = vec![
            "X-Api-Key: abc".to_string(),
            "Cookie: a=b: c".to_string(),
            ": orphan".to_string(),
        ];
        assert_eq!(
            parse_custom_headers(&raw),
            vec![
                ("X-Api-Key".to_string(), "abc".to_string()),
                ("Cookie".to_string(), "a=b: c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_status_list() {
        assert_eq!(parse_status_list("200, 404,,500").unwrap(), vec![200, 404, 500]);
        assert!(parse_status_list("").unwrap().is_empty());
        assert!(matches!(parse_status_list("200,abc"), Err(ConfigError::InvalidStatusList(s)) if s == "abc"));
        assert!(parse_status_list("42").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("a b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("' OR 1=1--"), "__OR_1_1--");
        assert_eq!(sanitize_filename(".."), "___");
        assert_eq!(sanitize_filename(""), "_");
    }
}
