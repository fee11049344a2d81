use std::fs;
use std::path::Path;

use log::debug;

use crate::error::ConfigError;

/// The in-memory payload list shared by every parameter of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wordlist {
    payloads: Vec<String>,
}

impl Wordlist {
    pub fn from_payloads(payloads: Vec<String>) -> Self {
        Self { payloads }
    }

    /// Loads a newline-delimited file, trimming each line and skipping blank ones.
    /// Byte sequences that are not valid UTF-8 are dropped. A missing file or
    /// one without any payload is a configuration error.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let bytes = fs::read(Path::new(path)).map_err(|source| ConfigError::WordlistMissing {
            path: path.to_string(),
            source,
        })?;

        let payloads: Vec<String> = decode_dropping_invalid(&bytes)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if payloads.is_empty() {
            return Err(ConfigError::WordlistEmpty(path.to_string()));
        }

        debug!("Loaded {} payload(s) from {}", payloads.len(), path);
        Ok(Self { payloads })
    }

    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

fn decode_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_skips_blank_lines_and_trims() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "admin").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  ' OR 1=1--  ").unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "#not-a-comment").unwrap();

        let list = Wordlist::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(list.payloads(), &["admin", "' OR 1=1--", "#not-a-comment"]);
    }

    #[test]
    fn test_missing_wordlist_is_config_error() {
        let err = Wordlist::load("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, ConfigError::WordlistMissing { .. }));
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }

    #[test]
    fn test_blank_only_wordlist_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\n\n   \n").unwrap();
        let err = Wordlist::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::WordlistEmpty(_)));
    }

    #[test]
    fn test_invalid_utf8_bytes_are_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ad\xffmin\n\xfe\xfe\nr\xc3\xb4le\ntrail\xe2\x82").unwrap();

        let list = Wordlist::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(list.payloads(), &["admin", "r\u{f4}le", "trail"]);
    }
}
