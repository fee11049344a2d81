//! Error types for the fuzzing engine.
//!
//! `ConfigError` is everything that can be rejected before the first request
//! leaves the machine. `TransportError` is a single failed iteration and never
//! escapes the dispatcher. `FuzzError` is what `Fuzzer::run` can fail with.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no parameters selected for fuzzing")]
    NoParameters,

    #[error("parameter '{0}' is listed more than once")]
    DuplicateParameter(String),

    #[error("only one parameter specified; combinatorial mode needs at least two")]
    CombinatorialNeedsMultiple,

    #[error("{0} parameters specified; enable combinatorial mode for multi-parameter fuzzing")]
    MultipleNeedCombinatorial(usize),

    #[error("parameters not used in URL or body and cannot be fuzzed: {}", .0.join(", "))]
    UnusedParameters(Vec<String>),

    #[error("failed to read wordlist '{path}': {source}")]
    WordlistMissing {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wordlist '{0}' contains no payloads")]
    WordlistEmpty(String),

    #[error("invalid include regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid proxy URL '{0}'")]
    InvalidProxy(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("delay must be a non-negative number of seconds, got {0}")]
    InvalidDelay(f64),

    #[error("invalid status code list entry '{0}'")]
    InvalidStatusList(String),

    #[error("{params} parameters over {payloads} payloads is too many combinations")]
    TooManyCombinations { params: usize, payloads: usize },

    #[error("parameter(s) not declared by the endpoint: {}", .0.join(", "))]
    UnknownParameter(Vec<String>),

    #[error("no static value supplied for non-fuzzed parameter '{0}'")]
    MissingStaticValue(String),

    #[error("failed to load config file '{path}': {reason}")]
    InvalidConfigFile { path: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Failure of a single request/response exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum FuzzError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("baseline request failed: {0}")]
    Baseline(#[source] TransportError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unused_parameters_names_every_offender() {
        let err = ConfigError::UnusedParameters(vec!["id".into(), "role".into()]);
        assert_eq!(
            err.to_string(),
            "parameters not used in URL or body and cannot be fuzzed: id, role"
        );
    }

    #[test]
    fn test_config_error_wraps_into_fuzz_error() {
        let err: FuzzError = ConfigError::NoParameters.into();
        assert!(matches!(err, FuzzError::Config(ConfigError::NoParameters)));
    }
}
